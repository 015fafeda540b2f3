#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use billing_lake_core::contract::{LakeWriter, RemoteError};

/// Lake that keeps every written object in memory.
#[derive(Default)]
pub struct MemoryLake {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryLake {
    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    pub fn json(&self, key: &str) -> serde_json::Value {
        let objects = self.objects.lock().unwrap();
        let body = objects
            .get(key)
            .unwrap_or_else(|| panic!("no object at {key}"));
        serde_json::from_slice(body).expect("object is JSON")
    }
}

#[async_trait]
impl LakeWriter for MemoryLake {
    async fn put(&self, path: &str, body: Vec<u8>) -> Result<(), RemoteError> {
        self.objects.lock().unwrap().insert(path.to_string(), body);
        Ok(())
    }
}
