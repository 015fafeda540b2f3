//! Filesystem-backed object stores.
//!
//! The source store maps `<container>/<blob name>` under its root; the lake maps
//! `/`-separated keys under its root. Keys are confined to the root: absolute
//! keys and `..` segments are rejected.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use billing_lake_core::contract::{LakeWriter, RemoteError, SourceStore};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct FsObjectStore {
    root: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves a `/`-separated key below the root.
    pub fn resolve(&self, key: &str) -> Result<PathBuf, RemoteError> {
        let relative = Path::new(key.trim_start_matches('/'));
        let mut resolved = self.root.clone();
        for component in relative.components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                _ => return Err(format!("key '{key}' escapes the store root").into()),
            }
        }
        if resolved == self.root {
            return Err(format!("key '{key}' is empty").into());
        }
        Ok(resolved)
    }
}

#[async_trait]
impl SourceStore for FsObjectStore {
    async fn fetch(&self, container: &str, name: &str) -> Result<Vec<u8>, RemoteError> {
        let path = self.resolve(&format!("{container}/{name}"))?;
        debug!(path = %path.display(), "Reading source object");
        Ok(tokio::fs::read(&path).await?)
    }

    async fn delete(&self, container: &str, name: &str) -> Result<(), RemoteError> {
        let path = self.resolve(&format!("{container}/{name}"))?;
        debug!(path = %path.display(), "Deleting source object");
        Ok(tokio::fs::remove_file(&path).await?)
    }
}

#[async_trait]
impl LakeWriter for FsObjectStore {
    async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), RemoteError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        debug!(path = %path.display(), bytes = body.len(), "Writing lake object");
        Ok(tokio::fs::write(&path, body).await?)
    }
}
