//! Blob-created notifications delivered through the storage queue.

use serde::Deserialize;
use thiserror::Error;

const SUBJECT_PREFIX: &str = "/blobServices/default/containers/";
const BLOBS_SEPARATOR: &str = "/blobs/";

#[derive(Debug, Error)]
pub enum EventError {
    #[error("event is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("event has no subject")]
    MissingSubject,
    #[error("cannot extract blob name from subject '{0}'")]
    UnexpectedSubject(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobEvent {
    pub container: String,
    pub blob_name: String,
}

#[derive(Deserialize)]
struct RawEvent {
    #[serde(default)]
    subject: Option<String>,
}

/// Parses an Event Grid message whose `subject` is
/// `/blobServices/default/containers/<container>/blobs/<blob name>`.
pub fn parse_blob_event(body: &str) -> Result<BlobEvent, EventError> {
    let raw: RawEvent = serde_json::from_str(body)?;
    let subject = raw
        .subject
        .filter(|s| !s.is_empty())
        .ok_or(EventError::MissingSubject)?;
    parse_subject(&subject)
}

pub fn parse_subject(subject: &str) -> Result<BlobEvent, EventError> {
    let unexpected = || EventError::UnexpectedSubject(subject.to_string());
    let rest = subject.strip_prefix(SUBJECT_PREFIX).ok_or_else(unexpected)?;
    let (container, blob_name) = rest.split_once(BLOBS_SEPARATOR).ok_or_else(unexpected)?;
    if container.is_empty() || blob_name.is_empty() {
        return Err(unexpected());
    }
    Ok(BlobEvent {
        container: container.to_string(),
        blob_name: blob_name.to_string(),
    })
}
