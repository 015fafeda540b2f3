//! Blob export pipeline: moves one vendor export object into the data lake.
//!
//! For a blob-created event the pipeline
//!   - skips events for other containers and blobs without the expected suffix
//!   - fetches the blob and runs it through the configured [`ObjectTransform`]
//!   - derives billing hints from the dataset's billing field
//!   - rewrites the vendor path into the lake layout (see [`crate::rewrite`])
//!   - writes the object under the configured lake prefix
//!   - deletes the source blob, only once the write succeeded
//!
//! Cost exports (`.parquet`) and utilization exports (`.csv.gz`) share this
//! flow and differ only in their [`BlobExportConfig`] and transform.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::contract::{LakeWriter, ObjectTransform, RemoteError, SourceStore};
use crate::notification::BlobEvent;
use crate::paths::lake_key;
use crate::rewrite::{AccountSource, DataHints, PathRewriter};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobExportConfig {
    /// Source container the exports land in.
    pub container: String,
    /// Only blobs ending with this suffix are exported.
    pub suffix: String,
    /// Lake prefix the rewritten path is placed under.
    pub lake_prefix: String,
    #[serde(default = "default_true")]
    pub warn_unresolved_account: bool,
}

fn default_true() -> bool {
    true
}

impl BlobExportConfig {
    pub fn cost_defaults() -> Self {
        Self {
            container: "cost-exports".to_string(),
            suffix: ".parquet".to_string(),
            lake_prefix: "focus".to_string(),
            warn_unresolved_account: true,
        }
    }

    pub fn utilization_defaults() -> Self {
        Self {
            container: "utilization-exports".to_string(),
            suffix: ".csv.gz".to_string(),
            lake_prefix: "utilization".to_string(),
            warn_unresolved_account: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to fetch {container}/{blob}: {source}")]
    Fetch {
        container: String,
        blob: String,
        source: RemoteError,
    },
    #[error("failed to transform {blob}: {source}")]
    Transform { blob: String, source: RemoteError },
    #[error("failed to write {path}: {source}")]
    Write { path: String, source: RemoteError },
    #[error("wrote {path} but failed to delete source {container}/{blob}: {source}")]
    DeleteSource {
        path: String,
        container: String,
        blob: String,
        source: RemoteError,
    },
    #[error("failed to fetch {what}: {source}")]
    Remote { what: String, source: RemoteError },
    #[error("failed to encode {what}: {source}")]
    Encode {
        what: String,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportedBlob {
    pub source: BlobEvent,
    pub lake_path: String,
    pub billing_account_folder: String,
    pub account_source: AccountSource,
    pub bytes_written: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    OtherContainer,
    UnexpectedSuffix,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    Skipped(SkipReason),
    Exported(ExportedBlob),
}

/// Handles a single blob-created event. At most one attempt per remote call.
pub async fn process_blob_event<S, L, T>(
    event: &BlobEvent,
    config: &BlobExportConfig,
    rewriter: &PathRewriter,
    source: &S,
    lake: &L,
    transform: &T,
) -> Result<ProcessOutcome, ExportError>
where
    S: SourceStore + ?Sized,
    L: LakeWriter + ?Sized,
    T: ObjectTransform + ?Sized,
{
    if event.container != config.container {
        info!(
            container = %event.container,
            expected = %config.container,
            "[EXPORT] Skipping event for another container"
        );
        return Ok(ProcessOutcome::Skipped(SkipReason::OtherContainer));
    }
    if !event.blob_name.ends_with(&config.suffix) {
        info!(blob = %event.blob_name, suffix = %config.suffix, "[EXPORT] Skipping blob");
        return Ok(ProcessOutcome::Skipped(SkipReason::UnexpectedSuffix));
    }

    info!(blob = %event.blob_name, "[EXPORT] Processing blob");
    let raw = source
        .fetch(&event.container, &event.blob_name)
        .await
        .map_err(|e| ExportError::Fetch {
            container: event.container.clone(),
            blob: event.blob_name.clone(),
            source: e,
        })?;

    let transformed = transform
        .transform(&event.blob_name, raw)
        .map_err(|e| ExportError::Transform {
            blob: event.blob_name.clone(),
            source: e,
        })?;

    let hints = transformed
        .billing_field
        .as_deref()
        .map(DataHints::from_billing_field)
        .unwrap_or_default();
    let rewritten = rewriter.rewrite_path(&event.blob_name, &hints);
    if !rewritten.is_account_resolved() && config.warn_unresolved_account {
        warn!(
            blob = %event.blob_name,
            folder = %rewritten.billing_account_folder,
            "[EXPORT] Could not resolve billing account"
        );
    }

    let rewritten_path = rewritten.path();
    let lake_path = lake_key([config.lake_prefix.as_str(), rewritten_path.as_str()]);
    let bytes_written = transformed.body.len();
    if let Err(e) = lake.put(&lake_path, transformed.body).await {
        error!(path = %lake_path, error = %e, "[EXPORT][ERROR] Write failed, source kept");
        return Err(ExportError::Write {
            path: lake_path,
            source: e,
        });
    }
    info!(path = %lake_path, bytes = bytes_written, "[EXPORT] Written to lake");

    source
        .delete(&event.container, &event.blob_name)
        .await
        .map_err(|e| ExportError::DeleteSource {
            path: lake_path.clone(),
            container: event.container.clone(),
            blob: event.blob_name.clone(),
            source: e,
        })?;
    info!(blob = %event.blob_name, "[EXPORT] Deleted source blob");

    Ok(ProcessOutcome::Exported(ExportedBlob {
        source: event.clone(),
        lake_path,
        billing_account_folder: rewritten.billing_account_folder,
        account_source: rewritten.account_source,
        bytes_written,
    }))
}
