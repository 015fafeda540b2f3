//! Collapses vendor export paths into the flat partition layout of the lake.
//!
//! ```text
//! /7a770e35-.../gds-focus-v1/focus-backfill-2025-06/billing_period=20250601/
//!     providers/Microsoft.Billing/billingAccounts/ACCT123/billingProfiles/ProfileA/part_0_0001.parquet
//! => gds-focus-v1/billing_period=20250601/ACCT123_ProfileA_part_0_0001.parquet
//! ```
//!
//! Export markers, run timestamps and run identifiers are dropped, date-range
//! folders become `billing_period=` partitions, and billing account/profile
//! anchors are lifted out of the directory tree into the file name.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::paths::billing_period_dir;
use crate::segment::{
    classify, strip_account_suffix, ClassifyContext, ExportMarkers, SegmentKind, BILLING_ACCOUNTS,
    BILLING_PROFILES, DEFAULT_EXPORT_FAMILIES,
};

/// Folder value used when no billing account could be resolved.
pub const UNKNOWN_BILLING_ACCOUNT: &str = "unknown-billing-account";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriteConfig {
    #[serde(default = "default_export_markers")]
    pub export_markers: Vec<String>,
    /// Fallback billing account per numeric export index (`focus-daily-cost-export-2` → 2).
    #[serde(default)]
    pub export_index_accounts: BTreeMap<u32, String>,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            export_markers: default_export_markers(),
            export_index_accounts: BTreeMap::new(),
        }
    }
}

fn default_export_markers() -> Vec<String> {
    DEFAULT_EXPORT_FAMILIES.iter().map(|s| s.to_string()).collect()
}

/// Billing identity read from the dataset itself rather than from its path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DataHints {
    pub billing_account: Option<String>,
    pub billing_profile: Option<String>,
}

impl DataHints {
    /// Parses a `.../billingAccounts/<acct>[:<suffix>]/billingProfiles/<profile>` field.
    /// Missing parts stay `None`.
    pub fn from_billing_field(field: &str) -> Self {
        let parts: Vec<&str> = field.split('/').filter(|p| !p.is_empty()).collect();
        let mut hints = DataHints::default();
        for pair in parts.windows(2) {
            if hints.billing_account.is_none() && pair[0].eq_ignore_ascii_case(BILLING_ACCOUNTS) {
                let account = strip_account_suffix(pair[1]);
                if !account.is_empty() {
                    hints.billing_account = Some(account.to_string());
                }
            } else if hints.billing_profile.is_none()
                && pair[0].eq_ignore_ascii_case(BILLING_PROFILES)
            {
                hints.billing_profile = Some(pair[1].to_string());
            }
        }
        hints
    }
}

/// Where the billing-account folder came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountSource {
    Data,
    Path,
    ExportIndex,
    Unresolved,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteResult {
    pub segments: Vec<String>,
    pub billing_account_folder: String,
    pub billing_profile: Option<String>,
    pub account_source: AccountSource,
}

impl RewriteResult {
    fn empty() -> Self {
        Self {
            segments: Vec::new(),
            billing_account_folder: UNKNOWN_BILLING_ACCOUNT.to_string(),
            billing_profile: None,
            account_source: AccountSource::Unresolved,
        }
    }

    /// The rewritten path, `/`-joined, without a leading separator.
    pub fn path(&self) -> String {
        self.segments.join("/")
    }

    pub fn is_account_resolved(&self) -> bool {
        self.account_source != AccountSource::Unresolved
    }
}

pub struct PathRewriter {
    markers: ExportMarkers,
    export_index_accounts: BTreeMap<u32, String>,
}

impl PathRewriter {
    pub fn new(config: &RewriteConfig) -> Self {
        Self {
            markers: ExportMarkers::new(config.export_markers.iter().cloned()),
            export_index_accounts: config.export_index_accounts.clone(),
        }
    }

    /// Splits `path` on `/` and rewrites it. Empty segments are ignored.
    pub fn rewrite_path(&self, path: &str, hints: &DataHints) -> RewriteResult {
        let segments: Vec<&str> = path.split('/').collect();
        self.rewrite(&segments, hints)
    }

    pub fn rewrite<S: AsRef<str>>(&self, segments: &[S], hints: &DataHints) -> RewriteResult {
        let segments: Vec<&str> = segments
            .iter()
            .map(AsRef::as_ref)
            .filter(|s| !s.is_empty())
            .collect();
        if segments.is_empty() {
            return RewriteResult::empty();
        }

        let last = segments.len() - 1;
        let mut kept: Vec<String> = Vec::with_capacity(segments.len());
        let mut file_name_kept = false;
        let mut path_account: Option<String> = None;
        let mut path_profile: Option<String> = None;
        let mut export_index: Option<u32> = None;

        let mut cursor = 0;
        while cursor < segments.len() {
            let segment = segments[cursor];
            let ctx = ClassifyContext {
                markers: &self.markers,
                following: &segments[cursor + 1..],
            };
            let kind = classify(segment, &ctx);
            let span = kind.span();
            match kind {
                SegmentKind::ExportMarker { export_index: idx } => {
                    debug!(segment, ?idx, "Dropping export marker");
                    if export_index.is_none() {
                        export_index = idx;
                    }
                }
                SegmentKind::TimestampDir => debug!(segment, "Dropping timestamp directory"),
                SegmentKind::Identifier => debug!(segment, "Dropping run identifier"),
                SegmentKind::DateRange { billing_period } => {
                    kept.push(billing_period_dir(&billing_period));
                }
                SegmentKind::ProvidersAnchor { billing_account } => {
                    debug!(billing_account = %billing_account, "Captured billing account from path");
                    path_account.get_or_insert(billing_account);
                }
                SegmentKind::ProfileAnchor { billing_profile } => {
                    debug!(billing_profile = %billing_profile, "Captured billing profile from path");
                    path_profile.get_or_insert(billing_profile);
                }
                SegmentKind::Literal => {
                    kept.push(segment.to_string());
                    file_name_kept = cursor == last;
                }
            }
            cursor += span;
        }

        let data_account = non_empty(hints.billing_account.as_deref());
        let index_account = export_index
            .and_then(|idx| self.export_index_accounts.get(&idx))
            .map(String::as_str);
        let (billing_account_folder, account_source) = if let Some(account) = data_account {
            (account.to_string(), AccountSource::Data)
        } else if let Some(account) = path_account {
            (account, AccountSource::Path)
        } else if let Some(account) = index_account {
            (account.to_string(), AccountSource::ExportIndex)
        } else {
            (UNKNOWN_BILLING_ACCOUNT.to_string(), AccountSource::Unresolved)
        };
        let billing_profile = non_empty(hints.billing_profile.as_deref())
            .map(str::to_string)
            .or(path_profile);

        let identity_resolved =
            account_source != AccountSource::Unresolved || billing_profile.is_some();
        if file_name_kept && identity_resolved {
            let prefix = file_name_prefix(&billing_account_folder, billing_profile.as_deref());
            if let Some(file_name) = kept.last_mut() {
                // Reprocessing an already flattened object must not stack prefixes.
                if !file_name.starts_with(&prefix) {
                    *file_name = format!("{prefix}{file_name}");
                }
            }
        }

        RewriteResult {
            segments: kept,
            billing_account_folder,
            billing_profile,
            account_source,
        }
    }
}

/// `<account>_<profile>_`, or `<account>_` without a profile.
pub fn file_name_prefix(account: &str, profile: Option<&str>) -> String {
    match profile {
        Some(profile) => format!("{account}_{profile}_"),
        None => format!("{account}_"),
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
