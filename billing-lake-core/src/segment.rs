//! Classification of a single slash-delimited export path segment.
//!
//! Every segment maps to exactly one [`SegmentKind`]. Rules are evaluated in a
//! fixed order and the first match wins; [`SegmentKind::Literal`] is the
//! fallback, so classification never fails.

use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use uuid::Uuid;

pub const PROVIDERS: &str = "providers";
pub const BILLING_NAMESPACE: &str = "Microsoft.Billing";
pub const BILLING_ACCOUNTS: &str = "billingAccounts";
pub const BILLING_PROFILES: &str = "billingProfiles";

/// Export family names used when no explicit list is configured.
pub const DEFAULT_EXPORT_FAMILIES: &[&str] = &[
    "focus-daily-cost-export",
    "focus-backfill",
    "utilization-data",
    "utilization-export",
];

/// Semantic kind of a path segment, with whatever the rewriter needs from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentKind {
    /// Directory created by the export mechanism itself.
    ExportMarker { export_index: Option<u32> },
    /// `YYYYMMDDHHMM` run folder.
    TimestampDir,
    /// `YYYYMMDD-YYYYMMDD` export window.
    DateRange { billing_period: String },
    /// Random run identifier (canonical UUID).
    Identifier,
    /// `providers/Microsoft.Billing/billingAccounts/<id>`.
    ProvidersAnchor { billing_account: String },
    /// `billingProfiles/<profile>`.
    ProfileAnchor { billing_profile: String },
    Literal,
}

impl SegmentKind {
    /// Number of input segments consumed by this kind, counting the segment itself.
    pub fn span(&self) -> usize {
        match self {
            SegmentKind::ProvidersAnchor { .. } => 4,
            SegmentKind::ProfileAnchor { .. } => 2,
            _ => 1,
        }
    }
}

/// The set of export family names recognised as [`SegmentKind::ExportMarker`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportMarkers {
    families: Vec<String>,
}

impl Default for ExportMarkers {
    fn default() -> Self {
        Self::new(DEFAULT_EXPORT_FAMILIES.iter().copied())
    }
}

impl ExportMarkers {
    pub fn new<I, S>(families: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            families: families
                .into_iter()
                .map(Into::into)
                .filter(|f: &String| !f.is_empty())
                .collect(),
        }
    }

    pub fn families(&self) -> &[String] {
        &self.families
    }

    /// Returns `Some(export_index)` when `segment` is a marker.
    ///
    /// Accepted forms are `<family>`, `<family>-<digits>` (the digits become the
    /// export index) and `<family>-YYYY-MM`.
    pub fn match_segment(&self, segment: &str) -> Option<Option<u32>> {
        for family in &self.families {
            if segment == family {
                return Some(None);
            }
            let Some(suffix) = segment
                .strip_prefix(family.as_str())
                .and_then(|rest| rest.strip_prefix('-'))
            else {
                continue;
            };
            if !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()) {
                return Some(suffix.parse().ok());
            }
            if is_year_month_tag(suffix) {
                return Some(None);
            }
        }
        None
    }
}

/// What the classifier may look at besides the segment itself.
#[derive(Debug, Clone, Copy)]
pub struct ClassifyContext<'a> {
    pub markers: &'a ExportMarkers,
    /// Segments after the one being classified, in order.
    pub following: &'a [&'a str],
}

/// Classifies one segment. Pure and total.
pub fn classify(segment: &str, ctx: &ClassifyContext<'_>) -> SegmentKind {
    if let Some(export_index) = ctx.markers.match_segment(segment) {
        return SegmentKind::ExportMarker { export_index };
    }
    if is_timestamp_dir(segment) {
        return SegmentKind::TimestampDir;
    }
    if let Some(start) = date_range_start(segment) {
        return SegmentKind::DateRange {
            billing_period: start.to_string(),
        };
    }
    if is_identifier(segment) {
        return SegmentKind::Identifier;
    }
    // An anchor never captures the final segment; that one is the file name.
    if segment == PROVIDERS {
        if let [namespace, accounts, id, _, ..] = ctx.following {
            if *namespace == BILLING_NAMESPACE && *accounts == BILLING_ACCOUNTS && !id.is_empty() {
                return SegmentKind::ProvidersAnchor {
                    billing_account: strip_account_suffix(id).to_string(),
                };
            }
        }
    }
    if segment == BILLING_PROFILES {
        if let [profile, _, ..] = ctx.following {
            if !profile.is_empty() {
                return SegmentKind::ProfileAnchor {
                    billing_profile: profile.to_string(),
                };
            }
        }
    }
    SegmentKind::Literal
}

/// Billing account ids may carry a `:<suffix>`; only the part before it is the account.
pub fn strip_account_suffix(id: &str) -> &str {
    id.split(':').next().unwrap_or(id)
}

/// Exactly 12 ASCII digits that form a real calendar minute in years 0001-9999.
pub fn is_timestamp_dir(segment: &str) -> bool {
    if segment.len() != 12 || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let field = |range: std::ops::Range<usize>| segment[range].parse::<u32>().ok();
    let (Some(year), Some(month), Some(day), Some(hour), Some(minute)) =
        (field(0..4), field(4..6), field(6..8), field(8..10), field(10..12))
    else {
        return false;
    };
    if year == 0 {
        return false;
    }
    NaiveDate::from_ymd_opt(year as i32, month, day)
        .and_then(|date| date.and_hms_opt(hour, minute, 0))
        .is_some()
}

/// First eight digits of a `DDDDDDDD-DDDDDDDD` segment.
pub fn date_range_start(segment: &str) -> Option<&str> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN
        .get_or_init(|| Regex::new(r"^([0-9]{8})-[0-9]{8}$").expect("date range pattern compiles"));
    pattern
        .captures(segment)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Canonical hyphenated UUID only; braced, URN and simple forms are not identifiers here.
pub fn is_identifier(segment: &str) -> bool {
    segment.len() == 36 && Uuid::parse_str(segment).is_ok()
}

fn is_year_month_tag(s: &str) -> bool {
    let bytes = s.as_bytes();
    if bytes.len() != 7 || bytes[4] != b'-' {
        return false;
    }
    if !bytes[..4].iter().chain(&bytes[5..]).all(u8::is_ascii_digit) {
        return false;
    }
    matches!(s[5..].parse::<u32>(), Ok(1..=12))
}
