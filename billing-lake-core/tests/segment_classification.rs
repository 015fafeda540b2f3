use billing_lake_core::segment::{classify, ClassifyContext, ExportMarkers, SegmentKind};
use uuid::Uuid;

fn classify_alone(segment: &str) -> SegmentKind {
    let markers = ExportMarkers::default();
    classify(
        segment,
        &ClassifyContext {
            markers: &markers,
            following: &[],
        },
    )
}

#[test]
fn test_random_uuids_are_identifiers() {
    for _ in 0..50 {
        let id = Uuid::new_v4().to_string();
        assert_eq!(classify_alone(&id), SegmentKind::Identifier, "{id}");
    }
}

#[test]
fn test_uuid_lookalikes_are_literals() {
    // 36 chars, four hyphens, but not hex
    assert_eq!(
        classify_alone("zzzzzzzz-zzzz-zzzz-zzzz-zzzzzzzzzzzz"),
        SegmentKind::Literal
    );
    // hex, 36 chars, four hyphens in the wrong places
    assert_eq!(
        classify_alone("7a770e35b-455-4df2-a276-b07408438d9a"),
        SegmentKind::Literal
    );
    // simple (unhyphenated) form is not canonical
    assert_eq!(
        classify_alone("7a770e35b4554df2a276b07408438d9a"),
        SegmentKind::Literal
    );
}

#[test]
fn test_timestamp_dirs_must_be_real_calendar_minutes() {
    assert_eq!(classify_alone("202508131031"), SegmentKind::TimestampDir);
    assert_eq!(classify_alone("202513131031"), SegmentKind::Literal);
    assert_eq!(classify_alone("202502301031"), SegmentKind::Literal);
    assert_eq!(classify_alone("202508132460"), SegmentKind::Literal);
    assert_eq!(classify_alone("20250813103"), SegmentKind::Literal);
    assert_eq!(classify_alone("000001010000"), SegmentKind::Literal);
    assert_eq!(classify_alone("000101010000"), SegmentKind::TimestampDir);
}

#[test]
fn test_date_ranges_keep_first_date() {
    assert_eq!(
        classify_alone("20250801-20250831"),
        SegmentKind::DateRange {
            billing_period: "20250801".to_string()
        }
    );
    assert_eq!(classify_alone("2025080-120250831"), SegmentKind::Literal);
    assert_eq!(classify_alone("20250801_20250831"), SegmentKind::Literal);
}

#[test]
fn test_configured_markers_replace_defaults() {
    let markers = ExportMarkers::new(["custom-export"]);
    let ctx = ClassifyContext {
        markers: &markers,
        following: &[],
    };
    assert_eq!(
        classify("custom-export-7", &ctx),
        SegmentKind::ExportMarker {
            export_index: Some(7)
        }
    );
    assert_eq!(classify("focus-daily-cost-export", &ctx), SegmentKind::Literal);
}

#[test]
fn test_providers_anchor_needs_full_sequence() {
    let markers = ExportMarkers::default();
    let complete = ["Microsoft.Billing", "billingAccounts", "ACCT123:suffix", "x"];
    assert_eq!(
        classify(
            "providers",
            &ClassifyContext {
                markers: &markers,
                following: &complete,
            }
        ),
        SegmentKind::ProvidersAnchor {
            billing_account: "ACCT123".to_string()
        }
    );

    let truncated = ["Microsoft.Billing", "billingAccounts"];
    assert_eq!(
        classify(
            "providers",
            &ClassifyContext {
                markers: &markers,
                following: &truncated,
            }
        ),
        SegmentKind::Literal
    );

    let id_is_file_name = ["Microsoft.Billing", "billingAccounts", "part_0_0001.parquet"];
    assert_eq!(
        classify(
            "providers",
            &ClassifyContext {
                markers: &markers,
                following: &id_is_file_name,
            }
        ),
        SegmentKind::Literal
    );

    let other_namespace = ["Microsoft.Compute", "billingAccounts", "ACCT123", "x"];
    assert_eq!(
        classify(
            "providers",
            &ClassifyContext {
                markers: &markers,
                following: &other_namespace,
            }
        ),
        SegmentKind::Literal
    );
}

#[test]
fn test_profile_anchor_never_captures_the_file_name() {
    let markers = ExportMarkers::default();
    let following = ["ProfileA", "part_0_0001.parquet"];
    assert_eq!(
        classify(
            "billingProfiles",
            &ClassifyContext {
                markers: &markers,
                following: &following,
            }
        ),
        SegmentKind::ProfileAnchor {
            billing_profile: "ProfileA".to_string()
        }
    );
    assert_eq!(classify_alone("billingProfiles"), SegmentKind::Literal);

    let file_only = ["part_0_0001.parquet"];
    assert_eq!(
        classify(
            "billingProfiles",
            &ClassifyContext {
                markers: &markers,
                following: &file_only,
            }
        ),
        SegmentKind::Literal
    );
}

#[test]
fn test_marker_takes_precedence_over_later_rules() {
    // Markers are checked before date ranges.
    let markers = ExportMarkers::new(["20250801"]);
    let ctx = ClassifyContext {
        markers: &markers,
        following: &[],
    };
    assert_eq!(
        classify("20250801-20250831", &ctx),
        SegmentKind::ExportMarker {
            export_index: Some(20250831)
        }
    );
}
