use std::collections::BTreeMap;

use billing_lake_core::rewrite::{
    AccountSource, DataHints, PathRewriter, RewriteConfig, UNKNOWN_BILLING_ACCOUNT,
};

const BACKFILL_PATH: &str = "/7a770e35-b455-4df2-a276-b07408438d9a/gds-focus-v1/focus-backfill-2025-06/billing_period=20250601/providers/Microsoft.Billing/billingAccounts/ACCT123/billingProfiles/ProfileA/part_0_0001.parquet";

fn default_rewriter() -> PathRewriter {
    PathRewriter::new(&RewriteConfig::default())
}

#[test]
fn test_backfill_export_is_flattened() {
    let result = default_rewriter().rewrite_path(BACKFILL_PATH, &DataHints::default());
    assert_eq!(
        result.path(),
        "gds-focus-v1/billing_period=20250601/ACCT123_ProfileA_part_0_0001.parquet"
    );
    assert_eq!(result.billing_account_folder, "ACCT123");
    assert_eq!(result.billing_profile.as_deref(), Some("ProfileA"));
    assert_eq!(result.account_source, AccountSource::Path);
}

#[test]
fn test_daily_export_drops_run_folders() {
    let path = "gds-focus-v1/focus-daily-cost-export/20250801-20250831/202508131031/0b3c9a4e-2f7d-4c61-9a0b-5d1e8f7a6c21/part_0_0001.parquet";
    let result = default_rewriter().rewrite_path(path, &DataHints::default());
    assert_eq!(
        result.path(),
        "gds-focus-v1/billing_period=20250801/part_0_0001.parquet"
    );
    assert_eq!(result.billing_account_folder, UNKNOWN_BILLING_ACCOUNT);
    assert!(!result.is_account_resolved());
}

#[test]
fn test_rewriting_twice_is_identity() {
    let rewriter = default_rewriter();
    let once = rewriter.rewrite_path(BACKFILL_PATH, &DataHints::default());
    let twice = rewriter.rewrite_path(&once.path(), &DataHints::default());
    assert_eq!(twice.path(), once.path());
}

#[test]
fn test_prefix_is_not_applied_twice_with_data_hints() {
    let rewriter = default_rewriter();
    let hints = DataHints::from_billing_field(
        "/providers/Microsoft.Billing/billingAccounts/ACCT123:abc_2019-05-31/billingProfiles/ProfileA",
    );
    let once = rewriter.rewrite_path(BACKFILL_PATH, &hints);
    let twice = rewriter.rewrite_path(&once.path(), &hints);
    assert_eq!(
        twice.path(),
        "gds-focus-v1/billing_period=20250601/ACCT123_ProfileA_part_0_0001.parquet"
    );
}

#[test]
fn test_data_hints_win_over_path_hints() {
    let hints = DataHints {
        billing_account: Some("DATAACCT".to_string()),
        billing_profile: Some("DataProfile".to_string()),
    };
    let result = default_rewriter().rewrite_path(BACKFILL_PATH, &hints);
    assert_eq!(result.account_source, AccountSource::Data);
    assert_eq!(
        result.path(),
        "gds-focus-v1/billing_period=20250601/DATAACCT_DataProfile_part_0_0001.parquet"
    );
}

#[test]
fn test_export_index_mapping_is_last_resort() {
    let config = RewriteConfig {
        export_index_accounts: BTreeMap::from([(2, "MAPPED".to_string())]),
        ..RewriteConfig::default()
    };
    let rewriter = PathRewriter::new(&config);

    let path = "gds-focus-v1/focus-daily-cost-export-2/20250801-20250831/part_0_0001.parquet";
    let result = rewriter.rewrite_path(path, &DataHints::default());
    assert_eq!(result.account_source, AccountSource::ExportIndex);
    assert_eq!(
        result.path(),
        "gds-focus-v1/billing_period=20250801/MAPPED_part_0_0001.parquet"
    );

    let unmapped = "gds-focus-v1/focus-daily-cost-export-5/20250801-20250831/part_0_0001.parquet";
    let result = rewriter.rewrite_path(unmapped, &DataHints::default());
    assert_eq!(result.account_source, AccountSource::Unresolved);
    assert_eq!(
        result.path(),
        "gds-focus-v1/billing_period=20250801/part_0_0001.parquet"
    );
}

#[test]
fn test_profile_without_account_uses_sentinel_prefix() {
    let path = "gds-focus-v1/20250801-20250831/billingProfiles/ProfileB/part_0_0001.parquet";
    let result = default_rewriter().rewrite_path(path, &DataHints::default());
    assert_eq!(result.account_source, AccountSource::Unresolved);
    assert_eq!(
        result.path(),
        "gds-focus-v1/billing_period=20250801/unknown-billing-account_ProfileB_part_0_0001.parquet"
    );
}

#[test]
fn test_anchor_before_file_name_keeps_the_file() {
    let rewriter = default_rewriter();

    let profile_path = "gds-focus-v1/20250801-20250831/billingProfiles/part_0_0001.parquet";
    let result = rewriter.rewrite_path(profile_path, &DataHints::default());
    assert_eq!(
        result.path(),
        "gds-focus-v1/billing_period=20250801/billingProfiles/part_0_0001.parquet"
    );
    assert_eq!(result.billing_profile, None);

    let providers_path = "providers/Microsoft.Billing/billingAccounts/part_0_0001.parquet";
    let result = rewriter.rewrite_path(providers_path, &DataHints::default());
    assert_eq!(
        result.path(),
        "providers/Microsoft.Billing/billingAccounts/part_0_0001.parquet"
    );
    assert_eq!(result.account_source, AccountSource::Unresolved);
}

#[test]
fn test_dropped_final_segment_is_not_prefixed() {
    let path = "providers/Microsoft.Billing/billingAccounts/ACCT123/reports/0b3c9a4e-2f7d-4c61-9a0b-5d1e8f7a6c21";
    let result = default_rewriter().rewrite_path(path, &DataHints::default());
    assert_eq!(result.path(), "reports");
    assert_eq!(result.billing_account_folder, "ACCT123");
}

#[test]
fn test_empty_and_separator_only_paths() {
    let rewriter = default_rewriter();
    for path in ["", "/", "//"] {
        let result = rewriter.rewrite_path(path, &DataHints::default());
        assert!(result.segments.is_empty(), "{path:?}");
        assert_eq!(result.billing_account_folder, UNKNOWN_BILLING_ACCOUNT);
    }
    let empty: [&str; 0] = [];
    assert!(rewriter
        .rewrite(&empty, &DataHints::default())
        .segments
        .is_empty());
}

#[test]
fn test_duplicate_separators_are_ignored() {
    let path = "gds-focus-v1//20250801-20250831///part_0_0001.parquet";
    let result = default_rewriter().rewrite_path(path, &DataHints::default());
    assert_eq!(
        result.path(),
        "gds-focus-v1/billing_period=20250801/part_0_0001.parquet"
    );
}

#[test]
fn test_date_range_rewritten_regardless_of_neighbours() {
    let rewriter = default_rewriter();
    for path in [
        "20250801-20250831",
        "a/20250801-20250831",
        "20250801-20250831/b",
        "focus-backfill/20250801-20250831/202508131031",
    ] {
        let result = rewriter.rewrite_path(path, &DataHints::default());
        assert!(
            result.segments.contains(&"billing_period=20250801".to_string()),
            "{path}: {:?}",
            result.segments
        );
    }
}

#[test]
fn test_billing_field_parsing() {
    let hints = DataHints::from_billing_field(
        "/providers/Microsoft.Billing/billingAccounts/1234:5678_2019-05-31/billingProfiles/ABCD-EFGH",
    );
    assert_eq!(hints.billing_account.as_deref(), Some("1234"));
    assert_eq!(hints.billing_profile.as_deref(), Some("ABCD-EFGH"));

    let account_only =
        DataHints::from_billing_field("/providers/Microsoft.Billing/billingAccounts/1234");
    assert_eq!(account_only.billing_account.as_deref(), Some("1234"));
    assert_eq!(account_only.billing_profile, None);

    assert_eq!(DataHints::from_billing_field(""), DataHints::default());
}
