//! Object keys in the data lake.
//!
//! Layout:
//!
//! ```text
//! <focus prefix>/<rewritten export path>
//! <utilization prefix>/<rewritten export path>
//! <recommendations prefix>/gds-recommendations-v1/billing_period=YYYYMMDD/advisor-cost-recommendations-YYYY-MM-DD.json
//! <carbon prefix>/<carbon directory>/billing_period=YYYYMM01/carbon-emissions-YYYY-MM.json
//! ```

use chrono::NaiveDate;

use crate::backfill::YearMonth;

pub const BILLING_PERIOD_KEY: &str = "billing_period";
pub const RECOMMENDATIONS_DIRECTORY: &str = "gds-recommendations-v1";

/// `billing_period=<yyyymmdd>`.
pub fn billing_period_dir(yyyymmdd: &str) -> String {
    format!("{BILLING_PERIOD_KEY}={yyyymmdd}")
}

/// Joins key parts with `/`, dropping empty parts and stray separators at the joins.
pub fn lake_key<'a, I>(parts: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    parts
        .into_iter()
        .map(|p| p.trim_matches('/'))
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

pub fn recommendations_key(prefix: &str, run_date: NaiveDate) -> String {
    let period = billing_period_dir(&run_date.format("%Y%m%d").to_string());
    let file_name = format!(
        "advisor-cost-recommendations-{}.json",
        run_date.format("%Y-%m-%d")
    );
    lake_key([prefix, RECOMMENDATIONS_DIRECTORY, period.as_str(), file_name.as_str()])
}

pub fn carbon_key(prefix: &str, directory: &str, month: YearMonth) -> String {
    let period = billing_period_dir(&month.billing_period());
    let file_name = format!("carbon-emissions-{month}.json");
    lake_key([prefix, directory, period.as_str(), file_name.as_str()])
}
