//! Report exports pulled from the management API: advisor cost recommendations
//! and monthly carbon emissions, including the historical carbon backfill.

use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::backfill::{plan, ApiWindow, MonthPlan, YearMonth, DEFAULT_BACKFILL_START};
use crate::contract::{AdvisorApi, CarbonApi, LakeWriter, SubscriptionDirectory};
use crate::export::ExportError;
use crate::fanout::{fan_out, with_deadline};
use crate::paths::{carbon_key, recommendations_key};
use crate::scope::{ResolutionWarning, ScopeResolver};

pub const PLACEHOLDER_NOTE: &str = "Data not available via API for this period";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecommendationsConfig {
    #[serde(default = "default_recommendations_prefix")]
    pub lake_prefix: String,
}

fn default_recommendations_prefix() -> String {
    "recommendations".to_string()
}

impl Default for RecommendationsConfig {
    fn default() -> Self {
        Self {
            lake_prefix: default_recommendations_prefix(),
        }
    }
}

/// Remote-call limits shared by the report exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallLimits {
    pub concurrency: usize,
    pub call_timeout: Duration,
}

#[derive(Debug, Default)]
pub struct RecommendationsReport {
    pub subscriptions: usize,
    pub succeeded: usize,
    pub failed: Vec<(String, String)>,
    pub recommendations: usize,
    pub lake_path: Option<String>,
    pub warning: Option<ResolutionWarning>,
}

/// Resolves `scope`, collects cost recommendations for every subscription in
/// it and writes them as one `{"value": [...]}` document for `run_date`.
///
/// Nothing is written when the scope is empty or no recommendations came back.
pub async fn export_recommendations<D, A, L>(
    scope: &str,
    run_date: NaiveDate,
    config: &RecommendationsConfig,
    limits: CallLimits,
    directory: &D,
    advisor: &A,
    lake: &L,
) -> Result<RecommendationsReport, ExportError>
where
    D: SubscriptionDirectory + ?Sized,
    A: AdvisorApi + ?Sized,
    L: LakeWriter + ?Sized,
{
    let resolution = ScopeResolver::new(directory, limits.call_timeout)
        .resolve(scope)
        .await;
    let mut report = RecommendationsReport {
        subscriptions: resolution.subscription_ids.len(),
        warning: resolution.warning.clone(),
        ..Default::default()
    };
    if resolution.subscription_ids.is_empty() {
        warn!(scope, "[RECS] No subscriptions to query, nothing exported");
        return Ok(report);
    }

    info!(
        subscriptions = report.subscriptions,
        concurrency = limits.concurrency,
        "[RECS] Fetching cost recommendations"
    );
    let units: Vec<String> = resolution.subscription_ids.into_iter().collect();
    let outcome = fan_out(units, limits.concurrency, limits.call_timeout, move |id| async move {
        advisor.list_cost_recommendations(&id).await
    })
    .await;

    report.succeeded = outcome.succeeded.len();
    report.failed = outcome.failed;
    let mut all = Vec::new();
    for (subscription_id, recommendations) in outcome.succeeded {
        info!(
            subscription_id = %subscription_id,
            count = recommendations.len(),
            "[RECS] Collected recommendations"
        );
        all.extend(
            recommendations
                .into_iter()
                .map(|rec| tag_subscription(rec, &subscription_id)),
        );
    }
    report.recommendations = all.len();

    if all.is_empty() {
        warn!(
            succeeded = report.succeeded,
            failed = report.failed.len(),
            "[RECS] No recommendations found, nothing exported"
        );
        return Ok(report);
    }

    let path = recommendations_key(&config.lake_prefix, run_date);
    write_json(lake, &path, &json!({ "value": all }), "recommendations").await?;
    info!(
        path = %path,
        recommendations = report.recommendations,
        succeeded = report.succeeded,
        failed = report.failed.len(),
        "[RECS] Exported cost recommendations"
    );
    report.lake_path = Some(path);
    Ok(report)
}

/// Adds `subscriptionId` to an object record. Non-object records are kept as-is.
fn tag_subscription(mut record: Value, subscription_id: &str) -> Value {
    if let Value::Object(fields) = &mut record {
        fields.insert(
            "subscriptionId".to_string(),
            Value::String(subscription_id.to_string()),
        );
    }
    record
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CarbonConfig {
    #[serde(default = "default_carbon_prefix")]
    pub lake_prefix: String,
    #[serde(default = "default_carbon_directory")]
    pub directory: String,
    #[serde(default = "default_backfill_start")]
    pub backfill_start: YearMonth,
    #[serde(default)]
    pub api_window: ApiWindow,
}

fn default_carbon_prefix() -> String {
    "carbon".to_string()
}

fn default_carbon_directory() -> String {
    "gds-carbon-v1".to_string()
}

fn default_backfill_start() -> YearMonth {
    DEFAULT_BACKFILL_START
}

impl Default for CarbonConfig {
    fn default() -> Self {
        Self {
            lake_prefix: default_carbon_prefix(),
            directory: default_carbon_directory(),
            backfill_start: default_backfill_start(),
            api_window: ApiWindow::default(),
        }
    }
}

/// Zero-valued record standing in for a month the API cannot serve.
pub fn placeholder_record(month: YearMonth) -> Value {
    json!({
        "value": [{
            "dataType": "MonthlySummaryData",
            "date": month.first_day().format("%Y-%m-%d").to_string(),
            "carbonIntensity": 0.0,
            "latestMonthEmissions": 0.0,
            "previousMonthEmissions": 0.0,
            "monthOverMonthEmissionsChangeRatio": 0.0,
            "monthlyEmissionsChangeValue": 0.0,
            "note": PLACEHOLDER_NOTE,
        }]
    })
}

/// The month a scheduled run exports: the month before `run_date`, clamped
/// into the API window.
pub fn monthly_target(run_date: NaiveDate, window: &ApiWindow) -> YearMonth {
    window.clamp(YearMonth::from_date(run_date).previous())
}

/// Fetches and writes one month of emissions. Returns the lake path.
pub async fn export_carbon_month<C, L>(
    month: YearMonth,
    subscription_ids: &[String],
    config: &CarbonConfig,
    call_timeout: Duration,
    carbon: &C,
    lake: &L,
) -> Result<String, ExportError>
where
    C: CarbonApi + ?Sized,
    L: LakeWriter + ?Sized,
{
    info!(
        month = %month,
        subscriptions = subscription_ids.len(),
        "[CARBON] Requesting monthly summary"
    );
    let report = with_deadline(call_timeout, carbon.monthly_summary(subscription_ids, month))
        .await
        .map_err(|e| ExportError::Remote {
            what: format!("carbon emissions for {month}"),
            source: e,
        })?;
    let path = carbon_key(&config.lake_prefix, &config.directory, month);
    write_json(lake, &path, &report, "carbon emissions").await?;
    info!(month = %month, path = %path, "[CARBON] Exported monthly summary");
    Ok(path)
}

#[derive(Debug, Default)]
pub struct BackfillReport {
    pub placeholders: usize,
    pub fetched: usize,
    /// Month and failure message of every in-window month that could not be fetched.
    pub failed: Vec<(YearMonth, String)>,
}

/// Executes the month plan from `config.backfill_start` to the end of the API
/// window. A failed API call is recorded and the run continues; a failed write
/// aborts it.
pub async fn backfill_carbon<C, L>(
    subscription_ids: &[String],
    config: &CarbonConfig,
    call_timeout: Duration,
    carbon: &C,
    lake: &L,
) -> Result<BackfillReport, ExportError>
where
    C: CarbonApi + ?Sized,
    L: LakeWriter + ?Sized,
{
    let month_plan: MonthPlan = plan(config.backfill_start, &config.api_window);
    info!(
        months = month_plan.len(),
        placeholders = month_plan.out_of_window_count(),
        live = month_plan.in_window_count(),
        "[BACKFILL] Starting carbon backfill"
    );

    let mut report = BackfillReport::default();
    for planned in &month_plan.months {
        let month = planned.month;
        let path = carbon_key(&config.lake_prefix, &config.directory, month);
        if !planned.in_window {
            write_json(lake, &path, &placeholder_record(month), "carbon placeholder").await?;
            report.placeholders += 1;
            continue;
        }
        match with_deadline(call_timeout, carbon.monthly_summary(subscription_ids, month)).await {
            Ok(data) => {
                write_json(lake, &path, &data, "carbon emissions").await?;
                report.fetched += 1;
                info!(month = %month, "[BACKFILL] Fetched month");
            }
            Err(e) => {
                error!(month = %month, error = %e, "[BACKFILL][ERROR] API request failed");
                report.failed.push((month, e.to_string()));
            }
        }
    }

    info!(
        placeholders = report.placeholders,
        fetched = report.fetched,
        failed = report.failed.len(),
        "[BACKFILL] Carbon backfill completed"
    );
    Ok(report)
}

async fn write_json<L>(lake: &L, path: &str, value: &Value, what: &str) -> Result<(), ExportError>
where
    L: LakeWriter + ?Sized,
{
    let body = serde_json::to_vec_pretty(value).map_err(|e| ExportError::Encode {
        what: what.to_string(),
        source: e,
    })?;
    lake.put(path, body).await.map_err(|e| ExportError::Write {
        path: path.to_string(),
        source: e,
    })
}
