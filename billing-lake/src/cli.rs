/// # billing-lake CLI
///
/// Command parsing and orchestration for the exporter. All export logic lives
/// in `billing-lake-core`; this module wires the configured stores and the
/// management API client into it.
///
/// ## Commands
/// - `process-cost` / `process-utilization`: move one exported blob into the lake
/// - `export-recommendations`: advisor cost recommendations for the billing scope
/// - `export-carbon`: last month's emissions report
/// - `backfill-carbon`: historical emissions, placeholders before the API window
/// - `resolve-scope`: print the subscriptions a billing scope covers
/// - `rewrite-path`: print the lake path an export path would be written to
///
/// For programmatic and integration use, call [`run`] with a constructed [`Cli`].
use crate::arm::ArmClient;
use crate::load_config::{load_config, CliConfig};
use crate::storage::FsObjectStore;
use anyhow::{Context, Result};
use billing_lake_core::backfill::plan;
use billing_lake_core::config::ExportConfig;
use billing_lake_core::contract::{FixedBillingField, ObjectTransform, Passthrough};
use billing_lake_core::export::{process_blob_event, BlobExportConfig, ProcessOutcome};
use billing_lake_core::notification::{parse_blob_event, BlobEvent};
use billing_lake_core::reports::{
    backfill_carbon, export_carbon_month, export_recommendations, monthly_target,
};
use billing_lake_core::rewrite::{DataHints, PathRewriter};
use billing_lake_core::scope::ScopeResolver;
use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;

/// CLI for billing-lake: export billing platform data into a partitioned data lake.
#[derive(Parser)]
#[clap(
    name = "billing-lake",
    version,
    about = "Export cost, utilization, carbon and advisor data into a partitioned data lake"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

/// Which blob a processing command should pick up.
#[derive(Args, Debug, Clone)]
pub struct BlobSelector {
    /// File holding a blob-created queue message
    #[clap(long, conflicts_with = "blob", required_unless_present = "blob")]
    pub event: Option<PathBuf>,
    /// Blob name inside the configured container
    #[clap(long)]
    pub blob: Option<String>,
    /// Billing-account field of the dataset, when known
    #[clap(long)]
    pub billing_field: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Move one cost export (.parquet) into the lake
    ProcessCost {
        #[clap(long)]
        config: PathBuf,
        #[clap(flatten)]
        selector: BlobSelector,
    },
    /// Move one utilization export (.csv.gz) into the lake
    ProcessUtilization {
        #[clap(long)]
        config: PathBuf,
        #[clap(flatten)]
        selector: BlobSelector,
    },
    /// Export advisor cost recommendations for every subscription in the billing scope
    ExportRecommendations {
        #[clap(long)]
        config: PathBuf,
        /// Run date (YYYY-MM-DD); defaults to today (UTC)
        #[clap(long)]
        date: Option<NaiveDate>,
    },
    /// Export the previous month's carbon emissions report
    ExportCarbon {
        #[clap(long)]
        config: PathBuf,
        /// Run date (YYYY-MM-DD); defaults to today (UTC)
        #[clap(long)]
        date: Option<NaiveDate>,
    },
    /// Backfill carbon emissions from the configured start month
    BackfillCarbon {
        #[clap(long)]
        config: PathBuf,
        /// Print the month plan without calling the API or writing
        #[clap(long)]
        dry_run: bool,
    },
    /// Print the subscriptions covered by the billing scope
    ResolveScope {
        #[clap(long)]
        config: PathBuf,
        /// Scope to resolve instead of the configured one
        #[clap(long)]
        scope: Option<String>,
    },
    /// Print the lake path an export path is rewritten to
    RewritePath {
        path: String,
        #[clap(long)]
        billing_field: Option<String>,
        /// Config providing export markers and export-index accounts
        #[clap(long)]
        config: Option<PathBuf>,
    },
}

/// Async CLI entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    match cli.command {
        Commands::ProcessCost { config, selector } => {
            let config = load_config(config)?;
            let blob_config = config.export.cost.clone();
            process_blob(&config, &blob_config, &selector, "process-cost").await
        }
        Commands::ProcessUtilization { config, selector } => {
            let config = load_config(config)?;
            let blob_config = config.export.utilization.clone();
            process_blob(&config, &blob_config, &selector, "process-utilization").await
        }
        Commands::ExportRecommendations { config, date } => {
            let config = load_config(config)?;
            let scope = config.billing_scope()?;
            let limits = config.export.scope.limits();
            let client = arm_client(&config)?;
            let lake = FsObjectStore::new(&config.storage.lake_root);
            let run_date = date.unwrap_or_else(|| Utc::now().date_naive());

            let report = export_recommendations(
                scope,
                run_date,
                &config.export.recommendations,
                limits,
                &client,
                &client,
                &lake,
            )
            .await?;
            tracing::info!(
                command = "export-recommendations",
                subscriptions = report.subscriptions,
                succeeded = report.succeeded,
                failed = report.failed.len(),
                recommendations = report.recommendations,
                "Recommendations export complete"
            );
            print_json(&json!({
                "subscriptions": report.subscriptions,
                "succeeded": report.succeeded,
                "failed": report.failed.iter().map(|(id, e)| json!({"subscriptionId": id, "error": e})).collect::<Vec<_>>(),
                "recommendations": report.recommendations,
                "path": report.lake_path,
                "warning": report.warning.map(|w| w.to_string()),
            }))
        }
        Commands::ExportCarbon { config, date } => {
            let config = load_config(config)?;
            let client = arm_client(&config)?;
            let subscription_ids = resolve_subscriptions(&config, &client).await?;
            let run_date = date.unwrap_or_else(|| Utc::now().date_naive());
            let month = monthly_target(run_date, &config.export.carbon.api_window);
            let lake = FsObjectStore::new(&config.storage.lake_root);

            let path = export_carbon_month(
                month,
                &subscription_ids,
                &config.export.carbon,
                config.export.scope.call_timeout(),
                &client,
                &lake,
            )
            .await?;
            tracing::info!(command = "export-carbon", month = %month, path = %path, "Carbon export complete");
            print_json(&json!({ "month": month, "path": path }))
        }
        Commands::BackfillCarbon { config, dry_run } => {
            let config = load_config(config)?;
            let carbon = &config.export.carbon;
            if dry_run {
                let month_plan = plan(carbon.backfill_start, &carbon.api_window);
                tracing::info!(
                    command = "backfill-carbon",
                    months = month_plan.len(),
                    placeholders = month_plan.out_of_window_count(),
                    live = month_plan.in_window_count(),
                    "Dry run, nothing written"
                );
                return print_json(&json!(month_plan));
            }

            let client = arm_client(&config)?;
            let subscription_ids = resolve_subscriptions(&config, &client).await?;
            let lake = FsObjectStore::new(&config.storage.lake_root);
            let report = backfill_carbon(
                &subscription_ids,
                carbon,
                config.export.scope.call_timeout(),
                &client,
                &lake,
            )
            .await?;
            print_json(&json!({
                "placeholders": report.placeholders,
                "fetched": report.fetched,
                "failed": report.failed.iter().map(|(m, e)| json!({"month": m, "error": e})).collect::<Vec<_>>(),
            }))
        }
        Commands::ResolveScope { config, scope } => {
            let mut config = load_config(config)?;
            if let Some(scope) = scope {
                config.export.scope.billing_scope = Some(scope);
            }
            let client = arm_client(&config)?;
            let subscription_ids = resolve_subscriptions(&config, &client).await?;
            print_json(&json!(subscription_ids))
        }
        Commands::RewritePath {
            path,
            billing_field,
            config,
        } => {
            let export = match config {
                Some(config) => load_config(config)?.export,
                None => ExportConfig::default(),
            };
            let hints = billing_field
                .as_deref()
                .map(DataHints::from_billing_field)
                .unwrap_or_default();
            let result = PathRewriter::new(&export.rewrite).rewrite_path(&path, &hints);
            print_json(&json!({
                "path": result.path(),
                "billingAccountFolder": result.billing_account_folder,
                "billingProfile": result.billing_profile,
                "accountSource": result.account_source,
            }))
        }
    }
}

async fn process_blob(
    config: &CliConfig,
    blob_config: &BlobExportConfig,
    selector: &BlobSelector,
    command: &str,
) -> Result<()> {
    let event = match (&selector.event, &selector.blob) {
        (Some(event_file), _) => {
            let body = std::fs::read_to_string(event_file)
                .with_context(|| format!("Failed to read event file {event_file:?}"))?;
            parse_blob_event(&body).context("Invalid blob event")?
        }
        (None, Some(blob)) => BlobEvent {
            container: blob_config.container.clone(),
            blob_name: blob.clone(),
        },
        (None, None) => anyhow::bail!("either --event or --blob is required"),
    };

    let source = FsObjectStore::new(&config.storage.source_root);
    let lake = FsObjectStore::new(&config.storage.lake_root);
    let rewriter = PathRewriter::new(&config.export.rewrite);
    let transform: Box<dyn ObjectTransform> = match &selector.billing_field {
        Some(field) => Box::new(FixedBillingField(field.clone())),
        None => Box::new(Passthrough),
    };

    let outcome =
        process_blob_event(&event, blob_config, &rewriter, &source, &lake, transform.as_ref())
            .await?;
    match outcome {
        ProcessOutcome::Skipped(reason) => {
            tracing::info!(command, blob = %event.blob_name, ?reason, "Blob skipped");
            print_json(&json!({ "skipped": format!("{reason:?}") }))
        }
        ProcessOutcome::Exported(exported) => {
            tracing::info!(command, path = %exported.lake_path, "Blob exported");
            print_json(&json!({
                "path": exported.lake_path,
                "billingAccountFolder": exported.billing_account_folder,
                "accountSource": exported.account_source,
                "bytes": exported.bytes_written,
            }))
        }
    }
}

fn arm_client(config: &CliConfig) -> Result<ArmClient> {
    ArmClient::new_from_env(config.export.scope.call_timeout())
        .map_err(|e| anyhow::anyhow!("Failed to construct management API client: {e}"))
}

/// Resolves the configured billing scope; an empty result is an error for the caller.
async fn resolve_subscriptions(config: &CliConfig, client: &ArmClient) -> Result<Vec<String>> {
    let scope = config.billing_scope()?;
    let resolution = ScopeResolver::new(client, config.export.scope.call_timeout())
        .resolve(scope)
        .await;
    if resolution.subscription_ids.is_empty() {
        let reason = resolution
            .warning
            .map(|w| w.to_string())
            .unwrap_or_else(|| "no subscriptions".to_string());
        anyhow::bail!("billing scope {scope} resolved to no subscriptions: {reason}");
    }
    Ok(resolution.subscription_ids.into_iter().collect())
}

fn print_json(value: &serde_json::Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
