use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::export::BlobExportConfig;
use crate::reports::{CallLimits, CarbonConfig, RecommendationsConfig};
use crate::rewrite::RewriteConfig;

/// Pipeline settings shared by every export command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportConfig {
    #[serde(default)]
    pub rewrite: RewriteConfig,
    #[serde(default = "BlobExportConfig::cost_defaults")]
    pub cost: BlobExportConfig,
    #[serde(default = "BlobExportConfig::utilization_defaults")]
    pub utilization: BlobExportConfig,
    #[serde(default)]
    pub scope: ScopeConfig,
    #[serde(default)]
    pub recommendations: RecommendationsConfig,
    #[serde(default)]
    pub carbon: CarbonConfig,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            rewrite: RewriteConfig::default(),
            cost: BlobExportConfig::cost_defaults(),
            utilization: BlobExportConfig::utilization_defaults(),
            scope: ScopeConfig::default(),
            recommendations: RecommendationsConfig::default(),
            carbon: CarbonConfig::default(),
        }
    }
}

impl ExportConfig {
    pub fn trace_loaded(&self) {
        info!(
            export_markers = self.rewrite.export_markers.len(),
            export_index_accounts = self.rewrite.export_index_accounts.len(),
            cost_container = %self.cost.container,
            utilization_container = %self.utilization.container,
            billing_scope = self.scope.billing_scope.as_deref().unwrap_or("<unset>"),
            carbon_window_start = %self.carbon.api_window.start(),
            carbon_window_end = %self.carbon.api_window.end(),
            "Loaded ExportConfig"
        );
        debug!(?self, "ExportConfig loaded (full debug)");
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeConfig {
    /// Billing account, management group or subscription scope string.
    #[serde(default)]
    pub billing_scope: Option<String>,
    /// Maximum concurrent per-subscription calls.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Deadline for a single remote call, in seconds.
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
}

fn default_concurrency() -> usize {
    8
}

fn default_call_timeout_secs() -> u64 {
    300
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            billing_scope: None,
            concurrency: default_concurrency(),
            call_timeout_secs: default_call_timeout_secs(),
        }
    }
}

impl ScopeConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    pub fn limits(&self) -> CallLimits {
        CallLimits {
            concurrency: self.concurrency.max(1),
            call_timeout: self.call_timeout(),
        }
    }
}
