/// `load_config` module: loads the static YAML config and applies environment overrides.
///
/// This is the only place where the user-supplied YAML is parsed into typed
/// structs. The `storage` section is required; every pipeline section has
/// defaults (see [`ExportConfig`]).
///
/// # Environment
/// - `BILLING_SCOPE` overrides `scope.billing_scope` when set and non-empty.
/// - Secrets (`ARM_ACCESS_TOKEN`) are never read from the file; the API client
///   picks them up from the environment.
///
/// # Errors
/// All errors use `anyhow::Error` and are surfaced at the CLI boundary.
use anyhow::Result;
use billing_lake_core::config::ExportConfig;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

pub const BILLING_SCOPE_ENV: &str = "BILLING_SCOPE";

#[derive(Debug, Deserialize)]
pub struct CliConfig {
    pub storage: StorageSection,
    #[serde(flatten)]
    pub export: ExportConfig,
}

/// Local directories standing in for the source store and the lake.
#[derive(Debug, Deserialize)]
pub struct StorageSection {
    /// Root holding one directory per source container.
    pub source_root: PathBuf,
    /// Root the lake keys are written under.
    pub lake_root: PathBuf,
}

impl CliConfig {
    pub fn trace_loaded(&self) {
        info!(
            source_root = %self.storage.source_root.display(),
            lake_root = %self.storage.lake_root.display(),
            "Loaded storage config"
        );
        self.export.trace_loaded();
    }

    /// The billing scope to resolve, or an error naming both places it can come from.
    pub fn billing_scope(&self) -> Result<&str> {
        self.export
            .scope
            .billing_scope
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "no billing scope configured: set scope.billing_scope or {BILLING_SCOPE_ENV}"
                )
            })
    }
}

/// Loads a static YAML config file and applies environment overrides.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<CliConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => content,
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    let mut config: CliConfig = match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            conf
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            return Err(anyhow::anyhow!("Failed to parse config YAML: {e}"));
        }
    };

    if let Ok(scope) = env::var(BILLING_SCOPE_ENV) {
        if !scope.trim().is_empty() {
            info!(env = BILLING_SCOPE_ENV, "Billing scope overridden from environment");
            config.export.scope.billing_scope = Some(scope);
        }
    }

    config.trace_loaded();
    Ok(config)
}
