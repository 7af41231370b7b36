use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::provisioning::ProgressConfig;

/// Main configuration structure for the provisioner
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProvisionerConfig {
    /// Backend API settings
    pub backend: BackendConfig,
    /// Saga behaviour settings
    pub provisioning: ProvisioningConfig,
    /// Observability settings
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Base URL of the backend API
    pub base_url: String,
    /// Bearer token for the backend (can be set via env var)
    pub api_token: Option<String>,
    /// Sustained request rate towards the backend
    pub requests_per_second: u32,
    /// Burst capacity
    pub burst_capacity: u32,
    /// How long an integration listing stays cached
    pub listing_cache_ttl_seconds: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProvisioningConfig {
    /// Public URL providers deliver webhook events to
    pub webhook_url: String,
    /// Interval between simulated progress ticks
    pub progress_tick_millis: u64,
    /// Ticks a pending step must show before it counts as done
    pub progress_max_ticks: u32,
    /// Title prefix of throwaway test issues
    pub test_issue_prefix: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level
    pub log_level: String,
    /// Emit JSON lines instead of human-readable logs
    pub json_logs: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            api_token: None, // Read from PROVISIONER_BACKEND__API_TOKEN
            requests_per_second: 5,
            burst_capacity: 10,
            listing_cache_ttl_seconds: 60,
        }
    }
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            webhook_url: "http://localhost:8000/hook".to_string(),
            progress_tick_millis: 5,
            progress_max_ticks: 200,
            test_issue_prefix: "Fogbender test".to_string(),
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::default(),
            provisioning: ProvisioningConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

impl ProvisioningConfig {
    pub fn progress(&self) -> ProgressConfig {
        ProgressConfig {
            tick_interval: Duration::from_millis(self.progress_tick_millis),
            max_ticks: self.progress_max_ticks,
        }
    }
}

impl ProvisionerConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration files (provisioner.toml, .provisioner-rc)
    /// 3. Environment variables (prefixed with PROVISIONER_, sections split by `__`)
    pub fn load() -> Result<Self> {
        let mut builder = Config::builder();

        if Path::new("provisioner.toml").exists() {
            builder = builder.add_source(File::with_name("provisioner"));
        }

        if Path::new(".provisioner-rc").exists() {
            builder = builder.add_source(
                File::with_name(".provisioner-rc").format(config::FileFormat::Toml),
            );
        }

        builder = builder.add_source(
            Environment::with_prefix("PROVISIONER")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        let provisioner_config: ProvisionerConfig = config.try_deserialize()?;

        Ok(provisioner_config)
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<ProvisionerConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        let _ = ProvisionerConfig::load_env_file();
        ProvisionerConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static ProvisionerConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}
