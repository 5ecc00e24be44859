//! Configuration module for Dockhand
//!
//! Supports configuration via:
//! - Built-in defaults (the operation budgets below)
//! - TOML/YAML/JSON config files
//! - Environment variables (with DOCKHAND__ prefix)

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DockhandConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Docker daemon address (`unix:///var/run/docker.sock`, `tcp://host:2375`).
    /// Falls back to `DOCKER_HOST` and the platform socket when unset.
    #[serde(default)]
    pub docker_host: Option<String>,

    /// Per-operation time budgets
    #[serde(default)]
    pub timeouts: Timeouts,
}

/// Time budget of each session operation, in milliseconds.
///
/// Budgets are independent: an operation that calls another (pull checks
/// presence first) spends each sub-step's own budget.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Timeouts {
    /// Covers version negotiation and the ping together
    #[serde(default = "default_connect_ms")]
    pub connect_ms: u64,

    #[serde(default = "default_image_verify_ms")]
    pub image_verify_ms: u64,

    /// Bandwidth-bound, so much longer than the rest
    #[serde(default = "default_pull_ms")]
    pub pull_ms: u64,

    #[serde(default = "default_create_ms")]
    pub create_ms: u64,

    /// Covers the start call and waiting for the running state
    #[serde(default = "default_start_ms")]
    pub start_ms: u64,

    #[serde(default = "default_start_poll_interval_ms")]
    pub start_poll_interval_ms: u64,

    #[serde(default = "default_inspect_ms")]
    pub inspect_ms: u64,

    #[serde(default = "default_remove_container_ms")]
    pub remove_container_ms: u64,

    #[serde(default = "default_remove_image_ms")]
    pub remove_image_ms: u64,
}

// Default value functions
fn default_log_level() -> String {
    "info".to_string()
}

fn default_connect_ms() -> u64 {
    10_000
}

fn default_image_verify_ms() -> u64 {
    10_000
}

fn default_pull_ms() -> u64 {
    60_000
}

fn default_create_ms() -> u64 {
    10_000
}

fn default_start_ms() -> u64 {
    10_000
}

fn default_start_poll_interval_ms() -> u64 {
    100
}

fn default_inspect_ms() -> u64 {
    10_000
}

fn default_remove_container_ms() -> u64 {
    10_000
}

fn default_remove_image_ms() -> u64 {
    10_000
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            connect_ms: default_connect_ms(),
            image_verify_ms: default_image_verify_ms(),
            pull_ms: default_pull_ms(),
            create_ms: default_create_ms(),
            start_ms: default_start_ms(),
            start_poll_interval_ms: default_start_poll_interval_ms(),
            inspect_ms: default_inspect_ms(),
            remove_container_ms: default_remove_container_ms(),
            remove_image_ms: default_remove_image_ms(),
        }
    }
}

impl Timeouts {
    pub fn connect(&self) -> Duration {
        Duration::from_millis(self.connect_ms)
    }

    pub fn image_verify(&self) -> Duration {
        Duration::from_millis(self.image_verify_ms)
    }

    pub fn pull(&self) -> Duration {
        Duration::from_millis(self.pull_ms)
    }

    pub fn create(&self) -> Duration {
        Duration::from_millis(self.create_ms)
    }

    pub fn start(&self) -> Duration {
        Duration::from_millis(self.start_ms)
    }

    pub fn start_poll_interval(&self) -> Duration {
        Duration::from_millis(self.start_poll_interval_ms)
    }

    pub fn inspect(&self) -> Duration {
        Duration::from_millis(self.inspect_ms)
    }

    pub fn remove_container(&self) -> Duration {
        Duration::from_millis(self.remove_container_ms)
    }

    pub fn remove_image(&self) -> Duration {
        Duration::from_millis(self.remove_image_ms)
    }

    /// Validate budget values
    pub fn validate(&self) -> Result<()> {
        let budgets = [
            ("connect", self.connect_ms),
            ("image_verify", self.image_verify_ms),
            ("pull", self.pull_ms),
            ("create", self.create_ms),
            ("start", self.start_ms),
            ("start_poll_interval", self.start_poll_interval_ms),
            ("inspect", self.inspect_ms),
            ("remove_container", self.remove_container_ms),
            ("remove_image", self.remove_image_ms),
        ];
        for (name, value) in budgets {
            if value == 0 {
                anyhow::bail!("{} timeout cannot be 0", name);
            }
        }

        if self.start_poll_interval_ms >= self.start_ms {
            anyhow::bail!("Start poll interval must be shorter than the start timeout");
        }

        Ok(())
    }
}

impl Default for DockhandConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            docker_host: None,
            timeouts: Timeouts::default(),
        }
    }
}

impl DockhandConfig {
    /// Load configuration from file and environment variables
    pub fn load() -> Result<Self> {
        // Try to load .env file if present
        let _ = dotenvy::dotenv();

        let config = config::Config::builder()
            .add_source(config::Config::try_from(&DockhandConfig::default())?)
            .add_source(config::File::with_name("config/dockhand").required(false))
            // Override with environment variables (DOCKHAND__TIMEOUTS__PULL_MS=...)
            .add_source(
                config::Environment::with_prefix("DOCKHAND")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        Self::finish(config)
    }

    /// Load a single config file over the defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Config::try_from(&DockhandConfig::default())?)
            .add_source(config::File::from(path))
            .build()
            .with_context(|| format!("Failed to read configuration from {}", path.display()))?;

        Self::finish(config)
    }

    fn finish(config: config::Config) -> Result<Self> {
        let dockhand_config: DockhandConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        dockhand_config.validate()?;

        Ok(dockhand_config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        self.timeouts.validate().context("Invalid timeouts")?;

        if let Some(host) = &self.docker_host {
            if host.trim().is_empty() {
                anyhow::bail!("docker_host cannot be empty");
            }
        }

        Ok(())
    }
}
