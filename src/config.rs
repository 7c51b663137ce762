//! Planguard configuration
//!
//! Loaded from TOML at startup, falls back to defaults if no config file
//! exists. `PLANGUARD_*` environment variables override the file.

use planguard_agent::RepairConfig;
use planguard_llm::BrainClient;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_FILE: &str = "planguard.toml";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlanguardConfig {
    /// Brain service connection.
    pub reasoner: ReasonerConfig,
    /// Repair loop budget.
    pub repair: RepairSettings,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ReasonerConfig {
    pub base_url: String,
    /// Per-call timeout, also used as the HTTP client timeout.
    pub timeout_secs: u64,
    /// Passed through to the brain's model selection.
    pub optimization: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

impl Default for ReasonerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5070".to_string(),
            timeout_secs: 30,
            optimization: "accuracy".to_string(),
            auth_token: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RepairSettings {
    pub max_retries: u32,
}

impl Default for RepairSettings {
    fn default() -> Self {
        Self {
            max_retries: planguard_agent::repair::DEFAULT_MAX_RETRIES,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
    /// Directory for daily rolling log files. Stderr only when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "planguard=info".to_string(),
            log_dir: None,
        }
    }
}

impl PlanguardConfig {
    /// Load config from a TOML file. Returns defaults if the file doesn't exist
    /// or fails to parse.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}, using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!("No config at {}, using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Apply `PLANGUARD_*` overrides from the process environment.
    pub fn with_env(self) -> Self {
        self.with_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides read through `get`. Unparseable numbers are ignored.
    pub fn with_env_from(mut self, get: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = get("PLANGUARD_BRAIN_URL").filter(|v| !v.is_empty()) {
            self.reasoner.base_url = url;
        }
        if let Some(token) = get("PLANGUARD_AUTH_TOKEN").filter(|v| !v.is_empty()) {
            self.reasoner.auth_token = Some(token);
        }
        if let Some(raw) = get("PLANGUARD_MAX_RETRIES") {
            match raw.trim().parse() {
                Ok(n) => self.repair.max_retries = n,
                Err(_) => tracing::warn!("Ignoring PLANGUARD_MAX_RETRIES={}", raw),
            }
        }
        if let Some(raw) = get("PLANGUARD_TIMEOUT_SECS") {
            match raw.trim().parse() {
                Ok(n) => self.reasoner.timeout_secs = n,
                Err(_) => tracing::warn!("Ignoring PLANGUARD_TIMEOUT_SECS={}", raw),
            }
        }
        self
    }

    /// Write the current config as TOML.
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.reasoner.timeout_secs.max(1))
    }

    pub fn repair_config(&self) -> RepairConfig {
        RepairConfig::default()
            .with_max_retries(self.repair.max_retries)
            .with_call_timeout(self.call_timeout())
    }

    pub fn brain_client(&self) -> BrainClient {
        let client = BrainClient::new(&self.reasoner.base_url)
            .with_timeout(self.call_timeout())
            .with_optimization(&self.reasoner.optimization);
        match &self.reasoner.auth_token {
            Some(token) => client.with_auth_token(token),
            None => client,
        }
    }
}
