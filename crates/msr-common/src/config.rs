//! ---
//! msr_section: "01-shared-foundation"
//! msr_subsection: "module"
//! msr_type: "source"
//! msr_scope: "code"
//! msr_description: "Shared configuration and logging primitives."
//! msr_version: "v0.1.0"
//! msr_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationSeconds};
use tracing::debug;
use url::Url;

use crate::logging::LogFormat;

/// Upper bound for total memory on standard accounts.
pub const STANDARD_MAX_MEMORY_GB: u32 = 360;
/// Upper bound for total memory on elevated (paid) accounts.
pub const ELEVATED_MAX_MEMORY_GB: u32 = 720;

fn default_base_url() -> Url {
    Url::parse("https://api.control-plane.invalid/v1").expect("valid default api base url")
}

fn default_key_id_env() -> String {
    "MSR_API_KEY_ID".to_owned()
}

fn default_key_secret_env() -> String {
    "MSR_API_KEY_SECRET".to_owned()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_poll_timeout() -> Option<Duration> {
    Some(Duration::from_secs(30 * 60))
}

fn default_state_directory() -> PathBuf {
    PathBuf::from("state")
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

/// Primary configuration object for the reconciler tooling.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub poller: PollerConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    pub source: PathBuf,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &str = "MSR_CONFIG";

    /// Load configuration from disk, respecting the `MSR_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(path.clone())?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    fn from_path(path: PathBuf) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<AppConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the reconciler cannot run with.
    pub fn validate(&self) -> Result<()> {
        self.api.validate()?;
        self.poller.validate()?;
        Ok(())
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Connection settings for the remote control plane.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: Url,
    #[serde(default)]
    pub organization_id: String,
    /// Environment variable holding the API key identifier.
    #[serde(default = "default_key_id_env")]
    pub key_id_env: String,
    /// Environment variable holding the API key secret.
    #[serde(default = "default_key_secret_env")]
    pub key_secret_env: String,
    #[serde(default = "default_request_timeout")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub request_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            organization_id: String::new(),
            key_id_env: default_key_id_env(),
            key_secret_env: default_key_secret_env(),
            request_timeout: default_request_timeout(),
        }
    }
}

impl ApiConfig {
    pub fn validate(&self) -> Result<()> {
        if self.organization_id.trim().is_empty() {
            return Err(anyhow!("api.organization_id must be set"));
        }
        if self.request_timeout.is_zero() {
            return Err(anyhow!("api.request_timeout must be greater than zero"));
        }
        Ok(())
    }

    /// Resolve the API key pair from the configured environment variables.
    pub fn credentials(&self) -> Result<(String, String)> {
        let key_id = std::env::var(&self.key_id_env)
            .with_context(|| format!("environment variable {} is not set", self.key_id_env))?;
        let key_secret = std::env::var(&self.key_secret_env)
            .with_context(|| format!("environment variable {} is not set", self.key_secret_env))?;
        Ok((key_id, key_secret))
    }
}

/// Settings for the provisioning wait loop.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollerConfig {
    #[serde(default = "default_poll_interval")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub interval: Duration,
    /// Deadline for a single provisioning wait. `None` or `0` waits indefinitely.
    #[serde(default = "default_poll_timeout")]
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    pub timeout: Option<Duration>,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: default_poll_interval(),
            timeout: default_poll_timeout(),
        }
    }
}

impl PollerConfig {
    /// Effective wait deadline, treating a zero timeout as unbounded.
    pub fn deadline(&self) -> Option<Duration> {
        self.timeout.filter(|timeout| !timeout.is_zero())
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(anyhow!("poller.interval must be greater than zero"));
        }
        if let Some(timeout) = self.deadline() {
            if timeout < self.interval {
                return Err(anyhow!(
                    "poller.timeout ({}s) must not be shorter than poller.interval ({}s)",
                    timeout.as_secs(),
                    self.interval.as_secs()
                ));
            }
        }
        Ok(())
    }
}

/// Account-level limits applied while validating desired specs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct LimitsConfig {
    #[serde(default)]
    pub elevated_account: bool,
}

impl LimitsConfig {
    pub fn max_total_memory_gb(&self) -> u32 {
        if self.elevated_account {
            ELEVATED_MAX_MEMORY_GB
        } else {
            STANDARD_MAX_MEMORY_GB
        }
    }
}

/// Location of caller-owned service records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    #[serde(default = "default_state_directory")]
    pub directory: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            directory: default_state_directory(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_logging: bool,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_logging: false,
            file_prefix: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[api]
base_url = "https://control.example.test/v1"
organization_id = "org-123"
request_timeout = 10

[poller]
interval = 2
timeout = 60

[limits]
elevated_account = true

[state]
directory = "/var/lib/msr"
"#;

    #[test]
    fn parses_sample_configuration() {
        let config: AppConfig = SAMPLE.parse().expect("sample config parses");
        assert_eq!(config.api.organization_id, "org-123");
        assert_eq!(config.api.request_timeout, Duration::from_secs(10));
        assert_eq!(config.poller.interval, Duration::from_secs(2));
        assert_eq!(config.poller.timeout, Some(Duration::from_secs(60)));
        assert_eq!(config.limits.max_total_memory_gb(), ELEVATED_MAX_MEMORY_GB);
        assert_eq!(config.state.directory, PathBuf::from("/var/lib/msr"));
        assert_eq!(config.api.key_id_env, "MSR_API_KEY_ID");
    }

    #[test]
    fn defaults_apply_when_sections_missing() {
        let config: AppConfig = "[api]\norganization_id = \"org\"\n"
            .parse()
            .expect("minimal config parses");
        assert_eq!(config.poller.interval, Duration::from_secs(5));
        assert_eq!(config.poller.timeout, Some(Duration::from_secs(1800)));
        assert_eq!(config.limits.max_total_memory_gb(), STANDARD_MAX_MEMORY_GB);
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn rejects_missing_organization() {
        let err = "[poller]\ninterval = 5\n".parse::<AppConfig>().unwrap_err();
        assert!(err.to_string().contains("organization_id"));
    }

    #[test]
    fn rejects_timeout_shorter_than_interval() {
        let err = "[api]\norganization_id = \"org\"\n[poller]\ninterval = 10\ntimeout = 5\n"
            .parse::<AppConfig>()
            .unwrap_err();
        assert!(err.to_string().contains("poller.timeout"));
    }

    #[test]
    fn zero_timeout_means_no_deadline() {
        let config = "[api]\norganization_id = \"org\"\n[poller]\ninterval = 10\ntimeout = 0\n"
            .parse::<AppConfig>()
            .expect("zero timeout accepted");
        assert_eq!(config.poller.timeout, Some(Duration::ZERO));
        assert_eq!(config.poller.deadline(), None);
    }

    #[test]
    fn loads_first_existing_candidate() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("msr.toml");
        fs::write(&path, SAMPLE).expect("write config");
        let missing = dir.path().join("missing.toml");
        let loaded = AppConfig::load_with_source(&[missing, path.clone()]).expect("config loads");
        assert_eq!(loaded.source, path);
        assert_eq!(loaded.config.api.organization_id, "org-123");
    }
}
