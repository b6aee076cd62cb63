//! ---
//! msr_section: "02-reconciliation-engine"
//! msr_subsection: "module"
//! msr_type: "source"
//! msr_scope: "code"
//! msr_description: "Desired and observed service models."
//! msr_version: "v0.1.0"
//! msr_owner: "tbd"
//! ---
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use msr_common::config::{LimitsConfig, STANDARD_MAX_MEMORY_GB};
use serde::{Deserialize, Serialize};

/// Memory is allocated in steps of this many gigabytes.
pub const MEMORY_STEP_GB: u32 = 12;
/// Smallest allowed minimum total memory.
pub const MIN_TOTAL_MEMORY_GB: u32 = 24;
/// Smallest allowed idle timeout.
pub const MIN_IDLE_TIMEOUT_MINUTES: u32 = 5;

const REDACTED: &str = "<redacted>";

/// Cloud provider hosting the service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum CloudProvider {
    Aws,
    Gcp,
}

impl CloudProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloudProvider::Aws => "aws",
            CloudProvider::Gcp => "gcp",
        }
    }
}

impl fmt::Display for CloudProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CloudProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "aws" => Ok(CloudProvider::Aws),
            "gcp" => Ok(CloudProvider::Gcp),
            other => Err(format!("unknown cloud provider: {other}")),
        }
    }
}

/// Service tier. Production services scale, development services are fixed size.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Production,
    Development,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Production => "production",
            Tier::Development => "development",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "production" => Ok(Tier::Production),
            "development" => Ok(Tier::Development),
            other => Err(format!("unknown tier: {other}")),
        }
    }
}

/// One entry of the network access list.
///
/// The whole entry is the identity: two entries are the same only when both
/// `source` and `description` match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IpAccessEntry {
    /// Address or CIDR block allowed to connect.
    pub source: String,
    #[serde(default)]
    pub description: String,
}

impl IpAccessEntry {
    pub fn new(source: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            description: description.into(),
        }
    }

    /// Composite identity key used when diffing access lists.
    pub fn key(&self) -> (&str, &str) {
        (self.source.as_str(), self.description.as_str())
    }
}

/// Public endpoint exposed by a running service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Endpoint {
    /// Endpoint protocol, e.g. `https` or `nativesecure`.
    pub protocol: String,
    pub host: String,
    pub port: u16,
}

/// Lifecycle status string reported by the control plane.
///
/// Only `provisioning` is non-terminal; every other value means the service
/// is ready to be reconciled further.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceStatus(String);

impl ServiceStatus {
    pub const PROVISIONING: &'static str = "provisioning";

    pub fn new(status: impl Into<String>) -> Self {
        Self(status.into())
    }

    pub fn provisioning() -> Self {
        Self::new(Self::PROVISIONING)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_provisioning(&self) -> bool {
        self.0 == Self::PROVISIONING
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_provisioning()
    }
}

impl fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Capacity settings the control plane updates through its own call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalingPolicy {
    pub idle_scaling: bool,
    pub min_total_memory_gb: u32,
    pub max_total_memory_gb: u32,
    pub idle_timeout_minutes: u32,
}

/// User-declared target configuration of a managed service.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedServiceSpec {
    pub name: String,
    pub cloud_provider: CloudProvider,
    pub region: String,
    pub tier: Tier,
    pub idle_scaling: bool,
    /// Unordered; membership is what matters.
    #[serde(default)]
    pub ip_access: Vec<IpAccessEntry>,
    pub min_total_memory_gb: u32,
    pub max_total_memory_gb: u32,
    pub idle_timeout_minutes: u32,
    /// Write-only credential for the default user. Absent or empty requests generation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl fmt::Debug for ManagedServiceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedServiceSpec")
            .field("name", &self.name)
            .field("cloud_provider", &self.cloud_provider)
            .field("region", &self.region)
            .field("tier", &self.tier)
            .field("idle_scaling", &self.idle_scaling)
            .field("ip_access", &self.ip_access)
            .field("min_total_memory_gb", &self.min_total_memory_gb)
            .field("max_total_memory_gb", &self.max_total_memory_gb)
            .field("idle_timeout_minutes", &self.idle_timeout_minutes)
            .field("password", &self.password.as_ref().map(|_| REDACTED))
            .finish()
    }
}

impl ManagedServiceSpec {
    pub fn scaling(&self) -> ScalingPolicy {
        ScalingPolicy {
            idle_scaling: self.idle_scaling,
            min_total_memory_gb: self.min_total_memory_gb,
            max_total_memory_gb: self.max_total_memory_gb,
            idle_timeout_minutes: self.idle_timeout_minutes,
        }
    }

    /// The explicitly requested credential, treating an empty string as absent.
    pub fn desired_password(&self) -> Option<&str> {
        self.password.as_deref().filter(|p| !p.is_empty())
    }

    /// Check attribute bounds. All violations are reported together.
    pub fn validate(&self, limits: &ValidationLimits) -> Result<(), ValidationError> {
        let mut violations = Vec::new();
        let mut violation = |field: &'static str, message: String| {
            violations.push(FieldViolation { field, message });
        };

        if self.name.trim().is_empty() {
            violation("name", "must not be empty".into());
        }
        if self.region.trim().is_empty() {
            violation("region", "must not be empty".into());
        }
        if self.ip_access.iter().any(|entry| entry.source.trim().is_empty()) {
            violation("ip_access", "every entry needs a non-empty source".into());
        }

        let min = self.min_total_memory_gb;
        let max = self.max_total_memory_gb;
        if min % MEMORY_STEP_GB != 0 || min < MIN_TOTAL_MEMORY_GB {
            violation(
                "min_total_memory_gb",
                format!("{min} must be a multiple of {MEMORY_STEP_GB} and at least {MIN_TOTAL_MEMORY_GB}"),
            );
        }
        if max % MEMORY_STEP_GB != 0 || max > limits.max_total_memory_gb {
            violation(
                "max_total_memory_gb",
                format!(
                    "{max} must be a multiple of {MEMORY_STEP_GB} and at most {}",
                    limits.max_total_memory_gb
                ),
            );
        }
        if max < min {
            violation(
                "max_total_memory_gb",
                format!("{max} must not be lower than min_total_memory_gb ({min})"),
            );
        }
        if self.idle_timeout_minutes < MIN_IDLE_TIMEOUT_MINUTES {
            violation(
                "idle_timeout_minutes",
                format!(
                    "{} must be at least {MIN_IDLE_TIMEOUT_MINUTES}",
                    self.idle_timeout_minutes
                ),
            );
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { violations })
        }
    }
}

/// Account dependent bounds applied by [`ManagedServiceSpec::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidationLimits {
    pub max_total_memory_gb: u32,
}

impl Default for ValidationLimits {
    fn default() -> Self {
        Self {
            max_total_memory_gb: STANDARD_MAX_MEMORY_GB,
        }
    }
}

impl ValidationLimits {
    pub fn from_config(config: &LimitsConfig) -> Self {
        Self {
            max_total_memory_gb: config.max_total_memory_gb(),
        }
    }
}

/// A single out-of-bounds attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldViolation {
    pub field: &'static str,
    pub message: String,
}

/// Desired spec rejected before any remote call was made.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid service spec: {}", render_violations(.violations))]
pub struct ValidationError {
    pub violations: Vec<FieldViolation>,
}

impl ValidationError {
    pub fn fields(&self) -> Vec<&'static str> {
        self.violations.iter().map(|v| v.field).collect()
    }
}

fn render_violations(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(|v| format!("{}: {}", v.field, v.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Service as last reported by the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedServiceState {
    pub id: String,
    pub name: String,
    pub cloud_provider: CloudProvider,
    pub region: String,
    pub tier: Tier,
    pub idle_scaling: bool,
    #[serde(default)]
    pub ip_access: Vec<IpAccessEntry>,
    pub min_total_memory_gb: u32,
    pub max_total_memory_gb: u32,
    pub idle_timeout_minutes: u32,
    pub status: ServiceStatus,
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
}

impl ManagedServiceState {
    pub fn scaling(&self) -> ScalingPolicy {
        ScalingPolicy {
            idle_scaling: self.idle_scaling,
            min_total_memory_gb: self.min_total_memory_gb,
            max_total_memory_gb: self.max_total_memory_gb,
            idle_timeout_minutes: self.idle_timeout_minutes,
        }
    }

    /// Project the observed state back onto the desired-spec shape.
    pub fn to_spec(&self, password: Option<String>) -> ManagedServiceSpec {
        ManagedServiceSpec {
            name: self.name.clone(),
            cloud_provider: self.cloud_provider,
            region: self.region.clone(),
            tier: self.tier,
            idle_scaling: self.idle_scaling,
            ip_access: self.ip_access.clone(),
            min_total_memory_gb: self.min_total_memory_gb,
            max_total_memory_gb: self.max_total_memory_gb,
            idle_timeout_minutes: self.idle_timeout_minutes,
            password,
        }
    }
}

/// Caller-owned record persisted between invocations.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub state: ManagedServiceState,
    /// Authoritative credential for the default user, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub last_updated: DateTime<Utc>,
}

impl fmt::Debug for ServiceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceRecord")
            .field("state", &self.state)
            .field("password", &self.password.as_ref().map(|_| REDACTED))
            .field("last_updated", &self.last_updated)
            .finish()
    }
}

impl ServiceRecord {
    /// Build a record stamped with the current time.
    pub fn new(state: ManagedServiceState, password: Option<String>) -> Self {
        Self {
            state,
            password,
            last_updated: Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.state.id
    }

    /// Desired-spec projection of the recorded state, used as the diff baseline.
    pub fn observed_spec(&self) -> ManagedServiceSpec {
        self.state.to_spec(self.password.clone())
    }
}
