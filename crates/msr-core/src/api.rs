//! ---
//! msr_section: "02-reconciliation-engine"
//! msr_subsection: "module"
//! msr_type: "source"
//! msr_scope: "code"
//! msr_description: "Remote control-plane contract consumed by the engine."
//! msr_version: "v0.1.0"
//! msr_owner: "tbd"
//! ---
use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::{CloudProvider, IpAccessEntry, ManagedServiceSpec, ManagedServiceState, Tier};

/// Create request. Carries every spec attribute except the credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceCreate {
    pub name: String,
    pub cloud_provider: CloudProvider,
    pub region: String,
    pub tier: Tier,
    pub idle_scaling: bool,
    pub ip_access: Vec<IpAccessEntry>,
    pub min_total_memory_gb: u32,
    pub max_total_memory_gb: u32,
    pub idle_timeout_minutes: u32,
}

impl From<&ManagedServiceSpec> for ServiceCreate {
    fn from(spec: &ManagedServiceSpec) -> Self {
        Self {
            name: spec.name.clone(),
            cloud_provider: spec.cloud_provider,
            region: spec.region.clone(),
            tier: spec.tier,
            idle_scaling: spec.idle_scaling,
            ip_access: spec.ip_access.clone(),
            min_total_memory_gb: spec.min_total_memory_gb,
            max_total_memory_gb: spec.max_total_memory_gb,
            idle_timeout_minutes: spec.idle_timeout_minutes,
        }
    }
}

/// Result of a create call.
#[derive(Clone)]
pub struct CreatedService {
    pub service: ManagedServiceState,
    /// Credential generated by the control plane for the default user.
    pub password: Option<String>,
}

impl fmt::Debug for CreatedService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreatedService")
            .field("service", &self.service)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Access list change expressed purely as additions and removals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpAccessUpdate {
    pub add: Vec<IpAccessEntry>,
    pub remove: Vec<IpAccessEntry>,
}

/// General-fields update. `None` leaves the attribute untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_access_list: Option<IpAccessUpdate>,
}

/// Scaling update. `None` leaves the attribute untouched on the remote side.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScalingUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_scaling: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_total_memory_gb: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_total_memory_gb: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_timeout_minutes: Option<u32>,
}

/// Credential update request.
#[derive(Clone, PartialEq, Eq)]
pub enum PasswordUpdate {
    /// Set exactly this credential.
    Plaintext(String),
    /// Ask the control plane to generate a credential.
    Generate,
}

impl fmt::Debug for PasswordUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PasswordUpdate::Plaintext(_) => f.write_str("Plaintext(<redacted>)"),
            PasswordUpdate::Generate => f.write_str("Generate"),
        }
    }
}

/// Credential update response. Carries no service state.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct PasswordUpdated {
    pub password: Option<String>,
}

impl fmt::Debug for PasswordUpdated {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordUpdated")
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Failure reported by a [`ServiceApi`] implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("service not found")]
    NotFound,
    #[error("control plane returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("unable to decode response: {0}")]
    Decode(String),
}

/// Remote control plane operations required by the reconciliation engine.
#[async_trait]
pub trait ServiceApi: Send + Sync {
    async fn create_service(&self, request: &ServiceCreate) -> Result<CreatedService, ApiError>;

    async fn get_service(&self, id: &str) -> Result<ManagedServiceState, ApiError>;

    async fn update_service(
        &self,
        id: &str,
        update: &ServiceUpdate,
    ) -> Result<ManagedServiceState, ApiError>;

    async fn update_service_scaling(
        &self,
        id: &str,
        update: &ScalingUpdate,
    ) -> Result<ManagedServiceState, ApiError>;

    async fn update_service_password(
        &self,
        id: &str,
        update: &PasswordUpdate,
    ) -> Result<PasswordUpdated, ApiError>;

    async fn delete_service(&self, id: &str) -> Result<(), ApiError>;
}

#[async_trait]
impl<T> ServiceApi for std::sync::Arc<T>
where
    T: ServiceApi + ?Sized,
{
    async fn create_service(&self, request: &ServiceCreate) -> Result<CreatedService, ApiError> {
        (**self).create_service(request).await
    }

    async fn get_service(&self, id: &str) -> Result<ManagedServiceState, ApiError> {
        (**self).get_service(id).await
    }

    async fn update_service(
        &self,
        id: &str,
        update: &ServiceUpdate,
    ) -> Result<ManagedServiceState, ApiError> {
        (**self).update_service(id, update).await
    }

    async fn update_service_scaling(
        &self,
        id: &str,
        update: &ScalingUpdate,
    ) -> Result<ManagedServiceState, ApiError> {
        (**self).update_service_scaling(id, update).await
    }

    async fn update_service_password(
        &self,
        id: &str,
        update: &PasswordUpdate,
    ) -> Result<PasswordUpdated, ApiError> {
        (**self).update_service_password(id, update).await
    }

    async fn delete_service(&self, id: &str) -> Result<(), ApiError> {
        (**self).delete_service(id).await
    }
}
