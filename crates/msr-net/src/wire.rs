//! ---
//! msr_section: "04-control-plane-client"
//! msr_subsection: "module"
//! msr_type: "source"
//! msr_scope: "code"
//! msr_description: "JSON wire representation of control plane requests and responses."
//! msr_version: "v0.1.0"
//! msr_owner: "tbd"
//! ---
//! Wire payloads. Field names are camelCase and every successful response is
//! wrapped as `{"result": ...}`.

use msr_core::{
    CloudProvider, CreatedService, Endpoint, IpAccessEntry, IpAccessUpdate, ManagedServiceState,
    PasswordUpdate, PasswordUpdated, ScalingUpdate, ServiceCreate, ServiceStatus, ServiceUpdate,
    Tier,
};
use serde::{Deserialize, Serialize};

/// Successful response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub result: T,
}

/// Error body returned with non-2xx responses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpAccess {
    pub source: String,
    #[serde(default)]
    pub description: String,
}

impl From<&IpAccessEntry> for IpAccess {
    fn from(entry: &IpAccessEntry) -> Self {
        Self {
            source: entry.source.clone(),
            description: entry.description.clone(),
        }
    }
}

impl From<IpAccess> for IpAccessEntry {
    fn from(entry: IpAccess) -> Self {
        IpAccessEntry::new(entry.source, entry.description)
    }
}

fn to_wire(entries: &[IpAccessEntry]) -> Vec<IpAccess> {
    entries.iter().map(IpAccess::from).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateServiceBody {
    pub name: String,
    pub provider: CloudProvider,
    pub region: String,
    pub tier: Tier,
    pub idle_scaling: bool,
    pub ip_access_list: Vec<IpAccess>,
    pub min_total_memory_gb: u32,
    pub max_total_memory_gb: u32,
    pub idle_timeout_minutes: u32,
}

impl From<&ServiceCreate> for CreateServiceBody {
    fn from(request: &ServiceCreate) -> Self {
        Self {
            name: request.name.clone(),
            provider: request.cloud_provider,
            region: request.region.clone(),
            tier: request.tier,
            idle_scaling: request.idle_scaling,
            ip_access_list: to_wire(&request.ip_access),
            min_total_memory_gb: request.min_total_memory_gb,
            max_total_memory_gb: request.max_total_memory_gb,
            idle_timeout_minutes: request.idle_timeout_minutes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceEndpoint {
    pub protocol: String,
    pub host: String,
    pub port: u16,
}

/// Service resource as returned by the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceResource {
    pub id: String,
    pub name: String,
    pub provider: CloudProvider,
    pub region: String,
    pub tier: Tier,
    pub idle_scaling: bool,
    #[serde(default)]
    pub ip_access_list: Vec<IpAccess>,
    pub min_total_memory_gb: u32,
    pub max_total_memory_gb: u32,
    pub idle_timeout_minutes: u32,
    pub state: String,
    #[serde(default)]
    pub endpoints: Vec<ServiceEndpoint>,
}

impl From<ServiceResource> for ManagedServiceState {
    fn from(resource: ServiceResource) -> Self {
        Self {
            id: resource.id,
            name: resource.name,
            cloud_provider: resource.provider,
            region: resource.region,
            tier: resource.tier,
            idle_scaling: resource.idle_scaling,
            ip_access: resource.ip_access_list.into_iter().map(Into::into).collect(),
            min_total_memory_gb: resource.min_total_memory_gb,
            max_total_memory_gb: resource.max_total_memory_gb,
            idle_timeout_minutes: resource.idle_timeout_minutes,
            status: ServiceStatus::new(resource.state),
            endpoints: resource
                .endpoints
                .into_iter()
                .map(|endpoint| Endpoint {
                    protocol: endpoint.protocol,
                    host: endpoint.host,
                    port: endpoint.port,
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateServiceResult {
    pub service: ServiceResource,
    #[serde(default)]
    pub password: Option<String>,
}

impl From<CreateServiceResult> for CreatedService {
    fn from(result: CreateServiceResult) -> Self {
        Self {
            service: result.service.into(),
            password: result.password.filter(|p| !p.is_empty()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpAccessPatch {
    #[serde(default)]
    pub add: Vec<IpAccess>,
    #[serde(default)]
    pub remove: Vec<IpAccess>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_access_list: Option<IpAccessPatch>,
}

impl From<&ServiceUpdate> for ServicePatch {
    fn from(update: &ServiceUpdate) -> Self {
        Self {
            name: update.name.clone(),
            ip_access_list: update
                .ip_access_list
                .as_ref()
                .map(|IpAccessUpdate { add, remove }| IpAccessPatch {
                    add: to_wire(add),
                    remove: to_wire(remove),
                }),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScalingPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_scaling: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_total_memory_gb: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_total_memory_gb: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_timeout_minutes: Option<u32>,
}

impl From<&ScalingUpdate> for ScalingPatch {
    fn from(update: &ScalingUpdate) -> Self {
        Self {
            idle_scaling: update.idle_scaling,
            min_total_memory_gb: update.min_total_memory_gb,
            max_total_memory_gb: update.max_total_memory_gb,
            idle_timeout_minutes: update.idle_timeout_minutes,
        }
    }
}

/// Credential update body. An empty object asks the control plane to generate one.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_password: Option<String>,
}

impl std::fmt::Debug for PasswordPatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordPatch")
            .field("new_password", &self.new_password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl From<&PasswordUpdate> for PasswordPatch {
    fn from(update: &PasswordUpdate) -> Self {
        match update {
            PasswordUpdate::Plaintext(password) => Self {
                new_password: Some(password.clone()),
            },
            PasswordUpdate::Generate => Self::default(),
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct PasswordResult {
    #[serde(default)]
    pub password: Option<String>,
}

impl From<PasswordResult> for PasswordUpdated {
    fn from(result: PasswordResult) -> Self {
        Self {
            password: result.password.filter(|p| !p.is_empty()),
        }
    }
}
