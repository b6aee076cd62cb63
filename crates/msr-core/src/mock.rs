//! ---
//! msr_section: "02-reconciliation-engine"
//! msr_subsection: "module"
//! msr_type: "source"
//! msr_scope: "code"
//! msr_description: "In-memory control plane used by engine and workspace tests."
//! msr_version: "v0.1.0"
//! msr_owner: "tbd"
//! ---
//! In-memory [`ServiceApi`] that records every call.
//!
//! New services report `provisioning` for a configurable number of reads and
//! `running` afterwards. Failures can be injected per operation.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use rand::distributions::Alphanumeric;
use rand::Rng;
use uuid::Uuid;

use crate::api::{
    ApiError, CreatedService, PasswordUpdate, PasswordUpdated, ScalingUpdate, ServiceApi,
    ServiceCreate, ServiceUpdate,
};
use crate::model::{Endpoint, ManagedServiceState, ServiceStatus};

const GENERATED_PASSWORD_LEN: usize = 20;

/// Operation names understood by [`MockControlPlane::fail_on`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOperation {
    Create,
    Get,
    Update,
    Scaling,
    Password,
    Delete,
}

/// A call received by the mock, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCall {
    Create(ServiceCreate),
    Get(String),
    Update(String, ServiceUpdate),
    Scaling(String, ScalingUpdate),
    Password(String, PasswordUpdate),
    Delete(String),
}

impl RecordedCall {
    pub fn operation(&self) -> MockOperation {
        match self {
            RecordedCall::Create(_) => MockOperation::Create,
            RecordedCall::Get(_) => MockOperation::Get,
            RecordedCall::Update(..) => MockOperation::Update,
            RecordedCall::Scaling(..) => MockOperation::Scaling,
            RecordedCall::Password(..) => MockOperation::Password,
            RecordedCall::Delete(_) => MockOperation::Delete,
        }
    }

    /// Whether the call mutates remote state.
    pub fn is_mutation(&self) -> bool {
        !matches!(self, RecordedCall::Get(_))
    }
}

#[derive(Default)]
struct Inner {
    services: HashMap<String, ManagedServiceState>,
    passwords: HashMap<String, String>,
    pending_polls: HashMap<String, u32>,
    calls: Vec<RecordedCall>,
    failures: HashMap<MockOperation, ApiError>,
    generated: Vec<String>,
}

#[derive(Default)]
pub struct MockControlPlane {
    provisioning_polls: u32,
    inner: Mutex<Inner>,
}

impl MockControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of reads after a create that still report `provisioning`.
    pub fn with_provisioning_polls(mut self, polls: u32) -> Self {
        self.provisioning_polls = polls;
        self
    }

    /// Seed an existing service.
    pub fn with_service(self, state: ManagedServiceState) -> Self {
        self.inner.lock().services.insert(state.id.clone(), state);
        self
    }

    /// Make every subsequent `operation` call fail with `error`.
    pub fn fail_on(&self, operation: MockOperation, error: ApiError) {
        self.inner.lock().failures.insert(operation, error);
    }

    pub fn clear_failures(&self) {
        self.inner.lock().failures.clear();
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.inner.lock().calls.clone()
    }

    /// Recorded calls excluding reads.
    pub fn mutations(&self) -> Vec<RecordedCall> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter(|call| call.is_mutation())
            .cloned()
            .collect()
    }

    pub fn clear_calls(&self) {
        self.inner.lock().calls.clear();
    }

    pub fn service(&self, id: &str) -> Option<ManagedServiceState> {
        self.inner.lock().services.get(id).cloned()
    }

    /// Credential currently set on the service's default user.
    pub fn password(&self, id: &str) -> Option<String> {
        self.inner.lock().passwords.get(id).cloned()
    }

    /// Every credential the mock generated, oldest first.
    pub fn generated_passwords(&self) -> Vec<String> {
        self.inner.lock().generated.clone()
    }

    fn begin(&self, call: RecordedCall) -> Result<parking_lot::MutexGuard<'_, Inner>, ApiError> {
        let mut inner = self.inner.lock();
        let operation = call.operation();
        inner.calls.push(call);
        if let Some(error) = inner.failures.get(&operation).cloned() {
            return Err(error);
        }
        Ok(inner)
    }
}

fn generate_password(inner: &mut Inner) -> String {
    let password: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(GENERATED_PASSWORD_LEN)
        .map(char::from)
        .collect();
    inner.generated.push(password.clone());
    password
}

fn endpoints(id: &str, request: &ServiceCreate) -> Vec<Endpoint> {
    let host = format!(
        "{}.{}.{}.msr.invalid",
        &id[..8],
        request.region,
        request.cloud_provider
    );
    vec![
        Endpoint {
            protocol: "https".into(),
            host: host.clone(),
            port: 8443,
        },
        Endpoint {
            protocol: "nativesecure".into(),
            host,
            port: 9440,
        },
    ]
}

#[async_trait]
impl ServiceApi for MockControlPlane {
    async fn create_service(&self, request: &ServiceCreate) -> Result<CreatedService, ApiError> {
        let mut inner = self.begin(RecordedCall::Create(request.clone()))?;
        let id = Uuid::new_v4().to_string();
        let state = ManagedServiceState {
            id: id.clone(),
            name: request.name.clone(),
            cloud_provider: request.cloud_provider,
            region: request.region.clone(),
            tier: request.tier,
            idle_scaling: request.idle_scaling,
            ip_access: request.ip_access.clone(),
            min_total_memory_gb: request.min_total_memory_gb,
            max_total_memory_gb: request.max_total_memory_gb,
            idle_timeout_minutes: request.idle_timeout_minutes,
            status: ServiceStatus::provisioning(),
            endpoints: endpoints(&id, request),
        };
        let password = generate_password(&mut inner);
        inner.passwords.insert(id.clone(), password.clone());
        inner
            .pending_polls
            .insert(id.clone(), self.provisioning_polls);
        inner.services.insert(id, state.clone());
        Ok(CreatedService {
            service: state,
            password: Some(password),
        })
    }

    async fn get_service(&self, id: &str) -> Result<ManagedServiceState, ApiError> {
        let mut inner = self.begin(RecordedCall::Get(id.to_owned()))?;
        let still_pending = match inner.pending_polls.get_mut(id) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        };
        let state = inner.services.get_mut(id).ok_or(ApiError::NotFound)?;
        if !still_pending && state.status.is_provisioning() {
            state.status = ServiceStatus::new("running");
        }
        Ok(state.clone())
    }

    async fn update_service(
        &self,
        id: &str,
        update: &ServiceUpdate,
    ) -> Result<ManagedServiceState, ApiError> {
        let mut inner = self.begin(RecordedCall::Update(id.to_owned(), update.clone()))?;
        let state = inner.services.get_mut(id).ok_or(ApiError::NotFound)?;
        if let Some(name) = &update.name {
            state.name = name.clone();
        }
        if let Some(access) = &update.ip_access_list {
            state
                .ip_access
                .retain(|entry| !access.remove.iter().any(|r| r.key() == entry.key()));
            for entry in &access.add {
                if !state.ip_access.iter().any(|e| e.key() == entry.key()) {
                    state.ip_access.push(entry.clone());
                }
            }
        }
        Ok(state.clone())
    }

    async fn update_service_scaling(
        &self,
        id: &str,
        update: &ScalingUpdate,
    ) -> Result<ManagedServiceState, ApiError> {
        let mut inner = self.begin(RecordedCall::Scaling(id.to_owned(), update.clone()))?;
        let state = inner.services.get_mut(id).ok_or(ApiError::NotFound)?;
        if let Some(idle_scaling) = update.idle_scaling {
            state.idle_scaling = idle_scaling;
        }
        if let Some(min) = update.min_total_memory_gb {
            state.min_total_memory_gb = min;
        }
        if let Some(max) = update.max_total_memory_gb {
            state.max_total_memory_gb = max;
        }
        if let Some(timeout) = update.idle_timeout_minutes {
            state.idle_timeout_minutes = timeout;
        }
        Ok(state.clone())
    }

    async fn update_service_password(
        &self,
        id: &str,
        update: &PasswordUpdate,
    ) -> Result<PasswordUpdated, ApiError> {
        let mut inner = self.begin(RecordedCall::Password(id.to_owned(), update.clone()))?;
        if !inner.services.contains_key(id) {
            return Err(ApiError::NotFound);
        }
        let (current, echoed) = match update {
            PasswordUpdate::Plaintext(password) => (password.clone(), None),
            PasswordUpdate::Generate => {
                let generated = generate_password(&mut inner);
                (generated.clone(), Some(generated))
            }
        };
        inner.passwords.insert(id.to_owned(), current);
        Ok(PasswordUpdated { password: echoed })
    }

    async fn delete_service(&self, id: &str) -> Result<(), ApiError> {
        let mut inner = self.begin(RecordedCall::Delete(id.to_owned()))?;
        inner.pending_polls.remove(id);
        inner.passwords.remove(id);
        inner
            .services
            .remove(id)
            .map(|_| ())
            .ok_or(ApiError::NotFound)
    }
}
