//! ---
//! msr_section: "02-reconciliation-engine"
//! msr_subsection: "module"
//! msr_type: "source"
//! msr_scope: "code"
//! msr_description: "Create, read, update, delete and import orchestration."
//! msr_version: "v0.1.0"
//! msr_owner: "tbd"
//! ---
use std::sync::Arc;

use async_trait::async_trait;
use msr_common::config::AppConfig;
use msr_logging::{log_reconcile_event, msr_error, msr_info, LogContext, ReconcileOutcome};
use tokio::sync::watch;
use tracing::warn;

use crate::api::{ServiceApi, ServiceCreate};
use crate::dispatch::UpdatePlan;
use crate::error::{ReconcileError, Result};
use crate::metrics::ReconcileMetrics;
use crate::model::{ManagedServiceSpec, ManagedServiceState, ServiceRecord, ValidationLimits};
use crate::password;
use crate::poller::{PollSettings, ProvisioningPoller};

/// Lifecycle operations on a single managed service.
///
/// The caller owns the persisted [`ServiceRecord`] and must not run two
/// operations on the same service concurrently.
#[async_trait]
pub trait ServiceLifecycle: Send + Sync {
    /// Create a service and wait until it has been provisioned.
    async fn create(&self, spec: &ManagedServiceSpec) -> Result<ServiceRecord>;

    /// Fetch the current remote state.
    async fn read(&self, id: &str) -> Result<ManagedServiceState>;

    /// Move an existing service towards `desired`.
    async fn update(
        &self,
        desired: &ManagedServiceSpec,
        record: &ServiceRecord,
    ) -> Result<ServiceRecord>;

    /// Delete a service. Teardown is not awaited.
    async fn delete(&self, id: &str) -> Result<()>;

    /// Adopt an existing service by id. The credential is unknown.
    async fn import(&self, id: &str) -> Result<ServiceRecord> {
        let state = self.read(id).await?;
        Ok(ServiceRecord::new(state, None))
    }

    /// Re-read the remote state of a record, keeping its credential.
    async fn refresh(&self, record: &ServiceRecord) -> Result<ServiceRecord> {
        let state = self.read(record.id()).await?;
        Ok(ServiceRecord::new(state, record.password.clone()))
    }
}

/// [`ServiceLifecycle`] backed by a [`ServiceApi`] implementation.
pub struct ServiceController<A> {
    api: A,
    limits: ValidationLimits,
    poll: PollSettings,
    cancel: Option<watch::Receiver<bool>>,
    metrics: Option<Arc<ReconcileMetrics>>,
}

impl<A: ServiceApi> ServiceController<A> {
    pub fn new(api: A) -> Self {
        Self {
            api,
            limits: ValidationLimits::default(),
            poll: PollSettings::default(),
            cancel: None,
            metrics: None,
        }
    }

    /// Controller with limits and poll timing taken from configuration.
    pub fn from_config(api: A, config: &AppConfig) -> Self {
        Self::new(api)
            .with_limits(ValidationLimits::from_config(&config.limits))
            .with_poll_settings(PollSettings::from_config(&config.poller))
    }

    pub fn with_limits(mut self, limits: ValidationLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_poll_settings(mut self, poll: PollSettings) -> Self {
        self.poll = poll;
        self
    }

    /// Abort provisioning waits once `true` is sent on the channel.
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<ReconcileMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Validate `desired` and compute the update plan without calling the control plane.
    pub fn plan(&self, desired: &ManagedServiceSpec, record: &ServiceRecord) -> Result<UpdatePlan> {
        desired.validate(&self.limits)?;
        UpdatePlan::build(desired, record)
    }

    fn observe(&self, operation: &str, success: bool) {
        if let Some(metrics) = &self.metrics {
            metrics.record_call(operation, success);
        }
    }

    fn poller(&self) -> ProvisioningPoller {
        let poller = ProvisioningPoller::new(self.poll).with_metrics(self.metrics.clone());
        match &self.cancel {
            Some(cancel) => poller.with_cancellation(cancel.clone()),
            None => poller,
        }
    }

    async fn provision(&self, spec: &ManagedServiceSpec) -> Result<ServiceRecord> {
        spec.validate(&self.limits)?;

        let created = self.api.create_service(&ServiceCreate::from(spec)).await;
        self.observe("create_service", created.is_ok());
        let created = created.map_err(|source| ReconcileError::CreationFailed {
            name: spec.name.clone(),
            source,
        })?;
        let id = created.service.id.clone();
        let ctx = LogContext::new()
            .with_service_id(&id)
            .with_service_name(&spec.name)
            .with_operation("create");
        msr_info!(context = ctx, "service created, waiting for provisioning");

        let state = self
            .poller()
            .wait(&self.api, &id)
            .await
            .map_err(|err| orphaned(&id, err))?;

        let password = match spec.desired_password() {
            Some(desired) => {
                let request = password::request_for(Some(desired));
                let response = self.api.update_service_password(&id, &request).await;
                self.observe("update_service_password", response.is_ok());
                let response = response.map_err(|source| {
                    orphaned(&id, ReconcileError::remote("create", &id, source))
                })?;
                password::resolve(&request, &response)
            }
            None => created.password,
        };

        Ok(ServiceRecord::new(state, password))
    }
}

fn orphaned(id: &str, err: ReconcileError) -> ReconcileError {
    warn!(
        service_id = id,
        error = %err,
        "service was created but not fully reconciled; it still exists remotely"
    );
    err
}

#[async_trait]
impl<A: ServiceApi> ServiceLifecycle for ServiceController<A> {
    async fn create(&self, spec: &ManagedServiceSpec) -> Result<ServiceRecord> {
        let ctx = LogContext::new()
            .with_service_name(&spec.name)
            .with_operation("create");
        match self.provision(spec).await {
            Ok(record) => {
                log_reconcile_event(
                    Some(&ctx.clone().with_service_id(record.id())),
                    "service.create",
                    "service provisioned",
                    ReconcileOutcome::Converged,
                );
                Ok(record)
            }
            Err(err) => {
                log_reconcile_event(
                    Some(&ctx),
                    "service.create",
                    &err.to_string(),
                    ReconcileOutcome::Failed,
                );
                Err(err)
            }
        }
    }

    async fn read(&self, id: &str) -> Result<ManagedServiceState> {
        let result = self.api.get_service(id).await;
        self.observe("get_service", result.is_ok());
        result.map_err(|source| {
            let ctx = LogContext::new().with_service_id(id).with_operation("read");
            msr_error!(context = ctx, "unable to read service: {source}");
            ReconcileError::remote("read", id, source)
        })
    }

    async fn update(
        &self,
        desired: &ManagedServiceSpec,
        record: &ServiceRecord,
    ) -> Result<ServiceRecord> {
        let ctx = LogContext::new()
            .with_service_id(record.id())
            .with_service_name(&desired.name)
            .with_operation("update");

        let plan = match self.plan(desired, record) {
            Ok(plan) => plan,
            Err(err) => {
                log_reconcile_event(
                    Some(&ctx),
                    "service.update",
                    &err.to_string(),
                    ReconcileOutcome::Failed,
                );
                return Err(err);
            }
        };

        if plan.is_empty() {
            log_reconcile_event(
                Some(&ctx),
                "service.update",
                "already converged",
                ReconcileOutcome::NoChange,
            );
            return Ok(ServiceRecord::new(record.state.clone(), record.password.clone()));
        }

        msr_info!(context = ctx, "applying update plan: {plan}");
        match plan.execute(&self.api, record, self.metrics.as_deref()).await {
            Ok(updated) => {
                log_reconcile_event(
                    Some(&ctx),
                    "service.update",
                    "update applied",
                    ReconcileOutcome::Converged,
                );
                Ok(updated)
            }
            Err(err) => {
                log_reconcile_event(
                    Some(&ctx),
                    "service.update",
                    &err.to_string(),
                    ReconcileOutcome::Failed,
                );
                Err(err)
            }
        }
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let result = self.api.delete_service(id).await;
        self.observe("delete_service", result.is_ok());
        let ctx = LogContext::new().with_service_id(id).with_operation("delete");
        match result {
            Ok(()) => {
                msr_info!(context = ctx, "service deleted");
                Ok(())
            }
            Err(source) => {
                msr_error!(context = ctx, "unable to delete service: {source}");
                Err(ReconcileError::remote("delete", id, source))
            }
        }
    }

    async fn import(&self, id: &str) -> Result<ServiceRecord> {
        let state = self.read(id).await?;
        let ctx = LogContext::new()
            .with_service_id(id)
            .with_service_name(&state.name)
            .with_operation("import");
        msr_info!(context = ctx, "service imported; credential unknown");
        Ok(ServiceRecord::new(state, None))
    }
}
