//! ---
//! msr_section: "02-reconciliation-engine"
//! msr_subsection: "module"
//! msr_type: "source"
//! msr_scope: "code"
//! msr_description: "Immutability checks, per-call change sets, and ordered update execution."
//! msr_version: "v0.1.0"
//! msr_owner: "tbd"
//! ---
//! Update dispatch.
//!
//! Each remote update call is described by a pure change-set function from
//! `(desired, observed)` to an optional payload. [`UpdatePlan`] collects them
//! and [`UpdatePlan::execute`] issues the calls in the order general, scaling,
//! credential. A failing call aborts the remaining ones without rolling back
//! the calls already applied.

use std::fmt;

use serde::Serialize;
use tracing::{debug, warn};

use crate::api::{IpAccessUpdate, PasswordUpdate, ScalingUpdate, ServiceApi, ServiceUpdate};
use crate::diff::{diff_ip_access, Diff};
use crate::error::{ImmutableField, ReconcileError, Result};
use crate::metrics::ReconcileMetrics;
use crate::model::{IpAccessEntry, ManagedServiceSpec, ServiceRecord};
use crate::password;

impl From<Diff<IpAccessEntry>> for IpAccessUpdate {
    fn from(diff: Diff<IpAccessEntry>) -> Self {
        Self {
            add: diff.to_add,
            remove: diff.to_remove,
        }
    }
}

/// Immutable attributes that differ between `desired` and `observed`.
pub fn immutable_changes(
    desired: &ManagedServiceSpec,
    observed: &ManagedServiceSpec,
) -> Vec<ImmutableField> {
    let mut fields = Vec::new();
    if desired.cloud_provider != observed.cloud_provider {
        fields.push(ImmutableField::CloudProvider);
    }
    if desired.region != observed.region {
        fields.push(ImmutableField::Region);
    }
    if desired.tier != observed.tier {
        fields.push(ImmutableField::Tier);
    }
    fields
}

/// Name and access-list changes, bundled into one service update.
pub fn general_change(
    desired: &ManagedServiceSpec,
    observed: &ManagedServiceSpec,
) -> Option<ServiceUpdate> {
    let name = (desired.name != observed.name).then(|| desired.name.clone());
    let access = diff_ip_access(&observed.ip_access, &desired.ip_access);
    let ip_access_list = (!access.is_empty()).then(|| IpAccessUpdate::from(access));

    if name.is_none() && ip_access_list.is_none() {
        return None;
    }
    Some(ServiceUpdate {
        name,
        ip_access_list,
    })
}

/// Scaling change, when any of the four scaling fields differs.
///
/// Every field is populated so the fields that did not change resend the
/// observed value instead of being reset by the control plane.
pub fn scaling_change(
    desired: &ManagedServiceSpec,
    observed: &ManagedServiceSpec,
) -> Option<ScalingUpdate> {
    let want = desired.scaling();
    if want == observed.scaling() {
        return None;
    }
    Some(ScalingUpdate {
        idle_scaling: Some(want.idle_scaling),
        min_total_memory_gb: Some(want.min_total_memory_gb),
        max_total_memory_gb: Some(want.max_total_memory_gb),
        idle_timeout_minutes: Some(want.idle_timeout_minutes),
    })
}

/// Credential change, when the desired credential differs from the recorded one.
pub fn credential_change(
    desired: &ManagedServiceSpec,
    observed: &ManagedServiceSpec,
) -> Option<PasswordUpdate> {
    password::differs(desired.password.as_deref(), observed.password.as_deref())
        .then(|| password::request_for(desired.password.as_deref()))
}

/// The remote calls needed to move a service record towards a desired spec.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdatePlan {
    pub general: Option<ServiceUpdate>,
    pub scaling: Option<ScalingUpdate>,
    pub credential: Option<PasswordUpdate>,
}

impl UpdatePlan {
    /// Compute the plan. Fails without touching anything if an immutable field changed.
    pub fn build(desired: &ManagedServiceSpec, record: &ServiceRecord) -> Result<Self> {
        let observed = record.observed_spec();
        let violations = immutable_changes(desired, &observed);
        if !violations.is_empty() {
            return Err(ReconcileError::ImmutableFieldViolation {
                id: record.id().to_owned(),
                fields: violations,
            });
        }

        Ok(Self {
            general: general_change(desired, &observed),
            scaling: scaling_change(desired, &observed),
            credential: credential_change(desired, &observed),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.general.is_none() && self.scaling.is_none() && self.credential.is_none()
    }

    /// Number of remote calls the plan will issue.
    pub fn call_count(&self) -> usize {
        [
            self.general.is_some(),
            self.scaling.is_some(),
            self.credential.is_some(),
        ]
        .iter()
        .filter(|present| **present)
        .count()
    }

    /// Serializable view with the credential value masked.
    pub fn summary(&self) -> PlanSummary<'_> {
        PlanSummary {
            general: self.general.as_ref(),
            scaling: self.scaling.as_ref(),
            credential: self.credential.as_ref().map(|request| match request {
                PasswordUpdate::Plaintext(_) => "set",
                PasswordUpdate::Generate => "generate",
            }),
        }
    }

    /// Issue the planned calls in order and fold the responses into a new record.
    ///
    /// When no state-returning call fires, the record's state is carried forward.
    pub async fn execute<A>(
        self,
        api: &A,
        record: &ServiceRecord,
        metrics: Option<&ReconcileMetrics>,
    ) -> Result<ServiceRecord>
    where
        A: ServiceApi + ?Sized,
    {
        let id = record.id();
        let mut state = record.state.clone();
        let mut password = record.password.clone();
        let mut applied: Vec<&'static str> = Vec::new();

        if let Some(update) = &self.general {
            debug!(service_id = id, "updating general service fields");
            let result = api.update_service(id, update).await;
            observe(metrics, "update_service", result.is_ok());
            state = result.map_err(|source| abort(id, &applied, "update_service", source))?;
            applied.push("update_service");
        }

        if let Some(update) = &self.scaling {
            debug!(service_id = id, "updating service scaling");
            let result = api.update_service_scaling(id, update).await;
            observe(metrics, "update_service_scaling", result.is_ok());
            state =
                result.map_err(|source| abort(id, &applied, "update_service_scaling", source))?;
            applied.push("update_service_scaling");
        }

        if let Some(request) = &self.credential {
            debug!(service_id = id, ?request, "updating service password");
            let result = api.update_service_password(id, request).await;
            observe(metrics, "update_service_password", result.is_ok());
            let response =
                result.map_err(|source| abort(id, &applied, "update_service_password", source))?;
            password = password::resolve(request, &response);
        }

        Ok(ServiceRecord::new(state, password))
    }
}

/// Printable form of an [`UpdatePlan`].
#[derive(Debug, Serialize)]
pub struct PlanSummary<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub general: Option<&'a ServiceUpdate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scaling: Option<&'a ScalingUpdate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credential: Option<&'static str>,
}

impl fmt::Display for UpdatePlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return f.write_str("no changes");
        }
        let mut parts = Vec::new();
        if let Some(general) = &self.general {
            if let Some(name) = &general.name {
                parts.push(format!("rename to {name}"));
            }
            if let Some(access) = &general.ip_access_list {
                parts.push(format!(
                    "ip access +{} -{}",
                    access.add.len(),
                    access.remove.len()
                ));
            }
        }
        if self.scaling.is_some() {
            parts.push("scaling".to_owned());
        }
        match &self.credential {
            Some(PasswordUpdate::Plaintext(_)) => parts.push("set password".to_owned()),
            Some(PasswordUpdate::Generate) => parts.push("generate password".to_owned()),
            None => {}
        }
        f.write_str(&parts.join(", "))
    }
}

fn observe(metrics: Option<&ReconcileMetrics>, operation: &str, success: bool) {
    if let Some(metrics) = metrics {
        metrics.record_call(operation, success);
    }
}

fn abort(
    id: &str,
    applied: &[&'static str],
    operation: &'static str,
    source: crate::api::ApiError,
) -> ReconcileError {
    if !applied.is_empty() {
        warn!(
            service_id = id,
            failed = operation,
            applied = ?applied,
            "update partially applied; re-run to converge"
        );
    }
    ReconcileError::remote("update", id, source)
}
