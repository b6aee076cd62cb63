//! ---
//! msr_section: "02-reconciliation-engine"
//! msr_subsection: "module"
//! msr_type: "source"
//! msr_scope: "code"
//! msr_description: "Reconciliation engine crate root."
//! msr_version: "v0.1.0"
//! msr_owner: "tbd"
//! ---
//! Reconciliation engine for remotely provisioned managed database services.
//!
//! The engine turns a desired [`ManagedServiceSpec`] into the minimal sequence
//! of control plane calls, waits for provisioning to finish and rejects
//! changes to attributes the control plane treats as immutable. Persistence of
//! the resulting [`ServiceRecord`] is left to the caller.

pub mod api;
pub mod diff;
pub mod dispatch;
pub mod error;
pub mod lifecycle;
pub mod metrics;
pub mod mock;
pub mod model;
pub mod password;
pub mod poller;

pub use api::{
    ApiError, CreatedService, IpAccessUpdate, PasswordUpdate, PasswordUpdated, ScalingUpdate,
    ServiceApi, ServiceCreate, ServiceUpdate,
};
pub use diff::{diff, diff_ip_access, Diff};
pub use dispatch::{PlanSummary, UpdatePlan};
pub use error::{ImmutableField, ReconcileError, Result};
pub use lifecycle::{ServiceController, ServiceLifecycle};
pub use metrics::ReconcileMetrics;
pub use mock::{MockControlPlane, MockOperation, RecordedCall};
pub use model::{
    CloudProvider, Endpoint, IpAccessEntry, ManagedServiceSpec, ManagedServiceState,
    ScalingPolicy, ServiceRecord, ServiceStatus, Tier, ValidationError, ValidationLimits,
};
pub use poller::{PollSettings, ProvisioningPoller};
