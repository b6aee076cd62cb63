//! ---
//! msr_section: "03-logging"
//! msr_subsection: "module"
//! msr_type: "source"
//! msr_scope: "code"
//! msr_description: "Structured reconciliation logging helpers."
//! msr_version: "v0.1.0"
//! msr_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! Structured logging helpers shared by the reconciliation engine and the CLI.

use tracing::Level;
use tracing_subscriber::{fmt as subscriber_fmt, prelude::*, EnvFilter, Registry};

pub mod macros;

#[doc(hidden)]
pub use tracing as __tracing;

/// Initialize a baseline stderr subscriber suitable for ad-hoc runs and tests.
pub fn init() {
    let _ = Registry::default()
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(subscriber_fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// Structured context attached to reconciliation log events.
#[derive(Debug, Default, Clone)]
pub struct LogContext<'a> {
    /// Remote identity of the managed service, when known.
    pub service_id: Option<&'a str>,
    /// User facing service name.
    pub service_name: Option<&'a str>,
    /// Lifecycle operation (`create`, `read`, `update`, `delete`, `import`).
    pub operation: Option<&'a str>,
}

impl<'a> LogContext<'a> {
    /// Create an empty logging context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach the remote service identity.
    pub fn with_service_id(mut self, service_id: &'a str) -> Self {
        self.service_id = Some(service_id);
        self
    }

    /// Attach the service name.
    pub fn with_service_name(mut self, service_name: &'a str) -> Self {
        self.service_name = Some(service_name);
        self
    }

    /// Attach the lifecycle operation.
    pub fn with_operation(mut self, operation: &'a str) -> Self {
        self.operation = Some(operation);
        self
    }
}

/// Outcome recorded for a lifecycle operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Observed state converged with the desired configuration.
    Converged,
    /// Nothing needed to change.
    NoChange,
    /// The operation aborted; observed state may be partially converged.
    Failed,
}

impl ReconcileOutcome {
    /// Stable label used in log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileOutcome::Converged => "converged",
            ReconcileOutcome::NoChange => "no-change",
            ReconcileOutcome::Failed => "failed",
        }
    }
}

/// Emit a standardized lifecycle event with its outcome.
pub fn log_reconcile_event(
    context: Option<&LogContext>,
    event: &str,
    message: &str,
    outcome: ReconcileOutcome,
) {
    let ctx = context.cloned().unwrap_or_default();
    let service_id = ctx.service_id.unwrap_or("");
    let service_name = ctx.service_name.unwrap_or("");
    let operation = ctx.operation.unwrap_or("");
    let outcome_label = outcome.as_str();
    // `tracing::event!` needs a constant level.
    match outcome {
        ReconcileOutcome::Failed => tracing::event!(
            Level::ERROR,
            event,
            outcome = outcome_label,
            service_id,
            service_name,
            operation,
            message = %message
        ),
        ReconcileOutcome::Converged | ReconcileOutcome::NoChange => tracing::event!(
            Level::INFO,
            event,
            outcome = outcome_label,
            service_id,
            service_name,
            operation,
            message = %message
        ),
    }
}
