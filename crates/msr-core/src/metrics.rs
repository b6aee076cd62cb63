//! ---
//! msr_section: "02-reconciliation-engine"
//! msr_subsection: "module"
//! msr_type: "source"
//! msr_scope: "code"
//! msr_description: "Prometheus counters for remote calls and provisioning waits."
//! msr_version: "v0.1.0"
//! msr_owner: "tbd"
//! ---
use std::sync::Arc;

use prometheus::{IntCounter, IntCounterVec, Opts, Registry};

/// Counters published by the reconciliation engine.
#[derive(Clone)]
pub struct ReconcileMetrics {
    remote_calls: IntCounterVec,
    poll_iterations: IntCounter,
    #[allow(dead_code)]
    registry: Arc<Registry>,
}

impl ReconcileMetrics {
    /// Register all engine metrics with the provided registry.
    pub fn new(registry: Arc<Registry>) -> prometheus::Result<Self> {
        let remote_calls = IntCounterVec::new(
            Opts::new(
                "msr_remote_calls_total",
                "Total number of control plane calls issued, by operation and outcome",
            ),
            &["operation", "outcome"],
        )?;
        registry.register(Box::new(remote_calls.clone()))?;

        let poll_iterations = IntCounter::with_opts(Opts::new(
            "msr_poll_iterations_total",
            "Total number of state fetches made while waiting for provisioning",
        ))?;
        registry.register(Box::new(poll_iterations.clone()))?;

        Ok(Self {
            remote_calls,
            poll_iterations,
            registry,
        })
    }

    pub fn record_call(&self, operation: &str, success: bool) {
        let outcome = if success { "ok" } else { "error" };
        self.remote_calls
            .with_label_values(&[operation, outcome])
            .inc();
    }

    pub fn record_poll(&self) {
        self.poll_iterations.inc();
    }

    pub fn remote_calls(&self, operation: &str, outcome: &str) -> u64 {
        self.remote_calls
            .with_label_values(&[operation, outcome])
            .get()
    }

    pub fn poll_iterations(&self) -> u64 {
        self.poll_iterations.get()
    }
}
