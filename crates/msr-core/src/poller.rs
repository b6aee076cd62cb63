//! ---
//! msr_section: "02-reconciliation-engine"
//! msr_subsection: "module"
//! msr_type: "source"
//! msr_scope: "code"
//! msr_description: "Bounded, cancellable wait for a service to leave provisioning."
//! msr_version: "v0.1.0"
//! msr_owner: "tbd"
//! ---
use std::sync::Arc;
use std::time::Duration;

use msr_common::config::PollerConfig;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::api::ServiceApi;
use crate::error::{ReconcileError, Result};
use crate::metrics::ReconcileMetrics;
use crate::model::ManagedServiceState;

/// Timing knobs for [`ProvisioningPoller`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    /// `None` waits until the service leaves provisioning or the wait is cancelled.
    pub timeout: Option<Duration>,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self::from_config(&PollerConfig::default())
    }
}

impl PollSettings {
    pub fn from_config(config: &PollerConfig) -> Self {
        Self {
            interval: config.interval,
            timeout: config.deadline(),
        }
    }
}

/// Fetches a service until its status is terminal.
///
/// Cancellation is signalled by sending `true` on the watch channel; a dropped
/// sender never cancels.
pub struct ProvisioningPoller {
    settings: PollSettings,
    cancel: Option<watch::Receiver<bool>>,
    metrics: Option<Arc<ReconcileMetrics>>,
}

impl ProvisioningPoller {
    pub fn new(settings: PollSettings) -> Self {
        Self {
            settings,
            cancel: None,
            metrics: None,
        }
    }

    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn with_metrics(mut self, metrics: Option<Arc<ReconcileMetrics>>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Poll `id` until the control plane reports a terminal status.
    pub async fn wait<A>(&mut self, api: &A, id: &str) -> Result<ManagedServiceState>
    where
        A: ServiceApi + ?Sized,
    {
        let started = Instant::now();
        let deadline = self.settings.timeout.map(|timeout| started + timeout);
        let mut attempt: u64 = 0;

        loop {
            if self.is_cancelled() {
                return Err(ReconcileError::Cancelled { id: id.to_owned() });
            }

            attempt += 1;
            let fetched = api.get_service(id).await;
            if let Some(metrics) = &self.metrics {
                metrics.record_poll();
                metrics.record_call("get_service", fetched.is_ok());
            }
            let state = fetched.map_err(|source| ReconcileError::PollFailed {
                id: id.to_owned(),
                source,
            })?;

            if state.status.is_terminal() {
                info!(
                    service_id = id,
                    status = %state.status,
                    attempts = attempt,
                    waited_ms = started.elapsed().as_millis() as u64,
                    "service provisioned"
                );
                return Ok(state);
            }

            debug!(service_id = id, attempt, status = %state.status, "service still provisioning");

            let pause = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(ReconcileError::PollTimeout {
                            id: id.to_owned(),
                            waited: now - started,
                        });
                    }
                    self.settings.interval.min(deadline - now)
                }
                None => self.settings.interval,
            };
            self.pause(id, pause).await?;
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel
            .as_ref()
            .map(|cancel| *cancel.borrow())
            .unwrap_or(false)
    }

    async fn pause(&mut self, id: &str, duration: Duration) -> Result<()> {
        let sleep = tokio::time::sleep(duration);
        tokio::pin!(sleep);

        let Some(cancel) = self.cancel.as_mut() else {
            sleep.await;
            return Ok(());
        };

        loop {
            tokio::select! {
                _ = &mut sleep => return Ok(()),
                changed = cancel.changed() => {
                    if changed.is_err() {
                        // Sender dropped; cancellation can no longer arrive.
                        (&mut sleep).await;
                        return Ok(());
                    }
                    if *cancel.borrow() {
                        return Err(ReconcileError::Cancelled { id: id.to_owned() });
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_follow_configuration() {
        let config = PollerConfig {
            interval: Duration::from_secs(2),
            timeout: None,
        };
        let settings = PollSettings::from_config(&config);
        assert_eq!(settings.interval, Duration::from_secs(2));
        assert_eq!(settings.timeout, None);
        assert_eq!(PollSettings::default().interval, Duration::from_secs(5));

        let unbounded = PollerConfig {
            interval: Duration::from_secs(2),
            timeout: Some(Duration::ZERO),
        };
        assert_eq!(PollSettings::from_config(&unbounded).timeout, None);
    }
}
