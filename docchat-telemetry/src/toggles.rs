//! Startup switches for optional tracing and experiment tracking.

use tracing::{info, warn};

use crate::tracking::ExperimentTracker;

/// Which optional collaborators are switched on.
///
/// Resolved once at startup and handed to the answering pipeline; never
/// changed afterwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TelemetryToggles {
    pub tracing_enabled: bool,
    pub tracking_enabled: bool,
}

impl TelemetryToggles {
    pub fn new(tracing_enabled: bool, tracking_enabled: bool) -> Self {
        Self { tracing_enabled, tracking_enabled }
    }

    /// Both collaborators off.
    pub fn disabled() -> Self {
        Self::default()
    }

    /// Resolve the toggles: tracing as requested, tracking only if `tracker`
    /// answers a single probe.
    pub async fn resolve(
        tracing_requested: bool,
        tracker: Option<&dyn ExperimentTracker>,
    ) -> Self {
        let tracking_enabled = match tracker {
            Some(tracker) => match tracker.probe().await {
                Ok(()) => {
                    info!(tracker = tracker.name(), "experiment tracking enabled");
                    true
                }
                Err(e) => {
                    warn!(tracker = tracker.name(), error = %e, "experiment tracker unreachable, tracking disabled");
                    false
                }
            },
            None => false,
        };
        if tracing_requested {
            info!("tracing enabled");
        }
        Self { tracing_enabled: tracing_requested, tracking_enabled }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, TelemetryError};
    use crate::tracking::{InMemoryTracker, RunStatus};
    use async_trait::async_trait;

    struct Unreachable;

    #[async_trait]
    impl ExperimentTracker for Unreachable {
        fn name(&self) -> &str {
            "unreachable"
        }
        async fn probe(&self) -> Result<()> {
            Err(TelemetryError::Tracking { backend: "unreachable".into(), message: "refused".into() })
        }
        async fn start_run(&self, _: Option<&str>, _: bool) -> Result<String> {
            unreachable!()
        }
        async fn log_param(&self, _: &str, _: &str) -> Result<()> {
            unreachable!()
        }
        async fn log_metric(&self, _: &str, _: f64) -> Result<()> {
            unreachable!()
        }
        async fn log_text(&self, _: &str, _: &str) -> Result<()> {
            unreachable!()
        }
        async fn end_run(&self, _: RunStatus) -> Result<()> {
            unreachable!()
        }
    }

    #[tokio::test]
    async fn tracking_follows_probe() {
        let ok = InMemoryTracker::new();
        assert_eq!(
            TelemetryToggles::resolve(false, Some(&ok as &dyn ExperimentTracker)).await,
            TelemetryToggles::new(false, true)
        );
        assert_eq!(
            TelemetryToggles::resolve(true, Some(&Unreachable as &dyn ExperimentTracker)).await,
            TelemetryToggles::new(true, false)
        );
        assert_eq!(TelemetryToggles::resolve(false, None).await, TelemetryToggles::disabled());
    }
}
