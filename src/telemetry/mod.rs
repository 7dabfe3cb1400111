//! Telemetry module
//!
//! Metrics and logging

mod logging;
mod metrics;

pub use logging::init_logging;
pub use metrics::{event_relayed, init_metrics, persist_failure, run_finished, run_started};

use crate::config::TelemetryConfig;

/// Guard that cleans up telemetry on drop
pub struct TelemetryGuard {
    _priv: (),
}

/// Initialize all telemetry subsystems
pub fn init_telemetry(config: &TelemetryConfig) -> anyhow::Result<TelemetryGuard> {
    init_logging(&config.log_level)?;
    init_metrics(config.metrics_port)?;

    Ok(TelemetryGuard { _priv: () })
}
