//! Prometheus metrics

use metrics::counter;
use metrics_exporter_prometheus::PrometheusBuilder;

/// Start the Prometheus scrape endpoint on the given port
pub fn init_metrics(port: u16) -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .map_err(|e| anyhow::anyhow!("Failed to start metrics exporter: {}", e))?;

    Ok(())
}

/// Count a backtest run entering the state machine
pub fn run_started() {
    counter!("tradegraph_runs_started_total").increment(1);
}

/// Count a backtest run reaching a terminal state
pub fn run_finished(status: &str) {
    counter!("tradegraph_runs_finished_total", "status" => status.to_string()).increment(1);
}

/// Count one event forwarded to the live relay
pub fn event_relayed(event_type: &str) {
    counter!("tradegraph_events_relayed_total", "type" => event_type.to_string()).increment(1);
}

/// Count one dropped persistence write
pub fn persist_failure(kind: &str) {
    counter!("tradegraph_persist_failures_total", "kind" => kind.to_string()).increment(1);
}
