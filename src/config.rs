//! Configuration types for tradegraph

use serde::Deserialize;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub compute: ComputeConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Compute service connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ComputeConfig {
    /// WebSocket URL of the compute engine
    #[serde(default = "default_compute_url")]
    pub url: String,

    /// Hard deadline for one backtest run (seconds)
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,
}

fn default_compute_url() -> String {
    "ws://localhost:50051/backtest".to_string()
}
fn default_deadline_secs() -> u64 {
    1800 // 30 minutes
}

impl Default for ComputeConfig {
    fn default() -> Self {
        Self {
            url: default_compute_url(),
            deadline_secs: default_deadline_secs(),
        }
    }
}

impl ComputeConfig {
    /// Run deadline as a [`Duration`]
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }
}

/// Pipeline compilation configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Quote asset every expanded data source trades against
    #[serde(default = "default_quote_asset")]
    pub quote_asset: String,

    /// Asset that absorbs the remaining exposure share when the
    /// configuration holds no tradable tokens
    #[serde(default = "default_fallback_asset")]
    pub fallback_asset: String,

    /// Message transport URL baked into the compiled pipeline
    #[serde(default = "default_transport_url")]
    pub transport_url: String,

    /// Model identifier assigned to every compiled agent
    #[serde(default = "default_model")]
    pub model: String,

    /// Inference endpoint assigned to every compiled agent
    #[serde(default = "default_model_url")]
    pub model_url: String,

    /// Candle interval used when a data source does not specify one
    #[serde(default = "default_interval")]
    pub default_interval: String,
}

fn default_quote_asset() -> String {
    "USDT".to_string()
}
fn default_fallback_asset() -> String {
    "ETH".to_string()
}
fn default_transport_url() -> String {
    "amqp://localhost".to_string()
}
fn default_model() -> String {
    "qwen3:0.6b".to_string()
}
fn default_model_url() -> String {
    "http://127.0.0.1:11434".to_string()
}
fn default_interval() -> String {
    "12h".to_string()
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            quote_asset: default_quote_asset(),
            fallback_asset: default_fallback_asset(),
            transport_url: default_transport_url(),
            model: default_model(),
            model_url: default_model_url(),
            default_interval: default_interval(),
        }
    }
}

/// Orchestrator behaviour configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OrchestratorConfig {
    /// Delay between the synthetic preparing-progress events (ms)
    #[serde(default = "default_prepare_step_delay_ms")]
    pub prepare_step_delay_ms: u64,
}

fn default_prepare_step_delay_ms() -> u64 {
    400
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            prepare_step_delay_ms: default_prepare_step_delay_ms(),
        }
    }
}

impl OrchestratorConfig {
    /// Preparing-step delay as a [`Duration`]
    pub fn prepare_step_delay(&self) -> Duration {
        Duration::from_millis(self.prepare_step_delay_ms)
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_metrics_port() -> u16 {
    9090
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            metrics_port: default_metrics_port(),
            log_level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}
