//! Orchestrator request, outcome and error types

use crate::compiler::CompileError;
use crate::store::RunStatus;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

/// Request to start one backtest run
#[derive(Debug, Clone)]
pub struct StartRequest {
    pub bot_id: String,
    pub user_id: String,
    /// Historical window start
    pub start: DateTime<Utc>,
    /// Historical window end
    pub end: DateTime<Utc>,
    /// Display name for the run
    pub name: String,
    /// Per-call deadline override; the configured default applies when unset
    pub deadline: Option<Duration>,
}

/// What a finished `start` call reports
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub run_id: String,
    pub status: RunStatus,
    /// Sequence numbers issued over the run's lifetime
    pub records: u64,
}

/// One event forwarded to the caller's live relay
#[derive(Debug, Clone, Serialize)]
pub struct RelayEvent {
    /// Event type tag
    #[serde(rename = "type")]
    pub event_type: String,
    /// Event payload
    pub data: serde_json::Value,
}

/// Caller-supplied live relay sink
///
/// `emit` is fire-and-forget: it must not block, and a slow or dropped
/// consumer never stalls event handling.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: RelayEvent);
}

impl EventSink for mpsc::UnboundedSender<RelayEvent> {
    fn emit(&self, event: RelayEvent) {
        // Receiver may be gone; the relay is best-effort.
        let _ = self.send(event);
    }
}

/// Orchestrator errors
///
/// Everything except `Upstream` and `Timeout` is rejected before a run
/// record exists. Individual persistence failures are logged, never
/// surfaced.
#[derive(Debug, Error)]
pub enum BacktestError {
    /// Unknown bot id
    #[error("bot {0} not found")]
    NotFound(String),
    /// The caller does not own the bot
    #[error("user {user_id} is not authorized to access bot {bot_id}")]
    Unauthorized { user_id: String, bot_id: String },
    /// The bot configuration does not compile
    #[error("invalid bot configuration: {0}")]
    Validation(#[from] CompileError),
    /// The bot already has a run in flight
    #[error("bot {0} already has a backtest in flight")]
    AlreadyRunning(String),
    /// The compiled spec could not be serialized
    #[error("failed to serialize execution spec: {0}")]
    Serialize(#[from] serde_json::Error),
    /// Bot lookup or run creation failed
    #[error("store failure: {0}")]
    Store(String),
    /// The compute transport failed after the call was opened
    #[error("compute failure: {0}")]
    Upstream(String),
    /// The run outlived its deadline
    #[error("backtest exceeded its deadline of {0:?}")]
    Timeout(Duration),
}
