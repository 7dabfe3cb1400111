//! Compute wire types

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// The request opening one streaming backtest call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRequest {
    /// Run identifier, chosen by the orchestrator
    pub id: String,
    /// Serialized execution spec
    pub spec_json: String,
    /// ISO-8601 start bound
    pub start_iso: String,
    /// ISO-8601 end bound
    pub end_iso: String,
}

/// Raw event frame as the compute service sends it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireEvent {
    /// Event type tag
    #[serde(rename = "type")]
    pub event_type: String,
    /// JSON-encoded payload
    pub payload: String,
}

/// Recognized event classes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// Preparation progress (step, percent, text)
    ProgressPrepare,
    /// Backtest progress (percent)
    ProgressBacktest,
    /// One trade or a batch of trades
    Trade,
    /// Portfolio snapshot(s)
    Portfolio,
    /// Agent prompt echo
    Prompt,
    /// Kline batch
    Klines,
    /// Run finished successfully
    Complete,
    /// Compute-side failure
    Error,
    /// Anything this version does not know about
    Other,
}

impl EventKind {
    /// Classify a wire event type tag
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "progressPrepare" => EventKind::ProgressPrepare,
            "progressBacktest" => EventKind::ProgressBacktest,
            "trade" | "trades" => EventKind::Trade,
            "portfolio" => EventKind::Portfolio,
            "prompt" => EventKind::Prompt,
            "klines" => EventKind::Klines,
            "complete" => EventKind::Complete,
            "error" => EventKind::Error,
            _ => EventKind::Other,
        }
    }

    /// Whether this event terminates the stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, EventKind::Complete | EventKind::Error)
    }
}

/// A parsed inbound event
#[derive(Debug, Clone)]
pub struct ComputeEvent {
    /// Classified kind
    pub kind: EventKind,
    /// Original wire tag, preserved for persistence and relay
    pub event_type: String,
    /// Parsed payload
    pub payload: serde_json::Value,
}

impl ComputeEvent {
    /// Parse a wire frame
    ///
    /// A payload that is not valid JSON is kept as `{"raw": <string>}`
    /// rather than dropped; ordering matters more than payload hygiene.
    pub fn from_wire(wire: WireEvent) -> Self {
        let payload = serde_json::from_str(&wire.payload)
            .unwrap_or_else(|_| serde_json::json!({ "raw": wire.payload }));
        Self {
            kind: EventKind::from_tag(&wire.event_type),
            event_type: wire.event_type,
            payload,
        }
    }

    /// Build an event directly from a tag and payload
    pub fn synthetic(tag: &str, payload: serde_json::Value) -> Self {
        Self {
            kind: EventKind::from_tag(tag),
            event_type: tag.to_string(),
            payload,
        }
    }
}

/// Compute transport errors
#[derive(Debug, Clone, Error)]
pub enum ComputeError {
    /// Could not reach the compute service
    #[error("compute connection failed: {0}")]
    Connect(String),
    /// The call was opened but the stream broke
    #[error("compute transport failure: {0}")]
    Transport(String),
    /// Could not send the run request
    #[error("compute send failed: {0}")]
    Send(String),
    /// The call outlived its deadline and was cancelled
    #[error("compute call exceeded deadline of {0:?}")]
    DeadlineExceeded(Duration),
}
