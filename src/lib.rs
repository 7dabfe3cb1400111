//! tradegraph: Backtest orchestrator for agent-graph trading bots
//!
//! This library provides the core components for:
//! - Bot configuration graphs and their storage
//! - Graph compilation into flattened execution specs
//! - Streaming backtest calls against the compute service
//! - Run lifecycle orchestration with sequence-numbered persistence
//! - Live event relay to interested callers
//! - Full observability stack

pub mod bot;
pub mod cli;
pub mod compiler;
pub mod compute;
pub mod config;
pub mod orchestrator;
pub mod store;
pub mod telemetry;
