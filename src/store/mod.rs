//! Backtest persistence gateway
//!
//! Durable storage of run, event, trade and portfolio records. The
//! orchestrator never assumes these calls complete in order relative to each
//! other or to the live relay; the stored sequence number is the only
//! ordering authority.

mod memory;
mod types;

pub use memory::MemoryStore;
pub use types::{
    BacktestRun, EventRecord, PortfolioRecord, PortfolioSnapshot, Position, RiskMetrics,
    RunMetadata, RunStatus, TradeFill, TradeRecord, TradeSide,
};

use async_trait::async_trait;

/// Trait for backtest persistence implementations
#[async_trait]
pub trait BacktestStore: Send + Sync {
    /// Create a run record
    async fn create_run(&self, run: &BacktestRun) -> anyhow::Result<()>;

    /// Transition a run's status, optionally attaching a note (failure
    /// reason, cancellation) to the run metadata
    ///
    /// Implementations reject transitions out of a terminal status.
    async fn update_status(
        &self,
        run_id: &str,
        status: RunStatus,
        note: Option<String>,
    ) -> anyhow::Result<()>;

    /// Append one event record
    async fn append_event(&self, event: &EventRecord) -> anyhow::Result<()>;

    /// Append one trade record
    async fn append_trade(&self, trade: &TradeRecord) -> anyhow::Result<()>;

    /// Append one portfolio snapshot record
    async fn append_portfolio(&self, snapshot: &PortfolioRecord) -> anyhow::Result<()>;

    /// List runs for a user and bot
    async fn runs_for(&self, user_id: &str, bot_id: &str) -> anyhow::Result<Vec<BacktestRun>>;
}
