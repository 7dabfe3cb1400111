//! In-memory persistence gateway

use super::types::{BacktestRun, EventRecord, PortfolioRecord, RunStatus, TradeRecord};
use super::BacktestStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory [`BacktestStore`] backed by a shared map
///
/// Used by the CLI and by tests; a document-store implementation plugs in
/// behind the same trait.
#[derive(Default, Clone)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
}

#[derive(Default)]
struct Inner {
    runs: HashMap<String, BacktestRun>,
    events: Vec<EventRecord>,
    trades: Vec<TradeRecord>,
    snapshots: Vec<PortfolioRecord>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch a run by id
    pub async fn run(&self, run_id: &str) -> Option<BacktestRun> {
        let inner = self.inner.read().await;
        inner.runs.get(run_id).cloned()
    }

    /// Event records for one run, in insertion order
    pub async fn events_for(&self, run_id: &str) -> Vec<EventRecord> {
        let inner = self.inner.read().await;
        inner
            .events
            .iter()
            .filter(|e| e.backtest_id == run_id)
            .cloned()
            .collect()
    }

    /// Trade records for one run
    pub async fn trades_for(&self, run_id: &str) -> Vec<TradeRecord> {
        let inner = self.inner.read().await;
        inner
            .trades
            .iter()
            .filter(|t| t.backtest_id == run_id)
            .cloned()
            .collect()
    }

    /// Portfolio records for one run
    pub async fn snapshots_for(&self, run_id: &str) -> Vec<PortfolioRecord> {
        let inner = self.inner.read().await;
        inner
            .snapshots
            .iter()
            .filter(|s| s.backtest_id == run_id)
            .cloned()
            .collect()
    }

    /// All sequence numbers persisted for one run, across record types,
    /// in insertion order
    pub async fn sequence_numbers(&self, run_id: &str) -> Vec<u64> {
        let inner = self.inner.read().await;
        let mut numbers: Vec<u64> = inner
            .events
            .iter()
            .filter(|e| e.backtest_id == run_id)
            .map(|e| e.sequence_number)
            .chain(
                inner
                    .trades
                    .iter()
                    .filter(|t| t.backtest_id == run_id)
                    .map(|t| t.sequence_number),
            )
            .chain(
                inner
                    .snapshots
                    .iter()
                    .filter(|s| s.backtest_id == run_id)
                    .map(|s| s.sequence_number),
            )
            .collect();
        numbers.sort_unstable();
        numbers
    }
}

impl Inner {
    fn check_accepting(&self, run_id: &str) -> anyhow::Result<()> {
        match self.runs.get(run_id) {
            Some(run) if run.status.is_terminal() => {
                anyhow::bail!("run {} is terminal, record rejected", run_id)
            }
            Some(_) => Ok(()),
            None => anyhow::bail!("unknown run {}", run_id),
        }
    }
}

#[async_trait]
impl BacktestStore for MemoryStore {
    async fn create_run(&self, run: &BacktestRun) -> anyhow::Result<()> {
        let mut inner = self.inner.write().await;
        if inner.runs.contains_key(&run.id) {
            anyhow::bail!("run {} already exists", run.id);
        }
        inner.runs.insert(run.id.clone(), run.clone());
        Ok(())
    }

    async fn update_status(
        &self,
        run_id: &str,
        status: RunStatus,
        note: Option<String>,
    ) -> anyhow::Result<()> {
        let mut inner = self.inner.write().await;
        let run = inner
            .runs
            .get_mut(run_id)
            .ok_or_else(|| anyhow::anyhow!("unknown run {}", run_id))?;
        if run.status.is_terminal() {
            anyhow::bail!(
                "run {} is terminal ({:?}), cannot transition to {:?}",
                run_id,
                run.status,
                status
            );
        }
        run.status = status;
        if note.is_some() {
            run.metadata.note = note;
        }
        Ok(())
    }

    async fn append_event(&self, event: &EventRecord) -> anyhow::Result<()> {
        let mut inner = self.inner.write().await;
        inner.check_accepting(&event.backtest_id)?;
        inner.events.push(event.clone());
        Ok(())
    }

    async fn append_trade(&self, trade: &TradeRecord) -> anyhow::Result<()> {
        let mut inner = self.inner.write().await;
        inner.check_accepting(&trade.backtest_id)?;
        inner.trades.push(trade.clone());
        Ok(())
    }

    async fn append_portfolio(&self, snapshot: &PortfolioRecord) -> anyhow::Result<()> {
        let mut inner = self.inner.write().await;
        inner.check_accepting(&snapshot.backtest_id)?;
        inner.snapshots.push(snapshot.clone());
        Ok(())
    }

    async fn runs_for(&self, user_id: &str, bot_id: &str) -> anyhow::Result<Vec<BacktestRun>> {
        let inner = self.inner.read().await;
        Ok(inner
            .runs
            .values()
            .filter(|r| r.user_id == user_id && r.bot_id == bot_id)
            .cloned()
            .collect())
    }
}
