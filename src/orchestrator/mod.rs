//! Backtest orchestrator
//!
//! Owns the lifecycle of one backtest run: loads the bot, compiles its
//! graph, opens the streaming compute call, stamps every inbound event with
//! a sequence number, fans stamped events out to persistence and to the
//! caller's live relay, and finalizes the run status.
//!
//! Each run is driven by exactly one orchestrator task; the sequence counter
//! is therefore single-writer, but kept atomic so handler code stays correct
//! on a multi-threaded runtime.

mod events;
mod types;

pub use types::{BacktestError, EventSink, RelayEvent, RunOutcome, StartRequest};

use crate::bot::BotStore;
use crate::compiler::compile;
use crate::compute::{CancelHandle, ComputeClient, ComputeError, EventKind, RunRequest};
use crate::config::Config;
use crate::store::{
    BacktestRun, BacktestStore, EventRecord, PortfolioRecord, RunMetadata, RunStatus, TradeRecord,
};
use crate::telemetry;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use uuid::Uuid;

/// Fixed step descriptors for the synthetic preparing-progress events
const PREPARE_STEPS: [&str; 2] = [
    "Initializing backtest environment...",
    "Loading historical data...",
];

/// Drives backtest runs against the compute service
pub struct Orchestrator<B, C, S> {
    bots: Arc<B>,
    compute: Arc<C>,
    store: Arc<S>,
    config: Config,
    /// One in-flight run per bot
    active: Mutex<HashMap<String, ActiveRun>>,
}

struct ActiveRun {
    run_id: String,
    cancel: CancelHandle,
}

/// How the event loop ended
enum RunEnd {
    /// Explicit completion signal
    Completed,
    /// Stream closed cleanly without a completion signal
    Closed,
    /// Compute-side error event
    Engine(String),
    /// Stream-level transport failure
    Transport(String),
    /// Deadline elapsed, call cancelled
    DeadlineExceeded(Duration),
    /// Cancelled through `stop`
    Cancelled,
}

/// Work items for the persistence subscriber
enum PersistCmd {
    Event(EventRecord),
    Trade(TradeRecord),
    Snapshot(PortfolioRecord),
}

impl<B, C, S> Orchestrator<B, C, S>
where
    B: BotStore,
    C: ComputeClient,
    S: BacktestStore + 'static,
{
    /// Create an orchestrator over its three collaborators
    pub fn new(bots: Arc<B>, compute: Arc<C>, store: Arc<S>, config: Config) -> Self {
        Self {
            bots,
            compute,
            store,
            config,
            active: Mutex::new(HashMap::new()),
        }
    }

    /// Run one backtest to completion, relaying events to `sink`
    ///
    /// Ownership and configuration problems are rejected before any compute
    /// contact and before a run record exists. Once the stream is open, the
    /// run always ends in a terminal status.
    pub async fn start<K: EventSink>(
        &self,
        request: StartRequest,
        sink: K,
    ) -> Result<RunOutcome, BacktestError> {
        let bot = self
            .bots
            .bot(&request.bot_id)
            .await
            .map_err(|e| BacktestError::Store(e.to_string()))?
            .ok_or_else(|| BacktestError::NotFound(request.bot_id.clone()))?;

        // Owner mismatch fails before any compute-service contact.
        if bot.user_id != request.user_id {
            return Err(BacktestError::Unauthorized {
                user_id: request.user_id.clone(),
                bot_id: request.bot_id.clone(),
            });
        }

        let spec = compile(&bot.configuration, &self.config.pipeline)?;
        let spec_json = spec.to_json()?;

        let run_id = Uuid::new_v4().to_string();
        let stop_signal = CancelHandle::new();
        {
            let mut active = self.active.lock().await;
            if active.contains_key(&request.bot_id) {
                return Err(BacktestError::AlreadyRunning(request.bot_id.clone()));
            }
            active.insert(
                request.bot_id.clone(),
                ActiveRun {
                    run_id: run_id.clone(),
                    cancel: stop_signal.clone(),
                },
            );
        }

        let result = self
            .drive(&request, run_id, spec_json, stop_signal, &sink)
            .await;

        let mut active = self.active.lock().await;
        active.remove(&request.bot_id);
        result
    }

    /// Signal cancellation of an in-flight run
    ///
    /// Idempotent: stopping a run that is already terminal, or was never
    /// started, is a no-op success.
    pub async fn stop(
        &self,
        bot_id: &str,
        user_id: &str,
        run_id: &str,
    ) -> Result<(), BacktestError> {
        let bot = self
            .bots
            .bot(bot_id)
            .await
            .map_err(|e| BacktestError::Store(e.to_string()))?
            .ok_or_else(|| BacktestError::NotFound(bot_id.to_string()))?;

        if bot.user_id != user_id {
            return Err(BacktestError::Unauthorized {
                user_id: user_id.to_string(),
                bot_id: bot_id.to_string(),
            });
        }

        let active = self.active.lock().await;
        if let Some(entry) = active.get(bot_id) {
            if entry.run_id == run_id {
                tracing::info!(run_id, "Stopping backtest run");
                entry.cancel.cancel();
            }
        }
        Ok(())
    }

    /// Past runs for a user and bot
    pub async fn history(
        &self,
        user_id: &str,
        bot_id: &str,
    ) -> Result<Vec<BacktestRun>, BacktestError> {
        self.store
            .runs_for(user_id, bot_id)
            .await
            .map_err(|e| BacktestError::Store(e.to_string()))
    }

    /// Drive a single run through its state machine
    async fn drive<K: EventSink>(
        &self,
        request: &StartRequest,
        run_id: String,
        spec_json: String,
        stop_signal: CancelHandle,
        sink: &K,
    ) -> Result<RunOutcome, BacktestError> {
        let run = BacktestRun {
            id: run_id.clone(),
            bot_id: request.bot_id.clone(),
            user_id: request.user_id.clone(),
            status: RunStatus::Created,
            start_date: request.start,
            end_date: request.end,
            metadata: RunMetadata {
                name: request.name.clone(),
                note: None,
            },
        };
        self.store
            .create_run(&run)
            .await
            .map_err(|e| BacktestError::Store(e.to_string()))?;
        telemetry::run_started();
        tracing::info!(run_id = %run_id, bot_id = %request.bot_id, "Backtest run created");

        self.transition(&run_id, RunStatus::Preparing, None).await;
        self.emit_prepare_steps(sink).await;

        self.transition(&run_id, RunStatus::Running, None).await;
        let deadline = request.deadline.unwrap_or(self.config.compute.deadline());
        let open_result = self
            .compute
            .open(
                RunRequest {
                    id: run_id.clone(),
                    spec_json,
                    start_iso: request.start.to_rfc3339(),
                    end_iso: request.end.to_rfc3339(),
                },
                deadline,
            )
            .await;

        let mut stream = match open_result {
            Ok(stream) => stream,
            Err(e) => {
                sink.emit(error_relay_event(&e.to_string()));
                self.transition(&run_id, RunStatus::Failed, Some(e.to_string()))
                    .await;
                telemetry::run_finished("failed");
                return Err(map_compute_error(e));
            }
        };

        // Persistence runs as its own subscriber so a slow or failing write
        // never holds up event arrival or the live relay.
        let (persist_tx, persist_rx) = mpsc::unbounded_channel();
        let persist_worker = spawn_persist_worker(self.store.clone(), persist_rx);

        let sequence = AtomicU64::new(0);
        let next_seq = || sequence.fetch_add(1, Ordering::SeqCst);

        let end = loop {
            tokio::select! {
                _ = stop_signal.cancelled() => {
                    stream.cancel_handle().cancel();
                    break RunEnd::Cancelled;
                }

                item = stream.next_event() => match item {
                    None => break RunEnd::Closed,
                    Some(Err(ComputeError::DeadlineExceeded(after))) => {
                        break RunEnd::DeadlineExceeded(after);
                    }
                    Some(Err(e)) => break RunEnd::Transport(e.to_string()),
                    Some(Ok(event)) => {
                        telemetry::event_relayed(&event.event_type);

                        match event.kind {
                            EventKind::Complete => {
                                sink.emit(RelayEvent {
                                    event_type: event.event_type,
                                    data: event.payload,
                                });
                                break RunEnd::Completed;
                            }

                            EventKind::Error => {
                                let message = events::error_message(&event.payload);
                                let _ = persist_tx.send(PersistCmd::Event(EventRecord {
                                    backtest_id: run_id.clone(),
                                    event_type: event.event_type.clone(),
                                    event_data: event.payload.clone(),
                                    timestamp: Utc::now(),
                                    sequence_number: next_seq(),
                                }));
                                sink.emit(RelayEvent {
                                    event_type: event.event_type,
                                    data: event.payload,
                                });
                                break RunEnd::Engine(message);
                            }

                            EventKind::Trade => {
                                match events::normalize_trades(&event.payload) {
                                    Ok(fills) => {
                                        for fill in fills {
                                            let _ = persist_tx.send(PersistCmd::Trade(TradeRecord {
                                                backtest_id: run_id.clone(),
                                                sequence_number: next_seq(),
                                                fill,
                                            }));
                                        }
                                    }
                                    Err(e) => {
                                        tracing::warn!(run_id = %run_id, error = %e, "Unrecognized trade payload, persisting raw");
                                        let _ = persist_tx.send(PersistCmd::Event(EventRecord {
                                            backtest_id: run_id.clone(),
                                            event_type: event.event_type.clone(),
                                            event_data: event.payload.clone(),
                                            timestamp: Utc::now(),
                                            sequence_number: next_seq(),
                                        }));
                                    }
                                }
                                sink.emit(RelayEvent {
                                    event_type: event.event_type,
                                    data: event.payload,
                                });
                            }

                            EventKind::Portfolio => {
                                match events::normalize_portfolio(&event.payload) {
                                    Ok(snapshots) => {
                                        for snapshot in snapshots {
                                            let timestamp =
                                                snapshot.timestamp.unwrap_or_else(Utc::now);
                                            let _ = persist_tx.send(PersistCmd::Snapshot(
                                                PortfolioRecord {
                                                    backtest_id: run_id.clone(),
                                                    sequence_number: next_seq(),
                                                    timestamp,
                                                    snapshot,
                                                },
                                            ));
                                        }
                                    }
                                    Err(e) => {
                                        tracing::warn!(run_id = %run_id, error = %e, "Unrecognized portfolio payload, persisting raw");
                                        let _ = persist_tx.send(PersistCmd::Event(EventRecord {
                                            backtest_id: run_id.clone(),
                                            event_type: event.event_type.clone(),
                                            event_data: event.payload.clone(),
                                            timestamp: Utc::now(),
                                            sequence_number: next_seq(),
                                        }));
                                    }
                                }
                                sink.emit(RelayEvent {
                                    event_type: event.event_type,
                                    data: event.payload,
                                });
                            }

                            _ => {
                                let _ = persist_tx.send(PersistCmd::Event(EventRecord {
                                    backtest_id: run_id.clone(),
                                    event_type: event.event_type.clone(),
                                    event_data: event.payload.clone(),
                                    timestamp: Utc::now(),
                                    sequence_number: next_seq(),
                                }));
                                sink.emit(RelayEvent {
                                    event_type: event.event_type,
                                    data: event.payload,
                                });
                            }
                        }
                    }
                }
            }
        };

        // Let in-flight persistence drain before the run turns terminal;
        // terminal runs accept no further records.
        drop(persist_tx);
        let _ = persist_worker.await;

        let records = sequence.load(Ordering::SeqCst);
        match end {
            RunEnd::Completed | RunEnd::Closed => {
                self.transition(&run_id, RunStatus::Completed, None).await;
                telemetry::run_finished("completed");
                tracing::info!(run_id = %run_id, records, "Backtest run completed");
                Ok(RunOutcome {
                    run_id,
                    status: RunStatus::Completed,
                    records,
                })
            }
            RunEnd::Cancelled => {
                self.transition(&run_id, RunStatus::Failed, Some("cancelled by user".to_string()))
                    .await;
                telemetry::run_finished("cancelled");
                tracing::info!(run_id = %run_id, records, "Backtest run cancelled");
                Ok(RunOutcome {
                    run_id,
                    status: RunStatus::Failed,
                    records,
                })
            }
            RunEnd::Engine(message) => {
                self.transition(&run_id, RunStatus::Failed, Some(message.clone()))
                    .await;
                telemetry::run_finished("failed");
                Err(BacktestError::Upstream(message))
            }
            RunEnd::Transport(message) => {
                // The relay must not go quiet on a failure the caller's
                // return path never reaches; push-channel consumers see the
                // run die through a final error event.
                sink.emit(error_relay_event(&message));
                self.transition(&run_id, RunStatus::Failed, Some(message.clone()))
                    .await;
                telemetry::run_finished("failed");
                Err(BacktestError::Upstream(message))
            }
            RunEnd::DeadlineExceeded(after) => {
                let message = format!("deadline exceeded after {:?}", after);
                sink.emit(error_relay_event(&message));
                self.transition(&run_id, RunStatus::Failed, Some(message)).await;
                telemetry::run_finished("timeout");
                Err(BacktestError::Timeout(after))
            }
        }
    }

    /// Emit the synthetic preparing-progress events
    ///
    /// Cosmetic only: relayed to the caller, never persisted, and not tied
    /// to real compute progress.
    async fn emit_prepare_steps<K: EventSink>(&self, sink: &K) {
        let delay = self.config.orchestrator.prepare_step_delay();
        for (index, step_text) in PREPARE_STEPS.iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(delay).await;
            }
            sink.emit(RelayEvent {
                event_type: "progressPrepare".to_string(),
                data: serde_json::json!({
                    "step": index + 1,
                    "progress": (index + 1) * 100 / PREPARE_STEPS.len(),
                    "stepText": step_text,
                }),
            });
        }
    }

    /// Apply a status transition, logging instead of failing the run when
    /// the write is rejected
    async fn transition(&self, run_id: &str, status: RunStatus, note: Option<String>) {
        if let Err(e) = self.store.update_status(run_id, status, note).await {
            telemetry::persist_failure("status");
            tracing::warn!(run_id, ?status, error = %e, "Run status update failed");
        }
    }
}

/// Final error event for the relay when the run dies without a
/// compute-side error event
fn error_relay_event(message: &str) -> RelayEvent {
    RelayEvent {
        event_type: "error".to_string(),
        data: serde_json::json!({ "error": message }),
    }
}

/// Map transport errors onto the orchestrator taxonomy
fn map_compute_error(error: ComputeError) -> BacktestError {
    match error {
        ComputeError::DeadlineExceeded(after) => BacktestError::Timeout(after),
        other => BacktestError::Upstream(other.to_string()),
    }
}

/// Spawn the persistence subscriber
///
/// Writes are applied in stamping order but independently of the relay;
/// failures are logged and swallowed; a dropped write never aborts a run.
fn spawn_persist_worker<S: BacktestStore + 'static>(
    store: Arc<S>,
    mut rx: mpsc::UnboundedReceiver<PersistCmd>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(cmd) = rx.recv().await {
            let result = match &cmd {
                PersistCmd::Event(record) => store.append_event(record).await,
                PersistCmd::Trade(record) => store.append_trade(record).await,
                PersistCmd::Snapshot(record) => store.append_portfolio(record).await,
            };
            if let Err(e) = result {
                let kind = match &cmd {
                    PersistCmd::Event(_) => "event",
                    PersistCmd::Trade(_) => "trade",
                    PersistCmd::Snapshot(_) => "portfolio",
                };
                telemetry::persist_failure(kind);
                tracing::warn!(kind, error = %e, "Record persistence failed, continuing");
            }
        }
    })
}
