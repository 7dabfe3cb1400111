//! WebSocket compute transport
//!
//! One call, one connection: the run request goes out as the first text
//! frame, events come back as text frames until a terminal event, the
//! deadline elapses, or the caller cancels. No reconnection; a failed call
//! is surfaced and the caller decides whether to start over.

use super::types::{ComputeError, ComputeEvent, RunRequest, WireEvent};
use super::{CancelHandle, ComputeClient, ComputeStream};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// WebSocket implementation of [`ComputeClient`]
pub struct WsComputeClient {
    url: String,
}

impl WsComputeClient {
    /// Create a client for the given compute endpoint
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// The configured endpoint
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ComputeClient for WsComputeClient {
    async fn open(
        &self,
        request: RunRequest,
        deadline: Duration,
    ) -> Result<ComputeStream, ComputeError> {
        tracing::info!(url = %self.url, run_id = %request.id, "Opening compute stream");

        let (ws_stream, _response) = connect_async(&self.url)
            .await
            .map_err(|e| ComputeError::Connect(e.to_string()))?;
        let (mut write, mut read) = ws_stream.split();

        let frame = serde_json::to_string(&request)
            .map_err(|e| ComputeError::Send(e.to_string()))?;
        write
            .send(Message::Text(frame))
            .await
            .map_err(|e| ComputeError::Send(e.to_string()))?;

        let (tx, rx) = mpsc::channel(1024);
        let cancel = CancelHandle::new();
        let cancel_task = cancel.clone();
        let run_id = request.id;

        tokio::spawn(async move {
            let deadline_at = tokio::time::Instant::now() + deadline;

            loop {
                tokio::select! {
                    _ = cancel_task.cancelled() => {
                        tracing::info!(run_id = %run_id, "Compute call cancelled");
                        let _ = write.send(Message::Close(None)).await;
                        break;
                    }

                    _ = tokio::time::sleep_until(deadline_at) => {
                        tracing::warn!(run_id = %run_id, ?deadline, "Compute call deadline exceeded");
                        let _ = tx.send(Err(ComputeError::DeadlineExceeded(deadline))).await;
                        let _ = write.send(Message::Close(None)).await;
                        break;
                    }

                    msg = read.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                let wire: WireEvent = match serde_json::from_str(&text) {
                                    Ok(wire) => wire,
                                    Err(e) => {
                                        tracing::warn!(run_id = %run_id, error = %e, "Skipping malformed compute frame");
                                        continue;
                                    }
                                };

                                let event = ComputeEvent::from_wire(wire);
                                let terminal = event.kind.is_terminal();
                                if tx.send(Ok(event)).await.is_err() {
                                    tracing::debug!(run_id = %run_id, "Stream consumer dropped, closing call");
                                    break;
                                }
                                if terminal {
                                    break;
                                }
                            }
                            Some(Ok(Message::Ping(data))) => {
                                let _ = write.send(Message::Pong(data)).await;
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                tracing::info!(run_id = %run_id, "Compute stream closed");
                                break;
                            }
                            Some(Err(e)) => {
                                let _ = tx.send(Err(ComputeError::Transport(e.to_string()))).await;
                                break;
                            }
                            _ => {}
                        }
                    }
                }
            }
        });

        Ok(ComputeStream::new(rx, cancel))
    }
}
