// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Snapshot client: push-channel subscription with automatic reconnection.
//!
//! Maintains a persistent connection to the upstream feed and emits decoded
//! snapshot batches plus connection state changes. If the very first
//! connection attempt fails, performs exactly one fallback pull request to
//! obtain an initial batch, then leaves the feed disconnected until the
//! reconnect loop succeeds. Supports address hot-reload and graceful
//! shutdown, and forwards best-effort subscribe/unsubscribe hints while
//! connected.

pub mod protocol;

use std::time::Duration;

use log::{debug, error, info, warn};
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use protocol::{parse_batch, FeedBatch, HintMessage};

/// Errors surfaced by the feed layer.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("http error: {0}")]
    Http(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration for the feed connection.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// Push-channel address in "host:port" format.
    pub address: String,
    /// Optional pull endpoint used once if the initial connect fails.
    pub fallback_url: Option<String>,
    /// Delay before reconnecting after disconnect.
    pub reconnect_delay: Duration,
    /// Channel buffer size for emitted events.
    pub buffer_size: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            address: "localhost:9030".to_string(),
            fallback_url: None,
            reconnect_delay: Duration::from_secs(5),
            buffer_size: 64,
        }
    }
}

/// Feed connection state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedState {
    /// Attempting to connect.
    Connecting,
    /// Successfully connected and subscribed.
    Connected,
    /// Disconnected (will attempt reconnect).
    Disconnected,
    /// Connection error occurred.
    Error(String),
}

impl FeedState {
    /// Whether this state counts as connected for the observable flag.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

/// Events emitted by the feed.
#[derive(Debug, Clone)]
pub enum FeedEvent {
    /// Connection state changed.
    StateChanged(FeedState),
    /// A snapshot batch arrived (push channel or fallback pull).
    Batch(FeedBatch),
}

/// Handle to a managed feed connection.
///
/// The connection runs in a background task and automatically reconnects on
/// disconnect. Use `recv()` to receive events, `set_address()` to change the
/// server at runtime, and `shutdown()` to tear down. Dropping the handle also
/// cancels the task.
pub struct Feed {
    event_rx: mpsc::Receiver<FeedEvent>,
    hint_tx: mpsc::UnboundedSender<HintMessage>,
    address_tx: watch::Sender<String>,
    cancel_token: CancellationToken,
}

impl std::fmt::Debug for Feed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Feed")
            .field("cancel_token", &self.cancel_token)
            .finish_non_exhaustive()
    }
}

impl Feed {
    /// Spawn a new feed task with the given configuration.
    #[must_use]
    pub fn spawn(config: FeedConfig) -> Self {
        let (event_tx, event_rx) = mpsc::channel(config.buffer_size);
        let (hint_tx, hint_rx) = mpsc::unbounded_channel();
        let (address_tx, address_rx) = watch::channel(config.address.clone());
        let cancel_token = CancellationToken::new();

        let task_cancel = cancel_token.clone();
        tokio::spawn(async move {
            feed_loop(config, event_tx, address_rx, hint_rx, task_cancel).await;
        });

        Self {
            event_rx,
            hint_tx,
            address_tx,
            cancel_token,
        }
    }

    /// Receive the next event from the feed.
    ///
    /// Returns `None` after shutdown.
    pub async fn recv(&mut self) -> Option<FeedEvent> {
        self.event_rx.recv().await
    }

    /// Send a best-effort subscribe hint for an entity id.
    ///
    /// Delivered only while connected; failures are logged upstream and
    /// never surfaced here.
    pub fn subscribe_hint(&self, id: impl Into<String>) {
        let _ = self.hint_tx.send(HintMessage::Subscribe { id: id.into() });
    }

    /// Send a best-effort unsubscribe hint for an entity id.
    pub fn unsubscribe_hint(&self, id: impl Into<String>) {
        let _ = self.hint_tx.send(HintMessage::Unsubscribe { id: id.into() });
    }

    /// Change the server address.
    ///
    /// The connection will disconnect and reconnect to the new address.
    pub fn set_address(&self, address: String) {
        let _ = self.address_tx.send(address);
    }

    /// Get the current server address.
    #[must_use]
    pub fn current_address(&self) -> String {
        self.address_tx.borrow().clone()
    }

    /// Shut down the feed. Synchronous and idempotent.
    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }
}

impl Drop for Feed {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

enum ReconnectReason {
    AddressChanged,
    ConnectionClosed,
    Cancelled,
}

async fn feed_loop(
    config: FeedConfig,
    event_tx: mpsc::Sender<FeedEvent>,
    mut address_rx: watch::Receiver<String>,
    mut hint_rx: mpsc::UnboundedReceiver<HintMessage>,
    cancel_token: CancellationToken,
) {
    let mut first_attempt = true;

    loop {
        if cancel_token.is_cancelled() {
            info!("Feed cancelled");
            return;
        }

        let current_address = address_rx.borrow_and_update().clone();

        // Hints are only meaningful while connected; anything queued while
        // the connection was down is stale by the time we reconnect.
        while hint_rx.try_recv().is_ok() {}

        if event_tx
            .send(FeedEvent::StateChanged(FeedState::Connecting))
            .await
            .is_err()
        {
            return; // Receiver dropped
        }

        info!("Connecting to feed at {}...", current_address);

        match connect_and_stream(
            &current_address,
            &event_tx,
            &mut address_rx,
            &mut hint_rx,
            &cancel_token,
        )
        .await
        {
            Ok(reason) => match reason {
                ReconnectReason::AddressChanged => {
                    info!("Feed address changed, reconnecting immediately...");
                    first_attempt = false;
                    continue;
                }
                ReconnectReason::ConnectionClosed => {
                    info!("Feed connection closed normally");
                    let _ = event_tx
                        .send(FeedEvent::StateChanged(FeedState::Disconnected))
                        .await;
                }
                ReconnectReason::Cancelled => {
                    info!("Feed cancelled");
                    return;
                }
            },
            Err(e) => {
                error!("Feed connection error: {}", e);
                let _ = event_tx
                    .send(FeedEvent::StateChanged(FeedState::Error(e.to_string())))
                    .await;

                // One-shot fallback pull, only for the very first attempt.
                if first_attempt {
                    if let Some(url) = &config.fallback_url {
                        fallback_fetch(url, &event_tx).await;
                    }
                }

                let _ = event_tx
                    .send(FeedEvent::StateChanged(FeedState::Disconnected))
                    .await;
            }
        }

        first_attempt = false;
        warn!(
            "Reconnecting to feed in {} seconds...",
            config.reconnect_delay.as_secs()
        );

        tokio::select! {
            () = sleep(config.reconnect_delay) => {}
            () = cancel_token.cancelled() => {
                info!("Feed cancelled during reconnect delay");
                return;
            }
        }
    }
}

async fn connect_and_stream(
    address: &str,
    event_tx: &mpsc::Sender<FeedEvent>,
    address_rx: &mut watch::Receiver<String>,
    hint_rx: &mut mpsc::UnboundedReceiver<HintMessage>,
    cancel_token: &CancellationToken,
) -> Result<ReconnectReason, FeedError> {
    let stream = TcpStream::connect(address).await?;
    info!("Connected to feed at {}", address);

    if event_tx
        .send(FeedEvent::StateChanged(FeedState::Connected))
        .await
        .is_err()
    {
        return Ok(ReconnectReason::Cancelled);
    }

    let (read_half, mut write_half) = stream.into_split();
    let reader = BufReader::new(read_half);
    let mut lines = reader.lines();

    loop {
        tokio::select! {
            line_result = lines.next_line() => {
                match line_result {
                    Ok(Some(line)) => {
                        match parse_batch(&line) {
                            Ok(Some(batch)) => {
                                if event_tx.send(FeedEvent::Batch(batch)).await.is_err() {
                                    return Ok(ReconnectReason::Cancelled);
                                }
                            }
                            Ok(None) => {} // keep-alive
                            Err(e) => {
                                warn!("Skipping malformed batch: {}", e);
                            }
                        }
                    }
                    Ok(None) => {
                        info!("Feed connection closed by server");
                        return Ok(ReconnectReason::ConnectionClosed);
                    }
                    Err(e) => {
                        return Err(FeedError::Io(e));
                    }
                }
            }

            hint = hint_rx.recv() => {
                if let Some(hint) = hint {
                    send_hint(&mut write_half, &hint).await;
                }
            }

            _ = address_rx.changed() => {
                let new_address = address_rx.borrow_and_update().clone();
                if new_address != address {
                    info!("Feed address changed from {} to {}", address, new_address);
                    return Ok(ReconnectReason::AddressChanged);
                }
            }

            () = cancel_token.cancelled() => {
                return Ok(ReconnectReason::Cancelled);
            }
        }
    }
}

/// Write a hint line to the server. Failures are logged and swallowed:
/// hints are advisory and must never take the connection down.
async fn send_hint(write_half: &mut tokio::net::tcp::OwnedWriteHalf, hint: &HintMessage) {
    let line = match hint.to_line() {
        Ok(line) => line,
        Err(e) => {
            warn!("Failed to encode hint: {}", e);
            return;
        }
    };

    if let Err(e) = write_half.write_all(line.as_bytes()).await {
        warn!("Failed to send hint: {}", e);
    } else {
        debug!("Sent hint: {}", line.trim_end());
    }
}

async fn fallback_fetch(url: &str, event_tx: &mpsc::Sender<FeedEvent>) {
    info!("Push channel unavailable, attempting one-shot fallback pull from {}", url);

    match fetch_batch(url).await {
        Ok(batch) => {
            info!("Fallback pull returned {} entities", batch.entities.len());
            let _ = event_tx.send(FeedEvent::Batch(batch)).await;
        }
        Err(e) => {
            warn!("Fallback pull failed: {}", e);
        }
    }
}

async fn fetch_batch(url: &str) -> Result<FeedBatch, FeedError> {
    let response = reqwest::get(url).await?;

    if !response.status().is_success() {
        return Err(FeedError::Http(response.status().to_string()));
    }

    Ok(response.json().await?)
}
