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

//! Full-stack engine handle.
//!
//! Wires the feed, the core, and a marker layer together in one driver
//! task: feed events retarget motion segments, an animation-rate interval
//! ticks the core (commits gated to the publish cadence), and viewport or
//! selection changes commit immediately. The driver task owns every piece
//! of mutable state, including the feed connection; the handle talks to it
//! through a command channel only, so no locks guard engine state.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use log::info;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::core::{EngineConfig, LiveMapCore};
use crate::feed::{Feed, FeedConfig, FeedEvent};
use crate::reconcile::MarkerLayer;
use crate::sampler::{CategoryFilters, Viewport};
use crate::status::FeedStatus;

enum Command {
    SetViewport(Viewport),
    SetFilters(CategoryFilters),
    Select(Option<String>),
    Subscribe(String),
    Unsubscribe(String),
    SetFeedAddress(String),
}

/// Handle to a running live-map engine.
///
/// The engine runs in a background task. Dropping the handle or calling
/// `shutdown()` (synchronous, idempotent) stops the driver, the feed
/// connection, and all timers.
pub struct Engine {
    command_tx: mpsc::UnboundedSender<Command>,
    connected_rx: watch::Receiver<bool>,
    status: Arc<Mutex<FeedStatus>>,
    cancel_token: CancellationToken,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("cancel_token", &self.cancel_token)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Spawn the engine against a feed and a concrete marker layer.
    #[must_use]
    pub fn spawn<L>(config: EngineConfig, feed_config: FeedConfig, layer: L) -> Self
    where
        L: MarkerLayer + Send + 'static,
    {
        let feed = Feed::spawn(feed_config);
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (connected_tx, connected_rx) = watch::channel(false);
        let status = Arc::new(Mutex::new(FeedStatus::new()));
        let cancel_token = CancellationToken::new();

        let frame_interval = config.frame_interval;
        let core = LiveMapCore::new(config);

        tokio::spawn(driver_loop(
            core,
            layer,
            feed,
            command_rx,
            connected_tx,
            Arc::clone(&status),
            cancel_token.clone(),
            frame_interval,
        ));

        Self {
            command_tx,
            connected_rx,
            status,
            cancel_token,
        }
    }

    /// Update the map viewport. Triggers an immediate re-sample.
    pub fn set_viewport(&self, viewport: Viewport) {
        let _ = self.command_tx.send(Command::SetViewport(viewport));
    }

    /// Update the active category filters.
    pub fn set_filters(&self, filters: CategoryFilters) {
        let _ = self.command_tx.send(Command::SetFilters(filters));
    }

    /// Change or clear the selected entity. A new selection sends a
    /// subscribe hint upstream; the previous selection is unsubscribed.
    pub fn select(&self, id: Option<String>) {
        if let Some(id) = &id {
            let _ = self.command_tx.send(Command::Subscribe(id.clone()));
        }
        let _ = self.command_tx.send(Command::Select(id));
    }

    /// Send a best-effort subscribe hint for an entity id.
    pub fn subscribe_hint(&self, id: impl Into<String>) {
        let _ = self.command_tx.send(Command::Subscribe(id.into()));
    }

    /// Send a best-effort unsubscribe hint for an entity id.
    pub fn unsubscribe_hint(&self, id: impl Into<String>) {
        let _ = self.command_tx.send(Command::Unsubscribe(id.into()));
    }

    /// Change the feed address at runtime.
    pub fn set_feed_address(&self, address: String) {
        let _ = self.command_tx.send(Command::SetFeedAddress(address));
    }

    /// Observable connectivity flag.
    #[must_use]
    pub fn connected(&self) -> watch::Receiver<bool> {
        self.connected_rx.clone()
    }

    /// Snapshot of feed status and counters.
    #[must_use]
    pub fn status(&self) -> FeedStatus {
        self.status
            .lock()
            .map(|status| status.clone())
            .unwrap_or_default()
    }

    /// Stop the engine. Synchronous and idempotent.
    pub fn shutdown(&self) {
        self.cancel_token.cancel();
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

#[allow(
    clippy::too_many_arguments,
    reason = "driver wiring, called from one place"
)]
async fn driver_loop<L: MarkerLayer + Send + 'static>(
    mut core: LiveMapCore,
    mut layer: L,
    mut feed: Feed,
    mut command_rx: mpsc::UnboundedReceiver<Command>,
    connected_tx: watch::Sender<bool>,
    status: Arc<Mutex<FeedStatus>>,
    cancel_token: CancellationToken,
    frame_interval: Duration,
) {
    let mut frame = tokio::time::interval(frame_interval);
    frame.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    let mut cleanup = tokio::time::interval(Duration::from_secs(30));
    cleanup.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            event = feed.recv() => {
                match event {
                    Some(FeedEvent::StateChanged(state)) => {
                        let _ = connected_tx.send(state.is_connected());
                        if let Ok(mut status) = status.lock() {
                            status.set_state(state);
                        }
                    }
                    Some(FeedEvent::Batch(batch)) => {
                        core.apply_batch(&batch, Instant::now());
                        if let Ok(mut status) = status.lock() {
                            status.record_batch(core.entity_count());
                        }
                    }
                    None => break,
                }
            }

            command = command_rx.recv() => {
                match command {
                    Some(Command::SetViewport(viewport)) => {
                        core.set_viewport(viewport);
                        core.commit(Instant::now(), &mut layer);
                    }
                    Some(Command::SetFilters(filters)) => {
                        core.set_filters(filters);
                        core.commit(Instant::now(), &mut layer);
                    }
                    Some(Command::Select(id)) => {
                        // A selection change releases the hint on the old id.
                        let previous = core.selected().map(str::to_string);
                        if let Some(previous) = previous {
                            if id.as_deref() != Some(previous.as_str()) {
                                feed.unsubscribe_hint(previous);
                            }
                        }
                        core.select(id);
                        core.commit(Instant::now(), &mut layer);
                    }
                    Some(Command::Subscribe(id)) => feed.subscribe_hint(id),
                    Some(Command::Unsubscribe(id)) => feed.unsubscribe_hint(id),
                    Some(Command::SetFeedAddress(address)) => feed.set_address(address),
                    None => break,
                }
            }

            _ = frame.tick() => {
                core.step(Instant::now(), &mut layer);
            }

            _ = cleanup.tick() => {
                core.cleanup_stale();
                if let Ok(mut status) = status.lock() {
                    status.entity_count = core.entity_count();
                }
            }

            () = cancel_token.cancelled() => break,
        }
    }

    feed.shutdown();
    info!("Engine driver stopped");
}
