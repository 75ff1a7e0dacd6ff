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

//! Single-threaded engine core.
//!
//! Owns the entity table, the motion segments, and the reconciler, and is
//! driven entirely by explicit clock instants so tests can advance time
//! manually. The async driver in [`crate::engine`] feeds it batches and
//! frame ticks; nothing here touches the network or a timer. The frame
//! clock may fire at display refresh rate, but commits to the visual layer
//! are gated to a fixed publish cadence.

use std::time::{Duration, Instant};

use crate::interp::{Interpolator, InterpolatorConfig, Pose};
use crate::reconcile::{MarkerLayer, Reconciler, ReconcilerConfig};
use crate::sampler::{self, CategoryFilters, LiveAircraft, SamplerConfig, Viewport};
use crate::table::{BatchDelta, EntityTable};
use crate::feed::protocol::FeedBatch;

/// Top-level engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub interpolator: InterpolatorConfig,
    pub sampler: SamplerConfig,
    pub reconciler: ReconcilerConfig,
    /// Minimum interval between commits to the visual layer (~15/s).
    pub publish_interval: Duration,
    /// Driver frame tick interval (display-refresh order of magnitude).
    pub frame_interval: Duration,
    /// Entities unseen for this long are dropped even without a batch.
    pub stale_timeout_secs: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            interpolator: InterpolatorConfig::default(),
            sampler: SamplerConfig::default(),
            reconciler: ReconcilerConfig::default(),
            publish_interval: Duration::from_millis(66),
            frame_interval: Duration::from_millis(16),
            stale_timeout_secs: 120,
        }
    }
}

/// Throttle gate between the frame clock and visual-layer commits.
#[derive(Debug)]
pub struct PublishGate {
    interval: Duration,
    last_publish: Option<Instant>,
}

impl PublishGate {
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_publish: None,
        }
    }

    /// Whether a commit is due at `now`. Records the publish when it is.
    pub fn should_publish(&mut self, now: Instant) -> bool {
        let due = match self.last_publish {
            Some(last) => now.saturating_duration_since(last) >= self.interval,
            None => true,
        };
        if due {
            self.last_publish = Some(now);
        }
        due
    }
}

/// The engine core: all mutable state, one logical thread.
#[derive(Debug)]
pub struct LiveMapCore {
    table: EntityTable,
    interpolator: Interpolator,
    reconciler: Reconciler,
    sampler_config: SamplerConfig,
    gate: PublishGate,
    stale_timeout_secs: i64,
    viewport: Option<Viewport>,
    filters: CategoryFilters,
    selected: Option<String>,
}

impl LiveMapCore {
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            table: EntityTable::new(),
            interpolator: Interpolator::new(config.interpolator),
            reconciler: Reconciler::new(config.reconciler),
            sampler_config: config.sampler,
            gate: PublishGate::new(config.publish_interval),
            stale_timeout_secs: config.stale_timeout_secs,
            viewport: None,
            filters: CategoryFilters::default(),
            selected: None,
        }
    }

    /// Ingest a snapshot batch: update the table and retarget every motion
    /// segment toward the newly reported poses.
    pub fn apply_batch(&mut self, batch: &FeedBatch, now: Instant) -> BatchDelta {
        let delta = self.table.apply_batch(batch);

        for id in delta.added.iter().chain(delta.updated.iter()) {
            if let Some(aircraft) = self.table.get(id) {
                self.interpolator.retarget(
                    id,
                    Pose {
                        lat: aircraft.lat,
                        lon: aircraft.lon,
                        heading: aircraft.heading_degrees,
                    },
                    now,
                );
            }
        }
        for id in &delta.removed {
            self.interpolator.retire(id);
        }

        delta
    }

    /// Drop entities the feed has silently stopped reporting.
    pub fn cleanup_stale(&mut self) {
        for id in self.table.cleanup_stale(self.stale_timeout_secs) {
            self.interpolator.retire(&id);
        }
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = Some(viewport);
    }

    pub fn set_filters(&mut self, filters: CategoryFilters) {
        self.filters = filters;
    }

    pub fn select(&mut self, id: Option<String>) {
        self.selected = id;
    }

    /// Currently selected entity id, if any.
    #[must_use]
    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Number of entities in the authoritative table.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.table.len()
    }

    /// The full interpolated entity list at an instant. Entities without a
    /// motion segment fall back to their raw last-known value.
    #[must_use]
    pub fn live_aircraft(&self, now: Instant) -> Vec<LiveAircraft> {
        self.table
            .iter()
            .map(|a| {
                let pose = self.interpolator.sample(&a.id, now).unwrap_or(Pose {
                    lat: a.lat,
                    lon: a.lon,
                    heading: a.heading_degrees,
                });
                LiveAircraft {
                    id: a.id.clone(),
                    callsign: a.callsign.clone(),
                    lat: pose.lat,
                    lon: pose.lon,
                    heading: pose.heading,
                    altitude_meters: a.altitude_meters,
                    speed_mps: a.speed_mps,
                    on_ground: a.on_ground,
                    type_code: a.type_code.clone(),
                }
            })
            .collect()
    }

    /// Frame tick: commit if the publish gate allows it.
    ///
    /// Returns whether a commit happened.
    pub fn step<L: MarkerLayer>(&mut self, now: Instant, layer: &mut L) -> bool {
        if self.viewport.is_none() || !self.gate.should_publish(now) {
            return false;
        }
        self.commit(now, layer);
        true
    }

    /// Sample and reconcile immediately, bypassing the gate. Used for
    /// viewport and selection changes, which should not wait a frame.
    pub fn commit<L: MarkerLayer>(&mut self, now: Instant, layer: &mut L) {
        let Some(viewport) = self.viewport else {
            return;
        };

        let live = self.live_aircraft(now);
        let sampled = sampler::sample(
            &live,
            &viewport,
            &self.filters,
            self.selected.as_deref(),
            &self.sampler_config,
        );
        self.reconciler
            .reconcile(&sampled, &viewport, self.selected.as_deref(), layer);
    }
}
