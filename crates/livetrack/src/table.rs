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

//! Authoritative entity table.
//!
//! Holds the last-known state for every tracked aircraft. Each snapshot batch
//! replaces entity state wholesale: entities present in the batch are upserted
//! and entities absent from it are removed (absence means gone, there is no
//! explicit deletion event). A stale timeout guards against producers that
//! silently stop reporting an id without a fresh batch.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use log::debug;

use crate::feed::protocol::FeedBatch;

/// Last-known authoritative state for one aircraft.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedAircraft {
    /// Stable identifier.
    pub id: String,
    /// Callsign / free-text label.
    pub callsign: Option<String>,
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
    /// Altitude in meters.
    pub altitude_meters: Option<f64>,
    /// Ground speed in meters per second.
    pub speed_mps: Option<f64>,
    /// Heading in degrees, `None` when unknown.
    pub heading_degrees: Option<f64>,
    /// Whether the aircraft is on the ground.
    pub on_ground: bool,
    /// Aircraft type designator.
    pub type_code: Option<String>,
    /// Timestamp of the last batch that contained this id.
    pub last_seen: DateTime<Utc>,
}

/// Result of applying one batch: which ids changed.
#[derive(Debug, Clone, Default)]
pub struct BatchDelta {
    /// Ids seen for the first time.
    pub added: Vec<String>,
    /// Ids already tracked that received new state.
    pub updated: Vec<String>,
    /// Ids absent from the batch and removed.
    pub removed: Vec<String>,
}

/// The authoritative entity table, owned by the snapshot-client side.
#[derive(Debug, Default)]
pub struct EntityTable {
    aircraft: HashMap<String, TrackedAircraft>,
}

impl EntityTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a snapshot batch: upsert everything in it, drop everything not
    /// in it. Returns the delta for downstream consumers.
    pub fn apply_batch(&mut self, batch: &FeedBatch) -> BatchDelta {
        let now = Utc::now();
        let mut delta = BatchDelta::default();

        let batch_ids: HashSet<&str> = batch.entities.iter().map(|e| e.id.as_str()).collect();

        // Absence means gone.
        let removed: Vec<String> = self
            .aircraft
            .keys()
            .filter(|id| !batch_ids.contains(id.as_str()))
            .cloned()
            .collect();
        for id in removed {
            self.aircraft.remove(&id);
            delta.removed.push(id);
        }

        for entity in &batch.entities {
            let is_new = !self.aircraft.contains_key(&entity.id);

            self.aircraft.insert(
                entity.id.clone(),
                TrackedAircraft {
                    id: entity.id.clone(),
                    callsign: entity.label.clone(),
                    lat: entity.lat,
                    lon: entity.lon,
                    altitude_meters: entity.altitude_meters,
                    speed_mps: entity.speed_mps,
                    heading_degrees: entity.heading_degrees,
                    on_ground: entity.on_ground,
                    type_code: entity.type_code.clone(),
                    last_seen: now,
                },
            );

            if is_new {
                delta.added.push(entity.id.clone());
            } else {
                delta.updated.push(entity.id.clone());
            }
        }

        debug!(
            "Applied batch: {} added, {} updated, {} removed, {} tracked",
            delta.added.len(),
            delta.updated.len(),
            delta.removed.len(),
            self.aircraft.len()
        );

        delta
    }

    /// Remove aircraft that haven't appeared in any batch recently.
    /// Returns the removed ids so interpolation state can be retired too.
    pub fn cleanup_stale(&mut self, timeout_secs: i64) -> Vec<String> {
        let now = Utc::now();
        let stale: Vec<String> = self
            .aircraft
            .iter()
            .filter(|(_, a)| (now - a.last_seen).num_seconds() >= timeout_secs)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &stale {
            self.aircraft.remove(id);
        }

        stale
    }

    /// Get one aircraft by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&TrackedAircraft> {
        self.aircraft.get(id)
    }

    /// Iterate over all tracked aircraft.
    pub fn iter(&self) -> impl Iterator<Item = &TrackedAircraft> {
        self.aircraft.values()
    }

    /// Number of tracked aircraft.
    #[must_use]
    pub fn len(&self) -> usize {
        self.aircraft.len()
    }

    /// Whether the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.aircraft.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::protocol::FeedEntity;

    fn entity(id: &str, lat: f64, lon: f64) -> FeedEntity {
        FeedEntity {
            id: id.to_string(),
            label: None,
            lat,
            lon,
            altitude_meters: None,
            speed_mps: None,
            heading_degrees: None,
            on_ground: false,
            type_code: None,
        }
    }

    fn batch(entities: Vec<FeedEntity>) -> FeedBatch {
        FeedBatch {
            timestamp: Utc::now(),
            count: entities.len() as u32,
            entities,
        }
    }

    #[test]
    fn test_apply_batch_adds_and_updates() {
        let mut table = EntityTable::new();

        let delta = table.apply_batch(&batch(vec![entity("a", 1.0, 2.0)]));
        assert_eq!(delta.added, vec!["a".to_string()]);
        assert!(delta.updated.is_empty());
        assert_eq!(table.len(), 1);

        let delta = table.apply_batch(&batch(vec![entity("a", 1.5, 2.5)]));
        assert!(delta.added.is_empty());
        assert_eq!(delta.updated, vec!["a".to_string()]);
        let a = table.get("a").unwrap();
        assert!((a.lat - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_absence_removes_entity() {
        let mut table = EntityTable::new();
        table.apply_batch(&batch(vec![entity("a", 1.0, 2.0), entity("b", 3.0, 4.0)]));
        assert_eq!(table.len(), 2);

        let delta = table.apply_batch(&batch(vec![entity("b", 3.1, 4.1)]));
        assert_eq!(delta.removed, vec!["a".to_string()]);
        assert!(table.get("a").is_none());
        assert!(table.get("b").is_some());
    }

    #[test]
    fn test_cleanup_stale_with_zero_timeout() {
        let mut table = EntityTable::new();
        table.apply_batch(&batch(vec![entity("a", 1.0, 2.0)]));

        let removed = table.cleanup_stale(0);
        assert_eq!(removed, vec!["a".to_string()]);
        assert!(table.is_empty());
    }

    #[test]
    fn test_cleanup_keeps_fresh_entities() {
        let mut table = EntityTable::new();
        table.apply_batch(&batch(vec![entity("a", 1.0, 2.0)]));

        let removed = table.cleanup_stale(3600);
        assert!(removed.is_empty());
        assert_eq!(table.len(), 1);
    }
}
