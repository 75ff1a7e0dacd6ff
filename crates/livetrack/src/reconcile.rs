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

//! Marker reconciliation: diff the sampled entity set against rendered state.
//!
//! Each pass transitions markers through absent -> created -> updated* ->
//! removed with minimal churn. Updates below the significance thresholds are
//! skipped entirely, so an unchanged aircraft causes zero layer mutations.
//! The selected aircraft is rendered through a dedicated always-on-top slot,
//! independent of the general marker pool. An aircraft that disappears from
//! the feed is treated exactly like one filtered out by the viewport: its
//! marker is removed.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use log::debug;

use crate::cache::{heading_bucket, IconCache, IconKey, MarkerIcon, TooltipCache, TooltipFingerprint};
use crate::interp::shortest_arc_degrees;
use crate::sampler::{LiveAircraft, Viewport};

/// Capability interface onto the concrete rendering layer.
///
/// The reconciliation algorithm is testable against a recording fake; the
/// real adapter binds these calls to whatever map toolkit is in use. Click
/// and tap handling is the adapter's concern: `create_marker` hands it the
/// entity id, and the adapter reports hits back to the application, which
/// feeds them into the engine's selection.
pub trait MarkerLayer {
    /// Materialize a marker for an entity.
    fn create_marker(&mut self, id: &str, lat: f64, lon: f64, icon: &Arc<MarkerIcon>);
    /// Move an existing marker.
    fn move_marker(&mut self, id: &str, lat: f64, lon: f64);
    /// Swap an existing marker's icon.
    fn set_icon(&mut self, id: &str, icon: &Arc<MarkerIcon>);
    /// Attach or replace an existing marker's tooltip.
    fn set_tooltip(&mut self, id: &str, markup: &Arc<str>);
    /// Detach an existing marker's tooltip.
    fn clear_tooltip(&mut self, id: &str);
    /// Remove a marker entirely.
    fn remove_marker(&mut self, id: &str);
    /// Render the selected entity in the dedicated top-most slot.
    fn set_selected_marker(&mut self, id: &str, lat: f64, lon: f64, icon: &Arc<MarkerIcon>);
    /// Detach the selected-slot marker.
    fn clear_selected_marker(&mut self);
}

/// Last-rendered state for one materialized marker.
#[derive(Debug, Clone)]
struct MarkerRecord {
    lat: f64,
    lon: f64,
    heading: Option<f64>,
    on_ground: bool,
    fingerprint: TooltipFingerprint,
    has_tooltip: bool,
}

/// Significance thresholds and tooltip gating. Tuning knobs, configurable.
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Minimum position delta (degrees, per axis) that triggers a move.
    /// The default is about 11 m.
    pub position_epsilon_deg: f64,
    /// Minimum heading delta (degrees) that triggers an icon swap.
    pub heading_epsilon_deg: f64,
    /// Tooltips are attached at or above this zoom, detached below it.
    pub tooltip_zoom: f64,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            position_epsilon_deg: 1e-4,
            heading_epsilon_deg: 5.0,
            tooltip_zoom: 9.0,
        }
    }
}

/// Owns marker records and the presentation caches for one map instance.
#[derive(Debug)]
pub struct Reconciler {
    config: ReconcilerConfig,
    records: HashMap<String, MarkerRecord>,
    selected: Option<(String, MarkerRecord)>,
    icons: IconCache,
    tooltips: TooltipCache,
}

impl Reconciler {
    #[must_use]
    pub fn new(config: ReconcilerConfig) -> Self {
        Self {
            config,
            records: HashMap::new(),
            selected: None,
            icons: IconCache::new(),
            tooltips: TooltipCache::new(),
        }
    }

    /// Number of markers currently materialized in the general pool.
    #[must_use]
    pub fn marker_count(&self) -> usize {
        self.records.len()
    }

    /// Run one reconciliation pass against the sampled entity list.
    pub fn reconcile<L: MarkerLayer>(
        &mut self,
        sampled: &[LiveAircraft],
        viewport: &Viewport,
        selected_id: Option<&str>,
        layer: &mut L,
    ) {
        let tooltips_enabled = viewport.zoom >= self.config.tooltip_zoom;

        // The selected entity lives in its own slot, not the pool.
        let pool_ids: HashSet<&str> = sampled
            .iter()
            .map(|a| a.id.as_str())
            .filter(|id| Some(*id) != selected_id)
            .collect();

        // Removals first: markers whose id left the sampled set. Lost from
        // the feed or filtered by the viewport, no distinction.
        let gone: Vec<String> = self
            .records
            .keys()
            .filter(|id| !pool_ids.contains(id.as_str()))
            .cloned()
            .collect();
        for id in &gone {
            self.records.remove(id);
            layer.remove_marker(id);
        }
        if !gone.is_empty() {
            debug!("Removed {} markers", gone.len());
        }

        self.reconcile_selected(sampled, selected_id, layer);

        for aircraft in sampled {
            if Some(aircraft.id.as_str()) == selected_id {
                continue;
            }
            if self.records.contains_key(&aircraft.id) {
                self.update_marker(aircraft, tooltips_enabled, layer);
            } else {
                self.create_marker(aircraft, tooltips_enabled, layer);
            }
        }
    }

    fn reconcile_selected<L: MarkerLayer>(
        &mut self,
        sampled: &[LiveAircraft],
        selected_id: Option<&str>,
        layer: &mut L,
    ) {
        let target = selected_id.and_then(|id| sampled.iter().find(|a| a.id == id));

        let Some(aircraft) = target else {
            // Selection cleared, or the selected entity left the sample.
            if self.selected.take().is_some() {
                layer.clear_selected_marker();
            }
            return;
        };

        let icon_key = IconKey {
            heading_bucket: heading_bucket(aircraft.heading),
            selected: true,
            on_ground: aircraft.on_ground,
        };

        let needs_render = match &self.selected {
            Some((id, record)) if id == &aircraft.id => {
                position_changed(record, aircraft, self.config.position_epsilon_deg)
                    || icon_changed(record, aircraft, self.config.heading_epsilon_deg)
            }
            Some(_) => {
                // Selection moved to a different entity: detach the old slot.
                layer.clear_selected_marker();
                true
            }
            None => true,
        };

        if needs_render {
            let icon = self.icons.get(icon_key);
            layer.set_selected_marker(&aircraft.id, aircraft.lat, aircraft.lon, &icon);
            self.selected = Some((aircraft.id.clone(), record_of(aircraft, false)));
        }
    }

    fn create_marker<L: MarkerLayer>(
        &mut self,
        aircraft: &LiveAircraft,
        tooltips_enabled: bool,
        layer: &mut L,
    ) {
        let icon = self.icons.get(IconKey {
            heading_bucket: heading_bucket(aircraft.heading),
            selected: false,
            on_ground: aircraft.on_ground,
        });
        layer.create_marker(&aircraft.id, aircraft.lat, aircraft.lon, &icon);

        let mut record = record_of(aircraft, false);
        if tooltips_enabled {
            let markup = self.tooltips.get(&record.fingerprint);
            layer.set_tooltip(&aircraft.id, &markup);
            record.has_tooltip = true;
        }

        self.records.insert(aircraft.id.clone(), record);
    }

    fn update_marker<L: MarkerLayer>(
        &mut self,
        aircraft: &LiveAircraft,
        tooltips_enabled: bool,
        layer: &mut L,
    ) {
        let Some(record) = self.records.get_mut(&aircraft.id) else {
            return;
        };

        if position_changed(record, aircraft, self.config.position_epsilon_deg) {
            layer.move_marker(&aircraft.id, aircraft.lat, aircraft.lon);
            record.lat = aircraft.lat;
            record.lon = aircraft.lon;
        }

        if icon_changed(record, aircraft, self.config.heading_epsilon_deg) {
            let icon = self.icons.get(IconKey {
                heading_bucket: heading_bucket(aircraft.heading),
                selected: false,
                on_ground: aircraft.on_ground,
            });
            layer.set_icon(&aircraft.id, &icon);
            record.heading = aircraft.heading;
            record.on_ground = aircraft.on_ground;
        }

        if tooltips_enabled {
            let fingerprint = TooltipFingerprint::of(aircraft);
            if !record.has_tooltip || fingerprint != record.fingerprint {
                let markup = self.tooltips.get(&fingerprint);
                layer.set_tooltip(&aircraft.id, &markup);
                record.fingerprint = fingerprint;
                record.has_tooltip = true;
            }
        } else if record.has_tooltip {
            layer.clear_tooltip(&aircraft.id);
            record.has_tooltip = false;
        }
    }
}

fn record_of(aircraft: &LiveAircraft, has_tooltip: bool) -> MarkerRecord {
    MarkerRecord {
        lat: aircraft.lat,
        lon: aircraft.lon,
        heading: aircraft.heading,
        on_ground: aircraft.on_ground,
        fingerprint: TooltipFingerprint::of(aircraft),
        has_tooltip,
    }
}

fn position_changed(record: &MarkerRecord, aircraft: &LiveAircraft, epsilon: f64) -> bool {
    (aircraft.lat - record.lat).abs() > epsilon || (aircraft.lon - record.lon).abs() > epsilon
}

fn icon_changed(record: &MarkerRecord, aircraft: &LiveAircraft, epsilon: f64) -> bool {
    if aircraft.on_ground != record.on_ground {
        return true;
    }
    match (record.heading, aircraft.heading) {
        (None, None) => false,
        (Some(old), Some(new)) => shortest_arc_degrees(old, new).abs() > epsilon,
        // A heading appearing or disappearing counts as a large delta.
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    enum Op {
        Create(String),
        Move(String, f64, f64),
        SetIcon(String),
        SetTooltip(String),
        ClearTooltip(String),
        Remove(String),
        SetSelected(String),
        ClearSelected,
    }

    #[derive(Debug, Default)]
    struct RecordingLayer {
        ops: Vec<Op>,
    }

    impl MarkerLayer for RecordingLayer {
        fn create_marker(&mut self, id: &str, _lat: f64, _lon: f64, _icon: &Arc<MarkerIcon>) {
            self.ops.push(Op::Create(id.to_string()));
        }
        fn move_marker(&mut self, id: &str, lat: f64, lon: f64) {
            self.ops.push(Op::Move(id.to_string(), lat, lon));
        }
        fn set_icon(&mut self, id: &str, _icon: &Arc<MarkerIcon>) {
            self.ops.push(Op::SetIcon(id.to_string()));
        }
        fn set_tooltip(&mut self, id: &str, _markup: &Arc<str>) {
            self.ops.push(Op::SetTooltip(id.to_string()));
        }
        fn clear_tooltip(&mut self, id: &str) {
            self.ops.push(Op::ClearTooltip(id.to_string()));
        }
        fn remove_marker(&mut self, id: &str) {
            self.ops.push(Op::Remove(id.to_string()));
        }
        fn set_selected_marker(&mut self, id: &str, _lat: f64, _lon: f64, _icon: &Arc<MarkerIcon>) {
            self.ops.push(Op::SetSelected(id.to_string()));
        }
        fn clear_selected_marker(&mut self) {
            self.ops.push(Op::ClearSelected);
        }
    }

    fn aircraft(id: &str, lat: f64, lon: f64, heading: Option<f64>) -> LiveAircraft {
        LiveAircraft {
            id: id.to_string(),
            callsign: Some("UAL123".to_string()),
            lat,
            lon,
            heading,
            altitude_meters: Some(10000.0),
            speed_mps: Some(230.0),
            on_ground: false,
            type_code: None,
        }
    }

    fn viewport_at_zoom(zoom: f64) -> Viewport {
        Viewport {
            south: 30.0,
            north: 40.0,
            west: -120.0,
            east: -110.0,
            zoom,
        }
    }

    #[test]
    fn test_create_then_remove() {
        let mut reconciler = Reconciler::new(ReconcilerConfig::default());
        let mut layer = RecordingLayer::default();
        let vp = viewport_at_zoom(8.0);

        let sampled = vec![aircraft("a", 35.0, -115.0, Some(90.0))];
        reconciler.reconcile(&sampled, &vp, None, &mut layer);
        assert_eq!(layer.ops, vec![Op::Create("a".to_string())]);
        assert_eq!(reconciler.marker_count(), 1);

        layer.ops.clear();
        reconciler.reconcile(&[], &vp, None, &mut layer);
        assert_eq!(layer.ops, vec![Op::Remove("a".to_string())]);
        assert_eq!(reconciler.marker_count(), 0);
    }

    #[test]
    fn test_idempotent_reconcile_no_churn() {
        let mut reconciler = Reconciler::new(ReconcilerConfig::default());
        let mut layer = RecordingLayer::default();
        let vp = viewport_at_zoom(10.0); // tooltips enabled

        let sampled = vec![
            aircraft("a", 35.0, -115.0, Some(90.0)),
            aircraft("b", 36.0, -114.0, None),
        ];
        reconciler.reconcile(&sampled, &vp, Some("b"), &mut layer);

        // Second pass with identical input must issue zero mutations.
        layer.ops.clear();
        reconciler.reconcile(&sampled, &vp, Some("b"), &mut layer);
        assert!(layer.ops.is_empty(), "unexpected ops: {:?}", layer.ops);
    }

    #[test]
    fn test_sub_threshold_position_skipped() {
        let mut reconciler = Reconciler::new(ReconcilerConfig::default());
        let mut layer = RecordingLayer::default();
        let vp = viewport_at_zoom(8.0);

        reconciler.reconcile(&[aircraft("a", 35.0, -115.0, Some(90.0))], &vp, None, &mut layer);
        layer.ops.clear();

        // 5e-5 degrees is below the ~11 m threshold: no mutation at all.
        let nudged = aircraft("a", 35.00005, -115.00005, Some(90.0));
        reconciler.reconcile(&[nudged], &vp, None, &mut layer);
        assert!(layer.ops.is_empty());
    }

    #[test]
    fn test_significant_position_moves_marker() {
        let mut reconciler = Reconciler::new(ReconcilerConfig::default());
        let mut layer = RecordingLayer::default();
        let vp = viewport_at_zoom(8.0);

        reconciler.reconcile(&[aircraft("a", 35.0, -115.0, Some(90.0))], &vp, None, &mut layer);
        layer.ops.clear();

        let moved = aircraft("a", 35.001, -115.0, Some(90.0));
        reconciler.reconcile(&[moved], &vp, None, &mut layer);
        assert_eq!(layer.ops, vec![Op::Move("a".to_string(), 35.001, -115.0)]);
    }

    #[test]
    fn test_heading_change_swaps_icon() {
        let mut reconciler = Reconciler::new(ReconcilerConfig::default());
        let mut layer = RecordingLayer::default();
        let vp = viewport_at_zoom(8.0);

        reconciler.reconcile(&[aircraft("a", 35.0, -115.0, Some(90.0))], &vp, None, &mut layer);
        layer.ops.clear();

        // 4 degrees: below threshold.
        reconciler.reconcile(&[aircraft("a", 35.0, -115.0, Some(94.0))], &vp, None, &mut layer);
        assert!(layer.ops.is_empty());

        // 6 degrees: icon swap.
        reconciler.reconcile(&[aircraft("a", 35.0, -115.0, Some(96.0))], &vp, None, &mut layer);
        assert_eq!(layer.ops, vec![Op::SetIcon("a".to_string())]);
    }

    #[test]
    fn test_heading_appearing_swaps_icon() {
        let mut reconciler = Reconciler::new(ReconcilerConfig::default());
        let mut layer = RecordingLayer::default();
        let vp = viewport_at_zoom(8.0);

        reconciler.reconcile(&[aircraft("a", 35.0, -115.0, None)], &vp, None, &mut layer);
        layer.ops.clear();

        reconciler.reconcile(&[aircraft("a", 35.0, -115.0, Some(1.0))], &vp, None, &mut layer);
        assert_eq!(layer.ops, vec![Op::SetIcon("a".to_string())]);
    }

    #[test]
    fn test_ground_flip_swaps_icon() {
        let mut reconciler = Reconciler::new(ReconcilerConfig::default());
        let mut layer = RecordingLayer::default();
        let vp = viewport_at_zoom(8.0);

        reconciler.reconcile(&[aircraft("a", 35.0, -115.0, Some(90.0))], &vp, None, &mut layer);
        layer.ops.clear();

        let mut grounded = aircraft("a", 35.0, -115.0, Some(90.0));
        grounded.on_ground = true;
        reconciler.reconcile(&[grounded], &vp, None, &mut layer);
        // Ground flip also changes the tooltip fingerprint, but tooltips are
        // disabled at this zoom, so only the icon swap happens.
        assert_eq!(layer.ops, vec![Op::SetIcon("a".to_string())]);
    }

    #[test]
    fn test_tooltip_attach_detach_across_zoom() {
        let mut reconciler = Reconciler::new(ReconcilerConfig::default());
        let mut layer = RecordingLayer::default();

        // Created below the tooltip zoom: no tooltip.
        let sampled = vec![aircraft("a", 35.0, -115.0, Some(90.0))];
        reconciler.reconcile(&sampled, &viewport_at_zoom(8.0), None, &mut layer);
        assert_eq!(layer.ops, vec![Op::Create("a".to_string())]);

        // Zooming in attaches it.
        layer.ops.clear();
        reconciler.reconcile(&sampled, &viewport_at_zoom(10.0), None, &mut layer);
        assert_eq!(layer.ops, vec![Op::SetTooltip("a".to_string())]);

        // Zooming back out detaches it.
        layer.ops.clear();
        reconciler.reconcile(&sampled, &viewport_at_zoom(8.0), None, &mut layer);
        assert_eq!(layer.ops, vec![Op::ClearTooltip("a".to_string())]);
    }

    #[test]
    fn test_tooltip_refresh_on_fingerprint_change() {
        let mut reconciler = Reconciler::new(ReconcilerConfig::default());
        let mut layer = RecordingLayer::default();
        let vp = viewport_at_zoom(10.0);

        reconciler.reconcile(&[aircraft("a", 35.0, -115.0, Some(90.0))], &vp, None, &mut layer);
        layer.ops.clear();

        // Altitude moves far enough to land in a new 100 m bucket.
        let mut climbed = aircraft("a", 35.0, -115.0, Some(90.0));
        climbed.altitude_meters = Some(10300.0);
        reconciler.reconcile(&[climbed], &vp, None, &mut layer);
        assert_eq!(layer.ops, vec![Op::SetTooltip("a".to_string())]);
    }

    #[test]
    fn test_selected_entity_uses_dedicated_slot() {
        let mut reconciler = Reconciler::new(ReconcilerConfig::default());
        let mut layer = RecordingLayer::default();
        let vp = viewport_at_zoom(8.0);

        let sampled = vec![
            aircraft("a", 35.0, -115.0, Some(90.0)),
            aircraft("b", 36.0, -114.0, Some(180.0)),
        ];
        reconciler.reconcile(&sampled, &vp, Some("a"), &mut layer);

        assert!(layer.ops.contains(&Op::SetSelected("a".to_string())));
        assert!(layer.ops.contains(&Op::Create("b".to_string())));
        assert!(!layer.ops.contains(&Op::Create("a".to_string())));
        assert_eq!(reconciler.marker_count(), 1); // only "b" in the pool
    }

    #[test]
    fn test_selection_change_detaches_previous_slot() {
        let mut reconciler = Reconciler::new(ReconcilerConfig::default());
        let mut layer = RecordingLayer::default();
        let vp = viewport_at_zoom(8.0);

        let sampled = vec![
            aircraft("a", 35.0, -115.0, Some(90.0)),
            aircraft("b", 36.0, -114.0, Some(180.0)),
        ];
        reconciler.reconcile(&sampled, &vp, Some("a"), &mut layer);
        layer.ops.clear();

        reconciler.reconcile(&sampled, &vp, Some("b"), &mut layer);
        // "b" leaves the pool for the slot, the old slot is detached, and
        // "a" returns to the pool as an ordinary marker.
        assert!(layer.ops.contains(&Op::Remove("b".to_string())));
        assert!(layer.ops.contains(&Op::ClearSelected));
        assert!(layer.ops.contains(&Op::SetSelected("b".to_string())));
        assert!(layer.ops.contains(&Op::Create("a".to_string())));
    }

    #[test]
    fn test_selection_cleared_detaches_slot() {
        let mut reconciler = Reconciler::new(ReconcilerConfig::default());
        let mut layer = RecordingLayer::default();
        let vp = viewport_at_zoom(8.0);

        let sampled = vec![aircraft("a", 35.0, -115.0, Some(90.0))];
        reconciler.reconcile(&sampled, &vp, Some("a"), &mut layer);
        layer.ops.clear();

        reconciler.reconcile(&sampled, &vp, None, &mut layer);
        assert!(layer.ops.contains(&Op::ClearSelected));
        assert!(layer.ops.contains(&Op::Create("a".to_string())));
    }

    #[test]
    fn test_feed_loss_same_as_viewport_filter() {
        let mut reconciler = Reconciler::new(ReconcilerConfig::default());
        let mut layer = RecordingLayer::default();
        let vp = viewport_at_zoom(8.0);

        reconciler.reconcile(&[aircraft("a", 35.0, -115.0, Some(90.0))], &vp, None, &mut layer);
        layer.ops.clear();

        // Whether "a" vanished from the feed or left the viewport, the
        // reconciler sees the same thing: not in the sample.
        reconciler.reconcile(&[], &vp, None, &mut layer);
        assert_eq!(layer.ops, vec![Op::Remove("a".to_string())]);
    }
}
