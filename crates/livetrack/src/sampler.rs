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

//! Viewport sampling: which entities are eligible for rendering this frame.
//!
//! A pure pipeline over the interpolated entity list: padded bounds filter,
//! category filter, hard cap with an airborne/grounded split, and a
//! selection guarantee. Below a minimum zoom the sampler returns nothing at
//! all; the caller is expected to show a "zoom in" affordance instead of
//! thousands of markers.

use serde::{Deserialize, Serialize};

/// Interpolated render-ready state for one aircraft.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveAircraft {
    pub id: String,
    pub callsign: Option<String>,
    pub lat: f64,
    pub lon: f64,
    pub heading: Option<f64>,
    pub altitude_meters: Option<f64>,
    pub speed_mps: Option<f64>,
    pub on_ground: bool,
    pub type_code: Option<String>,
}

/// Current map bounds and zoom. Owned by the map, read-only input here.
///
/// Bounds are assumed non-wrapping (west < east).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub south: f64,
    pub north: f64,
    pub west: f64,
    pub east: f64,
    pub zoom: f64,
}

impl Viewport {
    /// Bounds expanded on each side by `ratio` of the viewport span, to
    /// avoid marker pop-in at the edges.
    #[must_use]
    pub fn padded(&self, ratio: f64) -> Self {
        let lat_pad = (self.north - self.south) * ratio;
        let lon_pad = (self.east - self.west) * ratio;
        Self {
            south: self.south - lat_pad,
            north: self.north + lat_pad,
            west: self.west - lon_pad,
            east: self.east + lon_pad,
            zoom: self.zoom,
        }
    }

    /// Whether a position falls inside these bounds.
    #[must_use]
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.south && lat <= self.north && lon >= self.west && lon <= self.east
    }
}

/// Traffic category derived from the callsign pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Commercial,
    Cargo,
    Private,
    Military,
}

// Cargo operators by ICAO airline designator.
const CARGO_PREFIXES: &[&str] = &[
    "FDX", "UPS", "GTI", "GEC", "CLX", "ABW", "BOX", "CKS", "KAC", "NCA", "SQC", "MPH",
];

// Military callsign prefixes (transport, tanker, patrol).
const MILITARY_PREFIXES: &[&str] = &[
    "RCH", "CNV", "NAVY", "PAT", "RRR", "ASY", "BAF", "GAF", "CFC", "IAM",
];

/// Derive a traffic category from a callsign.
///
/// Three letters followed by a flight number is airline traffic, split into
/// cargo and commercial by operator prefix; known military prefixes trump
/// the airline pattern; everything else (registrations, missing callsigns)
/// is treated as private.
#[must_use]
pub fn derive_category(callsign: Option<&str>) -> Category {
    let Some(callsign) = callsign else {
        return Category::Private;
    };
    let callsign = callsign.trim().to_ascii_uppercase();
    if callsign.is_empty() {
        return Category::Private;
    }

    if MILITARY_PREFIXES.iter().any(|p| callsign.starts_with(p)) {
        return Category::Military;
    }

    let prefix: String = callsign.chars().take(3).collect();
    let is_airline_pattern = prefix.len() == 3
        && prefix.chars().all(|c| c.is_ascii_alphabetic())
        && callsign[3..].chars().next().is_some_and(|c| c.is_ascii_digit());

    if is_airline_pattern {
        if CARGO_PREFIXES.contains(&prefix.as_str()) {
            return Category::Cargo;
        }
        return Category::Commercial;
    }

    Category::Private
}

/// Which categories are enabled. All-enabled means no filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryFilters {
    pub commercial: bool,
    pub cargo: bool,
    pub private: bool,
    pub military: bool,
}

impl Default for CategoryFilters {
    fn default() -> Self {
        Self {
            commercial: true,
            cargo: true,
            private: true,
            military: true,
        }
    }
}

impl CategoryFilters {
    /// Whether any category is disabled (i.e. the filter does anything).
    #[must_use]
    pub fn is_active(&self) -> bool {
        !(self.commercial && self.cargo && self.private && self.military)
    }

    /// Whether a category passes the filter.
    #[must_use]
    pub fn allows(&self, category: Category) -> bool {
        match category {
            Category::Commercial => self.commercial,
            Category::Cargo => self.cargo,
            Category::Private => self.private,
            Category::Military => self.military,
        }
    }
}

/// Tuning knobs for the sampler. These are tuning parameters, not
/// structural invariants, so they are all configurable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Hard cap on simultaneously materialized markers.
    pub max_markers: usize,
    /// Share of the cap allocated to airborne traffic; the remainder goes
    /// to grounded traffic.
    pub airborne_share: f64,
    /// Bounds padding per side, as a fraction of the viewport span.
    pub pad_ratio: f64,
    /// Below this zoom level the sampler returns nothing.
    pub min_zoom: f64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            max_markers: 2000,
            airborne_share: 0.8,
            pad_ratio: 0.2,
            min_zoom: 6.0,
        }
    }
}

/// Produce the bounded subset of entities eligible for rendering.
///
/// Pure function: runs on every viewport change and every snapshot. The
/// selected entity, if it survived the bounds and category filters, is
/// guaranteed a slot even when the cap truncates it away.
#[must_use]
pub fn sample(
    aircraft: &[LiveAircraft],
    viewport: &Viewport,
    filters: &CategoryFilters,
    selected_id: Option<&str>,
    config: &SamplerConfig,
) -> Vec<LiveAircraft> {
    if viewport.zoom < config.min_zoom {
        return Vec::new();
    }

    let bounds = viewport.padded(config.pad_ratio);
    let filter_active = filters.is_active();

    let filtered: Vec<&LiveAircraft> = aircraft
        .iter()
        .filter(|a| bounds.contains(a.lat, a.lon))
        .filter(|a| {
            !filter_active || filters.allows(derive_category(a.callsign.as_deref()))
        })
        .collect();

    if filtered.len() <= config.max_markers {
        return filtered.into_iter().cloned().collect();
    }

    // Over the cap: favor airborne traffic at roughly the configured split.
    let airborne_cap =
        ((config.max_markers as f64) * config.airborne_share).round() as usize;
    let grounded_cap = config.max_markers.saturating_sub(airborne_cap);

    let mut sampled: Vec<LiveAircraft> = Vec::with_capacity(config.max_markers);
    sampled.extend(
        filtered
            .iter()
            .filter(|a| !a.on_ground)
            .take(airborne_cap)
            .map(|a| (*a).clone()),
    );
    sampled.extend(
        filtered
            .iter()
            .filter(|a| a.on_ground)
            .take(grounded_cap)
            .map(|a| (*a).clone()),
    );

    // Selection guarantee: if truncation dropped the selected entity, force
    // it back in by replacing the last slot.
    if let Some(selected_id) = selected_id {
        if !sampled.iter().any(|a| a.id == selected_id) {
            if let Some(selected) = filtered.iter().find(|a| a.id == selected_id) {
                if let Some(last) = sampled.last_mut() {
                    *last = (*selected).clone();
                } else {
                    sampled.push((*selected).clone());
                }
            }
        }
    }

    sampled
}

#[cfg(test)]
mod tests {
    use super::*;

    fn aircraft(id: &str, lat: f64, lon: f64, on_ground: bool) -> LiveAircraft {
        LiveAircraft {
            id: id.to_string(),
            callsign: None,
            lat,
            lon,
            heading: Some(90.0),
            altitude_meters: Some(10000.0),
            speed_mps: Some(230.0),
            on_ground,
            type_code: None,
        }
    }

    fn viewport() -> Viewport {
        Viewport {
            south: 30.0,
            north: 40.0,
            west: -120.0,
            east: -110.0,
            zoom: 8.0,
        }
    }

    #[test]
    fn test_below_min_zoom_returns_empty() {
        let fleet: Vec<LiveAircraft> =
            (0..100).map(|i| aircraft(&format!("a{i}"), 35.0, -115.0, false)).collect();
        let mut vp = viewport();
        vp.zoom = 3.0;

        let out = sample(&fleet, &vp, &CategoryFilters::default(), None, &SamplerConfig::default());
        assert!(out.is_empty());
    }

    #[test]
    fn test_bounds_filter_with_padding() {
        let fleet = vec![
            aircraft("inside", 35.0, -115.0, false),
            // Just outside raw bounds but inside the 20% padding.
            aircraft("edge", 41.0, -115.0, false),
            // Far outside even padded bounds.
            aircraft("far", 55.0, -115.0, false),
        ];

        let out = sample(
            &fleet,
            &viewport(),
            &CategoryFilters::default(),
            None,
            &SamplerConfig::default(),
        );
        let ids: Vec<&str> = out.iter().map(|a| a.id.as_str()).collect();
        assert!(ids.contains(&"inside"));
        assert!(ids.contains(&"edge"));
        assert!(!ids.contains(&"far"));
    }

    #[test]
    fn test_cap_never_exceeded_with_airborne_split() {
        // 2400 airborne / 600 grounded, cap 2000 -> 1600 airborne, 400 grounded.
        let mut fleet = Vec::new();
        for i in 0..2400 {
            fleet.push(aircraft(&format!("air{i}"), 35.0, -115.0, false));
        }
        for i in 0..600 {
            fleet.push(aircraft(&format!("gnd{i}"), 35.0, -115.0, true));
        }

        let out = sample(
            &fleet,
            &viewport(),
            &CategoryFilters::default(),
            None,
            &SamplerConfig::default(),
        );
        assert_eq!(out.len(), 2000);
        assert_eq!(out.iter().filter(|a| !a.on_ground).count(), 1600);
        assert_eq!(out.iter().filter(|a| a.on_ground).count(), 400);
    }

    #[test]
    fn test_selection_guarantee_survives_truncation() {
        let mut fleet = Vec::new();
        for i in 0..3000 {
            fleet.push(aircraft(&format!("air{i}"), 35.0, -115.0, false));
        }
        // The selected aircraft is well past the airborne allocation.
        let selected_id = "air2999";

        let out = sample(
            &fleet,
            &viewport(),
            &CategoryFilters::default(),
            Some(selected_id),
            &SamplerConfig::default(),
        );
        assert!(out.len() <= 2000);
        assert!(out.iter().any(|a| a.id == selected_id));
    }

    #[test]
    fn test_selection_outside_viewport_not_forced() {
        let fleet = vec![aircraft("far", 55.0, -115.0, false)];
        let out = sample(
            &fleet,
            &viewport(),
            &CategoryFilters::default(),
            Some("far"),
            &SamplerConfig::default(),
        );
        assert!(out.is_empty());
    }

    #[test]
    fn test_under_cap_passes_through() {
        let fleet = vec![
            aircraft("a", 35.0, -115.0, false),
            aircraft("b", 36.0, -114.0, true),
        ];
        let out = sample(
            &fleet,
            &viewport(),
            &CategoryFilters::default(),
            None,
            &SamplerConfig::default(),
        );
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_category_filter() {
        let mut commercial = aircraft("c", 35.0, -115.0, false);
        commercial.callsign = Some("UAL123".to_string());
        let mut cargo = aircraft("f", 35.0, -115.0, false);
        cargo.callsign = Some("FDX88".to_string());

        let filters = CategoryFilters {
            cargo: false,
            ..Default::default()
        };
        let out = sample(
            &[commercial, cargo],
            &viewport(),
            &filters,
            None,
            &SamplerConfig::default(),
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].id, "c");
    }

    #[test]
    fn test_sampler_config_survives_serialization() {
        // The application persists these knobs in its config file.
        let config = SamplerConfig {
            max_markers: 500,
            airborne_share: 0.5,
            pad_ratio: 0.1,
            min_zoom: 7.0,
        };
        let encoded = serde_json::to_string(&config).unwrap();
        let decoded: SamplerConfig = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded.max_markers, 500);
        assert!((decoded.airborne_share - 0.5).abs() < 1e-9);
        assert!((decoded.pad_ratio - 0.1).abs() < 1e-9);
        assert!((decoded.min_zoom - 7.0).abs() < 1e-9);
    }

    #[test]
    fn test_derive_category() {
        assert_eq!(derive_category(Some("UAL123")), Category::Commercial);
        assert_eq!(derive_category(Some("dal42")), Category::Commercial);
        assert_eq!(derive_category(Some("FDX1234")), Category::Cargo);
        assert_eq!(derive_category(Some("UPS909")), Category::Cargo);
        assert_eq!(derive_category(Some("RCH440")), Category::Military);
        assert_eq!(derive_category(Some("N123AB")), Category::Private);
        assert_eq!(derive_category(Some("D-EABC")), Category::Private);
        assert_eq!(derive_category(Some("")), Category::Private);
        assert_eq!(derive_category(None), Category::Private);
    }
}
