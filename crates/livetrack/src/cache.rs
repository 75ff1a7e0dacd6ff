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

//! Presentation caches: memoized icon and tooltip artifacts.
//!
//! Both caches key on coarse, quantized state so visually identical states
//! share one artifact. Key spaces are bounded (24 heading buckets x 2 x 2
//! for icons; one entry per distinct tooltip fingerprint), so no eviction is
//! needed. Each engine instance owns its own tables; nothing here is
//! process-global.

use std::collections::HashMap;
use std::sync::Arc;

use crate::sampler::LiveAircraft;

/// Heading quantization step for icon reuse.
pub const HEADING_BUCKET_DEGREES: f64 = 15.0;

/// Quantize a heading to the nearest 15-degree bucket (0, 15, ... 345).
#[must_use]
pub fn heading_bucket(heading: Option<f64>) -> Option<u16> {
    heading.map(|h| {
        let bucket = (h.rem_euclid(360.0) / HEADING_BUCKET_DEGREES).round() as u16 % 24;
        bucket * HEADING_BUCKET_DEGREES as u16
    })
}

/// Cache key for rendered marker icons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IconKey {
    /// Quantized heading, `None` for aircraft with unknown heading.
    pub heading_bucket: Option<u16>,
    pub selected: bool,
    pub on_ground: bool,
}

/// A rendered icon artifact.
///
/// Deliberately render-library agnostic: the adapter behind `MarkerLayer`
/// maps this to whatever its toolkit needs. Identical discretized states
/// share the same `Arc`.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerIcon {
    /// Rotation applied to the base glyph, in degrees.
    pub rotation_degrees: f32,
    pub selected: bool,
    pub on_ground: bool,
}

/// Memoization table for marker icons.
#[derive(Debug, Default)]
pub struct IconCache {
    icons: HashMap<IconKey, Arc<MarkerIcon>>,
}

impl IconCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the icon for a key, constructing it on first use.
    pub fn get(&mut self, key: IconKey) -> Arc<MarkerIcon> {
        Arc::clone(self.icons.entry(key).or_insert_with(|| {
            Arc::new(MarkerIcon {
                rotation_degrees: f32::from(key.heading_bucket.unwrap_or(0)),
                selected: key.selected,
                on_ground: key.on_ground,
            })
        }))
    }

    /// Number of distinct icons constructed so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.icons.len()
    }

    /// Whether no icons have been constructed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.icons.is_empty()
    }
}

/// Coarse tooltip state: content only changes when this changes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TooltipFingerprint {
    pub callsign: Option<String>,
    pub on_ground: bool,
    /// Altitude rounded to the nearest 100 m.
    pub altitude_bucket: Option<i64>,
    /// Speed rounded to the nearest 10 m/s.
    pub speed_bucket: Option<i64>,
}

impl TooltipFingerprint {
    /// Fingerprint of an aircraft's current display-relevant state.
    #[must_use]
    pub fn of(aircraft: &LiveAircraft) -> Self {
        Self {
            callsign: aircraft.callsign.clone(),
            on_ground: aircraft.on_ground,
            altitude_bucket: aircraft.altitude_meters.map(|a| (a / 100.0).round() as i64),
            speed_bucket: aircraft.speed_mps.map(|s| (s / 10.0).round() as i64),
        }
    }
}

/// Memoization table for tooltip markup.
#[derive(Debug, Default)]
pub struct TooltipCache {
    tooltips: HashMap<TooltipFingerprint, Arc<str>>,
}

impl TooltipCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the markup for a fingerprint, rendering it on first use.
    pub fn get(&mut self, fingerprint: &TooltipFingerprint) -> Arc<str> {
        if let Some(markup) = self.tooltips.get(fingerprint) {
            return Arc::clone(markup);
        }
        let markup: Arc<str> = Arc::from(render_tooltip(fingerprint));
        self.tooltips
            .insert(fingerprint.clone(), Arc::clone(&markup));
        markup
    }

    /// Number of distinct tooltips rendered so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tooltips.len()
    }

    /// Whether no tooltips have been rendered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tooltips.is_empty()
    }
}

fn render_tooltip(fingerprint: &TooltipFingerprint) -> String {
    let mut markup = format!(
        "<b>{}</b>",
        fingerprint.callsign.as_deref().unwrap_or("(no callsign)")
    );

    if fingerprint.on_ground {
        markup.push_str("<br>on ground");
    } else {
        if let Some(altitude) = fingerprint.altitude_bucket {
            markup.push_str(&format!("<br>{} m", altitude * 100));
        }
        if let Some(speed) = fingerprint.speed_bucket {
            markup.push_str(&format!("<br>{} m/s", speed * 10));
        }
    }

    markup
}
