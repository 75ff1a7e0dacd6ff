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

//! Motion interpolation between authoritative snapshots.
//!
//! Snapshots arrive roughly every 30 seconds; between them each aircraft is
//! moved along a linear segment from its previously interpolated position to
//! the newly reported one. Retargeting always starts from the *currently
//! interpolated* value, never from the previous segment end, so a new
//! snapshot never makes a marker snap. Headings blend along the shortest arc
//! around the circle. Sampling is a pure read and may be called at any
//! instant; past the segment window the value clamps to the segment end.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Interpolated position and heading of one aircraft.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
    /// Heading in degrees [0, 360), `None` when unknown.
    pub heading: Option<f64>,
}

/// Per-aircraft interpolation segment.
#[derive(Debug, Clone)]
struct MotionSegment {
    start: Pose,
    end: Pose,
    started_at: Instant,
}

/// Configuration for the interpolation engine.
#[derive(Debug, Clone)]
pub struct InterpolatorConfig {
    /// How long a segment takes to play out. Chosen slightly below the
    /// expected snapshot cadence so motion completes just before the next
    /// snapshot arrives.
    pub segment_duration: Duration,
}

impl Default for InterpolatorConfig {
    fn default() -> Self {
        Self {
            segment_duration: Duration::from_secs(25),
        }
    }
}

/// Interpolation engine: one motion segment per aircraft id.
#[derive(Debug)]
pub struct Interpolator {
    segments: HashMap<String, MotionSegment>,
    segment_duration: Duration,
}

impl Interpolator {
    #[must_use]
    pub fn new(config: InterpolatorConfig) -> Self {
        Self {
            segments: HashMap::new(),
            segment_duration: config.segment_duration,
        }
    }

    /// Retarget an aircraft toward a newly reported pose.
    ///
    /// The new segment starts at the value currently being displayed (the
    /// interpolated pose at `at`), or at `new_end` itself if the aircraft
    /// has no prior segment.
    pub fn retarget(&mut self, id: &str, new_end: Pose, at: Instant) {
        let start = match self.segments.get(id) {
            Some(segment) => sample_segment(segment, at, self.segment_duration),
            None => new_end,
        };

        self.segments.insert(
            id.to_string(),
            MotionSegment {
                start,
                end: new_end,
                started_at: at,
            },
        );
    }

    /// Sample the interpolated pose for an aircraft at an instant.
    ///
    /// Pure read with no side effects. Returns `None` for unknown ids; the
    /// caller falls back to the raw last-known value.
    #[must_use]
    pub fn sample(&self, id: &str, at: Instant) -> Option<Pose> {
        self.segments
            .get(id)
            .map(|segment| sample_segment(segment, at, self.segment_duration))
    }

    /// Drop the segment for an aircraft that left the live set.
    pub fn retire(&mut self, id: &str) {
        self.segments.remove(id);
    }

    /// Number of active segments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Whether there are no active segments.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

fn sample_segment(segment: &MotionSegment, at: Instant, duration: Duration) -> Pose {
    // Instants before the segment start clamp to t = 0.
    let elapsed = at.saturating_duration_since(segment.started_at);
    let t = if duration.is_zero() {
        1.0
    } else {
        (elapsed.as_secs_f64() / duration.as_secs_f64()).clamp(0.0, 1.0)
    };

    let heading = match (segment.start.heading, segment.end.heading) {
        (Some(from), Some(to)) => Some(blend_heading(from, to, t)),
        // Unknown headings pass through unchanged, never interpolated.
        _ => segment.end.heading,
    };

    Pose {
        lat: segment.start.lat + (segment.end.lat - segment.start.lat) * t,
        lon: segment.start.lon + (segment.end.lon - segment.start.lon) * t,
        heading,
    }
}

/// Blend two headings along the shortest arc.
///
/// The angular delta is normalized into (-180, 180] before scaling, and the
/// result re-normalized into [0, 360), so interpolating from 350 to 10
/// passes through 0, never through 180.
#[must_use]
pub fn blend_heading(from: f64, to: f64, t: f64) -> f64 {
    normalize_degrees(from + shortest_arc_degrees(from, to) * t)
}

/// Signed shortest angular distance from one heading to another, in
/// (-180, 180].
#[must_use]
pub fn shortest_arc_degrees(from: f64, to: f64) -> f64 {
    let mut delta = (to - from) % 360.0;
    if delta > 180.0 {
        delta -= 360.0;
    } else if delta <= -180.0 {
        delta += 360.0;
    }
    delta
}

/// Normalize an angle into [0, 360).
#[must_use]
pub fn normalize_degrees(degrees: f64) -> f64 {
    degrees.rem_euclid(360.0)
}
