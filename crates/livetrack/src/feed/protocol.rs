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

//! Push-channel wire format.
//!
//! The upstream feed sends one JSON-encoded batch per line: a timestamp, a
//! total count, and the full entity list. Field names on the wire are
//! camelCase. Optional telemetry (heading, altitude, speed) is carried as
//! `null` when unknown and stays `None` here rather than being defaulted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur while decoding or encoding feed messages.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed batch: {0}")]
    MalformedBatch(#[from] serde_json::Error),
}

/// One aircraft as reported by the upstream feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedEntity {
    /// Stable identifier, unique across updates.
    pub id: String,
    /// Free-text label (callsign).
    #[serde(default)]
    pub label: Option<String>,
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lon: f64,
    /// Barometric altitude in meters.
    #[serde(default)]
    pub altitude_meters: Option<f64>,
    /// Ground speed in meters per second.
    #[serde(default)]
    pub speed_mps: Option<f64>,
    /// Heading in degrees (0-360, north = 0), absent when unknown.
    #[serde(default)]
    pub heading_degrees: Option<f64>,
    /// Whether the aircraft is on the ground.
    pub on_ground: bool,
    /// Aircraft type designator (e.g. "B738").
    #[serde(default)]
    pub type_code: Option<String>,
}

/// An authoritative snapshot batch from the push channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedBatch {
    /// Server-side timestamp of the snapshot.
    pub timestamp: DateTime<Utc>,
    /// Total entity count reported by the server.
    pub count: u32,
    /// Entity states. Absence of a previously seen id means it is gone.
    pub entities: Vec<FeedEntity>,
}

/// Parse one line from the push channel into a batch.
///
/// Returns `Ok(None)` for blank lines (keep-alives), `Err` for lines that
/// fail to decode.
pub fn parse_batch(line: &str) -> Result<Option<FeedBatch>, ProtocolError> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(trimmed)?))
}

/// Best-effort RPC hints sent upstream while connected.
///
/// These inform the server which entities the client cares about. Failures
/// are logged by the connection layer and never propagated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum HintMessage {
    Subscribe { id: String },
    Unsubscribe { id: String },
}

impl HintMessage {
    /// Encode as a newline-terminated wire line.
    pub fn to_line(&self) -> Result<String, ProtocolError> {
        let mut line = serde_json::to_string(self)?;
        line.push('\n');
        Ok(line)
    }
}
