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

//! Application configuration management.
//!
//! Persistent configuration stored in TOML format: feed endpoints, the
//! startup viewport, and marker tuning overrides.

use livetrack::{CategoryFilters, SamplerConfig};
use serde::{Deserialize, Serialize};

/// Default push-channel address for the snapshot feed
pub const DEFAULT_FEED_ADDRESS: &str = "localhost:9030";

/// Application configuration stored in TOML format
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AppConfig {
    /// Push-channel feed address in host:port format
    #[serde(default = "default_feed_address")]
    pub feed_address: String,

    /// Optional pull endpoint used once if the initial connect fails
    #[serde(default)]
    pub fallback_url: Option<String>,

    /// Startup viewport south edge in degrees
    #[serde(default = "default_south")]
    pub viewport_south: f64,

    /// Startup viewport north edge in degrees
    #[serde(default = "default_north")]
    pub viewport_north: f64,

    /// Startup viewport west edge in degrees
    #[serde(default = "default_west")]
    pub viewport_west: f64,

    /// Startup viewport east edge in degrees
    #[serde(default = "default_east")]
    pub viewport_east: f64,

    /// Startup map zoom level
    #[serde(default = "default_zoom")]
    pub default_zoom: f64,

    /// Sampler tuning: marker cap, airborne share, padding, minimum zoom
    #[serde(default)]
    pub sampler: SamplerConfig,

    /// Category filters applied at startup
    #[serde(default)]
    pub filters: CategoryFilters,
}

// Default value functions for serde
fn default_feed_address() -> String {
    DEFAULT_FEED_ADDRESS.to_string()
}

fn default_south() -> f64 {
    33.0
}

fn default_north() -> f64 {
    35.0
}

fn default_west() -> f64 {
    -119.5
}

fn default_east() -> f64 {
    -117.0
}

fn default_zoom() -> f64 {
    8.0
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            feed_address: default_feed_address(),
            fallback_url: None,
            viewport_south: default_south(),
            viewport_north: default_north(),
            viewport_west: default_west(),
            viewport_east: default_east(),
            default_zoom: default_zoom(),
            sampler: SamplerConfig::default(),
            filters: CategoryFilters::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from disk, creating a default file if missing
    pub fn load() -> Result<Self, confy::ConfyError> {
        confy::load("skymap", "config")
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<(), confy::ConfyError> {
        confy::store("skymap", "config", self)
    }

    /// Get the config file path for display to user
    pub fn get_config_path() -> Result<std::path::PathBuf, confy::ConfyError> {
        confy::get_configuration_file_path("skymap", "config")
    }
}
