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

//! Logging marker layer for headless operation.
//!
//! Stands in for a real map widget: every marker mutation is logged at
//! debug level, with a running marker count on create and remove.

use std::sync::Arc;

use livetrack::{MarkerIcon, MarkerLayer};
use log::debug;

/// Marker layer that logs mutations instead of drawing them.
#[derive(Debug, Default)]
pub struct LogLayer {
    marker_count: usize,
}

impl LogLayer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl MarkerLayer for LogLayer {
    fn create_marker(&mut self, id: &str, lat: f64, lon: f64, icon: &Arc<MarkerIcon>) {
        self.marker_count += 1;
        debug!(
            "create {} at ({:.4}, {:.4}) rot {:.0} ({} markers)",
            id, lat, lon, icon.rotation_degrees, self.marker_count
        );
    }

    fn move_marker(&mut self, id: &str, lat: f64, lon: f64) {
        debug!("move {} to ({:.4}, {:.4})", id, lat, lon);
    }

    fn set_icon(&mut self, id: &str, icon: &Arc<MarkerIcon>) {
        debug!("icon {} rot {:.0}", id, icon.rotation_degrees);
    }

    fn set_tooltip(&mut self, id: &str, markup: &Arc<str>) {
        debug!("tooltip {} ({} bytes)", id, markup.len());
    }

    fn clear_tooltip(&mut self, id: &str) {
        debug!("tooltip cleared for {}", id);
    }

    fn remove_marker(&mut self, id: &str) {
        self.marker_count = self.marker_count.saturating_sub(1);
        debug!("remove {} ({} markers)", id, self.marker_count);
    }

    fn set_selected_marker(&mut self, id: &str, lat: f64, lon: f64, _icon: &Arc<MarkerIcon>) {
        debug!("selected {} at ({:.4}, {:.4})", id, lat, lon);
    }

    fn clear_selected_marker(&mut self) {
        debug!("selection cleared");
    }
}
