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

//! Feed status snapshot for the surrounding application's indicator.

use chrono::{DateTime, Utc};

use crate::feed::FeedState;

/// Connection state and counters for the feed.
#[derive(Debug, Clone)]
pub struct FeedStatus {
    /// Current feed connection state.
    pub state: FeedState,
    /// Last connection error, if any.
    pub last_error: Option<String>,
    /// Total batches received (push and fallback).
    pub batch_count: u64,
    /// Entities currently tracked.
    pub entity_count: usize,
    /// When the current connection was established.
    pub connected_at: Option<DateTime<Utc>>,
    /// When the last batch arrived.
    pub last_batch_at: Option<DateTime<Utc>>,
}

impl Default for FeedStatus {
    fn default() -> Self {
        Self {
            state: FeedState::Disconnected,
            last_error: None,
            batch_count: 0,
            entity_count: 0,
            connected_at: None,
            last_batch_at: None,
        }
    }
}

impl FeedStatus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a state transition.
    pub fn set_state(&mut self, state: FeedState) {
        match &state {
            FeedState::Connected => {
                self.connected_at = Some(Utc::now());
                self.last_error = None;
            }
            FeedState::Error(message) => {
                self.last_error = Some(message.clone());
                self.connected_at = None;
            }
            FeedState::Disconnected => {
                self.connected_at = None;
            }
            FeedState::Connecting => {}
        }
        self.state = state;
    }

    /// Record an applied batch and the resulting table size.
    pub fn record_batch(&mut self, entity_count: usize) {
        self.batch_count += 1;
        self.entity_count = entity_count;
        self.last_batch_at = Some(Utc::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_transitions() {
        let mut status = FeedStatus::new();
        assert_eq!(status.state, FeedState::Disconnected);

        status.set_state(FeedState::Connected);
        assert!(status.connected_at.is_some());
        assert!(status.last_error.is_none());

        status.set_state(FeedState::Error("refused".to_string()));
        assert_eq!(status.last_error.as_deref(), Some("refused"));
        assert!(status.connected_at.is_none());
    }

    #[test]
    fn test_batch_counters() {
        let mut status = FeedStatus::new();
        status.record_batch(42);
        status.record_batch(40);
        assert_eq!(status.batch_count, 2);
        assert_eq!(status.entity_count, 40);
        assert!(status.last_batch_at.is_some());
    }
}
