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

//! Live aircraft map engine: snapshot ingestion, motion smoothing, and
//! marker reconciliation against an abstract render layer.
//!
//! The library turns a periodic snapshot feed into smooth marker motion on
//! a map, without knowing anything about the map widget itself. It is built
//! from layers that can be used independently or composed together:
//!
//! - **Feed layer**: push-channel subscription over TCP with automatic
//!   reconnection, address hot-reload, and a one-shot HTTP fallback pull
//! - **Core layer**: entity table, interpolated motion segments, viewport
//!   sampling, and diff-based marker reconciliation, all driven by explicit
//!   clock instants
//! - **Engine layer**: async driver that wires feed, core, and a concrete
//!   [`MarkerLayer`] together behind a command-channel handle
//!
//! # Quick Start
//!
//! Use the [`Engine`] type for full-stack operation. The render adapter
//! implements [`MarkerLayer`]; everything else is wiring:
//!
//! ```no_run
//! use livetrack::{Engine, EngineConfig, FeedConfig, Viewport};
//! # use std::sync::Arc;
//! # use livetrack::MarkerIcon;
//! # struct MyLayer;
//! # impl livetrack::MarkerLayer for MyLayer {
//! #     fn create_marker(&mut self, _: &str, _: f64, _: f64, _: &Arc<MarkerIcon>) {}
//! #     fn move_marker(&mut self, _: &str, _: f64, _: f64) {}
//! #     fn set_icon(&mut self, _: &str, _: &Arc<MarkerIcon>) {}
//! #     fn set_tooltip(&mut self, _: &str, _: &Arc<str>) {}
//! #     fn clear_tooltip(&mut self, _: &str) {}
//! #     fn remove_marker(&mut self, _: &str) {}
//! #     fn set_selected_marker(&mut self, _: &str, _: f64, _: f64, _: &Arc<MarkerIcon>) {}
//! #     fn clear_selected_marker(&mut self) {}
//! # }
//!
//! #[tokio::main]
//! async fn main() {
//!     let engine = Engine::spawn(
//!         EngineConfig::default(),
//!         FeedConfig {
//!             address: "localhost:9030".to_string(),
//!             ..Default::default()
//!         },
//!         MyLayer,
//!     );
//!
//!     engine.set_viewport(Viewport {
//!         south: 33.0,
//!         north: 35.0,
//!         west: -119.0,
//!         east: -117.0,
//!         zoom: 9.0,
//!     });
//!
//!     tokio::signal::ctrl_c().await.ok();
//!     engine.shutdown();
//! }
//! ```
//!
//! # Using Individual Layers
//!
//! The core pieces are plain synchronous types. The interpolator, for
//! example, works on its own:
//!
//! ```
//! use livetrack::{Interpolator, InterpolatorConfig, Pose};
//! use std::time::{Duration, Instant};
//!
//! let mut interp = Interpolator::new(InterpolatorConfig {
//!     segment_duration: Duration::from_secs(10),
//! });
//!
//! let t0 = Instant::now();
//! interp.retarget("e1", Pose { lat: 34.0, lon: -118.0, heading: Some(90.0) }, t0);
//! interp.retarget("e1", Pose { lat: 34.1, lon: -118.0, heading: Some(90.0) }, t0);
//!
//! let pose = interp.sample("e1", t0 + Duration::from_secs(5)).unwrap();
//! assert!((pose.lat - 34.05).abs() < 1e-9);
//! ```

pub mod cache;
pub mod core;
pub mod engine;
pub mod feed;
pub mod interp;
pub mod reconcile;
pub mod sampler;
pub mod status;
pub mod table;

pub use crate::core::{EngineConfig, LiveMapCore, PublishGate};
pub use cache::{IconCache, IconKey, MarkerIcon, TooltipCache, TooltipFingerprint};
pub use engine::Engine;
pub use feed::protocol::{FeedBatch, FeedEntity, HintMessage};
pub use feed::{Feed, FeedConfig, FeedError, FeedEvent, FeedState};
pub use interp::{Interpolator, InterpolatorConfig, Pose};
pub use reconcile::{MarkerLayer, Reconciler, ReconcilerConfig};
pub use sampler::{Category, CategoryFilters, LiveAircraft, SamplerConfig, Viewport};
pub use status::FeedStatus;
pub use table::{BatchDelta, EntityTable, TrackedAircraft};
