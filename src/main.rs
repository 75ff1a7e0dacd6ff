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

mod config;
mod log_layer;

use std::time::Duration;

use clap::Parser;
use livetrack::{Engine, EngineConfig, FeedConfig, Viewport};
use log::{error, info};

use config::AppConfig;
use log_layer::LogLayer;

#[derive(Parser, Debug)]
#[command(name = "skymap", about = "Live aircraft map engine")]
struct Args {
    /// Feed address override in host:port format
    #[arg(long)]
    address: Option<String>,

    /// Fallback pull URL override
    #[arg(long)]
    fallback_url: Option<String>,

    /// Persist command line overrides to the config file
    #[arg(long)]
    save: bool,

    /// Entity id to select at startup
    #[arg(long)]
    select: Option<String>,
}

#[tokio::main]
async fn main() {
    env_logger::init();
    let args = Args::parse();

    let mut config = match AppConfig::load() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load config, using defaults: {}", e);
            AppConfig::default()
        }
    };

    if let Ok(path) = AppConfig::get_config_path() {
        info!("Using config at {}", path.display());
    }

    if let Some(address) = args.address {
        config.feed_address = address;
    }
    if let Some(url) = args.fallback_url {
        config.fallback_url = Some(url);
    }
    if args.save {
        if let Err(e) = config.save() {
            error!("Failed to save config: {}", e);
        }
    }

    info!("Starting skymap against feed at {}", config.feed_address);

    let engine_config = EngineConfig {
        sampler: config.sampler.clone(),
        ..Default::default()
    };
    let feed_config = FeedConfig {
        address: config.feed_address.clone(),
        fallback_url: config.fallback_url.clone(),
        ..Default::default()
    };

    let engine = Engine::spawn(engine_config, feed_config, LogLayer::new());

    engine.set_viewport(Viewport {
        south: config.viewport_south,
        north: config.viewport_north,
        west: config.viewport_west,
        east: config.viewport_east,
        zoom: config.default_zoom,
    });
    engine.set_filters(config.filters);

    if let Some(id) = args.select {
        engine.select(Some(id));
    }

    // Log connectivity transitions as they happen.
    let mut connected = engine.connected();
    tokio::spawn(async move {
        while connected.changed().await.is_ok() {
            let is_connected = *connected.borrow();
            info!("Feed {}", if is_connected { "connected" } else { "disconnected" });
        }
    });

    let mut status_interval = tokio::time::interval(Duration::from_secs(10));
    status_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = status_interval.tick() => {
                let status = engine.status();
                match status.last_batch_at {
                    Some(at) => info!(
                        "{} entities, {} batches, last at {}",
                        status.entity_count,
                        status.batch_count,
                        at.format("%H:%M:%S"),
                    ),
                    None => info!("{} entities, no batches yet", status.entity_count),
                }
            }
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    error!("Failed to listen for shutdown signal: {}", e);
                }
                break;
            }
        }
    }

    info!("Shutting down");
    engine.shutdown();
}
