// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Application shell: owns every singleton and their lifetimes.
//!
//! Startup order: timer service → stores (schema) → persistent-defaults
//! bootstrap → event bus dispatcher → race manager → heartbeat. Shutdown
//! unwinds in reverse: stop the race, drain the bus, close the stores.

use crate::config::Config;
use crate::sessions::SessionRegistry;
use parking_lot::Mutex;
use pylon_bus::EventBus;
use pylon_core::clock::SystemClock;
use pylon_core::event::HEARTBEAT;
use pylon_race::{RaceManager, TimerService};
use pylon_store::{HasherPool, RaceDatabase, StoreError, UserDatabase};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Errors that abort startup (the process exits 1) or fail a request.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

/// The wired application. Transport adapters receive this behind an `Arc`.
pub struct App {
    pub config: Config,
    pub users: UserDatabase,
    pub races: RaceDatabase,
    pub bus: EventBus,
    pub timers: Arc<TimerService<SystemClock>>,
    pub manager: RaceManager<SystemClock>,
    pub sessions: SessionRegistry,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    heartbeat: CancellationToken,
}

impl App {
    /// Build and start every component. Any failure here is fatal.
    pub async fn startup(config: Config) -> Result<Arc<Self>, AppError> {
        let timers = Arc::new(TimerService::new(SystemClock::new()));

        let hasher = HasherPool::new(config.hash_workers);
        let users = UserDatabase::open(&config.user_db, hasher).await?;
        users.ensure_defaults(&config.default_username, &config.default_password).await?;
        let races = RaceDatabase::open(&config.race_db).await?;

        let bus = EventBus::new();
        let dispatcher = bus.start();
        let manager = RaceManager::new(bus.clone(), Arc::clone(&timers));

        let app = Arc::new(Self {
            config,
            users,
            races,
            bus,
            timers,
            manager,
            sessions: SessionRegistry::new(),
            dispatcher: Mutex::new(Some(dispatcher)),
            heartbeat: CancellationToken::new(),
        });
        app.spawn_heartbeat();
        info!("application started");
        Ok(app)
    }

    /// Periodic websocket keepalive, published at low priority with no
    /// payload.
    fn spawn_heartbeat(self: &Arc<Self>) {
        let app = Arc::clone(self);
        let cancel = self.heartbeat.clone();
        let period = Duration::from_secs(self.config.heartbeat_secs.max(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The first tick completes immediately; skip it so heartbeats
            // start one period after boot.
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = ticker.tick() => {}
                }
                if app.bus.publish(&HEARTBEAT, serde_json::Value::Null).is_err() {
                    return;
                }
            }
        });
    }

    /// Graceful shutdown: cancel any race, drain the event bus, then close
    /// the stores.
    pub async fn shutdown(&self) {
        info!("shutting down");
        self.manager.stop_race().await;
        self.heartbeat.cancel();

        self.bus.close();
        let dispatcher = self.dispatcher.lock().take();
        if let Some(handle) = dispatcher {
            if let Err(e) = handle.await {
                warn!(error = %e, "event dispatcher ended abnormally");
            }
        }

        self.users.close().await;
        self.races.close().await;
        info!("shutdown complete");
    }
}
