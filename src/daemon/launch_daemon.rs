// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the pv-modbus-exporter project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! # Daemon Management Module
//!
//! This module provides functionality for running and managing the
//! exporter's background tasks. It handles the lifecycle of:
//!
//! - The inverter polling task
//! - The Prometheus scrape HTTP server
//! - System health monitoring (heartbeat)
//!
//! ## Architecture
//!
//! The daemon uses Tokio's asynchronous runtime to manage concurrent tasks.
//! The polling task and the HTTP server run independently and communicate
//! only through the shared [`GaugeRegistry`]; a scrape never blocks on or
//! triggers a poll, and a dead poller leaves the scrape path serving the
//! last known values together with the `pv_up` staleness signal.

use anyhow::Result;
use log::{debug, error, info, warn};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time;

use crate::config::Config;
use crate::metrics::GaugeRegistry;
use crate::poller::run_polling_loop;
use crate::web::build_rocket;
use rocket::config::LogLevel;

/// Daemon task manager that coordinates the exporter's background services.
///
/// # Fields
///
/// * `tasks` - Collection of handles to running tasks for management and cleanup
/// * `running` - Atomic flag shared between tasks to coordinate shutdown
/// * `gauges` - The registry shared by the poller and the scrape endpoint
///
/// # Thread Safety
///
/// The `running` flag is wrapped in an `Arc` so every task can check it
/// periodically and terminate gracefully. The gauge registry is the only
/// state shared between tasks.
pub struct Daemon {
    tasks: Vec<JoinHandle<Result<()>>>,
    running: Arc<AtomicBool>,
    gauges: Arc<GaugeRegistry>,
}

impl Daemon {
    /// Create a new daemon instance with an empty task list.
    ///
    /// # Errors
    ///
    /// Fails if the gauge registry cannot be constructed (duplicate metric
    /// registration, which would be a programming error).
    pub fn new() -> Result<Self> {
        Ok(Daemon {
            tasks: Vec::new(),
            running: Arc::new(AtomicBool::new(true)),
            gauges: Arc::new(GaugeRegistry::new()?),
        })
    }

    /// Get a handle to the shared gauge registry.
    pub fn gauges(&self) -> Arc<GaugeRegistry> {
        self.gauges.clone()
    }

    /// Launch all configured tasks based on configuration.
    ///
    /// The polling task and the heartbeat are always started; the scrape
    /// HTTP server only when `config.exporter.enabled` is `true`.
    pub async fn launch(&mut self, config: &Config) -> Result<()> {
        self.start_poller(config)?;

        if config.exporter.enabled {
            self.start_exporter_server(config).await?;
        }

        self.start_heartbeat()?;

        Ok(())
    }

    /// Start the inverter polling task.
    ///
    /// The task owns the Modbus connection for its whole lifetime and is
    /// the only writer of the gauge registry. It keeps reconnecting with
    /// backoff while the inverter is unreachable and only terminates on
    /// shutdown or on a fatal decode error.
    fn start_poller(&mut self, config: &Config) -> Result<()> {
        info!(
            "Starting inverter polling task against {} (unit {})",
            config.inverter.address, config.inverter.unit_id
        );

        let running = self.running.clone();
        let gauges = self.gauges.clone();
        let inverter = config.inverter.clone();
        let task = tokio::spawn(async move { run_polling_loop(inverter, gauges, running).await });

        self.tasks.push(task);
        Ok(())
    }

    /// Start the Rocket server exposing `/metrics` and `/healthz`.
    ///
    /// This method spawns an asynchronous task that runs the web server in
    /// the background for the lifetime of the process.
    ///
    /// # Errors
    ///
    /// This function can fail if the server fails to bind to the specified
    /// address/port or fails to initialize for any other reason.
    async fn start_exporter_server(&mut self, config: &Config) -> Result<()> {
        info!(
            "Starting exporter HTTP server on {}:{}",
            config.exporter.address, config.exporter.port
        );

        let figment = rocket::Config::figment()
            .merge(("ident", config.exporter.name.clone()))
            .merge(("address", config.exporter.address.clone()))
            .merge(("port", config.exporter.port))
            .merge(("log_level", LogLevel::Normal));

        let rocket = build_rocket(figment, self.gauges.clone()).await;

        let task = tokio::spawn(async move {
            let ignited = rocket.ignite().await?;
            ignited.launch().await?;
            Ok(())
        });

        self.tasks.push(task);
        Ok(())
    }

    /// Start a heartbeat task that logs system status periodically.
    ///
    /// The heartbeat runs every 60 seconds and continues until the daemon's
    /// `running` flag is set to `false`. In a production environment these
    /// messages can be monitored by an external system to detect if the
    /// daemon has stopped functioning.
    fn start_heartbeat(&mut self) -> Result<()> {
        info!("Starting heartbeat monitor");

        let running = self.running.clone();
        let gauges = self.gauges.clone();
        let task = tokio::spawn(async move {
            while running.load(Ordering::SeqCst) {
                debug!(
                    "Daemon heartbeat: running, inverter up: {}",
                    gauges.is_up()
                );
                time::sleep(Duration::from_secs(60)).await;
            }
            Ok(())
        });

        self.tasks.push(task);
        Ok(())
    }

    /// Stop all running tasks gracefully.
    ///
    /// Signals all spawned tasks to terminate by setting the shared
    /// `running` flag to `false`. This method only signals the tasks to
    /// stop; call `join()` afterwards to wait for them.
    pub fn shutdown(&self) {
        info!("Shutting down daemon tasks");
        self.running.store(false, Ordering::SeqCst);
        // Tasks should check the running flag and terminate gracefully
    }

    /// Wait for all tasks to complete.
    ///
    /// Consumes the daemon and waits for all spawned tasks to finish
    /// execution. Task panics are logged but do not fail this method.
    pub async fn join(self) -> Result<()> {
        for task in self.tasks {
            match tokio::time::timeout(Duration::from_secs(5), task).await {
                Ok(result) => match result {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => error!("Task finished with error: {e:#}"),
                    Err(e) => error!("Task panicked: {e}"),
                },
                Err(_) => {
                    // Task didn't complete within timeout
                    warn!("Task did not complete within timeout period, may be hung");
                }
            }
        }
        Ok(())
    }
}
