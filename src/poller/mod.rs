// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the pv-modbus-exporter project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Polling engine
//!
//! Owns the read schedule: every cycle reads the four registers of
//! [`REGISTER_MAP`](crate::inverter::REGISTER_MAP) in table order, decodes
//! each block, and publishes all values into the gauge registry. Nothing is
//! published when any step of the cycle fails, so a scrape during an outage
//! keeps serving the last good values.
//!
//! [`run_polling_loop`] wraps the cycle in the connection lifecycle: it
//! reconnects with exponential backoff while the inverter is unreachable
//! and marks the registry down so scrapes carry an explicit staleness
//! signal. A decode error is fatal to the loop (it indicates a descriptor
//! fault, not a transient device condition); the scrape path stays alive.

use std::net::ToSocketAddrs;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use log::{debug, error, info, warn};
use thiserror::Error;
use tokio::time;

use crate::config::InverterConfig;
use crate::inverter::{DecodeError, ModbusRegisterReader, RegisterReader, REGISTER_MAP};
use crate::metrics::GaugeRegistry;

/// Errors of one polling cycle.
#[derive(Debug, Error)]
pub enum PollError {
    /// The field-bus read failed; transient, handled by reconnecting.
    #[error("failed to read {count} registers at address {address}: {source}")]
    Read {
        address: u16,
        count: u16,
        source: anyhow::Error,
    },

    /// The returned block did not match the descriptor; fatal.
    #[error("failed to decode register block at address {address}: {source}")]
    Decode {
        address: u16,
        #[source]
        source: DecodeError,
    },
}

impl PollError {
    /// Whether the polling loop must stop instead of reconnecting.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PollError::Decode { .. })
    }
}

/// Reads and decodes the register schedule against one connection.
pub struct Poller<R: RegisterReader> {
    reader: R,
    gauges: Arc<GaugeRegistry>,
}

impl<R: RegisterReader> Poller<R> {
    pub fn new(reader: R, gauges: Arc<GaugeRegistry>) -> Self {
        Self { reader, gauges }
    }

    /// Perform one full polling cycle.
    ///
    /// Reads and decodes all four registers in table order, then publishes
    /// the samples and refreshes the staleness signal. If any read or
    /// decode fails, no gauge is touched and the error is returned.
    pub async fn poll_cycle(&mut self) -> Result<(), PollError> {
        let mut samples = Vec::with_capacity(REGISTER_MAP.len());

        for spec in &REGISTER_MAP {
            let block = self
                .reader
                .read_registers(spec.address, spec.count())
                .await
                .map_err(|source| PollError::Read {
                    address: spec.address,
                    count: spec.count(),
                    source,
                })?;

            let value = spec.kind.decode(&block).map_err(|source| PollError::Decode {
                address: spec.address,
                source,
            })?;

            debug!("Decoded {} = {}", spec.metric.name(), value);
            samples.push((spec.metric, value));
        }

        for (metric, value) in samples {
            self.gauges.set(metric, value);
        }
        self.gauges.mark_up();

        Ok(())
    }
}

/// Run the polling loop until shutdown or a fatal decode error.
///
/// Connection failures and read errors are not fatal: the registry is
/// marked down and the connection is re-established with exponential
/// backoff, capped at `max_connect_backoff_secs`. The backoff resets after
/// the first successful cycle on a connection.
pub async fn run_polling_loop(
    config: InverterConfig,
    gauges: Arc<GaugeRegistry>,
    running: Arc<AtomicBool>,
) -> Result<()> {
    let interval = Duration::from_secs(config.poll_interval_secs);
    let initial_backoff = Duration::from_secs(config.connect_backoff_secs);
    let max_backoff = Duration::from_secs(config.max_connect_backoff_secs);
    let mut backoff = initial_backoff;

    while running.load(Ordering::SeqCst) {
        // Resolve on every attempt so DNS changes are picked up
        let socket_addr = match resolve(&config.address) {
            Ok(socket_addr) => socket_addr,
            Err(err) => {
                warn!(
                    "Could not resolve inverter address: {err}, retrying in {}s",
                    backoff.as_secs()
                );
                gauges.mark_down();
                time::sleep(backoff).await;
                backoff = next_backoff(backoff, max_backoff);
                continue;
            }
        };

        info!("Connecting to inverter at {socket_addr}");
        let reader = match ModbusRegisterReader::connect(socket_addr, config.unit_id).await {
            Ok(reader) => reader,
            Err(err) => {
                warn!(
                    "Inverter connection failed: {err:#}, retrying in {}s",
                    backoff.as_secs()
                );
                gauges.mark_down();
                time::sleep(backoff).await;
                backoff = next_backoff(backoff, max_backoff);
                continue;
            }
        };
        info!("Connected to inverter, polling every {}s", interval.as_secs());

        let mut poller = Poller::new(reader, gauges.clone());
        while running.load(Ordering::SeqCst) {
            match poller.poll_cycle().await {
                Ok(()) => {
                    backoff = initial_backoff;
                    time::sleep(interval).await;
                }
                Err(err) if err.is_fatal() => {
                    gauges.mark_down();
                    error!("Polling stopped: {err}");
                    return Err(err.into());
                }
                Err(err) => {
                    gauges.mark_down();
                    warn!(
                        "Polling cycle failed: {err}, reconnecting in {}s",
                        backoff.as_secs()
                    );
                    time::sleep(backoff).await;
                    backoff = next_backoff(backoff, max_backoff);
                    break;
                }
            }
        }
    }

    info!("Polling loop stopped");
    Ok(())
}

fn resolve(address: &str) -> Result<std::net::SocketAddr> {
    address
        .to_socket_addrs()
        .with_context(|| format!("failed to resolve inverter address {address:?}"))?
        .next()
        .ok_or_else(|| anyhow!("no socket address resolved for {address:?}"))
}

fn next_backoff(current: Duration, max: Duration) -> Duration {
    (current * 2).min(max)
}
