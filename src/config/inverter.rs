// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the pv-modbus-exporter project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Inverter connection configuration
//!
//! This module defines the structures for configuring the Modbus TCP
//! connection to the photovoltaic inverter and the polling schedule.

use serde::{Deserialize, Serialize};

/// Configuration for the inverter Modbus TCP connection and polling cycle.
///
/// # Fields
///
/// * `address` - Inverter address as `host:port` (default: `localhost:502`)
/// * `unit_id` - Modbus unit (slave) identifier (default: 3)
/// * `poll_interval_secs` - Seconds between polling cycles (default: 5)
/// * `connect_backoff_secs` - Initial reconnect backoff (default: 2)
/// * `max_connect_backoff_secs` - Backoff ceiling (default: 60)
///
/// # Example
///
/// ```
/// use pv_modbus_exporter::config::InverterConfig;
///
/// let inverter_config = InverterConfig {
///     address: "192.168.1.40:502".to_string(),
///     unit_id: 3,
///     poll_interval_secs: 5,
///     connect_backoff_secs: 2,
///     max_connect_backoff_secs: 60,
/// };
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InverterConfig {
    /// The inverter address as `host:port`.
    ///
    /// The host part may be an IP address or a hostname; it is resolved
    /// before each connection attempt. Default is "localhost:502", the
    /// standard Modbus TCP port.
    #[serde(default = "default_address")]
    pub address: String,

    /// The Modbus unit (slave) identifier the inverter answers on.
    #[serde(default = "default_unit_id")]
    pub unit_id: u8,

    /// The interval in seconds between two polling cycles.
    ///
    /// Must be at least 1. Each cycle reads the four configured registers
    /// in a fixed order.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Initial delay in seconds before retrying a failed connection.
    ///
    /// The delay doubles after every consecutive failure, up to
    /// `max_connect_backoff_secs`.
    #[serde(default = "default_connect_backoff_secs")]
    pub connect_backoff_secs: u64,

    /// Upper bound in seconds for the reconnect backoff.
    #[serde(default = "default_max_connect_backoff_secs")]
    pub max_connect_backoff_secs: u64,
}

fn default_address() -> String {
    "localhost:502".to_string()
}

fn default_unit_id() -> u8 {
    3
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_connect_backoff_secs() -> u64 {
    2
}

fn default_max_connect_backoff_secs() -> u64 {
    60
}

impl Default for InverterConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            unit_id: default_unit_id(),
            poll_interval_secs: default_poll_interval_secs(),
            connect_backoff_secs: default_connect_backoff_secs(),
            max_connect_backoff_secs: default_max_connect_backoff_secs(),
        }
    }
}
