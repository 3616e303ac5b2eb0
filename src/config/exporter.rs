// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the pv-modbus-exporter project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Metrics HTTP server configuration
//!
//! This module defines the structures for configuring the HTTP server that
//! exposes the Prometheus scrape endpoint.

use serde::{Deserialize, Serialize};

/// Configuration for the Prometheus exporter HTTP server.
///
/// # Fields
///
/// * `enabled` - Flag to enable or disable the HTTP server
/// * `address` - Network address to bind to (default: 127.0.0.1)
/// * `port` - TCP port to listen on (default: 9502)
/// * `name` - Server identity string sent in response headers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExporterConfig {
    /// Flag to enable or disable the exporter HTTP server.
    ///
    /// When disabled, the poller still runs but no scrape endpoint is
    /// exposed. Mostly useful for tests.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// The network address the HTTP server will bind to.
    ///
    /// Use "0.0.0.0" to bind to all IPv4 interfaces.
    #[serde(default = "default_exporter_address")]
    pub address: String,

    /// The TCP port the HTTP server will listen on.
    ///
    /// Valid range is 1-65534. Default is 9502, in the Prometheus exporter
    /// port range.
    #[serde(default = "default_exporter_port")]
    pub port: u16,

    /// Server identity reported in HTTP responses.
    #[serde(default = "default_exporter_name")]
    pub name: String,
}

fn default_enabled() -> bool {
    true
}

fn default_exporter_address() -> String {
    "127.0.0.1".to_string()
}

fn default_exporter_port() -> u16 {
    9502
}

fn default_exporter_name() -> String {
    format!("PvModbusExporter/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for ExporterConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            address: default_exporter_address(),
            port: default_exporter_port(),
            name: default_exporter_name(),
        }
    }
}
