// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the pv-modbus-exporter project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration helpers
//!
//! Validation rules that the JSON schema cannot express, plus the
//! `--show-config-schema` output used by the command line interface.

use anyhow::{bail, Result};

use super::Config;

/// Print the embedded JSON schema for the configuration file and exit.
pub fn output_config_schema() -> Result<()> {
    let schema_str = include_str!("../../resources/config.schema.json");
    println!("{}", schema_str);
    Ok(())
}

/// Validate cross-field rules that are out of reach for the JSON schema.
pub fn validate_specific_rules(config: &Config) -> Result<()> {
    if config.inverter.poll_interval_secs == 0 {
        bail!("inverter.poll_interval_secs must be at least 1");
    }

    if !config.inverter.address.contains(':') {
        bail!(
            "inverter.address must be host:port, got {:?}",
            config.inverter.address
        );
    }

    if config.inverter.connect_backoff_secs == 0 {
        bail!("inverter.connect_backoff_secs must be at least 1");
    }

    if config.inverter.max_connect_backoff_secs < config.inverter.connect_backoff_secs {
        bail!(
            "inverter.max_connect_backoff_secs ({}) must not be lower than inverter.connect_backoff_secs ({})",
            config.inverter.max_connect_backoff_secs,
            config.inverter.connect_backoff_secs
        );
    }

    if config.exporter.port == 0 {
        bail!("exporter.port must not be 0");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_passes_specific_rules() {
        let config = Config::default();
        assert!(validate_specific_rules(&config).is_ok());
    }

    #[test]
    fn zero_poll_interval_is_rejected() {
        let mut config = Config::default();
        config.inverter.poll_interval_secs = 0;
        assert!(validate_specific_rules(&config).is_err());
    }

    #[test]
    fn address_without_port_is_rejected() {
        let mut config = Config::default();
        config.inverter.address = "localhost".to_string();
        assert!(validate_specific_rules(&config).is_err());
    }

    #[test]
    fn inverted_backoff_bounds_are_rejected() {
        let mut config = Config::default();
        config.inverter.connect_backoff_secs = 30;
        config.inverter.max_connect_backoff_secs = 10;
        assert!(validate_specific_rules(&config).is_err());
    }
}
