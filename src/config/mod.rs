// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the pv-modbus-exporter project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration management for the PV Modbus exporter
//!
//! This module provides functionality for loading, validating, and applying
//! configuration settings. The configuration is backed by a YAML file and
//! validated against a JSON schema before deserialization.
//!
//! ## Configuration Structure
//!
//! The configuration is organized as a nested structure with sections:
//! - `inverter`: Modbus connection and polling schedule settings
//! - `exporter`: settings for the Prometheus scrape HTTP server
//!
//! ## Usage
//!
//! ```no_run
//! use pv_modbus_exporter::config::Config;
//! use std::path::Path;
//!
//! // Load config from file, creates a default one if not found
//! let mut config = Config::from_file(Path::new("config.yaml")).unwrap();
//!
//! // Apply command line overrides if needed
//! config.apply_args(
//!     Some(9503),                          // Listen port
//!     Some("0.0.0.0".to_string()),         // Listen address
//!     Some("192.168.1.40:502".to_string()),// Inverter address
//!     Some(3),                             // Unit id
//!     Some(10),                            // Poll interval
//! );
//!
//! println!("Exporter port: {}", config.exporter.port);
//! ```

pub mod exporter;
pub mod inverter;
pub mod utils;

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, error};
use serde::{Deserialize, Serialize};

// Re-export all types for public API
pub use exporter::ExporterConfig;
pub use inverter::InverterConfig;
pub use utils::{output_config_schema, validate_specific_rules};

/// Root configuration structure for the PV Modbus exporter.
///
/// The configuration is deserialized from and serialized to YAML using the
/// serde framework and validated against a JSON schema to ensure all fields
/// have valid values.
///
/// # Default Values
///
/// Each section uses default values when not explicitly specified in the
/// configuration file, allowing for minimal configuration when custom
/// settings are not required.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Modbus connection and polling schedule settings.
    ///
    /// These settings control which inverter is polled, on which unit id,
    /// and how often, plus the reconnect backoff used when the inverter is
    /// unreachable. If not specified, default values are used.
    #[serde(default)]
    pub inverter: InverterConfig,

    /// Settings for the Prometheus scrape HTTP server.
    ///
    /// These settings control the network binding of the `/metrics` and
    /// `/healthz` endpoints. If not specified, default values are used.
    #[serde(default)]
    pub exporter: ExporterConfig,
}

impl Config {
    /// Helper method to create a sample config file when validation fails
    fn create_sample_config<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        debug!("Creating sample configuration file at {:?}", path);
        let sample_path = path.with_extension("sample.yaml");

        // Create parent directories if they don't exist
        if let Some(parent) = sample_path.parent() {
            if !parent.exists() {
                debug!("Creating parent directory: {:?}", parent);
                fs::create_dir_all(parent).with_context(|| {
                    format!(
                        "Failed to create parent directory for sample config at {:?}",
                        parent
                    )
                })?;
            }
        }

        let sample_config = Self::default();
        sample_config
            .save_to_file(&sample_path)
            .with_context(|| format!("Failed to save sample config to {:?}", sample_path))?;

        error!(
            "Sample configuration file created at {:?}\nPlease edit and rename it",
            sample_path
        );
        Ok(())
    }

    /// Load configuration from a file
    ///
    /// If the file does not exist, a default configuration is written to the
    /// given path and returned. An existing file is validated against the
    /// embedded JSON schema before deserialization; on validation failure a
    /// `.sample.yaml` file with default values is generated next to it.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(
                "Configuration file not found at {:?}, creating default",
                path
            );
            let default_config = Self::default();
            default_config.save_to_file(path)?;
            return Ok(default_config);
        }

        debug!("Loading configuration from {:?}", path);
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file at {:?}", path))?;

        // First step: convert YAML to a generic Value
        let yaml_value: serde_yml::Value = serde_yml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML configuration from {:?}", path))?;

        // Convert to JSON Value for validation
        let json_value = serde_json::to_value(&yaml_value).with_context(|| {
            format!("Failed to convert YAML to JSON for validation: {:?}", path)
        })?;

        // Load and validate with the schema
        let schema_str = include_str!("../../resources/config.schema.json");
        let schema: serde_json::Value =
            serde_json::from_str(schema_str).context("Failed to parse JSON schema")?;

        let validator = jsonschema::draft202012::options()
            .should_validate_formats(true)
            .build(&schema)?;

        // Validate before deserializing to Config
        debug!("Validating {} configuration against schema", path.display());
        if let Err(error) = validator.validate(&json_value) {
            error!("Configuration validation error before deserialization");
            // Generate a config.sample.yaml file with default values for the
            // user to edit
            Self::create_sample_config(path)?;
            anyhow::bail!("Configuration validation failed: {}", error);
        }

        // Now that YAML has been validated, deserialize to Config
        debug!("Schema validation passed, deserializing into Config structure");
        let config: Config = match serde_yml::from_str(&contents) {
            Ok(config) => config,
            Err(err) => {
                error!("Configuration deserialization error: {}", err);
                match Self::create_sample_config(path) {
                    Ok(_) => debug!("Successfully created sample config"),
                    Err(e) => error!("Failed to create sample config: {}", e),
                }

                return Err(anyhow::anyhow!(
                    "Failed to deserialize configuration from {}: {}",
                    path.display(),
                    err
                ));
            }
        };

        // Perform additional specific validations
        if let Err(err) = utils::validate_specific_rules(&config) {
            error!("Configuration specific validation error: {}", err);
            Self::create_sample_config(path)?;
            return Err(err);
        }

        Ok(config)
    }

    /// Save the configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml =
            serde_yml::to_string(self).context("Failed to serialize configuration to YAML")?;

        let mut file = File::create(path.as_ref())
            .with_context(|| format!("Failed to create config file at {:?}", path.as_ref()))?;

        file.write_all(yaml.as_bytes())
            .with_context(|| format!("Failed to write configuration to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Apply command line arguments to override configuration values.
    ///
    /// Only values that are explicitly provided override the existing
    /// configuration.
    ///
    /// # Parameters
    ///
    /// * `listen_port` - TCP port for the exporter HTTP server
    /// * `listen_address` - Network address for the exporter HTTP server
    /// * `inverter_address` - Inverter address as `host:port`
    /// * `unit_id` - Modbus unit (slave) identifier
    /// * `poll_interval` - Seconds between polling cycles
    pub fn apply_args(
        &mut self,
        listen_port: Option<u16>,
        listen_address: Option<String>,
        inverter_address: Option<String>,
        unit_id: Option<u8>,
        poll_interval: Option<u64>,
    ) {
        // Only override if command-line arguments are provided
        if let Some(listen_port) = listen_port {
            debug!("Overriding listen port from command line: {}", listen_port);
            self.exporter.port = listen_port;
        }

        if let Some(listen_address) = listen_address {
            debug!(
                "Overriding listen address from command line: {}",
                listen_address
            );
            self.exporter.address = listen_address;
        }

        if let Some(inverter_address) = inverter_address {
            debug!(
                "Overriding inverter address from command line: {}",
                inverter_address
            );
            self.inverter.address = inverter_address;
        }

        if let Some(unit_id) = unit_id {
            debug!("Overriding unit id from command line: {}", unit_id);
            self.inverter.unit_id = unit_id;
        }

        if let Some(poll_interval) = poll_interval {
            debug!(
                "Overriding poll interval from command line: {}",
                poll_interval
            );
            self.inverter.poll_interval_secs = poll_interval;
        }
    }
}
