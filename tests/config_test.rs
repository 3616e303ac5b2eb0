// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the pv-modbus-exporter project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use anyhow::Result;
use pv_modbus_exporter::config::{Config, ExporterConfig, InverterConfig};
use std::fs;
use tempfile::tempdir;

#[test]
fn test_config_load_and_save() -> Result<()> {
    // Create a temporary directory
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.yaml");

    // Create a custom config
    let config = Config {
        inverter: InverterConfig {
            address: "192.168.1.40:502".to_string(),
            unit_id: 5,
            poll_interval_secs: 10,
            connect_backoff_secs: 2,
            max_connect_backoff_secs: 30,
        },
        exporter: ExporterConfig {
            enabled: true,
            address: "0.0.0.0".to_string(),
            port: 9600,
            name: "TestExporter".to_string(),
        },
    };

    // Save config to file
    config.save_to_file(&config_path)?;

    // Load config from file
    let loaded_config = Config::from_file(&config_path)?;

    // Verify loaded config matches original
    assert_eq!(loaded_config.inverter.address, "192.168.1.40:502");
    assert_eq!(loaded_config.inverter.unit_id, 5);
    assert_eq!(loaded_config.inverter.poll_interval_secs, 10);
    assert_eq!(loaded_config.exporter.port, 9600);
    assert_eq!(loaded_config.exporter.name, "TestExporter");

    Ok(())
}

#[test]
fn test_missing_config_creates_default() -> Result<()> {
    let temp_dir = tempdir()?;
    let non_existent_path = temp_dir.path().join("non_existent.yaml");

    let default_config = Config::from_file(&non_existent_path)?;

    // Verify default config was created on disk
    assert!(non_existent_path.exists());
    assert_eq!(default_config.inverter.address, "localhost:502");
    assert_eq!(default_config.inverter.unit_id, 3);
    assert_eq!(default_config.inverter.poll_interval_secs, 5);
    assert_eq!(default_config.exporter.address, "127.0.0.1");
    assert_eq!(default_config.exporter.port, 9502);

    Ok(())
}

#[test]
fn test_partial_config_uses_defaults() -> Result<()> {
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("partial.yaml");

    fs::write(
        &config_path,
        "inverter:\n  address: \"10.0.0.2:502\"\n",
    )?;

    let config = Config::from_file(&config_path)?;
    assert_eq!(config.inverter.address, "10.0.0.2:502");
    // Everything not specified falls back to defaults
    assert_eq!(config.inverter.unit_id, 3);
    assert_eq!(config.exporter.port, 9502);

    Ok(())
}

#[test]
fn test_apply_args_overrides() {
    let mut config = Config::default();
    assert_eq!(config.exporter.port, 9502);
    assert_eq!(config.inverter.address, "localhost:502");

    // Apply command-line arguments
    config.apply_args(
        Some(9000),
        Some("192.168.0.1".to_string()),
        Some("192.168.0.2:502".to_string()),
        Some(1),
        Some(30),
    );

    // Verify values were overridden
    assert_eq!(config.exporter.port, 9000);
    assert_eq!(config.exporter.address, "192.168.0.1");
    assert_eq!(config.inverter.address, "192.168.0.2:502");
    assert_eq!(config.inverter.unit_id, 1);
    assert_eq!(config.inverter.poll_interval_secs, 30);

    // No-op when nothing is provided
    config.apply_args(None, None, None, None, None);
    assert_eq!(config.exporter.port, 9000);
    assert_eq!(config.inverter.poll_interval_secs, 30);
}

#[test]
fn test_invalid_config_is_rejected_and_sample_created() -> Result<()> {
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.yaml");

    // Schema forbids a zero poll interval
    fs::write(
        &config_path,
        "inverter:\n  poll_interval_secs: 0\n",
    )?;

    assert!(Config::from_file(&config_path).is_err());

    // A sample file with default values is generated next to it
    let sample_path = temp_dir.path().join("config.sample.yaml");
    assert!(sample_path.exists());

    Ok(())
}

#[test]
fn test_unknown_section_is_rejected() -> Result<()> {
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.yaml");

    fs::write(&config_path, "modbus:\n  enabled: true\n")?;

    assert!(Config::from_file(&config_path).is_err());

    Ok(())
}
