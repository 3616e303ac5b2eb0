// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the pv-modbus-exporter project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! PV Modbus exporter library
//!
//! This library polls a photovoltaic inverter over Modbus TCP and republishes
//! a fixed set of register values as Prometheus gauges. The poller and the
//! HTTP scrape endpoint run as independent background tasks that share only
//! the thread-safe gauge registry.

pub mod config;
pub mod daemon;
pub mod inverter;
pub mod metrics;
pub mod poller;
pub mod web;
