// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the pv-modbus-exporter project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! HTTP server for the scrape endpoint
//!
//! Exposes `GET /metrics` (Prometheus text exposition) and `GET /healthz`
//! (JSON health report). Handlers only read from the shared gauge registry;
//! a scrape never triggers a poll.

pub mod server;

pub use server::build_rocket;
