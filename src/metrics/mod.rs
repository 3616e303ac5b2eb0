// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the pv-modbus-exporter project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Gauge registry for inverter measurements
//!
//! This module provides the central last-value store that is shared between
//! the polling task and the HTTP scrape endpoint. Values are held in
//! Prometheus gauges, so a concurrent scrape can never observe a torn value:
//! each gauge stores its sample as a single atomic f64.
//!
//! The registry is created once at startup and passed by `Arc` handle to
//! both the poller and the web server. The poller is the only writer.

use anyhow::Result;
use chrono::Utc;
use prometheus::{Encoder, Gauge, IntGauge, Opts, Registry, TextEncoder};

/// The four inverter measurements published by the exporter.
///
/// Each variant maps to one fixed Prometheus gauge name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PvMetric {
    /// Energy produced since the start of the day
    DailyYield,
    /// Current power on the first MPP tracker
    Mppt1Watts,
    /// Current power on the second MPP tracker
    Mppt2Watts,
    /// Current power over all MPP trackers combined
    TotalWatts,
}

impl PvMetric {
    /// The Prometheus metric name for this measurement.
    pub const fn name(self) -> &'static str {
        match self {
            PvMetric::DailyYield => "pv_daily_yield",
            PvMetric::Mppt1Watts => "pv_mppt1_watts",
            PvMetric::Mppt2Watts => "pv_mppt2_watts",
            PvMetric::TotalWatts => "pv_total_watts",
        }
    }
}

/// A thread-safe registry of the exporter's gauges.
///
/// Holds the four measurement gauges plus the health pair (`pv_up` and
/// `pv_last_poll_timestamp_seconds`) that lets a consumer distinguish a
/// fresh sample from a stale one while the inverter is unreachable.
pub struct GaugeRegistry {
    registry: Registry,
    daily_yield: Gauge,
    mppt1_watts: Gauge,
    mppt2_watts: Gauge,
    total_watts: Gauge,
    up: IntGauge,
    last_poll_timestamp: Gauge,
}

impl GaugeRegistry {
    /// Create a registry with all gauges registered and set to zero.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let daily_yield = Gauge::new(
            PvMetric::DailyYield.name(),
            "PV daily yield (up until now)",
        )?;
        let mppt1_watts = Gauge::new(
            PvMetric::Mppt1Watts.name(),
            "PV inverter current power (MPPT 1)",
        )?;
        let mppt2_watts = Gauge::new(
            PvMetric::Mppt2Watts.name(),
            "PV inverter current power (MPPT 2)",
        )?;
        let total_watts = Gauge::new(
            PvMetric::TotalWatts.name(),
            "PV inverter current power (all MPPTs combined)",
        )?;
        let up = IntGauge::new(
            "pv_up",
            "Whether the last polling cycle against the inverter succeeded",
        )?;
        let last_poll_timestamp = Gauge::new(
            "pv_last_poll_timestamp_seconds",
            "UNIX timestamp of the last successful polling cycle",
        )?;
        let build_info = IntGauge::with_opts(
            Opts::new("pv_exporter_build_info", "Build information for the exporter")
                .const_label("version", env!("CARGO_PKG_VERSION")),
        )?;
        build_info.set(1);

        registry.register(Box::new(daily_yield.clone()))?;
        registry.register(Box::new(mppt1_watts.clone()))?;
        registry.register(Box::new(mppt2_watts.clone()))?;
        registry.register(Box::new(total_watts.clone()))?;
        registry.register(Box::new(up.clone()))?;
        registry.register(Box::new(last_poll_timestamp.clone()))?;
        registry.register(Box::new(build_info))?;

        Ok(Self {
            registry,
            daily_yield,
            mppt1_watts,
            mppt2_watts,
            total_watts,
            up,
            last_poll_timestamp,
        })
    }

    fn gauge(&self, metric: PvMetric) -> &Gauge {
        match metric {
            PvMetric::DailyYield => &self.daily_yield,
            PvMetric::Mppt1Watts => &self.mppt1_watts,
            PvMetric::Mppt2Watts => &self.mppt2_watts,
            PvMetric::TotalWatts => &self.total_watts,
        }
    }

    /// Overwrite the current value of a measurement.
    pub fn set(&self, metric: PvMetric, value: f64) {
        self.gauge(metric).set(value);
    }

    /// Read the most recently set value of a measurement, zero if never set.
    pub fn get(&self, metric: PvMetric) -> f64 {
        self.gauge(metric).get()
    }

    /// Record a successful polling cycle.
    pub fn mark_up(&self) {
        self.up.set(1);
        self.last_poll_timestamp.set(Utc::now().timestamp() as f64);
    }

    /// Record a failed polling cycle. Measurement values are left untouched.
    pub fn mark_down(&self) {
        self.up.set(0);
    }

    /// Whether the last polling cycle succeeded.
    pub fn is_up(&self) -> bool {
        self.up.get() == 1
    }

    /// UNIX timestamp of the last successful cycle, zero if none happened.
    pub fn last_poll_timestamp(&self) -> f64 {
        self.last_poll_timestamp.get()
    }

    /// Render all registered gauges in the Prometheus text exposition format.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buf = Vec::with_capacity(4096);
        encoder.encode(&self.registry.gather(), &mut buf)?;
        Ok(String::from_utf8(buf)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn metrics_default_to_zero() {
        let gauges = GaugeRegistry::new().unwrap();
        assert_eq!(gauges.get(PvMetric::DailyYield), 0.0);
        assert_eq!(gauges.get(PvMetric::Mppt1Watts), 0.0);
        assert_eq!(gauges.get(PvMetric::Mppt2Watts), 0.0);
        assert_eq!(gauges.get(PvMetric::TotalWatts), 0.0);
        assert!(!gauges.is_up());
        assert_eq!(gauges.last_poll_timestamp(), 0.0);
    }

    #[test]
    fn set_overwrites_previous_value() {
        let gauges = GaugeRegistry::new().unwrap();
        gauges.set(PvMetric::TotalWatts, 1234.0);
        assert_eq!(gauges.get(PvMetric::TotalWatts), 1234.0);
        gauges.set(PvMetric::TotalWatts, 10.0);
        assert_eq!(gauges.get(PvMetric::TotalWatts), 10.0);
    }

    #[test]
    fn render_is_well_formed_before_any_poll() {
        let gauges = GaugeRegistry::new().unwrap();
        let body = gauges.render().unwrap();
        assert!(body.contains("pv_daily_yield 0"));
        assert!(body.contains("pv_mppt1_watts 0"));
        assert!(body.contains("pv_mppt2_watts 0"));
        assert!(body.contains("pv_total_watts 0"));
        assert!(body.contains("pv_up 0"));
    }

    #[test]
    fn render_contains_set_values() {
        let gauges = GaugeRegistry::new().unwrap();
        gauges.set(PvMetric::Mppt1Watts, 10000.0);
        gauges.mark_up();
        let body = gauges.render().unwrap();
        assert!(body.contains("pv_mppt1_watts 10000"));
        assert!(body.contains("pv_up 1"));
    }

    #[test]
    fn concurrent_reads_never_observe_a_torn_value() {
        let gauges = Arc::new(GaugeRegistry::new().unwrap());
        // Two bit patterns that would be detectable if a reader ever saw a
        // mix of their halves.
        let a = f64::from_bits(0xAAAA_AAAA_AAAA_AAAA);
        let b = f64::from_bits(0x5555_5555_5555_5555);

        let writer = {
            let gauges = gauges.clone();
            thread::spawn(move || {
                for i in 0..10_000 {
                    let value = if i % 2 == 0 { a } else { b };
                    gauges.set(PvMetric::TotalWatts, value);
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let gauges = gauges.clone();
                thread::spawn(move || {
                    for _ in 0..10_000 {
                        let value = gauges.get(PvMetric::TotalWatts);
                        let bits = value.to_bits();
                        assert!(
                            bits == 0 || bits == a.to_bits() || bits == b.to_bits(),
                            "observed torn value: {bits:#x}"
                        );
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }
    }
}
