// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the pv-modbus-exporter project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Rocket server for the Prometheus scrape endpoint

use std::sync::Arc;

use log::error;
use rocket::figment::Figment;
use rocket::http::{ContentType, Status};
use rocket::serde::json::Json;
use rocket::serde::Serialize;
use rocket::{get, routes, Build, Rocket, State};

use crate::metrics::GaugeRegistry;

/// Health report served on `/healthz`.
#[derive(Debug, Serialize)]
#[serde(crate = "rocket::serde")]
pub struct HealthReport {
    /// Whether the last polling cycle against the inverter succeeded
    pub up: bool,
    /// UNIX timestamp of the last successful polling cycle, 0 if none yet
    pub last_poll_timestamp_seconds: f64,
}

/// Prometheus text exposition of all registered gauges.
///
/// Always well-formed, even before the first successful poll: gauges
/// default to zero rather than being absent.
#[get("/metrics")]
fn metrics(gauges: &State<Arc<GaugeRegistry>>) -> Result<(ContentType, String), Status> {
    gauges
        .render()
        .map(|body| (ContentType::Plain, body))
        .map_err(|err| {
            error!("Failed to encode metrics: {err:#}");
            Status::InternalServerError
        })
}

/// Staleness signal for the last polling cycle.
#[get("/healthz")]
fn healthz(gauges: &State<Arc<GaugeRegistry>>) -> Json<HealthReport> {
    Json(HealthReport {
        up: gauges.is_up(),
        last_poll_timestamp_seconds: gauges.last_poll_timestamp(),
    })
}

/// Build the Rocket instance serving the scrape endpoints.
pub async fn build_rocket(figment: Figment, gauges: Arc<GaugeRegistry>) -> Rocket<Build> {
    rocket::custom(figment)
        .mount("/", routes![metrics, healthz])
        .manage(gauges)
}

#[cfg(test)]
fn build_rocket_test_instance(gauges: Arc<GaugeRegistry>) -> Rocket<Build> {
    use rocket::Config;

    let config = Config::figment()
        .merge(("address", "127.0.0.1"))
        .merge(("port", 0)) // Random port for tests
        .merge(("log_level", rocket::config::LogLevel::Off));

    rocket::custom(config)
        .mount("/", routes![metrics, healthz])
        .manage(gauges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::PvMetric;
    use rocket::local::blocking::Client;

    #[test]
    fn metrics_endpoint_is_well_formed_before_any_poll() {
        let gauges = Arc::new(GaugeRegistry::new().unwrap());
        let client = Client::tracked(build_rocket_test_instance(gauges)).unwrap();

        let response = client.get("/metrics").dispatch();
        assert_eq!(response.status(), Status::Ok);
        assert_eq!(response.content_type(), Some(ContentType::Plain));

        let body = response.into_string().unwrap();
        assert!(body.contains("pv_daily_yield 0"));
        assert!(body.contains("pv_mppt1_watts 0"));
        assert!(body.contains("pv_mppt2_watts 0"));
        assert!(body.contains("pv_total_watts 0"));
        assert!(body.contains("pv_up 0"));
    }

    #[test]
    fn metrics_endpoint_reflects_registry_values() {
        let gauges = Arc::new(GaugeRegistry::new().unwrap());
        gauges.set(PvMetric::TotalWatts, 20000.0);
        gauges.set(PvMetric::DailyYield, 1000.0);
        gauges.mark_up();

        let client = Client::tracked(build_rocket_test_instance(gauges)).unwrap();
        let body = client.get("/metrics").dispatch().into_string().unwrap();

        assert!(body.contains("pv_total_watts 20000"));
        assert!(body.contains("pv_daily_yield 1000"));
        assert!(body.contains("pv_up 1"));
    }

    #[test]
    fn healthz_reports_staleness() {
        let gauges = Arc::new(GaugeRegistry::new().unwrap());
        let client = Client::tracked(build_rocket_test_instance(gauges.clone())).unwrap();

        let response = client.get("/healthz").dispatch();
        assert_eq!(response.status(), Status::Ok);
        let body = response.into_string().unwrap();
        assert!(body.contains("\"up\":false"));

        gauges.mark_up();
        let body = client.get("/healthz").dispatch().into_string().unwrap();
        assert!(body.contains("\"up\":true"));
    }
}
