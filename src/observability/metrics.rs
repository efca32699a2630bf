//! # Metrics Collection
//!
//! Counters for serial allocation and certificate issuance, exported through
//! Prometheus when enabled. Without an installed recorder the `metrics`
//! macros are no-ops, so call sites never check whether metrics are on.

use crate::config::ObservabilityConfig;
use crate::errors::{Error, Result};
use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{info, warn};

/// Metrics recorder that tracks application metrics
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsRecorder;

impl MetricsRecorder {
    pub fn new() -> Self {
        Self
    }

    /// Record a serial reservation outcome
    pub fn record_serial_reserved(&self, scope: i32, success: bool) {
        let status = if success { "success" } else { "error" };
        counter!(
            "serial_reservations_total",
            "scope" => scope.to_string(),
            "status" => status
        )
        .increment(1);
    }

    pub fn record_serial_peeked(&self) {
        counter!("serial_peeks_total").increment(1);
    }

    /// Record a certificate creation outcome and its duration
    pub fn record_certificate_created(&self, outcome: &'static str, duration: f64) {
        counter!("certificates_created_total", "outcome" => outcome).increment(1);
        histogram!("certificate_create_duration_seconds").record(duration);
    }

    pub fn record_serial_conflict(&self) {
        counter!("serial_conflicts_total").increment(1);
    }

    pub fn record_upload_failure(&self) {
        counter!("qr_upload_failures_total").increment(1);
    }

    /// Record authentication attempt outcome
    pub fn record_authentication(&self, status: &'static str) {
        counter!("auth_authentications_total", "status" => status).increment(1);
    }

    /// Register descriptions so Prometheus exports appear before events occur.
    pub fn register_metrics(&self) {
        describe_counter!(
            "serial_reservations_total",
            Unit::Count,
            "Serial numbers reserved, grouped by scope and outcome"
        );
        describe_counter!("serial_peeks_total", Unit::Count, "Next-serial previews served");
        describe_counter!(
            "certificates_created_total",
            Unit::Count,
            "Certificate creation attempts grouped by outcome"
        );
        describe_histogram!(
            "certificate_create_duration_seconds",
            Unit::Seconds,
            "Duration of certificate creation"
        );
        describe_counter!(
            "serial_conflicts_total",
            Unit::Count,
            "Creations rejected because the serial was already taken"
        );
        describe_counter!(
            "qr_upload_failures_total",
            Unit::Count,
            "QR image uploads that failed"
        );
        describe_counter!(
            "auth_authentications_total",
            Unit::Count,
            "Authentication attempts grouped by outcome"
        );

        counter!("serial_peeks_total").absolute(0);
        counter!("serial_conflicts_total").absolute(0);
        counter!("qr_upload_failures_total").absolute(0);
    }
}

/// Initialize metrics collection and Prometheus exporter
pub fn init_metrics(config: &ObservabilityConfig) -> Result<()> {
    let metrics_addr = match config.metrics_bind_address() {
        Some(addr) => addr,
        None => {
            warn!("Metrics disabled: no bind address configured");
            return Ok(());
        }
    };

    let socket_addr: SocketAddr = metrics_addr.parse().map_err(|e| {
        Error::config(format!("Invalid metrics bind address '{}': {}", metrics_addr, e))
    })?;

    PrometheusBuilder::new()
        .with_http_listener(socket_addr)
        .add_global_label("service", &config.service_name)
        .install()
        .map_err(|e| Error::config(format!("Failed to initialize metrics exporter: {}", e)))?;

    MetricsRecorder::new().register_metrics();

    info!(
        metrics_addr = %metrics_addr,
        service_name = %config.service_name,
        "Metrics collection initialized"
    );

    Ok(())
}
