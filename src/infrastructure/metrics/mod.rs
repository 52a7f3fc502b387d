//! Prometheus Metrics Module
//!
//! Provides application-wide metrics collection using Prometheus.
//!
//! # Metrics Collected
//! - HTTP request counts by method, route, and status
//! - HTTP request latency histograms
//! - Database pool gauges
//! - Outbound emails by outcome
//! - Rendered invoice PDFs

use once_cell::sync::Lazy;
use prometheus::{
    Encoder, GaugeVec, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};

const NAMESPACE: &str = "crm_server";

/// Global metrics registry
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

/// HTTP request counter - tracks total requests by method, route, and status code
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests").namespace(NAMESPACE),
        &["method", "path", "status"],
    )
    .expect("metric definition is valid")
});

/// HTTP request latency histogram - tracks request duration in seconds
pub static HTTP_REQUEST_DURATION_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    let buckets = vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];
    HistogramVec::new(
        HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request latency in seconds",
        )
        .namespace(NAMESPACE)
        .buckets(buckets),
        &["method", "path"],
    )
    .expect("metric definition is valid")
});

/// Database connection pool stats
pub static DB_POOL_CONNECTIONS: Lazy<GaugeVec> = Lazy::new(|| {
    GaugeVec::new(
        Opts::new("db_pool_connections", "Database connection pool statistics")
            .namespace(NAMESPACE),
        &["state"], // "idle", "active", "max"
    )
    .expect("metric definition is valid")
});

/// Outbound emails by outcome ("sent", "failed", "logged")
pub static EMAILS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("emails_total", "Outbound emails by outcome").namespace(NAMESPACE),
        &["outcome"],
    )
    .expect("metric definition is valid")
});

/// Invoice PDFs rendered
pub static INVOICE_PDFS_RENDERED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::with_opts(
        Opts::new("invoice_pdfs_rendered_total", "Invoice PDF documents rendered")
            .namespace(NAMESPACE),
    )
    .expect("metric definition is valid")
});

/// Register all metrics with the registry
fn register_metrics(registry: &Registry) {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(HTTP_REQUESTS_TOTAL.clone()),
        Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()),
        Box::new(DB_POOL_CONNECTIONS.clone()),
        Box::new(EMAILS_TOTAL.clone()),
        Box::new(INVOICE_PDFS_RENDERED_TOTAL.clone()),
    ];
    for collector in collectors {
        if let Err(e) = registry.register(collector) {
            tracing::error!("Failed to register metric: {}", e);
        }
    }
}

/// Collect and encode all metrics as Prometheus text format
pub fn gather_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

/// Helper to record HTTP request metrics
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration_secs);
}

/// Helper to update database pool stats
pub fn update_db_pool_stats(idle: u32, active: u32, max: u32) {
    DB_POOL_CONNECTIONS
        .with_label_values(&["idle"])
        .set(idle as f64);
    DB_POOL_CONNECTIONS
        .with_label_values(&["active"])
        .set(active as f64);
    DB_POOL_CONNECTIONS
        .with_label_values(&["max"])
        .set(max as f64);
}

/// Helper to count an outbound email
pub fn record_email(outcome: &str) {
    EMAILS_TOTAL.with_label_values(&[outcome]).inc();
}

/// Helper to count a rendered PDF
pub fn record_pdf_rendered() {
    INVOICE_PDFS_RENDERED_TOTAL.inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration() {
        // Force lazy initialization
        let _ = &*REGISTRY;
        let _ = &*HTTP_REQUESTS_TOTAL;
        let _ = &*EMAILS_TOTAL;
    }

    #[test]
    fn test_record_http_request() {
        record_http_request("GET", "/health", 200, 0.001);
        let metrics = gather_metrics();
        assert!(metrics.contains("crm_server_http_requests_total"));
    }

    #[test]
    fn test_record_email_and_pdf() {
        record_email("logged");
        record_pdf_rendered();
        let metrics = gather_metrics();
        assert!(metrics.contains("crm_server_emails_total"));
        assert!(metrics.contains("crm_server_invoice_pdfs_rendered_total"));
    }
}
