//! Metrics Registry
//!
//! Installs the Prometheus recorder and describes the application
//! metrics. The returned handle renders the scrape payload for
//! GET /metrics.

use metrics::{describe_counter, describe_histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

pub fn init_metrics() -> PrometheusHandle {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    describe_counter!(
        "http_requests_total",
        "Total HTTP requests served, labeled by method, path and status"
    );
    describe_histogram!(
        "http_request_duration_seconds",
        Unit::Seconds,
        "HTTP request latency"
    );
    describe_counter!(
        "ticket_expansion_short_total",
        "Ticket expansions that produced fewer tickets than sem"
    );
    describe_counter!(
        "prize_declarations_total",
        "Prize declarations committed"
    );
    describe_counter!(
        "payout_failures_total",
        "Balance updates that failed and were queued for retry"
    );

    handle
}
