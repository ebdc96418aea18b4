//! Prometheus metrics for session lifecycle events

use std::sync::OnceLock;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::Result;
use crate::error::Error;

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
static START_TIME: OnceLock<Instant> = OnceLock::new();

const METRIC_UPTIME: &str = "authgate_session_uptime_seconds";
const METRIC_INFO: &str = "authgate_session_info";

const METRIC_REDEEMS: &str = "authgate_session_redeems_total";
const METRIC_REFRESHES: &str = "authgate_session_refreshes_total";
const METRIC_ENRICH_FAILURES: &str = "authgate_session_enrich_failures_total";
const METRIC_VERIFY_FAILURES: &str = "authgate_session_verification_failures_total";

/// Initialize Prometheus metrics recorder.
pub fn init_metrics() -> Result<()> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| Error::Config(format!("Failed to install metrics recorder: {e}")))?;

    PROMETHEUS_HANDLE.set(handle).ok();
    START_TIME.set(Instant::now()).ok();

    register_metrics();
    tracing::info!("Prometheus metrics initialized");
    Ok(())
}

fn register_metrics() {
    describe_gauge!(METRIC_UPTIME, "Process uptime in seconds");
    describe_gauge!(METRIC_INFO, "Build information (always 1)");

    describe_counter!(METRIC_REDEEMS, "Authorization code exchanges by outcome");
    describe_counter!(METRIC_REFRESHES, "Session refreshes by outcome");
    describe_counter!(METRIC_ENRICH_FAILURES, "Enrichment steps that failed");
    describe_counter!(METRIC_VERIFY_FAILURES, "Identity tokens rejected");

    gauge!(
        METRIC_INFO,
        "version" => env!("CARGO_PKG_VERSION"),
    )
    .set(1.0);
}

/// Render metrics in Prometheus text format.
#[must_use]
pub fn render_metrics() -> String {
    if let Some(start) = START_TIME.get() {
        gauge!(METRIC_UPTIME).set(start.elapsed().as_secs_f64());
    }

    PROMETHEUS_HANDLE
        .get()
        .map(PrometheusHandle::render)
        .unwrap_or_default()
}

const fn status_label(success: bool) -> &'static str {
    if success { "success" } else { "error" }
}

/// Record a code exchange.
pub fn record_redeem(provider: &str, success: bool) {
    counter!(
        METRIC_REDEEMS,
        "provider" => provider.to_owned(),
        "status" => status_label(success),
    )
    .increment(1);
}

/// Record a refresh attempt that reached the token endpoint.
pub fn record_refresh(provider: &str, success: bool) {
    counter!(
        METRIC_REFRESHES,
        "provider" => provider.to_owned(),
        "status" => status_label(success),
    )
    .increment(1);
}

/// Record a failed enrichment step (`profile`, `introspection`, `email`, ...).
pub fn record_enrich_failure(provider: &str, step: &'static str) {
    counter!(
        METRIC_ENRICH_FAILURES,
        "provider" => provider.to_owned(),
        "step" => step,
    )
    .increment(1);
}

/// Record a rejected identity token.
pub fn record_verification_failure(provider: &str) {
    counter!(METRIC_VERIFY_FAILURES, "provider" => provider.to_owned()).increment(1);
}
