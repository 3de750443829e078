use anyhow::Context;
use env_logger::Env;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::config::SERVICE_NAME;

pub fn init_logger(level: log::Level) {
    env_logger::Builder::from_env(Env::default().default_filter_or(level.as_str())).init();
}

pub fn install_metrics_recorder() -> anyhow::Result<PrometheusHandle> {
    PrometheusBuilder::new()
        .add_global_label("app", SERVICE_NAME)
        .install_recorder()
        .context("Failed to install metrics recorder")
}

pub fn emit_startup_metrics() {
    metrics::gauge!("tracker_up").set(1.0);
}

pub fn record_poll(outcome: &'static str) {
    metrics::counter!("tracker_poll_total", "outcome" => outcome).increment(1);
}

pub fn set_portfolio_total_value(value: f64) {
    metrics::gauge!("tracker_portfolio_total_value").set(value);
}

pub fn record_positions_repriced(count: usize) {
    metrics::counter!("tracker_positions_repriced_total").increment(count as u64);
}

pub fn record_request_rejected() {
    metrics::counter!("http_requests_rejected_total").increment(1);
}
