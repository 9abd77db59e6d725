//! Counter registry shared by every pipeline stage, exposed over HTTP as
//! Prometheus text format on `GET /metrics` and `GET /v1/metrics`.
//!
//! The original agent exposes an equivalent surface via VictoriaMetrics'
//! `metrics.WritePrometheus` at `/v1/metrics` only; this port also serves
//! `/metrics` under the plainer, more common path, mirroring the
//! `axum`-based webhook server the `stackabletech-operator-rs` corpus entry
//! uses for its own inbound HTTP surface.

use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// Counter registry used by every pipeline stage. Object-safe so stages can
/// depend on `Arc<dyn MetricsFacade>` rather than the concrete Prometheus
/// type, per the design notes' preference for a facade trait over a global.
pub trait MetricsFacade: Send + Sync {
    fn events_total(&self);
    fn actionable_events_total(&self);
    fn dir_events_total(&self);
    fn file_events_total(&self);
    fn tails_total(&self);
    fn pending_files_total(&self);
    fn config_dir_discovery_total(&self);
    fn lines_received_total(&self, filename: &str, file_id: &str);
    fn follower_read_errors_total(&self);
    fn lines_processed_error_total(&self, process: &str, node: &str, component: &str);
    fn entries_total(&self, process: &str, node: &str, component: &str, level: &str);
}

pub struct PrometheusMetrics {
    registry: Registry,
    events_total: IntCounter,
    actionable_events_total: IntCounter,
    dir_events_total: IntCounter,
    file_events_total: IntCounter,
    tails_total: IntCounter,
    pending_files_total: IntCounter,
    config_dir_discovery_total: IntCounter,
    lines_received_total: IntCounterVec,
    follower_read_errors_total: IntCounter,
    lines_processed_error_total: IntCounterVec,
    entries_total: IntCounterVec,
}

impl PrometheusMetrics {
    pub fn new() -> Arc<Self> {
        let registry = Registry::new();

        macro_rules! counter {
            ($name:expr, $help:expr) => {{
                let c = IntCounter::new($name, $help).unwrap();
                registry.register(Box::new(c.clone())).unwrap();
                c
            }};
        }
        macro_rules! counter_vec {
            ($name:expr, $help:expr, $labels:expr) => {{
                let c = IntCounterVec::new(Opts::new($name, $help), $labels).unwrap();
                registry.register(Box::new(c.clone())).unwrap();
                c
            }};
        }

        let metrics = Self {
            events_total: counter!("tslogs_events_total", "filesystem events observed"),
            actionable_events_total: counter!(
                "tslogs_actionable_events_total",
                "events that survived filtering"
            ),
            dir_events_total: counter!("tslogs_dir_events_total", "directory events handled"),
            file_events_total: counter!("tslogs_file_events_total", "file events handled"),
            tails_total: counter!("tslogs_tails_total", "tailers started"),
            pending_files_total: counter!(
                "tslogs_pending_files_total",
                "files parked awaiting config"
            ),
            config_dir_discovery_total: counter!(
                "tslogs_config_dir_discovery_total",
                "config directories discovered"
            ),
            lines_received_total: counter_vec!(
                "tslogs_lines_received_total",
                "physical lines received",
                &["filename", "fileid"]
            ),
            follower_read_errors_total: counter!(
                "tslogs_follower_read_errors_total",
                "terminal read errors encountered by a file follower"
            ),
            lines_processed_error_total: counter_vec!(
                "tslogs_lines_processed_error_total",
                "lines that carried a processing error",
                &["process", "node", "component"]
            ),
            entries_total: counter_vec!(
                "tslogs_entries_total",
                "reassembled log entries emitted",
                &["process", "node", "component", "level"]
            ),
            registry,
        };
        Arc::new(metrics)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl MetricsFacade for PrometheusMetrics {
    fn events_total(&self) {
        self.events_total.inc();
    }
    fn actionable_events_total(&self) {
        self.actionable_events_total.inc();
    }
    fn dir_events_total(&self) {
        self.dir_events_total.inc();
    }
    fn file_events_total(&self) {
        self.file_events_total.inc();
    }
    fn tails_total(&self) {
        self.tails_total.inc();
    }
    fn pending_files_total(&self) {
        self.pending_files_total.inc();
    }
    fn config_dir_discovery_total(&self) {
        self.config_dir_discovery_total.inc();
    }
    fn lines_received_total(&self, filename: &str, file_id: &str) {
        self.lines_received_total.with_label_values(&[filename, file_id]).inc();
    }
    fn follower_read_errors_total(&self) {
        self.follower_read_errors_total.inc();
    }
    fn lines_processed_error_total(&self, process: &str, node: &str, component: &str) {
        self.lines_processed_error_total
            .with_label_values(&[process, node, component])
            .inc();
    }
    fn entries_total(&self, process: &str, node: &str, component: &str, level: &str) {
        self.entries_total
            .with_label_values(&[process, node, component, level])
            .inc();
    }
}

pub fn router(metrics: Arc<PrometheusMetrics>) -> Router {
    Router::new()
        .route("/metrics", get(render))
        .route("/v1/metrics", get(render))
        .with_state(metrics)
}

async fn render(State(metrics): State<Arc<PrometheusMetrics>>) -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let families = metrics.registry().gather();
    let mut buffer = Vec::new();
    encoder.encode(&families, &mut buffer).unwrap_or_default();
    (
        [(axum::http::header::CONTENT_TYPE, encoder.format_type().to_string())],
        buffer,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_increment_and_gather() {
        let metrics = PrometheusMetrics::new();
        metrics.events_total();
        metrics.lines_received_total("app.log", "1");
        let families = metrics.registry().gather();
        assert!(!families.is_empty());
    }
}
