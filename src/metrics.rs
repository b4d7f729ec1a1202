use axum::{routing::get, Router};
use metrics::{describe_counter, describe_histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder once per process; later calls reuse it.
    pub fn init() -> anyhow::Result<Self> {
        let handle = HANDLE
            .get_or_try_init(|| {
                let handle = PrometheusBuilder::new().install_recorder()?;
                describe();
                Ok::<_, anyhow::Error>(handle)
            })?
            .clone();
        Ok(Self { handle })
    }

    /// `/metrics` in the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

fn describe() {
    describe_counter!("reviews_submitted_total", "Reviews accepted by intake");
    describe_counter!("reviews_spam_total", "Accepted reviews flagged as spam");
    describe_counter!("reviews_deleted_total", "Reviews deleted by their author");
    describe_counter!(
        "guest_alerts_total",
        "Guest-recovery deliveries by status (sent, failed, logged)"
    );
    describe_histogram!(
        "review_intake_ms",
        Unit::Milliseconds,
        "Submission latency including the notifier call"
    );
}
