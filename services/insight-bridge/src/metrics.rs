//! Prometheus metrics exposition
//!
//! - `insight_intents_total` (counter): labels `action`, `outcome`
//! - `insight_intent_duration_seconds` (histogram): label `action`
//! - `insight_token_refresh_total` (counter): recorded by insight-auth

use anyhow::Context;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

const DURATION_METRIC: &str = "insight_intent_duration_seconds";

/// Aggregated intents fan out to seven upstream calls, so the top buckets
/// cover several client timeouts.
const DURATION_BUCKETS: &[f64] = &[
    0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
];

fn builder() -> anyhow::Result<PrometheusBuilder> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full(DURATION_METRIC.to_string()), DURATION_BUCKETS)
        .context("failed to set histogram buckets")
}

/// Install the Prometheus recorder and return a handle for rendering metrics.
///
/// The duration metric gets explicit buckets so it renders as a histogram
/// with `_bucket` lines rather than the default summary.
pub fn install_recorder() -> anyhow::Result<PrometheusHandle> {
    builder()?
        .install_recorder()
        .context("failed to install Prometheus recorder")
}

/// Record a handled intent. `failed` is true when the response carried an error.
pub fn record_intent(action: &'static str, failed: bool, duration_secs: f64) {
    let outcome = if failed { "error" } else { "ok" };
    metrics::counter!("insight_intents_total", "action" => action, "outcome" => outcome)
        .increment(1);
    metrics::histogram!(DURATION_METRIC, "action" => action).record(duration_secs);
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusRecorder;

    #[test]
    fn record_intent_does_not_panic_without_recorder() {
        record_intent("getTimes", false, 0.05);
    }

    /// Isolated recorder/handle pair; install_recorder() fails on a second
    /// call within one process.
    fn isolated_recorder() -> (PrometheusRecorder, PrometheusHandle) {
        let recorder = builder().unwrap().build_recorder();
        let handle = recorder.handle();
        (recorder, handle)
    }

    #[test]
    fn record_intent_increments_counter_and_histogram() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_intent("getTimes", false, 0.042);
        record_intent("getAggregatedTimes", true, 1.5);

        let output = handle.render();
        assert!(output.contains("insight_intents_total"));
        assert!(output.contains("action=\"getTimes\""));
        assert!(output.contains("action=\"getAggregatedTimes\""));
        assert!(output.contains("outcome=\"ok\""));
        assert!(output.contains("outcome=\"error\""));
        assert!(
            output.contains("insight_intent_duration_seconds_bucket"),
            "duration must render as a histogram"
        );
    }

    #[test]
    fn histogram_buckets_span_10ms_to_60s() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_intent("getScreenshots", false, 0.003);

        let output = handle.render();
        assert!(output.contains("le=\"0.01\""), "10ms bucket must exist");
        assert!(output.contains("le=\"60\""), "60s bucket must exist");
        assert!(output.contains("le=\"+Inf\""));
    }
}
