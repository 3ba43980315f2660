//! Prometheus metrics recording and endpoint.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus metrics recorder and return the handle for rendering.
pub fn install_prometheus_recorder() -> anyhow::Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    Ok(handle)
}

/// Record a conversation turn that reached a reply, with its duration.
pub fn record_conversation(duration_secs: f64) {
    metrics::counter!("conversations_total").increment(1);
    metrics::histogram!("conversation_duration_seconds").record(duration_secs);
}

/// Record a pipeline failure at the given stage.
pub fn record_stage_failure(stage: &str) {
    let labels = [("stage", stage.to_string())];
    metrics::counter!("stage_failures_total", &labels).increment(1);
}

/// Record the outcome of a background synthesis job (`done` or `failed`).
pub fn record_job(outcome: &str) {
    let labels = [("outcome", outcome.to_string())];
    metrics::counter!("synthesis_jobs_total", &labels).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_prometheus_recorder() {
        // Only one recorder may be installed per process.
        let handle = install_prometheus_recorder().unwrap();
        record_conversation(0.5);
        let output = handle.render();
        assert!(output.contains("conversations_total"));
    }

    #[test]
    fn test_record_functions_do_not_panic() {
        record_stage_failure("stt");
        record_job("done");
        record_job("failed");
    }
}
