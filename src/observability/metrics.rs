//! Metrics collection and exposition.
//!
//! # Metrics
//! - `health_check_runs_total` (counter): invocations by check and status
//! - `health_check_duration_seconds` (histogram): latency per check
//! - `health_check_connection_cache_entries` (gauge): cached clients
//!
//! Recording is a no-op until a recorder is installed, so library users that
//! never call [`init_metrics`] pay nothing.
//!
//! The runner exits once every check has answered, which is too short-lived
//! for a scrape endpoint. Metrics are rendered in the Prometheus text format
//! and written to a file instead, for a node exporter textfile collector.

use std::io;
use std::path::Path;
use std::time::Duration;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

use crate::health::HealthStatus;

/// Install the Prometheus recorder as the global recorder.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    tracing::debug!("Metrics recorder installed");
    Ok(handle)
}

/// Render the current metrics to `path`.
///
/// The file is written next to its destination and renamed into place, so a
/// collector never reads a partial file.
pub fn write_textfile(handle: &PrometheusHandle, path: &Path) -> io::Result<()> {
    let staging = path.with_extension("prom.tmp");
    std::fs::write(&staging, handle.render())?;
    std::fs::rename(&staging, path)?;
    tracing::info!(path = %path.display(), "Metrics written");
    Ok(())
}

/// Record the verdict and latency of one check invocation.
pub fn record_check(name: &str, status: HealthStatus, elapsed: Duration) {
    counter!(
        "health_check_runs_total",
        "check" => name.to_string(),
        "status" => status.as_str()
    )
    .increment(1);
    histogram!("health_check_duration_seconds", "check" => name.to_string())
        .record(elapsed.as_secs_f64());
}

/// Record the number of cached protocol clients.
pub fn record_cache_size(entries: usize) {
    gauge!("health_check_connection_cache_entries").set(entries as f64);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn textfile_contains_recorded_checks() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, || {
            record_check("search", HealthStatus::Healthy, Duration::from_millis(20));
            record_check("relay", HealthStatus::Unhealthy, Duration::from_millis(5));
            record_cache_size(1);
        });

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("health-probe.prom");
        write_textfile(&handle, &path).unwrap();

        let rendered = std::fs::read_to_string(&path).unwrap();
        assert!(rendered.contains("health_check_runs_total"));
        assert!(rendered.contains(r#"check="search""#));
        assert!(rendered.contains(r#"status="unhealthy""#));
        assert!(rendered.contains("health_check_connection_cache_entries"));
        assert!(!dir.path().join("health-probe.prom.tmp").exists());
    }
}
