// packages/recorder/src/observability/mod.rs
//! Logging and telemetry publication
//!
//! - **Tracing**: `tracing-subscriber` registry with env filter, human or JSON output
//! - **Metrics**: telemetry samples mirrored into the `metrics` facade; the host
//!   installs whatever exporter it uses

use crate::recording::metrics::RunInfo;
use crate::utils::config::LoggingSettings;
use crate::utils::errors::{RecorderError, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Cumulative processed records, labelled by recorder
pub const PACKETS_PROCESSED: &str = "recorder_packets_processed_total";

/// Records per second over the last sample window, labelled by recorder
pub const THROUGHPUT: &str = "recorder_throughput_processed_packets";

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over `settings.level`. Calling this when a subscriber is
/// already installed is not an error.
pub fn init_tracing(settings: &LoggingSettings) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&settings.level))
        .map_err(|e| {
            RecorderError::InvalidConfig(format!("Invalid log level '{}': {}", settings.level, e))
        })?;

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if settings.json {
        registry
            .with(fmt::layer().json().with_thread_names(true))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_thread_names(true).with_target(false))
            .try_init()
    };

    if installed.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }

    Ok(())
}

/// Mirror a telemetry sample into the metrics facade
pub fn publish_run_info(recorder: &str, info: &RunInfo) {
    metrics::counter!(PACKETS_PROCESSED, "recorder" => recorder.to_string())
        .absolute(info.packets_processed);
    metrics::gauge!(THROUGHPUT, "recorder" => recorder.to_string())
        .set(info.throughput_processed_packets);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_init_tracing_is_idempotent() {
        let settings = LoggingSettings::default();
        assert!(init_tracing(&settings).is_ok());
        assert!(init_tracing(&settings).is_ok());
    }

    #[test]
    fn test_publish_without_exporter() {
        let info = RunInfo {
            packets_processed: 12,
            throughput_processed_packets: 3.5,
            sampled_at: Utc::now(),
        };
        publish_run_info("test", &info);
    }
}
