use std::sync::Once;

use metrics::{Unit, describe_counter, describe_gauge, describe_histogram};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install a global tracing subscriber using the provided logging settings.
///
/// Fails when a subscriber is already installed.
pub fn init(logging: &LoggingSettings) -> Result<(), InfraError> {
    describe_metrics();

    let env_filter = EnvFilter::builder()
        .with_default_directive(logging.level.into())
        .from_env_lossy();

    let fmt_layer = match logging.format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(ErrorLayer::default())
        .with(fmt_layer)
        .try_init()
        .map_err(|err| {
            InfraError::telemetry(format!("failed to install tracing subscriber: {err}"))
        })
}

fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            "almanac_entry_index_rebuild_total",
            Unit::Count,
            "Total number of entry index rebuilds."
        );
        describe_histogram!(
            "almanac_entry_index_rebuild_ms",
            Unit::Milliseconds,
            "Entry index rebuild latency in milliseconds."
        );
        describe_counter!(
            "almanac_category_index_rebuild_total",
            Unit::Count,
            "Total number of category index rebuilds."
        );
        describe_counter!(
            "almanac_worker_jobs_total",
            Unit::Count,
            "Background jobs processed, labelled by queue and result."
        );
        describe_gauge!(
            "almanac_worker_queue_len",
            Unit::Count,
            "Jobs waiting in a background queue."
        );
    });
}
