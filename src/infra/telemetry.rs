use std::sync::Once;

use metrics::{Unit, describe_counter};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::{Layer, SubscriberExt},
    util::SubscriberInitExt,
};

use crate::cache::{
    METRIC_CACHE_EVICT, METRIC_CACHE_EXPIRED, METRIC_CACHE_HIT, METRIC_CACHE_INVALIDATE,
    METRIC_CACHE_MISS,
};
use crate::config::{LogFormat, LoggingSettings};

use super::error::InfraError;

static METRIC_DESCRIPTIONS: Once = Once::new();

/// Install the global subscriber. `RUST_LOG` takes precedence over the configured level.
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
        .map_err(|err| InfraError::Telemetry(format!("failed to install tracing subscriber: {err}")))
}

pub fn describe_metrics() {
    METRIC_DESCRIPTIONS.call_once(|| {
        describe_counter!(
            METRIC_CACHE_HIT,
            Unit::Count,
            "Record lookups answered from the cache."
        );
        describe_counter!(
            METRIC_CACHE_MISS,
            Unit::Count,
            "Record lookups that fell through to the database."
        );
        describe_counter!(
            METRIC_CACHE_EXPIRED,
            Unit::Count,
            "Cache entries dropped after their TTL ran out."
        );
        describe_counter!(
            METRIC_CACHE_EVICT,
            Unit::Count,
            "Cache entries evicted to stay within capacity."
        );
        describe_counter!(
            METRIC_CACHE_INVALIDATE,
            Unit::Count,
            "Per-record cache invalidations issued before writes."
        );
    });
}
