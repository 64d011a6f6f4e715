//! Structured logging through [`tracing`].
//!
//! Production builds log JSON lines, development builds log human readable output. Records from
//! the `log` facade are bridged into the same subscriber.

use std::io;
use std::sync::Once;

use silver_config::Environment;
use thiserror::Error;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_log::LogTracer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Default filter when `RUST_LOG` is not set.
const DEFAULT_LOG_FILTER: &str = "info";

/// Environment variable enabling log output in tests.
const ENABLE_TEST_TRACING_ENV_NAME: &str = "ENABLE_TRACING";

static INIT_TEST_TRACING: Once = Once::new();

/// Errors raised while installing the global subscriber.
#[derive(Debug, Error)]
pub enum TracingError {
    #[error("failed to load the runtime environment: {0}")]
    Environment(#[from] io::Error),

    #[error("failed to install the log bridge: {0}")]
    LogBridge(#[from] tracing_log::log::SetLoggerError),

    #[error("failed to install the global subscriber: {0}")]
    Subscriber(#[from] SetGlobalDefaultError),
}

/// Flushes buffered log lines when dropped.
///
/// Must be kept alive until the process exits, otherwise trailing logs are lost.
#[must_use = "dropping the flusher stops log output"]
#[derive(Debug)]
pub struct LogFlusher {
    _guard: WorkerGuard,
}

/// Installs the global subscriber for the binary `app_name`.
pub fn init_tracing(app_name: &str) -> Result<LogFlusher, TracingError> {
    init_tracing_with_top_level_fields(app_name, None)
}

/// Installs the global subscriber, attaching `pipeline_id` to every log line when given.
pub fn init_tracing_with_top_level_fields(
    app_name: &str,
    pipeline_id: Option<&str>,
) -> Result<LogFlusher, TracingError> {
    let environment = Environment::load()?;
    LogTracer::init()?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let (writer, guard) = tracing_appender::non_blocking(io::stdout());

    let registry = tracing_subscriber::registry().with(filter);
    if environment.is_prod() {
        let subscriber = registry.with(
            fmt::layer()
                .json()
                .flatten_event(true)
                .with_current_span(true)
                .with_writer(writer),
        );
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = registry.with(fmt::layer().with_writer(writer));
        tracing::subscriber::set_global_default(subscriber)?;
    }

    match pipeline_id {
        Some(pipeline_id) => tracing::info!(
            app = app_name,
            pipeline_id,
            %environment,
            "tracing initialized"
        ),
        None => tracing::info!(app = app_name, %environment, "tracing initialized"),
    }

    Ok(LogFlusher { _guard: guard })
}

/// Installs a test subscriber once per process.
///
/// Output is only produced when `ENABLE_TRACING` is set, and goes through the test writer so
/// it is captured per test.
pub fn init_test_tracing() {
    INIT_TEST_TRACING.call_once(|| {
        if std::env::var(ENABLE_TEST_TRACING_ENV_NAME).is_err() {
            return;
        }

        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_test_writer());

        // Another test harness may have installed a subscriber already.
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracing_can_be_initialized_repeatedly() {
        init_test_tracing();
        init_test_tracing();

        tracing::info!("still logging");
    }

    #[test]
    fn unknown_environment_is_rejected_before_installing_anything() {
        // SAFETY: no other test of this crate reads or writes `APP_ENVIRONMENT`.
        unsafe { std::env::set_var("APP_ENVIRONMENT", "staging") };
        let result = init_tracing("silver-test");
        unsafe { std::env::remove_var("APP_ENVIRONMENT") };

        assert!(matches!(result, Err(TracingError::Environment(_))));
    }
}
