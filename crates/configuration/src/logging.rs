use crate::settings::LoggingConfig;
use tracing::debug;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `config.level`. When a log directory is
/// configured a second, non-blocking layer writes to a daily-rolling file; the
/// returned guard must be held until shutdown so buffered lines are flushed.
pub fn init_tracing(config: &LoggingConfig) -> Option<WorkerGuard> {
    let filter = || {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
    };

    let stdout_layer = fmt::layer()
        .with_timer(LocalTime::rfc_3339())
        .with_target(true)
        .with_filter(filter());

    match &config.directory {
        Some(directory) => {
            let appender = tracing_appender::rolling::daily(directory, "pgtable.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file_layer = fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(filter());
            let _ = tracing_subscriber::registry()
                .with(stdout_layer)
                .with(file_layer)
                .try_init();
            debug!(level = %config.level, directory = %directory.display(), "tracing initialised");
            Some(guard)
        }
        None => {
            let _ = tracing_subscriber::registry().with(stdout_layer).try_init();
            debug!(level = %config.level, "tracing initialised");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stdout_only_logging_needs_no_guard() {
        assert!(init_tracing(&LoggingConfig::default()).is_none());
        // A second call keeps the first subscriber instead of failing.
        assert!(init_tracing(&LoggingConfig::default()).is_none());
    }
}
