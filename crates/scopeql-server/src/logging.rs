//! Structured logging for the scopeql server
//!
//! Features:
//! - Structured JSON logging for production
//! - Human-readable console logging for development
//! - File rotation with daily log files
//! - Configurable log levels per module
//!
//! Settings come from [`LoggingConfig`], which already folds in `RUST_LOG`,
//! `LOG_FORMAT`, `LOG_OUTPUT` and `LOG_DIR`.

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::LoggingConfig;

const LOG_FILE_PREFIX: &str = "scopeql-server.log";

/// Log format configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format for development
    Pretty,
    /// JSON format for production (structured logging)
    Json,
    /// Compact format for testing
    Compact,
}

impl LogFormat {
    pub fn parse(value: &str) -> Self {
        match value {
            "json" => LogFormat::Json,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Pretty,
        }
    }
}

/// Log output configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    /// Log to stdout only
    Stdout,
    /// Log to file only
    File,
    /// Log to both stdout and file
    Both,
}

impl LogOutput {
    pub fn parse(value: &str) -> Self {
        match value {
            "file" => LogOutput::File,
            "both" => LogOutput::Both,
            _ => LogOutput::Stdout,
        }
    }
}

fn directive(value: &str) -> Option<Directive> {
    value.parse().ok()
}

fn env_filter(level: &str) -> EnvFilter {
    let mut filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    // Filter out noisy third-party crates
    for noisy in ["hyper=warn", "reqwest=warn", "tokio=warn", "runtime=warn", "tower=warn", "h2=warn"] {
        if let Some(d) = directive(noisy) {
            filter = filter.add_directive(d);
        }
    }
    filter
}

fn file_appender(directory: &str) -> RollingFileAppender {
    std::fs::create_dir_all(directory).ok();
    RollingFileAppender::new(Rotation::DAILY, directory, LOG_FILE_PREFIX)
}

/// Initialize the logging system
///
/// Examples:
/// ```bash
/// # Development: pretty console output at debug level
/// RUST_LOG=debug LOG_FORMAT=pretty scopeql serve
///
/// # Production: JSON to file with info level
/// RUST_LOG=info LOG_FORMAT=json LOG_OUTPUT=file LOG_DIR=/var/log/scopeql scopeql serve
/// ```
pub fn init(config: &LoggingConfig) {
    let format = LogFormat::parse(&config.format);
    let output = LogOutput::parse(&config.output);
    let filter = env_filter(&config.level);

    let stdout_layer = match format {
        LogFormat::Pretty => fmt::layer()
            .pretty()
            .with_thread_ids(true)
            .with_target(true)
            .boxed(),
        LogFormat::Json => fmt::layer().json().with_current_span(true).boxed(),
        LogFormat::Compact => fmt::layer().compact().boxed(),
    };

    let result = match output {
        LogOutput::Stdout => tracing_subscriber::registry()
            .with(filter)
            .with(stdout_layer)
            .try_init(),
        LogOutput::File => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_writer(file_appender(&config.directory))
                    .with_ansi(false),
            )
            .try_init(),
        LogOutput::Both => tracing_subscriber::registry()
            .with(filter)
            .with(stdout_layer)
            .with(
                fmt::layer()
                    .with_writer(file_appender(&config.directory))
                    .with_ansi(false)
                    .boxed(),
            )
            .try_init(),
    };

    if result.is_err() {
        // A subscriber is already installed (tests, embedding applications)
        return;
    }

    tracing::info!(format = ?format, output = ?output, "✅ Logging system initialized");
    tracing::debug!(level = %config.level, directory = %config.directory, "Logging settings");
}

/// Helper macro for logging with structured fields
///
/// Usage:
/// ```rust
/// scopeql_server::log_event!(
///     level: tracing::Level::INFO,
///     event: "query_attempt",
///     tenant: "acme",
///     rows: 3
/// );
/// ```
#[macro_export]
macro_rules! log_event {
    (level: $level:expr, event: $event:expr $(, $key:ident: $value:expr)* $(,)?) => {
        tracing::event!(
            $level,
            event = $event
            $(, $key = ?$value)*
        );
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("compact"), LogFormat::Compact);
        assert_eq!(LogFormat::parse("yaml"), LogFormat::Pretty);
    }

    #[test]
    fn test_log_output_parse() {
        assert_eq!(LogOutput::parse("file"), LogOutput::File);
        assert_eq!(LogOutput::parse("both"), LogOutput::Both);
        assert_eq!(LogOutput::parse("stdout"), LogOutput::Stdout);
        assert_eq!(LogOutput::parse(""), LogOutput::Stdout);
    }

    #[test]
    fn test_invalid_level_falls_back() {
        // Must not panic on garbage filters
        let _ = env_filter("=not a filter=");
    }
}
