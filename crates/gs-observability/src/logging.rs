//! Structured logging setup.
//!
//! `RUST_LOG` wins when set; otherwise every gatesync crate logs at the
//! configured level and the AWS SDK internals are held at warn. Output is a
//! compact human format by default, JSON when requested.

use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: Level,
    /// Emit one JSON object per event instead of the human format.
    pub json_format: bool,
    /// Log span open/close events.
    pub include_spans: bool,
    /// Annotate events with file and line.
    pub include_location: bool,
    pub include_thread_ids: bool,
    /// Annotate events with the emitting module path.
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json_format: false,
            include_spans: false,
            include_location: false,
            include_thread_ids: false,
            include_target: true,
        }
    }
}

/// Initializes logging with the default configuration.
pub fn init_logging() {
    init_logging_with_config(LoggingConfig::default());
}

/// Initializes the global subscriber. Call once, from the binary.
pub fn init_logging_with_config(config: LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(config.level)));

    let span_events = if config.include_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let fmt_layer = fmt::layer()
        .with_span_events(span_events)
        .with_file(config.include_location)
        .with_line_number(config.include_location)
        .with_thread_ids(config.include_thread_ids)
        .with_target(config.include_target);

    let fmt_layer = if config.json_format {
        fmt_layer.json().boxed()
    } else {
        fmt_layer.boxed()
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

fn default_directives(level: Level) -> String {
    format!(
        "gs_core={level},gs_connectors={level},gs_engine={level},gs_cli={level},\
         aws_config=warn,aws_smithy_runtime=warn,hyper=warn"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, Level::INFO);
        assert!(!config.json_format);
        assert!(config.include_target);
    }

    #[test]
    fn test_default_directives_scope_crates() {
        // Level displays uppercase; EnvFilter parses levels case-insensitively
        let directives = default_directives(Level::DEBUG);
        assert!(directives.contains("gs_engine=DEBUG"));
        assert!(directives.contains("aws_config=warn"));
    }
}
