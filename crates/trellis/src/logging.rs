//! Logging setup for applications built on Trellis.
//!
//! Wraps `tracing-subscriber` with a builder that can also be driven by a
//! [`LoggingConfig`] bound from the application's configuration document.
//!
//! # Configuration-Based Initialization
//!
//! ```rust,ignore
//! use trellis::config::ConfigurationContext;
//! use trellis::logging;
//!
//! let context = ConfigurationContext::new("settings.json");
//! logging::init_from_section(&context.get_section("logging")?)?;
//! ```
//!
//! with a section such as:
//!
//! ```json
//! {
//!   "logging": {
//!     "level": "debug",
//!     "format": "pretty",
//!     "filters": { "trellis_config": "info" },
//!     "span_events": { "new": true, "close": true }
//!   }
//! }
//! ```
//!
//! # Manual Initialization
//!
//! ```rust,ignore
//! use trellis::logging::{LoggingBuilder, SpanEvents};
//!
//! LoggingBuilder::new()
//!     .directive("trellis_core=debug")
//!     .span_events(SpanEvents::LIFECYCLE)
//!     .init();
//! ```

use std::collections::HashMap;
use std::fmt as std_fmt;
use std::str::FromStr;

use thiserror::Error;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, fmt};
use trellis_config::{ConfigError, ConfigSchema, ConfigurationSection, bind};

/// Errors raised while setting up logging.
#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Unknown log level `{0}`")]
    InvalidLevel(String),

    #[error("Unknown log format `{0}`")]
    InvalidFormat(String),

    #[error("Invalid logging configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Failed to install subscriber: {0}")]
    Init(#[from] TryInitError),
}

/// Span event configuration for logging.
///
/// Controls when span lifecycle events are logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpanEvents {
    /// Log when a span is created.
    pub new: bool,
    /// Log when a span is entered.
    pub enter: bool,
    /// Log when a span is exited.
    pub exit: bool,
    /// Log when a span is closed.
    pub close: bool,
}

impl SpanEvents {
    pub const NONE: Self = Self {
        new: false,
        enter: false,
        exit: false,
        close: false,
    };

    /// Span creation and close events only.
    pub const LIFECYCLE: Self = Self {
        new: true,
        enter: false,
        exit: false,
        close: true,
    };

    pub const FULL: Self = Self {
        new: true,
        enter: true,
        exit: true,
        close: true,
    };

    /// Enter and exit events only.
    pub const ACTIVE: Self = Self {
        new: false,
        enter: true,
        exit: true,
        close: false,
    };

    fn to_fmt_span(self) -> fmt::format::FmtSpan {
        let mut span = fmt::format::FmtSpan::NONE;
        if self.new {
            span |= fmt::format::FmtSpan::NEW;
        }
        if self.enter {
            span |= fmt::format::FmtSpan::ENTER;
        }
        if self.exit {
            span |= fmt::format::FmtSpan::EXIT;
        }
        if self.close {
            span |= fmt::format::FmtSpan::CLOSE;
        }
        span
    }
}

impl From<&SpanEventConfig> for SpanEvents {
    fn from(config: &SpanEventConfig) -> Self {
        Self {
            new: config.new.unwrap_or_default(),
            enter: config.enter.unwrap_or_default(),
            exit: config.exit.unwrap_or_default(),
            close: config.close.unwrap_or_default(),
        }
    }
}

/// Output format for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    #[cfg(feature = "json-log")]
    Json,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compact => "compact",
            Self::Full => "full",
            Self::Pretty => "pretty",
            #[cfg(feature = "json-log")]
            Self::Json => "json",
        }
    }
}

impl std_fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std_fmt::Formatter<'_>) -> std_fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogFormat {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "full" => Ok(Self::Full),
            "pretty" => Ok(Self::Pretty),
            #[cfg(feature = "json-log")]
            "json" => Ok(Self::Json),
            _ => Err(LoggingError::InvalidFormat(s.to_string())),
        }
    }
}

// =============================================================================
// Configuration
// =============================================================================

/// Which span events to log, as read from configuration.
#[derive(Debug, Clone, Default, PartialEq, ConfigSchema)]
pub struct SpanEventConfig {
    pub new: Option<bool>,
    pub enter: Option<bool>,
    pub exit: Option<bool>,
    pub close: Option<bool>,
}

/// Logging settings bound from a configuration section.
///
/// Every field is optional; missing fields keep the builder defaults.
#[derive(Debug, Clone, Default, PartialEq, ConfigSchema)]
pub struct LoggingConfig {
    /// Global level, e.g. `"info"`.
    pub level: Option<String>,
    /// `compact`, `full`, `pretty`, or `json` with the `json-log` feature.
    pub format: Option<String>,
    /// Per-module levels, e.g. `{"trellis_core": "debug"}`.
    pub filters: Option<HashMap<String, String>>,
    /// Raw `EnvFilter` directives.
    pub directives: Option<Vec<String>>,
    pub target: Option<bool>,
    pub thread_ids: Option<bool>,
    /// Include file names and line numbers.
    pub file_location: Option<bool>,
    pub span_events: Option<SpanEventConfig>,
}

/// Initializes logging from a [`LoggingConfig`].
///
/// An already installed global subscriber is reported as
/// [`LoggingError::Init`].
pub fn init_from_config(config: &LoggingConfig) -> Result<(), LoggingError> {
    LoggingBuilder::from_config(config)?.try_init()
}

/// Binds a [`LoggingConfig`] from `section` and initializes logging with it.
///
/// An absent section initializes with defaults.
pub fn init_from_section(section: &ConfigurationSection) -> Result<(), LoggingError> {
    let config: LoggingConfig = bind(section)?;
    init_from_config(&config)
}

// =============================================================================
// LoggingBuilder
// =============================================================================

/// A builder for configuring logging.
///
/// ```rust,ignore
/// use trellis::logging::{LoggingBuilder, SpanEvents};
/// use tracing::Level;
///
/// LoggingBuilder::new()
///     .with_level(Level::DEBUG)
///     .with_span_events(SpanEvents::LIFECYCLE)
///     .with_thread_ids(true)
///     .init();
/// ```
#[derive(Debug, Default)]
pub struct LoggingBuilder {
    directives: Vec<String>,
    level: Option<tracing::Level>,
    span_events: SpanEvents,
    format: LogFormat,
    with_target: bool,
    with_thread_ids: bool,
    with_file: bool,
    with_line_number: bool,
}

impl LoggingBuilder {
    pub fn new() -> Self {
        Self {
            with_target: true,
            ..Default::default()
        }
    }

    /// Creates a builder from bound configuration.
    ///
    /// # Errors
    ///
    /// Unknown level or format names, including levels in `filters`.
    pub fn from_config(config: &LoggingConfig) -> Result<Self, LoggingError> {
        let mut builder = Self::new();

        if let Some(level) = &config.level {
            builder.level = Some(parse_level(level)?);
        }
        if let Some(format) = &config.format {
            builder.format = format.parse()?;
        }
        if let Some(span_events) = &config.span_events {
            builder.span_events = SpanEvents::from(span_events);
        }

        builder.with_target = config.target.unwrap_or(true);
        builder.with_thread_ids = config.thread_ids.unwrap_or_default();
        builder.with_file = config.file_location.unwrap_or_default();
        builder.with_line_number = builder.with_file;

        let mut filters: Vec<_> = config.filters.iter().flatten().collect();
        filters.sort();
        for (module, level) in filters {
            let level = parse_level(level)?;
            builder
                .directives
                .push(format!("{module}={}", level.as_str().to_lowercase()));
        }
        builder
            .directives
            .extend(config.directives.iter().flatten().cloned());

        Ok(builder)
    }

    /// Sets the global log level.
    pub fn with_level(mut self, level: tracing::Level) -> Self {
        self.level = Some(level);
        self
    }

    /// Adds a filter directive such as `"trellis_core=trace"`.
    pub fn directive(mut self, directive: &str) -> Self {
        self.directives.push(directive.to_string());
        self
    }

    pub fn span_events(mut self, events: SpanEvents) -> Self {
        self.span_events = events;
        self
    }

    /// Alias for `span_events`.
    pub fn with_span_events(self, events: SpanEvents) -> Self {
        self.span_events(events)
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Include the target (module path) in log output.
    pub fn with_target(mut self, enabled: bool) -> Self {
        self.with_target = enabled;
        self
    }

    pub fn with_thread_ids(mut self, enabled: bool) -> Self {
        self.with_thread_ids = enabled;
        self
    }

    pub fn with_file(mut self, enabled: bool) -> Self {
        self.with_file = enabled;
        self
    }

    pub fn with_line_number(mut self, enabled: bool) -> Self {
        self.with_line_number = enabled;
        self
    }

    /// The base level followed by every added directive, in order.
    fn filter_directives(&self) -> Vec<String> {
        let base = self.level.unwrap_or(tracing::Level::INFO);
        std::iter::once(base.as_str().to_lowercase())
            .chain(self.directives.iter().cloned())
            .collect()
    }

    /// `RUST_LOG` wins over the configured base level when set.
    fn build_filter(&self) -> EnvFilter {
        let mut directives = self.filter_directives().into_iter();
        let base = directives.next().unwrap_or_default();

        let mut filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&base));
        for directive in directives {
            if let Ok(d) = directive.parse() {
                filter = filter.add_directive(d);
            }
        }
        filter
    }

    /// Installs the subscriber, ignoring a previously installed one.
    pub fn init(self) {
        let _ = self.try_init();
    }

    pub fn try_init(self) -> Result<(), LoggingError> {
        let filter = self.build_filter();
        let span_events = self.span_events.to_fmt_span();

        macro_rules! configure_layer {
            ($layer:expr) => {
                $layer
                    .with_span_events(span_events)
                    .with_target(self.with_target)
                    .with_thread_ids(self.with_thread_ids)
                    .with_file(self.with_file)
                    .with_line_number(self.with_line_number)
            };
        }

        let installed = match self.format {
            #[cfg(feature = "json-log")]
            LogFormat::Json => tracing_subscriber::registry()
                .with(fmt::layer().json().with_span_events(span_events))
                .with(filter)
                .try_init(),
            LogFormat::Compact => tracing_subscriber::registry()
                .with(configure_layer!(fmt::layer().compact()))
                .with(filter)
                .try_init(),
            LogFormat::Full => tracing_subscriber::registry()
                .with(configure_layer!(fmt::layer()))
                .with(filter)
                .try_init(),
            LogFormat::Pretty => tracing_subscriber::registry()
                .with(configure_layer!(fmt::layer().pretty()))
                .with(filter)
                .try_init(),
        };
        installed.map_err(LoggingError::from)
    }
}

fn parse_level(level: &str) -> Result<tracing::Level, LoggingError> {
    level
        .parse()
        .map_err(|_| LoggingError::InvalidLevel(level.to_string()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use trellis_config::ConfigurationSection;

    use super::*;

    #[test]
    fn test_default_builder() {
        let builder = LoggingBuilder::new();
        assert!(builder.with_target);
        assert_eq!(builder.format, LogFormat::Compact);
        assert_eq!(builder.filter_directives(), ["info"]);
    }

    #[test]
    fn test_from_config() {
        let config: LoggingConfig = bind(json!({
            "level": "DEBUG",
            "format": "pretty",
            "filters": { "trellis_core": "trace", "figment": "warn" },
            "directives": ["hyper=off"],
            "thread_ids": true,
            "file_location": true,
            "span_events": { "new": true, "close": true }
        }))
        .unwrap();

        let builder = LoggingBuilder::from_config(&config).unwrap();
        assert_eq!(builder.format, LogFormat::Pretty);
        assert_eq!(builder.span_events, SpanEvents::LIFECYCLE);
        assert!(builder.with_thread_ids && builder.with_file && builder.with_line_number);
        assert_eq!(
            builder.filter_directives(),
            ["debug", "figment=warn", "trellis_core=trace", "hyper=off"]
        );
    }

    #[test]
    fn test_empty_section_keeps_defaults() {
        let config: LoggingConfig = bind(&ConfigurationSection::absent()).unwrap();
        assert_eq!(config, LoggingConfig::default());

        let builder = LoggingBuilder::from_config(&config).unwrap();
        assert!(builder.with_target);
        assert_eq!(builder.span_events, SpanEvents::NONE);
    }

    #[test]
    fn test_rejects_unknown_names() {
        let config = LoggingConfig {
            level: Some("loud".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            LoggingBuilder::from_config(&config),
            Err(LoggingError::InvalidLevel(level)) if level == "loud"
        ));

        let config = LoggingConfig {
            format: Some("xml".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            LoggingBuilder::from_config(&config),
            Err(LoggingError::InvalidFormat(_))
        ));

        let config = LoggingConfig {
            filters: Some(HashMap::from([("trellis".to_string(), "chatty".to_string())])),
            ..Default::default()
        };
        assert!(LoggingBuilder::from_config(&config).is_err());
    }

    #[test]
    fn test_format_names() {
        for format in [LogFormat::Compact, LogFormat::Full, LogFormat::Pretty] {
            assert_eq!(format.to_string().parse::<LogFormat>().unwrap(), format);
        }
        assert_eq!("PRETTY".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
    }

    #[test]
    fn test_span_event_flags() {
        assert_eq!(SpanEvents::NONE.to_fmt_span(), fmt::format::FmtSpan::NONE);
        assert_eq!(SpanEvents::FULL.to_fmt_span(), fmt::format::FmtSpan::FULL);
        assert_eq!(
            SpanEvents::ACTIVE.to_fmt_span(),
            fmt::format::FmtSpan::ACTIVE
        );
    }
}
