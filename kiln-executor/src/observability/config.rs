//! Subscriber settings.

use crate::config::parse_bool;
use std::str::FromStr;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per event.
    Json,
    /// Multi-line, for terminals.
    Pretty,
    /// One line per event.
    #[default]
    Compact,
}

impl FromStr for LogFormat {
    type Err = std::convert::Infallible;

    /// Unknown names fall back to compact.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "json" => Self::Json,
            "pretty" => Self::Pretty,
            _ => Self::Compact,
        })
    }
}

/// What `init_tracing` installs.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    format: LogFormat,
    /// `EnvFilter` directive, e.g. `"warn,kiln_executor=debug"`.
    filter: String,
    location: bool,
    thread_ids: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Compact,
            filter: "info".to_string(),
            location: false,
            thread_ids: false,
        }
    }
}

impl TracingConfig {
    /// Start from the defaults.
    pub fn builder() -> TracingConfigBuilder {
        TracingConfigBuilder(Self::default())
    }

    /// Read `KILN_LOG_FORMAT`, `KILN_LOG_LEVEL` (falling back to `RUST_LOG`),
    /// `KILN_LOG_LOCATION` and `KILN_LOG_THREAD_IDS`.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`TracingConfig::from_env`] over an arbitrary lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let flag = |name: &str| lookup(name).and_then(|s| parse_bool(&s)).unwrap_or(false);

        Self {
            format: lookup("KILN_LOG_FORMAT")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.format),
            filter: lookup("KILN_LOG_LEVEL")
                .or_else(|| lookup("RUST_LOG"))
                .unwrap_or(defaults.filter),
            location: flag("KILN_LOG_LOCATION"),
            thread_ids: flag("KILN_LOG_THREAD_IDS"),
        }
    }

    /// Output format.
    pub fn log_format(&self) -> LogFormat {
        self.format
    }

    /// Filter directive.
    pub fn log_filter(&self) -> &str {
        &self.filter
    }

    /// Whether events carry file and line.
    pub fn include_location(&self) -> bool {
        self.location
    }

    /// Whether events carry the thread id.
    pub fn include_thread_ids(&self) -> bool {
        self.thread_ids
    }
}

/// Builder for [`TracingConfig`].
#[derive(Debug, Clone)]
pub struct TracingConfigBuilder(TracingConfig);

impl TracingConfigBuilder {
    /// Output format.
    pub fn log_format(mut self, format: LogFormat) -> Self {
        self.0.format = format;
        self
    }

    /// Filter directive. Overrides [`TracingConfigBuilder::verbosity`] when set later.
    pub fn log_filter(mut self, filter: impl Into<String>) -> Self {
        self.0.filter = filter.into();
        self
    }

    /// Filter from a `-v` count: 0 warn, 1 info, 2 debug, more trace.
    pub fn verbosity(self, count: u8) -> Self {
        let level = match count {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        self.log_filter(level)
    }

    /// Include file and line.
    pub fn include_location(mut self, include: bool) -> Self {
        self.0.location = include;
        self
    }

    /// Include thread ids.
    pub fn include_thread_ids(mut self, include: bool) -> Self {
        self.0.thread_ids = include;
        self
    }

    /// Finish.
    pub fn build(self) -> TracingConfig {
        self.0
    }
}
