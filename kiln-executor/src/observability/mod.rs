//! Observability infrastructure for Kiln.
//!
//! Structured logging goes through `tracing`; this module installs the
//! subscriber. Format is controlled via `KILN_LOG_FORMAT`:
//! - `json` - Structured JSON output
//! - `pretty` - Human-readable multi-line output
//! - `compact` - Single-line output (default)
//!
//! # Example
//!
//! ```ignore
//! use kiln_executor::observability::{TracingConfig, init_tracing};
//!
//! init_tracing(TracingConfig::from_env())?;
//! ```

mod config;
mod tracing_setup;

pub use config::{LogFormat, TracingConfig, TracingConfigBuilder};
pub use tracing_setup::init_tracing;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = TracingConfig::default();
        assert_eq!(config.log_format(), LogFormat::Compact);
        assert_eq!(config.log_filter(), "info");
        assert!(!config.include_location());
    }

    #[test]
    fn config_builder() {
        let config = TracingConfig::builder()
            .log_format(LogFormat::Json)
            .log_filter("kiln_executor=debug")
            .include_location(true)
            .build();

        assert_eq!(config.log_format(), LogFormat::Json);
        assert_eq!(config.log_filter(), "kiln_executor=debug");
        assert!(config.include_location());
    }

    #[test]
    fn verbosity_maps_to_filter() {
        assert_eq!(TracingConfig::builder().verbosity(0).build().log_filter(), "warn");
        assert_eq!(TracingConfig::builder().verbosity(1).build().log_filter(), "info");
        assert_eq!(TracingConfig::builder().verbosity(2).build().log_filter(), "debug");
        assert_eq!(TracingConfig::builder().verbosity(9).build().log_filter(), "trace");
    }

    #[test]
    fn log_format_parsing() {
        assert_eq!("JSON".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert_eq!("other".parse::<LogFormat>().unwrap(), LogFormat::Compact);
    }
}
