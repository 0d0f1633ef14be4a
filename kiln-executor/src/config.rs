//! Interpreter configuration.

use kiln_core::logging::DEFAULT_BUFFER_CAPACITY;

/// Configuration for a [`CachedInterpreter`](crate::CachedInterpreter).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpreterConfig {
    /// Capacity of the in-memory log buffer.
    pub log_capacity: usize,
    /// Re-validate the whole signature index after every merge.
    pub validate_signatures: bool,
    /// Convert panics escaping `compute()` into module errors.
    pub catch_panics: bool,
    /// Reason attached to new modules when the caller gives none.
    pub default_reason: Option<String>,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            log_capacity: DEFAULT_BUFFER_CAPACITY,
            validate_signatures: cfg!(debug_assertions),
            catch_panics: true,
            default_reason: None,
        }
    }
}

impl InterpreterConfig {
    /// Create configuration from environment variables.
    ///
    /// Reads the following environment variables:
    /// - `KILN_LOG_CAPACITY`: log buffer capacity
    /// - `KILN_VALIDATE_SIGNATURES`: validate the signature index after merges
    /// - `KILN_CATCH_PANICS`: capture module panics as errors
    /// - `KILN_DEFAULT_REASON`: reason for new modules
    ///
    /// Unparseable values fall back to the defaults.
    ///
    /// # Example
    ///
    /// ```bash
    /// export KILN_LOG_CAPACITY=50000
    /// export KILN_VALIDATE_SIGNATURES=true
    /// ```
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Create configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let log_capacity = lookup("KILN_LOG_CAPACITY")
            .and_then(|s| s.parse::<usize>().ok())
            .unwrap_or(defaults.log_capacity);

        let validate_signatures = lookup("KILN_VALIDATE_SIGNATURES")
            .and_then(|s| parse_bool(&s))
            .unwrap_or(defaults.validate_signatures);

        let catch_panics = lookup("KILN_CATCH_PANICS")
            .and_then(|s| parse_bool(&s))
            .unwrap_or(defaults.catch_panics);

        let default_reason = lookup("KILN_DEFAULT_REASON").filter(|s| !s.is_empty());

        Self {
            log_capacity,
            validate_signatures,
            catch_panics,
            default_reason,
        }
    }

    /// Set the log buffer capacity.
    pub fn with_log_capacity(mut self, capacity: usize) -> Self {
        self.log_capacity = capacity;
        self
    }

    /// Enable or disable post-merge signature validation.
    pub fn with_validate_signatures(mut self, validate: bool) -> Self {
        self.validate_signatures = validate;
        self
    }

    /// Enable or disable panic capture.
    pub fn with_catch_panics(mut self, catch: bool) -> Self {
        self.catch_panics = catch;
        self
    }

    /// Set the default reason.
    pub fn with_default_reason(mut self, reason: impl Into<String>) -> Self {
        self.default_reason = Some(reason.into());
        self
    }
}

pub(crate) fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
