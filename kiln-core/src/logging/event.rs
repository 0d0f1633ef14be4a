//! Structured events recorded by the interpreter.
//!
//! Every event can carry the execution it belongs to, the cached module it
//! concerns (by persistent id) and the caller's local id for that module, so
//! one `execute()` call can be replayed from the buffer.

use crate::types::{ExecutionId, ModuleId, PersistentId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

/// Severity, ordered from least to most severe.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

const LEVEL_NAMES: [(LogLevel, &str); 5] = [
    (LogLevel::Trace, "trace"),
    (LogLevel::Debug, "debug"),
    (LogLevel::Info, "info"),
    (LogLevel::Warn, "warn"),
    (LogLevel::Error, "error"),
];

impl LogLevel {
    /// Case-insensitive lookup. `warning` is accepted as an alias of `warn`.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("warning") {
            return Some(Self::Warn);
        }
        LEVEL_NAMES
            .iter()
            .find(|(_, name)| s.eq_ignore_ascii_case(name))
            .map(|(level, _)| *level)
    }

    pub fn as_str(&self) -> &'static str {
        LEVEL_NAMES[*self as usize].1
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown log level '{s}'"))
    }
}

/// What part of the interpreter emitted an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogCategory {
    /// `execute()` lifecycle: start, finish, rollback.
    Execution,
    /// Per-module update: begin, cached, end.
    Module,
    /// Cache structure: modules added, removed, flushed.
    Cache,
    /// Interpreter-wide events such as shutdown.
    System,
}

impl LogCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Execution => "execution",
            Self::Module => "module",
            Self::Cache => "cache",
            Self::System => "system",
        }
    }
}

impl fmt::Display for LogCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded event.
///
/// `id` is zero until a collector assigns the buffer sequence number.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    pub id: u64,
    /// Milliseconds since the UNIX epoch.
    pub timestamp_ms: u64,
    pub level: LogLevel,
    pub category: LogCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<ExecutionId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persistent_id: Option<PersistentId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub module_id: Option<ModuleId>,
    pub message: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl LogEvent {
    /// Event stamped with the current wall-clock time.
    pub fn new(level: LogLevel, category: LogCategory, message: impl Into<String>) -> Self {
        let timestamp_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_millis() as u64);
        Self {
            id: 0,
            timestamp_ms,
            level,
            category,
            execution_id: None,
            persistent_id: None,
            module_id: None,
            message: message.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn debug(category: LogCategory, message: impl Into<String>) -> Self {
        Self::new(LogLevel::Debug, category, message)
    }

    pub fn info(category: LogCategory, message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, category, message)
    }

    pub fn warn(category: LogCategory, message: impl Into<String>) -> Self {
        Self::new(LogLevel::Warn, category, message)
    }

    pub fn error(category: LogCategory, message: impl Into<String>) -> Self {
        Self::new(LogLevel::Error, category, message)
    }

    pub fn with_execution_id(self, execution_id: ExecutionId) -> Self {
        Self {
            execution_id: Some(execution_id),
            ..self
        }
    }

    pub fn with_persistent_id(self, persistent_id: PersistentId) -> Self {
        Self {
            persistent_id: Some(persistent_id),
            ..self
        }
    }

    pub fn with_module_id(self, module_id: ModuleId) -> Self {
        Self {
            module_id: Some(module_id),
            ..self
        }
    }

    /// Attach a structured field. Accepts strings, integers, booleans or
    /// any other JSON value.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn field(&self, key: &str) -> Option<&serde_json::Value> {
        self.fields.get(key)
    }

    /// Render as `LEVEL category [exec=.. pid=.. mid=..] message k=v ...`.
    pub fn format_line(&self) -> String {
        let mut line = format!(
            "{:>5} {:<9}",
            self.level.as_str().to_ascii_uppercase(),
            self.category
        );

        let ids: Vec<String> = [
            self.execution_id.map(|id| format!("exec={id}")),
            self.persistent_id.map(|id| format!("pid={}", id.as_u64())),
            self.module_id.map(|id| format!("mid={}", id.as_u32())),
        ]
        .into_iter()
        .flatten()
        .collect();
        if !ids.is_empty() {
            line.push_str(&format!(" [{}]", ids.join(" ")));
        }

        line.push(' ');
        line.push_str(&self.message);
        for (key, value) in &self.fields {
            line.push_str(&format!(" {key}={value}"));
        }
        line
    }
}
