//! Security logging sinks.
//!
//! Components that report security events (the encoder, fault-action chains,
//! the log action) take an `Arc<dyn LoggerSink>` at construction. The default
//! sink, [`TracingLogger`], forwards to `tracing`; [`RecordingLogger`] keeps
//! records in memory for inspection.

use std::fmt;

use parking_lot::Mutex;

/// Severity of a security log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Diagnostic detail
    Debug,
    /// Normal operation
    Info,
    /// Suspicious but tolerated
    Warning,
    /// Failed operation or detected intrusion
    Error,
    /// Unrecoverable security event
    Fatal,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "DEBUG"),
            LogLevel::Info => write!(f, "INFO"),
            LogLevel::Warning => write!(f, "WARNING"),
            LogLevel::Error => write!(f, "ERROR"),
            LogLevel::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Category of a security log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogEventType {
    /// Security events (intrusions, faults, access decisions)
    Security,
    /// Usability events
    Usability,
    /// Performance events
    Performance,
    /// Functionality events
    Functionality,
}

impl fmt::Display for LogEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogEventType::Security => write!(f, "SECURITY"),
            LogEventType::Usability => write!(f, "USABILITY"),
            LogEventType::Performance => write!(f, "PERFORMANCE"),
            LogEventType::Functionality => write!(f, "FUNCTIONALITY"),
        }
    }
}

/// Destination for security log records.
pub trait LoggerSink: Send + Sync {
    /// Records one message.
    fn log(&self, level: LogLevel, event_type: LogEventType, message: &str);
}

/// [`LoggerSink`] that emits `tracing` events.
///
/// `Fatal` has no `tracing` counterpart and is emitted at error level with
/// `fatal = true`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl LoggerSink for TracingLogger {
    fn log(&self, level: LogLevel, event_type: LogEventType, message: &str) {
        match level {
            LogLevel::Debug => tracing::debug!(event_type = %event_type, "{}", message),
            LogLevel::Info => tracing::info!(event_type = %event_type, "{}", message),
            LogLevel::Warning => tracing::warn!(event_type = %event_type, "{}", message),
            LogLevel::Error => tracing::error!(event_type = %event_type, "{}", message),
            LogLevel::Fatal => {
                tracing::error!(event_type = %event_type, fatal = true, "{}", message)
            }
        }
    }
}

/// A single record captured by [`RecordingLogger`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Severity
    pub level: LogLevel,
    /// Category
    pub event_type: LogEventType,
    /// Message text
    pub message: String,
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.level, self.event_type, self.message)
    }
}

/// In-memory [`LoggerSink`].
///
/// Records are kept in the order they were logged.
///
/// # Example
///
/// ```
/// use esapi_core::{LogEventType, LogLevel, LoggerSink, RecordingLogger};
///
/// let logger = RecordingLogger::new();
/// logger.log(LogLevel::Warning, LogEventType::Security, "mixed encoding");
///
/// assert_eq!(logger.len(), 1);
/// assert_eq!(logger.records()[0].message, "mixed encoding");
/// ```
#[derive(Debug, Default)]
pub struct RecordingLogger {
    records: Mutex<Vec<LogRecord>>,
}

impl RecordingLogger {
    /// Creates an empty logger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of every record.
    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().clone()
    }

    /// Returns records at exactly `level`.
    pub fn records_at(&self, level: LogLevel) -> Vec<LogRecord> {
        self.records
            .lock()
            .iter()
            .filter(|record| record.level == level)
            .cloned()
            .collect()
    }

    /// Returns the number of records.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Returns true if nothing was logged.
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Drops every record.
    pub fn clear(&self) {
        self.records.lock().clear();
    }
}

impl LoggerSink for RecordingLogger {
    fn log(&self, level: LogLevel, event_type: LogEventType, message: &str) {
        self.records.lock().push(LogRecord {
            level,
            event_type,
            message: message.to_string(),
        });
    }
}
