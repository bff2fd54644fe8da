use std::fmt;

use thiserror::Error;

/// Errors raised while wiring the runtime graph.
///
/// Configuration errors are reported at registration time. They are fatal to
/// the call that produced them and leave the target registry untouched.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An id or name was empty
    #[error("invalid id: must not be empty")]
    EmptyId,
    /// An entry with the same id is already registered
    #[error("duplicate id '{0}'")]
    DuplicateId(String),
    /// A pattern could not be compiled
    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The rejected pattern
        pattern: String,
        /// Why compilation failed
        reason: String,
    },
    /// A constructor parameter was out of range
    #[error("invalid parameter '{name}': {reason}")]
    InvalidParameter {
        /// Parameter name
        name: &'static str,
        /// Why it was rejected
        reason: String,
    },
    /// A configuration entry referenced an unregistered object
    #[error("unknown {kind} '{name}'")]
    UnknownReference {
        /// Registry that was searched ("condition", "rule", "action")
        kind: &'static str,
        /// The missing name
        name: String,
    },
    /// Attaching the context would make it its own descendant
    #[error("context '{0}' would contain itself")]
    Cycle(String),
    /// The context is already attached to the runtime or to another context
    #[error("context '{0}' is already attached")]
    AlreadyAttached(String),
    /// A configuration document could not be parsed
    #[error("configuration parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A fault raised by a rule while handling a runtime event.
///
/// Faults are returned from [`Rule::execute`](crate::Rule::execute) and
/// intercepted by the owning context rule, which turns them into a chain of
/// fault actions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct Fault {
    kind: FaultKind,
    message: String,
    log_message: Option<String>,
}

impl Fault {
    /// Creates a new fault.
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            log_message: None,
        }
    }

    /// Creates an intrusion fault with a user-facing and a log-facing message.
    pub fn intrusion(user_message: impl Into<String>, log_message: impl Into<String>) -> Self {
        Self {
            kind: FaultKind::Intrusion,
            message: user_message.into(),
            log_message: Some(log_message.into()),
        }
    }

    /// Creates an invalid-operation fault.
    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::new(FaultKind::InvalidOperation, message)
    }

    /// Returns the fault kind.
    pub fn kind(&self) -> FaultKind {
        self.kind
    }

    /// Returns the user-facing message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the message intended for the security log.
    ///
    /// Falls back to the user message when no separate log message was given.
    pub fn log_message(&self) -> &str {
        self.log_message.as_deref().unwrap_or(&self.message)
    }

    /// Returns true for intrusion faults.
    pub fn is_intrusion(&self) -> bool {
        self.kind == FaultKind::Intrusion
    }
}

impl From<EncodingError> for Fault {
    fn from(err: EncodingError) -> Self {
        Fault::intrusion(INPUT_VALIDATION_FAILURE, err.to_string())
    }
}

/// The kind of rule fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// A detected attack or policy breach
    Intrusion,
    /// The rule could not run in the current request state
    InvalidOperation,
    /// Any other rule failure
    Rule,
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultKind::Intrusion => write!(f, "intrusion"),
            FaultKind::InvalidOperation => write!(f, "invalid operation"),
            FaultKind::Rule => write!(f, "rule fault"),
        }
    }
}

/// User-facing message for canonicalization intrusions.
pub(crate) const INPUT_VALIDATION_FAILURE: &str = "Input validation failure";

/// Errors raised by the encoder.
///
/// Every variant except [`EncodingError::UnknownCodec`] is an intrusion-class
/// error: it signals input that was deliberately encoded to slip past filters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodingError {
    /// Input was encoded several times with more than one scheme
    #[error("multiple ({found}x) and mixed encoding ({mixed}x) detected")]
    MultipleMixedEncoding {
        /// Number of decode passes that changed the value
        found: usize,
        /// Number of times the decoding codec changed, plus one
        mixed: usize,
    },
    /// Input was encoded several times
    #[error("multiple ({found}x) encoding detected")]
    MultipleEncoding {
        /// Number of decode passes that changed the value
        found: usize,
    },
    /// Input mixed more than one encoding scheme
    #[error("mixed encoding ({mixed}x) detected")]
    MixedEncoding {
        /// Number of times the decoding codec changed, plus one
        mixed: usize,
    },
    /// Decoding kept changing the value past the pass limit
    #[error("canonicalization did not converge after {passes} passes")]
    DidNotConverge {
        /// Number of passes that changed the value
        passes: usize,
    },
    /// The named codec is not registered
    #[error("unknown codec '{0}'")]
    UnknownCodec(String),
}

impl EncodingError {
    /// Returns true when the error indicates a detected intrusion.
    pub fn is_intrusion(&self) -> bool {
        !matches!(self, EncodingError::UnknownCodec(_))
    }
}

/// Error returned by a single fault action.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("action '{action}' failed: {message}")]
pub struct ActionError {
    action: String,
    message: String,
}

impl ActionError {
    /// Creates a new action error.
    pub fn new(action: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            message: message.into(),
        }
    }

    /// Returns the name of the failing action.
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Returns the failure message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Aggregate of every action that failed in one fault-action chain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{} fault action(s) failed for rule '{rule}'", .failures.len())]
pub struct ActionChainError {
    rule: String,
    failures: Vec<ActionError>,
}

impl ActionChainError {
    pub(crate) fn new(rule: impl Into<String>, failures: Vec<ActionError>) -> Self {
        Self {
            rule: rule.into(),
            failures,
        }
    }

    /// Returns the name of the rule whose fault triggered the chain.
    pub fn rule(&self) -> &str {
        &self.rule
    }

    /// Returns the individual action failures, in execution order.
    pub fn failures(&self) -> &[ActionError] {
        &self.failures
    }
}
