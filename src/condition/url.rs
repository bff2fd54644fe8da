use regex::Regex;

use super::{Condition, ConditionArgs};
use crate::error::ConfigError;

/// Matches the request URL against a regular expression.
///
/// An empty pattern only matches an empty URL.
#[derive(Debug, Clone)]
pub struct UrlCondition {
    pattern: Regex,
}

impl UrlCondition {
    /// Compiles `pattern`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPattern`] if the pattern does not compile.
    pub fn new(pattern: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            pattern: compile_pattern(pattern)?,
        })
    }

    /// The compiled pattern source.
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }
}

impl Condition for UrlCondition {
    fn evaluate(&self, args: &ConditionArgs<'_>) -> bool {
        self.pattern.is_match(&args.request().url)
    }
}

/// Compiles a condition pattern, mapping empty input to `^$`.
pub(super) fn compile_pattern(pattern: &str) -> Result<Regex, ConfigError> {
    let source = if pattern.is_empty() { "^$" } else { pattern };
    Regex::new(source).map_err(|err| ConfigError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: err.to_string(),
    })
}
