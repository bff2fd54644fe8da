use super::{Condition, ConditionArgs};

/// Matches requests mapped to a specific handler type.
///
/// A condition without a handler type never matches, and neither does a
/// request whose handler has not been mapped yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HandlerCondition {
    handler_type: Option<String>,
}

impl HandlerCondition {
    /// Matches handlers of type `handler_type`.
    pub fn new(handler_type: impl Into<String>) -> Self {
        Self {
            handler_type: Some(handler_type.into()),
        }
    }

    /// The handler type to match.
    pub fn handler_type(&self) -> Option<&str> {
        self.handler_type.as_deref()
    }
}

impl Condition for HandlerCondition {
    fn evaluate(&self, args: &ConditionArgs<'_>) -> bool {
        match (&self.handler_type, &args.request().handler) {
            (Some(expected), Some(actual)) => expected == actual,
            _ => false,
        }
    }
}
