use super::{Condition, ConditionArgs};

/// Condition that always evaluates to a fixed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueCondition {
    value: bool,
}

impl ValueCondition {
    /// Creates a condition bound to `value`.
    pub fn new(value: bool) -> Self {
        Self { value }
    }

    /// The bound value.
    pub fn value(&self) -> bool {
        self.value
    }
}

impl Condition for ValueCondition {
    fn evaluate(&self, _args: &ConditionArgs<'_>) -> bool {
        self.value
    }
}
