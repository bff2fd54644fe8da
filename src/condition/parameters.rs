use super::{Condition, ConditionArgs};

/// Matches requests that carry every listed parameter.
///
/// A condition with no parameter names never matches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParametersCondition {
    names: Vec<String>,
}

impl ParametersCondition {
    /// Requires each of `names` to be present.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// The required parameter names.
    pub fn names(&self) -> &[String] {
        &self.names
    }
}

impl Condition for ParametersCondition {
    fn evaluate(&self, args: &ConditionArgs<'_>) -> bool {
        let request = args.request();
        !self.names.is_empty() && self.names.iter().all(|name| request.has_parameter(name))
    }
}
