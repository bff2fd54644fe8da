//! Behavior units attached to contexts.
//!
//! A [`Rule`] declares the runtime events it handles and runs against the
//! dispatch envelope. A rule that detects a problem returns a [`Fault`]; the
//! owning [`ContextRule`](crate::ContextRule) intercepts it and runs the
//! configured fault actions.

mod clickjack;
mod csrf;
mod throttle;

use std::fmt;

pub use clickjack::{ClickjackRule, FramingMode};
pub use csrf::{CsrfRule, CSRF_TOKEN_HEADER, CSRF_TOKEN_KEY};
pub use throttle::RequestThrottleRule;

use crate::error::Fault;
use crate::event::{RuntimeEvent, RuntimeEventArgs};

/// A unit of request-time behavior.
pub trait Rule: Send + Sync {
    /// Name used in logs and fault-action diagnostics.
    fn name(&self) -> &str;

    /// Events this rule handles.
    fn events(&self) -> &[RuntimeEvent];

    /// Runs the rule for `event`.
    ///
    /// # Errors
    ///
    /// Returns a fault when the request violates the rule.
    fn execute(&self, event: RuntimeEvent, args: &mut RuntimeEventArgs) -> Result<(), Fault>;
}

type RuleFn = dyn Fn(RuntimeEvent, &mut RuntimeEventArgs) -> Result<(), Fault> + Send + Sync;

/// A rule backed by a closure.
///
/// # Example
///
/// ```
/// use esapi_core::{CustomRule, Fault, Rule, RuntimeEvent};
///
/// let rule = CustomRule::new("deny-all", &[RuntimeEvent::PreRequestHandlerExecute], |_, _| {
///     Err(Fault::intrusion("Access denied", "deny-all rule fired"))
/// });
/// assert_eq!(rule.name(), "deny-all");
/// ```
pub struct CustomRule {
    name: String,
    events: Vec<RuntimeEvent>,
    handler: Box<RuleFn>,
}

impl CustomRule {
    /// Creates a rule named `name` that runs `handler` for each of `events`.
    pub fn new<F>(name: impl Into<String>, events: &[RuntimeEvent], handler: F) -> Self
    where
        F: Fn(RuntimeEvent, &mut RuntimeEventArgs) -> Result<(), Fault> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            events: events.to_vec(),
            handler: Box::new(handler),
        }
    }
}

impl Rule for CustomRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn events(&self) -> &[RuntimeEvent] {
        &self.events
    }

    fn execute(&self, event: RuntimeEvent, args: &mut RuntimeEventArgs) -> Result<(), Fault> {
        (self.handler)(event, args)
    }
}

impl fmt::Debug for CustomRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomRule")
            .field("name", &self.name)
            .field("events", &self.events)
            .finish()
    }
}
