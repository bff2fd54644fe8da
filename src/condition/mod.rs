//! Predicates that gate contexts.
//!
//! A [`Condition`] is a pure predicate over the request bundle. Contexts bind
//! conditions through [`ContextCondition`], which adds the expected polarity.
//! Conditions are shared through [`ConditionRef`] handles whose [`ObjectId`]
//! keys the per-dispatch evaluation cache: one condition instance bound to
//! several contexts is evaluated at most once per dispatch.

mod handler;
mod parameters;
mod url;
mod user;
mod value;

use std::fmt;
use std::sync::Arc;

pub use handler::HandlerCondition;
pub use parameters::ParametersCondition;
pub use url::UrlCondition;
pub use user::UserCondition;
pub use value::ValueCondition;

use crate::event::{RuntimeEvent, RuntimeEventArgs};
use crate::id::ObjectId;
use crate::request::HttpRequest;

/// Arguments passed to [`Condition::evaluate`].
#[derive(Debug, Clone, Copy)]
pub struct ConditionArgs<'a> {
    event: RuntimeEvent,
    runtime_args: &'a RuntimeEventArgs,
}

impl<'a> ConditionArgs<'a> {
    /// Wraps the dispatch envelope for evaluation.
    pub fn new(event: RuntimeEvent, runtime_args: &'a RuntimeEventArgs) -> Self {
        Self {
            event,
            runtime_args,
        }
    }

    /// The event being dispatched.
    pub fn event(&self) -> RuntimeEvent {
        self.event
    }

    /// The current request.
    pub fn request(&self) -> &'a HttpRequest {
        &self.runtime_args.exchange().request
    }

    /// The whole dispatch envelope.
    pub fn runtime_args(&self) -> &'a RuntimeEventArgs {
        self.runtime_args
    }
}

/// A boolean predicate over request-scoped state.
///
/// Implementations must not mutate shared state. Any
/// `Fn(&ConditionArgs) -> bool` closure is a condition.
pub trait Condition: Send + Sync {
    /// Evaluates the predicate.
    fn evaluate(&self, args: &ConditionArgs<'_>) -> bool;
}

impl<F> Condition for F
where
    F: Fn(&ConditionArgs<'_>) -> bool + Send + Sync,
{
    fn evaluate(&self, args: &ConditionArgs<'_>) -> bool {
        self(args)
    }
}

/// Shared handle to a condition with a stable identity.
#[derive(Clone)]
pub struct ConditionRef {
    id: ObjectId,
    condition: Arc<dyn Condition>,
}

impl ConditionRef {
    /// Wraps a condition and assigns it a fresh id.
    pub fn new<C: Condition + 'static>(condition: C) -> Self {
        Self::from_arc(Arc::new(condition))
    }

    /// Wraps an already shared condition and assigns it a fresh id.
    pub fn from_arc(condition: Arc<dyn Condition>) -> Self {
        Self {
            id: ObjectId::next(),
            condition,
        }
    }

    /// Returns the condition's identity.
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// Evaluates the wrapped condition, bypassing any cache.
    pub fn evaluate(&self, args: &ConditionArgs<'_>) -> bool {
        self.condition.evaluate(args)
    }
}

impl fmt::Debug for ConditionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConditionRef").field("id", &self.id).finish()
    }
}

/// A condition bound to a context together with the result it must produce.
#[derive(Debug, Clone)]
pub struct ContextCondition {
    condition: ConditionRef,
    result: bool,
}

impl ContextCondition {
    /// Pairs `condition` with the expected `result`.
    pub fn new(condition: ConditionRef, result: bool) -> Self {
        Self { condition, result }
    }

    /// The bound condition.
    pub fn condition(&self) -> &ConditionRef {
        &self.condition
    }

    /// The expected evaluation result.
    pub fn result(&self) -> bool {
        self.result
    }

    /// Returns true when `evaluated` equals the expected result.
    pub fn matches(&self, evaluated: bool) -> bool {
        evaluated == self.result
    }
}
