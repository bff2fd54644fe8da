//! Runtime events and the per-dispatch envelope.

use std::fmt;
use std::sync::Arc;

use crate::cache::EvaluationCache;
use crate::error::ActionChainError;
use crate::id::ObjectId;
use crate::request::HttpExchange;

/// Request lifecycle events the runtime reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeEvent {
    /// Fired before the request handler executes
    PreRequestHandlerExecute,
    /// Fired after the request handler executes
    PostRequestHandlerExecute,
}

impl RuntimeEvent {
    /// Both events, in lifecycle order.
    pub const ALL: [RuntimeEvent; 2] = [
        RuntimeEvent::PreRequestHandlerExecute,
        RuntimeEvent::PostRequestHandlerExecute,
    ];
}

impl fmt::Display for RuntimeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeEvent::PreRequestHandlerExecute => write!(f, "PreRequestHandlerExecute"),
            RuntimeEvent::PostRequestHandlerExecute => write!(f, "PostRequestHandlerExecute"),
        }
    }
}

/// One entry of the context stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextFrame {
    /// Identity of the matched context
    pub id: ObjectId,
    /// Name of the matched context
    pub name: Arc<str>,
}

/// Envelope for one event dispatch.
///
/// Every dispatch allocates its own `RuntimeEventArgs`: the context stack and
/// both caches are never shared between requests. The envelope owns the
/// [`HttpExchange`] for the duration of the dispatch; take it back with
/// [`into_exchange`](Self::into_exchange).
#[derive(Debug)]
pub struct RuntimeEventArgs {
    exchange: HttpExchange,
    contexts: Vec<ContextFrame>,
    pub(crate) match_cache: EvaluationCache<ObjectId, bool>,
    pub(crate) eval_cache: EvaluationCache<ObjectId, bool>,
    action_failures: Vec<ActionChainError>,
}

impl RuntimeEventArgs {
    /// Creates the envelope for one dispatch.
    pub fn new(exchange: HttpExchange) -> Self {
        Self {
            exchange,
            contexts: Vec::new(),
            match_cache: EvaluationCache::new(),
            eval_cache: EvaluationCache::new(),
            action_failures: Vec::new(),
        }
    }

    /// Returns the exchange.
    pub fn exchange(&self) -> &HttpExchange {
        &self.exchange
    }

    /// Returns the exchange for mutation.
    pub fn exchange_mut(&mut self) -> &mut HttpExchange {
        &mut self.exchange
    }

    /// Consumes the envelope and returns the exchange.
    pub fn into_exchange(self) -> HttpExchange {
        self.exchange
    }

    /// Returns the matched contexts, innermost first.
    pub fn context_path(&self) -> impl Iterator<Item = &ContextFrame> {
        self.contexts.iter().rev()
    }

    /// Returns the innermost matched context, if any.
    pub fn current_context(&self) -> Option<&ContextFrame> {
        self.contexts.last()
    }

    /// Returns the current stack depth.
    pub fn depth(&self) -> usize {
        self.contexts.len()
    }

    /// Returns every fault-action chain that failed during this dispatch.
    pub fn action_failures(&self) -> &[ActionChainError] {
        &self.action_failures
    }

    /// Returns the number of cached context match results.
    pub fn cached_matches(&self) -> usize {
        self.match_cache.len()
    }

    /// Returns the number of cached condition evaluations.
    pub fn cached_evaluations(&self) -> usize {
        self.eval_cache.len()
    }

    pub(crate) fn push_context(&mut self, frame: ContextFrame) {
        self.contexts.push(frame);
    }

    pub(crate) fn pop_context(&mut self) -> Option<ContextFrame> {
        self.contexts.pop()
    }

    pub(crate) fn record_action_failure(&mut self, err: ActionChainError) {
        self.action_failures.push(err);
    }
}
