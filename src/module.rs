//! Platform adapter driving the runtime through the request lifecycle.
//!
//! [`RuntimeModule`] plays the role of the web platform: it owns the event
//! source the runtime listens to, maps handler types to contexts the first
//! time they are seen, and fires the pre/post handler events around the
//! application's handler.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::action::Action;
use crate::bridge::RuntimeEventPublisher;
use crate::condition::{ConditionRef, HandlerCondition, ValueCondition};
use crate::context::Context;
use crate::error::Fault;
use crate::event::{RuntimeEvent, RuntimeEventArgs};
use crate::request::HttpExchange;
use crate::runtime::Runtime;
use crate::rule::Rule;

/// A rule to run together with the actions to take when it faults.
#[derive(Clone)]
pub struct RunRule {
    rule: Arc<dyn Rule>,
    fault_actions: Vec<Arc<dyn Action>>,
}

impl RunRule {
    /// Runs `rule` with no fault actions.
    pub fn new(rule: Arc<dyn Rule>) -> Self {
        Self {
            rule,
            fault_actions: Vec::new(),
        }
    }

    /// Appends a fault action, builder style.
    pub fn with_fault_action(mut self, action: Arc<dyn Action>) -> Self {
        self.fault_actions.push(action);
        self
    }

    /// The rule to run.
    pub fn rule(&self) -> &Arc<dyn Rule> {
        &self.rule
    }

    /// The fault actions, in execution order.
    pub fn fault_actions(&self) -> &[Arc<dyn Action>] {
        &self.fault_actions
    }
}

impl fmt::Debug for RunRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RunRule")
            .field("rule", &self.rule.name())
            .field("fault_actions", &self.fault_actions.len())
            .finish()
    }
}

fn bind_run_rules(context: &Context, run_rules: &[RunRule]) {
    for run_rule in run_rules {
        context
            .bind_rule(Arc::clone(&run_rule.rule))
            .extend_fault_actions(run_rule.fault_actions.iter().cloned());
    }
}

/// Connects a [`Runtime`] to the request lifecycle.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use esapi_core::{ClickjackRule, HttpExchange, HttpRequest, RunRule, Runtime, RuntimeModule};
///
/// let module = RuntimeModule::new(Arc::new(Runtime::new()));
/// module.add_application_rules(&[RunRule::new(Arc::new(ClickjackRule::default()))]);
///
/// let exchange = HttpExchange::new(HttpRequest::new("req-1", "/").with_handler("HomePage"));
/// let exchange = module.process(exchange, |exchange| exchange.response.write("hello"))?;
///
/// assert_eq!(exchange.response.body(), "hello");
/// assert_eq!(exchange.response.header("X-FRAME-OPTIONS"), Some("DENY"));
/// # Ok::<(), esapi_core::Fault>(())
/// ```
pub struct RuntimeModule {
    runtime: Arc<Runtime>,
    events: RuntimeEventPublisher,
    handler_rules: RwLock<HashMap<String, Vec<RunRule>>>,
    mapped_handlers: Mutex<HashSet<String>>,
}

impl RuntimeModule {
    /// Creates the module and subscribes `runtime` to its events.
    pub fn new(runtime: Arc<Runtime>) -> Self {
        let events = RuntimeEventPublisher::new();
        runtime.subscribe(&events);
        Self {
            runtime,
            events,
            handler_rules: RwLock::new(HashMap::new()),
            mapped_handlers: Mutex::new(HashSet::new()),
        }
    }

    /// The runtime driven by this module.
    pub fn runtime(&self) -> &Arc<Runtime> {
        &self.runtime
    }

    /// The event source the runtime listens to.
    pub fn events(&self) -> &RuntimeEventPublisher {
        &self.events
    }

    /// Creates a context that matches every request and binds `run_rules` to it.
    pub fn add_application_rules(&self, run_rules: &[RunRule]) -> Arc<Context> {
        let context = self.runtime.create_context();
        context.bind_condition(ConditionRef::new(ValueCondition::new(true)), true);
        bind_run_rules(&context, run_rules);
        tracing::debug!(
            context = context.name(),
            rules = run_rules.len(),
            "application context mapped"
        );
        context
    }

    /// Declares rules for requests served by `handler_type`.
    ///
    /// The context is created lazily when a request for that handler is
    /// first mapped. Declarations made after that have no effect.
    pub fn declare_handler_rules(&self, handler_type: impl Into<String>, run_rules: Vec<RunRule>) {
        self.handler_rules
            .write()
            .entry(handler_type.into())
            .or_default()
            .extend(run_rules);
    }

    /// Maps the request's handler type to a context on first sight.
    ///
    /// Returns the created context, or `None` when the handler was already
    /// mapped, has no declared rules, or the request has no handler.
    pub fn map_request_handler(&self, exchange: &HttpExchange) -> Option<Arc<Context>> {
        let handler_type = exchange.request.handler.as_deref()?;

        let mut mapped = self.mapped_handlers.lock();
        if !mapped.insert(handler_type.to_string()) {
            return None;
        }

        let handler_rules = self.handler_rules.read();
        let run_rules = handler_rules.get(handler_type).filter(|rules| !rules.is_empty())?;
        let context = self.runtime.create_context();
        context.bind_condition(ConditionRef::new(HandlerCondition::new(handler_type)), true);
        bind_run_rules(&context, run_rules);
        tracing::debug!(
            handler = handler_type,
            context = context.name(),
            rules = run_rules.len(),
            "handler context mapped"
        );
        Some(context)
    }

    /// Fires [`RuntimeEvent::PreRequestHandlerExecute`] with a fresh envelope.
    ///
    /// # Errors
    ///
    /// Returns a fault no context rule handled.
    pub fn pre_request_handler_execute(
        &self,
        exchange: HttpExchange,
    ) -> Result<RuntimeEventArgs, Fault> {
        self.fire(RuntimeEvent::PreRequestHandlerExecute, exchange)
    }

    /// Fires [`RuntimeEvent::PostRequestHandlerExecute`] with a fresh envelope.
    ///
    /// # Errors
    ///
    /// Returns a fault no context rule handled.
    pub fn post_request_handler_execute(
        &self,
        exchange: HttpExchange,
    ) -> Result<RuntimeEventArgs, Fault> {
        self.fire(RuntimeEvent::PostRequestHandlerExecute, exchange)
    }

    /// Runs the whole lifecycle for one request.
    ///
    /// The handler is mapped, the pre event fires, `handler` runs, and the
    /// post event fires. Once the response has been ended (by a fault action
    /// or by the handler) the remaining stages are skipped.
    ///
    /// # Errors
    ///
    /// Returns a fault no context rule handled.
    pub fn process<F>(&self, exchange: HttpExchange, handler: F) -> Result<HttpExchange, Fault>
    where
        F: FnOnce(&mut HttpExchange),
    {
        self.map_request_handler(&exchange);

        let mut exchange = self.pre_request_handler_execute(exchange)?.into_exchange();
        if exchange.response.is_ended() {
            return Ok(exchange);
        }

        handler(&mut exchange);
        if exchange.response.is_ended() {
            return Ok(exchange);
        }

        Ok(self.post_request_handler_execute(exchange)?.into_exchange())
    }

    /// Disconnects the runtime from this module's events.
    pub fn dispose(&self) {
        self.runtime.unsubscribe(&self.events);
    }

    fn fire(&self, event: RuntimeEvent, exchange: HttpExchange) -> Result<RuntimeEventArgs, Fault> {
        let mut args = RuntimeEventArgs::new(exchange);
        self.events.publish(event, &mut args)?;
        Ok(args)
    }
}

impl Drop for RuntimeModule {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for RuntimeModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeModule")
            .field("runtime", &self.runtime)
            .field("mapped_handlers", &self.mapped_handlers.lock().len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::BlockAction;
    use crate::request::HttpRequest;
    use crate::rule::{ClickjackRule, CustomRule, FramingMode};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn page(handler: &str) -> HttpExchange {
        HttpExchange::new(HttpRequest::new("req", "/page").with_handler(handler))
    }

    fn deny_rule() -> Arc<dyn Rule> {
        Arc::new(CustomRule::new(
            "deny",
            &[RuntimeEvent::PreRequestHandlerExecute],
            |_, _| Err(Fault::intrusion("denied", "deny fired")),
        ))
    }

    #[test]
    fn handler_context_is_created_once() {
        let module = RuntimeModule::new(Arc::new(Runtime::new()));
        module.declare_handler_rules("AdminPage", vec![RunRule::new(deny_rule())]);

        assert!(module.map_request_handler(&page("AdminPage")).is_some());
        assert!(module.map_request_handler(&page("AdminPage")).is_none());
        assert_eq!(module.runtime().contexts().len(), 1);
    }

    #[test]
    fn handlers_without_rules_create_no_context() {
        let module = RuntimeModule::new(Arc::new(Runtime::new()));
        assert!(module.map_request_handler(&page("HomePage")).is_none());
        let unmapped = HttpExchange::new(HttpRequest::new("req", "/"));
        assert!(module.map_request_handler(&unmapped).is_none());
        assert!(module.runtime().contexts().is_empty());
    }

    #[test]
    fn blocked_request_skips_handler() {
        let module = RuntimeModule::new(Arc::new(Runtime::new()));
        module.declare_handler_rules(
            "AdminPage",
            vec![RunRule::new(deny_rule()).with_fault_action(Arc::new(BlockAction::default()))],
        );

        let calls = AtomicUsize::new(0);
        let exchange = module
            .process(page("AdminPage"), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        assert_eq!(exchange.response.status(), 403);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let exchange = module
            .process(page("HomePage"), |_| {
                calls.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        assert_eq!(exchange.response.status(), 200);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn application_rules_apply_to_every_request() {
        let module = RuntimeModule::new(Arc::new(Runtime::new()));
        module.add_application_rules(&[RunRule::new(Arc::new(ClickjackRule::new(
            FramingMode::SameOrigin,
        )))]);

        for handler in ["A", "B"] {
            let exchange = module.process(page(handler), |_| {}).unwrap();
            assert_eq!(exchange.response.header("X-FRAME-OPTIONS"), Some("SAMEORIGIN"));
        }
    }

    #[test]
    fn dispose_disconnects_runtime() {
        let module = RuntimeModule::new(Arc::new(Runtime::new()));
        module.add_application_rules(&[RunRule::new(Arc::new(ClickjackRule::default()))]);
        module.dispose();

        let args = module
            .post_request_handler_execute(page("A"))
            .unwrap();
        assert!(args.exchange().response.header("X-FRAME-OPTIONS").is_none());
    }
}
