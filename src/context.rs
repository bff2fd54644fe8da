//! Scope nodes of the runtime tree.
//!
//! A [`Context`] gates a subtree of rules and subcontexts on a list of
//! [`ContextCondition`]s. When an event reaches a context:
//!
//! ```text
//! is_match?  no  -> event consumed, nothing below runs
//!            yes -> push frame -> rules (binding order) -> subcontexts -> pop frame
//! ```
//!
//! Each bound rule is wrapped in a [`ContextRule`], which intercepts the
//! rule's faults and runs its fault actions.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::action::{Action, ActionArgs};
use crate::bridge::{Forward, RuntimeEventBridge, RuntimeEventListener, RuntimeEventPublisher};
use crate::condition::{ConditionArgs, ConditionRef, ContextCondition};
use crate::error::{ActionChainError, ConfigError, Fault};
use crate::event::{ContextFrame, RuntimeEvent, RuntimeEventArgs};
use crate::id::ObjectId;
use crate::logging::{LogEventType, LogLevel, LoggerSink, TracingLogger};
use crate::repository::{NamedObjectRepository, ObjectRepository};
use crate::rule::Rule;

/// A named scope with match conditions, rules and subcontexts.
///
/// Contexts are always handled through `Arc<Context>`. A parent owns its
/// subcontexts and only records its own id in each child. A context is
/// attached to at most one place, either the runtime root list or a single
/// parent, and never below itself, so the tree stays acyclic.
///
/// # Example
///
/// ```
/// use esapi_core::{ClickjackRule, Context, HttpExchange, HttpRequest, RuntimeEvent,
///     RuntimeEventArgs, UrlCondition, ConditionRef, RuntimeEventBridge};
/// use std::sync::Arc;
///
/// let admin = Context::new("admin")?;
/// admin.bind_condition(ConditionRef::new(UrlCondition::new("^/admin")?), true);
/// admin.bind_rule(Arc::new(ClickjackRule::default()));
///
/// let request = HttpRequest::new("req-1", "/admin/users");
/// let mut args = RuntimeEventArgs::new(HttpExchange::new(request));
/// admin.forward_event(RuntimeEvent::PostRequestHandlerExecute, &mut args)?;
///
/// assert_eq!(args.exchange().response.header("X-FRAME-OPTIONS"), Some("DENY"));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Context {
    id: ObjectId,
    name: Arc<str>,
    parent: Mutex<Option<ObjectId>>,
    conditions: RwLock<Vec<ContextCondition>>,
    rules: RwLock<Vec<Arc<ContextRule>>>,
    subcontexts: NamedObjectRepository<Arc<Context>>,
    rule_events: RuntimeEventPublisher,
    subcontext_events: RuntimeEventPublisher,
    attached: AtomicBool,
    disposed: AtomicBool,
    logger: Arc<dyn LoggerSink>,
}

impl Context {
    /// Creates a detached context that logs through `tracing`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyId`] for an empty name.
    pub fn new(name: &str) -> Result<Arc<Self>, ConfigError> {
        Self::with_logger(name, Arc::new(TracingLogger))
    }

    /// Creates a detached context whose fault-action failures go to `logger`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyId`] for an empty name.
    pub fn with_logger(name: &str, logger: Arc<dyn LoggerSink>) -> Result<Arc<Self>, ConfigError> {
        if name.is_empty() {
            return Err(ConfigError::EmptyId);
        }
        Ok(Self::build(name, logger))
    }

    pub(crate) fn build(name: &str, logger: Arc<dyn LoggerSink>) -> Arc<Self> {
        Arc::new(Self {
            id: ObjectId::next(),
            name: Arc::from(name),
            parent: Mutex::new(None),
            conditions: RwLock::new(Vec::new()),
            rules: RwLock::new(Vec::new()),
            subcontexts: NamedObjectRepository::new(),
            rule_events: RuntimeEventPublisher::new(),
            subcontext_events: RuntimeEventPublisher::new(),
            attached: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            logger,
        })
    }

    /// The context's identity.
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// The context's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Id of the parent context, if this context is a subcontext.
    pub fn parent_id(&self) -> Option<ObjectId> {
        *self.parent.lock()
    }

    /// Returns true while the context is registered as a root context or as
    /// somebody's subcontext.
    pub fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    /// Returns true if `id` is this context or any context below it.
    pub fn contains(&self, id: ObjectId) -> bool {
        self.id == id || self.subcontexts().iter().any(|child| child.contains(id))
    }

    /// Returns true once [`dispose`](Self::dispose) has run.
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Decides whether this context applies to the current dispatch.
    ///
    /// The decision is cached per dispatch under the context id. Conditions
    /// are checked in binding order and the first mismatch ends the check.
    /// Raw condition results are cached under the condition id, so a
    /// condition shared by several contexts is evaluated once per dispatch.
    pub fn is_match(&self, event: RuntimeEvent, args: &mut RuntimeEventArgs) -> bool {
        if let Some(matched) = args.match_cache.get(&self.id) {
            return matched;
        }

        let conditions = self.conditions.read().clone();
        let mut matched = true;
        for binding in &conditions {
            let condition = binding.condition();
            let value = match args.eval_cache.get(&condition.id()) {
                Some(value) => value,
                None => {
                    let value = condition.evaluate(&ConditionArgs::new(event, args));
                    args.eval_cache.set(condition.id(), value);
                    value
                }
            };
            if !binding.matches(value) {
                matched = false;
                break;
            }
        }

        args.match_cache.set(self.id, matched);
        matched
    }

    /// Appends a condition that must evaluate to `result`.
    pub fn bind_condition(&self, condition: ConditionRef, result: bool) -> ContextCondition {
        let binding = ContextCondition::new(condition, result);
        self.conditions.write().push(binding.clone());
        binding
    }

    /// Removes every binding of `condition`. Returns true if one was removed.
    pub fn unbind_condition(&self, condition: &ConditionRef) -> bool {
        let mut conditions = self.conditions.write();
        let before = conditions.len();
        conditions.retain(|binding| binding.condition().id() != condition.id());
        conditions.len() != before
    }

    /// Snapshot of the bound conditions, in binding order.
    pub fn conditions(&self) -> Vec<ContextCondition> {
        self.conditions.read().clone()
    }

    /// Binds `rule` to this context and returns its wrapper.
    ///
    /// Fault actions are attached to the returned [`ContextRule`].
    pub fn bind_rule(&self, rule: Arc<dyn Rule>) -> Arc<ContextRule> {
        let context_rule = ContextRule::new(rule, Arc::clone(&self.logger));
        self.rule_events.attach(Arc::clone(&context_rule));
        self.rules.write().push(Arc::clone(&context_rule));
        context_rule
    }

    /// Detaches and disposes a bound rule. Returns false if it was not bound here.
    pub fn unbind_rule(&self, context_rule: &ContextRule) -> bool {
        let removed = {
            let mut rules = self.rules.write();
            let before = rules.len();
            rules.retain(|bound| bound.id != context_rule.id);
            rules.len() != before
        };
        if removed {
            context_rule.unsubscribe(&self.rule_events);
            context_rule.dispose();
        }
        removed
    }

    /// Snapshot of the bound rules, in binding order.
    pub fn rules(&self) -> Vec<Arc<ContextRule>> {
        self.rules.read().clone()
    }

    /// Creates a subcontext under a freshly generated unique name.
    pub fn create_subcontext(&self) -> Arc<Context> {
        let logger = Arc::clone(&self.logger);
        let context = self
            .subcontexts
            .register_new_with(|name| Context::build(name, logger));
        self.adopt(&context);
        context
    }

    /// Creates a subcontext named `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyId`] or [`ConfigError::DuplicateId`]; the
    /// subcontext map is left unchanged.
    pub fn create_subcontext_named(&self, name: &str) -> Result<Arc<Context>, ConfigError> {
        let context = Context::with_logger(name, Arc::clone(&self.logger))?;
        self.register_subcontext(name, Arc::clone(&context))?;
        Ok(context)
    }

    /// Registers an existing context as a subcontext under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Cycle`] if `context` is this context or one of
    /// its ancestors, [`ConfigError::AlreadyAttached`] if it already has a
    /// parent or is a root context, and [`ConfigError::EmptyId`] or
    /// [`ConfigError::DuplicateId`] for a bad name. The subcontext map is left
    /// unchanged on error.
    pub fn register_subcontext(
        &self,
        name: &str,
        context: Arc<Context>,
    ) -> Result<(), ConfigError> {
        if context.contains(self.id) {
            return Err(ConfigError::Cycle(context.name().to_string()));
        }
        context.claim_attachment()?;
        if let Err(err) = self.subcontexts.register(name, Arc::clone(&context)) {
            context.release_attachment();
            return Err(err);
        }
        self.adopt(&context);
        Ok(())
    }

    /// Returns the subcontext registered under `name`.
    pub fn lookup_subcontext(&self, name: &str) -> Option<Arc<Context>> {
        self.subcontexts.lookup(name)
    }

    /// Detaches the subcontext registered under `name` and returns it.
    ///
    /// The returned context keeps its rules and subcontexts; it simply no
    /// longer receives events from this context.
    pub fn remove_subcontext(&self, name: &str) -> Option<Arc<Context>> {
        let context = self.subcontexts.revoke(name)?;
        context.unsubscribe(&self.subcontext_events);
        *context.parent.lock() = None;
        context.release_attachment();
        Some(context)
    }

    /// Snapshot of the subcontexts, in registration order.
    pub fn subcontexts(&self) -> Vec<Arc<Context>> {
        self.subcontexts.objects()
    }

    /// Tears down this context and its whole subtree.
    ///
    /// Every rule is unsubscribed and disposed, every subcontext is disposed
    /// recursively, and the context consumes all events from now on.
    pub fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        for context_rule in self.rules.write().drain(..) {
            context_rule.unsubscribe(&self.rule_events);
            context_rule.dispose();
        }
        for (_, context) in self.subcontexts.drain() {
            context.unsubscribe(&self.subcontext_events);
            context.release_attachment();
            context.dispose();
        }
        tracing::debug!(context = %self.name, "context disposed");
    }

    pub(crate) fn claim_attachment(&self) -> Result<(), ConfigError> {
        self.attached
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| ConfigError::AlreadyAttached(self.name.to_string()))
    }

    pub(crate) fn mark_attached(&self) {
        self.attached.store(true, Ordering::Release);
    }

    pub(crate) fn release_attachment(&self) {
        self.attached.store(false, Ordering::Release);
    }

    fn adopt(&self, context: &Arc<Context>) {
        context.mark_attached();
        *context.parent.lock() = Some(self.id);
        self.subcontext_events.attach(Arc::clone(context));
    }

    fn pop_frame(&self, args: &mut RuntimeEventArgs) {
        let top = args.pop_context();
        debug_assert_eq!(
            top.as_ref().map(|frame| frame.id),
            Some(self.id),
            "context stack out of balance"
        );
    }
}

impl RuntimeEventBridge for Context {
    fn subscriber_id(&self) -> ObjectId {
        self.id
    }

    fn publisher(&self) -> &RuntimeEventPublisher {
        &self.rule_events
    }

    fn before_forward(&self, event: RuntimeEvent, args: &mut RuntimeEventArgs) -> Forward {
        if self.is_disposed() {
            return Forward::Consume;
        }
        if !self.is_match(event, args) {
            tracing::trace!(context = %self.name, %event, "context not matched");
            return Forward::Consume;
        }

        tracing::debug!(
            context = %self.name,
            %event,
            request_id = %args.exchange().request.request_id,
            "context matched"
        );
        args.push_context(ContextFrame {
            id: self.id,
            name: Arc::clone(&self.name),
        });
        Forward::Continue
    }

    fn publish_downstream(
        &self,
        event: RuntimeEvent,
        args: &mut RuntimeEventArgs,
    ) -> Result<(), Fault> {
        self.rule_events.publish(event, args)?;
        self.subcontext_events.publish(event, args)
    }

    fn after_forward(&self, _event: RuntimeEvent, args: &mut RuntimeEventArgs) {
        self.pop_frame(args);
    }

    fn forward_fault(
        &self,
        _event: RuntimeEvent,
        args: &mut RuntimeEventArgs,
        _fault: &Fault,
    ) -> bool {
        self.pop_frame(args);
        false
    }
}

impl RuntimeEventListener for Context {
    fn on_event(&self, event: RuntimeEvent, args: &mut RuntimeEventArgs) -> Result<(), Fault> {
        self.forward_event(event, args)
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("conditions", &self.conditions.read().len())
            .field("rules", &self.rules.read().len())
            .field("subcontexts", &self.subcontexts.count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

struct RuleListener {
    rule: Arc<dyn Rule>,
}

impl RuntimeEventListener for RuleListener {
    fn on_event(&self, event: RuntimeEvent, args: &mut RuntimeEventArgs) -> Result<(), Fault> {
        self.rule.execute(event, args)
    }
}

/// A rule bound to a context, together with the actions run when it faults.
pub struct ContextRule {
    id: ObjectId,
    rule: Arc<dyn Rule>,
    fault_actions: RwLock<Vec<Arc<dyn Action>>>,
    rule_events: RuntimeEventPublisher,
    logger: Arc<dyn LoggerSink>,
}

impl ContextRule {
    fn new(rule: Arc<dyn Rule>, logger: Arc<dyn LoggerSink>) -> Arc<Self> {
        let id = ObjectId::next();
        let rule_events = RuntimeEventPublisher::new();
        rule_events.subscribe(
            id,
            rule.events(),
            Arc::new(RuleListener {
                rule: Arc::clone(&rule),
            }),
        );
        Arc::new(Self {
            id,
            rule,
            fault_actions: RwLock::new(Vec::new()),
            rule_events,
            logger,
        })
    }

    /// The wrapper's identity.
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// The wrapped rule.
    pub fn rule(&self) -> &Arc<dyn Rule> {
        &self.rule
    }

    /// Appends an action to the fault chain.
    pub fn add_fault_action(&self, action: Arc<dyn Action>) {
        self.fault_actions.write().push(action);
    }

    /// Appends several actions to the fault chain, in order.
    pub fn extend_fault_actions<I>(&self, actions: I)
    where
        I: IntoIterator<Item = Arc<dyn Action>>,
    {
        self.fault_actions.write().extend(actions);
    }

    /// Removes every fault action.
    pub fn clear_fault_actions(&self) {
        self.fault_actions.write().clear();
    }

    /// Snapshot of the fault chain, in execution order.
    pub fn fault_actions(&self) -> Vec<Arc<dyn Action>> {
        self.fault_actions.read().clone()
    }

    /// Disconnects the wrapped rule. The wrapper forwards nothing afterwards.
    pub fn dispose(&self) {
        self.rule_events.clear();
    }
}

impl RuntimeEventBridge for ContextRule {
    fn subscriber_id(&self) -> ObjectId {
        self.id
    }

    fn publisher(&self) -> &RuntimeEventPublisher {
        &self.rule_events
    }

    /// Runs the fault chain. A failing action is logged and the chain goes on;
    /// the failures are aggregated, logged and recorded on the dispatch
    /// envelope. The fault is always reported as handled.
    fn forward_fault(
        &self,
        event: RuntimeEvent,
        args: &mut RuntimeEventArgs,
        fault: &Fault,
    ) -> bool {
        let rule_name = self.rule.name();
        tracing::warn!(
            rule = rule_name,
            %event,
            request_id = %args.exchange().request.request_id,
            fault = %fault,
            "rule faulted"
        );

        let actions = self.fault_actions();
        let mut failures = Vec::new();
        for action in &actions {
            let mut action_args = ActionArgs::new(&self.rule, fault, args);
            if let Err(err) = action.execute(&mut action_args) {
                tracing::warn!(
                    rule = rule_name,
                    action = action.name(),
                    error = %err,
                    "fault action failed"
                );
                failures.push(err);
            }
        }

        if !failures.is_empty() {
            let chain = ActionChainError::new(rule_name, failures);
            tracing::error!(rule = rule_name, error = %chain, "fault action chain failed");
            self.logger
                .log(LogLevel::Error, LogEventType::Security, &chain.to_string());
            args.record_action_failure(chain);
        }
        true
    }
}

impl RuntimeEventListener for ContextRule {
    fn on_event(&self, event: RuntimeEvent, args: &mut RuntimeEventArgs) -> Result<(), Fault> {
        self.forward_event(event, args)
    }
}

impl fmt::Debug for ContextRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContextRule")
            .field("id", &self.id)
            .field("rule", &self.rule.name())
            .field("fault_actions", &self.fault_actions.read().len())
            .finish()
    }
}
