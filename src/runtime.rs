//! The runtime root.

use std::fmt;
use std::sync::Arc;

use crate::action::Action;
use crate::bridge::{RuntimeEventBridge, RuntimeEventListener, RuntimeEventPublisher};
use crate::condition::ConditionRef;
use crate::config::{ContextConfig, RuntimeConfig};
use crate::context::Context;
use crate::error::{ConfigError, Fault};
use crate::event::{RuntimeEvent, RuntimeEventArgs};
use crate::id::ObjectId;
use crate::logging::{LoggerSink, TracingLogger};
use crate::repository::{NamedObjectRepository, ObjectRepository};
use crate::request::HttpExchange;
use crate::rule::Rule;

/// Registries of shared runtime objects plus the root contexts.
///
/// Platform events reach the runtime either through an upstream publisher it
/// is [subscribed](Runtime::subscribe) to, or directly through
/// [`dispatch`](Runtime::dispatch). Either way every root context receives
/// the event in registration order, sharing one [`RuntimeEventArgs`].
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use esapi_core::{
///     BlockAction, CustomRule, Fault, HttpExchange, HttpRequest, Runtime, RuntimeEvent,
/// };
///
/// let runtime = Runtime::new();
/// let context = runtime.create_context_named("everything")?;
/// let rule = context.bind_rule(Arc::new(CustomRule::new(
///     "deny",
///     &[RuntimeEvent::PreRequestHandlerExecute],
///     |_, _| Err(Fault::intrusion("Access denied", "deny rule fired")),
/// )));
/// rule.add_fault_action(Arc::new(BlockAction::default()));
///
/// let exchange = HttpExchange::new(HttpRequest::new("req-1", "/"));
/// let args = runtime.dispatch(RuntimeEvent::PreRequestHandlerExecute, exchange)?;
/// assert_eq!(args.exchange().response.status(), 403);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub struct Runtime {
    id: ObjectId,
    conditions: NamedObjectRepository<ConditionRef>,
    actions: NamedObjectRepository<Arc<dyn Action>>,
    rules: NamedObjectRepository<Arc<dyn Rule>>,
    contexts: NamedObjectRepository<Arc<Context>>,
    publisher: RuntimeEventPublisher,
    logger: Arc<dyn LoggerSink>,
}

impl Runtime {
    /// Creates an empty runtime that logs through `tracing`.
    pub fn new() -> Self {
        Self::with_logger(Arc::new(TracingLogger))
    }

    /// Creates an empty runtime whose contexts log security events to `logger`.
    pub fn with_logger(logger: Arc<dyn LoggerSink>) -> Self {
        Self {
            id: ObjectId::next(),
            conditions: NamedObjectRepository::new(),
            actions: NamedObjectRepository::new(),
            rules: NamedObjectRepository::new(),
            contexts: NamedObjectRepository::new(),
            publisher: RuntimeEventPublisher::new(),
            logger,
        }
    }

    /// Registry of shared conditions.
    pub fn conditions(&self) -> &NamedObjectRepository<ConditionRef> {
        &self.conditions
    }

    /// Registry of shared fault actions.
    pub fn actions(&self) -> &NamedObjectRepository<Arc<dyn Action>> {
        &self.actions
    }

    /// Registry of shared rules.
    pub fn rules(&self) -> &NamedObjectRepository<Arc<dyn Rule>> {
        &self.rules
    }

    /// Creates a root context under a freshly generated unique name.
    pub fn create_context(&self) -> Arc<Context> {
        let logger = Arc::clone(&self.logger);
        let context = self
            .contexts
            .register_new_with(|name| Context::build(name, logger));
        context.mark_attached();
        self.publisher.attach(Arc::clone(&context));
        context
    }

    /// Creates a root context named `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EmptyId`] or [`ConfigError::DuplicateId`]; the
    /// root map is left unchanged.
    pub fn create_context_named(&self, name: &str) -> Result<Arc<Context>, ConfigError> {
        let context = Context::with_logger(name, Arc::clone(&self.logger))?;
        self.register_context(name, Arc::clone(&context))?;
        Ok(context)
    }

    /// Registers an existing context as a root context under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::AlreadyAttached`] if `context` is already a
    /// root or a subcontext, and [`ConfigError::EmptyId`] or
    /// [`ConfigError::DuplicateId`] for a bad name. The root map is left
    /// unchanged on error.
    pub fn register_context(&self, name: &str, context: Arc<Context>) -> Result<(), ConfigError> {
        context.claim_attachment()?;
        if let Err(err) = self.contexts.register(name, Arc::clone(&context)) {
            context.release_attachment();
            return Err(err);
        }
        self.publisher.attach(context);
        Ok(())
    }

    /// Returns the root context registered under `name`.
    pub fn lookup_context(&self, name: &str) -> Option<Arc<Context>> {
        self.contexts.lookup(name)
    }

    /// Detaches the root context registered under `name` and returns it.
    ///
    /// The context itself is not disposed.
    pub fn remove_context(&self, name: &str) -> Option<Arc<Context>> {
        let context = self.contexts.revoke(name)?;
        context.unsubscribe(&self.publisher);
        context.release_attachment();
        Some(context)
    }

    /// Snapshot of the root contexts, in registration order.
    pub fn contexts(&self) -> Vec<Arc<Context>> {
        self.contexts.objects()
    }

    /// Attaches the runtime to a platform event source.
    pub fn subscribe(self: &Arc<Self>, upstream: &RuntimeEventPublisher) -> usize {
        upstream.attach(Arc::clone(self))
    }

    /// Detaches the runtime from a platform event source.
    pub fn unsubscribe(&self, upstream: &RuntimeEventPublisher) -> bool {
        RuntimeEventBridge::unsubscribe(self, upstream)
    }

    /// Publishes `event` to the root contexts.
    ///
    /// # Errors
    ///
    /// Returns a fault no context rule handled. Faults raised by bound rules
    /// are always handled by their fault chains.
    pub fn publish(&self, event: RuntimeEvent, args: &mut RuntimeEventArgs) -> Result<(), Fault> {
        self.forward_event(event, args)
    }

    /// Runs one dispatch of `event` over `exchange` with a fresh envelope.
    ///
    /// # Errors
    ///
    /// See [`publish`](Self::publish).
    pub fn dispatch(
        &self,
        event: RuntimeEvent,
        exchange: HttpExchange,
    ) -> Result<RuntimeEventArgs, Fault> {
        let mut args = RuntimeEventArgs::new(exchange);
        self.publish(event, &mut args)?;
        Ok(args)
    }

    /// Builds the context trees described by `config`.
    ///
    /// Each root context is resolved completely against the registries before
    /// anything is created for it, so an unknown reference leaves no partial
    /// context behind. Roots listed before a failing one stay registered.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownReference`] for a name missing from the
    /// registries and [`ConfigError::DuplicateId`] for a name already in use.
    pub fn configure(&self, config: &RuntimeConfig) -> Result<Vec<Arc<Context>>, ConfigError> {
        let mut created = Vec::with_capacity(config.contexts.len());
        for context_config in &config.contexts {
            if let Some(name) = &context_config.name {
                if self.contexts.contains(name) {
                    return Err(ConfigError::DuplicateId(name.clone()));
                }
            }
            let resolved = self.resolve(context_config)?;
            let context = match &resolved.name {
                Some(name) => self.create_context_named(name)?,
                None => self.create_context(),
            };
            resolved.populate(&context)?;
            created.push(context);
        }
        Ok(created)
    }

    /// Unsubscribes and disposes every root context.
    pub fn dispose(&self) {
        for (_, context) in self.contexts.drain() {
            context.unsubscribe(&self.publisher);
            context.release_attachment();
            context.dispose();
        }
        self.publisher.clear();
    }

    fn resolve(&self, config: &ContextConfig) -> Result<ResolvedContext, ConfigError> {
        if config.name.as_deref() == Some("") {
            return Err(ConfigError::EmptyId);
        }

        let conditions = config
            .conditions
            .iter()
            .map(|binding| {
                let condition = self
                    .conditions
                    .lookup(&binding.condition)
                    .ok_or_else(|| unknown("condition", &binding.condition))?;
                Ok((condition, binding.result))
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let rules = config
            .rules
            .iter()
            .map(|binding| {
                let rule = self
                    .rules
                    .lookup(&binding.rule)
                    .ok_or_else(|| unknown("rule", &binding.rule))?;
                let actions = binding
                    .fault_actions
                    .iter()
                    .map(|name| self.actions.lookup(name).ok_or_else(|| unknown("action", name)))
                    .collect::<Result<Vec<_>, ConfigError>>()?;
                Ok((rule, actions))
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let mut seen = Vec::new();
        let mut subcontexts = Vec::with_capacity(config.subcontexts.len());
        for sub in &config.subcontexts {
            if let Some(name) = &sub.name {
                if seen.contains(&name) {
                    return Err(ConfigError::DuplicateId(name.clone()));
                }
                seen.push(name);
            }
            subcontexts.push(self.resolve(sub)?);
        }

        Ok(ResolvedContext {
            name: config.name.clone(),
            conditions,
            rules,
            subcontexts,
        })
    }
}

fn unknown(kind: &'static str, name: &str) -> ConfigError {
    ConfigError::UnknownReference {
        kind,
        name: name.to_string(),
    }
}

struct ResolvedContext {
    name: Option<String>,
    conditions: Vec<(ConditionRef, bool)>,
    rules: Vec<(Arc<dyn Rule>, Vec<Arc<dyn Action>>)>,
    subcontexts: Vec<ResolvedContext>,
}

impl ResolvedContext {
    fn populate(self, context: &Context) -> Result<(), ConfigError> {
        for (condition, result) in self.conditions {
            context.bind_condition(condition, result);
        }
        for (rule, actions) in self.rules {
            context.bind_rule(rule).extend_fault_actions(actions);
        }
        for sub in self.subcontexts {
            let child = match &sub.name {
                Some(name) => context.create_subcontext_named(name)?,
                None => context.create_subcontext(),
            };
            sub.populate(&child)?;
        }
        Ok(())
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl RuntimeEventBridge for Runtime {
    fn subscriber_id(&self) -> ObjectId {
        self.id
    }

    fn publisher(&self) -> &RuntimeEventPublisher {
        &self.publisher
    }
}

impl RuntimeEventListener for Runtime {
    fn on_event(&self, event: RuntimeEvent, args: &mut RuntimeEventArgs) -> Result<(), Fault> {
        tracing::debug!(
            %event,
            request_id = %args.exchange().request.request_id,
            "dispatching runtime event"
        );
        self.forward_event(event, args)
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("id", &self.id)
            .field("conditions", &self.conditions.count())
            .field("actions", &self.actions.count())
            .field("rules", &self.rules.count())
            .field("contexts", &self.contexts.ids())
            .finish()
    }
}
