//! Responses to rule faults.
//!
//! When a rule faults, its [`ContextRule`](crate::ContextRule) runs the bound
//! actions in order with an [`ActionArgs`] describing the fault. An action
//! that fails is logged and the chain continues.

mod account;
mod block;
mod log;
mod redirect;

use std::fmt;
use std::sync::Arc;

pub use account::{AccountStore, DisableAccountAction, SignOutAction};
pub use block::BlockAction;
pub use log::LogAction;
pub use redirect::{RedirectAction, TransferAction};

use crate::error::{ActionError, Fault};
use crate::event::RuntimeEventArgs;
use crate::request::HttpExchange;
use crate::rule::Rule;

/// Arguments passed to [`Action::execute`].
pub struct ActionArgs<'a> {
    faulting_rule: &'a Arc<dyn Rule>,
    fault: &'a Fault,
    runtime_args: &'a mut RuntimeEventArgs,
}

impl<'a> ActionArgs<'a> {
    /// Bundles the fault with the dispatch envelope it occurred in.
    pub fn new(
        faulting_rule: &'a Arc<dyn Rule>,
        fault: &'a Fault,
        runtime_args: &'a mut RuntimeEventArgs,
    ) -> Self {
        Self {
            faulting_rule,
            fault,
            runtime_args,
        }
    }

    /// The rule that faulted.
    pub fn faulting_rule(&self) -> &Arc<dyn Rule> {
        self.faulting_rule
    }

    /// The fault being handled.
    pub fn fault(&self) -> &Fault {
        self.fault
    }

    /// The dispatch envelope.
    pub fn runtime_args(&self) -> &RuntimeEventArgs {
        self.runtime_args
    }

    /// The dispatch envelope, for mutation.
    pub fn runtime_args_mut(&mut self) -> &mut RuntimeEventArgs {
        self.runtime_args
    }

    /// Shortcut for the exchange being processed.
    pub fn exchange_mut(&mut self) -> &mut HttpExchange {
        self.runtime_args.exchange_mut()
    }
}

impl fmt::Debug for ActionArgs<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionArgs")
            .field("faulting_rule", &self.faulting_rule.name())
            .field("fault", &self.fault)
            .finish_non_exhaustive()
    }
}

/// A reaction to a rule fault.
pub trait Action: Send + Sync {
    /// Name used in logs and in [`ActionError`].
    fn name(&self) -> &str;

    /// Runs the action.
    ///
    /// # Errors
    ///
    /// Returns an [`ActionError`] if the action could not be applied. The
    /// remaining actions of the chain still run.
    fn execute(&self, args: &mut ActionArgs<'_>) -> Result<(), ActionError>;
}

type ActionFn = dyn Fn(&mut ActionArgs<'_>) -> Result<(), ActionError> + Send + Sync;

/// An action backed by a closure.
pub struct CustomAction {
    name: String,
    handler: Box<ActionFn>,
}

impl CustomAction {
    /// Creates an action named `name` that runs `handler`.
    pub fn new<F>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut ActionArgs<'_>) -> Result<(), ActionError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            handler: Box::new(handler),
        }
    }
}

impl Action for CustomAction {
    fn name(&self) -> &str {
        &self.name
    }

    fn execute(&self, args: &mut ActionArgs<'_>) -> Result<(), ActionError> {
        (self.handler)(args)
    }
}

impl fmt::Debug for CustomAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomAction").field("name", &self.name).finish()
    }
}
