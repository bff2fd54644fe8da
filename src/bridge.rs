//! Publish/subscribe backbone of the runtime.
//!
//! A [`RuntimeEventPublisher`] holds an ordered list of `(owner, event,
//! listener)` subscriptions. A [`RuntimeEventBridge`] is a component that
//! consumes events from an upstream publisher and republishes them to its own
//! downstream publisher, with hooks before forwarding, after forwarding and on
//! fault. The runtime, every context and every context rule are bridges.
//!
//! ```text
//! platform publisher
//!   -> Runtime (bridge)
//!        -> Context (bridge: gates on conditions, pushes/pops the stack)
//!             -> ContextRule (bridge: turns faults into fault actions)
//!                  -> Rule
//!             -> SubContext (bridge) -> ...
//! ```

use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::Fault;
use crate::event::{RuntimeEvent, RuntimeEventArgs};
use crate::id::ObjectId;

/// Receiver of runtime events.
pub trait RuntimeEventListener: Send + Sync {
    /// Handles one event.
    ///
    /// # Errors
    ///
    /// A returned fault stops the publisher's remaining listeners for this
    /// event and propagates to whoever published it.
    fn on_event(&self, event: RuntimeEvent, args: &mut RuntimeEventArgs) -> Result<(), Fault>;
}

impl<F> RuntimeEventListener for F
where
    F: Fn(RuntimeEvent, &mut RuntimeEventArgs) -> Result<(), Fault> + Send + Sync,
{
    fn on_event(&self, event: RuntimeEvent, args: &mut RuntimeEventArgs) -> Result<(), Fault> {
        self(event, args)
    }
}

struct Subscription {
    owner: ObjectId,
    event: RuntimeEvent,
    listener: Arc<dyn RuntimeEventListener>,
}

/// Ordered listener registry.
///
/// Subscriptions are keyed by owner id: subscribing an owner twice to the
/// same event is a no-op, and [`unsubscribe`](Self::unsubscribe) removes by
/// owner, never by listener equality.
#[derive(Default)]
pub struct RuntimeEventPublisher {
    subscriptions: RwLock<Vec<Subscription>>,
}

impl RuntimeEventPublisher {
    /// Creates a publisher with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes `listener` on behalf of `owner` to each of `events`.
    ///
    /// Returns the number of subscriptions actually added.
    pub fn subscribe(
        &self,
        owner: ObjectId,
        events: &[RuntimeEvent],
        listener: Arc<dyn RuntimeEventListener>,
    ) -> usize {
        let mut subscriptions = self.subscriptions.write();
        let mut added = 0;
        for &event in events {
            let exists = subscriptions
                .iter()
                .any(|s| s.owner == owner && s.event == event);
            if !exists {
                subscriptions.push(Subscription {
                    owner,
                    event,
                    listener: Arc::clone(&listener),
                });
                added += 1;
            }
        }
        added
    }

    /// Subscribes a bridge to both runtime events under its own id.
    pub fn attach<B>(&self, bridge: Arc<B>) -> usize
    where
        B: RuntimeEventBridge + RuntimeEventListener + 'static,
    {
        let owner = bridge.subscriber_id();
        self.subscribe(owner, &RuntimeEvent::ALL, bridge)
    }

    /// Removes every subscription held by `owner`.
    ///
    /// Returns the number removed; zero if `owner` never subscribed.
    pub fn unsubscribe(&self, owner: ObjectId) -> usize {
        let mut subscriptions = self.subscriptions.write();
        let before = subscriptions.len();
        subscriptions.retain(|s| s.owner != owner);
        before - subscriptions.len()
    }

    /// Removes every subscription.
    pub fn clear(&self) -> usize {
        let mut subscriptions = self.subscriptions.write();
        let removed = subscriptions.len();
        subscriptions.clear();
        removed
    }

    /// Returns true if `owner` holds at least one subscription.
    pub fn is_subscribed(&self, owner: ObjectId) -> bool {
        self.subscriptions.read().iter().any(|s| s.owner == owner)
    }

    /// Returns the number of listeners for `event`.
    pub fn listener_count(&self, event: RuntimeEvent) -> usize {
        self.subscriptions
            .read()
            .iter()
            .filter(|s| s.event == event)
            .count()
    }

    /// Delivers `event` to its listeners in subscription order.
    ///
    /// The listener list is snapshotted first, so listeners may subscribe or
    /// unsubscribe while being notified without deadlocking.
    ///
    /// # Errors
    ///
    /// Stops at and returns the first fault a listener reports.
    pub fn publish(&self, event: RuntimeEvent, args: &mut RuntimeEventArgs) -> Result<(), Fault> {
        let listeners: Vec<Arc<dyn RuntimeEventListener>> = self
            .subscriptions
            .read()
            .iter()
            .filter(|s| s.event == event)
            .map(|s| Arc::clone(&s.listener))
            .collect();

        for listener in listeners {
            listener.on_event(event, args)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for RuntimeEventPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let subscriptions = self.subscriptions.read();
        f.debug_struct("RuntimeEventPublisher")
            .field("subscriptions", &subscriptions.len())
            .finish()
    }
}

/// Decision returned by [`RuntimeEventBridge::before_forward`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Forward {
    /// Republish the event downstream
    Continue,
    /// Swallow the event; downstream listeners never see it
    Consume,
}

/// A component that republishes upstream events to its own listeners.
pub trait RuntimeEventBridge: Send + Sync {
    /// Identity used as the owner key of this bridge's subscriptions.
    fn subscriber_id(&self) -> ObjectId;

    /// The downstream publisher.
    fn publisher(&self) -> &RuntimeEventPublisher;

    /// Runs before forwarding.
    fn before_forward(&self, _event: RuntimeEvent, _args: &mut RuntimeEventArgs) -> Forward {
        Forward::Continue
    }

    /// Runs after downstream listeners completed without a fault.
    fn after_forward(&self, _event: RuntimeEvent, _args: &mut RuntimeEventArgs) {}

    /// Runs when a downstream listener faulted.
    ///
    /// Returns true if the fault was handled and must not propagate.
    fn forward_fault(
        &self,
        _event: RuntimeEvent,
        _args: &mut RuntimeEventArgs,
        _fault: &Fault,
    ) -> bool {
        false
    }

    /// Delivers an event to every downstream listener.
    ///
    /// Defaults to [`publisher`](Self::publisher). Bridges with more than one
    /// downstream stage override this to fix the order between stages.
    fn publish_downstream(
        &self,
        event: RuntimeEvent,
        args: &mut RuntimeEventArgs,
    ) -> Result<(), Fault> {
        self.publisher().publish(event, args)
    }

    /// Forwards one event through the hooks to the downstream listeners.
    ///
    /// # Errors
    ///
    /// Returns a downstream fault that [`forward_fault`](Self::forward_fault)
    /// did not handle.
    fn forward_event(&self, event: RuntimeEvent, args: &mut RuntimeEventArgs) -> Result<(), Fault> {
        if self.before_forward(event, args) == Forward::Consume {
            return Ok(());
        }

        match self.publish_downstream(event, args) {
            Ok(()) => {
                self.after_forward(event, args);
                Ok(())
            }
            Err(fault) => {
                if self.forward_fault(event, args, &fault) {
                    Ok(())
                } else {
                    Err(fault)
                }
            }
        }
    }

    /// Detaches this bridge from `publisher`. Safe to call when not subscribed.
    fn unsubscribe(&self, publisher: &RuntimeEventPublisher) -> bool {
        publisher.unsubscribe(self.subscriber_id()) > 0
    }
}
