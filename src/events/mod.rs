//! Synchronous in-process event bus.
//!
//! Handlers run in registration order, each emission completes its own
//! handler list before returning, and a failing handler never aborts its
//! siblings or the mutation that triggered the emission. Subscriptions are
//! identified by a `SubscriptionId` returned from `on` (closures have no
//! identity to compare against, so the id stands in for the handler).
//!
//! Re-entrancy: handlers may call `on`, `off`, and `emit` on the same bus.
//! Nested emissions run depth-first. A handler that is already executing is
//! skipped by a nested emission rather than re-entered.

use log::warn;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use crate::shared::{EventKind, GameEvent};

/// What a handler returns. An `Err` is logged and contained; it never
/// propagates to the emitting mutation.
pub type HandlerResult = Result<(), String>;

type Handler = Rc<RefCell<dyn FnMut(&GameEvent) -> HandlerResult>>;

/// Opaque handle for removing a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscription {
    id: SubscriptionId,
    handler: Handler,
}

/// Minimal synchronous publish/subscribe registry keyed by event kind.
///
/// Single-threaded by design: interior mutability keeps `emit` callable
/// while the store mutation that publishes is still on the stack.
#[derive(Default)]
pub struct EventBus {
    subscribers: RefCell<HashMap<EventKind, Vec<Subscription>>>,
    next_id: Cell<u64>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `kind`. Handlers for one kind run in the
    /// order they were registered.
    pub fn on<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: FnMut(&GameEvent) -> HandlerResult + 'static,
    {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(self.next_id.get() + 1);
        self.subscribers
            .borrow_mut()
            .entry(kind)
            .or_default()
            .push(Subscription {
                id,
                handler: Rc::new(RefCell::new(handler)),
            });
        id
    }

    /// Removes the registration with the given id. Returns whether anything
    /// was removed. Safe to call from inside a handler.
    pub fn off(&self, kind: EventKind, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.borrow_mut();
        let Some(list) = subscribers.get_mut(&kind) else {
            return false;
        };
        let before = list.len();
        if let Some(pos) = list.iter().position(|s| s.id == id) {
            list.remove(pos);
        }
        list.len() != before
    }

    /// Invokes every handler currently registered for the event's kind.
    ///
    /// The subscriber list is snapshotted up front; handlers unregistered
    /// mid-dispatch are skipped, handlers registered mid-dispatch wait for
    /// the next emission.
    pub fn emit(&self, event: &GameEvent) {
        let kind = event.kind();
        let snapshot: Vec<(SubscriptionId, Handler)> = {
            let subscribers = self.subscribers.borrow();
            match subscribers.get(&kind) {
                Some(list) => list
                    .iter()
                    .map(|s| (s.id, Rc::clone(&s.handler)))
                    .collect(),
                None => return,
            }
        };

        for (id, handler) in snapshot {
            if !self.is_registered(kind, id) {
                continue;
            }
            // A handler already on the stack (nested emission) is skipped,
            // not re-entered.
            let Ok(mut handler) = handler.try_borrow_mut() else {
                warn!(
                    "[EventBus] Skipping re-entrant handler {:?} for {:?}",
                    id, kind
                );
                continue;
            };
            if let Err(e) = handler(event) {
                warn!("[EventBus] Handler {:?} for {:?} failed: {}", id, kind, e);
            }
        }
    }

    /// Number of handlers currently registered for `kind`.
    pub fn subscriber_count(&self, kind: EventKind) -> usize {
        self.subscribers
            .borrow()
            .get(&kind)
            .map(|list| list.len())
            .unwrap_or(0)
    }

    fn is_registered(&self, kind: EventKind, id: SubscriptionId) -> bool {
        self.subscribers
            .borrow()
            .get(&kind)
            .map(|list| list.iter().any(|s| s.id == id))
            .unwrap_or(false)
    }
}
