/*!

A lightweight publish/subscribe channel for clause lifecycle notifications. Containers
expose one [`ClauseEvent`] per transition kind (`added`, `removed`, `selected`);
subscribers are indices, statistics aggregators, or output trackers.

Subscribing returns a [`SubscriptionData`]: an RAII handle that removes the handler when
dropped, so a subscriber that goes away can never be called on a dangling clause.
Handlers fire in subscription order. A handler may re-enter the container (and thereby
this event) while the event is firing; the one thing it cannot do is run *itself*
recursively. A handler that is already on the call stack is skipped.

*/

use std::rc::{Rc, Weak};

use crate::{
  abstractions::RcCell,
  api::clause::RcClause,
};

pub type ClauseCallback = Box<dyn FnMut(&RcClause)>;

struct Handler {
  id      : u64,
  /// Taken out of the slot while the handler runs, which is what makes re-entrant
  /// firing safe and self-recursion a no-op.
  callback: Option<ClauseCallback>,
}

#[derive(Default)]
struct EventInner {
  handlers: Vec<Handler>,
  next_id : u64,
}

/// One clause lifecycle event of a container.
#[derive(Default)]
pub struct ClauseEvent {
  inner: RcCell<EventInner>,
}

impl ClauseEvent {
  pub fn new() -> ClauseEvent {
    ClauseEvent::default()
  }

  /// Registers `callback`; it fires after all earlier subscribers. Dropping the
  /// returned handle unsubscribes.
  #[must_use = "dropping the SubscriptionData immediately unsubscribes the handler"]
  pub fn subscribe(&self, callback: ClauseCallback) -> SubscriptionData {
    let mut inner = self.inner.borrow_mut();
    let id = inner.next_id;
    inner.next_id += 1;
    inner.handlers.push(Handler { id, callback: Some(callback) });
    SubscriptionData { event: Rc::downgrade(&self.inner), id }
  }

  pub fn subscriber_count(&self) -> usize {
    self.inner.borrow().handlers.len()
  }

  /// Calls every subscriber with `clause`, in subscription order.
  pub fn fire(&self, clause: &RcClause) {
    let ids: Vec<u64> = self.inner.borrow().handlers.iter().map(|h| h.id).collect();

    for id in ids {
      let taken = {
        let mut inner = self.inner.borrow_mut();
        match inner.handlers.iter_mut().find(|h| h.id == id) {
          Some(handler) => handler.callback.take(),
          // Unsubscribed by an earlier handler during this very fire.
          None => None,
        }
      };

      if let Some(mut callback) = taken {
        callback(clause);
        let mut inner = self.inner.borrow_mut();
        if let Some(handler) = inner.handlers.iter_mut().find(|h| h.id == id) {
          handler.callback = Some(callback);
        }
      }
    }
  }
}

/// Owns the removal of one subscription; dropping it unsubscribes.
pub struct SubscriptionData {
  event: Weak<std::cell::RefCell<EventInner>>,
  id   : u64,
}

impl Drop for SubscriptionData {
  fn drop(&mut self) {
    if let Some(inner) = self.event.upgrade() {
      let mut inner = inner.borrow_mut();
      if let Some(position) = inner.handlers.iter().position(|h| h.id == self.id) {
        inner.handlers.remove(position);
      }
    }
  }
}
