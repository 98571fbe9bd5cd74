//! Observer lists for store and controller notifications.

use std::fmt;

/// Handle returned by [`Subscribers::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler<E> = Box<dyn FnMut(&E) + Send + Sync>;

/// An ordered list of event handlers.
///
/// Handlers run synchronously in subscription order. A handler must not call
/// back into the object that owns the list; enqueue work instead.
pub struct Subscribers<E> {
    next_id: u64,
    handlers: Vec<(SubscriptionId, Handler<E>)>,
}

impl<E> Subscribers<E> {
    /// Create an empty list.
    pub fn new() -> Self {
        Self {
            next_id: 0,
            handlers: Vec::new(),
        }
    }

    /// Register a handler.
    pub fn subscribe(&mut self, handler: impl FnMut(&E) + Send + Sync + 'static) -> SubscriptionId {
        self.next_id = self.next_id.wrapping_add(1);
        let id = SubscriptionId(self.next_id);
        self.handlers.push((id, Box::new(handler)));
        id
    }

    /// Remove a handler. Returns false if the id was unknown.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(existing, _)| *existing != id);
        self.handlers.len() != before
    }

    /// Deliver an event to every handler.
    pub fn emit(&mut self, event: &E) {
        for (_, handler) in &mut self.handlers {
            handler(event);
        }
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Check whether no handler is registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl<E> Default for Subscribers<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for Subscribers<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscribers")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn handlers_run_in_order_and_unsubscribe() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut subs = Subscribers::<u32>::new();
        let a = {
            let seen = Arc::clone(&seen);
            subs.subscribe(move |v| seen.lock().unwrap().push(("a", *v)))
        };
        {
            let seen = Arc::clone(&seen);
            subs.subscribe(move |v| seen.lock().unwrap().push(("b", *v)));
        }
        subs.emit(&1);
        assert!(subs.unsubscribe(a));
        assert!(!subs.unsubscribe(a));
        subs.emit(&2);
        assert_eq!(*seen.lock().unwrap(), vec![("a", 1), ("b", 1), ("b", 2)]);
        assert_eq!(subs.len(), 1);
    }
}
