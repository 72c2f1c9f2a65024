//! Named publish/subscribe event sources with synchronous, ordered delivery.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

pub type SubscriptionId = u64;

type Subscriber<E> = Rc<RefCell<dyn FnMut(f64, &E)>>;

/// An event source owns an ordered list of subscriber callbacks.
///
/// Firing invokes every subscriber synchronously, in connection order, with the current simulated time
/// and the event payload. Subscribers connected while the source is firing are only invoked by later
/// firings.
pub struct EventSource<E: 'static> {
    name: String,
    subscribers: RefCell<Vec<(SubscriptionId, Subscriber<E>)>>,
    next_subscription_id: Cell<SubscriptionId>,
}

impl<E: 'static> EventSource<E> {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            subscribers: RefCell::new(Vec::new()),
            next_subscription_id: Cell::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn connect<F>(&self, handler: F) -> SubscriptionId
    where
        F: FnMut(f64, &E) + 'static,
    {
        let id = self.next_subscription_id.get() + 1;
        self.next_subscription_id.set(id);
        let handler: Subscriber<E> = Rc::new(RefCell::new(handler));
        self.subscribers.borrow_mut().push((id, handler));
        id
    }

    /// Removes the subscriber with the given id. Returns false if there is no such subscriber.
    pub fn disconnect(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.borrow_mut();
        let len = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        subscribers.len() != len
    }

    pub fn disconnect_all(&self) {
        self.subscribers.borrow_mut().clear();
    }

    pub fn num_subscribers(&self) -> usize {
        self.subscribers.borrow().len()
    }

    pub fn fire(&self, time: f64, event: &E) {
        let subscribers: Vec<Subscriber<E>> =
            self.subscribers.borrow().iter().map(|(_, handler)| handler.clone()).collect();
        for handler in subscribers {
            (&mut *handler.borrow_mut())(time, event);
        }
    }
}
