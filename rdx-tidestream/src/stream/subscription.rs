//! Subscription handles and the resources they own.

use crate::scheduler::CancelToken;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;
use tracing::debug;

/// The lifecycle state of one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Active,
    Completed,
    Errored,
    /// Cancelled by its owner. Not an error: no callback reports it.
    Cancelled,
}

/// A resource released when a subscription ends.
pub enum Teardown {
    Callback(Box<dyn FnOnce()>),
    Timer(CancelToken),
    Inner(Subscription),
}

impl Teardown {
    fn release(self) {
        match self {
            Teardown::Callback(callback) => callback(),
            Teardown::Timer(token) => {
                token.cancel();
            }
            Teardown::Inner(subscription) => subscription.unsubscribe(),
        }
    }
}

impl From<CancelToken> for Teardown {
    fn from(token: CancelToken) -> Self {
        Teardown::Timer(token)
    }
}

impl From<Subscription> for Teardown {
    fn from(subscription: Subscription) -> Self {
        Teardown::Inner(subscription)
    }
}

struct SubscriptionInner {
    state: Cell<SubscriptionState>,
    teardowns: RefCell<Vec<Teardown>>,
}

/// One subscriber's attachment to a stream.
///
/// The handle owns every resource the attachment uses: scheduler timers,
/// upstream subscriptions and inner subscriptions of flattened streams.
/// `unsubscribe` releases all of them synchronously, so nothing is emitted
/// once it returns. Clones refer to the same attachment.
#[derive(Clone)]
pub struct Subscription {
    inner: Rc<SubscriptionInner>,
}

impl Subscription {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(SubscriptionInner {
                state: Cell::new(SubscriptionState::Active),
                teardowns: RefCell::new(Vec::new()),
            }),
        }
    }

    /// A subscription that owns nothing and has already ended.
    pub fn closed() -> Self {
        let subscription = Self::new();
        subscription.inner.state.set(SubscriptionState::Completed);
        subscription
    }

    pub fn state(&self) -> SubscriptionState {
        self.inner.state.get()
    }

    pub fn is_closed(&self) -> bool {
        self.state() != SubscriptionState::Active
    }

    /// Attaches a resource. If the subscription has already ended, the
    /// resource is released immediately.
    pub fn add(&self, teardown: impl Into<Teardown>) {
        let teardown = teardown.into();
        if let Teardown::Inner(inner) = &teardown {
            if Rc::ptr_eq(&inner.inner, &self.inner) {
                return;
            }
        }
        if self.is_closed() {
            teardown.release();
            return;
        }
        let mut teardowns = self.inner.teardowns.borrow_mut();
        // Finished inner subscriptions hold nothing; dropping them keeps
        // long-lived flattening operators from accumulating handles.
        teardowns.retain(|t| !matches!(t, Teardown::Inner(s) if s.is_closed()));
        if let Teardown::Inner(inner) = &teardown {
            let held = teardowns
                .iter()
                .any(|t| matches!(t, Teardown::Inner(s) if Rc::ptr_eq(&s.inner, &inner.inner)));
            if held {
                return;
            }
        }
        teardowns.push(teardown);
    }

    /// Adds a closure run when the subscription ends.
    pub fn add_callback(&self, callback: impl FnOnce() + 'static) {
        self.add(Teardown::Callback(Box::new(callback)));
    }

    /// Cancels the subscription and releases everything it owns.
    ///
    /// A no-op once the subscription has ended for any reason.
    pub fn unsubscribe(&self) {
        if self.mark(SubscriptionState::Cancelled) {
            debug!("subscription cancelled");
            self.release();
        }
    }

    /// Moves an active subscription into `state`. Returns `false` if it had
    /// already ended.
    pub(crate) fn mark(&self, state: SubscriptionState) -> bool {
        if self.is_closed() {
            return false;
        }
        self.inner.state.set(state);
        true
    }

    pub(crate) fn release(&self) {
        let teardowns = std::mem::take(&mut *self.inner.teardowns.borrow_mut());
        for teardown in teardowns {
            teardown.release();
        }
    }
}

impl Default for Subscription {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("state", &self.state())
            .field("resources", &self.inner.teardowns.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsubscribe_releases_resources_once() {
        let released = Rc::new(Cell::new(0));
        let subscription = Subscription::new();
        let counter = released.clone();
        subscription.add_callback(move || counter.set(counter.get() + 1));

        subscription.unsubscribe();
        subscription.unsubscribe();
        assert_eq!(released.get(), 1);
        assert_eq!(subscription.state(), SubscriptionState::Cancelled);
    }

    #[test]
    fn adding_to_a_closed_subscription_releases_immediately() {
        let released = Rc::new(Cell::new(false));
        let subscription = Subscription::closed();
        let flag = released.clone();
        subscription.add_callback(move || flag.set(true));
        assert!(released.get());
    }

    #[test]
    fn cancelling_after_completion_keeps_the_terminal_state() {
        let subscription = Subscription::new();
        assert!(subscription.mark(SubscriptionState::Completed));
        subscription.release();
        subscription.unsubscribe();
        assert_eq!(subscription.state(), SubscriptionState::Completed);
    }

    #[test]
    fn nested_subscriptions_cascade() {
        let parent = Subscription::new();
        let child = Subscription::new();
        parent.add(child.clone());
        parent.unsubscribe();
        assert_eq!(child.state(), SubscriptionState::Cancelled);
    }
}
