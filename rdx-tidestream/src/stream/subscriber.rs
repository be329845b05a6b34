//! Observers and the subscriber wrapper that enforces the stream contract.

use super::subscription::{Subscription, SubscriptionState, Teardown};
use crate::error::StreamError;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

/// Receives the signals of one stream.
pub trait Observer<T> {
    fn on_next(&mut self, value: T);
    fn on_error(&mut self, error: StreamError);
    fn on_complete(&mut self);
}

/// An observer assembled from three closures.
pub struct FnObserver<N, C, E> {
    next: N,
    complete: C,
    error: E,
}

impl<N, C, E> FnObserver<N, C, E> {
    pub fn new(next: N, complete: C, error: E) -> Self {
        Self {
            next,
            complete,
            error,
        }
    }
}

impl<T, N, C, E> Observer<T> for FnObserver<N, C, E>
where
    N: FnMut(T),
    C: FnMut(),
    E: FnMut(StreamError),
{
    fn on_next(&mut self, value: T) {
        (self.next)(value)
    }

    fn on_error(&mut self, error: StreamError) {
        (self.error)(error)
    }

    fn on_complete(&mut self) {
        (self.complete)()
    }
}

enum Notification<T> {
    Next(T),
    Error(StreamError),
    Complete,
}

/// Stands in for an observer once its stream has ended, so the real one
/// (and whatever state it captured) is freed early.
struct Detached;

impl<T> Observer<T> for Detached {
    fn on_next(&mut self, _value: T) {}
    fn on_error(&mut self, _error: StreamError) {}
    fn on_complete(&mut self) {}
}

struct SubscriberInner<T> {
    observer: RefCell<Box<dyn Observer<T>>>,
    queue: RefCell<VecDeque<Notification<T>>>,
    draining: Cell<bool>,
    subscription: Subscription,
}

/// The producer-facing side of one subscription.
///
/// A `Subscriber` wraps the consumer's observer and guarantees that after a
/// terminal signal, or after cancellation, nothing else reaches it. Signals
/// pushed while the observer is already running (a reentrant call) are queued
/// and delivered, in order, once the current call returns.
pub struct Subscriber<T> {
    inner: Rc<SubscriberInner<T>>,
}

impl<T> Clone for Subscriber<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct DrainGuard<'a>(&'a Cell<bool>);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.set(false);
    }
}

impl<T: 'static> Subscriber<T> {
    pub fn new(observer: impl Observer<T> + 'static) -> Self {
        Self {
            inner: Rc::new(SubscriberInner {
                observer: RefCell::new(Box::new(observer)),
                queue: RefCell::new(VecDeque::new()),
                draining: Cell::new(false),
                subscription: Subscription::new(),
            }),
        }
    }

    pub fn next(&self, value: T) {
        self.deliver(Notification::Next(value));
    }

    pub fn error(&self, error: StreamError) {
        self.deliver(Notification::Error(error));
    }

    pub fn complete(&self) {
        self.deliver(Notification::Complete);
    }

    pub fn is_closed(&self) -> bool {
        self.inner.subscription.is_closed()
    }

    /// Ties a resource to this subscriber's lifetime.
    pub fn add(&self, teardown: impl Into<Teardown>) {
        self.inner.subscription.add(teardown);
    }

    pub fn add_callback(&self, callback: impl FnOnce() + 'static) {
        self.inner.subscription.add_callback(callback);
    }

    /// The consumer-facing handle of this subscription.
    pub fn subscription(&self) -> Subscription {
        self.inner.subscription.clone()
    }

    fn deliver(&self, notification: Notification<T>) {
        if self.is_closed() {
            return;
        }
        self.inner.queue.borrow_mut().push_back(notification);
        if self.inner.draining.replace(true) {
            return;
        }
        let _guard = DrainGuard(&self.inner.draining);

        loop {
            let pending = self.inner.queue.borrow_mut().pop_front();
            let Some(notification) = pending else {
                break;
            };
            if self.is_closed() {
                self.inner.queue.borrow_mut().clear();
                break;
            }
            match notification {
                Notification::Next(value) => self.inner.observer.borrow_mut().on_next(value),
                Notification::Error(error) => {
                    if self.inner.subscription.mark(SubscriptionState::Errored) {
                        self.inner.observer.borrow_mut().on_error(error);
                        self.finish();
                    }
                }
                Notification::Complete => {
                    if self.inner.subscription.mark(SubscriptionState::Completed) {
                        self.inner.observer.borrow_mut().on_complete();
                        self.finish();
                    }
                }
            }
        }
    }

    fn finish(&self) {
        self.inner.subscription.release();
        self.inner.queue.borrow_mut().clear();
        let detached: Box<dyn Observer<T>> = Box::new(Detached);
        let finished = std::mem::replace(&mut *self.inner.observer.borrow_mut(), detached);
        drop(finished);
    }
}

impl<T: 'static> Observer<T> for Subscriber<T> {
    fn on_next(&mut self, value: T) {
        self.next(value);
    }

    fn on_error(&mut self, error: StreamError) {
        self.error(error);
    }

    fn on_complete(&mut self) {
        self.complete();
    }
}
