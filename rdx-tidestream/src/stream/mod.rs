//! The push-based `Stream` abstraction.
//!
//! A `Stream<T>` is a recipe for producing values: nothing happens until it is
//! subscribed, and every subscription runs the recipe again (unicast). Hot,
//! shared sources are modelled with a `Subject`, whose `as_stream` view
//! multicasts. Every stream delivers any number of values followed by at most
//! one terminal signal, `complete` or `error`.

pub mod subject;
pub mod subscriber;
pub mod subscription;

pub use subject::Subject;
pub use subscriber::{FnObserver, Observer, Subscriber};
pub use subscription::{Subscription, SubscriptionState, Teardown};

use crate::error::StreamError;
use std::fmt;
use std::rc::Rc;
use tracing::warn;

type Producer<T> = dyn Fn(Subscriber<T>) -> Subscription;

/// A handle to a (possibly infinite) sequence of values of type `T`.
///
/// Cloning a stream clones the handle, not the values.
pub struct Stream<T> {
    producer: Rc<Producer<T>>,
}

impl<T> Clone for Stream<T> {
    fn clone(&self) -> Self {
        Self {
            producer: self.producer.clone(),
        }
    }
}

impl<T> fmt::Debug for Stream<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("item", &std::any::type_name::<T>())
            .finish()
    }
}

// Constructors.
impl<T: 'static> Stream<T> {
    /// Creates a stream from a producer function.
    ///
    /// The producer runs once per subscription. It pushes signals into the
    /// `Subscriber` it is given and returns the `Subscription` that owns
    /// whatever it started (upstream attachments, timers). That subscription
    /// is released when the subscriber ends or is cancelled.
    pub fn new(producer: impl Fn(Subscriber<T>) -> Subscription + 'static) -> Self {
        Self {
            producer: Rc::new(producer),
        }
    }

    /// A stream that emits `values` in order and then completes.
    pub fn of(values: impl IntoIterator<Item = T>) -> Self
    where
        T: Clone,
    {
        let values: Rc<[T]> = values.into_iter().collect();
        Stream::new(move |subscriber| {
            for value in values.iter() {
                if subscriber.is_closed() {
                    break;
                }
                subscriber.next(value.clone());
            }
            subscriber.complete();
            Subscription::closed()
        })
    }

    /// A stream that completes immediately.
    pub fn empty() -> Self {
        Stream::new(|subscriber| {
            subscriber.complete();
            Subscription::closed()
        })
    }

    /// A stream that never emits and never ends.
    pub fn never() -> Self {
        Stream::new(|_| Subscription::new())
    }

    /// A stream that fails immediately with `error`.
    pub fn fail(error: StreamError) -> Self {
        Stream::new(move |subscriber| {
            subscriber.error(error.clone());
            Subscription::closed()
        })
    }
}

// Subscription API.
impl<T: 'static> Stream<T> {
    /// Attaches `observer` and starts production for it.
    pub fn subscribe_with(&self, observer: impl Observer<T> + 'static) -> Subscription {
        let subscriber = Subscriber::new(observer);
        self.produce_into(&subscriber);
        subscriber.subscription()
    }

    /// Subscribes `observer` on behalf of `downstream`, the way operators
    /// attach to their source.
    ///
    /// The upstream attachment is owned by `downstream` before production
    /// starts, so a downstream that ends while a synchronous source is still
    /// producing stops that source at once.
    pub(crate) fn subscribe_for<U: 'static>(
        &self,
        downstream: &Subscriber<U>,
        observer: impl Observer<T> + 'static,
    ) -> Subscription {
        let upstream = Subscriber::new(observer);
        downstream.add(upstream.subscription());
        self.produce_into(&upstream);
        upstream.subscription()
    }

    fn produce_into(&self, subscriber: &Subscriber<T>) {
        let resources = (self.producer)(subscriber.clone());
        subscriber.add(resources);
    }

    /// Attaches three callbacks, one per signal kind.
    pub fn subscribe<N, C, E>(&self, on_next: N, on_complete: C, on_error: E) -> Subscription
    where
        N: FnMut(T) + 'static,
        C: FnMut() + 'static,
        E: FnMut(StreamError) + 'static,
    {
        self.subscribe_with(FnObserver::new(on_next, on_complete, on_error))
    }

    /// Attaches a value callback only. Errors are logged and otherwise dropped.
    pub fn subscribe_next<N>(&self, on_next: N) -> Subscription
    where
        N: FnMut(T) + 'static,
    {
        self.subscribe(on_next, || {}, |error| {
            warn!(%error, "stream failed with no error handler attached");
        })
    }
}

impl<T: Clone + 'static> FromIterator<T> for Stream<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Stream::of(iter)
    }
}
