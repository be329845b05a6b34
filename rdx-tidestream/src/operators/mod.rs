//! The operator library.
//!
//! Every operator is an inherent method on `Stream<T>` that returns a new
//! stream. Subscribing to the result subscribes upstream with an observer that
//! transforms signals and re-emits them to the downstream subscriber. Only the
//! time-based operators in [`time`] touch a scheduler; all others are driven
//! purely by event arrival.

pub mod aggregate;
pub mod distinct;
pub mod group;
pub mod merge;
pub mod time;
pub mod transform;

pub use distinct::DedupRetention;
pub use group::{GroupEviction, GroupedStream};

use crate::error::StreamError;
use crate::stream::{Observer, Stream, Subscriber};

/// An observer that runs `on_next` for each value and forwards terminal
/// signals to the downstream subscriber untouched.
pub(crate) struct Relay<U, N> {
    downstream: Subscriber<U>,
    on_next: N,
}

impl<U, N> Relay<U, N> {
    pub(crate) fn new(downstream: Subscriber<U>, on_next: N) -> Self {
        Self {
            downstream,
            on_next,
        }
    }
}

impl<T, U, N> Observer<T> for Relay<U, N>
where
    U: 'static,
    N: FnMut(T, &Subscriber<U>),
{
    fn on_next(&mut self, value: T) {
        (self.on_next)(value, &self.downstream)
    }

    fn on_error(&mut self, error: StreamError) {
        self.downstream.error(error);
    }

    fn on_complete(&mut self) {
        self.downstream.complete();
    }
}

impl<T: 'static> Stream<T> {
    /// Derives a stream whose every subscription attaches upstream with the
    /// observer `bind` builds around the downstream subscriber.
    pub(crate) fn lift<U, O, B>(&self, bind: B) -> Stream<U>
    where
        U: 'static,
        O: Observer<T> + 'static,
        B: Fn(Subscriber<U>) -> O + 'static,
    {
        let source = self.clone();
        Stream::new(move |downstream: Subscriber<U>| {
            let observer = bind(downstream.clone());
            source.subscribe_for(&downstream, observer)
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Shared helpers for operator tests.

    use crate::error::StreamError;
    use crate::stream::{Stream, Subscription};
    use std::cell::RefCell;
    use std::fmt::Debug;
    use std::rc::Rc;

    /// Everything one subscription observed, rendered as strings.
    #[derive(Clone, Default)]
    pub(crate) struct Recorder {
        pub(crate) events: Rc<RefCell<Vec<String>>>,
    }

    impl Recorder {
        pub(crate) fn attach<T: Debug + 'static>(stream: &Stream<T>) -> (Self, Subscription) {
            let recorder = Recorder::default();
            let (a, b, c) = (
                recorder.events.clone(),
                recorder.events.clone(),
                recorder.events.clone(),
            );
            let subscription = stream.subscribe(
                move |v| a.borrow_mut().push(format!("{v:?}")),
                move || b.borrow_mut().push("|".into()),
                move |e: StreamError| c.borrow_mut().push(format!("error: {e}")),
            );
            (recorder, subscription)
        }

        pub(crate) fn events(&self) -> Vec<String> {
            self.events.borrow().clone()
        }
    }
}
