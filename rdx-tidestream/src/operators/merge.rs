//! Flattening streams of streams.

use crate::error::{guard, StreamError};
use crate::stream::{Observer, Stream, Subscriber};
use std::cell::Cell;
use std::rc::Rc;

/// Bookkeeping shared by the outer observer and every inner one.
struct MergeState {
    active: Cell<usize>,
    outer_done: Cell<bool>,
}

impl MergeState {
    fn finish_if_drained<U: 'static>(&self, downstream: &Subscriber<U>) {
        if self.outer_done.get() && self.active.get() == 0 {
            downstream.complete();
        }
    }
}

impl<T: 'static> Stream<T> {
    /// Maps every value to an inner stream, subscribes to it immediately and
    /// merges all inner values into one stream in arrival order.
    ///
    /// The result completes once the outer stream and every inner stream it
    /// produced have completed. Any error, outer or inner, fails the result
    /// at once and cancels everything still running.
    pub fn flat_map<U, F>(&self, f: F) -> Stream<U>
    where
        U: 'static,
        F: Fn(T) -> Stream<U> + 'static,
    {
        let f = Rc::new(f);
        self.lift(move |downstream| FlatMapObserver {
            f: f.clone(),
            downstream,
            state: Rc::new(MergeState {
                active: Cell::new(0),
                outer_done: Cell::new(false),
            }),
        })
    }
}

impl<T: 'static> Stream<Stream<T>> {
    /// Flattens a stream of streams with merge semantics.
    pub fn merge_all(&self) -> Stream<T> {
        self.flat_map(|inner| inner)
    }
}

struct FlatMapObserver<U, F> {
    f: Rc<F>,
    downstream: Subscriber<U>,
    state: Rc<MergeState>,
}

impl<T, U, F> Observer<T> for FlatMapObserver<U, F>
where
    U: 'static,
    F: Fn(T) -> Stream<U>,
{
    fn on_next(&mut self, value: T) {
        let inner = match guard(|| (self.f)(value)) {
            Ok(inner) => inner,
            Err(error) => return self.downstream.error(error),
        };
        self.state.active.set(self.state.active.get() + 1);
        inner.subscribe_for(
            &self.downstream,
            InnerObserver {
                downstream: self.downstream.clone(),
                state: self.state.clone(),
            },
        );
    }

    fn on_error(&mut self, error: StreamError) {
        self.downstream.error(error);
    }

    fn on_complete(&mut self) {
        self.state.outer_done.set(true);
        self.state.finish_if_drained(&self.downstream);
    }
}

struct InnerObserver<U> {
    downstream: Subscriber<U>,
    state: Rc<MergeState>,
}

impl<U: 'static> Observer<U> for InnerObserver<U> {
    fn on_next(&mut self, value: U) {
        self.downstream.next(value);
    }

    fn on_error(&mut self, error: StreamError) {
        self.downstream.error(error);
    }

    fn on_complete(&mut self) {
        self.state.active.set(self.state.active.get() - 1);
        self.state.finish_if_drained(&self.downstream);
    }
}

#[cfg(test)]
mod tests {
    use crate::error::StreamError;
    use crate::operators::testing::Recorder;
    use crate::stream::{Stream, Subject, SubscriptionState};

    #[test]
    fn interleaves_inner_values_by_arrival() {
        let outer = Subject::new();
        let (left, right) = (Subject::new(), Subject::new());
        let (recorder, _) = Recorder::attach(&outer.as_stream().merge_all());

        outer.next(left.as_stream());
        left.next("l1");
        outer.next(right.as_stream());
        right.next("r1");
        left.next("l2");

        assert_eq!(recorder.events(), vec!["\"l1\"", "\"r1\"", "\"l2\""]);
    }

    #[test]
    fn completes_only_after_outer_and_all_inners() {
        let outer = Subject::new();
        let inner = Subject::new();
        let (recorder, _) = Recorder::attach(&outer.as_stream().merge_all());

        outer.next(inner.as_stream());
        outer.complete();
        assert!(recorder.events().is_empty());

        inner.next(1);
        inner.complete();
        assert_eq!(recorder.events(), vec!["1", "|"]);
    }

    #[test]
    fn synchronous_inners_are_flattened() {
        let stream =
            Stream::of([vec![1, 2], vec![], vec![3]]).flat_map(|values: Vec<i32>| Stream::of(values));
        let (recorder, _) = Recorder::attach(&stream);
        assert_eq!(recorder.events(), vec!["1", "2", "3", "|"]);
    }

    #[test]
    fn inner_error_fails_fast_and_cancels_siblings() {
        let outer = Subject::new();
        let (healthy, faulty) = (Subject::new(), Subject::new());
        let (recorder, subscription) = Recorder::attach(&outer.as_stream().merge_all());

        outer.next(healthy.as_stream());
        outer.next(faulty.as_stream());
        faulty.error(StreamError::msg("inner broke"));
        healthy.next(5);

        assert_eq!(recorder.events(), vec!["error: inner broke"]);
        assert_eq!(subscription.state(), SubscriptionState::Errored);
        assert_eq!(healthy.observer_count(), 0);
        assert_eq!(outer.observer_count(), 0);
    }

    #[test]
    fn a_panicking_mapper_fails_the_result() {
        let outer = Subject::new();
        let inner: Subject<u32> = Subject::new();
        let source = inner.clone();
        let stream = outer.as_stream().flat_map(move |n: u32| {
            assert!(n > 0, "no stream for zero");
            source.as_stream()
        });
        let (recorder, subscription) = Recorder::attach(&stream);

        outer.next(1);
        inner.next(10);
        outer.next(0);
        inner.next(20);

        assert_eq!(
            recorder.events(),
            vec!["10", "error: user function panicked: no stream for zero"]
        );
        assert_eq!(subscription.state(), SubscriptionState::Errored);
        assert_eq!(inner.observer_count(), 0);
        assert_eq!(outer.observer_count(), 0);
    }

    #[test]
    fn cancelling_the_result_cancels_inner_subscriptions() {
        let outer = Subject::new();
        let inner: Subject<u8> = Subject::new();
        let (_, subscription) = Recorder::attach(&outer.as_stream().merge_all());
        outer.next(inner.as_stream());
        assert_eq!(inner.observer_count(), 1);

        subscription.unsubscribe();
        assert_eq!(inner.observer_count(), 0);
        assert_eq!(outer.observer_count(), 0);
    }
}
