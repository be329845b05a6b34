//! Operators that reduce a finite stream to a single value.
//!
//! Both emit exactly once, when upstream completes, and then complete. An
//! upstream error discards the partial result.

use crate::error::StreamError;
use crate::stream::{Observer, Stream, Subscriber};
use std::mem;

impl<T: 'static> Stream<T> {
    /// Emits the number of values upstream produced.
    pub fn count(&self) -> Stream<usize> {
        self.lift(|downstream| Count {
            seen: 0,
            downstream,
        })
    }

    /// Emits every upstream value, in order, as one `Vec`.
    pub fn to_vec(&self) -> Stream<Vec<T>> {
        self.lift(|downstream| Collect {
            items: Vec::new(),
            downstream,
        })
    }
}

struct Count {
    seen: usize,
    downstream: Subscriber<usize>,
}

impl<T> Observer<T> for Count {
    fn on_next(&mut self, _value: T) {
        self.seen += 1;
    }

    fn on_error(&mut self, error: StreamError) {
        self.downstream.error(error);
    }

    fn on_complete(&mut self) {
        self.downstream.next(self.seen);
        self.downstream.complete();
    }
}

struct Collect<T> {
    items: Vec<T>,
    downstream: Subscriber<Vec<T>>,
}

impl<T: 'static> Observer<T> for Collect<T> {
    fn on_next(&mut self, value: T) {
        self.items.push(value);
    }

    fn on_error(&mut self, error: StreamError) {
        self.items.clear();
        self.downstream.error(error);
    }

    fn on_complete(&mut self) {
        self.downstream.next(mem::take(&mut self.items));
        self.downstream.complete();
    }
}
