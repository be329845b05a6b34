//! Helpers shared by the integration tests.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use tidestream::prelude::*;

/// Collected values plus whether the stream completed.
pub struct Collected<T> {
    pub values: Rc<RefCell<Vec<T>>>,
    pub completed: Rc<RefCell<bool>>,
    pub subscription: Subscription,
}

impl<T: Clone> Collected<T> {
    pub fn values(&self) -> Vec<T> {
        self.values.borrow().clone()
    }

    pub fn is_completed(&self) -> bool {
        *self.completed.borrow()
    }
}

pub fn collect<T: 'static>(stream: &Stream<T>) -> Collected<T> {
    let values = Rc::new(RefCell::new(Vec::new()));
    let completed = Rc::new(RefCell::new(false));
    let (sink, done) = (values.clone(), completed.clone());
    let subscription = stream.subscribe(
        move |value| sink.borrow_mut().push(value),
        move || *done.borrow_mut() = true,
        |error| panic!("unexpected stream error: {error}"),
    );
    Collected {
        values,
        completed,
        subscription,
    }
}

/// Schedules `make(i)` to be pushed into `feed` at each offset (ms) in `at`.
pub fn schedule_feed<T, F>(scheduler: &VirtualScheduler, feed: &Subject<T>, at: &[u64], make: F)
where
    T: Clone + 'static,
    F: Fn(usize) -> T + Clone + 'static,
{
    for (index, offset) in at.iter().copied().enumerate() {
        let (feed, make) = (feed.clone(), make.clone());
        scheduler.schedule_after(
            Duration::from_millis(offset),
            Box::new(move || feed.next(make(index))),
        );
    }
}

/// A small deterministic generator, good enough to spread events in time.
pub struct Lcg(pub u64);

impl Lcg {
    pub fn next(&mut self, bound: u64) -> u64 {
        self.0 = self.0.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1_442_695_040_888_963_407);
        (self.0 >> 33) % bound
    }

    /// `count` sorted offsets in `[0, horizon)`.
    pub fn offsets(&mut self, count: usize, horizon: u64) -> Vec<u64> {
        let mut offsets: Vec<u64> = (0..count).map(|_| self.next(horizon)).collect();
        offsets.sort_unstable();
        offsets
    }
}
