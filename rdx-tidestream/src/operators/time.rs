//! Scheduler-driven operators: `sample`, `buffer_with_time` and
//! `window_with_time`.
//!
//! Each operator starts one periodic timer per subscription and ties its
//! `CancelToken` to the downstream subscriber, so completion, failure and
//! cancellation all stop the timer. Intervals are tumbling and half-open:
//! the interval opened at `t` covers `[t, t + period)`, and an event that
//! arrives exactly at `t + period` belongs to the next one.
//!
//! A panic raised downstream of a tick fails the stream that tick drives.

use super::Relay;
use crate::error::{guard, StreamError};
use crate::scheduler::SchedulerRef;
use crate::stream::{Observer, Stream, Subject, Subscriber};
use std::cell::RefCell;
use std::mem;
use std::rc::Rc;
use std::time::Duration;
use tracing::debug;

impl<T: 'static> Stream<T> {
    /// Emits the most recent not-yet-emitted value once per `interval`.
    ///
    /// An interval without upstream values emits nothing. Upstream completion
    /// completes downstream immediately; a value still waiting for the next
    /// tick is dropped.
    pub fn sample(&self, interval: Duration, scheduler: SchedulerRef) -> Stream<T> {
        let source = self.clone();
        Stream::new(move |downstream: Subscriber<T>| {
            let latest: Rc<RefCell<Option<T>>> = Rc::new(RefCell::new(None));

            let (slot, out) = (latest.clone(), downstream.clone());
            let tick = scheduler.schedule_periodic(
                interval,
                Box::new(move || {
                    let pending = slot.borrow_mut().take();
                    if let Some(value) = pending {
                        emit_on_tick(&out, || out.next(value));
                    }
                }),
            );
            downstream.add(tick);

            let link = downstream.clone();
            source.subscribe_for(&link, Relay::new(downstream, move |value: T, _: &Subscriber<T>| {
                *latest.borrow_mut() = Some(value);
            }))
        })
    }

    /// Collects values into tumbling batches of `period` and emits each batch
    /// when its interval closes, empty batches included.
    ///
    /// Every value of an interval is held until the interval closes, so
    /// memory grows with the event rate. `window_with_time` delivers the same
    /// partitioning without retaining values. On completion the partial batch
    /// is flushed before downstream completes; on error it is discarded.
    pub fn buffer_with_time(&self, period: Duration, scheduler: SchedulerRef) -> Stream<Vec<T>> {
        let source = self.clone();
        Stream::new(move |downstream: Subscriber<Vec<T>>| {
            let buffer: Rc<RefCell<Vec<T>>> = Rc::new(RefCell::new(Vec::new()));

            let (batch, out) = (buffer.clone(), downstream.clone());
            let tick = scheduler.schedule_periodic(
                period,
                Box::new(move || {
                    let closed = mem::take(&mut *batch.borrow_mut());
                    emit_on_tick(&out, || out.next(closed));
                }),
            );
            downstream.add(tick);

            let link = downstream.clone();
            source.subscribe_for(&link, BufferObserver { buffer, downstream })
        })
    }

    /// Splits the stream into tumbling windows of `period`.
    ///
    /// A window is itself a hot `Stream<T>`: the first is emitted at subscribe
    /// time and a new one every `period` after that. Values are pushed into
    /// the open window as they arrive and never retained, so a subscriber must
    /// attach to a window when it is emitted to see its values. The open
    /// window completes before the next one is emitted. On upstream
    /// completion the open window completes, then the outer stream; on error
    /// both fail.
    pub fn window_with_time(&self, period: Duration, scheduler: SchedulerRef) -> Stream<Stream<T>>
    where
        T: Clone,
    {
        let source = self.clone();
        Stream::new(move |downstream: Subscriber<Stream<T>>| {
            let opened = Subject::new();
            let current = Rc::new(RefCell::new(opened.clone()));
            debug!(start = %scheduler.now(), "window opened");
            downstream.next(opened.as_stream());

            let (open, out, clock) = (current.clone(), downstream.clone(), scheduler.clone());
            let tick = scheduler.schedule_periodic(
                period,
                Box::new(move || {
                    let next = Subject::new();
                    let closing = open.replace(next.clone());
                    emit_on_tick(&out, || {
                        closing.complete();
                        debug!(start = %clock.now(), "window rolled over");
                        out.next(next.as_stream());
                    });
                }),
            );
            downstream.add(tick);

            let link = downstream.clone();
            source.subscribe_for(&link, WindowObserver {
                current,
                downstream,
            })
        })
    }
}

/// Runs the emission of one tick. A panic raised while it travels
/// downstream fails `out`, which also cancels the tick's timer.
fn emit_on_tick<T: 'static>(out: &Subscriber<T>, emit: impl FnOnce()) {
    if let Err(error) = guard(emit) {
        out.error(error);
    }
}

struct BufferObserver<T> {
    buffer: Rc<RefCell<Vec<T>>>,
    downstream: Subscriber<Vec<T>>,
}

impl<T: 'static> Observer<T> for BufferObserver<T> {
    fn on_next(&mut self, value: T) {
        self.buffer.borrow_mut().push(value);
    }

    fn on_error(&mut self, error: StreamError) {
        self.buffer.borrow_mut().clear();
        self.downstream.error(error);
    }

    fn on_complete(&mut self) {
        let partial = mem::take(&mut *self.buffer.borrow_mut());
        self.downstream.next(partial);
        self.downstream.complete();
    }
}

struct WindowObserver<T> {
    current: Rc<RefCell<Subject<T>>>,
    downstream: Subscriber<Stream<T>>,
}

impl<T: Clone + 'static> Observer<T> for WindowObserver<T> {
    fn on_next(&mut self, value: T) {
        let window = self.current.borrow().clone();
        window.next(value);
    }

    fn on_error(&mut self, error: StreamError) {
        let window = self.current.borrow().clone();
        window.error(error.clone());
        self.downstream.error(error);
    }

    fn on_complete(&mut self) {
        let window = self.current.borrow().clone();
        window.complete();
        debug!("window stream completed");
        self.downstream.complete();
    }
}
