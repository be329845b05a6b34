//! A scheduler backed by tokio's timer wheel.

use super::{effective_period, fire, Callback, CancelToken, Scheduler, SharedTimers, TimerTable};
use crate::common::{TimerId, Timestamp};
use std::cell::RefCell;
use std::future::Future;
use std::rc::{Rc, Weak};
use std::time::Duration;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::trace;

/// Wall-clock scheduler for live pipelines.
///
/// Callbacks are not `Send`, so every timer is driven by a task spawned with
/// `tokio::task::spawn_local`: the scheduler must be used from inside a
/// `tokio::task::LocalSet`. That also pins every callback it issues to one
/// thread, which is what keeps them serialized.
#[derive(Clone)]
pub struct RealTimeScheduler {
    origin: Instant,
    timers: SharedTimers,
}

impl RealTimeScheduler {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            timers: SharedTimers::default(),
        }
    }

    /// Number of timers still registered.
    pub fn pending_timers(&self) -> usize {
        self.timers.borrow().slots.len()
    }

    fn register(&self, id: TimerId, driver: impl Future<Output = ()> + 'static) {
        let handle = tokio::task::spawn_local(driver);
        match self.timers.borrow_mut().slots.get_mut(id) {
            Some(slot) => slot.abort = Some(handle.abort_handle()),
            None => handle.abort(),
        }
    }
}

impl Default for RealTimeScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for RealTimeScheduler {
    fn now(&self) -> Timestamp {
        Timestamp::from_duration(self.origin.elapsed())
    }

    fn schedule_after(&self, delay: Duration, callback: Callback) -> CancelToken {
        let id = self
            .timers
            .borrow_mut()
            .insert(self.now() + delay, None, callback);
        let timers: Weak<RefCell<TimerTable>> = Rc::downgrade(&self.timers);
        let deadline = Instant::now() + delay;
        self.register(id, async move {
            time::sleep_until(deadline).await;
            if let Some(timers) = timers.upgrade() {
                fire(&timers, id);
            }
        });
        trace!(timer = ?id, ?delay, "one-shot timer scheduled");
        CancelToken::new(id, &self.timers)
    }

    fn schedule_periodic(&self, period: Duration, callback: Callback) -> CancelToken {
        let period = effective_period(period);
        let id = self
            .timers
            .borrow_mut()
            .insert(self.now() + period, Some(period), callback);
        let timers: Weak<RefCell<TimerTable>> = Rc::downgrade(&self.timers);
        let origin = self.origin;
        self.register(id, async move {
            let mut ticker = time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let Some(timers) = timers.upgrade() else {
                    break;
                };
                match timers.borrow_mut().slots.get_mut(id) {
                    Some(slot) => slot.due = Timestamp::from_duration(origin.elapsed()) + period,
                    None => break,
                }
                fire(&timers, id);
            }
        });
        trace!(timer = ?id, ?period, "periodic timer scheduled");
        CancelToken::new(id, &self.timers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use tokio::task::LocalSet;

    #[tokio::test(start_paused = true)]
    async fn periodic_timer_follows_wall_clock() {
        let local = LocalSet::new();
        local
            .run_until(async {
                let scheduler = RealTimeScheduler::new();
                let ticks = Rc::new(Cell::new(0u32));
                let counter = ticks.clone();
                let token = scheduler.schedule_periodic(
                    Duration::from_millis(100),
                    Box::new(move || counter.set(counter.get() + 1)),
                );

                time::sleep(Duration::from_millis(350)).await;
                assert_eq!(ticks.get(), 3);

                assert!(token.cancel());
                time::sleep(Duration::from_millis(500)).await;
                assert_eq!(ticks.get(), 3);
                assert_eq!(scheduler.pending_timers(), 0);
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_one_shot_never_runs() {
        let local = LocalSet::new();
        local
            .run_until(async {
                let scheduler = RealTimeScheduler::new();
                let fired = Rc::new(Cell::new(false));
                let flag = fired.clone();
                let token = scheduler.schedule_after(
                    Duration::from_millis(50),
                    Box::new(move || flag.set(true)),
                );
                let kept = Rc::new(Cell::new(false));
                let other = kept.clone();
                scheduler.schedule_after(Duration::from_millis(50), Box::new(move || other.set(true)));

                token.cancel();
                time::sleep(Duration::from_millis(100)).await;
                assert!(!fired.get());
                assert!(kept.get());
                assert!(scheduler.now() >= Timestamp(100));
            })
            .await;
    }
}
