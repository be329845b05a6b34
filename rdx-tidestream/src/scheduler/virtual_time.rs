//! A scheduler whose clock only moves when it is told to.

use super::{effective_period, fire, Callback, CancelToken, Scheduler, SchedulerRef, SharedTimers};
use crate::common::{TimerId, Timestamp};
use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;
use tracing::trace;

/// A deterministic scheduler for tests and simulations.
///
/// Time starts at `Timestamp::ZERO` and advances only through `advance_by` /
/// `advance_to`. Timers due at the same instant fire in the order they were
/// created. Clones share the same clock and timer table.
#[derive(Clone, Default)]
pub struct VirtualScheduler {
    clock: Rc<Cell<Timestamp>>,
    timers: SharedTimers,
}

impl VirtualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns this scheduler as a shareable `SchedulerRef` for operators.
    pub fn shared(&self) -> SchedulerRef {
        Rc::new(self.clone())
    }

    /// Moves the clock forward by `delta`, firing everything that falls due.
    pub fn advance_by(&self, delta: Duration) {
        self.advance_to(self.now() + delta);
    }

    /// Fires every timer due at or before `target`, in (due, creation) order,
    /// with the clock set to each timer's due time while it runs. Leaves the
    /// clock at `target`. Targets in the past are ignored.
    pub fn advance_to(&self, target: Timestamp) {
        if target < self.now() {
            return;
        }
        while let Some((id, due)) = self.next_due(target) {
            self.clock.set(due);
            if let Some(slot) = self.timers.borrow_mut().slots.get_mut(id) {
                if let Some(period) = slot.period {
                    let next = due + period;
                    if next > due {
                        slot.due = next;
                    } else {
                        // The timeline ends at u64::MAX; this is the last run.
                        slot.period = None;
                    }
                }
            }
            fire(&self.timers, id);
        }
        self.clock.set(target);
        trace!(now = %target, "virtual clock advanced");
    }

    /// Number of timers still registered (pending or periodic).
    pub fn pending_timers(&self) -> usize {
        self.timers.borrow().slots.len()
    }

    fn next_due(&self, target: Timestamp) -> Option<(TimerId, Timestamp)> {
        self.timers
            .borrow()
            .slots
            .iter()
            .filter(|(_, slot)| slot.callback.is_some() && slot.due <= target)
            .min_by_key(|(_, slot)| (slot.due, slot.rank))
            .map(|(id, slot)| (id, slot.due))
    }
}

impl Scheduler for VirtualScheduler {
    fn now(&self) -> Timestamp {
        self.clock.get()
    }

    fn schedule_after(&self, delay: Duration, callback: Callback) -> CancelToken {
        let due = self.now() + delay;
        let id = self.timers.borrow_mut().insert(due, None, callback);
        trace!(timer = ?id, %due, "one-shot timer scheduled");
        CancelToken::new(id, &self.timers)
    }

    fn schedule_periodic(&self, period: Duration, callback: Callback) -> CancelToken {
        let period = effective_period(period);
        let due = self.now() + period;
        let id = self.timers.borrow_mut().insert(due, Some(period), callback);
        trace!(timer = ?id, %due, ?period, "periodic timer scheduled");
        CancelToken::new(id, &self.timers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    fn recorder() -> (Rc<RefCell<Vec<(u64, &'static str)>>>, VirtualScheduler) {
        (Rc::new(RefCell::new(Vec::new())), VirtualScheduler::new())
    }

    #[test]
    fn one_shot_fires_once_at_its_due_time() {
        let (log, scheduler) = recorder();
        assert_eq!(scheduler.now(), Timestamp::ZERO);
        let (sink, clock) = (log.clone(), scheduler.clone());
        scheduler.schedule_after(
            Duration::from_millis(250),
            Box::new(move || sink.borrow_mut().push((clock.now().0, "once"))),
        );

        scheduler.advance_by(Duration::from_millis(249));
        assert!(log.borrow().is_empty());
        scheduler.advance_by(Duration::from_secs(10));
        assert_eq!(*log.borrow(), vec![(250, "once")]);
        assert_eq!(scheduler.pending_timers(), 0);
        assert_eq!(scheduler.now(), Timestamp(10_250));
    }

    #[test]
    fn periodic_fires_every_period_until_cancelled() {
        let (log, scheduler) = recorder();
        let (sink, clock) = (log.clone(), scheduler.clone());
        let token = scheduler.schedule_periodic(
            Duration::from_secs(1),
            Box::new(move || sink.borrow_mut().push((clock.now().0, "tick"))),
        );

        scheduler.advance_to(Timestamp(3_500));
        assert_eq!(
            *log.borrow(),
            vec![(1_000, "tick"), (2_000, "tick"), (3_000, "tick")]
        );

        assert!(token.cancel());
        assert!(!token.is_active());
        scheduler.advance_to(Timestamp(10_000));
        assert_eq!(log.borrow().len(), 3);
        assert!(!token.cancel());
    }

    #[test]
    fn ties_resolve_in_creation_order_across_rearms() {
        let (log, scheduler) = recorder();
        let (a, b) = (log.clone(), log.clone());
        let clock = scheduler.clone();
        scheduler.schedule_periodic(
            Duration::from_secs(1),
            Box::new(move || a.borrow_mut().push((clock.now().0, "periodic"))),
        );
        let clock = scheduler.clone();
        scheduler.schedule_after(
            Duration::from_secs(2),
            Box::new(move || b.borrow_mut().push((clock.now().0, "one-shot"))),
        );

        scheduler.advance_to(Timestamp(2_000));
        assert_eq!(
            *log.borrow(),
            vec![(1_000, "periodic"), (2_000, "periodic"), (2_000, "one-shot")]
        );
    }

    #[test]
    fn cancelling_a_queued_timer_from_another_callback_wins() {
        let (log, scheduler) = recorder();
        let victim_slot: Rc<RefCell<Option<CancelToken>>> = Rc::new(RefCell::new(None));

        let slot = victim_slot.clone();
        scheduler.schedule_after(
            Duration::from_millis(100),
            Box::new(move || {
                if let Some(token) = slot.borrow().as_ref() {
                    token.cancel();
                }
            }),
        );
        let sink = log.clone();
        let victim = scheduler.schedule_after(
            Duration::from_millis(100),
            Box::new(move || sink.borrow_mut().push((100, "victim"))),
        );
        *victim_slot.borrow_mut() = Some(victim);

        scheduler.advance_by(Duration::from_secs(1));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn panicking_callback_is_isolated() {
        let (log, scheduler) = recorder();
        let faulty = scheduler.schedule_periodic(
            Duration::from_millis(10),
            Box::new(|| panic!("callback fault")),
        );
        let sink = log.clone();
        scheduler.schedule_periodic(
            Duration::from_millis(10),
            Box::new(move || sink.borrow_mut().push((0, "healthy"))),
        );

        scheduler.advance_by(Duration::from_millis(30));
        assert!(!faulty.is_active());
        assert_eq!(log.borrow().len(), 3);
        assert_eq!(scheduler.pending_timers(), 1);
    }

    #[test]
    fn periodic_timers_retire_at_the_end_of_the_timeline() {
        let (log, scheduler) = recorder();
        let (sink, clock) = (log.clone(), scheduler.clone());
        scheduler.schedule_periodic(
            Duration::from_millis(u64::MAX / 2),
            Box::new(move || sink.borrow_mut().push((clock.now().0, "tick"))),
        );

        scheduler.advance_to(Timestamp(u64::MAX));

        let fired: Vec<u64> = log.borrow().iter().map(|(at, _)| *at).collect();
        assert_eq!(fired, vec![u64::MAX / 2, u64::MAX - 1, u64::MAX]);
        assert_eq!(scheduler.pending_timers(), 0);
    }

    #[test]
    fn callbacks_may_schedule_more_work() {
        let (log, scheduler) = recorder();
        let (sink, inner) = (log.clone(), scheduler.clone());
        scheduler.schedule_after(
            Duration::from_millis(5),
            Box::new(move || {
                let (sink, clock) = (sink.clone(), inner.clone());
                inner.schedule_after(
                    Duration::from_millis(5),
                    Box::new(move || sink.borrow_mut().push((clock.now().0, "nested"))),
                );
            }),
        );

        scheduler.advance_by(Duration::from_millis(10));
        assert_eq!(*log.borrow(), vec![(10, "nested")]);
    }
}
