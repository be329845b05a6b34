//! The clock and timer abstraction that drives every time-based operator.
//!
//! A `Scheduler` answers "what time is it" and runs callbacks after a delay or
//! on a fixed period. Operators never read a global clock: they receive a
//! `SchedulerRef` when they are built, which lets tests swap in the
//! `VirtualScheduler` and step time by hand.
//!
//! All callbacks issued by one scheduler instance run on a single logical
//! timeline and never overlap. Operator state touched only from scheduler
//! callbacks and the event-delivery path therefore needs no locking.

pub mod realtime;
pub mod virtual_time;

pub use realtime::RealTimeScheduler;
pub use virtual_time::VirtualScheduler;

use crate::common::{TimerId, Timestamp};
use slotmap::SlotMap;
use std::cell::RefCell;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::{Rc, Weak};
use std::time::Duration;
use tokio::task::AbortHandle;
use tracing::{error, trace};

/// A unit of work handed to a scheduler.
pub type Callback = Box<dyn FnMut()>;

/// A shared handle to any scheduler implementation.
pub type SchedulerRef = Rc<dyn Scheduler>;

/// The contract every clock implementation fulfils.
pub trait Scheduler {
    /// The current position on this scheduler's timeline.
    fn now(&self) -> Timestamp;

    /// Runs `callback` once, `delay` from now.
    fn schedule_after(&self, delay: Duration, callback: Callback) -> CancelToken;

    /// Runs `callback` every `period`, first at `now + period`.
    fn schedule_periodic(&self, period: Duration, callback: Callback) -> CancelToken;
}

/// The right to cancel one scheduled timer.
///
/// Cancelling removes the timer from its scheduler's table before returning,
/// so the callback can never run afterwards, even if its due time has already
/// passed and it is queued behind the callback that is currently running.
/// Dropping a token does *not* cancel the timer.
#[derive(Clone)]
pub struct CancelToken {
    id: TimerId,
    timers: Weak<RefCell<TimerTable>>,
}

impl CancelToken {
    pub(crate) fn new(id: TimerId, timers: &SharedTimers) -> Self {
        Self {
            id,
            timers: Rc::downgrade(timers),
        }
    }

    pub fn id(&self) -> TimerId {
        self.id
    }

    /// Cancels the timer. Returns `true` if it was still pending.
    pub fn cancel(&self) -> bool {
        match self.timers.upgrade() {
            Some(timers) => {
                let cancelled = timers.borrow_mut().cancel(self.id);
                if cancelled {
                    trace!(timer = ?self.id, "timer cancelled");
                }
                cancelled
            }
            None => false,
        }
    }

    /// Whether the timer is still registered with its scheduler.
    pub fn is_active(&self) -> bool {
        match self.timers.upgrade() {
            Some(timers) => {
                let active = timers.borrow().slots.contains_key(self.id);
                active
            }
            None => false,
        }
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelToken").field("id", &self.id).finish()
    }
}

/// One registered timer.
pub(crate) struct TimerSlot {
    /// `None` while the callback is running.
    pub(crate) callback: Option<Callback>,
    pub(crate) due: Timestamp,
    pub(crate) period: Option<Duration>,
    /// Creation order, used to break ties between timers due at the same
    /// instant. Periodic timers keep their rank across re-arms.
    pub(crate) rank: u64,
    pub(crate) abort: Option<AbortHandle>,
}

/// The pending timers of one scheduler instance.
#[derive(Default)]
pub(crate) struct TimerTable {
    pub(crate) slots: SlotMap<TimerId, TimerSlot>,
    next_rank: u64,
}

pub(crate) type SharedTimers = Rc<RefCell<TimerTable>>;

impl TimerTable {
    pub(crate) fn insert(
        &mut self,
        due: Timestamp,
        period: Option<Duration>,
        callback: Callback,
    ) -> TimerId {
        let rank = self.next_rank;
        self.next_rank += 1;
        self.slots.insert(TimerSlot {
            callback: Some(callback),
            due,
            period,
            rank,
            abort: None,
        })
    }

    pub(crate) fn cancel(&mut self, id: TimerId) -> bool {
        match self.slots.remove(id) {
            Some(slot) => {
                if let Some(handle) = slot.abort {
                    handle.abort();
                }
                true
            }
            None => false,
        }
    }
}

/// Runs the callback registered under `id`, if it is still pending.
///
/// The callback is taken out of the table while it runs so it may freely
/// schedule or cancel timers, including its own. A panicking callback is
/// isolated: the panic is logged, that one timer is dropped, and every other
/// pending timer is left untouched.
pub(crate) fn fire(timers: &SharedTimers, id: TimerId) {
    let taken = timers
        .borrow_mut()
        .slots
        .get_mut(id)
        .and_then(|slot| slot.callback.take());
    let Some(mut callback) = taken else {
        return;
    };

    trace!(timer = ?id, "timer fired");
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| callback()));

    let mut table = timers.borrow_mut();
    if outcome.is_err() {
        error!(timer = ?id, "scheduler callback panicked; timer dropped");
        table.cancel(id);
        return;
    }
    let periodic = match table.slots.get_mut(id) {
        Some(slot) if slot.period.is_some() => {
            slot.callback = Some(callback);
            true
        }
        Some(_) => false,
        // Cancelled while running.
        None => return,
    };
    if !periodic {
        table.slots.remove(id);
    }
}

/// Guards against a zero period, which would never let time move forward.
pub(crate) fn effective_period(period: Duration) -> Duration {
    period.max(Duration::from_millis(1))
}
