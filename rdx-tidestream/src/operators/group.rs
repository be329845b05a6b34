//! Keyed fan-out into per-key sub-streams.

use crate::common::GroupId;
use crate::error::{guard, StreamError};
use crate::scheduler::{CancelToken, SchedulerRef};
use crate::stream::{Observer, Stream, Subject, Subscriber};
use slotmap::SlotMap;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::rc::{Rc, Weak};
use std::time::Duration;
use tracing::debug;

/// One group emitted by `group_by`: the key plus the live stream of every
/// value that maps to it.
pub struct GroupedStream<K, T> {
    pub key: K,
    pub stream: Stream<T>,
}

impl<K: Clone, T> Clone for GroupedStream<K, T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            stream: self.stream.clone(),
        }
    }
}

impl<K: fmt::Debug, T> fmt::Debug for GroupedStream<K, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GroupedStream").field("key", &self.key).finish()
    }
}

/// When `group_by` forgets a group before its parent ends.
///
/// Groups otherwise live as long as the parent stream, so a parent with
/// unbounded key cardinality keeps an unbounded group table.
#[derive(Clone, Default)]
pub enum GroupEviction {
    /// Groups end only when the parent completes or fails.
    #[default]
    Never,
    /// A group that receives no value for `timeout` is completed and
    /// removed. A later value with the same key opens and emits a new group.
    IdleFor {
        timeout: Duration,
        scheduler: SchedulerRef,
    },
}

impl fmt::Debug for GroupEviction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupEviction::Never => f.write_str("Never"),
            GroupEviction::IdleFor { timeout, .. } => {
                f.debug_struct("IdleFor").field("timeout", timeout).finish()
            }
        }
    }
}

struct Group<K, T> {
    key: K,
    subject: Subject<T>,
    opened: u64,
    idle_timer: Option<CancelToken>,
}

struct GroupTable<K, T> {
    by_key: HashMap<K, GroupId>,
    groups: SlotMap<GroupId, Group<K, T>>,
    opened: u64,
}

impl<K: Eq + Hash + Clone, T: Clone + 'static> GroupTable<K, T> {
    fn new() -> Self {
        Self {
            by_key: HashMap::new(),
            groups: SlotMap::with_key(),
            opened: 0,
        }
    }

    fn open(&mut self, key: K) -> (GroupId, Subject<T>) {
        let subject = Subject::new();
        let id = self.groups.insert(Group {
            key: key.clone(),
            subject: subject.clone(),
            opened: self.opened,
            idle_timer: None,
        });
        self.opened += 1;
        self.by_key.insert(key, id);
        (id, subject)
    }

    fn evict(&mut self, id: GroupId) -> Option<Group<K, T>> {
        let group = self.groups.remove(id)?;
        self.by_key.remove(&group.key);
        Some(group)
    }

    /// Removes every group, in the order the groups were opened.
    fn drain(&mut self) -> Vec<Subject<T>> {
        self.by_key.clear();
        let mut groups: Vec<Group<K, T>> = self.groups.drain().map(|(_, g)| g).collect();
        groups.sort_by_key(|g| g.opened);
        groups
            .into_iter()
            .map(|g| {
                if let Some(timer) = g.idle_timer {
                    timer.cancel();
                }
                g.subject
            })
            .collect()
    }
}

impl<T: Clone + 'static> Stream<T> {
    /// Fans values out into one sub-stream per key.
    ///
    /// A group is created the first time its key is seen and emitted
    /// downstream exactly once, before its first value is pushed into it.
    /// Groups are hot: a subscriber must attach when the group is emitted.
    /// All groups complete (or fail) when the parent does.
    pub fn group_by<K, F>(&self, key_fn: F) -> Stream<GroupedStream<K, T>>
    where
        K: Eq + Hash + Clone + fmt::Debug + 'static,
        F: Fn(&T) -> K + 'static,
    {
        self.group_by_with(key_fn, GroupEviction::Never)
    }

    /// `group_by` with an explicit idle-group eviction policy.
    pub fn group_by_with<K, F>(
        &self,
        key_fn: F,
        eviction: GroupEviction,
    ) -> Stream<GroupedStream<K, T>>
    where
        K: Eq + Hash + Clone + fmt::Debug + 'static,
        F: Fn(&T) -> K + 'static,
    {
        let source = self.clone();
        let key_fn = Rc::new(key_fn);
        Stream::new(move |downstream: Subscriber<GroupedStream<K, T>>| {
            let table = Rc::new(RefCell::new(GroupTable::new()));

            let weak = Rc::downgrade(&table);
            downstream.add_callback(move || {
                if let Some(table) = weak.upgrade() {
                    for group in table.borrow().groups.values() {
                        if let Some(timer) = &group.idle_timer {
                            timer.cancel();
                        }
                    }
                }
            });

            let link = downstream.clone();
            source.subscribe_for(&link, GroupByObserver {
                table,
                key_fn: key_fn.clone(),
                eviction: eviction.clone(),
                downstream,
            })
        })
    }
}

struct GroupByObserver<K, T, F> {
    table: Rc<RefCell<GroupTable<K, T>>>,
    key_fn: Rc<F>,
    eviction: GroupEviction,
    downstream: Subscriber<GroupedStream<K, T>>,
}

impl<K, T, F> GroupByObserver<K, T, F>
where
    K: Eq + Hash + Clone + fmt::Debug + 'static,
    T: Clone + 'static,
{
    fn arm_idle_timer(&self, id: GroupId) {
        let GroupEviction::IdleFor { timeout, scheduler } = &self.eviction else {
            return;
        };
        if self.downstream.is_closed() {
            return;
        }
        let weak: Weak<RefCell<GroupTable<K, T>>> = Rc::downgrade(&self.table);
        let token = scheduler.schedule_after(
            *timeout,
            Box::new(move || {
                let Some(table) = weak.upgrade() else {
                    return;
                };
                let evicted = table.borrow_mut().evict(id);
                if let Some(group) = evicted {
                    debug!(key = ?group.key, "idle group evicted");
                    group.subject.complete();
                }
            }),
        );
        let previous = match self.table.borrow_mut().groups.get_mut(id) {
            Some(group) => group.idle_timer.replace(token),
            None => None,
        };
        if let Some(previous) = previous {
            previous.cancel();
        }
    }
}

impl<K, T, F> Observer<T> for GroupByObserver<K, T, F>
where
    K: Eq + Hash + Clone + fmt::Debug + 'static,
    T: Clone + 'static,
    F: Fn(&T) -> K,
{
    fn on_next(&mut self, value: T) {
        let key = match guard(|| (self.key_fn)(&value)) {
            Ok(key) => key,
            Err(error) => return self.on_error(error),
        };
        let existing = {
            let table = self.table.borrow();
            let found = table
                .by_key
                .get(&key)
                .map(|&id| (id, table.groups[id].subject.clone()));
            found
        };
        let (id, subject) = match existing {
            Some(found) => found,
            None => {
                let (id, subject) = self.table.borrow_mut().open(key.clone());
                debug!(?key, "group opened");
                self.downstream.next(GroupedStream {
                    key,
                    stream: subject.as_stream(),
                });
                (id, subject)
            }
        };
        self.arm_idle_timer(id);
        subject.next(value);
    }

    fn on_error(&mut self, error: StreamError) {
        let groups = self.table.borrow_mut().drain();
        for group in groups {
            group.error(error.clone());
        }
        self.downstream.error(error);
    }

    fn on_complete(&mut self) {
        let groups = self.table.borrow_mut().drain();
        for group in groups {
            group.complete();
        }
        self.downstream.complete();
    }
}
