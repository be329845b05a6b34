//! Key-based deduplication.
//!
//! `distinct` remembers every key it has let through. With the default
//! `DedupRetention::Unbounded` that set only grows for the lifetime of the
//! subscription, so it suits keys of finite cardinality. A bounded retention
//! caps memory at the cost of re-admitting keys that were evicted.

use super::Relay;
use crate::error::guard;
use crate::stream::{Stream, Subscriber};
use std::collections::{HashSet, VecDeque};
use std::hash::Hash;
use std::rc::Rc;

/// How many seen keys a `distinct` operator keeps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DedupRetention {
    /// Every key is remembered for the life of the subscription.
    #[default]
    Unbounded,
    /// At most `capacity` keys are remembered; the oldest first-seen key is
    /// forgotten first.
    Bounded { capacity: usize },
}

struct DedupSet<K> {
    seen: HashSet<K>,
    order: VecDeque<K>,
    capacity: Option<usize>,
}

impl<K: Eq + Hash + Clone> DedupSet<K> {
    fn new(retention: DedupRetention) -> Self {
        let capacity = match retention {
            DedupRetention::Unbounded => None,
            DedupRetention::Bounded { capacity } => Some(capacity.max(1)),
        };
        Self {
            seen: HashSet::new(),
            order: VecDeque::new(),
            capacity,
        }
    }

    /// Records `key`. Returns `true` the first time a key is seen.
    fn admit(&mut self, key: K) -> bool {
        if self.seen.contains(&key) {
            return false;
        }
        if let Some(capacity) = self.capacity {
            if self.order.len() == capacity {
                if let Some(oldest) = self.order.pop_front() {
                    self.seen.remove(&oldest);
                }
            }
            self.order.push_back(key.clone());
        }
        self.seen.insert(key)
    }
}

impl<T: 'static> Stream<T> {
    /// Drops every value whose key has been seen before. The first occurrence
    /// of each key wins and relative order is preserved.
    pub fn distinct<K, F>(&self, key_fn: F) -> Stream<T>
    where
        K: Eq + Hash + Clone + 'static,
        F: Fn(&T) -> K + 'static,
    {
        self.distinct_with(key_fn, DedupRetention::Unbounded)
    }

    /// `distinct` with an explicit retention policy for the seen-key set.
    pub fn distinct_with<K, F>(&self, key_fn: F, retention: DedupRetention) -> Stream<T>
    where
        K: Eq + Hash + Clone + 'static,
        F: Fn(&T) -> K + 'static,
    {
        let key_fn = Rc::new(key_fn);
        self.lift(move |downstream| {
            let key_fn = key_fn.clone();
            let mut seen = DedupSet::new(retention);
            Relay::new(downstream, move |value: T, out: &Subscriber<T>| {
                match guard(|| key_fn(&value)) {
                    Ok(key) => {
                        if seen.admit(key) {
                            out.next(value)
                        }
                    }
                    Err(error) => out.error(error),
                }
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operators::testing::Recorder;

    #[test]
    fn first_occurrence_of_each_key_wins() {
        let input = [(1, "a"), (2, "b"), (1, "c"), (3, "d"), (2, "e")];
        let stream = Stream::of(input).distinct(|(id, _)| *id);
        let (recorder, _) = Recorder::attach(&stream);
        assert_eq!(
            recorder.events(),
            vec!["(1, \"a\")", "(2, \"b\")", "(3, \"d\")", "|"]
        );
    }

    #[test]
    fn every_subscription_gets_its_own_seen_set() {
        let stream = Stream::of([4, 4, 5]).distinct(|v| *v);
        let (first, _) = Recorder::attach(&stream);
        let (second, _) = Recorder::attach(&stream);
        assert_eq!(first.events(), vec!["4", "5", "|"]);
        assert_eq!(first.events(), second.events());
    }

    #[test]
    fn a_panicking_key_function_fails_the_stream() {
        let stream = Stream::of(["a", "", "b"]).distinct(|s| s.chars().next().expect("empty key"));
        let (recorder, _) = Recorder::attach(&stream);
        assert_eq!(
            recorder.events(),
            vec!["\"a\"", "error: user function panicked: empty key"]
        );
    }

    #[test]
    fn bounded_retention_forgets_the_oldest_key() {
        let stream = Stream::of([1, 2, 3, 1, 3])
            .distinct_with(|v| *v, DedupRetention::Bounded { capacity: 2 });
        let (recorder, _) = Recorder::attach(&stream);
        assert_eq!(recorder.events(), vec!["1", "2", "3", "1", "|"]);
    }
}
