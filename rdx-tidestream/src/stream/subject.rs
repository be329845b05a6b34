//! A hot, multicast source that can be pushed into by hand.

use super::{Stream, Subscriber, Subscription};
use crate::common::ObserverId;
use crate::error::StreamError;
use slotmap::SlotMap;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

#[derive(Clone)]
enum Terminal {
    Completed,
    Failed(StreamError),
}

struct SubjectState<T> {
    observers: SlotMap<ObserverId, Subscriber<T>>,
    terminal: Option<Terminal>,
}

/// A stream source that multicasts every pushed value to all observers
/// attached at that moment.
///
/// Observers that attach after the subject has ended receive its terminal
/// signal straight away. Windows, groups and live feeds are all subjects.
pub struct Subject<T> {
    state: Rc<RefCell<SubjectState<T>>>,
}

impl<T> Clone for Subject<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<T: Clone + 'static> Subject<T> {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(SubjectState {
                observers: SlotMap::with_key(),
                terminal: None,
            })),
        }
    }

    pub fn next(&self, value: T) {
        let targets: Vec<Subscriber<T>> = {
            let state = self.state.borrow();
            if state.terminal.is_some() {
                return;
            }
            state.observers.values().cloned().collect()
        };
        for target in targets {
            target.next(value.clone());
        }
    }

    pub fn complete(&self) {
        for target in self.finish(Terminal::Completed) {
            target.complete();
        }
    }

    pub fn error(&self, error: StreamError) {
        for target in self.finish(Terminal::Failed(error.clone())) {
            target.error(error.clone());
        }
    }

    /// Whether the subject has already completed or failed.
    pub fn is_closed(&self) -> bool {
        self.state.borrow().terminal.is_some()
    }

    pub fn observer_count(&self) -> usize {
        self.state.borrow().observers.len()
    }

    /// A stream view of this subject. Subscribing attaches a new observer.
    pub fn as_stream(&self) -> Stream<T> {
        let subject = self.clone();
        Stream::new(move |subscriber| subject.attach(subscriber))
    }

    fn finish(&self, terminal: Terminal) -> Vec<Subscriber<T>> {
        let mut state = self.state.borrow_mut();
        if state.terminal.is_some() {
            return Vec::new();
        }
        state.terminal = Some(terminal);
        let targets = state.observers.drain().map(|(_, target)| target).collect();
        targets
    }

    fn attach(&self, subscriber: Subscriber<T>) -> Subscription {
        let terminal = self.state.borrow().terminal.clone();
        match terminal {
            Some(Terminal::Completed) => {
                subscriber.complete();
                Subscription::closed()
            }
            Some(Terminal::Failed(error)) => {
                subscriber.error(error);
                Subscription::closed()
            }
            None => {
                let id = self.state.borrow_mut().observers.insert(subscriber);
                let state: Weak<RefCell<SubjectState<T>>> = Rc::downgrade(&self.state);
                let detach = Subscription::new();
                detach.add_callback(move || {
                    if let Some(state) = state.upgrade() {
                        state.borrow_mut().observers.remove(id);
                    }
                });
                detach
            }
        }
    }
}

impl<T: Clone + 'static> Default for Subject<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(stream: &Stream<u32>) -> (Rc<RefCell<Vec<u32>>>, Subscription) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let subscription = stream.subscribe_next(move |v| sink.borrow_mut().push(v));
        (seen, subscription)
    }

    #[test]
    fn multicasts_to_every_attached_observer() {
        let subject = Subject::new();
        let (first, _a) = collect(&subject.as_stream());
        subject.next(1);
        let (second, _b) = collect(&subject.as_stream());
        subject.next(2);

        assert_eq!(*first.borrow(), vec![1, 2]);
        assert_eq!(*second.borrow(), vec![2]);
        assert_eq!(subject.observer_count(), 2);
    }

    #[test]
    fn cancelled_observers_are_detached() {
        let subject = Subject::new();
        let (seen, subscription) = collect(&subject.as_stream());
        subscription.unsubscribe();
        subject.next(9);
        assert!(seen.borrow().is_empty());
        assert_eq!(subject.observer_count(), 0);
    }

    #[test]
    fn late_observers_see_the_terminal_signal() {
        let subject: Subject<u32> = Subject::new();
        subject.complete();
        subject.next(3);
        let (seen, subscription) = collect(&subject.as_stream());
        assert!(seen.borrow().is_empty());
        assert!(subscription.is_closed());
        assert!(subject.is_closed());
    }
}
