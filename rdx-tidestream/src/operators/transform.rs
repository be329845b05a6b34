//! Stateless per-event transforms.
//!
//! A user function that panics ends the stream with an error instead of
//! unwinding into the producer.

use super::Relay;
use crate::error::{guard, StreamResult};
use crate::stream::{Stream, Subscriber};
use std::rc::Rc;

impl<T: 'static> Stream<T> {
    /// Transforms every value with `f`.
    pub fn map<U, F>(&self, f: F) -> Stream<U>
    where
        U: 'static,
        F: Fn(T) -> U + 'static,
    {
        let f = Rc::new(f);
        self.lift(move |downstream| {
            let f = f.clone();
            Relay::new(downstream, move |value: T, out: &Subscriber<U>| {
                match guard(|| f(value)) {
                    Ok(mapped) => out.next(mapped),
                    Err(error) => out.error(error),
                }
            })
        })
    }

    /// Like `map`, but an `Err` returned by `f` ends the stream with that error.
    pub fn try_map<U, F>(&self, f: F) -> Stream<U>
    where
        U: 'static,
        F: Fn(T) -> StreamResult<U> + 'static,
    {
        let f = Rc::new(f);
        self.lift(move |downstream| {
            let f = f.clone();
            Relay::new(downstream, move |value: T, out: &Subscriber<U>| {
                match guard(|| f(value)).and_then(|result| result) {
                    Ok(mapped) => out.next(mapped),
                    Err(error) => out.error(error),
                }
            })
        })
    }

    /// Keeps the values for which `predicate` holds.
    pub fn filter<P>(&self, predicate: P) -> Stream<T>
    where
        P: Fn(&T) -> bool + 'static,
    {
        let predicate = Rc::new(predicate);
        self.lift(move |downstream| {
            let predicate = predicate.clone();
            Relay::new(downstream, move |value: T, out: &Subscriber<T>| {
                match guard(|| predicate(&value)) {
                    Ok(true) => out.next(value),
                    Ok(false) => {}
                    Err(error) => out.error(error),
                }
            })
        })
    }

    /// Like `filter`, but an `Err` returned by `predicate` ends the stream.
    pub fn try_filter<P>(&self, predicate: P) -> Stream<T>
    where
        P: Fn(&T) -> StreamResult<bool> + 'static,
    {
        let predicate = Rc::new(predicate);
        self.lift(move |downstream| {
            let predicate = predicate.clone();
            Relay::new(downstream, move |value: T, out: &Subscriber<T>| {
                match guard(|| predicate(&value)).and_then(|result| result) {
                    Ok(true) => out.next(value),
                    Ok(false) => {}
                    Err(error) => out.error(error),
                }
            })
        })
    }

    /// Runs `effect` on every value and passes the value through unchanged.
    pub fn tap<F>(&self, effect: F) -> Stream<T>
    where
        F: Fn(&T) + 'static,
    {
        let effect = Rc::new(effect);
        self.lift(move |downstream| {
            let effect = effect.clone();
            Relay::new(downstream, move |value: T, out: &Subscriber<T>| {
                match guard(|| effect(&value)) {
                    Ok(()) => out.next(value),
                    Err(error) => out.error(error),
                }
            })
        })
    }
}
