//! The error type carried by a stream's terminal `error` signal.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::warn;

/// A terminal stream failure.
///
/// Multicast sources (subjects, windows, groups) hand the same failure to every
/// attached subscriber, so the underlying `anyhow::Error` is shared behind an
/// `Arc` and the wrapper is cheap to clone.
#[derive(Clone)]
pub struct StreamError {
    inner: Arc<anyhow::Error>,
}

/// Result alias for fallible user-supplied functions (`try_map`, `try_filter`).
pub type StreamResult<T> = Result<T, StreamError>;

impl StreamError {
    /// Creates an error from a plain message.
    pub fn msg<M>(message: M) -> Self
    where
        M: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        Self::from_anyhow(anyhow::Error::msg(message))
    }

    pub fn from_anyhow(err: anyhow::Error) -> Self {
        Self {
            inner: Arc::new(err),
        }
    }

    fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let detail = match payload.downcast::<String>() {
            Ok(message) => *message,
            Err(payload) => match payload.downcast::<&'static str>() {
                Ok(message) => (*message).to_string(),
                Err(_) => "non-string panic payload".to_string(),
            },
        };
        Self::msg(format!("user function panicked: {detail}"))
    }

    /// Borrows the underlying `anyhow::Error`, e.g. to `downcast_ref` it.
    pub fn as_anyhow(&self) -> &anyhow::Error {
        &self.inner
    }
}

/// Runs a user-supplied function (mapper, predicate, key extractor), turning
/// a panic into a `StreamError` the operator can deliver downstream.
pub(crate) fn guard<R>(f: impl FnOnce() -> R) -> StreamResult<R> {
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        let error = StreamError::from_panic(payload);
        warn!(%error, "user function failed; ending the stream");
        error
    })
}

impl<E> From<E> for StreamError
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn from(err: E) -> Self {
        Self::from_anyhow(anyhow::Error::new(err))
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.inner, f)
    }
}

impl fmt::Debug for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.inner, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_same_error() {
        let err = StreamError::msg("boom");
        let copy = err.clone();
        assert_eq!(copy.to_string(), "boom");
        assert!(Arc::ptr_eq(&err.inner, &copy.inner));
    }

    #[test]
    fn guard_turns_a_panic_into_an_error() {
        assert_eq!(guard(|| 2 + 2).ok(), Some(4));
        let failed = guard(|| -> u32 { panic!("bad input {}", 7) });
        assert_eq!(
            failed.err().map(|e| e.to_string()),
            Some("user function panicked: bad input 7".to_string())
        );
    }

    #[test]
    fn converts_std_errors() {
        let parse = "x".parse::<u32>().unwrap_err();
        let err: StreamError = parse.into();
        assert!(err.as_anyhow().downcast_ref::<std::num::ParseIntError>().is_some());
    }
}
