//! # Tidestream
//!
//! A push-based reactive stream engine for Rust, with scheduler-driven
//! windowing.
//!
//! Tidestream composes operators over live, unbounded, push-driven sequences
//! and lets a pluggable scheduler decide when time-based operators fire. It
//! ships with a small social-media feed model and the metrics derived from it
//! (sampling, per-minute counts, interesting-post filtering, trending tags).
//!
//! ## Core Concepts
//!
//! - **Stream**: a typed, possibly infinite sequence of values followed by at
//!   most one terminal signal (`complete` or `error`). Streams are recipes:
//!   each subscription runs its own production. A `Subject` is the hot,
//!   multicast source you push values into.
//! - **Subscription**: owns every resource one subscriber uses. Cancelling it
//!   synchronously stops all timers and upstream attachments.
//! - **Scheduler**: the single source of time. Every time-based operator takes
//!   a `SchedulerRef`; use `RealTimeScheduler` in production and
//!   `VirtualScheduler` to step time deterministically in tests.
//! - **Operators**: `map`, `filter`, `distinct`, `sample`,
//!   `buffer_with_time`, `window_with_time`, `group_by`, `flat_map`,
//!   `merge_all`, `count` and `to_vec`, all inherent methods on `Stream`.
//!
//! The engine is single-threaded and cooperative: delivery is synchronous,
//! and a chain of operators stays on the thread of its scheduler.
//!
//! ## Example Usage
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use std::time::Duration;
//! use tidestream::prelude::*;
//!
//! // 1. Create a virtual clock and a hot source.
//! let scheduler = VirtualScheduler::new();
//! let feed = Subject::new();
//!
//! // 2. Count values per 10-second window.
//! let counts = feed
//!     .as_stream()
//!     .buffer_with_time(Duration::from_secs(10), scheduler.shared())
//!     .map(|batch: Vec<u32>| batch.len());
//!
//! // 3. Subscribe before pushing: the source is hot.
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let sink = seen.clone();
//! let _subscription = counts.subscribe_next(move |n| sink.borrow_mut().push(n));
//!
//! // 4. Push values and step time.
//! feed.next(1);
//! feed.next(2);
//! scheduler.advance_by(Duration::from_secs(10));
//! scheduler.advance_by(Duration::from_secs(10));
//! assert_eq!(*seen.borrow(), vec![2, 0]);
//! ```

pub const ENGINE_NAME: &str = "Tidestream";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Declare all the modules in the crate.
pub mod common;
pub mod config;
pub mod error;
pub mod feed;
pub mod operators;
pub mod scheduler;
pub mod stream;

/// A prelude module for easy importing of the most common Tidestream types.
pub mod prelude {
    pub use crate::common::{GroupId, ObserverId, TimerId, Timestamp};
    pub use crate::config::{RateStrategy, TidestreamConfig};
    pub use crate::error::{StreamError, StreamResult};
    pub use crate::feed::{Post, PostId, TagCount};
    pub use crate::operators::{DedupRetention, GroupEviction, GroupedStream};
    pub use crate::scheduler::{
        CancelToken, RealTimeScheduler, Scheduler, SchedulerRef, VirtualScheduler,
    };
    pub use crate::stream::{
        Observer, Stream, Subject, Subscriber, Subscription, SubscriptionState,
    };
}
