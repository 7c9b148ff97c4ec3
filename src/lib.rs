//! Blocking bounded and rendezvous channels for thread pipelines.
//!
//! The engine is a monitor-style [`BlockingQueue`]: a mutex, two broadcast
//! condvars, close-and-drain semantics, cooperative cancellation through
//! [`CancelToken`], and capacity that can grow or shrink at runtime
//! (including in and out of rendezvous mode). [`Channel`] wraps a queue
//! with a name and per-channel deadline configuration, and the
//! [`operator`] module provides deadline-bounded send/receive, batch
//! variants, and stream composition (`merge`, `map`, `pipe`, `for_recv`).
//!
//! Capacity 0 builds a rendezvous channel: a send completes only once a
//! receive has taken the item, so at most one item is ever in flight.
//!
//! ```
//! use std::thread;
//!
//! let ch = freight::make::<String>(2);
//! let producer = ch.clone();
//! let worker = thread::spawn(move || {
//!     freight::send(&producer, "crate".to_string()).unwrap();
//!     freight::close(&producer);
//! });
//!
//! assert_eq!(freight::recv(&ch).unwrap(), "crate");
//! assert!(freight::recv(&ch).is_err()); // closed and drained
//! worker.join().unwrap();
//! ```
//!
//! Blocking operations never wait unboundedly by default: a channel without
//! an explicit deadline applies a one-minute horizon per operation
//! ([`DEFAULT_TIMEOUT`]), polled at [`DEFAULT_CHECK_INTERVAL`].

mod cancel;
mod channel;
mod error;
pub mod operator;
mod queue;

pub use cancel::CancelToken;
pub use channel::{Channel, DEFAULT_CHECK_INTERVAL, DEFAULT_TIMEOUT};
pub use error::{ChannelError, Result};
pub use operator::{
    close, expand, for_recv, make, map, merge, multi_recv, multi_send, pipe, recv, send,
    try_recv, try_send,
};
pub use queue::BlockingQueue;
