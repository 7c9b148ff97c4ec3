use thiserror::Error;

/// Convenience alias for operator-layer results.
pub type Result<T> = std::result::Result<T, ChannelError>;

/// Errors reported by the deadline-bounded operator layer.
///
/// The queue primitives themselves never construct these; they report
/// outcomes by value (`Result<(), T>` handing the item back, `Option<T>`)
/// and the operators translate outcome plus observed channel state into
/// this enum.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelError {
    /// The send or receive deadline elapsed before the operation completed.
    #[error("channel: send/recv timeout")]
    Timeout,
    /// The channel is closed: sends are refused, and receives have already
    /// drained everything that was buffered before the close.
    #[error("channel: access a closed channel")]
    Closed,
    /// A capacity change was rejected: the resulting capacity would be
    /// negative or smaller than the number of items currently held.
    #[error("channel: invalid capacity change")]
    InvalidCapacity,
}
