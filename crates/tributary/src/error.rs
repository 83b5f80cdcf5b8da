//! Error types for the streaming-response bridge.
//!
//! ## Error Cases
//! - `Producer`: the handler's producer failed. On the wire this always
//!   becomes an encoded error frame; the variant exists so the failure can be
//!   carried as a Rust error where one is needed.
//! - `AlreadyBound`: a stream was bound a second time.
//! - `PublisherClosed`: `complete` or `fail` was called on a publisher whose
//!   stream already terminated.
//! - `Encode`: the encoder rejected a value or an error.
//! - `Transport`: the remote callback reported a failure.
//! - `TaskFailed`: the delivery task panicked or was aborted.
//!
//! Remote cancellation is not an error and never shows up here.

use core::fmt;
use std::sync::Arc;

pub type Result<T> = core::result::Result<T, Error>;

/// Unified error type for stream binding and delivery.
#[derive(Clone, thiserror::Error, Debug)]
pub enum Error {
    /// The producer adapter signalled a terminal failure.
    #[error("Producer error: {0}")]
    Producer(#[from] ProducerError),

    /// The stream has already been bound to a remote callback.
    #[error("Stream is already bound")]
    AlreadyBound,

    /// The publisher's stream already reached a terminal state.
    #[error("Publisher is closed")]
    PublisherClosed,

    /// Encoding an item or an error frame failed.
    #[error("Encode error: {context}")]
    Encode { context: String },

    /// The remote callback failed to accept a frame.
    #[error("Transport error: {context}")]
    Transport { context: String },

    /// The delivery task did not run to completion.
    #[error("Delivery task failed: {context}")]
    TaskFailed { context: String },
}

impl Error {
    /// Convenience constructor for [`Error::Encode`].
    pub fn encode(context: impl Into<String>) -> Self {
        Self::Encode {
            context: context.into(),
        }
    }

    /// Convenience constructor for [`Error::Transport`].
    pub fn transport(context: impl Into<String>) -> Self {
        Self::Transport {
            context: context.into(),
        }
    }
}

/// A terminal failure raised by a producer.
///
/// Generators, pipelines and publishers all surface their failures as a
/// `ProducerError`, which the encoder then turns into the stream's final error
/// frame. It is cheap to clone so the same failure can be logged, encoded and
/// returned without re-allocating the source.
#[derive(Clone)]
pub struct ProducerError {
    message: String,
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl ProducerError {
    /// Creates a failure carrying only a message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Wraps an arbitrary error, keeping it reachable through
    /// [`std::error::Error::source`].
    pub fn from_error<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self {
            message: err.to_string(),
            source: Some(Arc::new(err)),
        }
    }

    /// The human-readable failure message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Debug for ProducerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProducerError")
            .field("message", &self.message)
            .field("has_source", &self.source.is_some())
            .finish()
    }
}

impl fmt::Display for ProducerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ProducerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

// Failures compare by message; sources are not comparable.
impl PartialEq for ProducerError {
    fn eq(&self, other: &Self) -> bool {
        self.message == other.message
    }
}

impl Eq for ProducerError {}

impl From<&str> for ProducerError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

impl From<String> for ProducerError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<std::io::Error> for ProducerError {
    fn from(err: std::io::Error) -> Self {
        Self::from_error(err)
    }
}

impl From<core::convert::Infallible> for ProducerError {
    fn from(never: core::convert::Infallible) -> Self {
        match never {}
    }
}

/// Returned by [`Publisher::push`](crate::Publisher::push) and
/// [`Publisher::send`](crate::Publisher::send) when a value cannot be
/// enqueued. The rejected value is handed back.
#[derive(Clone, PartialEq, Eq, thiserror::Error)]
pub enum PushError<T> {
    /// The bounded queue is at capacity.
    #[error("Publisher queue is full")]
    Full(T),

    /// The stream completed, failed, or was cancelled by the remote side.
    #[error("Publisher is closed")]
    Closed(T),
}

impl<T> PushError<T> {
    /// Recovers the value that could not be pushed.
    pub fn into_inner(self) -> T {
        match self {
            Self::Full(value) | Self::Closed(value) => value,
        }
    }

    /// Whether the push failed because the stream is closed for good.
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::Closed(_))
    }
}

impl<T> fmt::Debug for PushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full(_) => f.write_str("Full(..)"),
            Self::Closed(_) => f.write_str("Closed(..)"),
        }
    }
}
