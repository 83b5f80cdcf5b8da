//! Producer adapters.
//!
//! Every way a handler can produce a stream is reduced to [`Producer`], a
//! resumable source with a single `poll_pull` operation. The delivery task
//! only ever talks to this trait, so generators, pipelines and publishers are
//! interchangeable behind [`ServerStream`](crate::ServerStream).
//!
//! - [`GeneratorProducer`] - wraps a pull-based async generator.
//! - [`PipelineProducer`] - maps an existing fallible stream into the wire
//!   element type.
//! - [`PublisherSource`] - the consuming half of a [`Publisher`] queue.

mod generator;
mod latch;
mod pipeline;
mod publisher;

pub use generator::*;
pub(crate) use latch::CompletionLatch;
pub use pipeline::*;
pub use publisher::*;

use crate::error::ProducerError;
use core::{
    pin::Pin,
    task::{Context, Poll},
};

/// The outcome of a single pull from a [`Producer`].
///
/// `Poll::Pending` from [`Producer::poll_pull`] means "nothing ready yet";
/// the producer has registered the waker and will wake the delivery task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pull<T> {
    /// The next value of the stream.
    Item(T),
    /// The stream ended normally.
    End,
    /// The stream ended with a failure.
    Failed(ProducerError),
}

impl<T> Pull<T> {
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Item(_))
    }
}

/// A resumable source of stream values.
///
/// After returning [`Pull::End`] or [`Pull::Failed`] a producer is never
/// pulled again.
pub trait Producer<T>: Send {
    /// Attempts to pull the next value.
    fn poll_pull(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Pull<T>>;

    /// Called exactly once if the stream stops before the producer reached a
    /// terminal value: remote cancellation, or a transport failure.
    ///
    /// Producers that own external resources release them here. The default
    /// does nothing; dropping the producer is enough for most adapters.
    fn on_cancel(self: Pin<&mut Self>) {}
}

/// A type-erased producer, as stored inside a [`ServerStream`](crate::ServerStream).
pub type BoxProducer<T> = Pin<Box<dyn Producer<T> + Send>>;

impl<T, P> Producer<T> for Pin<Box<P>>
where
    P: Producer<T> + ?Sized,
{
    fn poll_pull(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Pull<T>> {
        self.get_mut().as_mut().poll_pull(cx)
    }

    fn on_cancel(self: Pin<&mut Self>) {
        self.get_mut().as_mut().on_cancel();
    }
}
