//! Push-driven producer: a [`Publisher`] handle paired with the
//! [`PublisherSource`] that the delivery task pulls from.
//!
//! Values travel through an unbounded event channel whose length is policed by
//! a semaphore, so `push` never blocks and `send` waits for room. Terminal
//! events share the same channel as values, which keeps "complete after the
//! queue drains" ordered for free. A failure closes the queue the same way:
//! values already queued still drain, then the error is the last frame, and
//! any push that loses the race to `fail` is rejected.

use super::{CompletionLatch, Producer, Pull};
use crate::error::{Error, ProducerError, PushError, Result};
use core::{
    num::NonZeroUsize,
    pin::Pin,
    task::{Context, Poll, ready},
};
use parking_lot::Mutex;
use portable_atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Semaphore, TryAcquireError, mpsc};

/// Queue policy for a publisher-backed stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublisherConfig {
    /// Maximum number of values pushed but not yet pulled by the delivery
    /// task. `None` disables the bound.
    pub capacity: Option<NonZeroUsize>,
}

impl PublisherConfig {
    /// Default bound on pending values.
    pub const DEFAULT_CAPACITY: NonZeroUsize = NonZeroUsize::new(128).unwrap();

    /// A queue holding at most `capacity` pending values, clamped to
    /// `1..=Semaphore::MAX_PERMITS`.
    pub fn bounded(capacity: usize) -> Self {
        let capacity = capacity.min(Semaphore::MAX_PERMITS);
        Self {
            capacity: Some(NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN)),
        }
    }

    /// A queue that never reports [`PushError::Full`].
    pub const fn unbounded() -> Self {
        Self { capacity: None }
    }
}

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            capacity: Some(Self::DEFAULT_CAPACITY),
        }
    }
}

enum Event<T> {
    Item(T),
    Complete,
    Fail(ProducerError),
}

struct Shared<T> {
    /// `None` once the stream is terminated from either side.
    sender: Mutex<Option<mpsc::UnboundedSender<Event<T>>>>,
    slots: Option<Semaphore>,
    handles: AtomicUsize,
    latch: CompletionLatch,
}

impl<T> Shared<T> {
    /// Stops accepting values. Returns the sender if this call closed it.
    fn close(&self) -> Option<mpsc::UnboundedSender<Event<T>>> {
        let sender = self.sender.lock().take();
        if let Some(slots) = &self.slots {
            slots.close();
        }
        sender
    }

    fn release_slot(&self) {
        if let Some(slots) = &self.slots {
            slots.add_permits(1);
        }
    }
}

/// Producer-facing handle of a publisher-backed stream.
///
/// Created together with its stream by
/// [`ServerStream::publisher`](crate::ServerStream::publisher). The handle is
/// `Clone + Send + Sync`; any clone on any thread may push. Delivery is still
/// serialized on the stream's delivery task in push order.
///
/// Dropping every clone without calling [`complete`](Self::complete) or
/// [`fail`](Self::fail) ends the stream normally once queued values drain.
pub struct Publisher<T> {
    shared: Arc<Shared<T>>,
}

/// Consuming half of a publisher queue, stored inside the stream.
pub struct PublisherSource<T> {
    rx: mpsc::UnboundedReceiver<Event<T>>,
    shared: Arc<Shared<T>>,
    finished: bool,
}

/// Creates a connected publisher pair.
///
/// `on_complete_or_cancel` runs exactly once: when the delivery task observes
/// the end or the failure of the stream, when the remote side cancels it, or
/// when the source is dropped without ever being bound.
pub fn publisher<T, F>(
    config: PublisherConfig,
    on_complete_or_cancel: F,
) -> (PublisherSource<T>, Publisher<T>)
where
    F: FnOnce() + Send + 'static,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let shared = Arc::new(Shared {
        sender: Mutex::new(Some(tx)),
        slots: config
            .capacity
            .map(|n| Semaphore::new(n.get().min(Semaphore::MAX_PERMITS))),
        handles: AtomicUsize::new(1),
        latch: CompletionLatch::new(on_complete_or_cancel),
    });

    (
        PublisherSource {
            rx,
            shared: Arc::clone(&shared),
            finished: false,
        },
        Publisher { shared },
    )
}

impl<T> Publisher<T> {
    /// Enqueues a value without waiting.
    ///
    /// # Errors
    ///
    /// - [`PushError::Full`] if the queue is at capacity.
    /// - [`PushError::Closed`] if the stream already completed, failed, or
    ///   was cancelled.
    pub fn push(&self, value: T) -> core::result::Result<(), PushError<T>> {
        if let Some(slots) = &self.shared.slots {
            match slots.try_acquire() {
                Ok(permit) => permit.forget(),
                Err(TryAcquireError::NoPermits) => return Err(PushError::Full(value)),
                Err(TryAcquireError::Closed) => return Err(PushError::Closed(value)),
            }
        }
        self.enqueue(value)
    }

    /// Enqueues a value, waiting for queue capacity if the stream is bounded.
    ///
    /// # Errors
    ///
    /// Returns [`PushError::Closed`] if the stream terminates before or while
    /// waiting.
    pub async fn send(&self, value: T) -> core::result::Result<(), PushError<T>> {
        if let Some(slots) = &self.shared.slots {
            match slots.acquire().await {
                Ok(permit) => permit.forget(),
                Err(_) => return Err(PushError::Closed(value)),
            }
        }
        self.enqueue(value)
    }

    fn enqueue(&self, value: T) -> core::result::Result<(), PushError<T>> {
        let sender = self.shared.sender.lock();
        let Some(tx) = sender.as_ref() else {
            drop(sender);
            self.shared.release_slot();
            return Err(PushError::Closed(value));
        };

        if let Err(mpsc::error::SendError(Event::Item(value))) = tx.send(Event::Item(value)) {
            drop(sender);
            self.shared.release_slot();
            return Err(PushError::Closed(value));
        }
        Ok(())
    }

    /// Ends the stream after every value already queued is delivered.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PublisherClosed`] if the stream already terminated.
    pub fn complete(&self) -> Result<()> {
        let tx = self.shared.close().ok_or(Error::PublisherClosed)?;
        #[cfg(feature = "tracing")]
        tracing::trace!("Publisher completed");
        // The receiver outlives the sender slot; a failed send means it is
        // already gone and the latch has fired.
        let _ = tx.send(Event::Complete);
        Ok(())
    }

    /// Ends the stream with `error` once the values queued before this call
    /// are delivered. Pushes that lose the race to `fail` are rejected, so no
    /// value ever follows the error frame.
    ///
    /// # Errors
    ///
    /// Returns [`Error::PublisherClosed`] if the stream already terminated.
    pub fn fail(&self, error: impl Into<ProducerError>) -> Result<()> {
        let error = error.into();
        let tx = self.shared.close().ok_or(Error::PublisherClosed)?;
        #[cfg(feature = "tracing")]
        tracing::debug!("Publisher failed: {}", error);
        let _ = tx.send(Event::Fail(error));
        Ok(())
    }

    /// Whether the stream has stopped accepting values.
    pub fn is_closed(&self) -> bool {
        self.shared.sender.lock().is_none() || self.shared.latch.has_fired()
    }

    /// Resolves once the stream has finished on the consumer side: drained,
    /// failed, cancelled, or dropped. Background feeders select on this to
    /// stop producing.
    pub async fn closed(&self) {
        self.shared.latch.wait().await;
    }
}

impl<T> Clone for Publisher<T> {
    fn clone(&self) -> Self {
        self.shared.handles.fetch_add(1, Ordering::Relaxed);
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Drop for Publisher<T> {
    fn drop(&mut self) {
        if self.shared.handles.fetch_sub(1, Ordering::AcqRel) == 1 {
            // Last handle: dropping the sender lets the source drain and end.
            drop(self.shared.close());
        }
    }
}

impl<T> core::fmt::Debug for Publisher<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Publisher")
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

impl<T> PublisherSource<T> {
    fn release(&mut self) {
        self.finished = true;
        drop(self.shared.close());
        self.rx.close();
        self.shared.latch.fire();
    }
}

impl<T: Send> Producer<T> for PublisherSource<T> {
    fn poll_pull(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Pull<T>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(Pull::End);
        }

        let pulled = match ready!(this.rx.poll_recv(cx)) {
            Some(Event::Item(value)) => {
                this.shared.release_slot();
                return Poll::Ready(Pull::Item(value));
            }
            Some(Event::Complete) | None => Pull::End,
            Some(Event::Fail(error)) => Pull::Failed(error),
        };
        this.release();
        Poll::Ready(pulled)
    }

    fn on_cancel(self: Pin<&mut Self>) {
        #[cfg(feature = "tracing")]
        tracing::debug!("Publisher stream cancelled");
        self.get_mut().release();
    }
}

impl<T> Drop for PublisherSource<T> {
    fn drop(&mut self) {
        // No-op when the stream already finished.
        self.release();
    }
}

#[cfg(test)]
mod tests;
