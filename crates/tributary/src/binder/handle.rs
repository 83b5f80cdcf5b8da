use super::state::{BinderState, StateCell};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// Per-stream control block shared by the delivery task and every
/// [`StreamServerHandle`].
pub(crate) struct Control {
    pub(crate) state: Arc<StateCell>,
    /// Cancelled when the remote side cancels.
    pub(crate) cancel: CancellationToken,
    /// Cancelled once the delivery task has torn down.
    pub(crate) done: CancellationToken,
    /// `None` means unlimited credits.
    pub(crate) credits: Option<Semaphore>,
}

impl Control {
    pub(crate) fn new(state: Arc<StateCell>, initial_credits: Option<u32>) -> Self {
        Self {
            state,
            cancel: CancellationToken::new(),
            done: CancellationToken::new(),
            credits: initial_credits.map(|n| Semaphore::new(n as usize)),
        }
    }
}

/// The server side of a bound stream, as seen by the transport.
///
/// Handed to the remote callback in the first-response handshake. It is cheap
/// to clone and every method is safe to call from any thread.
#[derive(Clone)]
pub struct StreamServerHandle {
    pub(crate) control: Arc<Control>,
}

impl StreamServerHandle {
    pub(crate) const fn new(control: Arc<Control>) -> Self {
        Self { control }
    }

    /// Cancels the stream on behalf of the remote side.
    ///
    /// Returns `true` if this call cancelled the stream, `false` if it was
    /// already cancelled or a terminal frame was already handed to the
    /// transport. Calling it repeatedly is harmless.
    pub fn cancel(&self) -> bool {
        if !self.control.state.advance(BinderState::Cancelled) {
            return false;
        }

        #[cfg(feature = "tracing")]
        tracing::debug!("Stream cancelled by remote");
        self.control.cancel.cancel();
        true
    }

    /// Grants `n` more items of flow-control credit.
    ///
    /// Has no effect on streams bound without a credit limit.
    pub fn request(&self, n: u32) {
        if let Some(credits) = &self.control.credits {
            let room = Semaphore::MAX_PERMITS.saturating_sub(credits.available_permits());
            credits.add_permits((n as usize).min(room));
        }
    }

    pub fn state(&self) -> BinderState {
        self.control.state.get()
    }

    pub fn is_cancelled(&self) -> bool {
        self.control.cancel.is_cancelled()
    }

    /// Whether the delivery task has finished and released the callback.
    pub fn is_finished(&self) -> bool {
        self.control.done.is_cancelled()
    }

    /// Resolves once the delivery task has finished, whatever the outcome.
    pub async fn finished(&self) {
        self.control.done.cancelled().await;
    }
}

impl core::fmt::Debug for StreamServerHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StreamServerHandle")
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
