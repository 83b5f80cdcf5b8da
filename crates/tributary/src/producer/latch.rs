use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

type Callback = Box<dyn FnOnce() + Send>;

/// Single-fire completion latch.
///
/// Holds the producer's completion-or-cancel callback and a token that
/// producers can wait on. Concurrent `fire` calls race for the callback; only
/// the first one runs it.
pub(crate) struct CompletionLatch {
    callback: Mutex<Option<Callback>>,
    fired: CancellationToken,
}

impl CompletionLatch {
    pub(crate) fn new(callback: impl FnOnce() + Send + 'static) -> Self {
        Self {
            callback: Mutex::new(Some(Box::new(callback))),
            fired: CancellationToken::new(),
        }
    }

    /// Runs the callback if it has not run yet. Returns whether this call
    /// was the one that fired.
    pub(crate) fn fire(&self) -> bool {
        // Take under the lock, invoke outside of it.
        let callback = self.callback.lock().take();
        match callback {
            Some(callback) => {
                self.fired.cancel();
                callback();
                true
            }
            None => false,
        }
    }

    pub(crate) fn has_fired(&self) -> bool {
        self.fired.is_cancelled()
    }

    pub(crate) async fn wait(&self) {
        self.fired.cancelled().await;
    }
}
