//! Binding a [`ServerStream`](crate::ServerStream) to the wire.
//!
//! A stream is described first and connected later. The handler builds a
//! producer; dispatch then supplies the encoder, the executor, and the remote
//! callback. [`StreamBinder::bind`] is the only transition out of
//! [`BinderState::Unbound`] and can succeed once. It spawns one delivery task
//! on the supplied executor, which sends the first-response handshake and then
//! pulls, encodes, and forwards items until the stream ends, fails, or is
//! cancelled through its [`StreamServerHandle`].
//!
//! ## Structure
//!
//! - [`StreamBinder`] - the runtime-checked `Unbound -> Bound` transition.
//! - [`Binding`] - everything dispatch supplies at bind time.
//! - [`BoundStream`] - dispatch's view of a running stream.
//! - [`StreamFactory`] - two-phase form: executor and encoder first, callback
//!   later.
//! - [`StreamServerHandle`] - the transport's view: cancel and credits.

mod delivery;
mod handle;
mod state;

pub use handle::StreamServerHandle;
pub use state::{BinderState, StreamOutcome};

use crate::{
    callback::ClientCallback,
    encoder::Encoder,
    error::{Error, Result},
    payload::FirstResponsePayload,
    producer::BoxProducer,
};
use delivery::Delivery;
use handle::Control;
use state::StateCell;
use std::sync::Arc;
use tokio::{runtime::Handle, task::JoinHandle};

/// Everything dispatch supplies to leave [`BinderState::Unbound`].
pub struct Binding<E, C> {
    pub encoder: E,
    /// Executor the delivery task is spawned on.
    pub executor: Handle,
    pub callback: C,
    /// Sent in the first-response handshake. Empty unless the method also
    /// returns a unary response.
    pub first_response: FirstResponsePayload,
    /// Initial flow-control credits; `None` delivers without waiting for
    /// credit.
    pub initial_credits: Option<u32>,
}

impl<E, C> Binding<E, C> {
    pub fn new(encoder: E, executor: Handle, callback: C) -> Self {
        Self {
            encoder,
            executor,
            callback,
            first_response: FirstResponsePayload::empty(),
            initial_credits: None,
        }
    }

    #[must_use]
    pub fn with_first_response(mut self, payload: FirstResponsePayload) -> Self {
        self.first_response = payload;
        self
    }

    /// Limits delivery to `credits` items until the transport grants more via
    /// [`StreamServerHandle::request`].
    #[must_use]
    pub fn with_credits(mut self, credits: u32) -> Self {
        self.initial_credits = Some(credits);
        self
    }
}

/// Holds a stream's producer until it is bound.
///
/// Dropping an unbound binder drops the producer, which releases it.
pub struct StreamBinder<T> {
    producer: Option<BoxProducer<T>>,
    state: Arc<StateCell>,
}

impl<T: Send + 'static> StreamBinder<T> {
    pub(crate) fn new(producer: BoxProducer<T>) -> Self {
        Self {
            producer: Some(producer),
            state: Arc::new(StateCell::new()),
        }
    }

    pub fn state(&self) -> BinderState {
        self.state.get()
    }

    /// Binds the stream and starts delivery on `binding.executor`.
    ///
    /// Must be called from a context where `binding.executor` accepts spawns
    /// (any thread, as long as the runtime is alive).
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyBound`] if this binder was already bound.
    pub fn bind<E, C>(&mut self, binding: Binding<E, C>) -> Result<BoundStream>
    where
        E: Encoder<T>,
        C: ClientCallback,
    {
        if !self.state.bind() {
            return Err(Error::AlreadyBound);
        }
        let producer = self.producer.take().ok_or(Error::AlreadyBound)?;

        let Binding {
            encoder,
            executor,
            callback,
            first_response,
            initial_credits,
        } = binding;

        let control = Arc::new(Control::new(Arc::clone(&self.state), initial_credits));
        let server = StreamServerHandle::new(Arc::clone(&control));

        let fut =
            Delivery::new(producer, encoder, control).run(callback, first_response, server.clone());
        #[cfg(feature = "tracing")]
        let fut = {
            use tracing::Instrument;
            let span = tracing::debug_span!("stream", credits = ?initial_credits);
            fut.instrument(span)
        };

        let task = executor.spawn(fut);
        Ok(BoundStream { server, task })
    }
}

impl<T> core::fmt::Debug for StreamBinder<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StreamBinder")
            .field("state", &self.state.get())
            .finish_non_exhaustive()
    }
}

/// A stream whose delivery task is running.
///
/// Dropping it detaches the task; delivery continues until a terminal state.
#[derive(Debug)]
pub struct BoundStream {
    server: StreamServerHandle,
    task: JoinHandle<Result<StreamOutcome>>,
}

impl BoundStream {
    /// The same handle the transport received in the handshake.
    pub fn server_handle(&self) -> StreamServerHandle {
        self.server.clone()
    }

    pub fn state(&self) -> BinderState {
        self.server.state()
    }

    /// See [`StreamServerHandle::cancel`].
    pub fn cancel(&self) -> bool {
        self.server.cancel()
    }

    /// Waits for the delivery task and returns how the stream ended.
    ///
    /// # Errors
    ///
    /// - [`Error::Encode`] / [`Error::Transport`] if delivery failed.
    /// - [`Error::TaskFailed`] if the task panicked or its runtime shut down.
    pub async fn join(self) -> Result<StreamOutcome> {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => Err(Error::TaskFailed {
                context: e.to_string(),
            }),
        }
    }
}

/// A stream with its executor and encoder fixed, waiting for the remote
/// callback.
pub struct StreamFactory<T, E> {
    binder: StreamBinder<T>,
    executor: Handle,
    encoder: E,
    initial_credits: Option<u32>,
}

impl<T, E> StreamFactory<T, E>
where
    T: Send + 'static,
    E: Encoder<T>,
{
    pub(crate) const fn new(binder: StreamBinder<T>, executor: Handle, encoder: E) -> Self {
        Self {
            binder,
            executor,
            encoder,
            initial_credits: None,
        }
    }

    /// See [`Binding::with_credits`].
    #[must_use]
    pub fn with_credits(mut self, credits: u32) -> Self {
        self.initial_credits = Some(credits);
        self
    }

    /// Binds the stream to `callback`, sending `first_response` in the
    /// handshake.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyBound`] if the underlying binder was already
    /// bound.
    pub fn start<C>(
        mut self,
        first_response: FirstResponsePayload,
        callback: C,
    ) -> Result<BoundStream>
    where
        C: ClientCallback,
    {
        let mut binding =
            Binding::new(self.encoder, self.executor, callback).with_first_response(first_response);
        binding.initial_credits = self.initial_credits;
        self.binder.bind(binding)
    }
}
