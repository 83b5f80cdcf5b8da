use super::{
    handle::{Control, StreamServerHandle},
    state::{BinderState, StreamOutcome},
};
use crate::{
    callback::ClientCallback,
    encoder::Encoder,
    error::{ProducerError, Result},
    payload::FirstResponsePayload,
    producer::{BoxProducer, Pull},
};
use core::future::poll_fn;
use std::sync::Arc;
use tokio::sync::SemaphorePermit;

/// The bound half of a stream: everything the delivery task needs, fixed at
/// bind time.
pub(crate) struct Delivery<T, E> {
    producer: BoxProducer<T>,
    /// Set once the producer returned `End` or `Failed`.
    producer_done: bool,
    encoder: E,
    control: Arc<Control>,
}

impl<T, E> Delivery<T, E>
where
    T: Send + 'static,
    E: Encoder<T>,
{
    pub(crate) const fn new(producer: BoxProducer<T>, encoder: E, control: Arc<Control>) -> Self {
        Self {
            producer,
            producer_done: false,
            encoder,
            control,
        }
    }

    /// Drives the stream to a terminal state on the current task.
    ///
    /// Whatever the outcome, the callback is dropped, the producer is
    /// released exactly once, and `done` is signalled before this returns.
    pub(crate) async fn run<C>(
        mut self,
        mut callback: C,
        first_response: FirstResponsePayload,
        server: StreamServerHandle,
    ) -> Result<StreamOutcome>
    where
        C: ClientCallback,
    {
        let result = self.deliver(&mut callback, first_response, server).await;
        drop(callback);

        match &result {
            Ok(StreamOutcome::Completed | StreamOutcome::Failed) => {}
            Ok(StreamOutcome::Cancelled) => {
                #[cfg(feature = "tracing")]
                tracing::debug!("Stream delivery stopped after cancellation");
                self.release_producer();
            }
            Err(_e) => {
                #[cfg(feature = "tracing")]
                tracing::warn!("Stream delivery failed: {}", _e);
                self.control.state.advance(BinderState::Failed);
                self.release_producer();
            }
        }

        self.control.done.cancel();
        result
    }

    fn release_producer(&mut self) {
        if !self.producer_done {
            self.producer_done = true;
            self.producer.as_mut().on_cancel();
        }
    }

    async fn deliver<C>(
        &mut self,
        callback: &mut C,
        first_response: FirstResponsePayload,
        server: StreamServerHandle,
    ) -> Result<StreamOutcome>
    where
        C: ClientCallback,
    {
        let Self {
            producer,
            producer_done,
            encoder,
            control,
        } = self;

        // Cancelled between bind and the first poll of this task.
        if !control.state.advance(BinderState::Delivering) {
            return Ok(StreamOutcome::Cancelled);
        }

        let handshake = tokio::select! {
            biased;
            () = control.cancel.cancelled() => None,
            sent = callback.on_first_response(first_response, server) => Some(sent),
        };
        match handshake {
            None => return Ok(StreamOutcome::Cancelled),
            Some(Err(_)) if control.cancel.is_cancelled() => {
                return Ok(StreamOutcome::Cancelled);
            }
            Some(sent) => sent?,
        }

        loop {
            if !control.state.advance(BinderState::AwaitingNext) {
                return Ok(StreamOutcome::Cancelled);
            }

            let pulled = tokio::select! {
                biased;
                () = control.cancel.cancelled() => None,
                pulled = poll_fn(|cx| producer.as_mut().poll_pull(cx)) => Some(pulled),
            };
            let Some(pulled) = pulled else {
                return Ok(StreamOutcome::Cancelled);
            };

            match pulled {
                Pull::Item(item) => {
                    // Credits gate items only; terminal frames never wait.
                    if let Some(credits) = &control.credits {
                        let granted = tokio::select! {
                            biased;
                            () = control.cancel.cancelled() => false,
                            permit = credits.acquire() => {
                                permit.map(SemaphorePermit::forget).is_ok()
                            }
                        };
                        if !granted {
                            return Ok(StreamOutcome::Cancelled);
                        }
                    }
                    if !control.state.advance(BinderState::Delivering) {
                        return Ok(StreamOutcome::Cancelled);
                    }

                    let payload = match encoder.encode(item) {
                        Ok(payload) => payload,
                        Err(e) => {
                            // The error frame is terminal, so claim `Failed`
                            // before it is handed to the transport.
                            if !control.state.advance(BinderState::Failed) {
                                return Ok(StreamOutcome::Cancelled);
                            }
                            // Best effort: the remote side may already be gone.
                            let reason = ProducerError::new(e.to_string());
                            if let Ok(encoded) = encoder.encode_error(reason) {
                                if let Err(_e) = callback.on_stream_error(encoded).await {
                                    #[cfg(feature = "tracing")]
                                    tracing::debug!("Failed to forward encode error: {}", _e);
                                }
                            }
                            return Err(e);
                        }
                    };

                    let sent = tokio::select! {
                        biased;
                        () = control.cancel.cancelled() => None,
                        sent = callback.on_stream_next(payload) => Some(sent),
                    };
                    match sent {
                        None => return Ok(StreamOutcome::Cancelled),
                        // A send broken by a concurrent disconnect is the
                        // cancellation, not a transport failure.
                        Some(Err(_)) if control.cancel.is_cancelled() => {
                            return Ok(StreamOutcome::Cancelled);
                        }
                        Some(sent) => sent?,
                    }
                }
                Pull::End => {
                    *producer_done = true;
                    // Claiming the terminal state makes any later cancel a no-op.
                    if !control.state.advance(BinderState::Completed) {
                        return Ok(StreamOutcome::Cancelled);
                    }
                    callback.on_stream_complete().await?;

                    #[cfg(feature = "tracing")]
                    tracing::debug!("Stream completed");
                    return Ok(StreamOutcome::Completed);
                }
                Pull::Failed(error) => {
                    *producer_done = true;
                    #[cfg(feature = "tracing")]
                    tracing::debug!("Producer failed: {}", error);

                    let encoded = encoder.encode_error(error)?;
                    if !control.state.advance(BinderState::Failed) {
                        return Ok(StreamOutcome::Cancelled);
                    }
                    callback.on_stream_error(encoded).await?;
                    return Ok(StreamOutcome::Failed);
                }
            }
        }
    }
}
