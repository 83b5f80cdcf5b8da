use crate::{
    binder::StreamServerHandle,
    error::Result,
    payload::{EncodedError, FirstResponsePayload, StreamPayload},
};
use core::future::Future;

/// The transport's side of a bound stream.
///
/// A delivery task owns its callback exclusively and invokes these methods
/// one at a time, in order: one `on_first_response`, any number of
/// `on_stream_next`, then at most one of `on_stream_error` or
/// `on_stream_complete`. After remote cancellation no further method is
/// called and the callback is dropped.
///
/// Returning `Err` from any method is treated as a transport failure for the
/// call; the delivery task stops and releases the producer. Awaiting inside
/// a method (for example on a bounded channel) is how the transport applies
/// backpressure to the stream.
pub trait ClientCallback: Send + 'static {
    /// Starts the stream. `server` lets the transport cancel the stream or
    /// grant flow-control credits from any thread.
    fn on_first_response(
        &mut self,
        payload: FirstResponsePayload,
        server: StreamServerHandle,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Delivers one encoded item.
    fn on_stream_next(&mut self, payload: StreamPayload) -> impl Future<Output = Result<()>> + Send;

    /// Delivers the terminal error frame.
    fn on_stream_error(&mut self, error: EncodedError) -> impl Future<Output = Result<()>> + Send;

    /// Delivers the terminal end-of-stream frame.
    fn on_stream_complete(&mut self) -> impl Future<Output = Result<()>> + Send;
}
