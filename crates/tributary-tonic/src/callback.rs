//! A [`ClientCallback`] that feeds a tonic server-streaming response.
//!
//! [`GrpcStreamCallback::channel`] returns the callback, which is handed to
//! the binder, and a [`PendingResponse`], which the RPC handler awaits to get
//! the `tonic::Response` it returns. Frames travel through a bounded channel
//! so a slow client pushes back on the stream's delivery task.
//!
//! The client going away (tonic drops the response stream) is turned into a
//! remote cancellation through the stream's [`StreamServerHandle`].

use crate::error::encoded_error_status;
use bytes::Bytes;
use core::pin::Pin;
use futures::Stream;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;
use tonic::{
    Response, Status,
    metadata::{BinaryMetadataValue, MetadataMap},
};
use tributary::{
    ClientCallback, EncodedError, Error, FirstResponsePayload, Result, StreamPayload,
    StreamServerHandle,
};

/// Binary metadata key carrying the unary response of a composite stream.
pub const FIRST_RESPONSE_METADATA: &str = "first-response-bin";

/// Encoded messages as they leave the server.
pub type ResponseStream = Pin<Box<dyn Stream<Item = core::result::Result<Bytes, Status>> + Send>>;

type Frame = core::result::Result<Bytes, Status>;

/// Remote callback backed by a bounded channel of response frames.
pub struct GrpcStreamCallback {
    handshake: Option<oneshot::Sender<FirstResponsePayload>>,
    tx: Option<mpsc::Sender<Frame>>,
    server: Option<StreamServerHandle>,
}

/// The handler's side of a [`GrpcStreamCallback`].
pub struct PendingResponse {
    handshake: oneshot::Receiver<FirstResponsePayload>,
    rx: mpsc::Receiver<Frame>,
}

impl GrpcStreamCallback {
    /// Creates a callback whose response channel holds up to `buffer` frames
    /// (at least one).
    pub fn channel(buffer: usize) -> (Self, PendingResponse) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let (handshake_tx, handshake_rx) = oneshot::channel();
        let callback = Self {
            handshake: Some(handshake_tx),
            tx: Some(tx),
            server: None,
        };
        let pending = PendingResponse {
            handshake: handshake_rx,
            rx,
        };
        (callback, pending)
    }

    fn disconnected(&self) -> Error {
        if let Some(server) = &self.server {
            server.cancel();
        }
        Error::transport("client disconnected")
    }

    async fn send(&self, frame: Frame) -> Result<()> {
        let Some(tx) = &self.tx else {
            return Err(Error::transport("response stream already ended"));
        };
        if tx.send(frame).await.is_err() {
            return Err(self.disconnected());
        }
        Ok(())
    }
}

impl ClientCallback for GrpcStreamCallback {
    async fn on_first_response(
        &mut self,
        payload: FirstResponsePayload,
        server: StreamServerHandle,
    ) -> Result<()> {
        self.server = Some(server.clone());

        let Some(handshake) = self.handshake.take() else {
            return Err(Error::transport("handshake already sent"));
        };
        if handshake.send(payload).is_err() {
            tracing::debug!("Response dropped before the stream started");
            return Err(self.disconnected());
        }

        // Watches for the client going away while the stream is parked
        // waiting on its producer.
        if let Some(tx) = self.tx.clone() {
            tokio::spawn(async move {
                tokio::select! {
                    () = tx.closed() => {
                        if server.cancel() {
                            tracing::debug!("Client went away; stream cancelled");
                        }
                    }
                    () = server.finished() => {}
                }
            });
        }
        Ok(())
    }

    async fn on_stream_next(&mut self, payload: StreamPayload) -> Result<()> {
        self.send(Ok(payload.data)).await
    }

    async fn on_stream_error(&mut self, error: EncodedError) -> Result<()> {
        let status = encoded_error_status(error);
        let sent = self.send(Err(status)).await;
        self.tx = None;
        sent
    }

    async fn on_stream_complete(&mut self) -> Result<()> {
        // Dropping the sender ends the response stream cleanly.
        self.tx = None;
        Ok(())
    }
}

impl PendingResponse {
    /// Waits for the stream to start and builds the RPC response.
    ///
    /// A non-empty first response is attached as
    /// [`FIRST_RESPONSE_METADATA`].
    ///
    /// # Errors
    ///
    /// Returns `cancelled` if the stream ended before its handshake, for
    /// example because it was cancelled or never bound.
    pub async fn response(self) -> core::result::Result<Response<ResponseStream>, Status> {
        let first = self
            .handshake
            .await
            .map_err(|_| Status::cancelled("Stream ended before it started"))?;

        let stream: ResponseStream = Box::pin(ReceiverStream::new(self.rx));
        let mut response = Response::new(stream);
        if !first.is_empty() {
            response.metadata_mut().insert_bin(
                FIRST_RESPONSE_METADATA,
                BinaryMetadataValue::from_bytes(&first.data),
            );
        }
        Ok(response)
    }
}

/// Reads the unary response attached by [`PendingResponse::response`].
pub fn first_response(metadata: &MetadataMap) -> Option<Bytes> {
    metadata
        .get_bin(FIRST_RESPONSE_METADATA)
        .and_then(|value| value.to_bytes().ok())
}
