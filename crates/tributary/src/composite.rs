use crate::{
    binder::{Binding, BoundStream, StreamFactory},
    callback::ClientCallback,
    encoder::Encoder,
    error::Result,
    payload::FirstResponsePayload,
    stream::ServerStream,
};
use bytes::Bytes;
use tokio::runtime::Handle;

/// A unary response paired with a stream, for methods that return both.
///
/// The response is encoded eagerly and travels in the first-response
/// handshake; the stream is then bound exactly as a plain
/// [`ServerStream`].
#[derive(Debug)]
pub struct ResponseAndServerStream<R, T> {
    pub response: R,
    pub stream: ServerStream<T>,
}

impl<R, T: Send + 'static> ResponseAndServerStream<R, T> {
    pub const fn new(response: R, stream: ServerStream<T>) -> Self {
        Self { response, stream }
    }

    /// Encodes the response into the handshake and binds the stream.
    ///
    /// Any first response already set on `binding` is replaced.
    ///
    /// # Errors
    ///
    /// Returns the response encoder's error without binding the stream, or
    /// the binder's error if binding fails.
    pub fn bind<F, E, C>(self, encode_response: F, binding: Binding<E, C>) -> Result<BoundStream>
    where
        F: FnOnce(R) -> Result<Bytes>,
        E: Encoder<T>,
        C: ClientCallback,
    {
        let first = FirstResponsePayload::new(encode_response(self.response)?);
        self.stream
            .into_binder()
            .bind(binding.with_first_response(first))
    }

    /// Encodes the response now and fixes the stream's executor and encoder,
    /// leaving only the remote callback for later.
    ///
    /// # Errors
    ///
    /// Returns the response encoder's error.
    pub fn into_factory<F, E>(
        self,
        encode_response: F,
        executor: Handle,
        encoder: E,
    ) -> Result<ResponseAndStreamFactory<T, E>>
    where
        F: FnOnce(R) -> Result<Bytes>,
        E: Encoder<T>,
    {
        Ok(ResponseAndStreamFactory {
            response: FirstResponsePayload::new(encode_response(self.response)?),
            stream: self.stream.into_factory(executor, encoder),
        })
    }
}

/// The encoded form of a [`ResponseAndServerStream`].
pub struct ResponseAndStreamFactory<T, E> {
    pub response: FirstResponsePayload,
    pub stream: StreamFactory<T, E>,
}

impl<T, E> ResponseAndStreamFactory<T, E>
where
    T: Send + 'static,
    E: Encoder<T>,
{
    /// Binds the stream, sending the stored response in the handshake.
    ///
    /// # Errors
    ///
    /// Returns the binder's error if binding fails.
    pub fn start<C>(self, callback: C) -> Result<BoundStream>
    where
        C: ClientCallback,
    {
        self.stream.start(self.response, callback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        Binding, Error, ProducerError, StreamOutcome,
        testing::{Frame, RecordingCallback, ScriptedProducer, Tail, int_encoder},
    };

    fn encode_summary(summary: &'static str) -> Result<Bytes> {
        Ok(Bytes::from_static(summary.as_bytes()))
    }

    #[tokio::test]
    async fn response_travels_in_handshake_before_items() {
        let values = futures::stream::iter([Ok(1), Err(ProducerError::new("halt"))]);
        let composite =
            ResponseAndServerStream::new("summary", ServerStream::from_generator(values));
        let (callback, recorded) = RecordingCallback::new();

        let bound = composite
            .bind(
                encode_summary,
                Binding::new(int_encoder(), Handle::current(), callback),
            )
            .unwrap();

        assert_eq!(bound.join().await.unwrap(), StreamOutcome::Failed);
        assert_eq!(
            recorded.all().await,
            vec![
                Frame::First(Bytes::from_static(b"summary")),
                Frame::Item(1),
                Frame::Error("halt".into()),
            ]
        );
    }

    #[tokio::test]
    async fn factory_carries_encoded_response() {
        let (producer, _counters) = ScriptedProducer::new([3, 4], Tail::End);
        let factory = ResponseAndServerStream::new("total=7", ServerStream::from_producer(producer))
            .into_factory(encode_summary, Handle::current(), int_encoder())
            .unwrap();
        assert_eq!(factory.response.data, Bytes::from_static(b"total=7"));

        let (callback, recorded) = RecordingCallback::new();
        let bound = factory.start(callback).unwrap();

        assert_eq!(bound.join().await.unwrap(), StreamOutcome::Completed);
        assert_eq!(
            recorded.all().await,
            vec![
                Frame::First(Bytes::from_static(b"total=7")),
                Frame::Item(3),
                Frame::Item(4),
                Frame::End,
            ]
        );
    }

    #[tokio::test]
    async fn response_encode_failure_leaves_stream_unbound() {
        let (producer, counters) = ScriptedProducer::new([1], Tail::End);
        let composite = ResponseAndServerStream::new((), ServerStream::from_producer(producer));
        let (callback, recorded) = RecordingCallback::new();

        let result = composite.bind(
            |()| Err(Error::encode("response too large")),
            Binding::new(int_encoder(), Handle::current(), callback),
        );

        assert!(matches!(result, Err(Error::Encode { .. })));
        assert!(recorded.all().await.is_empty());
        assert_eq!(counters.pulls(), 0);
    }
}
