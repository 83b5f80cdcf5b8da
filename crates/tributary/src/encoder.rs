use crate::{
    error::{ProducerError, Result},
    payload::{EncodedError, StreamPayload},
};

/// Turns produced values, and the terminal producer failure, into wire
/// payloads.
///
/// The encoder is supplied by the codec at bind time and is fixed for the
/// life of the stream. An `Err` from either method is a transport failure:
/// delivery stops and the error is returned from
/// [`BoundStream::join`](crate::BoundStream::join).
pub trait Encoder<T>: Send + Sync + 'static {
    /// Encodes one stream item.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encode`](crate::Error::Encode) if the value cannot be
    /// represented on the wire.
    fn encode(&self, item: T) -> Result<StreamPayload>;

    /// Encodes the failure that terminates the stream.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Encode`](crate::Error::Encode) if the failure cannot
    /// be represented on the wire.
    fn encode_error(&self, error: ProducerError) -> Result<EncodedError>;
}

/// An [`Encoder`] assembled from two closures. See [`encoder_fn`].
#[derive(Clone)]
pub struct EncoderFn<F, G> {
    encode: F,
    encode_error: G,
}

/// Builds an [`Encoder`] from an item closure and an error closure.
///
/// ```
/// use tributary::{EncodedError, StreamPayload, encoder_fn};
///
/// let encoder = encoder_fn(
///     |n: u32| Ok(StreamPayload::new(n.to_le_bytes().to_vec())),
///     |err| Ok(EncodedError::new(err.to_string())),
/// );
/// # let _ = encoder;
/// ```
pub fn encoder_fn<T, F, G>(encode: F, encode_error: G) -> EncoderFn<F, G>
where
    F: Fn(T) -> Result<StreamPayload> + Send + Sync + 'static,
    G: Fn(ProducerError) -> Result<EncodedError> + Send + Sync + 'static,
{
    EncoderFn {
        encode,
        encode_error,
    }
}

impl<T, F, G> Encoder<T> for EncoderFn<F, G>
where
    F: Fn(T) -> Result<StreamPayload> + Send + Sync + 'static,
    G: Fn(ProducerError) -> Result<EncodedError> + Send + Sync + 'static,
{
    fn encode(&self, item: T) -> Result<StreamPayload> {
        (self.encode)(item)
    }

    fn encode_error(&self, error: ProducerError) -> Result<EncodedError> {
        (self.encode_error)(error)
    }
}

impl<T, E> Encoder<T> for std::sync::Arc<E>
where
    E: Encoder<T> + ?Sized,
{
    fn encode(&self, item: T) -> Result<StreamPayload> {
        (**self).encode(item)
    }

    fn encode_error(&self, error: ProducerError) -> Result<EncodedError> {
        (**self).encode_error(error)
    }
}
