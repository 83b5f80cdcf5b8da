use core::marker::PhantomData;
use prost::Message;
use tonic::Code;
use tributary::{EncodedError, Encoder, Error, ProducerError, Result, StreamPayload};

/// tonic's default limit for a decoded message.
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 4 * 1024 * 1024;

/// Wire shape of `google.rpc.Status`, carried as status details on error
/// frames.
#[derive(Clone, PartialEq, Message)]
pub struct RpcStatus {
    #[prost(int32, tag = "1")]
    pub code: i32,
    #[prost(string, tag = "2")]
    pub message: String,
    #[prost(message, repeated, tag = "3")]
    pub details: Vec<prost_types::Any>,
}

/// Encodes stream items as protobuf messages of type `M`.
///
/// Items larger than the configured maximum are rejected with
/// [`Error::Encode`] rather than sent to a client that would refuse them.
/// Producer failures become an `internal` [`RpcStatus`] body.
pub struct ProstEncoder<M> {
    max_message_size: usize,
    _message: PhantomData<fn(M)>,
}

impl<M> ProstEncoder<M> {
    pub const fn new() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            _message: PhantomData,
        }
    }

    #[must_use]
    pub fn with_max_message_size(mut self, limit: usize) -> Self {
        self.max_message_size = limit;
        self
    }
}

impl<M> Default for ProstEncoder<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> Clone for ProstEncoder<M> {
    fn clone(&self) -> Self {
        Self {
            max_message_size: self.max_message_size,
            _message: PhantomData,
        }
    }
}

impl<M> core::fmt::Debug for ProstEncoder<M> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ProstEncoder")
            .field("max_message_size", &self.max_message_size)
            .finish()
    }
}

impl<M> Encoder<M> for ProstEncoder<M>
where
    M: Message + 'static,
{
    fn encode(&self, item: M) -> Result<StreamPayload> {
        let len = item.encoded_len();
        if len > self.max_message_size {
            return Err(Error::encode(format!(
                "message of {} bytes exceeds the {} byte limit",
                len, self.max_message_size
            )));
        }
        Ok(StreamPayload::new(item.encode_to_vec()))
    }

    fn encode_error(&self, error: ProducerError) -> Result<EncodedError> {
        let message = error.message().to_owned();
        let body = RpcStatus {
            code: Code::Internal as i32,
            message: message.clone(),
            details: Vec::new(),
        };
        Ok(EncodedError::new(message).with_details(body.encode_to_vec()))
    }
}
