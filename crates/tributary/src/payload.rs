//! Wire-facing frame types exchanged with the transport.
//!
//! The byte layout inside each payload belongs to the codec; the bridge only
//! moves these values between the encoder and the remote callback.

use bytes::Bytes;

/// One encoded stream item.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamPayload {
    pub data: Bytes,
}

impl StreamPayload {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }
}

/// Payload of the first-response handshake.
///
/// Carries the encoded unary response for methods that return one alongside
/// the stream, and is empty otherwise.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FirstResponsePayload {
    pub data: Bytes,
}

impl FirstResponsePayload {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self { data: data.into() }
    }

    /// A handshake with no unary response attached.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// A producer failure after it went through the encoder's error path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodedError {
    /// Human-readable description, suitable for a status message.
    pub message: String,
    /// Codec-specific error body. May be empty.
    pub details: Bytes,
}

impl EncodedError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            details: Bytes::new(),
        }
    }

    pub fn with_details(mut self, details: impl Into<Bytes>) -> Self {
        self.details = details.into();
        self
    }
}
