//! Mapping bridge errors and error frames onto `tonic::Status`.
//!
//! ## Status codes
//! - `Producer`: `internal`. Producer failures normally travel as error
//!   frames; this only applies when one is surfaced as a Rust error.
//! - `AlreadyBound`, `PublisherClosed`: `failed_precondition`.
//! - `Encode`, `TaskFailed`: `internal`.
//! - `Transport`: `unavailable`.
//!
//! Error frames always become `internal` with the encoded body attached as
//! status details.

use tonic::{Code, Status};
use tributary::{EncodedError, Error};

/// Conversion into a gRPC status.
///
/// `From<tributary::Error> for Status` cannot live in this crate, so the
/// mapping is exposed as a trait instead.
pub trait IntoStatus {
    fn into_status(self) -> Status;
}

impl IntoStatus for Error {
    fn into_status(self) -> Status {
        match self {
            Error::Producer(e) => Status::internal(format!("Stream failed: {}", e)),
            Error::AlreadyBound => Status::failed_precondition("Stream is already bound"),
            Error::PublisherClosed => Status::failed_precondition("Publisher is closed"),
            Error::Encode { context } => Status::internal(format!("Encode error: {}", context)),
            Error::Transport { context } => Status::unavailable(context),
            Error::TaskFailed { context } => {
                Status::internal(format!("Stream delivery task failed: {}", context))
            }
        }
    }
}

impl IntoStatus for EncodedError {
    fn into_status(self) -> Status {
        encoded_error_status(self)
    }
}

/// The status that terminates a stream whose producer failed.
pub fn encoded_error_status(error: EncodedError) -> Status {
    if error.details.is_empty() {
        Status::internal(error.message)
    } else {
        Status::with_details(Code::Internal, error.message, error.details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use tributary::ProducerError;

    #[test]
    fn error_variants_map_to_expected_codes() {
        let cases = [
            (Error::Producer(ProducerError::new("boom")), Code::Internal),
            (Error::AlreadyBound, Code::FailedPrecondition),
            (Error::PublisherClosed, Code::FailedPrecondition),
            (Error::encode("too large"), Code::Internal),
            (Error::transport("reset"), Code::Unavailable),
            (
                Error::TaskFailed {
                    context: "panicked".into(),
                },
                Code::Internal,
            ),
        ];

        for (error, code) in cases {
            assert_eq!(error.into_status().code(), code);
        }
    }

    #[test]
    fn error_frame_keeps_message_and_details() {
        let status = EncodedError::new("sensor offline")
            .with_details(Bytes::from_static(b"\x08\x0d"))
            .into_status();

        assert_eq!(status.code(), Code::Internal);
        assert_eq!(status.message(), "sensor offline");
        assert_eq!(status.details(), b"\x08\x0d");
    }

    #[test]
    fn error_frame_without_details() {
        let status = encoded_error_status(EncodedError::new("gone"));
        assert_eq!(status.code(), Code::Internal);
        assert!(status.details().is_empty());
    }
}
