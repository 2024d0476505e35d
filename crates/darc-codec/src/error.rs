use std::io;

use darc_types::{ObjectId, ObjectKind};

/// Errors from encoding or decoding an object envelope.
///
/// Each header failure has its own variant; none of them is folded into
/// `DataCorruption`.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The header's type field is not the expected one. `found` holds the
    /// bytes read up to the point the mismatch was detected.
    #[error("object type mismatch: expected {expected:?}, found {found:?}")]
    TypeMismatch { expected: ObjectKind, found: String },

    /// No NUL terminator within the bounded header lookahead.
    #[error("object header has no NUL terminator within {limit} bytes")]
    MissingTerminator { limit: usize },

    /// The length field is empty, non-numeric, or overflows.
    #[error("invalid object length field: {0:?}")]
    InvalidLength(String),

    /// The stream ended before the header terminator.
    #[error("unexpected end of stream inside object header after {read} bytes")]
    TruncatedHeader { read: usize },

    /// The stream ended before the declared payload length.
    #[error("unexpected end of stream: expected {expected} payload bytes, got {actual}")]
    TruncatedPayload { expected: u64, actual: u64 },

    /// The decompressed stream continues past the declared payload length.
    #[error("object has trailing data after {length} payload bytes")]
    TrailingData { length: u64 },

    /// The compressed stream could not be inflated.
    ///
    /// Damaged compressed bytes usually fail zlib's own checksum before the
    /// object digest is ever compared, so this is the usual corruption signal
    /// for a flipped byte on disk. Match on [`CodecError::is_corruption`]
    /// rather than on [`CodecError::DataCorruption`] alone.
    #[error("corrupt compressed stream: {0}")]
    Inflate(String),

    /// The decoded digest does not match the expected object hash.
    #[error("data corruption: expected hash {expected}, computed {actual}")]
    DataCorruption { expected: ObjectId, actual: ObjectId },

    /// Encoding was given a payload stream whose size differs from the
    /// declared length. `actual` stops counting one byte past `declared`.
    #[error("payload length mismatch: declared {declared} bytes, stream supplied {actual}")]
    LengthMismatch { declared: u64, actual: u64 },

    /// A previous read on this stream already failed verification.
    #[error("object stream already failed verification")]
    Poisoned,

    /// I/O error from the underlying stream.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl CodecError {
    /// Returns `true` for failures that mean the stored bytes are damaged,
    /// as opposed to a malformed request or an I/O fault.
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::DataCorruption { .. } | Self::Inflate(_))
    }

    /// Recover a `CodecError` that travelled through `std::io::Read`.
    ///
    /// [`ObjectReader`](crate::ObjectReader) reports codec failures inside an
    /// `io::Error`; this unwraps them again. Plain I/O errors become
    /// [`CodecError::Io`].
    pub fn from_io(err: io::Error) -> Self {
        if !wraps_codec(&err) {
            return Self::Io(err);
        }
        match err.into_inner().map(|inner| inner.downcast::<CodecError>()) {
            Some(Ok(codec)) => *codec,
            Some(Err(other)) => Self::Io(io::Error::new(io::ErrorKind::InvalidData, other)),
            None => Self::Io(io::ErrorKind::InvalidData.into()),
        }
    }

    /// Classify an error raised while inflating.
    pub(crate) fn from_inflate(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::InvalidInput | io::ErrorKind::InvalidData if !wraps_codec(&err) => {
                Self::Inflate(err.to_string())
            }
            _ => Self::from_io(err),
        }
    }
}

fn wraps_codec(err: &io::Error) -> bool {
    err.get_ref()
        .is_some_and(|inner| inner.is::<CodecError>())
}

impl From<CodecError> for io::Error {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Io(e) => e,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}

/// Result alias for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_id(byte: u8) -> ObjectId {
        ObjectId::from_digest([byte; 20])
    }

    #[test]
    fn corruption_message_names_both_hashes() {
        let err = CodecError::DataCorruption {
            expected: sample_id(0xaa),
            actual: sample_id(0xbb),
        };
        let msg = err.to_string();
        assert!(msg.contains(&"aa".repeat(20)));
        assert!(msg.contains(&"bb".repeat(20)));
        assert!(err.is_corruption());
    }

    #[test]
    fn header_errors_are_not_corruption() {
        assert!(!CodecError::MissingTerminator { limit: 25 }.is_corruption());
        assert!(!CodecError::InvalidLength("x".into()).is_corruption());
    }

    #[test]
    fn codec_error_survives_io_roundtrip() {
        let io_err: io::Error = CodecError::TrailingData { length: 3 }.into();
        assert_eq!(io_err.kind(), io::ErrorKind::InvalidData);
        let back = CodecError::from_io(io_err);
        assert!(matches!(back, CodecError::TrailingData { length: 3 }));
    }

    #[test]
    fn plain_io_error_stays_io() {
        let back = CodecError::from_io(io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert!(matches!(back, CodecError::Io(e) if e.kind() == io::ErrorKind::NotFound));
    }

    #[test]
    fn inflate_classification() {
        let err = CodecError::from_inflate(io::Error::new(
            io::ErrorKind::InvalidInput,
            "corrupt deflate stream",
        ));
        assert!(matches!(err, CodecError::Inflate(_)));

        let wrapped: io::Error = CodecError::Poisoned.into();
        assert!(matches!(CodecError::from_inflate(wrapped), CodecError::Poisoned));
    }
}
