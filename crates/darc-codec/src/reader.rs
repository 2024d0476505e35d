use std::fmt;
use std::io::{self, Read};

use darc_types::{ObjectId, ObjectKind};
use flate2::read::ZlibDecoder;
use sha1::{Digest, Sha1};

use crate::error::{CodecError, CodecResult};
use crate::header::ObjectHeader;

const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ReadState {
    Streaming,
    Verified(ObjectId),
    Poisoned,
}

/// Forward-only reader over a stored object envelope.
///
/// The header is parsed when the reader is opened. Payload reads inflate
/// the underlying stream and feed a running SHA-1. The first time the
/// payload is exhausted the digest is finalized and compared with the
/// expected hash, if one was given; a mismatch is reported as
/// [`CodecError::DataCorruption`]. After that, reads return `0` without
/// recomputing anything.
///
/// Through the [`Read`] impl, codec failures arrive wrapped in an
/// `io::Error`; use [`CodecError::from_io`] to get them back.
pub struct ObjectReader<R: Read> {
    decoder: ZlibDecoder<R>,
    hasher: Sha1,
    header: ObjectHeader,
    remaining: u64,
    expected: Option<ObjectId>,
    state: ReadState,
}

impl<R: Read> ObjectReader<R> {
    /// Open an envelope of type `kind`, verifying against `expected` at EOF.
    pub fn open(inner: R, kind: ObjectKind, expected: Option<ObjectId>) -> CodecResult<Self> {
        let mut decoder = ZlibDecoder::new(inner);
        let mut hasher = Sha1::new();
        let header = ObjectHeader::read_from(&mut decoder, kind, &mut hasher)?;
        Ok(Self {
            decoder,
            hasher,
            header,
            remaining: header.length,
            expected,
            state: ReadState::Streaming,
        })
    }

    pub fn kind(&self) -> ObjectKind {
        self.header.kind
    }

    /// Declared payload length from the header.
    pub fn length(&self) -> u64 {
        self.header.length
    }

    pub fn expected_hash(&self) -> Option<ObjectId> {
        self.expected
    }

    /// The verified digest, once the payload has been read to the end.
    pub fn digest(&self) -> Option<ObjectId> {
        match self.state {
            ReadState::Verified(id) => Some(id),
            _ => None,
        }
    }

    /// Read payload bytes, verifying the digest when the payload runs out.
    pub fn read_payload(&mut self, buf: &mut [u8]) -> CodecResult<usize> {
        match self.state {
            ReadState::Verified(_) => return Ok(0),
            ReadState::Poisoned => return Err(CodecError::Poisoned),
            ReadState::Streaming => {}
        }
        if buf.is_empty() {
            return Ok(0);
        }
        if self.remaining == 0 {
            return self.finalize().map(|_| 0);
        }

        let want = usize::try_from(self.remaining)
            .map_or(buf.len(), |remaining| remaining.min(buf.len()));
        let n = match self.decoder.read(&mut buf[..want]) {
            Ok(0) => {
                self.state = ReadState::Poisoned;
                return Err(CodecError::TruncatedPayload {
                    expected: self.header.length,
                    actual: self.header.length - self.remaining,
                });
            }
            Ok(n) => n,
            Err(e) => {
                self.state = ReadState::Poisoned;
                return Err(CodecError::from_inflate(e));
            }
        };
        self.hasher.update(&buf[..n]);
        self.remaining -= n as u64;
        Ok(n)
    }

    /// Drain the remaining payload and return the verified digest.
    pub fn finish(mut self) -> CodecResult<ObjectId> {
        let mut buf = vec![0u8; CHUNK_SIZE];
        while self.read_payload(&mut buf)? != 0 {}
        self.digest().ok_or(CodecError::Poisoned)
    }

    /// Read the whole payload into memory, verifying it.
    pub fn read_to_end_verified(mut self) -> CodecResult<Vec<u8>> {
        let capacity = usize::try_from(self.header.length)
            .unwrap_or(CHUNK_SIZE)
            .min(16 * CHUNK_SIZE);
        let mut data = Vec::with_capacity(capacity);
        let mut buf = vec![0u8; CHUNK_SIZE];
        loop {
            let n = self.read_payload(&mut buf)?;
            if n == 0 {
                break;
            }
            data.extend_from_slice(&buf[..n]);
        }
        Ok(data)
    }

    fn finalize(&mut self) -> CodecResult<ObjectId> {
        let mut probe = [0u8; 1];
        match self.decoder.read(&mut probe) {
            Ok(0) => {}
            Ok(_) => {
                self.state = ReadState::Poisoned;
                return Err(CodecError::TrailingData {
                    length: self.header.length,
                });
            }
            Err(e) => {
                self.state = ReadState::Poisoned;
                return Err(CodecError::from_inflate(e));
            }
        }

        let actual = ObjectId::from_digest(self.hasher.finalize_reset().into());
        if let Some(expected) = self.expected {
            if expected != actual {
                self.state = ReadState::Poisoned;
                return Err(CodecError::DataCorruption { expected, actual });
            }
        }
        self.state = ReadState::Verified(actual);
        Ok(actual)
    }
}

impl<R: Read> Read for ObjectReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.read_payload(buf).map_err(io::Error::from)
    }
}

impl<R: Read> fmt::Debug for ObjectReader<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectReader")
            .field("kind", &self.header.kind)
            .field("length", &self.header.length)
            .field("remaining", &self.remaining)
            .field("expected", &self.expected)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::{encode_bytes, hash_object};
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use proptest::prelude::*;
    use std::io::Write;

    fn deflate(raw: &[u8]) -> Vec<u8> {
        let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
        enc.write_all(raw).unwrap();
        enc.finish().unwrap()
    }

    // -----------------------------------------------------------------------
    // Happy path
    // -----------------------------------------------------------------------

    #[test]
    fn reads_payload_and_verifies() {
        let (bytes, id) = encode_bytes(ObjectKind::Blob, b"what is up, doc?").unwrap();
        let reader = ObjectReader::open(bytes.as_slice(), ObjectKind::Blob, Some(id)).unwrap();
        assert_eq!(reader.length(), 16);
        assert_eq!(reader.read_to_end_verified().unwrap(), b"what is up, doc?");
    }

    #[test]
    fn digest_available_after_eof() {
        let (bytes, id) = encode_bytes(ObjectKind::Blob, b"abc").unwrap();
        let mut reader = ObjectReader::open(bytes.as_slice(), ObjectKind::Blob, None).unwrap();
        assert_eq!(reader.digest(), None);
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"abc");
        assert_eq!(reader.digest(), Some(id));
    }

    #[test]
    fn eof_is_idempotent() {
        let (bytes, id) = encode_bytes(ObjectKind::Blob, b"xyz").unwrap();
        let mut reader = ObjectReader::open(bytes.as_slice(), ObjectKind::Blob, Some(id)).unwrap();
        let mut buf = [0u8; 16];
        assert_eq!(reader.read(&mut buf).unwrap(), 3);
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
        assert_eq!(reader.digest(), Some(id));
    }

    #[test]
    fn small_reads_accumulate_digest() {
        let data = b"a longer payload read one byte at a time".to_vec();
        let (bytes, id) = encode_bytes(ObjectKind::Blob, &data).unwrap();
        let mut reader = ObjectReader::open(bytes.as_slice(), ObjectKind::Blob, Some(id)).unwrap();
        let mut out = Vec::new();
        let mut byte = [0u8; 1];
        while reader.read_payload(&mut byte).unwrap() == 1 {
            out.push(byte[0]);
        }
        assert_eq!(out, data);
    }

    #[test]
    fn finish_drains_and_verifies() {
        let data = vec![7u8; 300_000];
        let (bytes, id) = encode_bytes(ObjectKind::Blob, &data).unwrap();
        let reader = ObjectReader::open(bytes.as_slice(), ObjectKind::Blob, Some(id)).unwrap();
        assert_eq!(reader.finish().unwrap(), id);
    }

    #[test]
    fn empty_payload() {
        let (bytes, id) = encode_bytes(ObjectKind::Blob, b"").unwrap();
        let reader = ObjectReader::open(bytes.as_slice(), ObjectKind::Blob, Some(id)).unwrap();
        assert!(reader.read_to_end_verified().unwrap().is_empty());
    }

    // -----------------------------------------------------------------------
    // Header failures surface at open time
    // -----------------------------------------------------------------------

    #[test]
    fn wrong_type_fails_on_open() {
        let (bytes, _) = encode_bytes(ObjectKind::Tree, b"records").unwrap();
        let err = ObjectReader::open(bytes.as_slice(), ObjectKind::Blob, None).unwrap_err();
        assert!(matches!(err, CodecError::TypeMismatch { .. }));
    }

    #[test]
    fn missing_terminator_fails_on_open() {
        let bytes = deflate(b"blob 00000000000000000000000000000");
        let err = ObjectReader::open(bytes.as_slice(), ObjectKind::Blob, None).unwrap_err();
        assert!(matches!(err, CodecError::MissingTerminator { .. }));
    }

    #[test]
    fn bad_length_fails_on_open() {
        let bytes = deflate(b"blob x1\0?");
        let err = ObjectReader::open(bytes.as_slice(), ObjectKind::Blob, None).unwrap_err();
        assert!(matches!(err, CodecError::InvalidLength(_)));
    }

    #[test]
    fn not_zlib_fails_on_open() {
        let err = ObjectReader::open(&b"plain text, not deflated"[..], ObjectKind::Blob, None)
            .unwrap_err();
        assert!(err.is_corruption());
    }

    // -----------------------------------------------------------------------
    // Payload failures surface at EOF
    // -----------------------------------------------------------------------

    #[test]
    fn truncated_payload() {
        let bytes = deflate(b"blob 10\0short");
        let reader = ObjectReader::open(bytes.as_slice(), ObjectKind::Blob, None).unwrap();
        let err = reader.read_to_end_verified().unwrap_err();
        assert!(matches!(
            err,
            CodecError::TruncatedPayload {
                expected: 10,
                actual: 5
            }
        ));
    }

    #[test]
    fn trailing_data() {
        let bytes = deflate(b"blob 2\0abc");
        let reader = ObjectReader::open(bytes.as_slice(), ObjectKind::Blob, None).unwrap();
        let err = reader.read_to_end_verified().unwrap_err();
        assert!(matches!(err, CodecError::TrailingData { length: 2 }));
    }

    #[test]
    fn hash_mismatch_is_data_corruption() {
        let (bytes, actual) = encode_bytes(ObjectKind::Blob, b"real content").unwrap();
        let expected = hash_object(ObjectKind::Blob, b"other content");
        let reader = ObjectReader::open(bytes.as_slice(), ObjectKind::Blob, Some(expected)).unwrap();
        let err = reader.read_to_end_verified().unwrap_err();
        match err {
            CodecError::DataCorruption {
                expected: e,
                actual: a,
            } => {
                assert_eq!(e, expected);
                assert_eq!(a, actual);
            }
            other => panic!("expected DataCorruption, got {other:?}"),
        }
    }

    #[test]
    fn corruption_through_read_trait_is_recoverable() {
        let (bytes, _) = encode_bytes(ObjectKind::Blob, b"payload").unwrap();
        let wrong = hash_object(ObjectKind::Blob, b"nope");
        let mut reader = ObjectReader::open(bytes.as_slice(), ObjectKind::Blob, Some(wrong)).unwrap();
        let mut out = Vec::new();
        let io_err = reader.read_to_end(&mut out).unwrap_err();
        assert!(matches!(
            CodecError::from_io(io_err),
            CodecError::DataCorruption { .. }
        ));
    }

    #[test]
    fn failure_is_sticky() {
        let (bytes, _) = encode_bytes(ObjectKind::Blob, b"payload").unwrap();
        let wrong = hash_object(ObjectKind::Blob, b"nope");
        let mut reader = ObjectReader::open(bytes.as_slice(), ObjectKind::Blob, Some(wrong)).unwrap();
        let mut buf = [0u8; 64];
        assert_eq!(reader.read_payload(&mut buf).unwrap(), 7);
        assert!(reader.read_payload(&mut buf).is_err());
        assert!(matches!(reader.read_payload(&mut buf), Err(CodecError::Poisoned)));
    }

    #[test]
    fn flipped_checksum_byte_detected() {
        let (mut bytes, id) = encode_bytes(ObjectKind::Blob, b"test content\n").unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        let result = ObjectReader::open(bytes.as_slice(), ObjectKind::Blob, Some(id))
            .and_then(ObjectReader::read_to_end_verified);
        let err = result.unwrap_err();
        assert!(err.is_corruption(), "unexpected error: {err:?}");
    }

    proptest! {
        #[test]
        fn roundtrip(data in proptest::collection::vec(any::<u8>(), 0..8192)) {
            let (bytes, id) = encode_bytes(ObjectKind::Blob, &data).unwrap();
            let mut reader = ObjectReader::open(bytes.as_slice(), ObjectKind::Blob, Some(id)).unwrap();
            let mut out = Vec::new();
            reader.read_to_end(&mut out).unwrap();
            prop_assert_eq!(out, data);
            prop_assert_eq!(reader.digest(), Some(id));
        }
    }
}
