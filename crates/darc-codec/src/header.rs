use std::io::Read;

use darc_types::ObjectKind;
use sha1::{Digest, Sha1};

use crate::error::{CodecError, CodecResult};

/// Maximum number of decimal digits accepted in the length field.
pub const MAX_LENGTH_DIGITS: usize = 20;

/// The `<type> <length>\0` prefix of every object envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ObjectHeader {
    pub kind: ObjectKind,
    /// Payload length in bytes (excluding the header itself).
    pub length: u64,
}

impl ObjectHeader {
    pub fn new(kind: ObjectKind, length: u64) -> Self {
        Self { kind, length }
    }

    /// Encode as `ASCII(type) ' ' ASCII(decimal length) NUL`.
    pub fn encode(&self) -> Vec<u8> {
        format!("{} {}\0", self.kind.as_str(), self.length).into_bytes()
    }

    /// Upper bound on the header size for `kind`, terminator included.
    pub fn max_len(kind: ObjectKind) -> usize {
        kind.as_str().len() + 1 + MAX_LENGTH_DIGITS + 1
    }

    /// Read a header from a decompressed stream one byte at a time.
    ///
    /// Never consumes past the NUL terminator. Every header byte is fed into
    /// `hasher`.
    pub(crate) fn read_from<R: Read>(
        reader: &mut R,
        expected: ObjectKind,
        hasher: &mut Sha1,
    ) -> CodecResult<Self> {
        let limit = Self::max_len(expected);
        let prefix_len = expected.as_str().len() + 1;
        let mut buf = Vec::with_capacity(limit);

        loop {
            if buf.len() >= limit {
                return Err(CodecError::MissingTerminator { limit });
            }
            let mut byte = [0u8; 1];
            let n = reader.read(&mut byte).map_err(CodecError::from_inflate)?;
            if n == 0 {
                return Err(CodecError::TruncatedHeader { read: buf.len() });
            }
            buf.push(byte[0]);

            // Decide the type as soon as the prefix is complete.
            if buf.len() <= prefix_len && (byte[0] == 0 || buf.len() == prefix_len) {
                check_prefix(&buf, expected)?;
            }
            if byte[0] == 0 {
                break;
            }
        }
        hasher.update(&buf);

        let digits = &buf[prefix_len..buf.len() - 1];
        let length = parse_length(digits)?;
        Ok(Self::new(expected, length))
    }
}

fn check_prefix(buf: &[u8], expected: ObjectKind) -> CodecResult<()> {
    let type_str = expected.as_str().as_bytes();
    let matches = buf.len() == type_str.len() + 1
        && &buf[..type_str.len()] == type_str
        && buf[type_str.len()] == b' ';
    if matches {
        return Ok(());
    }
    let found = buf
        .split(|b| *b == b' ' || *b == 0)
        .next()
        .unwrap_or_default();
    Err(CodecError::TypeMismatch {
        expected,
        found: String::from_utf8_lossy(found).into_owned(),
    })
}

fn parse_length(digits: &[u8]) -> CodecResult<u64> {
    let text = String::from_utf8_lossy(digits);
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return Err(CodecError::InvalidLength(text.into_owned()));
    }
    text.parse::<u64>()
        .map_err(|_| CodecError::InvalidLength(text.into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(bytes: &[u8], kind: ObjectKind) -> CodecResult<ObjectHeader> {
        let mut hasher = Sha1::new();
        ObjectHeader::read_from(&mut Cursor::new(bytes), kind, &mut hasher)
    }

    #[test]
    fn encode_blob_header() {
        assert_eq!(ObjectHeader::new(ObjectKind::Blob, 16).encode(), b"blob 16\0");
        assert_eq!(ObjectHeader::new(ObjectKind::Tree, 0).encode(), b"seetree 0\0");
    }

    #[test]
    fn parse_valid_header() {
        let header = parse(b"blob 16\0payload", ObjectKind::Blob).unwrap();
        assert_eq!(header, ObjectHeader::new(ObjectKind::Blob, 16));
    }

    #[test]
    fn parse_stops_at_terminator() {
        let mut cursor = Cursor::new(&b"blob 3\0abc"[..]);
        let mut hasher = Sha1::new();
        ObjectHeader::read_from(&mut cursor, ObjectKind::Blob, &mut hasher).unwrap();
        assert_eq!(cursor.position(), 7);
    }

    #[test]
    fn type_mismatch() {
        let err = parse(b"seetree 4\0abcd", ObjectKind::Blob).unwrap_err();
        assert!(matches!(err, CodecError::TypeMismatch { found, .. } if found == "seetr"));
    }

    #[test]
    fn type_mismatch_on_short_type() {
        let err = parse(b"bl\0", ObjectKind::Blob).unwrap_err();
        assert!(matches!(err, CodecError::TypeMismatch { found, .. } if found == "bl"));
    }

    #[test]
    fn missing_terminator() {
        let err = parse(b"blob 1234567890123456789012345", ObjectKind::Blob).unwrap_err();
        assert!(matches!(err, CodecError::MissingTerminator { limit: 26 }));
    }

    #[test]
    fn non_numeric_length() {
        let err = parse(b"blob 12a\0", ObjectKind::Blob).unwrap_err();
        assert!(matches!(err, CodecError::InvalidLength(s) if s == "12a"));
    }

    #[test]
    fn empty_length() {
        let err = parse(b"blob \0", ObjectKind::Blob).unwrap_err();
        assert!(matches!(err, CodecError::InvalidLength(_)));
    }

    #[test]
    fn overflowing_length() {
        let err = parse(b"blob 99999999999999999999\0", ObjectKind::Blob).unwrap_err();
        assert!(matches!(err, CodecError::InvalidLength(_)));
    }

    #[test]
    fn truncated_header() {
        let err = parse(b"blob 12", ObjectKind::Blob).unwrap_err();
        assert!(matches!(err, CodecError::TruncatedHeader { read: 7 }));
    }

    #[test]
    fn header_bytes_are_hashed() {
        let mut hasher = Sha1::new();
        ObjectHeader::read_from(&mut Cursor::new(&b"blob 0\0"[..]), ObjectKind::Blob, &mut hasher)
            .unwrap();
        let digest: [u8; 20] = hasher.finalize().into();
        assert_eq!(
            darc_types::ObjectId::from_digest(digest).to_hex(),
            "e69de29bb2d1d6434b8b29ae775ad8c2e48c5391"
        );
    }
}
