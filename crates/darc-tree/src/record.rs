//! Binary record list stored in `seetree` objects.
//!
//! Each record is:
//!
//! ```text
//! 1 byte   tag ('D' directory, 'F' file)
//! 1 byte   format version (1)
//! UTF      name
//! 8 bytes  size, big-endian          ('F' only)
//! UTF      child hash, lowercase hex
//! ```
//!
//! `UTF` is a Java `DataOutput` string: a big-endian `u16` byte count
//! followed by modified UTF-8 (NUL as `C0 80`, supplementary characters as
//! surrogate pairs). Records are written in ascending name order so equal
//! directories always encode to the same bytes.

use std::collections::HashSet;

use darc_types::ObjectId;

/// Current record format version.
pub const RECORD_VERSION: u8 = 1;

const TAG_DIRECTORY: u8 = b'D';
const TAG_FILE: u8 = b'F';

/// One entry of a serialized directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TreeRecord {
    Directory { name: String, hash: ObjectId },
    File { name: String, size: u64, hash: ObjectId },
}

impl TreeRecord {
    pub fn name(&self) -> &str {
        match self {
            Self::Directory { name, .. } | Self::File { name, .. } => name,
        }
    }

    pub fn hash(&self) -> &ObjectId {
        match self {
            Self::Directory { hash, .. } | Self::File { hash, .. } => hash,
        }
    }
}

/// Errors from encoding or decoding a record list.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("unknown record tag {tag:#04x} at offset {offset}")]
    UnknownTag { offset: usize, tag: u8 },

    #[error("unsupported record version {version} at offset {offset}")]
    UnsupportedVersion { offset: usize, version: u8 },

    #[error("record list truncated at offset {offset}")]
    Truncated { offset: usize },

    #[error("malformed string at offset {offset}")]
    InvalidString { offset: usize },

    #[error("invalid child hash at offset {offset}: {reason}")]
    InvalidHash { offset: usize, reason: String },

    #[error("invalid entry name {name:?} at offset {offset}")]
    InvalidName { offset: usize, name: String },

    #[error("duplicate entry name {0:?}")]
    DuplicateName(String),

    #[error("string of {len} encoded bytes exceeds 65535")]
    StringTooLong { len: usize },
}

/// Encode records in canonical (ascending name) order.
pub fn encode_records(mut records: Vec<TreeRecord>) -> Result<Vec<u8>, RecordError> {
    records.sort_by(|a, b| a.name().cmp(b.name()));
    let mut out = Vec::new();
    for (i, record) in records.iter().enumerate() {
        if i > 0 && records[i - 1].name() == record.name() {
            return Err(RecordError::DuplicateName(record.name().to_string()));
        }
        match record {
            TreeRecord::Directory { name, hash } => {
                out.push(TAG_DIRECTORY);
                out.push(RECORD_VERSION);
                write_utf(&mut out, name)?;
                write_utf(&mut out, &hash.to_hex())?;
            }
            TreeRecord::File { name, size, hash } => {
                out.push(TAG_FILE);
                out.push(RECORD_VERSION);
                write_utf(&mut out, name)?;
                out.extend_from_slice(&size.to_be_bytes());
                write_utf(&mut out, &hash.to_hex())?;
            }
        }
    }
    Ok(out)
}

/// Decode a record list. Names must be unique.
pub fn decode_records(data: &[u8]) -> Result<Vec<TreeRecord>, RecordError> {
    let mut input = Input { data, pos: 0 };
    let mut records = Vec::new();
    let mut seen = HashSet::new();

    while !input.is_empty() {
        let offset = input.pos;
        let tag = input.u8()?;
        if tag != TAG_DIRECTORY && tag != TAG_FILE {
            return Err(RecordError::UnknownTag { offset, tag });
        }
        let version = input.u8()?;
        if version != RECORD_VERSION {
            return Err(RecordError::UnsupportedVersion {
                offset: offset + 1,
                version,
            });
        }
        let name_offset = input.pos;
        let name = input.utf()?;
        if !is_valid_name(&name) {
            return Err(RecordError::InvalidName {
                offset: name_offset,
                name,
            });
        }
        let record = if tag == TAG_FILE {
            let size = input.u64()?;
            let hash = input.hash()?;
            TreeRecord::File { name, size, hash }
        } else {
            let hash = input.hash()?;
            TreeRecord::Directory { name, hash }
        };
        if !seen.insert(record.name().to_string()) {
            return Err(RecordError::DuplicateName(record.name().to_string()));
        }
        records.push(record);
    }
    Ok(records)
}

/// Whether `name` can appear as a single path segment.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains('/')
}

/// Number of bytes `s` occupies in modified UTF-8.
pub fn modified_utf8_len(s: &str) -> usize {
    s.encode_utf16()
        .map(|unit| match unit {
            0x0001..=0x007f => 1,
            0x0000 | 0x0080..=0x07ff => 2,
            _ => 3,
        })
        .sum()
}

fn write_utf(out: &mut Vec<u8>, s: &str) -> Result<(), RecordError> {
    let len = modified_utf8_len(s);
    let len16 = u16::try_from(len).map_err(|_| RecordError::StringTooLong { len })?;
    out.extend_from_slice(&len16.to_be_bytes());
    for unit in s.encode_utf16() {
        match unit {
            0x0001..=0x007f => out.push(unit as u8),
            0x0000 | 0x0080..=0x07ff => {
                out.push(0xc0 | ((unit >> 6) & 0x1f) as u8);
                out.push(0x80 | (unit & 0x3f) as u8);
            }
            _ => {
                out.push(0xe0 | ((unit >> 12) & 0x0f) as u8);
                out.push(0x80 | ((unit >> 6) & 0x3f) as u8);
                out.push(0x80 | (unit & 0x3f) as u8);
            }
        }
    }
    Ok(())
}

struct Input<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Input<'a> {
    fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], RecordError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.data.len())
            .ok_or(RecordError::Truncated { offset: self.pos })?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn u8(&mut self) -> Result<u8, RecordError> {
        Ok(self.take(1)?[0])
    }

    fn u64(&mut self) -> Result<u64, RecordError> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8)?);
        Ok(u64::from_be_bytes(buf))
    }

    fn utf(&mut self) -> Result<String, RecordError> {
        let mut len = [0u8; 2];
        len.copy_from_slice(self.take(2)?);
        let offset = self.pos;
        let bytes = self.take(u16::from_be_bytes(len) as usize)?;
        decode_modified_utf8(bytes).ok_or(RecordError::InvalidString { offset })
    }

    fn hash(&mut self) -> Result<ObjectId, RecordError> {
        let offset = self.pos;
        let text = self.utf()?;
        ObjectId::from_hex(&text).map_err(|e| RecordError::InvalidHash {
            offset,
            reason: e.to_string(),
        })
    }
}

fn decode_modified_utf8(bytes: &[u8]) -> Option<String> {
    let mut units = Vec::with_capacity(bytes.len());
    let mut iter = bytes.iter().copied();
    let continuation = |b: Option<u8>| b.filter(|b| b & 0xc0 == 0x80).map(|b| (b & 0x3f) as u16);

    while let Some(b) = iter.next() {
        let unit = match b {
            0x01..=0x7f => b as u16,
            _ if b & 0xe0 == 0xc0 => {
                let low = continuation(iter.next())?;
                ((b & 0x1f) as u16) << 6 | low
            }
            _ if b & 0xf0 == 0xe0 => {
                let mid = continuation(iter.next())?;
                let low = continuation(iter.next())?;
                ((b & 0x0f) as u16) << 12 | mid << 6 | low
            }
            _ => return None,
        };
        units.push(unit);
    }
    String::from_utf16(&units).ok()
}
