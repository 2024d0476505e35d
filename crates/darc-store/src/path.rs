use crate::error::{StoreError, StoreResult};

/// Map a hex digest to its sharded relative path: `h[0:2] + "/" + h[2:]`.
///
/// Pure string mapping with no I/O. Any hex string of at least two
/// characters is accepted, so abbreviated hashes map the same way.
pub fn hash_to_path(hash: &str) -> StoreResult<String> {
    if hash.len() < 2 {
        return Err(StoreError::InvalidHash {
            hash: hash.to_string(),
            reason: "shorter than 2 characters".into(),
        });
    }
    if !hash.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(StoreError::InvalidHash {
            hash: hash.to_string(),
            reason: "not a hex string".into(),
        });
    }
    let (dir, file) = split_shard(hash);
    Ok(format!("{dir}/{file}"))
}

/// Split a hex digest of at least two characters into shard and file name.
pub(crate) fn split_shard(hash: &str) -> (&str, &str) {
    hash.split_at(2)
}
