use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

use darc_types::ObjectId;
use serde::{Deserialize, Serialize};
use tempfile::PersistError;
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::path::split_shard;
use crate::traits::{BlobStore, RawObject};

/// Configuration for the on-disk store.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FsStoreConfig {
    /// `fsync` each temp file before moving it into place.
    pub sync_on_write: bool,
}

/// What currently occupies an object's path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Occupant {
    Absent,
    Object,
    Foreign,
}

/// On-disk, sharded blob store.
///
/// Each object is one immutable file at `<root>/<hash[0:2]>/<hash[2:]>`.
/// Several processes may share the same root: writes go to a uniquely named
/// temp sibling and are moved into place without clobbering, and a lost
/// race is re-checked rather than reported.
#[derive(Debug)]
pub struct FsBlobStore {
    root: PathBuf,
    config: FsStoreConfig,
}

impl FsBlobStore {
    /// Open (or create) a store rooted at `root` with default config.
    pub fn new(root: impl AsRef<Path>) -> StoreResult<Self> {
        Self::with_config(root, FsStoreConfig::default())
    }

    pub fn with_config(root: impl AsRef<Path>, config: FsStoreConfig) -> StoreResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root, config })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &FsStoreConfig {
        &self.config
    }

    /// Path of the object file for `id`. Does not check that it exists.
    pub fn resolve(&self, id: &ObjectId) -> PathBuf {
        let hex = id.to_hex();
        let (dir, file) = split_shard(&hex);
        self.root.join(dir).join(file)
    }

    fn occupant(path: &Path) -> StoreResult<Occupant> {
        match fs::symlink_metadata(path) {
            Ok(meta) if meta.is_file() => Ok(Occupant::Object),
            Ok(_) => Ok(Occupant::Foreign),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Occupant::Absent),
            Err(e) => Err(e.into()),
        }
    }

    fn collision(id: &ObjectId, path: PathBuf) -> StoreError {
        StoreError::Collision { id: *id, path }
    }
}

impl BlobStore for FsBlobStore {
    fn open(&self, id: &ObjectId) -> StoreResult<Option<RawObject>> {
        match File::open(self.resolve(id)) {
            Ok(file) => Ok(Some(Box::new(BufReader::new(file)))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self, id: &ObjectId) -> StoreResult<bool> {
        Ok(Self::occupant(&self.resolve(id))? == Occupant::Object)
    }

    fn store_encoded(&self, id: &ObjectId, encoded: &mut dyn Read) -> StoreResult<ObjectId> {
        // Re-stat: another process may have written it since we last looked.
        let target = self.resolve(id);
        match Self::occupant(&target)? {
            Occupant::Object => {
                debug!(id = %id.short_hex(), "object already present");
                return Ok(*id);
            }
            Occupant::Foreign => return Err(Self::collision(id, target)),
            Occupant::Absent => {}
        }

        let parent = target
            .parent()
            .ok_or_else(|| Self::collision(id, target.clone()))?;
        fs::create_dir_all(parent)?;

        let hex = id.to_hex();
        let mut temp = tempfile::Builder::new()
            .prefix(&format!(".{}.", &hex[2..]))
            .suffix(".tmp")
            .tempfile_in(parent)?;
        io::copy(encoded, &mut temp)?;
        if self.config.sync_on_write {
            temp.as_file().sync_all()?;
        }

        match temp.persist_noclobber(&target) {
            Ok(_) => {
                debug!(id = %id.short_hex(), "stored object");
                Ok(*id)
            }
            Err(PersistError { error, file }) => {
                if let Err(e) = file.close() {
                    warn!(id = %id.short_hex(), error = %e, "failed to remove temp object");
                }
                match Self::occupant(&target)? {
                    Occupant::Object => {
                        debug!(id = %id.short_hex(), "lost write race; object already present");
                        Ok(*id)
                    }
                    Occupant::Foreign => Err(Self::collision(id, target)),
                    Occupant::Absent => Err(error.into()),
                }
            }
        }
    }
}
