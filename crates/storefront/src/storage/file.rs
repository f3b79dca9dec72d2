//! Restart-surviving key-value store.

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use super::{KeyValueStore, StorageError};

/// File-backed store for the durable tier.
///
/// Each key maps to one file under the storage directory, so pending
/// payment state survives a process restart or a redirect away to the
/// payment provider. Writes go through a temp file and rename so a
/// crash mid-write never leaves a truncated value behind.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| StorageError::Io {
            key: dir.display().to_string(),
            source,
        })?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // Keys are fixed identifiers (see `storage::keys`), but guard
        // against separators anyway so a bad key cannot escape the dir.
        let safe: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{safe}.json"))
    }

    fn io_err(key: &str, source: std::io::Error) -> StorageError {
        StorageError::Io {
            key: key.to_string(),
            source,
        }
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Self::io_err(key, e)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key);
        let tmp = path.with_extension("json.tmp");
        write_sync(&tmp, value).map_err(|e| Self::io_err(key, e))?;
        fs::rename(&tmp, &path).map_err(|e| Self::io_err(key, e))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::io_err(key, e)),
        }
    }
}

fn write_sync(path: &Path, value: &str) -> std::io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(value.as_bytes())?;
    file.sync_all()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("hilo-filestore-{name}-{}", uuid::Uuid::new_v4()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_values_survive_reopen() {
        let dir = temp_dir("reopen");
        {
            let store = FileStore::open(&dir).unwrap();
            store.set("guest_cart", "[1,2]").unwrap();
        }
        let store = FileStore::open(&dir).unwrap();
        assert_eq!(store.get("guest_cart").unwrap().as_deref(), Some("[1,2]"));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let dir = temp_dir("remove");
        let store = FileStore::open(&dir).unwrap();
        store.remove("never_written").unwrap();
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_key_sanitization_stays_in_dir() {
        let dir = temp_dir("sanitize");
        let store = FileStore::open(&dir).unwrap();
        store.set("../escape", "x").unwrap();
        assert!(store.path_for("../escape").starts_with(&dir));
        fs::remove_dir_all(&dir).unwrap();
    }
}
