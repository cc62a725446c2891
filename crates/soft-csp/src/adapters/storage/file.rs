use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::{Deserialize, Serialize};

use crate::domain::algorithms::KeySpec;
use crate::domain::entities::KeysetScope;
use crate::domain::errors::StoreError;
use crate::ports::outbound::{KeysetStore, StoredKeyset};

/// On-disk form of one keyset. Key blobs are hex encoded.
#[derive(Debug, Default, Serialize, Deserialize)]
struct KeysetDocument {
    name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exchange_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    signature_key: Option<String>,
}

impl KeysetDocument {
    fn into_keyset(self) -> Result<StoredKeyset, StoreError> {
        let decode = |field: Option<String>| {
            field
                .map(|text| hex::decode(text).map_err(|e| StoreError::Corrupt(e.to_string())))
                .transpose()
        };
        Ok(StoredKeyset {
            exchange_key: decode(self.exchange_key)?,
            signature_key: decode(self.signature_key)?,
        })
    }
}

fn io_error(e: std::io::Error) -> StoreError {
    StoreError::Io(e.to_string())
}

/// Exclusive lock on the store directory, released on drop.
#[derive(Debug)]
struct DirectoryLock {
    file: File,
}

impl DirectoryLock {
    const LOCK_FILE: &'static str = "LOCK";

    /// Fails with `Locked` instead of waiting when another store holds it.
    fn acquire(root: &Path) -> Result<Self, StoreError> {
        std::fs::create_dir_all(root).map_err(io_error)?;
        let path = root.join(Self::LOCK_FILE);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(io_error)?;
        if file.try_lock_exclusive().is_err() {
            return Err(StoreError::Locked(path.display().to_string()));
        }
        Ok(Self { file })
    }
}

impl Drop for DirectoryLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// Keyset store persisting one JSON document per container.
///
/// Layout: `<root>/<user|machine>/<hex(name)>.json`. Names are hex encoded
/// so any container name maps to a safe file name. Writes go through a
/// temp file and rename. The directory lock is held until the store drops.
#[derive(Debug)]
pub struct FileBackedKeysetStore {
    root: PathBuf,
    _lock: DirectoryLock,
}

impl FileBackedKeysetStore {
    /// Open (creating if needed) the store rooted at `root`.
    ///
    /// # Errors
    ///
    /// `StoreError::Locked` if another live store owns the directory.
    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self, StoreError> {
        let root = root.as_ref().to_path_buf();
        let lock = DirectoryLock::acquire(&root)?;

        #[cfg(feature = "tracing-log")]
        tracing::info!("[csp] keyset store at {}", root.display());

        Ok(Self { root, _lock: lock })
    }

    fn scope_dir(&self, scope: KeysetScope) -> PathBuf {
        self.root.join(match scope {
            KeysetScope::User => "user",
            KeysetScope::Machine => "machine",
        })
    }

    fn document_path(&self, scope: KeysetScope, name: &str) -> PathBuf {
        self.scope_dir(scope)
            .join(format!("{}.json", hex::encode(name.as_bytes())))
    }

    fn read_document(&self, scope: KeysetScope, name: &str) -> Result<KeysetDocument, StoreError> {
        let path = self.document_path(scope, name);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(name.to_string()))
            }
            Err(e) => return Err(io_error(e)),
        };
        serde_json::from_slice(&bytes).map_err(|e| StoreError::Corrupt(e.to_string()))
    }

    fn write_document(&self, scope: KeysetScope, doc: &KeysetDocument) -> Result<(), StoreError> {
        let dir = self.scope_dir(scope);
        std::fs::create_dir_all(&dir).map_err(io_error)?;

        let bytes =
            serde_json::to_vec_pretty(doc).map_err(|e| StoreError::Corrupt(e.to_string()))?;
        let path = self.document_path(scope, &doc.name);
        let temp_path = path.with_extension("tmp");
        let mut file = File::create(&temp_path).map_err(io_error)?;
        file.write_all(&bytes).map_err(io_error)?;
        file.sync_all().map_err(io_error)?;
        std::fs::rename(&temp_path, &path).map_err(io_error)?;
        Ok(())
    }
}

impl KeysetStore for FileBackedKeysetStore {
    fn exists(&self, scope: KeysetScope, name: &str) -> Result<bool, StoreError> {
        Ok(self.document_path(scope, name).is_file())
    }

    fn create(&mut self, scope: KeysetScope, name: &str) -> Result<(), StoreError> {
        if self.document_path(scope, name).is_file() {
            return Err(StoreError::AlreadyExists(name.to_string()));
        }
        let doc = KeysetDocument {
            name: name.to_string(),
            ..KeysetDocument::default()
        };
        self.write_document(scope, &doc)
    }

    fn load(&self, scope: KeysetScope, name: &str) -> Result<StoredKeyset, StoreError> {
        self.read_document(scope, name)?.into_keyset()
    }

    fn save_key(
        &mut self,
        scope: KeysetScope,
        name: &str,
        spec: KeySpec,
        blob: &[u8],
    ) -> Result<(), StoreError> {
        let mut doc = match self.read_document(scope, name) {
            Ok(doc) => doc,
            Err(StoreError::NotFound(_)) => KeysetDocument {
                name: name.to_string(),
                ..KeysetDocument::default()
            },
            Err(e) => return Err(e),
        };
        let encoded = Some(hex::encode(blob));
        match spec {
            KeySpec::KeyExchange => doc.exchange_key = encoded,
            KeySpec::Signature => doc.signature_key = encoded,
        }
        self.write_document(scope, &doc)
    }

    fn delete(&mut self, scope: KeysetScope, name: &str) -> Result<(), StoreError> {
        match std::fs::remove_file(self.document_path(scope, name)) {
            Ok(()) => {
                #[cfg(feature = "tracing-log")]
                tracing::info!("[csp] deleted keyset {:?}", name);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(name.to_string()))
            }
            Err(e) => Err(io_error(e)),
        }
    }

    fn list(&self, scope: KeysetScope) -> Result<Vec<String>, StoreError> {
        let dir = self.scope_dir(scope);
        let entries = match std::fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error(e)),
        };

        let mut names = Vec::new();
        for entry in entries {
            let path = entry.map_err(io_error)?.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let decoded = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| hex::decode(stem).ok())
                .and_then(|bytes| String::from_utf8(bytes).ok());
            match decoded {
                Some(name) => names.push(name),
                None => {
                    #[cfg(feature = "tracing-log")]
                    tracing::warn!("[csp] skipping stray file {}", path.display());
                }
            }
        }
        names.sort();
        Ok(names)
    }
}
