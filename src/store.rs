//! Image persistence.
//!
//! Stores normalized images keyed by a UUID. The transform engine never sees
//! this module: it hands back bytes and metadata, and the upload layer turns
//! them into an [`ImageRecord`].
//!
//! # Layout (`FsStore`)
//!
//! ```text
//! <store_dir>/
//! ├── 6f1c…e2.jpg     # encoded bytes, exactly as returned by the engine
//! └── 6f1c…e2.json    # metadata sidecar + SHA-256 of the .jpg
//! ```
//!
//! The sidecar is written after the data file and renamed into place, so a
//! record without a readable sidecar was never completed and is invisible to
//! readers. On read the data file is
//! hashed and compared with the sidecar; a mismatch is reported as
//! [`StoreError::Corrupt`] rather than served.

use crate::imaging::TransformResult;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

/// Content type of every stored image.
pub const JPEG_CONTENT_TYPE: &str = "image/jpeg";

/// Version of the sidecar format. Records with another version are skipped.
const SIDECAR_VERSION: u32 = 1;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("image {0} already exists")]
    Duplicate(Uuid),
    #[error("image {0} failed its integrity check")]
    Corrupt(Uuid),
}

/// Everything stored about an image except its bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMeta {
    pub id: Uuid,
    pub filename: String,
    pub content_type: String,
    pub width: u32,
    pub height: u32,
    pub quality: u8,
    pub size_bytes: u64,
    pub source_format: String,
}

/// One stored image: metadata plus the encoded bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    pub meta: ImageMeta,
    pub data: Vec<u8>,
}

impl ImageRecord {
    pub fn from_transform(id: Uuid, filename: impl Into<String>, result: TransformResult) -> Self {
        Self {
            meta: ImageMeta {
                id,
                filename: filename.into(),
                content_type: JPEG_CONTENT_TYPE.to_string(),
                width: result.width,
                height: result.height,
                quality: result.quality.value(),
                size_bytes: result.encoded.len() as u64,
                source_format: result.source_format.tag().to_string(),
            },
            data: result.encoded,
        }
    }
}

/// What the retrieval path hands back: stored bytes, verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    pub data: Vec<u8>,
    pub content_type: String,
}

/// Storage backend for normalized images.
pub trait ImageStore: Sync {
    /// Persist a new record. Fails with [`StoreError::Duplicate`] if the id
    /// is taken.
    fn insert(&self, record: ImageRecord) -> Result<(), StoreError>;

    /// Fetch the stored bytes, or `None` if no such image exists.
    fn get(&self, id: Uuid) -> Result<Option<StoredImage>, StoreError>;

    /// Fetch the metadata only.
    fn metadata(&self, id: Uuid) -> Result<Option<ImageMeta>, StoreError>;

    /// All stored records' metadata, ordered by id.
    fn list(&self) -> Result<Vec<ImageMeta>, StoreError>;
}

// =============================================================================
// In-memory store
// =============================================================================

/// Process-local store, used by tests and one-shot runs.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<Uuid, ImageRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ImageStore for MemoryStore {
    fn insert(&self, record: ImageRecord) -> Result<(), StoreError> {
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let id = record.meta.id;
        if records.contains_key(&id) {
            return Err(StoreError::Duplicate(id));
        }
        records.insert(id, record);
        Ok(())
    }

    fn get(&self, id: Uuid) -> Result<Option<StoredImage>, StoreError> {
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(records.get(&id).map(|r| StoredImage {
            data: r.data.clone(),
            content_type: r.meta.content_type.clone(),
        }))
    }

    fn metadata(&self, id: Uuid) -> Result<Option<ImageMeta>, StoreError> {
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(records.get(&id).map(|r| r.meta.clone()))
    }

    fn list(&self) -> Result<Vec<ImageMeta>, StoreError> {
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let mut metas: Vec<ImageMeta> = records.values().map(|r| r.meta.clone()).collect();
        metas.sort_by_key(|m| m.id);
        Ok(metas)
    }
}

// =============================================================================
// Filesystem store
// =============================================================================

/// On-disk sidecar next to each stored image.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Sidecar {
    version: u32,
    #[serde(flatten)]
    meta: ImageMeta,
    sha256: String,
}

/// SHA-256 of the stored bytes, as a hex string.
fn hash_bytes(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Directory-backed store: one `.jpg` and one `.json` per image.
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn data_path(&self, id: Uuid) -> PathBuf {
        self.root.join(format!("{id}.jpg"))
    }

    fn sidecar_path(&self, id: Uuid) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }

    /// Load a sidecar. A missing, unparseable or other-version sidecar is
    /// treated as no record.
    fn read_sidecar(&self, id: Uuid) -> Result<Option<Sidecar>, StoreError> {
        read_sidecar_at(&self.sidecar_path(id))
    }
}

fn read_sidecar_at(path: &Path) -> Result<Option<Sidecar>, StoreError> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let sidecar: Sidecar = match serde_json::from_str(&content) {
        Ok(s) => s,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "skipping unreadable sidecar");
            return Ok(None);
        }
    };
    if sidecar.version != SIDECAR_VERSION {
        return Ok(None);
    }
    Ok(Some(sidecar))
}

impl ImageStore for FsStore {
    fn insert(&self, record: ImageRecord) -> Result<(), StoreError> {
        let id = record.meta.id;
        let sidecar_path = self.sidecar_path(id);
        if sidecar_path.exists() {
            return Err(StoreError::Duplicate(id));
        }

        std::fs::write(self.data_path(id), &record.data)?;
        let sidecar = Sidecar {
            version: SIDECAR_VERSION,
            sha256: hash_bytes(&record.data),
            meta: record.meta,
        };
        // Rename into place so readers never see a partial sidecar.
        let tmp_path = sidecar_path.with_extension("json.tmp");
        std::fs::write(&tmp_path, serde_json::to_string_pretty(&sidecar)?)?;
        std::fs::rename(&tmp_path, &sidecar_path)?;
        Ok(())
    }

    fn get(&self, id: Uuid) -> Result<Option<StoredImage>, StoreError> {
        let Some(sidecar) = self.read_sidecar(id)? else {
            return Ok(None);
        };
        let data = std::fs::read(self.data_path(id))?;
        if hash_bytes(&data) != sidecar.sha256 {
            return Err(StoreError::Corrupt(id));
        }
        Ok(Some(StoredImage {
            data,
            content_type: sidecar.meta.content_type,
        }))
    }

    fn metadata(&self, id: Uuid) -> Result<Option<ImageMeta>, StoreError> {
        Ok(self.read_sidecar(id)?.map(|s| s.meta))
    }

    fn list(&self) -> Result<Vec<ImageMeta>, StoreError> {
        let mut metas = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(sidecar) = read_sidecar_at(&path)? {
                metas.push(sidecar.meta);
            }
        }
        metas.sort_by_key(|m| m.id);
        Ok(metas)
    }
}
