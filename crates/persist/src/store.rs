//! File-backed document persistence.
//!
//! Layout inside the store directory:
//! ```text
//! document.meta.json              - schema version, document name, revision count
//! revisions/
//!   000001.worktree.cbor.zst      - one saved worktree per file, CBOR inside zstd
//! integrity/
//!   manifest.json                 - revision chain: each file's SHA-256 and its parent's
//! ```
//!
//! Revisions are append-only. Loading checks the file against the chain
//! before decoding, then rebuilds every snapshot by replay.

use crate::config::EngineConfig;
use crate::error::PersistError;
use crate::persistence::{DocumentMeta, Persistence};
use crate::state::PersistedWorktree;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Current on-disk schema version.
const DOCUMENT_SCHEMA_VERSION: u32 = 1;

const ZSTD_LEVEL: i32 = 3;

/// Errors from file-backed persistence operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CBOR serialization error: {0}")]
    CborEncode(String),
    #[error("CBOR deserialization error: {0}")]
    CborDecode(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("integrity check failed: expected {expected}, got {actual}")]
    IntegrityMismatch { expected: String, actual: String },
    #[error("schema version mismatch: file has v{file_version}, expected v{expected_version}")]
    SchemaMismatch {
        file_version: u32,
        expected_version: u32,
    },
    #[error("no revisions found")]
    NoRevisions,
    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// Metadata stored in document.meta.json.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreMeta {
    pub schema_version: u32,
    pub document_name: String,
    pub revision_count: u32,
}

/// One saved revision file and the hash of the revision before it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevisionLink {
    pub revision: u32,
    pub file: String,
    pub sha256: String,
    pub parent: Option<String>,
}

/// Hash chain over all revision files, oldest first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RevisionChain {
    pub links: Vec<RevisionLink>,
}

impl RevisionChain {
    fn head(&self) -> Option<&RevisionLink> {
        self.links.last()
    }

    fn find(&self, revision: u32) -> Option<&RevisionLink> {
        self.links.iter().find(|link| link.revision == revision)
    }

    /// Extend the chain with the bytes of the next revision.
    fn push(&mut self, revision: u32, data: &[u8]) {
        let parent = self.head().map(|link| link.sha256.clone());
        self.links.push(RevisionLink {
            revision,
            file: revision_filename(revision),
            sha256: sha256_hex(data),
            parent,
        });
    }

    /// Check that every link points at its predecessor and that each file's
    /// bytes, as returned by `read`, still hash to the recorded value.
    fn verify(
        &self,
        mut read: impl FnMut(&str) -> std::io::Result<Vec<u8>>,
    ) -> Result<(), StoreError> {
        let mut parent: Option<&str> = None;
        for link in &self.links {
            if link.parent.as_deref() != parent {
                return Err(StoreError::IntegrityMismatch {
                    expected: format!("parent {}", parent.unwrap_or("none")),
                    actual: format!("parent {}", link.parent.as_deref().unwrap_or("none")),
                });
            }
            link.check(&read(&link.file)?)?;
            parent = Some(link.sha256.as_str());
        }
        Ok(())
    }
}

impl RevisionLink {
    fn check(&self, data: &[u8]) -> Result<(), StoreError> {
        let actual = sha256_hex(data);
        if actual == self.sha256 {
            Ok(())
        } else {
            Err(StoreError::IntegrityMismatch {
                expected: self.sha256.clone(),
                actual,
            })
        }
    }
}

/// One stored revision: the document identity plus its worktree.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredRevision {
    document: DocumentMeta,
    worktree: PersistedWorktree,
}

/// File-backed document store with schema versioning and integrity checking.
pub struct WorktreeStore {
    root: PathBuf,
    meta: StoreMeta,
    chain: RevisionChain,
}

impl WorktreeStore {
    /// Open or create a store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let root = path.as_ref().to_path_buf();
        std::fs::create_dir_all(root.join("revisions"))?;
        std::fs::create_dir_all(root.join("integrity"))?;

        let meta_path = root.join("document.meta.json");
        let store = if meta_path.exists() {
            let meta: StoreMeta = read_json(&meta_path)?;
            if meta.schema_version != DOCUMENT_SCHEMA_VERSION {
                return Err(StoreError::SchemaMismatch {
                    file_version: meta.schema_version,
                    expected_version: DOCUMENT_SCHEMA_VERSION,
                });
            }
            let chain_path = chain_path(&root);
            let chain = if chain_path.exists() {
                read_json(&chain_path)?
            } else {
                RevisionChain::default()
            };
            Self { root, meta, chain }
        } else {
            let store = Self {
                root,
                meta: StoreMeta {
                    schema_version: DOCUMENT_SCHEMA_VERSION,
                    document_name: DocumentMeta::default().name,
                    revision_count: 0,
                },
                chain: RevisionChain::default(),
            };
            store.flush()?;
            store
        };
        tracing::debug!(
            root = %store.root.display(),
            revisions = store.meta.revision_count,
            "store opened"
        );
        Ok(store)
    }

    /// Write the document as a new revision. Returns the revision number.
    pub fn save(&mut self, persistence: &Persistence) -> Result<u32, StoreError> {
        self.append(&StoredRevision {
            document: persistence.document().clone(),
            worktree: PersistedWorktree::from_worktree(persistence.worktree()),
        })
    }

    /// Load the newest revision.
    pub fn load_latest(&self, config: EngineConfig) -> Result<Persistence, StoreError> {
        if self.meta.revision_count == 0 {
            return Err(StoreError::NoRevisions);
        }
        self.load_revision(self.meta.revision_count, config)
    }

    /// Load revision `revision` and rebuild its worktree by replay. A log whose
    /// inverses do not walk back to its base is rejected.
    pub fn load_revision(
        &self,
        revision: u32,
        config: EngineConfig,
    ) -> Result<Persistence, StoreError> {
        let link = self
            .chain
            .find(revision)
            .ok_or_else(|| StoreError::IntegrityMismatch {
                expected: format!("chain link for revision {revision}"),
                actual: "none".into(),
            })?;
        let data = std::fs::read(self.revisions_dir().join(&link.file))?;
        link.check(&data)?;

        let stored: StoredRevision = decode_revision(&data)?;
        let worktree = stored.worktree.into_worktree()?;
        tracing::info!(revision, document = %stored.document.name, "document loaded");
        Ok(Persistence::with_worktree(worktree, stored.document, config))
    }

    /// Verify the whole revision chain against the files on disk.
    pub fn verify_integrity(&self) -> Result<(), StoreError> {
        let dir = self.revisions_dir();
        self.chain.verify(|file| std::fs::read(dir.join(file)))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn meta(&self) -> &StoreMeta {
        &self.meta
    }

    fn append(&mut self, stored: &StoredRevision) -> Result<u32, StoreError> {
        let revision = self.meta.revision_count + 1;
        let data = encode_revision(stored)?;
        std::fs::write(self.revisions_dir().join(revision_filename(revision)), &data)?;

        self.chain.push(revision, &data);
        self.meta.revision_count = revision;
        self.meta.document_name = stored.document.name.clone();
        self.flush()?;
        tracing::info!(revision, document = %self.meta.document_name, "document saved");
        Ok(revision)
    }

    fn revisions_dir(&self) -> PathBuf {
        self.root.join("revisions")
    }

    fn flush(&self) -> Result<(), StoreError> {
        write_json(&self.root.join("document.meta.json"), &self.meta)?;
        write_json(&chain_path(&self.root), &self.chain)
    }
}

fn chain_path(root: &Path) -> PathBuf {
    root.join("integrity").join("manifest.json")
}

fn revision_filename(revision: u32) -> String {
    format!("{revision:06}.worktree.cbor.zst")
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    Ok(serde_json::from_reader(std::fs::File::open(path)?)?)
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    serde_json::to_writer_pretty(std::fs::File::create(path)?, value)?;
    Ok(())
}

/// CBOR streamed straight into the zstd encoder.
fn encode_revision<T: Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    let mut encoder = zstd::Encoder::new(Vec::new(), ZSTD_LEVEL)?;
    ciborium::into_writer(value, &mut encoder)
        .map_err(|e| StoreError::CborEncode(e.to_string()))?;
    Ok(encoder.finish()?)
}

fn decode_revision<T: DeserializeOwned>(data: &[u8]) -> Result<T, StoreError> {
    let decoder = zstd::Decoder::new(data)?;
    ciborium::from_reader(decoder).map_err(|e| StoreError::CborDecode(e.to_string()))
}

fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}
