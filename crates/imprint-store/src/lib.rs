//! imprint-store
//!
//! Filesystem persistence for Imprint. One `Store` facade per site root:
//!
//! ```text
//! <root>/
//!   pages/            working content set (opaque bytes per page id)
//!   revisions/<n>/    immutable committed content per revision
//!   changes.json      pending change log
//!   revisions.log     revision history, one JSON record per line
//!   site.json         site revision pointers
//! ```
//!
//! The store implements the core collaborator traits (`ContentStore`,
//! `ChangeLog`, `RevisionLog`, `SiteStateStore`), so a `Publisher` can be
//! wired directly against it. Pointer files are written via
//! write-to-temp-then-rename so a crash never leaves a torn record.

use std::path::{Path, PathBuf};

use thiserror::Error;

use imprint_core::{ImprintError, PageId, Revision};

mod changes;
mod content;
mod records;

pub use content::StoreRenderer;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("i/o error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error in {path}: {message}")]
    Serde { path: PathBuf, message: String },

    #[error("invalid page id: {0}")]
    InvalidPageId(String),
}

impl StoreError {
    fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    fn serde(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Serde {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl From<StoreError> for ImprintError {
    fn from(e: StoreError) -> Self {
        ImprintError::collaborator(e.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub root: PathBuf,
}

impl StoreConfig {
    pub fn local(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[derive(Debug)]
pub struct Store {
    root: PathBuf,
    // serializes mutations of changes.json and revisions.log
    log_lock: parking_lot::Mutex<()>,
}

impl Store {
    pub fn open(config: StoreConfig) -> Result<Self, StoreError> {
        let store = Self {
            root: config.root,
            log_lock: parking_lot::Mutex::new(()),
        };
        for dir in [store.pages_dir(), store.revisions_dir()] {
            std::fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        }
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub(crate) fn pages_dir(&self) -> PathBuf {
        self.root.join("pages")
    }

    pub(crate) fn revisions_dir(&self) -> PathBuf {
        self.root.join("revisions")
    }

    pub(crate) fn revision_dir(&self, revision: Revision) -> PathBuf {
        self.revisions_dir().join(format!("{revision:08}"))
    }

    /// Committed page bodies live below `content/` so that render output
    /// written into the same revision namespace never mixes with them.
    pub(crate) fn revision_content_dir(&self, revision: Revision) -> PathBuf {
        self.revision_dir(revision).join("content")
    }

    pub(crate) fn changes_path(&self) -> PathBuf {
        self.root.join("changes.json")
    }

    pub(crate) fn revision_log_path(&self) -> PathBuf {
        self.root.join("revisions.log")
    }

    pub(crate) fn site_state_path(&self) -> PathBuf {
        self.root.join("site.json")
    }

    pub(crate) fn log_guard(&self) -> parking_lot::MutexGuard<'_, ()> {
        self.log_lock.lock()
    }

    /// Validate a page id and resolve it below `base`. Ids are relative
    /// slash-separated paths; anything escaping the namespace is rejected.
    pub(crate) fn page_path(base: &Path, page_id: &str) -> Result<PathBuf, StoreError> {
        if page_id.is_empty() {
            return Err(StoreError::InvalidPageId(page_id.to_string()));
        }
        let mut path = base.to_path_buf();
        for part in page_id.split('/') {
            if part.is_empty() || part == "." || part == ".." {
                return Err(StoreError::InvalidPageId(page_id.to_string()));
            }
            path.push(part);
        }
        Ok(path)
    }

    /// Write a file atomically: temp file in the same directory, then
    /// rename over the destination. The temp name appends `.tmp` to the
    /// full file name; replacing the extension would collide with sibling
    /// pages whose ids end in `.tmp`.
    pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
        let dir = path
            .parent()
            .ok_or_else(|| StoreError::io(path, std::io::Error::other("no parent directory")))?;
        std::fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;

        let mut tmp_name = path
            .file_name()
            .ok_or_else(|| StoreError::io(path, std::io::Error::other("no file name")))?
            .to_os_string();
        tmp_name.push(".tmp");
        let tmp = path.with_file_name(tmp_name);
        std::fs::write(&tmp, bytes).map_err(|e| StoreError::io(&tmp, e))?;
        std::fs::rename(&tmp, path).map_err(|e| StoreError::io(path, e))?;
        Ok(())
    }
}

/// Identifier list helper shared by the content namespace scans.
pub(crate) fn page_id_from(base: &Path, file: &Path) -> Option<PageId> {
    let rel = file.strip_prefix(base).ok()?;
    let mut parts = Vec::new();
    for c in rel.components() {
        parts.push(c.as_os_str().to_str()?.to_string());
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}
