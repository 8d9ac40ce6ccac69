//! Working content set and per-revision namespaces.
//!
//! Content bodies are opaque bytes keyed by page id. A commit copies the
//! selected pages (or the whole working set) into the revision's own
//! directory; deleting a revision removes that directory and is safe to
//! call on a partially committed or absent revision.

use std::path::Path;

use walkdir::WalkDir;

use imprint_core::publish::{ContentStore, Renderer};
use imprint_core::{ImprintResult, PageId, Revision};

use crate::{page_id_from, Store, StoreError};

impl Store {
    pub fn put_page(&self, page_id: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let path = Self::page_path(&self.pages_dir(), page_id)?;
        Self::write_atomic(&path, bytes)
    }

    pub fn page(&self, page_id: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = Self::page_path(&self.pages_dir(), page_id)?;
        read_optional(&path)
    }

    pub fn revision_page(
        &self,
        revision: Revision,
        page_id: &str,
    ) -> Result<Option<Vec<u8>>, StoreError> {
        let path = Self::page_path(&self.revision_content_dir(revision), page_id)?;
        read_optional(&path)
    }

    /// Page ids in the working set, sorted.
    pub fn pages(&self) -> Result<Vec<PageId>, StoreError> {
        scan_pages(&self.pages_dir())
    }

    /// Page ids committed under a revision, sorted. Empty for an unknown
    /// revision.
    pub fn revision_pages(&self, revision: Revision) -> Result<Vec<PageId>, StoreError> {
        let dir = self.revision_content_dir(revision);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        scan_pages(&dir)
    }

    fn copy_page_into(&self, revision: Revision, page_id: &str) -> Result<(), StoreError> {
        let src = Self::page_path(&self.pages_dir(), page_id)?;
        let dst = Self::page_path(&self.revision_content_dir(revision), page_id)?;
        if let Some(dir) = dst.parent() {
            std::fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;
        }
        std::fs::copy(&src, &dst).map_err(|e| StoreError::io(&src, e))?;
        Ok(())
    }
}

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, StoreError> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StoreError::io(path, e)),
    }
}

fn scan_pages(base: &Path) -> Result<Vec<PageId>, StoreError> {
    let mut ids = Vec::new();
    for entry in WalkDir::new(base).min_depth(1) {
        let entry = entry.map_err(|e| {
            StoreError::io(base, e.into_io_error().unwrap_or_else(|| std::io::Error::other("walk error")))
        })?;
        if entry.file_type().is_file() {
            if let Some(id) = page_id_from(base, entry.path()) {
                ids.push(id);
            }
        }
    }
    ids.sort();
    Ok(ids)
}

impl ContentStore for Store {
    fn commit(&self, revision: Revision, pages: Option<&[PageId]>) -> ImprintResult<()> {
        let selected = match pages {
            Some(pages) => pages.to_vec(),
            None => self.pages()?,
        };
        for page_id in &selected {
            self.copy_page_into(revision, page_id)?;
        }
        Ok(())
    }

    fn delete_revision(&self, revision: Revision) -> ImprintResult<()> {
        let dir = self.revision_dir(revision);
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(&dir, e).into()),
        }
    }
}

/// Stand-in for the external render collaborator: records which pages a
/// revision was rendered with, as a manifest inside the revision
/// namespace.
#[derive(Debug)]
pub struct StoreRenderer {
    root: std::path::PathBuf,
}

impl StoreRenderer {
    pub fn for_store(store: &Store) -> Self {
        Self {
            root: store.revisions_dir(),
        }
    }
}

impl Renderer for StoreRenderer {
    fn render(&self, revision: Revision, pages: Option<&[PageId]>) -> ImprintResult<()> {
        let manifest = serde_json::json!({
            "revision": revision,
            "pages": pages,
        });
        let path = self.root.join(format!("{revision:08}")).join("render.json");
        let bytes = serde_json::to_vec_pretty(&manifest)
            .map_err(|e| StoreError::serde(&path, e.to_string()))?;
        Store::write_atomic(&path, &bytes)?;
        Ok(())
    }
}
