//! Pending content edits.
//!
//! A `Change` is a discrete, idempotent record of one pending mutation on
//! one content page. Changes accumulate in a `ChangeLog` until a publish
//! consumes them; they are destroyed strictly *after* the owning revision
//! is durably published, never before, so an aborted publish leaves the
//! pending set intact for recovery.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::errors::{ImprintError, ImprintResult};
use crate::PageId;

pub type ChangeId = u64;

/// A single pending mutation. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub id: ChangeId,
    pub page_id: PageId,
}

/// Input accepted by a selective publish: an already-loaded `Change` or a
/// raw identifier to be coerced through the log.
#[derive(Debug, Clone)]
pub enum ChangeRef {
    Change(Change),
    Id(ChangeId),
}

impl From<Change> for ChangeRef {
    fn from(c: Change) -> Self {
        Self::Change(c)
    }
}

impl From<ChangeId> for ChangeRef {
    fn from(id: ChangeId) -> Self {
        Self::Id(id)
    }
}

/// The durable pending set.
pub trait ChangeLog: Send + Sync {
    /// Record a new pending change against a page, allocating its id.
    fn record(&self, page_id: &str) -> ImprintResult<Change>;

    fn pending(&self) -> ImprintResult<Vec<Change>>;

    fn get(&self, id: ChangeId) -> ImprintResult<Option<Change>>;

    fn destroy(&self, id: ChangeId) -> ImprintResult<()>;

    fn clear(&self) -> ImprintResult<()>;
}

/// A deduplicated, flattened batch of changes scoped to one publish.
#[derive(Debug, Clone)]
pub struct ChangeSet {
    changes: Vec<Change>,
}

impl ChangeSet {
    /// Deduplicate by change id, preserving first-seen order.
    pub fn new(changes: impl IntoIterator<Item = Change>) -> Self {
        let mut seen = Vec::new();
        let mut out = Vec::new();
        for change in changes {
            if !seen.contains(&change.id) {
                seen.push(change.id);
                out.push(change);
            }
        }
        Self { changes: out }
    }

    /// Coerce a heterogeneous input list, looking raw ids up in the log.
    /// An id with no pending change is an error: the caller asked to
    /// publish something that does not exist.
    pub fn resolve(
        inputs: impl IntoIterator<Item = ChangeRef>,
        log: &dyn ChangeLog,
    ) -> ImprintResult<Self> {
        let mut changes = Vec::new();
        for input in inputs {
            match input {
                ChangeRef::Change(c) => changes.push(c),
                ChangeRef::Id(id) => {
                    let change = log.get(id)?.ok_or_else(|| {
                        ImprintError::invalid_argument(format!("unknown change id: {id}"))
                    })?;
                    changes.push(change);
                }
            }
        }
        Ok(Self::new(changes))
    }

    pub fn changes(&self) -> &[Change] {
        &self.changes
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Distinct page ids touched by this set, in first-seen order. These
    /// are the candidates for a selective publish.
    pub fn page_ids(&self) -> Vec<PageId> {
        let mut pages: Vec<PageId> = Vec::new();
        for change in &self.changes {
            if !pages.contains(&change.page_id) {
                pages.push(change.page_id.clone());
            }
        }
        pages
    }
}

/// In-memory change log. Backs tests and bootstrap contexts; the durable
/// implementation lives in imprint-store.
#[derive(Debug, Default)]
pub struct MemoryChangeLog {
    inner: Mutex<MemoryChangeLogState>,
}

#[derive(Debug, Default)]
struct MemoryChangeLogState {
    next_id: ChangeId,
    changes: Vec<Change>,
}

impl MemoryChangeLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChangeLog for MemoryChangeLog {
    fn record(&self, page_id: &str) -> ImprintResult<Change> {
        let mut state = self.inner.lock();
        state.next_id += 1;
        let change = Change {
            id: state.next_id,
            page_id: page_id.to_string(),
        };
        state.changes.push(change.clone());
        Ok(change)
    }

    fn pending(&self) -> ImprintResult<Vec<Change>> {
        Ok(self.inner.lock().changes.clone())
    }

    fn get(&self, id: ChangeId) -> ImprintResult<Option<Change>> {
        Ok(self.inner.lock().changes.iter().find(|c| c.id == id).cloned())
    }

    fn destroy(&self, id: ChangeId) -> ImprintResult<()> {
        self.inner.lock().changes.retain(|c| c.id != id);
        Ok(())
    }

    fn clear(&self) -> ImprintResult<()> {
        self.inner.lock().changes.clear();
        Ok(())
    }
}
