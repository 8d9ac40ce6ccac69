//! Site-wide revision pointers.
//!
//! The site singleton owns three pieces of state: the next revision number
//! to allocate, the currently published revision, and the pending revision
//! of an in-flight publish. The publishing pipeline is the sole writer;
//! everything else reads snapshots. Exactly one publish may be pending at
//! a time, enforced here by `begin_publish`.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::errors::{ImprintError, ImprintResult};
use crate::Revision;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteState {
    /// Next revision number to be allocated.
    pub revision: Revision,
    pub published_revision: Option<Revision>,
    pub pending_revision: Option<Revision>,
}

impl Default for SiteState {
    fn default() -> Self {
        Self {
            revision: 1,
            published_revision: None,
            pending_revision: None,
        }
    }
}

/// Durable persistence for the site state record. On the publish success
/// path, saving the advanced published pointer is the last durable write.
pub trait SiteStateStore: Send + Sync {
    fn load(&self) -> ImprintResult<Option<SiteState>>;
    fn save(&self, state: &SiteState) -> ImprintResult<()>;
}

#[derive(Debug)]
pub struct Site {
    state: Mutex<SiteState>,
}

impl Site {
    pub fn new(state: SiteState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn state(&self) -> SiteState {
        self.state.lock().clone()
    }

    pub fn published_revision(&self) -> Option<Revision> {
        self.state.lock().published_revision
    }

    pub fn pending_revision(&self) -> Option<Revision> {
        self.state.lock().pending_revision
    }

    pub fn next_revision(&self) -> Revision {
        self.state.lock().revision
    }

    /// Allocate the next revision and mark it pending. Fails fast when a
    /// publish is already in flight; callers must not clobber a pending
    /// revision.
    pub(crate) fn begin_publish(&self) -> ImprintResult<Revision> {
        let mut state = self.state.lock();
        if let Some(pending) = state.pending_revision {
            return Err(ImprintError::PublishInProgress(pending));
        }
        let revision = state.revision;
        state.pending_revision = Some(revision);
        Ok(revision)
    }

    /// The state the site will hold once `revision` is published: pointer
    /// advanced, successor slot allocated, pending cleared. Computed
    /// without mutating so the durable write can happen first.
    pub(crate) fn publish_candidate(&self, revision: Revision) -> SiteState {
        SiteState {
            revision: revision + 1,
            published_revision: Some(revision),
            pending_revision: None,
        }
    }

    /// Adopt a state snapshot after its durable write succeeded.
    pub(crate) fn commit_state(&self, state: SiteState) {
        *self.state.lock() = state;
    }

    /// Clear the pending pointer after a failed publish. The published
    /// pointer is untouched.
    pub(crate) fn abort_publish(&self) -> SiteState {
        let mut state = self.state.lock();
        state.pending_revision = None;
        state.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_publish_allocates_and_marks_pending() {
        let site = Site::new(SiteState::default());
        let revision = site.begin_publish().unwrap();
        assert_eq!(revision, 1);
        assert_eq!(site.pending_revision(), Some(1));
        assert_eq!(site.published_revision(), None);
    }

    #[test]
    fn second_publish_rejected_while_pending() {
        let site = Site::new(SiteState::default());
        site.begin_publish().unwrap();
        match site.begin_publish() {
            Err(ImprintError::PublishInProgress(1)) => {}
            other => panic!("expected PublishInProgress, got {other:?}"),
        }
    }

    #[test]
    fn publish_candidate_advances_pointers() {
        let site = Site::new(SiteState::default());
        let revision = site.begin_publish().unwrap();
        let candidate = site.publish_candidate(revision);
        assert_eq!(candidate.revision, 2);
        assert_eq!(candidate.published_revision, Some(1));
        assert_eq!(candidate.pending_revision, None);

        // memory unchanged until the durable write lands
        assert_eq!(site.pending_revision(), Some(1));
        site.commit_state(candidate);
        assert_eq!(site.published_revision(), Some(1));
        assert_eq!(site.next_revision(), 2);
        assert_eq!(site.pending_revision(), None);
    }

    #[test]
    fn abort_clears_pending_only() {
        let site = Site::new(SiteState {
            revision: 5,
            published_revision: Some(4),
            pending_revision: Some(5),
        });
        let state = site.abort_publish();
        assert_eq!(state.pending_revision, None);
        assert_eq!(state.published_revision, Some(4));
        assert_eq!(state.revision, 5);
    }
}
