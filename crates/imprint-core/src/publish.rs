//! The revisioned publishing pipeline.
//!
//! A publish promotes pending content into a new immutable revision:
//!
//! ```text
//! Idle -> Validating -> Pending -> Committing -> Rendering -> Published
//!                   \__________________________________________/
//!                                      |
//!                                   Aborted
//! ```
//!
//! Schema validation runs first; no content is touched on an inconsistent
//! schema. On success the site's published-revision pointer advances as
//! the *last* durable write, so a crash between any two steps never
//! leaves the pointer at a revision whose content commit did not fully
//! succeed. Any failure during commit/render/finalize rolls back: the
//! pending pointer is cleared, the partial revision content is deleted
//! (idempotently), and the originating failure is re-raised as
//! `PublishAborted`. The pipeline performs no retries.
//!
//! Selective publish commits exactly the pages named by the change set
//! and afterwards destroys exactly the consumed changes. Full publish
//! commits everything and clears *every* pending change, referenced or
//! not. Both share the same skeleton.

use std::sync::Arc;

use crate::change::{ChangeLog, ChangeRef, ChangeSet};
use crate::errors::{ImprintError, ImprintResult};
use crate::schema::catalog::SchemaCatalog;
use crate::schema::map::IdentityMap;
use crate::schema::validator::validate;
use crate::site::{Site, SiteStateStore};
use crate::{PageId, Revision};

/// Pipeline states, reported through the progress sink as transitions
/// happen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishState {
    Idle,
    Validating,
    Pending,
    Committing,
    Rendering,
    Published,
    Aborted,
}

impl PublishState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::Pending => "pending",
            Self::Committing => "committing",
            Self::Rendering => "rendering",
            Self::Published => "published",
            Self::Aborted => "aborted",
        }
    }
}

/// Durable content storage collaborator. `pages` of `None` means the full
/// content set. `delete_revision` must be safe to call on a partially
/// committed revision.
pub trait ContentStore: Send + Sync {
    fn commit(&self, revision: Revision, pages: Option<&[PageId]>) -> ImprintResult<()>;
    fn delete_revision(&self, revision: Revision) -> ImprintResult<()>;
}

/// Render collaborator, invoked over the committed revision. Opaque to
/// the core; a failure aborts the pipeline.
pub trait Renderer: Send + Sync {
    fn render(&self, revision: Revision, pages: Option<&[PageId]>) -> ImprintResult<()>;
}

/// An entry in the durable revision history.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RevisionRecord {
    pub revision: Revision,
    /// ISO-8601 publish timestamp.
    pub published_at: String,
}

impl RevisionRecord {
    pub fn now(revision: Revision) -> ImprintResult<Self> {
        let published_at = time::OffsetDateTime::now_utc()
            .format(&time::format_description::well_known::Rfc3339)
            .map_err(|e| ImprintError::serialization(e.to_string()))?;
        Ok(Self {
            revision,
            published_at,
        })
    }
}

pub trait RevisionLog: Send + Sync {
    fn record(&self, record: &RevisionRecord) -> ImprintResult<()>;
    fn latest(&self) -> ImprintResult<Option<RevisionRecord>>;
}

/// Observer for pipeline state transitions (CLI progress, logs).
pub trait ProgressSink: Send + Sync {
    fn transition(&self, state: PublishState, revision: Option<Revision>);
}

/// Default sink: discard transitions.
#[derive(Debug, Default)]
pub struct NullProgress;

impl ProgressSink for NullProgress {
    fn transition(&self, _state: PublishState, _revision: Option<Revision>) {}
}

/// The external collaborators a publisher drives.
pub struct Collaborators {
    pub content: Arc<dyn ContentStore>,
    pub renderer: Arc<dyn Renderer>,
    pub changes: Arc<dyn ChangeLog>,
    pub revisions: Arc<dyn RevisionLog>,
    pub site_state: Arc<dyn SiteStateStore>,
}

pub struct Publisher {
    site: Arc<Site>,
    catalog: Arc<SchemaCatalog>,
    map: Arc<dyn IdentityMap>,
    collab: Collaborators,
    progress: Arc<dyn ProgressSink>,
}

impl Publisher {
    pub fn new(
        site: Arc<Site>,
        catalog: Arc<SchemaCatalog>,
        map: Arc<dyn IdentityMap>,
        collab: Collaborators,
    ) -> Self {
        Self {
            site,
            catalog,
            map,
            collab,
            progress: Arc::new(NullProgress),
        }
    }

    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = sink;
        self
    }

    pub fn site(&self) -> &Site {
        &self.site
    }

    /// Selective publish: commit exactly the pages touched by the given
    /// changes, then destroy exactly those changes.
    pub fn publish_changes(
        &self,
        inputs: impl IntoIterator<Item = ChangeRef>,
    ) -> ImprintResult<Revision> {
        let set = ChangeSet::resolve(inputs, self.collab.changes.as_ref())?;
        let pages = set.page_ids();
        let revision = self.publish(Some(&pages))?;

        // past this point the revision is durably published; a cleanup
        // failure must not read as a failed publish
        for change in set.changes() {
            self.collab.changes.destroy(change.id).map_err(|e| {
                ImprintError::collaborator(format!(
                    "revision {revision} is published; destroying consumed change {} failed: {e}",
                    change.id
                ))
            })?;
        }
        Ok(revision)
    }

    /// Full publish: commit the entire content set, then clear every
    /// pending change unconditionally.
    pub fn publish_all(&self) -> ImprintResult<Revision> {
        let revision = self.publish(None)?;
        self.collab.changes.clear().map_err(|e| {
            ImprintError::collaborator(format!(
                "revision {revision} is published; clearing the pending set failed: {e}"
            ))
        })?;
        Ok(revision)
    }

    fn publish(&self, pages: Option<&[PageId]>) -> ImprintResult<Revision> {
        self.progress.transition(PublishState::Validating, None);
        validate(&self.catalog, self.map.as_ref())?;

        let revision = self.site.begin_publish()?;
        self.progress.transition(PublishState::Pending, Some(revision));

        match self.run(revision, pages) {
            Ok(()) => {
                self.progress.transition(PublishState::Published, Some(revision));
                Ok(revision)
            }
            Err((stage, source)) => {
                self.abort(revision);
                self.progress.transition(PublishState::Aborted, Some(revision));
                Err(ImprintError::PublishAborted {
                    revision,
                    stage,
                    source: Box::new(source),
                })
            }
        }
    }

    fn run(
        &self,
        revision: Revision,
        pages: Option<&[PageId]>,
    ) -> Result<(), (&'static str, ImprintError)> {
        // make the pending pointer durable before any content mutation
        self.collab
            .site_state
            .save(&self.site.state())
            .map_err(|e| ("pending", e))?;

        self.progress.transition(PublishState::Committing, Some(revision));
        self.collab
            .content
            .commit(revision, pages)
            .map_err(|e| ("commit", e))?;

        self.progress.transition(PublishState::Rendering, Some(revision));
        self.collab
            .renderer
            .render(revision, pages)
            .map_err(|e| ("render", e))?;

        let record = RevisionRecord::now(revision).map_err(|e| ("finalize", e))?;
        self.collab.revisions.record(&record).map_err(|e| ("finalize", e))?;

        // published pointer advance: the last durable write, adopted in
        // memory only once it landed
        let next = self.site.publish_candidate(revision);
        self.collab
            .site_state
            .save(&next)
            .map_err(|e| ("finalize", e))?;
        self.site.commit_state(next);
        Ok(())
    }

    fn abort(&self, revision: Revision) {
        let state = self.site.abort_publish();
        // best effort; the originating failure is what propagates
        let _ = self.collab.site_state.save(&state);
        let _ = self.collab.content.delete_revision(revision);
    }
}

/// Where the pipeline executes. `Immediate` runs on the caller's thread
/// and blocks until Published/Aborted. `Background` hands the job to a
/// worker thread; the caller returns at once and the outcome is delivered
/// through the notifier. Only the execution site changes, never the
/// semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PublishingMethod {
    #[default]
    Immediate,
    Background,
}

#[derive(Debug, Clone)]
pub enum PublishJob {
    All,
    Changes(Vec<ChangeRef>),
}

/// Terminal result of a publish, as delivered to a notifier.
#[derive(Debug)]
pub struct PublishOutcome {
    pub result: ImprintResult<Revision>,
}

/// Failure/notification channel for background publishes, where the
/// original caller is no longer waiting.
pub trait PublishNotifier: Send + Sync {
    fn publish_finished(&self, outcome: PublishOutcome);
}

fn run_job(publisher: &Publisher, job: PublishJob) -> ImprintResult<Revision> {
    match job {
        PublishJob::All => publisher.publish_all(),
        PublishJob::Changes(changes) => publisher.publish_changes(changes),
    }
}

/// Execute a publish job under the given method. Immediate returns
/// `Some(revision)` or the failure directly; background returns `None`
/// immediately and reports through the notifier.
pub fn publish_with_method(
    publisher: Arc<Publisher>,
    method: PublishingMethod,
    job: PublishJob,
    notifier: Arc<dyn PublishNotifier>,
) -> ImprintResult<Option<Revision>> {
    match method {
        PublishingMethod::Immediate => run_job(&publisher, job).map(Some),
        PublishingMethod::Background => {
            std::thread::spawn(move || {
                let result = run_job(&publisher, job);
                notifier.publish_finished(PublishOutcome { result });
            });
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::BTreeMap;

    use crate::change::MemoryChangeLog;
    use crate::schema::catalog::TypeDef;
    use crate::schema::map::{PersistentMap, TransientMap};
    use crate::site::SiteState;

    /// Records committed pages per revision; optionally fails on commit.
    #[derive(Debug, Default)]
    struct FakeContent {
        committed: Mutex<BTreeMap<Revision, Option<Vec<PageId>>>>,
        fail_commit: bool,
    }

    impl FakeContent {
        fn failing() -> Self {
            Self {
                fail_commit: true,
                ..Self::default()
            }
        }

        fn committed(&self, revision: Revision) -> Option<Option<Vec<PageId>>> {
            self.committed.lock().get(&revision).cloned()
        }
    }

    impl ContentStore for FakeContent {
        fn commit(&self, revision: Revision, pages: Option<&[PageId]>) -> ImprintResult<()> {
            if self.fail_commit {
                return Err(ImprintError::collaborator("disk full"));
            }
            self.committed
                .lock()
                .insert(revision, pages.map(|p| p.to_vec()));
            Ok(())
        }

        fn delete_revision(&self, revision: Revision) -> ImprintResult<()> {
            self.committed.lock().remove(&revision);
            Ok(())
        }
    }

    #[derive(Debug, Default)]
    struct FakeRenderer {
        fail: bool,
        rendered: Mutex<Vec<Revision>>,
    }

    impl Renderer for FakeRenderer {
        fn render(&self, revision: Revision, _pages: Option<&[PageId]>) -> ImprintResult<()> {
            if self.fail {
                return Err(ImprintError::collaborator("template error"));
            }
            self.rendered.lock().push(revision);
            Ok(())
        }
    }

    #[derive(Debug, Default)]
    struct MemoryRevisionLog {
        records: Mutex<Vec<RevisionRecord>>,
    }

    impl RevisionLog for MemoryRevisionLog {
        fn record(&self, record: &RevisionRecord) -> ImprintResult<()> {
            self.records.lock().push(record.clone());
            Ok(())
        }

        fn latest(&self) -> ImprintResult<Option<RevisionRecord>> {
            Ok(self.records.lock().last().cloned())
        }
    }

    #[derive(Debug, Default)]
    struct MemorySiteStore {
        saved: Mutex<Vec<SiteState>>,
    }

    impl SiteStateStore for MemorySiteStore {
        fn load(&self) -> ImprintResult<Option<SiteState>> {
            Ok(self.saved.lock().last().cloned())
        }

        fn save(&self, state: &SiteState) -> ImprintResult<()> {
            self.saved.lock().push(state.clone());
            Ok(())
        }
    }

    #[derive(Debug, Default)]
    struct RecordingProgress {
        states: Mutex<Vec<PublishState>>,
    }

    impl ProgressSink for RecordingProgress {
        fn transition(&self, state: PublishState, _revision: Option<Revision>) {
            self.states.lock().push(state);
        }
    }

    /// Change log whose cleanup operations fail after recording works.
    #[derive(Debug, Default)]
    struct BrittleChangeLog {
        inner: MemoryChangeLog,
    }

    impl ChangeLog for BrittleChangeLog {
        fn record(&self, page_id: &str) -> ImprintResult<crate::change::Change> {
            self.inner.record(page_id)
        }

        fn pending(&self) -> ImprintResult<Vec<crate::change::Change>> {
            self.inner.pending()
        }

        fn get(&self, id: u64) -> ImprintResult<Option<crate::change::Change>> {
            self.inner.get(id)
        }

        fn destroy(&self, _id: u64) -> ImprintResult<()> {
            Err(ImprintError::collaborator("changes file unwritable"))
        }

        fn clear(&self) -> ImprintResult<()> {
            Err(ImprintError::collaborator("changes file unwritable"))
        }
    }

    fn catalog() -> Arc<SchemaCatalog> {
        let mut c = SchemaCatalog::new();
        c.insert_type(TypeDef::new("Article").with_field("title")).unwrap();
        Arc::new(c)
    }

    struct Rig {
        publisher: Publisher,
        content: Arc<FakeContent>,
        changes: Arc<MemoryChangeLog>,
        revisions: Arc<MemoryRevisionLog>,
        site: Arc<Site>,
    }

    fn rig_with(content: FakeContent, renderer: FakeRenderer) -> Rig {
        let site = Arc::new(Site::new(SiteState::default()));
        let content = Arc::new(content);
        let changes = Arc::new(MemoryChangeLog::new());
        let revisions = Arc::new(MemoryRevisionLog::default());
        let publisher = Publisher::new(
            Arc::clone(&site),
            catalog(),
            Arc::new(TransientMap::new()),
            Collaborators {
                content: Arc::clone(&content) as Arc<dyn ContentStore>,
                renderer: Arc::new(renderer),
                changes: Arc::clone(&changes) as Arc<dyn ChangeLog>,
                revisions: Arc::clone(&revisions) as Arc<dyn RevisionLog>,
                site_state: Arc::new(MemorySiteStore::default()),
            },
        );
        Rig {
            publisher,
            content,
            changes,
            revisions,
            site,
        }
    }

    fn rig() -> Rig {
        rig_with(FakeContent::default(), FakeRenderer::default())
    }

    #[test]
    fn full_publish_commits_everything_and_clears_all_changes() {
        let rig = rig();
        rig.changes.record("page-a").unwrap();
        rig.changes.record("page-b").unwrap();
        rig.changes.record("page-c").unwrap();

        let revision = rig.publisher.publish_all().unwrap();
        assert_eq!(revision, 1);

        // None = the full content set
        assert_eq!(rig.content.committed(1), Some(None));
        assert!(rig.changes.pending().unwrap().is_empty());
        assert_eq!(rig.site.published_revision(), Some(1));
        assert_eq!(rig.site.next_revision(), 2);
        assert_eq!(rig.site.pending_revision(), None);
        assert_eq!(rig.revisions.latest().unwrap().unwrap().revision, 1);
    }

    #[test]
    fn selective_publish_commits_exactly_the_named_pages() {
        let rig = rig();
        let a = rig.changes.record("page-a").unwrap();
        let b = rig.changes.record("page-b").unwrap();
        let _c = rig.changes.record("page-c").unwrap();

        let revision = rig
            .publisher
            .publish_changes([ChangeRef::from(a.id), ChangeRef::from(b.id)])
            .unwrap();

        assert_eq!(
            rig.content.committed(revision),
            Some(Some(vec!["page-a".to_string(), "page-b".to_string()]))
        );

        // only the consumed changes were destroyed
        let pending = rig.changes.pending().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].page_id, "page-c");
    }

    #[test]
    fn commit_failure_rolls_back() {
        let rig = rig_with(FakeContent::failing(), FakeRenderer::default());
        rig.changes.record("page-a").unwrap();

        let before = rig.site.published_revision();
        let err = rig.publisher.publish_all().unwrap_err();
        match err {
            ImprintError::PublishAborted { revision, stage, .. } => {
                assert_eq!(revision, 1);
                assert_eq!(stage, "commit");
            }
            other => panic!("expected PublishAborted, got {other:?}"),
        }

        assert_eq!(rig.site.published_revision(), before);
        assert_eq!(rig.site.pending_revision(), None);
        assert!(rig.content.committed(1).is_none());
        // pending changes survive for recovery
        assert_eq!(rig.changes.pending().unwrap().len(), 1);
        assert!(rig.revisions.latest().unwrap().is_none());
    }

    #[test]
    fn render_failure_rolls_back_committed_content() {
        let rig = rig_with(
            FakeContent::default(),
            FakeRenderer {
                fail: true,
                ..FakeRenderer::default()
            },
        );

        let err = rig.publisher.publish_all().unwrap_err();
        match err {
            ImprintError::PublishAborted { stage, .. } => assert_eq!(stage, "render"),
            other => panic!("expected PublishAborted, got {other:?}"),
        }

        // the partially committed revision was deleted
        assert!(rig.content.committed(1).is_none());
        assert_eq!(rig.site.published_revision(), None);
        assert_eq!(rig.site.pending_revision(), None);
    }

    #[test]
    fn aborted_publish_leaves_next_revision_reusable() {
        let rig = rig_with(FakeContent::failing(), FakeRenderer::default());
        rig.publisher.publish_all().unwrap_err();

        // pointer cleared, so a corrected retry allocates the same number
        assert_eq!(rig.site.next_revision(), 1);
        assert_eq!(rig.site.begin_publish().unwrap(), 1);
    }

    #[test]
    fn schema_drift_fails_before_any_content_mutation() {
        let site = Arc::new(Site::new(SiteState::default()));
        let content = Arc::new(FakeContent::default());
        // persistent map missing the Article field
        let map = PersistentMap::from_entries([("u1", "type//Article")]).unwrap();
        let publisher = Publisher::new(
            Arc::clone(&site),
            catalog(),
            Arc::new(map),
            Collaborators {
                content: Arc::clone(&content) as Arc<dyn ContentStore>,
                renderer: Arc::new(FakeRenderer::default()),
                changes: Arc::new(MemoryChangeLog::new()),
                revisions: Arc::new(MemoryRevisionLog::default()),
                site_state: Arc::new(MemorySiteStore::default()),
            },
        );

        match publisher.publish_all() {
            Err(ImprintError::SchemaModification(report)) => {
                assert_eq!(report.added_fields(), vec!["title"]);
            }
            other => panic!("expected SchemaModification, got {other:?}"),
        }
        assert!(content.committed.lock().is_empty());
        assert_eq!(site.pending_revision(), None);
    }

    fn rig_with_changes(changes: Arc<dyn ChangeLog>) -> (Publisher, Arc<Site>) {
        let site = Arc::new(Site::new(SiteState::default()));
        let publisher = Publisher::new(
            Arc::clone(&site),
            catalog(),
            Arc::new(TransientMap::new()),
            Collaborators {
                content: Arc::new(FakeContent::default()),
                renderer: Arc::new(FakeRenderer::default()),
                changes,
                revisions: Arc::new(MemoryRevisionLog::default()),
                site_state: Arc::new(MemorySiteStore::default()),
            },
        );
        (publisher, site)
    }

    #[test]
    fn cleanup_failure_after_selective_publish_names_the_published_revision() {
        let changes = Arc::new(BrittleChangeLog::default());
        let change = changes.record("page-a").unwrap();
        let (publisher, site) = rig_with_changes(changes as Arc<dyn ChangeLog>);

        let err = publisher.publish_changes([ChangeRef::from(change.id)]).unwrap_err();
        let text = err.to_string();
        assert!(text.contains("revision 1 is published"), "{text}");
        assert!(!matches!(err, ImprintError::PublishAborted { .. }));

        // the publish itself completed; only the change cleanup is pending
        assert_eq!(site.published_revision(), Some(1));
        assert_eq!(site.pending_revision(), None);
    }

    #[test]
    fn cleanup_failure_after_full_publish_names_the_published_revision() {
        let (publisher, site) = rig_with_changes(Arc::new(BrittleChangeLog::default()));

        let err = publisher.publish_all().unwrap_err();
        assert!(err.to_string().contains("revision 1 is published"), "{err}");
        assert_eq!(site.published_revision(), Some(1));
    }

    #[test]
    fn concurrent_publish_is_rejected_while_pending() {
        let rig = rig();
        rig.site.begin_publish().unwrap();

        match rig.publisher.publish_all() {
            Err(ImprintError::PublishInProgress(1)) => {}
            other => panic!("expected PublishInProgress, got {other:?}"),
        }
    }

    #[test]
    fn progress_sink_sees_the_success_path() {
        let progress = Arc::new(RecordingProgress::default());
        let rig = rig();
        let publisher = rig
            .publisher
            .with_progress(Arc::clone(&progress) as Arc<dyn ProgressSink>);

        publisher.publish_all().unwrap();
        assert_eq!(
            *progress.states.lock(),
            vec![
                PublishState::Validating,
                PublishState::Pending,
                PublishState::Committing,
                PublishState::Rendering,
                PublishState::Published,
            ]
        );
    }

    #[test]
    fn background_publish_reports_through_notifier() {
        struct ChannelNotifier(Mutex<std::sync::mpsc::Sender<PublishOutcome>>);
        impl PublishNotifier for ChannelNotifier {
            fn publish_finished(&self, outcome: PublishOutcome) {
                let _ = self.0.lock().send(outcome);
            }
        }

        let rig = rig();
        rig.changes.record("page-a").unwrap();
        let publisher = Arc::new(rig.publisher);

        let (tx, rx) = std::sync::mpsc::channel();
        let started = publish_with_method(
            Arc::clone(&publisher),
            PublishingMethod::Background,
            PublishJob::All,
            Arc::new(ChannelNotifier(Mutex::new(tx))),
        )
        .unwrap();
        assert_eq!(started, None);

        let outcome = rx.recv_timeout(std::time::Duration::from_secs(5)).unwrap();
        assert_eq!(outcome.result.unwrap(), 1);
        assert_eq!(rig.site.published_revision(), Some(1));
    }

    #[test]
    fn immediate_method_returns_the_revision() {
        let rig = rig();
        struct NoNotifier;
        impl PublishNotifier for NoNotifier {
            fn publish_finished(&self, _outcome: PublishOutcome) {}
        }

        let revision = publish_with_method(
            Arc::new(rig.publisher),
            PublishingMethod::Immediate,
            PublishJob::All,
            Arc::new(NoNotifier),
        )
        .unwrap();
        assert_eq!(revision, Some(1));
    }
}
