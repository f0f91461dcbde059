//! Named sync operations over the metadata and archive files.
//!
//! Each run reads the on-disk files once at the start and writes them once
//! at the end, archive first and metadata second. Nothing is written until
//! the full in-memory result is known, so a failed or cancelled run leaves
//! both files exactly as they were.

use std::collections::BTreeSet;
use std::time::Instant;

use tracing::{debug, info, warn};

use super::diff::{self, DiffOutcome};
use super::fetch::{FetchCoordinator, FetchReport};
use super::types::{Operation, RunPhase, RunReport};
use crate::archive::Archive;
use crate::error::{Error, Result};
use crate::model::{Issue, IssueId, MetadataSnapshot};
use crate::remote::{ItemSource, ListSource, RecordExtractor};
use crate::storage::{ArchiveStore, MetadataStore};

/// Drives list fetch → diff → fetch → merge → persist.
pub struct SyncOrchestrator<L, S, E> {
    list: L,
    fetcher: FetchCoordinator<S, E>,
    metadata: MetadataStore,
    archive: ArchiveStore,
    phase: RunPhase,
}

impl<L, S, E> SyncOrchestrator<L, S, E>
where
    L: ListSource,
    S: ItemSource + 'static,
    E: RecordExtractor + 'static,
{
    #[must_use]
    pub fn new(
        list: L,
        fetcher: FetchCoordinator<S, E>,
        metadata: MetadataStore,
        archive: ArchiveStore,
    ) -> Self {
        Self {
            list,
            fetcher,
            metadata,
            archive,
            phase: RunPhase::Idle,
        }
    }

    /// Phase reached by the last run.
    #[must_use]
    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    #[must_use]
    pub fn fetcher(&self) -> &FetchCoordinator<S, E> {
        &self.fetcher
    }

    #[must_use]
    pub fn metadata_store(&self) -> &MetadataStore {
        &self.metadata
    }

    #[must_use]
    pub fn archive_store(&self) -> &ArchiveStore {
        &self.archive
    }

    fn enter(&mut self, phase: RunPhase) {
        debug!(from = %self.phase, to = %phase, "run phase");
        self.phase = phase;
    }

    fn start(&mut self, operation: Operation) -> (Instant, RunReport) {
        self.phase = RunPhase::Idle;
        info!(operation = %operation, "starting");
        (Instant::now(), RunReport::new(operation))
    }

    async fn fetch_list(&mut self) -> Result<MetadataSnapshot> {
        let cancel = self.fetcher.cancellation_token();
        let snapshot = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                warn!("issue list fetch cancelled");
                return Err(Error::Cancelled);
            }
            snapshot = self.list.fetch_list() => snapshot?,
        };
        info!(entries = snapshot.len(), "issue list fetched");
        self.enter(RunPhase::ListFetched);
        Ok(snapshot)
    }

    fn diff(
        &mut self,
        old: &MetadataSnapshot,
        new: &MetadataSnapshot,
        full_update: bool,
        report: &mut RunReport,
    ) -> Result<DiffOutcome> {
        let outcome = diff::compute(old, new, full_update)?;
        report.newly_added = outcome.report.newly_added;
        report.selected = outcome.update_set.len();
        report.diff = Some(outcome.report.clone());
        self.enter(RunPhase::Diffed);
        Ok(outcome)
    }

    async fn fetch(
        &mut self,
        ids: &BTreeSet<IssueId>,
        report: &mut RunReport,
    ) -> Result<(Vec<Issue>, FetchReport)> {
        self.enter(RunPhase::Fetching);
        let (issues, fetch_report) = self.fetcher.fetch(ids).await?;
        report.fetched = fetch_report.fetched;
        self.enter(RunPhase::Merging);
        Ok((issues, fetch_report))
    }

    fn persist(
        &mut self,
        archive: &mut Archive,
        snapshot: Option<&MetadataSnapshot>,
        report: &mut RunReport,
    ) -> Result<()> {
        archive.touch();
        report.written = self.archive.save(archive)?;
        if let Some(snapshot) = snapshot {
            self.metadata.save(snapshot)?;
        }
        report.persisted = true;
        self.enter(RunPhase::Persisted);
        Ok(())
    }

    fn finish(started: Instant, mut report: RunReport) -> RunReport {
        report.elapsed_secs = started.elapsed().as_secs_f64();
        info!(
            operation = %report.operation,
            selected = report.selected,
            fetched = report.fetched,
            written = report.written,
            persisted = report.persisted,
            "done"
        );
        report
    }

    /// Fetch a fresh list and every issue on it; replace both files.
    ///
    /// The stored metadata is ignored and only overwritten at the end.
    ///
    /// # Errors
    ///
    /// Returns an error if the list fetch, diff, fetch or write fails.
    pub async fn rebuild(&mut self) -> Result<RunReport> {
        let (started, mut report) = self.start(Operation::Rebuild);

        let new = self.fetch_list().await?;
        let outcome = self.diff(&MetadataSnapshot::new(), &new, true, &mut report)?;
        let (issues, _) = self.fetch(&outcome.update_set, &mut report).await?;

        let mut archive = Archive::from_issues(issues);
        self.persist(&mut archive, Some(&new), &mut report)?;
        Ok(Self::finish(started, report))
    }

    /// Diff the remote list against stored metadata without changing
    /// anything on disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored metadata is missing or malformed, or
    /// if the list fetch or diff fails.
    pub async fn check(&mut self, full_update: bool) -> Result<RunReport> {
        let (started, mut report) = self.start(Operation::Check);

        let old = self.metadata.load()?;
        let new = self.fetch_list().await?;
        self.diff(&old, &new, full_update, &mut report)?;
        Ok(Self::finish(started, report))
    }

    /// Refetch every issue named in stored metadata and replace the
    /// archive. The metadata file is left as is.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored metadata is missing or malformed, or
    /// if the fetch or write fails.
    pub async fn refetch(&mut self) -> Result<RunReport> {
        let (started, mut report) = self.start(Operation::Refetch);

        let stored = self.metadata.load()?;
        let outcome = self.diff(&MetadataSnapshot::new(), &stored, true, &mut report)?;
        let (issues, _) = self.fetch(&outcome.update_set, &mut report).await?;

        let mut archive = Archive::from_issues(issues);
        self.persist(&mut archive, None, &mut report)?;
        Ok(Self::finish(started, report))
    }

    /// Fetch only the issues named in stored metadata that the archive
    /// lacks. Records already archived are left untouched.
    ///
    /// # Errors
    ///
    /// Returns an error if either file is missing or malformed, or if the
    /// fetch or write fails.
    pub async fn fix(&mut self) -> Result<RunReport> {
        let (started, mut report) = self.start(Operation::Fix);

        let stored = self.metadata.load()?;
        let mut archive = self.archive.load()?;
        let known = diff::compute(&MetadataSnapshot::new(), &stored, true)?.update_set;

        let missing: BTreeSet<IssueId> = known.difference(&archive.ids()).copied().collect();
        report.selected = missing.len();
        info!(missing = missing.len(), "issues not yet archived");
        self.enter(RunPhase::Diffed);

        if missing.is_empty() {
            return Ok(Self::finish(started, report));
        }

        let (issues, _) = self.fetch(&missing, &mut report).await?;
        if issues.is_empty() {
            return Ok(Self::finish(started, report));
        }
        archive.merge_all(issues);
        self.persist(&mut archive, None, &mut report)?;
        Ok(Self::finish(started, report))
    }

    /// Fetch the remote list, refetch what the diff selects and merge it
    /// into the archive by id. Nothing is written when the selection is
    /// empty.
    ///
    /// # Errors
    ///
    /// Returns an error if stored metadata or the archive is missing or
    /// malformed, or if the list fetch, diff, fetch or write fails.
    pub async fn update(&mut self, full_update: bool) -> Result<RunReport> {
        let (started, mut report) = self.start(Operation::Update);

        let old = self.metadata.load()?;
        let new = self.fetch_list().await?;
        let outcome = self.diff(&old, &new, full_update, &mut report)?;

        if outcome.update_set.is_empty() {
            info!("no change detected");
            return Ok(Self::finish(started, report));
        }

        let mut archive = self.archive.load()?;
        let (issues, _) = self.fetch(&outcome.update_set, &mut report).await?;
        let stats = archive.merge_all(issues);
        debug!(
            inserted = stats.inserted,
            replaced = stats.replaced,
            unchanged = stats.unchanged,
            "merged"
        );

        self.persist(&mut archive, Some(&new), &mut report)?;
        Ok(Self::finish(started, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::TextMode;
    use crate::error::Error;
    use crate::model::ScalarField;
    use crate::model::StatusCode::{Closed, Open, Pending};
    use crate::remote::FetchError;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;

    struct FakeList(MetadataSnapshot);

    impl ListSource for FakeList {
        async fn fetch_list(&self) -> Result<MetadataSnapshot> {
            Ok(self.0.clone())
        }
    }

    /// Serves `<tag>-<id>` and records which ids were requested.
    struct FakeItems {
        tag: &'static str,
        requested: Mutex<Vec<IssueId>>,
    }

    impl FakeItems {
        fn new(tag: &'static str) -> Self {
            Self {
                tag,
                requested: Mutex::new(Vec::new()),
            }
        }

        fn requested(&self) -> BTreeSet<IssueId> {
            self.requested.lock().unwrap().iter().copied().collect()
        }
    }

    impl ItemSource for FakeItems {
        async fn fetch_item(
            &self,
            id: IssueId,
            _timeout: Duration,
        ) -> std::result::Result<String, FetchError> {
            self.requested.lock().unwrap().push(id);
            Ok(format!("{}-{id}", self.tag))
        }
    }

    struct TitleExtractor;

    impl RecordExtractor for TitleExtractor {
        fn extract(&self, id: IssueId, document: &str) -> Result<Issue> {
            Issue::builder(id).scalar(ScalarField::Title, document).build()
        }
    }

    struct Files {
        _dir: TempDir,
        meta: PathBuf,
        data: PathBuf,
    }

    impl Files {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let meta = dir.path().join("meta.json");
            let data = dir.path().join("issues.json.gz");
            Self {
                _dir: dir,
                meta,
                data,
            }
        }

        fn orchestrator(
            &self,
            list: MetadataSnapshot,
            tag: &'static str,
        ) -> SyncOrchestrator<FakeList, FakeItems, TitleExtractor> {
            SyncOrchestrator::new(
                FakeList(list),
                FetchCoordinator::new(FakeItems::new(tag), TitleExtractor).with_concurrency(4),
                MetadataStore::new(&self.meta),
                ArchiveStore::new(&self.data, TextMode::Base64),
            )
        }

        fn archive(&self) -> Archive {
            ArchiveStore::new(&self.data, TextMode::Base64).load().unwrap()
        }

        fn metadata(&self) -> MetadataSnapshot {
            MetadataStore::new(&self.meta).load().unwrap()
        }

        fn bytes(&self) -> (Vec<u8>, Vec<u8>) {
            (
                std::fs::read(&self.meta).unwrap(),
                std::fs::read(&self.data).unwrap(),
            )
        }
    }

    fn snapshot(entries: &[(IssueId, crate::model::StatusCode)]) -> MetadataSnapshot {
        entries.iter().copied().collect()
    }

    fn title(archive: &Archive, id: IssueId) -> &str {
        &archive.get(id).unwrap().title
    }

    #[tokio::test]
    async fn test_rebuild_writes_both_files() {
        let files = Files::new();
        let list = snapshot(&[(1, Open), (2, Closed)]);
        let mut sync = files.orchestrator(list.clone(), "v1");

        let report = sync.rebuild().await.unwrap();

        assert_eq!(report.selected, 2);
        assert_eq!(report.fetched, 2);
        assert_eq!(report.written, 2);
        assert!(report.persisted);
        assert_eq!(sync.phase(), RunPhase::Persisted);
        assert_eq!(files.metadata(), list);
        let archive = files.archive();
        assert_eq!(archive.ids(), BTreeSet::from([1, 2]));
        assert!(archive.last_fetched() > 0.0);
    }

    #[tokio::test]
    async fn test_update_without_changes_is_noop() {
        let files = Files::new();
        let list = snapshot(&[(1, Open), (2, Closed)]);
        files.orchestrator(list.clone(), "v1").rebuild().await.unwrap();
        let before = files.bytes();

        let mut sync = files.orchestrator(list, "v2");
        let report = sync.update(false).await.unwrap();

        assert_eq!(report.selected, 0);
        assert!(!report.persisted);
        assert!(sync.fetcher().source().requested().is_empty());
        assert_eq!(files.bytes(), before);
    }

    #[tokio::test]
    async fn test_update_merges_selected_issues() {
        let files = Files::new();
        files
            .orchestrator(snapshot(&[(1, Open), (2, Closed)]), "v1")
            .rebuild()
            .await
            .unwrap();

        let new = snapshot(&[(1, Closed), (2, Closed), (3, Open)]);
        let mut sync = files.orchestrator(new.clone(), "v2");
        let report = sync.update(false).await.unwrap();

        assert_eq!(report.newly_added, 1);
        assert_eq!(report.selected, 2);
        assert_eq!(report.written, 3);
        assert_eq!(sync.fetcher().source().requested(), BTreeSet::from([1, 3]));

        let archive = files.archive();
        assert_eq!(title(&archive, 1), "v2-1");
        assert_eq!(title(&archive, 2), "v1-2");
        assert_eq!(title(&archive, 3), "v2-3");
        assert_eq!(files.metadata(), new);
    }

    #[tokio::test]
    async fn test_full_update_refetches_open_issues() {
        let files = Files::new();
        files
            .orchestrator(snapshot(&[(1, Open), (2, Closed)]), "v1")
            .rebuild()
            .await
            .unwrap();

        let new = snapshot(&[(1, Pending), (2, Closed)]);
        let mut incremental = files.orchestrator(new.clone(), "v2");
        assert_eq!(incremental.update(false).await.unwrap().selected, 0);

        let mut full = files.orchestrator(new, "v2");
        let report = full.update(true).await.unwrap();
        assert_eq!(report.selected, 1);
        assert_eq!(title(&files.archive(), 1), "v2-1");
    }

    #[tokio::test]
    async fn test_check_mutates_nothing() {
        let files = Files::new();
        files
            .orchestrator(snapshot(&[(1, Open)]), "v1")
            .rebuild()
            .await
            .unwrap();
        let before = files.bytes();

        let mut sync = files.orchestrator(snapshot(&[(1, Closed), (2, Open)]), "v2");
        let report = sync.check(false).await.unwrap();

        assert_eq!(report.selected, 2);
        assert_eq!(report.diff.unwrap().open_now_closed, 1);
        assert!(!report.persisted);
        assert!(sync.fetcher().source().requested().is_empty());
        assert_eq!(files.bytes(), before);
    }

    #[tokio::test]
    async fn test_fix_fetches_only_missing() {
        let files = Files::new();
        MetadataStore::new(&files.meta)
            .save(&snapshot(&[(1, Open), (2, Closed), (3, Pending)]))
            .unwrap();
        let existing = Issue::builder(1)
            .scalar(ScalarField::Title, "kept")
            .build()
            .unwrap();
        ArchiveStore::new(&files.data, TextMode::Base64)
            .save(&Archive::from_issues([existing]))
            .unwrap();

        let mut sync = files.orchestrator(MetadataSnapshot::new(), "fixed");
        let report = sync.fix().await.unwrap();

        assert_eq!(report.selected, 2);
        assert_eq!(sync.fetcher().source().requested(), BTreeSet::from([2, 3]));
        let archive = files.archive();
        assert_eq!(title(&archive, 1), "kept");
        assert_eq!(title(&archive, 2), "fixed-2");
        assert_eq!(archive.len(), 3);
    }

    #[tokio::test]
    async fn test_refetch_uses_stored_metadata_only() {
        let files = Files::new();
        let stored = snapshot(&[(4, Open), (5, Closed)]);
        MetadataStore::new(&files.meta).save(&stored).unwrap();

        let mut sync = files.orchestrator(snapshot(&[(99, Open)]), "again");
        let report = sync.refetch().await.unwrap();

        assert_eq!(report.written, 2);
        assert_eq!(files.archive().ids(), BTreeSet::from([4, 5]));
        assert_eq!(files.metadata(), stored);
    }

    #[tokio::test]
    async fn test_cancelled_update_leaves_files_untouched() {
        let files = Files::new();
        files
            .orchestrator(snapshot(&[(1, Open)]), "v1")
            .rebuild()
            .await
            .unwrap();
        let before = files.bytes();

        let token = CancellationToken::new();
        token.cancel();
        let mut sync = SyncOrchestrator::new(
            FakeList(snapshot(&[(1, Closed), (2, Open)])),
            FetchCoordinator::new(FakeItems::new("v2"), TitleExtractor).with_cancellation(token),
            MetadataStore::new(&files.meta),
            ArchiveStore::new(&files.data, TextMode::Base64),
        );

        assert!(matches!(sync.update(false).await, Err(Error::Cancelled)));
        assert_eq!(files.bytes(), before);
    }

    struct StalledList;

    impl ListSource for StalledList {
        async fn fetch_list(&self) -> Result<MetadataSnapshot> {
            std::future::pending().await
        }
    }

    fn stalled(
        files: &Files,
        token: CancellationToken,
    ) -> SyncOrchestrator<StalledList, FakeItems, TitleExtractor> {
        SyncOrchestrator::new(
            StalledList,
            FetchCoordinator::new(FakeItems::new("v1"), TitleExtractor).with_cancellation(token),
            MetadataStore::new(&files.meta),
            ArchiveStore::new(&files.data, TextMode::Base64),
        )
    }

    #[tokio::test]
    async fn test_cancelled_token_interrupts_stalled_list() {
        let files = Files::new();
        let token = CancellationToken::new();
        token.cancel();
        let mut sync = stalled(&files, token);

        let result = tokio::time::timeout(Duration::from_secs(2), sync.rebuild())
            .await
            .expect("rebuild should stop on cancellation");
        assert!(matches!(result, Err(Error::Cancelled)));
        assert_eq!(sync.phase(), RunPhase::Idle);
        assert!(!files.meta.exists());
        assert!(!files.data.exists());
    }

    #[tokio::test]
    async fn test_cancel_during_list_fetch() {
        let files = Files::new();
        MetadataStore::new(&files.meta)
            .save(&snapshot(&[(1, Open)]))
            .unwrap();
        let token = CancellationToken::new();
        let mut sync = stalled(&files, token.clone());

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        });

        let result = tokio::time::timeout(Duration::from_secs(2), sync.check(false))
            .await
            .expect("check should stop on cancellation");
        assert!(matches!(result, Err(Error::Cancelled)));
        assert_eq!(files.metadata(), snapshot(&[(1, Open)]));
    }

    #[tokio::test]
    async fn test_update_requires_metadata() {
        let files = Files::new();
        let mut sync = files.orchestrator(snapshot(&[(1, Open)]), "v1");

        assert!(matches!(
            sync.update(false).await,
            Err(Error::MetadataNotFound { .. })
        ));
        assert!(!files.data.exists());
    }

    #[tokio::test]
    async fn test_invalid_remote_status_aborts_update() {
        let files = Files::new();
        files
            .orchestrator(snapshot(&[(1, Open)]), "v1")
            .rebuild()
            .await
            .unwrap();
        let before = files.bytes();

        let mut bad = snapshot(&[(1, Open)]);
        bad.insert(2, 0);
        let mut sync = files.orchestrator(bad, "v2");

        assert!(matches!(
            sync.update(true).await,
            Err(Error::InvalidStatus { id: 2, code: 0 })
        ));
        assert_eq!(files.bytes(), before);
    }
}
