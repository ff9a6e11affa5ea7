//! Topic cache: the one object editor adapters talk to.
//!
//! [`TopicCache`] owns the open project, the in-memory [`TopicIndex`], the
//! persisted snapshot, and the subscription to a change feed.
//!
//! # Lifecycle
//!
//! ```text
//! open_project ──▶ ensure_populated ──▶ start_watching / attach_feed
//!                   │  snapshot or scan      │  on_topic_change (one at a time)
//!                   ▼                        ▼
//!              TopicIndex  ◀─────────── upsert_file / remove_file
//! ```
//!
//! # Concurrency
//!
//! - Population is single-flight: concurrent [`ensure_populated`] callers
//!   share one spawned task and observe the same outcome. The in-flight
//!   marker is cleared when that task ends, on success or failure.
//! - Open, close, and flush bump a generation counter. A population started
//!   under an older generation is never joined and never committed; a
//!   caller waiting on one retries against the current project.
//! - Index commits, change processing, and snapshot writes are serialized
//!   by one async writer lock, held across the snapshot write.
//! - Changes that arrive while a population is in flight are queued and
//!   replayed right after it commits.
//! - Reads (`lookup`, `list`, ...) take a short synchronous read lock and
//!   never wait for I/O.
//!
//! No public operation returns an error or panics on bad input; failures
//! are logged, reported to the [`ProgressReporter`], and surface as
//! `false` / `None` / empty results.
//!
//! [`ensure_populated`]: TopicCache::ensure_populated

use anyhow::anyhow;
use docfx_topics_core::{DetailedType, Topic, TopicIndex};
use futures::future::{self, BoxFuture, FutureExt, Shared};
use std::path::{Path, PathBuf};
use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::{
    find_project_file, project_dir_of, relative_source_path, CacheOptions, Project,
};
use crate::enumerate::enumerate_content_async;
use crate::extract::extract_topics;
use crate::progress::{ProgressEvent, ProgressReporter};
use crate::snapshot::{delete_snapshot, encode_snapshot, read_snapshot, write_snapshot_bytes};
use crate::watcher::{ChangeType, ContentWatcher, TopicChange};

#[derive(Debug, thiserror::Error)]
enum PopulateError {
    #[error("no project is open")]
    NoProject,

    #[error("invalid project configuration: {0:#}")]
    Config(anyhow::Error),

    #[error("content scan failed: {0:#}")]
    Scan(anyhow::Error),
}

type Population = Shared<BoxFuture<'static, bool>>;

/// Attempts made by one `ensure_populated` call when the project is
/// replaced or flushed while it waits.
const MAX_POPULATE_ATTEMPTS: usize = 2;

/// The running population and the generation it was started under.
struct InFlight {
    generation: u64,
    population: Population,
}

#[derive(Default)]
struct CacheState {
    project_file: Option<PathBuf>,
    project_dir: Option<PathBuf>,
    /// Configuration loaded by the last successful population.
    project: Option<Arc<Project>>,
    /// `None` until populated.
    index: Option<TopicIndex>,
    /// Bumped by open/close/flush; a population started under an older
    /// generation is discarded instead of committed.
    generation: u64,
    /// Set when a change was dropped while unpopulated; the next population
    /// rescans instead of trusting the snapshot.
    snapshot_stale: bool,
}

/// A change feed attached to the cache. Dropping it stops the OS watch (if
/// any) and the task draining the feed.
struct Subscription {
    _watcher: Option<ContentWatcher>,
    task: JoinHandle<()>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct CacheInner {
    options: CacheOptions,
    progress: Arc<dyn ProgressReporter>,
    state: RwLock<CacheState>,
    in_flight: Mutex<Option<InFlight>>,
    writer: tokio::sync::Mutex<()>,
    pending: Mutex<Vec<TopicChange>>,
    subscription: Mutex<Option<Subscription>>,
}

/// Result of a successful population, not yet committed.
struct Built {
    project: Arc<Project>,
    index: TopicIndex,
    from_snapshot: bool,
}

/// Clears the in-flight marker when the population task ends, unless a
/// newer run has replaced it.
struct InFlightGuard {
    inner: Arc<CacheInner>,
    generation: u64,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut in_flight = lock(&self.inner.in_flight);
        if in_flight
            .as_ref()
            .is_some_and(|run| run.generation == self.generation)
        {
            *in_flight = None;
        }
    }
}

/// Live UID index over one DocFX project.
///
/// Cheap to clone; clones share the same cache.
#[derive(Clone)]
pub struct TopicCache {
    inner: Arc<CacheInner>,
}

impl TopicCache {
    pub fn new(options: CacheOptions, progress: Arc<dyn ProgressReporter>) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                options,
                progress,
                state: RwLock::new(CacheState::default()),
                in_flight: Mutex::new(None),
                writer: tokio::sync::Mutex::new(()),
                pending: Mutex::new(Vec::new()),
                subscription: Mutex::new(None),
            }),
        }
    }

    // ─── Project lifecycle ──────────────────────────────────────────

    /// Open `project_file`. Opening a different project than the current one
    /// drops the current index and change feed first. The index stays empty
    /// until [`ensure_populated`](TopicCache::ensure_populated).
    ///
    /// Returns `false` if the file does not exist.
    pub fn open_project(&self, project_file: impl AsRef<Path>) -> bool {
        let project_file = absolute(project_file.as_ref());
        if !project_file.is_file() {
            warn!("cache: project file not found: {}", project_file.display());
            return false;
        }

        let replaced = {
            let mut state = write_state(&self.inner.state);
            if state.project_file.as_deref() == Some(project_file.as_path()) {
                return true;
            }
            let replaced = state.project_file.take();
            state.project_dir = Some(project_dir_of(&project_file));
            state.project_file = Some(project_file.clone());
            state.project = None;
            state.index = None;
            state.snapshot_stale = false;
            state.generation += 1;
            replaced
        };

        if let Some(previous) = replaced {
            info!("cache: closing {} for {}", previous.display(), project_file.display());
            self.drop_subscription();
        } else {
            info!("cache: opened {}", project_file.display());
        }
        true
    }

    /// Locate a project at or below `dir` and open it.
    pub fn open_workspace(&self, dir: impl AsRef<Path>) -> bool {
        match find_project_file(dir.as_ref()) {
            Some(project_file) => self.open_project(project_file),
            None => {
                warn!("cache: no project file under {}", dir.as_ref().display());
                self.inner.progress.report(ProgressEvent::NoProject);
                false
            }
        }
    }

    /// Drop the index, the change feed, and the project handle. The
    /// snapshot on disk is kept.
    pub fn close(&self) {
        {
            let mut state = write_state(&self.inner.state);
            let generation = state.generation + 1;
            *state = CacheState {
                generation,
                ..CacheState::default()
            };
        }
        self.drop_subscription();
        debug!("cache: closed");
    }

    // ─── Population ─────────────────────────────────────────────────

    /// Populate the index if needed, reporting "no project found" as a
    /// warning. Returns whether the index is populated.
    pub async fn ensure_populated(&self) -> bool {
        self.populate_once(true).await
    }

    /// Like [`ensure_populated`](TopicCache::ensure_populated), for passive
    /// background startup: a missing project is not reported.
    pub async fn ensure_populated_quietly(&self) -> bool {
        self.populate_once(false).await
    }

    async fn populate_once(&self, report_missing: bool) -> bool {
        for _ in 0..MAX_POPULATE_ATTEMPTS {
            if self.is_populated() {
                return true;
            }
            let (generation, population) = self.join_or_start(report_missing);
            if population.await {
                return true;
            }
            if read_state(&self.inner.state).generation == generation {
                return false;
            }
            debug!("cache: project changed during population, retrying");
        }
        self.is_populated()
    }

    /// Join the population running for the current generation, or start
    /// one. A run left over from a replaced or flushed project is never
    /// joined; it finishes on its own and its result is discarded.
    fn join_or_start(&self, report_missing: bool) -> (u64, Population) {
        let mut in_flight = lock(&self.inner.in_flight);
        let (populated, generation) = {
            let state = read_state(&self.inner.state);
            (state.index.is_some(), state.generation)
        };
        if populated {
            return (generation, future::ready(true).boxed().shared());
        }
        if let Some(run) = in_flight.as_ref().filter(|run| run.generation == generation) {
            return (generation, run.population.clone());
        }

        lock(&self.inner.pending).clear();
        let inner = self.inner.clone();
        let handle = tokio::spawn(async move {
            let _guard = InFlightGuard {
                inner: inner.clone(),
                generation,
            };
            inner.populate(report_missing, generation).await
        });
        let population: Population = async move {
            match handle.await {
                Ok(populated) => populated,
                Err(err) => {
                    error!("cache: population task failed: {}", err);
                    false
                }
            }
        }
        .boxed()
        .shared();
        *in_flight = Some(InFlight {
            generation,
            population: population.clone(),
        });
        (generation, population)
    }

    /// Forget the in-memory index (the project stays open). With
    /// `clear_persisted`, also delete the snapshot. Returns `false` only if
    /// the snapshot could not be deleted.
    ///
    /// A population running at the time is discarded when it finishes.
    /// Changes that arrive while flushed are not applied; they mark the
    /// snapshot stale so the next population rescans the content files.
    pub async fn flush(&self, clear_persisted: bool) -> bool {
        let _writer = self.inner.writer.lock().await;
        let snapshot_path = {
            let mut state = write_state(&self.inner.state);
            state.index = None;
            state.generation += 1;
            state
                .project_dir
                .as_deref()
                .map(|dir| self.inner.snapshot_path(dir))
        };

        if !clear_persisted {
            return true;
        }
        let Some(path) = snapshot_path else {
            return true;
        };
        match delete_snapshot(&path).await {
            Ok(()) => {
                info!("cache: deleted snapshot {}", path.display());
                true
            }
            Err(err) => {
                error!("cache: {:#}", err);
                false
            }
        }
    }

    // ─── Change feed ────────────────────────────────────────────────

    /// Apply one change notification and re-persist the snapshot.
    ///
    /// Failures are logged; the file keeps its last-known-good topics.
    pub async fn on_topic_change(&self, change: TopicChange) {
        self.inner.on_topic_change(change).await
    }

    /// Drain `receiver` into [`on_topic_change`](TopicCache::on_topic_change),
    /// one notification at a time, replacing any previous subscription.
    pub fn attach_feed(&self, receiver: mpsc::Receiver<TopicChange>) {
        let task = self.spawn_feed(receiver);
        self.replace_subscription(Subscription {
            _watcher: None,
            task,
        });
    }

    /// Watch the populated project's content tree. Returns `false` if the
    /// cache is not populated or the watch could not be started.
    pub fn start_watching(&self) -> bool {
        let project = read_state(&self.inner.state).project.clone();
        let Some(project) = project.filter(|_| self.is_populated()) else {
            warn!("cache: cannot watch before the index is populated");
            return false;
        };

        let (sender, receiver) = mpsc::channel(self.inner.options.watch_channel_capacity.max(1));
        match ContentWatcher::start(project, sender) {
            Ok(watcher) => {
                let task = self.spawn_feed(receiver);
                self.replace_subscription(Subscription {
                    _watcher: Some(watcher),
                    task,
                });
                true
            }
            Err(err) => {
                error!("cache: {:#}", err);
                false
            }
        }
    }

    /// Stop the current change feed, if any.
    pub fn stop_watching(&self) {
        self.drop_subscription();
    }

    fn spawn_feed(&self, mut receiver: mpsc::Receiver<TopicChange>) -> JoinHandle<()> {
        let weak: Weak<CacheInner> = Arc::downgrade(&self.inner);
        tokio::spawn(async move {
            while let Some(change) = receiver.recv().await {
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                inner.on_topic_change(change).await;
            }
            debug!("cache: change feed ended");
        })
    }

    fn replace_subscription(&self, subscription: Subscription) {
        let previous = lock(&self.inner.subscription).replace(subscription);
        drop(previous);
    }

    fn drop_subscription(&self) {
        let previous = lock(&self.inner.subscription).take();
        drop(previous);
    }

    // ─── Queries ────────────────────────────────────────────────────

    pub fn is_populated(&self) -> bool {
        read_state(&self.inner.state).index.is_some()
    }

    /// Resolve a UID. `None` if unknown or not populated.
    pub fn lookup(&self, uid: &str) -> Option<Topic> {
        read_state(&self.inner.state)
            .index
            .as_ref()
            .and_then(|index| index.lookup(uid))
    }

    /// Topics ordered by UID, optionally of one detailed type. Empty if not
    /// populated.
    pub fn list(&self, filter: Option<DetailedType>) -> Vec<Topic> {
        read_state(&self.inner.state)
            .index
            .as_ref()
            .map(|index| index.list(filter))
            .unwrap_or_default()
    }

    pub fn topic_count(&self) -> usize {
        read_state(&self.inner.state)
            .index
            .as_ref()
            .map_or(0, TopicIndex::len)
    }

    pub fn content_file_count(&self) -> usize {
        read_state(&self.inner.state)
            .index
            .as_ref()
            .map_or(0, TopicIndex::content_file_count)
    }

    /// UIDs defined by a project-relative content file.
    pub fn uids_for_file(&self, content_file: &str) -> Vec<String> {
        read_state(&self.inner.state)
            .index
            .as_ref()
            .map(|index| index.uids_for_file(content_file))
            .unwrap_or_default()
    }

    pub fn project_file(&self) -> Option<PathBuf> {
        read_state(&self.inner.state).project_file.clone()
    }

    /// Where the snapshot of the open project lives.
    pub fn snapshot_path(&self) -> Option<PathBuf> {
        read_state(&self.inner.state)
            .project_dir
            .as_deref()
            .map(|dir| self.inner.snapshot_path(dir))
    }

    /// Whether the index satisfies its UID ⇄ file invariant. `true` when
    /// not populated.
    pub fn is_consistent(&self) -> bool {
        read_state(&self.inner.state)
            .index
            .as_ref()
            .map_or(true, TopicIndex::is_consistent)
    }
}

impl CacheInner {
    async fn populate(&self, report_missing: bool, generation: u64) -> bool {
        match self.build().await {
            Ok(built) => self.commit(built, generation).await,
            Err(PopulateError::NoProject) => {
                if report_missing {
                    warn!("cache: no project file found");
                    self.progress.report(ProgressEvent::NoProject);
                } else {
                    debug!("cache: no project file found (not reported)");
                }
                false
            }
            Err(err) => {
                error!("cache: population failed: {}", err);
                self.progress.report(ProgressEvent::Failed {
                    reason: err.to_string(),
                });
                false
            }
        }
    }

    async fn build(&self) -> Result<Built, PopulateError> {
        let (project_file, snapshot_stale) = {
            let state = read_state(&self.state);
            (state.project_file.clone(), state.snapshot_stale)
        };
        let project_file = project_file.ok_or(PopulateError::NoProject)?;
        let project = Arc::new(Project::load(&project_file).map_err(PopulateError::Config)?);

        let mut from_snapshot = false;
        let mut topics = None;
        if snapshot_stale {
            debug!("cache: snapshot missed changes while unpopulated, rescanning");
        } else if self.options.persist {
            let path = self.snapshot_path(&project.project_dir);
            match read_snapshot(&path).await {
                Ok(Some(snapshot)) => {
                    info!("cache: loaded {} topics from {}", snapshot.len(), path.display());
                    from_snapshot = true;
                    topics = Some(snapshot);
                }
                Ok(None) => debug!("cache: no snapshot at {}", path.display()),
                Err(err) => warn!("cache: ignoring unusable snapshot: {:#}", err),
            }
        }
        let topics = match topics {
            Some(topics) => topics,
            None => self.scan(&project).await?,
        };

        let topics = topics.into_iter().map(|mut topic| {
            topic.source_file = normalize_source_file(&project.project_dir, &topic.source_file);
            topic
        });
        Ok(Built {
            index: TopicIndex::from_topics(topics),
            project,
            from_snapshot,
        })
    }

    async fn scan(&self, project: &Arc<Project>) -> Result<Vec<Topic>, PopulateError> {
        self.progress.report(ProgressEvent::Discovering {
            project: project.project_file.display().to_string(),
        });
        let files = enumerate_content_async(project)
            .await
            .map_err(PopulateError::Scan)?;

        let progress = self.progress.clone();
        tokio::task::spawn_blocking(move || extract_all(&files, progress.as_ref()))
            .await
            .map_err(|e| PopulateError::Scan(anyhow!("extraction task failed: {}", e)))
    }

    async fn commit(&self, built: Built, generation: u64) -> bool {
        let _writer = self.writer.lock().await;
        let (topics, files) = {
            let mut state = write_state(&self.state);
            if state.generation != generation {
                debug!("cache: discarding population for a flushed or replaced project");
                return false;
            }
            let project_dir = state.project_dir.clone().unwrap_or_default();
            state.project = Some(built.project);
            state.snapshot_stale = false;
            let index = state.index.insert(built.index);

            let pending = std::mem::take(&mut *lock(&self.pending));
            if !pending.is_empty() {
                debug!("cache: replaying {} queued changes", pending.len());
            }
            for change in pending {
                apply_change(index, &project_dir, change);
            }
            (index.len(), index.content_file_count())
        };

        self.persist_locked().await;

        info!("cache: indexed {} topics from {} files", topics, files);
        self.progress.report(ProgressEvent::Populated {
            topics: topics as u64,
            files: files as u64,
            from_snapshot: built.from_snapshot,
        });
        true
    }

    async fn on_topic_change(&self, change: TopicChange) {
        let _writer = self.writer.lock().await;
        let (populated, generation) = {
            let state = read_state(&self.state);
            (state.index.is_some(), state.generation)
        };
        if !populated {
            // The writer lock keeps a commit from landing between the index
            // check above and the queueing below.
            let populating = lock(&self.in_flight)
                .as_ref()
                .is_some_and(|run| run.generation == generation);
            if populating {
                debug!(
                    "cache: queueing change to {} until population ends",
                    change.content_file
                );
                lock(&self.pending).push(change);
            } else {
                debug!(
                    "cache: dropping change to {} (not populated)",
                    change.content_file
                );
                let mut state = write_state(&self.state);
                if state.project_file.is_some() {
                    state.snapshot_stale = true;
                }
            }
            return;
        }

        let applied = {
            let mut state = write_state(&self.state);
            let project_dir = state.project_dir.clone().unwrap_or_default();
            state
                .index
                .as_mut()
                .map_or(false, |index| apply_change(index, &project_dir, change))
        };

        if applied {
            self.persist_locked().await;
        }
    }

    /// Write the snapshot. Callers hold the writer lock.
    async fn persist_locked(&self) {
        if !self.options.persist {
            return;
        }
        let encoded = {
            let state = read_state(&self.state);
            match (state.index.as_ref(), state.project_dir.as_deref()) {
                (Some(index), Some(dir)) => Some((self.snapshot_path(dir), encode_snapshot(index))),
                _ => None,
            }
        };
        match encoded {
            Some((path, Ok(bytes))) => {
                if let Err(err) = write_snapshot_bytes(&path, &bytes).await {
                    warn!("cache: failed to persist snapshot: {:#}", err);
                }
            }
            Some((_, Err(err))) => warn!("cache: failed to encode snapshot: {:#}", err),
            None => {}
        }
    }

    fn snapshot_path(&self, project_dir: &Path) -> PathBuf {
        if self.options.state_path.is_absolute() {
            self.options.state_path.clone()
        } else {
            project_dir.join(&self.options.state_path)
        }
    }
}

/// Apply one notification to `index`. Returns whether the index changed.
fn apply_change(index: &mut TopicIndex, project_dir: &Path, change: TopicChange) -> bool {
    let content_file = normalize_source_file(project_dir, &change.content_file);
    match (change.change_type, change.topics) {
        (ChangeType::Removed, _) => {
            let removed = index.remove_file(&content_file);
            info!("cache: removed {} ({} topics)", content_file, removed);
            true
        }
        (ChangeType::Added | ChangeType::Changed, Some(topics)) => {
            info!("cache: updated {} ({} topics)", content_file, topics.len());
            index.upsert_file(&content_file, topics);
            true
        }
        (change_type, None) => {
            warn!(
                "cache: ignoring {:?} notification without topics for {}",
                change_type, content_file
            );
            false
        }
    }
}

/// Extract topics from every file, skipping (and logging) malformed ones.
fn extract_all(files: &[PathBuf], progress: &dyn ProgressReporter) -> Vec<Topic> {
    let total = files.len() as u64;
    let step = (total / 20).max(1);
    let mut topics = Vec::new();
    let mut failed = 0usize;

    for (i, path) in files.iter().enumerate() {
        match extract_topics(path) {
            Ok(mut file_topics) => topics.append(&mut file_topics),
            Err(err) => {
                failed += 1;
                warn!("cache: skipping file: {}", err);
            }
        }
        let n = i as u64 + 1;
        if n % step == 0 || n == total {
            progress.report(ProgressEvent::Extracting { n, total });
        }
    }

    if failed > 0 {
        warn!("cache: {} of {} files could not be parsed", failed, total);
    }
    topics
}

/// Project-relative, `/`-separated form of a topic's source file.
fn normalize_source_file(project_dir: &Path, source_file: &str) -> String {
    let path = Path::new(source_file);
    if path.is_absolute() {
        if let Some(relative) = relative_source_path(project_dir, path) {
            return relative;
        }
    }
    source_file.replace('\\', "/")
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read_state(state: &RwLock<CacheState>) -> RwLockReadGuard<'_, CacheState> {
    state.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_state(state: &RwLock<CacheState>) -> RwLockWriteGuard<'_, CacheState> {
    state.write().unwrap_or_else(PoisonError::into_inner)
}
