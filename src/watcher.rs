//! Content-file change notifications.
//!
//! [`ContentWatcher`] watches a project directory recursively through
//! `notify` and turns raw filesystem events into [`TopicChange`]s: one per
//! affected content file, carrying the file's freshly extracted topics for
//! additions and edits.
//!
//! ```text
//! notify callback ──▶ unbounded raw queue ──▶ worker task ──▶ mpsc::Sender<TopicChange>
//!                                              (filter, extract)
//! ```
//!
//! The worker handles events one at a time, so notifications for the same
//! file leave in the order the OS reported them. Dropping the watcher
//! stops the OS watch and aborts the worker.

use anyhow::{Context, Result};
use docfx_topics_core::Topic;
use notify::event::{ModifyKind, RenameMode};
use notify::{recommended_watcher, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::Project;
use crate::extract::{extract_topics, ContentKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeType {
    Added,
    Changed,
    Removed,
}

/// One content file's change, relative to the project directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicChange {
    pub content_file: String,
    pub change_type: ChangeType,
    /// Topics now defined by the file. `None` for removals.
    pub topics: Option<Vec<Topic>>,
}

impl TopicChange {
    pub fn upserted(
        content_file: impl Into<String>,
        change_type: ChangeType,
        topics: Vec<Topic>,
    ) -> Self {
        Self {
            content_file: content_file.into(),
            change_type,
            topics: Some(topics),
        }
    }

    pub fn removed(content_file: impl Into<String>) -> Self {
        Self {
            content_file: content_file.into(),
            change_type: ChangeType::Removed,
            topics: None,
        }
    }
}

/// Live watch over a project's content tree.
pub struct ContentWatcher {
    _watcher: RecommendedWatcher,
    worker: JoinHandle<()>,
    root: PathBuf,
}

impl ContentWatcher {
    /// Start watching `project` and deliver notifications to `sender`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        project: Arc<Project>,
        sender: mpsc::Sender<TopicChange>,
    ) -> Result<ContentWatcher> {
        let (raw_tx, mut raw_rx) = mpsc::unbounded_channel::<notify::Result<Event>>();

        let mut watcher = recommended_watcher(move |event: notify::Result<Event>| {
            let _ = raw_tx.send(event);
        })
        .with_context(|| {
            format!(
                "failed to create filesystem watcher for {}",
                project.project_dir.display()
            )
        })?;

        watcher
            .watch(&project.project_dir, RecursiveMode::Recursive)
            .with_context(|| format!("failed to watch {}", project.project_dir.display()))?;

        let root = project.project_dir.clone();
        let worker = tokio::spawn(async move {
            while let Some(event) = raw_rx.recv().await {
                let event = match event {
                    Ok(event) => event,
                    Err(err) => {
                        warn!("watcher: error from filesystem watch: {}", err);
                        continue;
                    }
                };
                for (path, change_type) in classify_event(&event) {
                    let Some(change) = change_for_path(&project, &path, change_type).await else {
                        continue;
                    };
                    if sender.send(change).await.is_err() {
                        debug!("watcher: receiver closed, stopping");
                        return;
                    }
                }
            }
        });

        info!("watcher: watching {}", root.display());
        Ok(ContentWatcher {
            _watcher: watcher,
            worker,
            root,
        })
    }
}

impl Drop for ContentWatcher {
    fn drop(&mut self) {
        self.worker.abort();
        info!("watcher: stopped watching {}", self.root.display());
    }
}

/// Map a raw filesystem event to per-path change types.
pub fn classify_event(event: &Event) -> Vec<(PathBuf, ChangeType)> {
    let all = |change_type: ChangeType| -> Vec<(PathBuf, ChangeType)> {
        event.paths.iter().map(|p| (p.clone(), change_type)).collect()
    };

    match &event.kind {
        EventKind::Access(_) => Vec::new(),
        EventKind::Create(_) => all(ChangeType::Added),
        EventKind::Remove(_) => all(ChangeType::Removed),
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => all(ChangeType::Removed),
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => all(ChangeType::Added),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if event.paths.len() == 2 => vec![
            (event.paths[0].clone(), ChangeType::Removed),
            (event.paths[1].clone(), ChangeType::Added),
        ],
        EventKind::Modify(_) | EventKind::Any | EventKind::Other => all(ChangeType::Changed),
    }
}

/// Build the notification for one path, or `None` if the path is not a
/// content file of `project` or its topics could not be extracted.
///
/// Added/Changed paths that no longer exist become removals.
pub async fn change_for_path(
    project: &Project,
    path: &Path,
    change_type: ChangeType,
) -> Option<TopicChange> {
    if !ContentKind::of(path).is_content() || !project.selects(path) {
        return None;
    }
    let content_file = project.relative_path(path)?;

    if change_type == ChangeType::Removed || !path.exists() {
        return Some(TopicChange::removed(content_file));
    }
    if !path.is_file() {
        return None;
    }

    let owned = path.to_path_buf();
    let extracted = tokio::task::spawn_blocking(move || extract_topics(&owned)).await;
    match extracted {
        Ok(Ok(mut topics)) => {
            for topic in &mut topics {
                topic.source_file = content_file.clone();
            }
            Some(TopicChange::upserted(content_file, change_type, topics))
        }
        Ok(Err(err)) => {
            warn!("watcher: {}", err);
            None
        }
        Err(err) => {
            warn!("watcher: extraction task failed for {}: {}", content_file, err);
            None
        }
    }
}
