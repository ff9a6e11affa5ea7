//! Content file discovery for a DocFX project.
//!
//! Walks each content group's base directory and keeps the markdown and
//! YAML files its include/exclude patterns select. The result is the
//! sorted, de-duplicated union over all groups.

use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::path::PathBuf;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::config::{is_skipped_dir, ContentGroup, Project};
use crate::extract::ContentKind;

/// Enumerate every candidate content file of `project`.
pub fn enumerate_content(project: &Project) -> Result<Vec<PathBuf>> {
    let mut files = BTreeSet::new();

    for group in &project.content {
        if !group.base_dir.is_dir() {
            warn!(
                "enumerate: content base directory does not exist: {}",
                group.base_dir.display()
            );
            continue;
        }

        let before = files.len();
        let matched = scan_group(group, &mut files)?;
        debug!(
            "enumerate: {} -> {} matched, {} new (include={:?}, exclude={:?})",
            group.base_dir.display(),
            matched,
            files.len() - before,
            group.include,
            group.exclude
        );
    }

    info!(
        "enumerate: {} content files in {}",
        files.len(),
        project.project_dir.display()
    );
    Ok(files.into_iter().collect())
}

/// Async wrapper running the directory walk on the blocking pool.
pub async fn enumerate_content_async(project: &Project) -> Result<Vec<PathBuf>> {
    let project = project.clone();
    tokio::task::spawn_blocking(move || enumerate_content(&project))
        .await
        .context("content enumeration task failed")?
}

fn scan_group(group: &ContentGroup, files: &mut BTreeSet<PathBuf>) -> Result<usize> {
    let mut matched = 0usize;
    let walker = WalkDir::new(&group.base_dir)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| !is_skipped_dir(e));

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!("enumerate: skipping unreadable entry: {}", err);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        if !ContentKind::of(path).is_content() {
            continue;
        }
        if !group.matches(path) {
            continue;
        }

        matched += 1;
        files.insert(path.to_path_buf());
    }
    Ok(matched)
}
