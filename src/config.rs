//! DocFX project configuration and indexer options.
//!
//! The indexer reads the `build.content` section of a project's
//! `docfx.json`. Each entry is a content group: a base directory (`src`),
//! include patterns (`files`), and optional exclude patterns (`exclude`).
//!
//! ```json
//! {
//!   "build": {
//!     "content": [
//!       { "files": ["**.md", "**/toc.yml"], "exclude": ["_site/**"] },
//!       { "src": "obj/api", "files": "**.yml" }
//!     ]
//!   }
//! }
//! ```
//!
//! Keys owned by the build tool that the indexer never reads (`dest`,
//! `resource`, `globalMetadata`, ...) are ignored. Missing or wrongly typed
//! `build`, `content`, and `files` entries are configuration errors.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use crate::glob::GlobMatcher;

/// File name of a DocFX project configuration.
pub const PROJECT_FILE_NAME: &str = "docfx.json";

/// Default location of the persisted topic snapshot, relative to the project
/// directory.
pub const DEFAULT_STATE_PATH: &str = ".docfx-topics/topic-cache.json";

/// Maximum directory depth searched by [`find_project_file`].
const PROJECT_SEARCH_DEPTH: usize = 4;

#[derive(Debug, Deserialize, Clone)]
pub struct DocfxConfig {
    pub build: BuildConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BuildConfig {
    pub content: Vec<ContentGroupConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ContentGroupConfig {
    #[serde(default)]
    pub src: Option<String>,
    pub files: PatternList,
    #[serde(default)]
    pub exclude: Option<PatternList>,
}

/// DocFX accepts either a single pattern or a list of patterns.
#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
pub enum PatternList {
    One(String),
    Many(Vec<String>),
}

impl PatternList {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            PatternList::One(p) => vec![p],
            PatternList::Many(ps) => ps,
        }
    }
}

/// A content group with its base directory resolved and its patterns
/// filtered to markdown / YAML sources.
#[derive(Debug, Clone)]
pub struct ContentGroup {
    pub base_dir: PathBuf,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub matcher: GlobMatcher,
}

impl ContentGroup {
    pub fn matches(&self, path: &Path) -> bool {
        self.matcher.matches(&self.base_dir, path)
    }
}

/// An opened DocFX project: where it lives and which files it selects.
#[derive(Debug, Clone)]
pub struct Project {
    pub project_file: PathBuf,
    pub project_dir: PathBuf,
    pub content: Vec<ContentGroup>,
}

impl Project {
    /// Read and validate `project_file`.
    pub fn load(project_file: &Path) -> Result<Project> {
        let project_dir = project_dir_of(project_file);
        let config = load_docfx_config(project_file)?;

        let mut content = Vec::new();
        for (i, group) in config.build.content.into_iter().enumerate() {
            let base_dir = match group.src.as_deref() {
                Some(src) if !src.trim().is_empty() => project_dir.join(src),
                _ => project_dir.clone(),
            };
            let include = drop_descriptor_patterns(group.files.into_vec());
            let exclude = drop_descriptor_patterns(
                group
                    .exclude
                    .map(PatternList::into_vec)
                    .unwrap_or_default(),
            );

            if include.is_empty() {
                debug!(
                    "content group {} in {} has no markdown/YAML patterns; skipped",
                    i,
                    project_file.display()
                );
                continue;
            }

            let matcher = GlobMatcher::new(&include, &exclude).with_context(|| {
                format!(
                    "Invalid glob pattern in build.content[{}] of {}",
                    i,
                    project_file.display()
                )
            })?;

            content.push(ContentGroup {
                base_dir,
                include,
                exclude,
                matcher,
            });
        }

        Ok(Project {
            project_file: project_file.to_path_buf(),
            project_dir,
            content,
        })
    }

    /// Whether any content group selects `path`.
    pub fn selects(&self, path: &Path) -> bool {
        self.content.iter().any(|group| group.matches(path))
    }

    /// `path` relative to the project directory with `/` separators, or
    /// `None` if it lies outside the project.
    pub fn relative_path(&self, path: &Path) -> Option<String> {
        relative_source_path(&self.project_dir, path)
    }
}

/// Options injected into the cache controller.
#[derive(Debug, Clone)]
pub struct CacheOptions {
    /// Snapshot location relative to the project directory.
    pub state_path: PathBuf,
    /// Write a snapshot after population and after each change.
    pub persist: bool,
    /// Capacity of the watcher → cache notification channel.
    pub watch_channel_capacity: usize,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            state_path: PathBuf::from(DEFAULT_STATE_PATH),
            persist: true,
            watch_channel_capacity: 64,
        }
    }
}

pub fn load_docfx_config(path: &Path) -> Result<DocfxConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read project file: {}", path.display()))?;

    let config: DocfxConfig = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse project file: {}", path.display()))?;

    if config.build.content.is_empty() {
        bail!("build.content must list at least one content group");
    }

    Ok(config)
}

/// Locate a DocFX project file at or below `dir`.
///
/// `dir/docfx.json` wins; otherwise the shallowest match of a bounded walk.
pub fn find_project_file(dir: &Path) -> Option<PathBuf> {
    let direct = dir.join(PROJECT_FILE_NAME);
    if direct.is_file() {
        return Some(direct);
    }

    let walker = WalkDir::new(dir)
        .max_depth(PROJECT_SEARCH_DEPTH)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_skipped_dir(e));

    let mut best: Option<(usize, PathBuf)> = None;
    for entry in walker.filter_map(|e| e.ok()) {
        if entry.file_type().is_file() && entry.file_name() == PROJECT_FILE_NAME {
            let depth = entry.depth();
            if best.as_ref().map_or(true, |(d, _)| depth < *d) {
                best = Some((depth, entry.into_path()));
            }
        }
    }
    best.map(|(_, path)| path)
}

/// Directories never descended into when walking a project.
pub fn is_skipped_dir(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && matches!(
            entry.file_name().to_str(),
            Some(".git" | "node_modules" | "_site")
        )
}

pub fn project_dir_of(project_file: &Path) -> PathBuf {
    match project_file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Relative path with `/` separators, or `None` outside `base`.
pub fn relative_source_path(base: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(base).ok()?;
    let parts: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    if parts.is_empty() {
        return None;
    }
    Some(parts.join("/"))
}

/// Swagger / JSON descriptors are not topic sources.
fn drop_descriptor_patterns(patterns: Vec<String>) -> Vec<String> {
    patterns
        .into_iter()
        .filter(|p| !p.trim_end().to_ascii_lowercase().ends_with(".json"))
        .collect()
}
