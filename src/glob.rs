//! Include/exclude glob matching for DocFX content groups.
//!
//! A path is selected when it matches at least one include pattern and no
//! exclude pattern, both evaluated against the path relative to the group's
//! base directory (with `/` separators).
//!
//! DocFX accepts `**` glued directly to a name, as in `**.md` or
//! `articles/**.yml`, meaning "this suffix at any depth, including the base
//! directory itself". `globset` only treats `**` as recursive when it is a
//! whole path component, so such patterns are expanded before compiling:
//!
//! | Pattern | Compiled as |
//! |---------|-------------|
//! | `**.md` | `*.md`, `**/*.md` |
//! | `api/**.yml` | `api/*.yml`, `api/**/*.yml` |
//! | `**/*.md` | unchanged |

use anyhow::Result;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::Path;

use crate::config::relative_source_path;

/// Compiled include/exclude pattern sets.
#[derive(Debug, Clone)]
pub struct GlobMatcher {
    include: GlobSet,
    exclude: GlobSet,
}

impl GlobMatcher {
    pub fn new(include: &[String], exclude: &[String]) -> Result<Self> {
        Ok(Self {
            include: build_globset(include)?,
            exclude: build_globset(exclude)?,
        })
    }

    /// Whether `path` (absolute, or relative to the same root as
    /// `base_dir`) is selected. Paths outside `base_dir` never match.
    pub fn matches(&self, base_dir: &Path, path: &Path) -> bool {
        match relative_source_path(base_dir, path) {
            Some(relative) => self.matches_relative(&relative),
            None => false,
        }
    }

    /// Match a path already made relative to the base directory.
    pub fn matches_relative(&self, relative: &str) -> bool {
        self.include.is_match(relative) && !self.exclude.is_match(relative)
    }
}

/// One-shot form of [`GlobMatcher::matches`].
pub fn matches(
    include: &[String],
    exclude: &[String],
    base_dir: &Path,
    path: &Path,
) -> Result<bool> {
    Ok(GlobMatcher::new(include, exclude)?.matches(base_dir, path))
}

/// Expand DocFX `**<suffix>` shorthand into patterns globset understands.
pub fn expand_pattern(pattern: &str) -> Vec<String> {
    let normalized = pattern.trim().replace('\\', "/");
    let normalized = normalized.trim_start_matches("./").trim_start_matches('/');
    expand_normalized(normalized)
}

fn expand_normalized(pattern: &str) -> Vec<String> {
    let Some(pos) = find_glued_double_star(pattern) else {
        return vec![pattern.to_string()];
    };
    let head = &pattern[..pos];
    let tail = &pattern[pos + 2..];

    let mut expanded = Vec::new();
    for rest in expand_normalized(tail) {
        expanded.push(format!("{}*{}", head, rest));
        expanded.push(format!("{}**/*{}", head, rest));
    }
    expanded
}

/// Byte offset of the first `**` that is followed by something other than
/// `/` or the end of the pattern.
fn find_glued_double_star(pattern: &str) -> Option<usize> {
    let bytes = pattern.as_bytes();
    let mut i = 0;
    while i + 1 < bytes.len() {
        if bytes[i] == b'*' && bytes[i + 1] == b'*' {
            match bytes.get(i + 2) {
                None | Some(b'/') => {
                    i += 2;
                    continue;
                }
                Some(_) => return Some(i),
            }
        }
        i += 1;
    }
    None
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        for expanded in expand_pattern(pattern) {
            builder.add(GlobBuilder::new(&expanded).literal_separator(true).build()?);
        }
    }
    Ok(builder.build()?)
}
