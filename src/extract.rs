//! Topic extraction from DocFX content files.
//!
//! Two content formats define topics:
//!
//! - **Markdown** with a YAML front-matter block carrying a `uid`. One
//!   conceptual topic per file.
//! - **Managed-reference YAML** (first line `### YamlMime:ManagedReference`).
//!   One topic per item in `items` that has a `uid`.
//!
//! Table-of-contents files and JSON files never define topics. A malformed
//! file yields an [`ExtractError`]; scans log it and move on.

use docfx_topics_core::Topic;
use serde::Deserialize;
use std::io::Read;
use std::path::Path;

/// Front matter must close within this many bytes of the start of the file.
pub const MAX_FRONT_MATTER_BYTES: u64 = 64 * 1024;

/// First-line marker of a managed-reference YAML document.
pub const MANAGED_REFERENCE_MIME: &str = "YamlMime:ManagedReference";

/// Per-file extraction failure.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed front matter in {path}: {message}")]
    FrontMatter { path: String, message: String },

    #[error("malformed managed reference YAML in {path}: {message}")]
    ManagedReference { path: String, message: String },
}

/// Broad kind of a content file, decided from its name alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Markdown,
    Yaml,
    /// TOC files, JSON descriptors, and anything else.
    Ignored,
}

impl ContentKind {
    pub fn of(path: &Path) -> ContentKind {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();

        if is_toc_file_name(&file_name) {
            return ContentKind::Ignored;
        }

        match path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .as_deref()
        {
            Some("md") | Some("markdown") => ContentKind::Markdown,
            Some("yml") | Some("yaml") => ContentKind::Yaml,
            _ => ContentKind::Ignored,
        }
    }

    pub fn is_content(&self) -> bool {
        !matches!(self, ContentKind::Ignored)
    }
}

/// `toc.yml`, `toc.md`, `api-toc.yaml`, ...
pub fn is_toc_file_name(lowercase_name: &str) -> bool {
    ["toc.yml", "toc.yaml", "toc.md"]
        .iter()
        .any(|suffix| lowercase_name.ends_with(suffix))
}

/// Extract every topic defined by the file at `path`.
///
/// Each topic's `source_file` is `path` as given.
pub fn extract_topics(path: &Path) -> Result<Vec<Topic>, ExtractError> {
    match ContentKind::of(path) {
        ContentKind::Ignored => Ok(Vec::new()),
        ContentKind::Markdown => {
            let head = read_head(path, MAX_FRONT_MATTER_BYTES)?;
            extract_markdown(&path.to_string_lossy(), &head)
        }
        ContentKind::Yaml => {
            let text = std::fs::read_to_string(path).map_err(|source| ExtractError::Io {
                path: path.display().to_string(),
                source,
            })?;
            extract_managed_reference(&path.to_string_lossy(), &text)
        }
    }
}

/// Conceptual topic from a markdown file's front matter, if it has a `uid`.
pub fn extract_markdown(source_file: &str, text: &str) -> Result<Vec<Topic>, ExtractError> {
    let Some(block) = front_matter_block(text) else {
        return Ok(Vec::new());
    };

    let value: serde_yml::Value =
        serde_yml::from_str(block).map_err(|e| ExtractError::FrontMatter {
            path: source_file.to_string(),
            message: e.to_string(),
        })?;

    let Some(uid) = scalar_field(&value, "uid") else {
        return Ok(Vec::new());
    };

    Ok(vec![Topic::conceptual(
        uid,
        source_file,
        scalar_field(&value, "name"),
        scalar_field(&value, "title"),
    )])
}

#[derive(Debug, Deserialize)]
struct ManagedReferenceDocument {
    #[serde(default)]
    items: Vec<ManagedReferenceItem>,
}

#[derive(Debug, Deserialize)]
struct ManagedReferenceItem {
    #[serde(default)]
    uid: Option<String>,
    #[serde(default, rename = "type")]
    member_type: Option<String>,
    #[serde(default, rename = "fullName")]
    full_name: Option<String>,
    #[serde(default, rename = "nameWithType")]
    name_with_type: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

/// Managed-reference topics from a YAML document. Documents without the
/// managed-reference marker on their first line define nothing.
pub fn extract_managed_reference(
    source_file: &str,
    text: &str,
) -> Result<Vec<Topic>, ExtractError> {
    let first_line = text.trim_start_matches('\u{feff}').lines().next().unwrap_or("");
    if !is_managed_reference_marker(first_line) {
        return Ok(Vec::new());
    }

    let document: ManagedReferenceDocument =
        serde_yml::from_str(text).map_err(|e| ExtractError::ManagedReference {
            path: source_file.to_string(),
            message: e.to_string(),
        })?;

    let topics = document
        .items
        .into_iter()
        .filter_map(|item| {
            let uid = item.uid.filter(|u| !u.trim().is_empty())?;
            let name = item.full_name.or(item.name);
            Some(Topic::managed_reference(
                uid,
                source_file,
                item.member_type,
                name,
                item.name_with_type,
            ))
        })
        .collect();
    Ok(topics)
}

/// `### YamlMime:ManagedReference`
fn is_managed_reference_marker(line: &str) -> bool {
    let Some(rest) = line.trim().strip_prefix('#') else {
        return false;
    };
    rest.trim_start_matches('#').trim() == MANAGED_REFERENCE_MIME
}

/// The YAML between a leading `---` fence and its closing `---` (or
/// `...`). `None` if the file does not open with a fence or the fence never
/// closes within `text`.
fn front_matter_block(text: &str) -> Option<&str> {
    let text = text.trim_start_matches('\u{feff}');
    let mut lines = text.split_inclusive('\n');
    let first = lines.next()?;
    if first.trim_end() != "---" {
        return None;
    }

    let start = first.len();
    let mut offset = start;
    for line in lines {
        let trimmed = line.trim_end();
        if trimmed == "---" || trimmed == "..." {
            return Some(&text[start..offset]);
        }
        offset += line.len();
    }
    None
}

/// A scalar front-matter field rendered as a non-empty string.
fn scalar_field(value: &serde_yml::Value, key: &str) -> Option<String> {
    let field = value.get(key)?;
    let text = match field {
        serde_yml::Value::String(s) => s.trim().to_string(),
        serde_yml::Value::Number(n) => n.to_string(),
        serde_yml::Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

fn read_head(path: &Path, max_bytes: u64) -> Result<String, ExtractError> {
    let io_err = |source| ExtractError::Io {
        path: path.display().to_string(),
        source,
    };
    let file = std::fs::File::open(path).map_err(io_err)?;
    let mut buf = Vec::new();
    file.take(max_bytes).read_to_end(&mut buf).map_err(io_err)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use docfx_topics_core::{DetailedType, TopicType};
    use tempfile::TempDir;

    #[test]
    fn markdown_with_uid_and_no_title() {
        let text = "---\nuid: Getting.Started\n---\n# Getting started\n";
        let topics = extract_markdown("articles/getting-started.md", text).unwrap();
        assert_eq!(topics.len(), 1);
        let topic = &topics[0];
        assert_eq!(topic.uid, "Getting.Started");
        assert_eq!(topic.name, "Getting.Started");
        assert_eq!(topic.title, "Getting.Started");
        assert_eq!(topic.detailed_type, DetailedType::Conceptual);
        assert_eq!(topic.source_file, "articles/getting-started.md");
    }

    #[test]
    fn markdown_title_is_used() {
        let text = "---\r\nuid: intro\r\ntitle: Introduction\r\n---\r\nbody";
        let topics = extract_markdown("intro.md", text).unwrap();
        assert_eq!(topics[0].name, "intro");
        assert_eq!(topics[0].title, "Introduction");
    }

    #[test]
    fn markdown_without_front_matter_or_uid_defines_nothing() {
        assert!(extract_markdown("a.md", "# Just a page\n").unwrap().is_empty());
        assert!(extract_markdown("a.md", "---\ntitle: No uid\n---\n").unwrap().is_empty());
        // The fence never closes.
        assert!(extract_markdown("a.md", "---\nuid: a\n").unwrap().is_empty());
        // A horizontal rule later in the file is not front matter.
        assert!(extract_markdown("a.md", "text\n---\nuid: a\n---\n").unwrap().is_empty());
    }

    #[test]
    fn malformed_front_matter_is_an_error() {
        let err = extract_markdown("bad.md", "---\nuid: [unclosed\n---\n").unwrap_err();
        assert!(matches!(err, ExtractError::FrontMatter { .. }));
    }

    #[test]
    fn numeric_uid_is_accepted() {
        let topics = extract_markdown("n.md", "---\nuid: 42\n---\n").unwrap();
        assert_eq!(topics[0].uid, "42");
    }

    #[test]
    fn managed_reference_item() {
        let text = "### YamlMime:ManagedReference\nitems:\n- uid: Foo.Bar\n  type: Method\n  fullName: Foo.Bar()\n  nameWithType: Bar()\nreferences: []\n";
        let topics = extract_managed_reference("api/Foo.Bar.yml", text).unwrap();
        assert_eq!(topics.len(), 1);
        let topic = &topics[0];
        assert_eq!(topic.uid, "Foo.Bar");
        assert_eq!(topic.coarse_type, TopicType::ManagedReference);
        assert_eq!(topic.detailed_type, DetailedType::Method);
        assert_eq!(topic.member_type.as_deref(), Some("Method"));
        assert_eq!(topic.name, "Foo.Bar()");
        assert_eq!(topic.title, "Bar()");
    }

    #[test]
    fn managed_reference_skips_items_without_uid() {
        let text = "### YamlMime:ManagedReference\nitems:\n- uid: N\n  type: Namespace\n- type: Class\n  name: Orphan\n- uid: N.C\n  type: Class\n  name: C\n";
        let topics = extract_managed_reference("api/N.yml", text).unwrap();
        let uids: Vec<&str> = topics.iter().map(|t| t.uid.as_str()).collect();
        assert_eq!(uids, vec!["N", "N.C"]);
        assert_eq!(topics[0].detailed_type, DetailedType::Namespace);
        assert_eq!(topics[1].detailed_type, DetailedType::Type);
        assert_eq!(topics[1].name, "C");
    }

    #[test]
    fn yaml_without_marker_defines_nothing() {
        let text = "items:\n- uid: Foo\n";
        assert!(extract_managed_reference("x.yml", text).unwrap().is_empty());
        let text = "### YamlMime:TableOfContent\nitems:\n- uid: Foo\n";
        assert!(extract_managed_reference("x.yml", text).unwrap().is_empty());
    }

    #[test]
    fn malformed_managed_reference_is_an_error() {
        let text = "### YamlMime:ManagedReference\nitems: [\n";
        let err = extract_managed_reference("bad.yml", text).unwrap_err();
        assert!(matches!(err, ExtractError::ManagedReference { .. }));
    }

    #[test]
    fn content_kinds() {
        assert_eq!(ContentKind::of(Path::new("a/b.md")), ContentKind::Markdown);
        assert_eq!(ContentKind::of(Path::new("a/B.YML")), ContentKind::Yaml);
        assert_eq!(ContentKind::of(Path::new("a/toc.yml")), ContentKind::Ignored);
        assert_eq!(ContentKind::of(Path::new("a/TOC.md")), ContentKind::Ignored);
        assert_eq!(ContentKind::of(Path::new("api/swagger.json")), ContentKind::Ignored);
        assert_eq!(ContentKind::of(Path::new("img/logo.png")), ContentKind::Ignored);
    }

    #[test]
    fn extract_topics_reads_files() {
        let tmp = TempDir::new().unwrap();
        let md = tmp.path().join("intro.md");
        std::fs::write(&md, "---\nuid: intro\n---\n").unwrap();
        let toc = tmp.path().join("toc.yml");
        std::fs::write(&toc, "### YamlMime:ManagedReference\nitems:\n- uid: nope\n").unwrap();

        let topics = extract_topics(&md).unwrap();
        assert_eq!(topics[0].uid, "intro");
        assert_eq!(topics[0].source_file, md.to_string_lossy());
        assert!(extract_topics(&toc).unwrap().is_empty());
        assert!(matches!(
            extract_topics(&tmp.path().join("missing.md")),
            Err(ExtractError::Io { .. })
        ));
    }
}
