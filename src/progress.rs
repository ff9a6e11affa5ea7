//! Population progress and diagnostics reporting.
//!
//! The cache reports what it is doing while it populates (discovering
//! files, extracting topics, done) plus the one expected recoverable
//! condition, "no project file found". Editor front ends show these as
//! status-bar text or warnings; the CLI writes them to **stderr** so stdout
//! stays parseable.

use std::io::Write;

/// How loudly an event should be surfaced.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// A single progress or diagnostic event.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ProgressEvent {
    /// Enumerating content files of a project. Total unknown.
    Discovering { project: String },
    /// Extracting topics: `n` files processed out of `total`.
    Extracting { n: u64, total: u64 },
    /// Population finished.
    Populated {
        topics: u64,
        files: u64,
        from_snapshot: bool,
    },
    /// No project is open.
    NoProject,
    /// Population failed; the cache stays unpopulated.
    Failed { reason: String },
}

impl ProgressEvent {
    pub fn severity(&self) -> Severity {
        match self {
            ProgressEvent::NoProject => Severity::Warning,
            ProgressEvent::Failed { .. } => Severity::Error,
            _ => Severity::Info,
        }
    }

    /// Human-readable status line.
    pub fn message(&self) -> String {
        match self {
            ProgressEvent::Discovering { project } => {
                format!("discovering content files in {}", project)
            }
            ProgressEvent::Extracting { n, total } => {
                let percent = if *total == 0 { 100 } else { n * 100 / total };
                format!(
                    "extracting topics  {} / {} files ({}%)",
                    format_number(*n),
                    format_number(*total),
                    percent
                )
            }
            ProgressEvent::Populated {
                topics,
                files,
                from_snapshot,
            } => format!(
                "indexed {} topics from {} files{}",
                format_number(*topics),
                format_number(*files),
                if *from_snapshot { " (snapshot)" } else { "" }
            ),
            ProgressEvent::NoProject => "no DocFX project file (docfx.json) found".to_string(),
            ProgressEvent::Failed { reason } => {
                format!("topic index population failed: {}", reason)
            }
        }
    }
}

/// Receives progress events from the cache.
pub trait ProgressReporter: Send + Sync {
    fn report(&self, event: ProgressEvent);
}

/// Human-friendly progress on stderr: "docfx-topics  extracting topics  1,234 / 5,000 files (24%)".
pub struct StderrProgress;

impl ProgressReporter for StderrProgress {
    fn report(&self, event: ProgressEvent) {
        let prefix = match event.severity() {
            Severity::Info => "docfx-topics ",
            Severity::Warning => "docfx-topics  warning:",
            Severity::Error => "docfx-topics  error:",
        };
        let line = format!("{} {}\n", prefix, event.message());
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ProgressReporter for JsonProgress {
    fn report(&self, event: ProgressEvent) {
        let severity = match event.severity() {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        let mut obj = serde_json::json!({
            "event": "progress",
            "severity": severity,
            "message": event.message(),
        });
        match &event {
            ProgressEvent::Discovering { .. } => obj["phase"] = "discovering".into(),
            ProgressEvent::Extracting { n, total } => {
                obj["phase"] = "extracting".into();
                obj["n"] = (*n).into();
                obj["total"] = (*total).into();
            }
            ProgressEvent::Populated { topics, files, .. } => {
                obj["phase"] = "populated".into();
                obj["topics"] = (*topics).into();
                obj["files"] = (*files).into();
            }
            ProgressEvent::NoProject => obj["phase"] = "no_project".into(),
            ProgressEvent::Failed { .. } => obj["phase"] = "failed".into(),
        }
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn report(&self, _event: ProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Build a reporter for this mode. The cache takes it as an `Arc`.
    pub fn reporter(&self) -> Box<dyn ProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_comma() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }

    #[test]
    fn extracting_message_has_percentage() {
        let event = ProgressEvent::Extracting { n: 250, total: 1000 };
        assert_eq!(event.message(), "extracting topics  250 / 1,000 files (25%)");
        let empty = ProgressEvent::Extracting { n: 0, total: 0 };
        assert!(empty.message().ends_with("(100%)"));
    }

    #[test]
    fn severities() {
        assert_eq!(ProgressEvent::NoProject.severity(), Severity::Warning);
        assert_eq!(
            ProgressEvent::Extracting { n: 1, total: 2 }.severity(),
            Severity::Info
        );
        assert_eq!(
            ProgressEvent::Failed { reason: "x".into() }.severity(),
            Severity::Error
        );
    }
}
