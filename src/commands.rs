//! `dfx-topics` command implementations.
//!
//! Each `run_*` function drives a [`TopicCache`] and prints to stdout.
//! Diagnostics go through `tracing` and the progress reporter (stderr).

use anyhow::{bail, Context, Result};
use docfx_topics_core::{DetailedType, Topic};
use std::path::Path;

use crate::cache::TopicCache;

/// Open `project` if given, otherwise discover one under the current
/// directory.
pub fn open(cache: &TopicCache, project: Option<&Path>) -> Result<()> {
    let opened = match project {
        Some(project_file) => cache.open_project(project_file),
        None => {
            let cwd = std::env::current_dir().context("Failed to read current directory")?;
            cache.open_workspace(cwd)
        }
    };
    if !opened {
        match project {
            Some(project_file) => bail!("project file not found: {}", project_file.display()),
            None => bail!("no docfx.json found under the current directory"),
        }
    }
    Ok(())
}

async fn populate(cache: &TopicCache) -> Result<()> {
    if !cache.ensure_populated().await {
        bail!("topic index population failed (run with RUST_LOG=debug for details)");
    }
    Ok(())
}

/// Populate the index and print a summary.
pub async fn run_scan(cache: &TopicCache, rebuild: bool) -> Result<()> {
    if rebuild && !cache.flush(true).await {
        bail!("failed to delete the topic snapshot");
    }
    populate(cache).await?;

    println!(
        "Indexed {} topics from {} content files.",
        cache.topic_count(),
        cache.content_file_count()
    );
    if let Some(path) = cache.snapshot_path().filter(|p| p.exists()) {
        println!("Snapshot: {}", path.display());
    }
    Ok(())
}

/// Print topics ordered by UID.
pub async fn run_list(cache: &TopicCache, filter: Option<DetailedType>, json: bool) -> Result<()> {
    populate(cache).await?;
    let topics = cache.list(filter);

    if json {
        println!("{}", serde_json::to_string_pretty(&topics)?);
        return Ok(());
    }
    for topic in &topics {
        println!("{}", format_topic(topic));
    }
    Ok(())
}

/// Resolve one UID. Returns whether it was found.
pub async fn run_lookup(cache: &TopicCache, uid: &str, json: bool) -> Result<bool> {
    populate(cache).await?;
    let Some(topic) = cache.lookup(uid) else {
        eprintln!("No topic with UID '{}'.", uid);
        return Ok(false);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&topic)?);
    } else {
        println!("UID:       {}", topic.uid);
        println!("Type:      {}", topic.detailed_type);
        println!("File:      {}", topic.source_file);
        println!("Name:      {}", topic.name);
        println!("Title:     {}", topic.title);
    }
    Ok(true)
}

/// Delete the persisted snapshot.
pub async fn run_flush(cache: &TopicCache) -> Result<()> {
    if !cache.flush(true).await {
        bail!("failed to delete the topic snapshot");
    }
    match cache.snapshot_path() {
        Some(path) => println!("Deleted snapshot {}.", path.display()),
        None => println!("Nothing to delete."),
    }
    Ok(())
}

/// Populate, then apply filesystem changes until Ctrl-C.
pub async fn run_watch(cache: &TopicCache) -> Result<()> {
    populate(cache).await?;
    if !cache.start_watching() {
        bail!("failed to start watching the project directory");
    }

    let root = cache
        .project_file()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    println!(
        "Watching {} ({} topics). Press Ctrl-C to stop.",
        root,
        cache.topic_count()
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;

    cache.stop_watching();
    println!("Stopped. {} topics indexed.", cache.topic_count());
    Ok(())
}

fn format_topic(topic: &Topic) -> String {
    format!("{}\t{}\t{}", topic.uid, topic.detailed_type, topic.source_file)
}
