//! # DocFX Topics
//!
//! A live UID index over a DocFX documentation project, for editor tooling.
//!
//! Every addressable topic in a DocFX project carries a UID: conceptual
//! markdown articles declare one in their YAML front matter, and generated
//! API reference files (`### YamlMime:ManagedReference`) declare one per
//! namespace, type, and member. This crate discovers those topics, keeps
//! them in an in-memory index with a persisted snapshot for warm starts,
//! and keeps the index current as content files change on disk.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌────────────┐   ┌─────────────┐
//! │ docfx.json │──▶│ Enumerator │──▶│  Extractor  │
//! │  (config)  │   │ glob match │   │ md / ManRef │
//! └────────────┘   └────────────┘   └──────┬──────┘
//!                                          ▼
//! ┌────────────┐   ┌────────────┐   ┌─────────────┐
//! │  Watcher   │──▶│ TopicCache │◀─▶│  Snapshot   │
//! │  (notify)  │   │ TopicIndex │   │   (JSON)    │
//! └────────────┘   └─────┬──────┘   └─────────────┘
//!                        ▼
//!              lookup / list (editor, CLI)
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! dfx-topics scan                 # index the docfx.json under the cwd
//! dfx-topics lookup System.String # where is this UID defined?
//! dfx-topics list --type method   # every method topic, ordered by UID
//! dfx-topics watch                # keep the snapshot current
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | `docfx.json` parsing and project discovery |
//! | [`glob`] | DocFX include/exclude glob matching |
//! | [`enumerate`] | Content file discovery |
//! | [`extract`] | Topic extraction from markdown and ManagedReference YAML |
//! | [`snapshot`] | Persisted topic snapshot |
//! | [`watcher`] | Filesystem change notifications |
//! | [`cache`] | Cache controller: population, queries, change feed |
//! | [`progress`] | Progress and diagnostics reporting |
//! | [`commands`] | `dfx-topics` command implementations |

pub mod cache;
pub mod commands;
pub mod config;
pub mod enumerate;
pub mod extract;
pub mod glob;
pub mod progress;
pub mod snapshot;
pub mod watcher;

pub use cache::TopicCache;
pub use docfx_topics_core::{DetailedType, Topic, TopicIndex, TopicType};
