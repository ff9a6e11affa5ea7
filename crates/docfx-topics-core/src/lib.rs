//! # docfx-topics core
//!
//! Shared, I/O-free logic for docfx-topics: the topic data model, member
//! type categorization, and the in-memory UID index.
//!
//! This crate contains no tokio, filesystem access, or other native-only
//! dependencies.

pub mod index;
pub mod models;

pub use index::TopicIndex;
pub use models::{DetailedType, Topic, TopicType};
