//! In-memory topic index: UID → topic, and content file → set of UIDs.
//!
//! `by_uid` is authoritative; `by_content_file` is derived from it. Every
//! mutating operation leaves the two maps in agreement:
//!
//! - every UID in `by_content_file[f]` has `by_uid[uid].source_file == f`
//! - every topic's `source_file` is a key of `by_content_file` whose set
//!   contains the topic's UID
//!
//! The index itself is not synchronized; owners wrap it in a lock and
//! perform each operation under that lock.

use std::collections::{BTreeSet, HashMap};

use crate::models::{DetailedType, Topic};

#[derive(Debug, Clone, Default)]
pub struct TopicIndex {
    by_uid: HashMap<String, Topic>,
    by_content_file: HashMap<String, BTreeSet<String>>,
}

impl TopicIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bulk-load from a flat topic list, grouped by source file.
    ///
    /// Equivalent to calling [`upsert_file`](TopicIndex::upsert_file) once
    /// per distinct source file, in order of first appearance.
    pub fn from_topics<I>(topics: I) -> Self
    where
        I: IntoIterator<Item = Topic>,
    {
        let mut order: Vec<String> = Vec::new();
        let mut grouped: HashMap<String, Vec<Topic>> = HashMap::new();
        for topic in topics {
            let bucket = grouped.entry(topic.source_file.clone()).or_insert_with(|| {
                order.push(topic.source_file.clone());
                Vec::new()
            });
            bucket.push(topic);
        }

        let mut index = Self::new();
        for source_file in order {
            if let Some(file_topics) = grouped.remove(&source_file) {
                index.upsert_file(&source_file, file_topics);
            }
        }
        index
    }

    /// Replace everything known about `source_file` with `topics`.
    ///
    /// Topics are re-filed under `source_file` regardless of the value in
    /// their own `source_file` field. A UID currently owned by another file
    /// moves to this one.
    pub fn upsert_file(&mut self, source_file: &str, topics: Vec<Topic>) {
        self.remove_file(source_file);

        let mut uids = BTreeSet::new();
        for mut topic in topics {
            topic.source_file = source_file.to_string();
            if let Some(previous) = self.by_uid.remove(&topic.uid) {
                if previous.source_file != source_file {
                    self.detach(&previous.source_file, &previous.uid);
                }
            }
            uids.insert(topic.uid.clone());
            self.by_uid.insert(topic.uid.clone(), topic);
        }

        if !uids.is_empty() {
            self.by_content_file.insert(source_file.to_string(), uids);
        }
    }

    /// Forget `source_file` and every topic it defines. Returns how many
    /// topics were removed.
    pub fn remove_file(&mut self, source_file: &str) -> usize {
        let Some(uids) = self.by_content_file.remove(source_file) else {
            return 0;
        };
        let mut removed = 0;
        for uid in &uids {
            if self.by_uid.remove(uid).is_some() {
                removed += 1;
            }
        }
        removed
    }

    /// Point lookup. The returned topic is an owned copy.
    pub fn lookup(&self, uid: &str) -> Option<Topic> {
        self.by_uid.get(uid).cloned()
    }

    /// All topics (optionally of one detailed type), ordered by UID.
    pub fn list(&self, filter: Option<DetailedType>) -> Vec<Topic> {
        let mut topics: Vec<Topic> = self
            .by_uid
            .values()
            .filter(|t| filter.map_or(true, |f| t.detailed_type == f))
            .cloned()
            .collect();
        topics.sort_by(|a, b| a.uid.cmp(&b.uid));
        topics
    }

    /// Borrowing iterator over all topics, ordered by UID.
    pub fn topics(&self) -> impl Iterator<Item = &Topic> {
        let mut topics: Vec<&Topic> = self.by_uid.values().collect();
        topics.sort_by(|a, b| a.uid.cmp(&b.uid));
        topics.into_iter()
    }

    /// UIDs defined by `source_file`, in ascending order.
    pub fn uids_for_file(&self, source_file: &str) -> Vec<String> {
        self.by_content_file
            .get(source_file)
            .map(|uids| uids.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.by_uid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_uid.is_empty()
    }

    pub fn content_file_count(&self) -> usize {
        self.by_content_file.len()
    }

    /// Check both directions of the UID ⇄ content-file relationship.
    pub fn is_consistent(&self) -> bool {
        let forward = self.by_uid.values().all(|topic| {
            self.by_content_file
                .get(&topic.source_file)
                .is_some_and(|uids| uids.contains(&topic.uid))
        });
        let backward = self.by_content_file.iter().all(|(file, uids)| {
            !uids.is_empty()
                && uids.iter().all(|uid| {
                    self.by_uid
                        .get(uid)
                        .is_some_and(|topic| &topic.source_file == file)
                })
        });
        forward && backward
    }

    fn detach(&mut self, source_file: &str, uid: &str) {
        if let Some(uids) = self.by_content_file.get_mut(source_file) {
            uids.remove(uid);
            if uids.is_empty() {
                self.by_content_file.remove(source_file);
            }
        }
    }
}
