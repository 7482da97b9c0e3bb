//! In-memory index over a snapshot of issue records.
//!
//! Records live in one owned `Vec` in snapshot order; a key map points into
//! it for O(1) lookup. Nothing is ever removed, and a duplicate key replaces
//! the earlier record in its original slot (last write wins, first position
//! kept).

use crate::domain::{IssueKey, IssueRecord};
use crate::error::Result;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

/// Snapshot file encodings understood by [`SnapshotIndex::load`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotFormat {
    /// One JSON array holding every record
    JsonArray,
    /// One record per line
    JsonLines,
}

impl SnapshotFormat {
    /// Picks the format from the file extension (`.jsonl` → lines).
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("jsonl") => Self::JsonLines,
            _ => Self::JsonArray,
        }
    }
}

/// Keyed, read-only view of a snapshot.
#[derive(Debug, Clone, Default)]
pub struct SnapshotIndex {
    /// Records in snapshot order
    records: Vec<IssueRecord>,
    /// Key → position in `records`
    by_key: HashMap<IssueKey, usize>,
}

impl SnapshotIndex {
    /// Builds an index, silently dropping records without a key.
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = IssueRecord>,
    {
        let mut index = Self::default();
        for record in records {
            index.insert(record);
        }
        index
    }

    /// Inserts or replaces a record. Returns `false` if it had no key.
    fn insert(&mut self, record: IssueRecord) -> bool {
        let Some(key) = record.issue_key.clone().filter(|k| !k.is_empty()) else {
            return false;
        };
        if let Some(&slot) = self.by_key.get(&key) {
            self.records[slot] = record;
        } else {
            self.by_key.insert(key, self.records.len());
            self.records.push(record);
        }
        true
    }

    /// Looks up a record by key.
    #[must_use]
    pub fn lookup(&self, key: &str) -> Option<&IssueRecord> {
        self.by_key.get(key).map(|&slot| &self.records[slot])
    }

    /// Whether the snapshot holds a record for `key`.
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.by_key.contains_key(key)
    }

    /// Number of indexed records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in snapshot order.
    pub fn records(&self) -> impl Iterator<Item = &IssueRecord> {
        self.records.iter()
    }

    /// Adds every record of `other` whose key is not already present.
    ///
    /// Existing records always win; new keys are appended in `other`'s order.
    pub fn merge_missing(&mut self, other: SnapshotIndex) {
        for record in other.records {
            let known = record
                .issue_key
                .as_ref()
                .is_some_and(|k| self.by_key.contains_key(k));
            if !known {
                self.insert(record);
            }
        }
    }

    /// Sorted, unique keys starting with `prefix`.
    #[must_use]
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<IssueKey> {
        let mut keys: Vec<IssueKey> = self
            .by_key
            .keys()
            .filter(|k| k.as_str().starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    /// Loads a snapshot file.
    ///
    /// JSON Lines files are read resiliently: undecodable lines are skipped
    /// with a warning. In a JSON array, elements that are not issue records
    /// are skipped the same way.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, or if a JSON array file
    /// is not a JSON array.
    pub async fn load(path: &Path) -> Result<Self> {
        let index = match SnapshotFormat::from_path(path) {
            SnapshotFormat::JsonLines => {
                let (records, _warnings) =
                    uplink_jsonl::read_jsonl_resilient::<IssueRecord, _>(path).await?;
                Self::from_records(records)
            }
            SnapshotFormat::JsonArray => {
                let text = tokio::fs::read_to_string(path).await?;
                let items: Vec<Value> = serde_json::from_str(&text)?;
                let records = items.into_iter().enumerate().filter_map(|(pos, item)| {
                    serde_json::from_value::<IssueRecord>(item)
                        .inspect_err(|e| {
                            tracing::warn!(
                                path = %path.display(),
                                position = pos,
                                "skipping malformed snapshot record: {e}"
                            );
                        })
                        .ok()
                });
                Self::from_records(records)
            }
        };

        tracing::info!(path = %path.display(), records = index.len(), "loaded snapshot");
        Ok(index)
    }

    /// Writes the snapshot atomically in the format implied by `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the atomic replace fails.
    pub async fn save(&self, path: &Path) -> Result<()> {
        match SnapshotFormat::from_path(path) {
            SnapshotFormat::JsonLines => {
                uplink_jsonl::write_jsonl_atomic(path, &self.records).await?;
            }
            SnapshotFormat::JsonArray => {
                uplink_jsonl::write_json_atomic(path, &self.records).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(key: &str, summary: &str) -> IssueRecord {
        IssueRecord {
            issue_key: Some(IssueKey::from(key)),
            summary: Some(summary.to_string()),
            ..IssueRecord::default()
        }
    }

    #[test]
    fn records_without_key_are_dropped() {
        let index = SnapshotIndex::from_records([
            record("A-1", "one"),
            IssueRecord::default(),
            IssueRecord {
                issue_key: Some(IssueKey::from("")),
                ..IssueRecord::default()
            },
        ]);
        assert_eq!(index.len(), 1);
        assert!(index.contains("A-1"));
    }

    #[test]
    fn duplicate_keys_last_write_wins_in_first_slot() {
        let index = SnapshotIndex::from_records([
            record("A-1", "first"),
            record("B-2", "other"),
            record("A-1", "second"),
        ]);
        assert_eq!(index.len(), 2);
        assert_eq!(index.lookup("A-1").unwrap().summary_text(), "second");
        let order: Vec<&str> = index
            .records()
            .map(|r| r.issue_key.as_ref().unwrap().as_str())
            .collect();
        assert_eq!(order, vec!["A-1", "B-2"]);
    }

    #[test]
    fn lookup_of_unknown_key_is_none() {
        let index = SnapshotIndex::from_records([record("A-1", "one")]);
        assert!(index.lookup("ZZ-9").is_none());
    }

    #[test]
    fn merge_keeps_base_records() {
        let mut base = SnapshotIndex::from_records([record("A-1", "base")]);
        let supplement =
            SnapshotIndex::from_records([record("A-1", "supplement"), record("C-3", "new")]);
        base.merge_missing(supplement);

        assert_eq!(base.len(), 2);
        assert_eq!(base.lookup("A-1").unwrap().summary_text(), "base");
        assert_eq!(base.lookup("C-3").unwrap().summary_text(), "new");
    }

    #[test]
    fn keys_with_prefix_are_sorted() {
        let index = SnapshotIndex::from_records([
            record("MGTT-20", ""),
            record("ITPT-1", ""),
            record("MGTT-3", ""),
        ]);
        let keys: Vec<String> = index
            .keys_with_prefix("MGTT-")
            .into_iter()
            .map(|k| k.to_string())
            .collect();
        assert_eq!(keys, vec!["MGTT-20", "MGTT-3"]);
    }

    #[tokio::test]
    async fn load_json_array_skips_malformed_elements() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("source.json");
        tokio::fs::write(
            &path,
            r#"[{"issue_key": "A-1", "summary": "ok"}, 42, {"summary": "no key"}]"#,
        )
        .await
        .unwrap();

        let index = SnapshotIndex::load(&path).await.unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.lookup("A-1").unwrap().summary_text(), "ok");
    }

    #[tokio::test]
    async fn save_then_load_jsonl() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("source.jsonl");
        let index = SnapshotIndex::from_records([record("A-1", "x"), record("B-1", "y")]);
        index.save(&path).await.unwrap();

        let loaded = SnapshotIndex::load(&path).await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded.lookup("B-1").unwrap().summary_text(), "y");
    }
}
