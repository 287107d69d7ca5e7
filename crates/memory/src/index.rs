//! Per-scope flat vector index.
//!
//! Records are held in memory and flushed to `records.json` on every
//! mutation (temp-then-rename). This gives fast reads with durable writes;
//! the read path rebuilds the index from disk after a restart.
//!
//! Similarity is cosine over the stored embeddings. The index refuses to
//! load records whose embedding dimension differs from the embedder's —
//! that is a [`MemoryError::DimensionMismatch`], and the scope must be
//! rebuilt.

use chrono::Utc;
use hearth_core::error::MemoryError;
use hearth_core::memory::{MemoryRecord, MemoryScope, ScoredRecord};
use hearth_core::persist::write_atomic;
use std::path::PathBuf;
use tracing::{debug, warn};
use uuid::Uuid;

/// Compute cosine similarity between two vectors.
///
/// Returns a value in [-1, 1]; 0.0 for empty, zero, or mismatched-length
/// vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;

    for (x, y) in a.iter().zip(b.iter()) {
        let x = *x as f64;
        let y = *y as f64;
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < 1e-10 {
        return 0.0;
    }

    (dot / denom) as f32
}

/// A flat, single-scope vector index backed by a JSON file.
#[derive(Debug)]
pub struct VectorIndex {
    scope: MemoryScope,
    dimension: usize,
    path: PathBuf,
    records: Vec<MemoryRecord>,
}

impl VectorIndex {
    /// Open (or create) the index for `scope` at `dir/records.json`.
    ///
    /// Existing records are loaded and dimension-checked against
    /// `dimension`.
    pub fn open(scope: MemoryScope, dir: PathBuf, dimension: usize) -> Result<Self, MemoryError> {
        let path = dir.join("records.json");
        let records = Self::load_records(&path, dimension)?;
        debug!(scope = %scope, count = records.len(), "vector index opened");
        Ok(Self {
            scope,
            dimension,
            path,
            records,
        })
    }

    fn load_records(path: &PathBuf, dimension: usize) -> Result<Vec<MemoryRecord>, MemoryError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Ok(Vec::new()), // Not on disk yet — start empty
        };

        let records: Vec<MemoryRecord> = serde_json::from_str(&content)
            .map_err(|e| MemoryError::Storage(format!("corrupt index at {}: {e}", path.display())))?;

        if let Some(bad) = records.iter().find(|r| r.embedding.len() != dimension) {
            return Err(MemoryError::DimensionMismatch {
                expected: dimension,
                found: bad.embedding.len(),
            });
        }

        Ok(records)
    }

    /// Flush all records to disk atomically.
    pub fn save(&self) -> Result<(), MemoryError> {
        let json = serde_json::to_vec_pretty(&self.records)
            .map_err(|e| MemoryError::Storage(format!("serialize index: {e}")))?;
        write_atomic(&self.path, &json)
            .map_err(|e| MemoryError::Storage(format!("write {}: {e}", self.path.display())))
    }

    /// Add a record, returning its id. Adding text that is already stored
    /// in this scope is a no-op that returns the existing id.
    pub fn add(
        &mut self,
        text: &str,
        embedding: Vec<f32>,
        importance: f32,
    ) -> Result<String, MemoryError> {
        if embedding.len() != self.dimension {
            return Err(MemoryError::DimensionMismatch {
                expected: self.dimension,
                found: embedding.len(),
            });
        }

        if let Some(existing) = self.records.iter().find(|r| r.text == text) {
            debug!(scope = %self.scope, "duplicate memory text, skipping insert");
            return Ok(existing.id.clone());
        }

        let record = MemoryRecord {
            id: Uuid::new_v4().to_string(),
            text: text.to_string(),
            embedding,
            importance: importance.clamp(0.0, 1.0),
            scope: self.scope.clone(),
            created_at: Utc::now(),
        };
        let id = record.id.clone();
        self.records.push(record);
        self.save()?;
        Ok(id)
    }

    /// Top-`k` records by cosine similarity to `query_embedding`,
    /// descending.
    pub fn search(&self, query_embedding: &[f32], k: usize) -> Vec<ScoredRecord> {
        let mut scored: Vec<ScoredRecord> = self
            .records
            .iter()
            .map(|r| ScoredRecord {
                similarity: cosine_similarity(&r.embedding, query_embedding),
                record: r.clone(),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        scored.truncate(k);
        scored
    }

    /// Delete a record by id. Returns whether anything was removed.
    pub fn delete(&mut self, id: &str) -> Result<bool, MemoryError> {
        let before = self.records.len();
        self.records.retain(|r| r.id != id);
        let deleted = self.records.len() < before;
        if deleted {
            self.save()?;
        } else {
            warn!(scope = %self.scope, id, "delete of unknown memory id");
        }
        Ok(deleted)
    }

    /// Update a record's importance (the only mutable field).
    pub fn set_importance(&mut self, id: &str, importance: f32) -> Result<bool, MemoryError> {
        let Some(record) = self.records.iter_mut().find(|r| r.id == id) else {
            return Ok(false);
        };
        record.importance = importance.clamp(0.0, 1.0);
        self.save()?;
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[MemoryRecord] {
        &self.records
    }

    pub fn scope(&self) -> &MemoryScope {
        &self.scope
    }

    pub fn storage_path(&self) -> &PathBuf {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_index(dir: &std::path::Path) -> VectorIndex {
        VectorIndex::open(MemoryScope::Global, dir.to_path_buf(), 3).unwrap()
    }

    #[test]
    fn cosine_identical_vectors() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_orthogonal_vectors() {
        let a = vec![1.0, 0.0, 0.0];
        let b = vec![0.0, 1.0, 0.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn cosine_mismatched_lengths() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0, 2.0, 3.0]), 0.0);
    }

    #[test]
    fn cosine_zero_vector() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn add_and_search_ranks_by_similarity() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = open_index(dir.path());

        index.add("orthogonal", vec![0.0, 1.0, 0.0], 0.5).unwrap();
        index.add("identical", vec![1.0, 0.0, 0.0], 0.5).unwrap();
        index.add("partial", vec![0.5, 0.5, 0.0], 0.5).unwrap();

        let results = index.search(&[1.0, 0.0, 0.0], 10);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].record.text, "identical");
        assert_eq!(results[1].record.text, "partial");
        assert_eq!(results[2].record.text, "orthogonal");
    }

    #[test]
    fn duplicate_text_not_inserted_twice() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = open_index(dir.path());

        let id1 = index.add("same fact", vec![1.0, 0.0, 0.0], 0.5).unwrap();
        let id2 = index.add("same fact", vec![0.0, 1.0, 0.0], 0.9).unwrap();
        assert_eq!(id1, id2);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn wrong_dimension_rejected_on_add() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = open_index(dir.path());
        let err = index.add("bad", vec![1.0, 2.0], 0.5).unwrap_err();
        assert!(matches!(err, MemoryError::DimensionMismatch { .. }));
    }

    #[test]
    fn persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let id = {
            let mut index = open_index(dir.path());
            index.add("persisted fact", vec![1.0, 0.0, 0.0], 0.7).unwrap()
        };

        let reloaded = open_index(dir.path());
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.records()[0].id, id);
        assert_eq!(reloaded.records()[0].text, "persisted fact");

        let results = reloaded.search(&[1.0, 0.0, 0.0], 1);
        assert_eq!(results[0].record.id, id);
    }

    #[test]
    fn dimension_mismatch_on_reload() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut index = open_index(dir.path());
            index.add("a fact", vec![1.0, 0.0, 0.0], 0.5).unwrap();
        }

        // Reopen with a different embedder dimension
        let err = VectorIndex::open(MemoryScope::Global, dir.path().to_path_buf(), 5).unwrap_err();
        assert!(matches!(
            err,
            MemoryError::DimensionMismatch {
                expected: 5,
                found: 3
            }
        ));
    }

    #[test]
    fn delete_persists() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = open_index(dir.path());
        let id = index.add("to delete", vec![1.0, 0.0, 0.0], 0.5).unwrap();
        assert!(index.delete(&id).unwrap());
        assert!(!index.delete(&id).unwrap());

        let reloaded = open_index(dir.path());
        assert!(reloaded.is_empty());
    }

    #[test]
    fn importance_is_clamped() {
        let dir = tempfile::tempdir().unwrap();
        let mut index = open_index(dir.path());
        let id = index.add("fact", vec![1.0, 0.0, 0.0], 2.5).unwrap();
        assert_eq!(index.records()[0].importance, 1.0);
        index.set_importance(&id, -3.0).unwrap();
        assert_eq!(index.records()[0].importance, 0.0);
    }
}
