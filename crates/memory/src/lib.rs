//! # Hearth Memory
//!
//! The L3 tier: scoped, persistent vector memory. One `global` index is
//! shared across all chats; each chat owns an isolated project index. A
//! search may union `global` with one chat scope, but records never leak
//! between chats.
//!
//! All writes take an exclusive per-scope lock; reads are shared. A scope
//! whose on-disk index no longer matches the embedder dimension is disabled
//! (and reported) rather than taking the whole agent down.

pub mod embed;
pub mod index;

pub use embed::HashingEmbedder;
pub use index::{cosine_similarity, VectorIndex};

use hearth_core::error::MemoryError;
use hearth_core::memory::{MemoryRecord, MemoryScope, ScoredRecord};
use hearth_core::model::Embedder;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Statistics for one memory scope.
#[derive(Debug, Clone)]
pub struct ScopeStats {
    pub scope: MemoryScope,
    pub records: usize,
    pub storage_path: PathBuf,
    pub disabled: bool,
}

/// Manages the global index plus one index per chat, all sharing a single
/// embedder handle loaded once at startup.
pub struct MemoryManager {
    embedder: Arc<dyn Embedder>,
    root: PathBuf,
    indices: RwLock<HashMap<String, Arc<RwLock<VectorIndex>>>>,
    disabled: RwLock<HashSet<String>>,
}

impl MemoryManager {
    /// Create a manager rooted at the data directory. Indices are opened
    /// lazily, on first touch per scope.
    pub fn new(root: PathBuf, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            embedder,
            root,
            indices: RwLock::new(HashMap::new()),
            disabled: RwLock::new(HashSet::new()),
        }
    }

    /// The on-disk directory of a scope's index.
    pub fn scope_dir(&self, scope: &MemoryScope) -> PathBuf {
        match scope {
            MemoryScope::Global => self.root.join("memory").join("global"),
            MemoryScope::Chat(name) => self.root.join("chats").join(name).join("memory"),
        }
    }

    async fn index_for(
        &self,
        scope: &MemoryScope,
    ) -> Result<Arc<RwLock<VectorIndex>>, MemoryError> {
        let label = scope.label();

        if self.disabled.read().await.contains(&label) {
            return Err(MemoryError::ScopeDisabled(label));
        }

        if let Some(index) = self.indices.read().await.get(&label) {
            return Ok(index.clone());
        }

        let mut indices = self.indices.write().await;
        // Double-check under the write lock
        if let Some(index) = indices.get(&label) {
            return Ok(index.clone());
        }

        match VectorIndex::open(scope.clone(), self.scope_dir(scope), self.embedder.dimension()) {
            Ok(opened) => {
                let index = Arc::new(RwLock::new(opened));
                indices.insert(label, index.clone());
                Ok(index)
            }
            Err(e) => {
                warn!(scope = %scope, error = %e, "disabling memory scope");
                self.disabled.write().await.insert(label);
                Err(e)
            }
        }
    }

    /// Add a text to a scope. Returns the record id.
    pub async fn add(
        &self,
        scope: &MemoryScope,
        text: &str,
        importance: f32,
    ) -> Result<String, MemoryError> {
        let embedding = self.embedder.embed(text)?;
        let index = self.index_for(scope).await?;
        let mut guard = index.write().await;
        let id = guard.add(text, embedding, importance)?;
        debug!(scope = %scope, id = %id, "memory record added");
        Ok(id)
    }

    /// Search the given scopes, merging hits by descending similarity.
    ///
    /// Failed or disabled scopes contribute nothing; they never abort the
    /// query. `k` applies per scope before the merge.
    pub async fn search(
        &self,
        scopes: &[MemoryScope],
        query: &str,
        k: usize,
    ) -> Vec<ScoredRecord> {
        let embedding = match self.embedder.embed(query) {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "query embedding failed, memory search skipped");
                return Vec::new();
            }
        };

        let mut merged: Vec<ScoredRecord> = Vec::new();
        for scope in scopes {
            match self.index_for(scope).await {
                Ok(index) => {
                    let guard = index.read().await;
                    merged.extend(guard.search(&embedding, k));
                }
                Err(e) => {
                    debug!(scope = %scope, error = %e, "scope skipped during search");
                }
            }
        }

        merged.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        merged
    }

    /// Delete a record from a scope by id.
    pub async fn delete(&self, scope: &MemoryScope, id: &str) -> Result<bool, MemoryError> {
        let index = self.index_for(scope).await?;
        let mut guard = index.write().await;
        guard.delete(id)
    }

    /// All records in a scope, in insertion order.
    pub async fn list(&self, scope: &MemoryScope) -> Result<Vec<MemoryRecord>, MemoryError> {
        let index = self.index_for(scope).await?;
        let guard = index.read().await;
        Ok(guard.records().to_vec())
    }

    /// Whether a scope has been disabled by a previous failure.
    pub async fn is_disabled(&self, scope: &MemoryScope) -> bool {
        self.disabled.read().await.contains(&scope.label())
    }

    /// Statistics for every scope that has been touched this session.
    pub async fn stats(&self) -> Vec<ScopeStats> {
        let indices = self.indices.read().await;
        let disabled = self.disabled.read().await;
        let mut stats = Vec::new();
        for index in indices.values() {
            let guard = index.read().await;
            let scope = guard.scope().clone();
            stats.push(ScopeStats {
                disabled: disabled.contains(&scope.label()),
                records: guard.len(),
                storage_path: guard.storage_path().clone(),
                scope,
            });
        }
        stats
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager(dir: &std::path::Path) -> MemoryManager {
        MemoryManager::new(dir.to_path_buf(), Arc::new(HashingEmbedder::default()))
    }

    #[tokio::test]
    async fn add_and_search_global() {
        let dir = tempfile::tempdir().unwrap();
        let mem = manager(dir.path());

        mem.add(&MemoryScope::Global, "Rust has great performance", 0.7)
            .await
            .unwrap();
        mem.add(&MemoryScope::Global, "The garden needs watering", 0.3)
            .await
            .unwrap();

        let results = mem
            .search(&[MemoryScope::Global], "Rust performance", 5)
            .await;
        assert!(!results.is_empty());
        assert_eq!(results[0].record.text, "Rust has great performance");
    }

    #[tokio::test]
    async fn chat_scopes_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let mem = manager(dir.path());

        let chat_a = MemoryScope::Chat("a".into());
        let chat_b = MemoryScope::Chat("b".into());

        mem.add(&chat_a, "secret fact of chat a", 0.9).await.unwrap();
        mem.add(&chat_b, "different fact of chat b", 0.9).await.unwrap();

        // A query scoped to {global, chat:b} must never return chat:a records
        let results = mem
            .search(&[MemoryScope::Global, chat_b.clone()], "secret fact", 10)
            .await;
        assert!(results.iter().all(|r| r.record.scope != chat_a));
    }

    #[tokio::test]
    async fn union_with_global_merges_descending() {
        let dir = tempfile::tempdir().unwrap();
        let mem = manager(dir.path());
        let chat = MemoryScope::Chat("demo".into());

        mem.add(&MemoryScope::Global, "general knowledge about rust", 0.5)
            .await
            .unwrap();
        mem.add(&chat, "rust project notes for demo", 0.5)
            .await
            .unwrap();

        let results = mem
            .search(&[MemoryScope::Global, chat], "rust", 5)
            .await;
        assert_eq!(results.len(), 2);
        assert!(results[0].similarity >= results[1].similarity);
    }

    #[tokio::test]
    async fn persists_across_manager_restart() {
        let dir = tempfile::tempdir().unwrap();
        let id = {
            let mem = manager(dir.path());
            mem.add(&MemoryScope::Global, "durable fact about hello", 0.8)
                .await
                .unwrap()
        };

        let mem2 = manager(dir.path());
        let results = mem2.search(&[MemoryScope::Global], "hello", 3).await;
        assert_eq!(results[0].record.id, id);
    }

    #[tokio::test]
    async fn dimension_mismatch_disables_scope_but_not_others() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mem = MemoryManager::new(
                dir.path().to_path_buf(),
                Arc::new(HashingEmbedder::new(16)),
            );
            mem.add(&MemoryScope::Global, "written at dim 16", 0.5)
                .await
                .unwrap();
        }

        // Restart with a different dimension: global is disabled, chats work
        let mem = MemoryManager::new(
            dir.path().to_path_buf(),
            Arc::new(HashingEmbedder::new(32)),
        );
        let chat = MemoryScope::Chat("fresh".into());
        mem.add(&chat, "chat scope still usable", 0.5).await.unwrap();

        let err = mem.add(&MemoryScope::Global, "should fail", 0.5).await;
        assert!(err.is_err());
        assert!(mem.is_disabled(&MemoryScope::Global).await);

        // Search including the dead scope still returns the healthy one
        let results = mem
            .search(&[MemoryScope::Global, chat], "usable", 5)
            .await;
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn delete_removes_record() {
        let dir = tempfile::tempdir().unwrap();
        let mem = manager(dir.path());
        let id = mem
            .add(&MemoryScope::Global, "short lived", 0.5)
            .await
            .unwrap();
        assert!(mem.delete(&MemoryScope::Global, &id).await.unwrap());
        assert!(!mem.delete(&MemoryScope::Global, &id).await.unwrap());
        let listed = mem.list(&MemoryScope::Global).await.unwrap();
        assert!(listed.is_empty());
    }
}
