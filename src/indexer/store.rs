//! In-memory vector store with a durable warm-restart cache
//!
//! The corpus lives in memory and is scanned linearly on every query. A
//! `VectorPersistence` backend (SQLite in production) mirrors it so a restart
//! does not require re-ingestion. The in-memory copy is the source of truth:
//! persistence failures are logged and never fail the caller.

use super::{SearchResult, VectorDocument};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;

/// Metadata key holding the store signature
pub const SIGNATURE_META_KEY: &str = "storeSignature";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error(
        "Embedding model mismatch: the store holds vectors from {existing}, \
         refusing to add vectors from {incoming}. Clear the store and re-ingest."
    )]
    SignatureMismatch { existing: String, incoming: String },
}

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("Failed to serialize embedding: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Durable storage behind the vector store
pub trait VectorPersistence: Send + Sync {
    /// Insert or replace documents by id
    fn save_documents(&self, docs: &[VectorDocument]) -> Result<(), PersistenceError>;
    fn load_documents(&self) -> Result<Vec<VectorDocument>, PersistenceError>;
    fn clear_documents(&self) -> Result<(), PersistenceError>;
    fn get_meta(&self, key: &str) -> Result<Option<String>, PersistenceError>;
    fn set_meta(&self, key: &str, value: &str) -> Result<(), PersistenceError>;
}

#[derive(Debug, Default)]
struct Corpus {
    documents: Vec<VectorDocument>,
    signature: String,
}

/// Vector store for embedded code chunks
pub struct VectorStore {
    corpus: RwLock<Corpus>,
    persistence: Option<Arc<dyn VectorPersistence>>,
}

impl VectorStore {
    /// Create a memory-only store
    pub fn new() -> Self {
        Self {
            corpus: RwLock::new(Corpus::default()),
            persistence: None,
        }
    }

    /// Create a store backed by durable storage, restoring its previous contents.
    ///
    /// Restoration completes before this returns, so no query can observe a
    /// half-loaded corpus.
    pub fn open(persistence: Arc<dyn VectorPersistence>) -> Self {
        let corpus = match restore(persistence.as_ref()) {
            Ok(corpus) => corpus,
            Err(e) => {
                log::error!("[VectorStore] Failed to restore from database: {}", e);
                Corpus::default()
            }
        };

        Self {
            corpus: RwLock::new(corpus),
            persistence: Some(persistence),
        }
    }

    /// Append documents to the corpus.
    ///
    /// An empty store adopts `signature`. A non-empty store with a different
    /// signature rejects the batch untouched; vectors from different models are
    /// never mixed.
    pub fn add_documents(
        &self,
        docs: Vec<VectorDocument>,
        signature: &str,
    ) -> Result<usize, StoreError> {
        let count = docs.len();
        let adopted_signature = {
            let mut corpus = self.write();
            let adopt = corpus.documents.is_empty();
            if !adopt && corpus.signature != signature {
                return Err(StoreError::SignatureMismatch {
                    existing: corpus.signature.clone(),
                    incoming: signature.to_string(),
                });
            }
            if adopt {
                corpus.signature = signature.to_string();
            }
            corpus.documents.extend(docs.iter().cloned());
            adopt
        };

        if let Some(persistence) = &self.persistence {
            if adopted_signature {
                if let Err(e) = persistence.set_meta(SIGNATURE_META_KEY, signature) {
                    log::error!("[VectorStore] Failed to save signature: {}", e);
                }
            }
            if let Err(e) = persistence.save_documents(&docs) {
                log::error!("[VectorStore] Failed to save {} documents: {}", count, e);
            }
        }

        log::info!("[VectorStore] Added {} vectors ({})", count, signature);
        Ok(count)
    }

    /// Swap the whole corpus for `docs` under `signature`.
    ///
    /// Readers see either the old corpus or the new one, never an empty store
    /// in between.
    pub fn replace_all(&self, docs: Vec<VectorDocument>, signature: &str) -> usize {
        let count = docs.len();
        {
            let mut corpus = self.write();
            corpus.documents = docs.clone();
            corpus.signature = signature.to_string();
        }

        if let Some(persistence) = &self.persistence {
            if let Err(e) = persistence.clear_documents() {
                log::error!("[VectorStore] Failed to clear stored vectors: {}", e);
            }
            if let Err(e) = persistence.set_meta(SIGNATURE_META_KEY, signature) {
                log::error!("[VectorStore] Failed to save signature: {}", e);
            }
            if let Err(e) = persistence.save_documents(&docs) {
                log::error!("[VectorStore] Failed to save {} documents: {}", count, e);
            }
        }

        log::info!("[VectorStore] Replaced corpus with {} vectors ({})", count, signature);
        count
    }

    /// Remove every document and reset the signature
    pub fn clear(&self) {
        {
            let mut corpus = self.write();
            corpus.documents.clear();
            corpus.signature.clear();
        }

        if let Some(persistence) = &self.persistence {
            if let Err(e) = persistence.clear_documents() {
                log::error!("[VectorStore] Failed to clear stored vectors: {}", e);
            }
            if let Err(e) = persistence.set_meta(SIGNATURE_META_KEY, "") {
                log::error!("[VectorStore] Failed to reset signature: {}", e);
            }
        }
    }

    /// Brute-force cosine similarity search.
    ///
    /// Results are sorted by descending score, never below `min_score`, and at
    /// most `top_k` long.
    pub fn similarity_search(
        &self,
        query: &[f32],
        top_k: usize,
        min_score: f32,
    ) -> Vec<SearchResult> {
        let corpus = self.read();

        let mut scored: Vec<(f32, &VectorDocument)> = corpus
            .documents
            .iter()
            .map(|doc| (cosine_similarity(query, &doc.embedding), doc))
            .filter(|(score, _)| *score >= min_score)
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(Ordering::Equal));

        scored
            .into_iter()
            .take(top_k)
            .map(|(score, doc)| SearchResult {
                doc: doc.clone(),
                score,
            })
            .collect()
    }

    /// Signature of the vectors currently held, empty when the store is empty
    pub fn store_signature(&self) -> String {
        self.read().signature.clone()
    }

    pub fn len(&self) -> usize {
        self.read().documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().documents.is_empty()
    }

    /// Sorted distinct file paths, recomputed on every call
    pub fn file_paths(&self) -> Vec<String> {
        let corpus = self.read();
        corpus
            .documents
            .iter()
            .map(|d| d.file_path.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// All chunks stored for one file, in insertion order
    pub fn documents_for(&self, file_path: &str) -> Vec<VectorDocument> {
        self.read()
            .documents
            .iter()
            .filter(|d| d.file_path == file_path)
            .cloned()
            .collect()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Corpus> {
        self.corpus.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Corpus> {
        self.corpus.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for VectorStore {
    fn default() -> Self {
        Self::new()
    }
}

fn restore(persistence: &dyn VectorPersistence) -> Result<Corpus, PersistenceError> {
    let documents = persistence.load_documents()?;
    if documents.is_empty() {
        return Ok(Corpus::default());
    }

    let signature = persistence
        .get_meta(SIGNATURE_META_KEY)?
        .unwrap_or_default();
    log::info!(
        "[VectorStore] Restored {} vectors from database ({})",
        documents.len(),
        if signature.is_empty() { "unsigned" } else { &signature }
    );

    Ok(Corpus {
        documents,
        signature,
    })
}

/// Cosine similarity of two vectors.
///
/// Zero when the lengths differ or either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a * norm_b)).clamp(-1.0, 1.0)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::indexer::ChunkMetadata;
    use std::collections::HashMap;
    use std::sync::Mutex;

    pub(crate) fn doc(id: &str, path: &str, embedding: Vec<f32>) -> VectorDocument {
        VectorDocument {
            id: id.to_string(),
            file_path: path.to_string(),
            content: format!("content of {}", id),
            embedding,
            metadata: ChunkMetadata {
                start_offset: 0,
                end_offset: 10,
            },
        }
    }

    /// In-memory persistence double
    #[derive(Default)]
    pub(crate) struct MemoryPersistence {
        pub docs: Mutex<Vec<VectorDocument>>,
        pub meta: Mutex<HashMap<String, String>>,
    }

    impl VectorPersistence for MemoryPersistence {
        fn save_documents(&self, docs: &[VectorDocument]) -> Result<(), PersistenceError> {
            self.docs.lock().unwrap().extend(docs.iter().cloned());
            Ok(())
        }
        fn load_documents(&self) -> Result<Vec<VectorDocument>, PersistenceError> {
            Ok(self.docs.lock().unwrap().clone())
        }
        fn clear_documents(&self) -> Result<(), PersistenceError> {
            self.docs.lock().unwrap().clear();
            Ok(())
        }
        fn get_meta(&self, key: &str) -> Result<Option<String>, PersistenceError> {
            Ok(self.meta.lock().unwrap().get(key).cloned())
        }
        fn set_meta(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
            self.meta
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }
    }

    /// Persistence that fails every call
    pub(crate) struct BrokenPersistence;

    impl VectorPersistence for BrokenPersistence {
        fn save_documents(&self, _: &[VectorDocument]) -> Result<(), PersistenceError> {
            Err(PersistenceError::Unavailable("disk full".to_string()))
        }
        fn load_documents(&self) -> Result<Vec<VectorDocument>, PersistenceError> {
            Err(PersistenceError::Unavailable("corrupt".to_string()))
        }
        fn clear_documents(&self) -> Result<(), PersistenceError> {
            Err(PersistenceError::Unavailable("locked".to_string()))
        }
        fn get_meta(&self, _: &str) -> Result<Option<String>, PersistenceError> {
            Err(PersistenceError::Unavailable("locked".to_string()))
        }
        fn set_meta(&self, _: &str, _: &str) -> Result<(), PersistenceError> {
            Err(PersistenceError::Unavailable("locked".to_string()))
        }
    }

    #[test]
    fn test_cosine_bounds() {
        let pairs: [(&[f32], &[f32]); 4] = [
            (&[1.0, 2.0, 3.0], &[-3.0, 0.5, 7.0]),
            (&[1.0, 0.0], &[-1.0, 0.0]),
            (&[0.3, 0.3, 0.3], &[0.1, 0.9, -0.4]),
            (&[1e-3, 5.0], &[4.0, -2.0]),
        ];
        for (a, b) in pairs {
            let s = cosine_similarity(a, b);
            assert!((-1.0..=1.0).contains(&s), "{}", s);
        }
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_self_similarity_is_one() {
        let v = [0.2, -0.7, 1.3, 4.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_degenerate_inputs() {
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[1.0, 2.0, 3.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn test_search_ordering_and_limits() {
        let store = VectorStore::new();
        store
            .add_documents(
                vec![
                    doc("a", "a.rs", vec![1.0, 0.0]),
                    doc("b", "b.rs", vec![0.7, 0.7]),
                    doc("c", "c.rs", vec![0.0, 1.0]),
                    doc("d", "d.rs", vec![-1.0, 0.0]),
                    doc("e", "e.rs", vec![0.9, 0.1]),
                ],
                "openai:test",
            )
            .unwrap();

        let results = store.similarity_search(&[1.0, 0.0], 3, 0.1);
        assert!(results.len() <= 3);
        assert!(results.iter().all(|r| r.score >= 0.1));
        assert!(results.windows(2).all(|w| w[0].score >= w[1].score));
        assert_eq!(results[0].doc.id, "a");
        assert_eq!(results[1].doc.id, "e");

        let all = store.similarity_search(&[1.0, 0.0], 10, 0.0);
        assert_eq!(all.len(), 4);
        assert!(all.iter().all(|r| r.doc.id != "d"));
    }

    #[test]
    fn test_search_survives_dimension_mismatch() {
        let store = VectorStore::new();
        store
            .add_documents(vec![doc("a", "a.rs", vec![1.0, 0.0, 0.0])], "sig")
            .unwrap();
        let results = store.similarity_search(&[1.0, 0.0], 5, 0.0);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].score, 0.0);
    }

    #[test]
    fn test_signature_adopted_then_enforced() {
        let store = VectorStore::new();
        store
            .add_documents(vec![doc("a", "a.rs", vec![1.0])], "sigA")
            .unwrap();
        assert_eq!(store.store_signature(), "sigA");

        let err = store
            .add_documents(vec![doc("b", "b.rs", vec![1.0])], "sigB")
            .unwrap_err();
        assert!(matches!(err, StoreError::SignatureMismatch { .. }));
        assert_eq!(store.len(), 1);
        assert_eq!(store.store_signature(), "sigA");

        store
            .add_documents(vec![doc("c", "c.rs", vec![1.0])], "sigA")
            .unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_clear_resets_signature() {
        let store = VectorStore::new();
        store
            .add_documents(vec![doc("a", "a.rs", vec![1.0])], "sigA")
            .unwrap();
        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.store_signature(), "");

        store
            .add_documents(vec![doc("b", "b.rs", vec![1.0])], "sigB")
            .unwrap();
        assert_eq!(store.store_signature(), "sigB");
    }

    #[test]
    fn test_replace_all_swaps_corpus_and_signature() {
        let persistence = Arc::new(MemoryPersistence::default());
        let store = VectorStore::open(persistence.clone());
        store
            .add_documents(vec![doc("old", "old.rs", vec![1.0, 0.0])], "openai:old")
            .unwrap();

        let replaced = store.replace_all(
            vec![doc("a", "a.rs", vec![0.0, 1.0]), doc("b", "b.rs", vec![1.0, 1.0])],
            "gemini:text-embedding-004",
        );
        assert_eq!(replaced, 2);
        assert_eq!(store.file_paths(), vec!["a.rs", "b.rs"]);
        assert_eq!(store.store_signature(), "gemini:text-embedding-004");

        let reopened = VectorStore::open(persistence);
        assert_eq!(reopened.file_paths(), vec!["a.rs", "b.rs"]);
        assert_eq!(reopened.store_signature(), "gemini:text-embedding-004");
    }

    #[test]
    fn test_replace_all_never_exposes_empty_store() {
        let store = VectorStore::new();
        store
            .add_documents(vec![doc("a", "a.rs", vec![1.0])], "sig")
            .unwrap();

        std::thread::scope(|s| {
            let reader = s.spawn(|| {
                for _ in 0..2000 {
                    assert!(!store.is_empty());
                    assert!(!store.store_signature().is_empty());
                }
            });
            for i in 0..200 {
                let docs = (0..=i % 3)
                    .map(|j| doc(&format!("d{}", j), "d.rs", vec![1.0]))
                    .collect();
                store.replace_all(docs, "sig");
            }
            reader.join().unwrap();
        });
    }

    #[test]
    fn test_restores_from_persistence() {
        let persistence = Arc::new(MemoryPersistence::default());
        {
            let store = VectorStore::open(persistence.clone());
            store
                .add_documents(
                    vec![doc("a", "a.rs", vec![1.0, 0.0]), doc("b", "b.rs", vec![0.0, 1.0])],
                    "gemini:text-embedding-004",
                )
                .unwrap();
        }

        let reopened = VectorStore::open(persistence);
        assert_eq!(reopened.len(), 2);
        assert_eq!(reopened.store_signature(), "gemini:text-embedding-004");
        assert_eq!(reopened.similarity_search(&[0.0, 1.0], 1, 0.5)[0].doc.id, "b");
    }

    #[test]
    fn test_clear_clears_persistence() {
        let persistence = Arc::new(MemoryPersistence::default());
        let store = VectorStore::open(persistence.clone());
        store
            .add_documents(vec![doc("a", "a.rs", vec![1.0])], "sigA")
            .unwrap();
        store.clear();

        let reopened = VectorStore::open(persistence);
        assert!(reopened.is_empty());
        assert_eq!(reopened.store_signature(), "");
    }

    #[test]
    fn test_persistence_failure_does_not_affect_memory() {
        let store = VectorStore::open(Arc::new(BrokenPersistence));
        assert!(store.is_empty());

        let added = store
            .add_documents(vec![doc("a", "a.rs", vec![1.0, 0.0])], "sigA")
            .unwrap();
        assert_eq!(added, 1);
        assert_eq!(store.similarity_search(&[1.0, 0.0], 5, 0.0).len(), 1);

        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn test_file_paths_are_distinct_and_sorted() {
        let store = VectorStore::new();
        store
            .add_documents(
                vec![
                    doc("z-0", "z.rs", vec![1.0]),
                    doc("a-0", "a.rs", vec![1.0]),
                    doc("a-1", "a.rs", vec![1.0]),
                ],
                "sig",
            )
            .unwrap();
        assert_eq!(store.file_paths(), vec!["a.rs", "z.rs"]);
        assert_eq!(store.documents_for("a.rs").len(), 2);
    }
}
