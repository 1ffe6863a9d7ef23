//! Retrieval-augmented prompt assembly
//!
//! Turns a user query into a ranked, deduplicated context block drawn from the
//! vector store, and wraps it in the system prompt sent to the chat model.

use crate::config::SharedConfig;
use crate::indexer::embedder::{Embedder, EmbedderError};
use crate::indexer::store::VectorStore;
use crate::indexer::SearchResult;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

const WEAK_MATCH_MESSAGE: &str = "No high-quality code context found.";
const NO_CONTEXT_MESSAGE: &str = "No specific code context found (Low similarity scores).";

/// Query words that suggest the user is asking about layout, not code
const STRUCTURE_HINTS: &[&str] = &["project", "structure"];

#[derive(Error, Debug)]
pub enum RagError {
    #[error(
        "The index was built with {indexed} but {configured} is configured. \
         Re-ingest the codebase to search with the current model."
    )]
    ReindexRequired { indexed: String, configured: String },
    #[error(transparent)]
    Embedding(#[from] EmbedderError),
}

/// How much the retrieved context can be trusted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextKind {
    /// At least one chunk passed the relevance threshold
    Relevant,
    /// Chunks were found but all scored below the threshold
    WeakMatch,
    /// Nothing was found at all
    NoContext,
}

/// A cited file with its best chunk score
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceRef {
    pub path: String,
    pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RagContext {
    pub context_block: String,
    /// One entry per file, best score first
    pub sources: Vec<SourceRef>,
    pub kind: ContextKind,
}

/// Everything needed to send one chat turn
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreparedTurn {
    pub system_prompt: String,
    pub sources: Vec<SourceRef>,
    /// Retrieval problem to show inline in the conversation
    pub warning: Option<String>,
}

pub struct RagService {
    store: Arc<VectorStore>,
    embedder: Arc<dyn Embedder>,
    config: SharedConfig,
}

impl RagService {
    pub fn new(store: Arc<VectorStore>, embedder: Arc<dyn Embedder>, config: SharedConfig) -> Self {
        Self {
            store,
            embedder,
            config,
        }
    }

    /// Whether anything has been ingested
    pub fn has_documents(&self) -> bool {
        !self.store.is_empty()
    }

    /// Fetch the context for `query`.
    ///
    /// Over-fetches with no score floor, then applies the configured
    /// relevance threshold so it can be tuned without re-querying.
    pub async fn retrieve_context(&self, query: &str) -> Result<RagContext, RagError> {
        let config = self.config.snapshot();
        let configured = config.embedding.signature();

        let indexed = self.store.store_signature();
        if !self.store.is_empty() && indexed != configured {
            log::warn!(
                "[RagService] Index signature {} does not match {}",
                indexed,
                configured
            );
            return Err(RagError::ReindexRequired {
                indexed,
                configured,
            });
        }

        let query_vector = self.embedder.embed(query, &config.embedding).await?;
        let raw = self
            .store
            .similarity_search(&query_vector, config.rag.search_top_k, 0.0);
        let threshold = config.rag.min_relevance_score;
        let relevant: Vec<&SearchResult> = raw.iter().filter(|r| r.score >= threshold).collect();

        log::debug!(
            "[RagService] {} raw results, {} above {:.2}",
            raw.len(),
            relevant.len(),
            threshold
        );

        if relevant.is_empty() {
            let (kind, message) = if raw.is_empty() {
                (ContextKind::NoContext, NO_CONTEXT_MESSAGE)
            } else {
                (ContextKind::WeakMatch, WEAK_MATCH_MESSAGE)
            };

            let mut context_block = message.to_string();
            if is_structural_query(query) {
                let listing: Vec<String> = self
                    .store
                    .file_paths()
                    .into_iter()
                    .take(config.rag.structure_listing_limit)
                    .collect();
                if !listing.is_empty() {
                    context_block.push_str("\n\nExisting File Structure:\n");
                    context_block.push_str(&listing.join("\n"));
                }
            }

            return Ok(RagContext {
                context_block,
                sources: Vec::new(),
                kind,
            });
        }

        Ok(RagContext {
            context_block: format_context_block(&relevant),
            sources: dedup_sources(&relevant),
            kind: ContextKind::Relevant,
        })
    }

    /// Build the system prompt for one turn, with or without retrieval.
    ///
    /// Retrieval failures do not fail the turn; they come back as a warning
    /// and the prompt says no context was available.
    pub async fn prepare_turn(&self, query: &str, use_rag: bool) -> PreparedTurn {
        if !use_rag || !self.has_documents() {
            return PreparedTurn {
                system_prompt: build_system_prompt(query, None),
                sources: Vec::new(),
                warning: None,
            };
        }

        match self.retrieve_context(query).await {
            Ok(context) => PreparedTurn {
                system_prompt: build_system_prompt(query, Some(&context)),
                sources: context.sources,
                warning: None,
            },
            Err(e) => {
                log::error!("[RagService] Retrieval failed: {}", e);
                PreparedTurn {
                    system_prompt: build_system_prompt(query, None),
                    sources: Vec::new(),
                    warning: Some(format!("Context retrieval failed: {}", e)),
                }
            }
        }
    }
}

/// System instruction for the chat model
pub fn build_system_prompt(query: &str, context: Option<&RagContext>) -> String {
    let mut prompt = String::from("You are an advanced software engineer.\n");

    match context.filter(|c| !c.context_block.is_empty()) {
        Some(context) => {
            prompt.push_str(&format!(
                "User Query: {}\n\n\
                 Here is the retrieved code context from the vector database:\n\
                 {}\n\n\
                 Instructions:\n\
                 - The context consists of smaller code snippets.\n\
                 - Use the context to answer the query accurately.\n\
                 - If the context contains the answer, cite the filename.\n\
                 - If the context is irrelevant, answer based on general knowledge but mention that context was missing.\n",
                query, context.context_block
            ));
        }
        None => {
            prompt.push_str(&format!(
                "User Query: {}\n\
                 Note: No code context provided (files not loaded or RAG disabled). \
                 Answer based on general knowledge.\n",
                query
            ));
        }
    }

    prompt
}

fn is_structural_query(query: &str) -> bool {
    let lower = query.to_lowercase();
    STRUCTURE_HINTS.iter().any(|hint| lower.contains(hint))
}

fn format_context_block(results: &[&SearchResult]) -> String {
    results
        .iter()
        .map(|r| {
            format!(
                "FILENAME: {} (Match: {:.0}%)\nCONTENT:\n{}\n---",
                r.doc.file_path,
                r.score * 100.0,
                r.doc.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Highest score per file, best first
fn dedup_sources(results: &[&SearchResult]) -> Vec<SourceRef> {
    let mut best: HashMap<&str, f32> = HashMap::new();
    for r in results {
        let score = best.entry(r.doc.file_path.as_str()).or_insert(r.score);
        if r.score > *score {
            *score = r.score;
        }
    }

    let mut sources: Vec<SourceRef> = best
        .into_iter()
        .map(|(path, score)| SourceRef {
            path: path.to_string(),
            score,
        })
        .collect();
    sources.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.path.cmp(&b.path))
    });
    sources
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EmbeddingConfig, LlmConfig};
    use crate::indexer::store::tests::doc;
    use async_trait::async_trait;

    /// Returns the same query vector for every input
    struct FixedEmbedder(Vec<f32>);

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed(&self, _: &str, _: &EmbeddingConfig) -> Result<Vec<f32>, EmbedderError> {
            Ok(self.0.clone())
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl Embedder for FailingEmbedder {
        async fn embed(&self, _: &str, _: &EmbeddingConfig) -> Result<Vec<f32>, EmbedderError> {
            Err(EmbedderError::Api {
                status: 401,
                message: "Invalid API key".to_string(),
            })
        }
    }

    fn config_with(min_score: f32, top_k: usize) -> SharedConfig {
        let mut config = LlmConfig::default();
        config.rag.min_relevance_score = min_score;
        config.rag.search_top_k = top_k;
        SharedConfig::new(config)
    }

    fn service(docs: Vec<crate::indexer::VectorDocument>, config: SharedConfig) -> RagService {
        let store = Arc::new(VectorStore::new());
        let signature = config.snapshot().embedding.signature();
        if !docs.is_empty() {
            store.add_documents(docs, &signature).unwrap();
        }
        RagService::new(store, Arc::new(FixedEmbedder(vec![1.0, 0.0])), config)
    }

    #[tokio::test]
    async fn test_basic_retrieval_dedups_sources() {
        // Scores: a.ts-0 = 0.99, b.ts-0 = 0.95, a.ts-1 = 0.91
        let docs = vec![
            doc("a.ts-0", "a.ts", vec![0.99, (1.0f32 - 0.99 * 0.99).sqrt()]),
            doc("b.ts-0", "b.ts", vec![0.95, (1.0f32 - 0.95 * 0.95).sqrt()]),
            doc("a.ts-1", "a.ts", vec![0.91, (1.0f32 - 0.91 * 0.91).sqrt()]),
        ];
        let rag = service(docs, config_with(0.9, 2));

        let context = rag.retrieve_context("how does a work").await.unwrap();
        assert_eq!(context.kind, ContextKind::Relevant);
        assert_eq!(context.sources.len(), 2);
        assert_eq!(context.sources[0].path, "a.ts");
        assert!((context.sources[0].score - 0.99).abs() < 1e-4);
        assert_eq!(context.sources[1].path, "b.ts");

        assert!(context
            .context_block
            .starts_with("FILENAME: a.ts (Match: 99%)\nCONTENT:\ncontent of a.ts-0\n---"));
        assert!(context.context_block.contains("FILENAME: b.ts (Match: 95%)"));
        assert!(!context.context_block.contains("a.ts-1"));
    }

    #[tokio::test]
    async fn test_two_chunks_of_one_file_collapse_to_one_source() {
        let docs = vec![
            doc("a.ts-0", "a.ts", vec![1.0, 0.0]),
            doc("b.ts-0", "b.ts", vec![0.0, 1.0]),
            doc("a.ts-1", "a.ts", vec![0.95, 0.31]),
        ];
        let rag = service(docs, config_with(0.9, 2));

        let context = rag.retrieve_context("query").await.unwrap();
        assert_eq!(context.sources.len(), 1);
        assert_eq!(context.sources[0].path, "a.ts");
        assert!((context.sources[0].score - 1.0).abs() < 1e-6);

        let first = context.context_block.find("content of a.ts-0").unwrap();
        let second = context.context_block.find("content of a.ts-1").unwrap();
        assert!(first < second);
        assert!(!context.context_block.contains("b.ts"));
    }

    #[tokio::test]
    async fn test_weak_matches_are_flagged() {
        let docs: Vec<_> = (0..5)
            .map(|i| {
                let embedding = vec![0.5, 0.5 + i as f32 * 0.1];
                doc(&format!("f{}-0", i), &format!("f{}.ts", i), embedding)
            })
            .collect();
        let rag = service(docs, config_with(0.9, 40));

        let context = rag.retrieve_context("what is this").await.unwrap();
        assert_eq!(context.kind, ContextKind::WeakMatch);
        assert_eq!(context.context_block, WEAK_MATCH_MESSAGE);
        assert!(context.sources.is_empty());
    }

    #[tokio::test]
    async fn test_structural_question_lists_files() {
        let docs = vec![
            doc("z.ts-0", "src/z.ts", vec![0.0, 1.0]),
            doc("a.ts-0", "src/a.ts", vec![0.1, 1.0]),
        ];
        let rag = service(docs, config_with(0.9, 40));

        let context = rag
            .retrieve_context("Explain the PROJECT layout")
            .await
            .unwrap();
        assert_eq!(context.kind, ContextKind::WeakMatch);
        assert!(context.context_block.starts_with(WEAK_MATCH_MESSAGE));
        assert!(context
            .context_block
            .ends_with("Existing File Structure:\nsrc/a.ts\nsrc/z.ts"));
    }

    #[tokio::test]
    async fn test_listing_is_bounded() {
        let docs: Vec<_> = (0..10)
            .map(|i| doc(&format!("f{}-0", i), &format!("f{}.rs", i), vec![0.0, 1.0]))
            .collect();
        let config = config_with(0.9, 40);
        config.update(|c| c.rag.structure_listing_limit = 3);
        let rag = service(docs, config);

        let context = rag.retrieve_context("project structure?").await.unwrap();
        let listing = context
            .context_block
            .split("Existing File Structure:\n")
            .nth(1)
            .unwrap();
        assert_eq!(listing.lines().count(), 3);
    }

    #[tokio::test]
    async fn test_empty_store_has_no_context() {
        let rag = service(Vec::new(), config_with(0.55, 40));
        let context = rag.retrieve_context("project structure").await.unwrap();
        assert_eq!(context.kind, ContextKind::NoContext);
        assert_eq!(context.context_block, NO_CONTEXT_MESSAGE);
    }

    #[tokio::test]
    async fn test_signature_mismatch_requires_reindex() {
        let config = config_with(0.5, 40);
        let rag = service(vec![doc("a-0", "a.rs", vec![1.0, 0.0])], config.clone());
        config.update(|c| {
            c.embedding = EmbeddingConfig::Gemini {
                api_key: "k".to_string(),
                model: "text-embedding-004".to_string(),
            }
        });

        let err = rag.retrieve_context("anything").await.unwrap_err();
        match err {
            RagError::ReindexRequired {
                indexed,
                configured,
            } => {
                assert_eq!(indexed, "openai:text-embedding-mxbai-embed-large-v1");
                assert_eq!(configured, "gemini:text-embedding-004");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[tokio::test]
    async fn test_prepare_turn_turns_failures_into_warnings() {
        let store = Arc::new(VectorStore::new());
        let config = SharedConfig::default();
        store
            .add_documents(
                vec![doc("a-0", "a.rs", vec![1.0, 0.0])],
                &config.snapshot().embedding.signature(),
            )
            .unwrap();
        let rag = RagService::new(store, Arc::new(FailingEmbedder), config);

        let turn = rag.prepare_turn("where is main?", true).await;
        assert!(turn.warning.unwrap().contains("Invalid API key"));
        assert!(turn.system_prompt.contains("No code context provided"));
        assert!(turn.sources.is_empty());
    }

    #[tokio::test]
    async fn test_prepare_turn_with_context() {
        let rag = service(vec![doc("a-0", "a.rs", vec![1.0, 0.0])], config_with(0.5, 40));

        let turn = rag.prepare_turn("where is main?", true).await;
        assert!(turn.warning.is_none());
        assert_eq!(turn.sources.len(), 1);
        assert!(turn.system_prompt.contains("FILENAME: a.rs (Match: 100%)"));
        assert!(turn.system_prompt.contains("cite the filename"));

        let plain = rag.prepare_turn("where is main?", false).await;
        assert!(plain.system_prompt.contains("RAG disabled"));
    }

    #[test]
    fn test_system_prompt_without_context() {
        let prompt = build_system_prompt("hello", None);
        assert!(prompt.starts_with("You are an advanced software engineer."));
        assert!(prompt.contains("User Query: hello"));
        assert!(prompt.contains("Answer based on general knowledge."));
    }
}
