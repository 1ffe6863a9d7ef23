pub mod chat;
pub mod config;
pub mod database;
pub mod indexer;
pub mod instructions;
pub mod provider;
pub mod rag;

use chat::{ChatError, ChatMessage, ChatModel, HttpChatModel, TokenStream};
use config::{resolve_api_key, LlmConfig, SharedConfig};
use database::Database;
use indexer::embedder::{Embedder, HttpEmbedder};
use indexer::github::{GitHubClient, RepoSource};
use indexer::pipeline::Ingestor;
use indexer::reconstruct::{build_file_tree, reconstruct_file, FileNode};
use indexer::store::{PersistenceError, VectorStore};
use indexer::IndexerConfig;
use instructions::InstructionService;
use rag::{PreparedTurn, RagService};
use std::path::Path;
use std::sync::Arc;

/// Optional token for GitHub imports
pub const GITHUB_TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Fully wired retrieval engine
///
/// Owns the database, the restored vector store and every service built on
/// top of them. Hosts keep one instance for the lifetime of the process.
pub struct RagEngine {
    db: Arc<Database>,
    config: SharedConfig,
    store: Arc<VectorStore>,
    ingestor: Ingestor,
    rag: RagService,
    instructions: InstructionService,
    chat: Arc<dyn ChatModel>,
}

impl RagEngine {
    /// Open (or create) the engine's database in `data_dir` and restore the index
    pub fn open(data_dir: &Path) -> rusqlite::Result<Self> {
        let db = Database::open(data_dir)?;
        log::info!("[RagEngine] Opened database in {}", data_dir.display());

        let github = match resolve_api_key("", GITHUB_TOKEN_ENV) {
            Some(token) => GitHubClient::new().with_token(token),
            None => GitHubClient::new(),
        };

        Ok(Self::with_parts(
            db,
            Arc::new(HttpEmbedder::new()),
            Arc::new(github),
            Arc::new(HttpChatModel::new()),
            IndexerConfig::default(),
        ))
    }

    /// Assemble an engine from explicit collaborators
    pub fn with_parts(
        db: Database,
        embedder: Arc<dyn Embedder>,
        repo_source: Arc<dyn RepoSource>,
        chat: Arc<dyn ChatModel>,
        indexer_config: IndexerConfig,
    ) -> Self {
        let db = Arc::new(db);
        let config = SharedConfig::new(db.load_config());

        // Restored before any query can reach it
        let store = Arc::new(VectorStore::open(db.clone()));

        let ingestor = Ingestor::new(
            embedder.clone(),
            store.clone(),
            repo_source,
            config.clone(),
            indexer_config,
        );
        let rag = RagService::new(store.clone(), embedder, config.clone());
        let instructions = InstructionService::new(store.clone(), chat.clone(), config.clone());

        Self {
            db,
            config,
            store,
            ingestor,
            rag,
            instructions,
            chat,
        }
    }

    pub fn config(&self) -> LlmConfig {
        self.config.snapshot()
    }

    /// Persist and apply a new provider configuration.
    ///
    /// Ingestions already running keep the configuration they started with.
    pub fn update_config(&self, config: LlmConfig) -> Result<(), PersistenceError> {
        self.db.save_config(&config)?;
        self.config.replace(config);
        log::info!("[RagEngine] Configuration updated");
        Ok(())
    }

    pub fn ingestor(&self) -> &Ingestor {
        &self.ingestor
    }

    pub fn rag(&self) -> &RagService {
        &self.rag
    }

    /// Generated folder and file documentation
    pub fn instructions(&self) -> &InstructionService {
        &self.instructions
    }

    pub fn store(&self) -> &VectorStore {
        &self.store
    }

    /// Drop the whole index
    pub fn clear_index(&self) {
        self.store.clear();
        log::info!("[RagEngine] Index cleared");
    }

    /// Indexed file text rebuilt from its chunks, `None` if the file is unknown
    pub fn open_file(&self, path: &str) -> Option<String> {
        let docs = self.store.documents_for(path);
        if docs.is_empty() {
            return None;
        }
        Some(reconstruct_file(&docs))
    }

    /// Tree of every indexed file
    pub fn file_tree(&self) -> Vec<FileNode> {
        build_file_tree(self.store.file_paths().as_slice())
    }

    /// Prepare and stream one chat turn.
    ///
    /// `history` holds earlier messages; `query` is appended as the new user
    /// message. Retrieval problems come back in `PreparedTurn::warning`.
    pub async fn chat(
        &self,
        history: &[ChatMessage],
        query: &str,
        use_rag: bool,
    ) -> Result<(PreparedTurn, TokenStream), ChatError> {
        let turn = self.rag.prepare_turn(query, use_rag).await;

        let mut messages = history.to_vec();
        messages.push(ChatMessage::user(query));

        let chat_config = self.config.snapshot().chat;
        let stream = self
            .chat
            .stream_completion(&messages, Some(&turn.system_prompt), &chat_config)
            .await?;
        Ok((turn, stream))
    }
}
