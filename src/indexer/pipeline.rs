//! Ingestion pipeline
//!
//! Local folders, in-memory file sets and GitHub repositories all end up in the
//! same vectorization stage: chunk each file, embed chunks sequentially per file
//! with a bounded number of files in flight, then replace the corpus in one
//! commit. A run of consecutive embedding failures trips a circuit breaker and
//! aborts without touching the store.

use super::chunker::{chunk_text_with, ChunkParams};
use super::embedder::{Embedder, EmbedderError};
use super::filter::{is_allowed, is_blocked_directory, looks_binary_or_empty};
use super::github::{resolve_default_branch, GitHubError, RepoRef, RepoSource};
use super::store::VectorStore;
use super::{IndexerConfig, VectorDocument};
use crate::config::{ConfigError, EmbeddingConfig, SharedConfig};
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use thiserror::Error;
use tokio::sync::watch;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("An ingestion is already running")]
    AlreadyRunning,
    #[error("Directory does not exist: {0}")]
    InvalidDirectory(String),
    #[error("No valid files to ingest")]
    NoValidFiles,
    #[error("Failed to connect to the embedding provider {failures} times in a row: {reason}")]
    ProviderUnreachable { failures: usize, reason: String },
    #[error("No vectors were generated")]
    NothingIngested,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    GitHub(#[from] GitHubError),
}

/// Observable ingestion state
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum IngestStatus {
    Idle,
    Scanning { files: usize },
    FetchingTree { repo: String },
    Downloading { done: usize, total: usize },
    Vectorizing { done: usize, total: usize, vectors: usize },
    Saving { vectors: usize },
    Done {
        files: usize,
        vectors: usize,
        failed_chunks: usize,
    },
    NothingIngested,
    Aborted { reason: String },
    Failed { message: String },
}

impl fmt::Display for IngestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IngestStatus::Idle => write!(f, "Idle"),
            IngestStatus::Scanning { files } => write!(f, "Scanning {} files...", files),
            IngestStatus::FetchingTree { repo } => {
                write!(f, "Fetching GitHub tree for {}...", repo)
            }
            IngestStatus::Downloading { done, total } => {
                write!(f, "Downloading: {}/{}", done, total)
            }
            IngestStatus::Vectorizing {
                done,
                total,
                vectors,
            } => write!(
                f,
                "Vectorizing... {}/{} files ({} vectors)",
                done, total, vectors
            ),
            IngestStatus::Saving { vectors } => {
                write!(f, "Saving {} vectors to database...", vectors)
            }
            IngestStatus::Done {
                files,
                vectors,
                failed_chunks: 0,
            } => write!(f, "Done! Indexed {} files ({} vectors).", files, vectors),
            IngestStatus::Done {
                files,
                vectors,
                failed_chunks,
            } => write!(
                f,
                "Done! Indexed {} files ({} vectors, {} chunks failed).",
                files, vectors, failed_chunks
            ),
            IngestStatus::NothingIngested => {
                write!(f, "Finished, but no vectors were generated.")
            }
            IngestStatus::Aborted { reason } => {
                write!(f, "Aborted: Connection failed. {}", reason)
            }
            IngestStatus::Failed { message } => write!(f, "Error: {}", message),
        }
    }
}

/// Summary of a successful ingestion
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub files_total: usize,
    /// Files that produced at least one vector
    pub files_embedded: usize,
    pub vectors: usize,
    pub failed_chunks: usize,
    /// Filtered out, binary, empty or failed to download
    pub skipped_files: usize,
}

/// A file handed over by the host, path relative to the ingested root
#[derive(Debug, Clone)]
pub struct LocalFile {
    pub path: String,
    pub bytes: Vec<u8>,
}

/// A decoded text file ready for chunking
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: String,
    pub content: String,
}

/// Run `f` over `items` with at most `limit` futures in flight.
///
/// `on_complete` sees every result as it finishes. Results come back in
/// completion order.
pub async fn run_concurrent<T, R, F, Fut, C>(
    items: Vec<T>,
    limit: usize,
    f: F,
    mut on_complete: C,
) -> Vec<R>
where
    F: FnMut(T) -> Fut,
    Fut: Future<Output = R>,
    C: FnMut(&R),
{
    stream::iter(items)
        .map(f)
        .buffer_unordered(limit.max(1))
        .inspect(move |result| on_complete(result))
        .collect()
        .await
}

/// Consecutive failure counter shared by all in-flight files
struct CircuitBreaker {
    threshold: usize,
    consecutive: AtomicUsize,
    tripped: AtomicBool,
    reason: Mutex<Option<String>>,
    /// Set when a chunk fails for a reason retrying cannot fix
    fatal: Mutex<Option<ConfigError>>,
}

impl CircuitBreaker {
    fn new(threshold: usize) -> Self {
        Self {
            threshold: threshold.max(1),
            consecutive: AtomicUsize::new(0),
            tripped: AtomicBool::new(false),
            reason: Mutex::new(None),
            fatal: Mutex::new(None),
        }
    }

    fn record_success(&self) {
        self.consecutive.store(0, Ordering::SeqCst);
    }

    fn record_failure(&self, reason: &str) {
        let failures = self.consecutive.fetch_add(1, Ordering::SeqCst) + 1;
        if failures >= self.threshold && !self.tripped.swap(true, Ordering::SeqCst) {
            *self.reason.lock().unwrap_or_else(PoisonError::into_inner) = Some(reason.to_string());
        }
    }

    /// Stop all work without counting towards the connection failure limit
    fn halt(&self, error: ConfigError) {
        let mut fatal = self.fatal.lock().unwrap_or_else(PoisonError::into_inner);
        if fatal.is_none() {
            *fatal = Some(error);
        }
        self.tripped.store(true, Ordering::SeqCst);
    }

    fn take_fatal(&self) -> Option<ConfigError> {
        self.fatal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn is_tripped(&self) -> bool {
        self.tripped.load(Ordering::SeqCst)
    }

    fn reason(&self) -> String {
        self.reason
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .unwrap_or_default()
    }
}

#[derive(Default)]
struct FileOutcome {
    docs: Vec<VectorDocument>,
    failed_chunks: usize,
}

/// Clears the running flag when a long job ends, however it ends
pub(crate) struct RunningGuard<'a>(&'a AtomicBool);

impl<'a> RunningGuard<'a> {
    /// Raise `flag`, or `None` when it is already raised
    pub(crate) fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| RunningGuard(flag))
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Ingestion orchestrator
pub struct Ingestor {
    embedder: Arc<dyn Embedder>,
    store: Arc<VectorStore>,
    repo_source: Arc<dyn RepoSource>,
    config: SharedConfig,
    indexer_config: IndexerConfig,
    running: AtomicBool,
    status: watch::Sender<IngestStatus>,
}

impl Ingestor {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        store: Arc<VectorStore>,
        repo_source: Arc<dyn RepoSource>,
        config: SharedConfig,
        indexer_config: IndexerConfig,
    ) -> Self {
        let (status, _) = watch::channel(IngestStatus::Idle);
        Self {
            embedder,
            store,
            repo_source,
            config,
            indexer_config,
            running: AtomicBool::new(false),
            status,
        }
    }

    pub fn status(&self) -> IngestStatus {
        self.status.borrow().clone()
    }

    /// Receive every status change
    pub fn subscribe(&self) -> watch::Receiver<IngestStatus> {
        self.status.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Ingest files supplied by the host
    pub async fn ingest_files(&self, files: Vec<LocalFile>) -> Result<IngestReport, IngestError> {
        let _guard = self.try_start()?;
        let embedding = self.checked_embedding()?;
        self.set_status(IngestStatus::Scanning { files: files.len() });

        let total = files.len();
        let sources: Vec<SourceFile> = files
            .into_iter()
            .filter(|f| is_allowed(&f.path))
            .filter_map(decode_local)
            .collect();

        self.vectorize(sources, total, embedding).await
    }

    /// Walk a directory and ingest every allowed text file below it
    pub async fn ingest_directory(&self, root: &Path) -> Result<IngestReport, IngestError> {
        let _guard = self.try_start()?;
        let embedding = self.checked_embedding()?;

        if !root.is_dir() {
            return self.fail(IngestError::InvalidDirectory(root.display().to_string()));
        }

        let paths = collect_directory(root);
        self.set_status(IngestStatus::Scanning { files: paths.len() });

        let total = paths.len();
        let mut sources = Vec::new();
        for (relative, full) in paths {
            if !is_allowed(&relative) {
                continue;
            }
            match tokio::fs::read(&full).await {
                Ok(bytes) => {
                    if let Some(source) = decode_local(LocalFile {
                        path: relative,
                        bytes,
                    }) {
                        sources.push(source);
                    }
                }
                Err(e) => log::warn!("[Ingestor] Failed to read {}: {}", full.display(), e),
            }
        }

        self.vectorize(sources, total, embedding).await
    }

    /// Ingest the default branch of a GitHub repository
    pub async fn ingest_github(&self, reference: &str) -> Result<IngestReport, IngestError> {
        let _guard = self.try_start()?;
        let embedding = self.checked_embedding()?;

        let (sources, total) = match self.download_repository(reference).await {
            Ok(downloaded) => downloaded,
            Err(e) => return self.fail(e),
        };

        self.vectorize(sources, total, embedding).await
    }

    async fn download_repository(
        &self,
        reference: &str,
    ) -> Result<(Vec<SourceFile>, usize), IngestError> {
        let repo = RepoRef::parse(reference)?;
        self.set_status(IngestStatus::FetchingTree {
            repo: repo.to_string(),
        });

        let source = self.repo_source.as_ref();
        let (branch, tree) = resolve_default_branch(source, &repo).await?;

        let blobs: Vec<String> = tree
            .into_iter()
            .filter(|entry| entry.is_blob())
            .map(|entry| entry.path)
            .collect();
        let total = blobs.len();
        let wanted: Vec<String> = blobs.into_iter().filter(|p| is_allowed(p)).collect();
        log::info!(
            "[Ingestor] {}@{}: {} of {} files pass the filter",
            repo,
            branch,
            wanted.len(),
            total
        );

        let to_download = wanted.len();
        self.set_status(IngestStatus::Downloading {
            done: 0,
            total: to_download,
        });

        let mut done = 0;
        let downloads = run_concurrent(
            wanted,
            self.indexer_config.download_concurrency,
            |path| {
                let repo = &repo;
                let branch = branch.as_str();
                async move {
                    let content = source.fetch_file(repo, branch, &path).await;
                    (path, content)
                }
            },
            |_| {
                done += 1;
                self.set_status(IngestStatus::Downloading {
                    done,
                    total: to_download,
                });
            },
        )
        .await;

        let sources = downloads
            .into_iter()
            .filter_map(|(path, content)| match content {
                Ok(content) if !looks_binary_or_empty(&content) => {
                    Some(SourceFile { path, content })
                }
                Ok(_) => {
                    log::debug!("[Ingestor] Skipping binary or empty file {}", path);
                    None
                }
                Err(e) => {
                    log::warn!("[Ingestor] Failed to download {}: {}", path, e);
                    None
                }
            })
            .collect();

        Ok((sources, total))
    }

    /// Chunk, embed and commit a set of decoded files.
    ///
    /// `files_total` counts every file considered, including the ones dropped
    /// before vectorization. `embedding` is the snapshot taken when the run
    /// started.
    async fn vectorize(
        &self,
        files: Vec<SourceFile>,
        files_total: usize,
        embedding: EmbeddingConfig,
    ) -> Result<IngestReport, IngestError> {
        if files.is_empty() {
            return self.fail(IngestError::NoValidFiles);
        }

        let signature = embedding.signature();

        let total = files.len();
        let skipped_files = files_total.saturating_sub(total);
        log::info!(
            "[Ingestor] Vectorizing {} files with {} ({} skipped)",
            total,
            signature,
            skipped_files
        );
        self.set_status(IngestStatus::Vectorizing {
            done: 0,
            total,
            vectors: 0,
        });

        let breaker = CircuitBreaker::new(self.indexer_config.max_consecutive_failures);
        let mut done = 0;
        let mut vectors = 0;

        let outcomes = run_concurrent(
            files,
            self.indexer_config.embedding_concurrency,
            |file| self.embed_file(file, &embedding, &breaker),
            |outcome| {
                done += 1;
                vectors += outcome.docs.len();
                self.set_status(IngestStatus::Vectorizing {
                    done,
                    total,
                    vectors,
                });
            },
        )
        .await;

        if let Some(error) = breaker.take_fatal() {
            return self.fail(error.into());
        }

        if breaker.is_tripped() {
            let reason = breaker.reason();
            log::error!(
                "[Ingestor] Aborted after {} consecutive failures: {}",
                breaker.threshold,
                reason
            );
            self.set_status(IngestStatus::Aborted {
                reason: reason.clone(),
            });
            return Err(IngestError::ProviderUnreachable {
                failures: breaker.threshold,
                reason,
            });
        }

        let mut report = IngestReport {
            files_total,
            skipped_files,
            ..Default::default()
        };
        let mut docs = Vec::new();
        for outcome in outcomes {
            report.failed_chunks += outcome.failed_chunks;
            if !outcome.docs.is_empty() {
                report.files_embedded += 1;
            }
            docs.extend(outcome.docs);
        }
        report.vectors = docs.len();

        if docs.is_empty() {
            log::warn!("[Ingestor] Finished without generating any vectors");
            self.set_status(IngestStatus::NothingIngested);
            return Err(IngestError::NothingIngested);
        }

        self.set_status(IngestStatus::Saving {
            vectors: report.vectors,
        });
        self.store.replace_all(docs, &signature);

        log::info!(
            "[Ingestor] Indexed {} files, {} vectors, {} failed chunks",
            report.files_embedded,
            report.vectors,
            report.failed_chunks
        );
        self.set_status(IngestStatus::Done {
            files: report.files_embedded,
            vectors: report.vectors,
            failed_chunks: report.failed_chunks,
        });
        Ok(report)
    }

    /// Embed one file's chunks strictly in order
    async fn embed_file(
        &self,
        file: SourceFile,
        embedding: &EmbeddingConfig,
        breaker: &CircuitBreaker,
    ) -> FileOutcome {
        let mut outcome = FileOutcome::default();
        if breaker.is_tripped() {
            return outcome;
        }

        let params = ChunkParams::for_path(&file.path, &self.indexer_config);
        let chunks = chunk_text_with(&file.content, params);
        log::debug!("[Ingestor] {}: {} chunks", file.path, chunks.len());

        for (index, chunk) in chunks.into_iter().enumerate() {
            if breaker.is_tripped() {
                break;
            }
            match self.embedder.embed(&chunk.text, embedding).await {
                Ok(vector) => {
                    breaker.record_success();
                    outcome
                        .docs
                        .push(VectorDocument::from_chunk(&file.path, index, chunk, vector));
                }
                Err(EmbedderError::Config(e)) => {
                    log::error!("[Ingestor] Failed to embed {} chunk {}: {}", file.path, index, e);
                    outcome.failed_chunks += 1;
                    breaker.halt(e);
                    break;
                }
                Err(e) => {
                    log::warn!("[Ingestor] Failed to embed {} chunk {}: {}", file.path, index, e);
                    outcome.failed_chunks += 1;
                    breaker.record_failure(&e.to_string());
                }
            }
        }

        outcome
    }

    /// Snapshot the embedding configuration for one run and reject it before
    /// any file or network access when it cannot work.
    ///
    /// The snapshot is used for the whole run so a settings change mid-run
    /// cannot mix vector spaces.
    fn checked_embedding(&self) -> Result<EmbeddingConfig, IngestError> {
        let embedding = self.config.snapshot().embedding;
        match embedding.validate() {
            Ok(()) => Ok(embedding),
            Err(e) => self.fail(e.into()),
        }
    }

    fn try_start(&self) -> Result<RunningGuard<'_>, IngestError> {
        RunningGuard::acquire(&self.running).ok_or(IngestError::AlreadyRunning)
    }

    fn set_status(&self, status: IngestStatus) {
        self.status.send_replace(status);
    }

    fn fail<T>(&self, error: IngestError) -> Result<T, IngestError> {
        log::error!("[Ingestor] {}", error);
        self.set_status(IngestStatus::Failed {
            message: error.to_string(),
        });
        Err(error)
    }
}

/// Invalid UTF-8 is treated as binary
fn decode_local(file: LocalFile) -> Option<SourceFile> {
    let content = match String::from_utf8(file.bytes) {
        Ok(content) => content,
        Err(_) => {
            log::debug!("[Ingestor] Skipping non UTF-8 file {}", file.path);
            return None;
        }
    };
    if looks_binary_or_empty(&content) {
        log::debug!("[Ingestor] Skipping binary or empty file {}", file.path);
        return None;
    }
    Some(SourceFile {
        path: file.path,
        content,
    })
}

/// Regular files below `root` as (`/`-separated relative path, full path),
/// with blocked directories pruned.
fn collect_directory(root: &Path) -> Vec<(String, PathBuf)> {
    WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0
                || !(e.file_type().is_dir()
                    && is_blocked_directory(&e.file_name().to_string_lossy()))
        })
        .filter_map(|e| match e {
            Ok(entry) => Some(entry),
            Err(err) => {
                log::warn!("[Ingestor] Skipping unreadable entry: {}", err);
                None
            }
        })
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            let relative = e
                .path()
                .strip_prefix(root)
                .ok()?
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            Some((relative, e.into_path()))
        })
        .collect()
}
