//! Generated project documentation
//!
//! Walks the indexed corpus folder by folder and asks the chat model for one
//! overview per folder and one short note per file. Requests go out one at a
//! time; a failed item is marked and the run moves on.

use crate::chat::{ChatMessage, ChatModel};
use crate::config::{ChatConfig, SharedConfig};
use crate::indexer::pipeline::RunningGuard;
use crate::indexer::reconstruct::reconstruct_file;
use crate::indexer::store::VectorStore;
use crate::provider::truncate_chars;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;
use tokio::sync::watch;

const FOLDER_CONTENT_LIMIT: usize = 3000;
const FILE_CONTENT_LIMIT: usize = 4000;
const TRUNCATION_MARKER: &str = "\n... (truncated)";

/// Folder name used for files at the repository root
pub const ROOT_FOLDER: &str = ".";

const FOLDER_SYSTEM_PROMPT: &str = "You are an architecture assistant analysing code projects. \
Be specific and useful.";

const FILE_SYSTEM_PROMPT: &str = "You are a documentation assistant. Answer briefly and to the \
point. Only the most necessary information.";

#[derive(Error, Debug, PartialEq)]
pub enum InstructionsError {
    #[error("Instructions are already being generated")]
    AlreadyRunning,
    #[error("No indexed files. Ingest a project first.")]
    NoDocuments,
    #[error("No indexed files in folder {0}")]
    UnknownFolder(String),
    #[error("File is not indexed: {0}")]
    UnknownFile(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InstructionStatus {
    Pending,
    Generating,
    Done,
    Error,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileInstruction {
    pub file_path: String,
    pub file_name: String,
    pub instruction: String,
    pub status: InstructionStatus,
    pub error: Option<String>,
}

impl FileInstruction {
    fn pending(path: &str) -> Self {
        Self {
            file_path: path.to_string(),
            file_name: file_name(path).to_string(),
            instruction: String::new(),
            status: InstructionStatus::Pending,
            error: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FolderInstruction {
    pub folder_path: String,
    pub instruction: String,
    pub status: InstructionStatus,
    pub error: Option<String>,
    /// One entry per file directly inside the folder, sorted by path
    pub files: Vec<FileInstruction>,
}

impl FolderInstruction {
    fn pending(folder: &str, files: &[String]) -> Self {
        Self {
            folder_path: folder.to_string(),
            instruction: String::new(),
            status: InstructionStatus::Pending,
            error: None,
            files: files.iter().map(|p| FileInstruction::pending(p)).collect(),
        }
    }
}

/// Completion counts over folders and files together
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InstructionProgress {
    pub total_folders: usize,
    pub completed_folders: usize,
    pub total_items: usize,
    pub completed_items: usize,
}

impl InstructionProgress {
    /// Rounded completion percentage
    pub fn percent(&self) -> u32 {
        if self.total_items == 0 {
            return 0;
        }
        (self.completed_items as f64 * 100.0 / self.total_items as f64).round() as u32
    }
}

/// Generates and keeps per-folder and per-file documentation
pub struct InstructionService {
    store: Arc<VectorStore>,
    chat: Arc<dyn ChatModel>,
    config: SharedConfig,
    instructions: RwLock<BTreeMap<String, FolderInstruction>>,
    running: AtomicBool,
    status: watch::Sender<String>,
}

impl InstructionService {
    pub fn new(store: Arc<VectorStore>, chat: Arc<dyn ChatModel>, config: SharedConfig) -> Self {
        let (status, _) = watch::channel(String::new());
        Self {
            store,
            chat,
            config,
            instructions: RwLock::new(BTreeMap::new()),
            running: AtomicBool::new(false),
            status,
        }
    }

    /// All folders, sorted by path
    pub fn instructions(&self) -> Vec<FolderInstruction> {
        self.read().values().cloned().collect()
    }

    pub fn folder(&self, folder_path: &str) -> Option<FolderInstruction> {
        self.read().get(folder_path).cloned()
    }

    pub fn file(&self, file_path: &str) -> Option<FileInstruction> {
        self.read()
            .get(folder_of(file_path))?
            .files
            .iter()
            .find(|f| f.file_path == file_path)
            .cloned()
    }

    pub fn progress(&self) -> InstructionProgress {
        let map = self.read();
        let mut progress = InstructionProgress {
            total_folders: map.len(),
            ..Default::default()
        };
        for folder in map.values() {
            progress.total_items += 1 + folder.files.len();
            if folder.status == InstructionStatus::Done {
                progress.completed_folders += 1;
                progress.completed_items += 1;
            }
            progress.completed_items += folder
                .files
                .iter()
                .filter(|f| f.status == InstructionStatus::Done)
                .count();
        }
        progress
    }

    /// Latest progress line
    pub fn status(&self) -> String {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<String> {
        self.status.subscribe()
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Document every indexed folder, then each of its files.
    ///
    /// Earlier results are discarded. Individual failures are recorded on the
    /// item and do not stop the run.
    pub async fn generate_all(&self) -> Result<InstructionProgress, InstructionsError> {
        let _guard =
            RunningGuard::acquire(&self.running).ok_or(InstructionsError::AlreadyRunning)?;

        let folders = group_by_folder(&self.store.file_paths());
        if folders.is_empty() {
            let error = InstructionsError::NoDocuments;
            self.set_status(error.to_string());
            return Err(error);
        }

        let chat_config = self.config.snapshot().chat;
        *self.write() = folders
            .iter()
            .map(|(folder, files)| (folder.clone(), FolderInstruction::pending(folder, files)))
            .collect();
        log::info!("[Instructions] Generating for {} folders", folders.len());

        let total = folders.len();
        for (index, (folder, files)) in folders.iter().enumerate() {
            self.set_status(format!("Folder {}/{}: {}", index + 1, total, folder));
            self.generate_folder_and_files(folder, files, &chat_config)
                .await;
        }

        let progress = self.progress();
        self.set_status(format!(
            "Done! {}/{} items",
            progress.completed_items, progress.total_items
        ));
        Ok(progress)
    }

    /// Redo one folder and all of its files
    pub async fn regenerate_folder(
        &self,
        folder_path: &str,
    ) -> Result<FolderInstruction, InstructionsError> {
        let _guard =
            RunningGuard::acquire(&self.running).ok_or(InstructionsError::AlreadyRunning)?;

        let files: Vec<String> = self
            .store
            .file_paths()
            .into_iter()
            .filter(|p| folder_of(p) == folder_path)
            .collect();
        if files.is_empty() {
            return Err(InstructionsError::UnknownFolder(folder_path.to_string()));
        }

        let chat_config = self.config.snapshot().chat;
        self.write().insert(
            folder_path.to_string(),
            FolderInstruction::pending(folder_path, &files),
        );

        self.set_status(format!("Regenerating: {}", folder_path));
        self.generate_folder_and_files(folder_path, &files, &chat_config)
            .await;
        self.set_status("Done!".to_string());

        self.folder(folder_path)
            .ok_or_else(|| InstructionsError::UnknownFolder(folder_path.to_string()))
    }

    /// Redo the note of a single file
    pub async fn regenerate_file(
        &self,
        file_path: &str,
    ) -> Result<FileInstruction, InstructionsError> {
        let _guard =
            RunningGuard::acquire(&self.running).ok_or(InstructionsError::AlreadyRunning)?;

        let content = self.file_text(file_path);
        if content.is_empty() {
            return Err(InstructionsError::UnknownFile(file_path.to_string()));
        }

        let chat_config = self.config.snapshot().chat;
        let folder = folder_of(file_path);
        {
            let mut map = self.write();
            let entry = map
                .entry(folder.to_string())
                .or_insert_with(|| FolderInstruction::pending(folder, &[]));
            if !entry.files.iter().any(|f| f.file_path == file_path) {
                entry.files.push(FileInstruction::pending(file_path));
                entry.files.sort_by(|a, b| a.file_path.cmp(&b.file_path));
            }
        }

        self.set_status(format!("Regenerating: {}", file_name(file_path)));
        self.generate_file(folder, file_path, &content, &chat_config)
            .await;
        self.set_status("Done!".to_string());

        self.file(file_path)
            .ok_or_else(|| InstructionsError::UnknownFile(file_path.to_string()))
    }

    /// Every finished folder and file as one markdown document, `None` when
    /// nothing has been generated yet
    pub fn export_markdown(&self) -> Option<String> {
        let generated_at = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let map = self.read();
        if map.is_empty() {
            return None;
        }
        Some(render_markdown(map.values(), &generated_at))
    }

    pub fn clear(&self) {
        self.write().clear();
        self.set_status(String::new());
    }

    async fn generate_folder_and_files(
        &self,
        folder: &str,
        files: &[String],
        chat_config: &ChatConfig,
    ) {
        let contents: Vec<(&str, String)> = files
            .iter()
            .map(|path| (path.as_str(), self.file_text(path)))
            .collect();

        self.generate_folder(folder, &contents, chat_config).await;

        for (path, content) in &contents {
            self.set_status(format!("File {} ({})", file_name(path), folder));
            self.generate_file(folder, path, content, chat_config).await;
        }
    }

    async fn generate_folder(
        &self,
        folder: &str,
        files: &[(&str, String)],
        chat_config: &ChatConfig,
    ) {
        self.update_folder(folder, |f| {
            f.status = InstructionStatus::Generating;
            f.error = None;
        });

        let prompt = folder_prompt(folder, files);
        let result = self
            .chat
            .complete(
                &[ChatMessage::user(prompt)],
                Some(FOLDER_SYSTEM_PROMPT),
                chat_config,
            )
            .await;

        match result {
            Ok(text) => self.update_folder(folder, |f| {
                f.instruction = text;
                f.status = InstructionStatus::Done;
            }),
            Err(e) => {
                log::warn!("[Instructions] Folder {} failed: {}", folder, e);
                self.update_folder(folder, |f| {
                    f.status = InstructionStatus::Error;
                    f.error = Some(e.to_string());
                });
            }
        }
    }

    async fn generate_file(
        &self,
        folder: &str,
        path: &str,
        content: &str,
        chat_config: &ChatConfig,
    ) {
        self.update_file(folder, path, |f| {
            f.status = InstructionStatus::Generating;
            f.error = None;
        });

        let prompt = file_prompt(path, content);
        let result = self
            .chat
            .complete(
                &[ChatMessage::user(prompt)],
                Some(FILE_SYSTEM_PROMPT),
                chat_config,
            )
            .await;

        match result {
            Ok(text) => self.update_file(folder, path, |f| {
                f.instruction = text;
                f.status = InstructionStatus::Done;
            }),
            Err(e) => {
                log::warn!("[Instructions] File {} failed: {}", path, e);
                self.update_file(folder, path, |f| {
                    f.status = InstructionStatus::Error;
                    f.error = Some(e.to_string());
                });
            }
        }
    }

    fn file_text(&self, path: &str) -> String {
        reconstruct_file(&self.store.documents_for(path))
    }

    fn update_folder<F: FnOnce(&mut FolderInstruction)>(&self, folder: &str, f: F) {
        if let Some(entry) = self.write().get_mut(folder) {
            f(entry);
        }
    }

    fn update_file<F: FnOnce(&mut FileInstruction)>(&self, folder: &str, path: &str, f: F) {
        let mut map = self.write();
        let file = map
            .get_mut(folder)
            .and_then(|entry| entry.files.iter_mut().find(|file| file.file_path == path));
        if let Some(file) = file {
            f(file);
        }
    }

    fn set_status(&self, status: String) {
        self.status.send_replace(status);
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, BTreeMap<String, FolderInstruction>> {
        self.instructions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, BTreeMap<String, FolderInstruction>> {
        self.instructions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Parent folder of a `/`-separated path, `.` at the root
pub fn folder_of(path: &str) -> &str {
    match path.rsplit_once('/') {
        Some((folder, _)) if !folder.is_empty() => folder,
        _ => ROOT_FOLDER,
    }
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn group_by_folder(paths: &[String]) -> BTreeMap<String, Vec<String>> {
    let mut folders: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for path in paths {
        folders
            .entry(folder_of(path).to_string())
            .or_default()
            .push(path.clone());
    }
    folders
}

fn truncated(content: &str, limit: usize) -> String {
    let head = truncate_chars(content, limit);
    if head.len() < content.len() {
        format!("{}{}", head, TRUNCATION_MARKER)
    } else {
        content.to_string()
    }
}

fn folder_prompt(folder: &str, files: &[(&str, String)]) -> String {
    let file_list = files
        .iter()
        .map(|(path, _)| file_name(path))
        .collect::<Vec<_>>()
        .join(", ");
    let contents = files
        .iter()
        .map(|(path, content)| {
            format!(
                "### {}\n```\n{}\n```",
                file_name(path),
                truncated(content, FOLDER_CONTENT_LIMIT)
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "Analyse the folder \"{folder}\" of the project.\n\n\
         Files in the folder: {file_list}\n\n\
         File contents:\n{contents}\n\n\
         Write a detailed guide to this folder in markdown:\n\n\
         ## Folder overview\n\
         What the folder is and what role it plays in the project.\n\n\
         ## Files\n\
         For each file: its purpose and main entities (types, functions, interfaces).\n\n\
         ## Approach\n\
         Patterns, principles and coding style used in this folder.\n\n\
         ## Suggested improvements\n\
         Recommendations for architecture, structure or readability.\n\n\
         ## Potential problems\n\
         Logic errors, anti-patterns or likely bugs, if any."
    )
}

fn file_prompt(path: &str, content: &str) -> String {
    format!(
        "Describe the file \"{name}\" (path: {path}).\n\n\
         Content:\n```\n{content}\n```\n\n\
         Briefly describe:\n\
         - **Purpose**: what the file is for and what it does (1-2 sentences)\n\
         - **Main entities**: types, functions, interfaces, constants; names and a short note each\n\
         - **Dependencies**: what the file relies on (key imports)\n\n\
         Format: markdown, no filler, as compact as possible.",
        name = file_name(path),
        content = truncated(content, FILE_CONTENT_LIMIT),
    )
}

fn render_markdown<'a>(
    folders: impl Iterator<Item = &'a FolderInstruction>,
    generated_at: &str,
) -> String {
    let mut out = format!(
        "# Project instructions\n\n> Generated: {}\n\n---\n\n",
        generated_at
    );

    for folder in folders {
        if folder.status != InstructionStatus::Done || folder.instruction.is_empty() {
            continue;
        }
        out.push_str(&format!("# {}\n\n{}\n\n", folder.folder_path, folder.instruction));

        let mut files: Vec<&FileInstruction> = folder
            .files
            .iter()
            .filter(|f| f.status == InstructionStatus::Done && !f.instruction.is_empty())
            .collect();
        files.sort_by(|a, b| a.file_name.cmp(&b.file_name));

        if !files.is_empty() {
            out.push_str("## Files in detail\n\n");
            for file in files {
                out.push_str(&format!("### {}\n\n{}\n\n", file.file_name, file.instruction));
            }
        }
        out.push_str("---\n\n");
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{ChatError, TokenStream};
    use crate::indexer::store::tests::doc;
    use crate::indexer::{ChunkMetadata, VectorDocument};
    use async_trait::async_trait;
    use futures::stream;
    use std::sync::Mutex;

    /// Answers with the first prompt line, failing on prompts that mention `fail_on`
    #[derive(Default)]
    struct ScriptedChat {
        fail_on: Option<&'static str>,
        prompts: Mutex<Vec<(String, Option<String>)>>,
    }

    #[async_trait]
    impl ChatModel for ScriptedChat {
        async fn stream_completion(
            &self,
            messages: &[ChatMessage],
            system: Option<&str>,
            _config: &ChatConfig,
        ) -> Result<TokenStream, ChatError> {
            let prompt = messages[0].content.clone();
            self.prompts
                .lock()
                .unwrap()
                .push((prompt.clone(), system.map(str::to_string)));

            if let Some(marker) = self.fail_on {
                if prompt.contains(marker) {
                    return Err(ChatError::Api {
                        status: 429,
                        message: "quota exceeded".to_string(),
                    });
                }
            }
            let first_line = prompt.lines().next().unwrap_or_default().to_string();
            let tokens: Vec<Result<String, ChatError>> = vec![Ok("Doc: ".to_string()), Ok(first_line)];
            Ok(Box::pin(stream::iter(tokens)))
        }
    }

    fn text_doc(path: &str, content: &str) -> VectorDocument {
        let mut d = doc(&format!("{}-0", path), path, vec![1.0]);
        d.content = content.to_string();
        d.metadata = ChunkMetadata {
            start_offset: 0,
            end_offset: content.len(),
        };
        d
    }

    fn service(chat: Arc<ScriptedChat>, docs: Vec<VectorDocument>) -> InstructionService {
        let store = Arc::new(VectorStore::new());
        if !docs.is_empty() {
            store.add_documents(docs, "openai:test").unwrap();
        }
        InstructionService::new(store, chat, SharedConfig::default())
    }

    fn project() -> Vec<VectorDocument> {
        vec![
            text_doc("README.md", "# Widgets"),
            text_doc("src/lib.rs", "pub mod widget;"),
            text_doc("src/widget.rs", "pub struct Widget;"),
            text_doc("src/util/fmt.rs", "pub fn fmt() {}"),
        ]
    }

    #[test]
    fn test_folder_of() {
        assert_eq!(folder_of("README.md"), ".");
        assert_eq!(folder_of("src/lib.rs"), "src");
        assert_eq!(folder_of("src/util/fmt.rs"), "src/util");
        assert_eq!(folder_of("/abs.rs"), ".");
    }

    #[test]
    fn test_truncation_counts_characters() {
        let long = "é".repeat(FILE_CONTENT_LIMIT + 10);
        let cut = truncated(&long, FILE_CONTENT_LIMIT);
        assert!(cut.ends_with(TRUNCATION_MARKER));
        assert_eq!(
            cut.trim_end_matches(TRUNCATION_MARKER).chars().count(),
            FILE_CONTENT_LIMIT
        );

        let short = "fn a() {}";
        assert_eq!(truncated(short, FILE_CONTENT_LIMIT), short);
    }

    #[tokio::test]
    async fn test_generate_all_covers_every_folder_and_file() {
        let chat = Arc::new(ScriptedChat::default());
        let service = service(chat.clone(), project());

        let progress = service.generate_all().await.unwrap();

        assert_eq!(progress.total_folders, 3);
        assert_eq!(progress.total_items, 7);
        assert_eq!(progress.completed_items, 7);
        assert_eq!(progress.percent(), 100);
        assert_eq!(service.status(), "Done! 7/7 items");
        assert!(!service.is_running());

        let folders: Vec<String> = service
            .instructions()
            .into_iter()
            .map(|f| f.folder_path)
            .collect();
        assert_eq!(folders, vec![".", "src", "src/util"]);

        let src = service.folder("src").unwrap();
        assert_eq!(src.status, InstructionStatus::Done);
        assert_eq!(src.instruction, "Doc: Analyse the folder \"src\" of the project.");
        assert_eq!(src.files.len(), 2);
        assert_eq!(src.files[1].file_name, "widget.rs");

        // One request at a time: folder first, then its files
        let prompts = chat.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 7);
        assert!(prompts[0].0.starts_with("Analyse the folder \".\""));
        assert!(prompts[1].0.starts_with("Describe the file \"README.md\""));
        assert!(prompts[2].0.contains("Files in the folder: lib.rs, widget.rs"));
        assert!(prompts[2].0.contains("### widget.rs\n```\npub struct Widget;\n```"));
        assert_eq!(prompts[0].1.as_deref(), Some(FOLDER_SYSTEM_PROMPT));
        assert_eq!(prompts[1].1.as_deref(), Some(FILE_SYSTEM_PROMPT));
    }

    #[tokio::test]
    async fn test_failures_are_recorded_per_item() {
        let chat = Arc::new(ScriptedChat {
            fail_on: Some("widget.rs\""),
            ..Default::default()
        });
        let service = service(chat, project());

        let progress = service.generate_all().await.unwrap();
        assert_eq!(progress.completed_items, 6);
        assert_eq!(progress.percent(), 86);

        let failed = service.file("src/widget.rs").unwrap();
        assert_eq!(failed.status, InstructionStatus::Error);
        assert!(failed.error.unwrap().contains("quota exceeded"));
        assert_eq!(
            service.file("src/util/fmt.rs").unwrap().status,
            InstructionStatus::Done
        );
    }

    #[tokio::test]
    async fn test_file_content_is_rebuilt_from_chunks() {
        let chat = Arc::new(ScriptedChat::default());
        let mut first = text_doc("src/big.rs", "fn one() {}\nfn tw");
        first.id = "src/big.rs-0".to_string();
        let mut second = text_doc("src/big.rs", "fn two() {}\n");
        second.id = "src/big.rs-1".to_string();
        second.metadata = ChunkMetadata {
            start_offset: 12,
            end_offset: 24,
        };
        let service = service(chat.clone(), vec![second, first]);

        service.regenerate_file("src/big.rs").await.unwrap();

        let prompts = chat.prompts.lock().unwrap();
        assert!(prompts[0].0.contains("```\nfn one() {}\nfn two() {}\n\n```"));
    }

    #[tokio::test]
    async fn test_empty_corpus_is_reported() {
        let service = service(Arc::new(ScriptedChat::default()), vec![]);
        assert_eq!(
            service.generate_all().await.unwrap_err(),
            InstructionsError::NoDocuments
        );
        assert_eq!(service.status(), "No indexed files. Ingest a project first.");
        assert!(service.export_markdown().is_none());
    }

    #[tokio::test]
    async fn test_regenerate_folder_and_file() {
        let chat = Arc::new(ScriptedChat::default());
        let service = service(chat.clone(), project());

        let folder = service.regenerate_folder("src/util").await.unwrap();
        assert_eq!(folder.status, InstructionStatus::Done);
        assert_eq!(folder.files[0].status, InstructionStatus::Done);
        assert_eq!(chat.prompts.lock().unwrap().len(), 2);

        let file = service.regenerate_file("README.md").await.unwrap();
        assert_eq!(file.status, InstructionStatus::Done);
        assert_eq!(service.folder(".").unwrap().status, InstructionStatus::Pending);

        assert_eq!(
            service.regenerate_folder("docs").await.unwrap_err(),
            InstructionsError::UnknownFolder("docs".to_string())
        );
        assert_eq!(
            service.regenerate_file("missing.rs").await.unwrap_err(),
            InstructionsError::UnknownFile("missing.rs".to_string())
        );
    }

    #[tokio::test]
    async fn test_export_skips_unfinished_items() {
        let chat = Arc::new(ScriptedChat {
            fail_on: Some("folder \"src\""),
            ..Default::default()
        });
        let service = service(chat, project());
        service.generate_all().await.unwrap();

        let map = service.read();
        let markdown = render_markdown(map.values(), "2026-10-19 12:00:00");
        drop(map);

        assert!(markdown.starts_with("# Project instructions\n\n> Generated: 2026-10-19 12:00:00"));
        assert!(markdown.contains("# .\n\nDoc: Analyse the folder \".\""));
        assert!(markdown.contains("### README.md\n\nDoc: Describe the file \"README.md\""));
        assert!(markdown.contains("# src/util\n\n"));
        assert!(!markdown.contains("# src\n\n"));
        assert!(!markdown.contains("### widget.rs"));

        assert!(service.export_markdown().is_some());
        service.clear();
        assert!(service.instructions().is_empty());
        assert_eq!(service.status(), "");
    }
}
