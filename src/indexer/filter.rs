//! Path eligibility for ingestion
//!
//! Allow-by-default: anything that is not a known binary, lockfile or build/VCS
//! directory is ingested, so unfamiliar text formats still make it in.

/// Files embedded concurrently
pub const EMBEDDING_CONCURRENCY: usize = 4;

/// Parallel downloads when importing a GitHub repository
pub const DOWNLOAD_CONCURRENCY: usize = 10;

const BINARY_EXTENSIONS: &[&str] = &[
    // images
    "png", "jpg", "jpeg", "gif", "ico", "svg", "webp", "avif", "bmp", "tiff", "psd",
    // audio / video
    "mp4", "mp3", "wav", "ogg", "webm", "mov", "avi", "mkv", "flac", "aac",
    // archives
    "zip", "tar", "gz", "tgz", "rar", "7z", "iso", "dmg",
    // office documents
    "pdf", "doc", "docx", "xls", "xlsx", "ppt", "pptx",
    // executables and libraries
    "exe", "dll", "so", "dylib", "bin", "obj", "o", "a", "lib", "class", "pyc", "pyd",
    // databases
    "db", "sqlite", "sqlite3", "mdb", "parquet",
    // misc
    "ds_store", "map", "woff", "woff2", "ttf", "eot", "suo", "ntvs", "njsproj",
];

const BLOCKED_DIRECTORIES: &[&str] = &[
    "node_modules", ".git", ".angular", ".nx", ".vscode", ".idea", "dist", "build", "out",
    "coverage", ".next", ".nuxt", ".cache", "__pycache__", "venv", ".venv", "target", "vendor",
    "bin", "obj", ".gradle",
];

const BLOCKED_FILENAMES: &[&str] = &[
    "package-lock.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "bun.lockb",
    "cargo.lock",
    "gemfile.lock",
    "composer.lock",
    "poetry.lock",
    ".yarn-integrity",
    ".ds_store",
    "thumbs.db",
];

/// Decide whether a relative path should be ingested.
///
/// Case-insensitive; accepts both `/` and `\` separators.
pub fn is_allowed(path: &str) -> bool {
    let lower = path.to_lowercase();
    let segments: Vec<&str> = lower
        .split(['/', '\\'])
        .filter(|s| !s.is_empty())
        .collect();

    let Some(file_name) = segments.last() else {
        return false;
    };

    if BLOCKED_FILENAMES.contains(file_name) {
        return false;
    }

    if segments.iter().any(|s| is_blocked_directory(s)) {
        return false;
    }

    match extension(file_name) {
        Some(ext) => !BINARY_EXTENSIONS.contains(&ext),
        None => true,
    }
}

/// Whether a single directory name is excluded from traversal
pub fn is_blocked_directory(name: &str) -> bool {
    let lower = name.to_lowercase();
    BLOCKED_DIRECTORIES.contains(&lower.as_str())
}

/// Content-level check applied after reading: NUL bytes mean binary, and
/// whitespace-only files carry nothing worth embedding.
pub fn looks_binary_or_empty(content: &str) -> bool {
    content.contains('\0') || content.trim().is_empty()
}

fn extension(file_name: &str) -> Option<&str> {
    // ".ds_store" counts as an extension, "Dockerfile" has none
    file_name.rfind('.').map(|idx| &file_name[idx + 1..])
}
