//! Views rebuilt from stored chunks: whole-file text and the file tree

use super::VectorDocument;
use serde::Serialize;
use std::cmp::Ordering;

/// Stitch a file back together from its overlapping chunks.
///
/// Chunks are ordered by start offset; the part of each chunk already covered
/// by the previous one is dropped. A gap left by a chunk that failed to embed
/// is closed up, not padded.
pub fn reconstruct_file(docs: &[VectorDocument]) -> String {
    let mut ordered: Vec<&VectorDocument> = docs.iter().collect();
    ordered.sort_by_key(|d| (d.metadata.start_offset, d.metadata.end_offset));

    let mut out = String::new();
    let mut covered: usize = 0;

    for doc in ordered {
        let start = doc.metadata.start_offset;
        let end = doc.metadata.end_offset;
        if end <= covered {
            continue;
        }

        let skip = covered.saturating_sub(start);
        match doc.content.get(skip..) {
            Some(rest) => out.push_str(rest),
            None => log::debug!(
                "[Reconstruct] Chunk {} does not line up with its offsets",
                doc.id
            ),
        }
        covered = covered.max(end);
    }

    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Folder,
    File,
}

/// Entry of the indexed file tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileNode {
    pub name: String,
    /// Full `/`-separated path from the root
    pub path: String,
    pub kind: NodeKind,
    pub depth: usize,
    pub children: Vec<FileNode>,
}

/// Build a nested tree from flat file paths, folders before files and
/// each level sorted by name.
pub fn build_file_tree<S: AsRef<str>>(paths: &[S]) -> Vec<FileNode> {
    let mut root: Vec<FileNode> = Vec::new();

    for path in paths {
        let parts: Vec<&str> = path
            .as_ref()
            .split('/')
            .filter(|p| !p.is_empty())
            .collect();
        insert_path(&mut root, &parts, 0, "");
    }

    sort_level(&mut root);
    root
}

fn insert_path(level: &mut Vec<FileNode>, parts: &[&str], depth: usize, parent: &str) {
    let Some((name, rest)) = parts.split_first() else {
        return;
    };
    let kind = if rest.is_empty() {
        NodeKind::File
    } else {
        NodeKind::Folder
    };

    let index = match level.iter().position(|n| n.name == *name && n.kind == kind) {
        Some(index) => index,
        None => {
            let path = if parent.is_empty() {
                name.to_string()
            } else {
                format!("{}/{}", parent, name)
            };
            level.push(FileNode {
                name: name.to_string(),
                path,
                kind,
                depth,
                children: Vec::new(),
            });
            level.len() - 1
        }
    };

    let node = &mut level[index];
    let parent_path = node.path.clone();
    insert_path(&mut node.children, rest, depth + 1, &parent_path);
}

fn sort_level(level: &mut [FileNode]) {
    level.sort_by(|a, b| match (a.kind, b.kind) {
        (NodeKind::Folder, NodeKind::File) => Ordering::Less,
        (NodeKind::File, NodeKind::Folder) => Ordering::Greater,
        _ => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
    });
    for node in level.iter_mut() {
        sort_level(&mut node.children);
    }
}
