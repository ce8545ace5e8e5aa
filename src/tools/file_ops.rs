//! File tools: read a file, find files by glob pattern.

use std::path::{Component, Path, PathBuf};

use globset::GlobBuilder;
use walkdir::WalkDir;

use super::sandbox::{Sandbox, SandboxError};
use super::{truncate_entries, ACCESS_DENIED};

/// Largest file body returned by Read before truncation.
pub const MAX_READ_BYTES: usize = 256 * 1024;

/// Read a UTF-8 file inside the project.
pub async fn read_file(sandbox: &Sandbox, relative_path: &str) -> String {
    if relative_path.is_empty() {
        return "Error: relative_path is required".to_string();
    }

    let target = match sandbox.resolve(relative_path) {
        Ok(path) => path,
        Err(SandboxError::OutsideRoot) => {
            tracing::warn!("Read denied for path outside project: {}", relative_path);
            return ACCESS_DENIED.to_string();
        }
        Err(SandboxError::NotFound) => return format!("Error: File not found: {}", relative_path),
        Err(e) => return format!("Error reading file: {}", e),
    };

    if !target.is_file() {
        return format!("Error: Not a file: {}", relative_path);
    }

    let bytes = match tokio::fs::read(&target).await {
        Ok(bytes) => bytes,
        Err(e) => return format!("Error reading file: {}", e),
    };

    match String::from_utf8(bytes) {
        Ok(text) => cap_text(text, MAX_READ_BYTES),
        Err(_) => "Error: File is binary or not UTF-8 encoded".to_string(),
    }
}

/// Cut `text` to at most `max_bytes`, on a char boundary.
fn cap_text(mut text: String, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text;
    }
    let mut cut = max_bytes;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    let remaining = text.len() - cut;
    text.truncate(cut);
    text.push_str(&format!("\n... ({} more bytes truncated)", remaining));
    text
}

/// List regular files whose root-relative path matches `pattern`.
///
/// `*` stays within one directory, `**` crosses directories. Symlinks are
/// neither followed nor listed.
pub async fn glob_files(sandbox: &Sandbox, pattern: &str) -> String {
    let pattern = pattern.trim_start_matches("./");
    if pattern.is_empty() {
        return "Error: pattern is required".to_string();
    }

    if escapes_root(pattern) {
        tracing::warn!("Glob denied for pattern outside project: {}", pattern);
        return ACCESS_DENIED.to_string();
    }

    let matcher = match GlobBuilder::new(pattern).literal_separator(true).build() {
        Ok(glob) => glob.compile_matcher(),
        Err(e) => return format!("Error executing glob: {}", e),
    };

    let root = sandbox.root().to_path_buf();
    let walk = tokio::task::spawn_blocking(move || {
        matching_files(&root, |rel| matcher.is_match(rel))
    })
    .await;

    match walk {
        Ok(files) if files.is_empty() => "No files found matching the pattern.".to_string(),
        Ok(files) => truncate_entries(files, "files"),
        Err(e) => format!("Error executing glob: {}", e),
    }
}

fn escapes_root(pattern: &str) -> bool {
    Path::new(pattern).components().any(|c| {
        matches!(
            c,
            Component::ParentDir | Component::RootDir | Component::Prefix(_)
        )
    })
}

/// Walk `root` in lexical order and keep files accepted by `is_match`.
fn matching_files(root: &Path, is_match: impl Fn(&Path) -> bool) -> Vec<String> {
    WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            let rel: PathBuf = entry.path().strip_prefix(root).ok()?.to_path_buf();
            is_match(&rel).then(|| rel.to_string_lossy().into_owned())
        })
        .collect()
}
