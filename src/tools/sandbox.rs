//! Project-root containment for every filesystem tool.

use std::io;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SandboxError {
    #[error("Access denied (path outside project directory)")]
    OutsideRoot,

    #[error("path does not exist")]
    NotFound,

    #[error("{0}")]
    Io(#[from] io::Error),

    #[error("Project root {} is not a directory", .0.display())]
    RootNotDirectory(PathBuf),
}

/// The canonical project directory all tool paths are confined to.
#[derive(Debug, Clone)]
pub struct Sandbox {
    root: PathBuf,
}

impl Sandbox {
    /// Canonicalize `root` and make sure it is a directory.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, SandboxError> {
        let root = root.as_ref().canonicalize()?;
        if !root.is_dir() {
            return Err(SandboxError::RootNotDirectory(root));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve `relative` to a canonical path inside the root.
    ///
    /// Containment is checked twice: lexically before touching the
    /// filesystem (so `../x` is denied even when it does not exist), and on
    /// the canonical path (so symlinks cannot leave the root).
    pub fn resolve(&self, relative: &str) -> Result<PathBuf, SandboxError> {
        let candidate = normalize_lexically(&self.root.join(relative));
        if !candidate.starts_with(&self.root) {
            return Err(SandboxError::OutsideRoot);
        }

        let canonical = match candidate.canonicalize() {
            Ok(path) => path,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(SandboxError::NotFound),
            Err(e) => return Err(SandboxError::Io(e)),
        };

        if !canonical.starts_with(&self.root) {
            return Err(SandboxError::OutsideRoot);
        }
        Ok(canonical)
    }

    /// `path` relative to the root, `.` for the root itself.
    pub fn relative_display(&self, path: &Path) -> String {
        match path.strip_prefix(&self.root) {
            Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
            Ok(rel) => rel.to_string_lossy().into_owned(),
            Err(_) => path.to_string_lossy().into_owned(),
        }
    }
}

/// Fold `.` and `..` components without consulting the filesystem.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
