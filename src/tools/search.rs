//! Code search tool: recursive grep scoped to the project root.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use super::sandbox::{Sandbox, SandboxError};
use super::{truncate_entries, ACCESS_DENIED};

pub const GREP_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs `grep -rnI` as a subprocess.
#[derive(Debug, Clone)]
pub struct GrepSearch {
    program: PathBuf,
    timeout: Duration,
}

impl Default for GrepSearch {
    fn default() -> Self {
        Self::new()
    }
}

impl GrepSearch {
    pub fn new() -> Self {
        Self::with_program("grep", GREP_TIMEOUT)
    }

    /// Use a different grep-compatible executable or timeout.
    pub fn with_program(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    /// Search `pattern` under `path` (relative to the project root).
    ///
    /// The search root is resolved through the sandbox before the process is
    /// spawned; grep itself knows nothing about the project boundary.
    pub async fn search(&self, sandbox: &Sandbox, pattern: &str, path: &str) -> String {
        if pattern.is_empty() {
            return "Error: pattern is required".to_string();
        }
        let path = if path.is_empty() { "." } else { path };

        let search_root = match sandbox.resolve(path) {
            Ok(resolved) => sandbox.relative_display(&resolved),
            Err(SandboxError::OutsideRoot) => {
                tracing::warn!("Grep denied for path outside project: {}", path);
                return ACCESS_DENIED.to_string();
            }
            Err(SandboxError::NotFound) => return format!("Error: Path not found: {}", path),
            Err(e) => return format!("Error executing grep: {}", e),
        };

        let mut cmd = Command::new(&self.program);
        cmd.arg("-rnI")
            .arg("-e")
            .arg(pattern)
            .arg("--")
            .arg(&search_root)
            .current_dir(sandbox.root())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return format!("Error executing grep: {}", e),
            Err(_) => {
                tracing::warn!(
                    "Grep for {:?} in {} timed out after {:?}",
                    pattern,
                    search_root,
                    self.timeout
                );
                return "Error: Grep timed out".to_string();
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if stdout.trim().is_empty() {
            // grep exits 1 for "no matches", 2+ for real errors
            let failed = output.status.code().map_or(true, |code| code > 1);
            if failed && !stderr.trim().is_empty() {
                return format!("Error executing grep: {}", stderr.trim());
            }
            return "No matches found.".to_string();
        }

        truncate_entries(stdout.lines().map(str::to_string).collect(), "matches")
    }
}
