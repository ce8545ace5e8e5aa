//! The three sandboxed tools exposed to the model: Read, Glob and Grep.
//!
//! Tool calls arrive as a name plus a JSON-encoded argument string. They are
//! parsed into a closed [`ToolRequest`] before anything runs, and every
//! execution path ends in a `String` so the agent loop can always answer the
//! call.

mod file_ops;
mod sandbox;
mod search;

use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::llm::{FunctionDefinition, ToolDefinition};

pub use file_ops::{glob_files, read_file, MAX_READ_BYTES};
pub use sandbox::{Sandbox, SandboxError};
pub use search::{GrepSearch, GREP_TIMEOUT};

/// Glob and Grep list at most this many entries.
pub const MAX_LISTED_ENTRIES: usize = 100;

pub const ACCESS_DENIED: &str = "Error: Access denied (path outside project directory)";

#[derive(Debug, Error)]
pub enum ToolArgsError {
    #[error("Unknown tool {0}")]
    UnknownTool(String),

    #[error("Invalid JSON arguments for {tool}: {source}")]
    Json {
        tool: String,
        source: serde_json::Error,
    },

    #[error("Invalid arguments for {tool}: {source}")]
    Schema {
        tool: String,
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ReadArgs {
    pub relative_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GlobArgs {
    pub pattern: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GrepArgs {
    pub pattern: String,
    #[serde(default)]
    pub path: Option<String>,
}

/// A validated tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolRequest {
    Read(ReadArgs),
    Glob(GlobArgs),
    Grep(GrepArgs),
}

impl ToolRequest {
    /// Parse a model-issued call. `arguments` is the raw JSON string.
    pub fn parse(name: &str, arguments: &str) -> Result<Self, ToolArgsError> {
        let value: Value = serde_json::from_str(arguments).map_err(|source| ToolArgsError::Json {
            tool: name.to_string(),
            source,
        })?;

        let schema_err = |source: serde_json::Error| ToolArgsError::Schema {
            tool: name.to_string(),
            source,
        };

        match name {
            "Read" => serde_json::from_value(value).map(Self::Read).map_err(schema_err),
            "Glob" => serde_json::from_value(value).map(Self::Glob).map_err(schema_err),
            "Grep" => serde_json::from_value(value).map(Self::Grep).map_err(schema_err),
            other => Err(ToolArgsError::UnknownTool(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Read(_) => "Read",
            Self::Glob(_) => "Glob",
            Self::Grep(_) => "Grep",
        }
    }
}

/// Runs tool requests against one project root.
#[derive(Debug, Clone)]
pub struct ToolExecutor {
    sandbox: Sandbox,
    grep: GrepSearch,
}

impl ToolExecutor {
    pub fn new(sandbox: Sandbox) -> Self {
        Self {
            sandbox,
            grep: GrepSearch::new(),
        }
    }

    pub fn with_grep(mut self, grep: GrepSearch) -> Self {
        self.grep = grep;
        self
    }

    pub fn sandbox(&self) -> &Sandbox {
        &self.sandbox
    }

    /// Execute a request. Failures are returned as `Error: ...` strings.
    pub async fn execute(&self, request: &ToolRequest) -> String {
        match request {
            ToolRequest::Read(args) => read_file(&self.sandbox, &args.relative_path).await,
            ToolRequest::Glob(args) => glob_files(&self.sandbox, &args.pattern).await,
            ToolRequest::Grep(args) => {
                let path = args.path.as_deref().unwrap_or(".");
                self.grep.search(&self.sandbox, &args.pattern, path).await
            }
        }
    }
}

/// Join `entries` one per line, keeping the first [`MAX_LISTED_ENTRIES`] and
/// noting how many `noun` were dropped.
pub(crate) fn truncate_entries(entries: Vec<String>, noun: &str) -> String {
    if entries.len() <= MAX_LISTED_ENTRIES {
        return entries.join("\n");
    }
    let dropped = entries.len() - MAX_LISTED_ENTRIES;
    format!(
        "{}\n... ({} more {} truncated)",
        entries[..MAX_LISTED_ENTRIES].join("\n"),
        dropped,
        noun
    )
}

/// Schemas sent with every chat completion.
pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        function(
            "Read",
            "Read the contents of a file.",
            json!({
                "type": "object",
                "properties": {
                    "relative_path": {
                        "type": "string",
                        "description": "The relative path to the file to read."
                    }
                },
                "required": ["relative_path"]
            }),
        ),
        function(
            "Glob",
            "Find files matching a glob pattern.",
            json!({
                "type": "object",
                "properties": {
                    "pattern": {
                        "type": "string",
                        "description": "The glob pattern to search for (e.g., '**/*.py')."
                    }
                },
                "required": ["pattern"]
            }),
        ),
        function(
            "Grep",
            "Search for a text pattern in files.",
            json!({
                "type": "object",
                "properties": {
                    "pattern": {
                        "type": "string",
                        "description": "The regex or text pattern to search for."
                    },
                    "path": {
                        "type": "string",
                        "description": "The path to search in, relative to the project root (default '.')."
                    }
                },
                "required": ["pattern"]
            }),
        ),
    ]
}

fn function(name: &'static str, description: &'static str, parameters: Value) -> ToolDefinition {
    ToolDefinition {
        tool_type: "function",
        function: FunctionDefinition {
            name,
            description,
            parameters,
        },
    }
}
