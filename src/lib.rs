//! # lm-analyst
//!
//! A codebase analysis agent for OpenAI-compatible model backends such as
//! LM Studio.
//!
//! The model inspects a project through three sandboxed tools (Read, Glob,
//! Grep) and answers with a JSON analysis.
//!
//! ## Architecture
//!
//! The agent follows the "tools in a loop" pattern:
//! 1. Seed a transcript with the system prompt and the analysis request
//! 2. Call the model with the fixed tool schemas
//! 3. Run any requested tools inside the project root, append the results
//! 4. Repeat until the model answers in plain text or 10 turns have passed
//!
//! Every failure below the caller boundary is turned into a string, so
//! [`Analyst::run_analysis`] always returns text.
//!
//! ## Example
//!
//! ```rust,ignore
//! use lm_analyst::{Analyst, Config};
//!
//! let config = Config::from_env()?;
//! let analyst = Analyst::new("/path/to/project", &config)?;
//! let json = analyst.run_analysis("List the main services and their entry points").await;
//! ```

pub mod agent;
pub mod config;
pub mod llm;
pub mod tools;

use std::path::Path;

pub use agent::{Analyst, AnalystError};
pub use config::Config;

/// Analyze `project_root` with a backend configured from the environment.
pub async fn analyze(project_root: impl AsRef<Path>, prompt: &str) -> String {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => return format!("Error: {}", e),
    };
    match Analyst::new(project_root, &config) {
        Ok(analyst) => analyst.run_analysis(prompt).await,
        Err(e) => format!("Error: {}", e),
    }
}
