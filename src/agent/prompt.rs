//! System prompt template for the analyst.

use std::path::Path;

/// Build the system prompt for a run rooted at `project_root`.
pub fn build_system_prompt(project_root: &Path) -> String {
    format!(
        "You are a senior software architect analyzing this codebase. \
Your working directory is: {project_root}\n\
You have access to tools to read files, search files, and find files.\n\
Use these tools to analyze the code based on the user's request. \
Output your final analysis as valid JSON only.",
        project_root = project_root.display()
    )
}
