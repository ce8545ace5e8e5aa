//! Agent module - the tool-use control loop.
//!
//! The agent follows a "tools in a loop" pattern:
//! 1. Seed the transcript with the system prompt and the analysis request
//! 2. Call the model with the three tool schemas
//! 3. If the model requests tool calls, run them and feed the results back
//! 4. Repeat until the model answers in plain text or the turn budget runs out

mod agent_loop;
mod prompt;

pub use agent_loop::{Analyst, AnalystError, MAX_TURNS};
pub use prompt::build_system_prompt;
