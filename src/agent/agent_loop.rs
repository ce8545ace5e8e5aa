//! Core agent loop implementation.

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use crate::config::Config;
use crate::llm::{ChatMessage, LlmClient, LlmError, OpenAiCompatibleClient, ToolCall, ToolDefinition};
use crate::tools::{tool_definitions, GrepSearch, Sandbox, SandboxError, ToolExecutor, ToolRequest};

use super::prompt::build_system_prompt;

/// Model round-trips allowed per analysis.
pub const MAX_TURNS: usize = 10;

const MAX_TURNS_MESSAGE: &str = "Analysis terminated: Max turns reached.";

#[derive(Debug, Error)]
pub enum AnalystError {
    #[error("invalid project root: {0}")]
    ProjectRoot(#[from] SandboxError),

    #[error("could not build model client: {0}")]
    Client(#[from] LlmError),
}

/// Codebase analyst bound to one project root.
///
/// Holds no per-run state: each `run_analysis` call owns its transcript.
pub struct Analyst {
    model: String,
    llm: Arc<dyn LlmClient>,
    tools: ToolExecutor,
    tool_schemas: Vec<ToolDefinition>,
}

impl Analyst {
    /// Create an analyst talking to the backend described by `config`.
    pub fn new(project_root: impl AsRef<Path>, config: &Config) -> Result<Self, AnalystError> {
        let llm = Arc::new(OpenAiCompatibleClient::new(config)?);
        Self::with_client(project_root, config.model.clone(), llm)
    }

    /// Create an analyst with an arbitrary backend.
    pub fn with_client(
        project_root: impl AsRef<Path>,
        model: String,
        llm: Arc<dyn LlmClient>,
    ) -> Result<Self, AnalystError> {
        let sandbox = Sandbox::new(project_root)?;
        Ok(Self {
            model,
            llm,
            tools: ToolExecutor::new(sandbox),
            tool_schemas: tool_definitions(),
        })
    }

    pub fn with_grep(mut self, grep: GrepSearch) -> Self {
        self.tools = self.tools.with_grep(grep);
        self
    }

    pub fn project_root(&self) -> &Path {
        self.tools.sandbox().root()
    }

    /// Run one analysis request to completion.
    ///
    /// Always returns a string: the model's final answer, or a description of
    /// why the run stopped.
    pub async fn run_analysis(&self, prompt: &str) -> String {
        tracing::info!("Starting analysis in {}", self.project_root().display());

        let mut messages = vec![
            ChatMessage::system(build_system_prompt(self.project_root())),
            ChatMessage::user(prompt),
        ];

        for turn in 1..=MAX_TURNS {
            tracing::debug!("Analyst turn {}/{}", turn, MAX_TURNS);

            let response = match self
                .llm
                .chat_completion(&self.model, &messages, &self.tool_schemas)
                .await
            {
                Ok(response) => response,
                Err(e) => {
                    tracing::error!("Model backend call failed: {}", e);
                    return format!("Error communicating with model backend: {}", e);
                }
            };

            let Some(choice) = response.choices.into_iter().next() else {
                return "Error: Received empty response from model backend (no choices returned)."
                    .to_string();
            };

            let message = choice.message;
            let tool_calls = message.pending_tool_calls().to_vec();
            let content = message.content.clone();
            messages.push(message);

            if tool_calls.is_empty() {
                tracing::info!("Analysis finished after {} turn(s)", turn);
                return content.unwrap_or_default();
            }

            for call in &tool_calls {
                let result = self.execute_tool_call(call).await;
                messages.push(ChatMessage::tool_result(&call.id, &call.function.name, result));
            }
        }

        tracing::warn!("Max turns ({}) reached without a final answer", MAX_TURNS);

        messages
            .last()
            .and_then(|m| m.content.clone())
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| MAX_TURNS_MESSAGE.to_string())
    }

    /// Execute a single tool call. Argument problems become the result.
    async fn execute_tool_call(&self, call: &ToolCall) -> String {
        match ToolRequest::parse(&call.function.name, &call.function.arguments) {
            Ok(request) => {
                tracing::info!(
                    "Calling tool: {} with args: {}",
                    request.name(),
                    call.function.arguments
                );
                self.tools.execute(&request).await
            }
            Err(e) => {
                tracing::warn!("Rejected tool call {}: {}", call.id, e);
                format!("Error: {}", e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatCompletionResponse, Choice, FunctionCall, Role};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replays canned responses and records every transcript it is sent.
    struct ScriptedClient {
        replies: Vec<Result<ChatCompletionResponse, u16>>,
        repeat_last: bool,
        requests: Mutex<Vec<(Vec<ChatMessage>, usize)>>,
    }

    impl ScriptedClient {
        fn new(replies: Vec<ChatCompletionResponse>) -> Arc<Self> {
            Arc::new(Self {
                replies: replies.into_iter().map(Ok).collect(),
                repeat_last: false,
                requests: Mutex::new(Vec::new()),
            })
        }

        fn forever(reply: ChatCompletionResponse) -> Arc<Self> {
            Arc::new(Self {
                replies: vec![Ok(reply)],
                repeat_last: true,
                requests: Mutex::new(Vec::new()),
            })
        }

        fn failing(status: u16) -> Arc<Self> {
            Arc::new(Self {
                replies: vec![Err(status)],
                repeat_last: false,
                requests: Mutex::new(Vec::new()),
            })
        }

        fn transcripts(&self) -> Vec<Vec<ChatMessage>> {
            self.requests.lock().unwrap().iter().map(|(m, _)| m.clone()).collect()
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedClient {
        async fn chat_completion(
            &self,
            _model: &str,
            messages: &[ChatMessage],
            tools: &[ToolDefinition],
        ) -> Result<ChatCompletionResponse, LlmError> {
            let mut requests = self.requests.lock().unwrap();
            let index = requests.len();
            requests.push((messages.to_vec(), tools.len()));

            let reply = self
                .replies
                .get(index)
                .or_else(|| self.repeat_last.then(|| self.replies.last()).flatten())
                .expect("script exhausted");
            match reply {
                Ok(response) => Ok(response.clone()),
                Err(status) => Err(LlmError::Status {
                    status: *status,
                    body: "boom".to_string(),
                }),
            }
        }
    }

    fn assistant(content: Option<&str>, calls: &[(&str, &str, &str)]) -> ChatCompletionResponse {
        let tool_calls = (!calls.is_empty()).then(|| {
            calls
                .iter()
                .map(|(id, name, args)| ToolCall {
                    id: id.to_string(),
                    call_type: "function".to_string(),
                    function: FunctionCall {
                        name: name.to_string(),
                        arguments: args.to_string(),
                    },
                })
                .collect()
        });
        ChatCompletionResponse {
            choices: vec![Choice {
                message: ChatMessage {
                    role: Role::Assistant,
                    content: content.map(str::to_string),
                    tool_calls,
                    tool_call_id: None,
                    name: None,
                },
                finish_reason: None,
            }],
        }
    }

    fn project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src/main.py"), "print('hello')\n").unwrap();
        std::fs::write(dir.path().join("empty.txt"), "").unwrap();
        dir
    }

    fn analyst(dir: &tempfile::TempDir, client: Arc<ScriptedClient>) -> Analyst {
        Analyst::with_client(dir.path(), "test-model".to_string(), client).unwrap()
    }

    #[tokio::test]
    async fn plain_answer_ends_the_run_after_one_round_trip() {
        let dir = project();
        let client = ScriptedClient::new(vec![assistant(Some("done"), &[])]);
        let result = analyst(&dir, client.clone()).run_analysis("Summarize").await;

        assert_eq!(result, "done");
        let requests = client.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);

        let (transcript, tool_count) = &requests[0];
        assert_eq!(*tool_count, 3);
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[0].role, Role::System);
        let root = dir.path().canonicalize().unwrap();
        assert!(transcript[0]
            .content
            .as_deref()
            .unwrap()
            .contains(&root.display().to_string()));
        assert_eq!(transcript[1], ChatMessage::user("Summarize"));
    }

    #[tokio::test]
    async fn missing_content_becomes_empty_answer() {
        let dir = project();
        let client = ScriptedClient::new(vec![assistant(None, &[])]);
        assert_eq!(analyst(&dir, client).run_analysis("x").await, "");
    }

    #[tokio::test]
    async fn tool_results_answer_each_call_in_order() {
        let dir = project();
        let client = ScriptedClient::new(vec![
            assistant(
                None,
                &[
                    ("call_1", "Read", r#"{"relative_path": "src/main.py"}"#),
                    ("call_2", "Glob", r#"{"pattern": "**/*.py"}"#),
                    ("call_3", "Delete", r#"{"relative_path": "src/main.py"}"#),
                ],
            ),
            assistant(Some(r#"{"files": 1}"#), &[]),
        ]);
        let result = analyst(&dir, client.clone()).run_analysis("Count files").await;

        assert_eq!(result, r#"{"files": 1}"#);
        let transcripts = client.transcripts();
        assert_eq!(transcripts.len(), 2);

        let second = &transcripts[1];
        assert_eq!(second.len(), 6);
        assert_eq!(second[2].role, Role::Assistant);
        assert_eq!(second[2].pending_tool_calls().len(), 3);
        assert_eq!(
            second[3],
            ChatMessage::tool_result("call_1", "Read", "print('hello')\n")
        );
        assert_eq!(second[4], ChatMessage::tool_result("call_2", "Glob", "src/main.py"));
        assert_eq!(
            second[5],
            ChatMessage::tool_result("call_3", "Delete", "Error: Unknown tool Delete")
        );
    }

    #[tokio::test]
    async fn malformed_arguments_are_reported_and_the_run_continues() {
        let dir = project();
        let client = ScriptedClient::new(vec![
            assistant(None, &[("call_bad", "Grep", "{not valid json")]),
            assistant(Some("recovered"), &[]),
        ]);
        let result = analyst(&dir, client.clone()).run_analysis("Find TODOs").await;

        assert_eq!(result, "recovered");
        let transcripts = client.transcripts();
        assert_eq!(transcripts.len(), 2);

        let tool_msg = transcripts[1].last().unwrap();
        assert_eq!(tool_msg.role, Role::Tool);
        assert_eq!(tool_msg.tool_call_id.as_deref(), Some("call_bad"));
        assert!(tool_msg
            .content
            .as_deref()
            .unwrap()
            .starts_with("Error: Invalid JSON arguments for Grep"));
    }

    #[tokio::test]
    async fn sandbox_denials_reach_the_model() {
        let dir = project();
        let client = ScriptedClient::new(vec![
            assistant(None, &[("c1", "Read", r#"{"relative_path": "../../etc/passwd"}"#)]),
            assistant(Some("ok"), &[]),
        ]);
        analyst(&dir, client.clone()).run_analysis("x").await;

        let transcripts = client.transcripts();
        assert_eq!(
            transcripts[1].last().unwrap().content.as_deref(),
            Some("Error: Access denied (path outside project directory)")
        );
    }

    #[tokio::test]
    async fn never_exceeds_turn_budget() {
        let dir = project();
        let client = ScriptedClient::forever(assistant(
            None,
            &[("loop", "Glob", r#"{"pattern": "**/*.rs"}"#)],
        ));
        let result = analyst(&dir, client.clone()).run_analysis("Loop forever").await;

        assert_eq!(client.requests.lock().unwrap().len(), MAX_TURNS);
        // The last transcript entry is the final tool result.
        assert_eq!(result, "No files found matching the pattern.");
    }

    #[tokio::test]
    async fn exhausted_budget_with_empty_content_uses_sentinel() {
        let dir = project();
        let client = ScriptedClient::forever(assistant(
            None,
            &[("loop", "Read", r#"{"relative_path": "empty.txt"}"#)],
        ));
        let result = analyst(&dir, client.clone()).run_analysis("x").await;

        assert_eq!(client.requests.lock().unwrap().len(), MAX_TURNS);
        assert_eq!(result, "Analysis terminated: Max turns reached.");
    }

    #[tokio::test]
    async fn backend_failure_ends_the_run() {
        let dir = project();
        let client = ScriptedClient::failing(500);
        let result = analyst(&dir, client.clone()).run_analysis("x").await;

        assert_eq!(
            result,
            "Error communicating with model backend: backend returned HTTP 500: boom"
        );
        assert_eq!(client.requests.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn empty_choices_end_the_run() {
        let dir = project();
        let client = ScriptedClient::new(vec![ChatCompletionResponse { choices: vec![] }]);
        let result = analyst(&dir, client).run_analysis("x").await;

        assert_eq!(
            result,
            "Error: Received empty response from model backend (no choices returned)."
        );
    }

    #[test]
    fn rejects_missing_project_root() {
        let client = ScriptedClient::new(vec![]);
        let err = Analyst::with_client("/definitely/not/here", "m".to_string(), client)
            .err()
            .expect("missing root should fail");
        assert!(matches!(err, AnalystError::ProjectRoot(_)));
    }
}
