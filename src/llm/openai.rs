//! OpenAI-compatible chat completions client (LM Studio, vLLM, proxies).

use async_trait::async_trait;
use reqwest::Client;

use super::{
    ChatCompletionRequest, ChatCompletionResponse, ChatMessage, LlmClient, LlmError,
    ToolDefinition,
};
use crate::config::Config;

pub struct OpenAiCompatibleClient {
    client: Client,
    api_key: String,
    completions_url: String,
}

impl OpenAiCompatibleClient {
    pub fn new(config: &Config) -> Result<Self, LlmError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            api_key: config.api_key.clone(),
            completions_url: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
        })
    }

    pub fn completions_url(&self) -> &str {
        &self.completions_url
    }
}

#[async_trait]
impl LlmClient for OpenAiCompatibleClient {
    async fn chat_completion(
        &self,
        model: &str,
        messages: &[ChatMessage],
        tools: &[ToolDefinition],
    ) -> Result<ChatCompletionResponse, LlmError> {
        let request = ChatCompletionRequest {
            model,
            messages,
            tools,
            tool_choice: "auto",
        };

        let response = self
            .client
            .post(&self.completions_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(LlmError::Status {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!("Full backend response: {}", body);

        Ok(serde_json::from_str(&body)?)
    }
}
