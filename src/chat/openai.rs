//! OpenAI chat completion implementation.

use super::{ChatModel, TokenStream};
use crate::error::{Result, SvarError};
use crate::openai::create_client;
use async_openai::types::{
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequest,
    CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use futures::StreamExt;
use tracing::{debug, instrument};

/// OpenAI-based chat model.
pub struct OpenAIChat {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
    max_tokens: u32,
}

impl OpenAIChat {
    /// Create a new chat model with custom model name and answer budget.
    pub fn with_config(model: &str, max_tokens: u32) -> Self {
        Self {
            client: create_client(),
            model: model.to_string(),
            max_tokens,
        }
    }

    fn build_request(&self, prompt: &str) -> Result<CreateChatCompletionRequest> {
        let message = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()
            .map_err(|e| SvarError::Answer(e.to_string()))?;

        CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .max_tokens(self.max_tokens)
            .messages([message.into()])
            .build()
            .map_err(|e| SvarError::Answer(e.to_string()))
    }
}

#[async_trait]
impl ChatModel for OpenAIChat {
    #[instrument(skip(self, prompt), fields(model = %self.model))]
    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = self.build_request(prompt)?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| SvarError::OpenAI(format!("Chat API error: {}", e)))?;

        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        debug!("Completed response ({} chars)", text.len());
        Ok(text)
    }

    #[instrument(skip(self, prompt), fields(model = %self.model))]
    async fn stream(&self, prompt: &str) -> Result<TokenStream> {
        let request = self.build_request(prompt)?;

        let stream = self
            .client
            .chat()
            .create_stream(request)
            .await
            .map_err(|e| SvarError::OpenAI(format!("Chat API error: {}", e)))?;

        let deltas = stream.filter_map(|item| async move {
            match item {
                Ok(response) => response
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|c| c.delta.content)
                    .filter(|delta| !delta.is_empty())
                    .map(Ok),
                Err(e) => Some(Err(SvarError::OpenAI(format!("Stream error: {}", e)))),
            }
        });

        Ok(Box::pin(deltas))
    }
}
