//! Chat model abstraction for answer and suggestion generation.

mod openai;

pub use openai::OpenAIChat;

use crate::error::Result;
use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

/// A lazy sequence of text increments from a streaming model call.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Trait for chat completion implementations.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Generate a complete response for a prompt. Missing or non-text
    /// output is returned as an empty string; policy for that case belongs
    /// to the caller.
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Generate a response as a stream of text increments, in generation
    /// order. The stream ends when the provider signals completion or
    /// failure.
    async fn stream(&self, prompt: &str) -> Result<TokenStream>;
}
