//! Model abstraction for the DM agent.
//!
//! The agent talks to anything that can answer a chat request. In
//! production that is an [`ollama::Ollama`] client; in tests it is the
//! scripted model in [`crate::testing`].

use async_trait::async_trait;
use ollama::{Error, Ollama, Request, Response};

/// A chat-capable model backend.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Answer a chat request.
    async fn chat(&self, request: Request) -> Result<Response, Error>;

    /// Name of the underlying model, for logging.
    fn model_name(&self) -> &str;
}

#[async_trait]
impl ChatModel for Ollama {
    async fn chat(&self, request: Request) -> Result<Response, Error> {
        Ollama::chat(self, request).await
    }

    fn model_name(&self) -> &str {
        self.model()
    }
}
