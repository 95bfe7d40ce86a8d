//! Minimal Ollama chat API client.
//!
//! This crate provides a focused client for Ollama's `/api/chat` endpoint
//! with:
//! - Non-streaming chat completions
//! - Tool calling support
//! - Forced JSON output format for structured responses

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

const DEFAULT_HOST: &str = "http://localhost:11434";
const DEFAULT_MODEL: &str = "qwen3:30b";

/// Errors that can occur when using the Ollama client.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Ollama API client.
#[derive(Clone)]
pub struct Ollama {
    client: reqwest::Client,
    host: String,
    model: String,
}

impl Ollama {
    /// Create a new client against the given host, e.g. `http://localhost:11434`.
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(300))
                .connect_timeout(std::time::Duration::from_secs(10))
                .build()
                .expect("Failed to build HTTP client"),
            host: host.into(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Create a client from the `OLLAMA_HOST` environment variable,
    /// falling back to `http://localhost:11434`.
    pub fn from_env() -> Self {
        let host = std::env::var("OLLAMA_HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
        Self::new(host)
    }

    /// Set the default model for this client.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// The default model this client sends requests to.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send a chat request and return the full response.
    pub async fn chat(&self, request: Request) -> Result<Response, Error> {
        let api_request = self.build_api_request(&request);
        let headers = self.build_headers();

        let response = self
            .client
            .post(format!("{}/api/chat", self.host))
            .headers(headers)
            .json(&api_request)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Api {
                status,
                message: body,
            });
        }

        response
            .json::<Response>()
            .await
            .map_err(|e| Error::Parse(e.to_string()))
    }

    fn build_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers
    }

    fn build_api_request(&self, request: &Request) -> ApiRequest {
        let model = request
            .model
            .clone()
            .unwrap_or_else(|| self.model.clone());

        ApiRequest {
            model,
            messages: request.messages.clone(),
            stream: false,
            tools: request.tools.clone(),
            format: request.format.clone(),
            options: request.options.clone(),
        }
    }
}

/// A chat request.
#[derive(Debug, Clone, Default)]
pub struct Request {
    /// Model override; the client default is used when `None`.
    pub model: Option<String>,

    /// Conversation messages, oldest first.
    pub messages: Vec<ChatMessage>,

    /// Tools the model may call.
    pub tools: Vec<Tool>,

    /// Output format constraint (`"json"` forces a JSON object response).
    pub format: Option<String>,

    /// Sampling options.
    pub options: Option<Options>,
}

impl Request {
    /// Create a request with the given messages.
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    /// Set a model override.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Prepend a system message.
    pub fn with_system(mut self, content: impl Into<String>) -> Self {
        self.messages.insert(0, ChatMessage::system(content));
        self
    }

    /// Set the available tools.
    pub fn with_tools(mut self, tools: Vec<Tool>) -> Self {
        self.tools = tools;
        self
    }

    /// Force the model to respond with a JSON object.
    pub fn with_json_format(mut self) -> Self {
        self.format = Some("json".to_string());
        self
    }

    /// Set sampling options.
    pub fn with_options(mut self, options: Options) -> Self {
        self.options = Some(options);
        self
    }
}

/// Sampling options forwarded to the model runtime.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Options {
    /// Sampling temperature.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Maximum tokens to generate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_predict: Option<u32>,
}

/// Role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A message on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,

    /// Tool calls requested by the assistant.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    /// Name of the tool that produced this message (tool role only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
}

impl ChatMessage {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_name: None,
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_name: None,
        }
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_name: None,
        }
    }

    /// Create a tool result message.
    pub fn tool(tool_name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_name: Some(tool_name.into()),
        }
    }
}

/// A tool call requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub function: FunctionCall,
}

/// The function invocation inside a tool call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: Value,
}

/// A tool definition shown to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    #[serde(rename = "type")]
    pub tool_type: String,
    pub function: FunctionDef,
}

impl Tool {
    /// Create a function tool from a name, description, and JSON schema.
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
    ) -> Self {
        Self {
            tool_type: "function".to_string(),
            function: FunctionDef {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

/// Function signature of a tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// Wire format of the request body.
#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<Options>,
}

/// A chat response.
#[derive(Debug, Clone, Deserialize)]
pub struct Response {
    /// The model that produced the response.
    #[serde(default)]
    pub model: String,

    /// The assistant message.
    pub message: ChatMessage,

    /// Whether generation finished.
    #[serde(default)]
    pub done: bool,

    /// Why generation stopped (e.g. `"stop"`).
    #[serde(default)]
    pub done_reason: Option<String>,

    /// Prompt tokens evaluated.
    #[serde(default)]
    pub prompt_eval_count: Option<u64>,

    /// Tokens generated.
    #[serde(default)]
    pub eval_count: Option<u64>,
}

impl Response {
    /// Tool calls requested by the assistant, if any.
    pub fn tool_calls(&self) -> &[ToolCall] {
        &self.message.tool_calls
    }

    /// Whether the assistant requested any tool calls.
    pub fn has_tool_calls(&self) -> bool {
        !self.message.tool_calls.is_empty()
    }
}
