//! Transcript types for DM conversations.
//!
//! A transcript is the ordered sequence of messages exchanged with the model
//! during play. Each message is a bag of typed parts; tool calls and tool
//! returns carry a call id so that a return can be matched to the call that
//! produced it.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A typed fragment of a transcript message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "part_kind", rename_all = "snake_case")]
pub enum MessagePart {
    /// Player input.
    UserPrompt {
        /// The prompt text
        content: String,
    },

    /// System instructions recorded alongside the turn they were sent with.
    SystemPrompt {
        /// The instruction text
        content: String,
    },

    /// Narrative text produced by the model.
    Text {
        /// The response text
        content: String,
    },

    /// A tool invocation requested by the model.
    ToolCall {
        /// Id pairing this call with its return
        call_id: String,
        /// Name of the tool being invoked
        tool_name: String,
        /// Input arguments as JSON
        arguments: Value,
    },

    /// The result of a tool invocation.
    ToolReturn {
        /// Id of the tool call this answers
        call_id: String,
        /// Name of the tool that ran
        tool_name: String,
        /// Result content
        content: String,
    },

    /// A validation-failure prompt asking the model to retry.
    ///
    /// Retry prompts exist only within a single in-progress interaction and
    /// must never be persisted into the baseline history for the next turn.
    RetryPrompt {
        /// Description of the validation failure
        content: String,
    },
}

impl MessagePart {
    /// Check if this is a tool call part.
    pub fn is_tool_call(&self) -> bool {
        matches!(self, MessagePart::ToolCall { .. })
    }

    /// Check if this is a tool return part.
    pub fn is_tool_return(&self) -> bool {
        matches!(self, MessagePart::ToolReturn { .. })
    }

    /// Check if this is a retry prompt part.
    pub fn is_retry_prompt(&self) -> bool {
        matches!(self, MessagePart::RetryPrompt { .. })
    }

    /// Get the text content of user/system/text/retry parts.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessagePart::UserPrompt { content }
            | MessagePart::SystemPrompt { content }
            | MessagePart::Text { content }
            | MessagePart::RetryPrompt { content } => Some(content),
            _ => None,
        }
    }
}

/// A message in a DM conversation transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptMessage {
    /// Ordered typed fragments making up the message.
    pub parts: Vec<MessagePart>,
}

impl TranscriptMessage {
    /// Create a message from parts.
    pub fn new(parts: Vec<MessagePart>) -> Self {
        Self { parts }
    }

    /// Create a user prompt message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(vec![MessagePart::UserPrompt {
            content: content.into(),
        }])
    }

    /// Create an assistant text message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(vec![MessagePart::Text {
            content: content.into(),
        }])
    }

    /// Create a system prompt message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(vec![MessagePart::SystemPrompt {
            content: content.into(),
        }])
    }

    /// Create a tool return message.
    pub fn tool_return(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self::new(vec![MessagePart::ToolReturn {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            content: content.into(),
        }])
    }

    /// Create a retry prompt message.
    pub fn retry(content: impl Into<String>) -> Self {
        Self::new(vec![MessagePart::RetryPrompt {
            content: content.into(),
        }])
    }

    /// Check if this message contains any tool call parts.
    pub fn has_tool_call(&self) -> bool {
        self.parts.iter().any(|p| p.is_tool_call())
    }

    /// Check if this message contains any tool return parts.
    pub fn has_tool_return(&self) -> bool {
        self.parts.iter().any(|p| p.is_tool_return())
    }

    /// Check if this message contains any retry prompt parts.
    pub fn has_retry_prompt(&self) -> bool {
        self.parts.iter().any(|p| p.is_retry_prompt())
    }

    /// Call ids of all tool call parts in this message.
    pub fn tool_call_ids(&self) -> Vec<&str> {
        self.parts
            .iter()
            .filter_map(|p| match p {
                MessagePart::ToolCall { call_id, .. } => Some(call_id.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Call ids of all tool return parts in this message.
    pub fn tool_return_ids(&self) -> Vec<&str> {
        self.parts
            .iter()
            .filter_map(|p| match p {
                MessagePart::ToolReturn { call_id, .. } => Some(call_id.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Check whether `candidate` contains a tool call matching one of this
    /// message's tool returns. Used to decide whether the message preceding a
    /// tool-return message is its pairing partner.
    pub fn answers_tool_calls_of(&self, candidate: &TranscriptMessage) -> bool {
        let returns = self.tool_return_ids();
        if returns.is_empty() {
            return false;
        }
        candidate
            .tool_call_ids()
            .iter()
            .any(|id| returns.contains(id))
    }

    /// Get all text content concatenated.
    pub fn text_content(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| p.as_text())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for TranscriptMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.text_content())
    }
}
