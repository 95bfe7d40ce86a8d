//! Testing utilities for the DM engine.
//!
//! `MockModel` answers chat requests from a script, letting agent tests run
//! deterministically without a model server.

use crate::llm::ChatModel;
use async_trait::async_trait;
use ollama::{ChatMessage, Error, FunctionCall, Request, Response, ToolCall};
use serde_json::Value;
use std::sync::Mutex;

/// A scripted reply for [`MockModel`].
#[derive(Debug, Clone)]
pub enum MockReply {
    /// Plain assistant text.
    Text(String),
    /// A batch of tool calls, as (tool name, arguments) pairs.
    ToolCalls(Vec<(String, Value)>),
}

impl MockReply {
    /// Create a text reply.
    pub fn text(content: impl Into<String>) -> Self {
        MockReply::Text(content.into())
    }

    /// Create a single tool call reply.
    pub fn tool_call(name: impl Into<String>, arguments: Value) -> Self {
        MockReply::ToolCalls(vec![(name.into(), arguments)])
    }
}

/// A mock model that returns scripted replies in order.
///
/// Every request it receives is recorded so tests can assert on what the
/// agent actually sent.
pub struct MockModel {
    replies: Vec<MockReply>,
    state: Mutex<MockState>,
}

struct MockState {
    next: usize,
    requests: Vec<Request>,
}

impl MockModel {
    /// Create a mock with scripted replies.
    pub fn new(replies: Vec<MockReply>) -> Self {
        Self {
            replies,
            state: Mutex::new(MockState {
                next: 0,
                requests: Vec::new(),
            }),
        }
    }

    /// Requests seen so far.
    pub fn requests(&self) -> Vec<Request> {
        self.state.lock().unwrap().requests.clone()
    }

    /// Number of replies consumed.
    pub fn replies_used(&self) -> usize {
        self.state.lock().unwrap().next
    }
}

#[async_trait]
impl ChatModel for MockModel {
    async fn chat(&self, request: Request) -> Result<Response, Error> {
        let mut state = self.state.lock().unwrap();
        state.requests.push(request);

        let reply = self
            .replies
            .get(state.next)
            .cloned()
            .unwrap_or_else(|| MockReply::text("The mock has no more scripted replies."));
        state.next += 1;

        let message = match reply {
            MockReply::Text(content) => ChatMessage::assistant(content),
            MockReply::ToolCalls(calls) => {
                let mut message = ChatMessage::assistant("");
                message.tool_calls = calls
                    .into_iter()
                    .map(|(name, arguments)| ToolCall {
                        function: FunctionCall { name, arguments },
                    })
                    .collect();
                message
            }
        };

        Ok(Response {
            model: "mock".to_string(),
            message,
            done: true,
            done_reason: Some("stop".to_string()),
            prompt_eval_count: None,
            eval_count: None,
        })
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_mock_replays_script_in_order() {
        let mock = MockModel::new(vec![
            MockReply::text("first"),
            MockReply::tool_call("roll_dice", json!({"sides": 20, "count": 1})),
        ]);

        let r1 = mock.chat(Request::default()).await.unwrap();
        assert_eq!(r1.message.content, "first");
        assert!(!r1.has_tool_calls());

        let r2 = mock.chat(Request::default()).await.unwrap();
        assert!(r2.has_tool_calls());
        assert_eq!(r2.tool_calls()[0].function.name, "roll_dice");

        let r3 = mock.chat(Request::default()).await.unwrap();
        assert!(r3.message.content.contains("no more scripted"));

        assert_eq!(mock.replies_used(), 3);
        assert_eq!(mock.requests().len(), 3);
    }
}
