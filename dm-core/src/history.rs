//! Conversation history maintenance.
//!
//! Two pure functions keep the transcript usable across long campaigns:
//!
//! - [`trim_history`] bounds how many messages are replayed to the model,
//!   while guaranteeing that a tool return is never separated from the tool
//!   call that produced it.
//! - [`strip_retry_prompts`] removes validation-retry artifacts from a
//!   finished interaction before the transcript is persisted as the baseline
//!   for the next turn.
//!
//! Trimming is safe to apply at any point of an interaction; stripping must
//! only run on a completed transcript, otherwise the result can end on the
//! wrong role for the calling protocol.

use crate::transcript::{MessagePart, TranscriptMessage};
use std::collections::VecDeque;

/// Default sliding window applied before each model call.
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Bound `messages` to a suffix of at most `limit` messages, keeping tool
/// call/return pairs together.
///
/// Scans from the most recent message backwards, accumulating until `limit`
/// is reached. When the scan lands on a message carrying a tool return whose
/// matching tool call sits in the immediately preceding message, that
/// predecessor is included unconditionally, so the result may exceed `limit`
/// by one message. The result is always a contiguous, order-preserving
/// suffix of the input.
///
/// A tool return with no matching predecessor is not a pair and is subject
/// to the plain length rule alone.
pub fn trim_history(messages: &[TranscriptMessage], limit: usize) -> Vec<TranscriptMessage> {
    if messages.len() <= limit {
        return messages.to_vec();
    }

    let mut kept: VecDeque<TranscriptMessage> = VecDeque::with_capacity(limit + 1);
    let mut idx = messages.len();

    while idx > 0 && kept.len() < limit {
        idx -= 1;
        let message = &messages[idx];
        kept.push_front(message.clone());

        // A tool return travels with the call that produced it, even when
        // that pushes the window past the limit.
        if message.has_tool_return()
            && idx > 0
            && message.answers_tool_calls_of(&messages[idx - 1])
        {
            idx -= 1;
            kept.push_front(messages[idx].clone());
        }
    }

    kept.into()
}

/// Trim to the default window of [`DEFAULT_HISTORY_LIMIT`] messages.
pub fn trim_history_default(messages: &[TranscriptMessage]) -> Vec<TranscriptMessage> {
    trim_history(messages, DEFAULT_HISTORY_LIMIT)
}

/// Remove every message containing a retry prompt part.
///
/// Retry prompts are self-contained validation-failure artifacts, not tool
/// pairs, so they are safe to delete unilaterally. Relative order of the
/// remaining messages is preserved and the function is idempotent.
pub fn strip_retry_prompts(messages: &[TranscriptMessage]) -> Vec<TranscriptMessage> {
    messages
        .iter()
        .filter(|m| !m.has_retry_prompt())
        .cloned()
        .collect()
}

/// Collapse messages beyond the window into a single summary message.
///
/// When `messages` exceeds `limit`, the dropped prefix is replaced by one
/// synthetic user message carrying a plain-text digest, followed by the last
/// `limit` messages unchanged (result length `limit + 1`). Shorter inputs
/// are returned as-is.
pub fn summarize_old_messages(
    messages: &[TranscriptMessage],
    limit: usize,
) -> Vec<TranscriptMessage> {
    if messages.len() <= limit {
        return messages.to_vec();
    }

    let cut = messages.len() - limit;
    let mut digest = String::from("Summary of previous conversation:\n");
    for message in &messages[..cut] {
        let text = message.text_content();
        if !text.is_empty() {
            digest.push_str("- ");
            // Keep the digest bounded regardless of message size.
            if text.chars().count() > 200 {
                digest.extend(text.chars().take(200));
                digest.push_str("...");
            } else {
                digest.push_str(&text);
            }
            digest.push('\n');
        }
    }

    let mut result = Vec::with_capacity(limit + 1);
    result.push(TranscriptMessage::user(digest));
    result.extend_from_slice(&messages[cut..]);
    result
}
