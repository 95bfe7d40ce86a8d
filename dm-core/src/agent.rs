//! The AI Dungeon Master agent.
//!
//! `DmAgent` runs one player turn: it trims the conversation history, builds
//! instructions from the current game state, drives the tool loop against
//! the model, and validates the structured output, asking the model to retry
//! when validation fails.

use crate::history::{trim_history, DEFAULT_HISTORY_LIMIT};
use crate::llm::ChatModel;
use crate::models::{GameDependencies, TurnOutput};
use crate::settings::{infer_mode, ModelSettings};
use crate::tools::{execute_tool, DmTools};
use crate::transcript::{MessagePart, TranscriptMessage};
use ollama::{ChatMessage, Options, Request};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

/// Errors from the DM agent.
#[derive(Debug, Error)]
pub enum DmError {
    #[error("Model API error: {0}")]
    Api(#[from] ollama::Error),

    #[error("Model output still invalid after {attempts} attempts: {last_error}")]
    InvalidOutput { attempts: u32, last_error: String },
}

/// Configuration for the DM agent.
#[derive(Debug, Clone)]
pub struct DmConfig {
    /// Model override; the client default is used when `None`.
    pub model: Option<String>,

    /// Retry prompts allowed after a validation failure.
    pub retries: u32,

    /// History window passed to the model each turn.
    pub history_limit: usize,

    /// Fixed temperature; adaptive settings are used when `None`.
    pub temperature: Option<f32>,

    /// Extra instructions appended to the system prompt.
    pub custom_instructions: Option<String>,
}

impl Default for DmConfig {
    fn default() -> Self {
        Self {
            model: None,
            retries: 2,
            history_limit: DEFAULT_HISTORY_LIMIT,
            temperature: None,
            custom_instructions: None,
        }
    }
}

/// The result of one player turn.
#[derive(Debug)]
pub struct TurnResult {
    /// The validated structured output.
    pub output: TurnOutput,

    /// The full transcript after this interaction: the trimmed baseline plus
    /// every message the turn produced, retry artifacts included. Callers
    /// strip retries before persisting.
    pub messages: Vec<TranscriptMessage>,
}

/// The AI Dungeon Master.
pub struct DmAgent<M> {
    model: M,
    config: DmConfig,
}

impl<M: ChatModel> DmAgent<M> {
    /// Create an agent over a model backend.
    pub fn new(model: M) -> Self {
        Self {
            model,
            config: DmConfig::default(),
        }
    }

    /// Configure the agent.
    pub fn with_config(mut self, config: DmConfig) -> Self {
        self.config = config;
        self
    }

    /// The agent's configuration.
    pub fn config(&self) -> &DmConfig {
        &self.config
    }

    /// Run one player turn.
    ///
    /// `history` is the transcript from previous turns; it is trimmed to the
    /// configured window before the model sees it. Game state in `deps` is
    /// mutated by tool calls and by the final health value.
    pub async fn run_turn(
        &self,
        player_input: &str,
        history: &[TranscriptMessage],
        deps: &mut GameDependencies,
    ) -> Result<TurnResult, DmError> {
        debug!(model = self.model.model_name(), "running turn");
        let mut transcript = trim_history(history, self.config.history_limit);
        transcript.push(TranscriptMessage::user(player_input));

        let instructions = self.build_instructions(deps);
        let settings = self.settings_for(player_input, deps);
        let tools = if deps.campaign_data.is_some() {
            DmTools::all()
        } else {
            DmTools::freeform()
        };

        let mut attempts: u32 = 0;
        loop {
            let mut request = Request::new(to_wire(&transcript))
                .with_system(&instructions)
                .with_tools(tools.clone())
                .with_json_format()
                .with_options(Options {
                    temperature: Some(settings.temperature),
                    num_predict: Some(settings.max_tokens),
                });
            if let Some(ref model) = self.config.model {
                request = request.with_model(model);
            }

            let response = self.model.chat(request).await?;

            if response.has_tool_calls() {
                let mut call_parts = Vec::new();
                let mut return_parts = Vec::new();
                if !response.message.content.is_empty() {
                    call_parts.push(MessagePart::Text {
                        content: response.message.content.clone(),
                    });
                }
                for call in response.tool_calls() {
                    let call_id = Uuid::new_v4().to_string();
                    let name = call.function.name.clone();
                    let arguments = call.function.arguments.clone();
                    debug!(tool = %name, "executing tool call");

                    let result = match execute_tool(&name, &arguments, deps) {
                        Ok(output) => output,
                        Err(err) => {
                            warn!(tool = %name, error = %err, "tool call failed");
                            format!("Tool error: {err}")
                        }
                    };
                    call_parts.push(MessagePart::ToolCall {
                        call_id: call_id.clone(),
                        tool_name: name.clone(),
                        arguments,
                    });
                    return_parts.push(MessagePart::ToolReturn {
                        call_id,
                        tool_name: name,
                        content: result,
                    });
                }
                transcript.push(TranscriptMessage::new(call_parts));
                transcript.push(TranscriptMessage::new(return_parts));
                continue;
            }

            let content = response.message.content.clone();
            match parse_and_validate(&content) {
                Ok(output) => {
                    transcript.push(TranscriptMessage::assistant(content));
                    deps.player_stats.health = output.player_health;
                    return Ok(TurnResult {
                        output,
                        messages: transcript,
                    });
                }
                Err(reason) => {
                    attempts += 1;
                    warn!(attempt = attempts, %reason, "invalid model output");
                    if attempts > self.config.retries {
                        return Err(DmError::InvalidOutput {
                            attempts,
                            last_error: reason,
                        });
                    }
                    transcript.push(TranscriptMessage::assistant(content));
                    transcript.push(TranscriptMessage::retry(format!(
                        "Your previous response was invalid: {reason}. \
                         Respond again with a single valid JSON object."
                    )));
                }
            }
        }
    }

    fn settings_for(&self, player_input: &str, deps: &GameDependencies) -> ModelSettings {
        let mut settings = ModelSettings::adaptive(
            deps.player_stats.health,
            infer_mode(player_input),
            &deps.world_state,
        );
        if let Some(temperature) = self.config.temperature {
            settings.temperature = temperature;
        }
        settings
    }

    fn build_instructions(&self, deps: &GameDependencies) -> String {
        let mut prompt = String::new();
        prompt.push_str(include_str!("prompts/dm_base.txt"));

        let stats = &deps.player_stats;
        prompt.push_str("\n## Player Character\n");
        prompt.push_str(&format!("Name: {}\n", stats.name));
        prompt.push_str(&format!(
            "Health: {}/{} (level {})\n",
            stats.health, stats.max_health, stats.level
        ));
        if stats.inventory.is_empty() {
            prompt.push_str("Inventory: empty\n");
        } else {
            prompt.push_str(&format!("Inventory: {}\n", stats.inventory.join(", ")));
        }
        if stats.health < 20 {
            prompt.push_str(
                "The player is near death. The narrative must convey urgency.\n",
            );
        }

        let world = &deps.world_state;
        prompt.push_str("\n## World\n");
        prompt.push_str(&format!("Location: {}\n", world.location));
        prompt.push_str(&format!("Time of day: {}\n", world.time_of_day));
        if let Some(ref weather) = world.weather {
            prompt.push_str(&format!("Weather: {weather}\n"));
        }

        if let (Some(data), Some(state)) = (&deps.campaign_data, &deps.campaign_state) {
            prompt.push_str("\n## Campaign\n");
            prompt.push_str(&format!("Playing: {}\n", data.name));
            if let Ok(room) = data.current_room(state) {
                prompt.push_str(&format!(
                    "Current room: {} ({})\n",
                    room.name, room.id
                ));
            }
            prompt.push_str(
                "Use the campaign tools to inspect rooms, enemies, and treasure \
                 before narrating them.\n",
            );
        }

        if let Some(ref custom) = self.config.custom_instructions {
            prompt.push_str("\n## Additional Instructions\n");
            prompt.push_str(custom);
        }

        prompt
    }
}

/// Convert transcript messages to the wire format.
fn to_wire(transcript: &[TranscriptMessage]) -> Vec<ChatMessage> {
    let mut wire = Vec::new();
    for message in transcript {
        let mut text = String::new();
        let mut tool_calls = Vec::new();
        for part in &message.parts {
            match part {
                MessagePart::UserPrompt { content } => {
                    wire.push(ChatMessage::user(content.clone()));
                }
                MessagePart::SystemPrompt { content } => {
                    wire.push(ChatMessage::system(content.clone()));
                }
                MessagePart::RetryPrompt { content } => {
                    wire.push(ChatMessage::user(content.clone()));
                }
                MessagePart::Text { content } => {
                    if !text.is_empty() {
                        text.push('\n');
                    }
                    text.push_str(content);
                }
                MessagePart::ToolCall {
                    tool_name,
                    arguments,
                    ..
                } => {
                    tool_calls.push(ollama::ToolCall {
                        function: ollama::FunctionCall {
                            name: tool_name.clone(),
                            arguments: arguments.clone(),
                        },
                    });
                }
                MessagePart::ToolReturn {
                    tool_name, content, ..
                } => {
                    wire.push(ChatMessage::tool(tool_name.clone(), content.clone()));
                }
            }
        }
        if !text.is_empty() || !tool_calls.is_empty() {
            let mut assistant = ChatMessage::assistant(text);
            assistant.tool_calls = tool_calls;
            wire.push(assistant);
        }
    }
    wire
}

fn parse_and_validate(content: &str) -> Result<TurnOutput, String> {
    let output: TurnOutput =
        serde_json::from_str(content).map_err(|e| format!("not valid JSON: {e}"))?;
    output.validate().map_err(|e| e.to_string())?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::strip_retry_prompts;
    use crate::models::{PlayerStats, WorldState};
    use crate::testing::{MockModel, MockReply};
    use serde_json::json;

    fn deps() -> GameDependencies {
        GameDependencies::freeform(PlayerStats::new("Hero"), WorldState::new("a mossy cave"))
    }

    fn valid_output(health: i32) -> String {
        json!({
            "narrative": "The cave mouth yawns before you, dripping and dark, \
                          and something skitters deeper in the black.",
            "player_health": health,
            "dice_rolls": []
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_plain_turn() {
        let mock = MockModel::new(vec![MockReply::text(valid_output(95))]);
        let agent = DmAgent::new(mock);
        let mut deps = deps();

        let result = agent
            .run_turn("I enter the cave", &[], &mut deps)
            .await
            .expect("turn");

        assert_eq!(result.output.player_health, 95);
        assert_eq!(deps.player_stats.health, 95);
        // user prompt plus assistant reply
        assert_eq!(result.messages.len(), 2);
        assert!(result.messages[1].text_content().contains("cave mouth"));
    }

    #[tokio::test]
    async fn test_tool_loop_records_paired_messages() {
        let mock = MockModel::new(vec![
            MockReply::tool_call("roll_dice", json!({"sides": 20, "count": 1})),
            MockReply::text(valid_output(100)),
        ]);
        let agent = DmAgent::new(mock);
        let mut deps = deps();

        let result = agent
            .run_turn("I look for tracks", &[], &mut deps)
            .await
            .expect("turn");

        // user, tool call, tool return, assistant
        assert_eq!(result.messages.len(), 4);
        assert!(result.messages[1].has_tool_call());
        assert!(result.messages[2].has_tool_return());
        assert!(result.messages[2].answers_tool_calls_of(&result.messages[1]));
    }

    #[tokio::test]
    async fn test_tool_results_sent_back_to_model() {
        let mock = MockModel::new(vec![
            MockReply::tool_call("manage_inventory", json!({"action": "add", "item": "rope"})),
            MockReply::text(valid_output(100)),
        ]);
        let agent = DmAgent::new(mock);
        let mut deps = deps();

        agent
            .run_turn("I pick up the rope", &[], &mut deps)
            .await
            .expect("turn");

        assert_eq!(deps.player_stats.inventory, vec!["rope"]);

        let requests = agent.model.requests();
        assert_eq!(requests.len(), 2);
        let second = &requests[1];
        assert!(second
            .messages
            .iter()
            .any(|m| m.role == ollama::Role::Tool && m.content.contains("rope")));
    }

    #[tokio::test]
    async fn test_invalid_output_triggers_retry() {
        let mock = MockModel::new(vec![
            MockReply::text("this is not json"),
            MockReply::text(valid_output(90)),
        ]);
        let agent = DmAgent::new(mock);
        let mut deps = deps();

        let result = agent
            .run_turn("I press on", &[], &mut deps)
            .await
            .expect("turn");

        assert_eq!(result.output.player_health, 90);
        assert!(result.messages.iter().any(|m| m.has_retry_prompt()));

        // Persisting strips the retry artifacts.
        let persisted = strip_retry_prompts(&result.messages);
        assert!(persisted.iter().all(|m| !m.has_retry_prompt()));
    }

    #[tokio::test]
    async fn test_validation_failure_triggers_retry() {
        // Long enough narrative, but calm while health is critical.
        let calm = json!({
            "narrative": "You stroll along the riverbank admiring the wildflowers and the light.",
            "player_health": 5,
            "dice_rolls": []
        })
        .to_string();
        let urgent = json!({
            "narrative": "Blood loss blurs your vision; you are dying, and every step is desperate.",
            "player_health": 5,
            "dice_rolls": []
        })
        .to_string();

        let mock = MockModel::new(vec![MockReply::text(calm), MockReply::text(urgent)]);
        let agent = DmAgent::new(mock);
        let mut deps = deps();
        deps.player_stats.health = 8;

        let result = agent
            .run_turn("I stagger on", &[], &mut deps)
            .await
            .expect("turn");
        assert_eq!(result.output.player_health, 5);
        assert_eq!(agent.model.replies_used(), 2);
    }

    #[tokio::test]
    async fn test_stripped_baseline_keeps_retries_from_later_turns() {
        // Turn one fails validation once, so its transcript carries a retry
        // prompt. Seeding turn two with the stripped transcript must keep
        // that prompt out of what the model sees.
        let mock = MockModel::new(vec![
            MockReply::text("this is not json"),
            MockReply::text(valid_output(100)),
        ]);
        let agent = DmAgent::new(mock);
        let mut deps = deps();

        let result = agent
            .run_turn("I enter the cave", &[], &mut deps)
            .await
            .expect("turn one");
        assert!(result.messages.iter().any(|m| m.has_retry_prompt()));

        let baseline = strip_retry_prompts(&result.messages);

        let mock = MockModel::new(vec![MockReply::text(valid_output(100))]);
        let agent = DmAgent::new(mock);
        agent
            .run_turn("I press on", &baseline, &mut deps)
            .await
            .expect("turn two");

        let request = &agent.model.requests()[0];
        assert!(request
            .messages
            .iter()
            .all(|m| !m.content.contains("previous response was invalid")));
    }

    #[tokio::test]
    async fn test_unknown_tool_call_becomes_error_text() {
        let mock = MockModel::new(vec![
            MockReply::tool_call("summon_dragon", json!({})),
            MockReply::text(valid_output(100)),
        ]);
        let agent = DmAgent::new(mock);
        let mut deps = deps();

        let result = agent
            .run_turn("I read the scroll", &[], &mut deps)
            .await
            .expect("turn");

        // The failure goes back to the model as tool output, not up to the
        // caller.
        let returns = &result.messages[2];
        assert!(returns.has_tool_return());
        assert!(returns
            .parts
            .iter()
            .any(|p| matches!(p, MessagePart::ToolReturn { content, .. }
                if content.starts_with("Tool error:"))));
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let mock = MockModel::new(vec![
            MockReply::text("junk"),
            MockReply::text("more junk"),
            MockReply::text("still junk"),
        ]);
        let agent = DmAgent::new(mock);
        let mut deps = deps();

        let err = agent
            .run_turn("hello?", &[], &mut deps)
            .await
            .expect_err("should fail");
        assert!(matches!(err, DmError::InvalidOutput { attempts: 3, .. }));
    }

    #[tokio::test]
    async fn test_history_is_trimmed_before_the_model_sees_it() {
        let mock = MockModel::new(vec![MockReply::text(valid_output(100))]);
        let agent = DmAgent::new(mock).with_config(DmConfig {
            history_limit: 4,
            ..DmConfig::default()
        });
        let mut deps = deps();

        let history: Vec<TranscriptMessage> = (0..30)
            .map(|i| TranscriptMessage::user(format!("turn {i}")))
            .collect();

        agent
            .run_turn("now what?", &history, &mut deps)
            .await
            .expect("turn");

        let request = &agent.model.requests()[0];
        // system prompt, 4 history messages, and the new user prompt
        assert_eq!(request.messages.len(), 6);
        assert_eq!(request.messages[0].role, ollama::Role::System);
        assert_eq!(request.messages[1].content, "turn 26");
    }

    #[tokio::test]
    async fn test_instructions_reflect_state() {
        let mock = MockModel::new(vec![MockReply::text(valid_output(100))]);
        let agent = DmAgent::new(mock).with_config(DmConfig {
            custom_instructions: Some("Speak in a gravelly whisper.".to_string()),
            ..DmConfig::default()
        });
        let mut deps = deps();
        deps.player_stats.inventory.push("lantern".to_string());

        let instructions = agent.build_instructions(&deps);
        assert!(instructions.contains("Name: Hero"));
        assert!(instructions.contains("lantern"));
        assert!(instructions.contains("a mossy cave"));
        assert!(instructions.contains("gravelly whisper"));
    }
}
