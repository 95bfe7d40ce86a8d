//! Text-adventure engine with an AI Dungeon Master.
//!
//! This crate provides:
//! - A conversation transcript model with bounded history trimming
//! - An AI Dungeon Master agent with structured, validated output
//! - YAML campaign content with authoring validation
//! - Game mechanics tools (dice, combat, inventory, movement)
//! - Session persistence
//!
//! # Quick Start
//!
//! ```ignore
//! use dm_core::{DmAgent, GameDependencies, PlayerStats, WorldState};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let agent = DmAgent::new(ollama::Ollama::from_env());
//!     let mut deps = GameDependencies::freeform(
//!         PlayerStats::new("Thorin"),
//!         WorldState::new("a roadside tavern"),
//!     );
//!
//!     let result = agent.run_turn("I look around", &[], &mut deps).await?;
//!     println!("{}", result.output.narrative);
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod campaign;
pub mod character;
pub mod history;
pub mod llm;
pub mod models;
pub mod persist;
pub mod settings;
pub mod testing;
pub mod tools;
pub mod transcript;
pub mod validate;

// Primary public API
pub use agent::{DmAgent, DmConfig, DmError, TurnResult};
pub use campaign::{CampaignData, CampaignState, CampaignStore};
pub use character::{CharacterSheet, CharacterStore};
pub use history::{strip_retry_prompts, trim_history, DEFAULT_HISTORY_LIMIT};
pub use models::{GameDependencies, PlayerStats, TurnOutput, WorldState};
pub use persist::{list_saves, SavedSession};
pub use testing::{MockModel, MockReply};
pub use transcript::{MessagePart, TranscriptMessage};
pub use validate::{validate_campaign, ValidationReport, Violation, ViolationKind};
