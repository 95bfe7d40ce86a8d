//! Adaptive model sampling settings.
//!
//! The DM reads better when its sampling parameters follow the fiction:
//! combat and near-death scenes want tight, focused output, while social
//! scenes can afford more temperature. Settings are recomputed every turn
//! from player health, the current game mode, and the world state.

use crate::models::WorldState;
use serde::{Deserialize, Serialize};

const MIN_TEMPERATURE: f32 = 0.1;
const MAX_TEMPERATURE: f32 = 1.0;
const MIN_TOKENS: u32 = 200;
const MAX_TOKENS: u32 = 2000;

/// Location keywords that tighten the tone.
const TENSE_KEYWORDS: &[&str] = &["dungeon", "cave", "crypt", "tomb", "dark", "ruin"];

/// Location keywords that loosen it.
const RELAXED_KEYWORDS: &[&str] = &["tavern", "inn", "market", "town", "village", "festival"];

/// Weather that narrows the scene.
const FOUL_WEATHER: &[&str] = &["storm", "blizzard", "fog"];

/// Weather that opens it up.
const FAIR_WEATHER: &[&str] = &["clear", "sunny", "pleasant"];

/// Broad phase of play, used to bias sampling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    /// Wandering, examining, traveling.
    #[default]
    Exploration,
    /// Initiative is rolled and blows are traded.
    Combat,
    /// Incantations and magical effects.
    SpellCasting,
    /// Disarming, triggering, or picking at mechanisms.
    TrapInteraction,
    /// Talking to NPCs.
    Social,
    /// Riddles and logical problems.
    Puzzle,
}

/// Sampling parameters sent with each model request.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelSettings {
    /// Sampling temperature.
    pub temperature: f32,

    /// Output token cap.
    pub max_tokens: u32,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 800,
        }
    }
}

impl ModelSettings {
    /// Compute settings for the current game situation.
    ///
    /// Starts from the defaults, then applies health, mode, and environment
    /// adjustments in that order and clamps the result.
    pub fn adaptive(player_health: i32, mode: GameMode, world: &WorldState) -> Self {
        let mut settings = Self::default();

        // Near death: keep the model focused and the scene tight.
        if player_health < 20 {
            settings.temperature -= 0.2;
            settings.max_tokens = 600;
        } else if player_health < 50 {
            settings.temperature -= 0.1;
        }

        match mode {
            GameMode::Exploration => {}
            GameMode::Combat => {
                settings.temperature -= 0.1;
                settings.max_tokens = settings.max_tokens.min(600);
            }
            GameMode::SpellCasting => {
                settings.temperature += 0.05;
            }
            GameMode::TrapInteraction => {
                settings.temperature -= 0.15;
                settings.max_tokens = settings.max_tokens.min(800);
            }
            GameMode::Social => {
                settings.temperature += 0.1;
            }
            GameMode::Puzzle => {
                settings.temperature -= 0.2;
            }
        }

        let location = world.location.to_lowercase();
        if TENSE_KEYWORDS.iter().any(|k| location.contains(k)) {
            settings.temperature -= 0.05;
        } else if RELAXED_KEYWORDS.iter().any(|k| location.contains(k)) {
            settings.temperature += 0.05;
        }

        // Night scenes get a little more atmosphere and room for it.
        if matches!(world.time_of_day.as_str(), "night" | "evening") {
            settings.temperature += 0.1;
            settings.max_tokens += 200;
        }

        if let Some(ref weather) = world.weather {
            let weather = weather.to_lowercase();
            if FOUL_WEATHER.iter().any(|k| weather.contains(k)) {
                settings.temperature -= 0.1;
            } else if FAIR_WEATHER.iter().any(|k| weather.contains(k)) {
                settings.temperature += 0.05;
            }
        }

        settings.clamped()
    }

    fn clamped(mut self) -> Self {
        self.temperature = self.temperature.clamp(MIN_TEMPERATURE, MAX_TEMPERATURE);
        self.max_tokens = self.max_tokens.clamp(MIN_TOKENS, MAX_TOKENS);
        self
    }
}

/// Guess the game mode from a player's input text.
///
/// A rough keyword heuristic; the model narrates fine either way, this only
/// biases sampling.
pub fn infer_mode(input: &str) -> GameMode {
    let lower = input.to_lowercase();
    const COMBAT: &[&str] = &["attack", "fight", "strike", "shoot", "stab", "swing", "charge"];
    const SPELL: &[&str] = &["cast", "spell", "incant", "scroll", "ritual"];
    const TRAP: &[&str] = &["trap", "disarm", "tripwire", "pressure plate", "mechanism"];
    const SOCIAL: &[&str] = &["talk", "ask", "persuade", "say", "greet", "bargain"];
    const PUZZLE: &[&str] = &["solve", "riddle", "decipher", "unlock", "examine", "inspect"];

    if COMBAT.iter().any(|k| lower.contains(k)) {
        GameMode::Combat
    } else if SPELL.iter().any(|k| lower.contains(k)) {
        GameMode::SpellCasting
    } else if TRAP.iter().any(|k| lower.contains(k)) {
        GameMode::TrapInteraction
    } else if SOCIAL.iter().any(|k| lower.contains(k)) {
        GameMode::Social
    } else if PUZZLE.iter().any(|k| lower.contains(k)) {
        GameMode::Puzzle
    } else {
        GameMode::Exploration
    }
}
