//! Game state models and output validation.
//!
//! These are the structures the agent reads and writes each turn. The model
//! is asked for a structured [`TurnOutput`]; its `validate` method enforces
//! the same constraints the DM instructions describe, and a failure is what
//! triggers a retry prompt in the agent loop.

use crate::campaign::{CampaignData, CampaignState};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Words that count as conveying urgency in a low-health narrative.
const URGENCY_WORDS: &[&str] = &["danger", "critical", "urgent", "desperate", "dying"];

/// Validation failures for game state models.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        min: i64,
        max: i64,
        value: i64,
    },

    #[error("narrative must be at least 50 characters, got {0}")]
    NarrativeTooShort(usize),

    #[error("narrative must convey urgency when player health is below 20")]
    MissingUrgency,

    #[error("dice total {total} doesn't match sum of rolls {sum}")]
    DiceTotalMismatch { total: i32, sum: i32 },

    #[error("dice roll reports {count} dice but {actual} individual results")]
    DiceCountMismatch { count: u32, actual: usize },
}

fn check_range(
    field: &'static str,
    value: i64,
    min: i64,
    max: i64,
) -> Result<(), ValidationError> {
    if value < min || value > max {
        return Err(ValidationError::OutOfRange {
            field,
            min,
            max,
            value,
        });
    }
    Ok(())
}

/// Player character statistics and attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerStats {
    /// Character name.
    pub name: String,

    /// Current health points (0-100).
    pub health: i32,

    /// Maximum health points (1-100).
    #[serde(default = "default_max_health")]
    pub max_health: i32,

    /// Character level (1-20).
    #[serde(default = "default_level")]
    pub level: u8,

    /// Inventory items.
    #[serde(default)]
    pub inventory: Vec<String>,
}

fn default_max_health() -> i32 {
    100
}

fn default_level() -> u8 {
    1
}

impl PlayerStats {
    /// Create a fresh character with full health.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            health: 100,
            max_health: 100,
            level: 1,
            inventory: Vec::new(),
        }
    }

    /// Check field ranges.
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_range("health", self.health as i64, 0, 100)?;
        check_range("max_health", self.max_health as i64, 1, 100)?;
        check_range("level", self.level as i64, 1, 20)?;
        Ok(())
    }

    /// Health as a percentage of maximum.
    pub fn health_percent(&self) -> f32 {
        (self.health as f32 / self.max_health as f32) * 100.0
    }
}

/// Current state of the game world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldState {
    /// Current location description.
    pub location: String,

    /// Time of day (morning, afternoon, evening, night).
    #[serde(default = "default_time_of_day")]
    pub time_of_day: String,

    /// Weather conditions, if relevant.
    #[serde(default)]
    pub weather: Option<String>,
}

fn default_time_of_day() -> String {
    "afternoon".to_string()
}

impl WorldState {
    /// Create a world state at the given location.
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            time_of_day: default_time_of_day(),
            weather: None,
        }
    }
}

/// Record of a dice roll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceRoll {
    /// Number of sides on the die (2-100).
    pub sides: u32,

    /// Number of dice rolled (1-10).
    pub count: u32,

    /// Sum of all dice.
    pub total: i32,

    /// Individual die results.
    pub individual_rolls: Vec<i32>,
}

impl DiceRoll {
    /// Check ranges and that the total matches the individual results.
    pub fn validate(&self) -> Result<(), ValidationError> {
        check_range("sides", self.sides as i64, 2, 100)?;
        check_range("count", self.count as i64, 1, 10)?;

        if self.individual_rolls.len() != self.count as usize {
            return Err(ValidationError::DiceCountMismatch {
                count: self.count,
                actual: self.individual_rolls.len(),
            });
        }

        let sum: i32 = self.individual_rolls.iter().sum();
        if sum != self.total {
            return Err(ValidationError::DiceTotalMismatch {
                total: self.total,
                sum,
            });
        }
        Ok(())
    }
}

/// The structured output the model must produce each turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnOutput {
    /// Narrative description of the scene and action results.
    pub narrative: String,

    /// Player health after this turn (0-100).
    pub player_health: i32,

    /// All dice rolls that occurred this turn.
    #[serde(default)]
    pub dice_rolls: Vec<DiceRoll>,
}

impl TurnOutput {
    /// Validate the output the way the DM instructions demand it.
    ///
    /// Checks narrative length, health range, dice consistency, and that a
    /// near-death narrative actually sounds urgent.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let narrative_len = self.narrative.chars().count();
        if narrative_len < 50 {
            return Err(ValidationError::NarrativeTooShort(narrative_len));
        }

        check_range("player_health", self.player_health as i64, 0, 100)?;

        if self.player_health < 20 {
            let lower = self.narrative.to_lowercase();
            if !URGENCY_WORDS.iter().any(|w| lower.contains(w)) {
                return Err(ValidationError::MissingUrgency);
            }
        }

        for roll in &self.dice_rolls {
            roll.validate()?;
        }
        Ok(())
    }
}

/// State threaded through agent tools and prompt building.
///
/// Passed into and returned from each interaction explicitly; there is no
/// process-wide mutable game state.
#[derive(Debug, Clone)]
pub struct GameDependencies {
    /// Player character statistics.
    pub player_stats: PlayerStats,

    /// World state.
    pub world_state: WorldState,

    /// Loaded campaign content, if a campaign is being played.
    pub campaign_data: Option<CampaignData>,

    /// Dynamic campaign state, if a campaign is being played.
    pub campaign_state: Option<CampaignState>,
}

impl GameDependencies {
    /// Create dependencies for a freeform (campaign-less) adventure.
    pub fn freeform(player_stats: PlayerStats, world_state: WorldState) -> Self {
        Self {
            player_stats,
            world_state,
            campaign_data: None,
            campaign_state: None,
        }
    }

    /// Borrow campaign content and mutable state together, when present.
    pub fn campaign_mut(&mut self) -> Option<(&CampaignData, &mut CampaignState)> {
        match (&self.campaign_data, &mut self.campaign_state) {
            (Some(data), Some(state)) => Some((data, state)),
            _ => None,
        }
    }

    /// Create dependencies for a campaign adventure.
    pub fn with_campaign(
        player_stats: PlayerStats,
        world_state: WorldState,
        data: CampaignData,
        state: CampaignState,
    ) -> Self {
        Self {
            player_stats,
            world_state,
            campaign_data: Some(data),
            campaign_state: Some(state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn long_narrative() -> String {
        "The torch gutters as you step into a hall of moss-slick stone, \
         every footfall echoing into unseen depths."
            .to_string()
    }

    #[test]
    fn test_player_stats_valid() {
        let stats = PlayerStats {
            name: "Thorin".to_string(),
            health: 75,
            max_health: 100,
            level: 5,
            inventory: vec![],
        };
        assert!(stats.validate().is_ok());
    }

    #[test]
    fn test_player_stats_health_bounds() {
        let mut stats = PlayerStats::new("Test");
        stats.health = 150;
        assert!(matches!(
            stats.validate(),
            Err(ValidationError::OutOfRange { field: "health", .. })
        ));

        stats.health = -10;
        assert!(stats.validate().is_err());

        stats.health = 0;
        assert!(stats.validate().is_ok());
        stats.health = 100;
        assert!(stats.validate().is_ok());
    }

    #[test]
    fn test_player_stats_defaults() {
        let stats: PlayerStats = serde_json::from_str(r#"{"name": "Hero", "health": 50}"#).unwrap();
        assert_eq!(stats.max_health, 100);
        assert_eq!(stats.level, 1);
        assert!(stats.inventory.is_empty());
    }

    #[test]
    fn test_dice_roll_total_must_match() {
        let roll = DiceRoll {
            sides: 6,
            count: 2,
            total: 11,
            individual_rolls: vec![5, 5],
        };
        assert_eq!(
            roll.validate(),
            Err(ValidationError::DiceTotalMismatch { total: 11, sum: 10 })
        );
    }

    #[test]
    fn test_dice_roll_valid() {
        let roll = DiceRoll {
            sides: 20,
            count: 1,
            total: 17,
            individual_rolls: vec![17],
        };
        assert!(roll.validate().is_ok());
    }

    #[test]
    fn test_dice_roll_count_mismatch() {
        let roll = DiceRoll {
            sides: 6,
            count: 3,
            total: 4,
            individual_rolls: vec![4],
        };
        assert!(matches!(
            roll.validate(),
            Err(ValidationError::DiceCountMismatch { .. })
        ));
    }

    #[test]
    fn test_turn_output_narrative_too_short() {
        let output = TurnOutput {
            narrative: "You win.".to_string(),
            player_health: 90,
            dice_rolls: vec![],
        };
        assert!(matches!(
            output.validate(),
            Err(ValidationError::NarrativeTooShort(_))
        ));
    }

    #[test]
    fn test_turn_output_low_health_requires_urgency() {
        let calm = TurnOutput {
            narrative: long_narrative(),
            player_health: 10,
            dice_rolls: vec![],
        };
        assert_eq!(calm.validate(), Err(ValidationError::MissingUrgency));

        let urgent = TurnOutput {
            narrative: format!("{} You are in critical danger.", long_narrative()),
            player_health: 10,
            dice_rolls: vec![],
        };
        assert!(urgent.validate().is_ok());
    }

    #[test]
    fn test_turn_output_valid() {
        let output = TurnOutput {
            narrative: long_narrative(),
            player_health: 85,
            dice_rolls: vec![DiceRoll {
                sides: 20,
                count: 1,
                total: 12,
                individual_rolls: vec![12],
            }],
        };
        assert!(output.validate().is_ok());
    }

    #[test]
    fn test_turn_output_parses_model_json() {
        let raw = r#"{
            "narrative": "Green blood spatters the flagstones as the goblin reels back from your strike, shrieking.",
            "player_health": 85,
            "dice_rolls": [{"sides": 20, "count": 1, "total": 17, "individual_rolls": [17]}]
        }"#;
        let output: TurnOutput = serde_json::from_str(raw).unwrap();
        assert!(output.validate().is_ok());
        assert_eq!(output.dice_rolls.len(), 1);
    }

    #[test]
    fn test_health_percent() {
        let mut stats = PlayerStats::new("Hero");
        stats.health = 30;
        stats.max_health = 60;
        assert!((stats.health_percent() - 50.0).abs() < f32::EPSILON);
    }
}
