//! Game mechanics tools for the AI Dungeon Master.
//!
//! Tool definitions are what the model sees; [`execute_tool`] is the
//! dispatcher that runs a call against [`GameDependencies`] and produces the
//! text fed back as the tool return. Bad arguments and rule violations (a
//! locked door, a missing item) come back as ordinary tool output so the
//! model can narrate around them instead of the turn failing.

use crate::models::GameDependencies;
use ollama::Tool;
use rand::Rng;
use serde_json::{json, Value};
use thiserror::Error;

/// Errors from tool dispatch.
///
/// Only raised for calls that cannot be answered at all. In-game failures
/// are reported as tool output, not errors.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    Unknown(String),

    #[error("Missing or invalid argument '{0}'")]
    BadArgument(&'static str),
}

/// Collection of tools offered to the DM model.
pub struct DmTools;

impl DmTools {
    /// All tools for a campaign game.
    pub fn all() -> Vec<Tool> {
        let mut tools = Self::freeform();
        tools.extend([
            Self::get_room_details(),
            Self::get_enemies_in_room(),
            Self::get_available_treasure(),
            Self::move_player(),
            Self::search_room(),
            Self::collect_treasure(),
        ]);
        tools
    }

    /// Tools for a freeform game with no campaign loaded.
    pub fn freeform() -> Vec<Tool> {
        vec![
            Self::roll_dice(),
            Self::calculate_damage(),
            Self::manage_inventory(),
            Self::update_health(),
        ]
    }

    fn roll_dice() -> Tool {
        Tool::function(
            "roll_dice",
            "Roll dice for checks, attacks, and damage. Returns each die result and the total.",
            json!({
                "type": "object",
                "properties": {
                    "sides": {
                        "type": "integer",
                        "minimum": 2,
                        "maximum": 100,
                        "description": "Number of sides on each die"
                    },
                    "count": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": 10,
                        "description": "Number of dice to roll"
                    },
                    "purpose": {
                        "type": "string",
                        "description": "What the roll is for (e.g. 'attack', 'saving throw')"
                    }
                },
                "required": ["sides", "count"]
            }),
        )
    }

    fn calculate_damage() -> Tool {
        Tool::function(
            "calculate_damage",
            "Resolve an attack: compare the attack roll to the target's armor class and, on a hit, roll weapon damage.",
            json!({
                "type": "object",
                "properties": {
                    "attack_roll": {
                        "type": "integer",
                        "description": "The attacker's d20 result including modifiers"
                    },
                    "armor_class": {
                        "type": "integer",
                        "description": "Armor class of the target"
                    },
                    "damage_sides": {
                        "type": "integer",
                        "minimum": 2,
                        "maximum": 100,
                        "description": "Sides on the weapon damage die (e.g. 8 for a longsword)"
                    },
                    "damage_count": {
                        "type": "integer",
                        "minimum": 1,
                        "maximum": 10,
                        "description": "Number of damage dice (default 1)"
                    }
                },
                "required": ["attack_roll", "armor_class", "damage_sides"]
            }),
        )
    }

    fn manage_inventory() -> Tool {
        Tool::function(
            "manage_inventory",
            "Add an item to, remove an item from, or list the player's inventory.",
            json!({
                "type": "object",
                "properties": {
                    "action": {
                        "type": "string",
                        "enum": ["add", "remove", "list"],
                        "description": "Inventory operation"
                    },
                    "item": {
                        "type": "string",
                        "description": "Item name (required for add and remove)"
                    }
                },
                "required": ["action"]
            }),
        )
    }

    fn update_health() -> Tool {
        Tool::function(
            "update_health",
            "Apply damage (negative) or healing (positive) to the player. Health is clamped between 0 and the player's maximum.",
            json!({
                "type": "object",
                "properties": {
                    "change": {
                        "type": "integer",
                        "description": "Health change: negative for damage, positive for healing"
                    },
                    "reason": {
                        "type": "string",
                        "description": "What caused the change"
                    }
                },
                "required": ["change"]
            }),
        )
    }

    fn get_room_details() -> Tool {
        Tool::function(
            "get_room_details",
            "Get the current room's description, visible exits, and features. Use this before narrating a new room.",
            json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        )
    }

    fn get_enemies_in_room() -> Tool {
        Tool::function(
            "get_enemies_in_room",
            "List living enemies in the current room with their stats.",
            json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        )
    }

    fn get_available_treasure() -> Tool {
        Tool::function(
            "get_available_treasure",
            "List treasure the player can currently take in this room.",
            json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        )
    }

    fn move_player() -> Tool {
        Tool::function(
            "move_player",
            "Move the player through an exit. Fails if the exit doesn't exist, hasn't been discovered, or is locked without the key.",
            json!({
                "type": "object",
                "properties": {
                    "direction": {
                        "type": "string",
                        "description": "Exit direction (north, south, east, west, up, down, ...)"
                    }
                },
                "required": ["direction"]
            }),
        )
    }

    fn search_room() -> Tool {
        Tool::function(
            "search_room",
            "Search the current room, revealing hidden exits and hidden treasure.",
            json!({
                "type": "object",
                "properties": {},
                "required": []
            }),
        )
    }

    fn collect_treasure() -> Tool {
        Tool::function(
            "collect_treasure",
            "Pick up a treasure in the current room by its id and add it to the player's inventory.",
            json!({
                "type": "object",
                "properties": {
                    "treasure_id": {
                        "type": "string",
                        "description": "Id of the treasure to collect"
                    }
                },
                "required": ["treasure_id"]
            }),
        )
    }
}

fn int_arg(args: &Value, name: &'static str) -> Result<i64, ToolError> {
    args[name].as_i64().ok_or(ToolError::BadArgument(name))
}

fn str_arg<'a>(args: &'a Value, name: &'static str) -> Result<&'a str, ToolError> {
    args[name].as_str().ok_or(ToolError::BadArgument(name))
}

fn roll(sides: i64, count: i64) -> (Vec<i64>, i64) {
    let mut rng = rand::thread_rng();
    let rolls: Vec<i64> = (0..count).map(|_| rng.gen_range(1..=sides)).collect();
    let total = rolls.iter().sum();
    (rolls, total)
}

/// Run a tool call against the game state, returning the tool output text.
pub fn execute_tool(
    name: &str,
    args: &Value,
    deps: &mut GameDependencies,
) -> Result<String, ToolError> {
    match name {
        "roll_dice" => {
            let sides = int_arg(args, "sides")?.clamp(2, 100);
            let count = int_arg(args, "count")?.clamp(1, 10);
            let (rolls, total) = roll(sides, count);
            Ok(format!(
                "Rolled {count}d{sides}: {rolls:?}, total {total}"
            ))
        }
        "calculate_damage" => {
            let attack_roll = int_arg(args, "attack_roll")?;
            let armor_class = int_arg(args, "armor_class")?;
            let damage_sides = int_arg(args, "damage_sides")?.clamp(2, 100);
            let damage_count = args["damage_count"].as_i64().unwrap_or(1).clamp(1, 10);

            if attack_roll < armor_class {
                return Ok(format!(
                    "Miss: attack roll {attack_roll} against armor class {armor_class}"
                ));
            }
            let (rolls, total) = roll(damage_sides, damage_count);
            Ok(format!(
                "Hit: attack roll {attack_roll} against armor class {armor_class}. \
                 Damage {damage_count}d{damage_sides}: {rolls:?}, total {total}"
            ))
        }
        "manage_inventory" => {
            let action = str_arg(args, "action")?;
            match action {
                "add" => {
                    let item = str_arg(args, "item")?;
                    deps.player_stats.inventory.push(item.to_string());
                    Ok(format!("Added '{item}' to inventory"))
                }
                "remove" => {
                    let item = str_arg(args, "item")?;
                    match deps.player_stats.inventory.iter().position(|i| i == item) {
                        Some(pos) => {
                            deps.player_stats.inventory.remove(pos);
                            Ok(format!("Removed '{item}' from inventory"))
                        }
                        None => Ok(format!("'{item}' is not in the inventory")),
                    }
                }
                "list" => {
                    if deps.player_stats.inventory.is_empty() {
                        Ok("Inventory is empty".to_string())
                    } else {
                        Ok(format!(
                            "Inventory: {}",
                            deps.player_stats.inventory.join(", ")
                        ))
                    }
                }
                _ => Err(ToolError::BadArgument("action")),
            }
        }
        "update_health" => {
            let change = int_arg(args, "change")? as i32;
            let stats = &mut deps.player_stats;
            stats.health = (stats.health + change).clamp(0, stats.max_health);
            Ok(format!(
                "Health changed by {change}; now {}/{}",
                stats.health, stats.max_health
            ))
        }
        "get_room_details" => with_campaign(deps, |data, state| {
            let room = match data.current_room(state) {
                Ok(room) => room,
                Err(_) => return format!("Unknown room: {}", state.current_room_id),
            };
            let exits: Vec<String> = data
                .visible_exits(&room.id, state)
                .into_iter()
                .map(|(direction, exit)| {
                    if exit.locked && !state.collected_treasure.contains(
                        exit.key_id.as_deref().unwrap_or(""),
                    ) {
                        format!("{direction} (locked)")
                    } else {
                        direction.to_string()
                    }
                })
                .collect();
            let mut details = format!("{}: {}", room.name, room.description);
            if let Some(terrain) = &room.terrain {
                details.push_str(&format!("\nTerrain: {terrain}"));
            }
            if !room.features.is_empty() {
                details.push_str(&format!("\nFeatures: {}", room.features.join(", ")));
            }
            if exits.is_empty() {
                details.push_str("\nNo visible exits");
            } else {
                details.push_str(&format!("\nExits: {}", exits.join(", ")));
            }
            details
        }),
        "get_enemies_in_room" => with_campaign(deps, |data, state| {
            let enemies = data.living_enemies_in(&state.current_room_id, state);
            if enemies.is_empty() {
                return "No enemies here".to_string();
            }
            enemies
                .iter()
                .map(|e| {
                    format!(
                        "{} ({}): {} hp, AC {}, THAC0 {}",
                        e.name, e.id, e.hit_points, e.armor_class, e.thac0
                    )
                })
                .collect::<Vec<_>>()
                .join("\n")
        }),
        "get_available_treasure" => with_campaign(deps, |data, state| {
            let treasure = data.available_treasure(&state.current_room_id, state);
            if treasure.is_empty() {
                return "No treasure available here".to_string();
            }
            treasure
                .iter()
                .map(|t| match t.value {
                    Some(value) => format!("{} ({}): worth {value} gold", t.name, t.id),
                    None => format!("{} ({})", t.name, t.id),
                })
                .collect::<Vec<_>>()
                .join("\n")
        }),
        "move_player" => {
            let direction = str_arg(args, "direction")?.to_lowercase();
            let Some((data, state)) = deps.campaign_mut() else {
                return Ok(NO_CAMPAIGN.to_string());
            };
            let Ok(room) = data.current_room(state) else {
                return Ok(format!("Unknown room: {}", state.current_room_id));
            };
            let Some(exit) = room.exits.get(&direction) else {
                return Ok(format!("There is no exit to the {direction}"));
            };
            if exit.hidden && !state.is_exit_discovered(&room.id, &direction) {
                return Ok(format!("There is no exit to the {direction}"));
            }
            if exit.locked {
                let has_key = exit
                    .key_id
                    .as_ref()
                    .map(|key| state.collected_treasure.contains(key))
                    .unwrap_or(false);
                if !has_key {
                    return Ok(format!("The way {direction} is locked"));
                }
            }
            let target = exit.target_room_id.clone();
            state.enter_room(target.clone());
            let name = data
                .room(&target)
                .map(|r| r.name.clone())
                .unwrap_or_else(|_| target.clone());
            Ok(format!("Moved {direction} to {name}"))
        }
        "search_room" => {
            let Some((data, state)) = deps.campaign_mut() else {
                return Ok(NO_CAMPAIGN.to_string());
            };
            let room_id = state.current_room_id.clone();
            state.mark_searched(room_id.clone());

            let mut found = Vec::new();
            if let Ok(room) = data.room(&room_id) {
                for (direction, exit) in &room.exits {
                    if exit.hidden && !state.is_exit_discovered(&room_id, direction) {
                        state.discover_exit(&room_id, direction);
                        found.push(format!("a hidden passage to the {direction}"));
                    }
                }
            }
            for treasure in data.available_treasure(&room_id, state) {
                if treasure.hidden {
                    found.push(format!("{} ({})", treasure.name, treasure.id));
                }
            }

            if found.is_empty() {
                Ok("You search the room and find nothing out of the ordinary".to_string())
            } else {
                Ok(format!("Searching reveals: {}", found.join(", ")))
            }
        }
        "collect_treasure" => {
            let treasure_id = str_arg(args, "treasure_id")?.to_string();
            let Some((data, state)) = deps.campaign_mut() else {
                return Ok(NO_CAMPAIGN.to_string());
            };
            let room_id = state.current_room_id.clone();
            let available = data
                .available_treasure(&room_id, state)
                .iter()
                .any(|t| t.id == treasure_id);
            if !available {
                return Ok(format!("There is no treasure '{treasure_id}' to take here"));
            }
            let name = data.initial_treasure[&treasure_id].name.clone();
            state.collect_treasure(treasure_id);
            deps.player_stats.inventory.push(name.clone());
            Ok(format!("Collected {name}"))
        }
        other => Err(ToolError::Unknown(other.to_string())),
    }
}

const NO_CAMPAIGN: &str = "No campaign is loaded";

fn with_campaign(
    deps: &GameDependencies,
    f: impl FnOnce(&crate::campaign::CampaignData, &crate::campaign::CampaignState) -> String,
) -> Result<String, ToolError> {
    match (&deps.campaign_data, &deps.campaign_state) {
        (Some(data), Some(state)) => Ok(f(data, state)),
        _ => Ok(NO_CAMPAIGN.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::campaign::CampaignData;
    use crate::models::{PlayerStats, WorldState};

    fn freeform_deps() -> GameDependencies {
        GameDependencies::freeform(PlayerStats::new("Hero"), WorldState::new("a dark cave"))
    }

    fn campaign_deps() -> GameDependencies {
        let data = CampaignData::from_yaml(crate::campaign::tests::SAMPLE_CAMPAIGN).unwrap();
        let state = data.initial_state();
        GameDependencies::with_campaign(
            PlayerStats::new("Hero"),
            WorldState::new("Crypt Entrance"),
            data,
            state,
        )
    }

    #[test]
    fn test_all_tools_have_schemas() {
        for tool in DmTools::all() {
            assert!(!tool.function.name.is_empty());
            assert!(!tool.function.description.is_empty());
            assert!(tool.function.parameters.get("type").is_some());
        }
        assert_eq!(DmTools::freeform().len(), 4);
        assert_eq!(DmTools::all().len(), 10);
    }

    #[test]
    fn test_roll_dice_within_bounds() {
        let mut deps = freeform_deps();
        for _ in 0..20 {
            let out = execute_tool("roll_dice", &json!({"sides": 6, "count": 2}), &mut deps)
                .expect("roll");
            assert!(out.starts_with("Rolled 2d6"));
        }
    }

    #[test]
    fn test_roll_dice_missing_args() {
        let mut deps = freeform_deps();
        assert!(matches!(
            execute_tool("roll_dice", &json!({"sides": 6}), &mut deps),
            Err(ToolError::BadArgument("count"))
        ));
    }

    #[test]
    fn test_calculate_damage_miss() {
        let mut deps = freeform_deps();
        let out = execute_tool(
            "calculate_damage",
            &json!({"attack_roll": 5, "armor_class": 15, "damage_sides": 8}),
            &mut deps,
        )
        .expect("calc");
        assert!(out.starts_with("Miss"));
    }

    #[test]
    fn test_calculate_damage_hit() {
        let mut deps = freeform_deps();
        let out = execute_tool(
            "calculate_damage",
            &json!({"attack_roll": 18, "armor_class": 12, "damage_sides": 8}),
            &mut deps,
        )
        .expect("calc");
        assert!(out.starts_with("Hit"));
    }

    #[test]
    fn test_inventory_add_remove_list() {
        let mut deps = freeform_deps();
        execute_tool(
            "manage_inventory",
            &json!({"action": "add", "item": "torch"}),
            &mut deps,
        )
        .expect("add");
        assert_eq!(deps.player_stats.inventory, vec!["torch"]);

        let listed = execute_tool("manage_inventory", &json!({"action": "list"}), &mut deps)
            .expect("list");
        assert!(listed.contains("torch"));

        execute_tool(
            "manage_inventory",
            &json!({"action": "remove", "item": "torch"}),
            &mut deps,
        )
        .expect("remove");
        assert!(deps.player_stats.inventory.is_empty());

        let gone = execute_tool(
            "manage_inventory",
            &json!({"action": "remove", "item": "torch"}),
            &mut deps,
        )
        .expect("remove again");
        assert!(gone.contains("not in the inventory"));
    }

    #[test]
    fn test_update_health_clamps() {
        let mut deps = freeform_deps();
        execute_tool("update_health", &json!({"change": -150}), &mut deps).expect("damage");
        assert_eq!(deps.player_stats.health, 0);

        execute_tool("update_health", &json!({"change": 500}), &mut deps).expect("heal");
        assert_eq!(deps.player_stats.health, 100);
    }

    #[test]
    fn test_campaign_tools_without_campaign() {
        let mut deps = freeform_deps();
        let out = execute_tool("get_room_details", &json!({}), &mut deps).expect("details");
        assert_eq!(out, NO_CAMPAIGN);
    }

    #[test]
    fn test_room_details() {
        let mut deps = campaign_deps();
        let out = execute_tool("get_room_details", &json!({}), &mut deps).expect("details");
        assert!(out.contains("Crypt Entrance"));
        assert!(out.contains("north"));
    }

    #[test]
    fn test_move_player_and_enemies() {
        let mut deps = campaign_deps();
        let out = execute_tool("move_player", &json!({"direction": "north"}), &mut deps)
            .expect("move");
        assert!(out.contains("Hall of Bones"));

        let enemies = execute_tool("get_enemies_in_room", &json!({}), &mut deps).expect("enemies");
        assert!(enemies.contains("Giant Rat"));
    }

    #[test]
    fn test_move_player_invalid_direction() {
        let mut deps = campaign_deps();
        let out = execute_tool("move_player", &json!({"direction": "west"}), &mut deps)
            .expect("move");
        assert!(out.contains("no exit"));
        assert_eq!(
            deps.campaign_state.as_ref().unwrap().current_room_id,
            "entrance"
        );
    }

    #[test]
    fn test_locked_exit_needs_key() {
        let mut deps = campaign_deps();
        execute_tool("move_player", &json!({"direction": "north"}), &mut deps).expect("to hall");

        let blocked = execute_tool("move_player", &json!({"direction": "east"}), &mut deps)
            .expect("blocked");
        assert!(blocked.contains("locked"));

        deps.campaign_state
            .as_mut()
            .unwrap()
            .collect_treasure("iron_key");
        let opened = execute_tool("move_player", &json!({"direction": "east"}), &mut deps)
            .expect("opened");
        assert!(opened.contains("Burial Vault"));
    }

    #[test]
    fn test_hidden_exit_requires_search() {
        let mut deps = campaign_deps();
        execute_tool("move_player", &json!({"direction": "north"}), &mut deps).expect("to hall");

        let hidden = execute_tool("move_player", &json!({"direction": "west"}), &mut deps)
            .expect("hidden");
        assert!(hidden.contains("no exit"));

        let search = execute_tool("search_room", &json!({}), &mut deps).expect("search");
        assert!(search.contains("hidden passage"));

        let moved = execute_tool("move_player", &json!({"direction": "west"}), &mut deps)
            .expect("moved");
        assert!(moved.contains("Crawlspace"));
    }

    #[test]
    fn test_collect_treasure_adds_to_inventory() {
        let mut deps = campaign_deps();
        execute_tool("move_player", &json!({"direction": "north"}), &mut deps).expect("to hall");
        execute_tool("search_room", &json!({}), &mut deps).expect("search");
        execute_tool("move_player", &json!({"direction": "west"}), &mut deps).expect("crawl");

        let out = execute_tool(
            "collect_treasure",
            &json!({"treasure_id": "iron_key"}),
            &mut deps,
        )
        .expect("collect");
        assert!(out.contains("Iron Key"));
        assert!(deps.player_stats.inventory.contains(&"Iron Key".to_string()));

        let again = execute_tool(
            "collect_treasure",
            &json!({"treasure_id": "iron_key"}),
            &mut deps,
        )
        .expect("collect again");
        assert!(again.contains("no treasure"));
    }

    #[test]
    fn test_gated_treasure_not_collectable() {
        let mut deps = campaign_deps();
        deps.campaign_state.as_mut().unwrap().enter_room("vault");

        let out = execute_tool(
            "collect_treasure",
            &json!({"treasure_id": "burial_crown"}),
            &mut deps,
        )
        .expect("gated");
        assert!(out.contains("no treasure"));
    }

    #[test]
    fn test_unknown_tool() {
        let mut deps = freeform_deps();
        assert!(matches!(
            execute_tool("summon_dragon", &json!({}), &mut deps),
            Err(ToolError::Unknown(_))
        ));
    }
}
