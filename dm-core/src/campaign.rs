//! Campaign content model and loader.
//!
//! A campaign is a YAML content bundle describing a room graph, enemy
//! placements, and treasure. Static content ([`CampaignData`]) is immutable
//! during play; everything that changes as the player moves lives in
//! [`CampaignState`].
//!
//! Exits accept a shorthand form in YAML (`north: corridor`) alongside the
//! full form with lock/hidden flags.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::info;

/// Errors from campaign loading.
#[derive(Debug, Error)]
pub enum CampaignError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Campaign file not found: {0}")]
    NotFound(String),

    #[error("Room not found: {0}")]
    RoomNotFound(String),
}

/// A directional exit from a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exit {
    /// Direction of travel (north, south, up, ...).
    #[serde(default)]
    pub direction: String,

    /// Id of the room this exit leads to.
    pub target_room_id: String,

    /// Hidden exits are invisible until discovered by searching.
    #[serde(default)]
    pub hidden: bool,

    /// Locked exits cannot be used without the key treasure.
    #[serde(default)]
    pub locked: bool,

    /// Treasure id of the key that opens this exit.
    #[serde(default)]
    pub key_id: Option<String>,

    /// Flavor description of the exit.
    #[serde(default)]
    pub description: Option<String>,
}

/// Either the shorthand (`north: corridor`) or the full exit form.
#[derive(Deserialize)]
#[serde(untagged)]
enum ExitSpec {
    Target(String),
    Full(Exit),
}

fn deserialize_exits<'de, D>(deserializer: D) -> Result<BTreeMap<String, Exit>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: BTreeMap<String, ExitSpec> = BTreeMap::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(direction, spec)| {
            let mut exit = match spec {
                ExitSpec::Target(target_room_id) => Exit {
                    direction: String::new(),
                    target_room_id,
                    hidden: false,
                    locked: false,
                    key_id: None,
                    description: None,
                },
                ExitSpec::Full(exit) => exit,
            };
            if exit.direction.is_empty() {
                exit.direction = direction.clone();
            }
            (direction, exit)
        })
        .collect())
}

/// A trap placed in a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trap {
    /// Trap id, unique within its room.
    #[serde(default)]
    pub id: String,

    /// Trap name.
    pub name: String,

    /// Description shown when triggered or found.
    #[serde(default)]
    pub description: Option<String>,

    /// Damage dice in notation like "2d6".
    #[serde(default)]
    pub damage_dice: Option<String>,

    /// Saving throw difficulty to avoid the trap.
    #[serde(default)]
    pub save_dc: Option<i32>,
}

/// A room in the campaign map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    /// Room id; defaults to its key in the rooms map.
    #[serde(default)]
    pub id: String,

    /// Display name.
    pub name: String,

    /// Narrative description.
    pub description: String,

    /// Terrain hint for the DM (stone corridor, cavern, ...).
    #[serde(default)]
    pub terrain: Option<String>,

    /// Exits keyed by direction.
    #[serde(default, deserialize_with = "deserialize_exits")]
    pub exits: BTreeMap<String, Exit>,

    /// Traps in this room.
    #[serde(default)]
    pub traps: Vec<Trap>,

    /// Notable features the player can interact with.
    #[serde(default)]
    pub features: Vec<String>,
}

/// AD&D-style saving throw table for an enemy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavingThrows {
    #[serde(default = "default_save")]
    pub paralyzation_poison_death: i32,
    #[serde(default = "default_save")]
    pub petrification_polymorph: i32,
    #[serde(default = "default_save")]
    pub rod_staff_wand: i32,
    #[serde(default = "default_save")]
    pub breath_weapon: i32,
    #[serde(default = "default_save")]
    pub spell: i32,
}

fn default_save() -> i32 {
    16
}

impl Default for SavingThrows {
    fn default() -> Self {
        Self {
            paralyzation_poison_death: default_save(),
            petrification_polymorph: default_save(),
            rod_staff_wand: default_save(),
            breath_weapon: default_save(),
            spell: default_save(),
        }
    }
}

/// An enemy stat block and placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Enemy {
    /// Enemy id; defaults to its key in the enemies map.
    #[serde(default)]
    pub id: String,

    /// Display name.
    pub name: String,

    /// Description for the DM to narrate from.
    #[serde(default)]
    pub description: Option<String>,

    /// Hit points.
    pub hit_points: i32,

    /// Armor class (lower is better).
    pub armor_class: i32,

    /// To Hit Armor Class 0.
    #[serde(default = "default_thac0")]
    pub thac0: i32,

    /// Morale rating checked on 2d6 when losing.
    #[serde(default)]
    pub morale: Option<i32>,

    /// Saving throw table.
    #[serde(default)]
    pub saving_throws: SavingThrows,

    /// Room this enemy starts in.
    #[serde(default)]
    pub room_id: Option<String>,
}

fn default_thac0() -> i32 {
    20
}

/// A treasure placement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Treasure {
    /// Treasure id; defaults to its key in the treasure map.
    #[serde(default)]
    pub id: String,

    /// Display name.
    pub name: String,

    /// Description for narration.
    #[serde(default)]
    pub description: Option<String>,

    /// Value in gold pieces.
    #[serde(default)]
    pub value: Option<i32>,

    /// Room the treasure sits in.
    pub room_id: String,

    /// Hidden treasure is only found by searching.
    #[serde(default)]
    pub hidden: bool,

    /// Id of a treasure that must be collected before this one is
    /// accessible.
    #[serde(default)]
    pub requires: Option<String>,
}

/// The static content of a campaign.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignData {
    /// Campaign title.
    pub name: String,

    /// Short pitch shown in menus.
    #[serde(default)]
    pub description: Option<String>,

    /// Id of the room where the adventure begins.
    pub starting_room: String,

    /// Narrative used to open the first scene.
    #[serde(default)]
    pub opening_narrative: Option<String>,

    /// Rooms keyed by id.
    #[serde(default)]
    pub rooms: BTreeMap<String, Room>,

    /// Enemies keyed by id.
    #[serde(default)]
    pub initial_enemies: BTreeMap<String, Enemy>,

    /// Treasure keyed by id.
    #[serde(default)]
    pub initial_treasure: BTreeMap<String, Treasure>,
}

impl CampaignData {
    /// Parse a campaign from YAML text.
    pub fn from_yaml(text: &str) -> Result<Self, CampaignError> {
        let mut data: CampaignData = serde_yaml::from_str(text)?;
        data.normalize();
        Ok(data)
    }

    /// Fill in ids that were left implicit in the YAML maps.
    fn normalize(&mut self) {
        for (key, room) in &mut self.rooms {
            if room.id.is_empty() {
                room.id = key.clone();
            }
        }
        for (key, enemy) in &mut self.initial_enemies {
            if enemy.id.is_empty() {
                enemy.id = key.clone();
            }
        }
        for (key, treasure) in &mut self.initial_treasure {
            if treasure.id.is_empty() {
                treasure.id = key.clone();
            }
        }
    }

    /// Look up a room by id.
    pub fn room(&self, id: &str) -> Result<&Room, CampaignError> {
        self.rooms
            .get(id)
            .ok_or_else(|| CampaignError::RoomNotFound(id.to_string()))
    }

    /// Create the initial state for a new playthrough.
    pub fn initial_state(&self) -> CampaignState {
        let mut enemy_locations = BTreeMap::new();
        let mut enemy_health = BTreeMap::new();

        for (id, enemy) in &self.initial_enemies {
            if let Some(ref room_id) = enemy.room_id {
                enemy_locations.insert(id.clone(), room_id.clone());
            }
            enemy_health.insert(id.clone(), enemy.hit_points);
        }

        let mut visited_rooms = BTreeSet::new();
        visited_rooms.insert(self.starting_room.clone());

        CampaignState {
            current_room_id: self.starting_room.clone(),
            visited_rooms,
            enemy_locations,
            enemy_health,
            defeated_enemies: BTreeSet::new(),
            collected_treasure: BTreeSet::new(),
            searched_rooms: BTreeSet::new(),
            discovered_exits: BTreeSet::new(),
            triggered_traps: BTreeSet::new(),
        }
    }

    /// The room the player is currently in.
    pub fn current_room<'a>(&'a self, state: &CampaignState) -> Result<&'a Room, CampaignError> {
        self.room(&state.current_room_id)
    }

    /// Living enemies currently in a room, with their current health.
    pub fn living_enemies_in(&self, room_id: &str, state: &CampaignState) -> Vec<Enemy> {
        self.initial_enemies
            .iter()
            .filter(|(id, _)| {
                !state.defeated_enemies.contains(*id)
                    && state.enemy_locations.get(*id).map(String::as_str) == Some(room_id)
            })
            .map(|(id, enemy)| {
                let mut current = enemy.clone();
                if let Some(hp) = state.enemy_health.get(id) {
                    current.hit_points = *hp;
                }
                current
            })
            .collect()
    }

    /// Uncollected, ungated treasure available in a room.
    ///
    /// Hidden treasure only appears once the room has been searched. A
    /// treasure gated by `requires` only appears once its prerequisite
    /// treasure has been collected.
    pub fn available_treasure<'a>(
        &'a self,
        room_id: &str,
        state: &CampaignState,
    ) -> Vec<&'a Treasure> {
        self.initial_treasure
            .values()
            .filter(|t| t.room_id == room_id && !state.collected_treasure.contains(&t.id))
            .filter(|t| !t.hidden || state.searched_rooms.contains(room_id))
            .filter(|t| match &t.requires {
                Some(prereq) => state.collected_treasure.contains(prereq),
                None => true,
            })
            .collect()
    }

    /// Exits of a room visible to the player (hidden exits only once
    /// discovered).
    pub fn visible_exits<'a>(
        &'a self,
        room_id: &str,
        state: &CampaignState,
    ) -> Vec<(&'a str, &'a Exit)> {
        let Ok(room) = self.room(room_id) else {
            return Vec::new();
        };
        room.exits
            .iter()
            .filter(|(direction, exit)| {
                !exit.hidden || state.is_exit_discovered(room_id, direction)
            })
            .map(|(direction, exit)| (direction.as_str(), exit))
            .collect()
    }

    /// Traps in a room that have not been triggered yet.
    pub fn active_traps<'a>(&'a self, room_id: &str, state: &CampaignState) -> Vec<&'a Trap> {
        let Ok(room) = self.room(room_id) else {
            return Vec::new();
        };
        room.traps
            .iter()
            .filter(|trap| !state.is_trap_triggered(room_id, &trap.id))
            .collect()
    }
}

/// Dynamic campaign state for one playthrough.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignState {
    /// Room the player is in.
    pub current_room_id: String,

    /// Rooms the player has entered.
    pub visited_rooms: BTreeSet<String>,

    /// Current room of each roaming enemy.
    pub enemy_locations: BTreeMap<String, String>,

    /// Current health of each enemy.
    pub enemy_health: BTreeMap<String, i32>,

    /// Enemies that have been defeated.
    pub defeated_enemies: BTreeSet<String>,

    /// Treasure ids the player has collected.
    pub collected_treasure: BTreeSet<String>,

    /// Rooms the player has searched.
    pub searched_rooms: BTreeSet<String>,

    /// Discovered hidden exits, keyed "room_id:direction".
    pub discovered_exits: BTreeSet<String>,

    /// Triggered traps, keyed "room_id:trap_id".
    pub triggered_traps: BTreeSet<String>,
}

impl CampaignState {
    /// Move the player to a room, marking it visited.
    pub fn enter_room(&mut self, room_id: impl Into<String>) {
        let room_id = room_id.into();
        self.visited_rooms.insert(room_id.clone());
        self.current_room_id = room_id;
    }

    /// Move an enemy to a different room.
    pub fn move_enemy(&mut self, enemy_id: &str, room_id: impl Into<String>) {
        if self.enemy_locations.contains_key(enemy_id) {
            self.enemy_locations
                .insert(enemy_id.to_string(), room_id.into());
        }
    }

    /// Mark a room as searched.
    pub fn mark_searched(&mut self, room_id: impl Into<String>) {
        self.searched_rooms.insert(room_id.into());
    }

    /// Mark a hidden exit as discovered.
    pub fn discover_exit(&mut self, room_id: &str, direction: &str) {
        self.discovered_exits.insert(format!("{room_id}:{direction}"));
    }

    /// Check whether a hidden exit has been discovered.
    pub fn is_exit_discovered(&self, room_id: &str, direction: &str) -> bool {
        self.discovered_exits
            .contains(&format!("{room_id}:{direction}"))
    }

    /// Mark a trap as triggered.
    pub fn trigger_trap(&mut self, room_id: &str, trap_id: &str) {
        self.triggered_traps.insert(format!("{room_id}:{trap_id}"));
    }

    /// Check whether a trap has been triggered.
    pub fn is_trap_triggered(&self, room_id: &str, trap_id: &str) -> bool {
        self.triggered_traps
            .contains(&format!("{room_id}:{trap_id}"))
    }

    /// Mark a treasure as collected.
    pub fn collect_treasure(&mut self, treasure_id: impl Into<String>) {
        self.collected_treasure.insert(treasure_id.into());
    }

    /// Record damage to an enemy, marking it defeated at 0 hp.
    pub fn damage_enemy(&mut self, enemy_id: &str, damage: i32) -> i32 {
        let hp = self.enemy_health.entry(enemy_id.to_string()).or_insert(0);
        *hp = (*hp - damage).max(0);
        let remaining = *hp;
        if remaining == 0 {
            self.defeated_enemies.insert(enemy_id.to_string());
        }
        remaining
    }
}

/// Loads campaigns from a directory of YAML files.
#[derive(Debug, Clone)]
pub struct CampaignStore {
    directory: PathBuf,
}

impl CampaignStore {
    /// Create a store over the given directory.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// List campaign names (file stems), sorted.
    pub async fn list_campaigns(&self) -> Result<Vec<String>, CampaignError> {
        let mut names = Vec::new();
        if !self.directory.exists() {
            return Ok(names);
        }

        let mut entries = fs::read_dir(&self.directory).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().map(|e| e == "yaml" || e == "yml").unwrap_or(false) {
                if let Some(stem) = path.file_stem() {
                    names.push(stem.to_string_lossy().to_string());
                }
            }
        }

        names.sort();
        Ok(names)
    }

    /// Load a campaign by name (without extension).
    pub async fn load(&self, name: &str) -> Result<CampaignData, CampaignError> {
        let path = self.path_for(name);
        if !path.exists() {
            return Err(CampaignError::NotFound(path.to_string_lossy().to_string()));
        }

        let text = fs::read_to_string(&path).await?;
        let data = CampaignData::from_yaml(&text)?;
        info!(campaign = %data.name, rooms = data.rooms.len(), "loaded campaign");
        Ok(data)
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.directory.join(format!("{name}.yaml"))
    }

    /// The directory this store reads from.
    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const SAMPLE_CAMPAIGN: &str = r#"
name: The Sunken Crypt
description: A short delve beneath a ruined chapel.
starting_room: entrance
opening_narrative: Rain hammers the chapel ruins as you pry open the crypt door.
rooms:
  entrance:
    name: Crypt Entrance
    description: Cracked steps descend into darkness.
    exits:
      north: hall
  hall:
    name: Hall of Bones
    description: Niches stuffed with yellowed bones line the walls.
    exits:
      south: entrance
      east:
        target_room_id: vault
        locked: true
        key_id: iron_key
      west:
        target_room_id: crawlspace
        hidden: true
  crawlspace:
    name: Crawlspace
    description: A tight passage behind a loose slab.
    exits:
      east: hall
  vault:
    name: Burial Vault
    description: A stone sarcophagus dominates the chamber.
    exits:
      west: hall
initial_enemies:
  crypt_rat:
    name: Giant Rat
    hit_points: 4
    armor_class: 7
    room_id: hall
initial_treasure:
  iron_key:
    name: Iron Key
    room_id: crawlspace
  burial_crown:
    name: Burial Crown
    value: 500
    room_id: vault
    requires: iron_key
"#;

    fn sample() -> CampaignData {
        CampaignData::from_yaml(SAMPLE_CAMPAIGN).unwrap()
    }

    #[test]
    fn test_yaml_parsing_fills_ids() {
        let data = sample();
        assert_eq!(data.rooms["hall"].id, "hall");
        assert_eq!(data.initial_enemies["crypt_rat"].id, "crypt_rat");
        assert_eq!(data.initial_treasure["iron_key"].id, "iron_key");
    }

    #[test]
    fn test_exit_shorthand_and_full_form() {
        let data = sample();
        let entrance = &data.rooms["entrance"];
        assert_eq!(entrance.exits["north"].target_room_id, "hall");
        assert_eq!(entrance.exits["north"].direction, "north");
        assert!(!entrance.exits["north"].locked);

        let hall = &data.rooms["hall"];
        assert!(hall.exits["east"].locked);
        assert_eq!(hall.exits["east"].key_id.as_deref(), Some("iron_key"));
        assert!(hall.exits["west"].hidden);
    }

    #[test]
    fn test_initial_state() {
        let data = sample();
        let state = data.initial_state();

        assert_eq!(state.current_room_id, "entrance");
        assert!(state.visited_rooms.contains("entrance"));
        assert_eq!(state.enemy_locations["crypt_rat"], "hall");
        assert_eq!(state.enemy_health["crypt_rat"], 4);
    }

    #[test]
    fn test_living_enemies_track_health_and_defeat() {
        let data = sample();
        let mut state = data.initial_state();

        let enemies = data.living_enemies_in("hall", &state);
        assert_eq!(enemies.len(), 1);
        assert_eq!(enemies[0].hit_points, 4);

        let remaining = state.damage_enemy("crypt_rat", 3);
        assert_eq!(remaining, 1);
        assert_eq!(data.living_enemies_in("hall", &state)[0].hit_points, 1);

        state.damage_enemy("crypt_rat", 5);
        assert!(state.defeated_enemies.contains("crypt_rat"));
        assert!(data.living_enemies_in("hall", &state).is_empty());
    }

    #[test]
    fn test_treasure_gating() {
        let data = sample();
        let mut state = data.initial_state();

        // The crown requires the key; it stays invisible until then.
        assert!(data.available_treasure("vault", &state).is_empty());

        state.collect_treasure("iron_key");
        let available = data.available_treasure("vault", &state);
        assert_eq!(available.len(), 1);
        assert_eq!(available[0].id, "burial_crown");

        state.collect_treasure("burial_crown");
        assert!(data.available_treasure("vault", &state).is_empty());
    }

    #[test]
    fn test_hidden_exits_visible_after_discovery() {
        let data = sample();
        let mut state = data.initial_state();

        let visible: Vec<_> = data
            .visible_exits("hall", &state)
            .into_iter()
            .map(|(d, _)| d)
            .collect();
        assert!(visible.contains(&"south"));
        assert!(visible.contains(&"east"));
        assert!(!visible.contains(&"west"));

        state.discover_exit("hall", "west");
        let visible: Vec<_> = data
            .visible_exits("hall", &state)
            .into_iter()
            .map(|(d, _)| d)
            .collect();
        assert!(visible.contains(&"west"));
    }

    #[test]
    fn test_enter_room_marks_visited() {
        let data = sample();
        let mut state = data.initial_state();

        state.enter_room("hall");
        assert_eq!(state.current_room_id, "hall");
        assert!(state.visited_rooms.contains("hall"));
    }

    #[test]
    fn test_unknown_room_lookup() {
        let data = sample();
        assert!(matches!(
            data.room("oubliette"),
            Err(CampaignError::RoomNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_store_roundtrip() {
        use tempfile::TempDir;

        let dir = TempDir::new().expect("temp dir");
        tokio::fs::write(dir.path().join("crypt.yaml"), SAMPLE_CAMPAIGN)
            .await
            .expect("write campaign");

        let store = CampaignStore::new(dir.path());
        let names = store.list_campaigns().await.expect("list");
        assert_eq!(names, vec!["crypt"]);

        let data = store.load("crypt").await.expect("load");
        assert_eq!(data.name, "The Sunken Crypt");
    }

    #[tokio::test]
    async fn test_store_missing_campaign() {
        use tempfile::TempDir;

        let dir = TempDir::new().expect("temp dir");
        let store = CampaignStore::new(dir.path());
        assert!(matches!(
            store.load("nope").await,
            Err(CampaignError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_store_missing_directory_lists_empty() {
        let store = CampaignStore::new("/definitely/not/a/real/dir");
        assert!(store.list_campaigns().await.unwrap().is_empty());
    }
}
