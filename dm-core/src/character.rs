//! Pre-made character sheets.
//!
//! Sheets are YAML files in a directory, picked from a menu at game start
//! and converted into live [`PlayerStats`].

use crate::models::PlayerStats;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;
use tokio::fs;

/// Errors from character sheet loading.
#[derive(Debug, Error)]
pub enum CharacterError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Character sheet not found: {0}")]
    NotFound(String),
}

/// A weapon on a character sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weapon {
    /// Weapon name.
    pub name: String,

    /// Damage dice, e.g. `1d8`.
    #[serde(default)]
    pub damage: Option<String>,

    /// Enchantment bonus; zero for a mundane weapon.
    #[serde(default)]
    pub magical_bonus: i32,
}

/// A piece of worn protection (armor or shield).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArmorPiece {
    /// Armor name.
    pub name: String,

    /// Armor class improvement it grants.
    #[serde(default)]
    pub armor_class_bonus: i32,
}

/// Worn and wielded gear.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Equipment {
    #[serde(default)]
    pub weapons: Vec<Weapon>,

    #[serde(default)]
    pub armor: Option<ArmorPiece>,

    #[serde(default)]
    pub shield: Option<ArmorPiece>,
}

/// A carried item with a quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CarriedItem {
    /// Item name.
    pub name: String,

    /// How many are carried.
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

fn default_quantity() -> u32 {
    1
}

/// A pre-made character sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterSheet {
    /// Character name.
    pub name: String,

    /// Class name (fighter, thief, cleric, ...).
    pub class: String,

    /// Starting level.
    #[serde(default = "default_level")]
    pub level: u8,

    /// Maximum hit points.
    #[serde(default = "default_max_hit_points")]
    pub max_hit_points: i32,

    /// Current hit points; full when omitted.
    #[serde(default)]
    pub hit_points: Option<i32>,

    /// Worn and wielded gear.
    #[serde(default)]
    pub equipment: Equipment,

    /// Other items in the pack.
    #[serde(default)]
    pub carried_items: Vec<CarriedItem>,

    /// Background blurb shown in the menu.
    #[serde(default)]
    pub description: Option<String>,
}

fn default_level() -> u8 {
    1
}

fn default_max_hit_points() -> i32 {
    100
}

impl CharacterSheet {
    /// Convert the sheet into live stats.
    ///
    /// Equipment and carried items are flattened into the inventory:
    /// weapons carry their enchantment bonus (`longsword +1`), carried
    /// items their quantity (`torch (x3)`).
    pub fn to_player_stats(&self) -> PlayerStats {
        let mut inventory = Vec::new();
        for weapon in &self.equipment.weapons {
            if weapon.magical_bonus != 0 {
                inventory.push(format!("{} {:+}", weapon.name, weapon.magical_bonus));
            } else {
                inventory.push(weapon.name.clone());
            }
        }
        if let Some(ref armor) = self.equipment.armor {
            inventory.push(armor.name.clone());
        }
        if let Some(ref shield) = self.equipment.shield {
            inventory.push(shield.name.clone());
        }
        for item in &self.carried_items {
            inventory.push(format!("{} (x{})", item.name, item.quantity));
        }

        PlayerStats {
            name: self.name.clone(),
            health: self.hit_points.unwrap_or(self.max_hit_points),
            max_health: self.max_hit_points,
            level: self.level,
            inventory,
        }
    }
}

/// Loads character sheets from a directory of YAML files.
#[derive(Debug, Clone)]
pub struct CharacterStore {
    directory: PathBuf,
}

impl CharacterStore {
    /// Create a store over the given directory.
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// List sheet names (file stems), sorted.
    pub async fn list_characters(&self) -> Result<Vec<String>, CharacterError> {
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

    /// Load a sheet by name (without extension).
    pub async fn load(&self, name: &str) -> Result<CharacterSheet, CharacterError> {
        let path = self.directory.join(format!("{name}.yaml"));
        if !path.exists() {
            return Err(CharacterError::NotFound(
                path.to_string_lossy().to_string(),
            ));
        }

        let text = fs::read_to_string(&path).await?;
        Ok(serde_yaml::from_str(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SHEET: &str = r#"
name: Wilhelmina
class: thief
level: 3
max_hit_points: 60
equipment:
  weapons:
    - name: dagger
      damage: 1d4
      magical_bonus: 1
    - name: sling
      damage: 1d4
  armor:
    name: leather armor
    armor_class_bonus: 2
carried_items:
  - name: lockpicks
  - name: torch
    quantity: 3
description: A reformed cutpurse with a taste for crypts.
"#;

    #[test]
    fn test_sheet_defaults() {
        let sheet: CharacterSheet =
            serde_yaml::from_str("name: Bran\nclass: fighter\n").unwrap();
        assert_eq!(sheet.level, 1);
        assert_eq!(sheet.max_hit_points, 100);
        assert_eq!(sheet.hit_points, None);
        assert_eq!(sheet.equipment, Equipment::default());
        assert!(sheet.carried_items.is_empty());
    }

    #[test]
    fn test_to_player_stats_flattens_equipment() {
        let sheet: CharacterSheet = serde_yaml::from_str(SHEET).unwrap();
        let stats = sheet.to_player_stats();
        assert_eq!(stats.name, "Wilhelmina");
        assert_eq!(stats.health, 60);
        assert_eq!(stats.max_health, 60);
        assert_eq!(stats.level, 3);
        assert_eq!(
            stats.inventory,
            vec![
                "dagger +1",
                "sling",
                "leather armor",
                "lockpicks (x1)",
                "torch (x3)",
            ]
        );
        assert!(stats.validate().is_ok());
    }

    #[test]
    fn test_wounded_sheet_keeps_current_hit_points() {
        let sheet: CharacterSheet = serde_yaml::from_str(
            "name: Bran\nclass: fighter\nmax_hit_points: 80\nhit_points: 35\n",
        )
        .unwrap();
        let stats = sheet.to_player_stats();
        assert_eq!(stats.health, 35);
        assert_eq!(stats.max_health, 80);
    }

    #[tokio::test]
    async fn test_store_list_and_load() {
        let dir = TempDir::new().expect("temp dir");
        tokio::fs::write(dir.path().join("wilhelmina.yaml"), SHEET)
            .await
            .expect("write sheet");

        let store = CharacterStore::new(dir.path());
        assert_eq!(store.list_characters().await.expect("list"), vec!["wilhelmina"]);

        let sheet = store.load("wilhelmina").await.expect("load");
        assert_eq!(sheet.class, "thief");
        assert_eq!(sheet.equipment.weapons.len(), 2);
    }

    #[tokio::test]
    async fn test_store_missing_sheet() {
        let dir = TempDir::new().expect("temp dir");
        let store = CharacterStore::new(dir.path());
        assert!(matches!(
            store.load("nobody").await,
            Err(CharacterError::NotFound(_))
        ));
    }
}
