//! Session persistence for save/load functionality.
//!
//! A saved session is a single JSON file holding the player, the world, the
//! campaign state, and the filtered transcript needed to resume play.

use crate::campaign::CampaignState;
use crate::history::strip_retry_prompts;
use crate::models::{PlayerStats, WorldState};
use crate::transcript::TranscriptMessage;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

/// Current save file version.
const SAVE_VERSION: u32 = 1;

/// A saved session with all state needed to resume play.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedSession {
    /// Save format version for compatibility checking.
    pub version: u32,

    /// When the save was created (unix seconds as a string).
    pub saved_at: String,

    /// Unique id for this session.
    pub session_id: Uuid,

    /// Player character stats.
    pub player: PlayerStats,

    /// World state.
    pub world: WorldState,

    /// Name of the campaign being played, if any.
    pub campaign_name: Option<String>,

    /// Dynamic campaign state, if a campaign is being played.
    pub campaign_state: Option<CampaignState>,

    /// Conversation transcript, retry artifacts already removed.
    pub transcript: Vec<TranscriptMessage>,

    /// Quick-access metadata about the save.
    pub metadata: SessionMetadata,
}

/// Metadata about the save file, readable without the full session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetadata {
    /// Player character name.
    pub character_name: String,

    /// Campaign name, if any.
    pub campaign_name: Option<String>,

    /// Current location.
    pub location: String,

    /// Player health at save time.
    pub health: i32,

    /// Number of transcript messages.
    pub turns: usize,

    /// When the save was created (duplicated from parent for peek access).
    #[serde(default)]
    pub saved_at: String,
}

impl SavedSession {
    /// Create a new saved session from game state.
    ///
    /// Retry prompts are stripped from the transcript here; they are
    /// interaction-local artifacts and must not survive a save/load cycle.
    pub fn new(
        player: PlayerStats,
        world: WorldState,
        campaign_name: Option<String>,
        campaign_state: Option<CampaignState>,
        transcript: &[TranscriptMessage],
    ) -> Self {
        let transcript = strip_retry_prompts(transcript);
        let saved_at = timestamp_now();
        let metadata = SessionMetadata {
            character_name: player.name.clone(),
            campaign_name: campaign_name.clone(),
            location: world.location.clone(),
            health: player.health,
            turns: transcript.len(),
            saved_at: saved_at.clone(),
        };

        Self {
            version: SAVE_VERSION,
            saved_at,
            session_id: Uuid::new_v4(),
            player,
            world,
            campaign_name,
            campaign_state,
            transcript,
            metadata,
        }
    }

    /// Save to a JSON file.
    pub async fn save_json(&self, path: impl AsRef<Path>) -> Result<(), PersistError> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), content).await?;
        debug!(path = %path.as_ref().display(), session = %self.session_id, "saved session");
        Ok(())
    }

    /// Load from a JSON file.
    pub async fn load_json(path: impl AsRef<Path>) -> Result<Self, PersistError> {
        let content = fs::read_to_string(path.as_ref()).await?;
        let saved: Self = serde_json::from_str(&content)?;

        if saved.version != SAVE_VERSION {
            return Err(PersistError::VersionMismatch {
                expected: SAVE_VERSION,
                found: saved.version,
            });
        }

        debug!(path = %path.as_ref().display(), session = %saved.session_id, "loaded session");
        Ok(saved)
    }

    /// Get a save file's metadata without loading the full session.
    pub async fn peek_metadata(path: impl AsRef<Path>) -> Result<SessionMetadata, PersistError> {
        let content = fs::read_to_string(path).await?;

        #[derive(Deserialize)]
        struct Partial {
            version: u32,
            metadata: SessionMetadata,
        }

        let partial: Partial = serde_json::from_str(&content)?;

        if partial.version != SAVE_VERSION {
            return Err(PersistError::VersionMismatch {
                expected: SAVE_VERSION,
                found: partial.version,
            });
        }

        Ok(partial.metadata)
    }
}

/// Information about a save file.
#[derive(Debug, Clone)]
pub struct SaveInfo {
    /// Path to the save file.
    pub path: String,

    /// Save metadata.
    pub metadata: SessionMetadata,
}

/// List all save files in a directory, newest first.
///
/// Creates the directory if it doesn't exist. Unreadable or foreign JSON
/// files are skipped.
pub async fn list_saves(dir: impl AsRef<Path>) -> Result<Vec<SaveInfo>, PersistError> {
    let mut saves = Vec::new();

    let dir_path = dir.as_ref();
    if !dir_path.exists() {
        fs::create_dir_all(dir_path).await?;
        return Ok(saves);
    }

    let mut entries = fs::read_dir(dir_path).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().map(|e| e == "json").unwrap_or(false) {
            if let Ok(metadata) = SavedSession::peek_metadata(&path).await {
                saves.push(SaveInfo {
                    path: path.to_string_lossy().to_string(),
                    metadata,
                });
            }
        }
    }

    saves.sort_by(|a, b| b.metadata.saved_at.cmp(&a.metadata.saved_at));
    Ok(saves)
}

/// Auto-save file path for a character.
pub fn auto_save_path(base_dir: impl AsRef<Path>, character_name: &str) -> std::path::PathBuf {
    base_dir
        .as_ref()
        .join(format!("{}_autosave.json", sanitize(character_name)))
}

/// Manual save file path with a timestamp.
pub fn manual_save_path(base_dir: impl AsRef<Path>, character_name: &str) -> std::path::PathBuf {
    base_dir.as_ref().join(format!(
        "{}_{}.json",
        sanitize(character_name),
        timestamp_now()
    ))
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() { c } else { '_' })
        .collect()
}

/// Current unix time in seconds as a string.
fn timestamp_now() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    format!("{}", now.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::campaign::CampaignData;
    use tempfile::TempDir;

    fn sample_session() -> SavedSession {
        let data = CampaignData::from_yaml(crate::campaign::tests::SAMPLE_CAMPAIGN).unwrap();
        SavedSession::new(
            PlayerStats::new("Wilhelmina"),
            WorldState::new("Crypt Entrance"),
            Some("The Sunken Crypt".to_string()),
            Some(data.initial_state()),
            &[
                TranscriptMessage::user("I open the crypt door"),
                TranscriptMessage::assistant(
                    "The hinges scream as stale air rolls out of the dark.",
                ),
            ],
        )
    }

    #[test]
    fn test_session_metadata() {
        let session = sample_session();
        assert_eq!(session.version, SAVE_VERSION);
        assert_eq!(session.metadata.character_name, "Wilhelmina");
        assert_eq!(
            session.metadata.campaign_name.as_deref(),
            Some("The Sunken Crypt")
        );
        assert_eq!(session.metadata.turns, 2);
    }

    #[test]
    fn test_new_session_strips_retry_prompts() {
        let transcript = vec![
            TranscriptMessage::user("go north"),
            TranscriptMessage::retry("narrative too short, try again"),
            TranscriptMessage::assistant("You step into the Hall of Bones, breath misting."),
        ];
        let session = SavedSession::new(
            PlayerStats::new("Hero"),
            WorldState::new("hall"),
            None,
            None,
            &transcript,
        );
        assert_eq!(session.transcript.len(), 2);
        assert!(session.transcript.iter().all(|m| !m.has_retry_prompt()));
    }

    #[test]
    fn test_save_paths() {
        let auto = auto_save_path("/saves", "Sir Reginald!");
        assert!(auto.to_string_lossy().contains("Sir_Reginald__autosave"));

        let manual = manual_save_path("/saves", "Sir Reginald!");
        assert!(manual.to_string_lossy().ends_with(".json"));
        assert!(!manual.to_string_lossy().contains('!'));
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("session.json");

        let session = sample_session();
        session.save_json(&path).await.expect("save");
        assert!(path.exists());

        let loaded = SavedSession::load_json(&path).await.expect("load");
        assert_eq!(loaded.session_id, session.session_id);
        assert_eq!(loaded.player.name, "Wilhelmina");
        assert_eq!(loaded.transcript.len(), 2);
        assert_eq!(
            loaded.campaign_state.as_ref().unwrap().current_room_id,
            "entrance"
        );
    }

    #[tokio::test]
    async fn test_peek_metadata_without_full_load() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("session.json");
        sample_session().save_json(&path).await.expect("save");

        let metadata = SavedSession::peek_metadata(&path).await.expect("peek");
        assert_eq!(metadata.character_name, "Wilhelmina");
        assert_eq!(metadata.location, "Crypt Entrance");
    }

    #[tokio::test]
    async fn test_version_mismatch_rejected() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("old.json");

        let mut session = sample_session();
        session.version = 99;
        let content = serde_json::to_string(&session).expect("serialize");
        tokio::fs::write(&path, content).await.expect("write");

        assert!(matches!(
            SavedSession::load_json(&path).await,
            Err(PersistError::VersionMismatch {
                expected: SAVE_VERSION,
                found: 99
            })
        ));
    }

    #[tokio::test]
    async fn test_list_saves_skips_foreign_files() {
        let dir = TempDir::new().expect("temp dir");

        sample_session()
            .save_json(dir.path().join("good.json"))
            .await
            .expect("save");
        tokio::fs::write(dir.path().join("junk.json"), "{}")
            .await
            .expect("write junk");

        let saves = list_saves(dir.path()).await.expect("list");
        assert_eq!(saves.len(), 1);
        assert_eq!(saves[0].metadata.character_name, "Wilhelmina");
    }

    #[tokio::test]
    async fn test_list_saves_creates_missing_dir() {
        let dir = TempDir::new().expect("temp dir");
        let nested = dir.path().join("saves");

        let saves = list_saves(&nested).await.expect("list");
        assert!(saves.is_empty());
        assert!(nested.exists());
    }
}
