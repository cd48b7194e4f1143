//! Snapshot serialization and forward-compatible migration.
//!
//! A snapshot is a deep, self-contained copy of the state tree, grouped
//! one level under stable keys so old saves stay loadable as the schema
//! grows. Encoding/decoding here is a pure data transform; the byte-level
//! storage medium (file, LocalStorage, sync) is entirely the host's job.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use crate::shared::{
    default_roster, CharacterState, GameState, PlayerStatistics, Settings, MAX_EQUIPMENT_LEVEL,
    MAX_INTIMACY, MIN_EQUIPMENT_LEVEL, ROSTER, SCHEMA_VERSION,
};

// ═══════════════════════════════════════════════════════════════════════
// ERRORS
// ═══════════════════════════════════════════════════════════════════════

/// Errors surfaced by `GameStore::load`. The live tree is never touched
/// when one of these is returned.
#[derive(Debug)]
pub enum LoadError {
    /// Snapshot bytes are not parseable as the expected shape.
    Parse(serde_json::Error),
    /// Version-skew migration itself failed.
    Migration(String),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadError::Parse(e) => write!(f, "snapshot not parseable: {e}"),
            LoadError::Migration(msg) => write!(f, "migration failed: {msg}"),
        }
    }
}

impl std::error::Error for LoadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LoadError::Parse(e) => Some(e),
            LoadError::Migration(_) => None,
        }
    }
}

impl From<serde_json::Error> for LoadError {
    fn from(e: serde_json::Error) -> Self {
        LoadError::Parse(e)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// SNAPSHOT SHAPE
// ═══════════════════════════════════════════════════════════════════════

/// Player-identity and progress fields grouped under the `player` key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerGroup {
    pub player_id: String,
    pub created_at: u64,
    pub last_played_at: u64,
    pub current_dialogue_index: u32,
    pub statistics: PlayerStatistics,
}

impl Default for PlayerGroup {
    fn default() -> Self {
        let state = GameState::fresh();
        Self {
            player_id: state.player_id,
            created_at: state.created_at,
            last_played_at: state.last_played_at,
            current_dialogue_index: 0,
            statistics: PlayerStatistics::default(),
        }
    }
}

/// The versioned snapshot. Field-level `serde(default)` plus the top-level
/// migration overlay make old saves loadable; unknown extra fields in the
/// JSON are ignored rather than rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SaveData {
    pub schema_version: String,
    pub player: PlayerGroup,
    pub characters: BTreeMap<u32, CharacterState>,
    pub settings: Settings,
    pub unlocks: BTreeMap<String, Vec<String>>,
    pub flags: HashMap<String, Value>,
    pub current_scene: String,
    pub completed_scenes: Vec<String>,
}

impl From<&GameState> for SaveData {
    fn from(state: &GameState) -> Self {
        Self {
            schema_version: state.schema_version.clone(),
            player: PlayerGroup {
                player_id: state.player_id.clone(),
                created_at: state.created_at,
                last_played_at: state.last_played_at,
                current_dialogue_index: state.current_dialogue_index,
                statistics: state.statistics.clone(),
            },
            characters: state.characters.clone(),
            settings: state.settings.clone(),
            unlocks: state.unlocks.clone(),
            flags: state.flags.clone(),
            current_scene: state.current_scene.clone(),
            completed_scenes: state.completed_scenes.clone(),
        }
    }
}

impl SaveData {
    /// Encode as pretty JSON, the way the reference saves are stored.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, LoadError> {
        let value: Value = serde_json::from_str(json)?;
        decode(value)
    }

    /// Rebuild a state tree from this snapshot. Invariants are re-clamped
    /// afterwards by `sanitize`, so a hand-edited save cannot smuggle
    /// out-of-range values into the live tree.
    pub fn into_state(self) -> GameState {
        let mut state = GameState {
            schema_version: self.schema_version,
            player_id: self.player.player_id,
            created_at: self.player.created_at,
            last_played_at: self.player.last_played_at,
            current_scene: self.current_scene,
            current_dialogue_index: self.player.current_dialogue_index,
            completed_scenes: self.completed_scenes,
            flags: self.flags,
            has_unsaved_progress: false,
            settings: self.settings,
            characters: self.characters,
            statistics: self.player.statistics,
            unlocks: self.unlocks,
        };
        sanitize(&mut state);
        state
    }
}

// ═══════════════════════════════════════════════════════════════════════
// DECODE & MIGRATION
// ═══════════════════════════════════════════════════════════════════════

/// Decode a snapshot value, migrating first when the version differs from
/// the current schema.
pub fn decode(value: Value) -> Result<SaveData, LoadError> {
    let version = value
        .get("schema_version")
        .and_then(Value::as_str)
        .unwrap_or("");

    if version == SCHEMA_VERSION {
        return Ok(serde_json::from_value(value)?);
    }

    info!(
        "[Save] Snapshot version {:?} differs from current {:?}; migrating",
        version, SCHEMA_VERSION
    );
    migrate(value)
}

/// Migration contract: start from a fresh default tree, shallow-overlay
/// every top-level field present in the snapshot on top of it. The snapshot
/// wins on conflict; defaults fill the gaps schema evolution introduced.
fn migrate(snapshot: Value) -> Result<SaveData, LoadError> {
    let Value::Object(snapshot_fields) = snapshot else {
        return Err(LoadError::Migration(
            "snapshot is not a JSON object".to_string(),
        ));
    };

    let defaults = SaveData::from(&GameState::fresh());
    let Value::Object(mut merged) = serde_json::to_value(&defaults)? else {
        return Err(LoadError::Migration(
            "default snapshot did not encode as an object".to_string(),
        ));
    };

    for (key, value) in snapshot_fields {
        merged.insert(key, value);
    }

    let mut migrated: SaveData = serde_json::from_value(Value::Object(merged))?;
    migrated.schema_version = SCHEMA_VERSION.to_string();
    Ok(migrated)
}

// ═══════════════════════════════════════════════════════════════════════
// SANITY PASS
// ═══════════════════════════════════════════════════════════════════════

/// Re-clamp every invariant after a load. Loaded data is untrusted: saves
/// get hand-edited, and older builds had looser validation.
pub fn sanitize(state: &mut GameState) {
    state.schema_version = SCHEMA_VERSION.to_string();
    state.settings.clamp_ranges();

    // The roster is fixed at design time; fill any character the snapshot
    // lost and clamp the ones it kept.
    for (id, default_ch) in default_roster() {
        let ch = state.characters.entry(id).or_insert(default_ch);
        ch.equipment_level = ch
            .equipment_level
            .clamp(MIN_EQUIPMENT_LEVEL, MAX_EQUIPMENT_LEVEL);
        ch.intimacy = ch.intimacy.min(MAX_INTIMACY);
        if ch.victories > ch.battle_count {
            warn!(
                "[Save] Character {} victories {} exceed battle count {}; clamping",
                id, ch.victories, ch.battle_count
            );
            ch.victories = ch.battle_count;
        }
        if ch.display_name.is_empty() {
            if let Some(&(_, name, _)) = ROSTER.iter().find(|&&(rid, _, _)| rid == id) {
                ch.display_name = name.to_string();
            }
        }
    }

    let stats = &mut state.statistics;
    if stats.games_won > stats.games_played {
        warn!(
            "[Save] games_won {} exceeds games_played {}; clamping",
            stats.games_won, stats.games_played
        );
        stats.games_won = stats.games_played;
    }

    // completed_scenes is a duplicate-free append-only list.
    let mut seen = Vec::with_capacity(state.completed_scenes.len());
    for scene in state.completed_scenes.drain(..) {
        if !seen.contains(&scene) {
            seen.push(scene);
        }
    }
    state.completed_scenes = seen;
}
