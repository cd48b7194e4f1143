//! Shared types, events, and constants for the progression engine.
//!
//! This is the type contract. Every module imports from here.
//! No module imports from any other module directly.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::time::{SystemTime, UNIX_EPOCH};

use rand::distributions::Alphanumeric;
use rand::Rng;

// ═══════════════════════════════════════════════════════════════════════
// CONSTANTS
// ═══════════════════════════════════════════════════════════════════════

/// Version stamped into every snapshot. Bump on schema changes.
pub const SCHEMA_VERSION: &str = "1.2.0";

pub const MIN_EQUIPMENT_LEVEL: u8 = 1;
pub const MAX_EQUIPMENT_LEVEL: u8 = 5;
pub const MAX_INTIMACY: u8 = 100;

/// Scene the game boots into and returns to after an ending.
pub const DEFAULT_SCENE: &str = "title";

/// Well-known unlock categories. `unlock` accepts arbitrary category names;
/// these are the ones the reference content uses.
pub const CATEGORY_CHARACTERS: &str = "characters";
pub const CATEGORY_SCENES: &str = "scenes";
pub const CATEGORY_ENDINGS: &str = "endings";
pub const CATEGORY_GALLERY: &str = "gallery";
pub const CATEGORY_ACHIEVEMENTS: &str = "achievements";

/// The fixed playable roster: (character id, display name, starting equipment).
/// The set is fixed at design time; ids are stable across saves.
pub const ROSTER: &[(u32, &str, &str)] = &[
    (1, "Sakura", "Worn Gloves"),
    (2, "Ren", "Old Deck"),
    (3, "Mei", "Plain Ribbon"),
];

// ═══════════════════════════════════════════════════════════════════════
// BATTLE RESULTS & ENDINGS
// ═══════════════════════════════════════════════════════════════════════

/// Outcome of a single puzzle battle, as reported by the puzzle engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BattleResult {
    Win,
    Loss,
    PerfectWin,
}

impl BattleResult {
    /// Wins and perfect wins both count as victories.
    pub fn is_victory(self) -> bool {
        matches!(self, BattleResult::Win | BattleResult::PerfectWin)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BattleResult::Win => "win",
            BattleResult::Loss => "loss",
            BattleResult::PerfectWin => "perfect_win",
        }
    }
}

/// The four mutually exclusive ending tiers, from most to least exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndingType {
    True,
    Secret,
    Normal,
    Bad,
}

impl EndingType {
    pub fn as_str(self) -> &'static str {
        match self {
            EndingType::True => "true_ending",
            EndingType::Secret => "secret_ending",
            EndingType::Normal => "normal_ending",
            EndingType::Bad => "bad_ending",
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// SETTINGS
// ═══════════════════════════════════════════════════════════════════════

/// Player preferences, independent of gameplay progress.
/// Survives `reset_game` untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Volumes in [0, 1].
    pub bgm_volume: f32,
    pub sfx_volume: f32,
    pub voice_volume: f32,
    /// Text speed multiplier (1.0 = normal).
    pub text_speed: f32,
    /// Language code, e.g. "ja" or "en".
    pub language: String,
    pub fullscreen: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bgm_volume: 0.7,
            sfx_volume: 1.0,
            voice_volume: 0.8,
            text_speed: 1.0,
            language: String::from("ja"),
            fullscreen: false,
        }
    }
}

impl Settings {
    /// Clamp every field into its valid range. Applied on mutation and on load.
    pub fn clamp_ranges(&mut self) {
        self.bgm_volume = self.bgm_volume.clamp(0.0, 1.0);
        self.sfx_volume = self.sfx_volume.clamp(0.0, 1.0);
        self.voice_volume = self.voice_volume.clamp(0.0, 1.0);
        self.text_speed = self.text_speed.clamp(0.1, 10.0);
    }
}

/// Partial settings update. `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct SettingsPatch {
    pub bgm_volume: Option<f32>,
    pub sfx_volume: Option<f32>,
    pub voice_volume: Option<f32>,
    pub text_speed: Option<f32>,
    pub language: Option<String>,
    pub fullscreen: Option<bool>,
}

// ═══════════════════════════════════════════════════════════════════════
// CHARACTERS
// ═══════════════════════════════════════════════════════════════════════

/// Per-character progression state, keyed by the stable numeric id in
/// `GameState::characters`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterState {
    pub display_name: String,
    /// 1..=5, monotonically non-decreasing via `upgrade_equipment`.
    pub equipment_level: u8,
    /// Descriptive label paired with the level.
    pub equipment_name: String,
    /// 0..=100, clamped on every mutation.
    pub intimacy: u8,
    pub battle_count: u32,
    /// Invariant: victories <= battle_count.
    pub victories: u32,
    pub cumulative_score: u64,
}

impl Default for CharacterState {
    fn default() -> Self {
        Self {
            display_name: String::new(),
            equipment_level: MIN_EQUIPMENT_LEVEL,
            equipment_name: String::new(),
            intimacy: 0,
            battle_count: 0,
            victories: 0,
            cumulative_score: 0,
        }
    }
}

impl CharacterState {
    pub fn new(display_name: impl Into<String>, equipment_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            equipment_name: equipment_name.into(),
            ..Default::default()
        }
    }
}

/// Partial character update for `update_character`. `None` fields are left
/// unchanged. Battle counters are deliberately absent; they only move
/// through `record_battle_result`.
#[derive(Debug, Clone, Default)]
pub struct CharacterPatch {
    pub display_name: Option<String>,
    pub equipment_name: Option<String>,
    pub intimacy: Option<u8>,
}

// ═══════════════════════════════════════════════════════════════════════
// STATISTICS
// ═══════════════════════════════════════════════════════════════════════

/// Aggregate play counters across the whole session history.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerStatistics {
    pub total_score: u64,
    pub total_play_time_seconds: u64,
    pub games_played: u32,
    /// Invariant: games_won <= games_played.
    pub games_won: u32,
    pub total_tiles_cleared: u64,
    pub max_combo_observed: u32,
    pub perfect_game_count: u32,
}

// ═══════════════════════════════════════════════════════════════════════
// GAME STATE — the single authoritative tree
// ═══════════════════════════════════════════════════════════════════════

/// The root state tree. One live instance per session, exclusively owned
/// by the `GameStore`. Replaced wholesale only by a successful load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    pub schema_version: String,
    /// Opaque stable identifier, generated once per fresh state.
    pub player_id: String,
    /// Unix seconds.
    pub created_at: u64,
    pub last_played_at: u64,
    pub current_scene: String,
    pub current_dialogue_index: u32,
    /// Append-only, duplicate-free, insertion order preserved.
    pub completed_scenes: Vec<String>,
    /// Narrative branching flags. Values are arbitrary JSON.
    pub flags: HashMap<String, Value>,
    pub has_unsaved_progress: bool,
    pub settings: Settings,
    pub characters: BTreeMap<u32, CharacterState>,
    pub statistics: PlayerStatistics,
    /// Category name → unlocked item ids. Membership is monotone.
    pub unlocks: BTreeMap<String, Vec<String>>,
}

impl Default for GameState {
    fn default() -> Self {
        Self::fresh()
    }
}

impl GameState {
    /// The initial-state contract: default roster, title scene, everything
    /// else zeroed. A new `player_id` is generated.
    pub fn fresh() -> Self {
        let now = unix_now();
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            player_id: generate_player_id(),
            created_at: now,
            last_played_at: now,
            current_scene: DEFAULT_SCENE.to_string(),
            current_dialogue_index: 0,
            completed_scenes: Vec::new(),
            flags: HashMap::new(),
            has_unsaved_progress: false,
            settings: Settings::default(),
            characters: default_roster(),
            statistics: PlayerStatistics::default(),
            unlocks: BTreeMap::new(),
        }
    }

    pub fn character(&self, id: u32) -> Option<&CharacterState> {
        self.characters.get(&id)
    }

    pub fn is_unlocked(&self, category: &str, item: &str) -> bool {
        self.unlocks
            .get(category)
            .map(|items| items.iter().any(|i| i == item))
            .unwrap_or(false)
    }
}

/// Builds the fixed 3-character roster from `ROSTER`.
pub fn default_roster() -> BTreeMap<u32, CharacterState> {
    ROSTER
        .iter()
        .map(|&(id, name, equipment)| (id, CharacterState::new(name, equipment)))
        .collect()
}

pub fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn generate_player_id() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(12)
        .map(char::from)
        .collect();
    format!("player_{}", suffix)
}

// ═══════════════════════════════════════════════════════════════════════
// EVENTS — published by the store, delivered by the bus
// ═══════════════════════════════════════════════════════════════════════

/// Every event the store can publish. Payloads carry the old and new
/// relevant values so subscribers never have to re-query the tree.
#[derive(Debug, Clone)]
pub enum GameEvent {
    SceneChanged {
        previous: String,
        current: String,
        data: Option<Value>,
    },
    CharacterUpdated {
        id: u32,
        character: CharacterState,
    },
    EquipmentUpgraded {
        id: u32,
        previous_level: u8,
        level: u8,
        name: String,
    },
    IntimacyChanged {
        id: u32,
        previous: u8,
        current: u8,
    },
    BattleRecorded {
        id: u32,
        result: BattleResult,
        score: u64,
        victories: u32,
    },
    FlagSet {
        name: String,
        previous: Option<Value>,
        value: Value,
    },
    Unlocked {
        category: String,
        item: String,
    },
    SettingsChanged {
        settings: Settings,
    },
    DialogueAdvanced {
        scene: String,
        index: u32,
    },
    PuzzleProgressRecorded {
        tiles_cleared: u64,
        max_combo: u32,
    },
    PlayTimeAdded {
        seconds: u64,
        total: u64,
    },
    GameReset,
    StateLoaded {
        state: Box<GameState>,
    },
}

impl GameEvent {
    /// The subscription key for this event.
    pub fn kind(&self) -> EventKind {
        match self {
            GameEvent::SceneChanged { .. } => EventKind::SceneChanged,
            GameEvent::CharacterUpdated { .. } => EventKind::CharacterUpdated,
            GameEvent::EquipmentUpgraded { .. } => EventKind::EquipmentUpgraded,
            GameEvent::IntimacyChanged { .. } => EventKind::IntimacyChanged,
            GameEvent::BattleRecorded { .. } => EventKind::BattleRecorded,
            GameEvent::FlagSet { .. } => EventKind::FlagSet,
            GameEvent::Unlocked { .. } => EventKind::Unlocked,
            GameEvent::SettingsChanged { .. } => EventKind::SettingsChanged,
            GameEvent::DialogueAdvanced { .. } => EventKind::DialogueAdvanced,
            GameEvent::PuzzleProgressRecorded { .. } => EventKind::PuzzleProgressRecorded,
            GameEvent::PlayTimeAdded { .. } => EventKind::PlayTimeAdded,
            GameEvent::GameReset => EventKind::GameReset,
            GameEvent::StateLoaded { .. } => EventKind::StateLoaded,
        }
    }
}

/// Discriminant of `GameEvent`, used as the bus subscription key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    SceneChanged,
    CharacterUpdated,
    EquipmentUpgraded,
    IntimacyChanged,
    BattleRecorded,
    FlagSet,
    Unlocked,
    SettingsChanged,
    DialogueAdvanced,
    PuzzleProgressRecorded,
    PlayTimeAdded,
    GameReset,
    StateLoaded,
}
