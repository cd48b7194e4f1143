//! The state store and mutation API.
//!
//! `GameStore` exclusively owns the single live `GameState`. Every
//! mutation validates or clamps its inputs, applies the change, marks the
//! tree dirty, refreshes `last_played_at`, and publishes exactly one event
//! through the bus. A mutation that targets an unknown character id is a
//! warn-level no-op — gameplay callers must never crash on a bad id.

use log::{info, warn};
use serde_json::Value;

use crate::content::{BalanceRules, NoBonuses};
use crate::evaluator;
use crate::events::EventBus;
use crate::save::{self, LoadError, SaveData};
use crate::shared::{
    unix_now, BattleResult, CharacterPatch, CharacterState, EndingType, GameEvent, GameState,
    PlayerStatistics, SettingsPatch, CATEGORY_ACHIEVEMENTS, MAX_EQUIPMENT_LEVEL, MAX_INTIMACY,
    MIN_EQUIPMENT_LEVEL,
};

pub struct GameStore {
    state: GameState,
    bus: EventBus,
    balance: Box<dyn BalanceRules>,
}

impl Default for GameStore {
    fn default() -> Self {
        Self::new()
    }
}

impl GameStore {
    /// A store over a fresh default tree with no equipment bonuses.
    pub fn new() -> Self {
        Self::with_balance(Box::new(NoBonuses))
    }

    /// Injects the equipment/balance collaborator consulted after each
    /// equipment upgrade.
    pub fn with_balance(balance: Box<dyn BalanceRules>) -> Self {
        Self {
            state: GameState::fresh(),
            bus: EventBus::new(),
            balance,
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // QUERIES
    // ═══════════════════════════════════════════════════════════════════

    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Subscription surface for UI/audio collaborators.
    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn current_scene(&self) -> &str {
        &self.state.current_scene
    }

    pub fn character(&self, id: u32) -> Option<&CharacterState> {
        self.state.characters.get(&id)
    }

    pub fn statistics(&self) -> &PlayerStatistics {
        &self.state.statistics
    }

    pub fn flag(&self, name: &str) -> Option<&Value> {
        self.state.flags.get(name)
    }

    /// Returns the flag's value, or `default` when it was never set.
    /// Never mutates.
    pub fn get_flag(&self, name: &str, default: Value) -> Value {
        self.state.flags.get(name).cloned().unwrap_or(default)
    }

    pub fn is_unlocked(&self, category: &str, item: &str) -> bool {
        self.state.is_unlocked(category, item)
    }

    pub fn unlocked_in(&self, category: &str) -> &[String] {
        self.state
            .unlocks
            .get(category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn has_unsaved_progress(&self) -> bool {
        self.state.has_unsaved_progress
    }

    /// Which ending the current state would reach. Pure query.
    pub fn resolve_ending(&self) -> EndingType {
        evaluator::resolve_ending(&self.state)
    }

    /// One-line state overview for debug overlays and logs.
    pub fn debug_summary(&self) -> String {
        let stats = &self.state.statistics;
        format!(
            "scene={} played={} won={} perfect={} score={} characters={} unlocks={} dirty={}",
            self.state.current_scene,
            stats.games_played,
            stats.games_won,
            stats.perfect_game_count,
            stats.total_score,
            self.state.characters.len(),
            self.state
                .unlocks
                .values()
                .map(Vec::len)
                .sum::<usize>(),
            self.state.has_unsaved_progress,
        )
    }

    // ═══════════════════════════════════════════════════════════════════
    // MUTATIONS — scenes, dialogue, flags
    // ═══════════════════════════════════════════════════════════════════

    /// Records the previous scene as completed (no duplicates), switches
    /// to `name`, and resets the dialogue cursor.
    pub fn change_scene(&mut self, name: &str, data: Option<Value>) {
        let previous = std::mem::replace(&mut self.state.current_scene, name.to_string());
        if !self.state.completed_scenes.contains(&previous) {
            self.state.completed_scenes.push(previous.clone());
        }
        self.state.current_dialogue_index = 0;
        self.touch();
        info!("[Store] Scene {} -> {}", previous, name);
        self.bus.emit(&GameEvent::SceneChanged {
            previous,
            current: name.to_string(),
            data,
        });
    }

    pub fn advance_dialogue(&mut self) {
        let index = self.state.current_dialogue_index.saturating_add(1);
        self.set_dialogue_index(index);
    }

    pub fn set_dialogue_index(&mut self, index: u32) {
        self.state.current_dialogue_index = index;
        self.touch();
        self.bus.emit(&GameEvent::DialogueAdvanced {
            scene: self.state.current_scene.clone(),
            index,
        });
    }

    pub fn set_flag(&mut self, name: &str, value: Value) {
        let previous = self.state.flags.insert(name.to_string(), value.clone());
        self.touch();
        self.bus.emit(&GameEvent::FlagSet {
            name: name.to_string(),
            previous,
            value,
        });
    }

    // ═══════════════════════════════════════════════════════════════════
    // MUTATIONS — characters
    // ═══════════════════════════════════════════════════════════════════

    /// Shallow-merges `patch` into the character. Unknown id → no-op.
    pub fn update_character(&mut self, id: u32, patch: CharacterPatch) {
        let Some(ch) = self.state.characters.get_mut(&id) else {
            warn!("[Store] update_character: unknown character id {}", id);
            return;
        };
        if let Some(name) = patch.display_name {
            ch.display_name = name;
        }
        if let Some(name) = patch.equipment_name {
            ch.equipment_name = name;
        }
        if let Some(intimacy) = patch.intimacy {
            ch.intimacy = intimacy.min(MAX_INTIMACY);
        }
        let character = ch.clone();
        self.touch();
        self.bus
            .emit(&GameEvent::CharacterUpdated { id, character });
    }

    /// Sets the character's equipment level and name, then delegates bonus
    /// application to the balance collaborator.
    ///
    /// Policy for out-of-contract levels: the level is clamped into [1, 5],
    /// and a (clamped) level below the current one is rejected so the
    /// monotonic invariant holds even against confused callers.
    pub fn upgrade_equipment(&mut self, id: u32, new_level: u8, name: &str) {
        let Some(ch) = self.state.characters.get_mut(&id) else {
            warn!("[Store] upgrade_equipment: unknown character id {}", id);
            return;
        };
        let level = new_level.clamp(MIN_EQUIPMENT_LEVEL, MAX_EQUIPMENT_LEVEL);
        if level != new_level {
            warn!(
                "[Store] upgrade_equipment: level {} out of range, clamped to {}",
                new_level, level
            );
        }
        if level < ch.equipment_level {
            warn!(
                "[Store] upgrade_equipment: refusing downgrade {} -> {} for character {}",
                ch.equipment_level, level, id
            );
            return;
        }

        let previous_level = ch.equipment_level;
        ch.equipment_level = level;
        ch.equipment_name = name.to_string();
        self.balance.apply_equipment_bonus(ch, level);
        self.touch();
        info!(
            "[Store] Character {} equipment {} -> {} ({})",
            id, previous_level, level, name
        );
        self.bus.emit(&GameEvent::EquipmentUpgraded {
            id,
            previous_level,
            level,
            name: name.to_string(),
        });
    }

    /// Adds a non-negative amount of intimacy. Clamped to [0, 100].
    pub fn increase_intimacy(&mut self, id: u32, amount: u32) {
        self.update_intimacy(id, i64::from(amount));
    }

    /// Applies a signed intimacy delta. The result is clamped to [0, 100]
    /// regardless of the delta's sign or magnitude.
    pub fn update_intimacy(&mut self, id: u32, delta: i64) {
        let Some(ch) = self.state.characters.get_mut(&id) else {
            warn!("[Store] update_intimacy: unknown character id {}", id);
            return;
        };
        let previous = ch.intimacy;
        let current = (previous as i64)
            .saturating_add(delta)
            .clamp(0, MAX_INTIMACY as i64) as u8;
        ch.intimacy = current;
        self.touch();
        self.bus.emit(&GameEvent::IntimacyChanged {
            id,
            previous,
            current,
        });
    }

    // ═══════════════════════════════════════════════════════════════════
    // MUTATIONS — battles & puzzle statistics
    // ═══════════════════════════════════════════════════════════════════

    /// Books a finished battle on the character and the global statistics.
    pub fn record_battle_result(&mut self, id: u32, result: BattleResult, score: u64) {
        let Some(ch) = self.state.characters.get_mut(&id) else {
            warn!("[Store] record_battle_result: unknown character id {}", id);
            return;
        };
        ch.battle_count = ch.battle_count.saturating_add(1);
        if result.is_victory() {
            ch.victories = ch.victories.saturating_add(1);
        }
        ch.cumulative_score = ch.cumulative_score.saturating_add(score);
        let victories = ch.victories;

        let stats = &mut self.state.statistics;
        stats.games_played = stats.games_played.saturating_add(1);
        if result.is_victory() {
            stats.games_won = stats.games_won.saturating_add(1);
        }
        if result == BattleResult::PerfectWin {
            stats.perfect_game_count = stats.perfect_game_count.saturating_add(1);
        }
        stats.total_score = stats.total_score.saturating_add(score);

        self.touch();
        info!(
            "[Store] Battle on character {}: {} (+{} pts)",
            id,
            result.as_str(),
            score
        );
        self.bus.emit(&GameEvent::BattleRecorded {
            id,
            result,
            score,
            victories,
        });
    }

    /// Feeds puzzle counters: tiles cleared accumulate, the combo only
    /// ever raises the observed maximum.
    pub fn record_puzzle_progress(&mut self, tiles_cleared: u64, max_combo: u32) {
        let stats = &mut self.state.statistics;
        stats.total_tiles_cleared = stats.total_tiles_cleared.saturating_add(tiles_cleared);
        stats.max_combo_observed = stats.max_combo_observed.max(max_combo);
        self.touch();
        self.bus.emit(&GameEvent::PuzzleProgressRecorded {
            tiles_cleared,
            max_combo,
        });
    }

    /// Accumulates session play time into the statistics.
    pub fn add_play_time(&mut self, seconds: u64) {
        let stats = &mut self.state.statistics;
        stats.total_play_time_seconds = stats.total_play_time_seconds.saturating_add(seconds);
        let total = stats.total_play_time_seconds;
        self.touch();
        self.bus.emit(&GameEvent::PlayTimeAdded { seconds, total });
    }

    // ═══════════════════════════════════════════════════════════════════
    // MUTATIONS — unlocks & achievements
    // ═══════════════════════════════════════════════════════════════════

    /// Inserts `item` into the category's unlock set. Idempotent: the
    /// second call is a safe no-op and emits nothing. Returns whether the
    /// item was newly inserted.
    pub fn unlock(&mut self, category: &str, item: &str) -> bool {
        let items = self.state.unlocks.entry(category.to_string()).or_default();
        if items.iter().any(|i| i == item) {
            return false;
        }
        items.push(item.to_string());
        self.touch();
        info!("[Store] Unlocked {}/{}", category, item);
        self.bus.emit(&GameEvent::Unlocked {
            category: category.to_string(),
            item: item.to_string(),
        });
        true
    }

    /// Evaluates the achievement rule set and unlocks everything newly
    /// earned. Each first unlock emits an `Unlocked` event. Returns the
    /// newly earned ids.
    pub fn check_achievements(&mut self) -> Vec<&'static str> {
        let newly = evaluator::newly_earned(&self.state);
        for id in &newly {
            self.unlock(CATEGORY_ACHIEVEMENTS, id);
        }
        newly
    }

    // ═══════════════════════════════════════════════════════════════════
    // MUTATIONS — settings & reset
    // ═══════════════════════════════════════════════════════════════════

    pub fn update_settings(&mut self, patch: SettingsPatch) {
        let settings = &mut self.state.settings;
        if let Some(v) = patch.bgm_volume {
            settings.bgm_volume = v;
        }
        if let Some(v) = patch.sfx_volume {
            settings.sfx_volume = v;
        }
        if let Some(v) = patch.voice_volume {
            settings.voice_volume = v;
        }
        if let Some(v) = patch.text_speed {
            settings.text_speed = v;
        }
        if let Some(language) = patch.language {
            settings.language = language;
        }
        if let Some(fullscreen) = patch.fullscreen {
            settings.fullscreen = fullscreen;
        }
        settings.clamp_ranges();
        let settings = settings.clone();
        self.touch();
        self.bus.emit(&GameEvent::SettingsChanged { settings });
    }

    /// Replaces the tree with a fresh default instance, preserving
    /// `settings` and `player_id` across the reset.
    pub fn reset_game(&mut self) {
        let mut next = GameState::fresh();
        next.settings = self.state.settings.clone();
        next.player_id = self.state.player_id.clone();
        self.state = next;
        self.touch();
        info!("[Store] Game reset (settings and player id preserved)");
        self.bus.emit(&GameEvent::GameReset);
    }

    // ═══════════════════════════════════════════════════════════════════
    // PERSISTENCE
    // ═══════════════════════════════════════════════════════════════════

    /// Produces a deep, self-contained snapshot of the current tree.
    /// Pure read; the dirty flag is cleared by `mark_saved` once the host
    /// has durably stored the snapshot.
    pub fn snapshot(&self) -> SaveData {
        SaveData::from(&self.state)
    }

    /// Host callback after a snapshot reached durable storage.
    pub fn mark_saved(&mut self) {
        self.state.has_unsaved_progress = false;
    }

    /// Adopts a snapshot as the live tree, migrating on version skew.
    /// Either the swap fully succeeds or the previous tree is untouched.
    pub fn load(&mut self, snapshot: SaveData) -> Result<(), LoadError> {
        self.adopt(serde_json::to_value(&snapshot)?)
    }

    /// Adopts a snapshot from its JSON encoding.
    pub fn load_json(&mut self, json: &str) -> Result<(), LoadError> {
        self.adopt(serde_json::from_str(json)?)
    }

    fn adopt(&mut self, value: Value) -> Result<(), LoadError> {
        // Build the complete candidate tree first; the live tree is only
        // replaced once nothing can fail anymore.
        let mut next = save::decode(value)?.into_state();
        next.has_unsaved_progress = false;
        next.last_played_at = unix_now();
        self.state = next;
        info!("[Store] Snapshot adopted; scene is {}", self.state.current_scene);
        self.bus.emit(&GameEvent::StateLoaded {
            state: Box::new(self.state.clone()),
        });
        Ok(())
    }

    /// Every mutation funnels through here: dirty flag + activity stamp.
    fn touch(&mut self) {
        self.state.has_unsaved_progress = true;
        self.state.last_played_at = unix_now();
    }
}
