//! Achievement and ending evaluation.
//!
//! Pure functions over the current state tree. Nothing here mutates or
//! emits; the store unlocks whatever `newly_earned` reports, and that
//! unlock is what produces the `Unlocked` events.

use crate::shared::{
    EndingType, GameState, CATEGORY_ACHIEVEMENTS, MAX_EQUIPMENT_LEVEL, MAX_INTIMACY,
};

// ═══════════════════════════════════════════════════════════════════════
// ACHIEVEMENT DEFINITIONS
// ═══════════════════════════════════════════════════════════════════════

/// Static description of a single achievement.
pub struct AchievementDef {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

/// The fixed rule set, evaluated in order.
pub const ACHIEVEMENTS: &[AchievementDef] = &[
    AchievementDef {
        id: "first_battle",
        name: "First Steps",
        description: "Play your first puzzle battle",
    },
    AchievementDef {
        id: "first_victory",
        name: "Opening Hand",
        description: "Win your first battle",
    },
    AchievementDef {
        id: "veteran_10",
        name: "Parlor Regular",
        description: "Win 10 battles",
    },
    AchievementDef {
        id: "perfect_1",
        name: "Flawless",
        description: "Finish a battle with a perfect game",
    },
    AchievementDef {
        id: "perfect_10",
        name: "Untouchable",
        description: "Finish 10 perfect games",
    },
    AchievementDef {
        id: "all_max_equipment",
        name: "Fully Outfitted",
        description: "Raise every character's equipment to level 5",
    },
    AchievementDef {
        id: "all_max_intimacy",
        name: "Hearts Aligned",
        description: "Reach 100 intimacy with every character",
    },
    AchievementDef {
        id: "inseparable",
        name: "Inseparable",
        description: "Reach 100 intimacy with any character",
    },
    AchievementDef {
        id: "score_100k",
        name: "Point Collector",
        description: "Accumulate 100,000 total score",
    },
    AchievementDef {
        id: "score_500k",
        name: "Point Hoarder",
        description: "Accumulate 500,000 total score",
    },
    AchievementDef {
        id: "combo_15",
        name: "Chain Lightning",
        description: "Land a 15-combo in one battle",
    },
    AchievementDef {
        id: "tiles_10k",
        name: "Tile Sweeper",
        description: "Clear 10,000 tiles in total",
    },
    AchievementDef {
        id: "storyteller",
        name: "Storyteller",
        description: "Complete 10 scenes",
    },
];

pub fn definition(id: &str) -> Option<&'static AchievementDef> {
    ACHIEVEMENTS.iter().find(|def| def.id == id)
}

/// Returns `true` if the achievement with the given id is satisfied by the
/// current state. Assumes the achievement is not yet unlocked.
fn condition_met(id: &str, state: &GameState) -> bool {
    let stats = &state.statistics;
    match id {
        // ── Battles ──────────────────────────────────────────────────────
        "first_battle"  => stats.games_played >= 1,
        "first_victory" => stats.games_won >= 1,
        "veteran_10"    => stats.games_won >= 10,
        "perfect_1"     => stats.perfect_game_count >= 1,
        "perfect_10"    => stats.perfect_game_count >= 10,

        // ── Characters ───────────────────────────────────────────────────
        "all_max_equipment" => {
            !state.characters.is_empty()
                && state
                    .characters
                    .values()
                    .all(|c| c.equipment_level >= MAX_EQUIPMENT_LEVEL)
        }
        "all_max_intimacy" => {
            !state.characters.is_empty()
                && state.characters.values().all(|c| c.intimacy >= MAX_INTIMACY)
        }
        "inseparable" => state.characters.values().any(|c| c.intimacy >= MAX_INTIMACY),

        // ── Score & puzzle counters ──────────────────────────────────────
        "score_100k" => stats.total_score >= 100_000,
        "score_500k" => stats.total_score >= 500_000,
        "combo_15"   => stats.max_combo_observed >= 15,
        "tiles_10k"  => stats.total_tiles_cleared >= 10_000,

        // ── Story ────────────────────────────────────────────────────────
        "storyteller" => state.completed_scenes.len() >= 10,

        _ => false,
    }
}

/// Evaluates the full rule set and returns exactly the achievement ids that
/// are satisfied now and not already present in the achievements unlock
/// category. Pure; the caller performs the unlocks.
pub fn newly_earned(state: &GameState) -> Vec<&'static str> {
    ACHIEVEMENTS
        .iter()
        .filter(|def| !state.is_unlocked(CATEGORY_ACHIEVEMENTS, def.id))
        .filter(|def| condition_met(def.id, state))
        .map(|def| def.id)
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════
// ENDING RESOLUTION
// ═══════════════════════════════════════════════════════════════════════

/// Resolves the reachable ending for the current state.
///
/// The tiers are checked in a fixed priority order and the first match
/// wins. Higher tiers are strict refinements of lower ones in the
/// reference content, so reordering these checks would silently demote
/// players who qualify for several tiers at once.
pub fn resolve_ending(state: &GameState) -> EndingType {
    let characters = &state.characters;
    let stats = &state.statistics;

    let all_max_equipment = !characters.is_empty()
        && characters
            .values()
            .all(|c| c.equipment_level >= MAX_EQUIPMENT_LEVEL);
    let all_max_intimacy =
        !characters.is_empty() && characters.values().all(|c| c.intimacy >= MAX_INTIMACY);

    // 1. TRUE: total mastery of equipment, bonds, and score.
    if all_max_equipment && all_max_intimacy && stats.total_score >= 500_000 {
        return EndingType::True;
    }

    // 2. SECRET: three perfect games, a spotless battle record, and the
    //    max-equipment achievement already earned.
    let never_lost = !characters.is_empty()
        && characters.values().all(|c| c.victories >= c.battle_count);
    if stats.perfect_game_count >= 3
        && never_lost
        && state.is_unlocked(CATEGORY_ACHIEVEMENTS, "all_max_equipment")
    {
        return EndingType::Secret;
    }

    // 3. NORMAL: everyone has fought, someone has won.
    let everyone_fought =
        !characters.is_empty() && characters.values().all(|c| c.battle_count > 0);
    let someone_won = characters.values().any(|c| c.victories > 0);
    if everyone_fought && someone_won {
        return EndingType::Normal;
    }

    // 4. BAD: fallback.
    EndingType::Bad
}
