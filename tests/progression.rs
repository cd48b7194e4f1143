//! End-to-end tests for the progression engine.
//!
//! These drive the public surface only — the mutation API, the event bus,
//! the evaluator through `check_achievements`, and snapshot round-trips —
//! the way a scene controller and the puzzle engine would at runtime.
//!
//! Run with: `cargo test --test progression`

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::json;

use progression::shared::{CATEGORY_ACHIEVEMENTS, CATEGORY_ENDINGS};
use progression::{
    BattleResult, EndingType, EventKind, GameEvent, GameStore, SaveData, SettingsPatch,
};

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Subscribes a collector for one event kind and returns the shared log.
fn collect_events(store: &GameStore, kind: EventKind) -> Rc<RefCell<Vec<GameEvent>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    let log2 = Rc::clone(&log);
    store.bus().on(kind, move |event| {
        log2.borrow_mut().push(event.clone());
        Ok(())
    });
    log
}

/// Drives a store to the point where every character is maxed out.
fn max_out(store: &mut GameStore) {
    for id in [1u32, 2, 3] {
        store.upgrade_equipment(id, 5, "Legendary Gear");
        store.update_intimacy(id, 100);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Battle scenario from the balance sheet
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_battle_scenario_counters_and_first_perfect_achievement() {
    let mut store = GameStore::new();

    store.record_battle_result(1, BattleResult::PerfectWin, 1000);
    let first = store.check_achievements();
    assert!(
        first.contains(&"perfect_1"),
        "first perfect game must earn perfect_1, got {:?}",
        first
    );

    store.record_battle_result(1, BattleResult::PerfectWin, 1000);
    store.record_battle_result(1, BattleResult::PerfectWin, 1000);
    store.record_battle_result(2, BattleResult::Win, 500);
    store.record_battle_result(3, BattleResult::Win, 500);

    let stats = store.statistics();
    assert_eq!(stats.perfect_game_count, 3);
    assert_eq!(stats.games_won, 5);
    assert_eq!(stats.games_played, 5);
    assert_eq!(stats.total_score, 4000);
    assert_eq!(store.character(1).unwrap().victories, 3);

    let again = store.check_achievements();
    assert!(
        !again.contains(&"perfect_1"),
        "perfect_1 must not be re-reported, got {:?}",
        again
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Scenes and events
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_scene_flow_events_carry_previous_and_current() {
    let mut store = GameStore::new();
    let log = collect_events(&store, EventKind::SceneChanged);

    store.change_scene("scene_1", Some(json!({"entry": "prologue"})));
    store.change_scene("title", None);

    let log = log.borrow();
    assert_eq!(log.len(), 2);
    match &log[0] {
        GameEvent::SceneChanged {
            previous,
            current,
            data,
        } => {
            assert_eq!(previous, "title");
            assert_eq!(current, "scene_1");
            assert_eq!(data.as_ref().unwrap()["entry"], json!("prologue"));
        }
        other => panic!("unexpected event {:?}", other),
    }
    match &log[1] {
        GameEvent::SceneChanged {
            previous, current, ..
        } => {
            assert_eq!(previous, "scene_1");
            assert_eq!(current, "title");
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[test]
fn test_subscriber_failure_never_reaches_the_mutating_caller() {
    let mut store = GameStore::new();
    store
        .bus()
        .on(EventKind::BattleRecorded, |_| Err("ui exploded".to_string()));
    let log = collect_events(&store, EventKind::BattleRecorded);

    // Must not panic, and the second subscriber still observes the event.
    store.record_battle_result(1, BattleResult::Win, 100);
    assert_eq!(log.borrow().len(), 1);
    assert_eq!(store.statistics().games_played, 1);
}

// ─────────────────────────────────────────────────────────────────────────────
// Endings through the full surface
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_true_ending_route_end_to_end() {
    let mut store = GameStore::new();
    max_out(&mut store);
    for _ in 0..50 {
        store.record_battle_result(1, BattleResult::PerfectWin, 10_000);
    }
    assert!(store.statistics().total_score >= 500_000);

    let earned = store.check_achievements();
    assert!(earned.contains(&"all_max_equipment"));
    assert!(earned.contains(&"all_max_intimacy"));
    assert!(earned.contains(&"score_500k"));

    // Qualifies for SECRET too (perfects, spotless record, achievement
    // unlocked) — priority order must still pick TRUE.
    assert_eq!(store.resolve_ending(), EndingType::True);

    assert!(store.unlock(CATEGORY_ENDINGS, EndingType::True.as_str()));
    assert!(store.is_unlocked(CATEGORY_ENDINGS, "true_ending"));
}

#[test]
fn test_secret_ending_route_end_to_end() {
    let mut store = GameStore::new();
    for id in [1u32, 2, 3] {
        store.upgrade_equipment(id, 5, "Legendary Gear");
        store.record_battle_result(id, BattleResult::PerfectWin, 1000);
    }
    store.check_achievements();
    assert!(store.is_unlocked(CATEGORY_ACHIEVEMENTS, "all_max_equipment"));

    // Score and intimacy are nowhere near the TRUE thresholds.
    assert_eq!(store.resolve_ending(), EndingType::Secret);
}

#[test]
fn test_one_loss_downgrades_secret_to_normal() {
    let mut store = GameStore::new();
    for id in [1u32, 2, 3] {
        store.upgrade_equipment(id, 5, "Legendary Gear");
        store.record_battle_result(id, BattleResult::PerfectWin, 1000);
    }
    store.check_achievements();
    store.record_battle_result(2, BattleResult::Loss, 0);

    assert_eq!(store.resolve_ending(), EndingType::Normal);
}

// ─────────────────────────────────────────────────────────────────────────────
// Persistence round-trips
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_save_load_round_trip_preserves_observable_state() {
    let mut store = GameStore::new();
    store.change_scene("scene_2", None);
    store.set_flag("route", json!("ren"));
    store.update_intimacy(2, 64);
    store.upgrade_equipment(2, 3, "Polished Deck");
    store.record_battle_result(2, BattleResult::Win, 777);
    store.unlock("gallery", "cg_02");
    store.check_achievements();

    let json = store.snapshot().to_json().unwrap();

    let mut restored = GameStore::new();
    restored.load_json(&json).unwrap();

    let a = store.state();
    let b = restored.state();
    assert_eq!(b.player_id, a.player_id);
    assert_eq!(b.current_scene, a.current_scene);
    assert_eq!(b.completed_scenes, a.completed_scenes);
    assert_eq!(b.flags, a.flags);
    assert_eq!(b.characters, a.characters);
    assert_eq!(b.statistics, a.statistics);
    assert_eq!(b.unlocks, a.unlocks);
    assert_eq!(b.settings, a.settings);
    // Timestamps and the dirty flag may legitimately differ.
    assert!(!b.has_unsaved_progress);
}

#[test]
fn test_loading_an_old_snapshot_migrates_and_keeps_playing() {
    // A v0.9 save from before flags and puzzle statistics existed.
    let old_save = r#"{
        "schema_version": "0.9.0",
        "current_scene": "scene_4",
        "completed_scenes": ["title", "scene_1", "scene_2", "scene_3"],
        "player": {
            "player_id": "player_legacy00001",
            "statistics": { "games_played": 8, "games_won": 6 }
        },
        "characters": {
            "1": { "display_name": "Sakura", "equipment_level": 3, "intimacy": 40 }
        },
        "obsolete_audio_cache": { "ignored": true }
    }"#;

    let mut store = GameStore::new();
    store.load_json(old_save).unwrap();

    let state = store.state();
    assert_eq!(state.current_scene, "scene_4");
    assert_eq!(state.player_id, "player_legacy00001");
    assert_eq!(state.statistics.games_played, 8);
    assert_eq!(state.statistics.games_won, 6);
    assert!(state.flags.is_empty(), "missing flags default to empty");
    assert_eq!(state.characters.len(), 3, "roster gaps filled from defaults");
    assert_eq!(state.characters[&1].equipment_level, 3);
    assert_eq!(state.characters[&2].equipment_level, 1);

    // The migrated tree is fully live: keep playing on it.
    store.record_battle_result(2, BattleResult::Win, 300);
    assert_eq!(store.statistics().games_played, 9);
}

#[test]
fn test_snapshot_struct_load_matches_json_load() {
    let mut store = GameStore::new();
    store.change_scene("scene_1", None);
    store.update_intimacy(3, 33);
    let snapshot: SaveData = store.snapshot();

    let mut via_struct = GameStore::new();
    via_struct.load(snapshot.clone()).unwrap();

    let mut via_json = GameStore::new();
    via_json.load_json(&snapshot.to_json().unwrap()).unwrap();

    assert_eq!(via_struct.state().characters, via_json.state().characters);
    assert_eq!(
        via_struct.state().current_scene,
        via_json.state().current_scene
    );
}

// ─────────────────────────────────────────────────────────────────────────────
// Reset and settings
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_reset_survivors_and_casualties() {
    let mut store = GameStore::new();
    let player_id = store.state().player_id.clone();
    store.update_settings(SettingsPatch {
        text_speed: Some(2.5),
        fullscreen: Some(true),
        ..Default::default()
    });
    store.change_scene("scene_3", None);
    store.unlock("gallery", "cg_09");
    let reset_log = collect_events(&store, EventKind::GameReset);

    store.reset_game();

    let state = store.state();
    assert_eq!(state.player_id, player_id, "player id survives reset");
    assert_eq!(state.settings.text_speed, 2.5, "settings survive reset");
    assert!(state.settings.fullscreen);
    assert_eq!(state.current_scene, "title");
    assert!(state.completed_scenes.is_empty());
    assert!(state.unlocks.is_empty());
    assert_eq!(reset_log.borrow().len(), 1);
}

#[test]
fn test_settings_patch_clamps_volumes() {
    let mut store = GameStore::new();
    store.update_settings(SettingsPatch {
        bgm_volume: Some(3.0),
        sfx_volume: Some(-1.0),
        ..Default::default()
    });
    let settings = &store.state().settings;
    assert_eq!(settings.bgm_volume, 1.0);
    assert_eq!(settings.sfx_volume, 0.0);
}
