//! Read-only content interface consumed by the engine.
//!
//! The real game loads these records from CSV; that loader is a separate
//! subsystem. The engine only depends on the lookup contract here, and
//! every lookup may come back empty — presence is never assumed.

use std::collections::{BTreeMap, HashMap};

use crate::shared::{CharacterState, EndingType, ROSTER};

// ═══════════════════════════════════════════════════════════════════════
// RECORD TYPES
// ═══════════════════════════════════════════════════════════════════════

/// Static description of a playable character.
#[derive(Debug, Clone)]
pub struct CharacterDef {
    pub id: u32,
    pub name: String,
    pub title: String,
}

/// Equipment for one (character, level) pair.
#[derive(Debug, Clone)]
pub struct EquipmentDef {
    pub character_id: u32,
    pub level: u8,
    pub name: String,
    /// Flat score bonus granted while this equipment is worn.
    pub score_bonus: u64,
}

/// One line of scene dialogue. `dialogue_id` is monotonic within a scene
/// and defines playback order.
#[derive(Debug, Clone)]
pub struct DialogueLine {
    pub dialogue_id: u32,
    pub scene_id: String,
    /// None = narration.
    pub character_id: Option<u32>,
    pub text: String,
}

/// Presentation data for an ending tier.
#[derive(Debug, Clone)]
pub struct EndingDef {
    pub kind: EndingType,
    pub title: String,
    pub epilogue_scene: String,
}

// ═══════════════════════════════════════════════════════════════════════
// LOOKUP CONTRACT
// ═══════════════════════════════════════════════════════════════════════

/// Read-only lookups keyed by stable identifiers. Implemented by the
/// CSV-backed loader in the full game and by `StaticContent` here.
pub trait ContentSource {
    fn character(&self, id: u32) -> Option<&CharacterDef>;
    fn equipment(&self, character_id: u32, level: u8) -> Option<&EquipmentDef>;
    /// Lines for a scene, optionally restricted to one character, ordered
    /// by `dialogue_id`.
    fn dialogue(&self, scene_id: &str, character_id: Option<u32>) -> Vec<&DialogueLine>;
    fn ending(&self, kind: EndingType) -> Option<&EndingDef>;
}

/// Equipment/balance rules applied after an equipment upgrade. The store
/// sets level and name itself but delegates any bonus application here.
pub trait BalanceRules {
    fn apply_equipment_bonus(&self, character: &mut CharacterState, level: u8);
}

/// Default collaborator: upgrades carry no stat bonus.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoBonuses;

impl BalanceRules for NoBonuses {
    fn apply_equipment_bonus(&self, _character: &mut CharacterState, _level: u8) {}
}

// ═══════════════════════════════════════════════════════════════════════
// STATIC CONTENT — bundled reference data
// ═══════════════════════════════════════════════════════════════════════

/// In-memory content set mirroring the reference CSVs: the 3-character
/// roster, 5 equipment tiers per character, a handful of dialogue lines,
/// and the 4 ending definitions.
pub struct StaticContent {
    characters: BTreeMap<u32, CharacterDef>,
    equipment: HashMap<(u32, u8), EquipmentDef>,
    dialogue: Vec<DialogueLine>,
    endings: HashMap<EndingType, EndingDef>,
}

impl StaticContent {
    pub fn reference() -> Self {
        let titles = ["Tile Prodigy", "Quiet Strategist", "Lucky Charm"];
        let characters: BTreeMap<u32, CharacterDef> = ROSTER
            .iter()
            .zip(titles.iter())
            .map(|(&(id, name, _), &title)| {
                (
                    id,
                    CharacterDef {
                        id,
                        name: name.to_string(),
                        title: title.to_string(),
                    },
                )
            })
            .collect();

        let tier_names = ["Worn", "Sturdy", "Polished", "Engraved", "Legendary"];
        let mut equipment = HashMap::new();
        for &(id, _, starting) in ROSTER {
            // Level 1 keeps the roster's starting equipment name; higher
            // tiers derive from it.
            let base = starting.rsplit(' ').next().unwrap_or(starting);
            for level in 1..=5u8 {
                let name = if level == 1 {
                    starting.to_string()
                } else {
                    format!("{} {}", tier_names[(level - 1) as usize], base)
                };
                equipment.insert(
                    (id, level),
                    EquipmentDef {
                        character_id: id,
                        level,
                        name,
                        score_bonus: (level as u64 - 1) * 500,
                    },
                );
            }
        }

        let dialogue = vec![
            DialogueLine {
                dialogue_id: 1,
                scene_id: "scene_1".to_string(),
                character_id: None,
                text: "The parlor is quiet this early in the morning.".to_string(),
            },
            DialogueLine {
                dialogue_id: 2,
                scene_id: "scene_1".to_string(),
                character_id: Some(1),
                text: "You're here for a match, right? Sit down!".to_string(),
            },
            DialogueLine {
                dialogue_id: 3,
                scene_id: "scene_1".to_string(),
                character_id: Some(2),
                text: "...Don't let her rush you. Think three moves ahead.".to_string(),
            },
            DialogueLine {
                dialogue_id: 4,
                scene_id: "scene_2".to_string(),
                character_id: Some(3),
                text: "One more round! I can feel a perfect game coming.".to_string(),
            },
        ];

        let endings = [
            (EndingType::True, "Every Tile in Place", "ending_true"),
            (EndingType::Secret, "The Flawless Run", "ending_secret"),
            (EndingType::Normal, "Another Season", "ending_normal"),
            (EndingType::Bad, "Scattered Tiles", "ending_bad"),
        ]
        .into_iter()
        .map(|(kind, title, scene)| {
            (
                kind,
                EndingDef {
                    kind,
                    title: title.to_string(),
                    epilogue_scene: scene.to_string(),
                },
            )
        })
        .collect();

        Self {
            characters,
            equipment,
            dialogue,
            endings,
        }
    }
}

impl ContentSource for StaticContent {
    fn character(&self, id: u32) -> Option<&CharacterDef> {
        self.characters.get(&id)
    }

    fn equipment(&self, character_id: u32, level: u8) -> Option<&EquipmentDef> {
        self.equipment.get(&(character_id, level))
    }

    fn dialogue(&self, scene_id: &str, character_id: Option<u32>) -> Vec<&DialogueLine> {
        let mut lines: Vec<&DialogueLine> = self
            .dialogue
            .iter()
            .filter(|l| l.scene_id == scene_id)
            .filter(|l| character_id.is_none() || l.character_id == character_id)
            .collect();
        lines.sort_by_key(|l| l.dialogue_id);
        lines
    }

    fn ending(&self, kind: EndingType) -> Option<&EndingDef> {
        self.endings.get(&kind)
    }
}
