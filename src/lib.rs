//! Progression — game-progression and persistence engine for a
//! visual-novel/puzzle game.
//!
//! The crate owns the single mutable save state of a play session: a
//! mutation API for every gameplay event (scene transitions, battle
//! outcomes, intimacy and equipment changes, flags), derived unlocks and
//! ending eligibility, and versioned snapshots with forward-compatible
//! migration. Rendering, audio, the puzzle minigame's rules, and the
//! actual save-file I/O all live with the host; they talk to this crate
//! through the mutation API, the query accessors, and the event bus.

pub mod content;
pub mod evaluator;
pub mod events;
pub mod save;
pub mod shared;
pub mod store;

pub use events::{EventBus, HandlerResult, SubscriptionId};
pub use save::{LoadError, SaveData};
pub use shared::{
    BattleResult, CharacterPatch, CharacterState, EndingType, EventKind, GameEvent, GameState,
    PlayerStatistics, Settings, SettingsPatch,
};
pub use store::GameStore;
