//! Tabletop helpers for the game table: dice, death saves and in-world
//! language broadcasts. Pure logic only; the Discord side lives in
//! `bot::tabletop`.

pub mod death_save;
pub mod dice;
pub mod language;

pub use death_save::{DeathRollOutcome, DeathSaveTracker};
pub use dice::{DiceRoll, JungleRest};
pub use language::PendingBroadcasts;
