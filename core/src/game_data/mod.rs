//! Static game data tables.
//!
//! Everything the classifier and extractor need to know about the game world
//! lives here as data: NPC name sets, area classification tables, dialogue
//! phrase tables. Dispatch logic stays table-driven so new leagues extend
//! these files without touching the cascade.

mod areas;
mod npcs;
mod trialmaster;

pub use areas::*;
pub use npcs::*;
pub use trialmaster::*;
