//! Trialmaster round tables.
//!
//! Each Ultimatum round opens with one Trialmaster line announcing the
//! round's modifier. Most lines map to exactly one modifier; one line is
//! genuinely ambiguous between two identities (`Ruin` and `Stalking Ruin
//! III`) and is resolved later by the extractor.

use phf::phf_map;
use serde::{Deserialize, Serialize};

/// Round modifiers the engine distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RoundModifier {
    Ruin,
    Ruin2,
    Ruin3,
    StalkingRuin,
    StalkingRuin2,
    StalkingRuin3,
    ShrinkingArena,
    ChaoticOutbreak,
    BloodPact,
    HinderedEscape,
}

/// What a single Trialmaster round line tells us.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundReading {
    Known(RoundModifier),
    /// The line is either `Ruin` or `Stalking Ruin III`; nothing in the
    /// text itself distinguishes them.
    AmbiguousRuin,
}

/// Trialmaster round-announcement lines.
pub static TRIALMASTER_ROUNDS: phf::Map<&'static str, RoundReading> = phf_map! {
    "Let ruin rain upon you!" => RoundReading::AmbiguousRuin,
    "Ruin, doubled!" => RoundReading::Known(RoundModifier::Ruin2),
    "Ruin, tripled!" => RoundReading::Known(RoundModifier::Ruin3),
    "A ruin that hunts." => RoundReading::Known(RoundModifier::StalkingRuin),
    "The hunting ruin sharpens." => RoundReading::Known(RoundModifier::StalkingRuin2),
    "The walls hunger." => RoundReading::Known(RoundModifier::ShrinkingArena),
    "Embrace the chaos!" => RoundReading::Known(RoundModifier::ChaoticOutbreak),
    "Your blood, your wager." => RoundReading::Known(RoundModifier::BloodPact),
    "No escape. Not this time." => RoundReading::Known(RoundModifier::HinderedEscape),
};

/// Line spoken when the player banks their winnings.
pub const TRIALMASTER_WIN: &str = "Take your winnings, and my respect.";

/// Line spoken when the wager is lost.
pub const TRIALMASTER_LOSS: &str = "The wager is mine.";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_lookup() {
        assert_eq!(
            TRIALMASTER_ROUNDS.get("Ruin, doubled!"),
            Some(&RoundReading::Known(RoundModifier::Ruin2))
        );
        assert_eq!(
            TRIALMASTER_ROUNDS.get("Let ruin rain upon you!"),
            Some(&RoundReading::AmbiguousRuin)
        );
        assert_eq!(TRIALMASTER_ROUNDS.get("Good luck, exile."), None);
    }
}
