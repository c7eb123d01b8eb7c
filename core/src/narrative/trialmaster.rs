//! Trialmaster round-modifier disambiguation.
//!
//! One announcement line is genuinely ambiguous between `Ruin` and
//! `Stalking Ruin III`. Within one encounter each modifier appears at most
//! once, and a tier never regresses, which is enough to force most
//! ambiguous entries from their neighbours:
//!
//! - pass 1 seeds tier booleans from the unambiguous lines and forces
//!   entries where the evidence (or the entry's position) allows;
//! - pass 2 re-scans the survivors, because an assignment made in pass 1
//!   can disambiguate an entry that pass 1 visited too early;
//! - anything still open after both passes is assigned by a uniform random
//!   pick. That fallback is accepted imprecision, not a correctness
//!   guarantee: the log simply does not contain the answer.

use crate::game_data::{RoundModifier, RoundReading};

use super::run_info::UltimatumRound;

/// Which modifier tiers have been seen (or assigned) in this encounter.
#[derive(Debug, Default)]
struct SeenTiers {
    ruin: bool,
    ruin2: bool,
    ruin3: bool,
    sruin: bool,
    sruin2: bool,
    sruin3: bool,
}

impl SeenTiers {
    fn note(&mut self, modifier: RoundModifier) {
        match modifier {
            RoundModifier::Ruin => self.ruin = true,
            RoundModifier::Ruin2 => self.ruin2 = true,
            RoundModifier::Ruin3 => self.ruin3 = true,
            RoundModifier::StalkingRuin => self.sruin = true,
            RoundModifier::StalkingRuin2 => self.sruin2 = true,
            RoundModifier::StalkingRuin3 => self.sruin3 = true,
            _ => {}
        }
    }

    /// Decide an ambiguous entry when the evidence forces one reading.
    ///
    /// Any Ruin tier already present rules out `Ruin` (a modifier appears
    /// once, and a taken tier cannot re-enter at tier one). An already
    /// placed `Stalking Ruin III` rules itself out. The first round of an
    /// encounter, and an encounter whose stalking track never progressed,
    /// cannot produce a tier three.
    fn force(&self, position: usize) -> Option<RoundModifier> {
        if self.ruin || self.ruin2 || self.ruin3 {
            Some(RoundModifier::StalkingRuin3)
        } else if self.sruin3 {
            Some(RoundModifier::Ruin)
        } else if position == 0 {
            Some(RoundModifier::Ruin)
        } else if !self.sruin && !self.sruin2 {
            Some(RoundModifier::Ruin)
        } else {
            None
        }
    }
}

/// Resolve one encounter's round readings into concrete modifiers.
pub(crate) fn resolve_rounds(readings: &[RoundReading]) -> Vec<UltimatumRound> {
    let mut seen = SeenTiers::default();
    for reading in readings {
        if let RoundReading::Known(modifier) = reading {
            seen.note(*modifier);
        }
    }

    let mut resolved: Vec<Option<RoundModifier>> = readings
        .iter()
        .map(|r| match r {
            RoundReading::Known(m) => Some(*m),
            RoundReading::AmbiguousRuin => None,
        })
        .collect();

    // Two forcing passes: assignments made early in a pass can unlock
    // entries the pass already visited, hence the re-scan.
    for _pass in 0..2 {
        for (idx, slot) in resolved.iter_mut().enumerate() {
            if slot.is_none() {
                if let Some(modifier) = seen.force(idx) {
                    seen.note(modifier);
                    *slot = Some(modifier);
                }
            }
        }
    }

    // Last resort: the log does not determine the answer. Accepted
    // imprecision carried over from the reference behavior.
    for slot in resolved.iter_mut() {
        if slot.is_none() {
            let modifier = if rand::random::<bool>() {
                RoundModifier::Ruin
            } else {
                RoundModifier::StalkingRuin3
            };
            tracing::debug!("unresolvable ambiguous round, picked {modifier:?} at random");
            seen.note(modifier);
            *slot = Some(modifier);
        }
    }

    readings
        .iter()
        .zip(resolved)
        .map(|(reading, modifier)| UltimatumRound {
            modifier: modifier.unwrap_or(RoundModifier::Ruin),
            ambiguous: matches!(reading, RoundReading::AmbiguousRuin),
        })
        .collect()
}
