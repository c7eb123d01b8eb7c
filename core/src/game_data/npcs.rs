//! NPC name and dialogue phrase tables.
//!
//! Dialogue lines arrive as `<speaker>: <text>`. These tables decide which
//! speakers the engine cares about and which of their lines carry meaning
//! beyond "the NPC was present".

use phf::{phf_map, phf_set};

/// Masters whose missions can appear inside a map.
pub static MASTER_NPCS: phf::Set<&'static str> = phf_set! {
    "Einhar, Beastmaster",
    "Alva, the Explorer",
    "Niko, Master of the Depths",
    "Jun, Veiled Master",
    "Zana, Master Cartographer",
};

/// Atlas conquerors and their overseer.
pub static CONQUEROR_NPCS: phf::Set<&'static str> = phf_set! {
    "Sirus, Awakener of Worlds",
    "Baran, the Crusader",
    "Veritania, the Redeemer",
    "Al-Hezmin, the Hunter",
    "Drox, the Warlord",
};

/// League-mechanic NPCs with their own accumulation rules.
pub static LEAGUE_NPCS: phf::Set<&'static str> = phf_set! {
    "The Trialmaster",
    "Strange Voice",
    "Sister Cassia",
    "The Envoy",
    "The Maven",
    "Oshabi",
};

/// Map bosses with voiced lines. Presence of any line opens a battle
/// window in the area the line was heard in.
pub static MAP_BOSS_NPCS: phf::Set<&'static str> = phf_set! {
    "The Shaper",
    "The Elder",
    "Atziri, Queen of the Vaal",
    "The Eradicator",
    "The Infinite Hunger",
    "Kitava, the Insatiable",
    "The Brine King",
    "Shavronne the Returned",
    "Doedre the Defiler",
    "Maligaro the Mutilator",
    "The Plaguemaw",
    "Olof, Son of the Headsman",
};

/// Death-cry lines per boss. A matching line marks the boss kill; a later
/// duplicate overwrites the earlier one (multi-phase fights emit several).
pub static MAP_BOSS_DEATH_CRIES: phf::Map<&'static str, &'static str> = phf_map! {
    "The Shaper" => "It cannot end like this",
    "The Elder" => "The consciousness fades",
    "Atziri, Queen of the Vaal" => "An end to an eternity",
    "The Eradicator" => "The storm dies",
    "The Infinite Hunger" => "The hunger ends",
    "Kitava, the Insatiable" => "My feast is over",
    "The Brine King" => "Back to the depths",
    "Shavronne the Returned" => "Brutus, avenge me",
    "Doedre the Defiler" => "My curses fade",
    "Maligaro the Mutilator" => "My masterpiece, unfinished",
    "The Plaguemaw" => "The rot takes me",
    "Olof, Son of the Headsman" => "Father, I come",
};

/// Defeat lines per conqueror. Any other line from the same NPC is an
/// encounter taunt.
pub static CONQUEROR_DEFEAT_LINES: phf::Map<&'static str, &'static str> = phf_map! {
    "Sirus, Awakener of Worlds" => "At last, rest",
    "Baran, the Crusader" => "The crusade ends",
    "Veritania, the Redeemer" => "The cycle is broken",
    "Al-Hezmin, the Hunter" => "The hunter, hunted",
    "Drox, the Warlord" => "My banner falls",
};

/// Conqueror-specific currency, attributed to the defeat record when the
/// matching conqueror fell in the same run.
pub static CONQUEROR_CURRENCY: phf::Map<&'static str, &'static str> = phf_map! {
    "Crusader's Exalted Orb" => "Baran, the Crusader",
    "Redeemer's Exalted Orb" => "Veritania, the Redeemer",
    "Hunter's Exalted Orb" => "Al-Hezmin, the Hunter",
    "Warlord's Exalted Orb" => "Drox, the Warlord",
    "Awakener's Orb" => "Sirus, Awakener of Worlds",
};

/// Einhar capture lines for red (monstrous) beasts.
pub static EINHAR_RED_CAPTURE: phf::Set<&'static str> = phf_set! {
    "Haha! You are captured, stupid beast.",
    "You have been captured, beast. You will be a survivor, or you will be food.",
    "This one is deadly, exile. A mighty catch!",
};

/// Einhar capture lines for yellow (common) beasts.
pub static EINHAR_YELLOW_CAPTURE: phf::Set<&'static str> = phf_set! {
    "Beast is captured, exile. Einhar will take it from here.",
    "A fine little catch. The Menagerie grows.",
};

/// Einhar capture lines that do not reveal the beast's colour. The
/// extractor infers the colour afterwards when the rest of the hunt allows.
pub static EINHAR_GENERIC_CAPTURE: phf::Set<&'static str> = phf_set! {
    "The First Ones smile on this capture.",
    "Great job, exile! Einhar will take the beast now.",
};

/// Alva incursion-complete lines.
pub static ALVA_INCURSION_COMPLETE: phf::Set<&'static str> = phf_set! {
    "We're back! That was fantastic!",
    "Good work in there. The temple shifts.",
};

/// Niko sulphite pickup lines.
pub static NIKO_SULPHITE: phf::Set<&'static str> = phf_set! {
    "The darkness sings for this sulphite!",
    "More sulphite, more depth!",
};

/// Maven boss-witness acknowledgements.
pub static MAVEN_WITNESS: phf::Set<&'static str> = phf_set! {
    "Admirable.",
    "This one entertains me.",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_npc_tables_are_disjoint() {
        for name in MASTER_NPCS.iter() {
            assert!(!CONQUEROR_NPCS.contains(name));
            assert!(!LEAGUE_NPCS.contains(name));
            assert!(!MAP_BOSS_NPCS.contains(name));
        }
        for name in CONQUEROR_NPCS.iter() {
            assert!(!LEAGUE_NPCS.contains(name));
            assert!(!MAP_BOSS_NPCS.contains(name));
        }
    }

    #[test]
    fn test_every_death_cry_belongs_to_a_known_boss() {
        for boss in MAP_BOSS_DEATH_CRIES.keys() {
            assert!(MAP_BOSS_NPCS.contains(boss), "unknown boss {boss}");
        }
    }

    #[test]
    fn test_every_conqueror_has_defeat_line_and_currency() {
        for conq in CONQUEROR_NPCS.iter() {
            assert!(CONQUEROR_DEFEAT_LINES.contains_key(conq));
            assert!(CONQUEROR_CURRENCY.values().any(|c| c == conq));
        }
    }
}
