//! Log-line classifier.
//!
//! An ordered cascade of recognizers, first match wins. Each recognizer is
//! a pure function from line content to an optional [`Classified`]; the
//! NPC/keyword/area knowledge lives in `game_data` tables, so the cascade
//! itself never names a specific NPC.

use chrono::NaiveDateTime;

use super::event::{
    ChatDirection, EventPayload, GeneratedArea, NpcLine, ParsedEvent,
};
use super::raw::RawLine;
use crate::game_data::{
    CONQUEROR_NPCS, LEAGUE_NPCS, MAP_BOSS_NPCS, MASTER_NPCS,
};

/// Classifier output. Only `Event` is storable; the rest are control
/// signals consumed directly by the run tracker.
#[derive(Debug, Clone, PartialEq)]
pub enum Classified {
    Event(ParsedEvent),
    /// `Connecting to instance server at <addr>` — boundary bookkeeping.
    InstanceServer { timestamp: NaiveDateTime, addr: String },
    /// AFK toggle. Process-wide flag, not an event.
    AfkToggle { on: bool },
    /// Self-addressed whisper containing exactly `end`: manual run
    /// termination. Not stored as a note.
    EndSignal { timestamp: NaiveDateTime },
}

type Recognizer = fn(&Classifier, &RawLine) -> Option<Classified>;

/// First match wins; order matters (system lines before NPC dialogue, so a
/// hostile NPC named like a player cannot shadow a system message).
const CASCADE: &[Recognizer] = &[
    Classifier::recognize_system,
    Classifier::recognize_whisper,
    Classifier::recognize_passives,
    Classifier::recognize_generated_area,
    Classifier::recognize_instance_server,
    Classifier::recognize_npc_dialogue,
];

pub struct Classifier {
    /// Own character name, for self-addressed whisper detection.
    character: String,
}

impl Classifier {
    pub fn new(character: impl Into<String>) -> Self {
        Self { character: character.into() }
    }

    /// Classify one raw line. `None` drops the line: expected for engine
    /// spam, logged for sentinel/whisper lines which should always match.
    pub fn classify(&self, raw: &RawLine) -> Option<Classified> {
        for recognize in CASCADE {
            if let Some(classified) = recognize(self, raw) {
                return Some(classified);
            }
        }

        if raw.content.starts_with(": ") || raw.content.starts_with('@') {
            tracing::warn!("unclassifiable line: {:?}", raw.content);
        } else {
            tracing::trace!("ignored line: {:?}", raw.content);
        }
        None
    }

    fn event(&self, raw: &RawLine, payload: EventPayload) -> Option<Classified> {
        Some(Classified::Event(ParsedEvent { timestamp: raw.timestamp, payload }))
    }

    // --- Recognizers ---

    /// `": "`-prefixed system messages.
    fn recognize_system(&self, raw: &RawLine) -> Option<Classified> {
        let text = raw.content.strip_prefix(": ")?;

        if let Some(rest) = text.strip_prefix("You have entered ") {
            let area = rest.strip_suffix('.').unwrap_or(rest);
            return self.event(raw, EventPayload::Entered { area: area.to_string() });
        }

        if let Some(rest) = text.strip_prefix("AFK mode is now ") {
            // Not an event: flips the process-wide flag and stops here.
            let on = rest.starts_with("ON");
            return Some(Classified::AfkToggle { on });
        }

        if text == "You have been slain." {
            return self.event(raw, EventPayload::Slain { character: self.character.clone() });
        }
        if let Some(name) = text.strip_suffix(" has been slain.") {
            return self.event(raw, EventPayload::Slain { character: name.to_string() });
        }

        if let Some((name, rest)) = text.split_once(" is now level ") {
            let level = rest.trim_end_matches('.').parse().ok()?;
            // Strip the parenthesized class: "Orion (Juggernaut)"
            let character = name.split(" (").next().unwrap_or(name).to_string();
            return self.event(raw, EventPayload::Level { character, level });
        }

        if let Some(rest) = text.strip_prefix("Abnormal disconnect: ") {
            return self.event(raw, EventPayload::AbnormalDisconnect { reason: rest.to_string() });
        }

        if let Some(rest) = text.strip_prefix("You have gained ") {
            if let Some(name) = rest.strip_suffix(" Shrine.") {
                return self.event(raw, EventPayload::Shrine { name: name.to_string() });
            }
        }

        None
    }

    /// `@From <char>: <text>` / `@To <char>: <text>` whispers.
    fn recognize_whisper(&self, raw: &RawLine) -> Option<Classified> {
        let rest = raw.content.strip_prefix('@')?;
        let (direction, rest) = if let Some(r) = rest.strip_prefix("To ") {
            (ChatDirection::To, r)
        } else if let Some(r) = rest.strip_prefix("From ") {
            (ChatDirection::From, r)
        } else {
            return None;
        };

        let (character, text) = rest.split_once(": ")?;
        let character = character.to_string();
        let text = text.to_string();

        if direction == ChatDirection::To && character == self.character {
            if text.trim() == "end" {
                return Some(Classified::EndSignal { timestamp: raw.timestamp });
            }
            return self.event(raw, EventPayload::Note { text });
        }

        self.event(raw, EventPayload::Chat { direction, character, text })
    }

    /// Passive skill point allocation lines.
    fn recognize_passives(&self, raw: &RawLine) -> Option<Classified> {
        if let Some(rest) = raw.content.strip_prefix("Successfully allocated passive skill id: ") {
            return self.event(raw, EventPayload::Allocated { skill: rest.to_string() });
        }
        if let Some(rest) = raw.content.strip_prefix("Successfully unallocated passive skill id: ")
        {
            return self.event(raw, EventPayload::Unallocated { skill: rest.to_string() });
        }
        None
    }

    /// `Generating level 83 area "MapWorldsGlacier" with seed 2891409203`
    fn recognize_generated_area(&self, raw: &RawLine) -> Option<Classified> {
        let rest = raw.content.strip_prefix("Generating level ")?;
        let (level, rest) = rest.split_once(" area \"")?;
        let (area_id, rest) = rest.split_once("\" with seed ")?;
        let payload = EventPayload::GeneratedArea(GeneratedArea {
            level: level.parse().ok()?,
            area_id: area_id.to_string(),
            seed: rest.trim().parse().ok()?,
        });
        self.event(raw, payload)
    }

    /// `Connecting to instance server at 169.63.67.235:6112`
    fn recognize_instance_server(&self, raw: &RawLine) -> Option<Classified> {
        let addr = raw.content.strip_prefix("Connecting to instance server at ")?;
        Some(Classified::InstanceServer {
            timestamp: raw.timestamp,
            addr: addr.trim().to_string(),
        })
    }

    /// `<Name>: <text>` dialogue from NPCs the engine tracks. Anything
    /// else shaped like dialogue is local chat and drops silently.
    fn recognize_npc_dialogue(&self, raw: &RawLine) -> Option<Classified> {
        let (npc, text) = raw.content.split_once(": ")?;
        let line = NpcLine { npc: npc.to_string(), text: text.to_string() };

        let payload = if MASTER_NPCS.contains(npc) {
            EventPayload::Master(line)
        } else if CONQUEROR_NPCS.contains(npc) {
            EventPayload::Conqueror(line)
        } else if LEAGUE_NPCS.contains(npc) {
            EventPayload::LeagueNpc(line)
        } else if MAP_BOSS_NPCS.contains(npc) {
            EventPayload::MapBoss(line)
        } else {
            return None;
        };
        self.event(raw, payload)
    }
}
