//! Typed event taxonomy.
//!
//! A classified line becomes one `EventPayload` variant; the payload is
//! immutable once created. `EventType` is the closed set of storable event
//! kinds — scheduler-internal markers (instance-server lines, AFK toggles,
//! the manual end signal) are carried by [`super::Classified`] instead and
//! never persisted.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Closed set of storable event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventType {
    Entered,
    Slain,
    Level,
    Note,
    Chat,
    AbnormalDisconnect,
    Allocated,
    Unallocated,
    Shrine,
    Master,
    Conqueror,
    LeagueNpc,
    MapBoss,
    GeneratedArea,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Entered => "entered",
            Self::Slain => "slain",
            Self::Level => "level",
            Self::Note => "note",
            Self::Chat => "chat",
            Self::AbnormalDisconnect => "abnormalDisconnect",
            Self::Allocated => "allocated",
            Self::Unallocated => "unallocated",
            Self::Shrine => "shrine",
            Self::Master => "master",
            Self::Conqueror => "conqueror",
            Self::LeagueNpc => "leagueNPC",
            Self::MapBoss => "mapBoss",
            Self::GeneratedArea => "generatedArea",
        };
        f.write_str(s)
    }
}

/// Whisper direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChatDirection {
    To,
    From,
}

/// An NPC dialogue line, split into speaker and text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NpcLine {
    pub npc: String,
    pub text: String,
}

/// Payload of an area-generation line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedArea {
    pub level: u32,
    pub area_id: String,
    pub seed: u64,
}

/// Structured payload of one storable event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum EventPayload {
    Entered { area: String },
    Slain { character: String },
    Level { character: String, level: u32 },
    Note { text: String },
    Chat { direction: ChatDirection, character: String, text: String },
    AbnormalDisconnect { reason: String },
    Allocated { skill: String },
    Unallocated { skill: String },
    Shrine { name: String },
    Master(NpcLine),
    Conqueror(NpcLine),
    LeagueNpc(NpcLine),
    MapBoss(NpcLine),
    GeneratedArea(GeneratedArea),
}

impl EventPayload {
    pub fn event_type(&self) -> EventType {
        match self {
            Self::Entered { .. } => EventType::Entered,
            Self::Slain { .. } => EventType::Slain,
            Self::Level { .. } => EventType::Level,
            Self::Note { .. } => EventType::Note,
            Self::Chat { .. } => EventType::Chat,
            Self::AbnormalDisconnect { .. } => EventType::AbnormalDisconnect,
            Self::Allocated { .. } => EventType::Allocated,
            Self::Unallocated { .. } => EventType::Unallocated,
            Self::Shrine { .. } => EventType::Shrine,
            Self::Master(_) => EventType::Master,
            Self::Conqueror(_) => EventType::Conqueror,
            Self::LeagueNpc(_) => EventType::LeagueNpc,
            Self::MapBoss(_) => EventType::MapBoss,
            Self::GeneratedArea(_) => EventType::GeneratedArea,
        }
    }
}

/// A classified, timestamped event ready for the scheduler.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedEvent {
    pub timestamp: NaiveDateTime,
    pub payload: EventPayload,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_json_round_trip() {
        let payload = EventPayload::Master(NpcLine {
            npc: "Einhar, Beastmaster".to_string(),
            text: "Haha! You are captured, stupid beast.".to_string(),
        });
        let json = serde_json::to_string(&payload).unwrap();
        let back: EventPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(back, payload);
    }

    #[test]
    fn test_generated_area_round_trip() {
        let payload = EventPayload::GeneratedArea(GeneratedArea {
            level: 83,
            area_id: "MapWorldsGlacier".to_string(),
            seed: 2891409203,
        });
        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("generatedArea"));
        assert_eq!(serde_json::from_str::<EventPayload>(&json).unwrap(), payload);
    }
}
