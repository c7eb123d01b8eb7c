//! The nested `run_info` accumulator.
//!
//! Serialized to JSON on the run row. Maps are `BTreeMap` so the persisted
//! JSON is stable across runs of the extractor.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::game_data::RoundModifier;

/// Nested statistics object produced by the narrative extractor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RunInfo {
    /// Set when the run produced zero items, zero kills, and zero XP.
    /// Ignored runs persist for history but never notify.
    pub ignored: bool,

    /// Total chaos value of the run's loot, set during finalization.
    pub loot_value: f64,
    pub loot_count: u32,

    pub deaths: u32,
    pub abnormal_disconnects: u32,
    pub level_ups: u32,
    pub last_level: Option<u32>,
    pub passives_allocated: u32,
    pub passives_unallocated: u32,
    pub town_visits: u32,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub notes: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub shrines: Vec<String>,
    /// Non-town areas entered after the primary one (boss arenas, side
    /// areas, abyssal depths).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sub_areas: Vec<String>,

    /// Dialogue line count per master present in the run.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub masters: BTreeMap<String, u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub einhar: Option<EinharRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alva: Option<AlvaRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub niko: Option<NikoRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jun: Option<JunRecord>,

    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub conquerors: BTreeMap<String, ConquerorRecord>,

    /// Battle window per area a boss spoke in.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub boss_battles: BTreeMap<String, BossBattle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub boss_summary: Option<BossSummary>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ultimatum: Option<UltimatumRecord>,

    pub maven_witnessed: u32,
    pub envoy: bool,
    pub delirium: bool,
    pub blight: bool,
    pub harvest: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EinharRecord {
    pub captures: u32,
    pub red_beasts: u32,
    pub yellow_beasts: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AlvaRecord {
    pub incursions: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NikoRecord {
    pub sulphite_pickups: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JunRecord {
    pub encounters: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConquerorRecord {
    pub encountered: bool,
    pub defeated: bool,
    /// Earliest taunt heard. "Earliest start wins."
    pub battle_start: Option<NaiveDateTime>,
    /// Latest defeat line heard. "Latest kill wins" — multi-phase fights
    /// emit several.
    pub defeated_at: Option<NaiveDateTime>,
    /// Conqueror-specific currency attributed to this defeat.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub drops: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BossBattle {
    pub started: Option<NaiveDateTime>,
    pub killed: Option<NaiveDateTime>,
}

/// One battle summary per run, derived from the earliest recorded start
/// and the latest recorded kill across primary and sub-areas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BossSummary {
    pub duration_secs: i64,
    pub deaths: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UltimatumRecord {
    pub rounds: Vec<UltimatumRound>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<UltimatumOutcome>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UltimatumOutcome {
    Won,
    Lost,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UltimatumRound {
    pub modifier: RoundModifier,
    /// True when the announcement line was ambiguous in the log and the
    /// modifier had to be inferred (or, failing that, picked at random).
    pub ambiguous: bool,
}
