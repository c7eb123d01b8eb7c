//! Narrative extractor.
//!
//! A single left-to-right reduction over a run's ordered event window,
//! producing the nested [`RunInfo`] statistics object. Each accumulation
//! rule is independent; ordering only matters where later events extend or
//! overwrite partial state for the same sub-key (battle starts keep the
//! earliest timestamp, kill lines keep the latest).

mod run_info;
mod trialmaster;

pub use run_info::{
    AlvaRecord, BossBattle, BossSummary, ConquerorRecord, EinharRecord, JunRecord, NikoRecord,
    RunInfo, UltimatumOutcome, UltimatumRecord, UltimatumRound,
};

use chrono::NaiveDateTime;

use crate::client_log::{EventPayload, NpcLine};
use crate::game_data::{
    is_town, ALVA_INCURSION_COMPLETE, CONQUEROR_CURRENCY, CONQUEROR_DEFEAT_LINES,
    EINHAR_GENERIC_CAPTURE, EINHAR_RED_CAPTURE, EINHAR_YELLOW_CAPTURE, MAP_BOSS_DEATH_CRIES,
    MAVEN_WITNESS, NIKO_SULPHITE, RoundReading, TRIALMASTER_LOSS, TRIALMASTER_ROUNDS,
    TRIALMASTER_WIN,
};
use crate::store::StoredEvent;

/// One priced, non-town, non-equipped drop from the loot walk. Input to
/// the conqueror-currency fix-up.
#[derive(Debug, Clone, PartialEq)]
pub struct PricedDrop {
    pub name: String,
    pub value: f64,
    pub timestamp: NaiveDateTime,
}

/// Extraction inputs beyond the event window itself.
pub struct ExtractContext<'a> {
    /// The area the run opened in.
    pub primary_area: &'a str,
    pub loot: &'a [PricedDrop],
}

/// Reduce a run's event window into its `run_info` object.
pub fn extract(events: &[StoredEvent], ctx: &ExtractContext<'_>) -> RunInfo {
    let mut info = RunInfo::default();
    let mut current_area = ctx.primary_area.to_string();
    let mut einhar_uncolored = 0u32;
    let mut rounds: Vec<RoundReading> = Vec::new();

    for event in events {
        let Some(payload) = event.payload() else { continue };
        match payload {
            EventPayload::Entered { area } => {
                if is_town(&area) {
                    info.town_visits += 1;
                } else if area != ctx.primary_area && !info.sub_areas.contains(&area) {
                    info.sub_areas.push(area.clone());
                }
                current_area = area;
            }
            EventPayload::Slain { .. } => info.deaths += 1,
            EventPayload::AbnormalDisconnect { .. } => info.abnormal_disconnects += 1,
            EventPayload::Level { level, .. } => {
                info.level_ups += 1;
                info.last_level = Some(level);
            }
            EventPayload::Allocated { .. } => info.passives_allocated += 1,
            EventPayload::Unallocated { .. } => info.passives_unallocated += 1,
            EventPayload::Shrine { name } => info.shrines.push(name),
            EventPayload::Note { text } => info.notes.push(text),
            EventPayload::Chat { .. } | EventPayload::GeneratedArea(_) => {}
            EventPayload::Master(line) => apply_master(&mut info, &line, &mut einhar_uncolored),
            EventPayload::Conqueror(line) => {
                apply_conqueror(&mut info, &line, event.timestamp);
            }
            EventPayload::LeagueNpc(line) => {
                apply_league_npc(&mut info, &line, &mut rounds);
            }
            EventPayload::MapBoss(line) => {
                apply_map_boss(&mut info, &line, event.timestamp, &current_area);
            }
        }
    }

    if !rounds.is_empty() {
        let record = info.ultimatum.get_or_insert_default();
        record.rounds = trialmaster::resolve_rounds(&rounds);
    }

    finish_einhar(&mut info, einhar_uncolored);
    summarize_boss_battles(&mut info, events);
    attribute_conqueror_drops(&mut info, ctx.loot);

    info
}

fn apply_master(info: &mut RunInfo, line: &NpcLine, einhar_uncolored: &mut u32) {
    *info.masters.entry(line.npc.clone()).or_default() += 1;

    match line.npc.as_str() {
        "Einhar, Beastmaster" => {
            let einhar = info.einhar.get_or_insert_default();
            if EINHAR_RED_CAPTURE.contains(line.text.as_str()) {
                einhar.captures += 1;
                einhar.red_beasts += 1;
            } else if EINHAR_YELLOW_CAPTURE.contains(line.text.as_str()) {
                einhar.captures += 1;
                einhar.yellow_beasts += 1;
            } else if EINHAR_GENERIC_CAPTURE.contains(line.text.as_str()) {
                einhar.captures += 1;
                *einhar_uncolored += 1;
            }
        }
        "Alva, the Explorer" => {
            let alva = info.alva.get_or_insert_default();
            if ALVA_INCURSION_COMPLETE.contains(line.text.as_str()) {
                alva.incursions += 1;
            }
        }
        "Niko, Master of the Depths" => {
            let niko = info.niko.get_or_insert_default();
            if NIKO_SULPHITE.contains(line.text.as_str()) {
                niko.sulphite_pickups += 1;
            }
        }
        "Jun, Veiled Master" => {
            info.jun.get_or_insert_default().encounters += 1;
        }
        _ => {}
    }
}

fn apply_conqueror(info: &mut RunInfo, line: &NpcLine, timestamp: NaiveDateTime) {
    let record = info.conquerors.entry(line.npc.clone()).or_default();
    record.encountered = true;

    let is_defeat = CONQUEROR_DEFEAT_LINES
        .get(line.npc.as_str())
        .is_some_and(|phrase| line.text.contains(phrase));

    if is_defeat {
        record.defeated = true;
        // Latest defeat line wins (phase transitions repeat it).
        record.defeated_at = Some(timestamp);
    } else if record.battle_start.is_none() {
        // Earliest taunt wins.
        record.battle_start = Some(timestamp);
    }
}

fn apply_league_npc(info: &mut RunInfo, line: &NpcLine, rounds: &mut Vec<RoundReading>) {
    match line.npc.as_str() {
        "The Trialmaster" => {
            if let Some(reading) = TRIALMASTER_ROUNDS.get(line.text.as_str()) {
                rounds.push(*reading);
            } else if line.text == TRIALMASTER_WIN {
                info.ultimatum.get_or_insert_default().outcome = Some(UltimatumOutcome::Won);
            } else if line.text == TRIALMASTER_LOSS {
                info.ultimatum.get_or_insert_default().outcome = Some(UltimatumOutcome::Lost);
            }
        }
        "Strange Voice" => info.delirium = true,
        "Sister Cassia" => info.blight = true,
        "Oshabi" => info.harvest = true,
        "The Envoy" => info.envoy = true,
        "The Maven" => {
            if MAVEN_WITNESS.contains(line.text.as_str()) {
                info.maven_witnessed += 1;
            }
        }
        _ => {}
    }
}

fn apply_map_boss(info: &mut RunInfo, line: &NpcLine, timestamp: NaiveDateTime, area: &str) {
    let battle = info.boss_battles.entry(area.to_string()).or_default();

    // Earliest start wins: only the first line in an area opens the window.
    if battle.started.is_none() {
        battle.started = Some(timestamp);
    }

    let is_death_cry = MAP_BOSS_DEATH_CRIES
        .get(line.npc.as_str())
        .is_some_and(|cry| line.text.contains(cry));
    if is_death_cry {
        // Latest kill wins: multi-phase fights emit several kill lines.
        battle.killed = Some(timestamp);
    }
}

/// Derive the single boss-battle summary from the earliest recorded start
/// and the latest recorded kill across primary and sub-areas.
fn summarize_boss_battles(info: &mut RunInfo, events: &[StoredEvent]) {
    let started = info.boss_battles.values().filter_map(|b| b.started).min();
    let killed = info.boss_battles.values().filter_map(|b| b.killed).max();
    let (Some(started), Some(killed)) = (started, killed) else { return };
    if killed < started {
        return;
    }

    let deaths = events
        .iter()
        .filter(|e| e.timestamp >= started && e.timestamp <= killed)
        .filter(|e| matches!(e.payload(), Some(EventPayload::Slain { .. })))
        .count() as u32;

    info.boss_summary = Some(BossSummary {
        duration_secs: (killed - started).num_seconds(),
        deaths,
    });
}

/// Infer the colour of a single uncolored capture when every colored
/// capture in the hunt shares one colour.
fn finish_einhar(info: &mut RunInfo, uncolored: u32) {
    let Some(einhar) = &mut info.einhar else { return };
    if uncolored != 1 {
        return;
    }
    if einhar.red_beasts > 0 && einhar.yellow_beasts == 0 {
        einhar.red_beasts += 1;
    } else if einhar.yellow_beasts > 0 && einhar.red_beasts == 0 {
        einhar.yellow_beasts += 1;
    }
}

/// Attach conqueror-specific currency to the defeat it dropped from, when
/// that conqueror actually fell this run.
fn attribute_conqueror_drops(info: &mut RunInfo, loot: &[PricedDrop]) {
    for drop in loot {
        let Some(conqueror) = CONQUEROR_CURRENCY.get(drop.name.as_str()) else { continue };
        if let Some(record) = info.conquerors.get_mut(*conqueror) {
            if record.defeated {
                record.drops.push(drop.name.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client_log::EventType;
    use chrono::{NaiveDate, NaiveDateTime};

    fn ts(secs: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 8, 3)
            .unwrap()
            .and_hms_opt(21, 0, 0)
            .unwrap()
            + chrono::Duration::seconds(secs as i64)
    }

    fn event(secs: u32, payload: EventPayload) -> StoredEvent {
        StoredEvent {
            id: secs as i64,
            event_type: payload.event_type(),
            event_text: serde_json::to_string(&payload).unwrap(),
            timestamp: ts(secs),
            server: None,
        }
    }

    fn npc(npc: &str, text: &str) -> NpcLine {
        NpcLine { npc: npc.to_string(), text: text.to_string() }
    }

    fn extract_all(events: &[StoredEvent]) -> RunInfo {
        extract(events, &ExtractContext { primary_area: "Crimson Temple", loot: &[] })
    }

    #[test]
    fn test_deaths_and_levels() {
        let info = extract_all(&[
            event(1, EventPayload::Slain { character: "Orion".to_string() }),
            event(2, EventPayload::Level { character: "Orion".to_string(), level: 93 }),
            event(3, EventPayload::Slain { character: "Orion".to_string() }),
        ]);
        assert_eq!(info.deaths, 2);
        assert_eq!(info.level_ups, 1);
        assert_eq!(info.last_level, Some(93));
    }

    #[test]
    fn test_boss_window_earliest_start_latest_kill() {
        // Two battle-start lines and one kill line in the same sub-area:
        // the window is [first start, kill].
        let info = extract_all(&[
            event(10, EventPayload::MapBoss(npc("The Shaper", "The void beckons."))),
            event(20, EventPayload::MapBoss(npc("The Shaper", "You are nothing."))),
            event(15, EventPayload::Slain { character: "Orion".to_string() }),
            event(40, EventPayload::MapBoss(npc("The Shaper", "It cannot end like this..."))),
        ]);

        let battle = &info.boss_battles["Crimson Temple"];
        assert_eq!(battle.started, Some(ts(10)));
        assert_eq!(battle.killed, Some(ts(40)));

        let summary = info.boss_summary.unwrap();
        assert_eq!(summary.duration_secs, 30);
        assert_eq!(summary.deaths, 1);
    }

    #[test]
    fn test_boss_kill_line_overwrites_earlier_kill() {
        let info = extract_all(&[
            event(10, EventPayload::MapBoss(npc("The Shaper", "It cannot end like this."))),
            event(30, EventPayload::MapBoss(npc("The Shaper", "It cannot end like this."))),
        ]);
        assert_eq!(info.boss_battles["Crimson Temple"].killed, Some(ts(30)));
    }

    #[test]
    fn test_sub_area_battles_tracked_separately() {
        let info = extract_all(&[
            event(5, EventPayload::Entered { area: "Shaper's Realm".to_string() }),
            event(10, EventPayload::MapBoss(npc("The Shaper", "The void beckons."))),
        ]);
        assert!(info.boss_battles.contains_key("Shaper's Realm"));
        assert_eq!(info.sub_areas, vec!["Shaper's Realm".to_string()]);
    }

    #[test]
    fn test_einhar_capture_colours() {
        let info = extract_all(&[
            event(1, EventPayload::Master(npc(
                "Einhar, Beastmaster",
                "Haha! You are captured, stupid beast.",
            ))),
            event(2, EventPayload::Master(npc(
                "Einhar, Beastmaster",
                "Beast is captured, exile. Einhar will take it from here.",
            ))),
        ]);
        let einhar = info.einhar.unwrap();
        assert_eq!(einhar.captures, 2);
        assert_eq!(einhar.red_beasts, 1);
        assert_eq!(einhar.yellow_beasts, 1);
        assert_eq!(info.masters["Einhar, Beastmaster"], 2);
    }

    #[test]
    fn test_einhar_last_capture_colour_inferred() {
        // Three red captures plus one colourless line: the colourless one
        // must have been red too.
        let mut events: Vec<StoredEvent> = (0..3)
            .map(|i| {
                event(i, EventPayload::Master(npc(
                    "Einhar, Beastmaster",
                    "Haha! You are captured, stupid beast.",
                )))
            })
            .collect();
        events.push(event(10, EventPayload::Master(npc(
            "Einhar, Beastmaster",
            "The First Ones smile on this capture.",
        ))));

        let einhar = extract_all(&events).einhar.unwrap();
        assert_eq!(einhar.captures, 4);
        assert_eq!(einhar.red_beasts, 4);
        assert_eq!(einhar.yellow_beasts, 0);
    }

    #[test]
    fn test_einhar_mixed_colours_left_uninferred() {
        let info = extract_all(&[
            event(1, EventPayload::Master(npc(
                "Einhar, Beastmaster",
                "Haha! You are captured, stupid beast.",
            ))),
            event(2, EventPayload::Master(npc(
                "Einhar, Beastmaster",
                "Beast is captured, exile. Einhar will take it from here.",
            ))),
            event(3, EventPayload::Master(npc(
                "Einhar, Beastmaster",
                "The First Ones smile on this capture.",
            ))),
        ]);
        let einhar = info.einhar.unwrap();
        assert_eq!(einhar.captures, 3);
        assert_eq!(einhar.red_beasts, 1);
        assert_eq!(einhar.yellow_beasts, 1);
    }

    #[test]
    fn test_conqueror_defeat_and_currency_attribution() {
        let events = [
            event(10, EventPayload::Conqueror(npc("Baran, the Crusader", "You chase shadows."))),
            event(50, EventPayload::Conqueror(npc(
                "Baran, the Crusader",
                "The crusade ends... here?",
            ))),
        ];
        let loot = [
            PricedDrop {
                name: "Crusader's Exalted Orb".to_string(),
                value: 120.0,
                timestamp: ts(55),
            },
            PricedDrop {
                name: "Hunter's Exalted Orb".to_string(),
                value: 150.0,
                timestamp: ts(56),
            },
        ];
        let info = extract(
            &events,
            &ExtractContext { primary_area: "Crimson Temple", loot: &loot },
        );

        let baran = &info.conquerors["Baran, the Crusader"];
        assert!(baran.encountered && baran.defeated);
        assert_eq!(baran.battle_start, Some(ts(10)));
        assert_eq!(baran.defeated_at, Some(ts(50)));
        assert_eq!(baran.drops, vec!["Crusader's Exalted Orb".to_string()]);
        // Al-Hezmin never appeared, so his orb attaches to nothing.
        assert!(!info.conquerors.contains_key("Al-Hezmin, the Hunter"));
    }

    #[test]
    fn test_ultimatum_rounds_and_outcome() {
        let info = extract_all(&[
            event(1, EventPayload::LeagueNpc(npc("The Trialmaster", "Ruin, doubled!"))),
            event(2, EventPayload::LeagueNpc(npc("The Trialmaster", "Let ruin rain upon you!"))),
            event(3, EventPayload::LeagueNpc(npc(
                "The Trialmaster",
                "Take your winnings, and my respect.",
            ))),
        ]);

        let ultimatum = info.ultimatum.unwrap();
        assert_eq!(ultimatum.outcome, Some(UltimatumOutcome::Won));
        assert_eq!(ultimatum.rounds.len(), 2);
        assert!(!ultimatum.rounds[0].ambiguous);
        assert!(ultimatum.rounds[1].ambiguous);
        // Forced deterministically: Ruin II earlier means the ambiguous
        // line is Stalking Ruin III.
        assert_eq!(
            ultimatum.rounds[1].modifier,
            crate::game_data::RoundModifier::StalkingRuin3
        );
    }

    #[test]
    fn test_league_flags() {
        let info = extract_all(&[
            event(1, EventPayload::LeagueNpc(npc("Strange Voice", "You dance on a knife's edge."))),
            event(2, EventPayload::LeagueNpc(npc("Sister Cassia", "Oh, blessed purity!"))),
            event(3, EventPayload::LeagueNpc(npc("The Maven", "Admirable."))),
        ]);
        assert!(info.delirium);
        assert!(info.blight);
        assert!(!info.harvest);
        assert_eq!(info.maven_witnessed, 1);
    }

    #[test]
    fn test_town_visits_counted_not_sub_areas() {
        let info = extract_all(&[
            event(1, EventPayload::Entered { area: "Kingsmarch".to_string() }),
            event(2, EventPayload::Entered { area: "Shaper's Realm".to_string() }),
        ]);
        assert_eq!(info.town_visits, 1);
        assert_eq!(info.sub_areas, vec!["Shaper's Realm".to_string()]);
    }

    #[test]
    fn test_event_type_matches_payload() {
        let ev = event(1, EventPayload::Shrine { name: "Acceleration".to_string() });
        assert_eq!(ev.event_type, EventType::Shrine);
        assert_eq!(
            ev.payload(),
            Some(EventPayload::Shrine { name: "Acceleration".to_string() })
        );
    }
}
