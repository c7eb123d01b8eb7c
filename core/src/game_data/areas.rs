//! Area classification tables.
//!
//! Run boundaries depend on what kind of area the player moved into: towns
//! and hideouts terminate runs, labyrinth rooms belong to the run that
//! entered the labyrinth, and a few persistent areas (the mine, the memory
//! void) re-enter themselves without starting over.

use phf::phf_set;

/// Act towns and other safe hub areas (by display name).
static TOWN_AREAS: phf::Set<&'static str> = phf_set! {
    "Lioneye's Watch",
    "The Forest Encampment",
    "The Sarn Encampment",
    "Highgate",
    "Overseer's Tower",
    "The Bridge Encampment",
    "Oriath Docks",
    "Oriath",
    "Karui Shores",
    "Kingsmarch",
    "The Rogue Harbour",
    "The Menagerie",
};

/// Labyrinth trial rooms. Transitions between these never close a run.
static LABYRINTH_AREAS: phf::Set<&'static str> = phf_set! {
    "Estate Path",
    "Estate Walkways",
    "Estate Crossing",
    "Estate Passage",
    "Basilica Path",
    "Basilica Walkways",
    "Basilica Crossing",
    "Basilica Passage",
    "Basilica Annex",
    "Basilica Atrium",
    "Basilica Halls",
    "Sanitorium Path",
    "Sanitorium Walkways",
    "Sanitorium Crossing",
    "Mansion Path",
    "Mansion Walkways",
    "Mansion Crossing",
    "Mansion Atrium",
    "Sepulchre Path",
    "Sepulchre Walkways",
    "Sepulchre Crossing",
    "Sepulchre Atrium",
    "Sepulchre Halls",
    "Sepulchre Annex",
    "Aspirant's Trial",
};

/// Areas that never open a run even though they are not towns: the
/// labyrinth staging plaza and the Izaro arena itself.
static NEVER_START_AREAS: phf::Set<&'static str> = phf_set! {
    "Aspirants' Plaza",
    "Aspirant's Trial",
};

/// The delve hub. Persistent and non-instanced: every bounce back into it
/// is the same excursion, not a new run.
pub const AZURITE_MINE: &str = "Azurite Mine";

/// The Synthesis memory hub, same persistence rules as the mine.
pub const MEMORY_VOID: &str = "Memory Void";

/// True for act towns, hub areas, and player hideouts.
pub fn is_town(area: &str) -> bool {
    TOWN_AREAS.contains(area) || area.ends_with(" Hideout")
}

/// True for labyrinth trial rooms (including the Aspirant's Trial arena).
pub fn is_labyrinth_area(area: &str) -> bool {
    LABYRINTH_AREAS.contains(area)
}

/// True when entering `area` must not open a new run.
pub fn never_starts_run(area: &str) -> bool {
    is_town(area) || NEVER_START_AREAS.contains(area)
}

/// True for generated-area ids that belong to towns or hideouts. Used when
/// a generation line arrives before the matching entered line.
pub fn is_town_area_id(area_id: &str) -> bool {
    area_id.contains("_town") || area_id.contains("Hideout")
}
