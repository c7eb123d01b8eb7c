pub mod classify;
pub mod event;
pub mod raw;

pub use classify::{Classified, Classifier};
pub use event::{
    ChatDirection, EventPayload, EventType, GeneratedArea, NpcLine, ParsedEvent,
};
pub use raw::{split_line, RawLine};
