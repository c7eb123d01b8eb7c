//! External collaborator ports.
//!
//! Pricing, the remote character API, and the inventory-diff item source
//! live outside the engine. The engine only ever calls these traits; a
//! failing collaborator degrades the one statistic it feeds and nothing
//! else (a run is never lost because pricing was down).

use async_trait::async_trait;
use chrono::NaiveDateTime;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),
    #[error("collaborator failed: {0}")]
    Failed(String),
}

/// One item reported by the inventory-diff source.
#[derive(Debug, Clone, PartialEq)]
pub struct LootedItem {
    pub name: String,
    pub stack_size: u32,
    /// Equipped items show up in diffs but were not looted; skipped during
    /// valuation.
    pub equipped: bool,
    pub timestamp: NaiveDateTime,
}

/// Pricing result for one item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Priced {
    /// Chaos value for the whole stack.
    pub value: f64,
    /// True when the item only has vendor value.
    pub is_vendor: bool,
}

/// The item-pricing rule engine.
#[async_trait]
pub trait ItemPricer: Send + Sync {
    async fn price(&self, item: &LootedItem) -> Result<Priced, CollaboratorError>;
}

/// The remote character API. Fallback XP source only; local samples win.
#[async_trait]
pub trait ExperienceProvider: Send + Sync {
    async fn experience(&self) -> Result<u64, CollaboratorError>;
}

/// Asynchronous inventory-diff item source. May lag behind the log; the
/// finalizer waits (bounded) for `last_update` to catch up to a run's end.
#[async_trait]
pub trait ItemSource: Send + Sync {
    /// Timestamp the source has diffed up to, if it has run at all.
    async fn last_update(&self) -> Result<Option<NaiveDateTime>, CollaboratorError>;

    /// Items that appeared with `from <= timestamp <= to`.
    async fn items_between(
        &self,
        from: NaiveDateTime,
        to: NaiveDateTime,
    ) -> Result<Vec<LootedItem>, CollaboratorError>;
}
