//! Stub collaborators for the CLI host.
//!
//! Pricing, the character API, and the inventory diff are external systems
//! the CLI does not ship. These stubs report themselves unavailable so the
//! engine's degrade paths produce unpriced, kill-unknown runs instead of
//! failures.

use async_trait::async_trait;
use chrono::NaiveDateTime;

use kirac_core::external::{
    CollaboratorError, ExperienceProvider, ItemPricer, ItemSource, LootedItem, Priced,
};

pub struct DisabledPricer;

#[async_trait]
impl ItemPricer for DisabledPricer {
    async fn price(&self, _item: &LootedItem) -> Result<Priced, CollaboratorError> {
        Err(CollaboratorError::Unavailable("no pricing backend configured".to_string()))
    }
}

pub struct DisabledExperience;

#[async_trait]
impl ExperienceProvider for DisabledExperience {
    async fn experience(&self) -> Result<u64, CollaboratorError> {
        Err(CollaboratorError::Unavailable("no character api configured".to_string()))
    }
}

/// An item source that is always "caught up" and always empty, so
/// finalization never waits on it.
pub struct DisabledItems;

#[async_trait]
impl ItemSource for DisabledItems {
    async fn last_update(&self) -> Result<Option<NaiveDateTime>, CollaboratorError> {
        Ok(Some(NaiveDateTime::MAX))
    }

    async fn items_between(
        &self,
        _from: NaiveDateTime,
        _to: NaiveDateTime,
    ) -> Result<Vec<LootedItem>, CollaboratorError> {
        Ok(Vec::new())
    }
}
