//! Persistence collaborator. Lookups are by id only, plus "all providers".

pub mod memory;

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::order::Order;
use crate::models::provider::Provider;

pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("order {0} not found")]
    OrderNotFound(Uuid),

    #[error("provider {0} not found")]
    ProviderNotFound(Uuid),

    #[error("record {0} already exists")]
    Duplicate(Uuid),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Result of a conditional write.
#[derive(Debug, Clone)]
pub enum SwapOutcome {
    Swapped(Order),
    /// The stored version no longer matched; carries the record as it is now.
    Conflict(Order),
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn insert_order(&self, order: Order) -> Result<(), StoreError>;

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, StoreError>;

    /// Replaces the stored order only if its version is still
    /// `expected_version`, writing it back with the next version. The check
    /// and the write happen as one step, so a copy read before any other
    /// write can never land, even when the state has come back around.
    async fn swap_if_version(
        &self,
        expected_version: u64,
        order: Order,
    ) -> Result<SwapOutcome, StoreError>;

    async fn order_count(&self) -> Result<usize, StoreError>;
}

#[async_trait]
pub trait ProviderStore: Send + Sync {
    async fn all_providers(&self) -> Result<Vec<Provider>, StoreError>;

    async fn get_provider(&self, id: Uuid) -> Result<Option<Provider>, StoreError>;

    async fn upsert_provider(&self, provider: Provider) -> Result<(), StoreError>;
}
