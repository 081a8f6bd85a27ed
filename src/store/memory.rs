use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use uuid::Uuid;

use crate::models::order::Order;
use crate::models::provider::Provider;
use crate::store::{OrderStore, ProviderStore, StoreError, SwapOutcome};

/// In-process store. Each order lives in one dashmap shard, so holding the
/// entry guard makes a read-modify-write atomic for that order.
#[derive(Default)]
pub struct MemoryStore {
    orders: DashMap<Uuid, Order>,
    providers: DashMap<Uuid, Provider>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn insert_order(&self, order: Order) -> Result<(), StoreError> {
        match self.orders.entry(order.id) {
            Entry::Occupied(_) => Err(StoreError::Duplicate(order.id)),
            Entry::Vacant(slot) => {
                slot.insert(order);
                Ok(())
            }
        }
    }

    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, StoreError> {
        Ok(self.orders.get(&id).map(|entry| entry.value().clone()))
    }

    async fn swap_if_version(
        &self,
        expected_version: u64,
        mut order: Order,
    ) -> Result<SwapOutcome, StoreError> {
        let mut stored = self
            .orders
            .get_mut(&order.id)
            .ok_or(StoreError::OrderNotFound(order.id))?;

        if stored.version != expected_version {
            return Ok(SwapOutcome::Conflict(stored.clone()));
        }

        order.version = expected_version + 1;
        *stored = order.clone();
        Ok(SwapOutcome::Swapped(order))
    }

    async fn order_count(&self) -> Result<usize, StoreError> {
        Ok(self.orders.len())
    }
}

#[async_trait]
impl ProviderStore for MemoryStore {
    async fn all_providers(&self) -> Result<Vec<Provider>, StoreError> {
        let mut providers: Vec<Provider> = self
            .providers
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        // Dashmap iteration order is arbitrary; matching ties need a stable order.
        providers.sort_by_key(|p| p.id);
        Ok(providers)
    }

    async fn get_provider(&self, id: Uuid) -> Result<Option<Provider>, StoreError> {
        Ok(self.providers.get(&id).map(|entry| entry.value().clone()))
    }

    async fn upsert_provider(&self, provider: Provider) -> Result<(), StoreError> {
        self.providers.insert(provider.id, provider);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::MemoryStore;
    use crate::models::order::OrderState;
    use crate::models::provider::ProviderSnapshot;
    use crate::store::{OrderStore, ProviderStore, StoreError, SwapOutcome};
    use crate::test_support::{provider, sample_order};

    #[tokio::test]
    async fn swap_applies_and_bumps_version() {
        let store = MemoryStore::new();
        let order = sample_order();
        store.insert_order(order.clone()).await.unwrap();

        let mut accepted = order.clone();
        accepted.state = OrderState::Accepted;
        let outcome = store.swap_if_version(0, accepted).await.unwrap();

        assert!(matches!(
            outcome,
            SwapOutcome::Swapped(ref o) if o.state == OrderState::Accepted && o.version == 1
        ));
        let stored = store.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.state, OrderState::Accepted);
        assert_eq!(stored.version, 1);
    }

    #[tokio::test]
    async fn swap_reports_conflict_with_current_record() {
        let store = MemoryStore::new();
        let order = sample_order();
        store.insert_order(order.clone()).await.unwrap();

        let mut rejected = order.clone();
        rejected.state = OrderState::Rejected;
        store.swap_if_version(0, rejected).await.unwrap();

        let mut accepted = order.clone();
        accepted.state = OrderState::Accepted;
        let outcome = store.swap_if_version(0, accepted).await.unwrap();

        assert!(matches!(
            outcome,
            SwapOutcome::Conflict(ref o) if o.state == OrderState::Rejected && o.version == 1
        ));
    }

    #[tokio::test]
    async fn stale_copy_cannot_land_after_state_comes_back() {
        let store = MemoryStore::new();
        let order = sample_order();
        store.insert_order(order.clone()).await.unwrap();

        let mut stale_accept = order.clone();
        stale_accept.state = OrderState::Accepted;

        let mut rejected = order.clone();
        rejected.state = OrderState::Rejected;
        rejected.rejected_by.push(order.provider.id);
        let SwapOutcome::Swapped(rejected) = store.swap_if_version(0, rejected).await.unwrap() else {
            panic!("reject should land");
        };

        let mut reassigned = rejected.clone();
        reassigned.state = OrderState::Pending;
        reassigned.provider = ProviderSnapshot::from(&provider(2, -34.905, -56.165));
        store
            .swap_if_version(rejected.version, reassigned)
            .await
            .unwrap();

        let outcome = store.swap_if_version(0, stale_accept).await.unwrap();
        assert!(matches!(outcome, SwapOutcome::Conflict(_)));

        let stored = store.get_order(order.id).await.unwrap().unwrap();
        assert_eq!(stored.state, OrderState::Pending);
        assert_eq!(stored.provider.id.as_u128(), 2);
        assert_eq!(stored.rejected_by, vec![order.provider.id]);
        assert_eq!(stored.version, 2);
    }

    #[tokio::test]
    async fn swap_on_missing_order_fails() {
        let store = MemoryStore::new();
        let result = store.swap_if_version(0, sample_order()).await;
        assert!(matches!(result, Err(StoreError::OrderNotFound(_))));
    }

    #[tokio::test]
    async fn duplicate_insert_is_refused() {
        let store = MemoryStore::new();
        let order = sample_order();
        store.insert_order(order.clone()).await.unwrap();

        let result = store.insert_order(order).await;
        assert!(matches!(result, Err(StoreError::Duplicate(_))));
    }

    #[tokio::test]
    async fn providers_are_listed_in_stable_order() {
        let store = MemoryStore::new();
        for seed in [9, 3, 5] {
            store
                .upsert_provider(provider(seed, -34.9, -56.1))
                .await
                .unwrap();
        }

        let ids: Vec<u128> = store
            .all_providers()
            .await
            .unwrap()
            .iter()
            .map(|p| p.id.as_u128())
            .collect();
        assert_eq!(ids, vec![3, 5, 9]);
    }
}
