//! Order state machine.
//!
//! ```text
//! pending ──accept──▶ accepted ──start_processing──▶ in_progress ──complete──▶ completed
//!    │                   │                               │
//!  reject              cancel                          cancel
//!    ▼                   ▼                               ▼
//! rejected            cancelled                      cancelled
//!    │
//!  reassign (new provider found) ──▶ pending
//! ```
//!
//! Every transition is written with a compare-and-swap on the order version.
//! When another write lands first, the guards run again against the fresh
//! record, so a decision is never made on a copy someone else has replaced.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engine::matching::nearest_within;
use crate::error::{AppError, CoverageGap};
use crate::models::order::{Action, Order, OrderEvent, OrderState};
use crate::models::provider::ProviderSnapshot;
use crate::observability::metrics::Metrics;
use crate::store::{OrderStore, ProviderStore, SwapOutcome};

/// Rounds of read, decide and swap before giving up on a contended order.
const SWAP_ATTEMPTS: usize = 3;

/// Target state of `action` from `state`, or `None` if the graph has no such edge.
pub fn next_state(state: OrderState, action: Action) -> Option<OrderState> {
    use Action::*;
    use OrderState::*;

    match (state, action) {
        (Pending, Accept) => Some(Accepted),
        (Pending, Reject) => Some(Rejected),
        (Accepted, StartProcessing) => Some(InProgress),
        (InProgress, Complete) => Some(Completed),
        (Accepted | InProgress, Cancel) => Some(Cancelled),
        (Rejected, Reassign) => Some(Pending),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", content = "id", rename_all = "snake_case")]
pub enum Actor {
    Provider(Uuid),
    Customer(Uuid),
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actor::Provider(id) => write!(f, "provider {id}"),
            Actor::Customer(id) => write!(f, "customer {id}"),
        }
    }
}

fn authorize(order: &Order, action: Action, actor: Actor) -> Result<(), AppError> {
    let allowed = match (action, actor) {
        (
            Action::Accept | Action::Reject | Action::StartProcessing | Action::Complete | Action::Cancel,
            Actor::Provider(id),
        ) => id == order.provider.id,
        (Action::Cancel | Action::Reassign, Actor::Customer(id)) => id == order.customer_id,
        _ => false,
    };

    if allowed {
        Ok(())
    } else {
        Err(AppError::Forbidden(format!(
            "{actor} may not {action} order {}",
            order.id
        )))
    }
}

pub struct OrderLifecycle {
    orders: Arc<dyn OrderStore>,
    providers: Arc<dyn ProviderStore>,
    radius_km: f64,
    events_tx: broadcast::Sender<OrderEvent>,
    metrics: Metrics,
}

impl OrderLifecycle {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        providers: Arc<dyn ProviderStore>,
        radius_km: f64,
        events_tx: broadcast::Sender<OrderEvent>,
        metrics: Metrics,
    ) -> Self {
        Self {
            orders,
            providers,
            radius_km,
            events_tx,
            metrics,
        }
    }

    pub async fn get(&self, id: Uuid) -> Result<Order, AppError> {
        self.orders
            .get_order(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("order {id} not found")))
    }

    pub async fn accept(&self, id: Uuid, provider_id: Uuid, now: DateTime<Utc>) -> Result<Order, AppError> {
        self.apply(id, Action::Accept, Actor::Provider(provider_id), now).await
    }

    /// Leaves the order `rejected`; finding someone else is up to the customer
    /// through [`OrderLifecycle::reassign`].
    pub async fn reject(&self, id: Uuid, provider_id: Uuid, now: DateTime<Utc>) -> Result<Order, AppError> {
        self.apply(id, Action::Reject, Actor::Provider(provider_id), now).await
    }

    pub async fn start_processing(
        &self,
        id: Uuid,
        provider_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Order, AppError> {
        self.apply(id, Action::StartProcessing, Actor::Provider(provider_id), now)
            .await
    }

    pub async fn complete(&self, id: Uuid, provider_id: Uuid, now: DateTime<Utc>) -> Result<Order, AppError> {
        self.apply(id, Action::Complete, Actor::Provider(provider_id), now).await
    }

    pub async fn cancel(&self, id: Uuid, actor: Actor, now: DateTime<Utc>) -> Result<Order, AppError> {
        self.apply(id, Action::Cancel, actor, now).await
    }

    /// Matches the original pickup point again, skipping every provider that
    /// already rejected the order. With no alternative the order stays
    /// `rejected` and the caller gets `NoCoverage(Reassignment)`.
    pub async fn reassign(&self, id: Uuid, customer_id: Uuid, now: DateTime<Utc>) -> Result<Order, AppError> {
        self.apply(id, Action::Reassign, Actor::Customer(customer_id), now).await
    }

    async fn apply(
        &self,
        id: Uuid,
        action: Action,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> Result<Order, AppError> {
        let result = self.transition(id, action, actor, now).await;

        let outcome = match &result {
            Ok(order) => {
                info!(
                    order_id = %order.id,
                    provider_id = %order.provider.id,
                    action = %action,
                    state = %order.state,
                    "order transitioned"
                );
                "ok"
            }
            Err(err) => {
                warn!(order_id = %id, action = %action, actor = %actor, reason = %err, "transition refused");
                if err.is_rejection() { "rejected" } else { "error" }
            }
        };

        self.metrics
            .transitions_total
            .with_label_values(&[action.as_str(), outcome])
            .inc();

        result
    }

    async fn transition(
        &self,
        id: Uuid,
        action: Action,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> Result<Order, AppError> {
        let mut current = self.get(id).await?;

        for _ in 0..SWAP_ATTEMPTS {
            let updated = self.plan(&current, action, actor, now).await?;

            match self.orders.swap_if_version(current.version, updated).await? {
                SwapOutcome::Swapped(order) => {
                    let _ = self
                        .events_tx
                        .send(OrderEvent::transitioned(&order, action));
                    return Ok(order);
                }
                SwapOutcome::Conflict(latest) => {
                    debug!(
                        order_id = %id,
                        action = %action,
                        read_version = current.version,
                        stored_version = latest.version,
                        "order changed during transition, re-checking"
                    );
                    current = latest;
                }
            }
        }

        Err(AppError::InvalidTransition {
            state: current.state,
            action,
        })
    }

    /// Checks `action` against `current` and builds the record to write.
    async fn plan(
        &self,
        current: &Order,
        action: Action,
        actor: Actor,
        now: DateTime<Utc>,
    ) -> Result<Order, AppError> {
        let next = next_state(current.state, action).ok_or(AppError::InvalidTransition {
            state: current.state,
            action,
        })?;
        authorize(current, action, actor)?;

        let mut updated = current.clone();
        updated.state = next;
        updated.updated_at = now;

        match action {
            Action::Reject => updated.rejected_by.push(current.provider.id),
            Action::Complete => updated.completed_at = Some(now),
            Action::Reassign => updated.provider = self.find_replacement(current).await?,
            Action::Accept | Action::StartProcessing | Action::Cancel => {}
        }

        Ok(updated)
    }

    async fn find_replacement(&self, order: &Order) -> Result<ProviderSnapshot, AppError> {
        let providers = self.providers.all_providers().await?;
        let candidates = providers
            .iter()
            .filter(|provider| !order.rejected_by.contains(&provider.id));

        nearest_within(&order.pickup_location, candidates, self.radius_km)
            .map(ProviderSnapshot::from)
            .ok_or(AppError::NoCoverage(CoverageGap::Reassignment))
    }
}
