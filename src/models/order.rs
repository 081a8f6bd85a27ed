use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::address::{Address, GeoPoint};
use crate::models::provider::ProviderSnapshot;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceItem {
    pub name: String,
    pub price: f64,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    Pending,
    Accepted,
    InProgress,
    Completed,
    Rejected,
    Cancelled,
}

impl OrderState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderState::Pending => "pending",
            OrderState::Accepted => "accepted",
            OrderState::InProgress => "in_progress",
            OrderState::Completed => "completed",
            OrderState::Rejected => "rejected",
            OrderState::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Accept,
    Reject,
    Cancel,
    StartProcessing,
    Complete,
    Reassign,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Accept => "accept",
            Action::Reject => "reject",
            Action::Cancel => "cancel",
            Action::StartProcessing => "start_processing",
            Action::Complete => "complete",
            Action::Reassign => "reassign",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub service: ServiceItem,
    pub pickup_address: Address,
    pub delivery_address: Address,
    pub pickup_location: GeoPoint,
    pub delivery_location: GeoPoint,
    pub pickup_at: DateTime<Utc>,
    pub delivery_at: DateTime<Utc>,
    pub provider: ProviderSnapshot,
    /// Providers that rejected this order; skipped on reassignment.
    pub rejected_by: Vec<Uuid>,
    pub state: OrderState,
    pub notes: String,
    /// Bumped by the store on every accepted write; the compare-and-swap token.
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Published on every admission and lifecycle transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderEvent {
    pub order_id: Uuid,
    pub provider_id: Uuid,
    pub action: Option<Action>,
    pub state: OrderState,
    pub at: DateTime<Utc>,
}

impl OrderEvent {
    pub fn created(order: &Order) -> Self {
        Self {
            order_id: order.id,
            provider_id: order.provider.id,
            action: None,
            state: order.state,
            at: order.created_at,
        }
    }

    pub fn transitioned(order: &Order, action: Action) -> Self {
        Self {
            order_id: order.id,
            provider_id: order.provider.id,
            action: Some(action),
            state: order.state,
            at: order.updated_at,
        }
    }
}
