use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::address::{Address, GeoPoint};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    pub id: Uuid,
    pub name: String,
    pub address: Address,
    pub location: GeoPoint,
    pub services: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

/// Copy of the provider fields an order carries. Never refreshed from the
/// registry; only replaced by reassignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSnapshot {
    pub id: Uuid,
    pub name: String,
    pub address: Address,
    pub location: GeoPoint,
}

impl From<&Provider> for ProviderSnapshot {
    fn from(provider: &Provider) -> Self {
        Self {
            id: provider.id,
            name: provider.name.clone(),
            address: provider.address.clone(),
            location: provider.location,
        }
    }
}
