use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::{patch, post};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use crate::api::rest::json_body;
use crate::error::{AddressRole, AppError};
use crate::models::address::Address;
use crate::models::provider::Provider;
use crate::state::AppState;
use crate::store::ProviderStore;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/providers", post(register_provider).get(list_providers))
        .route("/providers/:id/address", patch(update_provider_address))
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterProviderRequest {
    pub name: String,
    pub address: Address,
    #[serde(default)]
    pub services: Vec<String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateAddressRequest {
    pub address: Address,
}

async fn register_provider(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RegisterProviderRequest>, JsonRejection>,
) -> Result<Json<Provider>, AppError> {
    let payload = json_body(payload)?;

    if payload.name.trim().is_empty() {
        return Err(AppError::Validation("name cannot be empty".to_string()));
    }
    payload.address.validate("address")?;

    let location = state
        .resolver
        .resolve(&payload.address)
        .await
        .ok_or(AppError::AddressUnresolvable(AddressRole::Provider))?;

    let provider = Provider {
        id: Uuid::new_v4(),
        name: payload.name.trim().to_string(),
        address: payload.address,
        location,
        services: payload.services,
        updated_at: Utc::now(),
    };

    state.store.upsert_provider(provider.clone()).await?;
    info!(provider_id = %provider.id, name = %provider.name, "provider registered");

    Ok(Json(provider))
}

async fn list_providers(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Provider>>, AppError> {
    Ok(Json(state.store.all_providers().await?))
}

/// Re-geocodes the provider. Orders already assigned keep their snapshot.
async fn update_provider_address(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    payload: Result<Json<UpdateAddressRequest>, JsonRejection>,
) -> Result<Json<Provider>, AppError> {
    let payload = json_body(payload)?;
    payload.address.validate("address")?;

    let mut provider = state
        .store
        .get_provider(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("provider {id} not found")))?;

    provider.location = state
        .resolver
        .resolve(&payload.address)
        .await
        .ok_or(AppError::AddressUnresolvable(AddressRole::Provider))?;
    provider.address = payload.address;
    provider.updated_at = Utc::now();

    state.store.upsert_provider(provider.clone()).await?;
    info!(provider_id = %provider.id, "provider address updated");

    Ok(Json(provider))
}
