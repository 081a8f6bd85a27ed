use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::routing::{get, post};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::api::rest::json_body;
use crate::engine::admission::AdmissionRequest;
use crate::engine::lifecycle::Actor;
use crate::error::AppError;
use crate::models::order::Order;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", post(create_order))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/accept", post(accept_order))
        .route("/orders/:id/reject", post(reject_order))
        .route("/orders/:id/start", post(start_order))
        .route("/orders/:id/complete", post(complete_order))
        .route("/orders/:id/cancel", post(cancel_order))
        .route("/orders/:id/reassign", post(reassign_order))
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProviderActionRequest {
    pub provider_id: Uuid,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CancelRequest {
    pub actor: Actor,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReassignRequest {
    pub customer_id: Uuid,
}

async fn create_order(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<AdmissionRequest>, JsonRejection>,
) -> Result<Json<Order>, AppError> {
    let request = json_body(payload)?;
    let order = state.admission.admit(request, Utc::now()).await?;
    Ok(Json(order))
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    Ok(Json(state.lifecycle.get(id).await?))
}

async fn accept_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    payload: Result<Json<ProviderActionRequest>, JsonRejection>,
) -> Result<Json<Order>, AppError> {
    let body = json_body(payload)?;
    let order = state.lifecycle.accept(id, body.provider_id, Utc::now()).await?;
    Ok(Json(order))
}

async fn reject_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    payload: Result<Json<ProviderActionRequest>, JsonRejection>,
) -> Result<Json<Order>, AppError> {
    let body = json_body(payload)?;
    let order = state.lifecycle.reject(id, body.provider_id, Utc::now()).await?;
    Ok(Json(order))
}

async fn start_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    payload: Result<Json<ProviderActionRequest>, JsonRejection>,
) -> Result<Json<Order>, AppError> {
    let body = json_body(payload)?;
    let order = state
        .lifecycle
        .start_processing(id, body.provider_id, Utc::now())
        .await?;
    Ok(Json(order))
}

async fn complete_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    payload: Result<Json<ProviderActionRequest>, JsonRejection>,
) -> Result<Json<Order>, AppError> {
    let body = json_body(payload)?;
    let order = state
        .lifecycle
        .complete(id, body.provider_id, Utc::now())
        .await?;
    Ok(Json(order))
}

async fn cancel_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    payload: Result<Json<CancelRequest>, JsonRejection>,
) -> Result<Json<Order>, AppError> {
    let body = json_body(payload)?;
    let order = state.lifecycle.cancel(id, body.actor, Utc::now()).await?;
    Ok(Json(order))
}

async fn reassign_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    payload: Result<Json<ReassignRequest>, JsonRejection>,
) -> Result<Json<Order>, AppError> {
    let body = json_body(payload)?;
    let order = state
        .lifecycle
        .reassign(id, body.customer_id, Utc::now())
        .await?;
    Ok(Json(order))
}
