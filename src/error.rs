use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use crate::engine::schedule::ScheduleRejection;
use crate::models::order::{Action, OrderState};
use crate::store::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressRole {
    Pickup,
    Delivery,
    Provider,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverageGap {
    /// Nobody serves the pickup point.
    Pickup,
    /// The selected provider does not reach the delivery point.
    Delivery,
    /// Reassignment found no provider besides the ones that already rejected.
    Reassignment,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("schedule rejected: {0}")]
    Schedule(#[from] ScheduleRejection),

    #[error("{}", coverage_message(.0))]
    NoCoverage(CoverageGap),

    #[error("{}", unresolvable_message(.0))]
    AddressUnresolvable(AddressRole),

    #[error("cannot {action} an order in state {state}")]
    InvalidTransition { state: OrderState, action: Action },

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("upstream unavailable: {0}")]
    Upstream(String),

    #[error("internal error: {0}")]
    Internal(String),
}

fn coverage_message(gap: &CoverageGap) -> &'static str {
    match gap {
        CoverageGap::Pickup => "no provider within radius of pickup",
        CoverageGap::Delivery => "delivery outside provider's radius",
        CoverageGap::Reassignment => "no alternative provider within radius of pickup",
    }
}

fn unresolvable_message(role: &AddressRole) -> &'static str {
    match role {
        AddressRole::Pickup => "pickup address not verifiable",
        AddressRole::Delivery => "delivery address not verifiable",
        AddressRole::Provider => "provider address not verifiable",
    }
}

impl AppError {
    /// Stable machine-readable code for clients.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::Schedule(rejection) => rejection.code(),
            AppError::NoCoverage(CoverageGap::Pickup) => "no_coverage_pickup",
            AppError::NoCoverage(CoverageGap::Delivery) => "no_coverage_delivery",
            AppError::NoCoverage(CoverageGap::Reassignment) => "no_alternative_provider",
            AppError::AddressUnresolvable(AddressRole::Pickup) => "pickup_address_unresolvable",
            AppError::AddressUnresolvable(AddressRole::Delivery) => {
                "delivery_address_unresolvable"
            }
            AppError::AddressUnresolvable(AddressRole::Provider) => {
                "provider_address_unresolvable"
            }
            AppError::InvalidTransition { .. } => "invalid_transition",
            AppError::Forbidden(_) => "forbidden",
            AppError::NotFound(_) => "not_found",
            AppError::Upstream(_) => "upstream_unavailable",
            AppError::Internal(_) => "internal_error",
        }
    }

    /// Business rejections as opposed to faults; used as the metrics outcome label.
    pub fn is_rejection(&self) -> bool {
        !matches!(self, AppError::Upstream(_) | AppError::Internal(_))
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::OrderNotFound(id) => AppError::NotFound(format!("order {id} not found")),
            StoreError::ProviderNotFound(id) => {
                AppError::NotFound(format!("provider {id} not found"))
            }
            StoreError::Duplicate(id) => AppError::Internal(format!("duplicate record {id}")),
            StoreError::Unavailable(msg) => AppError::Upstream(msg),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Schedule(_) | AppError::NoCoverage(_) | AppError::AddressUnresolvable(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            AppError::InvalidTransition { .. } => StatusCode::CONFLICT,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Upstream(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let mut body = json!({
            "error": self.to_string(),
            "code": self.code(),
        });

        if let AppError::InvalidTransition { state, action } = &self {
            body["state"] = json!(state);
            body["action"] = json!(action);
        }

        (status, Json(body)).into_response()
    }
}
