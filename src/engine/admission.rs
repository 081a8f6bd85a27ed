use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::matching::nearest_within;
use crate::engine::schedule::{ScheduleValidator, WindowInput};
use crate::error::{AddressRole, AppError, CoverageGap};
use crate::geo::within_radius;
use crate::geocoding::AddressResolver;
use crate::models::address::Address;
use crate::models::order::{Order, OrderState, ServiceItem};
use crate::models::provider::ProviderSnapshot;
use crate::notify::Notifier;
use crate::observability::metrics::Metrics;
use crate::store::{OrderStore, ProviderStore};

/// Body of an order creation request. Fields are optional here only so a
/// missing one can be named in the error; [`AdmissionRequest::validate`]
/// runs before any business rule.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdmissionRequest {
    pub customer_id: Option<Uuid>,
    pub service: Option<ServiceItem>,
    pub pickup_address: Option<Address>,
    pub delivery_address: Option<Address>,
    pub pickup_window: Option<WindowInput>,
    pub delivery_window: Option<WindowInput>,
    #[serde(default)]
    pub notes: String,
}

struct ValidRequest {
    customer_id: Uuid,
    service: ServiceItem,
    pickup_address: Address,
    delivery_address: Address,
    pickup_window: WindowInput,
    delivery_window: WindowInput,
    notes: String,
}

fn required<T>(value: Option<T>, field: &str) -> Result<T, AppError> {
    value.ok_or_else(|| AppError::Validation(format!("{field} is required")))
}

impl AdmissionRequest {
    fn validate(self) -> Result<ValidRequest, AppError> {
        let customer_id = required(self.customer_id, "customer_id")?;
        let service = required(self.service, "service")?;
        let pickup_address = required(self.pickup_address, "pickup_address")?;
        let delivery_address = required(self.delivery_address, "delivery_address")?;
        let pickup_window = required(self.pickup_window, "pickup_window")?;
        let delivery_window = required(self.delivery_window, "delivery_window")?;

        if service.name.trim().is_empty() {
            return Err(AppError::Validation("service.name is required".to_string()));
        }
        if !service.price.is_finite() || service.price < 0.0 {
            return Err(AppError::Validation(
                "service.price must be a non-negative number".to_string(),
            ));
        }
        pickup_address.validate("pickup_address")?;
        delivery_address.validate("delivery_address")?;

        Ok(ValidRequest {
            customer_id,
            service,
            pickup_address,
            delivery_address,
            pickup_window,
            delivery_window,
            notes: self.notes,
        })
    }
}

pub struct AdmissionService {
    resolver: Arc<AddressResolver>,
    orders: Arc<dyn OrderStore>,
    providers: Arc<dyn ProviderStore>,
    notifier: Arc<dyn Notifier>,
    schedule: ScheduleValidator,
    radius_km: f64,
    metrics: Metrics,
}

impl AdmissionService {
    pub fn new(
        resolver: Arc<AddressResolver>,
        orders: Arc<dyn OrderStore>,
        providers: Arc<dyn ProviderStore>,
        notifier: Arc<dyn Notifier>,
        schedule: ScheduleValidator,
        radius_km: f64,
        metrics: Metrics,
    ) -> Self {
        Self {
            resolver,
            orders,
            providers,
            notifier,
            schedule,
            radius_km,
            metrics,
        }
    }

    /// Validates, schedules, geocodes and matches a new order, then stores it
    /// as `pending`. The first failing step decides the rejection.
    pub async fn admit(&self, request: AdmissionRequest, now: DateTime<Utc>) -> Result<Order, AppError> {
        let start = Instant::now();
        let result = self.try_admit(request, now).await;

        let outcome = match &result {
            Ok(order) => {
                info!(
                    order_id = %order.id,
                    provider_id = %order.provider.id,
                    customer_id = %order.customer_id,
                    "order admitted"
                );
                "admitted"
            }
            Err(err) if err.is_rejection() => {
                info!(code = err.code(), reason = %err, "order rejected");
                "rejected"
            }
            Err(err) => {
                warn!(error = %err, "order admission failed");
                "error"
            }
        };

        self.metrics
            .admission_latency_seconds
            .with_label_values(&[outcome])
            .observe(start.elapsed().as_secs_f64());
        self.metrics
            .admissions_total
            .with_label_values(&[outcome])
            .inc();

        result
    }

    async fn try_admit(&self, request: AdmissionRequest, now: DateTime<Utc>) -> Result<Order, AppError> {
        let request = request.validate()?;

        let windows = self
            .schedule
            .validate(&request.pickup_window, &request.delivery_window, now)?;

        let pickup_location = self
            .resolver
            .resolve(&request.pickup_address)
            .await
            .ok_or(AppError::AddressUnresolvable(AddressRole::Pickup))?;

        let providers = self.providers.all_providers().await?;
        let provider = nearest_within(&pickup_location, &providers, self.radius_km)
            .ok_or(AppError::NoCoverage(CoverageGap::Pickup))?;

        let delivery_location = self
            .resolver
            .resolve(&request.delivery_address)
            .await
            .ok_or(AppError::AddressUnresolvable(AddressRole::Delivery))?;

        if !within_radius(&delivery_location, &provider.location, self.radius_km) {
            return Err(AppError::NoCoverage(CoverageGap::Delivery));
        }

        let order = Order {
            id: Uuid::new_v4(),
            customer_id: request.customer_id,
            service: request.service,
            pickup_address: request.pickup_address,
            delivery_address: request.delivery_address,
            pickup_location,
            delivery_location,
            pickup_at: windows.pickup_at,
            delivery_at: windows.delivery_at,
            provider: ProviderSnapshot::from(provider),
            rejected_by: Vec::new(),
            state: OrderState::Pending,
            notes: request.notes,
            version: 0,
            created_at: now,
            updated_at: now,
            completed_at: None,
        };

        self.orders.insert_order(order.clone()).await?;
        self.spawn_notification(order.clone());

        Ok(order)
    }

    /// The stored order is authoritative; a failed notification is only logged.
    fn spawn_notification(&self, order: Order) {
        let notifier = self.notifier.clone();
        tokio::spawn(async move {
            if let Err(err) = notifier.notify_order_created(&order).await {
                warn!(
                    order_id = %order.id,
                    notifier = notifier.name(),
                    error = %err,
                    "order created notification failed"
                );
            }
        });
    }
}
