use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::info;

use crate::config::{Config, GeocoderBackend};
use crate::engine::admission::AdmissionService;
use crate::engine::lifecycle::OrderLifecycle;
use crate::engine::schedule::ScheduleValidator;
use crate::error::AppError;
use crate::geocoding::{
    AddressResolver, FixtureGeocoder, Geocoder, NominatimGeocoder, ResolverSettings,
};
use crate::models::order::OrderEvent;
use crate::notify::{BackoffPolicy, ChannelNotifier, FanoutNotifier, Notifier, WebhookNotifier};
use crate::observability::metrics::Metrics;
use crate::store::MemoryStore;

pub struct AppState {
    pub store: Arc<MemoryStore>,
    pub resolver: Arc<AddressResolver>,
    pub admission: AdmissionService,
    pub lifecycle: OrderLifecycle,
    pub events_tx: broadcast::Sender<OrderEvent>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(config: &Config, geocoder: Arc<dyn Geocoder>) -> Result<Self, AppError> {
        let metrics = Metrics::new();
        let store = Arc::new(MemoryStore::new());
        let (events_tx, _unused_rx) = broadcast::channel(config.event_buffer_size);
        let offset = config.utc_offset()?;

        let resolver = Arc::new(AddressResolver::new(
            geocoder,
            ResolverSettings {
                country: config.geocoder_country.clone(),
                min_interval: config.geocoder_min_interval(),
                call_timeout: config.geocoder_timeout(),
            },
            metrics.clone(),
        ));

        let mut notifiers: Vec<Arc<dyn Notifier>> =
            vec![Arc::new(ChannelNotifier::new(events_tx.clone()))];
        if let Some(url) = &config.notify_webhook_url {
            let policy = BackoffPolicy {
                max_attempts: config.notify_max_attempts.max(1),
                ..BackoffPolicy::default()
            };
            let webhook = WebhookNotifier::new(url, policy, offset)
                .map_err(|err| AppError::Internal(format!("webhook notifier: {err}")))?;
            notifiers.push(Arc::new(webhook));
        }

        let admission = AdmissionService::new(
            resolver.clone(),
            store.clone(),
            store.clone(),
            Arc::new(FanoutNotifier::new(notifiers)),
            ScheduleValidator::new(config.lead_time(), config.min_gap(), offset),
            config.coverage_radius_km,
            metrics.clone(),
        );

        let lifecycle = OrderLifecycle::new(
            store.clone(),
            store.clone(),
            config.coverage_radius_km,
            events_tx.clone(),
            metrics.clone(),
        );

        Ok(Self {
            store,
            resolver,
            admission,
            lifecycle,
            events_tx,
            metrics,
        })
    }
}

pub fn geocoder_from_config(config: &Config) -> Result<Arc<dyn Geocoder>, AppError> {
    match config.geocoder_backend {
        GeocoderBackend::Nominatim => {
            info!(base_url = %config.nominatim_base_url, "using nominatim geocoder");
            let geocoder = NominatimGeocoder::new(&config.nominatim_base_url, config.geocoder_timeout())
                .map_err(|err| AppError::Internal(format!("nominatim client: {err}")))?;
            Ok(Arc::new(geocoder))
        }
        GeocoderBackend::Fixture => {
            let geocoder = match &config.geocoder_fixtures {
                Some(path) => FixtureGeocoder::from_file(path)?,
                None => FixtureGeocoder::new(),
            };
            info!(entries = geocoder.len(), "using fixture geocoder");
            Ok(Arc::new(geocoder))
        }
    }
}
