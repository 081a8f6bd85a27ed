//! Address to coordinate resolution.
//!
//! [`Geocoder`] is the upstream lookup (Nominatim in production, a fixture
//! table in development and tests). [`AddressResolver`] sits in front of it:
//! it walks from the most specific query to the least specific one, spaces
//! upstream calls by a minimum interval and bounds each call with a timeout.
//! Not found, upstream errors and timeouts all come back as `None`.

pub mod fixture;
pub mod nominatim;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, warn};

use crate::models::address::{Address, GeoPoint};
use crate::observability::metrics::Metrics;

pub use fixture::FixtureGeocoder;
pub use nominatim::NominatimGeocoder;

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("geocoding request failed: {0}")]
    Request(String),

    #[error("geocoder responded with status {0}")]
    Status(u16),

    #[error("invalid geocoder response: {0}")]
    Decode(String),
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    /// `Ok(None)` when the query has no match.
    async fn geocode(&self, query: &str) -> Result<Option<GeoPoint>, GeocodeError>;

    fn name(&self) -> &'static str;
}

/// Enforces a minimum spacing between calls, shared by every caller.
pub struct RateLimiter {
    last_call: Mutex<Option<Instant>>,
    min_interval: Duration,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            last_call: Mutex::new(None),
            min_interval,
        }
    }

    pub async fn wait(&self) {
        // Held across the sleep so concurrent callers queue up in turn.
        let mut last = self.last_call.lock().await;

        if let Some(last_time) = *last {
            let elapsed = last_time.elapsed();
            if elapsed < self.min_interval {
                sleep(self.min_interval - elapsed).await;
            }
        }

        *last = Some(Instant::now());
    }
}

#[derive(Debug, Clone)]
pub struct ResolverSettings {
    pub country: String,
    pub min_interval: Duration,
    pub call_timeout: Duration,
}

pub struct AddressResolver {
    geocoder: Arc<dyn Geocoder>,
    limiter: RateLimiter,
    call_timeout: Duration,
    country: String,
    metrics: Metrics,
}

impl AddressResolver {
    pub fn new(geocoder: Arc<dyn Geocoder>, settings: ResolverSettings, metrics: Metrics) -> Self {
        Self {
            geocoder,
            limiter: RateLimiter::new(settings.min_interval),
            call_timeout: settings.call_timeout,
            country: settings.country,
            metrics,
        }
    }

    pub fn backend(&self) -> &'static str {
        self.geocoder.name()
    }

    pub async fn resolve(&self, address: &Address) -> Option<GeoPoint> {
        for query in candidate_queries(address, &self.country) {
            self.limiter.wait().await;

            match timeout(self.call_timeout, self.geocoder.geocode(&query)).await {
                Ok(Ok(Some(point))) => {
                    self.record("found");
                    debug!(query = %query, lat = point.lat, lng = point.lng, "address resolved");
                    return Some(point);
                }
                Ok(Ok(None)) => {
                    self.record("not_found");
                    debug!(query = %query, "no match, trying broader query");
                }
                Ok(Err(err)) => {
                    self.record("error");
                    warn!(query = %query, error = %err, "geocoder failed");
                    return None;
                }
                Err(_) => {
                    self.record("timeout");
                    warn!(
                        query = %query,
                        timeout_secs = self.call_timeout.as_secs_f64(),
                        "geocoder timed out"
                    );
                    return None;
                }
            }
        }

        None
    }

    fn record(&self, outcome: &str) {
        self.metrics
            .geocode_requests_total
            .with_label_values(&[outcome])
            .inc();
    }
}

/// Queries from most to least specific, without repeats.
pub fn candidate_queries(address: &Address, country: &str) -> Vec<String> {
    let street = address.street.trim();
    let number = address.number.trim();
    let city = address.city.trim();
    let region = address.region.trim();
    let postal_code = address.postal_code.trim();

    let candidates = [
        format!("{street} {number}, {postal_code} {city}, {region}, {country}"),
        format!("{street} {number}, {city}, {country}"),
        format!("{street}, {city}, {country}"),
        format!("{city}, {region}, {country}"),
    ];

    let mut queries: Vec<String> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if !queries.contains(&candidate) {
            queries.push(candidate);
        }
    }
    queries
}
