use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;

use crate::geocoding::{GeocodeError, Geocoder};
use crate::models::address::GeoPoint;

pub const DEFAULT_BASE_URL: &str = "https://nominatim.openstreetmap.org";

#[derive(Debug, Deserialize)]
struct SearchResult {
    lat: String,
    lon: String,
}

pub struct NominatimGeocoder {
    base_url: String,
    client: reqwest::Client,
}

impl NominatimGeocoder {
    /// `request_timeout` is a transport backstop; the resolver applies its own
    /// per-call timeout on top.
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self, GeocodeError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("laundry-dispatch/", env!("CARGO_PKG_VERSION")))
            .timeout(request_timeout)
            .build()
            .map_err(|err| GeocodeError::Request(err.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn geocode(&self, query: &str) -> Result<Option<GeoPoint>, GeocodeError> {
        let response = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[("q", query), ("format", "json"), ("limit", "1")])
            .send()
            .await
            .map_err(|err| GeocodeError::Request(err.to_string()))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(GeocodeError::Status(status.as_u16()));
        }
        if !status.is_success() {
            return Ok(None);
        }

        let results: Vec<SearchResult> = response
            .json()
            .await
            .map_err(|err| GeocodeError::Decode(err.to_string()))?;

        let Some(first) = results.first() else {
            return Ok(None);
        };

        Ok(Some(parse_point(first)?))
    }

    fn name(&self) -> &'static str {
        "nominatim"
    }
}

fn parse_point(result: &SearchResult) -> Result<GeoPoint, GeocodeError> {
    let lat = result
        .lat
        .parse::<f64>()
        .map_err(|err| GeocodeError::Decode(format!("latitude `{}`: {err}", result.lat)))?;
    let lng = result
        .lon
        .parse::<f64>()
        .map_err(|err| GeocodeError::Decode(format!("longitude `{}`: {err}", result.lon)))?;

    Ok(GeoPoint { lat, lng })
}
