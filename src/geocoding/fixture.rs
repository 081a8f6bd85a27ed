use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;

use crate::error::AppError;
use crate::geocoding::{GeocodeError, Geocoder};
use crate::models::address::GeoPoint;

/// Deterministic lookup table, for development and tests.
///
/// A query matches an entry when it equals the entry key or starts with it,
/// ignoring case and repeated whitespace; the longest matching key wins. So
/// a key `"Av. Brasil 2520"` answers every query built from that street.
#[derive(Debug, Default, Clone)]
pub struct FixtureGeocoder {
    entries: HashMap<String, GeoPoint>,
}

impl FixtureGeocoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, key: &str, point: GeoPoint) -> Self {
        self.entries.insert(normalize(key), point);
        self
    }

    /// Loads a JSON object of `{ "key": { "lat": .., "lng": .. } }`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|err| {
            AppError::Internal(format!("failed to read {}: {err}", path.display()))
        })?;
        let table: HashMap<String, GeoPoint> = serde_json::from_str(&raw).map_err(|err| {
            AppError::Internal(format!("invalid fixtures in {}: {err}", path.display()))
        })?;

        Ok(table
            .into_iter()
            .fold(Self::new(), |geocoder, (key, point)| {
                geocoder.with_entry(&key, point)
            }))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn lookup(&self, query: &str) -> Option<GeoPoint> {
        let query = normalize(query);
        if let Some(point) = self.entries.get(&query) {
            return Some(*point);
        }

        self.entries
            .iter()
            .filter(|(key, _)| query.starts_with(key.as_str()))
            .max_by_key(|(key, _)| key.len())
            .map(|(_, point)| *point)
    }
}

fn normalize(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[async_trait]
impl Geocoder for FixtureGeocoder {
    async fn geocode(&self, query: &str) -> Result<Option<GeoPoint>, GeocodeError> {
        Ok(self.lookup(query))
    }

    fn name(&self) -> &'static str {
        "fixture"
    }
}

#[cfg(test)]
mod tests {
    use super::FixtureGeocoder;
    use crate::geocoding::Geocoder;
    use crate::models::address::GeoPoint;

    const CENTRO: GeoPoint = GeoPoint {
        lat: -34.9055,
        lng: -56.1851,
    };
    const POCITOS: GeoPoint = GeoPoint {
        lat: -34.9145,
        lng: -56.1503,
    };

    #[tokio::test]
    async fn longest_prefix_wins() {
        let geocoder = FixtureGeocoder::new()
            .with_entry("Av. Brasil", CENTRO)
            .with_entry("av.  brasil 2520", POCITOS);

        let hit = geocoder
            .geocode("Av. Brasil 2520, 11300 Montevideo, Montevideo, Uruguay")
            .await
            .unwrap();
        assert_eq!(hit, Some(POCITOS));

        let broad = geocoder
            .geocode("Av. Brasil, Montevideo, Uruguay")
            .await
            .unwrap();
        assert_eq!(broad, Some(CENTRO));
    }

    #[tokio::test]
    async fn unknown_query_is_not_found() {
        let geocoder = FixtureGeocoder::new().with_entry("Av. Brasil", CENTRO);
        let miss = geocoder.geocode("Bulevar Artigas 100").await.unwrap();
        assert_eq!(miss, None);
    }

    #[test]
    fn loads_table_from_json_file() {
        let path = std::env::temp_dir().join(format!(
            "geocoder-fixtures-{}.json",
            uuid::Uuid::new_v4()
        ));
        std::fs::write(
            &path,
            r#"{ "Av. Brasil 2520": { "lat": -34.9145, "lng": -56.1503 } }"#,
        )
        .unwrap();

        let geocoder = FixtureGeocoder::from_file(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(geocoder.len(), 1);
    }
}
