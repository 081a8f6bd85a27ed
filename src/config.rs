use std::env;
use std::time::Duration;

use chrono::FixedOffset;

use crate::error::AppError;
use crate::geocoding::nominatim::DEFAULT_BASE_URL;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeocoderBackend {
    Fixture,
    Nominatim,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub event_buffer_size: usize,
    pub coverage_radius_km: f64,
    pub lead_time_minutes: i64,
    pub min_gap_minutes: i64,
    pub utc_offset_minutes: i32,
    pub geocoder_backend: GeocoderBackend,
    pub geocoder_fixtures: Option<String>,
    pub nominatim_base_url: String,
    pub geocoder_country: String,
    pub geocoder_min_interval_ms: u64,
    pub geocoder_timeout_secs: u64,
    pub notify_webhook_url: Option<String>,
    pub notify_max_attempts: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::Compact,
            event_buffer_size: 1024,
            coverage_radius_km: 5.0,
            lead_time_minutes: 60,
            min_gap_minutes: 180,
            utc_offset_minutes: -180,
            geocoder_backend: GeocoderBackend::Fixture,
            geocoder_fixtures: None,
            nominatim_base_url: DEFAULT_BASE_URL.to_string(),
            geocoder_country: "Uruguay".to_string(),
            geocoder_min_interval_ms: 1100,
            geocoder_timeout_secs: 10,
            notify_webhook_url: None,
            notify_max_attempts: 3,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();
        let defaults = Self::default();

        let log_format = match env::var("LOG_FORMAT").as_deref() {
            Ok("json") => LogFormat::Json,
            Ok("compact") | Err(_) => LogFormat::Compact,
            Ok(other) => {
                return Err(AppError::Internal(format!(
                    "invalid LOG_FORMAT: {other}, expected compact/json"
                )));
            }
        };

        let geocoder_backend = match env::var("GEOCODER_BACKEND").as_deref() {
            Ok("nominatim") => GeocoderBackend::Nominatim,
            Ok("fixture") | Err(_) => GeocoderBackend::Fixture,
            Ok(other) => {
                return Err(AppError::Internal(format!(
                    "invalid GEOCODER_BACKEND: {other}, expected fixture/nominatim"
                )));
            }
        };

        let config = Self {
            http_port: parse_or_default("HTTP_PORT", defaults.http_port)?,
            log_level: env::var("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_format,
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", defaults.event_buffer_size)?,
            coverage_radius_km: parse_or_default("COVERAGE_RADIUS_KM", defaults.coverage_radius_km)?,
            lead_time_minutes: parse_or_default("LEAD_TIME_MINUTES", defaults.lead_time_minutes)?,
            min_gap_minutes: parse_or_default("MIN_GAP_MINUTES", defaults.min_gap_minutes)?,
            utc_offset_minutes: parse_or_default("UTC_OFFSET_MINUTES", defaults.utc_offset_minutes)?,
            geocoder_backend,
            geocoder_fixtures: optional("GEOCODER_FIXTURES"),
            nominatim_base_url: env::var("NOMINATIM_BASE_URL").unwrap_or(defaults.nominatim_base_url),
            geocoder_country: env::var("GEOCODER_COUNTRY").unwrap_or(defaults.geocoder_country),
            geocoder_min_interval_ms: parse_or_default(
                "GEOCODER_MIN_INTERVAL_MS",
                defaults.geocoder_min_interval_ms,
            )?,
            geocoder_timeout_secs: parse_or_default(
                "GEOCODER_TIMEOUT_SECS",
                defaults.geocoder_timeout_secs,
            )?,
            notify_webhook_url: optional("NOTIFY_WEBHOOK_URL"),
            notify_max_attempts: parse_or_default("NOTIFY_MAX_ATTEMPTS", defaults.notify_max_attempts)?,
        };

        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<(), AppError> {
        if !(self.coverage_radius_km.is_finite() && self.coverage_radius_km > 0.0) {
            return Err(AppError::Internal(
                "COVERAGE_RADIUS_KM must be a positive number".to_string(),
            ));
        }
        if self.lead_time_minutes < 0 || self.min_gap_minutes < 0 {
            return Err(AppError::Internal(
                "LEAD_TIME_MINUTES and MIN_GAP_MINUTES must not be negative".to_string(),
            ));
        }
        if self.event_buffer_size == 0 {
            return Err(AppError::Internal("EVENT_BUFFER_SIZE must be > 0".to_string()));
        }
        self.utc_offset()?;
        Ok(())
    }

    pub fn utc_offset(&self) -> Result<FixedOffset, AppError> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).ok_or_else(|| {
            AppError::Internal(format!(
                "invalid UTC_OFFSET_MINUTES: {}",
                self.utc_offset_minutes
            ))
        })
    }

    pub fn lead_time(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.lead_time_minutes)
    }

    pub fn min_gap(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.min_gap_minutes)
    }

    pub fn geocoder_min_interval(&self) -> Duration {
        Duration::from_millis(self.geocoder_min_interval_ms)
    }

    pub fn geocoder_timeout(&self) -> Duration {
        Duration::from_secs(self.geocoder_timeout_secs)
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::Config;

    #[test]
    fn defaults_match_business_rules() {
        let config = Config::default();
        assert_eq!(config.coverage_radius_km, 5.0);
        assert_eq!(config.lead_time().num_minutes(), 60);
        assert_eq!(config.min_gap().num_hours(), 3);
        assert_eq!(config.geocoder_min_interval().as_millis(), 1100);
        assert_eq!(config.geocoder_timeout().as_secs(), 10);
        assert_eq!(config.utc_offset().unwrap().local_minus_utc(), -3 * 3600);
    }

    #[test]
    fn out_of_range_offset_is_rejected() {
        let config = Config {
            utc_offset_minutes: 24 * 60,
            ..Config::default()
        };
        assert!(config.utc_offset().is_err());
    }

    #[test]
    fn non_positive_radius_is_rejected() {
        let config = Config {
            coverage_radius_km: 0.0,
            ..Config::default()
        };
        assert!(config.check().is_err());
    }
}
