use serde::{Deserialize, Serialize};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

/// Structured street address. Orders keep their own copy, so later edits to an
/// address book entry never reach an existing order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Address {
    pub street: String,
    pub number: String,
    #[serde(default)]
    pub unit: Option<String>,
    pub city: String,
    pub region: String,
    pub postal_code: String,
}

impl Address {
    /// Rejects blank required fields, naming the first offending one.
    pub fn validate(&self, field: &str) -> Result<(), AppError> {
        let required = [
            ("street", &self.street),
            ("number", &self.number),
            ("city", &self.city),
            ("region", &self.region),
            ("postal_code", &self.postal_code),
        ];

        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(AppError::Validation(format!("{field}.{name} is required")));
            }
        }

        Ok(())
    }

    /// Single-line rendering, e.g. `Av. Brasil 2520 apto 3, Montevideo`.
    pub fn display_line(&self) -> String {
        match self.unit.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
            Some(unit) => format!("{} {} {}, {}", self.street, self.number, unit, self.city),
            None => format!("{} {}, {}", self.street, self.number, self.city),
        }
    }
}
