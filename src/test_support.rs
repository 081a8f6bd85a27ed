use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use uuid::Uuid;

use crate::models::address::{Address, GeoPoint};
use crate::models::order::{Order, OrderState, ServiceItem};
use crate::models::provider::{Provider, ProviderSnapshot};

pub const CUSTOMER_ID: Uuid = Uuid::from_u128(100);

pub fn offset() -> FixedOffset {
    FixedOffset::west_opt(3 * 3600).unwrap()
}

pub fn local(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    offset()
        .with_ymd_and_hms(y, mo, d, h, mi, 0)
        .unwrap()
        .with_timezone(&Utc)
}

pub fn address(street: &str, number: &str) -> Address {
    Address {
        street: street.to_string(),
        number: number.to_string(),
        unit: None,
        city: "Montevideo".to_string(),
        region: "Montevideo".to_string(),
        postal_code: "11300".to_string(),
    }
}

pub fn provider(id_seed: u128, lat: f64, lng: f64) -> Provider {
    Provider {
        id: Uuid::from_u128(id_seed),
        name: format!("Lavadero {id_seed}"),
        address: address("Rivera", &id_seed.to_string()),
        location: GeoPoint { lat, lng },
        services: vec!["lavado y secado".to_string()],
        updated_at: local(2026, 1, 10, 9, 0),
    }
}

/// Pending order assigned to `provider(1, -34.91, -56.17)`.
pub fn sample_order() -> Order {
    let assigned = provider(1, -34.91, -56.17);
    let created_at = local(2026, 3, 2, 7, 0);

    Order {
        id: Uuid::new_v4(),
        customer_id: CUSTOMER_ID,
        service: ServiceItem {
            name: "lavado y secado".to_string(),
            price: 450.0,
            description: "hasta 5 kg".to_string(),
        },
        pickup_address: address("Av. Brasil", "2520"),
        delivery_address: address("Bulevar España", "2155"),
        pickup_location: GeoPoint {
            lat: -34.90,
            lng: -56.16,
        },
        delivery_location: GeoPoint {
            lat: -34.89,
            lng: -56.18,
        },
        pickup_at: local(2026, 3, 2, 10, 0),
        delivery_at: local(2026, 3, 2, 18, 0),
        provider: ProviderSnapshot::from(&assigned),
        rejected_by: Vec::new(),
        state: OrderState::Pending,
        notes: String::new(),
        version: 0,
        created_at,
        updated_at: created_at,
        completed_at: None,
    }
}
