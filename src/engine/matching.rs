use crate::geo::haversine_km;
use crate::models::address::GeoPoint;
use crate::models::provider::Provider;

/// Nearest provider within `radius_km` of `point`. Ties keep the first one in
/// input order. `None` means no coverage, not a failure.
pub fn nearest_within<'a, I>(point: &GeoPoint, providers: I, radius_km: f64) -> Option<&'a Provider>
where
    I: IntoIterator<Item = &'a Provider>,
{
    let mut best: Option<(&Provider, f64)> = None;

    for provider in providers {
        let distance = haversine_km(point, &provider.location);
        if distance > radius_km {
            continue;
        }

        match best {
            Some((_, best_distance)) if best_distance <= distance => {}
            _ => best = Some((provider, distance)),
        }
    }

    best.map(|(provider, _)| provider)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::nearest_within;
    use crate::geo::EARTH_RADIUS_KM;
    use crate::models::address::{Address, GeoPoint};
    use crate::models::provider::Provider;

    const ORIGIN: GeoPoint = GeoPoint {
        lat: -34.90,
        lng: -56.16,
    };

    /// Provider `km` kilometres due north of `ORIGIN`.
    fn provider_at_km(id_seed: u128, km: f64) -> Provider {
        let delta_lat = (km / EARTH_RADIUS_KM).to_degrees();
        Provider {
            id: Uuid::from_u128(id_seed),
            name: format!("lavadero-{id_seed}"),
            address: Address {
                street: "Rivera".to_string(),
                number: id_seed.to_string(),
                unit: None,
                city: "Montevideo".to_string(),
                region: "Montevideo".to_string(),
                postal_code: "11200".to_string(),
            },
            location: GeoPoint {
                lat: ORIGIN.lat + delta_lat,
                lng: ORIGIN.lng,
            },
            services: vec!["lavado".to_string()],
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn picks_nearest_regardless_of_order() {
        let a = provider_at_km(1, 3.2);
        let b = provider_at_km(2, 1.9);
        let c = provider_at_km(3, 4.0);

        let orders = [
            vec![&a, &b, &c],
            vec![&c, &b, &a],
            vec![&b, &a, &c],
            vec![&a, &c, &b],
        ];

        for providers in orders {
            let chosen = nearest_within(&ORIGIN, providers, 5.0).unwrap();
            assert_eq!(chosen.id, b.id);
        }
    }

    #[test]
    fn returns_none_when_nobody_is_in_range() {
        let far = provider_at_km(1, 12.0);
        assert!(nearest_within(&ORIGIN, [&far], 5.0).is_none());
        assert!(nearest_within(&ORIGIN, std::iter::empty(), 5.0).is_none());
    }

    #[test]
    fn ties_keep_first_encountered() {
        let first = provider_at_km(7, 2.0);
        let mut second = provider_at_km(8, 2.0);
        second.location = first.location;

        let chosen = nearest_within(&ORIGIN, [&first, &second], 5.0).unwrap();
        assert_eq!(chosen.id, first.id);

        let chosen = nearest_within(&ORIGIN, [&second, &first], 5.0).unwrap();
        assert_eq!(chosen.id, second.id);
    }

    #[test]
    fn provider_exactly_on_radius_is_eligible() {
        let edge = provider_at_km(1, 5.0);
        let distance = crate::geo::haversine_km(&ORIGIN, &edge.location);

        assert!(nearest_within(&ORIGIN, [&edge], distance).is_some());
        assert!(nearest_within(&ORIGIN, [&edge], distance - 1e-9).is_none());
    }
}
