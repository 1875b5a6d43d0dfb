//! Quote pricing engine.
//!
//! A fare is either a fixed-route price or a metered price built from a base
//! fare plus distance and time components, floored at the vehicle minimum.
//! All money is integer pence.

use serde::{Deserialize, Serialize};

use crate::{
    normalize_text, DistanceProvider, FixedRoute, JourneyMetrics, TransferError, TransferResult,
    VehicleRate, VehicleType,
};

pub const METERS_PER_MILE: f64 = 1609.344;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FareRequest {
    pub pickup: String,
    pub dropoff: String,
    pub vehicle_type: VehicleType,
    pub metrics: JourneyMetrics,
    pub return_journey: bool,
    pub passengers: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FareBreakdown {
    pub vehicle_type: VehicleType,
    pub base_pence: u32,
    pub distance_pence: u32,
    pub time_pence: u32,
    /// Single-leg price after fixed-route override and minimum fare
    pub subtotal_pence: u32,
    pub total_pence: u32,
    pub fixed_route_id: Option<String>,
    pub return_journey: bool,
    pub distance_miles: f64,
    pub duration_minutes: f64,
    pub display_total: String,
}

impl FixedRoute {
    pub fn matches(&self, pickup: &str, dropoff: &str) -> bool {
        let pickup = normalize_text(pickup);
        let dropoff = normalize_text(dropoff);
        let from = normalize_text(&self.from_area);
        let to = normalize_text(&self.to_area);

        if from.is_empty() || to.is_empty() {
            return false;
        }

        let forward = pickup.contains(&from) && dropoff.contains(&to);
        let reverse = self.bidirectional && pickup.contains(&to) && dropoff.contains(&from);
        forward || reverse
    }

    pub fn validate(&self) -> TransferResult<()> {
        if self.id.trim().is_empty() {
            return Err(TransferError::ValidationError("Route id is required".to_string()));
        }
        if normalize_text(&self.from_area).is_empty() || normalize_text(&self.to_area).is_empty() {
            return Err(TransferError::ValidationError(
                "fromArea and toArea are required".to_string(),
            ));
        }
        if self.prices.is_empty() {
            return Err(TransferError::ValidationError(
                "A fixed route needs at least one vehicle price".to_string(),
            ));
        }
        Ok(())
    }
}

/// First route matching the journey, in the order given
pub fn find_fixed_route<'a>(
    routes: &'a [FixedRoute],
    pickup: &str,
    dropoff: &str,
) -> Option<&'a FixedRoute> {
    routes.iter().find(|route| route.matches(pickup, dropoff))
}

fn validate_metrics(metrics: &JourneyMetrics) -> TransferResult<()> {
    let valid = |v: f64| v.is_finite() && v >= 0.0;
    if !valid(metrics.distance_meters) || !valid(metrics.duration_seconds) {
        return Err(TransferError::ValidationError(format!(
            "Invalid journey metrics: distance={} duration={}",
            metrics.distance_meters, metrics.duration_seconds
        )));
    }
    Ok(())
}

fn round_pence(value: f64) -> u32 {
    value.round().clamp(0.0, u32::MAX as f64) as u32
}

pub fn calculate_fare(
    request: &FareRequest,
    rate: &VehicleRate,
    fixed_routes: &[FixedRoute],
) -> TransferResult<FareBreakdown> {
    if rate.vehicle_type != request.vehicle_type {
        return Err(TransferError::InternalError(format!(
            "Rate for {} used to price {}",
            rate.vehicle_type, request.vehicle_type
        )));
    }
    if request.passengers == 0 || request.passengers > rate.max_passengers {
        return Err(TransferError::ValidationError(format!(
            "{} carries 1 to {} passengers, requested {}",
            rate.display_name, rate.max_passengers, request.passengers
        )));
    }
    validate_metrics(&request.metrics)?;

    let distance_miles = request.metrics.distance_meters / METERS_PER_MILE;
    let duration_minutes = request.metrics.duration_seconds / 60.0;

    let fixed = find_fixed_route(fixed_routes, &request.pickup, &request.dropoff).and_then(
        |route| {
            route
                .prices
                .get(&request.vehicle_type)
                .map(|price| (route.id.clone(), *price))
        },
    );

    let (base_pence, distance_pence, time_pence, subtotal_pence, fixed_route_id) = match fixed {
        Some((route_id, price)) => {
            tracing::debug!("Fixed route {} applies to {}", route_id, request.vehicle_type);
            (0, 0, 0, price, Some(route_id))
        }
        None => {
            let distance_pence = round_pence(distance_miles * rate.per_mile_pence as f64);
            let time_pence = round_pence(duration_minutes * rate.per_minute_pence as f64);
            let metered = rate
                .base_fare_pence
                .saturating_add(distance_pence)
                .saturating_add(time_pence);
            (
                rate.base_fare_pence,
                distance_pence,
                time_pence,
                metered.max(rate.minimum_fare_pence),
                None,
            )
        }
    };

    let total_pence = if request.return_journey {
        subtotal_pence.saturating_mul(2)
    } else {
        subtotal_pence
    };

    Ok(FareBreakdown {
        vehicle_type: request.vehicle_type,
        base_pence,
        distance_pence,
        time_pence,
        subtotal_pence,
        total_pence,
        fixed_route_id,
        return_journey: request.return_journey,
        distance_miles: (distance_miles * 100.0).round() / 100.0,
        duration_minutes: duration_minutes.round(),
        display_total: format_gbp(total_pence),
    })
}

/// Price every vehicle able to carry the party, cheapest first
pub fn quote_all(
    metrics: JourneyMetrics,
    rates: &[VehicleRate],
    fixed_routes: &[FixedRoute],
    pickup: &str,
    dropoff: &str,
    return_journey: bool,
    passengers: u8,
) -> TransferResult<Vec<FareBreakdown>> {
    validate_metrics(&metrics)?;

    let mut fares = rates
        .iter()
        .filter(|rate| passengers >= 1 && passengers <= rate.max_passengers)
        .map(|rate| {
            let request = FareRequest {
                pickup: pickup.to_string(),
                dropoff: dropoff.to_string(),
                vehicle_type: rate.vehicle_type,
                metrics,
                return_journey,
                passengers,
            };
            calculate_fare(&request, rate, fixed_routes)
        })
        .collect::<TransferResult<Vec<_>>>()?;

    if fares.is_empty() {
        return Err(TransferError::ValidationError(format!(
            "No vehicle can carry {} passengers",
            passengers
        )));
    }

    fares.sort_by_key(|fare| fare.total_pence);
    Ok(fares)
}

/// A journey as entered by a customer, before it is measured
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JourneyRequest {
    pub pickup: String,
    pub dropoff: String,
    #[serde(default)]
    pub return_journey: bool,
    #[serde(default = "default_passengers")]
    pub passengers: u8,
    #[serde(default)]
    pub vehicle_type: Option<VehicleType>,
}

fn default_passengers() -> u8 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricedJourney {
    pub pickup: String,
    pub dropoff: String,
    pub metrics: JourneyMetrics,
    pub fares: Vec<FareBreakdown>,
}

/// Measure the journey and price it for every eligible vehicle, or only the
/// requested one
pub async fn price_journey(
    provider: &dyn DistanceProvider,
    rates: &[VehicleRate],
    fixed_routes: &[FixedRoute],
    request: &JourneyRequest,
) -> TransferResult<PricedJourney> {
    let pickup = request.pickup.trim();
    let dropoff = request.dropoff.trim();
    if pickup.is_empty() || dropoff.is_empty() {
        return Err(TransferError::ValidationError(
            "Pickup and dropoff are required".to_string(),
        ));
    }

    let metrics = provider.measure(pickup, dropoff).await?;

    let fares = match request.vehicle_type {
        Some(vehicle_type) => {
            let rate = rates
                .iter()
                .find(|rate| rate.vehicle_type == vehicle_type)
                .ok_or_else(|| TransferError::ValidationError(format!("{} is not offered", vehicle_type)))?;
            let fare_request = FareRequest {
                pickup: pickup.to_string(),
                dropoff: dropoff.to_string(),
                vehicle_type,
                metrics,
                return_journey: request.return_journey,
                passengers: request.passengers,
            };
            vec![calculate_fare(&fare_request, rate, fixed_routes)?]
        }
        None => quote_all(
            metrics,
            rates,
            fixed_routes,
            pickup,
            dropoff,
            request.return_journey,
            request.passengers,
        )?,
    };

    Ok(PricedJourney {
        pickup: pickup.to_string(),
        dropoff: dropoff.to_string(),
        metrics,
        fares,
    })
}

pub fn format_gbp(pence: u32) -> String {
    format!("£{}.{:02}", pence / 100, pence % 100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::default_rates;
    use std::collections::HashMap;

    fn saloon() -> VehicleRate {
        default_rates()
            .into_iter()
            .find(|r| r.vehicle_type == VehicleType::Saloon)
            .unwrap()
    }

    fn request(distance_meters: f64, duration_seconds: f64) -> FareRequest {
        FareRequest {
            pickup: "12 High Street, Dartford".to_string(),
            dropoff: "Gatwick Airport North Terminal".to_string(),
            vehicle_type: VehicleType::Saloon,
            metrics: JourneyMetrics {
                distance_meters,
                duration_seconds,
            },
            return_journey: false,
            passengers: 2,
        }
    }

    fn gatwick_route() -> FixedRoute {
        let mut prices = HashMap::new();
        prices.insert(VehicleType::Saloon, 6500);
        FixedRoute {
            id: "dartford-gatwick".to_string(),
            from_area: "Dartford".to_string(),
            to_area: "Gatwick Airport".to_string(),
            bidirectional: true,
            prices,
        }
    }

    #[test]
    fn test_metered_fare() {
        // 10 miles, 20 minutes: 350 + 1800 + 400
        let fare = calculate_fare(&request(16093.44, 1200.0), &saloon(), &[]).unwrap();
        assert_eq!(fare.base_pence, 350);
        assert_eq!(fare.distance_pence, 1800);
        assert_eq!(fare.time_pence, 400);
        assert_eq!(fare.subtotal_pence, 2550);
        assert_eq!(fare.total_pence, 2550);
        assert_eq!(fare.display_total, "£25.50");
        assert!(fare.fixed_route_id.is_none());
    }

    #[test]
    fn test_minimum_fare_applies_to_short_and_zero_journeys() {
        let fare = calculate_fare(&request(0.0, 0.0), &saloon(), &[]).unwrap();
        assert_eq!(fare.total_pence, 800);

        let fare = calculate_fare(&request(500.0, 120.0), &saloon(), &[]).unwrap();
        assert_eq!(fare.total_pence, 800);
    }

    #[test]
    fn test_return_journey_doubles_the_leg() {
        let mut req = request(16093.44, 1200.0);
        req.return_journey = true;
        let fare = calculate_fare(&req, &saloon(), &[]).unwrap();
        assert_eq!(fare.subtotal_pence, 2550);
        assert_eq!(fare.total_pence, 5100);
    }

    #[test]
    fn test_fixed_route_overrides_meter() {
        let routes = vec![gatwick_route()];
        let fare = calculate_fare(&request(80000.0, 4000.0), &saloon(), &routes).unwrap();
        assert_eq!(fare.total_pence, 6500);
        assert_eq!(fare.fixed_route_id.as_deref(), Some("dartford-gatwick"));
    }

    #[test]
    fn test_fixed_route_reverse_direction() {
        let route = gatwick_route();
        assert!(route.matches("GATWICK AIRPORT South", "Dartford station"));

        let mut one_way = gatwick_route();
        one_way.bidirectional = false;
        assert!(!one_way.matches("Gatwick Airport South", "Dartford station"));
    }

    #[test]
    fn test_fixed_route_without_vehicle_price_falls_back_to_meter() {
        let routes = vec![gatwick_route()];
        let executive = default_rates()
            .into_iter()
            .find(|r| r.vehicle_type == VehicleType::Executive)
            .unwrap();
        let mut req = request(16093.44, 1200.0);
        req.vehicle_type = VehicleType::Executive;
        let fare = calculate_fare(&req, &executive, &routes).unwrap();
        assert!(fare.fixed_route_id.is_none());
        assert_eq!(fare.total_pence, 600 + 2600 + 600);
    }

    #[test]
    fn test_rejects_bad_metrics_and_passenger_counts() {
        assert!(calculate_fare(&request(-1.0, 10.0), &saloon(), &[]).is_err());
        assert!(calculate_fare(&request(f64::NAN, 10.0), &saloon(), &[]).is_err());

        let mut req = request(1000.0, 60.0);
        req.passengers = 5;
        assert!(matches!(
            calculate_fare(&req, &saloon(), &[]),
            Err(TransferError::ValidationError(_))
        ));
        req.passengers = 0;
        assert!(calculate_fare(&req, &saloon(), &[]).is_err());
    }

    #[test]
    fn test_quote_all_filters_by_capacity_and_sorts() {
        let metrics = JourneyMetrics {
            distance_meters: 16093.44,
            duration_seconds: 1200.0,
        };
        let fares = quote_all(metrics, &default_rates(), &[], "A", "B", false, 6).unwrap();
        let vehicles: Vec<_> = fares.iter().map(|f| f.vehicle_type).collect();
        assert_eq!(vehicles, vec![VehicleType::PeopleCarrier, VehicleType::Minibus]);
        assert!(fares.windows(2).all(|w| w[0].total_pence <= w[1].total_pence));

        assert!(quote_all(metrics, &default_rates(), &[], "A", "B", false, 40).is_err());
    }

    #[test]
    fn test_format_gbp() {
        assert_eq!(format_gbp(0), "£0.00");
        assert_eq!(format_gbp(5), "£0.05");
        assert_eq!(format_gbp(123456), "£1234.56");
    }
}
