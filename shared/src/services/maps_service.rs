use async_trait::async_trait;
use serde::Deserialize;

use crate::{JourneyMetrics, TransferError, TransferResult};

const DISTANCE_MATRIX_URL: &str = "https://maps.googleapis.com/maps/api/distancematrix/json";

/// Measures road distance and duration between two addresses
#[async_trait]
pub trait DistanceProvider: Send + Sync {
    async fn measure(&self, pickup: &str, dropoff: &str) -> TransferResult<JourneyMetrics>;
}

#[derive(Debug, Deserialize)]
struct DistanceMatrixResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    rows: Vec<DistanceMatrixRow>,
}

#[derive(Debug, Deserialize)]
struct DistanceMatrixRow {
    #[serde(default)]
    elements: Vec<DistanceMatrixElement>,
}

#[derive(Debug, Deserialize)]
struct DistanceMatrixElement {
    status: String,
    distance: Option<ValueField>,
    duration: Option<ValueField>,
}

#[derive(Debug, Deserialize)]
struct ValueField {
    value: f64,
}

/// Read the single origin/destination element of a Distance Matrix response
pub fn parse_distance_matrix(
    body: &str,
    pickup: &str,
    dropoff: &str,
) -> TransferResult<JourneyMetrics> {
    let response: DistanceMatrixResponse = serde_json::from_str(body)
        .map_err(|e| TransferError::ExternalServiceError(format!("Bad Distance Matrix body: {}", e)))?;

    match response.status.as_str() {
        "OK" => {}
        // Quota and credential problems are ours, not the caller's
        "REQUEST_DENIED" | "OVER_QUERY_LIMIT" | "OVER_DAILY_LIMIT" | "UNKNOWN_ERROR" => {
            return Err(TransferError::ExternalServiceError(format!(
                "Distance Matrix returned {}: {}",
                response.status,
                response.error_message.unwrap_or_default()
            )));
        }
        other => {
            return Err(TransferError::ValidationError(format!(
                "Could not route from '{}' to '{}' ({})",
                pickup, dropoff, other
            )));
        }
    }

    let element = response
        .rows
        .into_iter()
        .next()
        .and_then(|row| row.elements.into_iter().next())
        .ok_or_else(|| {
            TransferError::ExternalServiceError("Distance Matrix returned no elements".to_string())
        })?;

    if element.status != "OK" {
        return Err(TransferError::ValidationError(format!(
            "Could not route from '{}' to '{}' ({})",
            pickup, dropoff, element.status
        )));
    }

    match (element.distance, element.duration) {
        (Some(distance), Some(duration)) => Ok(JourneyMetrics {
            distance_meters: distance.value,
            duration_seconds: duration.value,
        }),
        _ => Err(TransferError::ExternalServiceError(
            "Distance Matrix element missing distance or duration".to_string(),
        )),
    }
}

pub struct GoogleMapsService {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GoogleMapsService {
    pub fn new(api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
            base_url: DISTANCE_MATRIX_URL.to_string(),
        }
    }

    pub fn from_env() -> TransferResult<Self> {
        let api_key = std::env::var("GOOGLE_MAPS_API_KEY").map_err(|_| {
            TransferError::ConfigurationError("GOOGLE_MAPS_API_KEY not set".to_string())
        })?;
        Ok(Self::new(api_key))
    }
}

#[async_trait]
impl DistanceProvider for GoogleMapsService {
    async fn measure(&self, pickup: &str, dropoff: &str) -> TransferResult<JourneyMetrics> {
        if pickup.trim().is_empty() || dropoff.trim().is_empty() {
            return Err(TransferError::ValidationError(
                "Pickup and dropoff are required".to_string(),
            ));
        }

        let response = self
            .http
            .get(&self.base_url)
            .query(&[
                ("origins", pickup.trim()),
                ("destinations", dropoff.trim()),
                ("units", "imperial"),
                ("region", "uk"),
                ("key", self.api_key.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(TransferError::ExternalServiceError(format!(
                "Distance Matrix HTTP {}",
                response.status()
            )));
        }

        let body = response.text().await?;
        let metrics = parse_distance_matrix(&body, pickup, dropoff)?;
        tracing::info!(
            "Measured journey: {:.0}m, {:.0}s",
            metrics.distance_meters,
            metrics.duration_seconds
        );
        Ok(metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ok_response() {
        let body = r#"{
            "destination_addresses": ["Heathrow Airport (LHR), Longford TW6, UK"],
            "origin_addresses": ["Dartford DA1, UK"],
            "rows": [{
                "elements": [{
                    "distance": {"text": "40.1 mi", "value": 64537},
                    "duration": {"text": "52 mins", "value": 3120},
                    "status": "OK"
                }]
            }],
            "status": "OK"
        }"#;

        let metrics = parse_distance_matrix(body, "Dartford", "Heathrow").unwrap();
        assert_eq!(metrics.distance_meters, 64537.0);
        assert_eq!(metrics.duration_seconds, 3120.0);
    }

    #[test]
    fn test_unroutable_element_is_validation_error() {
        let body = r#"{"status": "OK", "rows": [{"elements": [{"status": "ZERO_RESULTS"}]}]}"#;
        let err = parse_distance_matrix(body, "Dartford", "New York").unwrap_err();
        assert!(matches!(err, TransferError::ValidationError(ref m) if m.contains("New York")));
    }

    #[test]
    fn test_invalid_request_is_validation_error() {
        let body = r#"{"status": "INVALID_REQUEST", "rows": []}"#;
        let err = parse_distance_matrix(body, "", "Heathrow").unwrap_err();
        assert_eq!(err.status_code(), 400);
    }

    #[test]
    fn test_denied_is_upstream_error() {
        let body = r#"{"status": "REQUEST_DENIED", "error_message": "The provided API key is invalid."}"#;
        let err = parse_distance_matrix(body, "Dartford", "Heathrow").unwrap_err();
        assert_eq!(err.status_code(), 502);
    }

    #[test]
    fn test_garbage_body_is_upstream_error() {
        assert_eq!(
            parse_distance_matrix("<html>", "a", "b").unwrap_err().status_code(),
            502
        );
    }
}
