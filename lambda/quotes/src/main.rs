use anyhow::Context;
use chrono::{DateTime, Utc};
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use serde::Deserialize;
use tracing::info;
use transfers_shared::{
    is_valid_email, price_journey, ApiRequest, ApiResponse, DistanceProvider, GoogleMapsService,
    JourneyRequest, NewQuote, Quote, QuoteService, QuoteStatus, Role, SecretCache, TransferError,
    TransferResult, VehicleService,
};

struct Services {
    quotes: QuoteService,
    vehicles: VehicleService,
    distance: Box<dyn DistanceProvider>,
    auth: SecretCache,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateQuoteRequest {
    #[serde(flatten)]
    journey: JourneyRequest,
    pickup_time: DateTime<Utc>,
    #[serde(default)]
    customer_email: Option<String>,
}

impl CreateQuoteRequest {
    fn validate(&self, now: DateTime<Utc>) -> TransferResult<()> {
        if self.journey.vehicle_type.is_none() {
            return Err(TransferError::ValidationError(
                "vehicleType is required".to_string(),
            ));
        }
        if self.pickup_time < now {
            return Err(TransferError::ValidationError(
                "pickupTime must be in the future".to_string(),
            ));
        }
        if let Some(email) = &self.customer_email {
            if !is_valid_email(email.trim()) {
                return Err(TransferError::ValidationError(format!(
                    "Invalid email address: {}",
                    email
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct StatusUpdate {
    status: QuoteStatus,
}

/// Customers may accept or decline a quote they hold the ID of; anything
/// else is a back-office action
fn role_for_transition(to: QuoteStatus) -> Option<Role> {
    if to.is_customer_response() {
        None
    } else {
        Some(Role::Admin)
    }
}

/// Quote as shown to callers, with lapsed quotes reported as expired
fn present(mut quote: Quote, now: DateTime<Utc>) -> Quote {
    quote.status = quote.effective_status(now);
    quote
}

async fn create_quote(services: &Services, request: &ApiRequest) -> TransferResult<ApiResponse> {
    let body: CreateQuoteRequest = request.json_body()?;
    body.validate(Utc::now())?;

    // Price server-side; fares sent by the client are ignored
    let rates = services.vehicles.list_rates().await?;
    let routes = services.vehicles.list_fixed_routes().await?;
    let priced = price_journey(services.distance.as_ref(), &rates, &routes, &body.journey).await?;
    let fare = priced
        .fares
        .into_iter()
        .next()
        .ok_or_else(|| TransferError::InternalError("Pricing returned no fare".to_string()))?;

    let quote = services
        .quotes
        .create_quote(NewQuote {
            pickup: priced.pickup,
            dropoff: priced.dropoff,
            pickup_time: body.pickup_time,
            vehicle_type: fare.vehicle_type,
            passengers: body.journey.passengers,
            return_journey: body.journey.return_journey,
            fare,
            customer_email: body.customer_email.map(|e| e.trim().to_lowercase()),
        })
        .await?;

    Ok(ApiResponse::created(&quote))
}

async fn get_quote(services: &Services, request: &ApiRequest) -> TransferResult<ApiResponse> {
    let quote_id = request.path_param("quoteId")?;
    let quote = services.quotes.require_quote(quote_id).await?;
    Ok(ApiResponse::ok(&present(quote, Utc::now())))
}

async fn list_quotes(services: &Services, request: &ApiRequest) -> TransferResult<ApiResponse> {
    services.auth.authorize(request, Role::Admin).await?;

    let status: QuoteStatus = request.query_param("status").unwrap_or("PENDING").parse()?;
    let now = Utc::now();
    let quotes: Vec<Quote> = services
        .quotes
        .list_quotes_by_status(status)
        .await?
        .into_iter()
        .map(|q| present(q, now))
        .collect();

    Ok(ApiResponse::ok(&quotes))
}

async fn update_quote(services: &Services, request: &ApiRequest) -> TransferResult<ApiResponse> {
    let quote_id = request.path_param("quoteId")?;
    let update: StatusUpdate = request.json_body()?;

    if let Some(role) = role_for_transition(update.status) {
        let claims = services.auth.authorize(request, role).await?;
        info!("{} moving quote {} to {}", claims.sub, quote_id, update.status);
    }

    let quote = services.quotes.transition_quote(quote_id, update.status).await?;
    Ok(ApiResponse::ok(&present(quote, Utc::now())))
}

async fn route(services: &Services, request: &ApiRequest) -> ApiResponse {
    match (request.method().as_str(), request.resource.as_str()) {
        ("POST", "/quotes") => create_quote(services, request).await.into(),
        ("GET", "/quotes") => list_quotes(services, request).await.into(),
        ("GET", "/quotes/{quoteId}") => get_quote(services, request).await.into(),
        ("PATCH", "/quotes/{quoteId}") => update_quote(services, request).await.into(),
        (_, "/quotes") | (_, "/quotes/{quoteId}") => ApiResponse::method_not_allowed(request),
        _ => ApiResponse::not_found_route(request),
    }
}

async fn function_handler(
    services: &Services,
    event: LambdaEvent<ApiRequest>,
) -> Result<ApiResponse, Error> {
    let (request, context) = event.into_parts();
    info!("{} {} ({})", request.method(), request.path, context.request_id);
    Ok(route(services, &request).await)
}

async fn build_services() -> anyhow::Result<Services> {
    let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let dynamo = aws_sdk_dynamodb::Client::new(&config);
    let secrets = aws_sdk_secretsmanager::Client::new(&config);

    Ok(Services {
        quotes: QuoteService::from_env(dynamo.clone()).context("QuoteService configuration")?,
        vehicles: VehicleService::from_env(dynamo).context("VehicleService configuration")?,
        distance: Box::new(GoogleMapsService::from_env().context("Google Maps configuration")?),
        auth: SecretCache::jwt_from_env(secrets).context("JWT secret configuration")?,
    })
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .without_time()
        .init();

    let services = build_services().await?;
    let services = &services;

    run(service_fn(move |event: LambdaEvent<ApiRequest>| async move {
        function_handler(services, event).await
    }))
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn create_request(body: &str) -> CreateQuoteRequest {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn test_customer_responses_are_public() {
        assert_eq!(role_for_transition(QuoteStatus::Accepted), None);
        assert_eq!(role_for_transition(QuoteStatus::Declined), None);
        assert_eq!(role_for_transition(QuoteStatus::Expired), Some(Role::Admin));
        assert_eq!(role_for_transition(QuoteStatus::Booked), Some(Role::Admin));
    }

    #[test]
    fn test_create_request_ignores_client_fare() {
        let request = create_request(
            r#"{
                "pickup": "Dartford",
                "dropoff": "Gatwick Airport",
                "pickupTime": "2099-01-01T10:00:00Z",
                "vehicleType": "saloon",
                "passengers": 2,
                "totalPence": 1
            }"#,
        );
        assert_eq!(request.journey.passengers, 2);
        assert!(!request.journey.return_journey);
        assert!(request.validate(Utc::now()).is_ok());
    }

    #[test]
    fn test_create_request_validation() {
        let now = Utc::now();
        let mut request = create_request(
            r#"{"pickup": "Dartford", "dropoff": "Heathrow", "pickupTime": "2099-01-01T10:00:00Z"}"#,
        );
        assert!(request.validate(now).is_err(), "vehicle type is required");

        request.journey.vehicle_type = Some(transfers_shared::VehicleType::Estate);
        request.pickup_time = now - Duration::hours(1);
        assert!(request.validate(now).is_err(), "pickup in the past");

        request.pickup_time = now + Duration::hours(1);
        request.customer_email = Some("nope".to_string());
        assert!(request.validate(now).is_err(), "bad email");
    }

    #[test]
    fn test_present_reports_lapsed_quote_as_expired() {
        let now = Utc::now();
        let quote: Quote = serde_json::from_value(serde_json::json!({
            "quoteId": "q-1",
            "tenantId": "001",
            "pickup": "Dartford",
            "dropoff": "Heathrow",
            "pickupTime": "2099-01-01T10:00:00Z",
            "vehicleType": "saloon",
            "passengers": 1,
            "returnJourney": false,
            "fare": {
                "vehicleType": "saloon", "basePence": 350, "distancePence": 0, "timePence": 0,
                "subtotalPence": 800, "totalPence": 800, "fixedRouteId": null,
                "returnJourney": false, "distanceMiles": 0.0, "durationMinutes": 0.0,
                "displayTotal": "£8.00"
            },
            "customerEmail": null,
            "status": "PENDING",
            "createdAt": (now - Duration::hours(100)).to_rfc3339(),
            "updatedAt": (now - Duration::hours(100)).to_rfc3339(),
            "expiresAt": (now - Duration::hours(28)).to_rfc3339()
        }))
        .unwrap();

        assert_eq!(present(quote, now).status, QuoteStatus::Expired);
    }
}
