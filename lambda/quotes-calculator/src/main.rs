use anyhow::Context;
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use tracing::info;
use transfers_shared::{
    price_journey, ApiRequest, ApiResponse, DistanceProvider, GoogleMapsService, JourneyRequest,
    TransferResult, VehicleService,
};

struct Services {
    distance: Box<dyn DistanceProvider>,
    vehicles: VehicleService,
}

async fn calculate(services: &Services, request: &ApiRequest) -> TransferResult<ApiResponse> {
    let journey: JourneyRequest = request.json_body()?;

    let rates = services.vehicles.list_rates().await?;
    let routes = services.vehicles.list_fixed_routes().await?;
    let priced = price_journey(services.distance.as_ref(), &rates, &routes, &journey).await?;

    info!(
        "Priced {} vehicles for {:.1} miles",
        priced.fares.len(),
        priced.metrics.distance_meters / transfers_shared::METERS_PER_MILE
    );
    Ok(ApiResponse::ok(&priced))
}

async fn function_handler(
    services: &Services,
    event: LambdaEvent<ApiRequest>,
) -> Result<ApiResponse, Error> {
    let (request, context) = event.into_parts();
    info!("{} {} ({})", request.method(), request.path, context.request_id);

    let response = match (request.method().as_str(), request.resource.as_str()) {
        ("POST", "/quotes/calculate") => calculate(services, &request).await.into(),
        (_, "/quotes/calculate") => ApiResponse::method_not_allowed(&request),
        _ => ApiResponse::not_found_route(&request),
    };
    Ok(response)
}

async fn build_services() -> anyhow::Result<Services> {
    let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let dynamo = aws_sdk_dynamodb::Client::new(&config);

    Ok(Services {
        distance: Box::new(GoogleMapsService::from_env().context("Google Maps configuration")?),
        vehicles: VehicleService::from_env(dynamo).context("VehicleService configuration")?,
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
