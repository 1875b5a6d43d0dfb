use anyhow::Context;
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use serde::Serialize;
use tracing::info;
use transfers_shared::{
    format_gbp, ApiRequest, ApiResponse, FixedRoute, Role, SecretCache, TransferError,
    TransferResult, VehicleRate, VehicleService, VehicleType,
};

struct Services {
    vehicles: VehicleService,
    auth: SecretCache,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VehicleView {
    #[serde(flatten)]
    rate: VehicleRate,
    base_fare: String,
    per_mile: String,
    per_minute: String,
    minimum_fare: String,
}

impl From<VehicleRate> for VehicleView {
    fn from(rate: VehicleRate) -> Self {
        Self {
            base_fare: format_gbp(rate.base_fare_pence),
            per_mile: format_gbp(rate.per_mile_pence),
            per_minute: format_gbp(rate.per_minute_pence),
            minimum_fare: format_gbp(rate.minimum_fare_pence),
            rate,
        }
    }
}

async fn list_vehicles(services: &Services) -> TransferResult<ApiResponse> {
    let vehicles: Vec<VehicleView> = services
        .vehicles
        .list_rates()
        .await?
        .into_iter()
        .map(VehicleView::from)
        .collect();
    Ok(ApiResponse::ok(&vehicles))
}

fn rate_for_path(path_type: &str, rate: VehicleRate) -> TransferResult<VehicleRate> {
    let vehicle_type: VehicleType = path_type.parse()?;
    if rate.vehicle_type != vehicle_type {
        return Err(TransferError::ValidationError(format!(
            "Body is for {} but path is {}",
            rate.vehicle_type, vehicle_type
        )));
    }
    Ok(rate)
}

async fn put_vehicle(services: &Services, request: &ApiRequest) -> TransferResult<ApiResponse> {
    let claims = services.auth.authorize(request, Role::Admin).await?;
    let rate = rate_for_path(request.path_param("vehicleType")?, request.json_body()?)?;

    services.vehicles.put_rate(&rate).await?;
    info!("{} updated {} rates", claims.sub, rate.vehicle_type);
    Ok(ApiResponse::ok(&VehicleView::from(rate)))
}

async fn list_fixed_routes(services: &Services) -> TransferResult<ApiResponse> {
    let routes = services.vehicles.list_fixed_routes().await?;
    Ok(ApiResponse::ok(&routes))
}

fn route_for_path(route_id: &str, mut route: FixedRoute) -> TransferResult<FixedRoute> {
    if route.id.trim().is_empty() {
        route.id = route_id.to_string();
    }
    if route.id != route_id {
        return Err(TransferError::ValidationError(format!(
            "Body is for route {} but path is {}",
            route.id, route_id
        )));
    }
    Ok(route)
}

async fn put_fixed_route(services: &Services, request: &ApiRequest) -> TransferResult<ApiResponse> {
    let claims = services.auth.authorize(request, Role::Admin).await?;
    let route = route_for_path(request.path_param("routeId")?, request.json_body()?)?;

    services.vehicles.put_fixed_route(&route).await?;
    info!("{} stored fixed route {}", claims.sub, route.id);
    Ok(ApiResponse::ok(&route))
}

async fn delete_fixed_route(services: &Services, request: &ApiRequest) -> TransferResult<ApiResponse> {
    let claims = services.auth.authorize(request, Role::Admin).await?;
    let route_id = request.path_param("routeId")?;

    services.vehicles.delete_fixed_route(route_id).await?;
    info!("{} deleted fixed route {}", claims.sub, route_id);
    Ok(ApiResponse::no_content())
}

async fn route(services: &Services, request: &ApiRequest) -> ApiResponse {
    match (request.method().as_str(), request.resource.as_str()) {
        ("GET", "/vehicles") => list_vehicles(services).await.into(),
        ("PUT", "/vehicles/{vehicleType}") => put_vehicle(services, request).await.into(),
        ("GET", "/fixed-routes") => list_fixed_routes(services).await.into(),
        ("PUT", "/fixed-routes/{routeId}") => put_fixed_route(services, request).await.into(),
        ("DELETE", "/fixed-routes/{routeId}") => delete_fixed_route(services, request).await.into(),
        (_, "/vehicles")
        | (_, "/vehicles/{vehicleType}")
        | (_, "/fixed-routes")
        | (_, "/fixed-routes/{routeId}") => ApiResponse::method_not_allowed(request),
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
        vehicles: VehicleService::from_env(dynamo).context("VehicleService configuration")?,
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
