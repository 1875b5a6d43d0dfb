use anyhow::Context;
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use serde::Deserialize;
use tracing::info;
use transfers_shared::{
    ApiRequest, ApiResponse, Role, SecretCache, StorageService, TransferError, TransferResult,
};

struct Services {
    storage: StorageService,
    auth: SecretCache,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadRequest {
    path: String,
    content_type: String,
}

fn required_query<'a>(request: &'a ApiRequest, name: &str) -> TransferResult<&'a str> {
    request
        .query_param(name)
        .ok_or_else(|| TransferError::ValidationError(format!("Missing query parameter: {}", name)))
}

async fn upload_url(services: &Services, request: &ApiRequest) -> TransferResult<ApiResponse> {
    let claims = services.auth.authorize(request, Role::Admin).await?;
    let upload: UploadRequest = request.json_body()?;

    let presigned = services
        .storage
        .upload_url(&upload.path, &upload.content_type)
        .await?;
    info!("{} requested upload of {}", claims.sub, presigned.path);
    Ok(ApiResponse::ok(&presigned))
}

async fn download_url(services: &Services, request: &ApiRequest) -> TransferResult<ApiResponse> {
    services.auth.authorize(request, Role::Admin).await?;
    let presigned = services
        .storage
        .download_url(required_query(request, "path")?)
        .await?;
    Ok(ApiResponse::ok(&presigned))
}

async fn list_objects(services: &Services, request: &ApiRequest) -> TransferResult<ApiResponse> {
    services.auth.authorize(request, Role::Admin).await?;
    let objects = services
        .storage
        .list_objects(request.query_param("prefix"))
        .await?;
    Ok(ApiResponse::ok(&objects))
}

async fn delete_object(services: &Services, request: &ApiRequest) -> TransferResult<ApiResponse> {
    let claims = services.auth.authorize(request, Role::Admin).await?;
    let path = required_query(request, "path")?;

    services.storage.delete_object(path).await?;
    info!("{} deleted {}", claims.sub, path);
    Ok(ApiResponse::no_content())
}

async fn route(services: &Services, request: &ApiRequest) -> ApiResponse {
    match (request.method().as_str(), request.resource.as_str()) {
        ("POST", "/storage/upload-url") => upload_url(services, request).await.into(),
        ("GET", "/storage/download-url") => download_url(services, request).await.into(),
        ("GET", "/storage") => list_objects(services, request).await.into(),
        ("DELETE", "/storage") => delete_object(services, request).await.into(),
        (_, "/storage/upload-url") | (_, "/storage/download-url") | (_, "/storage") => {
            ApiResponse::method_not_allowed(request)
        }
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
    let s3 = aws_sdk_s3::Client::new(&config);
    let secrets = aws_sdk_secretsmanager::Client::new(&config);

    Ok(Services {
        storage: StorageService::from_env(s3).context("StorageService configuration")?,
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
