use anyhow::Context;
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use serde::Deserialize;
use tracing::info;
use transfers_shared::{
    ApiRequest, ApiResponse, CommentService, Role, SecretCache, TransferResult,
};

/// Back-office access; deleting is further limited to the author or an admin
const COMMENTER: Role = Role::Staff;

struct Services {
    comments: CommentService,
    auth: SecretCache,
}

#[derive(Debug, Deserialize)]
struct NewComment {
    body: String,
}

async fn list_comments(services: &Services, request: &ApiRequest) -> TransferResult<ApiResponse> {
    services.auth.authorize(request, COMMENTER).await?;
    let document_id = request.path_param("documentId")?;

    let comments = services.comments.list_comments(document_id).await?;
    Ok(ApiResponse::ok(&comments))
}

async fn add_comment(services: &Services, request: &ApiRequest) -> TransferResult<ApiResponse> {
    let claims = services.auth.authorize(request, COMMENTER).await?;
    let document_id = request.path_param("documentId")?;
    let new_comment: NewComment = request.json_body()?;

    let comment = services
        .comments
        .add_comment(document_id, &claims.email, &new_comment.body)
        .await?;
    Ok(ApiResponse::created(&comment))
}

async fn delete_comment(services: &Services, request: &ApiRequest) -> TransferResult<ApiResponse> {
    let claims = services.auth.authorize(request, COMMENTER).await?;
    let document_id = request.path_param("documentId")?;
    let comment_id = request.path_param("commentId")?;

    services
        .comments
        .delete_comment(document_id, comment_id, &claims)
        .await?;
    Ok(ApiResponse::no_content())
}

async fn route(services: &Services, request: &ApiRequest) -> ApiResponse {
    const COMMENTS: &str = "/documents/{documentId}/comments";
    const COMMENT: &str = "/documents/{documentId}/comments/{commentId}";

    match (request.method().as_str(), request.resource.as_str()) {
        ("GET", COMMENTS) => list_comments(services, request).await.into(),
        ("POST", COMMENTS) => add_comment(services, request).await.into(),
        ("DELETE", COMMENT) => delete_comment(services, request).await.into(),
        (_, COMMENTS) | (_, COMMENT) => ApiResponse::method_not_allowed(request),
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
        comments: CommentService::from_env(dynamo).context("CommentService configuration")?,
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
