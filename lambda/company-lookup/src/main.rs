use anyhow::Context;
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use tracing::info;
use transfers_shared::{ApiRequest, ApiResponse, CompaniesHouseService, TransferResult};

async fn get_company(
    companies: &CompaniesHouseService,
    request: &ApiRequest,
) -> TransferResult<ApiResponse> {
    let number = request.path_param("companyNumber")?;
    let profile = companies.get_company(number).await?;
    Ok(ApiResponse::ok(&profile))
}

async fn function_handler(
    companies: &CompaniesHouseService,
    event: LambdaEvent<ApiRequest>,
) -> Result<ApiResponse, Error> {
    let (request, context) = event.into_parts();
    info!("{} {} ({})", request.method(), request.path, context.request_id);

    let response = match (request.method().as_str(), request.resource.as_str()) {
        ("GET", "/companies/{companyNumber}") => get_company(companies, &request).await.into(),
        (_, "/companies/{companyNumber}") => ApiResponse::method_not_allowed(&request),
        _ => ApiResponse::not_found_route(&request),
    };
    Ok(response)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .without_time()
        .init();

    let companies = CompaniesHouseService::from_env().context("Companies House configuration")?;
    let companies = &companies;

    run(service_fn(move |event: LambdaEvent<ApiRequest>| async move {
        function_handler(companies, event).await
    }))
    .await
}
