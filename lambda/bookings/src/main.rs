use anyhow::Context;
use chrono::{NaiveDate, Utc};
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use serde::Deserialize;
use std::future::Future;
use tracing::{error, info, warn};
use transfers_shared::{
    ApiRequest, ApiResponse, Booking, BookingService, BookingStatus, CustomerDetails,
    EmailQueueService, EmailRequest, NewBooking, Quote, QuoteService, QuoteStatus, Role,
    SecretCache, TransferError, TransferResult,
};

struct Services {
    quotes: QuoteService,
    bookings: BookingService,
    email_queue: EmailQueueService,
    auth: SecretCache,
    admin_email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateBookingRequest {
    quote_id: String,
    customer: CustomerDetails,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    flight_number: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusUpdate {
    status: BookingStatus,
}

#[derive(Debug, PartialEq)]
enum BookingFilter {
    Status(BookingStatus),
    Day(NaiveDate),
}

fn parse_filter(request: &ApiRequest) -> TransferResult<BookingFilter> {
    if let Some(date) = request.query_param("date") {
        let day = NaiveDate::parse_from_str(date.trim(), "%d%m%y").map_err(|_| {
            TransferError::ValidationError(format!("date must be ddmmyy, got {}", date))
        })?;
        return Ok(BookingFilter::Day(day));
    }

    let status = request.query_param("status").unwrap_or("PENDING").parse()?;
    Ok(BookingFilter::Status(status))
}

fn confirmation_emails(booking: &Booking, admin_email: Option<&String>) -> Vec<EmailRequest> {
    let mut emails = vec![EmailRequest::booking_confirmation(booking)];
    if let Some(admin) = admin_email {
        emails.push(EmailRequest::admin_new_booking(booking, admin.clone()));
    }
    emails
}

/// A quote this request moved to ACCEPTED stays there if no booking follows
async fn report_stranded_quote(
    quote_id: &str,
    accepted_here: bool,
    create: impl Future<Output = TransferResult<Booking>>,
) -> TransferResult<Booking> {
    let result = create.await;
    if let Err(e) = &result {
        if accepted_here {
            error!("Quote {} left ACCEPTED with no booking: {}", quote_id, e);
        }
    }
    result
}

/// Mark the quote BOOKED. A second booking racing for the same quote loses
/// here, and its booking is withdrawn.
async fn settle_quote(
    booking: &Booking,
    quote_id: &str,
    mark_booked: impl Future<Output = TransferResult<Quote>>,
    withdraw: impl Future<Output = TransferResult<Booking>>,
) -> TransferResult<()> {
    let Err(e) = mark_booked.await else {
        return Ok(());
    };

    warn!(
        "Quote {} could not be marked booked, cancelling {}: {}",
        quote_id, booking.booking_id, e
    );
    if let Err(cancel_err) = withdraw.await {
        error!("Failed to cancel {}: {}", booking.booking_id, cancel_err);
    }
    Err(TransferError::Conflict(format!(
        "Quote {} has already been booked",
        quote_id
    )))
}

async fn create_booking(services: &Services, request: &ApiRequest) -> TransferResult<ApiResponse> {
    let body: CreateBookingRequest = request.json_body()?;
    body.customer.validate()?;

    let quote = services.quotes.require_quote(body.quote_id.trim()).await?;
    let status = quote.effective_status(Utc::now());
    if !quote.is_bookable(Utc::now()) {
        return Err(TransferError::Conflict(format!(
            "Quote {} is {} and cannot be booked",
            quote.quote_id, status
        )));
    }

    // Quotes are booked via ACCEPTED so the state machine stays linear
    let accepted_here = status == QuoteStatus::Pending;
    let quote = if accepted_here {
        services
            .quotes
            .transition_quote(&quote.quote_id, QuoteStatus::Accepted)
            .await?
    } else {
        quote
    };

    let details = NewBooking {
        customer: body.customer,
        notes: body.notes,
        flight_number: body.flight_number,
    };
    let booking = report_stranded_quote(
        &quote.quote_id,
        accepted_here,
        services.bookings.create_booking(&quote, &details),
    )
    .await?;

    settle_quote(
        &booking,
        &quote.quote_id,
        services
            .quotes
            .transition_quote(&quote.quote_id, QuoteStatus::Booked),
        services
            .bookings
            .transition_booking(&booking.booking_id, BookingStatus::Cancelled),
    )
    .await?;

    let queued = services
        .email_queue
        .queue_best_effort(&confirmation_emails(&booking, services.admin_email.as_ref()))
        .await;
    info!("Booking {} created, {} emails queued", booking.booking_id, queued);

    Ok(ApiResponse::created(&booking))
}

async fn get_booking(services: &Services, request: &ApiRequest) -> TransferResult<ApiResponse> {
    services.auth.authorize(request, Role::Admin).await?;
    let booking_id = request.path_param("bookingId")?;
    let booking = services.bookings.require_booking(booking_id).await?;
    Ok(ApiResponse::ok(&booking))
}

async fn list_bookings(services: &Services, request: &ApiRequest) -> TransferResult<ApiResponse> {
    services.auth.authorize(request, Role::Admin).await?;

    let bookings = match parse_filter(request)? {
        BookingFilter::Status(status) => services.bookings.list_bookings_by_status(status).await?,
        BookingFilter::Day(day) => services.bookings.list_bookings_for_day(day).await?,
    };
    Ok(ApiResponse::ok(&bookings))
}

async fn update_booking(services: &Services, request: &ApiRequest) -> TransferResult<ApiResponse> {
    let claims = services.auth.authorize(request, Role::Admin).await?;
    let booking_id = request.path_param("bookingId")?;
    let update: StatusUpdate = request.json_body()?;

    let booking = services
        .bookings
        .transition_booking(booking_id, update.status)
        .await?;
    info!("{} moved booking {} to {}", claims.sub, booking_id, update.status);

    services
        .email_queue
        .queue_best_effort(&[EmailRequest::booking_status_update(&booking)])
        .await;

    Ok(ApiResponse::ok(&booking))
}

async fn route(services: &Services, request: &ApiRequest) -> ApiResponse {
    match (request.method().as_str(), request.resource.as_str()) {
        ("POST", "/bookings") => create_booking(services, request).await.into(),
        ("GET", "/bookings") => list_bookings(services, request).await.into(),
        ("GET", "/bookings/{bookingId}") => get_booking(services, request).await.into(),
        ("PATCH", "/bookings/{bookingId}") => update_booking(services, request).await.into(),
        (_, "/bookings") | (_, "/bookings/{bookingId}") => ApiResponse::method_not_allowed(request),
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
    let sqs = aws_sdk_sqs::Client::new(&config);
    let secrets = aws_sdk_secretsmanager::Client::new(&config);

    let admin_email = std::env::var("ADMIN_EMAIL")
        .ok()
        .filter(|email| !email.trim().is_empty());
    if admin_email.is_none() {
        warn!("ADMIN_EMAIL not set, new booking alerts are disabled");
    }

    Ok(Services {
        quotes: QuoteService::from_env(dynamo.clone()).context("QuoteService configuration")?,
        bookings: BookingService::from_env(dynamo).context("BookingService configuration")?,
        email_queue: EmailQueueService::from_env(sqs).context("Email queue configuration")?,
        auth: SecretCache::jwt_from_env(secrets).context("JWT secret configuration")?,
        admin_email,
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
