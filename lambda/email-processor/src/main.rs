use anyhow::Context;
use aws_lambda_events::event::sqs::{BatchItemFailure, SqsBatchResponse, SqsEvent, SqsMessage};
use lambda_runtime::{run, service_fn, Error, LambdaEvent};
use tracing::{error, info, warn};
use transfers_shared::{EmailRequest, EmailService, TransferError, TransferResult};

fn parse_record(record: &SqsMessage) -> TransferResult<EmailRequest> {
    let body = record.body.as_deref().ok_or_else(|| {
        TransferError::SerializationError("SQS message body is empty".to_string())
    })?;

    serde_json::from_str(body).map_err(|e| {
        TransferError::SerializationError(format!("Failed to parse email request: {}", e))
    })
}

async fn process_record(email_service: &EmailService, record: &SqsMessage) -> TransferResult<()> {
    let request = parse_record(record)?;

    info!(
        "Processing email - Template: {}, Priority: {:?}",
        request.template_name, request.priority
    );

    let response = email_service.send_templated_email(&request).await?;
    if !response.success {
        return Err(TransferError::SESError(
            response
                .error
                .unwrap_or_else(|| "Unknown SES error".to_string()),
        ));
    }

    info!("Email sent - Message ID: {}", response.message_id);
    Ok(())
}

/// Whether SQS should redeliver the message. Malformed bodies and bad
/// recipients fail the same way every time, so they are dropped.
fn is_retryable(err: &TransferError) -> bool {
    !matches!(
        err,
        TransferError::SerializationError(_) | TransferError::ValidationError(_)
    )
}

async fn function_handler(
    email_service: &EmailService,
    event: LambdaEvent<SqsEvent>,
) -> Result<SqsBatchResponse, Error> {
    let (event, _context) = event.into_parts();
    info!("Processing {} SQS messages", event.records.len());

    // Only the listed messages go back on the queue
    let mut response = SqsBatchResponse::default();

    for record in &event.records {
        let message_id = record.message_id.clone().unwrap_or_default();

        match process_record(email_service, record).await {
            Ok(()) => {}
            Err(e) if is_retryable(&e) => {
                error!("Email {} failed, will retry: {}", message_id, e);
                response.batch_item_failures.push(BatchItemFailure {
                    item_identifier: message_id,
                });
            }
            Err(e) => {
                warn!("Email {} dropped: {}", message_id, e);
            }
        }
    }

    info!(
        "Email processing completed - Total: {}, Retrying: {}",
        event.records.len(),
        response.batch_item_failures.len()
    );

    Ok(response)
}

async fn build_email_service() -> anyhow::Result<EmailService> {
    let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
    let ses_client = aws_sdk_ses::Client::new(&config);

    EmailService::from_env(ses_client).context("Failed to configure EmailService")
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .without_time()
        .init();

    info!("Starting email processor Lambda");

    let email_service = build_email_service().await?;
    let email_service = &email_service;

    run(service_fn(move |event: LambdaEvent<SqsEvent>| async move {
        function_handler(email_service, event).await
    }))
    .await
}
