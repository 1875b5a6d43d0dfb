use aws_sdk_sqs::types::MessageAttributeValue;
use aws_sdk_sqs::Client as SqsClient;

use crate::{EmailRequest, TransferError, TransferResult};

fn string_attribute(value: &str) -> TransferResult<MessageAttributeValue> {
    MessageAttributeValue::builder()
        .data_type("String")
        .string_value(value)
        .build()
        .map_err(|e| TransferError::SQSError(e.to_string()))
}

/// Puts email requests on the queue drained by the email-processor
pub struct EmailQueueService {
    client: SqsClient,
    queue_url: String,
}

impl EmailQueueService {
    pub fn new(client: SqsClient, queue_url: String) -> Self {
        Self { client, queue_url }
    }

    pub fn from_env(client: SqsClient) -> TransferResult<Self> {
        let queue_url = std::env::var("EMAIL_QUEUE_URL").map_err(|_| {
            TransferError::ConfigurationError("EMAIL_QUEUE_URL not set".to_string())
        })?;
        Ok(Self::new(client, queue_url))
    }

    pub async fn queue_email(&self, request: &EmailRequest) -> TransferResult<String> {
        let message_body = serde_json::to_string(request)?;

        let result = self
            .client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(message_body)
            .message_attributes("Priority", string_attribute(request.priority.queue_value())?)
            .message_attributes("TemplateType", string_attribute(&request.template_name)?)
            .send()
            .await
            .map_err(|e| TransferError::SQSError(e.to_string()))?;

        let message_id = result
            .message_id()
            .ok_or_else(|| TransferError::SQSError("No message ID returned".to_string()))?;

        tracing::info!(
            "Queued email request - Message ID: {}, Template: {}",
            message_id,
            request.template_name
        );

        Ok(message_id.to_string())
    }

    /// Queue each request, logging failures instead of returning them.
    /// Booking writes have already succeeded by the time mail is queued.
    pub async fn queue_best_effort(&self, requests: &[EmailRequest]) -> usize {
        let mut queued = 0;
        for request in requests {
            match self.queue_email(request).await {
                Ok(_) => queued += 1,
                Err(e) => tracing::error!(
                    "Failed to queue {} email: {}",
                    request.template_name,
                    e
                ),
            }
        }
        queued
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_attribute() {
        let attr = string_attribute("booking-confirmation").unwrap();
        assert_eq!(attr.data_type(), "String");
        assert_eq!(attr.string_value(), Some("booking-confirmation"));
    }
}
