use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("DynamoDB error: {0}")]
    DynamoDBError(String),

    #[error("S3 error: {0}")]
    S3Error(String),

    #[error("SQS error: {0}")]
    SQSError(String),

    #[error("SES error: {0}")]
    SESError(String),

    #[error("Secrets Manager error: {0}")]
    SecretsError(String),

    #[error("External service error: {0}")]
    ExternalServiceError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl TransferError {
    /// HTTP status code returned to API Gateway for this error
    pub fn status_code(&self) -> u16 {
        match self {
            TransferError::ValidationError(_) => 400,
            TransferError::Unauthorized(_) => 401,
            TransferError::Forbidden(_) => 403,
            TransferError::NotFound(_) => 404,
            TransferError::Conflict(_) | TransferError::InvalidTransition { .. } => 409,
            TransferError::ExternalServiceError(_) => 502,
            _ => 500,
        }
    }

    /// Stable machine-readable code used in error bodies
    pub fn code(&self) -> &'static str {
        match self {
            TransferError::ValidationError(_) => "VALIDATION_ERROR",
            TransferError::NotFound(_) => "NOT_FOUND",
            TransferError::Conflict(_) => "CONFLICT",
            TransferError::InvalidTransition { .. } => "INVALID_TRANSITION",
            TransferError::Unauthorized(_) => "UNAUTHORIZED",
            TransferError::Forbidden(_) => "FORBIDDEN",
            TransferError::ExternalServiceError(_) => "UPSTREAM_ERROR",
            _ => "INTERNAL_ERROR",
        }
    }

    /// Whether the message is safe to show to API callers.
    /// Infrastructure errors are logged in full but reported generically.
    pub fn is_client_facing(&self) -> bool {
        self.status_code() < 500
    }
}

impl From<aws_sdk_dynamodb::Error> for TransferError {
    fn from(err: aws_sdk_dynamodb::Error) -> Self {
        TransferError::DynamoDBError(err.to_string())
    }
}

impl From<aws_sdk_s3::Error> for TransferError {
    fn from(err: aws_sdk_s3::Error) -> Self {
        TransferError::S3Error(err.to_string())
    }
}

impl From<aws_sdk_sqs::Error> for TransferError {
    fn from(err: aws_sdk_sqs::Error) -> Self {
        TransferError::SQSError(err.to_string())
    }
}

impl From<aws_sdk_ses::Error> for TransferError {
    fn from(err: aws_sdk_ses::Error) -> Self {
        TransferError::SESError(err.to_string())
    }
}

impl From<serde_json::Error> for TransferError {
    fn from(err: serde_json::Error) -> Self {
        TransferError::SerializationError(err.to_string())
    }
}

impl From<reqwest::Error> for TransferError {
    fn from(err: reqwest::Error) -> Self {
        TransferError::ExternalServiceError(err.to_string())
    }
}

pub type TransferResult<T> = Result<T, TransferError>;
