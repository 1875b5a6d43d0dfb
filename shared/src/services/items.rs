//! AttributeValue map helpers shared by the DynamoDB-backed services.

use aws_sdk_dynamodb::error::SdkError;
use aws_sdk_dynamodb::types::AttributeValue;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::str::FromStr;

use crate::{parse_rfc3339, TransferError, TransferResult};

pub type Item = HashMap<String, AttributeValue>;

fn missing(key: &str) -> TransferError {
    TransferError::InternalError(format!("Missing {}", key))
}

pub fn put_s(item: &mut Item, key: &str, value: impl Into<String>) {
    item.insert(key.to_string(), AttributeValue::S(value.into()));
}

pub fn put_n(item: &mut Item, key: &str, value: impl ToString) {
    item.insert(key.to_string(), AttributeValue::N(value.to_string()));
}

pub fn put_bool(item: &mut Item, key: &str, value: bool) {
    item.insert(key.to_string(), AttributeValue::Bool(value));
}

pub fn put_opt_s(item: &mut Item, key: &str, value: Option<&String>) {
    if let Some(value) = value {
        put_s(item, key, value.clone());
    }
}

pub fn put_json<T: Serialize>(item: &mut Item, key: &str, value: &T) -> TransferResult<()> {
    put_s(item, key, serde_json::to_string(value)?);
    Ok(())
}

pub fn get_s(item: &Item, key: &str) -> TransferResult<String> {
    item.get(key)
        .and_then(|v| v.as_s().ok())
        .cloned()
        .ok_or_else(|| missing(key))
}

pub fn get_opt_s(item: &Item, key: &str) -> Option<String> {
    item.get(key).and_then(|v| v.as_s().ok()).cloned()
}

pub fn get_n<T: FromStr>(item: &Item, key: &str) -> TransferResult<T> {
    item.get(key)
        .and_then(|v| v.as_n().ok())
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| missing(key))
}

pub fn get_bool(item: &Item, key: &str) -> TransferResult<bool> {
    item.get(key)
        .and_then(|v| v.as_bool().ok())
        .copied()
        .ok_or_else(|| missing(key))
}

pub fn get_datetime(item: &Item, key: &str) -> TransferResult<DateTime<Utc>> {
    item.get(key)
        .and_then(|v| v.as_s().ok())
        .and_then(|s| parse_rfc3339(s))
        .ok_or_else(|| missing(key))
}

/// Parse a string attribute through `FromStr`, e.g. status and vehicle enums
pub fn get_parsed<T: FromStr>(item: &Item, key: &str) -> TransferResult<T> {
    let raw = get_s(item, key)?;
    raw.parse()
        .map_err(|_| TransferError::InternalError(format!("Invalid {}: {}", key, raw)))
}

pub fn get_json<T: DeserializeOwned>(item: &Item, key: &str) -> TransferResult<T> {
    let raw = get_s(item, key)?;
    serde_json::from_str(&raw).map_err(TransferError::from)
}

/// True when the SDK error is a failed `ConditionExpression`
pub fn is_conditional_check_failure<E, R>(err: &SdkError<E, R>) -> bool
where
    E: aws_sdk_dynamodb::error::ProvideErrorMetadata,
{
    err.as_service_error()
        .and_then(|e| e.code())
        .map(|code| code == "ConditionalCheckFailedException")
        .unwrap_or(false)
}

/// Result of a write guarded by a `ConditionExpression`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConditionalWrite {
    Applied,
    ConditionFailed,
    Failed(String),
}

impl ConditionalWrite {
    pub fn from_result<T, E, R>(result: Result<T, SdkError<E, R>>) -> Self
    where
        E: aws_sdk_dynamodb::error::ProvideErrorMetadata,
        SdkError<E, R>: std::fmt::Display,
    {
        match result {
            Ok(_) => Self::Applied,
            Err(e) if is_conditional_check_failure(&e) => Self::ConditionFailed,
            Err(e) => Self::Failed(e.to_string()),
        }
    }

    /// A failed condition means someone else wrote first: `Conflict`
    pub fn or_conflict(self, message: impl FnOnce() -> String) -> TransferResult<()> {
        match self {
            Self::Applied => Ok(()),
            Self::ConditionFailed => Err(TransferError::Conflict(message())),
            Self::Failed(e) => Err(TransferError::DynamoDBError(e)),
        }
    }
}
