//! API Gateway REST proxy envelope.
//!
//! API Gateway sends `null` rather than `{}` for absent maps, so every map is an
//! `Option` and accessed through helpers.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{TransferError, TransferResult};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiRequest {
    pub http_method: String,
    #[serde(default)]
    pub resource: String,
    #[serde(default)]
    pub path: String,
    pub path_parameters: Option<HashMap<String, String>>,
    pub query_string_parameters: Option<HashMap<String, String>>,
    pub headers: Option<HashMap<String, String>>,
    pub body: Option<String>,
    #[serde(default)]
    pub is_base64_encoded: bool,
}

impl ApiRequest {
    pub fn method(&self) -> String {
        self.http_method.to_ascii_uppercase()
    }

    pub fn path_param(&self, name: &str) -> TransferResult<&str> {
        self.path_parameters
            .as_ref()
            .and_then(|params| params.get(name))
            .map(|v| v.as_str())
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| TransferError::ValidationError(format!("Missing path parameter: {}", name)))
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query_string_parameters
            .as_ref()
            .and_then(|params| params.get(name))
            .map(|v| v.as_str())
            .filter(|v| !v.trim().is_empty())
    }

    /// Header lookup; API Gateway preserves client casing, so compare case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.as_ref().and_then(|headers| {
            headers
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value.as_str())
        })
    }

    pub fn json_body<T: DeserializeOwned>(&self) -> TransferResult<T> {
        if self.is_base64_encoded {
            return Err(TransferError::ValidationError(
                "Binary request bodies are not supported".to_string(),
            ));
        }
        let body = self
            .body
            .as_deref()
            .filter(|b| !b.trim().is_empty())
            .ok_or_else(|| TransferError::ValidationError("Request body is required".to_string()))?;

        serde_json::from_str(body)
            .map_err(|e| TransferError::ValidationError(format!("Invalid request body: {}", e)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse {
    pub status_code: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
    pub is_base64_encoded: bool,
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: ErrorDetail<'a>,
}

#[derive(Debug, Serialize)]
struct ErrorDetail<'a> {
    code: &'a str,
    message: String,
}

impl ApiResponse {
    pub fn json<T: Serialize>(status_code: u16, value: &T) -> Self {
        match serde_json::to_string(value) {
            Ok(body) => Self::with_body(status_code, body),
            Err(e) => {
                tracing::error!("Failed to serialize response body: {}", e);
                Self::from_error(&TransferError::SerializationError(e.to_string()))
            }
        }
    }

    pub fn ok<T: Serialize>(value: &T) -> Self {
        Self::json(200, value)
    }

    pub fn created<T: Serialize>(value: &T) -> Self {
        Self::json(201, value)
    }

    pub fn no_content() -> Self {
        Self {
            status_code: 204,
            headers: HashMap::new(),
            body: String::new(),
            is_base64_encoded: false,
        }
    }

    pub fn from_error(err: &TransferError) -> Self {
        let message = if err.is_client_facing() {
            err.to_string()
        } else {
            "An internal error occurred".to_string()
        };
        let body = ErrorBody {
            error: ErrorDetail {
                code: err.code(),
                message,
            },
        };
        let body = serde_json::to_string(&body)
            .unwrap_or_else(|_| r#"{"error":{"code":"INTERNAL_ERROR"}}"#.to_string());
        Self::with_body(err.status_code(), body)
    }

    pub fn not_found_route(request: &ApiRequest) -> Self {
        Self::from_error(&TransferError::NotFound(format!(
            "No route for {} {}",
            request.method(),
            request.path
        )))
    }

    pub fn method_not_allowed(request: &ApiRequest) -> Self {
        let body = ErrorBody {
            error: ErrorDetail {
                code: "METHOD_NOT_ALLOWED",
                message: format!("{} is not supported on {}", request.method(), request.resource),
            },
        };
        Self::json(405, &body)
    }

    fn with_body(status_code: u16, body: String) -> Self {
        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        Self {
            status_code,
            headers,
            body,
            is_base64_encoded: false,
        }
    }
}

impl From<TransferResult<ApiResponse>> for ApiResponse {
    fn from(result: TransferResult<ApiResponse>) -> Self {
        match result {
            Ok(response) => response,
            Err(e) => {
                if e.is_client_facing() {
                    tracing::warn!("Request rejected: {}", e);
                } else {
                    tracing::error!("Request failed: {}", e);
                }
                ApiResponse::from_error(&e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event() -> &'static str {
        r#"{
            "httpMethod": "get",
            "resource": "/quotes/{quoteId}",
            "path": "/quotes/abc",
            "pathParameters": {"quoteId": "abc"},
            "queryStringParameters": null,
            "headers": {"authorization": "Bearer xyz"},
            "body": null,
            "isBase64Encoded": false,
            "requestContext": {"stage": "prod"}
        }"#
    }

    #[test]
    fn test_parses_gateway_event_with_nulls() {
        let request: ApiRequest = serde_json::from_str(sample_event()).unwrap();
        assert_eq!(request.method(), "GET");
        assert_eq!(request.path_param("quoteId").unwrap(), "abc");
        assert!(request.query_param("status").is_none());
        assert_eq!(request.header("Authorization"), Some("Bearer xyz"));
        assert!(request.path_param("bookingId").is_err());
    }

    #[test]
    fn test_json_body() {
        #[derive(Deserialize)]
        struct Body {
            status: String,
        }

        let mut request = ApiRequest {
            http_method: "PATCH".to_string(),
            body: Some(r#"{"status":"ACCEPTED"}"#.to_string()),
            ..Default::default()
        };
        let body: Body = request.json_body().unwrap();
        assert_eq!(body.status, "ACCEPTED");

        request.body = Some("{not json".to_string());
        assert!(matches!(
            request.json_body::<Body>(),
            Err(TransferError::ValidationError(_))
        ));

        request.body = None;
        assert!(request.json_body::<Body>().is_err());
    }

    #[test]
    fn test_error_response_hides_internal_details() {
        let response = ApiResponse::from_error(&TransferError::DynamoDBError(
            "arn:aws:dynamodb:secret-table".to_string(),
        ));
        assert_eq!(response.status_code, 500);
        assert!(!response.body.contains("arn:aws"));

        let response = ApiResponse::from_error(&TransferError::NotFound("Quote abc".to_string()));
        assert_eq!(response.status_code, 404);
        assert!(response.body.contains("Quote abc"));
        assert!(response.body.contains("NOT_FOUND"));
    }

    #[test]
    fn test_response_serializes_in_gateway_shape() {
        let response = ApiResponse::ok(&serde_json::json!({"ok": true}));
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["statusCode"], 200);
        assert_eq!(json["headers"]["Content-Type"], "application/json");
        assert_eq!(json["isBase64Encoded"], false);
    }
}
