use async_trait::async_trait;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::{ApiRequest, TransferError, TransferResult};

pub const DEFAULT_SECRET_CACHE_TTL_SECS: u64 = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Staff,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub email: String,
    pub role: Role,
    pub exp: usize,
}

fn bearer_token(request: &ApiRequest) -> TransferResult<&str> {
    let header = request
        .header("authorization")
        .ok_or_else(|| TransferError::Unauthorized("Missing Authorization header".to_string()))?;

    let (scheme, token) = header
        .trim()
        .split_once(' ')
        .ok_or_else(|| TransferError::Unauthorized("Malformed Authorization header".to_string()))?;

    if !scheme.eq_ignore_ascii_case("bearer") || token.trim().is_empty() {
        return Err(TransferError::Unauthorized(
            "Malformed Authorization header".to_string(),
        ));
    }

    Ok(token.trim())
}

pub fn verify_token(token: &str, secret: &str) -> TransferResult<Claims> {
    let validation = Validation::new(Algorithm::HS256);
    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| TransferError::Unauthorized(format!("Invalid token: {}", e)))
}

/// Authenticate the caller and check they hold at least `min_role`
pub fn require_role(request: &ApiRequest, secret: &str, min_role: Role) -> TransferResult<Claims> {
    let claims = verify_token(bearer_token(request)?, secret)?;

    if claims.role < min_role {
        tracing::warn!("User {} with role {:?} denied, needs {:?}", claims.sub, claims.role, min_role);
        return Err(TransferError::Forbidden(format!(
            "Requires {:?} role",
            min_role
        )));
    }

    Ok(claims)
}

/// Where a secret value comes from; swapped for a fake in tests
#[async_trait]
pub trait SecretSource: Send + Sync {
    async fn fetch(&self) -> TransferResult<String>;
}

pub struct SecretsManagerSource {
    client: aws_sdk_secretsmanager::Client,
    secret_id: String,
}

impl SecretsManagerSource {
    pub fn new(client: aws_sdk_secretsmanager::Client, secret_id: String) -> Self {
        Self { client, secret_id }
    }
}

#[async_trait]
impl SecretSource for SecretsManagerSource {
    async fn fetch(&self) -> TransferResult<String> {
        tracing::info!("Fetching secret {}", self.secret_id);
        let output = self
            .client
            .get_secret_value()
            .secret_id(&self.secret_id)
            .send()
            .await
            .map_err(|e| TransferError::SecretsError(e.to_string()))?;

        output
            .secret_string()
            .map(|s| s.to_string())
            .ok_or_else(|| TransferError::SecretsError(format!("Secret {} has no string value", self.secret_id)))
    }
}

/// Fixed value, for local development via `JWT_SECRET`
pub struct StaticSecret(pub String);

#[async_trait]
impl SecretSource for StaticSecret {
    async fn fetch(&self) -> TransferResult<String> {
        Ok(self.0.clone())
    }
}

struct CachedValue {
    value: String,
    fetched_at: Instant,
}

/// Holds one secret in memory between invocations of a warm Lambda.
/// The lock is held across the fetch so concurrent callers share one request.
pub struct SecretCache {
    source: Box<dyn SecretSource>,
    ttl: Duration,
    cached: Mutex<Option<CachedValue>>,
}

impl SecretCache {
    pub fn new(source: Box<dyn SecretSource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            cached: Mutex::new(None),
        }
    }

    /// JWT secret from `JWT_SECRET_ARN` (Secrets Manager) or `JWT_SECRET` (plain)
    pub fn jwt_from_env(client: aws_sdk_secretsmanager::Client) -> TransferResult<Self> {
        let ttl = std::env::var("SECRET_CACHE_TTL_SECS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(DEFAULT_SECRET_CACHE_TTL_SECS);
        let ttl = Duration::from_secs(ttl);

        if let Ok(arn) = std::env::var("JWT_SECRET_ARN") {
            return Ok(Self::new(Box::new(SecretsManagerSource::new(client, arn)), ttl));
        }
        if let Ok(secret) = std::env::var("JWT_SECRET") {
            tracing::warn!("Using JWT_SECRET from environment");
            return Ok(Self::new(Box::new(StaticSecret(secret)), ttl));
        }

        Err(TransferError::ConfigurationError(
            "JWT_SECRET_ARN or JWT_SECRET must be set".to_string(),
        ))
    }

    pub async fn get(&self) -> TransferResult<String> {
        let mut cached = self.cached.lock().await;

        if let Some(entry) = cached.as_ref() {
            if entry.fetched_at.elapsed() < self.ttl {
                return Ok(entry.value.clone());
            }
            tracing::debug!("Cached secret expired, refetching");
        }

        let value = self.source.fetch().await?;
        *cached = Some(CachedValue {
            value: value.clone(),
            fetched_at: Instant::now(),
        });
        Ok(value)
    }

    pub async fn invalidate(&self) {
        *self.cached.lock().await = None;
    }

    /// Authenticate a request against the cached secret
    pub async fn authorize(&self, request: &ApiRequest, min_role: Role) -> TransferResult<Claims> {
        let secret = self.get().await?;
        require_role(request, &secret, min_role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const SECRET: &str = "test-signing-secret";

    fn token(role: Role, exp_offset: i64, secret: &str) -> String {
        let claims = Claims {
            sub: "user-1".to_string(),
            email: "ops@example.com".to_string(),
            role,
            exp: (chrono::Utc::now().timestamp() + exp_offset) as usize,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn request_with(auth: Option<String>) -> ApiRequest {
        let mut headers = HashMap::new();
        if let Some(value) = auth {
            headers.insert("Authorization".to_string(), value);
        }
        ApiRequest {
            http_method: "GET".to_string(),
            headers: Some(headers),
            ..Default::default()
        }
    }

    #[test]
    fn test_admin_token_accepted() {
        let request = request_with(Some(format!("Bearer {}", token(Role::Admin, 3600, SECRET))));
        let claims = require_role(&request, SECRET, Role::Staff).unwrap();
        assert_eq!(claims.email, "ops@example.com");
        assert_eq!(claims.role, Role::Admin);
    }

    #[test]
    fn test_missing_and_malformed_headers() {
        assert!(matches!(
            require_role(&request_with(None), SECRET, Role::Admin),
            Err(TransferError::Unauthorized(_))
        ));
        assert!(matches!(
            require_role(&request_with(Some("Basic abc".to_string())), SECRET, Role::Admin),
            Err(TransferError::Unauthorized(_))
        ));
        assert!(matches!(
            require_role(&request_with(Some("Bearer".to_string())), SECRET, Role::Admin),
            Err(TransferError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_wrong_secret_and_expired_token() {
        let forged = request_with(Some(format!("Bearer {}", token(Role::Admin, 3600, "other"))));
        assert!(matches!(
            require_role(&forged, SECRET, Role::Admin),
            Err(TransferError::Unauthorized(_))
        ));

        let expired = request_with(Some(format!("Bearer {}", token(Role::Admin, -3600, SECRET))));
        assert!(matches!(
            require_role(&expired, SECRET, Role::Admin),
            Err(TransferError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_insufficient_role_is_forbidden() {
        let request = request_with(Some(format!("Bearer {}", token(Role::Customer, 3600, SECRET))));
        assert!(matches!(
            require_role(&request, SECRET, Role::Admin),
            Err(TransferError::Forbidden(_))
        ));
    }

    struct CountingSource {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl SecretSource for CountingSource {
        async fn fetch(&self) -> TransferResult<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("secret-{}", n))
        }
    }

    #[tokio::test]
    async fn test_secret_cache_reuses_value_within_ttl() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = SecretCache::new(
            Box::new(CountingSource { calls: calls.clone() }),
            Duration::from_secs(60),
        );

        assert_eq!(cache.get().await.unwrap(), "secret-0");
        assert_eq!(cache.get().await.unwrap(), "secret-0");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        cache.invalidate().await;
        assert_eq!(cache.get().await.unwrap(), "secret-1");
    }

    #[tokio::test]
    async fn test_secret_cache_refetches_after_ttl() {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = SecretCache::new(
            Box::new(CountingSource { calls: calls.clone() }),
            Duration::from_millis(0),
        );

        cache.get().await.unwrap();
        cache.get().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_authorize_through_cache() {
        let cache = SecretCache::new(
            Box::new(StaticSecret(SECRET.to_string())),
            Duration::from_secs(60),
        );
        let request = request_with(Some(format!("Bearer {}", token(Role::Staff, 3600, SECRET))));
        assert!(cache.authorize(&request, Role::Staff).await.is_ok());
        assert!(cache.authorize(&request, Role::Admin).await.is_err());
    }
}
