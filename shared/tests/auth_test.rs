// Bearer-token authorisation through the cached signing secret
// Run with: cargo test --test auth_test

use async_trait::async_trait;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use transfers_shared::{
    ApiRequest, Claims, Role, SecretCache, SecretSource, StaticSecret, TransferError,
    TransferResult,
};

const SECRET: &str = "integration-signing-secret";

fn bearer(role: Role) -> ApiRequest {
    let claims = Claims {
        sub: "staff-7".to_string(),
        email: "dispatch@example.com".to_string(),
        role,
        exp: (chrono::Utc::now().timestamp() + 600) as usize,
    };
    let token = encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap();

    let mut headers = HashMap::new();
    headers.insert("authorization".to_string(), format!("Bearer {}", token));
    ApiRequest {
        http_method: "GET".to_string(),
        resource: "/bookings".to_string(),
        headers: Some(headers),
        ..Default::default()
    }
}

struct SlowSource {
    fetches: Arc<AtomicUsize>,
}

#[async_trait]
impl SecretSource for SlowSource {
    async fn fetch(&self) -> TransferResult<String> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        Ok(SECRET.to_string())
    }
}

#[tokio::test]
async fn test_authorize_with_static_secret() {
    let cache = SecretCache::new(
        Box::new(StaticSecret(SECRET.to_string())),
        Duration::from_secs(300),
    );

    let claims = cache.authorize(&bearer(Role::Admin), Role::Admin).await.unwrap();
    assert_eq!(claims.sub, "staff-7");

    let err = cache
        .authorize(&bearer(Role::Staff), Role::Admin)
        .await
        .unwrap_err();
    assert!(matches!(err, TransferError::Forbidden(_)));
    assert_eq!(err.status_code(), 403);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_callers_share_one_fetch() {
    let fetches = Arc::new(AtomicUsize::new(0));
    let cache = Arc::new(SecretCache::new(
        Box::new(SlowSource {
            fetches: fetches.clone(),
        }),
        Duration::from_secs(300),
    ));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let cache = cache.clone();
            tokio::spawn(async move { cache.get().await })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), SECRET);
    }
    assert_eq!(fetches.load(Ordering::SeqCst), 1);
}
