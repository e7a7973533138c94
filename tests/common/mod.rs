#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, Bytes},
    http::{HeaderMap, Request, StatusCode, header},
};
use liftgate::{
    ServerConfig,
    api::{AuthState, create_api_router},
    auth::{DirectoryError, UserDirectory},
    create_app,
    db::{Database, NewUser, User},
    jwt::JwtConfig,
    password::{PasswordConfig, PasswordHasher},
    rate_limit::{RateLimitConfig, RateLimiter},
};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

pub const TEST_SECRET: &[u8] = b"test-jwt-secret-that-is-long-enough!";
pub const PASSWORD: &str = "correct horse battery staple";

/// Argon2 parameters cheap enough for tests.
pub fn cheap_hashing() -> PasswordConfig {
    PasswordConfig {
        memory_kib: 8,
        iterations: 1,
        parallelism: 1,
    }
}

pub async fn test_config() -> ServerConfig {
    let db = Database::open(":memory:")
        .await
        .expect("Failed to open test database");

    ServerConfig {
        db,
        jwt_secret: TEST_SECRET.to_vec(),
        rate_limits: RateLimitConfig::default(),
        password: cheap_hashing(),
        lookup_timeout: Duration::from_secs(5),
        cors_origins: Vec::new(),
    }
}

pub struct TestApp {
    pub router: Router,
    pub db: Database,
    pub rate_limiter: Arc<RateLimiter>,
}

pub async fn test_app() -> TestApp {
    test_app_from(test_config().await)
}

pub fn test_app_from(config: ServerConfig) -> TestApp {
    let rate_limiter = Arc::new(RateLimiter::new(config.rate_limits));
    let router = create_app(&config, rate_limiter.clone()).expect("Failed to create app");

    TestApp {
        router,
        db: config.db,
        rate_limiter,
    }
}

/// User directory that answers every call only after `delay`.
pub struct SlowDirectory {
    pub delay: Duration,
}

#[async_trait]
impl UserDirectory for SlowDirectory {
    async fn find_by_username(&self, _username: &str) -> Result<Option<User>, DirectoryError> {
        tokio::time::sleep(self.delay).await;
        Ok(None)
    }

    async fn find_by_email(&self, _email: &str) -> Result<Option<User>, DirectoryError> {
        tokio::time::sleep(self.delay).await;
        Ok(None)
    }

    async fn create(&self, _user: NewUser<'_>) -> Result<i64, DirectoryError> {
        tokio::time::sleep(self.delay).await;
        Ok(1)
    }
}

/// Auth routes backed by a user store slower than `lookup_timeout`.
pub async fn slow_store_app(lookup_timeout: Duration) -> TestApp {
    let rate_limiter = Arc::new(RateLimiter::new(RateLimitConfig::default()));
    let state = AuthState {
        users: Arc::new(SlowDirectory {
            delay: Duration::from_secs(5),
        }),
        passwords: Arc::new(PasswordHasher::new(cheap_hashing()).unwrap()),
        jwt: Arc::new(JwtConfig::new(TEST_SECRET)),
        rate_limiter: rate_limiter.clone(),
        lookup_timeout,
    };

    TestApp {
        router: create_api_router(state),
        db: Database::open(":memory:")
            .await
            .expect("Failed to open test database"),
        rate_limiter,
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("Response body is not JSON")
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

impl TestApp {
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn post_json(&self, uri: &str, body: Value, client: Option<&str>) -> TestResponse {
        let mut request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(client) = client {
            request = request.header("x-forwarded-for", client);
        }

        self.send(request.body(Body::from(body.to_string())).unwrap())
            .await
    }

    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
        client: Option<&str>,
    ) -> TestResponse {
        self.post_json(
            "/auth/register",
            json!({ "username": username, "email": email, "password": password }),
            client,
        )
        .await
    }

    pub async fn login(&self, username: &str, password: &str, client: Option<&str>) -> TestResponse {
        self.post_json(
            "/auth/login",
            json!({ "username": username, "password": password }),
            client,
        )
        .await
    }

    /// Register a user from a dedicated client and log in. Returns (id, token).
    pub async fn signed_in(&self, username: &str) -> (i64, String) {
        let client = format!("setup-{}", username);

        let registered = self
            .register(
                username,
                &format!("{}@example.com", username),
                PASSWORD,
                Some(&client),
            )
            .await;
        assert_eq!(registered.status, StatusCode::CREATED);
        let id = registered.json()["id"].as_i64().unwrap();

        let logged_in = self.login(username, PASSWORD, Some(&client)).await;
        assert_eq!(logged_in.status, StatusCode::OK);
        let token = logged_in.json()["token"].as_str().unwrap().to_string();

        (id, token)
    }

    pub async fn get(&self, uri: &str, authorization: Option<&str>) -> TestResponse {
        let mut request = Request::builder().method("GET").uri(uri);
        if let Some(authorization) = authorization {
            request = request.header(header::AUTHORIZATION, authorization);
        }
        self.send(request.body(Body::empty()).unwrap()).await
    }

    pub async fn get_with_token(&self, uri: &str, token: &str) -> TestResponse {
        self.get(uri, Some(&format!("Bearer {}", token))).await
    }
}
