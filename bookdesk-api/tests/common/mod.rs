#![allow(dead_code)]

/// Common test utilities for integration tests
///
/// - Test database setup (created and migrated on first use)
/// - A freshly registered business and owner token per test
/// - JSON request helpers against the in-process router
///
/// Tests skip when `DATABASE_URL` is not set.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use bookdesk_api::app::{build_router, AppState};
use bookdesk_api::config::{ApiConfig, Config, DatabaseConfig as ApiDatabaseConfig, JwtConfig};
use bookdesk_shared::auth::policy::Actor;
use bookdesk_shared::db::migrations::{ensure_database_exists, run_migrations};
use bookdesk_shared::db::pool::{create_pool, DatabaseConfig};
use bookdesk_shared::db::scope::begin_scoped;
use bookdesk_shared::models::business::Business;
use serde_json::{json, Value};
use sqlx::PgPool;
use tower::Service as _;
use uuid::Uuid;

pub const TEST_PASSWORD: &str = "Str0ngPassword";

/// Test context containing all necessary resources
pub struct TestContext {
    pub db: PgPool,
    pub app: axum::Router,
    pub business_id: Uuid,
    pub slug: String,
    pub owner_token: String,
    pub owner_email: String,
}

fn test_config(database_url: &str) -> Config {
    Config {
        api: ApiConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            cors_origins: vec!["*".to_string()],
            production: false,
        },
        database: ApiDatabaseConfig {
            url: database_url.to_string(),
            max_connections: 5,
        },
        jwt: JwtConfig {
            secret: "integration-test-secret-at-least-32-bytes".to_string(),
            ttl_hours: 1,
        },
        run_migrations: true,
    }
}

/// Unique, valid email for this run
pub fn unique_email(prefix: &str) -> String {
    format!("{}-{}@example.com", prefix, Uuid::new_v4().simple())
}

impl TestContext {
    /// Registers a new business with its owner; `None` without a database
    pub async fn new() -> anyhow::Result<Option<Self>> {
        let Ok(database_url) = std::env::var("DATABASE_URL") else {
            eprintln!("DATABASE_URL not set, skipping");
            return Ok(None);
        };

        ensure_database_exists(&database_url).await?;
        let db = create_pool(DatabaseConfig {
            max_connections: 5,
            min_connections: 0,
            ..DatabaseConfig::new(database_url.clone())
        })
        .await?;
        run_migrations(&db).await?;

        let app = build_router(AppState::new(db.clone(), test_config(&database_url)));

        let slug = format!("test-{}", &Uuid::new_v4().simple().to_string()[..12]);
        let owner_email = unique_email("owner");

        let mut ctx = TestContext {
            db,
            app,
            business_id: Uuid::nil(),
            slug: slug.clone(),
            owner_token: String::new(),
            owner_email: owner_email.clone(),
        };

        let (status, body) = ctx
            .send(
                "POST",
                "/v1/auth/register",
                None,
                Some(json!({
                    "email": owner_email,
                    "password": TEST_PASSWORD,
                    "name": "Test Owner",
                    "business_name": "Test Salon",
                    "slug": slug,
                    "business_type": "salon"
                })),
            )
            .await;
        anyhow::ensure!(status == StatusCode::CREATED, "register failed: {} {}", status, body);

        ctx.business_id = body["business"]["id"]
            .as_str()
            .and_then(|id| id.parse().ok())
            .ok_or_else(|| anyhow::anyhow!("register returned no business id"))?;
        ctx.owner_token = token_of(&body)?;

        Ok(Some(ctx))
    }

    /// Sends a JSON request and returns the status with the parsed body
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }

        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self.app.clone().call(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);

        (status, json)
    }

    /// Sends as the business owner
    pub async fn owner(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        self.send(method, uri, Some(&self.owner_token), body).await
    }

    /// Creates an active service and returns its id
    pub async fn create_service(&self, name: &str, minutes: i32, price_cents: i64) -> String {
        let (status, body) = self
            .owner(
                "POST",
                "/v1/services",
                Some(json!({
                    "name": name,
                    "duration_minutes": minutes,
                    "price_cents": price_cents
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["id"].as_str().unwrap().to_string()
    }

    /// Creates a staff member and returns its id
    pub async fn create_staff(&self, name: &str, service_ids: &[&str]) -> String {
        let (status, body) = self
            .owner(
                "POST",
                "/v1/staff",
                Some(json!({ "name": name, "service_ids": service_ids })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["id"].as_str().unwrap().to_string()
    }

    /// Creates a customer record and returns its id
    pub async fn create_customer(&self, name: &str, email: &str) -> String {
        let (status, body) = self
            .owner(
                "POST",
                "/v1/customers",
                Some(json!({ "name": name, "email": email })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        body["id"].as_str().unwrap().to_string()
    }

    /// Signs up a customer account through the public page and returns its token
    pub async fn signup_customer(&self, email: &str) -> String {
        let (status, body) = self
            .send(
                "POST",
                &format!("/v1/public/{}/signup", self.slug),
                None,
                Some(json!({ "email": email, "password": TEST_PASSWORD, "name": "Casey" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{}", body);
        token_of(&body).unwrap()
    }

    /// Removes the business and everything in it
    pub async fn cleanup(&self) -> anyhow::Result<()> {
        let mut tx = begin_scoped(&self.db, &Actor::System).await?;
        Business::delete(&mut *tx, self.business_id).await?;
        tx.commit().await?;
        Ok(())
    }
}

pub fn token_of(body: &Value) -> anyhow::Result<String> {
    body["access_token"]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("response has no access_token: {}", body))
}

/// RFC 3339 timestamp `hours` from now, on a whole minute
pub fn hours_from_now(hours: i64) -> String {
    use chrono::{DurationRound, Utc};

    let at = Utc::now() + chrono::Duration::hours(hours);
    at.duration_trunc(chrono::Duration::minutes(1))
        .unwrap_or(at)
        .to_rfc3339()
}
