/// Application state and router builder
///
/// # Example
///
/// ```no_run
/// use bookdesk_api::{app::{build_router, AppState}, config::Config};
/// use sqlx::PgPool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = PgPool::connect(&config.database.url).await?;
/// let app = build_router(AppState::new(pool, config));
///
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```

use crate::{config::Config, middleware::security::SecurityHeadersLayer};
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::{from_fn_with_state, Next},
    response::Response,
    routing::{delete, get, post, put},
    Router,
};
use bookdesk_shared::auth::{
    jwt::{create_token, Claims, JwtError},
    middleware::{jwt_auth_middleware, optional_jwt_auth_middleware, AuthError},
    policy::Actor,
};
use bookdesk_shared::db::scope::begin_scoped;
use bookdesk_shared::models::user::User;
use sqlx::{PgPool, Postgres, Transaction};
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(db: PgPool, config: Config) -> Self {
        Self {
            db,
            config: Arc::new(config),
        }
    }

    pub fn jwt_secret(&self) -> &str {
        &self.config.jwt.secret
    }

    /// Begins a transaction with row-level security scoped to `actor`
    pub async fn begin(&self, actor: &Actor) -> Result<Transaction<'static, Postgres>, sqlx::Error> {
        begin_scoped(&self.db, actor).await
    }

    /// Issues an access token for `user`
    pub fn issue_token(&self, user: &User) -> Result<String, JwtError> {
        let claims = Claims::with_expiration(
            user.id,
            user.business_id,
            user.role,
            user.email.clone(),
            chrono::Duration::hours(self.config.jwt.ttl_hours),
        );
        create_token(&claims, self.jwt_secret())
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /health                                   public
/// /v1/auth/register, /v1/auth/login         public
/// /v1/invites/accept                        public
/// /v1/public/:slug[/bookings|/signup]       public, token optional
/// /v1/auth/me                               JWT
/// /v1/users[/:id]                           JWT
/// /v1/business                              JWT
/// /v1/services[/:id]                        JWT
/// /v1/staff[/:id[/services]]                JWT
/// /v1/staff-invites[/:id]                   JWT
/// /v1/customers[/:id]                       JWT
/// /v1/bookings[/:id[/status]]               JWT
/// /v1/payments[/:id[/status|/amount]]       JWT
/// /v1/settings/booking                      JWT
/// /v1/dashboard                             JWT
/// ```
///
/// # Middleware Stack
///
/// Applied in order (outermost first):
/// 1. Security headers
/// 2. CORS (tower-http CorsLayer)
/// 3. Logging (tower-http TraceLayer)
/// 4. Authentication (per route group)
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let health_routes = Router::new().route("/health", get(routes::health::health_check));

    let auth_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login));

    let public_routes = Router::new()
        .route("/:slug", get(routes::public::business_profile))
        .route("/:slug/bookings", post(routes::public::create_booking))
        .route("/:slug/signup", post(routes::public::signup))
        .layer(from_fn_with_state(state.clone(), optional_auth_layer));

    let protected_routes = Router::new()
        .route("/auth/me", get(routes::auth::me).put(routes::users::update_me))
        .route("/users", get(routes::users::list_users))
        .route("/users/:id", delete(routes::users::delete_user))
        .route(
            "/business",
            get(routes::business::get_business)
                .put(routes::business::update_business)
                .delete(routes::business::delete_business),
        )
        .route(
            "/services",
            get(routes::services::list_services).post(routes::services::create_service),
        )
        .route(
            "/services/:id",
            get(routes::services::get_service)
                .put(routes::services::update_service)
                .delete(routes::services::delete_service),
        )
        .route(
            "/staff",
            get(routes::staff::list_staff).post(routes::staff::create_staff),
        )
        .route(
            "/staff/:id",
            get(routes::staff::get_staff)
                .put(routes::staff::update_staff)
                .delete(routes::staff::delete_staff),
        )
        .route("/staff/:id/services", put(routes::staff::assign_services))
        .route(
            "/staff-invites",
            get(routes::staff_invites::list_invites).post(routes::staff_invites::create_invite),
        )
        .route("/staff-invites/:id", delete(routes::staff_invites::revoke_invite))
        .route(
            "/customers",
            get(routes::customers::list_customers).post(routes::customers::create_customer),
        )
        .route(
            "/customers/:id",
            get(routes::customers::get_customer)
                .put(routes::customers::update_customer)
                .delete(routes::customers::delete_customer),
        )
        .route(
            "/bookings",
            get(routes::bookings::list_bookings).post(routes::bookings::create_booking),
        )
        .route(
            "/bookings/:id",
            get(routes::bookings::get_booking)
                .put(routes::bookings::update_booking)
                .delete(routes::bookings::delete_booking),
        )
        .route("/bookings/:id/status", put(routes::bookings::change_status))
        .route("/payments", get(routes::payments::list_payments))
        .route(
            "/payments/:id",
            get(routes::payments::get_payment).delete(routes::payments::delete_payment),
        )
        .route("/payments/:id/status", put(routes::payments::change_status))
        .route("/payments/:id/amount", put(routes::payments::change_amount))
        .route(
            "/settings/booking",
            get(routes::settings::get_settings).put(routes::settings::update_settings),
        )
        .route("/dashboard", get(routes::dashboard::summary))
        .layer(from_fn_with_state(state.clone(), jwt_auth_layer));

    let v1_routes = Router::new()
        .nest("/auth", auth_routes)
        .route("/invites/accept", post(routes::invites::accept_invite))
        .nest("/public", public_routes)
        .merge(protected_routes);

    Router::new()
        .merge(health_routes)
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_layer(&state.config))
        .layer(SecurityHeadersLayer::new(state.config.api.production))
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.api.cors_origins.iter().any(|origin| origin == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}

/// Requires a valid bearer token and adds the `AuthContext` extension
async fn jwt_auth_layer(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    jwt_auth_middleware(state.db.clone(), state.config.jwt.secret.clone(), req, next).await
}

/// Adds the `AuthContext` extension when a bearer token is present
async fn optional_auth_layer(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    optional_jwt_auth_middleware(state.db.clone(), state.config.jwt.secret.clone(), req, next).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ApiConfig, DatabaseConfig, JwtConfig};
    use axum::{body::Body, http::StatusCode};
    use tower::Service as _;

    fn config(origins: &[&str]) -> Config {
        Config {
            api: ApiConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                cors_origins: origins.iter().map(|o| o.to_string()).collect(),
                production: false,
            },
            database: DatabaseConfig {
                url: "postgresql://localhost/bookdesk_test".to_string(),
                max_connections: 1,
            },
            jwt: JwtConfig {
                secret: "test-secret-key-at-least-32-bytes-long".to_string(),
                ttl_hours: 1,
            },
            run_migrations: false,
        }
    }

    fn lazy_state() -> AppState {
        let pool = PgPool::connect_lazy("postgresql://localhost/bookdesk_test").unwrap();
        AppState::new(pool, config(&["*"]))
    }

    #[tokio::test]
    async fn test_protected_route_requires_token() {
        let mut app = build_router(lazy_state());

        let response = app
            .call(
                axum::http::Request::builder()
                    .uri("/v1/bookings")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_malformed_authorization_is_bad_request() {
        let mut app = build_router(lazy_state());

        let response = app
            .call(
                axum::http::Request::builder()
                    .uri("/v1/dashboard")
                    .header("authorization", "Token abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_public_route_rejects_invalid_token() {
        let mut app = build_router(lazy_state());

        let response = app
            .call(
                axum::http::Request::builder()
                    .uri("/v1/public/some-shop")
                    .header("authorization", "Bearer not-a-jwt")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    async fn allowed_origin(origins: &[&str], origin: &str) -> Option<String> {
        let mut app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(cors_layer(&config(origins)));

        let response = app
            .call(
                axum::http::Request::builder()
                    .uri("/")
                    .header(header::ORIGIN, origin)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .map(|value| value.to_str().unwrap().to_string())
    }

    #[tokio::test]
    async fn test_cors_allows_only_listed_origins() {
        // Unparseable entries are skipped
        let origins = ["https://admin.example.com", "not a header\n"];

        assert_eq!(
            allowed_origin(&origins, "https://admin.example.com").await.as_deref(),
            Some("https://admin.example.com")
        );
        assert_eq!(allowed_origin(&origins, "https://evil.example.com").await, None);
    }

    #[tokio::test]
    async fn test_cors_wildcard_allows_any_origin() {
        assert_eq!(
            allowed_origin(&["*"], "https://anywhere.example.com").await.as_deref(),
            Some("*")
        );
    }
}
