/// Authentication middleware for Axum
///
/// Validates `Authorization: Bearer <token>` headers, reloads the account
/// the token names and adds an [`AuthContext`] to the request extensions.
/// Role, business and email come from the account, not the token, so a
/// deleted account stops working at once. Public booking routes use
/// [`optional_jwt_auth_middleware`], which lets unauthenticated requests
/// through untouched.
///
/// # Example
///
/// ```no_run
/// use axum::{extract::Request, middleware::{self, Next}, routing::get, Extension, Router};
/// use bookdesk_shared::auth::middleware::{jwt_auth_middleware, AuthContext};
/// use sqlx::PgPool;
///
/// async fn protected_handler(Extension(auth): Extension<AuthContext>) -> String {
///     format!("Hello, user {} of business {}!", auth.user_id, auth.business_id)
/// }
///
/// # fn example(pool: PgPool) {
/// let app: Router = Router::new()
///     .route("/protected", get(protected_handler))
///     .layer(middleware::from_fn(move |req: Request, next: Next| {
///         jwt_auth_middleware(pool.clone(), "your-jwt-secret".to_string(), req, next)
///     }));
/// # }
/// ```

use axum::{
    extract::Request,
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use super::jwt::{validate_token, Claims, JwtError};
use super::policy::Actor;
use crate::db::scope::begin_scoped;
use crate::models::user::{User, UserRole};

/// Authenticated caller, added to request extensions
///
/// ```
/// use axum::Extension;
/// use bookdesk_shared::auth::middleware::AuthContext;
///
/// async fn handler(Extension(auth): Extension<AuthContext>) -> String {
///     format!("User: {}, Business: {}", auth.user_id, auth.business_id)
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub business_id: Uuid,
    pub role: UserRole,
    pub email: String,
}

impl AuthContext {
    pub fn from_claims(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            business_id: claims.business_id,
            role: claims.role,
            email: claims.email,
        }
    }

    /// Policy actor for this caller
    pub fn actor(&self) -> Actor {
        Actor::member(self.user_id, self.business_id, self.role, self.email.clone())
    }
}

/// Error type for authentication middleware
#[derive(Debug, PartialEq, Eq)]
pub enum AuthError {
    /// Missing authorization header
    MissingCredentials,

    /// Invalid authorization header format
    InvalidFormat(String),

    /// Token validation failed
    InvalidToken(String),

    /// The account could not be loaded
    Unavailable,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            AuthError::MissingCredentials => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                "Missing credentials".to_string(),
            ),
            AuthError::InvalidFormat(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            AuthError::InvalidToken(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg),
            AuthError::Unavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "service_unavailable",
                "Authentication is temporarily unavailable".to_string(),
            ),
        };

        (
            status,
            Json(serde_json::json!({ "error": error, "message": message })),
        )
            .into_response()
    }
}

/// Extracts and validates the bearer token from request headers
pub fn authenticate(headers: &HeaderMap, secret: &str) -> Result<AuthContext, AuthError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingCredentials)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AuthError::InvalidFormat("Expected Bearer token".to_string()))?;

    let claims = validate_token(token, secret).map_err(|e| match e {
        JwtError::Expired => AuthError::InvalidToken("Token expired".to_string()),
        JwtError::InvalidIssuer { .. } => AuthError::InvalidToken("Invalid issuer".to_string()),
        _ => AuthError::InvalidToken("Invalid token".to_string()),
    })?;

    Ok(AuthContext::from_claims(claims))
}

/// Replaces the token's view of the caller with the stored account
///
/// The lookup runs as the caller, so it only succeeds for an account that
/// still exists in the business the token names.
pub async fn load_current(pool: &PgPool, token_context: AuthContext) -> Result<AuthContext, AuthError> {
    let lookup = async {
        let mut tx = begin_scoped(pool, &token_context.actor()).await?;
        let user = User::find_by_id(&mut *tx, token_context.user_id).await?;
        tx.commit().await?;
        Ok::<_, sqlx::Error>(user)
    };

    let user = lookup.await.map_err(|e| {
        tracing::error!(error = %e, "Could not load authenticated account");
        AuthError::Unavailable
    })?;

    match user {
        Some(user) if user.business_id == token_context.business_id => Ok(AuthContext {
            user_id: user.id,
            business_id: user.business_id,
            role: user.role,
            email: user.email,
        }),
        _ => {
            tracing::debug!(user_id = %token_context.user_id, "Token names a removed account");
            Err(AuthError::InvalidToken("Account no longer exists".to_string()))
        }
    }
}

/// JWT authentication middleware
///
/// # Errors
///
/// Returns 401 Unauthorized if the header is missing, the token is invalid
/// or it has expired, and 400 if the header is not a bearer token.
pub async fn jwt_auth_middleware(
    pool: PgPool,
    secret: String,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let auth_context = authenticate(req.headers(), &secret)?;
    let auth_context = load_current(&pool, auth_context).await?;

    tracing::Span::current().record("user_id", tracing::field::display(auth_context.user_id));
    req.extensions_mut().insert(auth_context);

    Ok(next.run(req).await)
}

/// Like [`jwt_auth_middleware`] but lets requests without credentials pass
///
/// A present but invalid token is still rejected.
pub async fn optional_jwt_auth_middleware(
    pool: PgPool,
    secret: String,
    mut req: Request,
    next: Next,
) -> Result<Response, AuthError> {
    match authenticate(req.headers(), &secret) {
        Ok(auth_context) => {
            let auth_context = load_current(&pool, auth_context).await?;
            req.extensions_mut().insert(auth_context);
        }
        Err(AuthError::MissingCredentials) => {}
        Err(e) => return Err(e),
    }

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::jwt::create_token;
    use axum::http::HeaderValue;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token)).unwrap(),
        );
        headers
    }

    #[test]
    fn test_auth_context_from_claims() {
        let user_id = Uuid::new_v4();
        let business_id = Uuid::new_v4();
        let claims = Claims::new(user_id, business_id, UserRole::Staff, "sam@example.com");

        let context = AuthContext::from_claims(claims);
        assert_eq!(context.user_id, user_id);
        assert_eq!(context.business_id, business_id);
        assert_eq!(context.role, UserRole::Staff);

        let actor = context.actor();
        assert_eq!(actor.user_id(), Some(user_id));
        assert_eq!(actor.business_id(), Some(business_id));
        assert_eq!(actor.role_name(), "staff");
    }

    #[test]
    fn test_authenticate_valid_token() {
        let claims = Claims::new(Uuid::new_v4(), Uuid::new_v4(), UserRole::Owner, "o@example.com");
        let token = create_token(&claims, SECRET).unwrap();

        let context = authenticate(&bearer(&token), SECRET).unwrap();
        assert_eq!(context.user_id, claims.sub);
        assert_eq!(context.role, UserRole::Owner);
    }

    #[test]
    fn test_authenticate_failures() {
        assert_eq!(
            authenticate(&HeaderMap::new(), SECRET),
            Err(AuthError::MissingCredentials)
        );

        let mut basic = HeaderMap::new();
        basic.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        assert!(matches!(
            authenticate(&basic, SECRET),
            Err(AuthError::InvalidFormat(_))
        ));

        assert!(matches!(
            authenticate(&bearer("not.a.token"), SECRET),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn test_auth_error_into_response() {
        assert_eq!(
            AuthError::MissingCredentials.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::InvalidFormat("test".to_string()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AuthError::InvalidToken("test".to_string()).into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::Unavailable.into_response().status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
