/// Authentication endpoints
///
/// - `POST /v1/auth/register`: create a business and its owner account
/// - `POST /v1/auth/login`: exchange email and password for a token
/// - `GET /v1/auth/me`: the signed-in user and their business
///
/// Registration and login run as the system actor: the caller has no
/// business yet, and login has to find the user before it knows one.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::found,
};
use axum::{extract::State, http::StatusCode, Extension, Json};
use bookdesk_shared::{
    auth::{middleware::AuthContext, password, policy::Actor},
    models::{
        business::{slugify, validate_slug, Business, BusinessType, CreateBusiness},
        normalize_email,
        user::{CreateUser, User, UserRole},
    },
};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    #[validate(length(max = 255))]
    pub name: Option<String>,

    #[validate(length(min = 1, max = 255, message = "Business name is required"))]
    pub business_name: String,

    /// Defaults to a slug derived from the business name
    pub slug: Option<String>,

    #[serde(default)]
    pub business_type: BusinessType,

    #[validate(length(min = 1, max = 64))]
    pub timezone: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    pub password: String,
}

/// Token plus the account it was issued for
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub user: User,
    pub business: Business,
}

impl AuthResponse {
    pub fn new(state: &AppState, user: User, business: Business) -> ApiResult<Self> {
        let access_token = state.issue_token(&user)?;
        Ok(Self {
            access_token,
            token_type: "Bearer",
            expires_in: state.config.jwt.ttl_hours * 3600,
            user,
            business,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: User,
    pub business: Business,
}

/// Checks password strength, reporting failures against `password`
pub(crate) fn check_password(candidate: &str) -> ApiResult<()> {
    password::validate_password_strength(candidate)
        .map_err(|message| ApiError::invalid_field("password", message))
}

/// Registers a business and its owner
///
/// ```text
/// POST /v1/auth/register
///
/// { "email": "ana@example.com", "password": "Str0ngPass", "business_name": "Ana's Salon" }
/// ```
///
/// # Errors
///
/// - `422`: validation failed or weak password
/// - `409`: email or slug already taken
pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    req.validate()?;
    check_password(&req.password)?;

    let slug = match req.slug.as_deref() {
        Some(slug) => slug.trim().to_string(),
        None => slugify(&req.business_name),
    };
    validate_slug(&slug).map_err(|_| {
        ApiError::invalid_field("slug", "Slug must be 3-63 characters of a-z, 0-9 and hyphens")
    })?;

    let password_hash = password::hash_password(&req.password)?;

    let mut tx = state.begin(&Actor::System).await?;

    if Business::slug_exists(&mut *tx, &slug).await? {
        return Err(ApiError::Conflict("Slug already taken".to_string()));
    }

    let business = Business::create(
        &mut *tx,
        CreateBusiness {
            slug,
            name: req.business_name,
            business_type: req.business_type,
            email: Some(req.email.clone()),
            phone: None,
            address: None,
            timezone: req.timezone,
        },
    )
    .await?;

    let user = User::create(
        &mut *tx,
        CreateUser {
            business_id: business.id,
            email: req.email,
            password_hash,
            name: req.name,
            role: UserRole::Owner,
        },
    )
    .await?;

    tx.commit().await?;

    tracing::info!(
        user_id = %user.id,
        business_id = %business.id,
        slug = %business.slug,
        "Business registered"
    );

    Ok((StatusCode::CREATED, Json(AuthResponse::new(&state, user, business)?)))
}

/// Signs in with email and password
///
/// # Errors
///
/// - `401`: unknown email or wrong password (indistinguishable)
pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> ApiResult<Json<AuthResponse>> {
    req.validate()?;

    let invalid = || ApiError::Unauthorized("Invalid email or password".to_string());

    let mut tx = state.begin(&Actor::System).await?;

    let user = User::find_by_email(&mut *tx, &normalize_email(&req.email))
        .await?
        .ok_or_else(invalid)?;

    if !password::verify_password(&req.password, &user.password_hash)? {
        tracing::debug!(user_id = %user.id, "Login with wrong password");
        return Err(invalid());
    }

    User::update_last_login(&mut *tx, user.id).await?;
    let business = found(Business::find_by_id(&mut *tx, user.business_id).await?, "Business")?;

    tx.commit().await?;

    tracing::info!(user_id = %user.id, role = user.role.as_str(), "User logged in");

    Ok(Json(AuthResponse::new(&state, user, business)?))
}

/// Returns the signed-in user and their business
pub async fn me(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<MeResponse>> {
    let mut tx = state.begin(&auth.actor()).await?;

    let user = found(User::find_by_id(&mut *tx, auth.user_id).await?, "User")?;
    let business = found(Business::find_by_id(&mut *tx, auth.business_id).await?, "Business")?;

    tx.commit().await?;

    Ok(Json(MeResponse { user, business }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_validation() {
        let req: RegisterRequest = serde_json::from_value(serde_json::json!({
            "email": "owner@example.com",
            "password": "Str0ngPassword",
            "business_name": "Ana's Salon"
        }))
        .unwrap();
        assert!(req.validate().is_ok());
        assert_eq!(req.business_type, BusinessType::Other);

        let bad: RegisterRequest = serde_json::from_value(serde_json::json!({
            "email": "nope",
            "password": "short",
            "business_name": ""
        }))
        .unwrap();
        let errors = bad.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("password"));
        assert!(fields.contains_key("business_name"));
    }

    #[test]
    fn test_weak_password_is_field_error() {
        match check_password("password") {
            Err(ApiError::ValidationError(details)) => assert_eq!(details[0].field, "password"),
            other => panic!("unexpected {:?}", other),
        }
    }
}
