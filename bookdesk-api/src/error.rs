/// Error handling for the API server
///
/// Handlers return `ApiResult<T>`; every error from the shared crate
/// converts into [`ApiError`], which renders as
///
/// ```json
/// { "error": "not_found", "message": "Booking not found" }
/// ```
///
/// with a `details` array for validation failures. Internal errors are
/// logged and returned without detail.
///
/// # Example
///
/// ```no_run
/// use bookdesk_api::error::{ApiError, ApiResult};
/// use axum::Json;
///
/// async fn handler(found: Option<String>) -> ApiResult<Json<String>> {
///     let value = found.ok_or_else(|| ApiError::NotFound("Thing not found".to_string()))?;
///     Ok(Json(value))
/// }
/// ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bookdesk_shared::auth::{
    authorization::AuthzError, jwt::JwtError, middleware::AuthError, password::PasswordError,
};
use bookdesk_shared::booking_flow::FlowError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Postgres `insufficient_privilege`, raised when a write fails a row-level
/// security check
const PG_INSUFFICIENT_PRIVILEGE: &str = "42501";

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400)
    BadRequest(String),

    /// Unauthorized (401)
    Unauthorized(String),

    /// Forbidden (403)
    Forbidden(String),

    /// Not found (404)
    NotFound(String),

    /// Conflict (409), e.g. duplicate email or overlapping booking
    Conflict(String),

    /// Unprocessable entity (422) - field validation errors
    ValidationError(Vec<ValidationErrorDetail>),

    /// Unprocessable entity (422) - request breaks a booking rule
    BookingRule(String),

    /// Internal server error (500)
    InternalError(String),

    /// Service unavailable (503)
    ServiceUnavailable(String),
}

/// Validation error detail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    pub field: String,
    pub message: String,
}

impl ValidationErrorDetail {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "bad_request", "unauthorized")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::BookingRule(msg) => write!(f, "Booking rule: {}", msg),
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            ApiError::ServiceUnavailable(msg) => write!(f, "Service unavailable: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::ValidationError(_) | ApiError::BookingRule(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Shorthand for a single-field validation failure
    pub fn invalid_field(field: &str, message: impl Into<String>) -> Self {
        ApiError::ValidationError(vec![ValidationErrorDetail::new(field, message)])
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        let (error_code, message, details) = match self {
            ApiError::BadRequest(msg) => ("bad_request", msg, None),
            ApiError::Unauthorized(msg) => ("unauthorized", msg, None),
            ApiError::Forbidden(msg) => ("forbidden", msg, None),
            ApiError::NotFound(msg) => ("not_found", msg, None),
            ApiError::Conflict(msg) => ("conflict", msg, None),
            ApiError::ValidationError(errors) => (
                "validation_error",
                "Request validation failed".to_string(),
                Some(errors),
            ),
            ApiError::BookingRule(msg) => ("booking_rule", msg, None),
            ApiError::InternalError(msg) => {
                // Log internal errors but don't expose details to clients
                tracing::error!("Internal error: {}", msg);
                (
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
            ApiError::ServiceUnavailable(msg) => ("service_unavailable", msg, None),
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
            details,
        });

        (status, body).into_response()
    }
}

fn conflict_message(constraint: &str) -> &'static str {
    match constraint {
        "users_email_key" => "Email already registered",
        "businesses_slug_key" => "Slug already taken",
        "customers_business_email_key" => "A customer with this email already exists",
        "staff_user_id_key" => "User is already linked to a staff profile",
        "payments_booking_id_key" => "Booking already has a payment",
        _ => "Resource already exists",
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err) => {
                if db_err.is_unique_violation() {
                    let message = conflict_message(db_err.constraint().unwrap_or_default());
                    return ApiError::Conflict(message.to_string());
                }
                if db_err.is_foreign_key_violation() {
                    return ApiError::Conflict(
                        "Resource is referenced by or references missing records".to_string(),
                    );
                }
                if db_err.is_check_violation() {
                    return ApiError::BadRequest(format!(
                        "Value violates constraint {}",
                        db_err.constraint().unwrap_or("unknown")
                    ));
                }
                if db_err.code().as_deref() == Some(PG_INSUFFICIENT_PRIVILEGE) {
                    tracing::warn!(error = %db_err, "Row-level security rejected a write");
                    return ApiError::Forbidden("Operation not permitted".to_string());
                }

                ApiError::InternalError(format!("Database error: {}", db_err))
            }
            sqlx::Error::PoolTimedOut => {
                ApiError::ServiceUnavailable("Database is busy, try again".to_string())
            }
            _ => ApiError::InternalError(format!("Database error: {}", err)),
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut details: Vec<ValidationErrorDetail> = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| ValidationErrorDetail {
                    field: field.to_string(),
                    message: error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| error.code.to_string()),
                })
            })
            .collect();
        details.sort_by(|a, b| a.field.cmp(&b.field));

        ApiError::ValidationError(details)
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingCredentials => ApiError::Unauthorized("Missing credentials".to_string()),
            AuthError::InvalidFormat(msg) => ApiError::BadRequest(msg),
            AuthError::InvalidToken(msg) => ApiError::Unauthorized(msg),
            AuthError::Unavailable => {
                ApiError::ServiceUnavailable("Authentication is temporarily unavailable".to_string())
            }
        }
    }
}

impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::NotMember => ApiError::Unauthorized("Sign-in required".to_string()),
            // Rows of other businesses do not exist as far as the caller knows
            AuthzError::CrossTenant => ApiError::NotFound("Resource not found".to_string()),
            AuthzError::Denied { .. } => ApiError::Forbidden(err.to_string()),
            AuthzError::InsufficientRole { .. } => {
                ApiError::Forbidden("Insufficient permissions".to_string())
            }
            AuthzError::DatabaseError(e) => e.into(),
        }
    }
}

impl From<FlowError> for ApiError {
    fn from(err: FlowError) -> Self {
        match err {
            FlowError::NotFound(what) => ApiError::NotFound(format!("{} not found", what)),
            FlowError::Overlap => ApiError::Conflict(err.to_string()),
            FlowError::StatusNotAllowed(_) => ApiError::Forbidden(err.to_string()),
            FlowError::InactiveService
            | FlowError::InactiveStaff
            | FlowError::StaffNotQualified
            | FlowError::LeadTime(_)
            | FlowError::TooFarAhead(_)
            | FlowError::StartTimeOutOfRange
            | FlowError::CancellationWindow(_) => ApiError::BookingRule(err.to_string()),
            FlowError::Authz(e) => e.into(),
            FlowError::Validation(e) => e.into(),
            FlowError::Database(e) => e.into(),
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::InternalError(format!("Password operation failed: {}", err))
    }
}

impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::CreateError(msg) => {
                ApiError::InternalError(format!("Failed to create token: {}", msg))
            }
            JwtError::Expired => ApiError::Unauthorized("Token expired".to_string()),
            JwtError::InvalidIssuer { .. } => {
                ApiError::Unauthorized("Invalid token issuer".to_string())
            }
            JwtError::ValidationError(_) => ApiError::Unauthorized("Invalid token".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookdesk_shared::auth::policy::{DenyReason, Operation, Table};
    use bookdesk_shared::models::user::UserRole;
    use validator::Validate;

    #[test]
    fn test_error_display() {
        let err = ApiError::BadRequest("Invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: Invalid input");

        let err = ApiError::NotFound("User not found".to_string());
        assert_eq!(err.to_string(), "Not found: User not found");
    }

    #[test]
    fn test_authz_mapping() {
        assert_eq!(ApiError::from(AuthzError::NotMember).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::from(AuthzError::CrossTenant).status(), StatusCode::NOT_FOUND);

        let denied = AuthzError::Denied {
            table: Table::Payments,
            operation: Operation::Update,
            reason: DenyReason::Role,
        };
        assert_eq!(ApiError::from(denied).status(), StatusCode::FORBIDDEN);

        let role = AuthzError::InsufficientRole {
            required: UserRole::Owner,
            actual: Some(UserRole::Staff),
        };
        assert_eq!(ApiError::from(role).status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_flow_mapping() {
        assert_eq!(ApiError::from(FlowError::Overlap).status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::from(FlowError::LeadTime(60)).status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(
            ApiError::from(FlowError::CancellationWindow(24)).status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::from(FlowError::StatusNotAllowed("completed")).status(),
            StatusCode::FORBIDDEN
        );

        match ApiError::from(FlowError::NotFound("Service")) {
            ApiError::NotFound(msg) => assert_eq!(msg, "Service not found"),
            other => panic!("unexpected {:?}", other),
        }

        let nested = FlowError::Authz(AuthzError::CrossTenant);
        assert_eq!(ApiError::from(nested).status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_row_not_found_is_404() {
        assert_eq!(ApiError::from(sqlx::Error::RowNotFound).status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_validation_errors_are_detailed() {
        #[derive(Validate)]
        struct Input {
            #[validate(email(message = "Invalid email format"))]
            email: String,
            #[validate(range(min = 1))]
            count: i32,
        }

        let errors = Input {
            email: "nope".to_string(),
            count: 0,
        }
        .validate()
        .unwrap_err();

        match ApiError::from(errors) {
            ApiError::ValidationError(details) => {
                assert_eq!(details.len(), 2);
                assert_eq!(details[0], ValidationErrorDetail::new("count", "range"));
                assert_eq!(details[1], ValidationErrorDetail::new("email", "Invalid email format"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_conflict_messages() {
        assert_eq!(conflict_message("users_email_key"), "Email already registered");
        assert_eq!(conflict_message("businesses_slug_key"), "Slug already taken");
        assert_eq!(conflict_message("something_else"), "Resource already exists");
    }

    #[test]
    fn test_jwt_mapping() {
        assert_eq!(ApiError::from(JwtError::Expired).status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::from(JwtError::CreateError("boom".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
