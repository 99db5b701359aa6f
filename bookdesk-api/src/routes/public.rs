/// Public booking pages
///
/// - `GET /v1/public/:slug`: business profile, active services, active
///   staff and booking rules
/// - `POST /v1/public/:slug/bookings`: book without an account
/// - `POST /v1/public/:slug/signup`: create a customer account
///
/// These routes run as an anonymous actor pinned to the business named by
/// the slug. A bearer token is optional; a signed-in customer of the same
/// business books under their account email.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{auth::{check_password, AuthResponse}, found},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use bookdesk_shared::{
    auth::{
        authorization::authorize,
        middleware::AuthContext,
        password,
        policy::{Actor, Operation, RowScope, Table},
    },
    booking_flow::{self, CreatedBooking, PublicBookingRequest},
    db::scope::apply_actor,
    models::{
        booking_settings::BookingSettings,
        business::Business,
        customer::{CreateCustomer, Customer},
        normalize_email,
        service::Service,
        staff::Staff,
        user::{CreateUser, User, UserRole},
    },
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

/// Staff as shown to the public: no contact details
#[derive(Debug, Serialize)]
pub struct PublicStaff {
    pub id: Uuid,
    pub name: String,

    /// Empty means every service
    pub service_ids: Vec<Uuid>,
}

impl From<Staff> for PublicStaff {
    fn from(staff: Staff) -> Self {
        Self {
            id: staff.id,
            name: staff.name,
            service_ids: staff.service_ids,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BusinessProfile {
    pub business: Business,
    pub services: Vec<Service>,
    pub staff: Vec<PublicStaff>,
    pub settings: BookingSettings,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,

    #[validate(length(min = 1, max = 255, message = "Name is required"))]
    pub name: String,

    #[validate(length(max = 50))]
    pub phone: Option<String>,
}

/// Opens an anonymous transaction pinned to the business behind `slug`
async fn open_public(
    state: &AppState,
    slug: &str,
) -> ApiResult<(sqlx::Transaction<'static, sqlx::Postgres>, Business)> {
    let mut tx = state.begin(&Actor::Anonymous { business_id: None }).await?;

    let business = found(Business::find_by_slug(&mut *tx, slug).await?, "Business")?;
    apply_actor(&mut tx, &Actor::anonymous(business.id)).await?;

    Ok((tx, business))
}

pub async fn business_profile(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> ApiResult<Json<BusinessProfile>> {
    let (mut tx, business) = open_public(&state, &slug).await?;
    let actor = Actor::anonymous(business.id);

    let scope = RowScope::new(business.id).with_active(true);
    authorize(&actor, Table::Services, Operation::Select, &scope)?;
    authorize(&actor, Table::Staff, Operation::Select, &scope)?;

    let services = Service::list(&mut *tx, business.id, true).await?;
    let staff = Staff::list(&mut *tx, business.id, true).await?;
    let settings = BookingSettings::get_or_default(&mut *tx, business.id).await?;

    tx.commit().await?;

    Ok(Json(BusinessProfile {
        business,
        services,
        staff: staff.into_iter().map(PublicStaff::from).collect(),
        settings,
    }))
}

pub async fn create_booking(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    auth: Option<Extension<AuthContext>>,
    Json(mut req): Json<PublicBookingRequest>,
) -> ApiResult<(StatusCode, Json<CreatedBooking>)> {
    let (mut tx, business) = open_public(&state, &slug).await?;

    if let Some(Extension(auth)) = auth {
        if auth.business_id == business.id && auth.role == UserRole::Customer {
            req.email = auth.email;
        }
    }

    let created = booking_flow::public_booking(&mut tx, &business, req, Utc::now()).await?;
    tx.commit().await?;

    tracing::info!(
        booking_id = %created.booking.id,
        business_id = %business.id,
        "Public booking created"
    );

    Ok((StatusCode::CREATED, Json(created)))
}

/// Creates a customer account for the business
///
/// Links to an existing customer record with the same email, or creates
/// one.
///
/// # Errors
///
/// - `409`: email already used by any account
pub async fn signup(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    Json(req): Json<SignupRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    req.validate()?;
    check_password(&req.password)?;

    let email = normalize_email(&req.email);
    let password_hash = password::hash_password(&req.password)?;

    let mut tx = state.begin(&Actor::System).await?;

    let business = found(Business::find_by_slug(&mut *tx, &slug).await?, "Business")?;

    if User::find_by_email(&mut *tx, &email).await?.is_some() {
        return Err(ApiError::Conflict("Email already registered".to_string()));
    }

    let user = User::create(
        &mut *tx,
        CreateUser {
            business_id: business.id,
            email: email.clone(),
            password_hash,
            name: Some(req.name.clone()),
            role: UserRole::Customer,
        },
    )
    .await?;

    if Customer::find_by_email(&mut *tx, business.id, &email).await?.is_none() {
        Customer::create(
            &mut *tx,
            business.id,
            CreateCustomer {
                name: req.name,
                email: Some(email),
                phone: req.phone,
                notes: None,
                tags: Vec::new(),
            },
        )
        .await?;
    }

    tx.commit().await?;

    tracing::info!(user_id = %user.id, business_id = %business.id, "Customer signed up");

    Ok((StatusCode::CREATED, Json(AuthResponse::new(&state, user, business)?)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_staff_hides_contact_details() {
        let staff: Staff = serde_json::from_value(serde_json::json!({
            "id": Uuid::new_v4(),
            "business_id": Uuid::new_v4(),
            "user_id": null,
            "name": "Sam",
            "email": "sam@example.com",
            "phone": "555-0100",
            "service_ids": [],
            "active": true,
            "created_at": "2025-01-01T00:00:00Z",
            "updated_at": "2025-01-01T00:00:00Z"
        }))
        .unwrap();

        let public = serde_json::to_value(PublicStaff::from(staff)).unwrap();
        assert_eq!(public["name"], "Sam");
        assert!(public.get("email").is_none());
        assert!(public.get("phone").is_none());
    }

    #[test]
    fn test_signup_validation() {
        let req: SignupRequest = serde_json::from_value(serde_json::json!({
            "email": "ana@example.com",
            "password": "Str0ngPass",
            "name": ""
        }))
        .unwrap();
        assert!(req.validate().unwrap_err().field_errors().contains_key("name"));
    }
}
