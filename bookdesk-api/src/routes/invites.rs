/// Staff invite acceptance
///
/// ```text
/// POST /v1/invites/accept
///
/// { "token": "inv_...", "name": "Sam", "password": "Str0ngPass" }
/// ```
///
/// Creates a staff-role account for the invited email, links it to the
/// invite's staff profile and signs the new user in. The invite can be
/// used once.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{auth::{check_password, AuthResponse}, found},
};
use axum::{extract::State, http::StatusCode, Json};
use bookdesk_shared::{
    auth::{password, policy::Actor, token::validate_invite_token_format},
    models::{
        business::Business,
        staff::Staff,
        staff_invite::StaffInvite,
        user::{CreateUser, User, UserRole},
    },
};
use serde::Deserialize;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct AcceptInviteRequest {
    pub token: String,

    #[validate(length(min = 1, max = 255, message = "Name is required"))]
    pub name: String,

    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

pub async fn accept_invite(
    State(state): State<AppState>,
    Json(req): Json<AcceptInviteRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    req.validate()?;
    if !validate_invite_token_format(&req.token) {
        return Err(ApiError::invalid_field("token", "Malformed invite token"));
    }
    check_password(&req.password)?;

    let password_hash = password::hash_password(&req.password)?;

    let mut tx = state.begin(&Actor::System).await?;

    let invite = found(
        StaffInvite::find_valid_by_token(&mut *tx, &req.token).await?,
        "Invite",
    )?;

    // Lost a race with another acceptance of the same token
    let invite = StaffInvite::mark_used(&mut *tx, invite.id)
        .await?
        .ok_or_else(|| ApiError::Conflict("Invite already used".to_string()))?;

    let user = User::create(
        &mut *tx,
        CreateUser {
            business_id: invite.business_id,
            email: invite.email.clone(),
            password_hash,
            name: Some(req.name.trim().to_string()),
            role: UserRole::Staff,
        },
    )
    .await?;

    if let Some(staff_id) = invite.staff_id {
        found(
            Staff::link_user(&mut *tx, invite.business_id, staff_id, user.id).await?,
            "Staff member",
        )?;
    }

    let business = found(Business::find_by_id(&mut *tx, invite.business_id).await?, "Business")?;

    tx.commit().await?;

    tracing::info!(
        user_id = %user.id,
        business_id = %business.id,
        invite_id = %invite.id,
        staff_id = ?invite.staff_id,
        "Staff invite accepted"
    );

    Ok((StatusCode::CREATED, Json(AuthResponse::new(&state, user, business)?)))
}
