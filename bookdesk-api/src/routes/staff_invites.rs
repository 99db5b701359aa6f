/// Staff invites (owner only)
///
/// - `GET /v1/staff-invites`
/// - `POST /v1/staff-invites`: returns the plaintext token once
/// - `DELETE /v1/staff-invites/:id`
///
/// The token is handed to the invitee out of band and redeemed at
/// `POST /v1/invites/accept`.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{deleted, found},
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
        policy::{Operation, RowScope, Table},
    },
    models::{
        staff::Staff,
        staff_invite::{CreateStaffInvite, StaffInvite},
    },
};
use serde::Serialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize)]
pub struct CreatedInvite {
    pub invite: StaffInvite,

    /// Plaintext invite token, shown once
    pub token: String,
}

pub async fn list_invites(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<StaffInvite>>> {
    let actor = auth.actor();
    authorize(&actor, Table::StaffInvites, Operation::Select, &RowScope::new(auth.business_id))?;

    let mut tx = state.begin(&actor).await?;
    let invites = StaffInvite::list(&mut *tx, auth.business_id).await?;
    tx.commit().await?;

    Ok(Json(invites))
}

pub async fn create_invite(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateStaffInvite>,
) -> ApiResult<(StatusCode, Json<CreatedInvite>)> {
    let actor = auth.actor();
    authorize(&actor, Table::StaffInvites, Operation::Insert, &RowScope::new(auth.business_id))?;
    req.validate()?;

    let mut tx = state.begin(&actor).await?;

    let staff = found(
        Staff::find(&mut *tx, auth.business_id, req.staff_id).await?,
        "Staff member",
    )?;
    if staff.user_id.is_some() {
        return Err(ApiError::Conflict(
            "Staff member already has an account".to_string(),
        ));
    }

    let (invite, token) =
        StaffInvite::create(&mut *tx, auth.business_id, Some(auth.user_id), &req).await?;
    tx.commit().await?;

    tracing::info!(
        invite_id = %invite.id,
        staff_id = %staff.id,
        expires_at = %invite.expires_at,
        "Staff invite created"
    );

    Ok((StatusCode::CREATED, Json(CreatedInvite { invite, token })))
}

pub async fn revoke_invite(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let actor = auth.actor();
    authorize(&actor, Table::StaffInvites, Operation::Delete, &RowScope::new(auth.business_id))?;

    let mut tx = state.begin(&actor).await?;
    let removed = StaffInvite::delete(&mut *tx, auth.business_id, id).await?;
    tx.commit().await?;

    deleted(removed, "Invite", id)?;
    Ok(StatusCode::NO_CONTENT)
}
