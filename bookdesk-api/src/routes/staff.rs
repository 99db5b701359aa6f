/// Staff profiles
///
/// - `GET /v1/staff`
/// - `POST /v1/staff` (owner)
/// - `GET /v1/staff/:id`
/// - `PUT /v1/staff/:id` (owner, or the staff member for their own contact details)
/// - `PUT /v1/staff/:id/services` (owner)
/// - `DELETE /v1/staff/:id` (owner)
///
/// Customers see active staff only.

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
        authorization::{authorize, require_role},
        middleware::AuthContext,
        policy::{Operation, RowScope, Table},
    },
    models::{
        service::Service,
        staff::{CreateStaff, Staff, UpdateStaff},
        user::UserRole,
    },
};
use serde::Deserialize;
use sqlx::PgConnection;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize)]
pub struct AssignServicesRequest {
    pub service_ids: Vec<Uuid>,
}

/// Rejects service ids that do not belong to the business
async fn check_services(
    conn: &mut PgConnection,
    business_id: Uuid,
    service_ids: &[Uuid],
) -> ApiResult<()> {
    if service_ids.is_empty() {
        return Ok(());
    }

    let known = Service::existing_ids(&mut *conn, business_id, service_ids).await?;
    if let Some(missing) = service_ids.iter().find(|id| !known.contains(id)) {
        return Err(ApiError::invalid_field(
            "service_ids",
            format!("Unknown service {}", missing),
        ));
    }

    Ok(())
}

pub async fn list_staff(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Vec<Staff>>> {
    let actor = auth.actor();
    authorize(&actor, Table::Staff, Operation::Select, &RowScope::new(auth.business_id))?;

    let mut tx = state.begin(&actor).await?;
    let staff = Staff::list(&mut *tx, auth.business_id, !actor.is_operator()).await?;
    tx.commit().await?;

    Ok(Json(staff))
}

pub async fn get_staff(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Staff>> {
    let actor = auth.actor();

    let mut tx = state.begin(&actor).await?;
    let staff = found(Staff::find(&mut *tx, auth.business_id, id).await?, "Staff member")?;
    tx.commit().await?;

    let scope = RowScope::new(staff.business_id).with_user(staff.user_id);
    authorize(&actor, Table::Staff, Operation::Select, &scope)?;

    if !staff.active && !actor.is_operator() {
        return Err(ApiError::NotFound("Staff member not found".to_string()));
    }

    Ok(Json(staff))
}

pub async fn create_staff(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateStaff>,
) -> ApiResult<(StatusCode, Json<Staff>)> {
    let actor = auth.actor();
    authorize(&actor, Table::Staff, Operation::Insert, &RowScope::new(auth.business_id))?;
    req.validate()?;

    let mut tx = state.begin(&actor).await?;
    check_services(&mut *tx, auth.business_id, &req.service_ids).await?;
    let staff = Staff::create(&mut *tx, auth.business_id, req).await?;
    tx.commit().await?;

    tracing::info!(staff_id = %staff.id, name = %staff.name, "Staff member created");

    Ok((StatusCode::CREATED, Json(staff)))
}

pub async fn update_staff(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateStaff>,
) -> ApiResult<Json<Staff>> {
    let actor = auth.actor();
    req.validate()?;

    let mut tx = state.begin(&actor).await?;
    let existing = found(Staff::find(&mut *tx, auth.business_id, id).await?, "Staff member")?;

    let scope = RowScope::new(existing.business_id).with_user(existing.user_id);
    authorize(&actor, Table::Staff, Operation::Update, &scope)?;

    if actor.role() != Some(UserRole::Owner) && !req.is_self_editable() {
        return Err(ApiError::Forbidden(
            "Only the owner can change service assignments or deactivate staff".to_string(),
        ));
    }

    if let Some(service_ids) = req.service_ids.as_deref() {
        check_services(&mut *tx, auth.business_id, service_ids).await?;
    }

    let staff = found(Staff::update(&mut *tx, auth.business_id, id, req).await?, "Staff member")?;
    tx.commit().await?;

    Ok(Json(staff))
}

pub async fn assign_services(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<AssignServicesRequest>,
) -> ApiResult<Json<Staff>> {
    let actor = auth.actor();
    require_role(&actor, UserRole::Owner)?;

    let mut tx = state.begin(&actor).await?;
    check_services(&mut *tx, auth.business_id, &req.service_ids).await?;
    let staff = found(
        Staff::assign_services(&mut *tx, auth.business_id, id, req.service_ids).await?,
        "Staff member",
    )?;
    tx.commit().await?;

    tracing::info!(staff_id = %staff.id, services = staff.service_ids.len(), "Staff services assigned");

    Ok(Json(staff))
}

pub async fn delete_staff(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let actor = auth.actor();
    authorize(&actor, Table::Staff, Operation::Delete, &RowScope::new(auth.business_id))?;

    let mut tx = state.begin(&actor).await?;
    let removed = Staff::delete(&mut *tx, auth.business_id, id).await?;
    tx.commit().await?;

    deleted(removed, "Staff member", id)?;
    Ok(StatusCode::NO_CONTENT)
}
