/// Service catalogue
///
/// - `GET /v1/services?active_only=true`
/// - `POST /v1/services` (owner)
/// - `GET /v1/services/:id`
/// - `PUT /v1/services/:id` (owner)
/// - `DELETE /v1/services/:id` (owner; refused while bookings reference it)
///
/// Customers only ever see active services.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    routes::{deleted, found},
};
use axum::{
    extract::{Path, Query, State},
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
        service::{CreateService, Service, UpdateService},
        staff::Staff,
    },
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Default, Deserialize)]
pub struct ListServicesQuery {
    pub active_only: Option<bool>,
}

pub async fn list_services(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(query): Query<ListServicesQuery>,
) -> ApiResult<Json<Vec<Service>>> {
    let actor = auth.actor();
    let active_only = query.active_only.unwrap_or(false) || !actor.is_operator();
    let scope = RowScope::new(auth.business_id).with_active(true);
    authorize(&actor, Table::Services, Operation::Select, &scope)?;

    let mut tx = state.begin(&actor).await?;
    let services = Service::list(&mut *tx, auth.business_id, active_only).await?;
    tx.commit().await?;

    Ok(Json(services))
}

pub async fn get_service(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Service>> {
    let actor = auth.actor();

    let mut tx = state.begin(&actor).await?;
    let service = found(Service::find(&mut *tx, auth.business_id, id).await?, "Service")?;
    tx.commit().await?;

    // Inactive services do not exist as far as customers can tell
    if !service.active && !actor.is_operator() {
        return Err(ApiError::NotFound("Service not found".to_string()));
    }

    let scope = RowScope::new(service.business_id).with_active(service.active);
    authorize(&actor, Table::Services, Operation::Select, &scope)?;

    Ok(Json(service))
}

pub async fn create_service(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateService>,
) -> ApiResult<(StatusCode, Json<Service>)> {
    let actor = auth.actor();
    authorize(&actor, Table::Services, Operation::Insert, &RowScope::new(auth.business_id))?;
    req.validate()?;

    let mut tx = state.begin(&actor).await?;
    let service = Service::create(&mut *tx, auth.business_id, req).await?;
    tx.commit().await?;

    tracing::info!(service_id = %service.id, name = %service.name, "Service created");

    Ok((StatusCode::CREATED, Json(service)))
}

pub async fn update_service(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateService>,
) -> ApiResult<Json<Service>> {
    let actor = auth.actor();
    authorize(&actor, Table::Services, Operation::Update, &RowScope::new(auth.business_id))?;
    req.validate()?;

    let mut tx = state.begin(&actor).await?;
    let service = found(Service::update(&mut *tx, auth.business_id, id, req).await?, "Service")?;
    tx.commit().await?;

    Ok(Json(service))
}

pub async fn delete_service(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let actor = auth.actor();
    authorize(&actor, Table::Services, Operation::Delete, &RowScope::new(auth.business_id))?;

    let mut tx = state.begin(&actor).await?;
    let unassigned = Staff::unassign_service(&mut *tx, auth.business_id, id).await?;
    let removed = Service::delete(&mut *tx, auth.business_id, id).await?;
    tx.commit().await?;

    tracing::debug!(service_id = %id, unassigned, "Service removed from staff assignments");
    deleted(removed, "Service", id)?;
    Ok(StatusCode::NO_CONTENT)
}
