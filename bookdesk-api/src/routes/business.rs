/// The caller's own business
///
/// - `GET /v1/business`
/// - `PUT /v1/business` (owner)
/// - `DELETE /v1/business` (owner; removes every row of the business)

use crate::{
    app::AppState,
    error::ApiResult,
    routes::{deleted, found},
};
use axum::{extract::State, http::StatusCode, Extension, Json};
use bookdesk_shared::{
    auth::{
        authorization::authorize,
        middleware::AuthContext,
        policy::{Operation, RowScope, Table},
    },
    models::business::{Business, UpdateBusiness},
};
use validator::Validate;

pub async fn get_business(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<Business>> {
    let actor = auth.actor();
    authorize(&actor, Table::Businesses, Operation::Select, &RowScope::new(auth.business_id))?;

    let mut tx = state.begin(&actor).await?;
    let business = found(Business::find_by_id(&mut *tx, auth.business_id).await?, "Business")?;
    tx.commit().await?;

    Ok(Json(business))
}

pub async fn update_business(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<UpdateBusiness>,
) -> ApiResult<Json<Business>> {
    let actor = auth.actor();
    authorize(&actor, Table::Businesses, Operation::Update, &RowScope::new(auth.business_id))?;
    req.validate()?;

    let mut tx = state.begin(&actor).await?;
    let business = found(Business::update(&mut *tx, auth.business_id, req).await?, "Business")?;
    tx.commit().await?;

    tracing::info!(business_id = %business.id, "Business profile updated");

    Ok(Json(business))
}

pub async fn delete_business(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<StatusCode> {
    let actor = auth.actor();
    authorize(&actor, Table::Businesses, Operation::Delete, &RowScope::new(auth.business_id))?;

    let mut tx = state.begin(&actor).await?;
    let removed = Business::delete(&mut *tx, auth.business_id).await?;
    tx.commit().await?;

    deleted(removed, "Business", auth.business_id)?;
    Ok(StatusCode::NO_CONTENT)
}
