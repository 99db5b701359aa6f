/// Booking rules of the caller's business
///
/// - `GET /v1/settings/booking`: stored values, or the defaults
/// - `PUT /v1/settings/booking` (owner): partial update

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, Extension, Json};
use bookdesk_shared::{
    auth::{
        authorization::authorize,
        middleware::AuthContext,
        policy::{Operation, RowScope, Table},
    },
    models::booking_settings::{BookingSettings, UpdateBookingSettings},
};
use validator::Validate;

pub async fn get_settings(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<BookingSettings>> {
    let actor = auth.actor();
    let scope = RowScope::new(auth.business_id);
    authorize(&actor, Table::BookingSettings, Operation::Select, &scope)?;

    let mut tx = state.begin(&actor).await?;
    let settings = BookingSettings::get_or_default(&mut *tx, auth.business_id).await?;
    tx.commit().await?;

    Ok(Json(settings))
}

pub async fn update_settings(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<UpdateBookingSettings>,
) -> ApiResult<Json<BookingSettings>> {
    let actor = auth.actor();
    let scope = RowScope::new(auth.business_id);
    authorize(&actor, Table::BookingSettings, Operation::Update, &scope)?;
    req.validate()?;

    let mut tx = state.begin(&actor).await?;
    let current = BookingSettings::get_or_default(&mut *tx, auth.business_id).await?;
    let saved = BookingSettings::upsert(&mut *tx, &current.apply(&req)).await?;
    tx.commit().await?;

    tracing::info!(
        business_id = %saved.business_id,
        min_lead_time_minutes = saved.min_lead_time_minutes,
        max_advance_days = saved.max_advance_days,
        cancellation_window_hours = saved.cancellation_window_hours,
        "Booking settings updated"
    );

    Ok(Json(saved))
}
