/// Dashboard summary (owner, staff)
///
/// ```text
/// GET /v1/dashboard
/// ```
///
/// Counts bookings by status, today's bookings, the next upcoming
/// bookings, this month's revenue and the customer total. Day and month
/// boundaries are UTC.

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, Extension, Json};
use bookdesk_shared::{
    auth::middleware::AuthContext,
    booking_flow::{self, DashboardSummary},
};
use chrono::Utc;

pub async fn summary(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<Json<DashboardSummary>> {
    let actor = auth.actor();

    let mut tx = state.begin(&actor).await?;
    let summary = booking_flow::dashboard_summary(&mut tx, &actor, Utc::now()).await?;
    tx.commit().await?;

    Ok(Json(summary))
}
