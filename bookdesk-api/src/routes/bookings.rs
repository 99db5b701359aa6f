/// Bookings
///
/// - `GET /v1/bookings?status=confirmed&staff_id=..&from=..&to=..`
/// - `POST /v1/bookings`: books a service and opens its payment
/// - `GET /v1/bookings/:id`
/// - `PUT /v1/bookings/:id`: reschedule or reassign (owner, staff)
/// - `PUT /v1/bookings/:id/status`
/// - `DELETE /v1/bookings/:id` (owner)
///
/// Creation and status changes go through [`bookdesk_shared::booking_flow`],
/// which applies the business's booking rules and keeps the payment and
/// customer aggregates consistent.

use crate::{
    app::AppState,
    error::ApiResult,
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
    booking_flow::{self, CreatedBooking},
    models::{
        booking::{Booking, BookingFilter, BookingStatus, CreateBooking, UpdateBooking},
        customer::Customer,
        payment::Payment,
    },
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct ChangeStatusRequest {
    pub status: BookingStatus,
}

pub async fn list_bookings(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(mut filter): Query<BookingFilter>,
) -> ApiResult<Json<Vec<Booking>>> {
    let actor = auth.actor();

    let scope = if actor.is_operator() {
        RowScope::new(auth.business_id)
    } else {
        filter.customer_email = Some(auth.email.clone());
        RowScope::new(auth.business_id).with_customer_email(Some(auth.email.clone()))
    };
    authorize(&actor, Table::Bookings, Operation::Select, &scope)?;

    let mut tx = state.begin(&actor).await?;
    let bookings = Booking::list(&mut *tx, auth.business_id, &filter).await?;
    tx.commit().await?;

    Ok(Json(bookings))
}

pub async fn get_booking(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Booking>> {
    let actor = auth.actor();

    let mut tx = state.begin(&actor).await?;

    let access = found(Booking::access(&mut *tx, auth.business_id, id).await?, "Booking")?;
    authorize(&actor, Table::Bookings, Operation::Select, &access.scope())?;

    let booking = found(Booking::find(&mut *tx, auth.business_id, id).await?, "Booking")?;
    tx.commit().await?;

    Ok(Json(booking))
}

pub async fn create_booking(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Json(req): Json<CreateBooking>,
) -> ApiResult<(StatusCode, Json<CreatedBooking>)> {
    let actor = auth.actor();

    let mut tx = state.begin(&actor).await?;
    let created = booking_flow::create_booking(&mut tx, &actor, req, Utc::now()).await?;
    tx.commit().await?;

    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update_booking(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateBooking>,
) -> ApiResult<Json<Booking>> {
    let actor = auth.actor();

    let mut tx = state.begin(&actor).await?;
    let booking = booking_flow::update_booking(&mut tx, &actor, id, req).await?;
    tx.commit().await?;

    Ok(Json(booking))
}

pub async fn change_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<ChangeStatusRequest>,
) -> ApiResult<Json<Booking>> {
    let actor = auth.actor();

    let mut tx = state.begin(&actor).await?;
    let booking =
        booking_flow::change_booking_status(&mut tx, &actor, id, req.status, Utc::now()).await?;
    tx.commit().await?;

    Ok(Json(booking))
}

/// Deletes a booking and its payment
///
/// A paid payment leaves the customer's spend total with it.
pub async fn delete_booking(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let actor = auth.actor();
    authorize(&actor, Table::Bookings, Operation::Delete, &RowScope::new(auth.business_id))?;

    let mut tx = state.begin(&actor).await?;

    let booking = found(
        Booking::find_for_update(&mut *tx, auth.business_id, id).await?,
        "Booking",
    )?;
    if let Some(payment) = Payment::find_by_booking(&mut *tx, auth.business_id, id).await? {
        if payment.status.is_paid() {
            Customer::adjust_spent(
                &mut *tx,
                auth.business_id,
                booking.customer_id,
                -payment.amount_cents,
            )
            .await?;
        }
    }

    let removed = Booking::delete(&mut *tx, auth.business_id, id).await?;
    tx.commit().await?;

    deleted(removed, "Booking", id)?;
    Ok(StatusCode::NO_CONTENT)
}
