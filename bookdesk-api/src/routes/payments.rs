/// Payments
///
/// - `GET /v1/payments?status=paid&booking_id=..&from=..&to=..`
/// - `GET /v1/payments/:id`
/// - `PUT /v1/payments/:id/status` (owner): `{ "status": "paid", "method": "card" }`
/// - `PUT /v1/payments/:id/amount` (owner, pending payments only)
/// - `DELETE /v1/payments/:id` (owner)
///
/// Payments are created by the booking flow, never directly. Customers see
/// the payments of their own bookings.

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
    booking_flow::{self, PaymentChange},
    models::{
        customer::Customer,
        payment::{Payment, PaymentFilter, PaymentMethod, PaymentStatus},
    },
};
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize)]
pub struct ChangeStatusRequest {
    pub status: PaymentStatus,
    pub method: Option<PaymentMethod>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangeAmountRequest {
    #[validate(range(min = 0, message = "Amount cannot be negative"))]
    pub amount_cents: i64,
}

pub async fn list_payments(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Query(mut filter): Query<PaymentFilter>,
) -> ApiResult<Json<Vec<Payment>>> {
    let actor = auth.actor();

    let scope = if actor.is_operator() {
        RowScope::new(auth.business_id)
    } else {
        filter.customer_email = Some(auth.email.clone());
        RowScope::new(auth.business_id).with_customer_email(Some(auth.email.clone()))
    };
    authorize(&actor, Table::Payments, Operation::Select, &scope)?;

    let mut tx = state.begin(&actor).await?;
    let payments = Payment::list(&mut *tx, auth.business_id, &filter).await?;
    tx.commit().await?;

    Ok(Json(payments))
}

pub async fn get_payment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Payment>> {
    let actor = auth.actor();

    let mut tx = state.begin(&actor).await?;

    let access = found(Payment::access(&mut *tx, auth.business_id, id).await?, "Payment")?;
    authorize(&actor, Table::Payments, Operation::Select, &access.scope())?;

    let payment = found(Payment::find(&mut *tx, auth.business_id, id).await?, "Payment")?;
    tx.commit().await?;

    Ok(Json(payment))
}

pub async fn change_status(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<ChangeStatusRequest>,
) -> ApiResult<Json<PaymentChange>> {
    let actor = auth.actor();

    let mut tx = state.begin(&actor).await?;
    let change =
        booking_flow::change_payment_status(&mut tx, &actor, id, req.status, req.method, Utc::now())
            .await?;
    tx.commit().await?;

    Ok(Json(change))
}

pub async fn change_amount(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
    Json(req): Json<ChangeAmountRequest>,
) -> ApiResult<Json<Payment>> {
    let actor = auth.actor();
    authorize(&actor, Table::Payments, Operation::Update, &RowScope::new(auth.business_id))?;
    req.validate()?;

    let mut tx = state.begin(&actor).await?;

    let existing = found(Payment::find_for_update(&mut *tx, auth.business_id, id).await?, "Payment")?;
    if existing.status != PaymentStatus::Pending {
        return Err(ApiError::Conflict(format!(
            "Cannot change the amount of a {} payment",
            existing.status.as_str()
        )));
    }

    let payment = found(
        Payment::set_amount(&mut *tx, auth.business_id, id, req.amount_cents).await?,
        "Payment",
    )?;
    tx.commit().await?;

    tracing::info!(
        payment_id = %payment.id,
        from = existing.amount_cents,
        to = payment.amount_cents,
        "Payment amount changed"
    );

    Ok(Json(payment))
}

/// Deletes a payment, taking a paid amount back off the customer's total
pub async fn delete_payment(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    let actor = auth.actor();
    authorize(&actor, Table::Payments, Operation::Delete, &RowScope::new(auth.business_id))?;

    let mut tx = state.begin(&actor).await?;

    let payment = found(Payment::find_for_update(&mut *tx, auth.business_id, id).await?, "Payment")?;
    if payment.status.is_paid() {
        let access = found(Payment::access(&mut *tx, auth.business_id, id).await?, "Payment")?;
        Customer::adjust_spent(&mut *tx, auth.business_id, access.customer_id, -payment.amount_cents)
            .await?;
    }

    let removed = Payment::delete(&mut *tx, auth.business_id, id).await?;
    tx.commit().await?;

    deleted(removed, "Payment", id)?;
    Ok(StatusCode::NO_CONTENT)
}
