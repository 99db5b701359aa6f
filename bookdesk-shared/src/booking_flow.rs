/// Booking flow
///
/// Multi-table operations that must succeed or fail together: creating a
/// booking also creates its payment and moves the customer's aggregates,
/// and payment status changes move the customer's spend total.
///
/// Every function takes the connection of a scoped transaction (see
/// [`crate::db::scope::begin_scoped`]) opened for the same actor that is
/// passed in. Nothing here commits; the caller commits on `Ok` and the
/// transaction rolls back on drop otherwise.
///
/// # Rules
///
/// - Customers and visitors book at least `min_lead_time_minutes` ahead and
///   at most `max_advance_days` ahead; owners and staff may book anywhere
/// - With `prevent_overlaps`, a staff member cannot hold two calendar-blocking
///   bookings that intersect
/// - Customers may only cancel their own bookings, and not within
///   `cancellation_window_hours` of the start
/// - Entering `paid` adds the payment amount to the customer's
///   `total_spent_cents`; leaving `paid` takes it back out
///
/// # Example
///
/// ```no_run
/// use bookdesk_shared::auth::policy::Actor;
/// use bookdesk_shared::booking_flow::{create_booking, FlowError};
/// use bookdesk_shared::db::scope::begin_scoped;
/// use bookdesk_shared::models::booking::CreateBooking;
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool, actor: Actor, input: CreateBooking) -> Result<(), FlowError> {
/// let mut tx = begin_scoped(&pool, &actor).await?;
/// let created = create_booking(&mut tx, &actor, input, chrono::Utc::now()).await?;
/// tx.commit().await?;
///
/// println!("booked {} for {} cents", created.booking.id, created.payment.amount_cents);
/// # Ok(())
/// # }
/// ```

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use uuid::Uuid;
use validator::Validate;

use crate::auth::authorization::{authorize, require_operator, AuthzError};
use crate::auth::policy::{Actor, Operation, RowScope, Table};
use crate::db::scope::apply_flow_email;
use crate::models::booking::{Booking, BookingRow, BookingStatus, CreateBooking, UpdateBooking};
use crate::models::booking_settings::BookingSettings;
use crate::models::business::Business;
use crate::models::customer::{CreateCustomer, Customer};
use crate::models::payment::{Payment, PaymentMethod, PaymentStatus};
use crate::models::service::Service;
use crate::models::staff::Staff;
use crate::models::user::UserRole;
use crate::models::{clean_optional, normalize_email};

/// Number of upcoming bookings shown on the dashboard
pub const DASHBOARD_UPCOMING_LIMIT: i64 = 10;

#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("Service is not active")]
    InactiveService,

    #[error("Staff member is not active")]
    InactiveStaff,

    #[error("Staff member does not perform this service")]
    StaffNotQualified,

    #[error("Bookings must be made at least {0} minutes in advance")]
    LeadTime(i32),

    #[error("Bookings can be made at most {0} days in advance")]
    TooFarAhead(i32),

    #[error("Staff member already has a booking at this time")]
    Overlap,

    #[error("Start time is out of range")]
    StartTimeOutOfRange,

    #[error("Bookings cannot be cancelled within {0} hours of the start")]
    CancellationWindow(i32),

    #[error("Not allowed to set status {0}")]
    StatusNotAllowed(&'static str),

    #[error(transparent)]
    Authz(#[from] AuthzError),

    #[error("Validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Everything [`create_booking`] wrote
#[derive(Debug, Clone, Serialize)]
pub struct CreatedBooking {
    pub booking: Booking,
    pub payment: Payment,
    pub customer: Customer,
}

/// Result of a payment status change
#[derive(Debug, Clone, Serialize)]
pub struct PaymentChange {
    pub payment: Payment,

    /// Customer after the spend adjustment, when one was made
    pub customer: Option<Customer>,
}

/// Booking request from the public page
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PublicBookingRequest {
    #[validate(length(min = 1, max = 255, message = "Name is required"))]
    pub name: String,

    #[validate(email)]
    pub email: String,

    #[validate(length(max = 50))]
    pub phone: Option<String>,

    pub service_id: Uuid,
    pub staff_id: Option<Uuid>,
    pub start_time: DateTime<Utc>,

    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardSummary {
    /// Every status, zero-filled
    pub bookings_by_status: BTreeMap<String, i64>,

    /// Calendar-blocking bookings starting today (UTC)
    pub bookings_today: i64,

    pub upcoming: Vec<Booking>,

    /// Paid payments with `paid_at` in the current month (UTC)
    pub revenue_this_month_cents: i64,

    pub customer_count: i64,
}

/// Rejects start times outside the customer booking window
pub fn check_booking_window(
    settings: &BookingSettings,
    start: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<(), FlowError> {
    let earliest = now + Duration::minutes(i64::from(settings.min_lead_time_minutes));
    if start < earliest {
        return Err(FlowError::LeadTime(settings.min_lead_time_minutes));
    }

    let latest = now + Duration::days(i64::from(settings.max_advance_days));
    if start > latest {
        return Err(FlowError::TooFarAhead(settings.max_advance_days));
    }

    Ok(())
}

/// Rejects customer cancellations inside the cancellation window
pub fn check_cancellation_window(
    settings: &BookingSettings,
    start: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Result<(), FlowError> {
    let deadline = start
        .checked_sub_signed(Duration::hours(i64::from(settings.cancellation_window_hours)))
        .ok_or(FlowError::StartTimeOutOfRange)?;
    if now > deadline {
        return Err(FlowError::CancellationWindow(settings.cancellation_window_hours));
    }
    Ok(())
}

/// End of a booking that starts at `start` and lasts `duration_minutes`
pub fn booking_end(start: DateTime<Utc>, duration_minutes: i32) -> Result<DateTime<Utc>, FlowError> {
    start
        .checked_add_signed(Duration::minutes(i64::from(duration_minutes)))
        .ok_or(FlowError::StartTimeOutOfRange)
}

/// Change in a customer's spend total when a payment moves between statuses
///
/// ```
/// use bookdesk_shared::booking_flow::spend_delta;
/// use bookdesk_shared::models::payment::PaymentStatus;
///
/// assert_eq!(spend_delta(PaymentStatus::Pending, PaymentStatus::Paid, 2500), 2500);
/// assert_eq!(spend_delta(PaymentStatus::Paid, PaymentStatus::Refunded, 2500), -2500);
/// assert_eq!(spend_delta(PaymentStatus::Paid, PaymentStatus::Paid, 2500), 0);
/// ```
pub fn spend_delta(from: PaymentStatus, to: PaymentStatus, amount_cents: i64) -> i64 {
    match (from.is_paid(), to.is_paid()) {
        (false, true) => amount_cents,
        (true, false) => -amount_cents,
        _ => 0,
    }
}

/// `[start of today, start of tomorrow)` in UTC
pub fn day_bounds(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let today = now.date_naive();
    let start = midnight(today).unwrap_or(now);
    (start, start + Duration::days(1))
}

/// `[first of this month, first of next month)` in UTC
pub fn month_bounds(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let (year, month) = (now.year(), now.month());
    let (next_year, next_month) = if month == 12 { (year + 1, 1) } else { (year, month + 1) };

    let start = NaiveDate::from_ymd_opt(year, month, 1).and_then(midnight);
    let end = NaiveDate::from_ymd_opt(next_year, next_month, 1).and_then(midnight);

    match (start, end) {
        (Some(start), Some(end)) => (start, end),
        _ => day_bounds(now),
    }
}

fn midnight(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0)
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn actor_business(actor: &Actor) -> Result<Uuid, FlowError> {
    actor
        .business_id()
        .ok_or(FlowError::Authz(AuthzError::NotMember))
}

/// Loads a staff member who can take a booking for `service_id`
async fn load_staff(
    conn: &mut PgConnection,
    business_id: Uuid,
    staff_id: Uuid,
    service_id: Uuid,
) -> Result<Staff, FlowError> {
    let staff = Staff::find(&mut *conn, business_id, staff_id)
        .await?
        .ok_or(FlowError::NotFound("Staff member"))?;

    if !staff.active {
        return Err(FlowError::InactiveStaff);
    }
    if !staff.performs(service_id) {
        return Err(FlowError::StaffNotQualified);
    }

    Ok(staff)
}

async fn ensure_no_overlap(
    conn: &mut PgConnection,
    settings: &BookingSettings,
    staff_id: Option<Uuid>,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    exclude_id: Option<Uuid>,
) -> Result<(), FlowError> {
    let Some(staff_id) = staff_id else {
        return Ok(());
    };
    if !settings.prevent_overlaps {
        return Ok(());
    }

    // Held until commit, so concurrent bookings for this staff member queue here
    Booking::lock_staff_calendar(&mut *conn, staff_id).await?;

    let taken =
        Booking::slot_taken(&mut *conn, settings.business_id, staff_id, start, end, exclude_id)
            .await?;

    if taken {
        tracing::debug!(staff_id = %staff_id, %start, %end, "Booking overlaps existing bookings");
        return Err(FlowError::Overlap);
    }

    Ok(())
}

/// Books a service for a customer
///
/// Writes the booking, its pending payment and the customer's visit
/// aggregates.
///
/// # Errors
///
/// - `NotFound` when the customer, service or staff member is not in the
///   actor's business (or not visible to the actor)
/// - `InactiveService`, `InactiveStaff`, `StaffNotQualified`
/// - `LeadTime`, `TooFarAhead` for customers and visitors
/// - `Overlap` when the business prevents overlaps
/// - `StatusNotAllowed` when a customer or visitor picks a status other
///   than `pending`
pub async fn create_booking(
    conn: &mut PgConnection,
    actor: &Actor,
    input: CreateBooking,
    now: DateTime<Utc>,
) -> Result<CreatedBooking, FlowError> {
    input.validate()?;
    let business_id = actor_business(actor)?;

    authorize(
        actor,
        Table::Bookings,
        Operation::Insert,
        &RowScope::new(business_id).in_booking_flow(),
    )?;

    let customer = Customer::find(&mut *conn, business_id, input.customer_id)
        .await?
        .ok_or(FlowError::NotFound("Customer"))?;

    // Visitors reach here only after the customer was matched by email.
    let customer_scope = RowScope::new(business_id).with_customer_email(customer.email.clone());
    let customer_scope = match actor {
        Actor::Anonymous { .. } => customer_scope.in_booking_flow(),
        _ => customer_scope,
    };
    authorize(actor, Table::Customers, Operation::Select, &customer_scope)?;

    let service = Service::find(&mut *conn, business_id, input.service_id)
        .await?
        .ok_or(FlowError::NotFound("Service"))?;
    if !service.active {
        return Err(FlowError::InactiveService);
    }

    if let Some(staff_id) = input.staff_id {
        load_staff(conn, business_id, staff_id, service.id).await?;
    }

    let start_time = input.start_time;
    let end_time = booking_end(start_time, service.duration_minutes)?;

    let settings = BookingSettings::get_or_default(&mut *conn, business_id).await?;

    let status = if actor.is_operator() {
        input.status.unwrap_or_default()
    } else {
        check_booking_window(&settings, start_time, now)?;
        match input.status {
            None | Some(BookingStatus::Pending) => BookingStatus::Pending,
            Some(other) => return Err(FlowError::StatusNotAllowed(other.as_str())),
        }
    };

    ensure_no_overlap(conn, &settings, input.staff_id, start_time, end_time, None).await?;

    let booking = Booking::create(
        &mut *conn,
        business_id,
        BookingRow {
            customer_id: customer.id,
            service_id: service.id,
            staff_id: input.staff_id,
            start_time,
            end_time,
            status,
            notes: input.notes,
        },
    )
    .await?;

    authorize(
        actor,
        Table::Payments,
        Operation::Insert,
        &RowScope::new(business_id).in_booking_flow(),
    )?;
    let amount_cents = settings.amount_due(service.price_cents);
    let payment = Payment::create(&mut *conn, business_id, booking.id, amount_cents).await?;

    authorize(
        actor,
        Table::Customers,
        Operation::Update,
        &RowScope::new(business_id)
            .with_customer_email(customer.email.clone())
            .in_booking_flow(),
    )?;
    let customer = Customer::record_visit(&mut *conn, business_id, customer.id, start_time)
        .await?
        .ok_or(FlowError::NotFound("Customer"))?;

    tracing::info!(
        booking_id = %booking.id,
        business_id = %business_id,
        customer_id = %customer.id,
        service_id = %service.id,
        amount_cents = amount_cents,
        actor = actor.role_name(),
        "Booking created"
    );

    Ok(CreatedBooking {
        booking,
        payment,
        customer,
    })
}

/// Reschedules or reassigns a booking (owners and staff)
///
/// The end time is recomputed from the (possibly new) service duration.
pub async fn update_booking(
    conn: &mut PgConnection,
    actor: &Actor,
    booking_id: Uuid,
    input: UpdateBooking,
) -> Result<Booking, FlowError> {
    input.validate()?;
    require_operator(actor)?;
    let business_id = actor_business(actor)?;

    let access = Booking::access(&mut *conn, business_id, booking_id)
        .await?
        .ok_or(FlowError::NotFound("Booking"))?;
    authorize(actor, Table::Bookings, Operation::Update, &access.scope())?;

    let booking = Booking::find_for_update(&mut *conn, business_id, booking_id)
        .await?
        .ok_or(FlowError::NotFound("Booking"))?;

    let service_id = input.service_id.unwrap_or(booking.service_id);
    let service = Service::find(&mut *conn, business_id, service_id)
        .await?
        .ok_or(FlowError::NotFound("Service"))?;
    if service.id != booking.service_id && !service.active {
        return Err(FlowError::InactiveService);
    }

    let staff_id = input.staff_id.unwrap_or(booking.staff_id);
    if let Some(staff_id) = staff_id {
        if Some(staff_id) != booking.staff_id || service.id != booking.service_id {
            load_staff(conn, business_id, staff_id, service.id).await?;
        }
    }

    let start_time = input.start_time.unwrap_or(booking.start_time);
    let end_time = booking_end(start_time, service.duration_minutes)?;

    if booking.status.blocks_calendar() {
        let settings = BookingSettings::get_or_default(&mut *conn, business_id).await?;
        ensure_no_overlap(conn, &settings, staff_id, start_time, end_time, Some(booking.id))
            .await?;
    }

    let notes = match input.notes {
        Some(notes) => clean_optional(Some(notes)),
        None => booking.notes,
    };

    let row = BookingRow {
        customer_id: booking.customer_id,
        service_id: service.id,
        staff_id,
        start_time,
        end_time,
        status: booking.status,
        notes,
    };

    let updated = Booking::reschedule(&mut *conn, business_id, booking.id, &row)
        .await?
        .ok_or(FlowError::NotFound("Booking"))?;

    tracing::info!(
        booking_id = %updated.id,
        start_time = %updated.start_time,
        staff_id = ?updated.staff_id,
        "Booking rescheduled"
    );

    Ok(updated)
}

/// Sets a booking's status
///
/// Owners may set any status, staff any status on bookings assigned to
/// them. Customers may only cancel their own bookings, outside the
/// cancellation window.
pub async fn change_booking_status(
    conn: &mut PgConnection,
    actor: &Actor,
    booking_id: Uuid,
    status: BookingStatus,
    now: DateTime<Utc>,
) -> Result<Booking, FlowError> {
    let business_id = actor_business(actor)?;

    let access = Booking::access(&mut *conn, business_id, booking_id)
        .await?
        .ok_or(FlowError::NotFound("Booking"))?;
    authorize(actor, Table::Bookings, Operation::Update, &access.scope())?;

    let booking = Booking::find_for_update(&mut *conn, business_id, booking_id)
        .await?
        .ok_or(FlowError::NotFound("Booking"))?;

    if actor.role() == Some(UserRole::Customer) {
        if status != BookingStatus::Cancelled {
            return Err(FlowError::StatusNotAllowed(status.as_str()));
        }
        let settings = BookingSettings::get_or_default(&mut *conn, business_id).await?;
        check_cancellation_window(&settings, booking.start_time, now)?;
    }

    let updated = Booking::set_status(&mut *conn, business_id, booking.id, status)
        .await?
        .ok_or(FlowError::NotFound("Booking"))?;

    tracing::info!(
        booking_id = %updated.id,
        from = booking.status.as_str(),
        to = updated.status.as_str(),
        actor = actor.role_name(),
        "Booking status changed"
    );

    Ok(updated)
}

/// Sets a payment's status and keeps the customer's spend total in step
pub async fn change_payment_status(
    conn: &mut PgConnection,
    actor: &Actor,
    payment_id: Uuid,
    status: PaymentStatus,
    method: Option<PaymentMethod>,
    now: DateTime<Utc>,
) -> Result<PaymentChange, FlowError> {
    let business_id = actor_business(actor)?;

    let access = Payment::access(&mut *conn, business_id, payment_id)
        .await?
        .ok_or(FlowError::NotFound("Payment"))?;
    authorize(actor, Table::Payments, Operation::Update, &access.scope())?;

    let current = Payment::find_for_update(&mut *conn, business_id, payment_id)
        .await?
        .ok_or(FlowError::NotFound("Payment"))?;

    let payment = Payment::set_status(&mut *conn, business_id, payment_id, status, method, now)
        .await?
        .ok_or(FlowError::NotFound("Payment"))?;

    let delta = spend_delta(current.status, payment.status, current.amount_cents);
    let customer = if delta != 0 {
        authorize(
            actor,
            Table::Customers,
            Operation::Update,
            &access.scope().in_booking_flow(),
        )?;
        Customer::adjust_spent(&mut *conn, business_id, access.customer_id, delta).await?
    } else {
        None
    };

    tracing::info!(
        payment_id = %payment.id,
        from = current.status.as_str(),
        to = payment.status.as_str(),
        spend_delta = delta,
        "Payment status changed"
    );

    Ok(PaymentChange { payment, customer })
}

/// Books from the public page
///
/// `conn` must be scoped to `Actor::anonymous(business.id)`. The customer
/// is matched by email inside the business and created when missing.
pub async fn public_booking(
    conn: &mut PgConnection,
    business: &Business,
    request: PublicBookingRequest,
    now: DateTime<Utc>,
) -> Result<CreatedBooking, FlowError> {
    request.validate()?;
    let actor = Actor::anonymous(business.id);
    let email = normalize_email(&request.email);

    let lookup_scope = RowScope::new(business.id)
        .with_customer_email(Some(email.clone()))
        .in_booking_flow();
    authorize(&actor, Table::Customers, Operation::Select, &lookup_scope)?;

    // Row-level security shows visitors this one customer and nothing else
    apply_flow_email(&mut *conn, &email).await?;

    let customer = match Customer::find_by_email(&mut *conn, business.id, &email).await? {
        Some(customer) => customer,
        None => {
            authorize(&actor, Table::Customers, Operation::Insert, &lookup_scope)?;
            let created = Customer::create(
                &mut *conn,
                business.id,
                CreateCustomer {
                    name: request.name.clone(),
                    email: Some(email.clone()),
                    phone: request.phone.clone(),
                    notes: None,
                    tags: Vec::new(),
                },
            )
            .await?;

            tracing::info!(
                customer_id = %created.id,
                business_id = %business.id,
                "Customer created from public booking"
            );
            created
        }
    };

    create_booking(
        conn,
        &actor,
        CreateBooking {
            customer_id: customer.id,
            service_id: request.service_id,
            staff_id: request.staff_id,
            start_time: request.start_time,
            status: None,
            notes: request.notes,
        },
        now,
    )
    .await
}

/// Numbers for the admin dashboard (owners and staff)
pub async fn dashboard_summary(
    conn: &mut PgConnection,
    actor: &Actor,
    now: DateTime<Utc>,
) -> Result<DashboardSummary, FlowError> {
    let member = require_operator(actor)?;
    let business_id = member.business_id;

    let mut bookings_by_status: BTreeMap<String, i64> = BookingStatus::ALL
        .iter()
        .map(|status| (status.as_str().to_string(), 0))
        .collect();
    for (status, count) in Booking::count_by_status(&mut *conn, business_id).await? {
        bookings_by_status.insert(status.as_str().to_string(), count);
    }

    let (today_start, today_end) = day_bounds(now);
    let bookings_today = Booking::count_between(&mut *conn, business_id, today_start, today_end).await?;

    let upcoming =
        Booking::upcoming(&mut *conn, business_id, now, DASHBOARD_UPCOMING_LIMIT).await?;

    let (month_start, month_end) = month_bounds(now);
    let revenue_this_month_cents =
        Payment::revenue_between(&mut *conn, business_id, month_start, month_end).await?;

    let customer_count = Customer::count(&mut *conn, business_id).await?;

    Ok(DashboardSummary {
        bookings_by_status,
        bookings_today,
        upcoming,
        revenue_this_month_cents,
        customer_count,
    })
}
