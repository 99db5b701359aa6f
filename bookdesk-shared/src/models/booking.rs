/// Bookings
///
/// A booking ties one customer to one service (and optionally one staff
/// member) inside a single business; composite foreign keys on
/// `(business_id, ...)` make a cross-business reference impossible.
/// Creation and status changes that touch other tables go through
/// [`crate::booking_flow`]; this module is the plain table access.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE booking_status AS ENUM ('pending', 'confirmed', 'completed', 'cancelled', 'no_show');
///
/// CREATE TABLE bookings (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     business_id UUID NOT NULL REFERENCES businesses(id) ON DELETE CASCADE,
///     customer_id UUID NOT NULL,           -- (business_id, customer_id) -> customers, cascade
///     service_id UUID NOT NULL,            -- (business_id, service_id) -> services
///     staff_id UUID,                       -- (business_id, staff_id) -> staff
///     start_time TIMESTAMPTZ NOT NULL,
///     end_time TIMESTAMPTZ NOT NULL CHECK (end_time > start_time),
///     status booking_status NOT NULL DEFAULT 'pending',
///     notes TEXT,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::clean_optional;
use crate::auth::policy::RowScope;

/// Booking status
///
/// Flat: any status may follow any other. Who may set which status is
/// decided in [`crate::booking_flow::change_booking_status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "booking_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    #[default]
    Pending,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 5] = [
        BookingStatus::Pending,
        BookingStatus::Confirmed,
        BookingStatus::Completed,
        BookingStatus::Cancelled,
        BookingStatus::NoShow,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Completed => "completed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::NoShow => "no_show",
        }
    }

    /// Whether a booking in this status occupies its time slot
    pub fn blocks_calendar(&self) -> bool {
        !matches!(self, BookingStatus::Cancelled | BookingStatus::NoShow)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Booking {
    pub id: Uuid,
    pub business_id: Uuid,
    pub customer_id: Uuid,
    pub service_id: Uuid,
    pub staff_id: Option<Uuid>,
    pub start_time: DateTime<Utc>,

    /// Always `start_time + service duration` at the time of booking
    pub end_time: DateTime<Utc>,

    pub status: BookingStatus,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Request to book a service
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateBooking {
    pub customer_id: Uuid,
    pub service_id: Uuid,
    pub staff_id: Option<Uuid>,
    pub start_time: DateTime<Utc>,

    /// Defaults to `pending`; customers and visitors cannot choose
    pub status: Option<BookingStatus>,

    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

/// Reschedule or reassign a booking
///
/// `staff_id: Some(None)` unassigns the booking.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateBooking {
    pub service_id: Option<Uuid>,

    #[serde(default, with = "double_option")]
    pub staff_id: Option<Option<Uuid>>,

    pub start_time: Option<DateTime<Utc>>,

    #[validate(length(max = 2000))]
    pub notes: Option<String>,
}

/// Fully resolved row values, produced by the booking flow
#[derive(Debug, Clone)]
pub struct BookingRow {
    pub customer_id: Uuid,
    pub service_id: Uuid,
    pub staff_id: Option<Uuid>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: BookingStatus,
    pub notes: Option<String>,
}

/// List filters, all optional
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookingFilter {
    pub status: Option<BookingStatus>,
    pub staff_id: Option<Uuid>,
    pub customer_id: Option<Uuid>,

    /// Bookings starting at or after this instant
    pub from: Option<DateTime<Utc>>,

    /// Bookings starting before this instant
    pub to: Option<DateTime<Utc>>,

    /// Restricts to the customer records with this email
    #[serde(skip)]
    pub customer_email: Option<String>,

    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Who a booking row belongs to, for policy checks
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct BookingAccess {
    pub business_id: Uuid,
    pub staff_user_id: Option<Uuid>,
    pub customer_email: Option<String>,
}

impl BookingAccess {
    pub fn scope(&self) -> RowScope {
        RowScope::new(self.business_id)
            .with_assigned_staff(self.staff_user_id)
            .with_customer_email(self.customer_email.clone())
    }
}

const COLUMNS: &str = "id, business_id, customer_id, service_id, staff_id, start_time, end_time, status, notes, created_at, updated_at";

impl Booking {
    pub async fn create<'e, E>(
        executor: E,
        business_id: Uuid,
        row: BookingRow,
    ) -> Result<Self, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let booking = sqlx::query_as::<_, Booking>(&format!(
            "INSERT INTO bookings (business_id, customer_id, service_id, staff_id, start_time, end_time, status, notes)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
             RETURNING {COLUMNS}"
        ))
        .bind(business_id)
        .bind(row.customer_id)
        .bind(row.service_id)
        .bind(row.staff_id)
        .bind(row.start_time)
        .bind(row.end_time)
        .bind(row.status)
        .bind(clean_optional(row.notes))
        .fetch_one(executor)
        .await?;

        Ok(booking)
    }

    pub async fn find<'e, E>(
        executor: E,
        business_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let booking = sqlx::query_as::<_, Booking>(&format!(
            "SELECT {COLUMNS} FROM bookings WHERE business_id = $1 AND id = $2"
        ))
        .bind(business_id)
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(booking)
    }

    /// Locks the row for the rest of the transaction
    pub async fn find_for_update<'e, E>(
        executor: E,
        business_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let booking = sqlx::query_as::<_, Booking>(&format!(
            "SELECT {COLUMNS} FROM bookings WHERE business_id = $1 AND id = $2 FOR UPDATE"
        ))
        .bind(business_id)
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(booking)
    }

    pub async fn access<'e, E>(
        executor: E,
        business_id: Uuid,
        id: Uuid,
    ) -> Result<Option<BookingAccess>, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let access = sqlx::query_as::<_, BookingAccess>(
            "SELECT b.business_id, s.user_id AS staff_user_id, c.email AS customer_email
             FROM bookings b
             JOIN customers c ON c.id = b.customer_id
             LEFT JOIN staff s ON s.id = b.staff_id
             WHERE b.business_id = $1 AND b.id = $2",
        )
        .bind(business_id)
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(access)
    }

    /// Lists bookings by start time
    pub async fn list<'e, E>(
        executor: E,
        business_id: Uuid,
        filter: &BookingFilter,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let (limit, offset) = super::page_bounds(filter.limit, filter.offset);

        let bookings = sqlx::query_as::<_, Booking>(&format!(
            "SELECT {COLUMNS} FROM bookings
             WHERE business_id = $1
               AND ($2::booking_status IS NULL OR status = $2)
               AND ($3::uuid IS NULL OR staff_id = $3)
               AND ($4::uuid IS NULL OR customer_id = $4)
               AND ($5::timestamptz IS NULL OR start_time >= $5)
               AND ($6::timestamptz IS NULL OR start_time < $6)
               AND ($7::text IS NULL OR customer_id IN (
                    SELECT id FROM customers WHERE business_id = $1 AND lower(email) = $7))
             ORDER BY start_time, created_at
             LIMIT $8 OFFSET $9"
        ))
        .bind(business_id)
        .bind(filter.status)
        .bind(filter.staff_id)
        .bind(filter.customer_id)
        .bind(filter.from)
        .bind(filter.to)
        .bind(filter.customer_email.as_deref().map(super::normalize_email))
        .bind(limit)
        .bind(offset)
        .fetch_all(executor)
        .await?;

        Ok(bookings)
    }

    /// Serializes calendar writes for `staff_id` until the transaction ends
    pub async fn lock_staff_calendar<'e, E>(executor: E, staff_id: Uuid) -> Result<(), sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1::text))")
            .bind(staff_id)
            .execute(executor)
            .await?;

        Ok(())
    }

    /// Whether `staff_id` has a calendar-blocking booking intersecting
    /// `[start, end)`
    ///
    /// Runs through `staff_slot_taken()`, which sees the whole calendar of
    /// the caller's business even when row-level security hides the other
    /// bookings from the caller.
    pub async fn slot_taken<'e, E>(
        executor: E,
        business_id: Uuid,
        staff_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        exclude_id: Option<Uuid>,
    ) -> Result<bool, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let taken: bool = sqlx::query_scalar("SELECT staff_slot_taken($1, $2, $3, $4, $5)")
            .bind(business_id)
            .bind(staff_id)
            .bind(start)
            .bind(end)
            .bind(exclude_id)
            .fetch_one(executor)
            .await?;

        Ok(taken)
    }

    /// Writes rescheduled values back
    pub async fn reschedule<'e, E>(
        executor: E,
        business_id: Uuid,
        id: Uuid,
        row: &BookingRow,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let booking = sqlx::query_as::<_, Booking>(&format!(
            "UPDATE bookings
             SET service_id = $3, staff_id = $4, start_time = $5, end_time = $6,
                 notes = $7, updated_at = NOW()
             WHERE business_id = $1 AND id = $2
             RETURNING {COLUMNS}"
        ))
        .bind(business_id)
        .bind(id)
        .bind(row.service_id)
        .bind(row.staff_id)
        .bind(row.start_time)
        .bind(row.end_time)
        .bind(row.notes.clone())
        .fetch_optional(executor)
        .await?;

        Ok(booking)
    }

    pub async fn set_status<'e, E>(
        executor: E,
        business_id: Uuid,
        id: Uuid,
        status: BookingStatus,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let booking = sqlx::query_as::<_, Booking>(&format!(
            "UPDATE bookings SET status = $3, updated_at = NOW()
             WHERE business_id = $1 AND id = $2
             RETURNING {COLUMNS}"
        ))
        .bind(business_id)
        .bind(id)
        .bind(status)
        .fetch_optional(executor)
        .await?;

        Ok(booking)
    }

    /// Deletes the booking; its payment cascades
    pub async fn delete<'e, E>(executor: E, business_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM bookings WHERE business_id = $1 AND id = $2")
            .bind(business_id)
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Number of bookings per status
    pub async fn count_by_status<'e, E>(
        executor: E,
        business_id: Uuid,
    ) -> Result<Vec<(BookingStatus, i64)>, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let counts: Vec<(BookingStatus, i64)> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM bookings WHERE business_id = $1 GROUP BY status",
        )
        .bind(business_id)
        .fetch_all(executor)
        .await?;

        Ok(counts)
    }

    /// Calendar-blocking bookings starting in `[from, to)`
    pub async fn count_between<'e, E>(
        executor: E,
        business_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM bookings
             WHERE business_id = $1 AND start_time >= $2 AND start_time < $3
               AND status NOT IN ('cancelled', 'no_show')",
        )
        .bind(business_id)
        .bind(from)
        .bind(to)
        .fetch_one(executor)
        .await?;

        Ok(count)
    }

    /// Next calendar-blocking bookings starting at or after `from`
    pub async fn upcoming<'e, E>(
        executor: E,
        business_id: Uuid,
        from: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let bookings = sqlx::query_as::<_, Booking>(&format!(
            "SELECT {COLUMNS} FROM bookings
             WHERE business_id = $1 AND start_time >= $2
               AND status NOT IN ('cancelled', 'no_show')
             ORDER BY start_time
             LIMIT $3"
        ))
        .bind(business_id)
        .bind(from)
        .bind(limit)
        .fetch_all(executor)
        .await?;

        Ok(bookings)
    }
}

/// Distinguishes an absent field from an explicit `null`
mod double_option {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S, T>(value: &Option<Option<T>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        T: Serialize,
    {
        match value {
            Some(inner) => inner.serialize(serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        Option::<T>::deserialize(deserializer).map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serde() {
        assert_eq!(serde_json::to_string(&BookingStatus::NoShow).unwrap(), "\"no_show\"");
        let status: BookingStatus = serde_json::from_str("\"confirmed\"").unwrap();
        assert_eq!(status, BookingStatus::Confirmed);
        assert!(serde_json::from_str::<BookingStatus>("\"done\"").is_err());

        for status in BookingStatus::ALL {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }

    #[test]
    fn test_blocks_calendar() {
        assert!(BookingStatus::Pending.blocks_calendar());
        assert!(BookingStatus::Confirmed.blocks_calendar());
        assert!(BookingStatus::Completed.blocks_calendar());
        assert!(!BookingStatus::Cancelled.blocks_calendar());
        assert!(!BookingStatus::NoShow.blocks_calendar());
    }

    #[test]
    fn test_update_booking_distinguishes_null_staff() {
        let absent: UpdateBooking = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.staff_id, None);

        let cleared: UpdateBooking = serde_json::from_str(r#"{"staff_id": null}"#).unwrap();
        assert_eq!(cleared.staff_id, Some(None));

        let id = Uuid::new_v4();
        let assigned: UpdateBooking =
            serde_json::from_str(&format!(r#"{{"staff_id": "{}"}}"#, id)).unwrap();
        assert_eq!(assigned.staff_id, Some(Some(id)));
    }

    #[test]
    fn test_access_scope() {
        let business_id = Uuid::new_v4();
        let staff_user = Uuid::new_v4();
        let access = BookingAccess {
            business_id,
            staff_user_id: Some(staff_user),
            customer_email: Some("ana@example.com".to_string()),
        };

        let scope = access.scope();
        assert_eq!(scope.business_id, business_id);
        assert_eq!(scope.assigned_staff_user_id, Some(staff_user));
        assert_eq!(scope.customer_email.as_deref(), Some("ana@example.com"));
        assert!(!scope.through_booking_flow);
    }
}
