/// Payments
///
/// Exactly one payment per booking, created together with it. Its amount is
/// the service price, or the deposit share of it when the business requires
/// deposits. No money moves here: the status records what happened at the
/// counter or elsewhere.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE payment_status AS ENUM ('pending', 'paid', 'refunded', 'failed');
/// CREATE TYPE payment_method AS ENUM ('cash', 'card', 'online', 'other');
///
/// CREATE TABLE payments (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     business_id UUID NOT NULL REFERENCES businesses(id) ON DELETE CASCADE,
///     booking_id UUID NOT NULL UNIQUE,      -- (business_id, booking_id) -> bookings, cascade
///     amount_cents BIGINT NOT NULL CHECK (amount_cents >= 0),
///     status payment_status NOT NULL DEFAULT 'pending',
///     method payment_method,
///     paid_at TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::policy::RowScope;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Paid,
    Refunded,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::Failed => "failed",
        }
    }

    pub fn is_paid(&self) -> bool {
        matches!(self, PaymentStatus::Paid)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_method", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Card,
    Online,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub business_id: Uuid,
    pub booking_id: Uuid,
    pub amount_cents: i64,
    pub status: PaymentStatus,
    pub method: Option<PaymentMethod>,

    /// Set while `status` is `paid`
    pub paid_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaymentFilter {
    pub status: Option<PaymentStatus>,
    pub booking_id: Option<Uuid>,

    /// Payments created at or after this instant
    pub from: Option<DateTime<Utc>>,

    /// Payments created before this instant
    pub to: Option<DateTime<Utc>>,

    #[serde(skip)]
    pub customer_email: Option<String>,

    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Payment joined with the customer who owes it
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct PaymentAccess {
    pub business_id: Uuid,
    pub customer_id: Uuid,
    pub customer_email: Option<String>,
}

impl PaymentAccess {
    pub fn scope(&self) -> RowScope {
        RowScope::new(self.business_id).with_customer_email(self.customer_email.clone())
    }
}

const COLUMNS: &str =
    "id, business_id, booking_id, amount_cents, status, method, paid_at, created_at, updated_at";

impl Payment {
    /// Inserts the pending payment for a new booking
    pub async fn create<'e, E>(
        executor: E,
        business_id: Uuid,
        booking_id: Uuid,
        amount_cents: i64,
    ) -> Result<Self, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            "INSERT INTO payments (business_id, booking_id, amount_cents)
             VALUES ($1, $2, $3)
             RETURNING {COLUMNS}"
        ))
        .bind(business_id)
        .bind(booking_id)
        .bind(amount_cents)
        .fetch_one(executor)
        .await?;

        Ok(payment)
    }

    pub async fn find<'e, E>(
        executor: E,
        business_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {COLUMNS} FROM payments WHERE business_id = $1 AND id = $2"
        ))
        .bind(business_id)
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(payment)
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
        let payment = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {COLUMNS} FROM payments WHERE business_id = $1 AND id = $2 FOR UPDATE"
        ))
        .bind(business_id)
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(payment)
    }

    pub async fn find_by_booking<'e, E>(
        executor: E,
        business_id: Uuid,
        booking_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {COLUMNS} FROM payments WHERE business_id = $1 AND booking_id = $2"
        ))
        .bind(business_id)
        .bind(booking_id)
        .fetch_optional(executor)
        .await?;

        Ok(payment)
    }

    pub async fn access<'e, E>(
        executor: E,
        business_id: Uuid,
        id: Uuid,
    ) -> Result<Option<PaymentAccess>, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let access = sqlx::query_as::<_, PaymentAccess>(
            "SELECT p.business_id, c.id AS customer_id, c.email AS customer_email
             FROM payments p
             JOIN bookings b ON b.id = p.booking_id
             JOIN customers c ON c.id = b.customer_id
             WHERE p.business_id = $1 AND p.id = $2",
        )
        .bind(business_id)
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(access)
    }

    /// Lists payments, newest first
    pub async fn list<'e, E>(
        executor: E,
        business_id: Uuid,
        filter: &PaymentFilter,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let (limit, offset) = super::page_bounds(filter.limit, filter.offset);

        let payments = sqlx::query_as::<_, Payment>(&format!(
            "SELECT {COLUMNS} FROM payments
             WHERE business_id = $1
               AND ($2::payment_status IS NULL OR status = $2)
               AND ($3::uuid IS NULL OR booking_id = $3)
               AND ($4::timestamptz IS NULL OR created_at >= $4)
               AND ($5::timestamptz IS NULL OR created_at < $5)
               AND ($6::text IS NULL OR booking_id IN (
                    SELECT b.id FROM bookings b
                    JOIN customers c ON c.id = b.customer_id
                    WHERE b.business_id = $1 AND lower(c.email) = $6))
             ORDER BY created_at DESC
             LIMIT $7 OFFSET $8"
        ))
        .bind(business_id)
        .bind(filter.status)
        .bind(filter.booking_id)
        .bind(filter.from)
        .bind(filter.to)
        .bind(filter.customer_email.as_deref().map(super::normalize_email))
        .bind(limit)
        .bind(offset)
        .fetch_all(executor)
        .await?;

        Ok(payments)
    }

    /// Records a status change; `paid_at` is stamped on entering `paid`
    /// and cleared on leaving it
    pub async fn set_status<'e, E>(
        executor: E,
        business_id: Uuid,
        id: Uuid,
        status: PaymentStatus,
        method: Option<PaymentMethod>,
        now: DateTime<Utc>,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let paid_at = status.is_paid().then_some(now);

        let payment = sqlx::query_as::<_, Payment>(&format!(
            "UPDATE payments
             SET status = $3,
                 method = COALESCE($4, method),
                 paid_at = CASE WHEN $3 = 'paid'::payment_status
                                THEN COALESCE(paid_at, $5) ELSE NULL END,
                 updated_at = NOW()
             WHERE business_id = $1 AND id = $2
             RETURNING {COLUMNS}"
        ))
        .bind(business_id)
        .bind(id)
        .bind(status)
        .bind(method)
        .bind(paid_at)
        .fetch_optional(executor)
        .await?;

        Ok(payment)
    }

    /// Rewrites the amount of a payment that is not yet paid
    pub async fn set_amount<'e, E>(
        executor: E,
        business_id: Uuid,
        id: Uuid,
        amount_cents: i64,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let payment = sqlx::query_as::<_, Payment>(&format!(
            "UPDATE payments SET amount_cents = $3, updated_at = NOW()
             WHERE business_id = $1 AND id = $2 AND status = 'pending'
             RETURNING {COLUMNS}"
        ))
        .bind(business_id)
        .bind(id)
        .bind(amount_cents)
        .fetch_optional(executor)
        .await?;

        Ok(payment)
    }

    pub async fn delete<'e, E>(executor: E, business_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM payments WHERE business_id = $1 AND id = $2")
            .bind(business_id)
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Sum of payments marked paid within `[from, to)`
    pub async fn revenue_between<'e, E>(
        executor: E,
        business_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<i64, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let total: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(amount_cents), 0)::BIGINT FROM payments
             WHERE business_id = $1 AND status = 'paid'
               AND paid_at >= $2 AND paid_at < $3",
        )
        .bind(business_id)
        .bind(from)
        .bind(to)
        .fetch_one(executor)
        .await?;

        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serde() {
        assert_eq!(serde_json::to_string(&PaymentStatus::Refunded).unwrap(), "\"refunded\"");
        let status: PaymentStatus = serde_json::from_str("\"paid\"").unwrap();
        assert!(status.is_paid());
        assert!(!PaymentStatus::Pending.is_paid());
        assert_eq!(PaymentStatus::default(), PaymentStatus::Pending);
    }

    #[test]
    fn test_method_serde() {
        let method: PaymentMethod = serde_json::from_str("\"card\"").unwrap();
        assert_eq!(method, PaymentMethod::Card);
        assert!(serde_json::from_str::<PaymentMethod>("\"crypto\"").is_err());
    }

    #[test]
    fn test_access_scope() {
        let access = PaymentAccess {
            business_id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            customer_email: Some("ana@example.com".to_string()),
        };

        let scope = access.scope();
        assert_eq!(scope.business_id, access.business_id);
        assert_eq!(scope.customer_email.as_deref(), Some("ana@example.com"));
        assert_eq!(scope.assigned_staff_user_id, None);
    }
}
