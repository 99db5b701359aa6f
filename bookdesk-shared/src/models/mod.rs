/// Database models
///
/// Every model except [`business::Business`] carries a `business_id`, and
/// every query filters on it. The functions take any executor, so callers
/// pass `&mut *tx` from a scoped transaction (see [`crate::db::scope`]) and
/// row-level security sees the caller.
///
/// # Models
///
/// - `business`: the tenant itself
/// - `user`: owner, staff and customer accounts
/// - `service`: bookable services with duration and price
/// - `staff`: staff profiles and their service assignments
/// - `customer`: customer records with visit/spend aggregates
/// - `booking`: appointments
/// - `payment`: one payment per booking
/// - `booking_settings`: per-business booking rules
/// - `staff_invite`: one-time staff invitation tokens
///
/// # Example
///
/// ```no_run
/// use bookdesk_shared::auth::policy::Actor;
/// use bookdesk_shared::db::scope::begin_scoped;
/// use bookdesk_shared::models::customer::Customer;
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, actor: Actor, business_id: Uuid) -> Result<(), sqlx::Error> {
/// let mut tx = begin_scoped(&pool, &actor).await?;
/// let regulars = Customer::list(&mut *tx, business_id, Some("smith"), 50, 0).await?;
/// tx.commit().await?;
/// # Ok(())
/// # }
/// ```

pub mod booking;
pub mod booking_settings;
pub mod business;
pub mod customer;
pub mod payment;
pub mod service;
pub mod staff;
pub mod staff_invite;
pub mod user;

/// Canonical form for stored and compared emails
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Trims optional text and turns blank values into `None`
pub fn clean_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Clamps list paging parameters to sane bounds
pub fn page_bounds(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = offset.unwrap_or(0).max(0);
    (limit, offset)
}

pub const DEFAULT_PAGE_SIZE: i64 = 50;
pub const MAX_PAGE_SIZE: i64 = 200;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Ana@Example.COM "), "ana@example.com");
    }

    #[test]
    fn test_clean_optional() {
        assert_eq!(clean_optional(Some("  hi ".into())), Some("hi".to_string()));
        assert_eq!(clean_optional(Some("   ".into())), None);
        assert_eq!(clean_optional(None), None);
    }

    #[test]
    fn test_page_bounds() {
        assert_eq!(page_bounds(None, None), (DEFAULT_PAGE_SIZE, 0));
        assert_eq!(page_bounds(Some(0), Some(-5)), (1, 0));
        assert_eq!(page_bounds(Some(10_000), Some(20)), (MAX_PAGE_SIZE, 20));
    }
}
