/// Tenant-scoped transactions
///
/// Row-level security policies read the caller from three transaction-local
/// settings: `app.user_id`, `app.business_id` and `app.role`. Every
/// request-driven query runs inside a transaction opened here, so the
/// settings are in place before the first statement and vanish on commit or
/// rollback. A pooled connection never carries one caller's identity into
/// the next request.
///
/// # Example
///
/// ```no_run
/// use bookdesk_shared::auth::policy::Actor;
/// use bookdesk_shared::db::scope::begin_scoped;
/// use bookdesk_shared::models::service::Service;
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, business_id: Uuid) -> Result<(), sqlx::Error> {
/// let mut tx = begin_scoped(&pool, &Actor::anonymous(business_id)).await?;
/// let services = Service::list(&mut *tx, business_id, true).await?;
/// tx.commit().await?;
/// # Ok(())
/// # }
/// ```

use sqlx::{PgConnection, PgPool, Postgres, Transaction};

use crate::auth::policy::Actor;

/// Setting names read by the SQL helper functions
pub const USER_ID_SETTING: &str = "app.user_id";
pub const BUSINESS_ID_SETTING: &str = "app.business_id";
pub const ROLE_SETTING: &str = "app.role";

/// Email a visitor is booking under, set by the public booking flow
pub const FLOW_EMAIL_SETTING: &str = "app.customer_email";

/// Values the actor maps to, in `(user_id, business_id, role)` order
///
/// Missing ids become empty strings, which the SQL helpers read as NULL.
pub fn session_settings(actor: &Actor) -> (String, String, &'static str) {
    let user_id = actor.user_id().map(|id| id.to_string()).unwrap_or_default();
    let business_id = actor
        .business_id()
        .map(|id| id.to_string())
        .unwrap_or_default();

    (user_id, business_id, actor.role_name())
}

/// Applies the actor's identity to the current transaction
///
/// The settings are transaction-local; calling this outside a transaction
/// has no lasting effect.
pub async fn apply_actor(conn: &mut PgConnection, actor: &Actor) -> Result<(), sqlx::Error> {
    let (user_id, business_id, role) = session_settings(actor);

    sqlx::query(
        "SELECT set_config($1, $2, true), set_config($3, $4, true), set_config($5, $6, true)",
    )
    .bind(USER_ID_SETTING)
    .bind(user_id)
    .bind(BUSINESS_ID_SETTING)
    .bind(business_id)
    .bind(ROLE_SETTING)
    .bind(role)
    .execute(conn)
    .await?;

    tracing::trace!(role, "Applied row-level security scope");
    Ok(())
}

/// Narrows an anonymous transaction to the customer with `email`
///
/// Visitors can only read and update the customer record, bookings and
/// payments matching this email for the rest of the transaction.
pub async fn apply_flow_email(conn: &mut PgConnection, email: &str) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT set_config($1, $2, true)")
        .bind(FLOW_EMAIL_SETTING)
        .bind(email)
        .execute(conn)
        .await?;

    Ok(())
}

/// Begins a transaction scoped to `actor`
pub async fn begin_scoped(
    pool: &PgPool,
    actor: &Actor,
) -> Result<Transaction<'static, Postgres>, sqlx::Error> {
    let mut tx = pool.begin().await?;
    apply_actor(&mut tx, actor).await?;
    Ok(tx)
}
