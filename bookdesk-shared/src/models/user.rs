/// User accounts
///
/// A user belongs to exactly one business and has one role in it. Owners
/// sign up with their business, staff arrive through invites and customers
/// sign up on the public booking page.
///
/// # Schema
///
/// ```sql
/// CREATE TYPE user_role AS ENUM ('owner', 'staff', 'customer');
///
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     business_id UUID NOT NULL REFERENCES businesses(id) ON DELETE CASCADE,
///     email VARCHAR(255) NOT NULL,            -- unique on lower(email)
///     password_hash VARCHAR(255) NOT NULL,
///     name VARCHAR(255),
///     role user_role NOT NULL DEFAULT 'customer',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     last_login_at TIMESTAMPTZ
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use bookdesk_shared::models::user::{CreateUser, User, UserRole};
/// use sqlx::PgPool;
/// use uuid::Uuid;
///
/// # async fn example(pool: PgPool, business_id: Uuid) -> Result<(), sqlx::Error> {
/// let user = User::create(&pool, CreateUser {
///     business_id,
///     email: "Owner@Example.com".to_string(),
///     password_hash: "$argon2id$...".to_string(),
///     name: Some("Olivia".to_string()),
///     role: UserRole::Owner,
/// }).await?;
///
/// // Lookups are case-insensitive
/// let found = User::find_by_email(&pool, "owner@example.com").await?;
/// assert_eq!(found.map(|u| u.id), Some(user.id));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{clean_optional, normalize_email};

/// Role of a user within their business
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "user_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Runs the business: full control
    Owner,

    /// Works bookings and customers
    Staff,

    /// Books appointments for themselves
    Customer,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Owner => "owner",
            UserRole::Staff => "staff",
            UserRole::Customer => "customer",
        }
    }

    fn level(&self) -> u8 {
        match self {
            UserRole::Owner => 3,
            UserRole::Staff => 2,
            UserRole::Customer => 1,
        }
    }

    /// Whether this role is at least as powerful as `required`
    ///
    /// ```
    /// use bookdesk_shared::models::user::UserRole;
    ///
    /// assert!(UserRole::Owner.has_permission(UserRole::Staff));
    /// assert!(!UserRole::Customer.has_permission(UserRole::Staff));
    /// ```
    pub fn has_permission(&self, required: UserRole) -> bool {
        self.level() >= required.level()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub business_id: Uuid,

    /// Stored lowercase
    pub email: String,

    /// Argon2id PHC string, never serialized
    #[serde(skip_serializing, default)]
    pub password_hash: String,

    pub name: Option<String>,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_login_at: Option<DateTime<Utc>>,
}

/// Input for creating a user; the password must already be hashed
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub business_id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub name: Option<String>,
    pub role: UserRole,
}

/// Profile fields a user may change about themselves
#[derive(Debug, Clone, Default)]
pub struct UpdateProfile {
    /// `Some(None)` clears the name
    pub name: Option<Option<String>>,
    pub password_hash: Option<String>,
}

const COLUMNS: &str =
    "id, business_id, email, password_hash, name, role, created_at, updated_at, last_login_at";

impl User {
    /// # Errors
    ///
    /// Fails with a unique violation (`users_email_key`) if the email is taken
    /// by any user, in any business.
    pub async fn create<'e, E>(executor: E, data: CreateUser) -> Result<Self, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (business_id, email, password_hash, name, role)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING {COLUMNS}"
        ))
        .bind(data.business_id)
        .bind(normalize_email(&data.email))
        .bind(data.password_hash)
        .bind(clean_optional(data.name))
        .bind(data.role)
        .fetch_one(executor)
        .await?;

        Ok(user)
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let user = sqlx::query_as::<_, User>(&format!("SELECT {COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(executor)
            .await?;

        Ok(user)
    }

    /// Case-insensitive lookup across all businesses (used by sign-in)
    pub async fn find_by_email<'e, E>(executor: E, email: &str) -> Result<Option<Self>, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {COLUMNS} FROM users WHERE lower(email) = $1"
        ))
        .bind(normalize_email(email))
        .fetch_optional(executor)
        .await?;

        Ok(user)
    }

    pub async fn list_by_business<'e, E>(
        executor: E,
        business_id: Uuid,
        role: Option<UserRole>,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {COLUMNS} FROM users
             WHERE business_id = $1 AND ($2::user_role IS NULL OR role = $2)
             ORDER BY created_at"
        ))
        .bind(business_id)
        .bind(role)
        .fetch_all(executor)
        .await?;

        Ok(users)
    }

    pub async fn update_profile<'e, E>(
        executor: E,
        id: Uuid,
        data: UpdateProfile,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let mut query = String::from("UPDATE users SET updated_at = NOW()");
        let mut bind_count = 1;

        if data.name.is_some() {
            bind_count += 1;
            query.push_str(&format!(", name = ${}", bind_count));
        }
        if data.password_hash.is_some() {
            bind_count += 1;
            query.push_str(&format!(", password_hash = ${}", bind_count));
        }

        query.push_str(&format!(" WHERE id = $1 RETURNING {COLUMNS}"));

        let mut q = sqlx::query_as::<_, User>(&query).bind(id);

        if let Some(name) = data.name {
            q = q.bind(clean_optional(name));
        }
        if let Some(password_hash) = data.password_hash {
            q = q.bind(password_hash);
        }

        let user = q.fetch_optional(executor).await?;
        Ok(user)
    }

    pub async fn update_last_login<'e, E>(executor: E, id: Uuid) -> Result<(), sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(())
    }

    pub async fn delete<'e, E>(executor: E, business_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM users WHERE business_id = $1 AND id = $2")
            .bind(business_id)
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
