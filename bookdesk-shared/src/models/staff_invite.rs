/// Staff invitations
///
/// Owners invite a person by email to take over a staff profile. The invite
/// carries a one-time token (see [`crate::auth::token`]); accepting it
/// creates a staff-role user and links it to the profile.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE staff_invites (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     business_id UUID NOT NULL REFERENCES businesses(id) ON DELETE CASCADE,
///     staff_id UUID REFERENCES staff(id) ON DELETE CASCADE,
///     email VARCHAR(255) NOT NULL,
///     token_hash VARCHAR(64) NOT NULL UNIQUE,
///     expires_at TIMESTAMPTZ NOT NULL,
///     used BOOLEAN NOT NULL DEFAULT FALSE,
///     created_by UUID REFERENCES users(id) ON DELETE SET NULL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::normalize_email;
use crate::auth::token::{generate_invite_token, hash_invite_token};

pub const DEFAULT_INVITE_TTL_DAYS: i64 = 7;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct StaffInvite {
    pub id: Uuid,
    pub business_id: Uuid,

    /// Profile the new account is linked to
    pub staff_id: Option<Uuid>,

    pub email: String,

    #[serde(skip_serializing, default)]
    pub token_hash: String,

    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl StaffInvite {
    /// Whether the invite can still be accepted at `now`
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        !self.used && self.expires_at > now
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateStaffInvite {
    pub staff_id: Uuid,

    #[validate(email)]
    pub email: String,

    #[validate(range(min = 1, max = 30))]
    pub ttl_days: Option<i64>,
}

const COLUMNS: &str =
    "id, business_id, staff_id, email, token_hash, expires_at, used, created_by, created_at";

impl StaffInvite {
    /// Stores a new invite and returns it with the plaintext token
    ///
    /// The token is not recoverable afterwards.
    pub async fn create<'e, E>(
        executor: E,
        business_id: Uuid,
        created_by: Option<Uuid>,
        data: &CreateStaffInvite,
    ) -> Result<(Self, String), sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let (token, token_hash) = generate_invite_token();
        let ttl = Duration::days(data.ttl_days.unwrap_or(DEFAULT_INVITE_TTL_DAYS));

        let invite = sqlx::query_as::<_, StaffInvite>(&format!(
            "INSERT INTO staff_invites (business_id, staff_id, email, token_hash, expires_at, created_by)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {COLUMNS}"
        ))
        .bind(business_id)
        .bind(data.staff_id)
        .bind(normalize_email(&data.email))
        .bind(token_hash)
        .bind(Utc::now() + ttl)
        .bind(created_by)
        .fetch_one(executor)
        .await?;

        Ok((invite, token))
    }

    pub async fn list<'e, E>(executor: E, business_id: Uuid) -> Result<Vec<Self>, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let invites = sqlx::query_as::<_, StaffInvite>(&format!(
            "SELECT {COLUMNS} FROM staff_invites WHERE business_id = $1 ORDER BY created_at DESC"
        ))
        .bind(business_id)
        .fetch_all(executor)
        .await?;

        Ok(invites)
    }

    /// Unused, unexpired invite for a plaintext token
    pub async fn find_valid_by_token<'e, E>(
        executor: E,
        token: &str,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let invite = sqlx::query_as::<_, StaffInvite>(&format!(
            "SELECT {COLUMNS} FROM staff_invites
             WHERE token_hash = $1 AND NOT used AND expires_at > NOW()"
        ))
        .bind(hash_invite_token(token))
        .fetch_optional(executor)
        .await?;

        Ok(invite)
    }

    /// Consumes the invite. Returns `None` if it was already used, which
    /// makes concurrent acceptance of one token fail for all but one caller.
    pub async fn mark_used<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let invite = sqlx::query_as::<_, StaffInvite>(&format!(
            "UPDATE staff_invites SET used = TRUE
             WHERE id = $1 AND NOT used
             RETURNING {COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(invite)
    }

    pub async fn delete<'e, E>(executor: E, business_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM staff_invites WHERE business_id = $1 AND id = $2")
            .bind(business_id)
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invite(used: bool, expires_in: Duration) -> StaffInvite {
        StaffInvite {
            id: Uuid::new_v4(),
            business_id: Uuid::new_v4(),
            staff_id: Some(Uuid::new_v4()),
            email: "sam@example.com".to_string(),
            token_hash: hash_invite_token("inv_test"),
            expires_at: Utc::now() + expires_in,
            used,
            created_by: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_is_valid() {
        let now = Utc::now();
        assert!(invite(false, Duration::days(1)).is_valid(now));
        assert!(!invite(true, Duration::days(1)).is_valid(now));
        assert!(!invite(false, Duration::seconds(-1)).is_valid(now));
    }

    #[test]
    fn test_token_hash_not_serialized() {
        let json = serde_json::to_value(invite(false, Duration::days(1))).unwrap();
        assert!(json.get("token_hash").is_none());
        assert_eq!(json["email"], "sam@example.com");
    }

    #[test]
    fn test_create_validation() {
        let ok = CreateStaffInvite {
            staff_id: Uuid::new_v4(),
            email: "sam@example.com".to_string(),
            ttl_days: None,
        };
        assert!(ok.validate().is_ok());

        let bad = CreateStaffInvite {
            email: "not-an-email".to_string(),
            ttl_days: Some(90),
            ..ok
        };
        let errors = bad.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("email"));
        assert!(errors.field_errors().contains_key("ttl_days"));
    }
}
