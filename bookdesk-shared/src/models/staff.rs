/// Staff profiles
///
/// A staff row exists before its person has an account: owners add staff,
/// then send an invite, and accepting it links `user_id`. `service_ids`
/// lists the services the staff member performs; an empty list means "any".
///
/// # Schema
///
/// ```sql
/// CREATE TABLE staff (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     business_id UUID NOT NULL REFERENCES businesses(id) ON DELETE CASCADE,
///     user_id UUID UNIQUE REFERENCES users(id) ON DELETE SET NULL,
///     name VARCHAR(255) NOT NULL,
///     email VARCHAR(255),
///     phone VARCHAR(50),
///     service_ids UUID[] NOT NULL DEFAULT '{}',
///     active BOOLEAN NOT NULL DEFAULT TRUE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{clean_optional, normalize_email};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Staff {
    pub id: Uuid,
    pub business_id: Uuid,

    /// Linked account, `None` until an invite is accepted
    pub user_id: Option<Uuid>,

    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub service_ids: Vec<Uuid>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Staff {
    /// Whether this staff member performs `service_id`
    ///
    /// ```
    /// # use bookdesk_shared::models::staff::Staff;
    /// # use chrono::Utc;
    /// # use uuid::Uuid;
    /// let haircut = Uuid::new_v4();
    /// let mut staff = Staff {
    ///     id: Uuid::new_v4(), business_id: Uuid::new_v4(), user_id: None,
    ///     name: "Sam".into(), email: None, phone: None,
    ///     service_ids: vec![], active: true,
    ///     created_at: Utc::now(), updated_at: Utc::now(),
    /// };
    /// assert!(staff.performs(haircut));
    ///
    /// staff.service_ids = vec![Uuid::new_v4()];
    /// assert!(!staff.performs(haircut));
    /// ```
    pub fn performs(&self, service_id: Uuid) -> bool {
        self.service_ids.is_empty() || self.service_ids.contains(&service_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateStaff {
    #[validate(length(min = 1, max = 255, message = "Staff name is required"))]
    pub name: String,

    #[validate(email)]
    pub email: Option<String>,

    #[validate(length(max = 50))]
    pub phone: Option<String>,

    #[serde(default)]
    pub service_ids: Vec<Uuid>,

    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateStaff {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,

    #[validate(email)]
    pub email: Option<String>,

    #[validate(length(max = 50))]
    pub phone: Option<String>,

    pub service_ids: Option<Vec<Uuid>>,

    pub active: Option<bool>,
}

impl UpdateStaff {
    /// Fields a staff member may change on their own profile
    pub fn is_self_editable(&self) -> bool {
        self.service_ids.is_none() && self.active.is_none()
    }
}

const COLUMNS: &str =
    "id, business_id, user_id, name, email, phone, service_ids, active, created_at, updated_at";

impl Staff {
    pub async fn create<'e, E>(
        executor: E,
        business_id: Uuid,
        data: CreateStaff,
    ) -> Result<Self, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let staff = sqlx::query_as::<_, Staff>(&format!(
            "INSERT INTO staff (business_id, name, email, phone, service_ids, active)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {COLUMNS}"
        ))
        .bind(business_id)
        .bind(data.name.trim().to_string())
        .bind(clean_optional(data.email).map(|e| normalize_email(&e)))
        .bind(clean_optional(data.phone))
        .bind(dedup(data.service_ids))
        .bind(data.active)
        .fetch_one(executor)
        .await?;

        Ok(staff)
    }

    pub async fn find<'e, E>(
        executor: E,
        business_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let staff = sqlx::query_as::<_, Staff>(&format!(
            "SELECT {COLUMNS} FROM staff WHERE business_id = $1 AND id = $2"
        ))
        .bind(business_id)
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(staff)
    }

    /// Staff profile linked to a user account
    pub async fn find_by_user<'e, E>(
        executor: E,
        business_id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let staff = sqlx::query_as::<_, Staff>(&format!(
            "SELECT {COLUMNS} FROM staff WHERE business_id = $1 AND user_id = $2"
        ))
        .bind(business_id)
        .bind(user_id)
        .fetch_optional(executor)
        .await?;

        Ok(staff)
    }

    pub async fn list<'e, E>(
        executor: E,
        business_id: Uuid,
        active_only: bool,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let staff = sqlx::query_as::<_, Staff>(&format!(
            "SELECT {COLUMNS} FROM staff
             WHERE business_id = $1 AND (NOT $2 OR active)
             ORDER BY name, created_at"
        ))
        .bind(business_id)
        .bind(active_only)
        .fetch_all(executor)
        .await?;

        Ok(staff)
    }

    pub async fn update<'e, E>(
        executor: E,
        business_id: Uuid,
        id: Uuid,
        data: UpdateStaff,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let mut query = String::from("UPDATE staff SET updated_at = NOW()");
        let mut bind_count = 2;

        for (column, present) in [
            ("name", data.name.is_some()),
            ("email", data.email.is_some()),
            ("phone", data.phone.is_some()),
            ("service_ids", data.service_ids.is_some()),
            ("active", data.active.is_some()),
        ] {
            if present {
                bind_count += 1;
                query.push_str(&format!(", {} = ${}", column, bind_count));
            }
        }

        query.push_str(&format!(
            " WHERE business_id = $1 AND id = $2 RETURNING {COLUMNS}"
        ));

        let mut q = sqlx::query_as::<_, Staff>(&query)
            .bind(business_id)
            .bind(id);

        if let Some(name) = data.name {
            q = q.bind(name.trim().to_string());
        }
        if let Some(email) = data.email {
            q = q.bind(clean_optional(Some(email)).map(|e| normalize_email(&e)));
        }
        if let Some(phone) = data.phone {
            q = q.bind(clean_optional(Some(phone)));
        }
        if let Some(service_ids) = data.service_ids {
            q = q.bind(dedup(service_ids));
        }
        if let Some(active) = data.active {
            q = q.bind(active);
        }

        let staff = q.fetch_optional(executor).await?;
        Ok(staff)
    }

    /// Replaces the service assignment list
    pub async fn assign_services<'e, E>(
        executor: E,
        business_id: Uuid,
        id: Uuid,
        service_ids: Vec<Uuid>,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let staff = sqlx::query_as::<_, Staff>(&format!(
            "UPDATE staff SET service_ids = $3, updated_at = NOW()
             WHERE business_id = $1 AND id = $2
             RETURNING {COLUMNS}"
        ))
        .bind(business_id)
        .bind(id)
        .bind(dedup(service_ids))
        .fetch_optional(executor)
        .await?;

        Ok(staff)
    }

    /// Drops `service_id` from every assignment list in the business
    ///
    /// Returns the number of staff profiles changed.
    pub async fn unassign_service<'e, E>(
        executor: E,
        business_id: Uuid,
        service_id: Uuid,
    ) -> Result<u64, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let result = sqlx::query(
            "UPDATE staff SET service_ids = array_remove(service_ids, $2), updated_at = NOW()
             WHERE business_id = $1 AND $2 = ANY(service_ids)",
        )
        .bind(business_id)
        .bind(service_id)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }

    /// Links an accepted invite's new account to the profile
    pub async fn link_user<'e, E>(
        executor: E,
        business_id: Uuid,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let staff = sqlx::query_as::<_, Staff>(&format!(
            "UPDATE staff SET user_id = $3, updated_at = NOW()
             WHERE business_id = $1 AND id = $2
             RETURNING {COLUMNS}"
        ))
        .bind(business_id)
        .bind(id)
        .bind(user_id)
        .fetch_optional(executor)
        .await?;

        Ok(staff)
    }

    /// # Errors
    ///
    /// Fails with a foreign key violation while bookings are assigned to
    /// this staff member.
    pub async fn delete<'e, E>(executor: E, business_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM staff WHERE business_id = $1 AND id = $2")
            .bind(business_id)
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn dedup(mut ids: Vec<Uuid>) -> Vec<Uuid> {
    ids.sort_unstable();
    ids.dedup();
    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_staff_validation() {
        let input = CreateStaff {
            name: "Sam".to_string(),
            email: Some("sam@example.com".to_string()),
            phone: None,
            service_ids: vec![],
            active: true,
        };
        assert!(input.validate().is_ok());

        let invalid = CreateStaff {
            name: String::new(),
            email: Some("nope".to_string()),
            ..input
        };
        let errors = invalid.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("name"));
        assert!(errors.field_errors().contains_key("email"));
    }

    #[test]
    fn test_self_editable_fields() {
        let profile = UpdateStaff {
            name: Some("Sam K.".to_string()),
            phone: Some("555-0100".to_string()),
            ..Default::default()
        };
        assert!(profile.is_self_editable());

        let reassignment = UpdateStaff {
            service_ids: Some(vec![Uuid::new_v4()]),
            ..Default::default()
        };
        assert!(!reassignment.is_self_editable());

        let deactivate = UpdateStaff {
            active: Some(false),
            ..Default::default()
        };
        assert!(!deactivate.is_self_editable());
    }

    #[test]
    fn test_dedup_service_ids() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let ids = dedup(vec![a, b, a, b, a]);
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&a) && ids.contains(&b));
    }
}
