/// Bookable services
///
/// A service fixes the length of a booking (`duration_minutes`) and the
/// amount its payment starts from (`price_cents`). Inactive services stay in
/// the catalogue for history but are hidden from the public page and cannot
/// be booked.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE services (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     business_id UUID NOT NULL REFERENCES businesses(id) ON DELETE CASCADE,
///     name VARCHAR(100) NOT NULL,
///     description TEXT,
///     duration_minutes INTEGER NOT NULL CHECK (duration_minutes BETWEEN 5 AND 480),
///     price_cents BIGINT NOT NULL CHECK (price_cents >= 0),
///     active BOOLEAN NOT NULL DEFAULT TRUE,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::clean_optional;

pub const MIN_DURATION_MINUTES: i32 = 5;
pub const MAX_DURATION_MINUTES: i32 = 480;
pub const MAX_PRICE_CENTS: i64 = 10_000_000;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Service {
    pub id: Uuid,
    pub business_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub duration_minutes: i32,

    /// Price in the smallest currency unit
    pub price_cents: i64,

    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateService {
    #[validate(length(min = 1, max = 100, message = "Service name is required"))]
    pub name: String,

    #[validate(length(max = 2000))]
    pub description: Option<String>,

    #[validate(range(min = 5, max = 480, message = "Duration must be between 5 and 480 minutes"))]
    pub duration_minutes: i32,

    #[validate(range(min = 0, max = 10_000_000, message = "Price must be between 0 and 100000.00"))]
    pub price_cents: i64,

    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateService {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,

    #[validate(length(max = 2000))]
    pub description: Option<String>,

    #[validate(range(min = 5, max = 480))]
    pub duration_minutes: Option<i32>,

    #[validate(range(min = 0, max = 10_000_000))]
    pub price_cents: Option<i64>,

    pub active: Option<bool>,
}

const COLUMNS: &str = "id, business_id, name, description, duration_minutes, price_cents, active, created_at, updated_at";

impl Service {
    pub async fn create<'e, E>(
        executor: E,
        business_id: Uuid,
        data: CreateService,
    ) -> Result<Self, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let service = sqlx::query_as::<_, Service>(&format!(
            "INSERT INTO services (business_id, name, description, duration_minutes, price_cents, active)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {COLUMNS}"
        ))
        .bind(business_id)
        .bind(data.name.trim().to_string())
        .bind(clean_optional(data.description))
        .bind(data.duration_minutes)
        .bind(data.price_cents)
        .bind(data.active)
        .fetch_one(executor)
        .await?;

        Ok(service)
    }

    pub async fn find<'e, E>(
        executor: E,
        business_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let service = sqlx::query_as::<_, Service>(&format!(
            "SELECT {COLUMNS} FROM services WHERE business_id = $1 AND id = $2"
        ))
        .bind(business_id)
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(service)
    }

    /// Lists services by name, optionally only the active ones
    pub async fn list<'e, E>(
        executor: E,
        business_id: Uuid,
        active_only: bool,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let services = sqlx::query_as::<_, Service>(&format!(
            "SELECT {COLUMNS} FROM services
             WHERE business_id = $1 AND (NOT $2 OR active)
             ORDER BY name, created_at"
        ))
        .bind(business_id)
        .bind(active_only)
        .fetch_all(executor)
        .await?;

        Ok(services)
    }

    /// Ids from `ids` that are services of `business_id`
    pub async fn existing_ids<'e, E>(
        executor: E,
        business_id: Uuid,
        ids: &[Uuid],
    ) -> Result<Vec<Uuid>, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let found: Vec<Uuid> =
            sqlx::query_scalar("SELECT id FROM services WHERE business_id = $1 AND id = ANY($2)")
                .bind(business_id)
                .bind(ids.to_vec())
                .fetch_all(executor)
                .await?;

        Ok(found)
    }

    pub async fn update<'e, E>(
        executor: E,
        business_id: Uuid,
        id: Uuid,
        data: UpdateService,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let mut query = String::from("UPDATE services SET updated_at = NOW()");
        let mut bind_count = 2;

        for (column, present) in [
            ("name", data.name.is_some()),
            ("description", data.description.is_some()),
            ("duration_minutes", data.duration_minutes.is_some()),
            ("price_cents", data.price_cents.is_some()),
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

        let mut q = sqlx::query_as::<_, Service>(&query)
            .bind(business_id)
            .bind(id);

        if let Some(name) = data.name {
            q = q.bind(name.trim().to_string());
        }
        if let Some(description) = data.description {
            q = q.bind(clean_optional(Some(description)));
        }
        if let Some(duration) = data.duration_minutes {
            q = q.bind(duration);
        }
        if let Some(price) = data.price_cents {
            q = q.bind(price);
        }
        if let Some(active) = data.active {
            q = q.bind(active);
        }

        let service = q.fetch_optional(executor).await?;
        Ok(service)
    }

    /// # Errors
    ///
    /// Fails with a foreign key violation while bookings still reference
    /// the service; deactivate it instead.
    pub async fn delete<'e, E>(executor: E, business_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM services WHERE business_id = $1 AND id = $2")
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

    fn haircut() -> CreateService {
        CreateService {
            name: "Haircut".to_string(),
            description: None,
            duration_minutes: 30,
            price_cents: 2500,
            active: true,
        }
    }

    #[test]
    fn test_valid_service() {
        assert!(haircut().validate().is_ok());
    }

    #[test]
    fn test_duration_range() {
        for (minutes, ok) in [(4, false), (5, true), (480, true), (481, false), (0, false)] {
            let mut input = haircut();
            input.duration_minutes = minutes;
            assert_eq!(input.validate().is_ok(), ok, "duration {}", minutes);
        }
    }

    #[test]
    fn test_price_range() {
        for (cents, ok) in [(-1, false), (0, true), (MAX_PRICE_CENTS, true), (MAX_PRICE_CENTS + 1, false)] {
            let mut input = haircut();
            input.price_cents = cents;
            assert_eq!(input.validate().is_ok(), ok, "price {}", cents);
        }
    }

    #[test]
    fn test_name_required() {
        let mut input = haircut();
        input.name = String::new();
        let errors = input.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("name"));
    }

    #[test]
    fn test_update_validation_only_checks_present_fields() {
        assert!(UpdateService::default().validate().is_ok());

        let update = UpdateService {
            duration_minutes: Some(1000),
            ..Default::default()
        };
        assert!(update.validate().is_err());
    }

    #[test]
    fn test_active_defaults_to_true() {
        let input: CreateService =
            serde_json::from_str(r#"{"name":"Beard trim","duration_minutes":15,"price_cents":1200}"#)
                .unwrap();
        assert!(input.active);
    }
}
