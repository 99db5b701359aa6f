/// Customer records
///
/// Customers belong to one business and are matched to customer accounts by
/// email. `visit_count`, `last_visit_at` and `total_spent_cents` are
/// aggregates maintained by [`crate::booking_flow`]; the CRUD inputs here
/// cannot set them.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE customers (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     business_id UUID NOT NULL REFERENCES businesses(id) ON DELETE CASCADE,
///     name VARCHAR(255) NOT NULL,
///     email VARCHAR(255),                      -- unique per business on lower(email)
///     phone VARCHAR(50),
///     notes TEXT,
///     tags TEXT[] NOT NULL DEFAULT '{}',
///     total_spent_cents BIGINT NOT NULL DEFAULT 0,
///     visit_count INTEGER NOT NULL DEFAULT 0,
///     last_visit_at TIMESTAMPTZ,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::{clean_optional, normalize_email};

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Customer {
    pub id: Uuid,
    pub business_id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub notes: Option<String>,
    pub tags: Vec<String>,

    /// Sum of paid payments
    pub total_spent_cents: i64,

    /// Number of bookings made
    pub visit_count: i32,

    /// Latest booking start time
    pub last_visit_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Tags are short labels like "vip" or "prefers-morning"
pub fn validate_tags(tags: &[String]) -> Result<(), ValidationError> {
    if tags.len() > 20 {
        return Err(ValidationError::new("too_many_tags"));
    }
    if tags.iter().any(|t| t.trim().is_empty() || t.len() > 50) {
        return Err(ValidationError::new("invalid_tag"));
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateCustomer {
    #[validate(length(min = 1, max = 255, message = "Customer name is required"))]
    pub name: String,

    #[validate(email)]
    pub email: Option<String>,

    #[validate(length(max = 50))]
    pub phone: Option<String>,

    #[validate(length(max = 5000))]
    pub notes: Option<String>,

    #[serde(default)]
    #[validate(custom(function = "validate_tags"))]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateCustomer {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,

    #[validate(email)]
    pub email: Option<String>,

    #[validate(length(max = 50))]
    pub phone: Option<String>,

    #[validate(length(max = 5000))]
    pub notes: Option<String>,

    #[validate(custom(function = "validate_tags"))]
    pub tags: Option<Vec<String>>,
}

fn clean_tags(tags: Vec<String>) -> Vec<String> {
    let mut cleaned: Vec<String> = tags
        .into_iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect();
    cleaned.sort();
    cleaned.dedup();
    cleaned
}

const COLUMNS: &str = "id, business_id, name, email, phone, notes, tags, total_spent_cents, visit_count, last_visit_at, created_at, updated_at";

impl Customer {
    pub async fn create<'e, E>(
        executor: E,
        business_id: Uuid,
        data: CreateCustomer,
    ) -> Result<Self, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let customer = sqlx::query_as::<_, Customer>(&format!(
            "INSERT INTO customers (business_id, name, email, phone, notes, tags)
             VALUES ($1, $2, $3, $4, $5, $6)
             RETURNING {COLUMNS}"
        ))
        .bind(business_id)
        .bind(data.name.trim().to_string())
        .bind(clean_optional(data.email).map(|e| normalize_email(&e)))
        .bind(clean_optional(data.phone))
        .bind(clean_optional(data.notes))
        .bind(clean_tags(data.tags))
        .fetch_one(executor)
        .await?;

        Ok(customer)
    }

    pub async fn find<'e, E>(
        executor: E,
        business_id: Uuid,
        id: Uuid,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let customer = sqlx::query_as::<_, Customer>(&format!(
            "SELECT {COLUMNS} FROM customers WHERE business_id = $1 AND id = $2"
        ))
        .bind(business_id)
        .bind(id)
        .fetch_optional(executor)
        .await?;

        Ok(customer)
    }

    /// Case-insensitive lookup within one business
    pub async fn find_by_email<'e, E>(
        executor: E,
        business_id: Uuid,
        email: &str,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let customer = sqlx::query_as::<_, Customer>(&format!(
            "SELECT {COLUMNS} FROM customers WHERE business_id = $1 AND lower(email) = $2"
        ))
        .bind(business_id)
        .bind(normalize_email(email))
        .fetch_optional(executor)
        .await?;

        Ok(customer)
    }

    /// Lists customers by name, matching `search` against name, email and phone
    pub async fn list<'e, E>(
        executor: E,
        business_id: Uuid,
        search: Option<&str>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let pattern = search
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", escape_like(s)));

        let customers = sqlx::query_as::<_, Customer>(&format!(
            "SELECT {COLUMNS} FROM customers
             WHERE business_id = $1
               AND ($2::text IS NULL
                    OR name ILIKE $2 OR email ILIKE $2 OR phone ILIKE $2)
             ORDER BY name, created_at
             LIMIT $3 OFFSET $4"
        ))
        .bind(business_id)
        .bind(pattern)
        .bind(limit)
        .bind(offset)
        .fetch_all(executor)
        .await?;

        Ok(customers)
    }

    pub async fn count<'e, E>(executor: E, business_id: Uuid) -> Result<i64, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customers WHERE business_id = $1")
            .bind(business_id)
            .fetch_one(executor)
            .await?;

        Ok(count)
    }

    pub async fn update<'e, E>(
        executor: E,
        business_id: Uuid,
        id: Uuid,
        data: UpdateCustomer,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let mut query = String::from("UPDATE customers SET updated_at = NOW()");
        let mut bind_count = 2;

        for (column, present) in [
            ("name", data.name.is_some()),
            ("email", data.email.is_some()),
            ("phone", data.phone.is_some()),
            ("notes", data.notes.is_some()),
            ("tags", data.tags.is_some()),
        ] {
            if present {
                bind_count += 1;
                query.push_str(&format!(", {} = ${}", column, bind_count));
            }
        }

        query.push_str(&format!(
            " WHERE business_id = $1 AND id = $2 RETURNING {COLUMNS}"
        ));

        let mut q = sqlx::query_as::<_, Customer>(&query)
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
        if let Some(notes) = data.notes {
            q = q.bind(clean_optional(Some(notes)));
        }
        if let Some(tags) = data.tags {
            q = q.bind(clean_tags(tags));
        }

        let customer = q.fetch_optional(executor).await?;
        Ok(customer)
    }

    /// Counts a new booking: one more visit, last visit moves forward only
    pub async fn record_visit<'e, E>(
        executor: E,
        business_id: Uuid,
        id: Uuid,
        visit_at: DateTime<Utc>,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let customer = sqlx::query_as::<_, Customer>(&format!(
            "UPDATE customers
             SET visit_count = visit_count + 1,
                 last_visit_at = GREATEST(COALESCE(last_visit_at, $3), $3),
                 updated_at = NOW()
             WHERE business_id = $1 AND id = $2
             RETURNING {COLUMNS}"
        ))
        .bind(business_id)
        .bind(id)
        .bind(visit_at)
        .fetch_optional(executor)
        .await?;

        Ok(customer)
    }

    /// Adds `delta_cents` (possibly negative) to the spend total, never below zero
    pub async fn adjust_spent<'e, E>(
        executor: E,
        business_id: Uuid,
        id: Uuid,
        delta_cents: i64,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let customer = sqlx::query_as::<_, Customer>(&format!(
            "UPDATE customers
             SET total_spent_cents = GREATEST(total_spent_cents + $3, 0),
                 updated_at = NOW()
             WHERE business_id = $1 AND id = $2
             RETURNING {COLUMNS}"
        ))
        .bind(business_id)
        .bind(id)
        .bind(delta_cents)
        .fetch_optional(executor)
        .await?;

        Ok(customer)
    }

    /// Deletes the customer; their bookings and payments cascade
    pub async fn delete<'e, E>(executor: E, business_id: Uuid, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM customers WHERE business_id = $1 AND id = $2")
            .bind(business_id)
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> CreateCustomer {
        CreateCustomer {
            name: "Ana Lima".to_string(),
            email: Some("ana@example.com".to_string()),
            phone: None,
            notes: None,
            tags: vec!["vip".to_string()],
        }
    }

    #[test]
    fn test_create_customer_validation() {
        assert!(input().validate().is_ok());

        let mut missing_name = input();
        missing_name.name = String::new();
        assert!(missing_name.validate().unwrap_err().field_errors().contains_key("name"));

        let mut bad_email = input();
        bad_email.email = Some("ana-at-example".to_string());
        assert!(bad_email.validate().unwrap_err().field_errors().contains_key("email"));
    }

    #[test]
    fn test_tag_rules() {
        assert!(validate_tags(&[]).is_ok());
        assert!(validate_tags(&["vip".to_string(), "regular".to_string()]).is_ok());
        assert!(validate_tags(&["  ".to_string()]).is_err());
        assert!(validate_tags(&["x".repeat(51)]).is_err());
        assert!(validate_tags(&vec!["t".to_string(); 21]).is_err());

        let mut too_many = input();
        too_many.tags = vec!["t".to_string(); 21];
        assert!(too_many.validate().unwrap_err().field_errors().contains_key("tags"));
    }

    #[test]
    fn test_clean_tags() {
        let tags = clean_tags(vec![
            " VIP ".to_string(),
            "vip".to_string(),
            "".to_string(),
            "morning".to_string(),
        ]);
        assert_eq!(tags, vec!["morning".to_string(), "vip".to_string()]);
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off"), "50\\%\\_off");
        assert_eq!(escape_like("plain"), "plain");
    }
}
