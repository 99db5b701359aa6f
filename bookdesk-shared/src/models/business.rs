/// Business model
///
/// A business is the tenant: every other row points at one. Its slug names
/// the public booking page (`/v1/public/{slug}`).
///
/// # Schema
///
/// ```sql
/// CREATE TABLE businesses (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     slug VARCHAR(63) NOT NULL UNIQUE,
///     name VARCHAR(255) NOT NULL,
///     business_type business_type NOT NULL DEFAULT 'other',
///     email VARCHAR(255),
///     phone VARCHAR(50),
///     address TEXT,
///     timezone VARCHAR(64) NOT NULL DEFAULT 'UTC',
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use bookdesk_shared::models::business::{Business, BusinessType, CreateBusiness};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), sqlx::Error> {
/// let business = Business::create(&pool, CreateBusiness {
///     slug: "north-end-barbers".to_string(),
///     name: "North End Barbers".to_string(),
///     business_type: BusinessType::Barbershop,
///     email: None,
///     phone: None,
///     address: None,
///     timezone: None,
/// }).await?;
///
/// let found = Business::find_by_slug(&pool, "north-end-barbers").await?;
/// assert_eq!(found.map(|b| b.id), Some(business.id));
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use super::{clean_optional, normalize_email};

/// Kind of business, shown on the public page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "business_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum BusinessType {
    Salon,
    Barbershop,
    Spa,
    Clinic,
    Fitness,
    #[default]
    Other,
}

impl BusinessType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BusinessType::Salon => "salon",
            BusinessType::Barbershop => "barbershop",
            BusinessType::Spa => "spa",
            BusinessType::Clinic => "clinic",
            BusinessType::Fitness => "fitness",
            BusinessType::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Business {
    pub id: Uuid,

    /// URL-safe identifier, unique across all businesses
    pub slug: String,

    pub name: String,
    pub business_type: BusinessType,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,

    /// IANA zone name used when presenting times
    pub timezone: String,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Slug rules: 3-63 characters of `[a-z0-9-]`, no hyphen at either end
///
/// ```
/// use bookdesk_shared::models::business::validate_slug;
///
/// assert!(validate_slug("studio-9").is_ok());
/// assert!(validate_slug("-studio").is_err());
/// assert!(validate_slug("Studio").is_err());
/// ```
pub fn validate_slug(slug: &str) -> Result<(), ValidationError> {
    let len = slug.len();
    if !(3..=63).contains(&len) {
        return Err(ValidationError::new("slug_length"));
    }

    if !slug
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(ValidationError::new("slug_charset"));
    }

    if slug.starts_with('-') || slug.ends_with('-') {
        return Err(ValidationError::new("slug_hyphen"));
    }

    Ok(())
}

/// Derives a slug candidate from a business name
///
/// ```
/// use bookdesk_shared::models::business::slugify;
///
/// assert_eq!(slugify("Anna's Hair & Beauty"), "anna-s-hair-beauty");
/// ```
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;

    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }

    slug.truncate(63);
    slug.trim_end_matches('-').to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CreateBusiness {
    #[validate(custom(function = "validate_slug"))]
    pub slug: String,

    #[validate(length(min = 1, max = 255, message = "Business name is required"))]
    pub name: String,

    #[serde(default)]
    pub business_type: BusinessType,

    #[validate(email)]
    pub email: Option<String>,

    #[validate(length(max = 50))]
    pub phone: Option<String>,

    pub address: Option<String>,

    #[validate(length(min = 1, max = 64))]
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateBusiness {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,

    pub business_type: Option<BusinessType>,

    #[validate(email)]
    pub email: Option<String>,

    #[validate(length(max = 50))]
    pub phone: Option<String>,

    pub address: Option<String>,

    #[validate(length(min = 1, max = 64))]
    pub timezone: Option<String>,
}

const COLUMNS: &str =
    "id, slug, name, business_type, email, phone, address, timezone, created_at, updated_at";

impl Business {
    pub async fn create<'e, E>(executor: E, data: CreateBusiness) -> Result<Self, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let business = sqlx::query_as::<_, Business>(&format!(
            "INSERT INTO businesses (slug, name, business_type, email, phone, address, timezone)
             VALUES ($1, $2, $3, $4, $5, $6, COALESCE($7, 'UTC'))
             RETURNING {COLUMNS}"
        ))
        .bind(data.slug)
        .bind(data.name.trim().to_string())
        .bind(data.business_type)
        .bind(clean_optional(data.email).map(|e| normalize_email(&e)))
        .bind(clean_optional(data.phone))
        .bind(clean_optional(data.address))
        .bind(clean_optional(data.timezone))
        .fetch_one(executor)
        .await?;

        Ok(business)
    }

    pub async fn find_by_id<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let business =
            sqlx::query_as::<_, Business>(&format!("SELECT {COLUMNS} FROM businesses WHERE id = $1"))
                .bind(id)
                .fetch_optional(executor)
                .await?;

        Ok(business)
    }

    pub async fn find_by_slug<'e, E>(executor: E, slug: &str) -> Result<Option<Self>, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let business = sqlx::query_as::<_, Business>(&format!(
            "SELECT {COLUMNS} FROM businesses WHERE slug = $1"
        ))
        .bind(slug.trim().to_lowercase())
        .fetch_optional(executor)
        .await?;

        Ok(business)
    }

    pub async fn slug_exists<'e, E>(executor: E, slug: &str) -> Result<bool, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM businesses WHERE slug = $1)")
                .bind(slug.to_string())
                .fetch_one(executor)
                .await?;

        Ok(exists)
    }

    /// Applies the non-`None` fields; returns `None` if the business is gone
    pub async fn update<'e, E>(
        executor: E,
        id: Uuid,
        data: UpdateBusiness,
    ) -> Result<Option<Self>, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let mut query = String::from("UPDATE businesses SET updated_at = NOW()");
        let mut bind_count = 1;

        for (column, present) in [
            ("name", data.name.is_some()),
            ("business_type", data.business_type.is_some()),
            ("email", data.email.is_some()),
            ("phone", data.phone.is_some()),
            ("address", data.address.is_some()),
            ("timezone", data.timezone.is_some()),
        ] {
            if present {
                bind_count += 1;
                query.push_str(&format!(", {} = ${}", column, bind_count));
            }
        }

        query.push_str(&format!(" WHERE id = $1 RETURNING {COLUMNS}"));

        let mut q = sqlx::query_as::<_, Business>(&query).bind(id);

        if let Some(name) = data.name {
            q = q.bind(name.trim().to_string());
        }
        if let Some(business_type) = data.business_type {
            q = q.bind(business_type);
        }
        if let Some(email) = data.email {
            q = q.bind(clean_optional(Some(email)).map(|e| normalize_email(&e)));
        }
        if let Some(phone) = data.phone {
            q = q.bind(clean_optional(Some(phone)));
        }
        if let Some(address) = data.address {
            q = q.bind(clean_optional(Some(address)));
        }
        if let Some(timezone) = data.timezone {
            q = q.bind(timezone.trim().to_string());
        }

        let business = q.fetch_optional(executor).await?;
        Ok(business)
    }

    /// Deletes the business and, through cascades, everything it owns
    pub async fn delete<'e, E>(executor: E, id: Uuid) -> Result<bool, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM businesses WHERE id = $1")
            .bind(id)
            .execute(executor)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
