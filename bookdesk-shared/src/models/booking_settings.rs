/// Per-business booking rules
///
/// One row per business, created lazily: a business that never saved its
/// settings books with [`BookingSettings::defaults_for`].
///
/// # Schema
///
/// ```sql
/// CREATE TABLE booking_settings (
///     business_id UUID PRIMARY KEY REFERENCES businesses(id) ON DELETE CASCADE,
///     min_lead_time_minutes INTEGER NOT NULL DEFAULT 60,     -- 0..=10080
///     max_advance_days INTEGER NOT NULL DEFAULT 60,          -- 1..=365
///     cancellation_window_hours INTEGER NOT NULL DEFAULT 24, -- 0..=168
///     deposit_percent INTEGER NOT NULL DEFAULT 0,            -- 0..=100
///     require_deposit BOOLEAN NOT NULL DEFAULT FALSE,
///     prevent_overlaps BOOLEAN NOT NULL DEFAULT FALSE,
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

pub const DEFAULT_MIN_LEAD_TIME_MINUTES: i32 = 60;
pub const DEFAULT_MAX_ADVANCE_DAYS: i32 = 60;
pub const DEFAULT_CANCELLATION_WINDOW_HOURS: i32 = 24;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct BookingSettings {
    pub business_id: Uuid,

    /// Customers cannot book closer to now than this
    pub min_lead_time_minutes: i32,

    /// Customers cannot book further ahead than this
    pub max_advance_days: i32,

    /// Customers cannot cancel within this many hours of the start
    pub cancellation_window_hours: i32,

    pub deposit_percent: i32,
    pub require_deposit: bool,

    /// Reject bookings that overlap another active booking of the same staff
    pub prevent_overlaps: bool,

    pub updated_at: DateTime<Utc>,
}

impl BookingSettings {
    pub fn defaults_for(business_id: Uuid) -> Self {
        Self {
            business_id,
            min_lead_time_minutes: DEFAULT_MIN_LEAD_TIME_MINUTES,
            max_advance_days: DEFAULT_MAX_ADVANCE_DAYS,
            cancellation_window_hours: DEFAULT_CANCELLATION_WINDOW_HOURS,
            deposit_percent: 0,
            require_deposit: false,
            prevent_overlaps: false,
            updated_at: Utc::now(),
        }
    }

    /// Amount due for a booking of a service priced `price_cents`
    ///
    /// ```
    /// # use bookdesk_shared::models::booking_settings::BookingSettings;
    /// # use uuid::Uuid;
    /// let mut settings = BookingSettings::defaults_for(Uuid::new_v4());
    /// assert_eq!(settings.amount_due(4999), 4999);
    ///
    /// settings.require_deposit = true;
    /// settings.deposit_percent = 25;
    /// assert_eq!(settings.amount_due(4999), 1249);
    /// ```
    pub fn amount_due(&self, price_cents: i64) -> i64 {
        if self.require_deposit {
            price_cents * i64::from(self.deposit_percent.clamp(0, 100)) / 100
        } else {
            price_cents
        }
    }

    /// Returns a copy with the present fields of `update` applied
    pub fn apply(&self, update: &UpdateBookingSettings) -> Self {
        Self {
            business_id: self.business_id,
            min_lead_time_minutes: update
                .min_lead_time_minutes
                .unwrap_or(self.min_lead_time_minutes),
            max_advance_days: update.max_advance_days.unwrap_or(self.max_advance_days),
            cancellation_window_hours: update
                .cancellation_window_hours
                .unwrap_or(self.cancellation_window_hours),
            deposit_percent: update.deposit_percent.unwrap_or(self.deposit_percent),
            require_deposit: update.require_deposit.unwrap_or(self.require_deposit),
            prevent_overlaps: update.prevent_overlaps.unwrap_or(self.prevent_overlaps),
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateBookingSettings {
    #[validate(range(min = 0, max = 10080))]
    pub min_lead_time_minutes: Option<i32>,

    #[validate(range(min = 1, max = 365))]
    pub max_advance_days: Option<i32>,

    #[validate(range(min = 0, max = 168))]
    pub cancellation_window_hours: Option<i32>,

    #[validate(range(min = 0, max = 100))]
    pub deposit_percent: Option<i32>,

    pub require_deposit: Option<bool>,
    pub prevent_overlaps: Option<bool>,
}

const COLUMNS: &str = "business_id, min_lead_time_minutes, max_advance_days, cancellation_window_hours, deposit_percent, require_deposit, prevent_overlaps, updated_at";

impl BookingSettings {
    pub async fn find<'e, E>(executor: E, business_id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let settings = sqlx::query_as::<_, BookingSettings>(&format!(
            "SELECT {COLUMNS} FROM booking_settings WHERE business_id = $1"
        ))
        .bind(business_id)
        .fetch_optional(executor)
        .await?;

        Ok(settings)
    }

    /// Stored settings, or the defaults when none were saved
    pub async fn get_or_default<'e, E>(executor: E, business_id: Uuid) -> Result<Self, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let settings = Self::find(executor, business_id)
            .await?
            .unwrap_or_else(|| Self::defaults_for(business_id));

        Ok(settings)
    }

    /// Writes the full settings row, inserting it on first save
    pub async fn upsert<'e, E>(executor: E, settings: &BookingSettings) -> Result<Self, sqlx::Error>
    where
        E: sqlx::PgExecutor<'e>,
    {
        let saved = sqlx::query_as::<_, BookingSettings>(&format!(
            "INSERT INTO booking_settings
                (business_id, min_lead_time_minutes, max_advance_days,
                 cancellation_window_hours, deposit_percent, require_deposit, prevent_overlaps)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (business_id) DO UPDATE SET
                min_lead_time_minutes = EXCLUDED.min_lead_time_minutes,
                max_advance_days = EXCLUDED.max_advance_days,
                cancellation_window_hours = EXCLUDED.cancellation_window_hours,
                deposit_percent = EXCLUDED.deposit_percent,
                require_deposit = EXCLUDED.require_deposit,
                prevent_overlaps = EXCLUDED.prevent_overlaps,
                updated_at = NOW()
             RETURNING {COLUMNS}"
        ))
        .bind(settings.business_id)
        .bind(settings.min_lead_time_minutes)
        .bind(settings.max_advance_days)
        .bind(settings.cancellation_window_hours)
        .bind(settings.deposit_percent)
        .bind(settings.require_deposit)
        .bind(settings.prevent_overlaps)
        .fetch_one(executor)
        .await?;

        Ok(saved)
    }
}
