/// API route handlers, one module per resource
///
/// - `health`: Health check endpoint
/// - `auth`: Registration, login and the current user
/// - `invites`: Staff invite acceptance
/// - `public`: Public business page, public booking and customer signup
/// - `users`: Own profile and the business's accounts
/// - `business`, `services`, `staff`, `staff_invites`, `customers`,
///   `bookings`, `payments`, `settings`, `dashboard`: admin resources
///
/// Handlers open one scoped transaction per request (see
/// [`crate::app::AppState::begin`]) and commit it before responding.

pub mod auth;
pub mod bookings;
pub mod business;
pub mod customers;
pub mod dashboard;
pub mod health;
pub mod invites;
pub mod payments;
pub mod public;
pub mod services;
pub mod settings;
pub mod staff;
pub mod staff_invites;
pub mod users;

use uuid::Uuid;

use crate::error::ApiError;

/// Maps a missing row to a 404 naming the resource
pub(crate) fn found<T>(value: Option<T>, what: &str) -> Result<T, ApiError> {
    value.ok_or_else(|| ApiError::NotFound(format!("{} not found", what)))
}

/// 404 unless a delete removed a row
pub(crate) fn deleted(removed: bool, what: &str, id: Uuid) -> Result<(), ApiError> {
    if removed {
        tracing::info!(id = %id, "{} deleted", what);
        Ok(())
    } else {
        Err(ApiError::NotFound(format!("{} not found", what)))
    }
}
