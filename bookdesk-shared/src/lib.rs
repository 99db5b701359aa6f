//! # Bookdesk Shared Library
//!
//! This crate contains the data layer and the tenancy rules used by the
//! Bookdesk API server.
//!
//! ## Module Organization
//!
//! - `models`: Database models and their CRUD operations
//! - `auth`: Authentication, row-level policy and authorization checks
//! - `db`: Connection pool, migrations and tenant-scoped transactions
//! - `booking_flow`: Multi-table booking and payment lifecycle operations

pub mod auth;
pub mod booking_flow;
pub mod db;
pub mod models;

/// Current version of the Bookdesk shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
