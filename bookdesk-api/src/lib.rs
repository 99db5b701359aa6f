//! # Bookdesk API Server Library
//!
//! HTTP surface of Bookdesk: business registration, the admin resources
//! (services, staff, customers, bookings, payments, settings, dashboard)
//! and the public booking pages.
//!
//! ## Modules
//!
//! - `app`: Application state and router builder
//! - `config`: Configuration management
//! - `error`: Error handling and HTTP response mapping
//! - `middleware`: Security headers
//! - `routes`: API route handlers

pub mod app;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
