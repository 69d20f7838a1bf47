//! Ticket check-in and event close-out server.
//!
//! Tickets move from `pending` to either `checked_in` (scanned at the door) or
//! `no_show` (their event ended first). A daily sweep closes out ended events; scans
//! and the sweep race on the same rows and settle it with conditional writes.

pub mod config;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod scheduler;
pub mod services;
pub mod store;
pub mod utils;

/// Schema migrations under `server/migrations`, shared by the binary and the
/// database-backed tests.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();
