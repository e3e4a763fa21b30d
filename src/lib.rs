//! Meeting Room Booking Service
//!
//! This library holds the booking rules for a shared meeting calendar and
//! an HTTP service that fronts an external meeting data store.
//!
//! # Modules
//!
//! - `services::validator`: business hours, minimum duration and conflict rules
//! - `services::scheduler`: create/update/move/cancel on the in-memory event store
//! - `services::session`: the booking modal state machine and click handling
//! - `services::calendar`: per-user calendar view with change signals
//! - `services::booking`: serialized commits to the data store plus notifications
//! - `client`: data store and email collaborators
//!
//! # Authentication
//!
//! Bearer tokens are issued by an external provider. The service never
//! validates them; it keys booking sessions by token and forwards the token
//! to the data store.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;

#[cfg(test)]
mod tests;

// Re-export the main API types for ease of use
pub use auth::BearerToken;
pub use client::{DataStoreClient, EmailClient, LogNotifier, MeetingBackend, Notifier};
pub use config::Config;
pub use error::{ApiError, BookingError, Rejection};
pub use handlers::api::AppState;
pub use routes::create_router;
pub use services::booking::BookingService;
pub use services::database::CsvMeetingStore;
