//! Waitlist signup intake and admin retrieval service.

pub mod admin;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod privacy;
pub mod resilience;
pub mod security;
pub mod signup;
pub mod store;

pub use config::schema::ServiceConfig;
pub use error::ServiceError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
