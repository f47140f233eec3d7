//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, public routes)
//!     → request.rs (request ID, client IP)
//!     → signup pipeline or admin dispatch
//!     → response.rs (error mapping, masking)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{ClientIp, X_REQUEST_ID};
pub use server::{AppState, HttpServer};
