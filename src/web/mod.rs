//! Inbound HTTP boundary.
//!
//! Receives chat platform webhooks, answers the OAuth redirect and serves a
//! health check.

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;

pub use error::ApiError;
pub use handlers::AppState;
pub use router::create_router;
pub use server::WebServer;
