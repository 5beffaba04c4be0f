//! API Module
//!
//! HTTP handlers and routing for the operator admin surface.
//!
//! # Endpoints
//! - `GET /health` - Health check endpoint
//! - `GET /stats` - Cache statistics
//! - `POST /stats/reset` - Reset statistics
//! - `DELETE /keys/:key` - Delete a key
//! - `GET /keys/:key/meta` - Entry metadata
//! - `POST /invalidate` - Pattern invalidation

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
