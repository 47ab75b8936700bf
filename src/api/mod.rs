//! Session API.
//!
//! Exposes the single extraction session over HTTP: upload an image, watch
//! progress, edit cells, download CSV or XLSX, reset. The router is
//! composable; `session_api_router()` returns a `Router` that can be
//! mounted on any axum server instance.

pub mod endpoints;
pub mod error;
pub mod router;
pub mod server;
pub mod types;

pub use router::session_api_router;
pub use server::{start_server, ServerError, ServerSession, SessionApiServer};
pub use types::ApiContext;
