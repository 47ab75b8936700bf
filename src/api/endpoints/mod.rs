//! API endpoint handlers, one module per resource.

pub mod cells;
pub mod export;
pub mod health;
pub mod session;
pub mod upload;
