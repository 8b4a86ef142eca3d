//! Recourse Gateway
//!
//! The plain HTTP shell around the review pipeline: axum routing, CORS,
//! the OpenAPI document, and the error-to-JSON status mapping. Requests
//! become start events; terminal results and the kernel error taxonomy
//! become responses.

pub mod error;
pub mod openapi;
pub mod server;
pub mod settings;

pub use error::{ApiError, ApiResult};
pub use server::{AppState, ReviewServer};
pub use settings::{CorsSettings, Settings};
