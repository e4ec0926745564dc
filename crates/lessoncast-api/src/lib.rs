//! Lessoncast API Library
//!
//! HTTP binding of the lesson video contract: bearer-authenticated routes for
//! upload tickets, finalize, status, streaming references and delete, plus the
//! media route behind the local storage backend's signed URLs.

mod api_doc;
pub mod auth;
pub mod constants;
pub mod error;
mod handlers;
pub mod setup;
pub mod state;
pub mod telemetry;

pub use api_doc::get_openapi_spec;
pub use error::{ErrorResponse, HttpAppError};
pub use state::AppState;
