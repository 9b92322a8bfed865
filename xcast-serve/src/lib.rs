//! xcast-serve - HTTP API for accounts, the post queue and media
//!
//! The router is built from an [`state::AppState`] holding explicit handles,
//! so the binary and the integration tests wire it up the same way.

pub mod error;
pub mod extract;
pub mod router;
pub mod routes;
pub mod state;

pub use error::{AppError, AppResult};
pub use router::build_app_router;
pub use state::AppState;
