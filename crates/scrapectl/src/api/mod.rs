//! REST JSON API for the admin dashboard and the external worker.

pub mod error;
pub mod handlers;
pub mod routes;
pub mod types;

pub use error::ApiError;
pub use handlers::AppState;
pub use routes::create_router;
