pub mod error;
pub mod extract;
pub mod middleware;
pub mod routes;

// Re-export public types and functions
pub use error::ApiError;
pub use extract::JsonOrForm;
pub use middleware::log_request_errors;
pub use routes::{chat, cleanup, cut, download, index, upload};
