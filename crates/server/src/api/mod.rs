pub mod convert;
pub mod download;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;

pub use error::ApiError;
pub use routes::create_router;
