//! HTTP surface: health, map discovery and static client files

pub mod routes;

pub use routes::{build_router, AppError};
