pub mod aggregate;
pub mod config;
pub mod discover;
pub mod error;
pub mod pipeline;
pub mod process;
pub mod schema;
pub mod summary;
pub mod validate;
