// Library root for the Yatube blogging service

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod mail;
pub mod media;
pub mod middleware;
pub mod models;
pub mod pagination;
pub mod router;
pub mod state;
pub mod templates;

// Re-export commonly used types
pub use config::Config;
pub use db::Database;
pub use error::{AppError, AppResult};
pub use router::create_router;
pub use state::AppState;
