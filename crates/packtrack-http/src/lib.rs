//! PackTrack HTTP surface (axum): health, reconciliation trigger, Telegram
//! webhook, and form intake.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, serve};
pub use state::AppState;
