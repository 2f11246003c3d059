use sqlx::SqlitePool;

use crate::services::tokens::TokenKeys;

pub mod account;

pub use account::*;

/// Application state shared across all handlers
pub struct AppState {
    pub db: SqlitePool,
    pub token_keys: TokenKeys,
}
