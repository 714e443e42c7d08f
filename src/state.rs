//! Application state management
//!
//! Contains shared state accessible across all handlers.

use crate::config::Settings;
use crate::db::Store;
use std::sync::Arc;

/// Application state shared across all handlers
pub struct AppState {
    /// Persistence backend (PostgreSQL or in-memory)
    pub store: Arc<dyn Store>,

    /// JWT secret key for token signing
    pub jwt_secret: String,

    /// How long a new session stays valid
    pub session_ttl: chrono::Duration,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, settings: &Settings) -> Self {
        Self {
            store,
            jwt_secret: settings.auth.jwt_secret.clone(),
            session_ttl: chrono::Duration::hours(settings.auth.session_ttl_hours),
        }
    }
}

/// Type alias for shared state
pub type SharedState = Arc<AppState>;
