//! Gigboard server - job marketplace connecting agents and contractors

pub mod accounts;
pub mod auth;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod models;
pub mod routes;
pub mod store;

use sqlx::SqlitePool;
use std::sync::Arc;

use crate::accounts::Accounts;
use crate::auth::{CredentialVerifier, SessionIssuer};
use crate::lifecycle::LifecycleManager;
use crate::store::Store;

/// Application state shared across handlers
pub struct AppState {
    pub lifecycle: LifecycleManager,
    pub accounts: Accounts,
    pub sessions: Arc<dyn SessionIssuer>,
}

impl AppState {
    pub fn new(
        pool: SqlitePool,
        credentials: Arc<dyn CredentialVerifier>,
        sessions: Arc<dyn SessionIssuer>,
    ) -> Arc<Self> {
        let store = Store::new(pool);
        Arc::new(Self {
            lifecycle: LifecycleManager::new(store.clone()),
            accounts: Accounts::new(store, credentials, Arc::clone(&sessions)),
            sessions,
        })
    }
}
