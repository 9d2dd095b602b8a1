// Application state (AppState)

use crate::core::config::Config;
use crate::stores::user_store::UserStore;
use crate::wal::wal::Wal;
use std::sync::Arc;

/// Shared application state
///
/// All fields are wrapped in Arc so the state can be cloned into whatever
/// front end drives the account workflows.
#[derive(Clone)]
pub struct AppState {
    /// Account table
    pub user_store: Arc<UserStore>,

    /// Write-Ahead Log for persistence
    pub wal: Arc<Wal>,

    /// Configuration
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(config: Config, wal: Wal) -> Self {
        let config = Arc::new(config);

        Self {
            user_store: Arc::new(UserStore::with_capacity(config.storage.user_capacity)),
            wal: Arc::new(wal),
            config,
        }
    }
}
