use std::sync::Arc;

use crate::config::AppConfig;
use crate::database::store::Store;
use crate::services::{AccountService, Geocoder, OwnershipManager};

/// Shared handles injected into every handler
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub manager: Arc<OwnershipManager>,
    pub accounts: Arc<AccountService>,
    pub geocoder: Arc<dyn Geocoder>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, geocoder: Arc<dyn Geocoder>, config: AppConfig) -> Self {
        let manager = OwnershipManager::new(store.clone(), config.transactions.retry_policy());
        let accounts = AccountService::new(store.clone(), config.security.clone());

        Self {
            store,
            manager: Arc::new(manager),
            accounts: Arc::new(accounts),
            geocoder,
            config: Arc::new(config),
        }
    }
}
