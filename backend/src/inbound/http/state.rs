//! Shared application state handed to every handler.

use std::sync::Arc;

use crate::domain::ports::{Mailer, StorePort};
use crate::server::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn StorePort>,
    pub mailer: Arc<dyn Mailer>,
    pub config: AppConfig,
}

impl AppState {
    pub fn new(store: Arc<dyn StorePort>, mailer: Arc<dyn Mailer>, config: AppConfig) -> Self {
        Self {
            store,
            mailer,
            config,
        }
    }
}
