use std::sync::Arc;

use crate::config::Config;
use crate::hub::{Hub, HubSettings};

/// Shared application state: the hub plus the loaded configuration.
pub struct AppState {
    pub hub: Arc<Hub>,
    pub config: Config,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self::with_settings(config, HubSettings::default())
    }

    pub fn with_settings(config: Config, settings: HubSettings) -> Self {
        AppState {
            hub: Arc::new(Hub::new(settings)),
            config,
        }
    }
}
