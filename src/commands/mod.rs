// Command implementations for the CLI
pub mod exclusions;
pub mod profiles;
pub mod routing;
pub mod sources;
pub mod watch;

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;

use audio_isolator_lib::{AppSettings, ConfigManager, PwCliManager, RoutingController};

/// Everything a command needs: stored settings and a controller for the live graph
pub struct AppContext {
    pub config: ConfigManager,
    pub settings: AppSettings,
    pub controller: RoutingController,
}

impl AppContext {
    pub fn load(config_dir: Option<PathBuf>) -> Result<Self> {
        let config = match config_dir {
            Some(dir) => ConfigManager::with_dir(dir)?,
            None => ConfigManager::open()?,
        };
        let settings = config.load_settings();
        let controller = RoutingController::new(Arc::new(PwCliManager::new()), settings.router.clone())
            .with_preferred_sink(settings.preferred_sink.clone());
        Ok(Self {
            config,
            settings,
            controller,
        })
    }
}
