//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::{spawn_lobby, LobbyHandle, LobbySettings};
use crate::map::DirMapSource;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub lobby: LobbyHandle,
}

impl AppState {
    /// Starts the lobby task; must be called inside a tokio runtime
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);

        let maps = Arc::new(DirMapSource::new(config.maps_dir.clone()));
        let (lobby, _task) = spawn_lobby(LobbySettings::from(config.as_ref()), maps);

        Self { config, lobby }
    }
}
