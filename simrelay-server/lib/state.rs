//! Shared application state.

use std::sync::Arc;

use getset::Getters;
use simrelay_core::session::SessionRegistry;

use crate::config::Config;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// State shared by every handler.
#[derive(Clone, Getters)]
#[getset(get = "pub with_prefix")]
pub struct AppState {
    /// The server configuration
    config: Arc<Config>,

    /// Live viewer sessions
    registry: Arc<SessionRegistry>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl AppState {
    /// Creates the state for a server that runs workers as interpreter processes.
    pub fn new(config: Arc<Config>) -> Self {
        let registry = Arc::new(SessionRegistry::with_process_launcher(
            config.get_relay().clone(),
        ));
        Self::with_registry(config, registry)
    }

    /// Creates the state around an existing registry.
    pub fn with_registry(config: Arc<Config>, registry: Arc<SessionRegistry>) -> Self {
        Self { config, registry }
    }
}
