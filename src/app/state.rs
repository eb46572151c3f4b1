//! Application state shared across routes

use std::sync::Arc;

use crate::config::Config;
use crate::game::{Arena, ArenaHandle};
use crate::market::MarketFeed;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub arena: ArenaHandle,
}

impl AppState {
    /// Build the state and the arena task that backs it.
    ///
    /// The returned [`Arena`] must be spawned by the caller.
    pub fn new(config: Config, feed: Arc<dyn MarketFeed>) -> (Self, Arena) {
        let config = Arc::new(config);

        let (arena, handle) = Arena::new(&config, feed);

        let state = Self {
            config,
            arena: handle,
        };

        (state, arena)
    }
}
