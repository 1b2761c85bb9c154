//! Application state shared across routes

use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use crate::config::Config;
use crate::game::{GameState, Simulation};
use crate::session::{SessionGateway, SessionRegistry};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub game: GameState,
    pub sessions: Arc<SessionRegistry>,
    pub gateway: SessionGateway,
    /// Current simulation tick, published by the tick loop
    pub tick: Arc<AtomicU64>,
}

impl AppState {
    /// Build the shared state and the simulation that drives it. The caller spawns
    /// the simulation.
    pub fn new(config: Config) -> (Self, Simulation) {
        let config = Arc::new(config);

        let game = GameState::new();
        let sessions = Arc::new(SessionRegistry::new());
        let gateway = SessionGateway::new(game.clone(), sessions.clone(), config.fire_cooldown);

        let simulation = Simulation::new(game.clone(), sessions.clone(), config.simulation.clone());
        let tick = simulation.tick_counter();

        let state = Self {
            config,
            game,
            sessions,
            gateway,
            tick,
        };

        (state, simulation)
    }
}
