//! Arena simulation modules

pub mod combat;
pub mod constants;
pub mod physics;
pub mod simulation;
pub mod snapshot;
pub mod state;

pub use physics::{Collision, PhysicsSystem};
pub use simulation::{Simulation, SimulationConfig, TickSummary};
pub use state::{Bullet, GameState, Player, PlayerUpdate, Vec2, World};

use uuid::Uuid;

/// Session identifier, assigned when the connection is accepted
pub type PlayerId = Uuid;

/// Bullet identifier chosen by the firing client
pub type BulletId = String;
