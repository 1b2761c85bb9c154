//! Fixed arena tunables

/// Simulation ticks per second
pub const TICK_RATE: u32 = 120;

/// Bullet positions are broadcast once every this many ticks (~40 Hz at 120 Hz)
pub const BULLET_BROADCAST_DIVISOR: u32 = 3;

/// Playable area width in pixels
pub const WORLD_WIDTH: f64 = 1920.0;
/// Playable area height in pixels
pub const WORLD_HEIGHT: f64 = 1080.0;
/// Bullets survive this far past the world edge before eviction
pub const WORLD_MARGIN: f64 = 50.0;

/// Player hitbox edge length
pub const PLAYER_SIZE: f64 = 100.0;
/// Bullet hitbox edge length
pub const BULLET_SIZE: f64 = 4.0;
/// Bullet travel per tick in pixels
pub const BULLET_SPEED: f64 = 15.0;

pub const MAX_HEALTH: i32 = 100;
pub const BULLET_DAMAGE: i32 = 20;
/// Health regained per second by living players
pub const HEALTH_REGEN_RATE: i32 = 1;
/// Minimum time between two accepted shots from one session
pub const BULLET_COOLDOWN_MS: u64 = 300;

pub const DEFAULT_PLAYER_NAME: &str = "Player";
pub const DEFAULT_SPAWN_X: f64 = 100.0;
pub const DEFAULT_SPAWN_Y: f64 = 100.0;

/// Accepted display name length, in characters, after trimming
pub const MIN_NAME_LEN: usize = 2;
pub const MAX_NAME_LEN: usize = 20;
