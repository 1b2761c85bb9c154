//! Shared arena state: the player table and the live bullet list
//!
//! `World` is plain data. `GameState` wraps it in a mutex so that every mutator is
//! atomic with respect to the others and to the simulation tick.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::constants::{DEFAULT_PLAYER_NAME, DEFAULT_SPAWN_X, DEFAULT_SPAWN_Y, MAX_HEALTH};
use super::{BulletId, PlayerId};

/// 2D position in world pixels (y grows downward)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Authoritative player record
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    /// Top-left corner of the player's hitbox, as reported by the client
    pub pos: Vec2,
    /// Aim angle in degrees (0 = up, clockwise)
    pub barrel_rotation: f64,
    pub color: Option<String>,
    pub health: i32,
}

impl Player {
    /// A freshly connected player with default attributes
    pub fn new(id: PlayerId) -> Self {
        Self {
            id,
            name: DEFAULT_PLAYER_NAME.to_string(),
            pos: Vec2::new(DEFAULT_SPAWN_X, DEFAULT_SPAWN_Y),
            barrel_rotation: 0.0,
            color: None,
            health: MAX_HEALTH,
        }
    }

    fn merge(&mut self, update: PlayerUpdate) {
        if let Some(pos) = update.pos {
            self.pos = pos;
        }
        if let Some(rotation) = update.barrel_rotation {
            self.barrel_rotation = rotation;
        }
        if let Some(color) = update.color {
            self.color = Some(color);
        }
        if let Some(name) = update.name {
            self.name = name;
        }
        if let Some(health) = update.health {
            self.health = health;
        }
    }
}

/// Partial player update; `None` fields leave the record untouched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerUpdate {
    pub pos: Option<Vec2>,
    pub barrel_rotation: Option<f64>,
    pub color: Option<String>,
    pub name: Option<String>,
    pub health: Option<i32>,
}

impl PlayerUpdate {
    pub fn is_empty(&self) -> bool {
        self.pos.is_none()
            && self.barrel_rotation.is_none()
            && self.color.is_none()
            && self.name.is_none()
            && self.health.is_none()
    }
}

/// A bullet in flight
#[derive(Debug, Clone, PartialEq)]
pub struct Bullet {
    /// Chosen by the firing client
    pub id: BulletId,
    /// Set from the firing connection, never from the payload
    pub owner_id: PlayerId,
    pub pos: Vec2,
    /// Heading in degrees, fixed at spawn
    pub angle: f64,
}

impl Bullet {
    pub fn new(id: BulletId, owner_id: PlayerId, pos: Vec2, angle: f64) -> Self {
        Self {
            id,
            owner_id,
            pos,
            angle,
        }
    }
}

/// Arena contents. Players iterate in ascending id order.
#[derive(Debug, Default)]
pub struct World {
    pub players: BTreeMap<PlayerId, Player>,
    pub bullets: Vec<Bullet>,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `defaults` unless a record for `id` already exists.
    /// Returns the stored record.
    pub fn upsert_player(&mut self, id: PlayerId, defaults: Player) -> &Player {
        self.players.entry(id).or_insert(defaults)
    }

    pub fn apply_player_update(&mut self, id: PlayerId, update: PlayerUpdate) -> Option<&Player> {
        let player = self.players.get_mut(&id)?;
        player.merge(update);
        Some(player)
    }

    pub fn remove_player(&mut self, id: PlayerId) -> Option<Player> {
        self.players.remove(&id)
    }

    /// Append a bullet. A live bullet with the same owner and id is replaced in place;
    /// returns true in that case.
    pub fn add_bullet(&mut self, bullet: Bullet) -> bool {
        match self
            .bullets
            .iter_mut()
            .find(|b| b.owner_id == bullet.owner_id && b.id == bullet.id)
        {
            Some(existing) => {
                *existing = bullet;
                true
            }
            None => {
                self.bullets.push(bullet);
                false
            }
        }
    }

    pub fn replace_bullets(&mut self, bullets: Vec<Bullet>) {
        self.bullets = bullets;
    }
}

/// Shared, synchronized handle to the arena
#[derive(Clone, Default)]
pub struct GameState {
    world: Arc<Mutex<World>>,
}

impl GameState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` with exclusive access to the whole world
    pub fn transact<R>(&self, f: impl FnOnce(&mut World) -> R) -> R {
        let mut world = self.world.lock();
        f(&mut world)
    }

    pub fn upsert_player(&self, id: PlayerId, defaults: Player) -> Player {
        self.world.lock().upsert_player(id, defaults).clone()
    }

    /// Merge a partial update and return the merged record, or `None` for an unknown id
    pub fn apply_player_update(&self, id: PlayerId, update: PlayerUpdate) -> Option<Player> {
        self.world
            .lock()
            .apply_player_update(id, update)
            .cloned()
    }

    pub fn remove_player(&self, id: PlayerId) -> Option<Player> {
        self.world.lock().remove_player(id)
    }

    pub fn add_bullet(&self, bullet: Bullet) -> bool {
        self.world.lock().add_bullet(bullet)
    }

    pub fn replace_bullets(&self, bullets: Vec<Bullet>) {
        self.world.lock().replace_bullets(bullets);
    }

    pub fn player(&self, id: PlayerId) -> Option<Player> {
        self.world.lock().players.get(&id).cloned()
    }

    pub fn snapshot_players(&self) -> Vec<Player> {
        self.world.lock().players.values().cloned().collect()
    }

    pub fn snapshot_bullets(&self) -> Vec<Bullet> {
        self.world.lock().bullets.clone()
    }

    pub fn player_count(&self) -> usize {
        self.world.lock().players.len()
    }

    pub fn bullet_count(&self) -> usize {
        self.world.lock().bullets.len()
    }
}
