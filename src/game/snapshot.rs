//! Periodic snapshot building and the tick divider that paces it

use crate::ws::protocol::{BulletRecord, PlayerRecord, ServerMsg};

use super::state::{Bullet, Player};

/// Counts ticks and fires on every `interval`-th one
pub struct TickDivider {
    ticks_since_fire: u32,
    interval: u32,
}

impl TickDivider {
    pub fn new(interval: u32) -> Self {
        Self {
            ticks_since_fire: 0,
            interval: interval.max(1),
        }
    }

    /// Count one tick; true on every `interval`-th call
    pub fn should_fire(&mut self) -> bool {
        self.ticks_since_fire += 1;
        if self.ticks_since_fire >= self.interval {
            self.ticks_since_fire = 0;
            true
        } else {
            false
        }
    }

    pub fn interval(&self) -> u32 {
        self.interval
    }
}

/// Builds the periodic world broadcasts
pub struct SnapshotBuilder;

impl SnapshotBuilder {
    pub fn players<'a>(tick: u64, players: impl IntoIterator<Item = &'a Player>) -> ServerMsg {
        ServerMsg::PlayerSnapshot {
            tick,
            players: players.into_iter().map(PlayerRecord::from).collect(),
        }
    }

    pub fn bullets<'a>(tick: u64, bullets: impl IntoIterator<Item = &'a Bullet>) -> ServerMsg {
        ServerMsg::BulletPositions {
            tick,
            bullets: bullets.into_iter().map(BulletRecord::from).collect(),
        }
    }
}
