//! Fixed-rate authoritative tick loop

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, trace, warn};

use crate::session::SessionRegistry;
use crate::util::time::{tick_duration, TickTimer};
use crate::ws::protocol::ServerMsg;

use super::combat::CombatSystem;
use super::constants::{BULLET_BROADCAST_DIVISOR, HEALTH_REGEN_RATE, TICK_RATE};
use super::physics::PhysicsSystem;
use super::snapshot::{SnapshotBuilder, TickDivider};
use super::state::GameState;

/// Tick loop tunables
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationConfig {
    /// Ticks per second
    pub tick_rate: u32,
    /// Bullet positions go out every this many ticks
    pub bullet_broadcast_divisor: u32,
    /// Health regained per second; 0 disables regeneration
    pub health_regen_per_sec: i32,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_rate: TICK_RATE,
            bullet_broadcast_divisor: BULLET_BROADCAST_DIVISOR,
            health_regen_per_sec: HEALTH_REGEN_RATE,
        }
    }
}

/// What one tick did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickSummary {
    pub tick: u64,
    pub collisions: usize,
    pub players: usize,
    pub bullets: usize,
    /// Messages fanned out this tick (one per broadcast, not per recipient)
    pub broadcasts: usize,
}

/// The authoritative simulation driver
pub struct Simulation {
    state: GameState,
    sessions: Arc<SessionRegistry>,
    config: SimulationConfig,
    tick: u64,
    tick_counter: Arc<AtomicU64>,
    bullet_divider: TickDivider,
    regen_divider: TickDivider,
}

impl Simulation {
    pub fn new(state: GameState, sessions: Arc<SessionRegistry>, config: SimulationConfig) -> Self {
        let bullet_divider = TickDivider::new(config.bullet_broadcast_divisor);
        let regen_divider = TickDivider::new(config.tick_rate);
        Self {
            state,
            sessions,
            config,
            tick: 0,
            tick_counter: Arc::new(AtomicU64::new(0)),
            bullet_divider,
            regen_divider,
        }
    }

    /// Shared view of the current tick number
    pub fn tick_counter(&self) -> Arc<AtomicU64> {
        self.tick_counter.clone()
    }

    /// Run the tick loop forever.
    ///
    /// Late ticks are skipped rather than replayed. A panicking tick is logged and the
    /// loop carries on with the next one.
    pub async fn run(mut self) {
        let budget = tick_duration(self.config.tick_rate);
        let mut tick_interval = interval(budget);
        tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            tick_rate = self.config.tick_rate,
            bullet_divisor = self.bullet_divider.interval(),
            "Simulation started"
        );

        loop {
            tick_interval.tick().await;

            let timer = TickTimer::start(budget);

            match isolate_panic(|| self.tick()) {
                Some(summary) => {
                    if let Some(over) = timer.overrun() {
                        warn!(
                            tick = summary.tick,
                            over_us = over.as_micros() as u64,
                            players = summary.players,
                            bullets = summary.bullets,
                            "Tick overran its budget"
                        );
                    }
                }
                None => {
                    error!(tick = self.tick, "Simulation tick panicked, continuing");
                }
            }
        }
    }

    /// Advance the world by one tick and broadcast the result.
    ///
    /// Fan-out happens under the store lock, so every broadcast reflects the store as it
    /// was when the message was queued and is ordered against joins and departures.
    pub fn tick(&mut self) -> TickSummary {
        self.tick += 1;
        let tick = self.tick;
        self.tick_counter.store(tick, Ordering::Relaxed);

        let regen = self.config.health_regen_per_sec;
        let regen_due = self.regen_divider.should_fire() && regen > 0;
        let bullets_due = self.bullet_divider.should_fire();
        let sessions = &self.sessions;

        self.state.transact(|world| {
            let collisions = PhysicsSystem::step(world);
            if regen_due {
                CombatSystem::regenerate_all(world, regen);
            }

            let mut summary = TickSummary {
                tick,
                collisions: collisions.len(),
                players: world.players.len(),
                bullets: world.bullets.len(),
                broadcasts: 0,
            };

            for collision in &collisions {
                debug!(
                    tick,
                    bullet_id = %collision.bullet_id,
                    shooter_id = %collision.shooter_id,
                    victim_id = %collision.victim_id,
                    "Bullet hit"
                );
            }

            if sessions.is_empty() {
                trace!(tick, "No sessions, skipping broadcast");
                return summary;
            }

            for collision in collisions {
                sessions.broadcast(ServerMsg::from(collision));
                summary.broadcasts += 1;
            }
            if bullets_due && !world.bullets.is_empty() {
                sessions.broadcast(SnapshotBuilder::bullets(tick, &world.bullets));
                summary.broadcasts += 1;
            }
            if !world.players.is_empty() {
                sessions.broadcast(SnapshotBuilder::players(tick, world.players.values()));
                summary.broadcasts += 1;
            }

            summary
        })
    }
}

/// Run one unit of tick work, turning a panic into `None`
pub fn isolate_panic<R>(work: impl FnOnce() -> R) -> Option<R> {
    panic::catch_unwind(AssertUnwindSafe(work)).ok()
}
