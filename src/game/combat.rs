//! Combat rules - damage, regeneration, fire cooldown

use std::time::{Duration, Instant};

use super::constants::MAX_HEALTH;
use super::state::World;

/// Combat system for health changes and shot gating
pub struct CombatSystem;

impl CombatSystem {
    /// Subtract damage from health. There is no floor: health may go negative and
    /// clients clamp for display.
    pub fn apply_damage(current_health: i32, damage: i32) -> i32 {
        current_health.saturating_sub(damage)
    }

    /// Regenerate one step of health, never above `MAX_HEALTH`. Dead players
    /// (health <= 0) do not regenerate.
    pub fn regenerate(current_health: i32, amount: i32) -> i32 {
        if current_health <= 0 || current_health >= MAX_HEALTH {
            return current_health;
        }
        current_health.saturating_add(amount).min(MAX_HEALTH)
    }

    /// Apply one regeneration step to every player in the world
    pub fn regenerate_all(world: &mut World, amount: i32) {
        for player in world.players.values_mut() {
            player.health = Self::regenerate(player.health, amount);
        }
    }

    /// Clamp a client-reported health value into the valid domain
    pub fn clamp_reported_health(health: i32) -> i32 {
        health.clamp(0, MAX_HEALTH)
    }

    /// Check whether a shot at `now` respects the cooldown since `last_shot`
    pub fn can_fire(last_shot: Option<Instant>, now: Instant, cooldown: Duration) -> bool {
        match last_shot {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= cooldown,
        }
    }
}
