//! Bullet movement, player-bullet collision and out-of-bounds eviction

use super::combat::CombatSystem;
use super::constants::{
    BULLET_DAMAGE, BULLET_SIZE, BULLET_SPEED, PLAYER_SIZE, WORLD_HEIGHT, WORLD_MARGIN,
    WORLD_WIDTH,
};
use super::state::{Bullet, Vec2, World};
use super::{BulletId, PlayerId};

/// A bullet hit registered during a physics step
#[derive(Debug, Clone, PartialEq)]
pub struct Collision {
    pub bullet_id: BulletId,
    pub shooter_id: PlayerId,
    pub victim_id: PlayerId,
    pub bullet_pos: Vec2,
    pub victim_pos: Vec2,
}

/// Physics system for the bullet sweep
pub struct PhysicsSystem;

impl PhysicsSystem {
    /// Displacement for one tick along `angle` degrees (0 = up, clockwise)
    pub fn velocity(angle: f64, speed: f64) -> Vec2 {
        let rad = angle.to_radians();
        Vec2::new(speed * rad.sin(), -speed * rad.cos())
    }

    /// Move a bullet one tick along its fixed heading
    pub fn advance_bullet(bullet: &mut Bullet) {
        let v = Self::velocity(bullet.angle, BULLET_SPEED);
        bullet.pos.x += v.x;
        bullet.pos.y += v.y;
    }

    /// Axis-aligned overlap of two squares anchored at their top-left corners
    pub fn boxes_overlap(a: Vec2, a_size: f64, b: Vec2, b_size: f64) -> bool {
        a.x < b.x + b_size && a.x + a_size > b.x && a.y < b.y + b_size && a.y + a_size > b.y
    }

    pub fn bullet_hits_player(bullet: Vec2, player: Vec2) -> bool {
        Self::boxes_overlap(bullet, BULLET_SIZE, player, PLAYER_SIZE)
    }

    /// World bounds expanded by the eviction margin. Non-finite positions are outside.
    pub fn in_bounds(pos: Vec2) -> bool {
        pos.x >= -WORLD_MARGIN
            && pos.x <= WORLD_WIDTH + WORLD_MARGIN
            && pos.y >= -WORLD_MARGIN
            && pos.y <= WORLD_HEIGHT + WORLD_MARGIN
    }

    /// Advance every bullet, resolve hits, apply damage and evict spent or escaped bullets.
    ///
    /// Players are scanned in ascending id order and the first non-owner hit wins, so each
    /// bullet registers at most one collision per step. Health is not clamped here.
    pub fn step(world: &mut World) -> Vec<Collision> {
        let World { players, bullets } = world;
        let mut collisions = Vec::new();
        let mut spent = vec![false; bullets.len()];

        for (idx, bullet) in bullets.iter_mut().enumerate() {
            Self::advance_bullet(bullet);
            if !bullet.pos.is_finite() {
                continue;
            }

            let victim = players
                .values_mut()
                .filter(|p| p.id != bullet.owner_id)
                .find(|p| Self::bullet_hits_player(bullet.pos, p.pos));

            if let Some(victim) = victim {
                victim.health = CombatSystem::apply_damage(victim.health, BULLET_DAMAGE);
                collisions.push(Collision {
                    bullet_id: bullet.id.clone(),
                    shooter_id: bullet.owner_id,
                    victim_id: victim.id,
                    bullet_pos: bullet.pos,
                    victim_pos: victim.pos,
                });
                spent[idx] = true;
            }
        }

        let mut idx = 0;
        bullets.retain(|bullet| {
            let keep = !spent[idx] && Self::in_bounds(bullet.pos);
            idx += 1;
            keep
        });

        collisions
    }
}
