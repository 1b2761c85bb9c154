//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use chrono::{DateTime, Utc};
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};

use crate::game::combat::CombatSystem;
use crate::game::constants::{MAX_NAME_LEN, MIN_NAME_LEN};
use crate::game::physics::Collision;
use crate::game::state::{Bullet, Player, PlayerUpdate, Vec2};
use crate::game::{BulletId, PlayerId};

/// Messages sent from client to server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Local player state; every field is optional and merged individually
    StateUpdate(StateUpdate),

    /// Request to spawn a bullet
    Fire(FireRequest),

    /// Chat line
    Chat {
        #[serde(alias = "message")]
        text: String,
    },

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },

    /// Voluntary disconnect
    Leave,
}

/// Client-reported player fields. Fields with the wrong shape deserialize to `None`
/// instead of rejecting the whole message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StateUpdate {
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub pos: Option<PosPayload>,
    #[serde(
        default,
        alias = "barrelRotation",
        deserialize_with = "lenient",
        skip_serializing_if = "Option::is_none"
    )]
    pub barrel_rotation: Option<f64>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient", skip_serializing_if = "Option::is_none")]
    pub health: Option<f64>,
}

impl StateUpdate {
    /// Drop out-of-domain values and produce a store update
    pub fn into_update(self) -> PlayerUpdate {
        PlayerUpdate {
            pos: self.pos.map(Vec2::from),
            barrel_rotation: self.barrel_rotation.filter(|r| r.is_finite()),
            color: self.color,
            name: self.name.and_then(sanitize_name),
            health: self
                .health
                .filter(|h| h.is_finite())
                .map(|h| CombatSystem::clamp_reported_health(h.round() as i32)),
        }
    }
}

fn sanitize_name(name: String) -> Option<String> {
    let trimmed = name.trim();
    let len = trimmed.chars().count();
    (MIN_NAME_LEN..=MAX_NAME_LEN)
        .contains(&len)
        .then(|| trimmed.to_string())
}

/// Position as sent by clients: numbers or CSS pixel strings like `"120px"`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PosPayload {
    #[serde(deserialize_with = "coord")]
    pub x: f64,
    #[serde(deserialize_with = "coord")]
    pub y: f64,
}

impl From<PosPayload> for Vec2 {
    fn from(p: PosPayload) -> Self {
        Vec2::new(p.x, p.y)
    }
}

/// Bullet spawn request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FireRequest {
    /// Client-chosen bullet id
    #[serde(deserialize_with = "bullet_id")]
    pub id: BulletId,
    #[serde(deserialize_with = "coord")]
    pub x: f64,
    #[serde(deserialize_with = "coord")]
    pub y: f64,
    /// Heading in degrees (0 = up, clockwise)
    pub angle: f64,
    /// Ignored: the owner is always the sending connection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<serde_json::Value>,
}

impl FireRequest {
    /// Build the bullet, forcing ownership to `owner`. Rejects empty ids and
    /// non-finite headings.
    pub fn into_bullet(self, owner: PlayerId) -> Option<Bullet> {
        if self.id.is_empty() || !self.angle.is_finite() {
            return None;
        }
        Some(Bullet::new(self.id, owner, Vec2::new(self.x, self.y), self.angle))
    }
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Sent once to a new connection, before anything else
    Welcome {
        player_id: PlayerId,
        server_time: u64,
    },

    /// Every player at join time (new connection only)
    FullSync {
        players: Vec<PlayerRecord>,
    },

    /// Player joined the arena
    PlayerJoined {
        player: PlayerRecord,
    },

    /// A player's merged state after one of their updates
    PlayerStateUpdate {
        player_id: PlayerId,
        player: PlayerRecord,
    },

    /// All players, sent every tick
    PlayerSnapshot {
        tick: u64,
        players: Vec<PlayerRecord>,
    },

    /// A bullet entered the simulation
    BulletSpawned {
        bullet: BulletRecord,
    },

    /// All live bullets, rate-divided
    BulletPositions {
        tick: u64,
        bullets: Vec<BulletRecord>,
    },

    /// A bullet hit a player
    BulletCollision {
        bullet_id: BulletId,
        shooter_id: PlayerId,
        victim_id: PlayerId,
        bullet_pos: Vec2,
        victim_pos: Vec2,
    },

    /// Player left the arena
    PlayerLeft {
        player_id: PlayerId,
    },

    /// Chat line stamped by the server
    ChatBroadcast {
        sender_id: PlayerId,
        sender_name: String,
        text: String,
        timestamp: DateTime<Utc>,
    },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },
}

impl From<Collision> for ServerMsg {
    fn from(c: Collision) -> Self {
        ServerMsg::BulletCollision {
            bullet_id: c.bullet_id,
            shooter_id: c.shooter_id,
            victim_id: c.victim_id,
            bullet_pos: c.bullet_pos,
            victim_pos: c.victim_pos,
        }
    }
}

/// Player state on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub id: PlayerId,
    pub name: String,
    pub pos: Vec2,
    pub barrel_rotation: f64,
    pub color: Option<String>,
    pub health: i32,
}

impl From<&Player> for PlayerRecord {
    fn from(p: &Player) -> Self {
        Self {
            id: p.id,
            name: p.name.clone(),
            pos: p.pos,
            barrel_rotation: p.barrel_rotation,
            color: p.color.clone(),
            health: p.health,
        }
    }
}

/// Bullet state on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulletRecord {
    pub id: BulletId,
    pub owner_id: PlayerId,
    pub x: f64,
    pub y: f64,
    pub angle: f64,
}

impl From<&Bullet> for BulletRecord {
    fn from(b: &Bullet) -> Self {
        Self {
            id: b.id.clone(),
            owner_id: b.owner_id,
            x: b.pos.x,
            y: b.pos.y,
            angle: b.angle,
        }
    }
}

/// Deserialize a field, yielding `None` when the value has the wrong shape
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(T::deserialize(value).ok())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawCoord {
    Number(f64),
    Text(String),
}

/// Finite coordinate from a number or a `"<n>px"` string
fn coord<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = match RawCoord::deserialize(deserializer)? {
        RawCoord::Number(n) => n,
        RawCoord::Text(s) => {
            let s = s.trim();
            s.strip_suffix("px")
                .unwrap_or(s)
                .trim()
                .parse::<f64>()
                .map_err(|_| de::Error::custom(format!("invalid coordinate {s:?}")))?
        }
    };

    if value.is_finite() {
        Ok(value)
    } else {
        Err(de::Error::custom("coordinate must be finite"))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawBulletId {
    Text(String),
    Number(serde_json::Number),
}

fn bullet_id<'de, D>(deserializer: D) -> Result<BulletId, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match RawBulletId::deserialize(deserializer)? {
        RawBulletId::Text(s) => s,
        RawBulletId::Number(n) => n.to_string(),
    })
}
