//! Session gateway: onboarding, inbound event routing and teardown

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::game::state::{GameState, Player};
use crate::game::PlayerId;
use crate::util::time::unix_millis;
use crate::ws::protocol::{BulletRecord, ClientMsg, FireRequest, PlayerRecord, ServerMsg, StateUpdate};

use super::registry::{OutboundRx, SessionHandle, SessionPhase, SessionRegistry};

/// Routes connection events into the shared arena
#[derive(Clone)]
pub struct SessionGateway {
    state: GameState,
    sessions: Arc<SessionRegistry>,
    fire_cooldown: Duration,
}

/// An accepted connection
pub struct Session {
    pub player_id: PlayerId,
    /// Everything the server sends to this connection, in order
    pub outbound: OutboundRx,
}

impl SessionGateway {
    pub fn new(state: GameState, sessions: Arc<SessionRegistry>, fire_cooldown: Duration) -> Self {
        Self {
            state,
            sessions,
            fire_cooldown,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionRegistry> {
        &self.sessions
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    /// Bring a new connection into the arena.
    ///
    /// The new session gets `welcome` then `full_sync` before it can see any broadcast;
    /// everyone else is told about the new player afterwards. Returns `None` if the id is
    /// already connected.
    ///
    /// Everything from the upsert to the `player_joined` fan-out happens under the store
    /// lock, so a departure is either absent from `full_sync` or announced to the newcomer.
    pub fn connect(&self, player_id: PlayerId) -> Option<Session> {
        let (tx, outbound) = mpsc::unbounded_channel();
        if !self.sessions.insert(SessionHandle::new(player_id, tx)) {
            warn!(player_id = %player_id, "Session id already connected");
            return None;
        }

        self.state.transact(|world| {
            let player = PlayerRecord::from(world.upsert_player(player_id, Player::new(player_id)));
            let players: Vec<PlayerRecord> = world.players.values().map(PlayerRecord::from).collect();

            let _ = self.sessions.send_to(
                player_id,
                ServerMsg::Welcome {
                    player_id,
                    server_time: unix_millis(),
                },
            );
            let _ = self.sessions.send_to(player_id, ServerMsg::FullSync { players });
            self.sessions.activate(player_id);

            self.sessions
                .broadcast_except(player_id, ServerMsg::PlayerJoined { player });
        });

        info!(
            player_id = %player_id,
            sessions = self.sessions.len(),
            "Player joined arena"
        );

        Some(Session {
            player_id,
            outbound,
        })
    }

    /// Route one inbound event. Events from sessions that are not active are ignored.
    pub fn handle(&self, player_id: PlayerId, msg: ClientMsg) {
        if self.sessions.phase(player_id) != SessionPhase::Active {
            debug!(player_id = %player_id, "Ignoring event from inactive session");
            return;
        }

        match msg {
            ClientMsg::StateUpdate(update) => self.handle_state_update(player_id, update),
            ClientMsg::Fire(request) => self.handle_fire(player_id, request),
            ClientMsg::Chat { text } => self.handle_chat(player_id, text),
            ClientMsg::Ping { t } => {
                let _ = self.sessions.send_to(player_id, ServerMsg::Pong { t });
            }
            ClientMsg::Leave => {
                info!(player_id = %player_id, "Player left voluntarily");
                self.disconnect(player_id);
            }
        }
    }

    /// Tear down a session. Safe to call more than once.
    pub fn disconnect(&self, player_id: PlayerId) {
        let departed = self.state.transact(|world| {
            self.sessions.remove(player_id)?;
            world.remove_player(player_id);
            self.sessions.broadcast(ServerMsg::PlayerLeft { player_id });
            Some(())
        });
        if departed.is_none() {
            return;
        }

        info!(
            player_id = %player_id,
            sessions = self.sessions.len(),
            "Player left arena"
        );
    }

    fn handle_state_update(&self, player_id: PlayerId, update: StateUpdate) {
        let update = update.into_update();
        if update.is_empty() {
            debug!(player_id = %player_id, "State update carried no usable fields");
        }

        self.state.transact(|world| {
            let Some(player) = world.apply_player_update(player_id, update) else {
                return;
            };
            self.sessions.broadcast_except(
                player_id,
                ServerMsg::PlayerStateUpdate {
                    player_id,
                    player: PlayerRecord::from(player),
                },
            );
        });
    }

    fn handle_fire(&self, player_id: PlayerId, request: FireRequest) {
        let Some(bullet) = request.into_bullet(player_id) else {
            warn!(player_id = %player_id, "Rejected malformed fire request");
            return;
        };

        if !self.sessions.try_fire(player_id, self.fire_cooldown) {
            debug!(player_id = %player_id, bullet_id = %bullet.id, "Shot inside cooldown");
            return;
        }

        let record = BulletRecord::from(&bullet);
        self.state.transact(|world| {
            if world.add_bullet(bullet) {
                debug!(player_id = %player_id, bullet_id = %record.id, "Bullet id reused, replaced");
            }
            self.sessions
                .broadcast(ServerMsg::BulletSpawned { bullet: record });
        });
    }

    fn handle_chat(&self, player_id: PlayerId, text: String) {
        let Some(sender) = self.state.player(player_id) else {
            return;
        };

        self.sessions.broadcast(ServerMsg::ChatBroadcast {
            sender_id: player_id,
            sender_name: sender.name,
            text,
            timestamp: Utc::now(),
        });
    }
}
