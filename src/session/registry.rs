//! Connected sessions and outbound fan-out

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::game::combat::CombatSystem;
use crate::game::PlayerId;
use crate::ws::protocol::ServerMsg;

/// Outbound messages are shared between every recipient of a broadcast
pub type Outbound = Arc<ServerMsg>;
pub type OutboundTx = mpsc::UnboundedSender<Outbound>;
pub type OutboundRx = mpsc::UnboundedReceiver<Outbound>;

/// Connection lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Registered, initial sync in progress; excluded from broadcasts
    Connecting,
    /// Receives broadcasts and may send events
    Active,
    /// Terminal; the session is no longer registered
    Closed,
}

/// Per-connection handle for routing messages
pub struct SessionHandle {
    pub player_id: PlayerId,
    phase: SessionPhase,
    tx: OutboundTx,
    last_shot: Option<Instant>,
}

impl SessionHandle {
    pub fn new(player_id: PlayerId, tx: OutboundTx) -> Self {
        Self {
            player_id,
            phase: SessionPhase::Connecting,
            tx,
            last_shot: None,
        }
    }

    fn deliver(&self, msg: Outbound) -> Result<(), SessionError> {
        self.tx
            .send(msg)
            .map_err(|_| SessionError::Closed(self.player_id))
    }
}

/// Registry of every connected session.
///
/// Sends never block: each session owns an unbounded queue drained by its writer task,
/// so a slow socket only grows its own queue.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<PlayerId, SessionHandle>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a session in the `Connecting` phase. Returns false if the id is taken.
    pub fn insert(&self, handle: SessionHandle) -> bool {
        match self.sessions.entry(handle.player_id) {
            dashmap::mapref::entry::Entry::Occupied(_) => false,
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(handle);
                true
            }
        }
    }

    /// Move a connecting session to `Active`
    pub fn activate(&self, player_id: PlayerId) -> bool {
        match self.sessions.get_mut(&player_id) {
            Some(mut session) => {
                session.phase = SessionPhase::Active;
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, player_id: PlayerId) -> Option<SessionHandle> {
        self.sessions.remove(&player_id).map(|(_, handle)| handle)
    }

    pub fn phase(&self, player_id: PlayerId) -> SessionPhase {
        self.sessions
            .get(&player_id)
            .map(|s| s.phase)
            .unwrap_or(SessionPhase::Closed)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Send to one session regardless of phase
    pub fn send_to(&self, player_id: PlayerId, msg: impl Into<Outbound>) -> Result<(), SessionError> {
        let session = self
            .sessions
            .get(&player_id)
            .ok_or(SessionError::Unknown(player_id))?;
        session.deliver(msg.into())
    }

    /// Send to every active session. Returns the number of queues the message reached.
    pub fn broadcast(&self, msg: impl Into<Outbound>) -> usize {
        self.fan_out(None, msg.into())
    }

    /// Send to every active session except `sender`
    pub fn broadcast_except(&self, sender: PlayerId, msg: impl Into<Outbound>) -> usize {
        self.fan_out(Some(sender), msg.into())
    }

    fn fan_out(&self, skip: Option<PlayerId>, msg: Outbound) -> usize {
        let mut delivered = 0;
        for session in self.sessions.iter() {
            if session.phase != SessionPhase::Active || Some(session.player_id) == skip {
                continue;
            }
            match session.deliver(msg.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => debug!(error = %e, "Dropping message for closed session"),
            }
        }
        trace!(delivered, "Fan-out complete");
        delivered
    }

    /// Record a shot if the session's cooldown has elapsed
    pub fn try_fire(&self, player_id: PlayerId, cooldown: Duration) -> bool {
        let Some(mut session) = self.sessions.get_mut(&player_id) else {
            return false;
        };
        let now = Instant::now();
        if !CombatSystem::can_fire(session.last_shot, now, cooldown) {
            return false;
        }
        session.last_shot = Some(now);
        true
    }
}

/// Outbound delivery errors
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session {0} is not registered")]
    Unknown(PlayerId),

    #[error("session {0} has closed its outbound queue")]
    Closed(PlayerId),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};
    use uuid::Uuid;

    fn register(registry: &SessionRegistry) -> (PlayerId, OutboundRx) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        assert!(registry.insert(SessionHandle::new(id, tx)));
        registry.activate(id);
        (id, rx)
    }

    #[test]
    fn broadcast_skips_sender_and_connecting_sessions() {
        let registry = SessionRegistry::new();
        let (a, mut rx_a) = register(&registry);
        let (_b, mut rx_b) = register(&registry);

        let pending = Uuid::new_v4();
        let (tx, mut rx_pending) = mpsc::unbounded_channel();
        registry.insert(SessionHandle::new(pending, tx));
        assert_eq!(registry.phase(pending), SessionPhase::Connecting);

        let delivered = registry.broadcast_except(a, ServerMsg::Pong { t: 1 });
        assert_eq!(delivered, 1);
        assert!(rx_a.try_recv().is_err());
        assert_eq!(*rx_b.try_recv().unwrap(), ServerMsg::Pong { t: 1 });
        assert!(rx_pending.try_recv().is_err());

        assert_eq!(registry.broadcast(ServerMsg::Pong { t: 2 }), 2);
        assert_eq!(*rx_a.try_recv().unwrap(), ServerMsg::Pong { t: 2 });
    }

    #[test]
    fn send_to_reports_unknown_and_closed() {
        let registry = SessionRegistry::new();
        assert_err!(registry.send_to(Uuid::new_v4(), ServerMsg::Pong { t: 0 }));

        let (id, rx) = register(&registry);
        assert_ok!(registry.send_to(id, ServerMsg::Pong { t: 0 }));
        drop(rx);
        assert!(matches!(
            registry.send_to(id, ServerMsg::Pong { t: 0 }),
            Err(SessionError::Closed(_))
        ));
    }

    #[test]
    fn removed_session_is_closed() {
        let registry = SessionRegistry::new();
        let (id, _rx) = register(&registry);
        assert_eq!(registry.phase(id), SessionPhase::Active);
        assert!(registry.remove(id).is_some());
        assert!(registry.remove(id).is_none());
        assert_eq!(registry.phase(id), SessionPhase::Closed);
        assert!(registry.is_empty());
    }

    #[test]
    fn duplicate_ids_are_refused() {
        let registry = SessionRegistry::new();
        let (id, _rx) = register(&registry);
        let (tx, _rx2) = mpsc::unbounded_channel();
        assert!(!registry.insert(SessionHandle::new(id, tx)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn fire_cooldown_is_per_session() {
        let registry = SessionRegistry::new();
        let (a, _rx_a) = register(&registry);
        let (b, _rx_b) = register(&registry);
        let cooldown = Duration::from_secs(60);

        assert!(registry.try_fire(a, cooldown));
        assert!(!registry.try_fire(a, cooldown));
        assert!(registry.try_fire(b, cooldown));
        assert!(registry.try_fire(a, Duration::ZERO));
        assert!(!registry.try_fire(Uuid::new_v4(), Duration::ZERO));
    }
}
