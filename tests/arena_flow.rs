//! End-to-end arena flows through the gateway and the tick loop, without sockets

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use arena_server::game::constants::{BULLET_DAMAGE, MAX_HEALTH};
use arena_server::game::{GameState, Simulation, SimulationConfig, Vec2};
use arena_server::session::{Session, SessionGateway, SessionRegistry};
use arena_server::ws::protocol::{ClientMsg, ServerMsg};
use assert_approx_eq::assert_approx_eq;
use serde_json::json;
use uuid::Uuid;

struct Arena {
    gateway: SessionGateway,
    simulation: Simulation,
}

impl Arena {
    fn new() -> Self {
        let state = GameState::new();
        let sessions = Arc::new(SessionRegistry::new());
        let gateway = SessionGateway::new(state.clone(), sessions.clone(), Duration::ZERO);
        let simulation = Simulation::new(
            state,
            sessions,
            SimulationConfig {
                health_regen_per_sec: 0,
                ..Default::default()
            },
        );
        Self {
            gateway,
            simulation,
        }
    }

    fn join(&self) -> Session {
        self.gateway.connect(Uuid::new_v4()).expect("fresh id")
    }

    /// Feed a raw JSON frame the way the socket reader does
    fn send(&self, session: &Session, frame: serde_json::Value) {
        if let Ok(msg) = serde_json::from_value::<ClientMsg>(frame) {
            self.gateway.handle(session.player_id, msg);
        }
    }
}

fn drain(session: &mut Session) -> Vec<ServerMsg> {
    let mut out = Vec::new();
    while let Ok(msg) = session.outbound.try_recv() {
        out.push((*msg).clone());
    }
    out
}

#[test]
fn two_player_duel() {
    let mut arena = Arena::new();
    let mut alice = arena.join();
    let mut bob = arena.join();
    drain(&mut alice);
    drain(&mut bob);

    arena.send(&alice, json!({ "type": "state_update", "pos": { "x": "500px", "y": "500px" } }));
    arena.send(&bob, json!({ "type": "state_update", "pos": { "x": 520, "y": 500 }, "name": "Bob" }));
    arena.send(
        &alice,
        json!({ "type": "fire", "id": "alice-1", "x": 500, "y": 500, "angle": 90 }),
    );

    let seen_by_bob = drain(&mut bob);
    assert!(seen_by_bob.iter().any(|m| matches!(
        m,
        ServerMsg::PlayerStateUpdate { player_id, player }
            if *player_id == alice.player_id && player.pos == Vec2::new(500.0, 500.0)
    )));
    assert!(seen_by_bob.iter().any(|m| matches!(
        m,
        ServerMsg::BulletSpawned { bullet } if bullet.owner_id == alice.player_id
    )));

    arena.simulation.tick();
    arena.simulation.tick();

    let seen_by_alice = drain(&mut alice);
    let hit = seen_by_alice
        .iter()
        .find_map(|m| match m {
            ServerMsg::BulletCollision {
                bullet_id,
                shooter_id,
                victim_id,
                bullet_pos,
                victim_pos,
            } => Some((bullet_id.clone(), *shooter_id, *victim_id, *bullet_pos, *victim_pos)),
            _ => None,
        })
        .expect("collision");
    assert_eq!(hit.0, "alice-1");
    assert_eq!(hit.1, alice.player_id);
    assert_eq!(hit.2, bob.player_id);
    assert_approx_eq!(hit.3.x, 530.0);
    assert_eq!(hit.4, Vec2::new(520.0, 500.0));

    let bob_now = arena.gateway.state().player(bob.player_id).unwrap();
    assert_eq!(bob_now.health, MAX_HEALTH - BULLET_DAMAGE);
    assert_eq!(arena.gateway.state().bullet_count(), 0);
}

#[test]
fn malformed_frames_do_not_disturb_the_session() {
    let mut arena = Arena::new();
    let mut alice = arena.join();
    let mut bob = arena.join();
    drain(&mut alice);
    drain(&mut bob);

    arena.send(&alice, json!({ "type": "fire", "id": "x" }));
    arena.send(&alice, json!({ "type": "warp" }));
    arena.send(&alice, json!("just a string"));
    arena.send(
        &alice,
        json!({ "type": "state_update", "pos": "nowhere", "barrelRotation": 45 }),
    );

    let seen = drain(&mut bob);
    assert_eq!(seen.len(), 1);
    let ServerMsg::PlayerStateUpdate { player, .. } = &seen[0] else {
        panic!("expected a state update, got {:?}", seen[0]);
    };
    assert_eq!(player.barrel_rotation, 45.0);
    assert_eq!(player.pos, Vec2::new(100.0, 100.0));

    arena.simulation.tick();
    assert_eq!(drain(&mut bob).len(), 1);
}

#[test]
fn departure_is_announced_and_bullets_outlive_owner() {
    let mut arena = Arena::new();
    let mut alice = arena.join();
    let mut bob = arena.join();
    drain(&mut bob);

    arena.send(
        &alice,
        json!({ "type": "fire", "id": "parting", "x": 900, "y": 500, "angle": 180 }),
    );
    arena.send(&alice, json!({ "type": "leave" }));
    drain(&mut alice);

    let seen = drain(&mut bob);
    assert!(seen
        .iter()
        .any(|m| *m == ServerMsg::PlayerLeft { player_id: alice.player_id }));

    for _ in 0..3 {
        arena.simulation.tick();
    }
    let positions = drain(&mut bob)
        .into_iter()
        .filter_map(|m| match m {
            ServerMsg::BulletPositions { bullets, .. } => Some(bullets),
            _ => None,
        })
        .last()
        .expect("bullet positions on the third tick");
    assert_eq!(positions.len(), 1);
    assert_eq!(positions[0].owner_id, alice.player_id);
    assert_approx_eq!(positions[0].y, 545.0);
}

#[test]
fn empty_arena_stays_silent_until_someone_joins() {
    let mut arena = Arena::new();
    for _ in 0..30 {
        assert_eq!(arena.simulation.tick().broadcasts, 0);
    }

    let mut late = arena.join();
    let onboarding = drain(&mut late);
    assert!(matches!(onboarding[0], ServerMsg::Welcome { .. }));
    assert!(matches!(&onboarding[1], ServerMsg::FullSync { players } if players.len() == 1));

    arena.simulation.tick();
    let msgs = drain(&mut late);
    assert_eq!(msgs.len(), 1);
    assert!(matches!(msgs[0], ServerMsg::PlayerSnapshot { tick: 31, .. }));
}

/// What a client believes about the player table, built by replaying its messages in order
#[derive(Default)]
struct ClientView {
    known: HashSet<Uuid>,
    departed: HashSet<Uuid>,
    /// Messages that named a player after this client saw it leave
    stale: usize,
}

impl ClientView {
    fn apply(&mut self, msg: &ServerMsg) {
        match msg {
            ServerMsg::FullSync { players } => {
                self.known = players.iter().map(|p| p.id).collect();
                self.note_stale(players.iter().map(|p| p.id));
            }
            ServerMsg::PlayerJoined { player } => {
                self.known.insert(player.id);
                self.note_stale([player.id]);
            }
            ServerMsg::PlayerSnapshot { players, .. } => {
                // Clients create any player a snapshot mentions
                self.known.extend(players.iter().map(|p| p.id));
                self.note_stale(players.iter().map(|p| p.id));
            }
            ServerMsg::PlayerLeft { player_id } => {
                self.known.remove(player_id);
                self.departed.insert(*player_id);
            }
            _ => {}
        }
    }

    fn note_stale(&mut self, ids: impl IntoIterator<Item = Uuid>) {
        self.stale += ids.into_iter().filter(|id| self.departed.contains(id)).count();
    }

    fn replay(session: &mut Session) -> Self {
        let mut view = Self::default();
        while let Ok(msg) = session.outbound.try_recv() {
            view.apply(&msg);
        }
        view
    }
}

/// Run `work` while one thread ticks the simulation and another churns short-lived players
fn under_churn<R>(arena: &mut Arena, churn: usize, work: impl FnOnce(&SessionGateway) -> R) -> R {
    let stop = AtomicBool::new(false);
    let Arena {
        gateway,
        simulation,
    } = arena;
    let gateway = &*gateway;

    thread::scope(|scope| {
        let ticker = scope.spawn(|| {
            while !stop.load(Ordering::Relaxed) {
                simulation.tick();
                thread::sleep(Duration::from_micros(250));
            }
        });
        let churner = scope.spawn(|| {
            for _ in 0..churn {
                let visitor = gateway.connect(Uuid::new_v4()).expect("fresh id");
                gateway.disconnect(visitor.player_id);
            }
        });

        let result = work(gateway);

        churner.join().expect("churn thread");
        stop.store(true, Ordering::Relaxed);
        ticker.join().expect("tick thread");
        result
    })
}

#[test]
fn snapshots_never_resurrect_departed_players() {
    const CHURN: usize = 5_000;
    let mut arena = Arena::new();
    let mut observer = arena.join();

    under_churn(&mut arena, CHURN, |_| ());

    let view = ClientView::replay(&mut observer);
    assert_eq!(view.departed.len(), CHURN);
    assert_eq!(view.stale, 0, "messages naming an already-departed player");
    assert_eq!(view.known, HashSet::from([observer.player_id]));
}

#[test]
fn late_joiners_never_keep_departed_players() {
    let mut arena = Arena::new();

    let mut newcomers = under_churn(&mut arena, 5_000, |gateway| {
        (0..200)
            .map(|_| {
                thread::yield_now();
                gateway.connect(Uuid::new_v4()).expect("fresh id")
            })
            .collect::<Vec<_>>()
    });

    let present: HashSet<Uuid> = arena
        .gateway
        .state()
        .snapshot_players()
        .into_iter()
        .map(|p| p.id)
        .collect();
    assert_eq!(present.len(), newcomers.len());

    for newcomer in &mut newcomers {
        let view = ClientView::replay(newcomer);
        assert_eq!(view.stale, 0);
        assert!(view.known.contains(&newcomer.player_id));
        let ghosts: Vec<_> = view.known.difference(&present).collect();
        assert!(ghosts.is_empty(), "departed players still known: {ghosts:?}");
    }
}
