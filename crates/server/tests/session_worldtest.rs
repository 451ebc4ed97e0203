//! World lifecycle and session handling against a temporary save directory.

use std::path::Path;
use std::time::Duration;

use scapes_core::{EntityId, WorldSeed};
use scapes_net::{
    compute_schema_hash, decode_server_message, encode_client_message, encode_server_message,
    ClientMessage, ServerMessage, PROTOCOL_VERSION,
};
use scapes_server::{
    EnvironmentConfig, Outbox, Session, SessionState, WorldConfig, WorldServer,
};
use scapes_world::WorldStore;

fn config(root: &Path) -> WorldConfig {
    WorldConfig {
        name: "worldtest".into(),
        seed: WorldSeed(2024),
        save_root: root.to_path_buf(),
        environment: EnvironmentConfig::default(),
        load_radius: 1,
        chunk_cache: 32,
    }
}

fn frame(msg: &ClientMessage) -> Vec<u8> {
    encode_client_message(msg).expect("encode")
}

fn handshake() -> Vec<u8> {
    frame(&ClientMessage::Handshake {
        version: PROTOCOL_VERSION,
        schema_hash: compute_schema_hash(),
    })
}

#[test]
fn handshake_joins_the_world() {
    let dir = tempfile::tempdir().unwrap();
    let (outbox, _rx) = Outbox::channel();
    let world = WorldServer::open(config(dir.path()), outbox).unwrap();
    println!("phase: world opened, spawn {:?}", world.spawn());
    assert_eq!(world.resident_chunks(), 9);

    let mut session = Session::new(EntityId(1));
    let replies = session.handle_frame(&world, &handshake());
    assert_eq!(session.state(), SessionState::Active);
    assert!(matches!(
        replies.as_slice(),
        [
            ServerMessage::HandshakeResponse {
                accepted: true,
                reason: None,
                player_entity_id: Some(EntityId(1)),
            },
            ServerMessage::DayTimeSync { .. },
        ]
    ));
    for reply in &replies {
        let bytes = encode_server_message(reply).unwrap();
        assert_eq!(&decode_server_message(&bytes).unwrap(), reply);
    }
    assert_eq!(world.player_count(), 1);

    let replies = session.handle_frame(
        &world,
        &frame(&ClientMessage::PlayerState {
            position: [3.5, 4.5, 300.0],
            velocity: [1.0, 0.0, 0.0],
        }),
    );
    assert!(replies.is_empty());
    let mob = session.mob().unwrap();
    assert_eq!(mob.position().to_array(), [3.5, 4.5, 300.0]);
    assert_eq!(mob.speed(), 1.0);
}

#[test]
fn version_mismatch_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (outbox, _rx) = Outbox::channel();
    let world = WorldServer::open(config(dir.path()), outbox).unwrap();

    let mut session = Session::new(EntityId(1));
    let replies = session.handle_frame(
        &world,
        &frame(&ClientMessage::Handshake {
            version: PROTOCOL_VERSION + 1,
            schema_hash: compute_schema_hash(),
        }),
    );
    assert!(matches!(
        replies.as_slice(),
        [ServerMessage::HandshakeResponse {
            accepted: false,
            reason: Some(reason),
            player_entity_id: None,
        }] if reason.contains("version")
    ));
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(world.player_count(), 0);
}

#[test]
fn invalid_packet_disconnects_only_that_session() {
    let dir = tempfile::tempdir().unwrap();
    let (outbox, _rx) = Outbox::channel();
    let world = WorldServer::open(config(dir.path()), outbox).unwrap();

    let mut good = Session::new(EntityId(1));
    let mut bad = Session::new(EntityId(2));
    good.handle_frame(&world, &handshake());
    bad.handle_frame(&world, &handshake());
    assert_eq!(world.player_count(), 2);

    let replies = bad.handle_frame(&world, &frame(&ClientMessage::AnvilAction { action: 9 }));
    assert!(matches!(replies.as_slice(), [ServerMessage::Disconnect { .. }]));
    assert_eq!(bad.state(), SessionState::Closed);
    assert_eq!(good.state(), SessionState::Active);
    assert_eq!(world.player_count(), 1);

    // Closed sessions ignore further traffic.
    assert!(bad.handle_frame(&world, &frame(&ClientMessage::Jump)).is_empty());

    let store = WorldStore::open(dir.path()).unwrap();
    assert!(store.load_player(EntityId(2)).unwrap().is_some());

    let replies = good.handle_frame(&world, &frame(&ClientMessage::AnvilAction { action: 3 }));
    assert!(replies.is_empty());
    assert_eq!(good.state(), SessionState::Active);
}

#[test]
fn packets_before_handshake_close_the_session() {
    let dir = tempfile::tempdir().unwrap();
    let (outbox, _rx) = Outbox::channel();
    let world = WorldServer::open(config(dir.path()), outbox).unwrap();

    let mut session = Session::new(EntityId(5));
    let replies = session.handle_frame(&world, &frame(&ClientMessage::Jump));
    assert!(matches!(replies.as_slice(), [ServerMessage::Disconnect { .. }]));
    assert_eq!(session.state(), SessionState::Closed);

    let mut garbage = Session::new(EntityId(6));
    let replies = garbage.handle_frame(&world, &[0xff, 0x00, 0x13]);
    assert!(matches!(replies.as_slice(), [ServerMessage::Disconnect { .. }]));
}

#[test]
fn jump_costs_stamina_that_survives_rejoin() {
    let dir = tempfile::tempdir().unwrap();
    let (outbox, _rx) = Outbox::channel();
    let world = WorldServer::open(config(dir.path()), outbox).unwrap();

    let mut session = Session::new(EntityId(3));
    session.handle_frame(&world, &handshake());
    session.handle_frame(&world, &frame(&ClientMessage::Jump));
    session.handle_frame(
        &world,
        &frame(&ClientMessage::Disconnect {
            reason: "bye".into(),
        }),
    );
    assert_eq!(session.state(), SessionState::Closed);
    assert_eq!(world.player_count(), 0);

    let mut again = Session::new(EntityId(3));
    again.handle_frame(&world, &handshake());
    let _ = again.mob().unwrap();
    let store = WorldStore::open(dir.path()).unwrap();
    let record = store.load_player(EntityId(3)).unwrap().unwrap();
    assert!((record.condition.stamina - 0.85).abs() < 1e-9);
}

#[test]
fn environment_state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let (day, day_time, count, spawn) = {
        let (outbox, _rx) = Outbox::channel();
        let world = WorldServer::open(config(dir.path()), outbox).unwrap();
        for _ in 0..20 {
            world.tick_environment(0.05);
        }
        println!("phase: simulated {} steps", world.simulation_count());
        world.shutdown().unwrap();
        let climate = world.climate().read();
        (
            climate.day(),
            climate.day_time(),
            world.simulation_count(),
            world.spawn(),
        )
    };
    assert!(count >= 20);

    let (outbox, _rx) = Outbox::channel();
    let reopened = WorldServer::open(config(dir.path()), outbox).unwrap();
    assert_eq!(reopened.spawn(), spawn);
    assert_eq!(reopened.simulation_count(), count);
    let climate = reopened.climate().read();
    assert_eq!(climate.day(), day);
    assert!((climate.day_time() - day_time).abs() < 1e-12);
}

#[test]
fn stored_seed_wins_over_config() {
    let dir = tempfile::tempdir().unwrap();
    {
        let (outbox, _rx) = Outbox::channel();
        WorldServer::open(config(dir.path()), outbox).unwrap();
    }
    let (outbox, _rx) = Outbox::channel();
    let mut other = config(dir.path());
    other.seed = WorldSeed(7);
    let world = WorldServer::open(other, outbox).unwrap();
    assert_eq!(world.seed(), WorldSeed(2024));
}

#[tokio::test]
async fn running_world_ticks_and_saves_on_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let (outbox, mut rx) = Outbox::channel();
    let world = std::sync::Arc::new(WorldServer::open(config(dir.path()), outbox).unwrap());
    world.start();

    tokio::time::sleep(Duration::from_millis(300)).await;
    world.shutdown().unwrap();

    assert!(world.simulation_count() > 0);
    assert!(matches!(
        rx.try_recv(),
        Ok((_, ServerMessage::DayTimeSync { .. }))
    ));
    let store = WorldStore::open(dir.path()).unwrap();
    let record = store.load_environment().unwrap().unwrap();
    assert_eq!(record.simulation_count, world.simulation_count());
}
