//! Integration tests for the arena server, its clients and the shared engine
//!
//! These tests validate cross-component interactions and real network behavior.

use client::config::ClientConfig;
use client::network::Client;
use server::config::ServerConfig;
use server::game::World;
use server::network::{Server, ServerHandle};
use shared::codec::{self, Frame, PositionUpdate};
use shared::packets::{read_packet, write_packet};
use shared::{EntitySpec, Packet, Vector2};
use std::time::Duration;

fn spec(id: &str, x: f64, y: f64) -> EntitySpec {
    EntitySpec {
        id: id.to_string(),
        name: id.to_string(),
        x,
        y,
        hp: 100,
        exceptions: Vec::new(),
        shape_texts: Vec::new(),
    }
}

/// NETWORK PROTOCOL TESTS
mod protocol_tests {
    use super::*;
    use tokio::net::{TcpListener, TcpStream, UdpSocket};

    /// Every reliable packet survives a real TCP connection intact and in order
    #[tokio::test]
    async fn reliable_packets_over_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let packets = vec![
            Packet::PlayerJoin {
                id: "p1".into(),
                name: "Alice".into(),
            },
            Packet::CreateEntityPlayer(spec("p1", 1.0, 2.0)),
            Packet::CreateEntityProjectile {
                spec: spec("shot", 0.0, 30.0),
                trajectory: Vector2::UP,
            },
            Packet::UpdateEntity(spec("p1", 3.0, 4.0)),
            Packet::DeleteEntity { id: "shot".into() },
            Packet::CreateBlock { x: -50, y: 100 },
        ];

        let expected = packets.clone();
        let sender = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            for packet in &packets {
                write_packet(&mut stream, packet).await.unwrap();
            }
        });

        let (mut stream, _) = listener.accept().await.unwrap();
        let mut received = Vec::new();
        while let Some(packet) = read_packet(&mut stream).await.unwrap() {
            received.push(packet);
        }
        sender.await.unwrap();

        assert_eq!(received, expected);
    }

    /// Position frames over real UDP sockets
    #[tokio::test]
    async fn position_frames_over_udp() {
        let receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        let update = PositionUpdate {
            id: "p1".into(),
            position: Vector2::new(12.5, 7.25),
            direction: Vector2::new(0.0, 1.0),
            timestamp: 1000,
        };
        sender
            .send_to(&codec::encode_position(&update), receiver.local_addr().unwrap())
            .await
            .unwrap();

        let mut buf = [0u8; 1024];
        let (len, _) = receiver.recv_from(&mut buf).await.unwrap();
        assert_eq!(codec::decode(&buf[..len]).unwrap(), Frame::Position(update));
    }

    /// Tests malformed packet handling
    #[test]
    fn malformed_packet_handling() {
        let valid = Packet::CreateEntity(spec("e1", 1.0, 1.0)).serialize().unwrap();

        assert!(Packet::deserialize(&valid[..valid.len() / 2]).is_err());
        assert!(Packet::deserialize(&[]).is_err());

        let mut corrupted = valid.clone();
        corrupted[0] = 0xFF;
        assert!(Packet::deserialize(&corrupted).is_err());

        assert!(codec::decode(&[]).is_err());
        assert!(codec::decode(&[9, 0, 0]).is_err());
        assert!(codec::decode(&[codec::BULK_FRAME, 0, 0, 0, 1, 0, 5]).is_err());
    }

    /// A stream that claims an oversized frame is refused before allocation
    #[tokio::test]
    async fn oversized_frame_refused() {
        let header = ((shared::MAX_PACKET_SIZE + 1) as u32).to_be_bytes();
        let mut stream = tokio_test::io::Builder::new().read(&header).build();
        assert!(matches!(
            read_packet(&mut stream).await,
            Err(shared::PacketError::FrameTooLarge(_))
        ));
    }
}

/// PHYSICS INTEGRATION TESTS
mod physics_tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::collision::{find_collisions, resolve_collisions};
    use shared::{Body, BlockStore, Entity, EntityStore, Shape};

    fn rect_entity(id: &str, position: Vector2, velocity: Vector2) -> Entity {
        let mut entity = Entity::new(id, id, position);
        entity.shapes = vec![Shape::rect(Vector2::ZERO, 10.0, 10.0)];
        entity.body = Body {
            velocity,
            mass: 1.0,
            friction: 0.0,
            bounciness: 0.5,
        };
        entity
    }

    /// A moving rect against a static block ends up outside it and bounced
    #[test]
    fn rect_against_static_block() {
        let mut entities = EntityStore::new();
        let mut blocks = BlockStore::new();
        blocks.add_block(Vector2::new(30.0, 0.0));

        // Overlaps the block face at x = 5 by 5 units.
        let mut a = rect_entity("a", Vector2::new(0.0, 0.0), Vector2::new(100.0, 0.0));
        let hits = find_collisions(&a, &entities, &blocks);
        assert_eq!(hits.len(), 1);

        resolve_collisions(&mut a, &hits, &mut entities, &blocks, 1.0 / 20.0);

        assert!(a.body.velocity.x <= 0.0);
        assert_approx_eq!(a.body.velocity.x, -50.0);
        assert!(find_collisions(&a, &entities, &blocks).is_empty());
    }

    /// Equal circles, perfectly elastic and frictionless, keep their momentum
    #[test]
    fn circle_momentum_conserved() {
        let mut entities = EntityStore::new();
        let blocks = BlockStore::new();

        let make = |id: &str, x: f64, vx: f64| {
            let mut e = Entity::new(id, id, Vector2::new(x, 0.0));
            e.shapes = vec![Shape::circle(Vector2::ZERO, 10.0)];
            e.body = Body {
                velocity: Vector2::new(vx, 0.0),
                mass: 1.0,
                friction: 0.0,
                bounciness: 1.0,
            };
            e
        };
        let mut a = make("a", 0.0, 30.0);
        entities.insert(make("b", 15.0, -10.0));

        let before = a.body.velocity + entities.get("b").unwrap().body.velocity;
        let hits = find_collisions(&a, &entities, &blocks);
        resolve_collisions(&mut a, &hits, &mut entities, &blocks, 0.05);
        let after = a.body.velocity + entities.get("b").unwrap().body.velocity;

        assert_approx_eq!(before.x, after.x);
        assert_approx_eq!(before.y, after.y);
        assert_approx_eq!(a.body.velocity.x, -10.0);
    }

    /// A crowd walking into a wall never ends up inside it
    #[test]
    fn crowd_against_wall() {
        let mut world = World::new();
        for i in 0..5 {
            world.place_block(200, i * 50);
        }
        for i in 0..5 {
            let id = format!("walker{}", i);
            world
                .spawn(&Packet::CreateEntity(spec(&id, 100.0, i as f64 * 50.0)))
                .unwrap();
        }

        for _ in 0..60 {
            for entity in world.entities_mut().iter_mut() {
                entity.set_move_input(Vector2::RIGHT);
            }
            world.tick(1.0 / 20.0);
        }

        for entity in world.entities().iter() {
            // Radius 25 against the wall face at x = 175.
            assert!(entity.position.x <= 150.0 + 1e-6, "{} at {:?}", entity.id, entity.position);
        }
    }
}

/// WORLD AND REPLICATION TESTS
mod world_tests {
    use super::*;
    use server::replication;
    use shared::BULK_CHUNK_SIZE;

    /// Projectile lifecycle: flies, hits, damages, despawns
    #[test]
    fn projectile_lifecycle() {
        let mut world = World::new();
        world
            .spawn(&Packet::CreateEntityPlayer(spec("target", 0.0, 60.0)))
            .unwrap();
        let mut shot = spec("shot", 0.0, 30.0);
        shot.exceptions = vec!["shooter".into()];
        world
            .spawn(&Packet::CreateEntityProjectile {
                spec: shot,
                trajectory: Vector2::UP,
            })
            .unwrap();

        let mut deleted = Vec::new();
        let mut damaged = Vec::new();
        for _ in 0..40 {
            let outcome = world.tick(1.0 / 20.0);
            deleted.extend(outcome.deleted);
            damaged.extend(outcome.damaged);
        }

        assert_eq!(deleted, vec!["shot".to_string()]);
        assert_eq!(damaged, vec!["target".to_string()]);
        assert_eq!(world.entities().get("target").unwrap().hp, 90);
        assert_eq!(world.entities().len(), 1);
    }

    /// Only moving entities are replicated, chunked by the bulk limit
    #[test]
    fn moving_entities_replicated_in_chunks() {
        let mut world = World::new();
        for i in 0..40 {
            let id = format!("e{:02}", i);
            world
                .spawn(&Packet::CreateEntity(spec(&id, i as f64 * 100.0, 0.0)))
                .unwrap();
        }
        world
            .spawn(&Packet::CreateEntity(spec("still", 0.0, 1000.0)))
            .unwrap();

        for entity in world.entities_mut().iter_mut() {
            if entity.id != "still" {
                entity.set_move_input(Vector2::UP);
            }
        }
        let outcome = world.tick(0.05);
        assert_eq!(outcome.changed.len(), 40);

        let frames = replication::bulk_frames(&outcome, world.entities());
        assert_eq!(frames.len(), 3);

        let mut total = 0;
        for frame in &frames {
            let entries = codec::decode_bulk(frame).unwrap();
            assert!(entries.len() <= BULK_CHUNK_SIZE);
            assert!(entries.iter().all(|e| e.id != "still"));
            total += entries.len();
        }
        assert_eq!(total, 40);

        // Nothing moves next tick, nothing is sent.
        let outcome = world.tick(0.05);
        assert!(replication::bulk_frames(&outcome, world.entities()).is_empty());
    }

    /// A late joiner's snapshot rebuilds the world on a client mirror
    #[test]
    fn snapshot_rebuilds_client_mirror() {
        let mut world = World::new();
        world.spawn(&Packet::CreateEntityPlayer(spec("p1", 5.0, 5.0))).unwrap();
        world.spawn(&Packet::CreateEntity(spec("rock", 50.0, 0.0))).unwrap();
        world.place_block(300, 300);
        world.place_block(350, 300);

        let mut mirror = client::game::ClientWorld::new();
        for packet in world.snapshot() {
            mirror.apply_packet(packet);
        }

        assert_eq!(mirror.entities().len(), 2);
        assert_eq!(mirror.blocks().len(), 2);
        assert_eq!(
            mirror.entities().get("p1").unwrap().position,
            Vector2::new(5.0, 5.0)
        );
    }
}

/// CLIENT-SERVER SESSION TESTS
mod session_tests {
    use super::*;
    use tokio::net::{TcpStream, UdpSocket};

    async fn start_server() -> (ServerHandle, u16, u16) {
        let mut server = Server::bind(&ServerConfig::ephemeral()).await.unwrap();
        let handle = server.handle();
        let tcp = server.tcp_local_addr().unwrap().port();
        let udp = server.udp_local_addr().unwrap().port();
        tokio::spawn(async move {
            let _ = server.run().await;
        });
        (handle, tcp, udp)
    }

    fn client_config(name: &str, tcp: u16, udp: u16, x: f64, y: f64) -> ClientConfig {
        ClientConfig {
            tcp_port: tcp,
            udp_port: udp,
            name: name.to_string(),
            idle: true,
            spawn_x: Some(x),
            spawn_y: Some(y),
            ..ClientConfig::default()
        }
    }

    async fn joined(name: &str, tcp: u16, udp: u16, x: f64, y: f64) -> Client {
        let mut client = Client::connect(&client_config(name, tcp, udp, x, y))
            .await
            .unwrap();
        client.join().await.unwrap();
        client
    }

    async fn run_both(a: &mut Client, b: &mut Client, duration: Duration) {
        let (ra, rb) = tokio::join!(a.run_for(duration), b.run_for(duration));
        ra.unwrap();
        rb.unwrap();
    }

    /// Two clients see each other, one shoots the other
    #[tokio::test]
    async fn projectile_hit_reaches_both_clients() {
        let (handle, tcp, udp) = start_server().await;

        let mut alice = joined("Alice", tcp, udp, 0.0, 0.0).await;
        let mut bob = joined("Bob", tcp, udp, 0.0, 60.0).await;
        run_both(&mut alice, &mut bob, Duration::from_millis(500)).await;

        let alice_id = alice.world().player_id().unwrap().to_string();
        let bob_id = bob.world().player_id().unwrap().to_string();
        assert!(alice.world().entities().contains(&bob_id));
        assert!(bob.world().entities().contains(&alice_id));

        // Alice faces up, straight at Bob.
        alice.fire().await.unwrap();
        run_both(&mut alice, &mut bob, Duration::from_millis(1500)).await;

        assert_eq!(bob.world().player().unwrap().hp, 90);
        assert_eq!(alice.world().entities().get(&bob_id).unwrap().hp, 90);
        assert_eq!(alice.world().entities().len(), 2);
        assert_eq!(bob.world().entities().len(), 2);

        handle.shutdown();
    }

    /// Blocks requested by one client appear on the other
    #[tokio::test]
    async fn block_placement_propagates() {
        let (handle, tcp, udp) = start_server().await;

        let mut alice = joined("Alice", tcp, udp, 110.0, 90.0).await;
        let mut bob = joined("Bob", tcp, udp, -200.0, 0.0).await;
        run_both(&mut alice, &mut bob, Duration::from_millis(300)).await;

        alice.place_block().await.unwrap();
        alice.place_block().await.unwrap();
        run_both(&mut alice, &mut bob, Duration::from_millis(300)).await;

        let cell = shared::BlockPos { x: 100, y: 100 };
        assert_eq!(bob.world().blocks().len(), 1);
        assert!(bob.world().blocks().get(cell).is_some());
        assert_eq!(alice.world().blocks().len(), 1);
        assert!(alice.world().blocks().get(cell).is_some());

        handle.shutdown();
    }

    /// Self-reported positions are relayed to the other clients
    #[tokio::test]
    async fn position_relay_between_clients() {
        let (handle, tcp, udp) = start_server().await;
        let mut alice = joined("Alice", tcp, udp, 0.0, 0.0).await;

        // A bare-bones peer speaking the protocol by hand.
        let mut peer = TcpStream::connect(("127.0.0.1", tcp)).await.unwrap();
        write_packet(
            &mut peer,
            &Packet::PlayerJoin {
                id: "peer".into(),
                name: "Peer".into(),
            },
        )
        .await
        .unwrap();
        write_packet(&mut peer, &Packet::CreateEntityPlayer(spec("peer", 200.0, 0.0)))
            .await
            .unwrap();
        let peer_udp = UdpSocket::bind("127.0.0.1:0").await.unwrap();

        let frame = codec::encode_position(&PositionUpdate {
            id: "peer".into(),
            position: Vector2::new(33.0, 44.0),
            direction: Vector2::RIGHT,
            timestamp: shared::timestamp_millis(),
        });

        let mut relayed = false;
        for _ in 0..40 {
            peer_udp.send_to(&frame, ("127.0.0.1", udp)).await.unwrap();
            alice.run_for(Duration::from_millis(50)).await.unwrap();

            if let Some(remote) = alice.world().entities().get("peer") {
                if remote.position == Vector2::new(33.0, 44.0) {
                    relayed = true;
                    break;
                }
            }
        }
        assert!(relayed, "peer position never reached Alice");

        // Alice's own frames are relayed to the peer too.
        let mut buf = [0u8; 1024];
        let alice_id = alice.world().player_id().unwrap().to_string();
        let mut heard = false;
        for _ in 0..40 {
            alice.run_for(Duration::from_millis(20)).await.unwrap();
            if let Ok(Ok((len, _))) =
                tokio::time::timeout(Duration::from_millis(20), peer_udp.recv_from(&mut buf)).await
            {
                if let Ok(Frame::Position(update)) = codec::decode(&buf[..len]) {
                    if update.id == alice_id {
                        heard = true;
                        break;
                    }
                }
            }
        }
        assert!(heard, "Alice's position never reached the peer");

        // Closing the peer's connection removes its player everywhere.
        drop(peer);
        alice.run_for(Duration::from_millis(300)).await.unwrap();
        assert!(!alice.world().entities().contains("peer"));

        handle.shutdown();
    }
}
