//! Simulation core shared by the arena server and its clients.
//!
//! - [`math`] and [`shape`]: vectors and the primitive shapes attached to
//!   everything in the world.
//! - [`collision`]: narrow phase (SAT, circle and clamp tests) and the
//!   response physics run once per entity per tick.
//! - [`entity`] and [`store`]: entities, blocks and the containers that own
//!   them, including dirty tracking and deferred deletion.
//! - [`factory`]: creation packets to entities and back.
//! - [`packets`] and [`codec`]: the reliable TCP packets and the compact
//!   UDP position frames.

pub mod codec;
pub mod collision;
pub mod entity;
pub mod factory;
pub mod math;
pub mod packets;
pub mod shape;
pub mod store;

pub use collision::{Body, CollisionData, CollisionType};
pub use entity::{Block, BlockPos, Collidable, CollidableId, CollisionEffect, Entity, EntityKind};
pub use factory::{packet_for, EntityFactory, FactoryError};
pub use math::Vector2;
pub use packets::{EntitySpec, Packet, PacketError, PacketKind};
pub use shape::{Color, Shape, ShapeKind};
pub use store::{BlockStore, EntityStore};

pub const DEFAULT_TCP_PORT: u16 = 56201;
pub const DEFAULT_UDP_PORT: u16 = 56202;
/// Server ticks per second.
pub const TICK_RATE: u32 = 20;

/// Maximum number of entities in one bulk position frame.
pub const BULK_CHUNK_SIZE: usize = 17;
/// Byte budget for one bulk position frame, below a typical path MTU.
pub const MAX_BULK_FRAME_BYTES: usize = 1200;
/// Longest entity id, in bytes, the server accepts.
pub const MAX_ENTITY_ID_LEN: usize = 64;
/// Upper bound on a reliable packet body.
pub const MAX_PACKET_SIZE: usize = 1024 * 1024;
/// Large enough for any frame the codec produces with sane ids.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// Side length of a block.
pub const BLOCK_SIZE: f64 = 50.0;
pub const PLAYER_RADIUS: f64 = 10.0;
pub const DEFAULT_ENTITY_SPEED: f64 = 200.0;
pub const PROJECTILE_SPEED: f64 = 50.0;
pub const PROJECTILE_DAMAGE: i32 = 10;
pub const DEFAULT_HP: i32 = 100;

pub const LOOK_LERP_FACTOR: f64 = 0.2;
pub const POSITION_LERP_FACTOR: f64 = 0.3;

/// Milliseconds since the Unix epoch, as carried by position frames.
pub fn timestamp_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
