//! Reliable (TCP) packets.
//!
//! Every packet travels as a big-endian `u32` length followed by the bincode
//! encoding of [`Packet`]. Structural events only: spawning, despawning,
//! joining and block placement. Positions travel over UDP, see
//! [`crate::codec`].

use crate::math::Vector2;
use crate::MAX_PACKET_SIZE;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

#[derive(Debug, Error)]
pub enum PacketError {
    #[error("failed to encode packet: {0}")]
    Encode(#[source] bincode::Error),

    #[error("failed to decode packet: {0}")]
    Decode(#[source] bincode::Error),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("frame of {0} bytes exceeds the packet size limit")]
    FrameTooLarge(usize),
}

/// Base fields shared by every entity creation and update packet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EntitySpec {
    pub id: String,
    pub name: String,
    pub x: f64,
    pub y: f64,
    pub hp: i32,
    /// Ids of entities this one never collides with.
    pub exceptions: Vec<String>,
    /// One label per shape, empty string for unlabelled shapes.
    pub shape_texts: Vec<String>,
}

impl EntitySpec {
    pub fn position(&self) -> Vector2 {
        Vector2::new(self.x, self.y)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Packet {
    CreateEntity(EntitySpec),
    CreateEntityPlayer(EntitySpec),
    CreateEntityProjectile {
        spec: EntitySpec,
        trajectory: Vector2,
    },
    UpdateEntity(EntitySpec),
    DeleteEntity {
        id: String,
    },
    PlayerJoin {
        id: String,
        name: String,
    },
    CreateBlock {
        x: i32,
        y: i32,
    },
}

/// Discriminant of [`Packet`], used as the entity factory's registry key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PacketKind {
    CreateEntity,
    CreateEntityPlayer,
    CreateEntityProjectile,
    UpdateEntity,
    DeleteEntity,
    PlayerJoin,
    CreateBlock,
}

impl fmt::Display for PacketKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl Packet {
    pub fn kind(&self) -> PacketKind {
        match self {
            Packet::CreateEntity(_) => PacketKind::CreateEntity,
            Packet::CreateEntityPlayer(_) => PacketKind::CreateEntityPlayer,
            Packet::CreateEntityProjectile { .. } => PacketKind::CreateEntityProjectile,
            Packet::UpdateEntity(_) => PacketKind::UpdateEntity,
            Packet::DeleteEntity { .. } => PacketKind::DeleteEntity,
            Packet::PlayerJoin { .. } => PacketKind::PlayerJoin,
            Packet::CreateBlock { .. } => PacketKind::CreateBlock,
        }
    }

    /// The entity fields carried by create and update packets.
    pub fn entity_spec(&self) -> Option<&EntitySpec> {
        match self {
            Packet::CreateEntity(spec)
            | Packet::CreateEntityPlayer(spec)
            | Packet::UpdateEntity(spec)
            | Packet::CreateEntityProjectile { spec, .. } => Some(spec),
            _ => None,
        }
    }

    pub fn is_entity_creation(&self) -> bool {
        matches!(
            self.kind(),
            PacketKind::CreateEntity
                | PacketKind::CreateEntityPlayer
                | PacketKind::CreateEntityProjectile
        )
    }

    pub fn serialize(&self) -> Result<Vec<u8>, PacketError> {
        bincode::serialize(self).map_err(PacketError::Encode)
    }

    pub fn deserialize(data: &[u8]) -> Result<Self, PacketError> {
        bincode::deserialize(data).map_err(PacketError::Decode)
    }

    /// Serializes with the length prefix, ready to be written to a stream.
    pub fn to_frame(&self) -> Result<Vec<u8>, PacketError> {
        let body = self.serialize()?;
        if body.len() > MAX_PACKET_SIZE {
            return Err(PacketError::FrameTooLarge(body.len()));
        }

        let mut frame = Vec::with_capacity(4 + body.len());
        frame.extend_from_slice(&(body.len() as u32).to_be_bytes());
        frame.extend_from_slice(&body);
        Ok(frame)
    }
}

/// Reads one length-prefixed packet.
///
/// Returns `Ok(None)` on a clean end of stream before a new frame starts.
pub async fn read_packet<R>(reader: &mut R) -> Result<Option<Packet>, PacketError>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_PACKET_SIZE {
        return Err(PacketError::FrameTooLarge(len));
    }

    let mut body = vec![0u8; len];
    reader.read_exact(&mut body).await?;
    Packet::deserialize(&body).map(Some)
}

/// Writes one length-prefixed packet and flushes.
pub async fn write_packet<W>(writer: &mut W, packet: &Packet) -> Result<(), PacketError>
where
    W: AsyncWrite + Unpin,
{
    let frame = packet.to_frame()?;
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}
