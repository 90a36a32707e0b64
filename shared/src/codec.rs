//! Binary frames for the unreliable (UDP) channel.
//!
//! All integers and floats are big-endian.
//!
//! ```text
//! position: [1u8][id_len: u32][id][x: f64][y: f64][dir_x: f64][dir_y: f64][timestamp: i64]
//! bulk:     [2u8][count: u32] then count × [id_len: u32][id][x: f64][y: f64]
//! ```
//!
//! Decoders check the remaining length before every read and ignore
//! trailing bytes.

use crate::math::Vector2;
use crate::{BULK_CHUNK_SIZE, MAX_BULK_FRAME_BYTES};
use std::string::FromUtf8Error;
use thiserror::Error;

pub const POSITION_FRAME: u8 = 1;
pub const BULK_FRAME: u8 = 2;

#[derive(Debug, Error, PartialEq)]
pub enum CodecError {
    #[error("frame truncated: needed {needed} bytes, {remaining} remaining")]
    Truncated { needed: usize, remaining: usize },

    #[error("unknown frame type {0}")]
    UnknownFrame(u8),

    #[error("entity id is not valid UTF-8: {0}")]
    InvalidId(#[from] FromUtf8Error),

    #[error("frame type does not match the expected one")]
    UnexpectedFrame,
}

/// A client's own position and facing.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionUpdate {
    pub id: String,
    pub position: Vector2,
    pub direction: Vector2,
    /// Milliseconds since the Unix epoch on the sender's clock.
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BulkEntry {
    pub id: String,
    pub position: Vector2,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Position(PositionUpdate),
    Bulk(Vec<BulkEntry>),
}

pub fn encode_position(update: &PositionUpdate) -> Vec<u8> {
    let id = update.id.as_bytes();
    let mut buf = Vec::with_capacity(1 + 4 + id.len() + 8 * 5);
    buf.push(POSITION_FRAME);
    buf.extend_from_slice(&(id.len() as u32).to_be_bytes());
    buf.extend_from_slice(id);
    buf.extend_from_slice(&update.position.x.to_be_bytes());
    buf.extend_from_slice(&update.position.y.to_be_bytes());
    buf.extend_from_slice(&update.direction.x.to_be_bytes());
    buf.extend_from_slice(&update.direction.y.to_be_bytes());
    buf.extend_from_slice(&update.timestamp.to_be_bytes());
    buf
}

/// Encodes every entry into a single bulk frame.
pub fn encode_bulk(entries: &[BulkEntry]) -> Vec<u8> {
    let body: usize = entries.iter().map(bulk_entry_len).sum();
    let mut buf = Vec::with_capacity(BULK_HEADER_LEN + body);
    buf.push(BULK_FRAME);
    buf.extend_from_slice(&(entries.len() as u32).to_be_bytes());
    for entry in entries {
        let id = entry.id.as_bytes();
        buf.extend_from_slice(&(id.len() as u32).to_be_bytes());
        buf.extend_from_slice(id);
        buf.extend_from_slice(&entry.position.x.to_be_bytes());
        buf.extend_from_slice(&entry.position.y.to_be_bytes());
    }
    buf
}

const BULK_HEADER_LEN: usize = 1 + 4;

fn bulk_entry_len(entry: &BulkEntry) -> usize {
    4 + entry.id.len() + 16
}

/// Splits `entries` into bulk frames of at most [`BULK_CHUNK_SIZE`] entries
/// and at most [`MAX_BULK_FRAME_BYTES`] bytes. An entry too large for the
/// budget on its own gets a frame to itself. No entries, no frames.
pub fn encode_bulk_chunks(entries: &[BulkEntry]) -> Vec<Vec<u8>> {
    let mut frames = Vec::new();
    let mut start = 0;
    let mut size = BULK_HEADER_LEN;

    for (i, entry) in entries.iter().enumerate() {
        let len = bulk_entry_len(entry);
        let full = i - start == BULK_CHUNK_SIZE || size + len > MAX_BULK_FRAME_BYTES;
        if full && i > start {
            frames.push(encode_bulk(&entries[start..i]));
            start = i;
            size = BULK_HEADER_LEN;
        }
        size += len;
    }
    if start < entries.len() {
        frames.push(encode_bulk(&entries[start..]));
    }

    frames
}

pub fn decode(data: &[u8]) -> Result<Frame, CodecError> {
    let mut reader = FrameReader::new(data);
    match reader.u8()? {
        POSITION_FRAME => decode_position_body(&mut reader).map(Frame::Position),
        BULK_FRAME => decode_bulk_body(&mut reader).map(Frame::Bulk),
        other => Err(CodecError::UnknownFrame(other)),
    }
}

pub fn decode_position(data: &[u8]) -> Result<PositionUpdate, CodecError> {
    match decode(data)? {
        Frame::Position(update) => Ok(update),
        Frame::Bulk(_) => Err(CodecError::UnexpectedFrame),
    }
}

pub fn decode_bulk(data: &[u8]) -> Result<Vec<BulkEntry>, CodecError> {
    match decode(data)? {
        Frame::Bulk(entries) => Ok(entries),
        Frame::Position(_) => Err(CodecError::UnexpectedFrame),
    }
}

fn decode_position_body(reader: &mut FrameReader<'_>) -> Result<PositionUpdate, CodecError> {
    let id_len = reader.u32()? as usize;
    let id = reader.string(id_len)?;
    let position = reader.vector()?;
    let direction = reader.vector()?;
    let timestamp = reader.i64()?;

    Ok(PositionUpdate {
        id,
        position,
        direction,
        timestamp,
    })
}

fn decode_bulk_body(reader: &mut FrameReader<'_>) -> Result<Vec<BulkEntry>, CodecError> {
    let count = reader.u32()? as usize;
    // Each entry takes at least 20 bytes; never trust `count` for the allocation.
    let mut entries = Vec::with_capacity(count.min(reader.remaining() / 20));

    for _ in 0..count {
        let id_len = reader.u32()? as usize;
        reader.require(id_len.saturating_add(16))?;
        let id = reader.string(id_len)?;
        let position = reader.vector()?;
        entries.push(BulkEntry { id, position });
    }

    Ok(entries)
}

struct FrameReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> FrameReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    fn require(&self, needed: usize) -> Result<(), CodecError> {
        let remaining = self.remaining();
        if remaining < needed {
            return Err(CodecError::Truncated { needed, remaining });
        }
        Ok(())
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        self.require(len)?;
        let bytes = &self.data[self.offset..self.offset + len];
        self.offset += len;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32, CodecError> {
        self.array().map(u32::from_be_bytes)
    }

    fn i64(&mut self) -> Result<i64, CodecError> {
        self.array().map(i64::from_be_bytes)
    }

    fn f64(&mut self) -> Result<f64, CodecError> {
        self.array().map(f64::from_be_bytes)
    }

    fn vector(&mut self) -> Result<Vector2, CodecError> {
        Ok(Vector2::new(self.f64()?, self.f64()?))
    }

    fn string(&mut self, len: usize) -> Result<String, CodecError> {
        Ok(String::from_utf8(self.take(len)?.to_vec())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(count: usize) -> Vec<BulkEntry> {
        (0..count)
            .map(|i| BulkEntry {
                id: format!("entity-{}", i),
                position: Vector2::new(i as f64 * 1.5, -(i as f64)),
            })
            .collect()
    }

    fn sample_update() -> PositionUpdate {
        PositionUpdate {
            id: "p1".to_string(),
            position: Vector2::new(12.5, 7.25),
            direction: Vector2::new(0.0, 1.0),
            timestamp: 1000,
        }
    }

    #[test]
    fn test_position_frame_layout() {
        let bytes = encode_position(&sample_update());

        assert_eq!(bytes.len(), 1 + 4 + 2 + 8 * 5);
        assert_eq!(bytes[0], POSITION_FRAME);
        assert_eq!(&bytes[1..5], &2u32.to_be_bytes());
        assert_eq!(&bytes[5..7], b"p1");
        assert_eq!(&bytes[7..15], &12.5f64.to_be_bytes());
        assert_eq!(&bytes[39..47], &1000i64.to_be_bytes());
    }

    #[test]
    fn test_position_frame_roundtrip() {
        let update = sample_update();
        let decoded = decode_position(&encode_position(&update)).unwrap();
        assert_eq!(decoded, update);
    }

    #[test]
    fn test_bulk_roundtrip_sizes() {
        for count in [0, 1, 17, 18, 100] {
            let original = entries(count);
            let decoded = decode_bulk(&encode_bulk(&original)).unwrap();
            assert_eq!(decoded, original, "count {}", count);
        }
    }

    #[test]
    fn test_bulk_chunking() {
        assert!(encode_bulk_chunks(&[]).is_empty());

        for (count, frames) in [(1, 1), (17, 1), (18, 2), (34, 2), (35, 3), (100, 6)] {
            let original = entries(count);
            let chunks = encode_bulk_chunks(&original);
            assert_eq!(chunks.len(), frames, "count {}", count);

            let mut rebuilt = Vec::new();
            for chunk in &chunks {
                let decoded = decode_bulk(chunk).unwrap();
                assert!(decoded.len() <= BULK_CHUNK_SIZE);
                rebuilt.extend(decoded);
            }
            assert_eq!(rebuilt, original);
        }
    }

    #[test]
    fn test_bulk_chunks_respect_byte_budget() {
        let original: Vec<BulkEntry> = (0..17)
            .map(|i| BulkEntry {
                id: format!("{:064}", i),
                position: Vector2::new(i as f64, 1.0),
            })
            .collect();

        let chunks = encode_bulk_chunks(&original);
        assert!(chunks.len() > 1);
        assert!(chunks.iter().all(|c| c.len() <= MAX_BULK_FRAME_BYTES));

        let rebuilt: Vec<BulkEntry> = chunks.iter().flat_map(|c| decode_bulk(c).unwrap()).collect();
        assert_eq!(rebuilt, original);
    }

    #[test]
    fn test_oversized_entry_isolated() {
        let huge = BulkEntry {
            id: "x".repeat(70_000),
            position: Vector2::ZERO,
        };
        let mut original = entries(2);
        original.insert(1, huge);

        let chunks = encode_bulk_chunks(&original);
        assert_eq!(chunks.len(), 3);
        assert_eq!(decode_bulk(&chunks[0]).unwrap(), original[..1].to_vec());
        assert_eq!(decode_bulk(&chunks[2]).unwrap(), original[2..].to_vec());
        assert!(chunks[2].len() <= MAX_BULK_FRAME_BYTES);
    }

    #[test]
    fn test_truncated_frames() {
        let bytes = encode_position(&sample_update());
        for cut in 0..bytes.len() {
            assert!(
                matches!(decode(&bytes[..cut]), Err(CodecError::Truncated { .. })),
                "cut at {}",
                cut
            );
        }

        let bulk = encode_bulk(&entries(3));
        for cut in 1..bulk.len() {
            assert!(decode_bulk(&bulk[..cut]).is_err(), "cut at {}", cut);
        }
    }

    #[test]
    fn test_bulk_entry_needs_id_and_coordinates() {
        // Claims one entry with a 2-byte id but only carries the id and one f64.
        let mut bytes = vec![BULK_FRAME];
        bytes.extend_from_slice(&1u32.to_be_bytes());
        bytes.extend_from_slice(&2u32.to_be_bytes());
        bytes.extend_from_slice(b"ab");
        bytes.extend_from_slice(&1.0f64.to_be_bytes());

        assert_eq!(
            decode(&bytes),
            Err(CodecError::Truncated {
                needed: 18,
                remaining: 10
            })
        );
    }

    #[test]
    fn test_unknown_and_unexpected_frames() {
        assert_eq!(decode(&[9, 0, 0]), Err(CodecError::UnknownFrame(9)));
        assert_eq!(
            decode_bulk(&encode_position(&sample_update())),
            Err(CodecError::UnexpectedFrame)
        );
        assert_eq!(
            decode_position(&encode_bulk(&entries(1))),
            Err(CodecError::UnexpectedFrame)
        );
    }

    #[test]
    fn test_invalid_utf8_id() {
        let mut bytes = vec![POSITION_FRAME];
        bytes.extend_from_slice(&2u32.to_be_bytes());
        bytes.extend_from_slice(&[0xff, 0xfe]);
        bytes.extend_from_slice(&[0u8; 40]);
        assert!(matches!(decode(&bytes), Err(CodecError::InvalidId(_))));
    }

    #[test]
    fn test_trailing_bytes_ignored() {
        let mut bytes = encode_bulk(&entries(2));
        bytes.extend_from_slice(&[1, 2, 3]);
        assert_eq!(decode_bulk(&bytes).unwrap(), entries(2));
    }

    #[test]
    fn test_huge_count_does_not_allocate() {
        let mut bytes = vec![BULK_FRAME];
        bytes.extend_from_slice(&u32::MAX.to_be_bytes());
        assert!(matches!(decode(&bytes), Err(CodecError::Truncated { .. })));
    }
}
