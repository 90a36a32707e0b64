//! Turns a tick's changes into datagrams.

use crate::game::TickOutcome;
use shared::codec::{self, BulkEntry};
use shared::EntityStore;

/// Running totals, logged periodically by the server loop.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReplicationStats {
    pub ticks: u64,
    pub frames: u64,
    pub entries: u64,
}

/// Bulk frames for every entity listed in `outcome.changed`.
///
/// Entities missing from the store (removed later in the same tick) are
/// skipped. Returns no frames when nothing changed.
pub fn bulk_frames(outcome: &TickOutcome, entities: &EntityStore) -> Vec<Vec<u8>> {
    let entries: Vec<BulkEntry> = outcome
        .changed
        .iter()
        .filter_map(|id| entities.get(id))
        .map(|e| BulkEntry {
            id: e.id.clone(),
            position: e.position,
        })
        .collect();

    codec::encode_bulk_chunks(&entries)
}

impl ReplicationStats {
    pub fn record(&mut self, changed: usize, frames: usize) {
        self.ticks += 1;
        self.entries += changed as u64;
        self.frames += frames as u64;
    }
}
