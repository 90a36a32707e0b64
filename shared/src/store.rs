//! Owning containers for entities and blocks.

use crate::entity::{Block, BlockPos, CollisionEffect, Entity};
use crate::math::Vector2;
use log::{debug, warn};
use std::collections::BTreeMap;

/// Entities by id, plus the deletions waiting for the end of the tick.
///
/// Iteration follows id order so replication output is stable.
#[derive(Debug, Default)]
pub struct EntityStore {
    entities: BTreeMap<String, Entity>,
    pending_deletion: Vec<String>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the entity with the same id. Returns the previous one.
    pub fn insert(&mut self, entity: Entity) -> Option<Entity> {
        self.entities.insert(entity.id.clone(), entity)
    }

    pub fn get(&self, id: &str) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Entity> {
        self.entities.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entities.contains_key(id)
    }

    /// Removes an entity outright, bypassing the deletion queue.
    pub fn remove(&mut self, id: &str) -> Option<Entity> {
        self.entities.remove(id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Entity> {
        self.entities.values_mut()
    }

    pub fn ids(&self) -> Vec<String> {
        self.entities.keys().cloned().collect()
    }

    /// Queues `id` for removal at the end of the tick. Queuing twice is a no-op.
    pub fn mark_for_deletion(&mut self, id: &str) {
        if !self.pending_deletion.iter().any(|pending| pending == id) {
            self.pending_deletion.push(id.to_string());
        }
    }

    pub fn is_pending_deletion(&self, id: &str) -> bool {
        self.pending_deletion.iter().any(|pending| pending == id)
    }

    /// Removes every queued entity and returns the ids that were actually
    /// present, in queue order.
    pub fn drain_pending(&mut self) -> Vec<String> {
        let pending = std::mem::take(&mut self.pending_deletion);
        pending
            .into_iter()
            .filter(|id| self.entities.remove(id).is_some())
            .collect()
    }

    pub fn clear_dirty(&mut self) {
        for entity in self.entities.values_mut() {
            entity.clear_dirty();
        }
    }

    /// Ids of entities whose position changed, in id order.
    pub fn dirty_ids(&self) -> Vec<String> {
        self.entities
            .values()
            .filter(|e| e.is_dirty())
            .map(|e| e.id.clone())
            .collect()
    }

    /// Applies the effect produced by `source`'s collision hook.
    ///
    /// `source` may currently be taken out of the store; deletion is queued by
    /// id either way. Returns the id of a damaged entity that survived, so the
    /// caller can publish its new hp.
    pub fn apply_effect(&mut self, source: &str, effect: &CollisionEffect) -> Option<String> {
        let CollisionEffect::Damage {
            target,
            amount,
            despawn_self,
        } = effect
        else {
            return None;
        };

        if *despawn_self {
            self.mark_for_deletion(source);
        }

        let target_id = target.as_deref()?;
        let entity = self.entities.get_mut(target_id)?;
        entity.take_damage(*amount);
        debug!("{} dealt {} damage to {} (hp {})", source, amount, target_id, entity.hp);

        if entity.is_alive() {
            Some(target_id.to_string())
        } else {
            self.mark_for_deletion(target_id);
            None
        }
    }
}

/// Placed blocks, at most one per integer cell.
#[derive(Debug, Default)]
pub struct BlockStore {
    blocks: Vec<Block>,
}

impl BlockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Places a block at `pos` (truncated). Returns `false` if the cell is taken.
    pub fn add_block(&mut self, pos: Vector2) -> bool {
        if self.blocks.iter().any(|b| b.is_at(pos)) {
            warn!("Cannot place block at ({}, {}): cell occupied", pos.x, pos.y);
            return false;
        }

        self.blocks.push(Block::new(BlockPos::from_world(pos)));
        true
    }

    pub fn get(&self, pos: BlockPos) -> Option<&Block> {
        self.blocks.iter().find(|b| b.pos == pos)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Block> {
        self.blocks.iter()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}
