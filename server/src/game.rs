//! Authoritative world state and the fixed-rate simulation tick.

use log::{debug, info, warn};
use shared::codec::PositionUpdate;
use shared::collision::{find_collisions, resolve_collisions};
use shared::{
    packet_for, BlockStore, EntityFactory, EntitySpec, EntityStore, FactoryError, Packet, Vector2,
};

/// What a tick changed, for the network layer to publish.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TickOutcome {
    pub tick: u64,
    /// Entities removed this tick; each needs a reliable `DeleteEntity`.
    pub deleted: Vec<String>,
    /// Entities whose position changed this tick, in id order.
    pub changed: Vec<String>,
    /// Surviving entities whose hp changed.
    pub damaged: Vec<String>,
}

/// Entities, blocks and the factory that builds entities from packets.
///
/// Owned by the server loop, which is the only writer.
pub struct World {
    entities: EntityStore,
    blocks: BlockStore,
    factory: EntityFactory,
    tick: u64,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    pub fn new() -> Self {
        Self {
            entities: EntityStore::new(),
            blocks: BlockStore::new(),
            factory: EntityFactory::new(),
            tick: 0,
        }
    }

    pub fn entities(&self) -> &EntityStore {
        &self.entities
    }

    pub fn entities_mut(&mut self) -> &mut EntityStore {
        &mut self.entities
    }

    pub fn blocks(&self) -> &BlockStore {
        &self.blocks
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    /// Instantiates the entity described by a creation packet.
    pub fn spawn(&mut self, packet: &Packet) -> Result<String, FactoryError> {
        let entity = self.factory.create(packet, &self.entities)?;
        let id = entity.id.clone();
        info!("Entity created: {} ({}) at ({:.1}, {:.1})", id, entity.name, entity.position.x, entity.position.y);

        if self.entities.insert(entity).is_some() {
            warn!("Entity {} replaced an existing entity with the same id", id);
        }
        Ok(id)
    }

    /// Re-applies base fields to a known entity. Returns false for unknown ids.
    pub fn update_entity(&mut self, spec: &EntitySpec) -> bool {
        match self.entities.get_mut(&spec.id) {
            Some(entity) => {
                entity.apply_spec(spec);
                true
            }
            None => {
                warn!("Update for unknown entity {}", spec.id);
                false
            }
        }
    }

    /// Queues a removal for the end of the next tick.
    pub fn queue_deletion(&mut self, id: &str) -> bool {
        if !self.entities.contains(id) {
            return false;
        }
        self.entities.mark_for_deletion(id);
        true
    }

    /// Removes an entity outside the tick, e.g. when its owner disconnects.
    pub fn remove_now(&mut self, id: &str) -> bool {
        self.entities.remove(id).is_some()
    }

    pub fn place_block(&mut self, x: i32, y: i32) -> bool {
        let placed = self.blocks.add_block(Vector2::new(x as f64, y as f64));
        if placed {
            info!("Block placed at ({}, {})", x, y);
        }
        placed
    }

    /// Applies a client's self-reported position. Unknown ids are ignored.
    pub fn apply_position(&mut self, update: &PositionUpdate) -> bool {
        let Some(entity) = self.entities.get_mut(&update.id) else {
            return false;
        };
        if !update.position.is_finite() || !update.direction.is_finite() {
            warn!("Ignoring non-finite position for {}", update.id);
            return false;
        }

        entity.set_position(update.position);
        entity.turn_to(update.direction);
        true
    }

    /// Packets that rebuild the whole world on a freshly joined client:
    /// one creation per entity, then one per block.
    pub fn snapshot(&self) -> Vec<Packet> {
        let entities = self.entities.iter().map(packet_for);
        let blocks = self.blocks.iter().map(|b| Packet::CreateBlock {
            x: b.pos.x,
            y: b.pos.y,
        });
        entities.chain(blocks).collect()
    }

    /// Advances the simulation by `dt` seconds.
    pub fn tick(&mut self, dt: f64) -> TickOutcome {
        self.tick += 1;
        self.entities.clear_dirty();

        let mut damaged: Vec<String> = Vec::new();

        for id in self.entities.ids() {
            if self.entities.is_pending_deletion(&id) {
                continue;
            }
            // Taken out so it can be mutated alongside the rest of the store.
            let Some(mut entity) = self.entities.remove(&id) else {
                continue;
            };

            entity.update_lerp();
            entity.integrate(dt);

            let hits = find_collisions(&entity, &self.entities, &self.blocks);
            for hit in &hits {
                let effect = entity.on_collision(&hit.other);
                if let Some(target) = self.entities.apply_effect(&entity.id, &effect) {
                    if !damaged.contains(&target) {
                        damaged.push(target);
                    }
                }
            }
            resolve_collisions(&mut entity, &hits, &mut self.entities, &self.blocks, dt);

            self.entities.insert(entity);
        }

        let deleted = self.entities.drain_pending();
        for id in &deleted {
            info!("Entity deleted: {}", id);
        }
        damaged.retain(|id| self.entities.contains(id));

        let changed = self.entities.dirty_ids();
        if !changed.is_empty() {
            debug!("Tick {}: {} entities changed", self.tick, changed.len());
        }

        TickOutcome {
            tick: self.tick,
            deleted,
            changed,
            damaged,
        }
    }
}
