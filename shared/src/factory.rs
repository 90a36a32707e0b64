//! Turns creation packets into entities and entities back into packets.

use crate::entity::{Entity, EntityKind};
use crate::packets::{EntitySpec, Packet, PacketKind};
use crate::store::EntityStore;
use crate::MAX_ENTITY_ID_LEN;
use log::{debug, warn};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum FactoryError {
    #[error("no entity creator registered for {0} packets")]
    Unregistered(PacketKind),

    #[error("entity has {expected} shapes but the packet carries {got} shape texts")]
    ShapeMismatch { expected: usize, got: usize },

    #[error("entity id is {len} bytes, longer than {max}")]
    IdTooLong { len: usize, max: usize },
}

pub type Creator = fn(&Packet, &EntityStore) -> Result<Entity, FactoryError>;

/// Registry of entity creators keyed by packet kind.
pub struct EntityFactory {
    creators: HashMap<PacketKind, Creator>,
}

impl Default for EntityFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityFactory {
    pub fn new() -> Self {
        let mut creators: HashMap<PacketKind, Creator> = HashMap::new();
        creators.insert(PacketKind::CreateEntity, create_basic);
        creators.insert(PacketKind::CreateEntityPlayer, create_player);
        creators.insert(PacketKind::CreateEntityProjectile, create_projectile);
        Self { creators }
    }

    pub fn handles(&self, kind: PacketKind) -> bool {
        self.creators.contains_key(&kind)
    }

    pub fn create(&self, packet: &Packet, store: &EntityStore) -> Result<Entity, FactoryError> {
        let creator = self
            .creators
            .get(&packet.kind())
            .ok_or(FactoryError::Unregistered(packet.kind()))?;
        let entity = creator(packet, store)?;
        debug!("Created {:?} entity {} from {} packet", entity.kind, entity.id, packet.kind());
        Ok(entity)
    }
}

/// The creation packet that reproduces `entity` on a peer.
pub fn packet_for(entity: &Entity) -> Packet {
    let spec = entity.to_spec();
    match entity.kind {
        EntityKind::Basic => Packet::CreateEntity(spec),
        EntityKind::Player => Packet::CreateEntityPlayer(spec),
        EntityKind::Projectile { trajectory } => Packet::CreateEntityProjectile { spec, trajectory },
    }
}

fn create_basic(packet: &Packet, store: &EntityStore) -> Result<Entity, FactoryError> {
    let Packet::CreateEntity(spec) = packet else {
        return Err(FactoryError::Unregistered(packet.kind()));
    };
    let entity = Entity::new(spec.id.clone(), spec.name.clone(), spec.position());
    apply_base(spec, entity, store)
}

fn create_player(packet: &Packet, store: &EntityStore) -> Result<Entity, FactoryError> {
    let Packet::CreateEntityPlayer(spec) = packet else {
        return Err(FactoryError::Unregistered(packet.kind()));
    };
    let entity = Entity::player(spec.id.clone(), spec.name.clone(), spec.position());
    apply_base(spec, entity, store)
}

fn create_projectile(packet: &Packet, store: &EntityStore) -> Result<Entity, FactoryError> {
    let Packet::CreateEntityProjectile { spec, trajectory } = packet else {
        return Err(FactoryError::Unregistered(packet.kind()));
    };
    let entity = Entity::projectile(spec.id.clone(), spec.name.clone(), spec.position(), *trajectory);
    apply_base(spec, entity, store)
}

/// Copies the common packet fields onto a freshly built entity.
///
/// Exceptions naming entities unknown to `store` are dropped.
fn apply_base(spec: &EntitySpec, mut entity: Entity, store: &EntityStore) -> Result<Entity, FactoryError> {
    if spec.id.len() > MAX_ENTITY_ID_LEN {
        return Err(FactoryError::IdTooLong {
            len: spec.id.len(),
            max: MAX_ENTITY_ID_LEN,
        });
    }
    if !spec.shape_texts.is_empty() && spec.shape_texts.len() != entity.shapes.len() {
        return Err(FactoryError::ShapeMismatch {
            expected: entity.shapes.len(),
            got: spec.shape_texts.len(),
        });
    }

    entity.apply_spec(spec);
    entity.clear_dirty();

    entity.exceptions.retain(|id| {
        let known = store.contains(id);
        if !known {
            warn!("Dropping unknown collision exception {} for {}", id, spec.id);
        }
        known
    });

    Ok(entity)
}
