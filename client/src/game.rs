//! Client-side mirror of the arena.
//!
//! The client owns its player's movement: it integrates and collides the
//! player locally against the mirrored world and streams the result to the
//! server. Everything else follows reliable packets and position frames from
//! the server.

use log::{debug, info, warn};
use shared::codec::{BulkEntry, Frame, PositionUpdate};
use shared::collision::{find_collisions, resolve_collisions_static};
use shared::entity::generate_id;
use shared::{
    timestamp_millis, BlockStore, Entity, EntityFactory, EntitySpec, EntityStore, Packet, Vector2,
    BLOCK_SIZE,
};

/// Distance from the shooter's center at which projectiles appear.
pub const PROJECTILE_SPAWN_DISTANCE: f64 = 30.0;

pub struct ClientWorld {
    entities: EntityStore,
    blocks: BlockStore,
    factory: EntityFactory,
    player_id: Option<String>,
}

impl Default for ClientWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientWorld {
    pub fn new() -> Self {
        Self {
            entities: EntityStore::new(),
            blocks: BlockStore::new(),
            factory: EntityFactory::new(),
            player_id: None,
        }
    }

    pub fn entities(&self) -> &EntityStore {
        &self.entities
    }

    pub fn blocks(&self) -> &BlockStore {
        &self.blocks
    }

    pub fn player_id(&self) -> Option<&str> {
        self.player_id.as_deref()
    }

    pub fn player(&self) -> Option<&Entity> {
        self.entities.get(self.player_id.as_deref()?)
    }

    pub fn player_mut(&mut self) -> Option<&mut Entity> {
        let id = self.player_id.as_deref()?;
        self.entities.get_mut(id)
    }

    /// Creates the local player and returns the packets announcing it.
    pub fn spawn_player(&mut self, name: &str, position: Vector2) -> Vec<Packet> {
        let id = generate_id();
        let player = Entity::player(id.clone(), name, position);
        let announce = Packet::CreateEntityPlayer(player.to_spec());

        self.entities.insert(player);
        self.player_id = Some(id.clone());
        info!("Spawned local player {} ({}) at {:?}", name, id, position);

        vec![
            Packet::PlayerJoin {
                id,
                name: name.to_string(),
            },
            announce,
        ]
    }

    /// Applies a reliable packet received from the server.
    pub fn apply_packet(&mut self, packet: Packet) {
        match packet {
            packet if packet.is_entity_creation() => {
                if let Some(spec) = packet.entity_spec() {
                    if self.entities.contains(&spec.id) {
                        debug!("Entity {} already known, ignoring {}", spec.id, packet.kind());
                        return;
                    }
                }

                match self.factory.create(&packet, &self.entities) {
                    Ok(entity) => {
                        info!("Entity created: {} ({})", entity.name, entity.id);
                        self.entities.insert(entity);
                    }
                    Err(e) => warn!("Could not create entity from {}: {}", packet.kind(), e),
                }
            }

            Packet::UpdateEntity(spec) => self.apply_update(&spec),

            Packet::DeleteEntity { id } => {
                if self.entities.remove(&id).is_some() {
                    info!("Entity deleted: {}", id);
                }
                if self.player_id.as_deref() == Some(id.as_str()) {
                    warn!("The server removed our player");
                    self.player_id = None;
                }
            }

            Packet::PlayerJoin { id, name } => {
                info!("Player joined: {} ({})", name, id);
            }

            Packet::CreateBlock { x, y } => {
                self.blocks.add_block(Vector2::new(x as f64, y as f64));
            }

            other => warn!("Unexpected {} packet from server", other.kind()),
        }
    }

    /// Base fields from the server. Our own position stays local.
    fn apply_update(&mut self, spec: &EntitySpec) {
        let own = self.player_id.as_deref() == Some(spec.id.as_str());
        let Some(entity) = self.entities.get_mut(&spec.id) else {
            debug!("Update for unknown entity {}", spec.id);
            return;
        };

        let local_position = entity.position;
        entity.apply_spec(spec);
        if own {
            entity.position = local_position;
        }
    }

    /// Applies a position frame; entries for our own player are ignored.
    pub fn apply_frame(&mut self, frame: Frame) {
        match frame {
            Frame::Position(update) => self.apply_position(&update),
            Frame::Bulk(entries) => {
                for BulkEntry { id, position } in entries {
                    if self.is_own(&id) {
                        continue;
                    }
                    if let Some(entity) = self.entities.get_mut(&id) {
                        entity.set_position(position);
                    }
                }
            }
        }
    }

    fn apply_position(&mut self, update: &PositionUpdate) {
        if self.is_own(&update.id) {
            return;
        }
        if let Some(entity) = self.entities.get_mut(&update.id) {
            entity.set_position(update.position);
            entity.turn_to(update.direction);
        }
    }

    fn is_own(&self, id: &str) -> bool {
        self.player_id.as_deref() == Some(id)
    }

    /// Moves the local player, collides it with the mirrored world and
    /// advances interpolation. Returns the frame to send for our player.
    ///
    /// Mirrored entities are owned by the server and act as fixed obstacles.
    pub fn step(&mut self, dt: f64) -> Option<PositionUpdate> {
        self.entities.clear_dirty();
        for entity in self.entities.iter_mut() {
            entity.update_lerp();
        }

        let id = self.player_id.clone()?;
        let mut player = self.entities.remove(&id)?;

        player.integrate(dt);
        let collisions = find_collisions(&player, &self.entities, &self.blocks);
        if !collisions.is_empty() {
            resolve_collisions_static(&mut player, &collisions, &self.entities, &self.blocks, dt);
        }

        let update = PositionUpdate {
            id,
            position: player.position,
            direction: player.look_direction,
            timestamp: timestamp_millis(),
        };
        self.entities.insert(player);
        Some(update)
    }

    /// A projectile leaving the player along its look direction. It is not
    /// added locally: the server echoes the creation back.
    pub fn fire(&self) -> Option<Packet> {
        let player = self.player()?;
        let heading = player.look_direction.normalize_or(Vector2::UP);
        let position = player.position + heading * PROJECTILE_SPAWN_DISTANCE;

        Some(Packet::CreateEntityProjectile {
            spec: EntitySpec {
                id: generate_id(),
                name: "projectile".to_string(),
                x: position.x,
                y: position.y,
                hp: shared::DEFAULT_HP,
                exceptions: vec![player.id.clone()],
                shape_texts: Vec::new(),
            },
            trajectory: heading,
        })
    }

    /// Places a block on the grid cell under the player and returns the
    /// request for the server. The server never echoes a block back to the
    /// client that placed it, so it goes into the mirror right away. None if
    /// the cell is already taken locally.
    pub fn request_block(&mut self) -> Option<Packet> {
        let player = self.player()?;
        let snap = |v: f64| ((v / BLOCK_SIZE).round() * BLOCK_SIZE) as i32;
        let (x, y) = (snap(player.position.x), snap(player.position.y));

        if !self.blocks.add_block(Vector2::new(x as f64, y as f64)) {
            return None;
        }
        Some(Packet::CreateBlock { x, y })
    }
}
