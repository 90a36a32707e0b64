//! Entities and blocks, the two kinds of collidables in the world.

use crate::collision::{Body, Pose, WorldShape};
use crate::math::Vector2;
use crate::packets::EntitySpec;
use crate::shape::{Color, Shape, ShapeKind};
use crate::{
    BLOCK_SIZE, DEFAULT_ENTITY_SPEED, DEFAULT_HP, LOOK_LERP_FACTOR, PLAYER_RADIUS,
    POSITION_LERP_FACTOR, PROJECTILE_DAMAGE, PROJECTILE_SPEED,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Integer coordinates of a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
}

impl BlockPos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Truncates a world position towards zero.
    pub fn from_world(pos: Vector2) -> Self {
        Self {
            x: pos.x as i32,
            y: pos.y as i32,
        }
    }

    pub fn to_world(self) -> Vector2 {
        Vector2::new(self.x as f64, self.y as f64)
    }
}

/// Reference to any collidable in the world.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CollidableId {
    Entity(String),
    Block(BlockPos),
}

impl fmt::Display for CollidableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollidableId::Entity(id) => write!(f, "entity {}", id),
            CollidableId::Block(pos) => write!(f, "block ({}, {})", pos.x, pos.y),
        }
    }
}

/// Capability shared by everything the collision manager can test.
pub trait Collidable {
    fn collidable_id(&self) -> CollidableId;
    fn position(&self) -> Vector2;
    fn shapes(&self) -> &[Shape];
    fn body(&self) -> &Body;
    fn hp(&self) -> i32;
    fn max_hp(&self) -> i32;
    fn is_dirty(&self) -> bool;

    fn direction(&self) -> Vector2 {
        Vector2::UP
    }

    fn reacts_to_collision(&self) -> bool {
        true
    }

    /// Entity ids this collidable ignores. One-sided: the other party may
    /// still collide with us.
    fn exceptions(&self) -> &[String] {
        &[]
    }

    fn ignores(&self, other: &CollidableId) -> bool {
        match other {
            CollidableId::Entity(id) => self.exceptions().iter().any(|e| e == id),
            CollidableId::Block(_) => false,
        }
    }

    fn pose(&self) -> Pose {
        Pose::new(self.position(), self.direction())
    }

    /// Shape `index` placed in the world, `None` if it is out of range or
    /// render-only.
    fn world_shape(&self, index: usize) -> Option<WorldShape> {
        let shape = self.shapes().get(index)?;
        WorldShape::from_shape(shape, &self.pose())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum EntityKind {
    Basic,
    Player,
    Projectile { trajectory: Vector2 },
}

/// Side effect requested by an entity when it hits something.
#[derive(Debug, Clone, PartialEq)]
pub enum CollisionEffect {
    None,
    /// Damage `target` (when it is an entity) and optionally remove the source.
    Damage {
        target: Option<String>,
        amount: i32,
        despawn_self: bool,
    },
}

/// Creates a random 128-bit hex id.
pub fn generate_id() -> String {
    format!("{:032x}", rand::random::<u128>())
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub id: String,
    pub name: String,
    pub kind: EntityKind,
    pub position: Vector2,
    pub body: Body,
    pub speed: f64,
    /// Direction requested by input.
    pub move_direction: Vector2,
    /// Set by input, consumed by the next integration step.
    pub move_from_input: bool,
    pub look_target: Vector2,
    /// Interpolated facing, also the pose direction used for collisions.
    pub look_direction: Vector2,
    /// Smoothed position for display.
    pub render_position: Vector2,
    pub shapes: Vec<Shape>,
    pub hp: i32,
    pub max_hp: i32,
    pub exceptions: Vec<String>,
    pub reacts_to_collision: bool,
    dirty: bool,
}

impl Entity {
    /// Basic entity with a single outlined circle of radius 25.
    pub fn new(id: impl Into<String>, name: impl Into<String>, position: Vector2) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: EntityKind::Basic,
            position,
            body: Body::default(),
            speed: DEFAULT_ENTITY_SPEED,
            move_direction: Vector2::ZERO,
            move_from_input: false,
            look_target: Vector2::UP,
            look_direction: Vector2::UP,
            render_position: position,
            shapes: vec![Shape::circle(Vector2::ZERO, 25.0).with_kind(ShapeKind::CircleOutline)],
            hp: DEFAULT_HP,
            max_hp: DEFAULT_HP,
            exceptions: Vec::new(),
            reacts_to_collision: true,
            dirty: false,
        }
    }

    /// Player body plus a labelled, render-only nose.
    pub fn player(id: impl Into<String>, name: impl Into<String>, position: Vector2) -> Self {
        let name = name.into();
        let mut entity = Self::new(id, name.clone(), position);
        entity.kind = EntityKind::Player;
        entity.shapes = vec![
            Shape::circle(Vector2::ZERO, PLAYER_RADIUS),
            Shape::new(
                Vector2::new(0.0, PLAYER_RADIUS + 4.0),
                Vector2::new(4.0, 4.0),
                ShapeKind::Triangle,
            )
            .with_color(Color::BLACK)
            .with_label(name),
        ];
        entity
    }

    pub fn projectile(
        id: impl Into<String>,
        name: impl Into<String>,
        position: Vector2,
        trajectory: Vector2,
    ) -> Self {
        let mut entity = Self::new(id, name, position);
        let heading = trajectory.normalize_or(Vector2::UP);
        entity.kind = EntityKind::Projectile { trajectory };
        entity.speed = PROJECTILE_SPEED;
        entity.reacts_to_collision = false;
        entity.move_direction = trajectory;
        entity.look_target = heading;
        entity.look_direction = heading;
        entity.shapes = vec![Shape::rect(Vector2::ZERO, 5.0, 5.0).with_kind(ShapeKind::RectOutline)];
        entity
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    pub fn set_position(&mut self, position: Vector2) {
        self.position = position;
        self.dirty = true;
    }

    pub fn translate(&mut self, delta: Vector2) {
        self.position += delta;
        self.dirty = true;
    }

    /// Requests movement along `direction` on the next integration step.
    pub fn set_move_input(&mut self, direction: Vector2) {
        self.move_direction = direction;
        self.move_from_input = true;
    }

    pub fn turn_to(&mut self, direction: Vector2) {
        self.look_target = direction;
    }

    pub fn is_alive(&self) -> bool {
        self.hp > 0
    }

    /// Advances the entity by `dt` seconds of its own motion.
    pub fn integrate(&mut self, dt: f64) {
        match self.kind {
            EntityKind::Projectile { trajectory } => {
                let heading = trajectory.normalize();
                self.look_target = heading;
                self.body.velocity = heading * self.speed;
                self.translate(self.body.velocity * dt);
            }
            EntityKind::Basic | EntityKind::Player => {
                if !self.move_from_input {
                    self.body.velocity = Vector2::ZERO;
                    return;
                }

                let heading = self.move_direction.normalize();
                if heading != Vector2::ZERO {
                    self.look_target = heading;
                }
                self.body.velocity = heading * self.speed;
                if self.body.velocity != Vector2::ZERO {
                    self.translate(self.body.velocity * dt);
                }
                self.move_from_input = false;
            }
        }
    }

    /// One interpolation step of the look direction and render position.
    pub fn update_lerp(&mut self) {
        self.look_direction = self
            .look_direction
            .lerp_rotation(self.look_target, LOOK_LERP_FACTOR);
        self.render_position = self.render_position.lerp(self.position, POSITION_LERP_FACTOR);
    }

    /// Hook run once per recorded hit against `other`.
    pub fn on_collision(&self, other: &CollidableId) -> CollisionEffect {
        match self.kind {
            EntityKind::Projectile { .. } => CollisionEffect::Damage {
                target: match other {
                    CollidableId::Entity(id) => Some(id.clone()),
                    CollidableId::Block(_) => None,
                },
                amount: PROJECTILE_DAMAGE,
                despawn_self: true,
            },
            EntityKind::Basic | EntityKind::Player => CollisionEffect::None,
        }
    }

    pub fn take_damage(&mut self, amount: i32) {
        self.hp -= amount;
    }

    /// Labels of every shape, empty strings for unlabelled ones.
    pub fn shape_texts(&self) -> Vec<String> {
        self.shapes
            .iter()
            .map(|s| s.label.clone().unwrap_or_default())
            .collect()
    }

    pub fn to_spec(&self) -> EntitySpec {
        EntitySpec {
            id: self.id.clone(),
            name: self.name.clone(),
            x: self.position.x,
            y: self.position.y,
            hp: self.hp,
            exceptions: self.exceptions.clone(),
            shape_texts: self.shape_texts(),
        }
    }

    /// Re-applies the base fields of `spec`. The id never changes.
    ///
    /// Labels are applied index by index; an empty `shape_texts` leaves the
    /// current labels alone.
    pub fn apply_spec(&mut self, spec: &EntitySpec) {
        self.name = spec.name.clone();
        self.hp = spec.hp;
        self.exceptions = spec.exceptions.clone();

        let position = spec.position();
        if position != self.position {
            self.set_position(position);
        }

        for (shape, text) in self.shapes.iter_mut().zip(&spec.shape_texts) {
            shape.label = if text.is_empty() {
                None
            } else {
                Some(text.clone())
            };
        }
    }
}

impl Collidable for Entity {
    fn collidable_id(&self) -> CollidableId {
        CollidableId::Entity(self.id.clone())
    }

    fn position(&self) -> Vector2 {
        self.position
    }

    fn direction(&self) -> Vector2 {
        self.look_direction
    }

    fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    fn body(&self) -> &Body {
        &self.body
    }

    fn hp(&self) -> i32 {
        self.hp
    }

    fn max_hp(&self) -> i32 {
        self.max_hp
    }

    fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn reacts_to_collision(&self) -> bool {
        self.reacts_to_collision
    }

    fn exceptions(&self) -> &[String] {
        &self.exceptions
    }
}

/// Immovable square obstacle.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub pos: BlockPos,
    shapes: Vec<Shape>,
}

impl Block {
    pub fn new(pos: BlockPos) -> Self {
        let half = BLOCK_SIZE / 2.0;
        Self {
            pos,
            shapes: vec![Shape::rect(Vector2::ZERO, half, half).with_kind(ShapeKind::RectOutline)],
        }
    }

    /// Compares truncated integer coordinates.
    pub fn is_at(&self, pos: Vector2) -> bool {
        BlockPos::from_world(pos) == self.pos
    }
}

impl Collidable for Block {
    fn collidable_id(&self) -> CollidableId {
        CollidableId::Block(self.pos)
    }

    fn position(&self) -> Vector2 {
        self.pos.to_world()
    }

    fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    fn body(&self) -> &Body {
        &Body::STATIC
    }

    fn hp(&self) -> i32 {
        DEFAULT_HP
    }

    fn max_hp(&self) -> i32 {
        DEFAULT_HP
    }

    fn is_dirty(&self) -> bool {
        false
    }
}
