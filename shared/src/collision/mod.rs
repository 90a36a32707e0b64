//! Collision detection and response.
//!
//! [`geometry`] answers "do these two shapes overlap and by how much";
//! [`manager`] walks the world for one owner, records the hits and applies
//! the physical response.

pub mod geometry;
pub mod manager;

use crate::entity::CollidableId;
use crate::math::Vector2;
use crate::shape::ShapeKind;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use geometry::{intersects, mtv, Pose, WorldShape};
pub use manager::{find_collisions, resolve_collisions, resolve_collisions_static};

/// Physical properties used by the collision response.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Body {
    pub velocity: Vector2,
    /// `f64::INFINITY` for immovable bodies.
    pub mass: f64,
    /// 0..=1
    pub friction: f64,
    /// 0..=1, 0 means no bounce.
    pub bounciness: f64,
}

impl Body {
    pub const STATIC: Body = Body {
        velocity: Vector2::ZERO,
        mass: f64::INFINITY,
        friction: 0.0,
        bounciness: 0.0,
    };

    pub fn is_static(&self) -> bool {
        self.mass.is_infinite()
    }

    /// Zero for static bodies.
    pub fn inverse_mass(&self) -> f64 {
        if self.is_static() || self.mass <= 0.0 {
            0.0
        } else {
            1.0 / self.mass
        }
    }
}

impl Default for Body {
    fn default() -> Self {
        Self {
            velocity: Vector2::ZERO,
            mass: 1.0,
            friction: 0.8,
            bounciness: 0.5,
        }
    }
}

/// Which pair of base shapes produced a hit, seen from the owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollisionType {
    RectRect,
    CircleCircle,
    /// Owner's shape is the rect.
    RectCircle,
    /// Owner's shape is the circle.
    CircleRect,
}

impl CollisionType {
    pub fn between(own: ShapeKind, other: ShapeKind) -> Option<CollisionType> {
        match (own.base(), other.base()) {
            (ShapeKind::Rect, ShapeKind::Rect) => Some(CollisionType::RectRect),
            (ShapeKind::Circle, ShapeKind::Circle) => Some(CollisionType::CircleCircle),
            (ShapeKind::Rect, ShapeKind::Circle) => Some(CollisionType::RectCircle),
            (ShapeKind::Circle, ShapeKind::Rect) => Some(CollisionType::CircleRect),
            _ => None,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            CollisionType::RectRect => "RR",
            CollisionType::CircleCircle => "CC",
            CollisionType::RectCircle => "RC",
            CollisionType::CircleRect => "CR",
        }
    }
}

impl fmt::Display for CollisionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// One recorded hit between a shape of the owner and a shape of `other`.
#[derive(Debug, Clone, PartialEq)]
pub struct CollisionData {
    pub other: CollidableId,
    pub this_shape: usize,
    pub other_shape: usize,
    pub kind: CollisionType,
}
