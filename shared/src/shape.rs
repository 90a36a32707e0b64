//! Primitive 2D shapes attached to collidables.
//!
//! A shape is expressed relative to its owner: `offset` is the local
//! position of its center and `extent` its size. Outline variants only change
//! how a shape is drawn, never its geometry.

use crate::math::Vector2;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShapeKind {
    Rect,
    Circle,
    Triangle,
    RectOutline,
    CircleOutline,
    TriangleOutline,
}

impl ShapeKind {
    /// Maps outline variants onto the filled kind that defines their geometry.
    pub fn base(self) -> ShapeKind {
        match self {
            ShapeKind::RectOutline => ShapeKind::Rect,
            ShapeKind::CircleOutline => ShapeKind::Circle,
            ShapeKind::TriangleOutline => ShapeKind::Triangle,
            other => other,
        }
    }

    pub fn is_outline(self) -> bool {
        self.base() != self
    }

    /// Triangles are render-only; they never take part in collisions.
    pub fn is_collidable(self) -> bool {
        !matches!(self.base(), ShapeKind::Triangle)
    }
}

/// RGB color, each channel in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Color {
    pub const RED: Color = Color::new(1.0, 0.0, 0.0);
    pub const BLACK: Color = Color::new(0.0, 0.0, 0.0);

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::RED
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    /// Center of the shape relative to its owner, in the owner's local frame.
    pub offset: Vector2,
    /// Half-width/half-height for rects, radius in `x` for circles.
    pub extent: Vector2,
    pub kind: ShapeKind,
    pub color: Color,
    /// Optional text drawn with the shape.
    pub label: Option<String>,
}

impl Shape {
    pub fn new(offset: Vector2, extent: Vector2, kind: ShapeKind) -> Self {
        Self {
            offset,
            extent,
            kind,
            color: Color::default(),
            label: None,
        }
    }

    /// Rectangle centered at `offset` with the given half extents.
    pub fn rect(offset: Vector2, half_width: f64, half_height: f64) -> Self {
        Self::new(offset, Vector2::new(half_width, half_height), ShapeKind::Rect)
    }

    pub fn circle(offset: Vector2, radius: f64) -> Self {
        Self::new(offset, Vector2::new(radius, radius), ShapeKind::Circle)
    }

    pub fn with_kind(mut self, kind: ShapeKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn base_kind(&self) -> ShapeKind {
        self.kind.base()
    }

    pub fn radius(&self) -> f64 {
        self.extent.x
    }
}
