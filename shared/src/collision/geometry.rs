//! Narrow phase: world-space shapes, intersection tests and minimum
//! translation vectors.
//!
//! Every shape is evaluated against its owner's [`Pose`]. A rectangle's
//! `extent.x` lies along the owner's right axis and `extent.y` along its
//! forward axis, so an owner facing the default `(0, 1)` produces an
//! axis-aligned box. Circles ignore the owner's direction entirely.

use crate::math::Vector2;
use crate::shape::{Shape, ShapeKind};

/// Below this distance two centers are treated as coincident.
const DEGENERATE_DISTANCE: f64 = 1e-3;

/// Overlaps up to this depth count as touching. Shapes pushed out by an MTV
/// land on the boundary, and rounding must not make them collide again.
pub const CONTACT_EPSILON: f64 = 1e-9;

/// Position and facing of a collidable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vector2,
    /// Unit forward vector.
    pub forward: Vector2,
}

impl Pose {
    /// Builds a pose, falling back to `(0, 1)` for a degenerate direction.
    pub fn new(position: Vector2, direction: Vector2) -> Self {
        Self {
            position,
            forward: direction.normalize_or(Vector2::UP),
        }
    }

    pub fn right(&self) -> Vector2 {
        self.forward.perp_right()
    }

    /// Rotates a local offset into world space and translates it.
    pub fn transform(&self, local: Vector2) -> Vector2 {
        self.position + self.right() * local.x + self.forward * local.y
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientedRect {
    pub center: Vector2,
    /// Half extents: `x` along `right`, `y` along `forward`.
    pub half: Vector2,
    pub forward: Vector2,
    pub right: Vector2,
}

impl OrientedRect {
    pub fn corners(&self) -> [Vector2; 4] {
        let rx = self.right * self.half.x;
        let fy = self.forward * self.half.y;
        [
            self.center - rx - fy,
            self.center + rx - fy,
            self.center + rx + fy,
            self.center - rx + fy,
        ]
    }

    /// The two candidate separating axes contributed by this rectangle.
    pub fn axes(&self) -> [Vector2; 2] {
        [self.right, self.forward]
    }

    fn project(&self, axis: Vector2) -> (f64, f64) {
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for corner in self.corners() {
            let p = corner.dot(axis);
            min = min.min(p);
            max = max.max(p);
        }
        (min, max)
    }

    /// Expresses a world point in this rectangle's frame (`x` right, `y` forward).
    pub fn to_local(&self, point: Vector2) -> Vector2 {
        let d = point - self.center;
        Vector2::new(d.dot(self.right), d.dot(self.forward))
    }

    pub fn to_world(&self, local: Vector2) -> Vector2 {
        self.center + self.right * local.x + self.forward * local.y
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    pub center: Vector2,
    pub radius: f64,
}

/// A collision shape resolved into world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WorldShape {
    Rect(OrientedRect),
    Circle(Circle),
}

impl WorldShape {
    /// Places `shape` in the world according to its owner's pose.
    /// Returns `None` for render-only kinds.
    pub fn from_shape(shape: &Shape, pose: &Pose) -> Option<WorldShape> {
        match shape.base_kind() {
            ShapeKind::Rect => Some(WorldShape::Rect(OrientedRect {
                center: pose.transform(shape.offset),
                half: Vector2::new(shape.extent.x.abs(), shape.extent.y.abs()),
                forward: pose.forward,
                right: pose.right(),
            })),
            ShapeKind::Circle => Some(WorldShape::Circle(Circle {
                center: pose.position + shape.offset,
                radius: shape.extent.x.abs(),
            })),
            _ => None,
        }
    }

    pub fn center(&self) -> Vector2 {
        match self {
            WorldShape::Rect(rect) => rect.center,
            WorldShape::Circle(circle) => circle.center,
        }
    }
}

/// Result of a rectangle/circle narrow-phase test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RectCircleContact {
    /// How deep the circle reaches into the rectangle.
    pub penetration: f64,
    /// Unit normal pointing from the rectangle towards the circle.
    pub normal: Vector2,
    /// Closest point on the rectangle to the circle center.
    pub closest: Vector2,
}

/// Separating-axis test on the four axes of two rectangles.
///
/// Returns the axis of least overlap and the overlap along it, or `None`
/// when some axis separates the projections. Touching intervals, and
/// overlaps within [`CONTACT_EPSILON`], count as separated.
pub fn rect_rect_overlap(a: &OrientedRect, b: &OrientedRect) -> Option<(Vector2, f64)> {
    let mut best: Option<(Vector2, f64)> = None;

    for axis in a.axes().into_iter().chain(b.axes()) {
        let (a_min, a_max) = a.project(axis);
        let (b_min, b_max) = b.project(axis);

        // Smaller of the two push distances, which also covers containment.
        let overlap = (a_max - b_min).min(b_max - a_min);
        if overlap <= CONTACT_EPSILON {
            return None;
        }
        if best.map_or(true, |(_, smallest)| overlap < smallest) {
            best = Some((axis, overlap));
        }
    }

    best
}

/// Clamps the circle center onto the rectangle and measures the gap.
pub fn rect_circle_contact(rect: &OrientedRect, circle: &Circle) -> Option<RectCircleContact> {
    let local = rect.to_local(circle.center);
    let clamped = Vector2::new(
        local.x.clamp(-rect.half.x, rect.half.x),
        local.y.clamp(-rect.half.y, rect.half.y),
    );

    let delta = local - clamped;
    let distance = delta.length();
    if circle.radius - distance <= CONTACT_EPSILON {
        return None;
    }

    let normal = if distance > 1e-9 {
        let world = rect.right * delta.x + rect.forward * delta.y;
        Vector2::new(world.x / distance, world.y / distance)
    } else {
        // Center inside the rectangle: push along the center line.
        (circle.center - rect.center).normalize_or(Vector2::RIGHT)
    };

    Some(RectCircleContact {
        penetration: circle.radius - distance,
        normal,
        closest: rect.to_world(clamped),
    })
}

/// Strict circle overlap: touching circles do not collide.
pub fn circles_overlap(a: &Circle, b: &Circle) -> bool {
    let reach = a.radius + b.radius - CONTACT_EPSILON;
    reach > 0.0 && (a.center - b.center).length_squared() < reach * reach
}

/// Narrow-phase intersection test.
pub fn intersects(a: &WorldShape, b: &WorldShape) -> bool {
    match (a, b) {
        (WorldShape::Rect(ra), WorldShape::Rect(rb)) => rect_rect_overlap(ra, rb).is_some(),
        (WorldShape::Circle(ca), WorldShape::Circle(cb)) => circles_overlap(ca, cb),
        (WorldShape::Rect(rect), WorldShape::Circle(circle))
        | (WorldShape::Circle(circle), WorldShape::Rect(rect)) => {
            rect_circle_contact(rect, circle).is_some()
        }
    }
}

/// Minimum translation vector that moves `a` out of `b`.
///
/// Points from `b`'s center towards `a`'s center; `None` when the shapes do
/// not penetrate.
pub fn mtv(a: &WorldShape, b: &WorldShape) -> Option<Vector2> {
    match (a, b) {
        (WorldShape::Rect(ra), WorldShape::Rect(rb)) => rect_rect_mtv(ra, rb),
        (WorldShape::Circle(ca), WorldShape::Circle(cb)) => circle_circle_mtv(ca, cb),
        (WorldShape::Rect(rect), WorldShape::Circle(circle)) => {
            rect_circle_contact(rect, circle).map(|c| -c.normal * c.penetration)
        }
        (WorldShape::Circle(circle), WorldShape::Rect(rect)) => {
            rect_circle_contact(rect, circle).map(|c| c.normal * c.penetration)
        }
    }
}

pub fn rect_rect_mtv(a: &OrientedRect, b: &OrientedRect) -> Option<Vector2> {
    let (axis, overlap) = rect_rect_overlap(a, b)?;
    let toward_a = a.center - b.center;
    let axis = if toward_a.dot(axis) < 0.0 { -axis } else { axis };
    Some(axis * overlap)
}

pub fn circle_circle_mtv(a: &Circle, b: &Circle) -> Option<Vector2> {
    if !circles_overlap(a, b) {
        return None;
    }

    let delta = a.center - b.center;
    let distance = delta.length();
    let normal = if distance < DEGENERATE_DISTANCE {
        Vector2::RIGHT
    } else {
        Vector2::new(delta.x / distance, delta.y / distance)
    };

    Some(normal * (a.radius + b.radius - distance))
}
