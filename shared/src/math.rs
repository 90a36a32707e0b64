use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};

/// Represents a vector in 2D space.
///
/// Used for positions, directions and velocities. Positive `y` is up, which
/// makes `(0, 1)` the default facing of every collidable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Vector2 {
    /// Value along the x-axis.
    pub x: f64,
    /// Value along the y-axis.
    pub y: f64,
}

impl Vector2 {
    pub const ZERO: Vector2 = Vector2 { x: 0.0, y: 0.0 };
    /// Default facing of a collidable.
    pub const UP: Vector2 = Vector2 { x: 0.0, y: 1.0 };
    /// Fallback separation axis when two centers coincide.
    pub const RIGHT: Vector2 = Vector2 { x: 1.0, y: 0.0 };

    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Returns the dot product of two vectors.
    pub fn dot(&self, other: Vector2) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// Z component of the 3D cross product; positive when `other` is counter-clockwise.
    pub fn cross(&self, other: Vector2) -> f64 {
        self.x * other.y - self.y * other.x
    }

    /// Returns the squared magnitude of the vector.
    pub fn length_squared(&self) -> f64 {
        self.dot(*self)
    }

    /// Returns the magnitude of the vector.
    pub fn length(&self) -> f64 {
        self.length_squared().sqrt()
    }

    /// Returns the normalized vector, or zero for a zero-length vector.
    pub fn normalize(&self) -> Vector2 {
        let mag = self.length();
        if mag == 0.0 {
            Vector2::ZERO
        } else {
            Vector2 {
                x: self.x / mag,
                y: self.y / mag,
            }
        }
    }

    /// Normalizes, substituting `fallback` when the vector is (nearly) zero.
    pub fn normalize_or(&self, fallback: Vector2) -> Vector2 {
        if self.length_squared() < 1e-12 {
            fallback
        } else {
            self.normalize()
        }
    }

    /// Right-hand perpendicular: `(0, 1)` maps to `(1, 0)`.
    pub fn perp_right(&self) -> Vector2 {
        Vector2 {
            x: self.y,
            y: -self.x,
        }
    }

    /// Left-hand perpendicular, used as the collision tangent.
    pub fn perp_left(&self) -> Vector2 {
        Vector2 {
            x: -self.y,
            y: self.x,
        }
    }

    pub fn distance(&self, other: Vector2) -> f64 {
        (*self - other).length()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Linear interpolation towards `target` by `amount` (0..1).
    pub fn lerp(&self, target: Vector2, amount: f64) -> Vector2 {
        Vector2 {
            x: self.x + (target.x - self.x) * amount,
            y: self.y + (target.y - self.y) * amount,
        }
    }

    /// Rotates towards `target` by a fraction of the angle between them,
    /// keeping the current magnitude.
    pub fn lerp_rotation(&self, target: Vector2, amount: f64) -> Vector2 {
        let from = self.normalize();
        let to = target.normalize();
        if from == Vector2::ZERO || to == Vector2::ZERO {
            return *self;
        }

        let angle = from.cross(to).atan2(from.dot(to));
        let step = angle * amount;
        let (sin, cos) = step.sin_cos();

        Vector2 {
            x: self.x * cos - self.y * sin,
            y: self.x * sin + self.y * cos,
        }
    }
}

impl Add for Vector2 {
    type Output = Vector2;

    fn add(self, other: Vector2) -> Vector2 {
        Vector2::new(self.x + other.x, self.y + other.y)
    }
}

impl AddAssign for Vector2 {
    fn add_assign(&mut self, other: Vector2) {
        self.x += other.x;
        self.y += other.y;
    }
}

impl Sub for Vector2 {
    type Output = Vector2;

    fn sub(self, other: Vector2) -> Vector2 {
        Vector2::new(self.x - other.x, self.y - other.y)
    }
}

impl SubAssign for Vector2 {
    fn sub_assign(&mut self, other: Vector2) {
        self.x -= other.x;
        self.y -= other.y;
    }
}

impl Mul<f64> for Vector2 {
    type Output = Vector2;

    fn mul(self, scalar: f64) -> Vector2 {
        Vector2::new(self.x * scalar, self.y * scalar)
    }
}

impl Neg for Vector2 {
    type Output = Vector2;

    fn neg(self) -> Vector2 {
        Vector2::new(-self.x, -self.y)
    }
}
