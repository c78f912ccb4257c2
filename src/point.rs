use std::ops::{Add, Div, Mul, Sub};

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Double-precision position, also used as a vector where the math calls
/// for one.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point {
    pub const ZERO: Point = Point {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// All three components set to `v`.
    pub fn fill(v: f64) -> Self {
        Self::new(v, v, v)
    }

    /// Componentwise minimum.
    pub fn min(a: Point, b: Point) -> Point {
        Point::new(a.x.min(b.x), a.y.min(b.y), a.z.min(b.z))
    }

    /// Componentwise maximum.
    pub fn max(a: Point, b: Point) -> Point {
        Point::new(a.x.max(b.x), a.y.max(b.y), a.z.max(b.z))
    }

    /// Apply `f` to each component.
    pub fn map(self, f: impl Fn(f64) -> f64) -> Point {
        Point::new(f(self.x), f(self.y), f(self.z))
    }

    pub fn dot(a: Point, b: Point) -> f64 {
        a.x * b.x + a.y * b.y + a.z * b.z
    }

    pub fn cross(a: Point, b: Point) -> Point {
        Point::new(
            a.y * b.z - a.z * b.y,
            a.z * b.x - a.x * b.z,
            a.x * b.y - a.y * b.x,
        )
    }

    pub fn length(self) -> f64 {
        Point::dot(self, self).sqrt()
    }

    pub fn normalize(self) -> Point {
        let len = self.length();
        if len == 0.0 {
            return Point::ZERO;
        }
        self * (1.0 / len)
    }

    /// Component by axis index: 0 = x, 1 = y, 2 = z.
    pub fn axis(self, index: usize) -> f64 {
        match index {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }
}

impl Add for Point {
    type Output = Point;
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Point {
    type Output = Point;
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Point {
    type Output = Point;
    fn mul(self, rhs: f64) -> Point {
        Point::new(self.x * rhs, self.y * rhs, self.z * rhs)
    }
}

/// Componentwise product, used to unapply a quantization scale.
impl Mul<Point> for Point {
    type Output = Point;
    fn mul(self, rhs: Point) -> Point {
        Point::new(self.x * rhs.x, self.y * rhs.y, self.z * rhs.z)
    }
}

/// Componentwise quotient, used to apply a quantization scale.
impl Div<Point> for Point {
    type Output = Point;
    fn div(self, rhs: Point) -> Point {
        Point::new(self.x / rhs.x, self.y / rhs.y, self.z / rhs.z)
    }
}

impl Serialize for Point {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        [self.x, self.y, self.z].serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Point {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let v = Vec::<f64>::deserialize(deserializer)?;
        if v.len() != 3 {
            return Err(D::Error::custom(format!(
                "expected 3 coordinates, got {}",
                v.len()
            )));
        }
        Ok(Point::new(v[0], v[1], v[2]))
    }
}
