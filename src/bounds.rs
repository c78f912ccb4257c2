use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::delta::Delta;
use crate::point::Point;

/// Axis-aligned box. Serializes as `[minx, miny, minz, maxx, maxy, maxz]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    min: Point,
    max: Point,
}

impl Bounds {
    /// Accumulator sentinel: any grow produces correct results, and
    /// equality with the sentinel is the never-grown signal.
    pub const EXPANDER: Bounds = Bounds {
        min: Point {
            x: f64::INFINITY,
            y: f64::INFINITY,
            z: f64::INFINITY,
        },
        max: Point {
            x: f64::NEG_INFINITY,
            y: f64::NEG_INFINITY,
            z: f64::NEG_INFINITY,
        },
    };

    pub fn new(min: Point, max: Point) -> Self {
        Self { min, max }
    }

    pub fn min(&self) -> Point {
        self.min
    }

    pub fn max(&self) -> Point {
        self.max
    }

    pub fn mid(&self) -> Point {
        (self.min + self.max) * 0.5
    }

    /// Expand to include a point.
    pub fn grow(&mut self, p: Point) {
        self.min = Point::min(self.min, p);
        self.max = Point::max(self.max, p);
    }

    /// Expand to include another box.
    pub fn grow_bounds(&mut self, other: Bounds) {
        self.min = Point::min(self.min, other.min);
        self.max = Point::max(self.max, other.max);
    }

    pub fn contains_bounds(&self, other: &Bounds) -> bool {
        self.min.x <= other.min.x
            && self.min.y <= other.min.y
            && self.min.z <= other.min.z
            && self.max.x >= other.max.x
            && self.max.y >= other.max.y
            && self.max.z >= other.max.z
    }

    /// Expand to a cube. Without a delta the cube is centered on the
    /// midpoint and spans the widest axis. With a delta the cube is
    /// centered on the delta origin, with its radius rounded up to a
    /// multiple of 10 plus a 20-unit pad, so quantized coordinates keep
    /// slack beyond the data on every side.
    pub fn cubeify(&self, delta: Option<&Delta>) -> Bounds {
        match delta {
            None => {
                let mid = self.mid();
                let widths = (self.max - self.min).map(f64::abs);
                let r = widths.x.max(widths.y).max(widths.z) * 0.5;
                Bounds::new(mid - Point::fill(r), mid + Point::fill(r))
            }
            Some(d) => {
                let center = d.offset;
                let lo = (self.min - center).map(f64::abs);
                let hi = (self.max - center).map(f64::abs);
                let reach = Point::max(lo, hi);
                let r = reach.x.max(reach.y).max(reach.z);
                let r = (r / 10.0).ceil() * 10.0 + 20.0;
                Bounds::new(center - Point::fill(r), center + Point::fill(r))
            }
        }
    }

    /// Quantize to delta units, rounding outward so containment holds.
    pub fn deltify(&self, d: &Delta) -> Bounds {
        Bounds::new(
            ((self.min - d.offset) / d.scale).map(f64::floor),
            ((self.max - d.offset) / d.scale).map(f64::ceil),
        )
    }

    /// Undo `deltify`, up to the outward rounding.
    pub fn undeltify(&self, d: &Delta) -> Bounds {
        Bounds::new(self.min * d.scale + d.offset, self.max * d.scale + d.offset)
    }
}

impl Serialize for Bounds {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        [
            self.min.x, self.min.y, self.min.z, self.max.x, self.max.y, self.max.z,
        ]
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Bounds {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let v = Vec::<f64>::deserialize(deserializer)?;
        if v.len() != 6 {
            return Err(D::Error::custom(format!(
                "expected 6 bounds coordinates, got {}",
                v.len()
            )));
        }
        Ok(Bounds::new(
            Point::new(v[0], v[1], v[2]),
            Point::new(v[3], v[4], v[5]),
        ))
    }
}
