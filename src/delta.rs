use serde::{Deserialize, Deserializer, Serialize};

use crate::point::Point;

/// Fixed-point quantization: `q = round((p - offset) / scale)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Delta {
    pub scale: Point,
    pub offset: Point,
}

impl Delta {
    pub fn new(scale: Point, offset: Point) -> Self {
        Self { scale, offset }
    }
}

impl Default for Delta {
    fn default() -> Self {
        Self::new(Point::fill(1.0), Point::ZERO)
    }
}

/// Accept a uniform scalar or a 3-array for scale/offset configuration
/// values.
pub(crate) fn scalar_or_triple<'de, D>(deserializer: D) -> Result<Option<Point>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Scalar(f64),
        Triple([f64; 3]),
    }

    let raw = Option::<Raw>::deserialize(deserializer)?;
    Ok(raw.map(|r| match r {
        Raw::Scalar(v) => Point::fill(v),
        Raw::Triple(t) => Point::new(t[0], t[1], t[2]),
    }))
}
