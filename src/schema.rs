use serde::{Deserialize, Serialize};

use crate::bounds::Bounds;
use crate::delta::Delta;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DimKind {
    Signed,
    Unsigned,
    Floating,
}

/// One dimension of the point layout: name, numeric kind, and width in
/// bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: DimKind,
    pub size: u32,
}

impl DimInfo {
    pub fn new(name: &str, kind: DimKind, size: u32) -> Self {
        Self {
            name: name.to_owned(),
            kind,
            size,
        }
    }
}

/// Ordered, uniquely-named dimension list. Serializes as a bare array of
/// `{name, type, size}` objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    dims: Vec<DimInfo>,
}

impl Schema {
    pub fn new(dims: Vec<DimInfo>) -> Self {
        debug_assert!(
            dims.iter()
                .enumerate()
                .all(|(i, d)| dims[..i].iter().all(|prior| prior.name != d.name)),
            "duplicate dimension name"
        );
        Self { dims }
    }

    pub fn dims(&self) -> &[DimInfo] {
        &self.dims
    }

    /// Total bytes per point.
    pub fn stride(&self) -> u64 {
        self.dims.iter().map(|d| u64::from(d.size)).sum()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.dims.iter().any(|d| d.name == name)
    }

    /// Replace X/Y/Z with signed integer dimensions wide enough to span
    /// `cube` in quantized units: 4 bytes when the half-span fits a signed
    /// 32-bit value, 8 otherwise.
    pub fn deltify(cube: &Bounds, delta: &Delta, schema: &Schema) -> Schema {
        let integral = |axis: usize, name: &str| {
            let span = cube.max().axis(axis) - cube.min().axis(axis);
            let half_steps = span * 0.5 / delta.scale.axis(axis);
            let size = if half_steps <= f64::from(i32::MAX) { 4 } else { 8 };
            DimInfo::new(name, DimKind::Signed, size)
        };

        let dims = schema
            .dims
            .iter()
            .map(|d| match d.name.as_str() {
                "X" => integral(0, "X"),
                "Y" => integral(1, "Y"),
                "Z" => integral(2, "Z"),
                _ => d.clone(),
            })
            .collect();

        Schema { dims }
    }

    /// Append the synthetic `PointId` and `OriginId` dimensions, sized from
    /// the largest single-file point count and the number of file slots.
    /// Dimensions already present are left alone, so re-finalizing an
    /// adopted schema is harmless.
    pub fn finalize(mut self, max_file_points: u64, file_slots: u64) -> Schema {
        if !self.contains("PointId") {
            self.dims.push(DimInfo::new(
                "PointId",
                DimKind::Unsigned,
                id_size(max_file_points),
            ));
        }
        if !self.contains("OriginId") {
            self.dims
                .push(DimInfo::new("OriginId", DimKind::Unsigned, id_size(file_slots)));
        }
        self
    }
}

fn id_size(count: u64) -> u32 {
    if count <= u64::from(u32::MAX) {
        4
    } else {
        8
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::Point;

    fn xyz() -> Schema {
        Schema::new(vec![
            DimInfo::new("X", DimKind::Floating, 8),
            DimInfo::new("Y", DimKind::Floating, 8),
            DimInfo::new("Z", DimKind::Floating, 8),
        ])
    }

    #[test]
    fn test_stride() {
        let mut dims = xyz().dims.clone();
        dims.push(DimInfo::new("Intensity", DimKind::Unsigned, 2));
        assert_eq!(Schema::new(dims).stride(), 26);
    }

    #[test]
    fn test_deltify_sizes_small_cube() {
        let delta = Delta::new(Point::fill(0.01), Point::ZERO);
        let cube = Bounds::new(Point::fill(-1000.0), Point::fill(1000.0));
        let out = Schema::deltify(&cube, &delta, &xyz());

        for d in out.dims() {
            assert_eq!(d.kind, DimKind::Signed);
            assert_eq!(d.size, 4);
        }
    }

    #[test]
    fn test_deltify_sizes_wide_cube() {
        // 1e9 units at millimeter scale overflows 32 bits on every axis.
        let delta = Delta::new(Point::fill(0.001), Point::ZERO);
        let cube = Bounds::new(Point::fill(-5e8), Point::fill(5e8));
        let out = Schema::deltify(&cube, &delta, &xyz());

        for d in out.dims() {
            assert_eq!(d.kind, DimKind::Signed);
            assert_eq!(d.size, 8);
        }
    }

    #[test]
    fn test_finalize_id_sizes() {
        let s = xyz().finalize(u64::from(u32::MAX), 12);
        let point_id = &s.dims()[3];
        let origin_id = &s.dims()[4];
        assert_eq!((point_id.name.as_str(), point_id.size), ("PointId", 4));
        assert_eq!((origin_id.name.as_str(), origin_id.size), ("OriginId", 4));

        let s = xyz().finalize(u64::from(u32::MAX) + 1, 12);
        assert_eq!(s.dims()[3].size, 8);
        assert_eq!(s.dims()[4].size, 4);
    }

    #[test]
    fn test_finalize_is_idempotent() {
        let once = xyz().finalize(100, 2);
        let twice = once.clone().finalize(100, 2);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_serde_shape() {
        let s = Schema::new(vec![DimInfo::new("X", DimKind::Floating, 8)]);
        assert_eq!(
            serde_json::to_string(&s).unwrap(),
            r#"[{"name":"X","type":"floating","size":8}]"#
        );
    }
}
