//! Reader capability: the format-specific half of the probe.

use std::path::Path;

use crate::bounds::Bounds;
use crate::error::Result;
use crate::matrix::{self, Matrix};
use crate::point::Point;
use crate::reprojection::Reprojection;
use crate::schema::DimKind;

/// Cheap metadata pulled from a file header.
#[derive(Debug, Clone)]
pub struct Preview {
    pub num_points: u64,
    pub bounds: Bounds,
    pub dim_names: Vec<String>,
    pub srs: String,
    pub scale: Option<Point>,
    pub metadata: Option<serde_json::Value>,
}

/// A point-cloud format reader. Implementations decide which paths they
/// recognize, read previews, and stream points; the reprojection spec is
/// theirs to honor.
pub trait Driver: Send + Sync {
    /// Does this reader recognize the path's format?
    fn good(&self, path: &str) -> bool;

    /// Header-only metadata read. `None` means the header could not be
    /// used, which sends the probe to a full scan.
    fn preview(&self, local: &Path, reprojection: Option<&Reprojection>)
        -> Result<Option<Preview>>;

    /// Stream every point through `sink`, applying `transformation` when
    /// given.
    fn run(
        &self,
        local: &Path,
        reprojection: Option<&Reprojection>,
        transformation: Option<&Matrix>,
        sink: &mut dyn FnMut(Point),
    ) -> Result<()>;

    /// Apply a 4x4 affine to bounds.
    fn transform(&self, bounds: &Bounds, transformation: &Matrix) -> Bounds {
        matrix::transform_bounds(transformation, bounds)
    }

    fn dimension_id(&self, name: &str) -> Option<u32> {
        registry_id(name)
    }

    fn default_type(&self, id: u32) -> Option<(DimKind, u32)> {
        registry_type(id)
    }
}

/// Well-known lidar dimensions and their default storage types. The
/// table index doubles as the dimension id.
const DIMENSIONS: &[(&str, DimKind, u32)] = &[
    ("X", DimKind::Floating, 8),
    ("Y", DimKind::Floating, 8),
    ("Z", DimKind::Floating, 8),
    ("Intensity", DimKind::Unsigned, 2),
    ("ReturnNumber", DimKind::Unsigned, 1),
    ("NumberOfReturns", DimKind::Unsigned, 1),
    ("ScanDirectionFlag", DimKind::Unsigned, 1),
    ("EdgeOfFlightLine", DimKind::Unsigned, 1),
    ("Classification", DimKind::Unsigned, 1),
    ("ScanAngleRank", DimKind::Floating, 4),
    ("UserData", DimKind::Unsigned, 1),
    ("PointSourceId", DimKind::Unsigned, 2),
    ("GpsTime", DimKind::Floating, 8),
    ("Red", DimKind::Unsigned, 2),
    ("Green", DimKind::Unsigned, 2),
    ("Blue", DimKind::Unsigned, 2),
    ("Infrared", DimKind::Unsigned, 2),
];

pub fn registry_id(name: &str) -> Option<u32> {
    DIMENSIONS
        .iter()
        .position(|(n, _, _)| *n == name)
        .map(|i| i as u32)
}

pub fn registry_type(id: u32) -> Option<(DimKind, u32)> {
    DIMENSIONS
        .get(id as usize)
        .map(|(_, kind, size)| (*kind, *size))
}
