//! Cesium output settings and the earth-tangent-plane transform.

use serde::{Deserialize, Serialize};

use crate::bounds::Bounds;
use crate::matrix::{self, Matrix};
use crate::point::Point;

fn default_geometric_error_divisor() -> f64 {
    32.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CesiumSettings {
    #[serde(default = "default_geometric_error_divisor")]
    pub geometric_error_divisor: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coloring: Option<String>,
    #[serde(default)]
    pub truncate: bool,
}

impl Default for CesiumSettings {
    fn default() -> Self {
        Self {
            geometric_error_divisor: default_geometric_error_divisor(),
            coloring: None,
            truncate: false,
        }
    }
}

/// Rigid transformation from earth-centered earth-fixed coordinates into a
/// local frame centered on the dataset, with axes east/north/up.
///
/// Up is the outward radial at the dataset midpoint. North is the world
/// north pole direction projected onto the tangent plane at that point,
/// and east completes the right-handed frame. The rotated bounds midpoint
/// is then translated to the origin.
pub fn local_tangent_transformation(bounds: &Bounds) -> Matrix {
    let p = bounds.mid();
    let up = p.normalize();

    let north_pole = Point::new(0.0, 0.0, 1.0);
    let proj = up * Point::dot(up, north_pole);
    let north = (north_pole - proj).normalize();

    // Orthonormal inputs, so this comes out normalized.
    let east = Point::cross(north, up);

    let rotation: Matrix = [
        east.x, east.y, east.z, 0.0, //
        north.x, north.y, north.z, 0.0, //
        up.x, up.y, up.z, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    ];

    // Recenter on the rotated midpoint; close enough to the origin for
    // reasonable precision downstream.
    let tentative = matrix::transform_bounds(&rotation, bounds).mid();
    let translation: Matrix = [
        1.0, 0.0, 0.0, -tentative.x, //
        0.0, 1.0, 0.0, -tentative.y, //
        0.0, 0.0, 1.0, -tentative.z, //
        0.0, 0.0, 0.0, 1.0,
    ];

    matrix::multiply(&translation, &rotation)
}
