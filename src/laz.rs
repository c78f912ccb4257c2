//! LAS/LAZ reader built on the `las` crate.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use las::Reader;

use crate::bounds::Bounds;
use crate::driver::{Driver, Preview};
use crate::error::Result;
use crate::matrix::{self, Matrix};
use crate::point::Point;
use crate::reprojection::Reprojection;

/// WKT coordinate system VLR per the LAS 1.4 specification.
const WKT_USER_ID: &str = "LASF_Projection";
const WKT_RECORD_ID: u16 = 2112;

pub struct LasDriver;

/// Create a LAS file reader for point cloud access.
/// Handles both .las and .laz compressed formats.
fn create_reader(file_path: &Path) -> Result<Reader> {
    let file = File::open(file_path)?;
    let buf_reader = BufReader::new(file);
    Ok(Reader::new(buf_reader)?)
}

fn extension(path: &str) -> String {
    Path::new(path)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default()
}

impl Driver for LasDriver {
    fn good(&self, path: &str) -> bool {
        matches!(extension(path).as_str(), "las" | "laz")
    }

    fn preview(
        &self,
        local: &Path,
        _reprojection: Option<&Reprojection>,
    ) -> Result<Option<Preview>> {
        let reader = match create_reader(local) {
            Ok(reader) => reader,
            Err(e) => {
                log::debug!("no preview for {}: {e}", local.display());
                return Ok(None);
            }
        };
        let header = reader.header();

        let bounds = header.bounds();
        let bounds = Bounds::new(
            Point::new(bounds.min.x, bounds.min.y, bounds.min.z),
            Point::new(bounds.max.x, bounds.max.y, bounds.max.z),
        );

        let transforms = header.transforms();
        let scale = Point::new(
            transforms.x.scale,
            transforms.y.scale,
            transforms.z.scale,
        );

        let format = header.point_format();
        let mut dim_names: Vec<String> = [
            "X",
            "Y",
            "Z",
            "Intensity",
            "ReturnNumber",
            "NumberOfReturns",
            "ScanDirectionFlag",
            "EdgeOfFlightLine",
            "Classification",
            "ScanAngleRank",
            "UserData",
            "PointSourceId",
        ]
        .iter()
        .map(|s| (*s).to_owned())
        .collect();
        if format.has_gps_time {
            dim_names.push("GpsTime".to_owned());
        }
        if format.has_color {
            dim_names.push("Red".to_owned());
            dim_names.push("Green".to_owned());
            dim_names.push("Blue".to_owned());
        }
        if format.has_nir {
            dim_names.push("Infrared".to_owned());
        }

        let srs = header
            .vlrs()
            .iter()
            .find(|vlr| vlr.user_id == WKT_USER_ID && vlr.record_id == WKT_RECORD_ID)
            .map(|vlr| {
                String::from_utf8_lossy(&vlr.data)
                    .trim_end_matches('\0')
                    .to_owned()
            })
            .unwrap_or_default();

        let version = header.version();
        let metadata = serde_json::json!({
            "lasVersion": format!("{}.{}", version.major, version.minor),
            "systemIdentifier": header.system_identifier(),
            "generatingSoftware": header.generating_software(),
        });

        Ok(Some(Preview {
            num_points: header.number_of_points(),
            bounds,
            dim_names,
            srs,
            scale: Some(scale),
            metadata: Some(metadata),
        }))
    }

    fn run(
        &self,
        local: &Path,
        _reprojection: Option<&Reprojection>,
        transformation: Option<&Matrix>,
        sink: &mut dyn FnMut(Point),
    ) -> Result<()> {
        let mut reader = create_reader(local)?;

        for point in reader.points() {
            let point = point?;
            let mut p = Point::new(point.x, point.y, point.z);
            if let Some(m) = transformation {
                p = matrix::transform_point(m, p);
            }
            sink(p);
        }

        Ok(())
    }
}
