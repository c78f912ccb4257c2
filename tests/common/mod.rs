//! Synthetic driver and helpers shared by the end-to-end tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use strata::bounds::Bounds;
use strata::config::{BuildDescriptor, Config, Resolved, Resolver};
use strata::driver::{Driver, Preview};
use strata::error::{Error, Result};
use strata::matrix::{self, Matrix};
use strata::point::Point;
use strata::reprojection::Reprojection;
use strata::storage::LocalFs;

pub struct MockFile {
    pub preview: Option<Preview>,
    pub points: Vec<Point>,
    pub scan_fails: bool,
}

impl MockFile {
    pub fn with_preview(preview: Preview) -> Self {
        Self {
            preview: Some(preview),
            points: Vec::new(),
            scan_fails: false,
        }
    }

    pub fn with_points(points: Vec<Point>) -> Self {
        Self {
            preview: None,
            points,
            scan_fails: false,
        }
    }
}

/// In-memory reader: recognizes exactly the registered paths.
#[derive(Default)]
pub struct MockDriver {
    files: HashMap<String, MockFile>,
}

impl MockDriver {
    pub fn insert(&mut self, path: &str, file: MockFile) {
        self.files.insert(path.to_owned(), file);
    }
}

impl Driver for MockDriver {
    fn good(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    fn preview(
        &self,
        local: &Path,
        _reprojection: Option<&Reprojection>,
    ) -> Result<Option<Preview>> {
        Ok(self
            .files
            .get(local.to_string_lossy().as_ref())
            .and_then(|f| f.preview.clone()))
    }

    fn run(
        &self,
        local: &Path,
        _reprojection: Option<&Reprojection>,
        transformation: Option<&Matrix>,
        sink: &mut dyn FnMut(Point),
    ) -> Result<()> {
        let file = self
            .files
            .get(local.to_string_lossy().as_ref())
            .ok_or_else(|| Error::ScanFailure {
                path: local.display().to_string(),
                message: "unknown file".to_owned(),
            })?;
        if file.scan_fails {
            return Err(Error::ScanFailure {
                path: local.display().to_string(),
                message: "synthetic scan failure".to_owned(),
            });
        }
        for p in &file.points {
            let mut p = *p;
            if let Some(m) = transformation {
                p = matrix::transform_point(m, p);
            }
            sink(p);
        }
        Ok(())
    }
}

pub const XYZ: &[&str] = &["X", "Y", "Z"];

pub fn preview(
    num_points: u64,
    bounds: Bounds,
    dim_names: &[&str],
    scale: Option<Point>,
) -> Preview {
    Preview {
        num_points,
        bounds,
        dim_names: dim_names.iter().map(|s| (*s).to_owned()).collect(),
        srs: String::new(),
        scale,
        metadata: None,
    }
}

pub fn bounds(min: [f64; 3], max: [f64; 3]) -> Bounds {
    Bounds::new(
        Point::new(min[0], min[1], min[2]),
        Point::new(max[0], max[1], max[2]),
    )
}

pub fn resolve(driver: MockDriver, config: serde_json::Value) -> Result<Resolved> {
    let resolver = Resolver::new(Arc::new(driver), Arc::new(LocalFs));
    resolver.resolve(Config::from_value(config).unwrap())
}

pub fn build(driver: MockDriver, config: serde_json::Value) -> BuildDescriptor {
    match resolve(driver, config).unwrap() {
        Resolved::Build(descriptor) => *descriptor,
        Resolved::Continuation(_) => panic!("expected a build, found a continuation"),
    }
}
