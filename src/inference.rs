//! Dataset inference: probe every input file in parallel, then reduce the
//! per-file results into globally consistent bounds, point count, schema,
//! and quantization.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressStyle};
use parking_lot::Mutex;

use crate::bounds::Bounds;
use crate::cesium;
use crate::config;
use crate::delta::Delta;
use crate::driver::Driver;
use crate::error::{Error, Result};
use crate::fileinfo::{FileInfo, Status};
use crate::matrix::Matrix;
use crate::point::Point;
use crate::pool::Pool;
use crate::reprojection::Reprojection;
use crate::schema::{DimInfo, DimKind, Schema};
use crate::storage::{BlobStore, Endpoint, LocalHandle};

/// Enough of the front of a remote file to read its header.
const HEADER_RANGE: std::ops::Range<u64> = 0..16384;

pub struct InferenceOptions {
    pub reprojection: Option<Reprojection>,
    pub trust_headers: bool,
    pub allow_delta: bool,
    pub tmp: String,
    pub threads: usize,
    pub verbose: bool,
    pub cesiumify: bool,
}

impl Default for InferenceOptions {
    fn default() -> Self {
        Self {
            reprojection: None,
            trust_headers: true,
            allow_delta: true,
            tmp: "tmp".to_owned(),
            threads: 8,
            verbose: false,
            cesiumify: false,
        }
    }
}

/// State the probe tasks fold into under one lock. The lock covers only
/// the metadata merge, never I/O or scanning.
#[derive(Default)]
struct SharedMeta {
    delta: Option<Delta>,
    dim_names: Vec<String>,
    dim_set: HashSet<String>,
}

/// Everything a probe task needs, shared by reference counting so tasks
/// stay `'static`. File records are reached by index through one
/// mutex-guarded slice.
struct ProbeCtx {
    driver: Arc<dyn Driver>,
    store: Arc<dyn BlobStore>,
    tmp: Endpoint,
    reprojection: Option<Reprojection>,
    trust_headers: bool,
    allow_delta: bool,
    files: Vec<Mutex<FileInfo>>,
    shared: Mutex<SharedMeta>,
}

pub struct Inference {
    ctx: Arc<ProbeCtx>,
    threads: usize,
    verbose: bool,
    cesiumify: bool,
    started: bool,
    done: bool,
    num_points: Option<u64>,
    bounds: Option<Bounds>,
    schema: Option<Schema>,
    delta: Option<Delta>,
    dim_names: Vec<String>,
    srs_list: Vec<String>,
    transformation: Option<Matrix>,
}

impl Inference {
    pub fn new(
        files: Vec<FileInfo>,
        options: InferenceOptions,
        driver: Arc<dyn Driver>,
        store: Arc<dyn BlobStore>,
    ) -> Self {
        let tmp = Endpoint::new(Arc::clone(&store), options.tmp.clone());
        Self {
            ctx: Arc::new(ProbeCtx {
                driver,
                store,
                tmp,
                reprojection: options.reprojection,
                trust_headers: options.trust_headers,
                allow_delta: options.allow_delta,
                files: files.into_iter().map(Mutex::new).collect(),
                shared: Mutex::new(SharedMeta::default()),
            }),
            threads: options.threads,
            verbose: options.verbose,
            cesiumify: options.cesiumify,
            started: false,
            done: false,
            num_points: None,
            bounds: None,
            schema: None,
            delta: None,
            dim_names: Vec::new(),
            srs_list: Vec::new(),
            transformation: None,
        }
    }

    /// Expand paths through the store and build the file list.
    pub fn from_paths(
        paths: &[String],
        options: InferenceOptions,
        driver: Arc<dyn Driver>,
        store: Arc<dyn BlobStore>,
    ) -> Result<Self> {
        let mut files = Vec::new();
        for raw in paths {
            let expanded = config::directorify(raw);
            for path in store.resolve(&expanded, options.verbose)? {
                files.push(FileInfo::new(path));
            }
        }
        Ok(Self::new(files, options, driver, store))
    }

    /// Run the full pipeline: parallel probe, aggregate, schema synthesis,
    /// and the optional tangent-frame transform.
    pub fn go(&mut self) -> Result<()> {
        if self.started {
            return Err(Error::DoubleRun);
        }
        self.started = true;

        let mut pool = Pool::new(self.threads)?;
        let size = self.ctx.files.len();

        let progress = if self.verbose {
            ProgressBar::new(size as u64)
        } else {
            ProgressBar::hidden()
        };
        progress.set_style(
            ProgressStyle::default_bar()
                .template("[{bar:40.cyan/blue}] {pos}/{len} files ({percent}%) {msg}")
                .unwrap()
                .progress_chars("█▉▊▋▌▍▎▏"),
        );
        progress.set_message("Probing files");

        let mut valid = false;
        for index in 0..size {
            let path = self.ctx.files[index].lock().path.clone();
            if self.ctx.driver.good(&path) {
                valid = true;
                let ctx = Arc::clone(&self.ctx);
                let pb = progress.clone();
                pool.submit(move || {
                    let outcome = probe(&ctx, index);
                    pb.inc(1);
                    outcome
                });
            } else {
                self.ctx.files[index].lock().status = Status::Omitted;
                progress.inc(1);
            }
        }

        pool.join()?;
        progress.finish_with_message("Probe complete");

        if !valid {
            return Err(Error::NoValidInputs);
        }

        self.aggregate();
        self.make_schema();

        if self.num_points.unwrap_or(0) == 0 {
            return Err(Error::ZeroPoints);
        }
        if self.schema.as_ref().map_or(0, Schema::stride) == 0 {
            return Err(Error::EmptySchema);
        }
        if self.bounds.map_or(true, |b| b == Bounds::EXPANDER) {
            return Err(Error::NoBounds);
        }

        if self.cesiumify {
            self.transform_to_tangent_frame()?;
        }

        self.done = true;
        Ok(())
    }

    fn aggregate(&mut self) {
        let meta = std::mem::take(&mut *self.ctx.shared.lock());
        self.delta = meta.delta;
        self.dim_names = meta.dim_names;

        let mut num_points: u64 = 0;
        let mut bounds = Bounds::EXPANDER;

        for slot in self.ctx.files.iter() {
            let f = slot.lock();
            num_points += f.num_points.unwrap_or(0);
            if let Some(b) = f.bounds {
                bounds.grow_bounds(b);
            }
            if let Some(srs) = &f.srs {
                if !self.srs_list.iter().any(|s| s == srs) {
                    self.srs_list.push(srs.clone());
                }
            }
        }

        self.num_points = Some(num_points);
        self.bounds = Some(bounds);

        if let Some(delta) = &mut self.delta {
            // Delta bounds keep at least 20 units of slack, which leaves
            // room to round the offset up to a multiple of 10.
            delta.offset = tidy_offset(bounds.mid());

            for slot in self.ctx.files.iter() {
                let mut f = slot.lock();
                if let Some(b) = f.bounds {
                    f.bounds = Some(b.deltify(delta));
                }
            }
        }
    }

    fn make_schema(&mut self) {
        let dims = self
            .dim_names
            .iter()
            .map(|name| {
                let (kind, size) = self
                    .ctx
                    .driver
                    .dimension_id(name)
                    .and_then(|id| self.ctx.driver.default_type(id))
                    .unwrap_or((DimKind::Floating, 8));
                DimInfo::new(name, kind, size)
            })
            .collect();
        let mut schema = Schema::new(dims);

        if let (Some(delta), Some(bounds)) = (&self.delta, &self.bounds) {
            let cube = bounds.cubeify(Some(delta));
            schema = Schema::deltify(&cube, delta, &schema);
        }
        self.schema = Some(schema);
    }

    /// Rotate the dataset so up is outward from the earth's center, then
    /// refold global bounds over the re-transformed file bounds.
    fn transform_to_tangent_frame(&mut self) -> Result<()> {
        log::info!("transforming inference to the local tangent frame");
        let bounds = self.bounds.ok_or(Error::NoBounds)?;
        let m = cesium::local_tangent_transformation(&bounds);

        let mut global = Bounds::EXPANDER;
        for slot in self.ctx.files.iter() {
            let mut f = slot.lock();
            let b = match f.bounds {
                Some(b) => b,
                None => {
                    return Err(Error::MissingBoundsForTransform {
                        path: f.path.clone(),
                    })
                }
            };
            let transformed = self.ctx.driver.transform(&b, &m);
            f.bounds = Some(transformed);
            global.grow_bounds(transformed);
        }

        self.transformation = Some(m);
        self.bounds = Some(global);
        Ok(())
    }

    pub fn num_points(&self) -> Option<u64> {
        self.num_points
    }

    pub fn bounds(&self) -> Option<Bounds> {
        self.bounds
    }

    pub fn schema(&self) -> Option<&Schema> {
        self.schema.as_ref()
    }

    pub fn delta(&self) -> Option<&Delta> {
        self.delta.as_ref()
    }

    pub fn srs_list(&self) -> &[String] {
        &self.srs_list
    }

    pub fn transformation(&self) -> Option<&Matrix> {
        self.transformation.as_ref()
    }

    /// Snapshot of the per-file records.
    pub fn file_info(&self) -> Vec<FileInfo> {
        self.ctx.files.iter().map(|slot| slot.lock().clone()).collect()
    }

    /// The serialized inference artifact.
    pub fn to_json(&self) -> Result<serde_json::Value> {
        if !self.done {
            return Err(Error::Incomplete);
        }
        let schema = self.schema.as_ref().ok_or(Error::Incomplete)?;
        let bounds = self.bounds.ok_or(Error::Incomplete)?;
        let num_points = self.num_points.ok_or(Error::Incomplete)?;

        let mut json = serde_json::json!({
            "fileInfo": self.file_info(),
            "schema": schema,
            "bounds": bounds,
            "numPoints": num_points,
        });
        if let Some(r) = &self.ctx.reprojection {
            json["reprojection"] = serde_json::to_value(r)?;
        }
        if let Some(d) = &self.delta {
            json["scale"] = serde_json::to_value(d.scale)?;
            json["offset"] = serde_json::to_value(d.offset)?;
        }
        Ok(json)
    }
}

/// Per-axis: keep exact multiples of 10, otherwise truncate and round up
/// to the next multiple of 10.
fn tidy_offset(mid: Point) -> Point {
    mid.map(|d| {
        let v = d.trunc() as i64;
        if (v / 10 * 10) as f64 == d {
            v as f64
        } else {
            ((v + 10) / 10 * 10) as f64
        }
    })
}

/// One file's probe. Only an invalid declared scale is fatal to the run;
/// anything else lands on the file's record and the siblings carry on.
fn probe(ctx: &ProbeCtx, index: usize) -> Result<()> {
    match probe_file(ctx, index) {
        Ok(()) => Ok(()),
        Err(e @ Error::InvalidScale { .. }) => Err(e),
        Err(e) => {
            let mut f = ctx.files[index].lock();
            if f.status == Status::Outstanding {
                f.status = Status::Error;
            }
            f.error = Some(e.to_string());
            log::warn!("{}: {e}", f.path);
            Ok(())
        }
    }
}

fn probe_file(ctx: &ProbeCtx, index: usize) -> Result<()> {
    let path = ctx.files[index].lock().path.clone();

    if ctx.store.is_http_derived(&path) {
        // Stage the front of the file into tmp, flattening separators so
        // the object name fits a single directory.
        let data = ctx.store.get_range(&path, HEADER_RANGE)?;
        let name = path.replace(['/', '\\'], "-");
        ctx.tmp.put(&name, &data)?;
        let staged = LocalHandle::new(PathBuf::from(ctx.tmp.full_path(&name)), true);
        add(ctx, index, staged.path())
    } else {
        let handle = ctx.store.local_handle(&path, &ctx.tmp)?;
        add(ctx, index, handle.path())
    }
}

fn add(ctx: &ProbeCtx, index: usize, local: &Path) -> Result<()> {
    let preview = match ctx.driver.preview(local, ctx.reprojection.as_ref()) {
        Ok(preview) => preview,
        Err(e) => {
            log::debug!("preview failed for {}: {e}", local.display());
            None
        }
    };
    let had_preview = preview.is_some();

    if let Some(preview) = preview {
        {
            let mut meta = ctx.shared.lock();

            if !preview.srs.is_empty() {
                ctx.files[index].lock().srs = Some(preview.srs.clone());
            }

            if let Some(scale) = preview.scale {
                if scale.x == 0.0 || scale.y == 0.0 || scale.z == 0.0 {
                    return Err(Error::InvalidScale {
                        path: ctx.files[index].lock().path.clone(),
                    });
                }
                if let Some(delta) = &mut meta.delta {
                    // Smallest scale wins: the finest quantization any
                    // input needs.
                    delta.scale = Point::min(delta.scale, scale);
                } else if ctx.allow_delta {
                    meta.delta = Some(Delta::new(scale, Point::ZERO));
                }
            }

            for name in &preview.dim_names {
                if meta.dim_set.insert(name.clone()) {
                    meta.dim_names.push(name.clone());
                }
            }
        }

        if ctx.trust_headers {
            ctx.files[index]
                .lock()
                .record(preview.num_points, preview.bounds, preview.metadata);
            return Ok(());
        }
    }

    // Streaming scan: fold count and bounds without retaining the points.
    let mut bounds = Bounds::EXPANDER;
    let mut count: u64 = 0;
    let scanned = ctx
        .driver
        .run(local, ctx.reprojection.as_ref(), None, &mut |p| {
            count += 1;
            bounds.grow(p);
        });

    match scanned {
        Ok(()) => {
            ctx.files[index].lock().record(count, bounds, None);
            Ok(())
        }
        Err(e) => {
            let mut f = ctx.files[index].lock();
            if had_preview {
                f.status = Status::Error;
                f.error = Some(
                    Error::ScanFailure {
                        path: f.path.clone(),
                        message: e.to_string(),
                    }
                    .to_string(),
                );
            } else {
                f.status = Status::Omitted;
            }
            log::warn!("{}: {e}", f.path);
            Ok(())
        }
    }
}
