//! Build configuration: the recognized option surface, defaults, and the
//! resolver that merges user settings with inferred dataset properties
//! into a final build descriptor.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::bounds::Bounds;
use crate::cesium::CesiumSettings;
use crate::delta::{self, Delta};
use crate::driver::Driver;
use crate::error::{Error, Result};
use crate::fileinfo::{FileInfo, FileStats};
use crate::inference::{Inference, InferenceOptions};
use crate::matrix::Matrix;
use crate::point::Point;
use crate::reprojection::Reprojection;
use crate::schema::Schema;
use crate::storage::{BlobStore, Endpoint};
use crate::subset::Subset;

/// Marker object a finished or in-progress build leaves at its output
/// root; subset builds carry an `-<id>` postfix.
pub const BUILD_MARKER: &str = "entwine";

/// Extension of a serialized inference artifact.
pub const INFERENCE_EXTENSION: &str = "entwine-inference";

/// Earth-centered earth-fixed output required for cesium tiling.
pub const ECEF_SRS: &str = "EPSG:4978";

/// One path or several.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Input {
    One(String),
    Many(Vec<String>),
}

impl Input {
    pub fn paths(&self) -> Vec<String> {
        match self {
            Input::One(path) => vec![path.clone()],
            Input::Many(paths) => paths.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Formats {
    #[serde(default)]
    pub cesium: Option<CesiumSettings>,
}

/// The full recognized configuration surface. Unknown keys are rejected
/// rather than silently ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Config {
    pub input: Option<Input>,
    pub output: Option<String>,
    pub tmp: Option<String>,
    pub threads: Option<usize>,
    pub trust_headers: Option<bool>,
    pub prefix_ids: Option<bool>,
    pub points_per_chunk: Option<u64>,
    pub num_points_hint: Option<u64>,
    pub bounds: Option<Bounds>,
    pub schema: Option<Schema>,
    pub compress: Option<bool>,
    pub null_depth: Option<u64>,
    pub base_depth: Option<u64>,
    pub force: Option<bool>,
    pub verbose: Option<bool>,
    pub absolute: Option<bool>,
    pub reprojection: Option<Reprojection>,
    #[serde(default, deserialize_with = "delta::scalar_or_triple")]
    pub scale: Option<Point>,
    #[serde(default, deserialize_with = "delta::scalar_or_triple")]
    pub offset: Option<Point>,
    pub subset: Option<Subset>,
    pub formats: Option<Formats>,
}

impl Config {
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    pub fn from_slice(raw: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(raw)?)
    }

    /// Fill every unset option that has a default.
    pub fn fill_defaults(&mut self) {
        self.tmp.get_or_insert_with(|| "tmp".to_owned());
        self.threads.get_or_insert(8);
        self.trust_headers.get_or_insert(true);
        self.prefix_ids.get_or_insert(false);
        self.points_per_chunk.get_or_insert(262144);
        self.compress.get_or_insert(true);
        self.null_depth.get_or_insert(7);
        self.base_depth.get_or_insert(10);
        self.force.get_or_insert(false);
        self.verbose.get_or_insert(false);
        self.absolute.get_or_insert(false);
    }
}

/// Normalize a raw input token toward glob form: directories gain a `*`,
/// and an extensionless basename is treated as a directory.
pub fn directorify(raw: &str) -> String {
    if raw.is_empty() || raw.ends_with('*') {
        return raw.to_owned();
    }
    if raw.ends_with('/') || Path::new(raw).is_dir() {
        return format!("{raw}*");
    }
    let basename = raw.rsplit(['/', '\\']).next().unwrap_or(raw);
    if !basename.contains('.') {
        return format!("{raw}/*");
    }
    raw.to_owned()
}

fn extension(path: &str) -> String {
    Path::new(path)
        .extension()
        .map(|e| e.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Serialized inference artifact, as written by `Inference::to_json`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InferenceArtifact {
    file_info: Vec<FileInfo>,
    schema: Schema,
    bounds: Bounds,
    num_points: u64,
    #[serde(default)]
    reprojection: Option<Reprojection>,
    #[serde(default, deserialize_with = "delta::scalar_or_triple")]
    scale: Option<Point>,
    #[serde(default, deserialize_with = "delta::scalar_or_triple")]
    offset: Option<Point>,
}

/// A prior build was found at the output; nothing to infer.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Continuation {
    pub output: String,
    pub marker: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub appended: Vec<FileInfo>,
}

/// Everything the tree builder needs, fully resolved.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildDescriptor {
    pub file_info: Vec<FileInfo>,
    pub file_stats: FileStats,
    pub schema: Schema,
    pub bounds: Bounds,
    pub num_points: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reprojection: Option<Reprojection>,
    #[serde(flatten)]
    pub delta: Option<Delta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transformation: Option<Matrix>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subset: Option<Subset>,
    pub null_depth: u64,
    pub base_depth: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bump_depth: Option<u64>,
    pub points_per_chunk: u64,
    pub compress: bool,
    pub trust_headers: bool,
    pub prefix_ids: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    pub tmp: String,
    pub threads: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cesium: Option<CesiumSettings>,
}

impl BuildDescriptor {
    /// Manifest path listing, in origin order.
    pub fn paths(&self) -> Vec<String> {
        self.file_info.iter().map(|f| f.path.clone()).collect()
    }

    /// The reusable inference artifact for this build.
    pub fn to_inference_json(&self) -> Result<serde_json::Value> {
        let mut json = serde_json::json!({
            "fileInfo": self.file_info,
            "schema": self.schema,
            "bounds": self.bounds,
            "numPoints": self.num_points,
        });
        if let Some(r) = &self.reprojection {
            json["reprojection"] = serde_json::to_value(r)?;
        }
        if let Some(d) = &self.delta {
            json["scale"] = serde_json::to_value(d.scale)?;
            json["offset"] = serde_json::to_value(d.offset)?;
        }
        Ok(json)
    }
}

#[derive(Debug)]
pub enum Resolved {
    Continuation(Continuation),
    Build(Box<BuildDescriptor>),
}

/// Merges defaults, user configuration, and inferred dataset properties;
/// user settings always win over inference, inference over defaults.
pub struct Resolver {
    driver: Arc<dyn Driver>,
    store: Arc<dyn BlobStore>,
}

impl Resolver {
    pub fn new(driver: Arc<dyn Driver>, store: Arc<dyn BlobStore>) -> Self {
        Self { driver, store }
    }

    pub fn resolve(&self, mut config: Config) -> Result<Resolved> {
        config.fill_defaults();
        let verbose = config.verbose.unwrap_or(false);

        // Input normalization, including adoption of a prior serialized
        // inference.
        let mut file_info: Vec<FileInfo> = Vec::new();
        let mut schema_from_artifact = false;

        let inference_path = match &config.input {
            Some(Input::One(path)) if extension(path) == INFERENCE_EXTENSION => Some(path.clone()),
            _ => None,
        };

        if let Some(path) = inference_path {
            log::info!("adopting inference from {path}");
            let raw = self.store.get(&path)?;
            let artifact: InferenceArtifact = serde_json::from_slice(&raw)?;
            file_info = artifact.file_info;
            if config.schema.is_none() {
                config.schema = Some(artifact.schema);
                schema_from_artifact = true;
            }
            if config.bounds.is_none() {
                config.bounds = Some(artifact.bounds);
            }
            if config.num_points_hint.is_none() {
                config.num_points_hint = Some(artifact.num_points);
            }
            if config.reprojection.is_none() {
                config.reprojection = artifact.reprojection;
            }
            if config.scale.is_none() {
                config.scale = artifact.scale;
            }
            if config.offset.is_none() {
                config.offset = artifact.offset;
            }
        } else if let Some(input) = &config.input {
            for raw in input.paths() {
                let expanded = directorify(&raw);
                for path in self.store.resolve(&expanded, verbose)? {
                    file_info.push(FileInfo::new(path));
                }
            }
        }

        // A prior build at the output short-circuits inference entirely;
        // newly supplied paths extend its manifest.
        if !config.force.unwrap_or(false) {
            if let Some(output) = &config.output {
                let marker = match &config.subset {
                    Some(s) => format!("{BUILD_MARKER}-{}", s.id),
                    None => BUILD_MARKER.to_owned(),
                };
                let endpoint = Endpoint::new(Arc::clone(&self.store), output.clone());
                if endpoint.try_get_size(&marker).is_some() {
                    log::info!("continuing existing build at {output}");
                    return Ok(Resolved::Continuation(Continuation {
                        output: output.clone(),
                        marker,
                        appended: file_info,
                    }));
                }
            }
        }

        let cesium = config.formats.as_ref().and_then(|f| f.cesium.clone());
        let mut absolute = config.absolute.unwrap_or(false);
        if cesium.is_some() {
            absolute = true;
            if let Some(r) = config.reprojection.as_mut() {
                r.out = ECEF_SRS.to_owned();
            } else {
                config.reprojection = Some(Reprojection::to(ECEF_SRS));
            }
        }

        let mut delta = if !absolute && (config.scale.is_some() || config.offset.is_some()) {
            Some(Delta::new(
                config.scale.unwrap_or_else(|| Point::fill(1.0)),
                config.offset.unwrap_or(Point::ZERO),
            ))
        } else {
            None
        };

        let user_schema = config.schema.is_some() && !schema_from_artifact;
        let mut bounds = config.bounds;
        let mut schema = config.schema.take();
        let mut num_points_hint = config.num_points_hint.filter(|n| *n > 0);
        let mut transformation: Option<Matrix> = None;

        let trust_headers = config.trust_headers.unwrap_or(true);
        let tmp = config.tmp.clone().unwrap_or_else(|| "tmp".to_owned());
        let threads = config.threads.unwrap_or(8);

        // Bounds, schema, and a point count are the prerequisites for
        // building; any gap means inferring them from the files.
        if bounds.is_none() || schema.is_none() || num_points_hint.is_none() {
            log::info!("performing dataset inference");
            let options = InferenceOptions {
                reprojection: config.reprojection.clone(),
                trust_headers,
                allow_delta: !absolute,
                tmp: tmp.clone(),
                threads,
                verbose,
                cesiumify: cesium.is_some(),
            };
            let mut inference = Inference::new(
                file_info,
                options,
                Arc::clone(&self.driver),
                Arc::clone(&self.store),
            );
            inference.go()?;
            file_info = inference.file_info();

            if !absolute {
                if let Some(inferred) = inference.delta() {
                    let d = delta.get_or_insert_with(Delta::default);
                    if config.scale.is_none() {
                        d.scale = inferred.scale;
                    }
                    if config.offset.is_none() {
                        d.offset = inferred.offset;
                    }
                }
            }

            if bounds.is_none() {
                bounds = inference.bounds();
                if let Some(b) = bounds {
                    log::info!("inferred bounds: {b:?}");
                }
            }

            if schema.is_none() {
                let mut inferred = inference.schema().cloned().ok_or(Error::Incomplete)?;
                if let Some(d) = &delta {
                    let cube = bounds.ok_or(Error::NoBounds)?.cubeify(Some(d));
                    inferred = Schema::deltify(&cube, d, &inferred);
                }
                schema = Some(inferred);
            }

            if num_points_hint.is_none() {
                num_points_hint = inference.num_points();
            }
            transformation = inference.transformation().copied();
        }

        // A user-supplied schema is trusted verbatim; anything that came
        // out of inference still needs its synthetic id dimensions.
        let schema = {
            let s = schema.ok_or(Error::EmptySchema)?;
            if user_schema {
                s
            } else {
                let max_points = file_info
                    .iter()
                    .filter_map(|f| f.num_points)
                    .max()
                    .unwrap_or(0);
                s.finalize(max_points, file_info.len() as u64)
            }
        };

        let bounds = bounds.ok_or(Error::NoBounds)?;
        let num_points = num_points_hint.ok_or(Error::ZeroPoints)?;

        // Subset accommodation: depths only ever move up, and a bumped
        // base depth remembers where the user wanted it.
        let mut null_depth = config.null_depth.unwrap_or(7);
        let mut base_depth = config.base_depth.unwrap_or(10);
        let mut bump_depth = None;
        let points_per_chunk = config.points_per_chunk.unwrap_or(262144);

        if let Some(subset) = &config.subset {
            subset.validate()?;

            let minimum_null = subset.minimum_null_depth();
            if null_depth < minimum_null {
                log::info!("bumping null depth to accommodate subset: {minimum_null}");
                null_depth = minimum_null;
            }

            let minimum_base = subset.minimum_base_depth(points_per_chunk);
            if base_depth < minimum_base {
                log::info!("bumping base depth to accommodate subset: {minimum_base}");
                bump_depth = Some(base_depth);
                base_depth = minimum_base;
            }
        }

        for (origin, f) in file_info.iter_mut().enumerate() {
            f.origin = Some(origin as u64);
        }
        let file_stats = FileStats::tally(&file_info);

        Ok(Resolved::Build(Box::new(BuildDescriptor {
            file_info,
            file_stats,
            schema,
            bounds,
            num_points,
            reprojection: config.reprojection,
            delta,
            transformation,
            subset: config.subset,
            null_depth,
            base_depth,
            bump_depth,
            points_per_chunk,
            compress: config.compress.unwrap_or(true),
            trust_headers,
            prefix_ids: config.prefix_ids.unwrap_or(false),
            output: config.output,
            tmp,
            threads,
            cesium,
        })))
    }
}
