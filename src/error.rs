//! Crate-wide error type.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures surfaced by inference and configuration resolution.
///
/// Per-file problems (an unreadable or unrecognized file) are recorded on
/// the offending file's record and do not abort the run; the variants here
/// that carry a path are the ones that do.
#[derive(Debug, Error)]
pub enum Error {
    /// A file declared a scale with a zero component.
    #[error("invalid scale at {path}")]
    InvalidScale { path: String },

    /// No input file was recognized by the reader.
    #[error("no point cloud files found")]
    NoValidInputs,

    /// Aggregation produced a zero point count.
    #[error("zero points found")]
    ZeroPoints,

    /// The synthesized schema has no dimensions.
    #[error("no schema dimensions found")]
    EmptySchema,

    /// Aggregated bounds were never grown.
    #[error("no bounds found")]
    NoBounds,

    /// Cesium output was requested but a file has no bounds to transform.
    #[error("no bounds present for transform at {path}")]
    MissingBoundsForTransform { path: String },

    /// `Inference::go` was invoked twice on the same instance.
    #[error("inference cannot be run twice")]
    DoubleRun,

    /// An inference result was requested before the run completed.
    #[error("inference incomplete")]
    Incomplete,

    #[error("invalid subset: {0}")]
    InvalidSubset(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A remote path reached a store that only speaks the local filesystem.
    #[error("unsupported remote path: {0}")]
    UnsupportedRemote(String),

    /// A streaming point scan failed partway through a file.
    #[error("scan failed at {path}: {message}")]
    ScanFailure { path: String, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Las(#[from] las::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
}
