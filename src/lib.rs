//! Dataset inference and build configuration for hierarchical point-cloud
//! indexing.
//!
//! Given a set of point-cloud files, this crate probes them in parallel to
//! infer global properties no single file can be trusted for (bounds,
//! counts, dimension layout, quantization), reconciles those with user
//! configuration, and emits a fully-resolved build descriptor for the tree
//! builder.

pub mod bounds;
pub mod cesium;
pub mod config;
pub mod delta;
pub mod driver;
pub mod error;
pub mod fileinfo;
pub mod inference;
pub mod laz;
pub mod matrix;
pub mod point;
pub mod pool;
pub mod reprojection;
pub mod schema;
pub mod storage;
pub mod subset;

pub use bounds::Bounds;
pub use config::{BuildDescriptor, Config, Resolved, Resolver};
pub use delta::Delta;
pub use driver::{Driver, Preview};
pub use error::{Error, Result};
pub use fileinfo::{FileInfo, FileStats, Status};
pub use inference::{Inference, InferenceOptions};
pub use point::Point;
pub use reprojection::Reprojection;
pub use schema::{DimInfo, DimKind, Schema};
pub use storage::{BlobStore, Endpoint, LocalFs, LocalHandle};
pub use subset::Subset;
