use serde::{Deserialize, Serialize};

use crate::bounds::Bounds;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Outstanding,
    Inserted,
    Omitted,
    Error,
}

/// Per-file manifest record, populated by the probe pass.
///
/// When `status` is `Inserted`, `num_points` and `bounds` are set.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    pub path: String,
    #[serde(default)]
    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_points: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bounds: Option<Bounds>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub srs: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileInfo {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            status: Status::Outstanding,
            num_points: None,
            bounds: None,
            srs: None,
            metadata: None,
            origin: None,
            error: None,
        }
    }

    /// Record probe results and mark the file inserted.
    pub fn record(&mut self, num_points: u64, bounds: Bounds, metadata: Option<serde_json::Value>) {
        self.num_points = Some(num_points);
        self.bounds = Some(bounds);
        if metadata.is_some() {
            self.metadata = metadata;
        }
        self.status = Status::Inserted;
    }
}

/// Status tallies over a file list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileStats {
    pub inserts: u64,
    pub omits: u64,
    pub errors: u64,
}

impl FileStats {
    pub fn tally(files: &[FileInfo]) -> Self {
        let mut stats = FileStats::default();
        for f in files {
            match f.status {
                Status::Inserted => stats.inserts += 1,
                Status::Omitted => stats.omits += 1,
                Status::Error => stats.errors += 1,
                Status::Outstanding => {}
            }
        }
        stats
    }
}
