use serde::{Deserialize, Serialize};

/// Reprojection request handed through to the point reader. The reader
/// performs the reprojection; this crate only carries the specification.
///
/// `hammer` forces `in_srs` over whatever the file headers declare.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reprojection {
    #[serde(rename = "in", default, skip_serializing_if = "Option::is_none")]
    pub in_srs: Option<String>,
    pub out: String,
    #[serde(default)]
    pub hammer: bool,
}

impl Reprojection {
    pub fn to(out: impl Into<String>) -> Self {
        Self {
            in_srs: None,
            out: out.into(),
            hammer: false,
        }
    }
}
