use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One piece of an index split into `of` independently-built parts.
///
/// Splits happen in X-Y only, so each tree level holds four times the
/// subsets of the previous one; `of` must be a power of four.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subset {
    pub id: u64,
    pub of: u64,
}

impl Subset {
    pub fn new(id: u64, of: u64) -> Result<Self> {
        let subset = Subset { id, of };
        subset.validate()?;
        Ok(subset)
    }

    pub fn validate(&self) -> Result<()> {
        if self.id == 0 {
            return Err(Error::InvalidSubset("subset IDs are 1-based".into()));
        }
        if self.id > self.of {
            return Err(Error::InvalidSubset(format!(
                "id {} exceeds range {}",
                self.id, self.of
            )));
        }
        if self.of < 4 || !self.of.is_power_of_two() || self.of.trailing_zeros() % 2 != 0 {
            return Err(Error::InvalidSubset(format!(
                "range {} is not a power of 4",
                self.of
            )));
        }
        Ok(())
    }

    /// Depth at which the tree first has at least `of` nodes: no data may
    /// land shallower, or the subsets would overlap.
    pub fn minimum_null_depth(&self) -> u64 {
        let mut depth = 1;
        let mut cap = 4u64;
        while cap < self.of {
            depth += 1;
            cap *= 4;
        }
        depth
    }

    /// Smallest base depth whose chunk count covers the subset split.
    pub fn minimum_base_depth(&self, points_per_chunk: u64) -> u64 {
        let mut min = log4_ceil(points_per_chunk);
        let mut chunks = 1u64;
        while chunks < self.of {
            min += 1;
            chunks *= 4;
        }
        min
    }
}

fn log4_ceil(n: u64) -> u64 {
    let mut depth = 0;
    let mut v = 1u64;
    while v < n {
        v *= 4;
        depth += 1;
    }
    depth
}
