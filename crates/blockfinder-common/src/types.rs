use serde::{Deserialize, Serialize};

pub type Result<T> = std::result::Result<T, crate::error::ScanError>;

/// Block ids in the pre-flattening layout are 12 bits wide.
pub type BlockId = u16;

/// A voxel whose id matched the search, in absolute world coordinates.
///
/// Serializes as a 4-element array `[block_id, x, y, z]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "(BlockId, i32, i32, i32)", into = "(BlockId, i32, i32, i32)")]
pub struct SearchMatch {
    pub block_id: BlockId,
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl SearchMatch {
    pub fn new(block_id: BlockId, x: i32, y: i32, z: i32) -> Self {
        SearchMatch { block_id, x, y, z }
    }
}

impl From<(BlockId, i32, i32, i32)> for SearchMatch {
    fn from((block_id, x, y, z): (BlockId, i32, i32, i32)) -> Self {
        SearchMatch { block_id, x, y, z }
    }
}

impl From<SearchMatch> for (BlockId, i32, i32, i32) {
    fn from(m: SearchMatch) -> Self {
        (m.block_id, m.x, m.y, m.z)
    }
}
