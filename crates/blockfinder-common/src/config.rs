use crate::types::BlockId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;

pub const DEFAULT_POOL_SIZE: usize = 4;
pub const DEFAULT_MAX_TAG_DEPTH: usize = 512;
pub const DEFAULT_RESULT_FILE: &str = "result.json";

/// Parameters for one scan of a world directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    pub world_dir: PathBuf,
    pub block_ids: BTreeSet<BlockId>,
    pub pool_size: usize,
    pub max_tag_depth: usize,
    pub result_file: PathBuf,
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            world_dir: PathBuf::from("."),
            block_ids: BTreeSet::new(),
            pool_size: DEFAULT_POOL_SIZE,
            max_tag_depth: DEFAULT_MAX_TAG_DEPTH,
            result_file: PathBuf::from(DEFAULT_RESULT_FILE),
        }
    }
}

impl ScanConfig {
    pub fn new(world_dir: impl Into<PathBuf>, block_ids: impl IntoIterator<Item = BlockId>) -> Self {
        ScanConfig {
            world_dir: world_dir.into(),
            block_ids: block_ids.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub fn with_max_tag_depth(mut self, max_tag_depth: usize) -> Self {
        self.max_tag_depth = max_tag_depth;
        self
    }

    /// Region files live in the `region` subdirectory of the world.
    pub fn region_dir(&self) -> PathBuf {
        self.world_dir.join("region")
    }

    /// Worker count, never below one.
    pub fn effective_pool_size(&self) -> usize {
        self.pool_size.max(1)
    }
}
