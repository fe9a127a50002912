use crate::types::BlockId;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::Path;

/// Optional lookup from numeric block ids to readable names.
///
/// Nothing in the scan depends on it; when present it only decorates log
/// output and lets the CLI accept names in place of ids.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockRegistry {
    names: HashMap<BlockId, String>,
}

impl BlockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: BlockId, name: impl Into<String>) {
        self.names.insert(id, name.into());
    }

    pub fn name_of(&self, id: BlockId) -> Option<&str> {
        self.names.get(&id).map(String::as_str)
    }

    /// Reverse lookup. Accepts names with or without the `minecraft:` prefix.
    pub fn id_of(&self, name: &str) -> Option<BlockId> {
        let bare = name.strip_prefix("minecraft:").unwrap_or(name);
        self.names.iter().find_map(|(id, candidate)| {
            let candidate_bare = candidate.strip_prefix("minecraft:").unwrap_or(candidate);
            (candidate_bare == bare).then_some(*id)
        })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Parses `{"1": "minecraft:stone", "2": "minecraft:grass"}`.
    pub fn from_json(json: &str) -> io::Result<Self> {
        let raw: HashMap<String, String> = serde_json::from_str(json)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let mut registry = BlockRegistry::new();
        for (key, name) in raw {
            let id = key.trim().parse::<BlockId>().map_err(|e| {
                io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("Invalid block id {:?}: {}", key, e),
                )
            })?;
            registry.insert(id, name);
        }
        Ok(registry)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Self::from_json(&fs::read_to_string(path)?)
    }
}
