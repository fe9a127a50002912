use blockfinder_common::{BlockId, BlockRegistry, Result, ScanError};
use blockfinder_nbt::{Compound, Tag};
use std::sync::Arc;

/// Voxels in one 16x16x16 section.
pub const SECTION_VOLUME: usize = 4096;
/// Bytes in a nibble array covering one section.
pub const NIBBLE_ARRAY_BYTES: usize = SECTION_VOLUME / 2;

/// One vertical slab of a chunk in the packed 8-bit (+ optional 4-bit Add)
/// block layout. Borrowed from the decoded chunk document.
#[derive(Debug, Clone, Copy)]
pub struct Section<'a> {
    pub y: i8,
    blocks: &'a [i8],
    add: Option<&'a [i8]>,
}

impl<'a> Section<'a> {
    /// Validates array lengths. `Blocks` must hold exactly one byte per voxel
    /// and `Add`, when present, one nibble per voxel.
    pub fn new(y: i8, blocks: &'a [i8], add: Option<&'a [i8]>) -> Result<Self> {
        if blocks.len() != SECTION_VOLUME {
            return Err(ScanError::InvalidLength {
                field: "Blocks".to_owned(),
                expected: SECTION_VOLUME,
                actual: blocks.len(),
            });
        }
        if let Some(add) = add {
            if add.len() != NIBBLE_ARRAY_BYTES {
                return Err(ScanError::InvalidLength {
                    field: "Add".to_owned(),
                    expected: NIBBLE_ARRAY_BYTES,
                    actual: add.len(),
                });
            }
        }
        Ok(Section { y, blocks, add })
    }

    pub fn has_add(&self) -> bool {
        self.add.is_some()
    }

    /// Combined id at a linear index: low byte from `Blocks`, bits 8-11 from
    /// the `Add` nibble (even index in the low half of the byte).
    pub fn block_id(&self, index: usize) -> BlockId {
        let low = self.blocks[index] as u8 as BlockId;
        let high = match self.add {
            Some(add) => {
                let byte = add[index / 2] as u8;
                if index % 2 == 0 {
                    byte & 0x0F
                } else {
                    byte >> 4
                }
            }
            None => 0,
        };
        low | ((high as BlockId) << 8)
    }

    /// All `(index, id)` pairs in index order.
    pub fn block_ids(&self) -> impl Iterator<Item = (usize, BlockId)> + '_ {
        (0..SECTION_VOLUME).map(move |index| (index, self.block_id(index)))
    }
}

/// Walks decoded chunk documents down to their block sections.
///
/// The optional registry is a name lookup only and never changes what is
/// extracted.
#[derive(Debug, Clone, Default)]
pub struct SectionExtractor {
    registry: Option<Arc<BlockRegistry>>,
}

impl SectionExtractor {
    pub fn new(registry: Option<Arc<BlockRegistry>>) -> Self {
        SectionExtractor { registry }
    }

    pub fn block_name(&self, id: BlockId) -> Option<&str> {
        self.registry.as_deref().and_then(|registry| registry.name_of(id))
    }

    /// Resolves `Level.xPos`, `Level.zPos` and `Level.Sections` up front;
    /// individual sections are validated lazily as the iterator advances.
    pub fn sections<'a>(&self, root: &'a Tag) -> Result<Sections<'a>> {
        let root = root
            .as_compound()
            .ok_or_else(|| ScanError::missing("<root compound>"))?;
        let level = root
            .get("Level")
            .and_then(Tag::as_compound)
            .ok_or_else(|| ScanError::missing("Level"))?;

        let chunk_x = require_int(level, "xPos")?;
        let chunk_z = require_int(level, "zPos")?;
        let sections = level
            .get("Sections")
            .and_then(Tag::as_list)
            .ok_or_else(|| ScanError::missing("Level.Sections"))?;

        Ok(Sections {
            chunk_x,
            chunk_z,
            entries: sections.iter().enumerate(),
        })
    }
}

fn require_int(level: &Compound, name: &str) -> Result<i32> {
    level
        .get(name)
        .and_then(Tag::as_i32)
        .ok_or_else(|| ScanError::missing(format!("Level.{}", name)))
}

/// Lazy sequence of `(section, chunk_x, chunk_z)` for one chunk.
#[derive(Debug)]
pub struct Sections<'a> {
    pub chunk_x: i32,
    pub chunk_z: i32,
    entries: std::iter::Enumerate<std::slice::Iter<'a, Tag>>,
}

impl<'a> Sections<'a> {
    fn parse(index: usize, tag: &'a Tag) -> Result<Section<'a>> {
        let compound = tag
            .as_compound()
            .ok_or_else(|| ScanError::missing(format!("Level.Sections[{}]", index)))?;
        let y = compound
            .get("Y")
            .and_then(Tag::as_i8)
            .ok_or_else(|| ScanError::missing(format!("Level.Sections[{}].Y", index)))?;
        let blocks = compound
            .get("Blocks")
            .and_then(Tag::as_byte_array)
            .ok_or_else(|| ScanError::missing(format!("Level.Sections[{}].Blocks", index)))?;
        let add = compound.get("Add").and_then(Tag::as_byte_array);

        Section::new(y, blocks, add)
    }
}

impl<'a> Iterator for Sections<'a> {
    type Item = Result<(Section<'a>, i32, i32)>;

    fn next(&mut self) -> Option<Self::Item> {
        let (index, tag) = self.entries.next()?;
        Some(Self::parse(index, tag).map(|section| (section, self.chunk_x, self.chunk_z)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}
