pub mod chunk;
pub mod coords;
pub mod region;

pub use chunk::{Section, SectionExtractor, Sections, SECTION_VOLUME};
pub use coords::to_world;
pub use region::{ChunkPayload, CompressionType, RegionFile, SlotCoords};
