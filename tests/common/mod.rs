#![allow(dead_code)]

use blockfinder_nbt::{Compound, NBTFile, Tag};
use byteorder::{BigEndian, WriteBytesExt};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const GZIP: u8 = 1;
pub const ZLIB: u8 = 2;
pub const UNCOMPRESSED: u8 = 3;

const SECTOR: usize = 4096;
const HEADER: usize = 8192;

/// A section as `(Y, Blocks, Add)`.
pub struct SectionSpec {
    pub y: i8,
    pub blocks: Vec<i8>,
    pub add: Option<Vec<i8>>,
}

impl SectionSpec {
    /// Section whose `Blocks` are zero except at the given indices.
    pub fn with_blocks(y: i8, placed: &[(usize, u8)]) -> Self {
        let mut blocks = vec![0i8; 4096];
        for &(index, id) in placed {
            blocks[index] = id as i8;
        }
        SectionSpec {
            y,
            blocks,
            add: None,
        }
    }

    /// Places full 12-bit ids, filling an `Add` array as needed.
    pub fn with_wide_blocks(y: i8, placed: &[(usize, u16)]) -> Self {
        let mut blocks = vec![0i8; 4096];
        let mut add = vec![0u8; 2048];
        for &(index, id) in placed {
            blocks[index] = (id & 0xFF) as u8 as i8;
            let high = ((id >> 8) & 0x0F) as u8;
            if index % 2 == 0 {
                add[index / 2] |= high;
            } else {
                add[index / 2] |= high << 4;
            }
        }
        SectionSpec {
            y,
            blocks,
            add: Some(add.into_iter().map(|b| b as i8).collect()),
        }
    }
}

pub fn chunk_document(chunk_x: i32, chunk_z: i32, sections: Vec<SectionSpec>) -> NBTFile {
    let sections = sections
        .into_iter()
        .map(|spec| {
            let mut section = Compound::new()
                .with("Y", Tag::Byte(spec.y))
                .with("Blocks", Tag::ByteArray(spec.blocks))
                .with("Data", Tag::ByteArray(vec![0; 2048]))
                .with("SkyLight", Tag::ByteArray(vec![-1; 2048]));
            if let Some(add) = spec.add {
                section.insert("Add", Tag::ByteArray(add));
            }
            Tag::Compound(section)
        })
        .collect();

    let level = Compound::new()
        .with("xPos", Tag::Int(chunk_x))
        .with("zPos", Tag::Int(chunk_z))
        .with("LastUpdate", Tag::Long(1024))
        .with("TerrainPopulated", Tag::Byte(1))
        .with("HeightMap", Tag::IntArray(vec![64; 256]))
        .with("Sections", Tag::List(sections))
        .with("Entities", Tag::List(vec![]));
    let root = Compound::new()
        .with("DataVersion", Tag::Int(1343))
        .with("Level", Tag::Compound(level));
    NBTFile::new(String::new(), Tag::Compound(root))
}

pub fn compress(document: &NBTFile, compression: u8) -> Vec<u8> {
    let mut bytes = Vec::new();
    match compression {
        GZIP => document.write_gzip(&mut bytes).unwrap(),
        ZLIB => document.write_zlib(&mut bytes).unwrap(),
        _ => document.write(&mut bytes).unwrap(),
    }
    bytes
}

/// Assembles region files slot by slot.
#[derive(Default)]
pub struct RegionBuilder {
    slots: Vec<(u8, u8, Vec<u8>)>,
}

impl RegionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn chunk(self, x: u8, z: u8, document: &NBTFile, compression: u8) -> Self {
        let data = compress(document, compression);
        self.raw(x, z, compression, &data)
    }

    /// A slot whose payload is written as given, with the length field
    /// derived from `data`.
    pub fn raw(mut self, x: u8, z: u8, compression: u8, data: &[u8]) -> Self {
        let mut payload = Vec::new();
        payload
            .write_u32::<BigEndian>(data.len() as u32 + 1)
            .unwrap();
        payload.write_u8(compression).unwrap();
        payload.extend_from_slice(data);
        self.slots.push((x, z, payload));
        self
    }

    /// A slot whose length field claims more bytes than its sectors hold.
    pub fn truncated(mut self, x: u8, z: u8) -> Self {
        let mut payload = Vec::new();
        payload.write_u32::<BigEndian>(9000).unwrap();
        payload.write_u8(ZLIB).unwrap();
        payload.extend_from_slice(&[0x78, 0x9c, 0x01]);
        self.slots.push((x, z, payload));
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut header = vec![0u8; HEADER];
        let mut body = Vec::new();
        let mut next_sector = (HEADER / SECTOR) as u32;

        for (x, z, payload) in &self.slots {
            let sectors = payload.len().div_ceil(SECTOR).max(1);
            let entry = (next_sector << 8) | sectors as u32;
            let at = (*x as usize + *z as usize * 32) * 4;
            header[at..at + 4].copy_from_slice(&entry.to_be_bytes());

            body.extend_from_slice(payload);
            body.resize(body.len().div_ceil(SECTOR) * SECTOR, 0);
            next_sector += sectors as u32;
        }

        header.extend(body);
        header
    }

    pub fn write_to(&self, path: &Path) -> PathBuf {
        fs::write(path, self.build()).unwrap();
        path.to_path_buf()
    }
}

/// Temporary world with an empty `region` directory.
pub struct TestWorld {
    pub dir: TempDir,
}

impl TestWorld {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("region")).unwrap();
        TestWorld { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn region_dir(&self) -> PathBuf {
        self.dir.path().join("region")
    }

    pub fn add_region(&self, region_x: i32, region_z: i32, builder: &RegionBuilder) -> PathBuf {
        let name = format!("r.{}.{}.mca", region_x, region_z);
        builder.write_to(&self.region_dir().join(name))
    }
}
