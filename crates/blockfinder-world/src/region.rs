use blockfinder_common::{Result, ScanError};
use byteorder::{BigEndian, ReadBytesExt};
use bytes::Bytes;
use flate2::read::{GzDecoder, ZlibDecoder};
use std::fmt;
use std::fs::File;
use std::io::{self, Cursor, Read};
use std::path::Path;

/// Chunks along one edge of a region.
pub const REGION_WIDTH: u8 = 32;
/// Amount of chunk slots in a region.
pub const REGION_CHUNKS: usize = 1024;
/// Region sector length in bytes.
pub const SECTOR_BYTES: u64 = 4096;
/// Location table followed by timestamp table, one u32 per slot each.
pub const HEADER_BYTES: usize = 8 * REGION_CHUNKS;

/// Payload length (u32) plus compression type (u8).
const PAYLOAD_HEADER_BYTES: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionType {
    Gzip,
    Zlib,
    Uncompressed,
}

impl TryFrom<u8> for CompressionType {
    type Error = ScanError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            1 => Ok(CompressionType::Gzip),
            2 => Ok(CompressionType::Zlib),
            3 => Ok(CompressionType::Uncompressed),
            other => Err(ScanError::UnknownCompression(other)),
        }
    }
}

/// Position of a slot inside its region. Components outside `0..32` name no
/// slot and read as absent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotCoords {
    x: u8,
    z: u8,
}

impl SlotCoords {
    pub fn new(x: u8, z: u8) -> Self {
        SlotCoords { x, z }
    }

    /// Index of this slot in the header tables.
    pub fn header_index(&self) -> usize {
        self.x as usize + self.z as usize * REGION_WIDTH as usize
    }

    /// Every slot, x outer and z inner.
    pub fn all() -> impl Iterator<Item = SlotCoords> {
        (0..REGION_WIDTH).flat_map(|x| (0..REGION_WIDTH).map(move |z| SlotCoords::new(x, z)))
    }
}

impl fmt::Display for SlotCoords {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.z)
    }
}

/// Chunk location entry from the region header.
#[derive(Copy, Clone, Default, Debug, Eq, PartialEq)]
pub struct ChunkLocation {
    /// Sector index from which starts chunk data. Zero means no chunk.
    pub sector_offset: u32,
    /// Amount of sectors used to store chunk.
    pub sector_count: u8,
}

impl ChunkLocation {
    pub fn is_absent(&self) -> bool {
        self.sector_offset == 0
    }

    fn byte_offset(&self) -> u64 {
        self.sector_offset as u64 * SECTOR_BYTES
    }

    fn allocated_bytes(&self) -> u64 {
        self.sector_count as u64 * SECTOR_BYTES
    }
}

/// Compressed bytes of one chunk, still borrowed from the region buffer.
#[derive(Debug, Clone)]
pub struct ChunkPayload {
    pub compression: CompressionType,
    data: Bytes,
}

impl ChunkPayload {
    /// Inflates the payload into the raw tag document bytes.
    pub fn decompress(&self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        match self.compression {
            CompressionType::Gzip => {
                GzDecoder::new(&self.data[..])
                    .read_to_end(&mut buffer)
                    .map_err(ScanError::Decompression)?;
            }
            CompressionType::Zlib => {
                ZlibDecoder::new(&self.data[..])
                    .read_to_end(&mut buffer)
                    .map_err(ScanError::Decompression)?;
            }
            CompressionType::Uncompressed => buffer.extend_from_slice(&self.data),
        }
        Ok(buffer)
    }
}

/// A region file held in memory: the parsed location table plus the raw
/// sectors that payloads are sliced from.
#[derive(Debug)]
pub struct RegionFile {
    data: Bytes,
    locations: Vec<ChunkLocation>,
}

impl RegionFile {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)?;
        Self::from_reader(&mut file)
    }

    pub fn from_reader<R: Read>(reader: &mut R) -> Result<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::from_bytes(data)
    }

    /// Parses the header. A buffer shorter than the header is an I/O error
    /// for the whole file.
    pub fn from_bytes(data: impl Into<Bytes>) -> Result<Self> {
        let data = data.into();
        if data.len() < HEADER_BYTES {
            return Err(ScanError::IoError(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "region header needs {} bytes, file has {}",
                    HEADER_BYTES,
                    data.len()
                ),
            )));
        }

        let locations = Self::read_header(&data[..HEADER_BYTES])?;
        Ok(RegionFile { data, locations })
    }

    /// Only the location table matters for reading; timestamps are skipped.
    fn read_header(header: &[u8]) -> io::Result<Vec<ChunkLocation>> {
        let mut cursor = Cursor::new(header);
        let mut offsets = vec![0u32; REGION_CHUNKS];
        cursor.read_u32_into::<BigEndian>(&mut offsets)?;

        Ok(offsets
            .iter()
            .map(|&offset| ChunkLocation {
                sector_offset: offset >> 8,
                sector_count: (offset & 0xFF) as u8,
            })
            .collect())
    }

    pub fn location(&self, coords: SlotCoords) -> ChunkLocation {
        if coords.x >= REGION_WIDTH || coords.z >= REGION_WIDTH {
            return ChunkLocation::default();
        }
        self.locations
            .get(coords.header_index())
            .copied()
            .unwrap_or_default()
    }

    pub fn present_count(&self) -> usize {
        self.locations.iter().filter(|l| !l.is_absent()).count()
    }

    /// Locates a slot's payload. `Ok(None)` for an absent slot; errors only
    /// concern this slot and leave the rest of the region readable.
    pub fn read_slot(&self, coords: SlotCoords) -> Result<Option<ChunkPayload>> {
        let location = self.location(coords);
        if location.is_absent() {
            return Ok(None);
        }

        let file_len = self.data.len() as u64;
        let start = location.byte_offset();
        let available = file_len.saturating_sub(start);
        if available < PAYLOAD_HEADER_BYTES {
            return Err(ScanError::TruncatedPayload {
                expected: PAYLOAD_HEADER_BYTES,
                available,
            });
        }

        let mut cursor = Cursor::new(&self.data[start as usize..]);
        let length = cursor.read_u32::<BigEndian>()? as u64;
        let compression_type = cursor.read_u8()?;

        if length == 0 {
            return Err(ScanError::TruncatedPayload {
                expected: 1,
                available: 0,
            });
        }
        if 4 + length > location.allocated_bytes() {
            return Err(ScanError::TruncatedPayload {
                expected: 4 + length,
                available: location.allocated_bytes(),
            });
        }
        let data_len = length - 1;
        if data_len > available - PAYLOAD_HEADER_BYTES {
            return Err(ScanError::TruncatedPayload {
                expected: data_len,
                available: available - PAYLOAD_HEADER_BYTES,
            });
        }

        let compression = CompressionType::try_from(compression_type)?;
        let data_start = (start + PAYLOAD_HEADER_BYTES) as usize;
        Ok(Some(ChunkPayload {
            compression,
            data: self.data.slice(data_start..data_start + data_len as usize),
        }))
    }
}

/// Parses the region tile out of a `r.<x>.<z>.mca` (or `.mcr`) file name.
pub fn parse_region_name(file_name: &str) -> Option<(i32, i32)> {
    let stem = file_name
        .strip_suffix(".mca")
        .or_else(|| file_name.strip_suffix(".mcr"))?;
    let mut parts = stem.strip_prefix("r.")?.split('.');
    let x = parts.next()?.parse().ok()?;
    let z = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some((x, z))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use byteorder::WriteBytesExt;
    use flate2::write::{GzEncoder, ZlibEncoder};
    use flate2::Compression;
    use std::io::Write;

    /// Lays out one payload per entry in consecutive single-sector slots.
    fn build_region(entries: &[(SlotCoords, u8, Vec<u8>)]) -> Vec<u8> {
        let mut header = vec![0u8; HEADER_BYTES];
        let mut body = Vec::new();
        for (i, (coords, compression, data)) in entries.iter().enumerate() {
            let sector = 2 + i as u32;
            let entry = (sector << 8) | 1;
            let at = coords.header_index() * 4;
            header[at..at + 4].copy_from_slice(&entry.to_be_bytes());

            let mut sector_bytes = Vec::new();
            sector_bytes
                .write_u32::<BigEndian>(data.len() as u32 + 1)
                .unwrap();
            sector_bytes.write_u8(*compression).unwrap();
            sector_bytes.extend_from_slice(data);
            sector_bytes.resize(SECTOR_BYTES as usize, 0);
            body.extend(sector_bytes);
        }
        header.extend(body);
        header
    }

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn zlib(data: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    #[test]
    fn test_slot_order_is_x_then_z() {
        let slots: Vec<SlotCoords> = SlotCoords::all().collect();
        assert_eq!(slots.len(), REGION_CHUNKS);
        assert_eq!(slots[0], SlotCoords::new(0, 0));
        assert_eq!(slots[1], SlotCoords::new(0, 1));
        assert_eq!(slots[32], SlotCoords::new(1, 0));
        assert_eq!(SlotCoords::new(1, 2).header_index(), 65);
    }

    #[test]
    fn test_short_header_is_io_error() {
        assert_matches!(
            RegionFile::from_bytes(vec![0u8; 100]),
            Err(ScanError::IoError(ref e)) if e.kind() == io::ErrorKind::UnexpectedEof
        );
        assert_matches!(RegionFile::from_bytes(Vec::new()), Err(ScanError::IoError(_)));
    }

    #[test]
    fn test_empty_region_has_only_absent_slots() {
        let region = RegionFile::from_bytes(vec![0u8; HEADER_BYTES]).unwrap();
        assert_eq!(region.present_count(), 0);
        for coords in SlotCoords::all() {
            assert_matches!(region.read_slot(coords), Ok(None));
        }
    }

    #[test]
    fn test_each_compression_type() {
        let document = b"tag document bytes".to_vec();
        let bytes = build_region(&[
            (SlotCoords::new(0, 0), 1, gzip(&document)),
            (SlotCoords::new(5, 9), 2, zlib(&document)),
            (SlotCoords::new(31, 31), 3, document.clone()),
        ]);
        let region = RegionFile::from_bytes(bytes).unwrap();
        assert_eq!(region.present_count(), 3);

        for (coords, expected) in [
            (SlotCoords::new(0, 0), CompressionType::Gzip),
            (SlotCoords::new(5, 9), CompressionType::Zlib),
            (SlotCoords::new(31, 31), CompressionType::Uncompressed),
        ] {
            let payload = region.read_slot(coords).unwrap().unwrap();
            assert_eq!(payload.compression, expected);
            assert_eq!(payload.decompress().unwrap(), document);
        }
    }

    #[test]
    fn test_location_fields() {
        let bytes = build_region(&[(SlotCoords::new(2, 0), 3, vec![1, 2, 3])]);
        let region = RegionFile::from_bytes(bytes).unwrap();
        let location = region.location(SlotCoords::new(2, 0));
        assert_eq!(location.sector_offset, 2);
        assert_eq!(location.sector_count, 1);
        assert!(region.location(SlotCoords::new(0, 2)).is_absent());
    }

    #[test]
    fn test_out_of_range_slot_reads_as_absent() {
        let bytes = build_region(&[(SlotCoords::new(0, 0), 3, vec![1, 2, 3])]);
        let region = RegionFile::from_bytes(bytes).unwrap();
        // x = 32 would alias slot (0, 1) in the header table
        for coords in [SlotCoords::new(40, 0), SlotCoords::new(32, 0), SlotCoords::new(0, 255)] {
            assert!(region.location(coords).is_absent());
            assert_matches!(region.read_slot(coords), Ok(None));
        }
    }

    #[test]
    fn test_unknown_compression_is_slot_local() {
        let bytes = build_region(&[
            (SlotCoords::new(0, 0), 7, vec![0; 8]),
            (SlotCoords::new(0, 1), 3, vec![4, 2]),
        ]);
        let region = RegionFile::from_bytes(bytes).unwrap();
        assert_matches!(
            region.read_slot(SlotCoords::new(0, 0)),
            Err(ScanError::UnknownCompression(7))
        );
        let payload = region.read_slot(SlotCoords::new(0, 1)).unwrap().unwrap();
        assert_eq!(payload.decompress().unwrap(), vec![4, 2]);
    }

    #[test]
    fn test_corrupt_gzip_is_decompression_error() {
        let bytes = build_region(&[(SlotCoords::new(0, 0), 1, vec![0xde, 0xad, 0xbe, 0xef])]);
        let region = RegionFile::from_bytes(bytes).unwrap();
        let payload = region.read_slot(SlotCoords::new(0, 0)).unwrap().unwrap();
        assert_matches!(payload.decompress(), Err(ScanError::Decompression(_)));
    }

    #[test]
    fn test_truncated_payloads() {
        let mut bytes = build_region(&[(SlotCoords::new(0, 0), 3, vec![9; 100])]);
        // cut into the payload
        bytes.truncate(HEADER_BYTES + 50);
        let region = RegionFile::from_bytes(bytes).unwrap();
        assert_matches!(
            region.read_slot(SlotCoords::new(0, 0)),
            Err(ScanError::TruncatedPayload {
                expected: 100,
                available: 45
            })
        );

        // location points past the end of the file
        let mut header = vec![0u8; HEADER_BYTES];
        header[..4].copy_from_slice(&((40u32 << 8) | 1).to_be_bytes());
        let region = RegionFile::from_bytes(header).unwrap();
        assert_matches!(
            region.read_slot(SlotCoords::new(0, 0)),
            Err(ScanError::TruncatedPayload { available: 0, .. })
        );
    }

    #[test]
    fn test_length_beyond_sector_allocation() {
        let mut bytes = build_region(&[(SlotCoords::new(0, 0), 3, vec![1; 10])]);
        bytes[HEADER_BYTES..HEADER_BYTES + 4].copy_from_slice(&8000u32.to_be_bytes());
        let region = RegionFile::from_bytes(bytes).unwrap();
        assert_matches!(
            region.read_slot(SlotCoords::new(0, 0)),
            Err(ScanError::TruncatedPayload {
                expected: 8004,
                available: 4096
            })
        );
    }

    #[test]
    fn test_zero_length_payload() {
        let mut bytes = build_region(&[(SlotCoords::new(0, 0), 3, vec![])]);
        bytes[HEADER_BYTES..HEADER_BYTES + 4].copy_from_slice(&0u32.to_be_bytes());
        let region = RegionFile::from_bytes(bytes).unwrap();
        assert_matches!(
            region.read_slot(SlotCoords::new(0, 0)),
            Err(ScanError::TruncatedPayload { .. })
        );
    }

    #[test]
    fn test_parse_region_name() {
        assert_eq!(parse_region_name("r.0.0.mca"), Some((0, 0)));
        assert_eq!(parse_region_name("r.-3.12.mca"), Some((-3, 12)));
        assert_eq!(parse_region_name("r.1.-1.mcr"), Some((1, -1)));
        assert_eq!(parse_region_name("r.1.mca"), None);
        assert_eq!(parse_region_name("r.1.2.3.mca"), None);
        assert_eq!(parse_region_name("level.dat"), None);
    }
}
