use blockfinder_common::{Result, ScanError};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::Compression;
use std::collections::HashMap;
use std::io::{self, Cursor, Read, Write};

/// Default nesting limit for compounds and lists.
pub const DEFAULT_MAX_DEPTH: usize = 512;

pub const TAG_END: u8 = 0;
pub const TAG_BYTE: u8 = 1;
pub const TAG_SHORT: u8 = 2;
pub const TAG_INT: u8 = 3;
pub const TAG_LONG: u8 = 4;
pub const TAG_FLOAT: u8 = 5;
pub const TAG_DOUBLE: u8 = 6;
pub const TAG_BYTE_ARRAY: u8 = 7;
pub const TAG_STRING: u8 = 8;
pub const TAG_LIST: u8 = 9;
pub const TAG_COMPOUND: u8 = 10;
pub const TAG_INT_ARRAY: u8 = 11;
pub const TAG_LONG_ARRAY: u8 = 12;

#[derive(Debug, Clone, PartialEq)]
pub enum Tag {
    End,
    Byte(i8),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    ByteArray(Vec<i8>),
    String(String),
    List(Vec<Tag>),
    Compound(Compound),
    IntArray(Vec<i32>),
    LongArray(Vec<i64>),
}

/// Named children of a compound tag, kept in the order they were read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Compound {
    entries: Vec<(String, Tag)>,
    positions: HashMap<String, usize>,
}

impl Compound {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a child. A repeated name replaces the earlier value in place.
    pub fn insert(&mut self, name: impl Into<String>, tag: Tag) {
        let name = name.into();
        match self.positions.get(&name) {
            Some(&position) => self.entries[position].1 = tag,
            None => {
                self.positions.insert(name.clone(), self.entries.len());
                self.entries.push((name, tag));
            }
        }
    }

    pub fn with(mut self, name: impl Into<String>, tag: Tag) -> Self {
        self.insert(name, tag);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Tag> {
        self.positions
            .get(name)
            .map(|&position| &self.entries[position].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Tag)> {
        self.entries.iter().map(|(name, tag)| (name.as_str(), tag))
    }
}

impl FromIterator<(String, Tag)> for Compound {
    fn from_iter<I: IntoIterator<Item = (String, Tag)>>(iter: I) -> Self {
        let mut compound = Compound::new();
        for (name, tag) in iter {
            compound.insert(name, tag);
        }
        compound
    }
}

impl Tag {
    pub fn get_type_id(&self) -> u8 {
        match self {
            Tag::End => TAG_END,
            Tag::Byte(_) => TAG_BYTE,
            Tag::Short(_) => TAG_SHORT,
            Tag::Int(_) => TAG_INT,
            Tag::Long(_) => TAG_LONG,
            Tag::Float(_) => TAG_FLOAT,
            Tag::Double(_) => TAG_DOUBLE,
            Tag::ByteArray(_) => TAG_BYTE_ARRAY,
            Tag::String(_) => TAG_STRING,
            Tag::List(_) => TAG_LIST,
            Tag::Compound(_) => TAG_COMPOUND,
            Tag::IntArray(_) => TAG_INT_ARRAY,
            Tag::LongArray(_) => TAG_LONG_ARRAY,
        }
    }

    /// Decodes a complete root tag with the default depth limit.
    pub fn read(bytes: &[u8]) -> Result<(String, Tag)> {
        TagDecoder::new(bytes).decode()
    }

    pub fn write<W: Write>(&self, writer: &mut W, name: &str) -> io::Result<()> {
        writer.write_u8(self.get_type_id())?;

        if !matches!(self, Tag::End) {
            write_string(writer, name)?;
        }

        self.write_payload(writer)
    }

    fn write_payload<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        match self {
            Tag::End => Ok(()),
            Tag::Byte(v) => writer.write_i8(*v),
            Tag::Short(v) => writer.write_i16::<BigEndian>(*v),
            Tag::Int(v) => writer.write_i32::<BigEndian>(*v),
            Tag::Long(v) => writer.write_i64::<BigEndian>(*v),
            Tag::Float(v) => writer.write_f32::<BigEndian>(*v),
            Tag::Double(v) => writer.write_f64::<BigEndian>(*v),
            Tag::ByteArray(v) => {
                write_length(writer, v.len())?;
                for &b in v {
                    writer.write_i8(b)?;
                }
                Ok(())
            }
            Tag::String(v) => write_string(writer, v),
            Tag::List(v) => {
                let element_type = v.first().map(Tag::get_type_id).unwrap_or(TAG_END);
                if v.iter().any(|tag| tag.get_type_id() != element_type) {
                    return Err(io::Error::new(
                        io::ErrorKind::InvalidInput,
                        "List elements must share one tag type",
                    ));
                }
                writer.write_u8(element_type)?;
                write_length(writer, v.len())?;
                for tag in v {
                    tag.write_payload(writer)?;
                }
                Ok(())
            }
            Tag::Compound(v) => {
                for (name, tag) in v.iter() {
                    tag.write(writer, name)?;
                }
                writer.write_u8(TAG_END)
            }
            Tag::IntArray(v) => {
                write_length(writer, v.len())?;
                for &i in v {
                    writer.write_i32::<BigEndian>(i)?;
                }
                Ok(())
            }
            Tag::LongArray(v) => {
                write_length(writer, v.len())?;
                for &l in v {
                    writer.write_i64::<BigEndian>(l)?;
                }
                Ok(())
            }
        }
    }

    pub fn as_compound(&self) -> Option<&Compound> {
        match self {
            Tag::Compound(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&Vec<Tag>> {
        match self {
            Tag::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_byte_array(&self) -> Option<&[i8]> {
        match self {
            Tag::ByteArray(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            Tag::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_i8(&self) -> Option<i8> {
        match self {
            Tag::Byte(n) => Some(*n),
            _ => None,
        }
    }
}

fn write_string<W: Write>(writer: &mut W, value: &str) -> io::Result<()> {
    let length = u16::try_from(value.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "String longer than 65535 bytes"))?;
    writer.write_u16::<BigEndian>(length)?;
    writer.write_all(value.as_bytes())
}

fn write_length<W: Write>(writer: &mut W, length: usize) -> io::Result<()> {
    let length = i32::try_from(length)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "Array longer than i32::MAX"))?;
    writer.write_i32::<BigEndian>(length)
}

/// Smallest encoded size of one payload of the given type, used to reject
/// declared lengths that cannot fit in the remaining input.
fn min_payload_size(type_id: u8) -> u64 {
    match type_id {
        TAG_END => 0,
        TAG_BYTE => 1,
        TAG_SHORT | TAG_STRING => 2,
        TAG_INT | TAG_FLOAT | TAG_BYTE_ARRAY | TAG_INT_ARRAY | TAG_LONG_ARRAY => 4,
        TAG_LONG | TAG_DOUBLE => 8,
        TAG_LIST => 5,
        TAG_COMPOUND => 1,
        _ => 1,
    }
}

/// Decodes one tag document from an in-memory buffer.
///
/// Every failure carries the byte offset at which decoding went wrong.
/// Compound and list nesting is bounded by `max_depth`; the root compound
/// counts as depth 1.
pub struct TagDecoder<'a> {
    cursor: Cursor<&'a [u8]>,
    max_depth: usize,
}

impl<'a> TagDecoder<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        TagDecoder {
            cursor: Cursor::new(bytes),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Reads the root type, its name and its payload, and requires that the
    /// buffer ends exactly there.
    pub fn decode(mut self) -> Result<(String, Tag)> {
        let type_id = self.read(|c| c.read_u8())?;
        if type_id == TAG_END {
            return Err(ScanError::malformed(0, "root tag is End"));
        }
        let name = self.read_string()?;
        let tag = self.read_payload(type_id, 0)?;

        let remaining = self.remaining();
        if remaining > 0 {
            return Err(ScanError::malformed(
                self.offset(),
                format!("{} trailing bytes after root tag", remaining),
            ));
        }
        Ok((name, tag))
    }

    fn offset(&self) -> u64 {
        self.cursor.position()
    }

    fn remaining(&self) -> u64 {
        (self.cursor.get_ref().len() as u64).saturating_sub(self.cursor.position())
    }

    fn read<T>(&mut self, f: impl FnOnce(&mut Cursor<&'a [u8]>) -> io::Result<T>) -> Result<T> {
        let start = self.offset();
        f(&mut self.cursor).map_err(|e| match e.kind() {
            io::ErrorKind::UnexpectedEof => ScanError::malformed(start, "unexpected end of input"),
            _ => ScanError::malformed(start, e.to_string()),
        })
    }

    fn read_string(&mut self) -> Result<String> {
        let length = self.read(|c| c.read_u16::<BigEndian>())?;
        let bytes = self.read_bytes(length as u64)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    fn read_bytes(&mut self, length: u64) -> Result<&'a [u8]> {
        let start = self.offset();
        if length > self.remaining() {
            return Err(ScanError::malformed(
                start,
                format!("need {} bytes, {} remaining", length, self.remaining()),
            ));
        }
        let buffer: &'a [u8] = *self.cursor.get_ref();
        let bytes = &buffer[start as usize..(start + length) as usize];
        self.cursor.set_position(start + length);
        Ok(bytes)
    }

    /// Reads an i32 element count and checks it against the remaining input.
    fn read_length(&mut self, element_type: u8) -> Result<usize> {
        let start = self.offset();
        let length = self.read(|c| c.read_i32::<BigEndian>())?;
        if length < 0 {
            return Err(ScanError::malformed(
                start,
                format!("negative length {}", length),
            ));
        }
        let needed = length as u64 * min_payload_size(element_type);
        if needed > self.remaining() {
            return Err(ScanError::malformed(
                start,
                format!(
                    "length {} needs at least {} bytes, {} remaining",
                    length,
                    needed,
                    self.remaining()
                ),
            ));
        }
        Ok(length as usize)
    }

    fn enter(&self, depth: usize) -> Result<usize> {
        let depth = depth + 1;
        if depth > self.max_depth {
            return Err(ScanError::TagTooDeep {
                limit: self.max_depth,
            });
        }
        Ok(depth)
    }

    fn read_payload(&mut self, type_id: u8, depth: usize) -> Result<Tag> {
        match type_id {
            TAG_BYTE => Ok(Tag::Byte(self.read(|c| c.read_i8())?)),
            TAG_SHORT => Ok(Tag::Short(self.read(|c| c.read_i16::<BigEndian>())?)),
            TAG_INT => Ok(Tag::Int(self.read(|c| c.read_i32::<BigEndian>())?)),
            TAG_LONG => Ok(Tag::Long(self.read(|c| c.read_i64::<BigEndian>())?)),
            TAG_FLOAT => Ok(Tag::Float(self.read(|c| c.read_f32::<BigEndian>())?)),
            TAG_DOUBLE => Ok(Tag::Double(self.read(|c| c.read_f64::<BigEndian>())?)),
            TAG_BYTE_ARRAY => {
                let length = self.read_length(TAG_BYTE)?;
                let bytes = self.read_bytes(length as u64)?;
                Ok(Tag::ByteArray(bytes.iter().map(|&b| b as i8).collect()))
            }
            TAG_STRING => Ok(Tag::String(self.read_string()?)),
            TAG_LIST => {
                let depth = self.enter(depth)?;
                let element_offset = self.offset();
                let element_type = self.read(|c| c.read_u8())?;
                if element_type > TAG_LONG_ARRAY {
                    return Err(ScanError::malformed(
                        element_offset,
                        format!("Invalid tag type: {}", element_type),
                    ));
                }
                let length = self.read_length(element_type)?;
                if element_type == TAG_END && length > 0 {
                    return Err(ScanError::malformed(
                        element_offset,
                        "non-empty list of End tags",
                    ));
                }
                let mut list = Vec::with_capacity(length);
                for _ in 0..length {
                    list.push(self.read_payload(element_type, depth)?);
                }
                Ok(Tag::List(list))
            }
            TAG_COMPOUND => {
                let depth = self.enter(depth)?;
                let mut compound = Compound::new();
                loop {
                    let child_offset = self.offset();
                    let child_type = self.read(|c| c.read_u8())?;
                    if child_type == TAG_END {
                        break;
                    }
                    if child_type > TAG_LONG_ARRAY {
                        return Err(ScanError::malformed(
                            child_offset,
                            format!("Invalid tag type: {}", child_type),
                        ));
                    }
                    let name = self.read_string()?;
                    let tag = self.read_payload(child_type, depth)?;
                    compound.insert(name, tag);
                }
                Ok(Tag::Compound(compound))
            }
            TAG_INT_ARRAY => {
                let length = self.read_length(TAG_INT)?;
                let mut ints = Vec::with_capacity(length);
                for _ in 0..length {
                    ints.push(self.read(|c| c.read_i32::<BigEndian>())?);
                }
                Ok(Tag::IntArray(ints))
            }
            TAG_LONG_ARRAY => {
                let length = self.read_length(TAG_LONG)?;
                let mut longs = Vec::with_capacity(length);
                for _ in 0..length {
                    longs.push(self.read(|c| c.read_i64::<BigEndian>())?);
                }
                Ok(Tag::LongArray(longs))
            }
            TAG_END => Ok(Tag::End),
            _ => Err(ScanError::malformed(
                self.offset().saturating_sub(1),
                format!("Invalid tag type: {}", type_id),
            )),
        }
    }
}

// NBTFile represents a complete tag document: a named root tag
pub struct NBTFile {
    pub root: Tag,
    pub name: String,
}

impl NBTFile {
    pub fn new(name: String, root: Tag) -> Self {
        NBTFile { root, name }
    }

    pub fn from_bytes(bytes: &[u8], max_depth: usize) -> Result<Self> {
        let (name, root) = TagDecoder::new(bytes).with_max_depth(max_depth).decode()?;
        Ok(NBTFile { root, name })
    }

    pub fn from_reader<R: Read>(reader: &mut R, max_depth: usize) -> Result<Self> {
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        Self::from_bytes(&bytes, max_depth)
    }

    pub fn write<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        self.root.write(writer, &self.name)
    }

    pub fn to_bytes(&self) -> io::Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.write(&mut buffer)?;
        Ok(buffer)
    }

    pub fn write_gzip<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let mut encoder = GzEncoder::new(writer, Compression::default());
        self.write(&mut encoder)?;
        encoder.finish()?;
        Ok(())
    }

    pub fn write_zlib<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let mut encoder = ZlibEncoder::new(writer, Compression::default());
        self.write(&mut encoder)?;
        encoder.finish()?;
        Ok(())
    }
}
