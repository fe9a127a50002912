use blockfinder_common::SearchMatch;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Renders matches as a JSON array of `[block_id, x, y, z]` arrays.
pub fn to_json(matches: &[SearchMatch]) -> io::Result<String> {
    serde_json::to_string(matches).map_err(io::Error::from)
}

pub fn write_results<P: AsRef<Path>>(path: P, matches: &[SearchMatch]) -> io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut writer, matches)?;
    writer.flush()
}
