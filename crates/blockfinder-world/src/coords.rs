/// Maps a linear section index to absolute world coordinates.
///
/// Indices run X fastest, then Z, then Y: `index = y * 256 + z * 16 + x`.
/// Arithmetic wraps, so nonsense positions from a corrupt chunk produce
/// nonsense coordinates instead of a panic.
pub fn to_world(chunk_x: i32, chunk_z: i32, section_y: i8, index: usize) -> (i32, i32, i32) {
    let index = index as i32;
    let world_x = chunk_x.wrapping_mul(16).wrapping_add(index % 16);
    let world_y = (section_y as i32) * 16 + index / 256;
    let world_z = chunk_z.wrapping_mul(16).wrapping_add((index % 256) / 16);
    (world_x, world_y, world_z)
}

/// Inverse of the local part of [`to_world`]: position inside a section.
pub fn section_index(local_x: usize, local_y: usize, local_z: usize) -> usize {
    local_y * 256 + local_z * 16 + local_x
}
