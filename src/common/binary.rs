// Shared binary reading utilities for archive record parsing
//
// All readers work on in-memory slices and return None instead of panicking
// when a field would run past the end of the buffer.

// =============================================================================
// Read at Offset Functions
// =============================================================================

/// Read u16 little-endian at offset
pub fn read_u16_at(buf: &[u8], offset: usize) -> Option<u16> {
    let bytes = buf.get(offset..offset.checked_add(2)?)?;
    Some(u16::from_le_bytes([bytes[0], bytes[1]]))
}

/// Read u32 little-endian at offset
pub fn read_u32_at(buf: &[u8], offset: usize) -> Option<u32> {
    let bytes = buf.get(offset..offset.checked_add(4)?)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Borrow `length` bytes at offset
pub fn read_bytes_at(buf: &[u8], offset: usize, length: usize) -> Option<&[u8]> {
    buf.get(offset..offset.checked_add(length)?)
}

// =============================================================================
// String Reading
// =============================================================================

/// Decode a fixed-length name at offset, replacing invalid UTF-8
pub fn read_lossy_string_at(buf: &[u8], offset: usize, length: usize) -> Option<String> {
    if length == 0 {
        return Some(String::new());
    }
    read_bytes_at(buf, offset, length).map(|bytes| String::from_utf8_lossy(bytes).into_owned())
}
