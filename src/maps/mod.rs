#[macro_use]
pub mod error;

pub mod class_map;
pub mod debug_line_map;
pub mod iodi;
pub mod line_map;

use crate::maps::error::MapError;

/// Magic shared by the line number map and the debug line map.
pub const REDEX_MAP_MAGIC: u32 = 0xFACEB000;

// Basic type reading and writing, all little-endian
pub(crate) fn read_u2(bytes: &[u8], ix: &mut usize) -> Result<u16, MapError>
{
    if bytes.len() < *ix + 2
    {
        fail!("Unexpected end of stream reading u2 at index {}", *ix);
    }
    let result = ((bytes[*ix + 1] as u16) << 8) | (bytes[*ix] as u16);
    *ix += 2;
    Ok(result)
}

pub(crate) fn read_u4(bytes: &[u8], ix: &mut usize) -> Result<u32, MapError>
{
    if bytes.len() < *ix + 4
    {
        fail!("Unexpected end of stream reading u4 at index {}", *ix);
    }
    let result =
        ((bytes[*ix + 3] as u32) << 24) | ((bytes[*ix + 2] as u32) << 16) | ((bytes[*ix + 1] as u32) << 8) | (bytes[*ix] as u32);
    *ix += 4;
    Ok(result)
}

pub(crate) fn read_u8(bytes: &[u8], ix: &mut usize) -> Result<u64, MapError>
{
    let lo = read_u4(bytes, ix)? as u64;
    let hi = read_u4(bytes, ix)? as u64;
    Ok((hi << 32) | lo)
}

pub(crate) fn read_x(bytes: &[u8], ix: &mut usize, length: usize) -> Result<Vec<u8>, MapError>
{
    if bytes.len() >= *ix && bytes.len() - *ix >= length
    {
        let v = bytes[*ix..*ix + length].to_vec();
        *ix += length;
        Ok(v)
    }
    else
    {
        Err(MapError::new("buffer too short for array read"))
    }
}

/// Reads `length` bytes as an ASCII string, as every redex string pool stores them.
pub(crate) fn read_ascii(bytes: &[u8], ix: &mut usize, length: usize) -> Result<String, MapError>
{
    let raw = read_x(bytes, ix, length)?;
    if !raw.is_ascii()
    {
        fail!("Non-ASCII string at index {}", *ix - length);
    }
    // ASCII is always valid UTF-8
    Ok(raw.into_iter().map(char::from).collect())
}

pub(crate) fn write_u2(buffer: &mut Vec<u8>, val: u16) -> usize
{
    buffer.extend_from_slice(&val.to_le_bytes());
    2
}

pub(crate) fn write_u4(buffer: &mut Vec<u8>, val: u32) -> usize
{
    buffer.extend_from_slice(&val.to_le_bytes());
    4
}

pub(crate) fn write_u8(buffer: &mut Vec<u8>, val: u64) -> usize
{
    buffer.extend_from_slice(&val.to_le_bytes());
    8
}

pub(crate) fn write_x(buffer: &mut Vec<u8>, val: &[u8]) -> usize
{
    let len = val.len();
    buffer.extend(val);
    len
}
