//! LEB128 variable-length integers for the segment format.
//!
//! Values are written low 7 bits first; the high bit of each byte marks a
//! continuation.

use crate::error::{QuarryError, Result};

/// Append `value` to `buf` as a varint.
pub fn write_u64(buf: &mut Vec<u8>, value: u64) {
    let mut val = value;
    loop {
        let byte = (val & 0x7F) as u8;
        val >>= 7;
        if val == 0 {
            buf.push(byte);
            break;
        }
        buf.push(byte | 0x80);
    }
}

pub fn write_u32(buf: &mut Vec<u8>, value: u32) {
    write_u64(buf, u64::from(value));
}

/// Read a varint starting at `*pos`, advancing `*pos` past it.
pub fn read_u64(bytes: &[u8], pos: &mut usize) -> Result<u64> {
    let mut result = 0u64;
    let mut shift = 0u32;

    while let Some(&byte) = bytes.get(*pos) {
        *pos += 1;

        if shift >= 64 {
            return Err(QuarryError::other("varint overflow"));
        }

        result |= u64::from(byte & 0x7F) << shift;

        if byte & 0x80 == 0 {
            return Ok(result);
        }

        shift += 7;
    }

    Err(QuarryError::other("incomplete varint"))
}

/// Read a varint that must fit in a `u32`.
pub fn read_u32(bytes: &[u8], pos: &mut usize) -> Result<u32> {
    let value = read_u64(bytes, pos)?;
    u32::try_from(value).map_err(|_| QuarryError::other(format!("varint {value} exceeds u32")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_of_values() {
        let values = [0u64, 1, 127, 128, 300, 16384, u64::MAX];
        let mut buf = Vec::new();
        for &v in &values {
            write_u64(&mut buf, v);
        }

        let mut pos = 0;
        for &v in &values {
            assert_eq!(read_u64(&buf, &mut pos).unwrap(), v);
        }
        assert_eq!(pos, buf.len());
    }

    #[test]
    fn test_small_values_use_one_byte() {
        let mut buf = Vec::new();
        write_u32(&mut buf, 127);
        assert_eq!(buf, vec![0x7F]);
    }

    #[test]
    fn test_incomplete_varint() {
        let mut pos = 0;
        assert!(read_u64(&[0x80], &mut pos).is_err());
    }

    #[test]
    fn test_overflow() {
        let mut pos = 0;
        assert!(read_u64(&[0xFF; 20], &mut pos).is_err());
    }

    #[test]
    fn test_u32_range_checked() {
        let mut buf = Vec::new();
        write_u64(&mut buf, u64::from(u32::MAX) + 1);
        let mut pos = 0;
        assert!(read_u32(&buf, &mut pos).is_err());
    }
}
