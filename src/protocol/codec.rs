//! lib0 primitive encoding and decoding.
//!
//! The collaboration wire format encodes every frame with lib0 primitives:
//! variable-length unsigned integers (7 bits per byte, high bit as
//! continuation flag, little-endian group order), length-prefixed UTF-8
//! strings, and length-prefixed byte arrays.
//!
//! # Examples
//!
//! ```
//! use pagesync::protocol::{Reader, write_var_uint, write_var_string};
//!
//! let mut buf = Vec::new();
//! write_var_uint(&mut buf, 300);
//! write_var_string(&mut buf, "page.42");
//!
//! let mut reader = Reader::new(&buf);
//! assert_eq!(reader.read_var_uint().unwrap(), 300);
//! assert_eq!(reader.read_var_string().unwrap(), "page.42");
//! ```

use crate::error::{Error, Result};

/// Append a variable-length unsigned integer to `buf`.
///
/// Values below 128 encode as a single byte.
pub fn write_var_uint(buf: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        buf.push(0x80 | (value & 0x7f) as u8);
        value >>= 7;
    }
    buf.push(value as u8);
}

/// Append a length-prefixed UTF-8 string to `buf`.
pub fn write_var_string(buf: &mut Vec<u8>, value: &str) {
    write_var_uint(buf, value.len() as u64);
    buf.extend_from_slice(value.as_bytes());
}

/// Append a length-prefixed byte array to `buf`.
pub fn write_var_bytes(buf: &mut Vec<u8>, value: &[u8]) {
    write_var_uint(buf, value.len() as u64);
    buf.extend_from_slice(value);
}

/// Cursor over a received frame, decoding lib0 primitives in sequence.
///
/// Unlike the streaming case, websocket framing already delivers whole
/// messages, so the reader operates on a complete slice and fails fast on
/// truncation instead of waiting for more bytes.
#[derive(Debug)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Create a reader over a complete frame.
    pub fn new(buf: &'a [u8]) -> Self {
        Reader { buf, pos: 0 }
    }

    /// Number of bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Read a variable-length unsigned integer.
    pub fn read_var_uint(&mut self) -> Result<u64> {
        let mut value: u64 = 0;
        let mut shift: u32 = 0;
        loop {
            let byte = *self
                .buf
                .get(self.pos)
                .ok_or_else(|| Error::Protocol("truncated varint".to_string()))?;
            self.pos += 1;

            if shift >= 64 {
                return Err(Error::Protocol("varint overflows u64".to_string()));
            }
            value |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
        }
    }

    /// Read a length-prefixed byte array.
    pub fn read_var_bytes(&mut self) -> Result<&'a [u8]> {
        let len = self.read_var_uint()? as usize;
        if self.remaining() < len {
            return Err(Error::Protocol(format!(
                "truncated byte array: expected {} bytes, have {}",
                len,
                self.remaining()
            )));
        }
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    /// Read a length-prefixed UTF-8 string.
    pub fn read_var_string(&mut self) -> Result<String> {
        let bytes = self.read_var_bytes()?;
        Ok(String::from_utf8(bytes.to_vec())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_var_uint_single_byte() {
        let mut buf = Vec::new();
        write_var_uint(&mut buf, 0);
        write_var_uint(&mut buf, 127);
        assert_eq!(buf, vec![0x00, 0x7f]);

        let mut reader = Reader::new(&buf);
        assert_eq!(reader.read_var_uint().unwrap(), 0);
        assert_eq!(reader.read_var_uint().unwrap(), 127);
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_var_uint_multi_byte() {
        let mut buf = Vec::new();
        write_var_uint(&mut buf, 128);
        assert_eq!(buf, vec![0x80, 0x01]);

        let mut buf = Vec::new();
        write_var_uint(&mut buf, 300);
        assert_eq!(buf, vec![0xac, 0x02]);
        assert_eq!(Reader::new(&buf).read_var_uint().unwrap(), 300);
    }

    #[test]
    fn test_var_uint_round_trip() {
        for value in [0u64, 1, 127, 128, 16_383, 16_384, u32::MAX as u64, u64::MAX] {
            let mut buf = Vec::new();
            write_var_uint(&mut buf, value);
            assert_eq!(Reader::new(&buf).read_var_uint().unwrap(), value);
        }
    }

    #[test]
    fn test_var_string_round_trip() {
        let mut buf = Vec::new();
        write_var_string(&mut buf, "page.42");
        write_var_string(&mut buf, "");
        write_var_string(&mut buf, "héllo ✓");

        let mut reader = Reader::new(&buf);
        assert_eq!(reader.read_var_string().unwrap(), "page.42");
        assert_eq!(reader.read_var_string().unwrap(), "");
        assert_eq!(reader.read_var_string().unwrap(), "héllo ✓");
    }

    #[test]
    fn test_var_bytes_round_trip() {
        let payload = vec![0u8, 1, 2, 254, 255];
        let mut buf = Vec::new();
        write_var_bytes(&mut buf, &payload);
        assert_eq!(Reader::new(&buf).read_var_bytes().unwrap(), &payload[..]);
    }

    #[test]
    fn test_truncated_input() {
        // Continuation bit set but no next byte.
        assert!(Reader::new(&[0x80]).read_var_uint().is_err());
        // Declared length exceeds what's left.
        let mut buf = Vec::new();
        write_var_uint(&mut buf, 10);
        buf.extend_from_slice(b"abc");
        assert!(Reader::new(&buf).read_var_bytes().is_err());
    }

    #[test]
    fn test_invalid_utf8() {
        let mut buf = Vec::new();
        write_var_bytes(&mut buf, &[0xff, 0xfe]);
        assert!(Reader::new(&buf).read_var_string().is_err());
    }
}
