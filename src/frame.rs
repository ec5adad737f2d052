//! Bounds-checked cursor over a received frame.
//!
//! All multi-byte reads are big-endian, matching the wire order of the AVL
//! dialect family. The cursor is one-directional; the only non-consuming
//! operation is a two-byte peek used to classify length-prefixed sub-fields.
//!
//! Every read fails with [`ProtocolError::TruncatedFrame`] when the declared
//! structure runs past the end of the buffer, so a lying length field can
//! never cause an out-of-bounds access.

use crate::{ProtocolError, Result};

/// Sequential big-endian reader over an immutable frame buffer.
#[derive(Debug)]
pub struct FrameReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> FrameReader<'a> {
    /// Create a reader positioned at the start of `data`.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes left to consume.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Current cursor position from the start of the buffer.
    pub fn position(&self) -> usize {
        self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(ProtocolError::truncated(n, self.remaining()));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    /// Peek the next two bytes as a big-endian u16 without consuming them.
    pub fn peek_u16(&self) -> Result<u16> {
        if self.remaining() < 2 {
            return Err(ProtocolError::truncated(2, self.remaining()));
        }
        Ok(u16::from_be_bytes([self.data[self.pos], self.data[self.pos + 1]]))
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.take(1)?[0] as i8)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        let b = self.take(2)?;
        Ok(i16::from_be_bytes([b[0], b[1]]))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let b = self.take(4)?;
        Ok(u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        let b = self.take(4)?;
        Ok(i32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        let b = self.take(8)?;
        Ok(u64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        let b = self.take(8)?;
        Ok(i64::from_be_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        let b = self.take(4)?;
        Ok(f32::from_be_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Read a fixed-length byte run.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        self.take(n)
    }

    /// Read an unsigned integer of 1, 2, 4 or 8 bytes.
    ///
    /// Parameter values arrive at the width of their group; the parameter
    /// table decides signedness, so the width is a runtime argument here.
    pub fn read_uint(&mut self, width: usize) -> Result<u64> {
        match width {
            1 => Ok(u64::from(self.read_u8()?)),
            2 => Ok(u64::from(self.read_u16()?)),
            4 => Ok(u64::from(self.read_u32()?)),
            _ => self.read_u64(),
        }
    }

    /// Read a signed integer of 1, 2, 4 or 8 bytes.
    pub fn read_int(&mut self, width: usize) -> Result<i64> {
        match width {
            1 => Ok(i64::from(self.read_i8()?)),
            2 => Ok(i64::from(self.read_i16()?)),
            4 => Ok(i64::from(self.read_i32()?)),
            _ => self.read_i64(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_reads_advance_the_cursor() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        let mut reader = FrameReader::new(&data);

        assert_eq!(reader.read_u8().unwrap(), 0x01);
        assert_eq!(reader.read_u16().unwrap(), 0x0203);
        assert_eq!(reader.read_u32().unwrap(), 0x0405_0607);
        assert_eq!(reader.remaining(), 1);
        assert_eq!(reader.position(), 7);
    }

    #[test]
    fn peek_does_not_consume() {
        let data = [0x00, 0x0f, 0xaa];
        let mut reader = FrameReader::new(&data);

        assert_eq!(reader.peek_u16().unwrap(), 0x000f);
        assert_eq!(reader.peek_u16().unwrap(), 0x000f);
        assert_eq!(reader.read_u16().unwrap(), 0x000f);
        assert_eq!(reader.remaining(), 1);
    }

    #[test]
    fn signed_reads_sign_extend() {
        let data = [0xff, 0xff, 0xfe, 0xff, 0xff, 0xff, 0xff];
        let mut reader = FrameReader::new(&data);

        assert_eq!(reader.read_i8().unwrap(), -1);
        assert_eq!(reader.read_i16().unwrap(), -2);
        assert_eq!(reader.read_int(4).unwrap(), -1);
    }

    #[test]
    fn float_reads_are_big_endian() {
        let data = 3.067783f32.to_be_bytes();
        let mut reader = FrameReader::new(&data);
        assert!((reader.read_f32().unwrap() - 3.067783).abs() < f32::EPSILON);
    }

    #[test]
    fn exhausted_reader_reports_needed_and_remaining() {
        let data = [0x01];
        let mut reader = FrameReader::new(&data);

        match reader.read_u32() {
            Err(ProtocolError::TruncatedFrame { needed, remaining }) => {
                assert_eq!(needed, 4);
                assert_eq!(remaining, 1);
            }
            other => panic!("Expected TruncatedFrame, got {:?}", other),
        }
        // A failed read consumes nothing
        assert_eq!(reader.read_u8().unwrap(), 0x01);
    }

    #[cfg(test)]
    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
          #[test]
          fn variable_width_unsigned_round_trips(value in any::<u32>()) {
            let bytes = value.to_be_bytes();
            let mut reader = FrameReader::new(&bytes);
            prop_assert_eq!(reader.read_uint(4).unwrap(), u64::from(value));
          }

          #[test]
          fn reads_never_panic_on_short_buffers(
            data in prop::collection::vec(any::<u8>(), 0..16),
            width in prop::sample::select(vec![1usize, 2, 4, 8])
          ) {
            let mut reader = FrameReader::new(&data);
            let result = reader.read_uint(width);
            if data.len() >= width {
              prop_assert!(result.is_ok());
            } else {
              prop_assert!(
                matches!(result, Err(ProtocolError::TruncatedFrame { .. })),
                "expected a truncated frame error"
              );
            }
          }
        }
    }
}
