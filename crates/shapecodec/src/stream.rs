// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Binary stream abstractions.
//!
//! Every scalar is little-endian. Strings and custom length prefixes use the
//! 7-bit variable-length integer encoding: 7 payload bits per byte, high bit
//! set while more bytes follow, negative values always taking the full width.

use crate::error::{CodecError, CodecResult};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Generate little-endian write methods on top of `write_bytes`.
macro_rules! write_le {
    ($name:ident, $type:ty) => {
        fn $name(&mut self, value: $type) -> CodecResult<()> {
            self.write_bytes(&value.to_le_bytes())
        }
    };
}

/// Generate little-endian read methods on top of `read_exact`.
macro_rules! read_le {
    ($name:ident, $type:ty, $size:expr) => {
        fn $name(&mut self) -> CodecResult<$type> {
            let mut bytes = [0u8; $size];
            self.read_exact(&mut bytes)?;
            Ok(<$type>::from_le_bytes(bytes))
        }
    };
}

/// Byte sink for encoders.
pub trait StreamWriter {
    fn write_bytes(&mut self, bytes: &[u8]) -> CodecResult<()>;

    /// Bytes written so far.
    fn position(&self) -> usize;

    fn write_bool(&mut self, value: bool) -> CodecResult<()> {
        self.write_bytes(&[u8::from(value)])
    }

    write_le!(write_u8, u8);
    write_le!(write_i8, i8);
    write_le!(write_u16, u16);
    write_le!(write_i16, i16);
    write_le!(write_u32, u32);
    write_le!(write_i32, i32);
    write_le!(write_u64, u64);
    write_le!(write_i64, i64);
    write_le!(write_f32, f32);
    write_le!(write_f64, f64);

    fn write_7bit_i32(&mut self, value: i32) -> CodecResult<()> {
        let mut v = value as u32;
        while v >= 0x80 {
            self.write_u8((v as u8) | 0x80)?;
            v >>= 7;
        }
        self.write_u8(v as u8)
    }

    fn write_7bit_i64(&mut self, value: i64) -> CodecResult<()> {
        let mut v = value as u64;
        while v >= 0x80 {
            self.write_u8((v as u8) | 0x80)?;
            v >>= 7;
        }
        self.write_u8(v as u8)
    }

    /// UTF-8 byte length (7-bit encoded) followed by the bytes.
    fn write_string(&mut self, value: &str) -> CodecResult<()> {
        let len = i32::try_from(value.len())
            .map_err(|_| CodecError::OutOfRange(format!("string of {} bytes", value.len())))?;
        self.write_7bit_i32(len)?;
        self.write_bytes(value.as_bytes())
    }

    fn write_guid(&mut self, value: &[u8; 16]) -> CodecResult<()> {
        self.write_bytes(value)
    }

    /// Address length (4 or 16) followed by the octets.
    fn write_ip_address(&mut self, value: &IpAddr) -> CodecResult<()> {
        match value {
            IpAddr::V4(v4) => {
                self.write_u8(4)?;
                self.write_bytes(&v4.octets())
            }
            IpAddr::V6(v6) => {
                self.write_u8(16)?;
                self.write_bytes(&v6.octets())
            }
        }
    }

    /// 7-bit byte count followed by two's-complement little-endian bytes.
    fn write_big_integer(&mut self, value: &[u8]) -> CodecResult<()> {
        let len = i32::try_from(value.len())
            .map_err(|_| CodecError::OutOfRange(format!("integer of {} bytes", value.len())))?;
        self.write_7bit_i32(len)?;
        self.write_bytes(value)
    }

    fn write_date_time(&mut self, ticks: i64) -> CodecResult<()> {
        self.write_i64(ticks)
    }

    fn write_time_span(&mut self, ticks: i64) -> CodecResult<()> {
        self.write_i64(ticks)
    }
}

/// Byte source for decoders.
pub trait StreamReader {
    fn read_exact(&mut self, buf: &mut [u8]) -> CodecResult<()>;

    /// Bytes consumed so far.
    fn position(&self) -> usize;

    /// Bytes left, when known.
    fn remaining(&self) -> Option<usize>;

    fn read_vec(&mut self, len: usize) -> CodecResult<Vec<u8>> {
        if let Some(have) = self.remaining() {
            if len > have {
                return Err(CodecError::UnexpectedEof {
                    offset: self.position(),
                    need: len,
                    have,
                });
            }
        }
        let mut buf = vec![0u8; len];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Strict presence flag: only 0 and 1 are accepted.
    fn read_bool(&mut self) -> CodecResult<bool> {
        let offset = self.position();
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            flag => Err(CodecError::InvalidFlag { flag, offset }),
        }
    }

    read_le!(read_u8, u8, 1);
    read_le!(read_i8, i8, 1);
    read_le!(read_u16, u16, 2);
    read_le!(read_i16, i16, 2);
    read_le!(read_u32, u32, 4);
    read_le!(read_i32, i32, 4);
    read_le!(read_u64, u64, 8);
    read_le!(read_i64, i64, 8);
    read_le!(read_f32, f32, 4);
    read_le!(read_f64, f64, 8);

    /// Collection count: `i32`, rejected when negative.
    fn read_count(&mut self) -> CodecResult<usize> {
        let offset = self.position();
        let len = self.read_i32()?;
        usize::try_from(len).map_err(|_| CodecError::NegativeLength {
            len: i64::from(len),
            offset,
        })
    }

    fn read_7bit_i32(&mut self) -> CodecResult<i32> {
        let offset = self.position();
        let mut result: u32 = 0;
        for shift in (0..35).step_by(7) {
            let byte = self.read_u8()?;
            if shift == 28 && byte > 0x0F {
                return Err(CodecError::Malformed7Bit { offset });
            }
            result |= u32::from(byte & 0x7F) << shift;
            if byte & 0x80 == 0 {
                return Ok(result as i32);
            }
        }
        Err(CodecError::Malformed7Bit { offset })
    }

    fn read_7bit_i64(&mut self) -> CodecResult<i64> {
        let offset = self.position();
        let mut result: u64 = 0;
        for shift in (0..70).step_by(7) {
            let byte = self.read_u8()?;
            if shift == 63 && byte > 0x01 {
                return Err(CodecError::Malformed7Bit { offset });
            }
            result |= u64::from(byte & 0x7F) << shift;
            if byte & 0x80 == 0 {
                return Ok(result as i64);
            }
        }
        Err(CodecError::Malformed7Bit { offset })
    }

    fn read_string(&mut self) -> CodecResult<String> {
        let offset = self.position();
        let len = self.read_7bit_i32()?;
        let len = usize::try_from(len).map_err(|_| CodecError::NegativeLength {
            len: i64::from(len),
            offset,
        })?;
        let bytes = self.read_vec(len)?;
        String::from_utf8(bytes).map_err(|_| CodecError::InvalidUtf8 { offset })
    }

    fn read_guid(&mut self) -> CodecResult<[u8; 16]> {
        let mut bytes = [0u8; 16];
        self.read_exact(&mut bytes)?;
        Ok(bytes)
    }

    fn read_ip_address(&mut self) -> CodecResult<IpAddr> {
        let offset = self.position();
        match self.read_u8()? {
            4 => {
                let mut octets = [0u8; 4];
                self.read_exact(&mut octets)?;
                Ok(IpAddr::V4(Ipv4Addr::from(octets)))
            }
            16 => {
                let mut octets = [0u8; 16];
                self.read_exact(&mut octets)?;
                Ok(IpAddr::V6(Ipv6Addr::from(octets)))
            }
            len => Err(CodecError::OutOfRange(format!(
                "address length {} at offset {}",
                len, offset
            ))),
        }
    }

    fn read_big_integer(&mut self) -> CodecResult<Vec<u8>> {
        let offset = self.position();
        let len = self.read_7bit_i32()?;
        let len = usize::try_from(len).map_err(|_| CodecError::NegativeLength {
            len: i64::from(len),
            offset,
        })?;
        self.read_vec(len)
    }

    fn read_date_time(&mut self) -> CodecResult<i64> {
        self.read_i64()
    }

    fn read_time_span(&mut self) -> CodecResult<i64> {
        self.read_i64()
    }
}

/// Growable in-memory writer.
#[derive(Debug, Default, Clone)]
pub struct BufferWriter {
    buffer: Vec<u8>,
}

impl BufferWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buffer
    }
}

impl StreamWriter for BufferWriter {
    fn write_bytes(&mut self, bytes: &[u8]) -> CodecResult<()> {
        self.buffer.extend_from_slice(bytes);
        Ok(())
    }

    fn position(&self) -> usize {
        self.buffer.len()
    }
}

/// Reader over a borrowed byte slice.
#[derive(Debug, Clone)]
pub struct SliceReader<'a> {
    buffer: &'a [u8],
    offset: usize,
}

impl<'a> SliceReader<'a> {
    pub fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, offset: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.offset >= self.buffer.len()
    }
}

impl StreamReader for SliceReader<'_> {
    fn read_exact(&mut self, buf: &mut [u8]) -> CodecResult<()> {
        let have = self.buffer.len().saturating_sub(self.offset);
        if buf.len() > have {
            return Err(CodecError::UnexpectedEof {
                offset: self.offset,
                need: buf.len(),
                have,
            });
        }
        buf.copy_from_slice(&self.buffer[self.offset..self.offset + buf.len()]);
        self.offset += buf.len();
        Ok(())
    }

    fn position(&self) -> usize {
        self.offset
    }

    fn remaining(&self) -> Option<usize> {
        Some(self.buffer.len().saturating_sub(self.offset))
    }
}

/// Upper bound on elements reserved up front from a decoded count.
pub const MAX_PREALLOC: usize = 4096;

/// Collection length as a wire count.
pub fn count(len: usize) -> CodecResult<i32> {
    i32::try_from(len).map_err(|_| CodecError::OutOfRange(format!("collection of {} elements", len)))
}

/// `N` bytes of a raw struct image starting at `offset`.
pub fn field_bytes<const N: usize>(image: &[u8], offset: usize) -> CodecResult<[u8; N]> {
    image
        .get(offset..offset + N)
        .and_then(|bytes| <[u8; N]>::try_from(bytes).ok())
        .ok_or(CodecError::UnexpectedEof {
            offset,
            need: N,
            have: image.len().saturating_sub(offset),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip_7bit(value: i32) -> (Vec<u8>, i32) {
        let mut w = BufferWriter::new();
        w.write_7bit_i32(value).expect("write");
        let bytes = w.into_inner();
        let mut r = SliceReader::new(&bytes);
        let back = r.read_7bit_i32().expect("read");
        (bytes, back)
    }

    #[test]
    fn test_scalars_are_little_endian() {
        let mut w = BufferWriter::new();
        w.write_i32(0x0102_0304).expect("write");
        w.write_u16(0xABCD).expect("write");
        assert_eq!(w.as_slice(), &[0x04, 0x03, 0x02, 0x01, 0xCD, 0xAB]);
    }

    #[test]
    fn test_7bit_small_values_take_one_byte() {
        assert_eq!(roundtrip_7bit(0), (vec![0x00], 0));
        assert_eq!(roundtrip_7bit(127), (vec![0x7F], 127));
        assert_eq!(roundtrip_7bit(128), (vec![0x80, 0x01], 128));
    }

    #[test]
    fn test_7bit_negative_takes_five_bytes() {
        let (bytes, back) = roundtrip_7bit(-1);
        assert_eq!(bytes, vec![0xFF, 0xFF, 0xFF, 0xFF, 0x0F]);
        assert_eq!(back, -1);
    }

    #[test]
    fn test_7bit_overlong_is_rejected() {
        let bytes = [0xFF, 0xFF, 0xFF, 0xFF, 0x7F];
        let mut r = SliceReader::new(&bytes);
        assert!(matches!(
            r.read_7bit_i32(),
            Err(CodecError::Malformed7Bit { offset: 0 })
        ));
    }

    #[test]
    fn test_7bit_i64_extremes() {
        for value in [i64::MIN, -1, 0, 1, 300, i64::MAX] {
            let mut w = BufferWriter::new();
            w.write_7bit_i64(value).expect("write");
            let bytes = w.into_inner();
            let mut r = SliceReader::new(&bytes);
            assert_eq!(r.read_7bit_i64().expect("read"), value);
            assert!(r.is_empty());
        }
    }

    #[test]
    fn test_string_uses_utf8_byte_length() {
        let mut w = BufferWriter::new();
        w.write_string("héllo").expect("write");
        let bytes = w.into_inner();
        assert_eq!(bytes[0], 6);
        let mut r = SliceReader::new(&bytes);
        assert_eq!(r.read_string().expect("read"), "héllo");
    }

    #[test]
    fn test_eof_reports_offset() {
        let bytes = [1u8, 2];
        let mut r = SliceReader::new(&bytes);
        let err = r.read_i32().unwrap_err();
        assert_eq!(
            err,
            CodecError::UnexpectedEof {
                offset: 0,
                need: 4,
                have: 2
            }
        );
    }

    #[test]
    fn test_presence_flag_is_strict() {
        let bytes = [2u8];
        let mut r = SliceReader::new(&bytes);
        assert!(matches!(
            r.read_bool(),
            Err(CodecError::InvalidFlag { flag: 2, offset: 0 })
        ));
    }

    #[test]
    fn test_ip_address_carries_its_length() {
        let mut w = BufferWriter::new();
        w.write_ip_address(&IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)))
            .expect("write");
        w.write_ip_address(&IpAddr::V6(Ipv6Addr::LOCALHOST))
            .expect("write");
        let bytes = w.into_inner();
        assert_eq!(&bytes[..5], &[4, 10, 0, 0, 1]);
        assert_eq!(bytes.len(), 5 + 17);

        let mut r = SliceReader::new(&bytes);
        assert_eq!(
            r.read_ip_address().expect("v4"),
            IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))
        );
        assert_eq!(r.read_ip_address().expect("v6"), IpAddr::V6(Ipv6Addr::LOCALHOST));
    }

    #[test]
    fn test_bad_address_length_is_rejected() {
        let bytes = [7u8, 0, 0, 0, 0, 0, 0, 0];
        let mut r = SliceReader::new(&bytes);
        assert!(matches!(r.read_ip_address(), Err(CodecError::OutOfRange(_))));
    }

    #[test]
    fn test_negative_count_is_rejected() {
        let bytes = (-5i32).to_le_bytes();
        let mut r = SliceReader::new(&bytes);
        assert!(matches!(
            r.read_count(),
            Err(CodecError::NegativeLength { len: -5, .. })
        ));
    }

    #[test]
    fn test_field_bytes_bounds() {
        let image = [1u8, 2, 3, 4, 5];
        assert_eq!(field_bytes::<2>(&image, 3).expect("in range"), [4, 5]);
        assert!(matches!(
            field_bytes::<4>(&image, 3),
            Err(CodecError::UnexpectedEof { need: 4, have: 2, .. })
        ));
    }
}
