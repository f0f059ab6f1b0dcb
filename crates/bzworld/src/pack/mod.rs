//! Network byte order serialization
//!
//! Every obstacle, transform, material and group record is written as a
//! fixed sequence of big-endian fields. [`Packable::pack_size`] must match
//! the number of bytes [`Packable::pack`] appends exactly, since records are
//! concatenated into a single stream.

use crate::foundation::math::{Vec3, Vec4};

/// Errors raised while reading a packed stream
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PackError {
    /// Fewer bytes left than the field needs
    #[error("buffer underrun: needed {needed} bytes, {remaining} left")]
    Underrun {
        /// Bytes requested
        needed: usize,
        /// Bytes available
        remaining: usize,
    },

    /// A string field was not valid UTF-8
    #[error("invalid string data")]
    InvalidString,

    /// An obstacle type byte out of range
    #[error("unknown obstacle type {0}")]
    UnknownObstacleType(u8),

    /// A transform operation byte out of range
    #[error("unknown transform operation {0}")]
    UnknownTransformOp(u8),

    /// A count or index field with an impossible value
    #[error("invalid count {0}")]
    InvalidCount(i64),
}

/// Growable output buffer
#[derive(Debug, Default, Clone)]
pub struct PackBuffer {
    bytes: Vec<u8>,
}

impl PackBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a buffer with reserved capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self { bytes: Vec::with_capacity(capacity) }
    }

    /// Bytes written so far
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True when nothing has been written
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Borrow the written bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Take the written bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Append raw bytes
    pub fn pack_bytes(&mut self, data: &[u8]) {
        self.bytes.extend_from_slice(data);
    }

    /// Append a byte
    pub fn pack_u8(&mut self, v: u8) {
        self.bytes.push(v);
    }

    /// Append an unsigned short
    pub fn pack_u16(&mut self, v: u16) {
        self.pack_bytes(&v.to_be_bytes());
    }

    /// Append a signed int
    pub fn pack_i32(&mut self, v: i32) {
        self.pack_bytes(&v.to_be_bytes());
    }

    /// Append an unsigned int
    pub fn pack_u32(&mut self, v: u32) {
        self.pack_bytes(&v.to_be_bytes());
    }

    /// Append a float
    pub fn pack_f32(&mut self, v: f32) {
        self.pack_bytes(&v.to_bits().to_be_bytes());
    }

    /// Append three floats
    pub fn pack_vec3(&mut self, v: &Vec3) {
        for c in v.iter() {
            self.pack_f32(*c);
        }
    }

    /// Append four floats
    pub fn pack_vec4(&mut self, v: &Vec4) {
        for c in v.iter() {
            self.pack_f32(*c);
        }
    }

    /// Append a length-prefixed string
    pub fn pack_string(&mut self, s: &str) {
        self.pack_count(s.len());
        self.pack_bytes(s.as_bytes());
    }

    /// Append a collection length as `u32`
    ///
    /// Lengths above `u32::MAX` are clamped; no record in a world comes
    /// close.
    pub fn pack_count(&mut self, n: usize) {
        self.pack_u32(u32::try_from(n).unwrap_or(u32::MAX));
    }

    /// Append a collection length as `i32`
    pub fn pack_count_i32(&mut self, n: usize) {
        self.pack_i32(i32::try_from(n).unwrap_or(i32::MAX));
    }
}

/// Cursor over a packed stream
#[derive(Debug, Clone)]
pub struct UnpackBuffer<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> UnpackBuffer<'a> {
    /// Start reading at the beginning of `data`
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    /// Bytes not yet consumed
    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    /// Bytes consumed so far
    pub fn position(&self) -> usize {
        self.offset
    }

    /// Consume `n` raw bytes
    pub fn take(&mut self, n: usize) -> Result<&'a [u8], PackError> {
        if n > self.remaining() {
            return Err(PackError::Underrun { needed: n, remaining: self.remaining() });
        }
        let slice = &self.data[self.offset..self.offset + n];
        self.offset += n;
        Ok(slice)
    }

    fn take_array<const N: usize>(&mut self) -> Result<[u8; N], PackError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    /// Read a byte
    pub fn unpack_u8(&mut self) -> Result<u8, PackError> {
        Ok(self.take_array::<1>()?[0])
    }

    /// Read an unsigned short
    pub fn unpack_u16(&mut self) -> Result<u16, PackError> {
        Ok(u16::from_be_bytes(self.take_array()?))
    }

    /// Read a signed int
    pub fn unpack_i32(&mut self) -> Result<i32, PackError> {
        Ok(i32::from_be_bytes(self.take_array()?))
    }

    /// Read an unsigned int
    pub fn unpack_u32(&mut self) -> Result<u32, PackError> {
        Ok(u32::from_be_bytes(self.take_array()?))
    }

    /// Read a float
    pub fn unpack_f32(&mut self) -> Result<f32, PackError> {
        Ok(f32::from_bits(u32::from_be_bytes(self.take_array()?)))
    }

    /// Read three floats
    pub fn unpack_vec3(&mut self) -> Result<Vec3, PackError> {
        Ok(Vec3::new(self.unpack_f32()?, self.unpack_f32()?, self.unpack_f32()?))
    }

    /// Read four floats
    pub fn unpack_vec4(&mut self) -> Result<Vec4, PackError> {
        Ok(Vec4::new(
            self.unpack_f32()?,
            self.unpack_f32()?,
            self.unpack_f32()?,
            self.unpack_f32()?,
        ))
    }

    /// Read a length-prefixed string
    pub fn unpack_string(&mut self) -> Result<String, PackError> {
        let len = self.unpack_count()?;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| PackError::InvalidString)
    }

    /// Read a `u32` collection length, rejecting lengths longer than the data
    pub fn unpack_count(&mut self) -> Result<usize, PackError> {
        let n = self.unpack_u32()? as usize;
        if n > self.remaining() {
            return Err(PackError::InvalidCount(n as i64));
        }
        Ok(n)
    }

    /// Read an `i32` collection length
    pub fn unpack_count_i32(&mut self) -> Result<usize, PackError> {
        let n = self.unpack_i32()?;
        match usize::try_from(n) {
            Ok(count) if count <= self.remaining() => Ok(count),
            _ => Err(PackError::InvalidCount(i64::from(n))),
        }
    }
}

/// Size of a length-prefixed string
pub fn string_pack_size(s: &str) -> usize {
    4 + s.len()
}

/// Binary serialization in network byte order
pub trait Packable: Sized {
    /// Append this value
    fn pack(&self, buf: &mut PackBuffer);

    /// Exact number of bytes [`Packable::pack`] appends
    fn pack_size(&self) -> usize;

    /// Read a value
    fn unpack(buf: &mut UnpackBuffer<'_>) -> Result<Self, PackError>;

    /// Pack into a fresh byte vector
    fn to_bytes(&self) -> Vec<u8> {
        let mut buf = PackBuffer::with_capacity(self.pack_size());
        self.pack(&mut buf);
        buf.into_bytes()
    }

    /// Unpack from the start of a byte slice
    fn from_bytes(data: &[u8]) -> Result<Self, PackError> {
        Self::unpack(&mut UnpackBuffer::new(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_big_endian_layout() {
        let mut buf = PackBuffer::new();
        buf.pack_u16(0x0102);
        buf.pack_i32(-2);
        buf.pack_f32(1.0);
        assert_eq!(buf.as_bytes(), &[0x01, 0x02, 0xff, 0xff, 0xff, 0xfe, 0x3f, 0x80, 0x00, 0x00]);
    }

    #[test]
    fn test_string_round_trip() {
        let mut buf = PackBuffer::new();
        buf.pack_string("tele");
        assert_eq!(buf.len(), string_pack_size("tele"));
        let mut reader = UnpackBuffer::new(buf.as_bytes());
        assert_eq!(reader.unpack_string().unwrap(), "tele");
        assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn test_underrun_is_reported() {
        let mut reader = UnpackBuffer::new(&[0, 1]);
        assert_eq!(
            reader.unpack_u32(),
            Err(PackError::Underrun { needed: 4, remaining: 2 })
        );
    }

    #[test]
    fn test_oversized_count_rejected() {
        let mut buf = PackBuffer::new();
        buf.pack_u32(1000);
        let mut reader = UnpackBuffer::new(buf.as_bytes());
        assert!(matches!(reader.unpack_count(), Err(PackError::InvalidCount(1000))));
    }
}
