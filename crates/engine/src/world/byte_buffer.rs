use thiserror::Error;

use crate::app::Vec2;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BufferError {
    #[error("buffer underrun: needed {needed} bytes but only {remaining} remain")]
    Underrun { needed: usize, remaining: usize },
    #[error("string payload at offset {offset} is not valid UTF-8")]
    InvalidUtf8 { offset: usize },
}

/// Growable big-endian byte sequence with a forward-only read cursor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ByteBuffer {
    bytes: Vec<u8>,
    read_index: usize,
}

impl ByteBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            read_index: 0,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.read_index
    }

    pub fn read_bool(&mut self) -> Result<bool, BufferError> {
        Ok(self.read_u8()? != 0)
    }

    pub fn read_u8(&mut self) -> Result<u8, BufferError> {
        Ok(self.read_array::<1>()?[0])
    }

    pub fn read_i8(&mut self) -> Result<i8, BufferError> {
        Ok(i8::from_be_bytes(self.read_array()?))
    }

    pub fn read_u16(&mut self) -> Result<u16, BufferError> {
        Ok(u16::from_be_bytes(self.read_array()?))
    }

    pub fn read_i16(&mut self) -> Result<i16, BufferError> {
        Ok(i16::from_be_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32, BufferError> {
        Ok(u32::from_be_bytes(self.read_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32, BufferError> {
        Ok(i32::from_be_bytes(self.read_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64, BufferError> {
        Ok(u64::from_be_bytes(self.read_array()?))
    }

    pub fn read_i64(&mut self) -> Result<i64, BufferError> {
        Ok(i64::from_be_bytes(self.read_array()?))
    }

    pub fn read_f32(&mut self) -> Result<f32, BufferError> {
        Ok(f32::from_be_bytes(self.read_array()?))
    }

    pub fn read_f64(&mut self) -> Result<f64, BufferError> {
        Ok(f64::from_be_bytes(self.read_array()?))
    }

    /// Reads a `u32` length prefix followed by that many UTF-8 bytes.
    pub fn read_string(&mut self) -> Result<String, BufferError> {
        let len = self.read_u32()? as usize;
        let offset = self.read_index;
        let raw = self.read_exact(len)?;
        std::str::from_utf8(raw)
            .map(str::to_string)
            .map_err(|_| BufferError::InvalidUtf8 { offset })
    }

    /// Two consecutive `i64` when `as_ints`, otherwise two `f64`. Components
    /// are narrowed to `f32`, so integers beyond 2^24 lose precision; use
    /// [`ByteBuffer::read_int_vector`] where cell coordinates must stay exact.
    pub fn read_vector(&mut self, as_ints: bool) -> Result<Vec2, BufferError> {
        if as_ints {
            let (x, y) = self.read_int_vector()?;
            Ok(Vec2::new(x as f32, y as f32))
        } else {
            let x = self.read_f64()?;
            let y = self.read_f64()?;
            Ok(Vec2::new(x as f32, y as f32))
        }
    }

    pub fn read_int_vector(&mut self) -> Result<(i64, i64), BufferError> {
        Ok((self.read_i64()?, self.read_i64()?))
    }

    pub fn write_bool(&mut self, value: bool) {
        self.bytes.push(u8::from(value));
    }

    pub fn write_u8(&mut self, value: u8) {
        self.bytes.push(value);
    }

    pub fn write_i8(&mut self, value: i8) {
        self.bytes.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_u16(&mut self, value: u16) {
        self.bytes.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_i16(&mut self, value: i16) {
        self.bytes.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_u32(&mut self, value: u32) {
        self.bytes.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_i32(&mut self, value: i32) {
        self.bytes.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_u64(&mut self, value: u64) {
        self.bytes.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_i64(&mut self, value: i64) {
        self.bytes.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_f32(&mut self, value: f32) {
        self.bytes.extend_from_slice(&value.to_be_bytes());
    }

    pub fn write_f64(&mut self, value: f64) {
        self.bytes.extend_from_slice(&value.to_be_bytes());
    }

    /// Payloads longer than `u32::MAX` bytes are truncated to fit the prefix.
    pub fn write_string(&mut self, value: &str) {
        let raw = value.as_bytes();
        let len = raw.len().min(u32::MAX as usize);
        self.write_u32(len as u32);
        self.bytes.extend_from_slice(&raw[..len]);
    }

    pub fn write_vector(&mut self, value: Vec2, as_ints: bool) {
        if as_ints {
            self.write_i64(value.x.round() as i64);
            self.write_i64(value.y.round() as i64);
        } else {
            self.write_f64(f64::from(value.x));
            self.write_f64(f64::from(value.y));
        }
    }

    pub fn write_int_vector(&mut self, (x, y): (i64, i64)) {
        self.write_i64(x);
        self.write_i64(y);
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], BufferError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_exact(N)?);
        Ok(out)
    }

    fn read_exact(&mut self, len: usize) -> Result<&[u8], BufferError> {
        let remaining = self.remaining();
        if len > remaining {
            return Err(BufferError::Underrun {
                needed: len,
                remaining,
            });
        }
        let start = self.read_index;
        self.read_index += len;
        Ok(&self.bytes[start..self.read_index])
    }
}
