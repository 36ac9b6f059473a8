//! Byte-oriented encode/decode primitives.
//!
//! Every codec in the workspace (values, rows, schema files, log entries) is
//! written against [`BufWriter`] and [`BufReader`]. All multi-byte integers
//! are big-endian on the wire.

use thiserror::Error;

/// Error returned when a decoder runs out of bytes or meets malformed input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("buffer too short: expected {expected} more bytes, {remaining} remain")]
    BufferLength { expected: usize, remaining: usize },
    #[error("unknown tag: {0}")]
    InvalidTag(u8),
    #[error("invalid boolean byte: {0}")]
    InvalidBool(u8),
    #[error("invalid utf-8 in string payload")]
    InvalidUtf8,
    #[error("{0} bytes left over after decoding")]
    TrailingBytes(usize),
}

/// A growable sink of bytes.
pub trait BufWriter {
    fn put_slice(&mut self, slice: &[u8]);

    fn put_u8(&mut self, val: u8) {
        self.put_slice(&[val]);
    }
    fn put_u32(&mut self, val: u32) {
        self.put_slice(&val.to_be_bytes());
    }
    fn put_u64(&mut self, val: u64) {
        self.put_slice(&val.to_be_bytes());
    }
    fn put_i64(&mut self, val: i64) {
        self.put_slice(&val.to_be_bytes());
    }
}

impl BufWriter for Vec<u8> {
    fn put_slice(&mut self, slice: &[u8]) {
        self.extend_from_slice(slice);
    }
}

/// A cursor over borrowed bytes. Reads consume from the front.
pub trait BufReader<'de> {
    fn get_slice(&mut self, size: usize) -> Result<&'de [u8], DecodeError>;
    fn remaining(&self) -> usize;

    fn get_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut arr = [0u8; N];
        arr.copy_from_slice(self.get_slice(N)?);
        Ok(arr)
    }
    fn get_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.get_slice(1)?[0])
    }
    fn get_u32(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_be_bytes(self.get_array()?))
    }
    fn get_u64(&mut self) -> Result<u64, DecodeError> {
        Ok(u64::from_be_bytes(self.get_array()?))
    }
    fn get_i64(&mut self) -> Result<i64, DecodeError> {
        Ok(i64::from_be_bytes(self.get_array()?))
    }
}

impl<'de> BufReader<'de> for &'de [u8] {
    fn get_slice(&mut self, size: usize) -> Result<&'de [u8], DecodeError> {
        if self.len() < size {
            return Err(DecodeError::BufferLength {
                expected: size,
                remaining: self.len(),
            });
        }
        let (head, tail) = self.split_at(size);
        *self = tail;
        Ok(head)
    }

    fn remaining(&self) -> usize {
        self.len()
    }
}
