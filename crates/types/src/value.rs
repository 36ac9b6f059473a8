//! The typed scalar every table cell, index key and log image is made of.
//!
//! Values compare only against values of the same type tag; the binary codec
//! is a one-byte tag followed by a fixed- or length-prefixed payload and is
//! round-trip stable, including float NaN payloads.

use crate::buffer::{BufReader, BufWriter, DecodeError};
use std::cmp::Ordering;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValueError {
    #[error("type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: DataType, found: DataType },
    #[error("unknown data type tag: {0}")]
    InvalidDataType(u8),
    #[error("value of {0} bytes exceeds the u32 payload limit")]
    ValueTooLarge(usize),
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// The type tag of a [`Value`]. The discriminants are the on-disk codec tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum DataType {
    Null = 0,
    Integer = 1,
    Float = 2,
    Boolean = 3,
    Text = 4,
    Blob = 5,
    Date = 6,
    DateTime = 7,
}

impl DataType {
    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn from_tag(tag: u8) -> Result<Self, ValueError> {
        match tag {
            0 => Ok(Self::Null),
            1 => Ok(Self::Integer),
            2 => Ok(Self::Float),
            3 => Ok(Self::Boolean),
            4 => Ok(Self::Text),
            5 => Ok(Self::Blob),
            6 => Ok(Self::Date),
            7 => Ok(Self::DateTime),
            other => Err(ValueError::InvalidDataType(other)),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Null => "NULL",
            Self::Integer => "INTEGER",
            Self::Float => "FLOAT",
            Self::Boolean => "BOOLEAN",
            Self::Text => "TEXT",
            Self::Blob => "BLOB",
            Self::Date => "DATE",
            Self::DateTime => "DATETIME",
        };
        f.write_str(name)
    }
}

/// A tagged scalar.
///
/// `Date` is a count of days since the Unix epoch, `DateTime` a count of
/// seconds; both ride the same 8-byte big-endian payload as `Integer`.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Text(String),
    Blob(Vec<u8>),
    Date(i64),
    DateTime(i64),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Integer(a), Self::Integer(b)) => a == b,
            // Bit equality, so NaN values survive codec round-trips intact.
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            (Self::Text(a), Self::Text(b)) => a == b,
            (Self::Blob(a), Self::Blob(b)) => a == b,
            (Self::Date(a), Self::Date(b)) => a == b,
            (Self::DateTime(a), Self::DateTime(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Value {
    pub fn data_type(&self) -> DataType {
        match self {
            Self::Null => DataType::Null,
            Self::Integer(_) => DataType::Integer,
            Self::Float(_) => DataType::Float,
            Self::Boolean(_) => DataType::Boolean,
            Self::Text(_) => DataType::Text,
            Self::Blob(_) => DataType::Blob,
            Self::Date(_) => DataType::Date,
            Self::DateTime(_) => DataType::DateTime,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn date(days: i64) -> Self {
        Self::Date(days)
    }

    pub fn datetime(seconds: i64) -> Self {
        Self::DateTime(seconds)
    }

    /// Compare two values of the same type tag.
    ///
    /// Null equals Null and is unordered against everything else. Floats use
    /// `f64::total_cmp`, the total order over raw IEEE bits, so NaN compares
    /// equal to an identical NaN.
    pub fn compare(&self, other: &Value) -> Result<Ordering, ValueError> {
        match (self, other) {
            (Self::Null, Self::Null) => Ok(Ordering::Equal),
            (Self::Integer(a), Self::Integer(b)) => Ok(a.cmp(b)),
            (Self::Float(a), Self::Float(b)) => Ok(a.total_cmp(b)),
            (Self::Boolean(a), Self::Boolean(b)) => Ok(a.cmp(b)),
            (Self::Text(a), Self::Text(b)) => Ok(a.cmp(b)),
            (Self::Blob(a), Self::Blob(b)) => Ok(a.cmp(b)),
            (Self::Date(a), Self::Date(b)) => Ok(a.cmp(b)),
            (Self::DateTime(a), Self::DateTime(b)) => Ok(a.cmp(b)),
            _ => Err(ValueError::TypeMismatch {
                expected: self.data_type(),
                found: other.data_type(),
            }),
        }
    }

    pub fn encode(&self, out: &mut impl BufWriter) -> Result<(), ValueError> {
        out.put_u8(self.data_type().tag());
        match self {
            Self::Null => {}
            Self::Integer(v) | Self::Date(v) | Self::DateTime(v) => out.put_i64(*v),
            Self::Float(v) => out.put_u64(v.to_bits()),
            Self::Boolean(v) => out.put_u8(*v as u8),
            Self::Text(s) => {
                Self::put_bytes(out, s.as_bytes())?;
            }
            Self::Blob(b) => {
                Self::put_bytes(out, b)?;
            }
        }
        Ok(())
    }

    fn put_bytes(out: &mut impl BufWriter, bytes: &[u8]) -> Result<(), ValueError> {
        let len = u32::try_from(bytes.len()).map_err(|_| ValueError::ValueTooLarge(bytes.len()))?;
        out.put_u32(len);
        out.put_slice(bytes);
        Ok(())
    }

    pub fn serialize(&self) -> Result<Vec<u8>, ValueError> {
        let mut out = Vec::new();
        self.encode(&mut out)?;
        Ok(out)
    }

    pub fn decode<'de>(reader: &mut impl BufReader<'de>) -> Result<Value, ValueError> {
        let tag = reader.get_u8()?;
        let value = match DataType::from_tag(tag)? {
            DataType::Null => Self::Null,
            DataType::Integer => Self::Integer(reader.get_i64()?),
            DataType::Float => Self::Float(f64::from_bits(reader.get_u64()?)),
            DataType::Boolean => match reader.get_u8()? {
                0 => Self::Boolean(false),
                1 => Self::Boolean(true),
                other => return Err(DecodeError::InvalidBool(other).into()),
            },
            DataType::Text => {
                let len = reader.get_u32()? as usize;
                let bytes = reader.get_slice(len)?;
                let text = std::str::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8)?;
                Self::Text(text.to_owned())
            }
            DataType::Blob => {
                let len = reader.get_u32()? as usize;
                Self::Blob(reader.get_slice(len)?.to_vec())
            }
            DataType::Date => Self::Date(reader.get_i64()?),
            DataType::DateTime => Self::DateTime(reader.get_i64()?),
        };
        Ok(value)
    }

    /// Decode a value from an exact buffer; trailing bytes are an error.
    pub fn deserialize(bytes: &[u8]) -> Result<Value, ValueError> {
        let mut reader = bytes;
        let value = Self::decode(&mut reader)?;
        if reader.remaining() != 0 {
            return Err(DecodeError::TrailingBytes(reader.remaining()).into());
        }
        Ok(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Integer(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Boolean(v) => write!(f, "{v}"),
            Self::Text(s) => write!(f, "'{s}'"),
            Self::Blob(b) => write!(f, "x'{}'", b.iter().map(|x| format!("{x:02x}")).collect::<String>()),
            Self::Date(v) => write!(f, "DATE({v})"),
            Self::DateTime(v) => write!(f, "DATETIME({v})"),
        }
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Self::Integer(v as i64)
            }
        })*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Float(v as f64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_owned())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Self::Blob(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Self::Blob(v.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn compare_same_tag() {
        assert_eq!(
            Value::from(1).compare(&Value::from(2)).unwrap(),
            Ordering::Less
        );
        assert_eq!(
            Value::from("b").compare(&Value::from("a")).unwrap(),
            Ordering::Greater
        );
        assert_eq!(Value::Null.compare(&Value::Null).unwrap(), Ordering::Equal);
    }

    #[test]
    fn compare_distinct_tags_fails() {
        let err = Value::from(1).compare(&Value::from("x")).unwrap_err();
        assert_eq!(
            err,
            ValueError::TypeMismatch {
                expected: DataType::Integer,
                found: DataType::Text
            }
        );
        // Null is unordered against every other tag.
        assert!(Value::Null.compare(&Value::from(false)).is_err());
    }

    #[test]
    fn nan_compares_equal_to_itself() {
        let nan = Value::Float(f64::NAN);
        assert_eq!(nan.compare(&nan).unwrap(), Ordering::Equal);
        assert_eq!(
            Value::Float(f64::NAN).compare(&Value::Float(1.0)).unwrap(),
            Ordering::Greater
        );
    }

    #[test]
    fn codec_layout() {
        let bytes = Value::from(true).serialize().unwrap();
        assert_eq!(bytes, vec![3, 1]);

        let bytes = Value::from("hi").serialize().unwrap();
        assert_eq!(bytes, vec![4, 0, 0, 0, 2, b'h', b'i']);

        let bytes = Value::Null.serialize().unwrap();
        assert_eq!(bytes, vec![0]);
    }

    #[test]
    fn deserialize_short_buffer() {
        // Text declares 4 bytes of payload but carries only 2.
        let err = Value::deserialize(&[4, 0, 0, 0, 4, b'h', b'i']).unwrap_err();
        assert!(matches!(err, ValueError::Decode(DecodeError::BufferLength { .. })));
    }

    #[test]
    fn deserialize_rejects_unknown_tag() {
        assert_eq!(
            Value::deserialize(&[99]).unwrap_err(),
            ValueError::InvalidDataType(99)
        );
    }

    #[test]
    fn deserialize_rejects_trailing_bytes() {
        let err = Value::deserialize(&[3, 1, 0]).unwrap_err();
        assert!(matches!(err, ValueError::Decode(DecodeError::TrailingBytes(1))));
    }
}
