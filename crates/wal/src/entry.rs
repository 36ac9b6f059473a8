//! Log entry model and its self-delimiting codec.

use flintdb_types::buffer::{BufReader, BufWriter, DecodeError};

/// What a log entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    Begin = 0,
    Insert = 1,
    Update = 2,
    Delete = 3,
    Commit = 4,
    Rollback = 5,
    Checkpoint = 6,
}

impl OpCode {
    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn from_tag(tag: u8) -> Result<Self, DecodeError> {
        match tag {
            0 => Ok(Self::Begin),
            1 => Ok(Self::Insert),
            2 => Ok(Self::Update),
            3 => Ok(Self::Delete),
            4 => Ok(Self::Commit),
            5 => Ok(Self::Rollback),
            6 => Ok(Self::Checkpoint),
            other => Err(DecodeError::InvalidTag(other)),
        }
    }
}

/// One record in the log. `lsn` and `timestamp` are assigned by
/// [`Wal::write`](crate::Wal::write); callers fill the rest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub tx_id: u64,
    pub op: OpCode,
    pub table_name: String,
    pub row_id: u64,
    pub before_image: Vec<u8>,
    pub after_image: Vec<u8>,
    /// Unix seconds.
    pub timestamp: i64,
    pub lsn: u64,
}

impl LogEntry {
    pub fn new(tx_id: u64, op: OpCode, table_name: impl Into<String>) -> Self {
        Self {
            tx_id,
            op,
            table_name: table_name.into(),
            row_id: 0,
            before_image: Vec::new(),
            after_image: Vec::new(),
            timestamp: 0,
            lsn: 0,
        }
    }

    pub fn with_row(mut self, row_id: u64) -> Self {
        self.row_id = row_id;
        self
    }

    pub fn with_before_image(mut self, image: Vec<u8>) -> Self {
        self.before_image = image;
        self
    }

    pub fn with_after_image(mut self, image: Vec<u8>) -> Self {
        self.after_image = image;
        self
    }

    pub fn encode(&self, out: &mut impl BufWriter) {
        out.put_u64(self.tx_id);
        out.put_u8(self.op.tag());
        out.put_u32(self.table_name.len() as u32);
        out.put_slice(self.table_name.as_bytes());
        out.put_u64(self.row_id);
        out.put_u32(self.before_image.len() as u32);
        out.put_slice(&self.before_image);
        out.put_u32(self.after_image.len() as u32);
        out.put_slice(&self.after_image);
        out.put_i64(self.timestamp);
        out.put_u64(self.lsn);
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode(&mut out);
        out
    }

    /// Decode one entry from an exact frame; trailing bytes are an error.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = bytes;
        let entry = Self::decode_from(&mut reader)?;
        if reader.remaining() != 0 {
            return Err(DecodeError::TrailingBytes(reader.remaining()));
        }
        Ok(entry)
    }

    fn decode_from<'de>(reader: &mut impl BufReader<'de>) -> Result<Self, DecodeError> {
        let tx_id = reader.get_u64()?;
        let op = OpCode::from_tag(reader.get_u8()?)?;
        let name_len = reader.get_u32()? as usize;
        let table_name = std::str::from_utf8(reader.get_slice(name_len)?)
            .map_err(|_| DecodeError::InvalidUtf8)?
            .to_owned();
        let row_id = reader.get_u64()?;
        let before_len = reader.get_u32()? as usize;
        let before_image = reader.get_slice(before_len)?.to_vec();
        let after_len = reader.get_u32()? as usize;
        let after_image = reader.get_slice(after_len)?.to_vec();
        let timestamp = reader.get_i64()?;
        let lsn = reader.get_u64()?;
        Ok(Self {
            tx_id,
            op,
            table_name,
            row_id,
            before_image,
            after_image,
            timestamp,
            lsn,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn entry_roundtrip() {
        let entry = LogEntry {
            tx_id: 7,
            op: OpCode::Update,
            table_name: "users".into(),
            row_id: 42,
            before_image: vec![1, 2, 3],
            after_image: vec![4, 5],
            timestamp: 1_700_000_000,
            lsn: 99,
        };
        assert_eq!(LogEntry::decode(&entry.to_bytes()).unwrap(), entry);
    }

    #[test]
    fn decode_rejects_bad_opcode() {
        let mut bytes = LogEntry::new(1, OpCode::Begin, "t").to_bytes();
        bytes[8] = 200;
        assert_eq!(
            LogEntry::decode(&bytes).unwrap_err(),
            DecodeError::InvalidTag(200)
        );
    }

    #[test]
    fn decode_rejects_truncation_and_trailing() {
        let bytes = LogEntry::new(1, OpCode::Commit, "orders").to_bytes();
        assert!(matches!(
            LogEntry::decode(&bytes[..bytes.len() - 3]).unwrap_err(),
            DecodeError::BufferLength { .. }
        ));
        let mut long = bytes.clone();
        long.push(0);
        assert_eq!(
            LogEntry::decode(&long).unwrap_err(),
            DecodeError::TrailingBytes(1)
        );
    }
}
