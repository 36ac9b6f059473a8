//! Table and column definitions, validation and the on-disk schema codec.

use crate::buffer::{BufReader, BufWriter, DecodeError};
use crate::value::{DataType, Value};
use bitflags::bitflags;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("table name must not be empty")]
    EmptyTableName,
    #[error("table `{0}` has no columns")]
    NoColumns(String),
    #[error("table `{0}` column {1} has an empty name")]
    EmptyColumnName(String, usize),
    #[error("duplicate column `{1}` in table `{0}`")]
    DuplicateColumn(String, String),
    #[error("primary key column `{1}` does not exist in table `{0}`")]
    PrimaryKeyColumnNotFound(String, String),
    #[error("index `{1}` on table `{0}` names unknown column `{2}`")]
    IndexColumnNotFound(String, String, String),
    #[error("auto-increment column `{1}` in table `{0}` must be an Integer primary key")]
    AutoIncrementNotIntegerKey(String, String),
}

bitflags! {
    /// Per-column constraint mask, persisted verbatim in the schema file.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Constraints: u32 {
        const PRIMARY_KEY = 1 << 0;
        const NOT_NULL = 1 << 1;
        const UNIQUE = 1 << 2;
        const AUTO_INC = 1 << 3;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub col_name: String,
    pub col_type: DataType,
    pub constraints: Constraints,
    /// The default-value constraint carries a payload, so it rides outside
    /// the persisted mask.
    pub default_value: Option<Value>,
}

impl ColumnDef {
    pub fn new(col_name: impl Into<String>, col_type: DataType) -> Self {
        Self {
            col_name: col_name.into(),
            col_type,
            constraints: Constraints::empty(),
            default_value: None,
        }
    }

    pub fn with_constraints(mut self, constraints: Constraints) -> Self {
        self.constraints = constraints;
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default_value = Some(default);
        self
    }

    pub fn is_primary_key(&self) -> bool {
        self.constraints.contains(Constraints::PRIMARY_KEY)
    }

    pub fn is_not_null(&self) -> bool {
        self.constraints.contains(Constraints::NOT_NULL)
    }

    pub fn is_auto_increment(&self) -> bool {
        self.constraints.contains(Constraints::AUTO_INC)
    }
}

/// A secondary index declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDef {
    pub index_name: String,
    pub columns: Vec<String>,
    pub is_unique: bool,
}

/// Declarative foreign-key descriptor. Stored, never enforced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKeyDef {
    pub columns: Vec<String>,
    pub ref_table: String,
    pub ref_columns: Vec<String>,
}

/// Declarative table-level check descriptor. Stored, never enforced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckDef {
    pub name: String,
    pub expr: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    pub table_name: String,
    pub columns: Vec<ColumnDef>,
    pub primary_key: Vec<String>,
    pub indexes: Vec<IndexDef>,
    pub foreign_keys: Vec<ForeignKeyDef>,
    pub checks: Vec<CheckDef>,
    /// Schema generation, bumped by ALTER TABLE. Rows record the generation
    /// they were written against.
    pub version: u32,
}

impl TableSchema {
    pub fn new(table_name: impl Into<String>) -> Self {
        Self {
            table_name: table_name.into(),
            columns: Vec::new(),
            primary_key: Vec::new(),
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
            checks: Vec::new(),
            version: 1,
        }
    }

    pub fn with_columns(mut self, columns: Vec<ColumnDef>) -> Self {
        self.columns = columns;
        self
    }

    pub fn with_primary_key(mut self, primary_key: Vec<String>) -> Self {
        self.primary_key = primary_key;
        self
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn get_column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.col_name == name)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.col_name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// The effective primary key: the explicit list when present, otherwise
    /// the columns flagged PRIMARY_KEY in declaration order.
    pub fn primary_key_columns(&self) -> Vec<String> {
        if !self.primary_key.is_empty() {
            return self.primary_key.clone();
        }
        self.columns
            .iter()
            .filter(|c| c.is_primary_key())
            .map(|c| c.col_name.clone())
            .collect()
    }

    /// Fold column-level PRIMARY KEY flags into the explicit key list.
    pub fn normalize_primary_key(&mut self) {
        if self.primary_key.is_empty() {
            self.primary_key = self.primary_key_columns();
        }
    }

    /// Pure, deterministic structural validation.
    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.table_name.is_empty() {
            return Err(SchemaError::EmptyTableName);
        }
        if self.columns.is_empty() {
            return Err(SchemaError::NoColumns(self.table_name.clone()));
        }
        for (pos, col) in self.columns.iter().enumerate() {
            if col.col_name.is_empty() {
                return Err(SchemaError::EmptyColumnName(self.table_name.clone(), pos));
            }
            if self.columns[..pos].iter().any(|c| c.col_name == col.col_name) {
                return Err(SchemaError::DuplicateColumn(
                    self.table_name.clone(),
                    col.col_name.clone(),
                ));
            }
            if col.is_auto_increment() {
                let keyed = col.is_primary_key() || self.primary_key.contains(&col.col_name);
                if col.col_type != DataType::Integer || !keyed {
                    return Err(SchemaError::AutoIncrementNotIntegerKey(
                        self.table_name.clone(),
                        col.col_name.clone(),
                    ));
                }
            }
        }
        for key_col in &self.primary_key {
            if !self.has_column(key_col) {
                return Err(SchemaError::PrimaryKeyColumnNotFound(
                    self.table_name.clone(),
                    key_col.clone(),
                ));
            }
        }
        for index in &self.indexes {
            for col in &index.columns {
                if !self.has_column(col) {
                    return Err(SchemaError::IndexColumnNotFound(
                        self.table_name.clone(),
                        index.index_name.clone(),
                        col.clone(),
                    ));
                }
            }
        }
        Ok(())
    }

    /// The schema-file body: table name, columns (name, type tag, constraint
    /// mask), then the primary-key column list. This is also the canonical
    /// encoding the catalog header hash runs over.
    pub fn encode(&self, out: &mut impl BufWriter) {
        put_string(out, &self.table_name);
        out.put_u32(self.columns.len() as u32);
        for col in &self.columns {
            put_string(out, &col.col_name);
            out.put_u32(col.col_type.tag() as u32);
            out.put_u32(col.constraints.bits());
        }
        out.put_u32(self.primary_key.len() as u32);
        for key_col in &self.primary_key {
            put_string(out, key_col);
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.encode(&mut out);
        out
    }

    pub fn decode<'de>(reader: &mut impl BufReader<'de>) -> Result<Self, DecodeError> {
        let table_name = get_string(reader)?;
        let column_count = reader.get_u32()? as usize;
        let mut columns = Vec::with_capacity(column_count);
        for _ in 0..column_count {
            let col_name = get_string(reader)?;
            let type_tag = reader.get_u32()?;
            let col_type = DataType::from_tag(type_tag as u8)
                .map_err(|_| DecodeError::InvalidTag(type_tag as u8))?;
            let constraints =
                Constraints::from_bits(reader.get_u32()?).unwrap_or_else(Constraints::empty);
            columns.push(ColumnDef {
                col_name,
                col_type,
                constraints,
                default_value: None,
            });
        }
        let key_count = reader.get_u32()? as usize;
        let mut primary_key = Vec::with_capacity(key_count);
        for _ in 0..key_count {
            primary_key.push(get_string(reader)?);
        }
        Ok(Self {
            table_name,
            columns,
            primary_key,
            indexes: Vec::new(),
            foreign_keys: Vec::new(),
            checks: Vec::new(),
            version: 1,
        })
    }
}

fn put_string(out: &mut impl BufWriter, s: &str) {
    out.put_u32(s.len() as u32);
    out.put_slice(s.as_bytes());
}

fn get_string<'de>(reader: &mut impl BufReader<'de>) -> Result<String, DecodeError> {
    let len = reader.get_u32()? as usize;
    let bytes = reader.get_slice(len)?;
    std::str::from_utf8(bytes)
        .map(str::to_owned)
        .map_err(|_| DecodeError::InvalidUtf8)
}
