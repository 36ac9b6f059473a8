use flintdb_sql_parser::ParseError;
use flintdb_types::buffer::DecodeError;
use flintdb_types::{SchemaError, ValueError};
use flintdb_wal::WalError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TableError {
    #[error("table `{0}` not found")]
    NotFound(String),
    #[error("table `{0}` already exists")]
    Exists(String),
    #[error("table `{0}` is closed")]
    Closed(String),
    #[error("row {0} not found")]
    RowNotFound(u64),
    #[error("duplicate row for the primary key of table `{0}`")]
    DuplicateRow(String),
    #[error("invalid row data: {0}")]
    InvalidRowData(String),
    #[error("column `{0}` not found")]
    ColumnNotFound(String),
    #[error("column `{0}` does not allow null values")]
    NullValueNotAllowed(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IndexError {
    #[error("index `{0}` not found")]
    NotFound(String),
    #[error("index `{0}` already exists")]
    Exists(String),
    #[error("index is closed")]
    Closed,
    #[error("duplicate key")]
    DuplicateKey,
    #[error("key not found")]
    KeyNotFound,
    #[error("b-tree order {0} is below the minimum of 4")]
    InvalidOrder(usize),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TxError {
    #[error("transaction {0} does not exist")]
    InvalidTransaction(u64),
    #[error("transaction {0} is already committed")]
    Committed(u64),
    #[error("transaction {0} is already rolled back")]
    RolledBack(u64),
    #[error("too many active transactions (limit {0})")]
    TooMany(usize),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DatabaseError {
    #[error("no database found at `{0}`")]
    NotFound(PathBuf),
    #[error("database already exists at `{0}`")]
    Exists(PathBuf),
    #[error("database is closed")]
    Closed,
    #[error("invalid operation: {0}")]
    InvalidOperation(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("unsupported query shape: {0}")]
    Unsupported(String),
    #[error("column `{0}` not found in the queried tables")]
    UnknownColumn(String),
    #[error("ambiguous column `{0}`")]
    AmbiguousColumn(String),
    #[error("unknown function `{0}`")]
    UnknownFunction(String),
    #[error("column `{0}` must appear in GROUP BY or inside an aggregate")]
    NotAggregated(String),
}

#[derive(Debug, Error)]
pub enum DBError {
    #[error("ValueError: {0}")]
    Value(#[from] ValueError),
    #[error("DecodeError: {0}")]
    Decode(#[from] DecodeError),
    #[error("SchemaError: {0}")]
    Schema(#[from] SchemaError),
    #[error("TableError: {0}")]
    Table(#[from] TableError),
    #[error("IndexError: {0}")]
    Index(#[from] IndexError),
    #[error("TxError: {0}")]
    Tx(#[from] TxError),
    #[error("DatabaseError: {0}")]
    Database(#[from] DatabaseError),
    #[error("ParseError: {0}")]
    Parse(#[from] ParseError),
    #[error("PlanError: {0}")]
    Plan(#[from] PlanError),
    #[error("WalError: {0}")]
    Wal(#[from] WalError),
    #[error("IoError: {0}")]
    Io(#[from] std::io::Error),
}
