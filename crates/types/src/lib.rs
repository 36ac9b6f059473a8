//! Core data model for the flintdb storage engine.
//!
//! This crate holds everything the rest of the workspace agrees on before any
//! storage or SQL machinery gets involved: the typed [`Value`] scalar and its
//! binary codec, the [`buffer`] primitives every codec is written against,
//! and the [`TableSchema`] definitions the catalog persists.

pub mod buffer;
pub mod schema;
pub mod value;

pub use schema::{CheckDef, ColumnDef, Constraints, ForeignKeyDef, IndexDef, SchemaError, TableSchema};
pub use value::{DataType, Value, ValueError};
