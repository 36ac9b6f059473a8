//! flintdb — an embedded relational storage engine.
//!
//! The engine is linked into a host program and driven either through the
//! typed API ([`db::Database`], [`db::Table`]) or through SQL via the
//! [`Engine`] facade, which wires the catalog, the transaction manager and
//! the write-ahead log together.

pub mod db;
pub mod error;
pub mod sql;

pub use db::engine::Engine;
pub use error::DBError;
