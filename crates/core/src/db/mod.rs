//! The storage layer: catalog, tables, indexes, transactions and the engine
//! facade.
//!
//! Every mutable component guards its own state with a read-write lock and
//! no component reaches back up. Locks are only ever acquired descending
//! the ownership chain: Database → Table → IndexManager → Index → BTree.

pub mod database;
pub mod engine;
pub mod index;
pub mod persistence;
pub mod table;
pub mod transaction;

pub use database::Database;
pub use engine::Engine;
pub use index::{BTree, Index, IndexManager};
pub use table::{INVALID_ROW_ID, Row, Table};
pub use transaction::{IsolationLevel, Transaction, TransactionManager, TxState};
