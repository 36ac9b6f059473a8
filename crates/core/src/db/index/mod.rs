//! Named indexes over a table and the per-table manager that owns them.

pub mod btree;

pub use btree::BTree;

use crate::error::IndexError;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

/// A named B-tree over one or more columns of a table. The column metadata
/// is immutable; all key operations serialize through the tree's own lock.
#[derive(Debug)]
pub struct Index {
    name: String,
    table_name: String,
    columns: Vec<String>,
    is_unique: bool,
    tree: BTree,
}

impl Index {
    fn new(name: String, table_name: String, columns: Vec<String>, is_unique: bool) -> Self {
        Self {
            name,
            table_name,
            columns,
            is_unique,
            tree: BTree::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn is_unique(&self) -> bool {
        self.is_unique
    }

    pub fn insert(&self, key: &[u8], value: &[u8]) -> Result<(), IndexError> {
        self.tree.insert(key, value)
    }

    pub fn delete(&self, key: &[u8]) -> Result<(), IndexError> {
        self.tree.delete(key)
    }

    pub fn search(&self, key: &[u8]) -> Result<Vec<u8>, IndexError> {
        self.tree.search(key)
    }

    pub fn contains(&self, key: &[u8]) -> Result<bool, IndexError> {
        self.tree.contains(key)
    }

    pub fn range(
        &self,
        start: Option<&[u8]>,
        end: Option<&[u8]>,
    ) -> Result<Vec<(Vec<u8>, Vec<u8>)>, IndexError> {
        self.tree.range(start, end)
    }

    pub fn min(&self) -> Result<(Vec<u8>, Vec<u8>), IndexError> {
        self.tree.min()
    }

    pub fn max(&self) -> Result<(Vec<u8>, Vec<u8>), IndexError> {
        self.tree.max()
    }

    pub fn len(&self) -> Result<usize, IndexError> {
        self.tree.len()
    }

    pub fn is_empty(&self) -> Result<bool, IndexError> {
        self.tree.is_empty()
    }

    pub(crate) fn clear(&self) -> Result<(), IndexError> {
        self.tree.clear()
    }

    pub fn close(&self) -> Result<(), IndexError> {
        self.tree.close()
    }
}

/// Per-table map from index name to [`Index`].
#[derive(Debug)]
pub struct IndexManager {
    table_name: String,
    indexes: RwLock<HashMap<String, Arc<Index>>>,
}

impl IndexManager {
    pub(crate) fn new(table_name: String) -> Self {
        Self {
            table_name,
            indexes: RwLock::new(HashMap::new()),
        }
    }

    pub fn create_index(
        &self,
        name: &str,
        columns: Vec<String>,
        is_unique: bool,
    ) -> Result<Arc<Index>, IndexError> {
        let mut indexes = self.indexes.write();
        if indexes.contains_key(name) {
            return Err(IndexError::Exists(name.to_owned()));
        }
        let index = Arc::new(Index::new(
            name.to_owned(),
            self.table_name.clone(),
            columns,
            is_unique,
        ));
        indexes.insert(name.to_owned(), index.clone());
        Ok(index)
    }

    pub fn get(&self, name: &str) -> Option<Arc<Index>> {
        self.indexes.read().get(name).cloned()
    }

    pub fn drop_index(&self, name: &str) -> Result<(), IndexError> {
        let mut indexes = self.indexes.write();
        match indexes.remove(name) {
            Some(index) => index.close(),
            None => Err(IndexError::NotFound(name.to_owned())),
        }
    }

    pub fn index_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.indexes.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub(crate) fn all(&self) -> Vec<Arc<Index>> {
        let mut all: Vec<Arc<Index>> = self.indexes.read().values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    pub fn len(&self) -> usize {
        self.indexes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.indexes.read().is_empty()
    }

    /// Close and drop every contained index. Indexes already closed are
    /// skipped silently.
    pub fn close(&self) {
        let mut indexes = self.indexes.write();
        for index in indexes.values() {
            let _ = index.close();
        }
        indexes.clear();
    }
}
