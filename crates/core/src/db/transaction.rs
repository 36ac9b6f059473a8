//! Transaction records and the manager that owns them.
//!
//! A transaction's state machine is one-way: Active → Committed or
//! Active → RolledBack. Terminal transitions remove the record from the
//! active set and park its outcome in a completed map, so a second terminal
//! call can report which way the transaction already went.

use crate::error::TxError;
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IsolationLevel {
    #[default]
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    Active,
    Committed,
    RolledBack,
}

#[derive(Debug, Default)]
struct TxInner {
    before_images: HashMap<u64, Vec<u8>>,
    modified_tables: HashSet<String>,
}

/// One transaction. The undo bookkeeping (before-images and the modified
/// table set) sits behind its own lock, independent of the manager's.
#[derive(Debug)]
pub struct Transaction {
    id: u64,
    isolation: IsolationLevel,
    /// Unix seconds at `begin`.
    started_at: i64,
    state: RwLock<TxState>,
    inner: Mutex<TxInner>,
}

impl Transaction {
    fn new(id: u64, isolation: IsolationLevel) -> Self {
        Self {
            id,
            isolation,
            started_at: Utc::now().timestamp(),
            state: RwLock::new(TxState::Active),
            inner: Mutex::new(TxInner::default()),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn isolation_level(&self) -> IsolationLevel {
        self.isolation
    }

    pub fn started_at(&self) -> i64 {
        self.started_at
    }

    pub fn state(&self) -> TxState {
        *self.state.read()
    }

    pub fn is_active(&self) -> bool {
        self.state() == TxState::Active
    }

    pub fn is_committed(&self) -> bool {
        self.state() == TxState::Committed
    }

    pub fn is_rolled_back(&self) -> bool {
        self.state() == TxState::RolledBack
    }

    /// Record the pre-mutation bytes of a row. Only the first image per
    /// row id is retained; later calls for the same row are no-ops.
    pub fn record_before_image(&self, row_id: u64, image: Vec<u8>) {
        self.inner.lock().before_images.entry(row_id).or_insert(image);
    }

    pub fn before_image(&self, row_id: u64) -> Option<Vec<u8>> {
        self.inner.lock().before_images.get(&row_id).cloned()
    }

    /// Every recorded before-image, sorted by row id. An empty image means
    /// the row did not exist before this transaction.
    pub fn before_images(&self) -> Vec<(u64, Vec<u8>)> {
        let mut images: Vec<(u64, Vec<u8>)> = self
            .inner
            .lock()
            .before_images
            .iter()
            .map(|(id, image)| (*id, image.clone()))
            .collect();
        images.sort_by_key(|(id, _)| *id);
        images
    }

    pub fn mark_table_modified(&self, table: &str) {
        self.inner.lock().modified_tables.insert(table.to_owned());
    }

    pub fn modified_tables(&self) -> Vec<String> {
        let mut tables: Vec<String> = self.inner.lock().modified_tables.iter().cloned().collect();
        tables.sort();
        tables
    }

    fn set_state(&self, state: TxState) {
        *self.state.write() = state;
    }
}

struct ManagerInner {
    next_tx_id: u64,
    isolation: IsolationLevel,
    active: HashMap<u64, Arc<Transaction>>,
    completed: HashMap<u64, TxState>,
}

/// Admission control and lifecycle for transactions. Isolation levels are
/// recorded and exposed per transaction; the engine's actual guarantee is
/// per-table linearization through the component locks.
pub struct TransactionManager {
    max_active: usize,
    inner: RwLock<ManagerInner>,
}

impl TransactionManager {
    pub fn new(max_active: usize, isolation: IsolationLevel) -> Self {
        Self {
            max_active,
            inner: RwLock::new(ManagerInner {
                next_tx_id: 1,
                isolation,
                active: HashMap::new(),
                completed: HashMap::new(),
            }),
        }
    }

    pub fn max_active(&self) -> usize {
        self.max_active
    }

    pub fn begin(&self) -> Result<Arc<Transaction>, TxError> {
        let mut inner = self.inner.write();
        if inner.active.len() >= self.max_active {
            return Err(TxError::TooMany(self.max_active));
        }
        let id = inner.next_tx_id;
        inner.next_tx_id += 1;
        let tx = Arc::new(Transaction::new(id, inner.isolation));
        inner.active.insert(id, tx.clone());
        Ok(tx)
    }

    pub fn get(&self, id: u64) -> Option<Arc<Transaction>> {
        self.inner.read().active.get(&id).cloned()
    }

    pub fn active_count(&self) -> usize {
        self.inner.read().active.len()
    }

    pub fn commit(&self, id: u64) -> Result<(), TxError> {
        self.finish(id, TxState::Committed)
    }

    pub fn rollback(&self, id: u64) -> Result<(), TxError> {
        self.finish(id, TxState::RolledBack)
    }

    fn finish(&self, id: u64, target: TxState) -> Result<(), TxError> {
        let mut inner = self.inner.write();
        if let Some(tx) = inner.active.remove(&id) {
            tx.set_state(target);
            inner.completed.insert(id, target);
            return Ok(());
        }
        // Report the outcome already recorded for this id, whichever
        // terminal call arrives second.
        match inner.completed.get(&id) {
            Some(TxState::Committed) => Err(TxError::Committed(id)),
            Some(TxState::RolledBack) => Err(TxError::RolledBack(id)),
            _ => Err(TxError::InvalidTransaction(id)),
        }
    }

    /// Ensure future transaction ids start after `tx_id`. Used when
    /// resuming on top of an existing log so ids never alias old entries.
    pub fn advance_past(&self, tx_id: u64) {
        let mut inner = self.inner.write();
        inner.next_tx_id = inner.next_tx_id.max(tx_id + 1);
    }

    pub fn set_isolation_level(&self, isolation: IsolationLevel) {
        self.inner.write().isolation = isolation;
    }

    pub fn isolation_level(&self) -> IsolationLevel {
        self.inner.read().isolation
    }
}
