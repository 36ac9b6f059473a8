//! The embedded engine facade: one [`Database`], one [`TransactionManager`]
//! and one [`Wal`] wired together.
//!
//! `open` loads the persisted catalog (when present) and replays committed
//! transactions out of the log, redoing their after-images. `sql` wraps
//! each mutating statement in a Begin/…/Commit envelope so a crash between
//! open and close loses nothing that was acknowledged.

use crate::db::table::Row;
use crate::db::transaction::{IsolationLevel, TransactionManager};
use crate::db::Database;
use crate::error::DBError;
use crate::sql::execute::{execute, QueryResult, TxContext};
use crate::sql::planner;
use flintdb_wal::{LogEntry, OpCode, Wal};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

pub const DEFAULT_MAX_ACTIVE_TX: usize = 64;
const WAL_FILE: &str = "wal.log";

pub struct Engine {
    db: Arc<Database>,
    tx_manager: TransactionManager,
    wal: Wal,
}

impl Engine {
    /// Open (or create) the database at `path`, load its catalog and replay
    /// the write-ahead log.
    pub fn open(name: impl Into<String>, path: impl AsRef<Path>) -> Result<Self, DBError> {
        let path = path.as_ref();
        let db = Database::open(name, path)?;
        if db.is_persisted() {
            db.load()?;
        }
        let wal = Wal::open(path.join(WAL_FILE))?;
        let engine = Self {
            db: Arc::new(db),
            tx_manager: TransactionManager::new(DEFAULT_MAX_ACTIVE_TX, IsolationLevel::default()),
            wal,
        };
        engine.recover()?;
        Ok(engine)
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    pub fn transactions(&self) -> &TransactionManager {
        &self.tx_manager
    }

    pub fn wal(&self) -> &Wal {
        &self.wal
    }

    /// Redo committed transactions from the log, in LSN order. Entries of
    /// transactions without a Commit record are skipped, as are entries for
    /// tables that no longer exist in the catalog.
    fn recover(&self) -> Result<(), DBError> {
        let entries = self.wal.read()?;
        if entries.is_empty() {
            return Ok(());
        }
        let max_tx = entries.iter().map(|e| e.tx_id).max().unwrap_or(0);
        self.tx_manager.advance_past(max_tx);
        let committed: HashSet<u64> = entries
            .iter()
            .filter(|e| e.op == OpCode::Commit)
            .map(|e| e.tx_id)
            .collect();

        let mut applied = 0usize;
        for entry in &entries {
            if !committed.contains(&entry.tx_id) {
                continue;
            }
            match entry.op {
                OpCode::Insert | OpCode::Update => {
                    let Ok(table) = self.db.get_table(&entry.table_name) else {
                        log::warn!(
                            "skipping log entry for missing table `{}`",
                            entry.table_name
                        );
                        continue;
                    };
                    // After-images from before an ALTER no longer decode
                    // against the current schema; the ALTER re-logged every
                    // surviving row, so stale images are safe to skip.
                    let row = match Row::decode(&entry.after_image, &table.schema()) {
                        Ok(row) => row,
                        Err(err) => {
                            log::warn!(
                                "skipping stale log entry (lsn {}) for `{}`: {err}",
                                entry.lsn,
                                entry.table_name
                            );
                            continue;
                        }
                    };
                    table.restore(row)?;
                    applied += 1;
                }
                OpCode::Delete => {
                    let Ok(table) = self.db.get_table(&entry.table_name) else {
                        continue;
                    };
                    match table.delete(entry.row_id) {
                        Ok(()) => applied += 1,
                        Err(DBError::Table(crate::error::TableError::RowNotFound(_))) => {}
                        Err(err) => return Err(err),
                    }
                }
                OpCode::Begin | OpCode::Commit | OpCode::Rollback | OpCode::Checkpoint => {}
            }
        }
        log::debug!(
            "recovered {} of {} log entries into `{}`",
            applied,
            entries.len(),
            self.db.name()
        );
        Ok(())
    }

    /// Parse, plan and execute one SQL statement. Mutations run inside a
    /// fresh transaction with a full WAL envelope; reads execute directly.
    pub fn sql(&self, text: &str) -> Result<QueryResult, DBError> {
        let statement = flintdb_sql_parser::parse(text)?;
        let plan = planner::plan(&self.db, statement)?;
        if !plan.is_mutation() {
            return execute(&self.db, &plan, None);
        }

        let target = plan.target_table().unwrap_or_default().to_owned();
        let tx = self.tx_manager.begin()?;
        self.wal
            .write(&mut LogEntry::new(tx.id(), OpCode::Begin, target.as_str()))?;

        let ctx = TxContext {
            tx: &tx,
            wal: Some(&self.wal),
        };
        match execute(&self.db, &plan, Some(&ctx)) {
            Ok(result) => {
                self.wal
                    .write(&mut LogEntry::new(tx.id(), OpCode::Commit, target.as_str()))?;
                self.tx_manager.commit(tx.id())?;
                if matches!(
                    plan.root,
                    crate::sql::PlanNode::CreateTable { .. }
                        | crate::sql::PlanNode::DropTable { .. }
                        | crate::sql::PlanNode::AlterTable { .. }
                ) {
                    // DDL is durable immediately; row durability rides the log.
                    self.db.save()?;
                }
                Ok(result)
            }
            Err(err) => {
                // Undo whatever part of the statement already applied, then
                // surface the execution error; the rollback record is best
                // effort on top of it.
                self.undo(&tx, &target);
                let _ = self
                    .wal
                    .write(&mut LogEntry::new(tx.id(), OpCode::Rollback, target.as_str()));
                let _ = self.tx_manager.rollback(tx.id());
                Err(err)
            }
        }
    }

    /// Revert the transaction's recorded before-images: an empty image
    /// deletes the row it shadows, any other image is restored verbatim.
    fn undo(&self, tx: &crate::db::Transaction, table_name: &str) {
        let Ok(table) = self.db.get_table(table_name) else {
            return;
        };
        let schema = table.schema();
        for (row_id, image) in tx.before_images() {
            let outcome = if image.is_empty() {
                match table.delete(row_id) {
                    Err(DBError::Table(crate::error::TableError::RowNotFound(_))) => Ok(()),
                    other => other,
                }
            } else {
                Row::decode(&image, &schema).and_then(|row| table.restore(row))
            };
            if let Err(err) = outcome {
                log::warn!("failed to undo row {row_id} in `{table_name}`: {err}");
            }
        }
    }

    /// Persist the catalog, write a Checkpoint record and drop the log
    /// behind it. Recovery afterwards starts from the checkpoint.
    pub fn checkpoint(&self) -> Result<(), DBError> {
        self.db.save()?;
        let mut marker = LogEntry::new(0, OpCode::Checkpoint, "");
        let lsn = self.wal.write(&mut marker)?;
        self.wal.truncate(lsn)?;
        log::debug!("checkpointed `{}` at lsn {lsn}", self.db.name());
        Ok(())
    }

    /// Save the catalog and close the log and every table.
    pub fn close(&self) -> Result<(), DBError> {
        self.db.save()?;
        self.wal.close()?;
        self.db.close()
    }
}
