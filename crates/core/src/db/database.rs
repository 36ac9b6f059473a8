//! The catalog: a named set of tables plus its persisted metadata.

use crate::db::persistence::{self, CatalogHeader};
use crate::db::table::Table;
use crate::error::{DBError, DatabaseError, TableError};
use flintdb_types::TableSchema;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

struct DatabaseInner {
    tables: HashMap<String, Arc<Table>>,
    created_at: u64,
    modified_at: u64,
    closed: bool,
}

/// A database owns its tables and the directory its catalog persists into.
/// Tables are handed out as `Arc<Table>`; a table closed by `drop_table` or
/// `close` fails all further operations on outstanding handles.
pub struct Database {
    name: String,
    path: PathBuf,
    inner: RwLock<DatabaseInner>,
}

impl Database {
    /// Create the directory (if needed) and an empty in-memory catalog.
    /// Call [`Database::load`] to pick up previously saved schemas.
    pub fn open(name: impl Into<String>, path: impl AsRef<Path>) -> Result<Self, DBError> {
        let path = path.as_ref().to_owned();
        std::fs::create_dir_all(&path)?;
        let now = unix_now();
        Ok(Self {
            name: name.into(),
            path,
            inner: RwLock::new(DatabaseInner {
                tables: HashMap::new(),
                created_at: now,
                modified_at: now,
                closed: false,
            }),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True when a saved catalog exists under this database's directory.
    pub fn is_persisted(&self) -> bool {
        self.path.join(persistence::HEADER_FILE).exists()
    }

    pub fn created_at(&self) -> u64 {
        self.inner.read().created_at
    }

    /// Validate `schema` and register a new table under `name`. The schema's
    /// own table name is filled in from `name` when empty and must otherwise
    /// match it.
    pub fn create_table(&self, name: &str, mut schema: TableSchema) -> Result<Arc<Table>, DBError> {
        let mut inner = self.inner.write();
        if inner.closed {
            return Err(DatabaseError::Closed.into());
        }
        if inner.tables.contains_key(name) {
            return Err(TableError::Exists(name.to_owned()).into());
        }
        if schema.table_name.is_empty() {
            schema.table_name = name.to_owned();
        } else if schema.table_name != name {
            return Err(DatabaseError::InvalidOperation(format!(
                "schema is named `{}` but the table is being created as `{name}`",
                schema.table_name
            ))
            .into());
        }
        let table = Arc::new(Table::create(schema)?);
        inner.tables.insert(name.to_owned(), table.clone());
        inner.modified_at = unix_now();
        Ok(table)
    }

    pub fn get_table(&self, name: &str) -> Result<Arc<Table>, DBError> {
        let inner = self.inner.read();
        if inner.closed {
            return Err(DatabaseError::Closed.into());
        }
        inner
            .tables
            .get(name)
            .cloned()
            .ok_or_else(|| TableError::NotFound(name.to_owned()).into())
    }

    pub fn has_table(&self, name: &str) -> bool {
        let inner = self.inner.read();
        !inner.closed && inner.tables.contains_key(name)
    }

    /// Close and remove the named table.
    pub fn drop_table(&self, name: &str) -> Result<(), DBError> {
        let mut inner = self.inner.write();
        if inner.closed {
            return Err(DatabaseError::Closed.into());
        }
        let table = inner
            .tables
            .remove(name)
            .ok_or_else(|| TableError::NotFound(name.to_owned()))?;
        table.close()?;
        inner.modified_at = unix_now();
        Ok(())
    }

    pub fn table_names(&self) -> Result<Vec<String>, DBError> {
        let inner = self.inner.read();
        if inner.closed {
            return Err(DatabaseError::Closed.into());
        }
        let mut names: Vec<String> = inner.tables.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    /// Persist the catalog (header plus one schema file per table).
    pub fn save(&self) -> Result<(), DBError> {
        let mut inner = self.inner.write();
        if inner.closed {
            return Err(DatabaseError::Closed.into());
        }
        inner.modified_at = unix_now();
        let mut schemas: Vec<TableSchema> =
            inner.tables.values().map(|t| t.schema()).collect();
        persistence::save(
            &self.path,
            &mut schemas,
            &CatalogHeader {
                created_at: inner.created_at,
                modified_at: inner.modified_at,
            },
        )
    }

    /// Replace the in-memory catalog with the persisted one. Existing
    /// in-memory tables are closed first.
    pub fn load(&self) -> Result<(), DBError> {
        let mut inner = self.inner.write();
        if inner.closed {
            return Err(DatabaseError::Closed.into());
        }
        let (schemas, header) = persistence::load(&self.path)?;

        let mut tables = HashMap::with_capacity(schemas.len());
        for schema in schemas {
            let name = schema.table_name.clone();
            tables.insert(name, Arc::new(Table::create(schema)?));
        }
        for table in inner.tables.values() {
            let _ = table.close();
        }
        inner.tables = tables;
        inner.created_at = header.created_at;
        inner.modified_at = header.modified_at;
        Ok(())
    }

    /// Close every table and mark the database closed. Outstanding handles
    /// observe `TableClosed`/`DatabaseClosed` from then on.
    pub fn close(&self) -> Result<(), DBError> {
        let mut inner = self.inner.write();
        if inner.closed {
            return Err(DatabaseError::Closed.into());
        }
        for table in inner.tables.values() {
            let _ = table.close();
        }
        inner.tables.clear();
        inner.closed = true;
        Ok(())
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flintdb_types::{ColumnDef, Constraints, DataType, Value};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn users_schema() -> TableSchema {
        TableSchema::new("users").with_columns(vec![
            ColumnDef::new("id", DataType::Integer).with_constraints(Constraints::PRIMARY_KEY),
            ColumnDef::new("name", DataType::Text).with_constraints(Constraints::NOT_NULL),
        ])
    }

    #[test]
    fn create_get_drop_tables() {
        let tmp = TempDir::with_prefix("db_test").unwrap();
        let db = Database::open("app", tmp.path()).unwrap();

        db.create_table("users", users_schema()).unwrap();
        assert!(matches!(
            db.create_table("users", users_schema()).unwrap_err(),
            DBError::Table(TableError::Exists(_))
        ));

        assert!(db.get_table("users").is_ok());
        assert_eq!(db.table_names().unwrap(), vec!["users".to_string()]);

        db.drop_table("users").unwrap();
        assert!(matches!(
            db.get_table("users").unwrap_err(),
            DBError::Table(TableError::NotFound(_))
        ));
        assert!(matches!(
            db.drop_table("users").unwrap_err(),
            DBError::Table(TableError::NotFound(_))
        ));
    }

    #[test]
    fn empty_schema_name_is_autofilled() {
        let tmp = TempDir::with_prefix("db_test").unwrap();
        let db = Database::open("app", tmp.path()).unwrap();
        let schema = TableSchema::new("").with_columns(vec![ColumnDef::new("x", DataType::Integer)]);
        let table = db.create_table("things", schema).unwrap();
        assert_eq!(table.name(), "things");

        let mismatch = db.create_table("other", users_schema()).unwrap_err();
        assert!(matches!(
            mismatch,
            DBError::Database(DatabaseError::InvalidOperation(_))
        ));
    }

    #[test]
    fn catalog_roundtrip() {
        let tmp = TempDir::with_prefix("db_test").unwrap();
        let original = users_schema();
        {
            let db = Database::open("app", tmp.path()).unwrap();
            db.create_table("users", original.clone()).unwrap();
            db.save().unwrap();
            db.close().unwrap();
        }

        let db = Database::open("app", tmp.path()).unwrap();
        assert!(db.is_persisted());
        db.load().unwrap();
        let table = db.get_table("users").unwrap();
        let mut expected = original;
        expected.normalize_primary_key();
        assert_eq!(table.schema(), expected);
    }

    #[test]
    fn save_prunes_dropped_tables() {
        let tmp = TempDir::with_prefix("db_test").unwrap();
        let db = Database::open("app", tmp.path()).unwrap();
        db.create_table("users", users_schema()).unwrap();
        db.save().unwrap();
        assert!(tmp.path().join("users.schema").exists());

        db.drop_table("users").unwrap();
        db.save().unwrap();
        assert!(!tmp.path().join("users.schema").exists());

        db.load().unwrap();
        assert!(db.table_names().unwrap().is_empty());
    }

    #[test]
    fn load_rejects_tampered_schemas() {
        let tmp = TempDir::with_prefix("db_test").unwrap();
        let db = Database::open("app", tmp.path()).unwrap();
        db.create_table("users", users_schema()).unwrap();
        db.save().unwrap();

        // Another schema file appears without the header being rewritten.
        let stray = TableSchema::new("stray").with_columns(vec![ColumnDef::new("x", DataType::Integer)]);
        std::fs::write(tmp.path().join("stray.schema"), stray.to_bytes()).unwrap();

        assert!(matches!(
            db.load().unwrap_err(),
            DBError::Database(DatabaseError::InvalidOperation(_))
        ));
    }

    #[test]
    fn closed_database_rejects_everything() {
        let tmp = TempDir::with_prefix("db_test").unwrap();
        let db = Database::open("app", tmp.path()).unwrap();
        let table = db.create_table("users", users_schema()).unwrap();
        db.close().unwrap();

        assert!(matches!(
            db.create_table("more", users_schema()).unwrap_err(),
            DBError::Database(DatabaseError::Closed)
        ));
        assert!(matches!(
            db.get_table("users").unwrap_err(),
            DBError::Database(DatabaseError::Closed)
        ));
        assert!(matches!(
            db.table_names().unwrap_err(),
            DBError::Database(DatabaseError::Closed)
        ));
        assert!(matches!(
            db.save().unwrap_err(),
            DBError::Database(DatabaseError::Closed)
        ));
        assert!(matches!(
            db.close().unwrap_err(),
            DBError::Database(DatabaseError::Closed)
        ));
        // Outstanding handles see the table as closed too.
        assert!(table
            .insert(vec![Value::from(1), Value::from("x")])
            .is_err());
    }

    #[test]
    fn load_without_saved_catalog_is_not_found() {
        let tmp = TempDir::with_prefix("db_test").unwrap();
        let db = Database::open("app", tmp.path()).unwrap();
        assert!(matches!(
            db.load().unwrap_err(),
            DBError::Database(DatabaseError::NotFound(_))
        ));
    }
}
