//! The row store: one table owns its rows, its schema and its indexes.
//!
//! Rows live in a map keyed by a monotonically allocated 64-bit row id (0 is
//! reserved as invalid). Indexes hold opaque 8-byte row-id values, never
//! references, so index and row ownership never entangle. Validation and
//! unique probing happen before any mutation so a failed call leaves the
//! table and its indexes exactly as they were.

use crate::db::index::{Index, IndexManager};
use crate::error::{DBError, DatabaseError, IndexError, TableError};
use flintdb_types::buffer::{BufReader, BufWriter, DecodeError};
use flintdb_types::{ColumnDef, SchemaError, TableSchema, Value};
use parking_lot::RwLock;
use std::collections::HashMap;

pub const INVALID_ROW_ID: u64 = 0;

/// Separator between column encodings in a composite index key. Also splits
/// a non-unique key from its trailing row-id disambiguator.
const KEY_SEPARATOR: u8 = 0xFF;

const PK_INDEX_PREFIX: &str = "pk_";

/// One stored row: its id, the schema generation it was written against and
/// one value per column.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    pub id: u64,
    pub schema_version: u32,
    pub values: Vec<Value>,
}

impl Row {
    pub fn encode(&self, out: &mut impl BufWriter) -> Result<(), DBError> {
        out.put_u64(self.id);
        out.put_u32(self.schema_version);
        for value in &self.values {
            let payload = value.serialize()?;
            out.put_u32(payload.len() as u32);
            out.put_slice(&payload);
        }
        Ok(())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, DBError> {
        let mut out = Vec::new();
        self.encode(&mut out)?;
        Ok(out)
    }

    /// Decode a row against `schema`; the schema supplies the column count
    /// and every declared payload must fit the remaining buffer.
    pub fn decode(bytes: &[u8], schema: &TableSchema) -> Result<Row, DBError> {
        let mut reader = bytes;
        let id = reader.get_u64()?;
        let schema_version = reader.get_u32()?;
        let mut values = Vec::with_capacity(schema.column_count());
        for _ in 0..schema.column_count() {
            let len = reader.get_u32()? as usize;
            let payload = reader.get_slice(len)?;
            values.push(Value::deserialize(payload)?);
        }
        if reader.remaining() != 0 {
            return Err(DecodeError::TrailingBytes(reader.remaining()).into());
        }
        Ok(Row {
            id,
            schema_version,
            values,
        })
    }
}

/// Concatenate the codec bytes of `values` with a 0xFF separator between
/// columns.
pub fn encode_index_key(values: &[&Value]) -> Result<Vec<u8>, DBError> {
    let mut key = Vec::new();
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            key.push(KEY_SEPARATOR);
        }
        value.encode(&mut key)?;
    }
    Ok(key)
}

/// The smallest byte string greater than every key starting with `prefix`,
/// or `None` when the prefix is all 0xFF (scan unbounded instead).
pub fn prefix_upper_bound(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut bound = prefix.to_vec();
    while let Some(last) = bound.last_mut() {
        if *last < u8::MAX {
            *last += 1;
            return Some(bound);
        }
        bound.pop();
    }
    None
}

#[derive(Debug)]
struct TableState {
    rows: HashMap<u64, Row>,
    next_row_id: u64,
    closed: bool,
}

/// A table: schema, row arena and index manager. All methods take `&self`
/// and serialize through internal read-write locks; locks are acquired in
/// the order schema → state → indexes.
#[derive(Debug)]
pub struct Table {
    name: String,
    schema: RwLock<TableSchema>,
    state: RwLock<TableState>,
    indexes: IndexManager,
}

impl Table {
    /// Validate the schema and build the table, auto-creating the unique
    /// `pk_<table>` index when a primary key is declared.
    pub(crate) fn create(mut schema: TableSchema) -> Result<Self, DBError> {
        schema.normalize_primary_key();
        schema.validate()?;
        let name = schema.table_name.clone();
        let table = Self {
            name: name.clone(),
            indexes: IndexManager::new(name.clone()),
            schema: RwLock::new(schema),
            state: RwLock::new(TableState {
                rows: HashMap::new(),
                next_row_id: 1,
                closed: false,
            }),
        };
        {
            let schema = table.schema.read();
            if !schema.primary_key.is_empty() {
                table.indexes.create_index(
                    &format!("{PK_INDEX_PREFIX}{name}"),
                    schema.primary_key.clone(),
                    true,
                )?;
            }
            for index in &schema.indexes {
                table
                    .indexes
                    .create_index(&index.index_name, index.columns.clone(), index.is_unique)?;
            }
        }
        Ok(table)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> TableSchema {
        self.schema.read().clone()
    }

    pub fn pk_index_name(&self) -> Option<String> {
        let name = format!("{PK_INDEX_PREFIX}{}", self.name);
        self.indexes.get(&name).map(|_| name)
    }

    pub fn row_count(&self) -> Result<usize, TableError> {
        let state = self.state.read();
        self.check_open(&state)?;
        Ok(state.rows.len())
    }

    pub fn index_names(&self) -> Vec<String> {
        self.indexes.index_names()
    }

    fn check_open(&self, state: &TableState) -> Result<(), TableError> {
        if state.closed {
            return Err(TableError::Closed(self.name.clone()));
        }
        Ok(())
    }

    fn is_pk_index(&self, index: &Index) -> bool {
        index.name() == format!("{PK_INDEX_PREFIX}{}", self.name)
    }

    /// Length, type, not-null, auto-increment and default handling for an
    /// incoming value vector. Mutates `values` in place (fills auto-inc ids
    /// and defaults).
    fn validate_values(
        &self,
        schema: &TableSchema,
        values: &mut [Value],
        row_id: u64,
    ) -> Result<(), DBError> {
        if values.len() != schema.column_count() {
            return Err(TableError::InvalidRowData(format!(
                "table `{}` expects {} values, got {}",
                self.name,
                schema.column_count(),
                values.len()
            ))
            .into());
        }
        for (value, column) in values.iter_mut().zip(&schema.columns) {
            if value.is_null() {
                if column.is_auto_increment() {
                    *value = Value::Integer(row_id as i64);
                } else if let Some(default) = &column.default_value {
                    *value = default.clone();
                }
            }
            if value.is_null() {
                if column.is_not_null() {
                    return Err(TableError::NullValueNotAllowed(column.col_name.clone()).into());
                }
                continue;
            }
            if value.data_type() != column.col_type {
                return Err(flintdb_types::ValueError::TypeMismatch {
                    expected: column.col_type,
                    found: value.data_type(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// The key `row_values` produces for `index`. Non-unique indexes get the
    /// row id appended behind a separator so equal column values coexist.
    fn index_key(
        &self,
        schema: &TableSchema,
        index: &Index,
        row_values: &[Value],
        row_id: u64,
    ) -> Result<Vec<u8>, DBError> {
        let mut keyed = Vec::with_capacity(index.columns().len());
        for column in index.columns() {
            let pos = schema
                .column_index(column)
                .ok_or_else(|| TableError::ColumnNotFound(column.clone()))?;
            keyed.push(&row_values[pos]);
        }
        let mut key = encode_index_key(&keyed)?;
        if !index.is_unique() {
            key.push(KEY_SEPARATOR);
            key.extend_from_slice(&row_id.to_be_bytes());
        }
        Ok(key)
    }

    pub fn insert(&self, values: Vec<Value>) -> Result<u64, DBError> {
        let schema = self.schema.read();
        let mut state = self.state.write();
        self.check_open(&state)?;

        let row_id = state.next_row_id;
        let mut values = values;
        self.validate_values(&schema, &mut values, row_id)?;

        // Compute every key and probe unique indexes before touching any.
        let mut pending = Vec::new();
        for index in self.indexes.all() {
            let key = self.index_key(&schema, &index, &values, row_id)?;
            if index.is_unique() && index.contains(&key)? {
                return Err(if self.is_pk_index(&index) {
                    TableError::DuplicateRow(self.name.clone()).into()
                } else {
                    DBError::Index(IndexError::DuplicateKey)
                });
            }
            pending.push((index, key));
        }
        let row_id_bytes = row_id.to_be_bytes();
        for (applied, (index, key)) in pending.iter().enumerate() {
            if let Err(err) = index.insert(key, &row_id_bytes) {
                for (index, key) in &pending[..applied] {
                    let _ = index.delete(key);
                }
                return Err(err.into());
            }
        }

        state.rows.insert(
            row_id,
            Row {
                id: row_id,
                schema_version: schema.version,
                values,
            },
        );
        state.next_row_id += 1;
        Ok(row_id)
    }

    pub fn get(&self, row_id: u64) -> Result<Row, TableError> {
        let state = self.state.read();
        self.check_open(&state)?;
        state
            .rows
            .get(&row_id)
            .cloned()
            .ok_or(TableError::RowNotFound(row_id))
    }

    pub fn update(&self, row_id: u64, values: Vec<Value>) -> Result<(), DBError> {
        let schema = self.schema.read();
        let mut state = self.state.write();
        self.check_open(&state)?;

        let old = state
            .rows
            .get(&row_id)
            .ok_or(TableError::RowNotFound(row_id))?
            .clone();
        let mut values = values;
        self.validate_values(&schema, &mut values, row_id)?;

        // Keys that move; probe unique targets before mutating anything.
        let mut changes = Vec::new();
        for index in self.indexes.all() {
            let old_key = self.index_key(&schema, &index, &old.values, row_id)?;
            let new_key = self.index_key(&schema, &index, &values, row_id)?;
            if old_key == new_key {
                continue;
            }
            if index.is_unique() && index.contains(&new_key)? {
                return Err(if self.is_pk_index(&index) {
                    TableError::DuplicateRow(self.name.clone()).into()
                } else {
                    DBError::Index(IndexError::DuplicateKey)
                });
            }
            changes.push((index, old_key, new_key));
        }
        let row_id_bytes = row_id.to_be_bytes();
        for (applied, (index, old_key, new_key)) in changes.iter().enumerate() {
            let moved = index
                .delete(old_key)
                .and_then(|()| index.insert(new_key, &row_id_bytes));
            if let Err(err) = moved {
                for (index, old_key, new_key) in &changes[..applied] {
                    let _ = index.delete(new_key);
                    let _ = index.insert(old_key, &row_id_bytes);
                }
                return Err(err.into());
            }
        }

        state.rows.insert(
            row_id,
            Row {
                id: row_id,
                schema_version: schema.version,
                values,
            },
        );
        Ok(())
    }

    pub fn delete(&self, row_id: u64) -> Result<(), DBError> {
        let schema = self.schema.read();
        let mut state = self.state.write();
        self.check_open(&state)?;

        let row = state
            .rows
            .get(&row_id)
            .ok_or(TableError::RowNotFound(row_id))?
            .clone();
        for index in self.indexes.all() {
            let key = self.index_key(&schema, &index, &row.values, row_id)?;
            match index.delete(&key) {
                Ok(()) | Err(IndexError::KeyNotFound) => {}
                Err(err) => return Err(err.into()),
            }
        }
        state.rows.remove(&row_id);
        Ok(())
    }

    /// All rows matching `predicate`; `None` selects everything. Rows come
    /// back sorted by row id for deterministic iteration, but callers must
    /// not rely on any particular order.
    pub fn select<F>(&self, predicate: Option<F>) -> Result<Vec<Row>, TableError>
    where
        F: Fn(&Row) -> bool,
    {
        let state = self.state.read();
        self.check_open(&state)?;
        let mut rows: Vec<Row> = match &predicate {
            None => state.rows.values().cloned().collect(),
            Some(pred) => state.rows.values().filter(|r| pred(r)).cloned().collect(),
        };
        rows.sort_by_key(|r| r.id);
        Ok(rows)
    }

    pub fn iterate<F>(&self, mut visit: F) -> Result<(), TableError>
    where
        F: FnMut(&Row),
    {
        let state = self.state.read();
        self.check_open(&state)?;
        for row in state.rows.values() {
            visit(row);
        }
        Ok(())
    }

    /// Rows whose indexed columns equal `key_values`, via the named index.
    pub fn select_by_index(&self, index_name: &str, key_values: &[Value]) -> Result<Vec<Row>, DBError> {
        let state = self.state.read();
        self.check_open(&state)?;
        let index = self
            .indexes
            .get(index_name)
            .ok_or_else(|| IndexError::NotFound(index_name.to_owned()))?;

        let refs: Vec<&Value> = key_values.iter().collect();
        let column_key = encode_index_key(&refs)?;
        let row_ids: Vec<u64> = if index.is_unique() {
            match index.search(&column_key) {
                Ok(bytes) => vec![decode_row_id(&bytes)?],
                Err(IndexError::KeyNotFound) => Vec::new(),
                Err(err) => return Err(err.into()),
            }
        } else {
            let mut prefix = column_key;
            prefix.push(KEY_SEPARATOR);
            let upper = prefix_upper_bound(&prefix);
            index
                .range(Some(&prefix), upper.as_deref())?
                .into_iter()
                .map(|(_, value)| decode_row_id(&value))
                .collect::<Result<_, _>>()?
        };

        let mut rows = Vec::with_capacity(row_ids.len());
        for row_id in row_ids {
            if let Some(row) = state.rows.get(&row_id) {
                rows.push(row.clone());
            }
        }
        Ok(rows)
    }

    /// Create a secondary index and back-fill it from every live row.
    pub fn create_index(&self, name: &str, columns: Vec<String>, is_unique: bool) -> Result<(), DBError> {
        let schema = self.schema.read();
        let state = self.state.read();
        self.check_open(&state)?;
        for column in &columns {
            if !schema.has_column(column) {
                return Err(TableError::ColumnNotFound(column.clone()).into());
            }
        }

        let index = self.indexes.create_index(name, columns, is_unique)?;
        for row in state.rows.values() {
            let key = self.index_key(&schema, &index, &row.values, row.id)?;
            let unique_hit = index.is_unique() && index.contains(&key)?;
            let outcome = if unique_hit {
                Err(IndexError::DuplicateKey)
            } else {
                index.insert(&key, &row.id.to_be_bytes())
            };
            if let Err(err) = outcome {
                let _ = self.indexes.drop_index(name);
                return Err(err.into());
            }
        }
        log::debug!(
            "index `{name}` on `{}` back-filled with {} rows",
            self.name,
            state.rows.len()
        );
        Ok(())
    }

    pub fn drop_index(&self, name: &str) -> Result<(), DBError> {
        if name == format!("{PK_INDEX_PREFIX}{}", self.name) {
            return Err(DatabaseError::InvalidOperation(format!(
                "cannot drop the primary key index of table `{}`",
                self.name
            ))
            .into());
        }
        let state = self.state.read();
        self.check_open(&state)?;
        self.indexes.drop_index(name)?;
        Ok(())
    }

    /// Append a column, rewriting live rows with its default (or Null).
    pub fn add_column(&self, column: ColumnDef) -> Result<(), DBError> {
        let mut schema = self.schema.write();
        let mut state = self.state.write();
        self.check_open(&state)?;
        if schema.has_column(&column.col_name) {
            return Err(
                SchemaError::DuplicateColumn(self.name.clone(), column.col_name.clone()).into(),
            );
        }
        if column.is_primary_key() || column.is_auto_increment() {
            return Err(DatabaseError::InvalidOperation(
                "cannot add a primary key column to an existing table".into(),
            )
            .into());
        }
        if column.is_not_null() && column.default_value.is_none() && !state.rows.is_empty() {
            return Err(DatabaseError::InvalidOperation(format!(
                "column `{}` is NOT NULL and has no default to fill existing rows",
                column.col_name
            ))
            .into());
        }
        let fill = column.default_value.clone().unwrap_or(Value::Null);
        schema.columns.push(column);
        schema.version += 1;
        for row in state.rows.values_mut() {
            row.values.push(fill.clone());
            row.schema_version = schema.version;
        }
        Ok(())
    }

    /// Remove a column and its value from every live row.
    pub fn drop_column(&self, name: &str) -> Result<(), DBError> {
        let mut schema = self.schema.write();
        let mut state = self.state.write();
        self.check_open(&state)?;
        let pos = schema
            .column_index(name)
            .ok_or_else(|| TableError::ColumnNotFound(name.to_owned()))?;
        if schema.primary_key.iter().any(|c| c == name) {
            return Err(DatabaseError::InvalidOperation(format!(
                "cannot drop primary key column `{name}`"
            ))
            .into());
        }
        if self
            .indexes
            .all()
            .iter()
            .any(|idx| idx.columns().iter().any(|c| c == name))
        {
            return Err(DatabaseError::InvalidOperation(format!(
                "column `{name}` is covered by an index"
            ))
            .into());
        }
        schema.columns.remove(pos);
        schema.version += 1;
        for row in state.rows.values_mut() {
            row.values.remove(pos);
            row.schema_version = schema.version;
        }
        Ok(())
    }

    /// Drop every row and empty (but keep) the indexes. The row-id counter
    /// keeps running.
    pub fn truncate(&self) -> Result<(), DBError> {
        let mut state = self.state.write();
        self.check_open(&state)?;
        state.rows.clear();
        for index in self.indexes.all() {
            index.clear()?;
        }
        Ok(())
    }

    /// Re-insert a fully-formed row during recovery, re-deriving its index
    /// entries and advancing the row-id counter past it. Overwrites any
    /// existing row with the same id.
    pub(crate) fn restore(&self, row: Row) -> Result<(), DBError> {
        let schema = self.schema.read();
        let mut state = self.state.write();
        self.check_open(&state)?;

        if let Some(old) = state.rows.get(&row.id).cloned() {
            for index in self.indexes.all() {
                let key = self.index_key(&schema, &index, &old.values, old.id)?;
                match index.delete(&key) {
                    Ok(()) | Err(IndexError::KeyNotFound) => {}
                    Err(err) => return Err(err.into()),
                }
            }
        }
        for index in self.indexes.all() {
            let key = self.index_key(&schema, &index, &row.values, row.id)?;
            match index.insert(&key, &row.id.to_be_bytes()) {
                Ok(()) | Err(IndexError::DuplicateKey) => {}
                Err(err) => return Err(err.into()),
            }
        }
        state.next_row_id = state.next_row_id.max(row.id + 1);
        state.rows.insert(row.id, row);
        Ok(())
    }

    /// Destroy all rows and close every index. Further operations fail with
    /// `TableClosed`.
    pub fn close(&self) -> Result<(), TableError> {
        let mut state = self.state.write();
        self.check_open(&state)?;
        state.rows.clear();
        state.closed = true;
        self.indexes.close();
        Ok(())
    }
}

fn decode_row_id(bytes: &[u8]) -> Result<u64, DBError> {
    let arr: [u8; 8] = bytes.try_into().map_err(|_| {
        DBError::Decode(DecodeError::BufferLength {
            expected: 8,
            remaining: bytes.len(),
        })
    })?;
    Ok(u64::from_be_bytes(arr))
}

#[cfg(test)]
mod tests {
    use super::*;
    use flintdb_types::{Constraints, DataType};
    use pretty_assertions::assert_eq;

    fn users_schema() -> TableSchema {
        TableSchema::new("users").with_columns(vec![
            ColumnDef::new("id", DataType::Integer).with_constraints(Constraints::PRIMARY_KEY),
            ColumnDef::new("name", DataType::Text).with_constraints(Constraints::NOT_NULL),
            ColumnDef::new("age", DataType::Integer),
        ])
    }

    fn users_table() -> Table {
        let table = Table::create(users_schema()).unwrap();
        for (id, name, age) in [(1, "Alice", 30), (2, "Bob", 25), (3, "Charlie", 35)] {
            table
                .insert(vec![Value::from(id), Value::from(name), Value::from(age)])
                .unwrap();
        }
        table
    }

    fn age_of(row: &Row) -> i64 {
        match row.values[2] {
            Value::Integer(age) => age,
            _ => panic!("age must be an integer"),
        }
    }

    #[test]
    fn insert_select_and_count() {
        let table = users_table();
        assert_eq!(table.row_count().unwrap(), 3);

        let over_25 = table.select(Some(|row: &Row| age_of(row) > 25)).unwrap();
        let ids: Vec<u64> = over_25.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 3]);

        let all = table.select(None::<fn(&Row) -> bool>).unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn duplicate_primary_key_leaves_table_unchanged() {
        let table = users_table();
        let err = table
            .insert(vec![Value::from(1), Value::from("Eve"), Value::from(99)])
            .unwrap_err();
        assert!(matches!(
            err,
            DBError::Table(TableError::DuplicateRow(ref t)) if t == "users"
        ));
        assert_eq!(table.row_count().unwrap(), 3);
        // The row-id counter did not advance for the failed insert.
        let id = table
            .insert(vec![Value::from(4), Value::from("Dan"), Value::from(20)])
            .unwrap();
        assert_eq!(id, 4);
    }

    #[test]
    fn validation_errors() {
        let table = users_table();
        assert!(matches!(
            table.insert(vec![Value::from(9)]).unwrap_err(),
            DBError::Table(TableError::InvalidRowData(_))
        ));
        assert!(matches!(
            table
                .insert(vec![Value::from(9), Value::Null, Value::from(1)])
                .unwrap_err(),
            DBError::Table(TableError::NullValueNotAllowed(_))
        ));
        assert!(matches!(
            table
                .insert(vec![Value::from("x"), Value::from("y"), Value::from(1)])
                .unwrap_err(),
            DBError::Value(flintdb_types::ValueError::TypeMismatch { .. })
        ));
        assert_eq!(table.row_count().unwrap(), 3);
    }

    #[test]
    fn auto_increment_and_defaults_fill_nulls() {
        let schema = TableSchema::new("events").with_columns(vec![
            ColumnDef::new("id", DataType::Integer)
                .with_constraints(Constraints::PRIMARY_KEY | Constraints::AUTO_INC),
            ColumnDef::new("kind", DataType::Text)
                .with_constraints(Constraints::NOT_NULL)
                .with_default(Value::from("generic")),
        ]);
        let table = Table::create(schema).unwrap();
        let id = table.insert(vec![Value::Null, Value::Null]).unwrap();
        assert_eq!(id, 1);
        let row = table.get(1).unwrap();
        assert_eq!(row.values[0], Value::Integer(1));
        assert_eq!(row.values[1], Value::from("generic"));
    }

    #[test]
    fn update_moves_primary_key_entries() {
        let table = users_table();
        // Moving row 2 onto row 1's key must fail and change nothing.
        let err = table
            .update(2, vec![Value::from(1), Value::from("Bob"), Value::from(25)])
            .unwrap_err();
        assert!(matches!(err, DBError::Table(TableError::DuplicateRow(_))));
        assert_eq!(table.get(2).unwrap().values[0], Value::Integer(2));

        // A fresh key works and frees the old one.
        table
            .update(2, vec![Value::from(20), Value::from("Bob"), Value::from(25)])
            .unwrap();
        table
            .insert(vec![Value::from(2), Value::from("Newbie"), Value::from(1)])
            .unwrap();
        assert_eq!(table.row_count().unwrap(), 4);

        assert!(matches!(
            table.update(99, vec![]).unwrap_err(),
            DBError::Table(TableError::RowNotFound(99))
        ));
    }

    #[test]
    fn delete_frees_the_key() {
        let table = users_table();
        table.delete(2).unwrap();
        assert_eq!(table.row_count().unwrap(), 2);
        assert!(matches!(
            table.delete(2).unwrap_err(),
            DBError::Table(TableError::RowNotFound(2))
        ));
        table
            .insert(vec![Value::from(2), Value::from("Bob II"), Value::from(30)])
            .unwrap();
    }

    #[test]
    fn secondary_index_lookup() {
        let table = users_table();
        table
            .insert(vec![Value::from(4), Value::from("Dora"), Value::from(25)])
            .unwrap();
        table
            .create_index("idx_age", vec!["age".into()], false)
            .unwrap();

        // Non-unique: two rows share age 25.
        let rows = table.select_by_index("idx_age", &[Value::from(25)]).unwrap();
        let ids: Vec<u64> = rows.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![2, 4]);

        // Maintained by later mutations.
        table
            .insert(vec![Value::from(5), Value::from("Eli"), Value::from(25)])
            .unwrap();
        assert_eq!(
            table
                .select_by_index("idx_age", &[Value::from(25)])
                .unwrap()
                .len(),
            3
        );
        table.delete(2).unwrap();
        assert_eq!(
            table
                .select_by_index("idx_age", &[Value::from(25)])
                .unwrap()
                .len(),
            2
        );

        // Unique lookup goes through the PK index.
        let rows = table.select_by_index("pk_users", &[Value::from(3)]).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].values[1], Value::from("Charlie"));
        assert!(
            table
                .select_by_index("pk_users", &[Value::from(99)])
                .unwrap()
                .is_empty()
        );

        assert!(matches!(
            table.select_by_index("missing", &[Value::from(1)]).unwrap_err(),
            DBError::Index(IndexError::NotFound(_))
        ));
    }

    #[test]
    fn unique_backfill_rejects_duplicates() {
        let table = users_table();
        table
            .insert(vec![Value::from(4), Value::from("Twin"), Value::from(25)])
            .unwrap();
        // Ages 25 appear twice; a unique index over age cannot be built.
        let err = table
            .create_index("uniq_age", vec!["age".into()], true)
            .unwrap_err();
        assert!(matches!(err, DBError::Index(IndexError::DuplicateKey)));
        assert!(!table.index_names().contains(&"uniq_age".to_string()));
    }

    #[test]
    fn create_index_rejects_unknown_column() {
        let table = users_table();
        assert!(matches!(
            table
                .create_index("idx_ghost", vec!["ghost".into()], false)
                .unwrap_err(),
            DBError::Table(TableError::ColumnNotFound(_))
        ));
    }

    #[test]
    fn pk_index_cannot_be_dropped() {
        let table = users_table();
        assert!(matches!(
            table.drop_index("pk_users").unwrap_err(),
            DBError::Database(DatabaseError::InvalidOperation(_))
        ));
        table.create_index("idx_age", vec!["age".into()], false).unwrap();
        table.drop_index("idx_age").unwrap();
    }

    #[test]
    fn truncate_keeps_counter_running() {
        let table = users_table();
        table.truncate().unwrap();
        assert_eq!(table.row_count().unwrap(), 0);
        let id = table
            .insert(vec![Value::from(1), Value::from("Alice"), Value::from(30)])
            .unwrap();
        assert_eq!(id, 4);
    }

    #[test]
    fn alter_table_rewrites_rows() {
        let table = users_table();
        table
            .add_column(ColumnDef::new("email", DataType::Text).with_default(Value::from("n/a")))
            .unwrap();
        let row = table.get(1).unwrap();
        assert_eq!(row.values.len(), 4);
        assert_eq!(row.values[3], Value::from("n/a"));
        assert_eq!(row.schema_version, 2);

        table.drop_column("age").unwrap();
        let row = table.get(1).unwrap();
        assert_eq!(row.values.len(), 3);
        assert_eq!(row.schema_version, 3);

        assert!(matches!(
            table.drop_column("id").unwrap_err(),
            DBError::Database(DatabaseError::InvalidOperation(_))
        ));
        assert!(matches!(
            table
                .add_column(ColumnDef::new("strict", DataType::Text).with_constraints(Constraints::NOT_NULL))
                .unwrap_err(),
            DBError::Database(DatabaseError::InvalidOperation(_))
        ));
    }

    #[test]
    fn row_codec_roundtrip_and_truncation() {
        let table = users_table();
        let schema = table.schema();
        let row = table.get(1).unwrap();
        let bytes = row.to_bytes().unwrap();
        assert_eq!(Row::decode(&bytes, &schema).unwrap(), row);

        assert!(matches!(
            Row::decode(&bytes[..bytes.len() - 2], &schema),
            Err(DBError::Decode(DecodeError::BufferLength { .. }))
                | Err(DBError::Value(flintdb_types::ValueError::Decode(_)))
        ));
    }

    #[test]
    fn closed_table_rejects_everything() {
        let table = users_table();
        table.close().unwrap();
        assert!(matches!(
            table.row_count().unwrap_err(),
            TableError::Closed(ref t) if t == "users"
        ));
        assert!(matches!(
            table.insert(vec![]).unwrap_err(),
            DBError::Table(TableError::Closed(_))
        ));
        assert!(matches!(table.get(1).unwrap_err(), TableError::Closed(_)));
        assert!(matches!(
            table.truncate().unwrap_err(),
            DBError::Table(TableError::Closed(_))
        ));
    }

    #[test]
    fn prefix_upper_bound_handles_max_bytes() {
        assert_eq!(prefix_upper_bound(&[1, 2, 3]), Some(vec![1, 2, 4]));
        assert_eq!(prefix_upper_bound(&[1, 0xFF]), Some(vec![2]));
        assert_eq!(prefix_upper_bound(&[0xFF, 0xFF]), None);
    }
}
