//! On-disk catalog: `header.dat` plus one `<table>.schema` file per table.
//!
//! The header carries a format version, creation/modification stamps and a
//! blake3 hash over the canonical encoding of every schema (sorted by table
//! name), which `load` re-verifies. Only schemas are persisted here; row
//! durability belongs to the write-ahead log.

use crate::error::{DBError, DatabaseError};
use flintdb_types::TableSchema;
use flintdb_types::buffer::{BufReader, BufWriter};
use std::fs;
use std::io;
use std::path::Path;

pub(crate) const HEADER_FILE: &str = "header.dat";
pub(crate) const SCHEMA_EXT: &str = "schema";
const FORMAT_VERSION: u32 = 1;

pub(crate) struct CatalogHeader {
    pub created_at: u64,
    pub modified_at: u64,
}

/// Write the header and every schema file, removing schema files of tables
/// that no longer exist.
pub(crate) fn save(
    path: &Path,
    schemas: &mut [TableSchema],
    header: &CatalogHeader,
) -> Result<(), DBError> {
    schemas.sort_by(|a, b| a.table_name.cmp(&b.table_name));

    let mut header_bytes = Vec::new();
    header_bytes.put_u32(FORMAT_VERSION);
    header_bytes.put_u64(header.created_at);
    header_bytes.put_u64(header.modified_at);
    let hash = schema_hash(schemas);
    header_bytes.put_u32(hash.len() as u32);
    header_bytes.put_slice(&hash);
    fs::write(path.join(HEADER_FILE), header_bytes)?;

    for schema in schemas.iter() {
        let file = path.join(format!("{}.{SCHEMA_EXT}", schema.table_name));
        fs::write(file, schema.to_bytes())?;
    }

    // Drop schema files for tables that were since removed.
    for entry in fs::read_dir(path)? {
        let entry_path = entry?.path();
        if entry_path.extension().is_none_or(|ext| ext != SCHEMA_EXT) {
            continue;
        }
        let stem = entry_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        if !schemas.iter().any(|s| s.table_name == stem) {
            fs::remove_file(&entry_path)?;
        }
    }

    log::debug!("saved catalog with {} tables at {}", schemas.len(), path.display());
    Ok(())
}

/// Read the header and every schema file back.
pub(crate) fn load(path: &Path) -> Result<(Vec<TableSchema>, CatalogHeader), DBError> {
    let header_bytes = fs::read(path.join(HEADER_FILE)).map_err(|err| {
        if err.kind() == io::ErrorKind::NotFound {
            DBError::Database(DatabaseError::NotFound(path.to_owned()))
        } else {
            err.into()
        }
    })?;
    let mut reader = header_bytes.as_slice();
    let version = reader.get_u32()?;
    if version != FORMAT_VERSION {
        return Err(DatabaseError::InvalidOperation(format!(
            "unsupported catalog format version {version}"
        ))
        .into());
    }
    let created_at = reader.get_u64()?;
    let modified_at = reader.get_u64()?;
    let hash_len = reader.get_u32()? as usize;
    let stored_hash = reader.get_slice(hash_len)?.to_vec();

    let mut schemas = Vec::new();
    for entry in fs::read_dir(path)? {
        let entry_path = entry?.path();
        if entry_path.extension().is_none_or(|ext| ext != SCHEMA_EXT) {
            continue;
        }
        let bytes = fs::read(&entry_path)?;
        let mut reader = bytes.as_slice();
        schemas.push(TableSchema::decode(&mut reader)?);
    }
    schemas.sort_by(|a, b| a.table_name.cmp(&b.table_name));

    if schema_hash(&schemas) != stored_hash.as_slice() {
        return Err(DatabaseError::InvalidOperation(
            "catalog schema hash does not match the stored schemas".into(),
        )
        .into());
    }

    log::debug!("loaded catalog with {} tables from {}", schemas.len(), path.display());
    Ok((
        schemas,
        CatalogHeader {
            created_at,
            modified_at,
        },
    ))
}

/// blake3 over the canonical encoding of the schemas, sorted by table name.
fn schema_hash(schemas: &[TableSchema]) -> [u8; 32] {
    let mut hasher = blake3::Hasher::new();
    for schema in schemas {
        hasher.update(&schema.to_bytes());
    }
    *hasher.finalize().as_bytes()
}
