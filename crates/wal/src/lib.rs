//! Append-only write-ahead log.
//!
//! On disk the log is a concatenation of `[u32 big-endian length][entry
//! bytes]` frames. Writes assign monotonically increasing LSNs starting at 1,
//! fsync each record, and rotate the file away once the configured size limit
//! would be exceeded; rotation renames the file to `<path>.<YYYYMMDDhhmmss>`
//! and restarts LSNs at 1, bumping [`Wal::epoch`] so callers that need a
//! cross-file order can use `(epoch, lsn)`.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use parking_lot::RwLock;

mod entry;
mod error;

pub use entry::{LogEntry, OpCode};
pub use error::WalError;

const FRAME_HEADER_SIZE: u64 = 4;

/// Options for opening a [`Wal`], similar to [`fs::OpenOptions`].
#[derive(Clone, Copy, Debug)]
pub struct OpenOptions {
    max_file_size: u64,
}

impl OpenOptions {
    /// Set the maximum size in bytes of the log file before rotation.
    ///
    /// Default: 64MiB
    pub fn max_file_size(&mut self, size: u64) -> &mut Self {
        self.max_file_size = size;
        self
    }

    /// Open the log at `path` with the options in self, scanning any
    /// existing records to recover the size and LSN counters.
    pub fn open(&self, path: impl AsRef<Path>) -> Result<Wal, WalError> {
        let path = path.as_ref().to_owned();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = fs::OpenOptions::new()
            .append(true)
            .create(true)
            .read(true)
            .open(&path)?;
        let size = file.metadata()?.len();

        let entries = read_entries(&path, self.max_file_size)?;
        let lsn = entries.last().map(|e| e.lsn).unwrap_or(0);
        log::debug!(
            "opened wal at {} (size {size}, lsn {lsn}, {} entries)",
            path.display(),
            entries.len()
        );

        Ok(Wal {
            path,
            max_file_size: self.max_file_size,
            inner: RwLock::new(WalInner {
                file: BufWriter::new(file),
                size,
                lsn,
                epoch: 0,
                closed: false,
            }),
        })
    }
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            max_file_size: 64 * 1024 * 1024,
        }
    }
}

struct WalInner {
    file: BufWriter<File>,
    size: u64,
    lsn: u64,
    epoch: u64,
    closed: bool,
}

/// The write-ahead log handle. Owns the file exclusively; all methods take
/// `&self` and serialize through an internal read-write lock.
pub struct Wal {
    path: PathBuf,
    max_file_size: u64,
    inner: RwLock<WalInner>,
}

impl Wal {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, WalError> {
        OpenOptions::default().open(path)
    }

    pub fn options() -> OpenOptions {
        OpenOptions::default()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn max_file_size(&self) -> u64 {
        self.max_file_size
    }

    /// Append one entry. Assigns the entry's LSN and timestamp, rotates the
    /// file first if the frame would push it past the size limit, then
    /// writes and fsyncs. Returns the assigned LSN.
    pub fn write(&self, entry: &mut LogEntry) -> Result<u64, WalError> {
        let mut inner = self.inner.write();
        if inner.closed {
            return Err(WalError::Closed);
        }

        entry.lsn = inner.lsn + 1;
        entry.timestamp = Utc::now().timestamp();
        let mut payload = entry.to_bytes();
        let frame = FRAME_HEADER_SIZE + payload.len() as u64;
        if frame > self.max_file_size {
            return Err(WalError::Full {
                size: frame,
                max: self.max_file_size,
            });
        }
        if inner.size + frame > self.max_file_size {
            self.rotate(&mut inner)?;
            // LSNs restart per file; re-encode with the fresh counter.
            entry.lsn = 1;
            payload = entry.to_bytes();
        }

        inner.file.write_all(&(payload.len() as u32).to_be_bytes())?;
        inner.file.write_all(&payload)?;
        inner.file.flush()?;
        inner.file.get_ref().sync_all()?;

        inner.size += frame;
        inner.lsn = entry.lsn;
        Ok(entry.lsn)
    }

    fn rotate(&self, inner: &mut WalInner) -> Result<(), WalError> {
        inner.file.flush()?;
        inner.file.get_ref().sync_all()?;

        let suffix = Utc::now().format("%Y%m%d%H%M%S");
        let mut rotated = PathBuf::from(format!("{}.{}", self.path.display(), suffix));
        if rotated.exists() {
            // Two rotations within one second; disambiguate.
            rotated = PathBuf::from(format!("{}.{}", rotated.display(), inner.epoch));
        }
        fs::rename(&self.path, &rotated)?;

        let file = fs::OpenOptions::new()
            .append(true)
            .create_new(true)
            .read(true)
            .open(&self.path)?;
        inner.file = BufWriter::new(file);
        inner.size = 0;
        inner.lsn = 0;
        inner.epoch += 1;
        log::debug!("rotated wal to {}", rotated.display());
        Ok(())
    }

    /// Scan the log from the start and return every entry in write order.
    pub fn read(&self) -> Result<Vec<LogEntry>, WalError> {
        let inner = self.inner.read();
        if inner.closed {
            return Err(WalError::Closed);
        }
        read_entries(&self.path, self.max_file_size)
    }

    /// Rewrite the log keeping only entries with `lsn >= min_lsn`. The LSN
    /// counter keeps its high-water mark so later writes stay monotonic.
    pub fn truncate(&self, min_lsn: u64) -> Result<(), WalError> {
        let mut inner = self.inner.write();
        if inner.closed {
            return Err(WalError::Closed);
        }
        inner.file.flush()?;

        let retained: Vec<LogEntry> = read_entries(&self.path, self.max_file_size)?
            .into_iter()
            .filter(|e| e.lsn >= min_lsn)
            .collect();

        let file = File::create(&self.path)?;
        let mut writer = BufWriter::new(file);
        let mut size = 0u64;
        for entry in &retained {
            let payload = entry.to_bytes();
            writer.write_all(&(payload.len() as u32).to_be_bytes())?;
            writer.write_all(&payload)?;
            size += FRAME_HEADER_SIZE + payload.len() as u64;
        }
        writer.flush()?;
        writer.get_ref().sync_all()?;

        log::debug!(
            "truncated wal at {} to {} entries below lsn {min_lsn}",
            self.path.display(),
            retained.len()
        );
        inner.file = writer;
        inner.size = size;
        Ok(())
    }

    pub fn current_lsn(&self) -> Result<u64, WalError> {
        let inner = self.inner.read();
        if inner.closed {
            return Err(WalError::Closed);
        }
        Ok(inner.lsn)
    }

    /// Rotation count since this handle was opened.
    pub fn epoch(&self) -> Result<u64, WalError> {
        let inner = self.inner.read();
        if inner.closed {
            return Err(WalError::Closed);
        }
        Ok(inner.epoch)
    }

    pub fn size(&self) -> Result<u64, WalError> {
        let inner = self.inner.read();
        if inner.closed {
            return Err(WalError::Closed);
        }
        Ok(inner.size)
    }

    pub fn close(&self) -> Result<(), WalError> {
        let mut inner = self.inner.write();
        if inner.closed {
            return Err(WalError::Closed);
        }
        inner.file.flush()?;
        inner.file.get_ref().sync_all()?;
        inner.closed = true;
        Ok(())
    }
}

fn read_entries(path: &Path, max_file_size: u64) -> Result<Vec<LogEntry>, WalError> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut entries = Vec::new();
    loop {
        let mut header = [0u8; FRAME_HEADER_SIZE as usize];
        match read_or_eof(&mut reader, &mut header)? {
            ReadOutcome::Eof => return Ok(entries),
            ReadOutcome::Partial(read) => {
                return Err(WalError::Corrupted(format!(
                    "truncated frame header ({read} of {FRAME_HEADER_SIZE} bytes)"
                )));
            }
            ReadOutcome::Full => {}
        }
        let len = u32::from_be_bytes(header) as u64;
        if len + FRAME_HEADER_SIZE > max_file_size {
            return Err(WalError::Corrupted(format!(
                "frame of {len} bytes exceeds the {max_file_size} byte file limit"
            )));
        }
        let mut payload = vec![0u8; len as usize];
        match read_or_eof(&mut reader, &mut payload)? {
            ReadOutcome::Full => {}
            ReadOutcome::Eof | ReadOutcome::Partial(_) => {
                return Err(WalError::Corrupted(format!(
                    "frame declares {len} bytes past the end of the file"
                )));
            }
        }
        entries.push(LogEntry::decode(&payload)?);
    }
}

enum ReadOutcome {
    Full,
    Eof,
    Partial(usize),
}

fn read_or_eof(reader: &mut impl Read, buf: &mut [u8]) -> Result<ReadOutcome, WalError> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..])? {
            0 if filled == 0 => return Ok(ReadOutcome::Eof),
            0 => return Ok(ReadOutcome::Partial(filled)),
            n => filled += n,
        }
    }
    Ok(ReadOutcome::Full)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn begin(tx: u64) -> LogEntry {
        LogEntry::new(tx, OpCode::Begin, "users")
    }

    #[test]
    fn write_then_read_preserves_order_and_lsns() {
        let tmp = TempDir::with_prefix("wal_test").unwrap();
        let wal = Wal::open(tmp.path().join("wal.log")).unwrap();

        for tx in 1..=5u64 {
            let lsn = wal.write(&mut begin(tx)).unwrap();
            assert_eq!(lsn, tx);
        }

        let entries = wal.read().unwrap();
        assert_eq!(entries.len(), 5);
        for (i, entry) in entries.iter().enumerate() {
            assert_eq!(entry.lsn, i as u64 + 1);
            assert_eq!(entry.tx_id, i as u64 + 1);
        }
        assert_eq!(wal.current_lsn().unwrap(), 5);
    }

    #[test]
    fn commit_envelope_roundtrip() {
        let tmp = TempDir::with_prefix("wal_test").unwrap();
        let path = tmp.path().join("wal.log");
        let wal = Wal::options().max_file_size(1024 * 1024).open(&path).unwrap();

        wal.write(&mut LogEntry::new(1, OpCode::Begin, "users")).unwrap();
        wal.write(
            &mut LogEntry::new(1, OpCode::Insert, "users")
                .with_row(100)
                .with_after_image(b"test data".to_vec()),
        )
        .unwrap();
        wal.write(&mut LogEntry::new(1, OpCode::Commit, "users")).unwrap();

        let entries = wal.read().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(
            entries.iter().map(|e| e.lsn).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(entries[1].op, OpCode::Insert);
        assert_eq!(entries[1].row_id, 100);
        assert_eq!(entries[1].after_image, b"test data");
    }

    #[test]
    fn reopen_recovers_counters() {
        let tmp = TempDir::with_prefix("wal_test").unwrap();
        let path = tmp.path().join("wal.log");
        {
            let wal = Wal::open(&path).unwrap();
            wal.write(&mut begin(1)).unwrap();
            wal.write(&mut begin(2)).unwrap();
        }
        let wal = Wal::open(&path).unwrap();
        assert_eq!(wal.current_lsn().unwrap(), 2);
        assert_eq!(wal.write(&mut begin(3)).unwrap(), 3);
    }

    #[test]
    fn truncated_frame_is_corruption() {
        let tmp = TempDir::with_prefix("wal_test").unwrap();
        let path = tmp.path().join("wal.log");
        let wal = Wal::open(&path).unwrap();
        wal.write(&mut begin(1)).unwrap();

        // A frame header that promises more bytes than the file holds.
        let mut file = fs::OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(&1000u32.to_be_bytes()).unwrap();
        file.write_all(&[1, 2, 3]).unwrap();
        file.sync_all().unwrap();

        assert!(matches!(wal.read(), Err(WalError::Corrupted(_))));
    }

    #[test]
    fn rotation_restarts_lsn_and_bumps_epoch() {
        let tmp = TempDir::with_prefix("wal_test").unwrap();
        let path = tmp.path().join("wal.log");
        let frame = FRAME_HEADER_SIZE + begin(1).to_bytes().len() as u64;
        // Room for exactly two frames per file.
        let wal = Wal::options().max_file_size(2 * frame).open(&path).unwrap();

        assert_eq!(wal.write(&mut begin(1)).unwrap(), 1);
        assert_eq!(wal.write(&mut begin(2)).unwrap(), 2);
        // Third entry triggers a rotation and lands at lsn 1 of the new file.
        assert_eq!(wal.write(&mut begin(3)).unwrap(), 1);
        assert_eq!(wal.epoch().unwrap(), 1);

        let rotated: Vec<_> = fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .filter(|name| name.starts_with("wal.log."))
            .collect();
        assert_eq!(rotated.len(), 1);

        let entries = wal.read().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].tx_id, 3);
    }

    #[test]
    fn oversized_entry_is_rejected_up_front() {
        let tmp = TempDir::with_prefix("wal_test").unwrap();
        let wal = Wal::options().max_file_size(32).open(tmp.path().join("wal.log")).unwrap();
        let mut entry = begin(1).with_after_image(vec![0u8; 128]);
        assert!(matches!(wal.write(&mut entry), Err(WalError::Full { .. })));
        // Nothing was written.
        assert_eq!(wal.read().unwrap().len(), 0);
    }

    #[test]
    fn truncate_drops_entries_below_min_lsn() {
        let tmp = TempDir::with_prefix("wal_test").unwrap();
        let wal = Wal::open(tmp.path().join("wal.log")).unwrap();
        for tx in 1..=5u64 {
            wal.write(&mut begin(tx)).unwrap();
        }

        wal.truncate(3).unwrap();
        let entries = wal.read().unwrap();
        assert_eq!(
            entries.iter().map(|e| e.lsn).collect::<Vec<_>>(),
            vec![3, 4, 5]
        );

        // The counter keeps its high-water mark.
        assert_eq!(wal.current_lsn().unwrap(), 5);
        assert_eq!(wal.write(&mut begin(6)).unwrap(), 6);
    }

    #[test]
    fn operations_after_close_fail() {
        let tmp = TempDir::with_prefix("wal_test").unwrap();
        let wal = Wal::open(tmp.path().join("wal.log")).unwrap();
        wal.write(&mut begin(1)).unwrap();
        wal.close().unwrap();

        assert!(matches!(wal.write(&mut begin(2)), Err(WalError::Closed)));
        assert!(matches!(wal.read(), Err(WalError::Closed)));
        assert!(matches!(wal.truncate(1), Err(WalError::Closed)));
        assert!(matches!(wal.current_lsn(), Err(WalError::Closed)));
        assert!(matches!(wal.close(), Err(WalError::Closed)));
    }
}
