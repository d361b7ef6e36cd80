//! Thread-safe chunked reader over a flat file of doubles.
//!
//! The file is a headerless run of 8-byte little-endian IEEE-754 values.
//! Any trailing bytes shorter than one record are ignored.
//!
//! Many workers share one [`FileReader`]. Each [`FileReader::read_block`]
//! claims the next range of records and reads it while holding the same
//! lock, so two callers never see overlapping ranges and a full pass
//! delivers every record exactly once.

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{Error, Result};

/// Size of one record in bytes.
pub const RECORD_SIZE: usize = std::mem::size_of::<f64>();

/// Status of a [`DataBlock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStatus {
    Ok,
    Eof,
    Error,
}

/// One read's worth of records. Ownership moves to the caller.
#[derive(Debug)]
pub enum DataBlock {
    /// Between 1 and the requested number of values.
    Ok(Vec<f64>),
    /// The cursor is exhausted.
    Eof,
    /// The physical read failed.
    Error(io::Error),
}

impl DataBlock {
    pub fn status(&self) -> BlockStatus {
        match self {
            Self::Ok(_) => BlockStatus::Ok,
            Self::Eof => BlockStatus::Eof,
            Self::Error(_) => BlockStatus::Error,
        }
    }

    /// Number of values carried.
    pub fn count(&self) -> usize {
        match self {
            Self::Ok(values) => values.len(),
            _ => 0,
        }
    }

    pub fn values(&self) -> &[f64] {
        match self {
            Self::Ok(values) => values,
            _ => &[],
        }
    }
}

struct ReaderState {
    file: BufReader<File>,
    /// Index of the next record to hand out.
    cursor: u64,
    /// Reused byte buffer for the physical read.
    scratch: Vec<u8>,
}

/// Sequential fixed-record reader shared by a pass's workers.
pub struct FileReader {
    path: PathBuf,
    records: u64,
    trailing_bytes: u64,
    state: Mutex<ReaderState>,
}

impl FileReader {
    /// Open `path` and measure how many whole records it holds.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let open_err = |source| Error::Open {
            path: path.clone(),
            source,
        };
        let file = File::open(&path).map_err(open_err)?;
        let meta = file.metadata().map_err(open_err)?;
        if !meta.is_file() {
            return Err(open_err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "not a regular file",
            )));
        }

        let len = meta.len();
        let records = len / RECORD_SIZE as u64;
        let trailing_bytes = len % RECORD_SIZE as u64;
        if trailing_bytes > 0 {
            log::warn!(
                "{}: ignoring {trailing_bytes} trailing byte(s) after {records} records",
                path.display()
            );
        }
        log::debug!("opened {} ({records} records)", path.display());

        Ok(Self {
            path,
            records,
            trailing_bytes,
            state: Mutex::new(ReaderState {
                file: BufReader::new(file),
                cursor: 0,
                scratch: Vec::new(),
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whole records in the file.
    pub fn record_count(&self) -> u64 {
        self.records
    }

    /// Bytes after the last whole record.
    pub fn trailing_bytes(&self) -> u64 {
        self.trailing_bytes
    }

    /// Rewind to the first record.
    ///
    /// Only call this between passes: a worker mid-pass would start
    /// receiving records it has already seen.
    pub fn seek_to_start(&self) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.file.seek(SeekFrom::Start(0))?;
        state.cursor = 0;
        Ok(())
    }

    /// Claim and read up to `n` records.
    ///
    /// Returns fewer than `n` values at the end of the file, [`DataBlock::Eof`]
    /// once the cursor is exhausted and [`DataBlock::Error`] on I/O failure.
    /// Asking for zero records yields `Eof`.
    pub fn read_block(&self, n: usize) -> DataBlock {
        let mut state = self.state.lock().unwrap();
        let remaining = self.records.saturating_sub(state.cursor);
        if remaining == 0 || n == 0 {
            return DataBlock::Eof;
        }
        let take = remaining.min(n as u64) as usize;

        let ReaderState { file, scratch, .. } = &mut *state;
        scratch.resize(take * RECORD_SIZE, 0);
        if let Err(e) = file.read_exact(scratch) {
            log::error!("{}: read of {take} records failed: {e}", self.path.display());
            return DataBlock::Error(e);
        }
        let values = scratch
            .chunks_exact(RECORD_SIZE)
            .map(|chunk| {
                let mut raw = [0u8; RECORD_SIZE];
                raw.copy_from_slice(chunk);
                f64::from_le_bytes(raw)
            })
            .collect();
        state.cursor += take as u64;
        DataBlock::Ok(values)
    }
}

/// Write `values` in the reader's on-disk format. Mostly useful for tests
/// and fixtures.
pub fn write_records<W: io::Write>(mut out: W, values: &[f64]) -> io::Result<()> {
    for v in values {
        out.write_all(&v.to_le_bytes())?;
    }
    out.flush()
}
