//! # Sorted Index Engine
//!
//! `SortedIndex` owns both phases of the batch lifecycle: an in-memory
//! packed record buffer while building, and a read-only mapping of the
//! written file while serving. `build_index` is the one-way transition
//! between them; it releases the buffer and auto-opens the reader on the
//! same path.

use std::cmp::Ordering;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use eyre::{ensure, eyre, Result, WrapErr};
use memmap2::Mmap;
use zerocopy::little_endian::U64;
use zerocopy::{FromBytes, Immutable, IntoBytes};

use crate::config::SORTED_HEADER_SIZE;
use crate::record::RecordLayout;

struct Reader {
    mmap: Mmap,
    record_count: u64,
}

/// A build-once, read-only sorted index over fixed-width records.
pub struct SortedIndex {
    layout: RecordLayout,
    buffer: Vec<u8>,
    reader: Option<Reader>,
}

impl std::fmt::Debug for SortedIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SortedIndex")
            .field("layout", &self.layout)
            .field("buffered", &(self.buffer.len() / self.layout.record_size()))
            .field("record_count", &self.record_count())
            .finish()
    }
}

impl SortedIndex {
    pub fn new(layout: RecordLayout) -> Self {
        Self {
            layout,
            buffer: Vec::new(),
            reader: None,
        }
    }

    /// Appends a record to the in-memory buffer. No deduplication and no
    /// sorting happens here; duplicate keys resolve arbitrarily at build
    /// time. The key is truncated to the logical key width; the value
    /// must be exactly the configured value width.
    pub fn add_record(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        ensure!(
            value.len() == self.layout.value_size(),
            "value of {} bytes does not match configured value size {}",
            value.len(),
            self.layout.value_size()
        );

        let padded = self.layout.pad_key(key);
        self.buffer.reserve(self.layout.record_size());
        self.buffer.extend_from_slice(&padded);
        self.buffer.extend_from_slice(value);
        Ok(())
    }

    /// Buffers a plain-old-data value, zero-padded to the value width.
    pub fn add_value<T: IntoBytes + Immutable>(&mut self, key: &[u8], value: &T) -> Result<()> {
        let padded = self.layout.pad_value(value.as_bytes())?;
        self.add_record(key, &padded)
    }

    /// Sorts the buffered records and writes them to `path`, then releases
    /// the buffer and opens the written file for reading.
    ///
    /// Fails when the buffer is empty or on any I/O error; a partially
    /// written file is left on disk for the caller to dispose of.
    pub fn build_index<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();

        ensure!(!self.buffer.is_empty(), "cannot build an empty index");

        let record_size = self.layout.record_size();
        let mut records: Vec<&[u8]> = self.buffer.chunks_exact(record_size).collect();
        // Records begin with the padded key, so whole-record ordering is
        // key ordering for unique keys.
        records.sort_unstable();

        let file = File::create(path)
            .wrap_err_with(|| format!("failed to create index file '{}'", path.display()))?;
        let mut writer = BufWriter::new(file);

        let count = U64::new(records.len() as u64);
        writer
            .write_all(count.as_bytes())
            .wrap_err("failed to write index header")?;
        for record in &records {
            writer.write_all(record).wrap_err("failed to write record")?;
        }

        writer.flush().wrap_err("failed to flush index file")?;
        writer
            .get_ref()
            .sync_all()
            .wrap_err("failed to sync index file")?;

        // Release the build buffer; the engine is a reader from here on.
        self.buffer = Vec::new();

        self.open_index(path)
    }

    /// Opens an existing sorted index file for lookups, replacing any
    /// mapping already held. The file length must match its header.
    pub fn open_index<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        self.close_index();

        let file = File::open(path)
            .wrap_err_with(|| format!("failed to open index file '{}'", path.display()))?;

        // SAFETY: Mmap::map is unsafe because the underlying file could be
        // modified externally. This is safe because:
        // 1. A built index file is read-only by contract; the caller
        //    guarantees no concurrent writer
        // 2. The mapping is immutable, so this process never writes it
        // 3. Record offsets are validated against the mapped length below
        let mmap = unsafe {
            Mmap::map(&file)
                .wrap_err_with(|| format!("failed to memory-map '{}'", path.display()))?
        };

        ensure!(
            mmap.len() >= SORTED_HEADER_SIZE,
            "index file '{}' is shorter than its header",
            path.display()
        );

        let record_count = U64::ref_from_bytes(&mmap[..SORTED_HEADER_SIZE])
            .map_err(|e| eyre!("failed to read index header: {:?}", e))?
            .get();

        let expected = SORTED_HEADER_SIZE as u64 + record_count * self.layout.record_size() as u64;
        ensure!(
            mmap.len() as u64 == expected,
            "index file '{}' holds {} bytes but its header implies {}",
            path.display(),
            mmap.len(),
            expected
        );

        self.reader = Some(Reader { mmap, record_count });
        Ok(())
    }

    /// Drops the mapping and resets the record count to zero.
    pub fn close_index(&mut self) {
        self.reader = None;
    }

    /// Binary search for a key; returns its value bytes, borrowed from
    /// the mapped file. `None` when absent or when no file is open.
    pub fn lookup(&self, key: &[u8]) -> Option<&[u8]> {
        let reader = self.reader.as_ref()?;

        let key_size = self.layout.key_size();
        let record_size = self.layout.record_size();
        let padded = self.layout.pad_key(key);

        let mut left = 0u64;
        let mut right = reader.record_count;

        while left < right {
            let mid = left + (right - left) / 2;
            let offset = SORTED_HEADER_SIZE + mid as usize * record_size;
            let record = &reader.mmap[offset..offset + record_size];

            match padded.as_slice().cmp(&record[..key_size]) {
                Ordering::Equal => return Some(&record[key_size..]),
                Ordering::Less => right = mid,
                Ordering::Greater => left = mid + 1,
            }
        }

        None
    }

    /// Typed counterpart of [`lookup`](Self::lookup).
    pub fn lookup_value<T: FromBytes>(&self, key: &[u8]) -> Result<Option<T>> {
        let size = std::mem::size_of::<T>();
        ensure!(
            size <= self.layout.value_size(),
            "type of {} bytes exceeds configured value size {}",
            size,
            self.layout.value_size()
        );

        match self.lookup(key) {
            Some(bytes) => T::read_from_bytes(&bytes[..size])
                .map(Some)
                .map_err(|e| eyre!("failed to decode stored value: {:?}", e)),
            None => Ok(None),
        }
    }

    pub fn contains_record(&self, key: &[u8]) -> bool {
        self.lookup(key).is_some()
    }

    /// Records in the currently open file; zero when closed.
    pub fn record_count(&self) -> u64 {
        self.reader.as_ref().map_or(0, |r| r.record_count)
    }

    pub fn is_open(&self) -> bool {
        self.reader.is_some()
    }

    pub fn layout(&self) -> &RecordLayout {
        &self.layout
    }
}
