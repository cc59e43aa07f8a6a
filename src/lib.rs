//! # keydex - Embedded Fixed-Width Key Indices
//!
//! keydex provides a pair of embedded, single-writer, file-backed ordered
//! key/value indices for datasets too large to hold in memory. Both map a
//! fixed-width byte key to a fixed-width byte payload; they optimize
//! opposite workloads:
//!
//! - [`BTreeIndex`]: incremental insertion with bounded per-operation disk
//!   cost, for mixed insert/lookup workloads
//! - [`SortedIndex`]: batch-build-then-read-only, for one-shot bulk ingest
//!   followed by random point lookups
//!
//! ## Quick Start
//!
//! ```ignore
//! use keydex::config::DEFAULT_NODE_SIZE;
//! use keydex::{BTreeIndex, NodeLayout, RecordLayout};
//!
//! // 32-byte keys, 8-byte values, nodes targeting one 4 KiB disk block.
//! let layout = NodeLayout::new(RecordLayout::new(32, 8)?, DEFAULT_NODE_SIZE);
//!
//! let mut index = BTreeIndex::create("products.idx", layout)?;
//! index.insert_value(b"SKU-00042", &1_234_567i64)?;
//! index.close()?;
//!
//! let index = BTreeIndex::open("products.idx", layout)?;
//! if let Some(node_key) = index.get_value::<i64>(b"SKU-00042")? {
//!     // ...
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────┬──────────────────────────┐
//! │   BTreeIndex (btree)     │   SortedIndex (sorted)   │
//! │   nodes, splits, modes   │   buffer, sort, search   │
//! ├──────────────────────────┴──────────────────────────┤
//! │          Fixed-width record layer (record)          │
//! ├─────────────────────────────────────────────────────┤
//! │     Memory-mapped cell storage (storage) + mmap     │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Keys and Values
//!
//! Keys are byte strings stored in `key_size` bytes, the last byte
//! reserved as a terminator; longer keys are silently truncated to
//! `key_size - 1` bytes. Ordering is byte-lexicographic over the padded
//! buffer, which matches C-string ordering for text keys. Values are
//! opaque fixed-width byte payloads; `insert_value`/`get_value` move
//! plain-old-data types through them via zerocopy.
//!
//! ## What keydex Does Not Do
//!
//! Deletion, range iteration, duplicate keys, concurrent access, and
//! crash recovery are out of scope. An index file is valid after a
//! successful close; on any earlier failure, rebuild from source.
//!
//! ## Module Overview
//!
//! - [`record`]: fixed-width record geometry, key padding and ordering
//! - [`storage`]: memory-mapped fixed-stride cell file
//! - [`btree`]: node layout with derived order, insertion, lookup
//! - [`sorted`]: batch builder and binary-search reader
//! - [`config`]: fixed on-disk constants

pub mod btree;
pub mod config;
pub mod record;
pub mod sorted;
pub mod storage;

pub use btree::{BTreeIndex, Mode, NodeLayout};
pub use record::RecordLayout;
pub use sorted::SortedIndex;
