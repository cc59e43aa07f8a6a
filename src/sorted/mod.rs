//! # Sorted-File Index
//!
//! The batch counterpart to the B-tree engine: accumulate records in
//! memory, sort once, write a flat file, then serve random point lookups
//! by binary search over the mapped file. One bulk ingest, then read-only.
//!
//! ## File Layout
//!
//! ```text
//! offset 0:  u64 record count (little-endian)
//! offset 8:  record[count]    packed fixed-width key+value pairs,
//!                             strictly ascending by key
//! ```
//!
//! ## Trade-Off Against the B-Tree
//!
//! The sorted file has no per-node bookkeeping and no wasted slot space,
//! so it is the denser format and the faster one to build; the price is
//! that it cannot absorb further insertions. A lookup costs one key
//! comparison per probe, `ceil(log2 N)` probes, with the OS page cache
//! amortizing repeated ones.

mod index;

pub use index::SortedIndex;
