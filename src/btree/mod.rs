//! # B-Tree Index
//!
//! A file-backed B-tree over fixed-width records, tuned for mixed
//! insert/lookup workloads where the dataset outgrows memory. Each node
//! occupies one fixed-size cell of the index file; the cell size (and with
//! it the tree order) is derived from the configured record widths and a
//! node-size target aligned to disk blocks.
//!
//! ## File Layout
//!
//! ```text
//! Cell 0:  metadata     branches[0] = item count
//!                       branches[1] = node count
//!                       branches[2] = root node number (NIL when empty)
//! Cell 1:  node 1       first real tree node
//! Cell 2:  node 2
//! ...
//! ```
//!
//! Cell 0 reuses the node layout rather than carrying a separate header
//! struct, so the file is a homogeneous array of cells and node `i` always
//! sits at byte offset `i * node_size`. Node numbers are contiguous from
//! 1; the file length is exactly `(node_count + 1) * node_size`.
//!
//! ## Node Layout
//!
//! ```text
//! +-------------------+
//! | count (i32)       |  live records in this node
//! +-------------------+
//! | records[max_keys] |  packed fixed-width key+value pairs, sorted
//! +-------------------+
//! | branches[order]   |  i64 child node numbers, NIL at leaf positions
//! +-------------------+
//! ```
//!
//! ## Structural Invariants
//!
//! - every non-root node holds between `min_keys` and `max_keys` records;
//!   the root holds at least one while the tree is non-empty
//! - records within a node are sorted ascending; keys are globally unique
//! - `branches[i]` subtends keys strictly between `records[i-1]` and
//!   `records[i]`
//! - all leaves sit at the same depth
//!
//! ## Modes
//!
//! Write mode truncates and rebuilds; read mode serves an existing file.
//! There is no in-place reopen for writing and no deletion, which keeps
//! the allocator trivial (bump the node count) and the file append-only.

mod node;
mod tree;

pub use node::{Metadata, NodeLayout, NodeMut, NodeRef, SlotSearch};
pub use tree::{BTreeIndex, Mode};
