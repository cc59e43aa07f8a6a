//! # Fixed Format Constants
//!
//! On-disk field widths and sentinels for the two index file formats.
//! Multi-byte integers are little-endian everywhere.
//!
//! ## Dependency Graph
//!
//! ```text
//! NODE_COUNT_SIZE (4)          i32 live-record count, first field of a node
//!       │
//!       └─> node byte size = NODE_COUNT_SIZE
//!               + max_keys * record_size
//!               + order * NODE_BRANCH_SIZE     (see NodeLayout)
//!
//! NODE_BRANCH_SIZE (8)         i64 child node number; NIL_NODE when absent
//!
//! MIN_ORDER (3)                lower clamp for the derived node order;
//!                              guarantees at least two record slots and,
//!                              via three branch slots, enough room for the
//!                              metadata cell's three counters
//!
//! SORTED_HEADER_SIZE (8)       u64 record count heading a sorted index file
//! ```

/// Sentinel child pointer: no subtree at this branch slot.
pub const NIL_NODE: i64 = -1;

/// Lower clamp for the derived B-tree order.
pub const MIN_ORDER: usize = 3;

/// Width of the node's live-record count field (i32, little-endian).
pub const NODE_COUNT_SIZE: usize = 4;

/// Width of one branch slot (i64 node number, little-endian).
pub const NODE_BRANCH_SIZE: usize = 8;

/// Default node size target, aligned to a common disk block size.
pub const DEFAULT_NODE_SIZE: usize = 4096;

/// Width of the sorted index file header (u64 record count, little-endian).
pub const SORTED_HEADER_SIZE: usize = 8;

const _: () = assert!(NODE_COUNT_SIZE == std::mem::size_of::<i32>());
const _: () = assert!(NODE_BRANCH_SIZE == std::mem::size_of::<i64>());
const _: () = assert!(SORTED_HEADER_SIZE == std::mem::size_of::<u64>());
const _: () = assert!(MIN_ORDER >= 3);
