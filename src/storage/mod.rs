//! # Storage Module
//!
//! The foundational storage layer for the B-tree engine: a fixed-stride
//! cell file accessed through memory mapping. Instead of issuing a seek
//! and read syscall per node visit, the file is mapped into the process
//! address space and node access becomes pointer arithmetic; the OS page
//! cache does the actual I/O and amortizes repeated probes.
//!
//! ## File Shape
//!
//! A node file is a sequence of equal-sized cells with no gaps:
//!
//! ```text
//! Offset 0:              Cell 0 (metadata)
//! Offset cell_size:      Cell 1 (first real node)
//! Offset 2 * cell_size:  Cell 2
//! ...
//! ```
//!
//! The file length is always an exact multiple of the cell size; opening a
//! file whose length is not is an error.
//!
//! ## Safety Model
//!
//! Mapped memory becomes invalid when the file is grown and remapped. The
//! borrow checker enforces the discipline at compile time:
//!
//! ```text
//! NodeFile::cell(&self) -> &[u8]          // immutable borrow
//! NodeFile::cell_mut(&mut self) -> &mut [u8]
//! NodeFile::grow(&mut self)               // exclusive borrow
//! ```
//!
//! No cell reference can be held across `grow()` because `grow()` takes
//! `&mut self`.
//!
//! ## Access Modes
//!
//! A `NodeFile` is created read-write (truncating) or opened read-only.
//! Requesting a mutable cell from a read-only file fails; write-mode
//! gating at the engine level rides on this.

mod file;

pub use file::NodeFile;
