//! # B-Tree Engine
//!
//! `BTreeIndex` drives the node layer over a [`NodeFile`]: open/close
//! lifecycle, mode gating, recursive insertion with splits, and iterative
//! lookup.
//!
//! ## Insert Algorithm
//!
//! ```text
//! 1. push_down(record, subtree_root):
//!    - NIL subtree: the record itself percolates up with no right child
//!    - search the node; an exact hit is a duplicate-key error
//!    - recurse into the chosen branch
//!    - if the child promoted a record:
//!        - room left: shift-insert it here, done
//!        - node full: split, promoting a new record further up
//! 2. if the top-level call promoted, allocate a fresh root holding the
//!    promoted record with the old root and the split sibling as children
//! ```
//!
//! ## Split
//!
//! The median slot is biased by where the incoming record lands
//! (`min_keys` when it goes left, `min_keys + 1` when it goes right) so
//! both halves end at or above `min_keys` after the insertion. The upper
//! slots move to a freshly allocated right sibling, the incoming record is
//! shift-inserted into its half, and the last record of the left node is
//! promoted; the promoted record's right child seeds the sibling's
//! leftmost branch.
//!
//! ## Buffers
//!
//! Each recursion frame works on its own owned copy of one node, read
//! through [`NodeFile::read_cell`]. A frame's node is never written by its
//! descendants (splits touch only the child and its new sibling), so the
//! copy stays valid across the recursive call. The lookup path skips the
//! copy entirely and borrows node bytes straight from the mapping.
//!
//! ## Durability
//!
//! Counters live in memory while the index is open for writing; `close`
//! rewrites the metadata cell and syncs. A crash before close loses the
//! metadata update and possibly in-flight node writes; callers needing
//! durability rebuild from source.

use std::path::Path;

use eyre::{bail, ensure, eyre, Result};
use zerocopy::{FromBytes, Immutable, IntoBytes};

use super::node::{Metadata, NodeLayout, NodeMut, NodeRef, SlotSearch};
use crate::config::NIL_NODE;
use crate::storage::NodeFile;

/// Access mode of an open index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Read,
    Write,
}

/// A file-backed B-tree mapping fixed-width keys to fixed-width values.
///
/// Supports incremental insertion with bounded per-operation disk cost.
/// Write mode builds a new index from scratch; read mode serves lookups
/// from a previously closed index file.
#[derive(Debug)]
pub struct BTreeIndex {
    layout: NodeLayout,
    file: Option<NodeFile>,
    mode: Mode,
    root: i64,
    num_items: i64,
    num_nodes: i64,
}

impl BTreeIndex {
    /// Creates a new empty index at `path`, truncating any existing file,
    /// and opens it for writing.
    pub fn create<P: AsRef<Path>>(path: P, layout: NodeLayout) -> Result<Self> {
        let file = NodeFile::create(path, layout.node_size(), 1)?;

        let mut index = Self {
            layout,
            file: Some(file),
            mode: Mode::Write,
            root: NIL_NODE,
            num_items: 0,
            num_nodes: 0,
        };
        index.write_metadata()?;
        Ok(index)
    }

    /// Opens an existing index read-only. `layout` must match the one the
    /// index was created with; the file length is validated against it.
    pub fn open<P: AsRef<Path>>(path: P, layout: NodeLayout) -> Result<Self> {
        let file = NodeFile::open_readonly(path, layout.node_size())?;

        let meta = {
            let node = NodeRef::from_bytes(&layout, file.cell(0)?)?;
            Metadata::read_from(&node)
        };

        ensure!(
            meta.num_nodes >= 0 && file.cell_count() == meta.num_nodes as u64 + 1,
            "index metadata claims {} nodes but the file holds {} cells",
            meta.num_nodes,
            file.cell_count()
        );
        ensure!(
            meta.root == NIL_NODE || (meta.root >= 1 && meta.root <= meta.num_nodes),
            "index metadata names root node {} outside 1..={}",
            meta.root,
            meta.num_nodes
        );

        Ok(Self {
            layout,
            file: Some(file),
            mode: Mode::Read,
            root: meta.root,
            num_items: meta.num_items,
            num_nodes: meta.num_nodes,
        })
    }

    /// Closes the index. In write mode the metadata cell is rewritten and
    /// the file synced first. Calling close twice is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.file.is_none() {
            return Ok(());
        }

        if self.mode == Mode::Write {
            self.write_metadata()?;
            if let Some(file) = self.file.as_ref() {
                file.sync()?;
            }
        }

        self.file = None;
        self.root = NIL_NODE;
        self.num_items = 0;
        self.num_nodes = 0;
        Ok(())
    }

    /// Inserts a key/value pair. The key is truncated to the logical key
    /// width; the value must be exactly the configured value width.
    ///
    /// Fails when the index is closed or read-only, and on duplicate keys;
    /// a rejected insert leaves the tree unchanged.
    pub fn insert(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        ensure!(self.file.is_some(), "cannot insert: index is closed");
        ensure!(
            self.mode == Mode::Write,
            "cannot insert: index is open read-only"
        );

        let record_layout = *self.layout.record_layout();
        ensure!(
            value.len() == record_layout.value_size(),
            "value of {} bytes does not match configured value size {}",
            value.len(),
            record_layout.value_size()
        );

        let mut record = record_layout.pad_key(key);
        record.extend_from_slice(value);

        if let Some((promoted, right)) = self.push_down(&record, self.root)? {
            let mut buf = self.layout.empty_node();
            {
                let mut node = NodeMut::from_bytes(&self.layout, &mut buf)?;
                node.set_count(1);
                node.set_record(0, &promoted);
                node.set_branch(0, self.root);
                node.set_branch(1, right);
            }
            let new_root = self.alloc_node()?;
            self.write_node(new_root, &buf)?;
            self.root = new_root;
        }

        self.num_items += 1;
        Ok(())
    }

    /// Stores a plain-old-data value, zero-padded to the value width.
    pub fn insert_value<T: IntoBytes + Immutable>(&mut self, key: &[u8], value: &T) -> Result<()> {
        let padded = self.layout.record_layout().pad_value(value.as_bytes())?;
        self.insert(key, &padded)
    }

    /// Looks up a key and returns its value bytes, borrowed from the
    /// mapped file. Returns `Ok(None)` when the key is absent or the
    /// index is closed. Works in both modes.
    pub fn get(&self, key: &[u8]) -> Result<Option<&[u8]>> {
        let Some(file) = self.file.as_ref() else {
            return Ok(None);
        };

        let padded = self.layout.record_layout().pad_key(key);
        let mut current = self.root;

        while current != NIL_NODE {
            let node = NodeRef::from_bytes(&self.layout, file.cell(current as u64)?)?;
            match node.search(&padded) {
                SlotSearch::Found(slot) => return Ok(Some(node.value_at(slot))),
                SlotSearch::Descend(branch) => current = node.branch_at(branch),
            }
        }

        Ok(None)
    }

    /// Typed counterpart of [`get`](Self::get): reads a plain-old-data
    /// value back out of the stored bytes.
    pub fn get_value<T: FromBytes>(&self, key: &[u8]) -> Result<Option<T>> {
        let size = std::mem::size_of::<T>();
        ensure!(
            size <= self.layout.record_layout().value_size(),
            "type of {} bytes exceeds configured value size {}",
            size,
            self.layout.record_layout().value_size()
        );

        match self.get(key)? {
            Some(bytes) => T::read_from_bytes(&bytes[..size])
                .map(Some)
                .map_err(|e| eyre!("failed to decode stored value: {:?}", e)),
            None => Ok(None),
        }
    }

    pub fn contains(&self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Number of records in the tree.
    pub fn len(&self) -> i64 {
        self.num_items
    }

    pub fn is_empty(&self) -> bool {
        self.root == NIL_NODE
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn layout(&self) -> &NodeLayout {
        &self.layout
    }

    fn write_metadata(&mut self) -> Result<()> {
        let mut buf = self.layout.empty_node();
        {
            let mut node = NodeMut::from_bytes(&self.layout, &mut buf)?;
            Metadata {
                num_items: self.num_items,
                num_nodes: self.num_nodes,
                root: self.root,
            }
            .write_into(&mut node);
        }
        self.write_node(0, &buf)
    }

    fn read_node(&self, node_no: i64) -> Result<Vec<u8>> {
        let Some(file) = self.file.as_ref() else {
            bail!("index is closed");
        };
        let mut buf = vec![0u8; self.layout.node_size()];
        file.read_cell(node_no as u64, &mut buf)?;
        Ok(buf)
    }

    fn write_node(&mut self, node_no: i64, buf: &[u8]) -> Result<()> {
        let Some(file) = self.file.as_mut() else {
            bail!("index is closed");
        };
        file.write_cell(node_no as u64, buf)
    }

    /// Claims the next node number and extends the file to hold it. Node
    /// numbers stay contiguous from 1; there is no free list because
    /// nothing is ever deleted.
    fn alloc_node(&mut self) -> Result<i64> {
        let Some(file) = self.file.as_mut() else {
            bail!("index is closed");
        };
        self.num_nodes += 1;
        file.grow(self.num_nodes as u64 + 1)?;
        Ok(self.num_nodes)
    }

    /// Recursive insertion step. Returns the record (and its right child)
    /// promoted out of this subtree, or `None` once the insertion has been
    /// absorbed.
    fn push_down(&mut self, record: &[u8], subtree: i64) -> Result<Option<(Vec<u8>, i64)>> {
        if subtree == NIL_NODE {
            // Leaf position reached: the record itself moves up.
            return Ok(Some((record.to_vec(), NIL_NODE)));
        }

        let key_size = self.layout.record_layout().key_size();
        let mut buf = self.read_node(subtree)?;

        let (slot, child) = {
            let node = NodeRef::from_bytes(&self.layout, &buf)?;
            match node.search(&record[..key_size]) {
                SlotSearch::Found(_) => bail!(
                    "duplicate key insertion attempted: {:?}",
                    String::from_utf8_lossy(trim_key(&record[..key_size]))
                ),
                SlotSearch::Descend(branch) => (branch, node.branch_at(branch)),
            }
        };

        let Some((promoted, right)) = self.push_down(record, child)? else {
            return Ok(None);
        };

        let count = NodeRef::from_bytes(&self.layout, &buf)?.count();
        if count < self.layout.max_keys() {
            NodeMut::from_bytes(&self.layout, &mut buf)?.insert_record(slot, &promoted, right);
            self.write_node(subtree, &buf)?;
            Ok(None)
        } else {
            self.split(subtree, &mut buf, slot, &promoted, right)
                .map(Some)
        }
    }

    /// Splits the full node in `left_buf` (stored at `node_no`) around a
    /// biased median, inserting `record` into the proper half. Returns the
    /// record promoted to the parent and the new sibling's node number.
    fn split(
        &mut self,
        node_no: i64,
        left_buf: &mut [u8],
        slot: usize,
        record: &[u8],
        right_branch: i64,
    ) -> Result<(Vec<u8>, i64)> {
        let min_keys = self.layout.min_keys();
        let max_keys = self.layout.max_keys();

        // slot is the insertion position (search location + 1); the record
        // lands in the left half when its location is below min_keys.
        let goes_left = slot <= min_keys;
        let median = if goes_left { min_keys } else { min_keys + 1 };

        let mut right_buf = self.layout.empty_node();
        let promoted = {
            let mut left = NodeMut::from_bytes(&self.layout, left_buf)?;
            let mut right = NodeMut::from_bytes(&self.layout, &mut right_buf)?;

            for from in median..max_keys {
                right.set_record(from - median, left.record_at(from));
                right.set_branch(from - median + 1, left.branch_at(from + 1));
            }
            right.set_count(max_keys - median);
            left.set_count(median);

            if goes_left {
                left.insert_record(slot, record, right_branch);
            } else {
                right.insert_record(slot - median, record, right_branch);
            }

            // The left node's last record moves up; its right subtree
            // becomes the sibling's leftmost branch.
            let left_count = left.count();
            let promoted = left.record_at(left_count - 1).to_vec();
            right.set_branch(0, left.branch_at(left_count));
            left.set_count(left_count - 1);
            promoted
        };

        self.write_node(node_no, left_buf)?;
        let sibling = self.alloc_node()?;
        self.write_node(sibling, &right_buf)?;

        Ok((promoted, sibling))
    }
}

impl Drop for BTreeIndex {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

fn trim_key(padded: &[u8]) -> &[u8] {
    let end = padded.iter().position(|&b| b == 0).unwrap_or(padded.len());
    &padded[..end]
}
