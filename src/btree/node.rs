//! # Node Layout and Views
//!
//! A tree node is one fixed-size cell of the node file:
//!
//! ```text
//! offset 0                      : i32   count        live records
//! offset 4                      : record[max_keys]   packed key+value pairs
//! offset 4 + max_keys * rec_size: i64[order]         child node numbers
//! ```
//!
//! All integers little-endian, no padding. The geometry is derived once
//! from the configured record widths and a node-size target, then shared
//! by every view.
//!
//! Views borrow a node-sized byte buffer and validate its shape at
//! construction; after that, field access is infallible. `NodeRef` borrows
//! immutably (lookup path, directly over the mapped file), `NodeMut`
//! borrows mutably (insert path, over an owned scratch buffer).

use eyre::{ensure, eyre, Result};
use zerocopy::little_endian::{I32, I64};
use zerocopy::FromBytes;

use crate::config::{MIN_ORDER, NIL_NODE, NODE_BRANCH_SIZE, NODE_COUNT_SIZE};
use crate::record::RecordLayout;

/// Derived B-tree geometry for one index.
///
/// The order is solved from the node-size target `S`: every key slot
/// beyond the first branch costs `record_size + 8` bytes, so
///
/// ```text
/// order = max(3, (S - 4 + record_size + 8) / (record_size + 8))
/// ```
///
/// The byte size actually written per node is the packed struct size,
/// which lands at or near `S`; `S` is a target, not a post-layout
/// constraint, and with the minimum order the node can exceed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeLayout {
    record: RecordLayout,
    order: usize,
    max_keys: usize,
    min_keys: usize,
    node_size: usize,
}

impl NodeLayout {
    pub fn new(record: RecordLayout, node_size_target: usize) -> Self {
        let record_size = record.record_size() as i64;
        let slot_cost = record_size + NODE_BRANCH_SIZE as i64;

        let calc = (node_size_target as i64 - NODE_COUNT_SIZE as i64 + slot_cost) / slot_cost;
        let order = (calc.max(MIN_ORDER as i64)) as usize;
        let max_keys = order - 1;

        let node_size = NODE_COUNT_SIZE
            + max_keys * record.record_size()
            + order * NODE_BRANCH_SIZE;

        Self {
            record,
            order,
            max_keys,
            min_keys: (order - 1) / 2,
            node_size,
        }
    }

    pub fn record_layout(&self) -> &RecordLayout {
        &self.record
    }

    /// Maximum number of children per node.
    pub fn order(&self) -> usize {
        self.order
    }

    pub fn max_keys(&self) -> usize {
        self.max_keys
    }

    pub fn min_keys(&self) -> usize {
        self.min_keys
    }

    /// Packed byte size of one node, the on-disk stride.
    pub fn node_size(&self) -> usize {
        self.node_size
    }

    fn branches_offset(&self) -> usize {
        NODE_COUNT_SIZE + self.max_keys * self.record.record_size()
    }

    /// Allocates a buffer holding an empty node: zero records, every
    /// branch slot set to the NIL sentinel.
    pub fn empty_node(&self) -> Vec<u8> {
        let mut buf = vec![0u8; self.node_size];
        for slot in buf[self.branches_offset()..].chunks_exact_mut(NODE_BRANCH_SIZE) {
            slot.copy_from_slice(&NIL_NODE.to_le_bytes());
        }
        buf
    }
}

/// Outcome of an in-node key search.
///
/// `Descend(b)` names the branch slot to follow when the key is absent;
/// during insertion the same `b` is the record slot the key belongs at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotSearch {
    Found(usize),
    Descend(usize),
}

fn validate_node(layout: &NodeLayout, buf: &[u8]) -> Result<()> {
    ensure!(
        buf.len() == layout.node_size(),
        "node buffer of {} bytes does not match node size {}",
        buf.len(),
        layout.node_size()
    );
    let count = I32::ref_from_bytes(&buf[..NODE_COUNT_SIZE])
        .map_err(|e| eyre!("failed to read node count: {:?}", e))?
        .get();
    ensure!(
        count >= 0 && count as usize <= layout.max_keys(),
        "node count {} outside [0, {}]",
        count,
        layout.max_keys()
    );
    Ok(())
}

#[derive(Debug)]
pub struct NodeRef<'a> {
    count: &'a I32,
    records: &'a [u8],
    branches: &'a [I64],
    layout: &'a NodeLayout,
}

impl<'a> NodeRef<'a> {
    pub fn from_bytes(layout: &'a NodeLayout, buf: &'a [u8]) -> Result<Self> {
        validate_node(layout, buf)?;
        let count = I32::ref_from_bytes(&buf[..NODE_COUNT_SIZE])
            .map_err(|e| eyre!("failed to read node count: {:?}", e))?;
        let records = &buf[NODE_COUNT_SIZE..layout.branches_offset()];
        let branches = <[I64]>::ref_from_bytes(&buf[layout.branches_offset()..])
            .map_err(|e| eyre!("failed to read node branches: {:?}", e))?;
        Ok(Self {
            count,
            records,
            branches,
            layout,
        })
    }

    pub fn count(&self) -> usize {
        self.count.get() as usize
    }

    pub fn record_at(&self, slot: usize) -> &'a [u8] {
        let size = self.layout.record_layout().record_size();
        &self.records[slot * size..(slot + 1) * size]
    }

    pub fn key_at(&self, slot: usize) -> &'a [u8] {
        &self.record_at(slot)[..self.layout.record_layout().key_size()]
    }

    pub fn value_at(&self, slot: usize) -> &'a [u8] {
        &self.record_at(slot)[self.layout.record_layout().key_size()..]
    }

    pub fn branch_at(&self, slot: usize) -> i64 {
        self.branches[slot].get()
    }

    /// In-node search for a padded key: walk the sorted records from the
    /// right until one is not greater than the target.
    pub fn search(&self, key: &[u8]) -> SlotSearch {
        let count = self.count();
        if count == 0 || key < self.key_at(0) {
            return SlotSearch::Descend(0);
        }

        let mut slot = count - 1;
        while slot > 0 && key < self.key_at(slot) {
            slot -= 1;
        }

        if key == self.key_at(slot) {
            SlotSearch::Found(slot)
        } else {
            SlotSearch::Descend(slot + 1)
        }
    }
}

pub struct NodeMut<'a> {
    count: &'a mut I32,
    records: &'a mut [u8],
    branches: &'a mut [I64],
    layout: &'a NodeLayout,
}

impl<'a> NodeMut<'a> {
    pub fn from_bytes(layout: &'a NodeLayout, buf: &'a mut [u8]) -> Result<Self> {
        validate_node(layout, buf)?;
        let branches_offset = layout.branches_offset();

        let (count_bytes, rest) = buf.split_at_mut(NODE_COUNT_SIZE);
        let (records, branch_bytes) = rest.split_at_mut(branches_offset - NODE_COUNT_SIZE);

        let count = I32::mut_from_bytes(count_bytes)
            .map_err(|e| eyre!("failed to read node count: {:?}", e))?;
        let branches = <[I64]>::mut_from_bytes(branch_bytes)
            .map_err(|e| eyre!("failed to read node branches: {:?}", e))?;

        Ok(Self {
            count,
            records,
            branches,
            layout,
        })
    }

    pub fn count(&self) -> usize {
        self.count.get() as usize
    }

    pub fn set_count(&mut self, count: usize) {
        self.count.set(count as i32);
    }

    pub fn record_at(&self, slot: usize) -> &[u8] {
        let size = self.layout.record_layout().record_size();
        &self.records[slot * size..(slot + 1) * size]
    }

    pub fn branch_at(&self, slot: usize) -> i64 {
        self.branches[slot].get()
    }

    pub fn set_record(&mut self, slot: usize, record: &[u8]) {
        let size = self.layout.record_layout().record_size();
        debug_assert_eq!(record.len(), size);
        self.records[slot * size..(slot + 1) * size].copy_from_slice(record);
    }

    pub fn set_branch(&mut self, slot: usize, node_no: i64) {
        self.branches[slot].set(node_no);
    }

    /// Inserts `record` at `slot` with `right_branch` as its right child,
    /// shifting the tail of both arrays one position right.
    ///
    /// The node must have a free record slot.
    pub fn insert_record(&mut self, slot: usize, record: &[u8], right_branch: i64) {
        let count = self.count();
        let size = self.layout.record_layout().record_size();
        debug_assert!(count < self.layout.max_keys());
        debug_assert!(slot <= count);

        self.records
            .copy_within(slot * size..count * size, (slot + 1) * size);
        for branch in (slot + 1..=count).rev() {
            self.branches[branch + 1] = self.branches[branch];
        }

        self.set_record(slot, record);
        self.set_branch(slot + 1, right_branch);
        self.set_count(count + 1);
    }
}

/// The three counters kept in cell 0.
///
/// Cell 0 reuses the node layout: `branches[0]` holds the item count,
/// `branches[1]` the node count, `branches[2]` the root node number. The
/// `count` field of cell 0 is written as zero and ignored on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metadata {
    pub num_items: i64,
    pub num_nodes: i64,
    pub root: i64,
}

impl Metadata {
    pub fn read_from(node: &NodeRef<'_>) -> Self {
        Self {
            num_items: node.branch_at(0),
            num_nodes: node.branch_at(1),
            root: node.branch_at(2),
        }
    }

    pub fn write_into(&self, node: &mut NodeMut<'_>) {
        node.set_branch(0, self.num_items);
        node.set_branch(1, self.num_nodes);
        node.set_branch(2, self.root);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_NODE_SIZE;

    fn layout(key: usize, value: usize, target: usize) -> NodeLayout {
        NodeLayout::new(RecordLayout::new(key, value).unwrap(), target)
    }

    #[test]
    fn order_derivation_default_geometry() {
        // 40-byte records in the default 4096-byte node: 86 branches, 85 keys.
        let layout = layout(32, 8, DEFAULT_NODE_SIZE);
        assert_eq!(layout.order(), 86);
        assert_eq!(layout.max_keys(), 85);
        assert_eq!(layout.min_keys(), 42);
        assert_eq!(layout.node_size(), 4 + 85 * 40 + 86 * 8);
        assert!(layout.node_size() <= DEFAULT_NODE_SIZE);
    }

    #[test]
    fn order_derivation_small_nodes() {
        let layout = layout(16, 8, 256);
        assert_eq!(layout.order(), 8);
        assert_eq!(layout.max_keys(), 7);
        assert_eq!(layout.min_keys(), 3);
        assert_eq!(layout.node_size(), 4 + 7 * 24 + 8 * 8);
    }

    #[test]
    fn order_clamps_at_minimum() {
        // A node target far too small for three children still yields a
        // usable (if oversized) node.
        let layout = layout(64, 64, 64);
        assert_eq!(layout.order(), 3);
        assert_eq!(layout.max_keys(), 2);
        assert_eq!(layout.min_keys(), 1);
        assert!(layout.node_size() > 64);
    }

    #[test]
    fn empty_node_has_nil_branches() {
        let layout = layout(8, 8, 128);
        let buf = layout.empty_node();

        let node = NodeRef::from_bytes(&layout, &buf).unwrap();
        assert_eq!(node.count(), 0);
        for slot in 0..layout.order() {
            assert_eq!(node.branch_at(slot), NIL_NODE);
        }
    }

    #[test]
    fn view_rejects_wrong_buffer_size() {
        let layout = layout(8, 8, 128);
        let buf = vec![0u8; layout.node_size() + 1];
        assert!(NodeRef::from_bytes(&layout, &buf).is_err());
    }

    #[test]
    fn view_rejects_corrupt_count() {
        let layout = layout(8, 8, 128);
        let mut buf = layout.empty_node();
        buf[..4].copy_from_slice(&i32::to_le_bytes(layout.max_keys() as i32 + 1));
        assert!(NodeRef::from_bytes(&layout, &buf).is_err());

        buf[..4].copy_from_slice(&i32::to_le_bytes(-1));
        assert!(NodeRef::from_bytes(&layout, &buf).is_err());
    }

    #[test]
    fn insert_record_shifts_tail() {
        let layout = layout(4, 4, 128);
        let mut buf = layout.empty_node();

        {
            let mut node = NodeMut::from_bytes(&layout, &mut buf).unwrap();
            node.insert_record(0, b"bbb\0BBBB", 10);
            node.insert_record(1, b"ddd\0DDDD", 20);
            node.insert_record(1, b"ccc\0CCCC", 15);
        }

        let node = NodeRef::from_bytes(&layout, &buf).unwrap();
        assert_eq!(node.count(), 3);
        assert_eq!(node.key_at(0), b"bbb\0");
        assert_eq!(node.key_at(1), b"ccc\0");
        assert_eq!(node.key_at(2), b"ddd\0");
        assert_eq!(node.value_at(1), b"CCCC");
        // Left-of-first branch untouched, shifted right branches follow.
        assert_eq!(node.branch_at(0), NIL_NODE);
        assert_eq!(node.branch_at(1), 10);
        assert_eq!(node.branch_at(2), 15);
        assert_eq!(node.branch_at(3), 20);
    }

    #[test]
    fn search_walks_from_the_right() {
        let layout = layout(4, 4, 128);
        let mut buf = layout.empty_node();

        {
            let mut node = NodeMut::from_bytes(&layout, &mut buf).unwrap();
            node.insert_record(0, b"bbb\0....", NIL_NODE);
            node.insert_record(1, b"ddd\0....", NIL_NODE);
            node.insert_record(2, b"fff\0....", NIL_NODE);
        }

        let node = NodeRef::from_bytes(&layout, &buf).unwrap();
        assert_eq!(node.search(b"aaa\0"), SlotSearch::Descend(0));
        assert_eq!(node.search(b"bbb\0"), SlotSearch::Found(0));
        assert_eq!(node.search(b"ccc\0"), SlotSearch::Descend(1));
        assert_eq!(node.search(b"ddd\0"), SlotSearch::Found(1));
        assert_eq!(node.search(b"eee\0"), SlotSearch::Descend(2));
        assert_eq!(node.search(b"fff\0"), SlotSearch::Found(2));
        assert_eq!(node.search(b"ggg\0"), SlotSearch::Descend(3));
    }

    #[test]
    fn search_empty_node_descends_leftmost() {
        let layout = layout(4, 4, 128);
        let buf = layout.empty_node();
        let node = NodeRef::from_bytes(&layout, &buf).unwrap();
        assert_eq!(node.search(b"any\0"), SlotSearch::Descend(0));
    }

    #[test]
    fn metadata_round_trip() {
        let layout = layout(8, 8, 128);
        let mut buf = layout.empty_node();

        {
            let mut node = NodeMut::from_bytes(&layout, &mut buf).unwrap();
            Metadata {
                num_items: 42,
                num_nodes: 7,
                root: 3,
            }
            .write_into(&mut node);
        }

        let node = NodeRef::from_bytes(&layout, &buf).unwrap();
        let meta = Metadata::read_from(&node);
        assert_eq!(meta.num_items, 42);
        assert_eq!(meta.num_nodes, 7);
        assert_eq!(meta.root, 3);
    }
}
