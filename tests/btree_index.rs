//! # B-Tree Engine Integration Tests
//!
//! End-to-end coverage of the B-tree index through its public API:
//! build/close/reopen round trips, split-heavy insertion orders, mode
//! gating, duplicate rejection, and the on-disk length law. Expected
//! values are fixed; if one of these fails after a change, the change
//! regressed the engine.

use keydex::config::DEFAULT_NODE_SIZE;
use keydex::{BTreeIndex, Mode, NodeLayout, RecordLayout};
use tempfile::tempdir;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

fn default_layout() -> NodeLayout {
    NodeLayout::new(RecordLayout::new(32, 8).unwrap(), DEFAULT_NODE_SIZE)
}

/// Small nodes (order 8) so splits happen within a few dozen keys.
fn small_layout() -> NodeLayout {
    NodeLayout::new(RecordLayout::new(16, 8).unwrap(), 256)
}

mod round_trip_tests {
    use super::*;

    #[test]
    fn build_close_reopen_retrieve() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fruit.idx");

        let mut index = BTreeIndex::create(&path, default_layout()).unwrap();
        index.insert_value(b"apple", &111i64).unwrap();
        index.insert_value(b"banana", &222i64).unwrap();
        index.insert_value(b"cherry", &333i64).unwrap();
        index.close().unwrap();

        let index = BTreeIndex::open(&path, default_layout()).unwrap();
        assert_eq!(index.mode(), Mode::Read);
        assert_eq!(index.len(), 3);
        assert_eq!(index.get_value::<i64>(b"banana").unwrap(), Some(222));
        assert_eq!(index.get_value::<i64>(b"apple").unwrap(), Some(111));
        assert_eq!(index.get_value::<i64>(b"cherry").unwrap(), Some(333));
        assert_eq!(index.get_value::<i64>(b"durian").unwrap(), None);
        assert!(index.contains(b"apple").unwrap());
        assert!(!index.contains(b"durian").unwrap());
    }

    #[test]
    fn reverse_order_insertion_splits_and_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("reverse.idx");

        let mut index = BTreeIndex::create(&path, small_layout()).unwrap();
        for i in (0..100i64).rev() {
            index
                .insert_value(format!("key{:05}", i).as_bytes(), &i)
                .unwrap();
        }
        assert_eq!(index.len(), 100);

        // Everything must already be visible through the write handle.
        for i in 0..100i64 {
            assert_eq!(
                index
                    .get_value::<i64>(format!("key{:05}", i).as_bytes())
                    .unwrap(),
                Some(i),
                "key{:05} before close",
                i
            );
        }
        index.close().unwrap();

        let index = BTreeIndex::open(&path, small_layout()).unwrap();
        assert_eq!(index.len(), 100);
        for i in 0..100i64 {
            assert_eq!(
                index
                    .get_value::<i64>(format!("key{:05}", i).as_bytes())
                    .unwrap(),
                Some(i),
                "key{:05} after reopen",
                i
            );
        }
        assert_eq!(index.get_value::<i64>(b"key00100").unwrap(), None);
    }

    #[test]
    fn shuffled_insertion_order_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shuffled.idx");

        // Deterministic LCG walk over 0..500.
        let mut order: Vec<u32> = (0..500).collect();
        let mut state = 0x2545f491u64;
        for i in (1..order.len()).rev() {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            order.swap(i, (state >> 33) as usize % (i + 1));
        }

        let mut index = BTreeIndex::create(&path, small_layout()).unwrap();
        for &i in &order {
            index
                .insert_value(format!("id{:06}", i).as_bytes(), &(i as i64 * 7))
                .unwrap();
        }
        index.close().unwrap();

        let index = BTreeIndex::open(&path, small_layout()).unwrap();
        assert_eq!(index.len(), 500);
        for i in 0..500u32 {
            assert_eq!(
                index
                    .get_value::<i64>(format!("id{:06}", i).as_bytes())
                    .unwrap(),
                Some(i as i64 * 7)
            );
        }
    }

    #[test]
    fn file_length_is_cell_count_times_node_size() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("law.idx");
        let layout = small_layout();

        let mut index = BTreeIndex::create(&path, layout).unwrap();
        for i in 0..100i64 {
            index
                .insert_value(format!("key{:05}", i).as_bytes(), &i)
                .unwrap();
        }
        index.close().unwrap();

        let len = std::fs::metadata(&path).unwrap().len();
        let node_size = layout.node_size() as u64;
        assert_eq!(len % node_size, 0);
        // 100 keys at 7 per node require well more than a root.
        assert!(len / node_size > 15, "file holds only {} cells", len / node_size);
    }
}

mod rejection_tests {
    use super::*;

    #[test]
    fn duplicate_key_is_rejected_and_state_preserved() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("dup.idx");

        let mut index = BTreeIndex::create(&path, default_layout()).unwrap();
        index.insert_value(b"key", &100i64).unwrap();

        let err = index.insert_value(b"key", &200i64).unwrap_err();
        assert!(err.to_string().contains("duplicate key"), "got: {}", err);
        assert_eq!(index.len(), 1);
        index.close().unwrap();

        let index = BTreeIndex::open(&path, default_layout()).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.get_value::<i64>(b"key").unwrap(), Some(100));
    }

    #[test]
    fn duplicate_deep_in_a_split_tree_is_rejected() {
        let dir = tempdir().unwrap();
        let mut index = BTreeIndex::create(dir.path().join("dup.idx"), small_layout()).unwrap();

        for i in 0..50i64 {
            index
                .insert_value(format!("key{:05}", i).as_bytes(), &i)
                .unwrap();
        }
        let err = index.insert_value(b"key00025", &999i64).unwrap_err();
        assert!(err.to_string().contains("duplicate key"));
        assert_eq!(index.len(), 50);
        assert_eq!(index.get_value::<i64>(b"key00025").unwrap(), Some(25));
    }

    #[test]
    fn read_mode_rejects_insert() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gate.idx");

        let mut index = BTreeIndex::create(&path, default_layout()).unwrap();
        index.insert_value(b"key", &1i64).unwrap();
        index.close().unwrap();

        let mut index = BTreeIndex::open(&path, default_layout()).unwrap();
        let err = index.insert_value(b"other", &2i64).unwrap_err();
        assert!(err.to_string().contains("read-only"), "got: {}", err);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn open_rejects_missing_or_mismatched_files() {
        let dir = tempdir().unwrap();

        assert!(BTreeIndex::open(dir.path().join("missing.idx"), default_layout()).is_err());

        // A file built with one geometry does not open under another.
        let path = dir.path().join("geometry.idx");
        let mut index = BTreeIndex::create(&path, small_layout()).unwrap();
        index.insert_value(b"key", &1i64).unwrap();
        index.close().unwrap();
        assert!(BTreeIndex::open(&path, default_layout()).is_err());
    }
}

mod boundary_tests {
    use super::*;

    #[test]
    fn empty_tree_answers_negatively() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("empty.idx");

        let mut index = BTreeIndex::create(&path, default_layout()).unwrap();
        assert!(index.is_empty());
        assert_eq!(index.len(), 0);
        assert!(!index.contains(b"anything").unwrap());
        index.close().unwrap();

        let index = BTreeIndex::open(&path, default_layout()).unwrap();
        assert!(index.is_empty());
        assert_eq!(index.len(), 0);
        assert_eq!(index.get_value::<i64>(b"anything").unwrap(), None);
    }

    #[test]
    fn oversized_keys_truncate_to_the_same_record() {
        let dir = tempdir().unwrap();
        let layout = NodeLayout::new(RecordLayout::new(8, 8).unwrap(), DEFAULT_NODE_SIZE);
        let mut index = BTreeIndex::create(dir.path().join("trunc.idx"), layout).unwrap();

        index.insert_value(b"abcdefghXXXX", &42i64).unwrap();

        // Both spellings resolve to the identical truncated key.
        assert_eq!(index.get_value::<i64>(b"abcdefg").unwrap(), Some(42));
        assert_eq!(index.get_value::<i64>(b"abcdefghZZ").unwrap(), Some(42));

        let err = index.insert_value(b"abcdefg", &7i64).unwrap_err();
        assert!(err.to_string().contains("duplicate key"));
    }

    #[test]
    fn drop_flushes_metadata() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("drop.idx");

        {
            let mut index = BTreeIndex::create(&path, default_layout()).unwrap();
            index.insert_value(b"key", &5i64).unwrap();
            // No close(); Drop must persist the counters.
        }

        let index = BTreeIndex::open(&path, default_layout()).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.get_value::<i64>(b"key").unwrap(), Some(5));
    }
}

mod typed_value_tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout)]
    #[repr(C)]
    struct Location {
        page: u64,
        slot: u32,
        flags: u32,
    }

    #[test]
    fn struct_values_round_trip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("typed.idx");
        let layout = NodeLayout::new(RecordLayout::new(32, 16).unwrap(), DEFAULT_NODE_SIZE);

        let loc = Location {
            page: 77,
            slot: 3,
            flags: 0b1010,
        };

        let mut index = BTreeIndex::create(&path, layout).unwrap();
        index.insert_value(b"row-1", &loc).unwrap();
        index.close().unwrap();

        let index = BTreeIndex::open(&path, layout).unwrap();
        assert_eq!(index.get_value::<Location>(b"row-1").unwrap(), Some(loc));
    }

    #[test]
    fn undersized_values_are_zero_padded() {
        let dir = tempdir().unwrap();
        let layout = NodeLayout::new(RecordLayout::new(32, 16).unwrap(), DEFAULT_NODE_SIZE);
        let mut index = BTreeIndex::create(dir.path().join("pad.idx"), layout).unwrap();

        // u32 into a 16-byte slot: the tail pads with zeros.
        index.insert_value(b"small", &0xDEADBEEFu32).unwrap();
        let raw = index.get(b"small").unwrap().unwrap().to_vec();
        assert_eq!(&raw[..4], &0xDEADBEEFu32.to_le_bytes());
        assert!(raw[4..].iter().all(|&b| b == 0));

        assert_eq!(
            index.get_value::<u32>(b"small").unwrap(),
            Some(0xDEADBEEF)
        );
    }

    #[test]
    fn oversized_value_type_is_rejected() {
        let dir = tempdir().unwrap();
        let mut index =
            BTreeIndex::create(dir.path().join("big.idx"), small_layout()).unwrap();

        // 16 bytes into an 8-byte slot.
        assert!(index.insert_value(b"key", &[1u64, 2u64]).is_err());
        index.insert_value(b"key", &1u64).unwrap();
        assert!(index.get_value::<[u64; 2]>(b"key").is_err());
    }
}
