//! Fuzz testing for layout derivation and key padding.
//!
//! Throws arbitrary record widths, node-size targets, and key bytes at
//! the geometry code and asserts the invariants every engine relies on.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use keydex::{NodeLayout, RecordLayout};

#[derive(Debug, Arbitrary)]
struct LayoutInput {
    key_size: u16,
    value_size: u16,
    node_size_target: u16,
    key: Vec<u8>,
}

fuzz_target!(|input: LayoutInput| {
    let Ok(record) = RecordLayout::new(input.key_size as usize, input.value_size as usize) else {
        return;
    };

    assert_eq!(
        record.record_size(),
        record.key_size() + record.value_size()
    );

    let padded = record.pad_key(&input.key);
    assert_eq!(padded.len(), record.key_size());
    assert_eq!(padded[record.key_size() - 1], 0, "terminator byte written");
    let logical = input.key.len().min(record.key_size() - 1);
    assert_eq!(&padded[..logical], &input.key[..logical]);
    assert!(padded[logical..].iter().all(|&b| b == 0));

    // Padding a padded key's logical prefix is a fixed point.
    assert_eq!(record.pad_key(&padded[..logical]), padded);

    let layout = NodeLayout::new(record, input.node_size_target as usize);
    assert!(layout.order() >= 3);
    assert_eq!(layout.max_keys(), layout.order() - 1);
    assert_eq!(layout.min_keys(), (layout.order() - 1) / 2);
    assert!(layout.min_keys() >= 1);
    assert_eq!(
        layout.node_size(),
        4 + layout.max_keys() * record.record_size() + layout.order() * 8
    );
    // Unless clamped to the minimum order, the derived node overshoots
    // the target by at most the branch width (the count field's slack in
    // the slot-cost derivation).
    if layout.order() > 3 {
        assert!(layout.node_size() <= input.node_size_target as usize + 8);
    }

    let empty = layout.empty_node();
    assert_eq!(empty.len(), layout.node_size());
});
