//! # Fixed-Width Record Layout
//!
//! Both index engines store the same unit: a packed `(key, value)` pair of
//! fixed widths chosen when the index is configured. Keys occupy `key_size`
//! bytes with the last byte reserved as a terminator, so the logical key is
//! at most `key_size - 1` bytes and is zero-padded on the right. Values are
//! `value_size` opaque bytes; the caller asserts their wire meaning.
//!
//! ## Ordering
//!
//! Padded keys compare as full fixed-width byte slices. Because every key
//! carries the reserved trailing zero, this matches C-string comparison for
//! keys without embedded zero bytes, and extends it consistently to binary
//! keys: a shorter key sorts before any longer key it prefixes.
//!
//! ## Truncation
//!
//! Keys longer than `key_size - 1` bytes are silently truncated. Two keys
//! that agree on their first `key_size - 1` bytes are the same key.

use eyre::{ensure, Result};

/// Runtime record geometry: key and value widths in bytes.
///
/// The widths are fixed per index at configuration time, standing in for
/// compile-time parameters. Both engines derive all file offsets from this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordLayout {
    key_size: usize,
    value_size: usize,
}

impl RecordLayout {
    /// Validates and builds a record layout.
    ///
    /// `key_size` must leave room for at least one logical key byte plus
    /// the reserved terminator.
    pub fn new(key_size: usize, value_size: usize) -> Result<Self> {
        ensure!(
            key_size >= 2,
            "key size must be at least 2 bytes (one logical byte plus the reserved terminator), got {}",
            key_size
        );
        ensure!(
            value_size >= 1,
            "value size must be at least 1 byte, got {}",
            value_size
        );
        Ok(Self {
            key_size,
            value_size,
        })
    }

    pub fn key_size(&self) -> usize {
        self.key_size
    }

    pub fn value_size(&self) -> usize {
        self.value_size
    }

    /// Packed byte size of one record on disk.
    pub fn record_size(&self) -> usize {
        self.key_size + self.value_size
    }

    /// Copies at most `key_size - 1` key bytes into a zero-filled buffer of
    /// `key_size` bytes. Oversized keys are truncated, not rejected.
    pub fn pad_key(&self, key: &[u8]) -> Vec<u8> {
        let mut padded = vec![0u8; self.key_size];
        let len = key.len().min(self.key_size - 1);
        padded[..len].copy_from_slice(&key[..len]);
        padded
    }

    /// Zero-pads a value up to `value_size` bytes. Unlike keys, oversized
    /// values are rejected: truncating opaque bytes would corrupt them.
    pub fn pad_value(&self, value: &[u8]) -> Result<Vec<u8>> {
        ensure!(
            value.len() <= self.value_size,
            "value of {} bytes exceeds configured value size {}",
            value.len(),
            self.value_size
        );
        let mut padded = vec![0u8; self.value_size];
        padded[..value.len()].copy_from_slice(value);
        Ok(padded)
    }
}
