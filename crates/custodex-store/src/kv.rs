//! The flat key-value space every component persists into.
//!
//! Balances, offers, list heads, stake positions, bucket totals and
//! configuration all share this one namespace; the key families are
//! disambiguated by the tag bytes in [`crate::keys`]. A `BTreeMap` keeps
//! iteration order deterministic, which the conservation checker and the
//! list-integrity helpers rely on.

use std::collections::BTreeMap;

use custodex_types::Amount;

/// An ordered byte-keyed store. Absent keys read as empty; amount
/// accessors read absent keys as zero, mirroring the host storage model
/// the engine was specified against.
#[derive(Debug, Default, Clone)]
pub struct KvStore {
    map: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl KvStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            map: BTreeMap::new(),
        }
    }

    /// Raw read. `None` if the key is absent.
    #[must_use]
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        self.map.get(key).map(Vec::as_slice)
    }

    /// Whether a key is present (presence is meaningful: "has balance"
    /// ⇔ "key present").
    #[must_use]
    pub fn contains(&self, key: &[u8]) -> bool {
        self.map.contains_key(key)
    }

    /// Raw write, replacing any existing value.
    pub fn put(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.map.insert(key.into(), value.into());
    }

    /// Delete a key. Returns whether it existed.
    pub fn delete(&mut self, key: &[u8]) -> bool {
        self.map.remove(key).is_some()
    }

    /// Read a fixed-width little-endian amount. Absent or malformed
    /// values read as zero.
    #[must_use]
    pub fn get_amount(&self, key: &[u8]) -> Amount {
        self.get(key)
            .and_then(|v| v.try_into().ok())
            .map_or(0, Amount::from_le_bytes)
    }

    /// Write an amount in fixed-width little-endian form.
    pub fn put_amount(&mut self, key: impl Into<Vec<u8>>, amount: Amount) {
        self.put(key, amount.to_le_bytes().to_vec());
    }

    /// Iterate all entries whose key starts with `prefix`, in key order.
    pub fn scan_prefix<'a>(
        &'a self,
        prefix: &'a [u8],
    ) -> impl Iterator<Item = (&'a [u8], &'a [u8])> + 'a {
        self.map
            .range(prefix.to_vec()..)
            .take_while(move |(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.as_slice(), v.as_slice()))
    }

    /// Number of live keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_key_reads_empty() {
        let kv = KvStore::new();
        assert_eq!(kv.get(b"missing"), None);
        assert_eq!(kv.get_amount(b"missing"), 0);
        assert!(!kv.contains(b"missing"));
    }

    #[test]
    fn put_get_delete() {
        let mut kv = KvStore::new();
        kv.put(b"k".to_vec(), b"v".to_vec());
        assert_eq!(kv.get(b"k"), Some(b"v".as_slice()));
        assert!(kv.delete(b"k"));
        assert!(!kv.delete(b"k"));
        assert_eq!(kv.get(b"k"), None);
    }

    #[test]
    fn amount_roundtrip() {
        let mut kv = KvStore::new();
        kv.put_amount(b"a".to_vec(), 123_456_789);
        assert_eq!(kv.get_amount(b"a"), 123_456_789);
    }

    #[test]
    fn scan_prefix_is_bounded_and_ordered() {
        let mut kv = KvStore::new();
        kv.put(vec![1, 2], b"a".to_vec());
        kv.put(vec![1, 1], b"b".to_vec());
        kv.put(vec![2, 0], b"c".to_vec());
        let hits: Vec<_> = kv.scan_prefix(&[1]).collect();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0, &[1, 1]);
        assert_eq!(hits[1].0, &[1, 2]);
    }
}
