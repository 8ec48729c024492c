//! Hashing support for interned names. Symbol names and COMDAT signatures
//! are hashed once, when first read out of an input file; every map they
//! subsequently land in replays that stored hash instead of re-walking the
//! name bytes.

use std::hash::BuildHasher;
use std::hash::Hasher;
use std::ops::Deref;

/// A map keyed by prehashed values. Lookups never touch the underlying
/// bytes: the hasher state just replays the key's stored hash.
pub(crate) type PrehashedMap<K, V> = hashbrown::HashMap<PreHashed<K>, V, StoredHashState>;

pub(crate) fn hash_bytes(bytes: &[u8]) -> u64 {
    foldhash::fast::FixedState::default().hash_one(bytes)
}

/// A value carrying the hash it was interned under. Equality is decided by
/// the value; the hash only short-circuits bucket selection.
#[derive(Clone, Copy, Debug)]
pub struct PreHashed<T> {
    hash: u64,
    value: T,
}

impl<T> PreHashed<T> {
    pub(crate) fn new(value: T, hash: u64) -> Self {
        Self { hash, value }
    }

    pub(crate) fn hash(&self) -> u64 {
        self.hash
    }
}

impl<T> Deref for PreHashed<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T: PartialEq> PartialEq for PreHashed<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T: Eq> Eq for PreHashed<T> {}

impl<T> std::hash::Hash for PreHashed<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

/// Builds hashers that accept exactly one `write_u64`: the stored hash of a
/// `PreHashed` key.
#[derive(Default, Clone)]
pub(crate) struct StoredHashState;

impl BuildHasher for StoredHashState {
    type Hasher = StoredHash;

    fn build_hasher(&self) -> StoredHash {
        StoredHash(0)
    }
}

pub(crate) struct StoredHash(u64);

impl Hasher for StoredHash {
    fn finish(&self) -> u64 {
        self.0
    }

    fn write_u64(&mut self, hash: u64) {
        self.0 = hash;
    }

    fn write(&mut self, _bytes: &[u8]) {
        unreachable!("prehashed keys never feed raw bytes to the map");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(bytes: &[u8]) -> PreHashed<&[u8]> {
        PreHashed::new(bytes, hash_bytes(bytes))
    }

    #[test]
    fn test_map_replays_stored_hash() {
        let mut map: PrehashedMap<&[u8], u32> = PrehashedMap::default();
        map.insert(key(b"main"), 7);
        map.insert(key(b"_start"), 8);
        assert_eq!(map.get(&key(b"main")), Some(&7));
        assert_eq!(map.get(&key(b"_start")), Some(&8));
        assert_eq!(map.get(&key(b"absent")), None);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_equality_is_by_value() {
        assert_eq!(key(b"same"), key(b"same"));
        assert_ne!(key(b"one"), key(b"two"));
    }
}
