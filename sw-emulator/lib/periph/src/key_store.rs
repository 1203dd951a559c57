/*++

Licensed under the Apache-2.0 license.

File Name:

    key_store.rs

Abstract:

    File contains the volatile key store shared by the secure element and
    the SYMCRYPTO accelerator.

--*/

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

mod constants {
    #![allow(unused)]

    /// Slot holding the internal device key
    pub const DEVICE_KEY_SLOT: u32 = 246;

    pub const DEVICE_KEY: [u8; 16] = [
        0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd, 0xee,
        0xff,
    ];
}

pub use constants::DEVICE_KEY_SLOT;

/// Volatile key slots, indexed by key index.
///
/// Clones share the same storage. Entries live until overwritten, removed,
/// or the store is reset.
#[derive(Clone)]
pub struct VolatileKeyStore {
    keys: Rc<RefCell<HashMap<u32, Vec<u8>>>>,
}

impl VolatileKeyStore {
    /// Create a store seeded with the device key.
    pub fn new() -> Self {
        let store = Self {
            keys: Rc::new(RefCell::new(HashMap::new())),
        };
        store.reset();
        store
    }

    /// Copy of the key in `index`, if any.
    pub fn get(&self, index: u32) -> Option<Vec<u8>> {
        self.keys.borrow().get(&index).cloned()
    }

    /// Store `key` in `index`, replacing any previous entry.
    pub fn insert(&self, index: u32, key: Vec<u8>) {
        tracing::debug!(index, len = key.len(), "volatile key stored");
        self.keys.borrow_mut().insert(index, key);
    }

    pub fn remove(&self, index: u32) -> Option<Vec<u8>> {
        self.keys.borrow_mut().remove(&index)
    }

    pub fn contains(&self, index: u32) -> bool {
        self.keys.borrow().contains_key(&index)
    }

    /// Drop every key and re-seed the device key slot.
    pub fn reset(&self) {
        let mut keys = self.keys.borrow_mut();
        keys.clear();
        keys.insert(DEVICE_KEY_SLOT, constants::DEVICE_KEY.to_vec());
    }
}

impl Default for VolatileKeyStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_device_key() {
        let store = VolatileKeyStore::new();
        assert_eq!(
            store.get(DEVICE_KEY_SLOT).unwrap(),
            hex::decode("00112233445566778899aabbccddeeff").unwrap()
        );
        assert!(!store.contains(0));
    }

    #[test]
    fn test_clones_share_slots() {
        let store = VolatileKeyStore::new();
        let other = store.clone();
        store.insert(5, vec![1, 2, 3]);
        assert_eq!(other.get(5), Some(vec![1, 2, 3]));
        assert_eq!(other.remove(5), Some(vec![1, 2, 3]));
        assert!(!store.contains(5));
    }

    #[test]
    fn test_reset() {
        let store = VolatileKeyStore::new();
        store.insert(DEVICE_KEY_SLOT, vec![0xaa; 16]);
        store.insert(7, vec![0xbb; 32]);
        store.reset();
        assert!(!store.contains(7));
        assert_eq!(store.get(DEVICE_KEY_SLOT).unwrap()[1], 0x11);
    }
}
