//! Pending descriptor edits, keyed by digest

use parking_lot::Mutex;

use crate::digest::Digest;
use crate::manifest::Descriptor;

/// Overlay of descriptors not yet written to disk
///
/// Every access takes the one lock, so a descriptor is never seen half
/// updated. Entries keep their insertion order.
#[derive(Debug, Default)]
pub struct DescriptorStore {
    entries: Mutex<Vec<Descriptor>>,
}

impl DescriptorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, digest: &Digest) -> Option<Descriptor> {
        self.entries
            .lock()
            .iter()
            .find(|d| &d.digest == digest)
            .cloned()
    }

    pub fn contains(&self, digest: &Digest) -> bool {
        self.entries.lock().iter().any(|d| &d.digest == digest)
    }

    /// Insert or replace the entry for the descriptor's digest
    pub fn insert(&self, descriptor: Descriptor) {
        let mut entries = self.entries.lock();
        match entries.iter_mut().find(|d| d.digest == descriptor.digest) {
            Some(existing) => *existing = descriptor,
            None => entries.push(descriptor),
        }
    }

    /// Mutate the entry for `digest` under the lock
    ///
    /// When there is no entry yet, `base` supplies the descriptor to copy in.
    /// Returns false when neither exists.
    pub fn update<B, F>(&self, digest: &Digest, base: B, mutate: F) -> bool
    where
        B: FnOnce() -> Option<Descriptor>,
        F: FnOnce(&mut Descriptor),
    {
        let mut entries = self.entries.lock();
        if let Some(existing) = entries.iter_mut().find(|d| &d.digest == digest) {
            mutate(existing);
            return true;
        }

        match base() {
            Some(mut descriptor) => {
                mutate(&mut descriptor);
                entries.push(descriptor);
                true
            }
            None => false,
        }
    }

    pub fn remove(&self, digest: &Digest) -> Option<Descriptor> {
        let mut entries = self.entries.lock();
        let position = entries.iter().position(|d| &d.digest == digest)?;
        Some(entries.remove(position))
    }

    pub fn snapshot(&self) -> Vec<Descriptor> {
        self.entries.lock().clone()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::media_type;

    fn descriptor(seed: &str) -> Descriptor {
        Descriptor::new(
            media_type::OCI_IMAGE_MANIFEST,
            1,
            Digest::sha256_of(seed.as_bytes()),
        )
    }

    #[test]
    fn test_insert_replaces_same_digest() {
        let store = DescriptorStore::new();
        let mut first = descriptor("a");
        store.insert(first.clone());
        first.size = 99;
        store.insert(first.clone());
        store.insert(descriptor("b"));

        assert_eq!(store.len(), 2);
        assert_eq!(store.get(&first.digest).unwrap().size, 99);
        assert_eq!(store.snapshot()[0].digest, first.digest);
    }

    #[test]
    fn test_update_copies_base_once() {
        let store = DescriptorStore::new();
        let base = descriptor("a");

        assert!(store.update(&base.digest, || Some(base.clone()), |d| {
            d.platform_mut().os = "linux".to_string()
        }));
        // the second update must not consult the base again
        assert!(store.update(&base.digest, || None, |d| {
            d.platform_mut().architecture = "arm".to_string()
        }));

        let stored = store.get(&base.digest).unwrap();
        let platform = stored.platform.unwrap();
        assert_eq!(platform.os, "linux");
        assert_eq!(platform.architecture, "arm");

        let unknown = descriptor("unknown");
        assert!(!store.update(&unknown.digest, || None, |_| {}));
        assert!(!store.contains(&unknown.digest));
    }

    #[test]
    fn test_remove_and_clear() {
        let store = DescriptorStore::new();
        let a = descriptor("a");
        store.insert(a.clone());
        store.insert(descriptor("b"));

        assert!(store.remove(&a.digest).is_some());
        assert!(store.remove(&a.digest).is_none());
        assert_eq!(store.len(), 1);

        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn test_concurrent_inserts() {
        let store = std::sync::Arc::new(DescriptorStore::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || store.insert(descriptor(&format!("image-{}", i))))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.len(), 8);
    }
}
