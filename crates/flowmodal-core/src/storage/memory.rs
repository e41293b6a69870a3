use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::{StorageBackend, StorageTier, StoredEntry};
use crate::error::StorageError;

type Entries = HashMap<(String, String), StoredEntry>;

thread_local! {
    static THREAD_ENTRIES: Rc<RefCell<Entries>> = Rc::new(RefCell::new(HashMap::new()));
}

/// In-process storage tier.
///
/// Clones share the same entries, so a flow that is dropped and mounted again
/// with a clone of the same backend sees its earlier state.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    entries: Rc<RefCell<Entries>>,
}

impl MemoryBackend {
    /// A fresh, private map.
    pub fn new() -> Self {
        Self::default()
    }

    /// The map shared by every `memory` tier opened on this thread.
    pub fn thread_shared() -> Self {
        Self {
            entries: THREAD_ENTRIES.with(Rc::clone),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl StorageBackend for MemoryBackend {
    fn tier(&self) -> StorageTier {
        StorageTier::Memory
    }

    fn read(&self, namespace: &str, key: &str) -> Result<Option<StoredEntry>, StorageError> {
        Ok(self
            .entries
            .borrow()
            .get(&(namespace.to_string(), key.to_string()))
            .cloned())
    }

    fn write(&mut self, namespace: &str, key: &str, entry: &StoredEntry) -> Result<(), StorageError> {
        self.entries
            .borrow_mut()
            .insert((namespace.to_string(), key.to_string()), entry.clone());
        Ok(())
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.entries
            .borrow_mut()
            .remove(&(namespace.to_string(), key.to_string()));
        Ok(())
    }

    fn clear(&mut self, namespace: &str) -> Result<(), StorageError> {
        self.entries.borrow_mut().retain(|(ns, _), _| ns != namespace);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn clones_share_entries() {
        let mut a = MemoryBackend::new();
        let b = a.clone();
        a.write("ns", "k", &StoredEntry { value: json!(1), expires_at: None })
            .unwrap();
        assert_eq!(b.read("ns", "k").unwrap().unwrap().value, json!(1));
        assert_eq!(b.len(), 1);
    }

    #[test]
    fn private_maps_are_separate() {
        let mut a = MemoryBackend::new();
        let b = MemoryBackend::new();
        a.write("ns", "k", &StoredEntry { value: json!(1), expires_at: None })
            .unwrap();
        assert!(b.is_empty());
    }

    #[test]
    fn thread_shared_map_is_shared() {
        let mut a = MemoryBackend::thread_shared();
        a.write("thread-ns", "k", &StoredEntry { value: json!("x"), expires_at: None })
            .unwrap();
        let b = MemoryBackend::thread_shared();
        assert!(b.read("thread-ns", "k").unwrap().is_some());
        a.clear("thread-ns").unwrap();
        assert!(b.read("thread-ns", "k").unwrap().is_none());
    }
}
