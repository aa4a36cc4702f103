use std::collections::HashMap;

use parking_lot::RwLock;

use super::{apply_to_map, Mutation, StorageBackend, StorageError};

/// In-process storage. Lost on drop.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    map: RwLock<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self { Self::default() }

    pub fn len(&self) -> usize { self.map.read().len() }
    pub fn is_empty(&self) -> bool { self.map.read().is_empty() }
    pub fn keys(&self) -> Vec<String> { self.map.read().keys().cloned().collect() }
}

impl StorageBackend for MemoryBackend {
    fn read(&self, keys: &[&str]) -> Vec<Option<String>> {
        let r = self.map.read();
        keys.iter().map(|k| r.get(*k).cloned()).collect()
    }

    fn apply(&self, batch: &[Mutation]) -> Result<(), StorageError> {
        let mut w = self.map.write();
        apply_to_map(&mut w, batch);
        Ok(())
    }
}
