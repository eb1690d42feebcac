//! Keyed blob store for per-course client state

use parking_lot::RwLock;
use std::collections::HashMap;

use crate::Result;

/// Get/set/delete of opaque serialized values by key.
///
/// Plays the role browser local storage plays for a web front end; callers
/// decide the key layout and the serialization.
pub trait CourseStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn delete(&self, key: &str) -> Result<()>;
}

/// Process-local store, lost on exit
#[derive(Default)]
pub struct InMemoryCourseStore {
    entries: RwLock<HashMap<String, String>>,
}

impl InMemoryCourseStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl CourseStore for InMemoryCourseStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }
}
