use std::{
    any::Any,
    collections::HashMap,
    fmt,
    sync::{Arc, Mutex, PoisonError},
};

type Entry = Arc<dyn Any + Send + Sync>;

/// Results of cached operations, keyed by operation name and stringified arguments.
///
/// One instance is shared by every cached operation of the process. Entries are never
/// evicted.
#[derive(Clone, Default)]
pub struct ResultCache {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key(operation: &str, args: &str) -> String {
        format!("{}_{}", operation, args)
    }

    pub fn get<T: Clone + 'static>(&self, key: &str) -> Option<T> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries
            .get(key)
            .and_then(|v| v.downcast_ref::<T>())
            .cloned()
    }

    pub fn insert<T: Send + Sync + 'static>(&self, key: String, value: T) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key, Arc::new(value));
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultCache")
            .field("entries", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_are_typed() {
        let cache = ResultCache::new();
        cache.insert(ResultCache::key("caption", "a"), String::from("a cat"));

        assert_eq!(
            cache.get::<String>(&ResultCache::key("caption", "a")),
            Some("a cat".to_string())
        );
        // same key, wrong type
        assert_eq!(cache.get::<u32>(&ResultCache::key("caption", "a")), None);
        assert_eq!(cache.get::<String>(&ResultCache::key("caption", "b")), None);
    }

    #[test]
    fn clones_share_entries() {
        let cache = ResultCache::new();
        let other = cache.clone();
        other.insert("k".to_string(), 1u8);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get::<u8>("k"), Some(1));
    }
}
