//! In-memory store backend
//!
//! Holds sets and maps in concurrent hash maps. Nothing survives a restart and
//! nothing is shared between processes, so this is for development and tests.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use dashmap::DashMap;

use super::{KnownStore, StoreError};

#[derive(Default)]
pub struct MemoryStore {
    sets: DashMap<String, HashSet<String>>,
    maps: DashMap<String, HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        tracing::warn!("Using in-memory known-image store - state will be lost on restart!");
        Self::default()
    }

    /// Number of members in `set`.
    pub fn set_len(&self, set: &str) -> usize {
        self.sets.get(set).map(|s| s.len()).unwrap_or(0)
    }

    /// Number of fields in `map`.
    pub fn map_len(&self, map: &str) -> usize {
        self.maps.get(map).map(|m| m.len()).unwrap_or(0)
    }
}

#[async_trait]
impl KnownStore for MemoryStore {
    async fn is_member(&self, set: &str, member: &str) -> Result<bool, StoreError> {
        Ok(self
            .sets
            .get(set)
            .map(|s| s.contains(member))
            .unwrap_or(false))
    }

    async fn add_member(&self, set: &str, member: &str) -> Result<(), StoreError> {
        self.sets
            .entry(set.to_string())
            .or_default()
            .insert(member.to_string());
        Ok(())
    }

    async fn get_field(&self, map: &str, field: &str) -> Result<Option<String>, StoreError> {
        Ok(self.maps.get(map).and_then(|m| m.get(field).cloned()))
    }

    async fn set_field(&self, map: &str, field: &str, value: &str) -> Result<(), StoreError> {
        self.maps
            .entry(map.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("sets", &self.sets.len())
            .field("maps", &self.maps.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_membership() {
        let store = MemoryStore::new();
        assert!(!store.is_member("images", "abc").await.unwrap());

        store.add_member("images", "abc").await.unwrap();
        assert!(store.is_member("images", "abc").await.unwrap());
        assert!(!store.is_member("other", "abc").await.unwrap());
    }

    #[tokio::test]
    async fn test_add_member_is_idempotent() {
        let store = MemoryStore::new();
        store.add_member("images", "abc").await.unwrap();
        store.add_member("images", "abc").await.unwrap();
        assert_eq!(store.set_len("images"), 1);
    }

    #[tokio::test]
    async fn test_map_overwrite() {
        let store = MemoryStore::new();
        assert_eq!(store.get_field("locations", "abc").await.unwrap(), None);

        store.set_field("locations", "abc", "first").await.unwrap();
        store.set_field("locations", "abc", "second").await.unwrap();

        assert_eq!(
            store.get_field("locations", "abc").await.unwrap().as_deref(),
            Some("second")
        );
        assert_eq!(store.map_len("locations"), 1);
    }
}
