//! In-process item store.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::store::{Item, ItemStore, StoreError, StoreResult};

/// A thread-safe map of items, shared by clones.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<DashMap<Uuid, Item>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        tracing::info!("connecting to item store");
        let store = Self::default();
        tracing::info!("connected to item store");
        store
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[async_trait]
impl ItemStore for MemoryStore {
    async fn insert(&self, item: Item) -> StoreResult<Item> {
        match self.inner.entry(item.id) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(StoreError::Duplicate(item.id)),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(item.clone());
                Ok(item)
            }
        }
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<Item>> {
        Ok(self.inner.get(&id).map(|r| r.value().clone()))
    }

    async fn list(&self, limit: usize, offset: usize) -> StoreResult<Vec<Item>> {
        let mut items: Vec<Item> = self.inner.iter().map(|r| r.value().clone()).collect();
        items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(items.into_iter().skip(offset).take(limit).collect())
    }

    async fn count(&self) -> StoreResult<usize> {
        Ok(self.inner.len())
    }
}
