//! Item persistence.
//!
//! # Design Decisions
//! - Handlers depend on the `ItemStore` trait, not a concrete backend
//! - Listing is ordered by creation time so pages are stable
//! - A relational backend plugs in behind the same trait

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use memory::MemoryStore;

/// A stored item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Error type for store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("item {0} already exists")]
    Duplicate(Uuid),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Persist a new item and return the stored row.
    async fn insert(&self, item: Item) -> StoreResult<Item>;

    async fn get(&self, id: Uuid) -> StoreResult<Option<Item>>;

    /// Items ordered by `created_at`, skipping `offset`, at most `limit`.
    async fn list(&self, limit: usize, offset: usize) -> StoreResult<Vec<Item>>;

    async fn count(&self) -> StoreResult<usize>;
}
