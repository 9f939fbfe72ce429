//! Storage layer
//!
//! Cars live either in SQLite (embedded) or in a DashMap for the
//! database-free setup. Both sit behind [`CarStore`].

pub mod db;
pub mod memory;

pub use db::Database;
pub use memory::MemoryStore;

use anyhow::Result;
use async_trait::async_trait;
use carlot_types::{Car, NewCar};
use std::str::FromStr;

/// How `GET /api/cars` renders a store's contents
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingShape {
    Array,
    Keyed,
}

/// Car store
#[async_trait]
pub trait CarStore: Send + Sync {
    /// Truncate the store, then insert `seed` in order.
    async fn reset(&self, seed: &[NewCar]) -> Result<Vec<Car>>;
    async fn list(&self) -> Result<Vec<Car>>;

    fn listing_shape(&self) -> ListingShape {
        ListingShape::Array
    }
}

/// Storage backend selected by the `STORAGE` setting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    Memory,
    Sqlite,
}

impl FromStr for StorageKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StorageKind::Memory),
            "sqlite" => Ok(StorageKind::Sqlite),
            other => anyhow::bail!("Unknown storage backend: {} (expected memory or sqlite)", other),
        }
    }
}

impl std::fmt::Display for StorageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageKind::Memory => write!(f, "memory"),
            StorageKind::Sqlite => write!(f, "sqlite"),
        }
    }
}
