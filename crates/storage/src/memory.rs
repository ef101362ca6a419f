//! In-process spatial store for tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

use geo_common::{StoreError, StoreResult, TableName};

use crate::spatial::{FeatureRecord, SpatialStore, MAX_CHUNK_SIZE};

/// Spatial store holding tables in memory.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<TableName, Vec<FeatureRecord>>>,
    replacements: AtomicU64,
    unreachable: Option<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that rejects every operation as if the database were down.
    pub fn unreachable(reason: impl Into<String>) -> Self {
        Self {
            unreachable: Some(reason.into()),
            ..Self::default()
        }
    }

    /// Rows of a table, if it exists.
    pub async fn rows(&self, table: &TableName) -> Option<Vec<FeatureRecord>> {
        self.tables.read().await.get(table).cloned()
    }

    /// Names of all tables, sorted.
    pub async fn table_names(&self) -> Vec<TableName> {
        let mut names: Vec<_> = self.tables.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of successful `replace_table` calls.
    pub fn replacements(&self) -> u64 {
        self.replacements.load(Ordering::Relaxed)
    }

    fn check_reachable(&self) -> StoreResult<()> {
        match &self.unreachable {
            Some(reason) => Err(StoreError::Database(format!("Connection failed: {}", reason))),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SpatialStore for MemoryStore {
    async fn replace_table(
        &self,
        table: &TableName,
        records: &[FeatureRecord],
        chunk_size: usize,
    ) -> StoreResult<u64> {
        self.check_reachable()?;

        // Staged copy swapped in at the end, so readers see old or new rows only.
        let mut staged = Vec::with_capacity(records.len());
        for chunk in records.chunks(chunk_size.clamp(1, MAX_CHUNK_SIZE)) {
            staged.extend_from_slice(chunk);
        }

        let written = staged.len() as u64;
        self.tables.write().await.insert(table.clone(), staged);
        self.replacements.fetch_add(1, Ordering::Relaxed);
        Ok(written)
    }

    async fn ping(&self) -> StoreResult<String> {
        self.check_reachable()?;
        Ok(format!("in-memory spatial store {}", env!("CARGO_PKG_VERSION")))
    }
}
