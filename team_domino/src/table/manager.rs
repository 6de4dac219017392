//! Table manager for spawning and managing multiple table actors.

use super::{
    actor::{TableActor, TableHandle},
    config::{TableConfig, TableId},
    messages::{TableError, TableStateResponse},
};
use crate::game::entities::Phase;
use serde::Serialize;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::RwLock;

/// Table metadata for discovery
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableMetadata {
    pub id: TableId,
    pub name: String,
    pub player_count: usize,
    pub phase: Phase,
    pub round_number: u32,
}

impl From<TableStateResponse> for TableMetadata {
    fn from(state: TableStateResponse) -> Self {
        Self {
            id: state.table_id,
            player_count: state.player_count(),
            name: state.table_name,
            phase: state.phase,
            round_number: state.round_number,
        }
    }
}

/// Table manager for managing multiple table instances
#[derive(Clone, Debug)]
pub struct TableManager {
    /// Active table handles
    tables: Arc<RwLock<HashMap<TableId, TableHandle>>>,

    /// Next table ID
    next_table_id: Arc<RwLock<TableId>>,
}

impl Default for TableManager {
    fn default() -> Self {
        Self::new()
    }
}

impl TableManager {
    /// Create a new table manager
    pub fn new() -> Self {
        Self {
            tables: Arc::new(RwLock::new(HashMap::new())),
            next_table_id: Arc::new(RwLock::new(1)),
        }
    }

    /// Create and spawn a new table
    ///
    /// # Arguments
    ///
    /// * `config` - Table configuration
    ///
    /// # Returns
    ///
    /// * `Result<TableId, TableError>` - Table ID or error
    pub async fn create_table(&self, config: TableConfig) -> Result<TableId, TableError> {
        config.validate()?;

        // Get next table ID
        let mut next_id = self.next_table_id.write().await;
        let table_id = *next_id;
        *next_id = table_id + 1;
        drop(next_id);

        let name = config.name.clone();
        let (actor, handle) = TableActor::new(table_id, config);

        let mut tables = self.tables.write().await;
        tables.insert(table_id, handle);
        drop(tables);

        tokio::spawn(async move {
            actor.run().await;
        });

        log::info!("Created and spawned table {} '{}'", table_id, name);
        Ok(table_id)
    }

    /// Get a table handle
    pub async fn get_table(&self, table_id: TableId) -> Option<TableHandle> {
        let tables = self.tables.read().await;
        tables.get(&table_id).cloned()
    }

    /// Like [`Self::get_table`], for callers that want an error.
    pub async fn table(&self, table_id: TableId) -> Result<TableHandle, TableError> {
        self.get_table(table_id)
            .await
            .ok_or(TableError::NotFound(table_id))
    }

    /// List all active tables, ordered by ID. Tables whose actor has stopped
    /// are skipped.
    pub async fn list_tables(&self) -> Vec<TableMetadata> {
        // Snapshot the handles so no lock is held while awaiting replies.
        let handles: Vec<TableHandle> = self.tables.read().await.values().cloned().collect();

        let mut metadata_list = Vec::with_capacity(handles.len());
        for handle in handles {
            match handle.state().await {
                Ok(state) => metadata_list.push(TableMetadata::from(state)),
                Err(e) => log::debug!("Skipping table {}: {}", handle.table_id(), e),
            }
        }
        metadata_list.sort_by_key(|m| m.id);
        metadata_list
    }

    /// Close a table
    pub async fn close_table(&self, table_id: TableId) -> Result<(), TableError> {
        let handle = self
            .tables
            .write()
            .await
            .remove(&table_id)
            .ok_or(TableError::NotFound(table_id))?;

        // The actor may already be gone, which is as closed as it gets.
        if let Err(e) = handle.close().await {
            log::debug!("Table {} already stopped: {}", table_id, e);
        }

        log::info!("Closed table {}", table_id);
        Ok(())
    }

    /// Number of registered tables
    pub async fn table_count(&self) -> usize {
        self.tables.read().await.len()
    }
}
