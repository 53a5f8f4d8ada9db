//! Enumerate-and-restore support for external serializers.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::WorldConfig;
use crate::error::{WorldError, WorldResult};
use crate::graph::InheritanceGraph;
use crate::schema::SchemaRegistry;
use crate::storage::{InMemoryRelationStore, TableSnapshot};

use super::{require_standard_tables, World};

/// Everything needed to rebuild a world over the same schema.
///
/// The crate defines no file format; serialize this with any serde format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// Fingerprint of the schema the rows were written under.
    pub fingerprint: String,
    /// Next id the restored world allocates.
    pub next_id: u64,
    /// Every live node and edge.
    pub graph: InheritanceGraph,
    /// Every non-empty table.
    pub tables: Vec<TableSnapshot>,
}

impl World {
    /// Enumerate the graph and every non-empty table.
    pub fn snapshot(&self) -> WorldResult<WorldSnapshot> {
        Ok(WorldSnapshot {
            fingerprint: self.schema().fingerprint().to_string(),
            next_id: self.next_id,
            graph: self.graph.clone(),
            tables: self.store.snapshot()?,
        })
    }

    /// Rebuild a world from a snapshot taken under the same schema.
    ///
    /// # Errors
    ///
    /// [`WorldError::SnapshotMismatch`] if the schema fingerprints differ;
    /// [`WorldError::InvalidSnapshot`] if the graph is inconsistent or cyclic,
    /// or a row belongs to an unknown node; store errors if a row no longer
    /// validates.
    pub fn from_snapshot(
        config: WorldConfig,
        schema: SchemaRegistry,
        snapshot: WorldSnapshot,
    ) -> WorldResult<Self> {
        config.validate()?;
        require_standard_tables(&schema)?;
        if schema.fingerprint() != snapshot.fingerprint {
            return Err(WorldError::SnapshotMismatch {
                expected: schema.fingerprint().to_string(),
                actual: snapshot.fingerprint,
            });
        }

        snapshot.graph.validate()?;
        for table in &snapshot.tables {
            if let Some((owner, _)) = table.rows.iter().find(|(owner, _)| !snapshot.graph.contains(*owner)) {
                return Err(WorldError::InvalidSnapshot {
                    reason: format!("{} holds a row for unknown node {owner}", table.table),
                });
            }
        }

        let store = InMemoryRelationStore::from_snapshot(Arc::new(schema), snapshot.tables)?;
        let floor = snapshot.graph.max_id().map_or(1, |id| id.raw() + 1);
        let next_id = snapshot.next_id.max(floor);
        debug!(nodes = snapshot.graph.len(), next_id, "world restored from snapshot");
        Ok(Self::assemble(config, Box::new(store), snapshot.graph, next_id))
    }
}
