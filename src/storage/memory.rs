//! In-memory storage backend.
//!
//! Each table is an ordered multimap from owner id to that owner's rows. It is
//! the reference implementation of [`RelationStore`] and the backend every
//! [`crate::World`] uses unless told otherwise.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tracing::trace;

use crate::error::StoreError;
use crate::node::NodeId;
use crate::schema::{Multiplicity, SchemaRegistry, TableId, TableSpec};
use crate::storage::traits::{column_index, table_spec, RelationStore, Row, TableSnapshot};
use crate::value::Value;

type Table = BTreeMap<NodeId, Vec<Row>>;

fn build_row(spec: &TableSpec, cells: &[(&str, Value)]) -> Result<Row, StoreError> {
    let mut values: Vec<Option<Value>> = vec![None; spec.columns.len()];
    for (column, value) in cells {
        let (idx, col) = column_index(spec, column)?;
        if value.is_null() {
            if col.multiplicity != Multiplicity::Nullable {
                return Err(StoreError::MissingColumn {
                    table: spec.id.to_string(),
                    column: col.name.to_string(),
                });
            }
        } else if !col.value_type.accepts(value) {
            return Err(StoreError::TypeMismatch {
                table: spec.id.to_string(),
                column: col.name.to_string(),
                expected: col.value_type,
                actual: value.value_type().unwrap_or(col.value_type),
            });
        }
        values[idx] = Some(value.clone());
    }

    let mut out = Vec::with_capacity(values.len());
    for (value, col) in values.into_iter().zip(&spec.columns) {
        match value {
            Some(v) => out.push(v),
            None if col.multiplicity == Multiplicity::Nullable => out.push(Value::Null),
            None => {
                return Err(StoreError::MissingColumn {
                    table: spec.id.to_string(),
                    column: col.name.to_string(),
                })
            }
        }
    }
    Ok(Row { values: out })
}

/// In-memory relation store.
#[derive(Debug)]
pub struct InMemoryRelationStore {
    schema: Arc<SchemaRegistry>,
    tables: HashMap<TableId, Table>,
}

impl InMemoryRelationStore {
    /// Create an empty store over `schema`.
    #[must_use]
    pub fn new(schema: Arc<SchemaRegistry>) -> Self {
        Self {
            schema,
            tables: HashMap::new(),
        }
    }

    /// Total number of stored rows across all tables.
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.tables
            .values()
            .flat_map(BTreeMap::values)
            .map(Vec::len)
            .sum()
    }

    /// Rebuild a store from enumerated rows. Rows are re-validated.
    pub fn from_snapshot(
        schema: Arc<SchemaRegistry>,
        tables: Vec<TableSnapshot>,
    ) -> Result<Self, StoreError> {
        let mut store = Self::new(schema);
        for snapshot in tables {
            let spec = table_spec(&store.schema, &snapshot.table)?.clone();
            for (owner, row) in snapshot.rows {
                let cells: Vec<(&str, Value)> = spec
                    .columns
                    .iter()
                    .map(|c| c.name.as_ref())
                    .zip(row.values)
                    .collect();
                store.insert(owner, &snapshot.table, &cells)?;
            }
        }
        Ok(store)
    }
}

impl RelationStore for InMemoryRelationStore {
    fn schema(&self) -> &SchemaRegistry {
        &self.schema
    }

    fn insert(
        &mut self,
        owner: NodeId,
        table: &TableId,
        cells: &[(&str, Value)],
    ) -> Result<(), StoreError> {
        let spec = table_spec(&self.schema, table)?;
        let row = build_row(spec, cells)?;
        let nullable = spec.is_nullable();

        let rows = self
            .tables
            .entry(table.clone())
            .or_default()
            .entry(owner)
            .or_default();
        if nullable {
            rows.clear();
        }
        rows.push(row);
        trace!(%owner, %table, "row inserted");
        Ok(())
    }

    fn remove(
        &mut self,
        owner: NodeId,
        table: &TableId,
        column: &str,
        value: &Value,
    ) -> Result<bool, StoreError> {
        let spec = table_spec(&self.schema, table)?;
        let (idx, _) = column_index(spec, column)?;

        let Some(data) = self.tables.get_mut(table) else {
            return Ok(false);
        };
        let Some(rows) = data.get_mut(&owner) else {
            return Ok(false);
        };
        let Some(pos) = rows.iter().position(|r| r.values.get(idx) == Some(value)) else {
            return Ok(false);
        };
        rows.remove(pos);
        if rows.is_empty() {
            data.remove(&owner);
        }
        trace!(%owner, %table, column, "row removed");
        Ok(true)
    }

    fn remove_all(&mut self, owner: NodeId, table: &TableId) -> Result<usize, StoreError> {
        table_spec(&self.schema, table)?;
        Ok(self
            .tables
            .get_mut(table)
            .and_then(|data| data.remove(&owner))
            .map_or(0, |rows| rows.len()))
    }

    fn select_rows(&self, owner: NodeId, table: &TableId) -> Result<Vec<Row>, StoreError> {
        table_spec(&self.schema, table)?;
        Ok(self
            .tables
            .get(table)
            .and_then(|data| data.get(&owner))
            .cloned()
            .unwrap_or_default())
    }

    fn select_where(
        &self,
        table: &TableId,
        column: &str,
        value: &Value,
    ) -> Result<Vec<NodeId>, StoreError> {
        let spec = table_spec(&self.schema, table)?;
        let (idx, _) = column_index(spec, column)?;
        let Some(data) = self.tables.get(table) else {
            return Ok(Vec::new());
        };
        Ok(data
            .iter()
            .filter(|(_, rows)| rows.iter().any(|r| r.values.get(idx) == Some(value)))
            .map(|(owner, _)| *owner)
            .collect())
    }

    fn rows(&self, table: &TableId) -> Result<Vec<(NodeId, Row)>, StoreError> {
        table_spec(&self.schema, table)?;
        let Some(data) = self.tables.get(table) else {
            return Ok(Vec::new());
        };
        Ok(data
            .iter()
            .flat_map(|(owner, rows)| rows.iter().map(move |r| (*owner, r.clone())))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeClass, NodeType, Role};
    use crate::schema::{columns, tables, RelationKind};
    use crate::value::{QuantityRange, ValueType};

    fn store() -> InMemoryRelationStore {
        InMemoryRelationStore::new(Arc::new(SchemaRegistry::standard().unwrap()))
    }

    fn n(raw: u64) -> NodeId {
        NodeId::from_raw(raw)
    }

    fn attributes() -> TableId {
        TableId::relation(
            NodeType::prototype(NodeClass::Entity),
            RelationKind::Attributes,
            false,
        )
    }

    fn quantity() -> TableId {
        TableId::new(
            NodeType::instance(Role::Valued, NodeClass::Attribute),
            tables::QUANTITY,
        )
    }

    #[test]
    fn insert_select_all_preserves_insertion_order() {
        let mut s = store();
        let t = attributes();
        for (target, inst) in [(10, 11), (20, 21), (5, 6)] {
            s.insert(
                n(1),
                &t,
                &[(columns::TARGET, n(target).into()), (columns::INSTANCE, n(inst).into())],
            )
            .unwrap();
        }
        let store: &dyn RelationStore = &s;
        let targets: Vec<NodeId> = store.select_all_as(n(1), &t, columns::TARGET).unwrap();
        assert_eq!(targets, vec![n(10), n(20), n(5)]);
        assert!(store.select_all(n(2), &t, columns::TARGET).unwrap().is_empty());
    }

    #[test]
    fn insert_validates_types_and_columns() {
        let mut s = store();
        let t = attributes();
        let err = s
            .insert(n(1), &t, &[(columns::TARGET, Value::Int(3)), (columns::INSTANCE, n(2).into())])
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::TypeMismatch { expected: ValueType::Node, actual: ValueType::Int, .. }
        ));

        let err = s.insert(n(1), &t, &[(columns::TARGET, n(3).into())]).unwrap_err();
        assert!(matches!(err, StoreError::MissingColumn { .. }));

        let err = s.insert(n(1), &t, &[("colour", n(3).into())]).unwrap_err();
        assert!(matches!(err, StoreError::UnknownColumn { .. }));

        let bogus = TableId::new(NodeType::prototype(NodeClass::Attribute), "parts");
        let err = s.insert(n(1), &bogus, &[]).unwrap_err();
        assert!(matches!(err, StoreError::UnknownTable { .. }));
    }

    #[test]
    fn remove_is_noop_safe() {
        let mut s = store();
        let t = attributes();
        s.insert(n(1), &t, &[(columns::TARGET, n(10).into()), (columns::INSTANCE, n(11).into())])
            .unwrap();

        assert!(!s.remove(n(1), &t, columns::TARGET, &n(99).into()).unwrap());
        assert!(!s.remove(n(2), &t, columns::TARGET, &n(10).into()).unwrap());
        assert!(s.remove(n(1), &t, columns::TARGET, &n(10).into()).unwrap());
        assert!(!s.remove(n(1), &t, columns::TARGET, &n(10).into()).unwrap());
        assert_eq!(s.row_count(), 0);
    }

    #[test]
    fn remove_all_only_touches_owner() {
        let mut s = store();
        let t = attributes();
        for owner in [1, 1, 2] {
            s.insert(n(owner), &t, &[(columns::TARGET, n(10).into()), (columns::INSTANCE, n(11).into())])
                .unwrap();
        }
        assert_eq!(s.remove_all(n(1), &t).unwrap(), 2);
        assert_eq!(s.remove_all(n(1), &t).unwrap(), 0);
        assert_eq!(s.row_count(), 1);
    }

    #[test]
    fn nullable_tables_hold_one_value() {
        let mut s = store();
        let t = quantity();
        let store: &mut dyn RelationStore = &mut s;
        assert_eq!(store.select(n(1), &t, columns::QUANTITY).unwrap(), None);

        store
            .set(n(1), &t, columns::QUANTITY, Some(QuantityRange::exactly(2).into()))
            .unwrap();
        store
            .set(n(1), &t, columns::QUANTITY, Some(QuantityRange::exactly(3).into()))
            .unwrap();
        let q: Option<QuantityRange> = store.select_as(n(1), &t, columns::QUANTITY).unwrap();
        assert_eq!(q, Some(QuantityRange::exactly(3)));

        store.set(n(1), &t, columns::QUANTITY, None).unwrap();
        assert_eq!(store.select(n(1), &t, columns::QUANTITY).unwrap(), None);
    }

    #[test]
    fn select_requires_nullable_table() {
        let s = store();
        let err = s.select(n(1), &attributes(), columns::TARGET).unwrap_err();
        assert!(matches!(err, StoreError::NotNullable { .. }));
    }

    #[test]
    fn select_where_finds_referrers() {
        let mut s = store();
        let t = attributes();
        s.insert(n(1), &t, &[(columns::TARGET, n(10).into()), (columns::INSTANCE, n(11).into())])
            .unwrap();
        s.insert(n(2), &t, &[(columns::TARGET, n(20).into()), (columns::INSTANCE, n(21).into())])
            .unwrap();
        s.insert(n(3), &t, &[(columns::TARGET, n(10).into()), (columns::INSTANCE, n(31).into())])
            .unwrap();

        assert_eq!(s.select_where(&t, columns::TARGET, &n(10).into()).unwrap(), vec![n(1), n(3)]);
        assert!(s.select_where(&t, columns::TARGET, &n(99).into()).unwrap().is_empty());
    }

    #[test]
    fn typed_select_reports_mismatch() {
        let mut s = store();
        let t = attributes();
        s.insert(n(1), &t, &[(columns::TARGET, n(10).into()), (columns::INSTANCE, n(11).into())])
            .unwrap();
        let store: &dyn RelationStore = &s;
        let err = store
            .select_all_as::<QuantityRange>(n(1), &t, columns::TARGET)
            .unwrap_err();
        assert!(matches!(err, StoreError::TypeMismatch { .. }));
    }

    #[test]
    fn snapshot_round_trip() {
        let mut s = store();
        let t = attributes();
        s.insert(n(1), &t, &[(columns::TARGET, n(10).into()), (columns::INSTANCE, n(11).into())])
            .unwrap();
        s.set(n(11), &quantity(), columns::QUANTITY, Some(QuantityRange::at_least(1).into()))
            .unwrap();

        let snap = s.snapshot().unwrap();
        assert_eq!(snap.len(), 2);
        let restored =
            InMemoryRelationStore::from_snapshot(Arc::clone(&s.schema), snap.clone()).unwrap();
        assert_eq!(restored.snapshot().unwrap(), snap);
    }
}
