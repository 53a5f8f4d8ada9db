//! Abstract relation store contract.
//!
//! The store is the single shared mutable resource of a world: every write to
//! a relation table goes through [`RelationStore::insert`],
//! [`RelationStore::remove`] or [`RelationStore::remove_all`] so that schema
//! and multiplicity checks are always applied.

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::node::{NodeId, NodeType};
use crate::schema::{SchemaRegistry, TableId, TableSpec};
use crate::value::{Necessity, Presence, QuantityRange, Value, ValueType};

/// One stored row. Values are aligned with the table's declared columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    /// Cells in the table's column order.
    pub values: Vec<Value>,
}

impl Row {
    /// The value in `column` of a row belonging to `spec`.
    #[must_use]
    pub fn get<'a>(&'a self, spec: &TableSpec, column: &str) -> Option<&'a Value> {
        let (idx, _) = spec.column(column)?;
        self.values.get(idx)
    }
}

/// Every row of one table, as enumerated for an external serializer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSnapshot {
    /// Table the rows belong to.
    pub table: TableId,
    /// Rows with their owners, ordered by owner.
    pub rows: Vec<(NodeId, Row)>,
}

/// Storage trait for relation tables.
///
/// Rows are keyed by owner node id. Per owner, rows keep insertion order;
/// callers rely on that for deterministic iteration only.
pub trait RelationStore: Send {
    /// The schema this store validates against.
    fn schema(&self) -> &SchemaRegistry;

    /// Append a row. Columns not given must be nullable.
    ///
    /// Unique columns are not deduplicated: callers check membership first.
    /// Nullable tables hold a single row per owner, so an insert replaces any
    /// existing row for that owner.
    fn insert(
        &mut self,
        owner: NodeId,
        table: &TableId,
        cells: &[(&str, Value)],
    ) -> Result<(), StoreError>;

    /// Delete the first row of `owner` whose `column` equals `value`.
    /// Returns whether a row was removed.
    fn remove(
        &mut self,
        owner: NodeId,
        table: &TableId,
        column: &str,
        value: &Value,
    ) -> Result<bool, StoreError>;

    /// Delete every row owned by `owner` in `table`. Returns the count removed.
    fn remove_all(&mut self, owner: NodeId, table: &TableId) -> Result<usize, StoreError>;

    /// Whole rows of `owner`, in insertion order.
    fn select_rows(&self, owner: NodeId, table: &TableId) -> Result<Vec<Row>, StoreError>;

    /// Owners having at least one row whose `column` equals `value`.
    ///
    /// Linear scan; the store keeps no secondary indices.
    fn select_where(
        &self,
        table: &TableId,
        column: &str,
        value: &Value,
    ) -> Result<Vec<NodeId>, StoreError>;

    /// Every row of `table`, ordered by owner then insertion.
    fn rows(&self, table: &TableId) -> Result<Vec<(NodeId, Row)>, StoreError>;

    /// Values of `column` in every row of `owner`, in insertion order.
    fn select_all(
        &self,
        owner: NodeId,
        table: &TableId,
        column: &str,
    ) -> Result<Vec<Value>, StoreError> {
        let spec = table_spec(self.schema(), table)?;
        let (idx, _) = column_index(spec, column)?;
        Ok(self
            .select_rows(owner, table)?
            .into_iter()
            .filter_map(|mut row| {
                if idx < row.values.len() {
                    Some(row.values.swap_remove(idx))
                } else {
                    None
                }
            })
            .collect())
    }

    /// The single optional value of a nullable `column`.
    fn select(
        &self,
        owner: NodeId,
        table: &TableId,
        column: &str,
    ) -> Result<Option<Value>, StoreError> {
        let spec = table_spec(self.schema(), table)?;
        if !spec.is_nullable() {
            return Err(StoreError::NotNullable {
                table: table.to_string(),
            });
        }
        Ok(self
            .select_all(owner, table, column)?
            .into_iter()
            .next()
            .filter(|v| !v.is_null()))
    }

    /// Replace the single optional value of a nullable `column`.
    /// `None` clears it.
    fn set(
        &mut self,
        owner: NodeId,
        table: &TableId,
        column: &str,
        value: Option<Value>,
    ) -> Result<(), StoreError> {
        let spec = table_spec(self.schema(), table)?;
        if !spec.is_nullable() {
            return Err(StoreError::NotNullable {
                table: table.to_string(),
            });
        }
        match value {
            Some(v) => self.insert(owner, table, &[(column, v)]),
            None => self.remove_all(owner, table).map(|_| ()),
        }
    }

    /// Number of rows `owner` holds across every table of `node_type`.
    fn owned_row_count(&self, owner: NodeId, node_type: NodeType) -> Result<usize, StoreError> {
        let ids: Vec<TableId> = self
            .schema()
            .tables_for(node_type)
            .map(|spec| spec.id.clone())
            .collect();
        let mut count = 0;
        for id in &ids {
            count += self.select_rows(owner, id)?.len();
        }
        Ok(count)
    }

    /// Enumerate every non-empty table.
    fn snapshot(&self) -> Result<Vec<TableSnapshot>, StoreError> {
        let ids: Vec<TableId> = self.schema().iter().map(|spec| spec.id.clone()).collect();
        let mut out = Vec::new();
        for table in ids {
            let rows = self.rows(&table)?;
            if !rows.is_empty() {
                out.push(TableSnapshot { table, rows });
            }
        }
        Ok(out)
    }
}

/// Typed access to cell values.
pub trait Cell: Sized {
    /// Declared type this cell decodes from.
    const TYPE: ValueType;

    fn from_value(value: &Value) -> Option<Self>;
}

impl Cell for NodeId {
    const TYPE: ValueType = ValueType::Node;

    fn from_value(value: &Value) -> Option<Self> {
        value.as_node()
    }
}

impl Cell for QuantityRange {
    const TYPE: ValueType = ValueType::Range;

    fn from_value(value: &Value) -> Option<Self> {
        value.as_range()
    }
}

impl Cell for Necessity {
    const TYPE: ValueType = ValueType::Necessity;

    fn from_value(value: &Value) -> Option<Self> {
        value.as_necessity()
    }
}

impl Cell for Presence {
    const TYPE: ValueType = ValueType::Presence;

    fn from_value(value: &Value) -> Option<Self> {
        value.as_presence()
    }
}

impl Cell for String {
    const TYPE: ValueType = ValueType::Text;

    fn from_value(value: &Value) -> Option<Self> {
        value.as_string().map(str::to_string)
    }
}

impl Cell for Value {
    const TYPE: ValueType = ValueType::Scalar;

    fn from_value(value: &Value) -> Option<Self> {
        value.is_scalar().then(|| value.clone())
    }
}

fn decode<T: Cell>(table: &TableId, column: &str, value: &Value) -> Result<T, StoreError> {
    T::from_value(value).ok_or_else(|| StoreError::TypeMismatch {
        table: table.to_string(),
        column: column.to_string(),
        expected: T::TYPE,
        actual: value.value_type().unwrap_or(T::TYPE),
    })
}

impl<'a> dyn RelationStore + 'a {
    /// Typed [`RelationStore::select_all`]. A stored value of the wrong type
    /// is a [`StoreError::TypeMismatch`].
    pub fn select_all_as<T: Cell>(
        &self,
        owner: NodeId,
        table: &TableId,
        column: &str,
    ) -> Result<Vec<T>, StoreError> {
        self.select_all(owner, table, column)?
            .iter()
            .map(|v| decode(table, column, v))
            .collect()
    }

    /// Typed [`RelationStore::select`].
    pub fn select_as<T: Cell>(
        &self,
        owner: NodeId,
        table: &TableId,
        column: &str,
    ) -> Result<Option<T>, StoreError> {
        self.select(owner, table, column)?
            .map(|v| decode(table, column, &v))
            .transpose()
    }
}

pub(crate) fn table_spec<'a>(
    schema: &'a SchemaRegistry,
    table: &TableId,
) -> Result<&'a TableSpec, StoreError> {
    schema.table(table).ok_or_else(|| StoreError::UnknownTable {
        table: table.to_string(),
    })
}

pub(crate) fn column_index<'a>(
    spec: &'a TableSpec,
    column: &str,
) -> Result<(usize, &'a crate::schema::ColumnSpec), StoreError> {
    spec.column(column).ok_or_else(|| StoreError::UnknownColumn {
        table: spec.id.to_string(),
        column: column.to_string(),
    })
}
