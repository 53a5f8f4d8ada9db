//! Table declarations and the immutable schema registry.

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SchemaError;
use crate::node::NodeType;
use crate::value::ValueType;

use super::relation::RelationKind;

/// Column names shared by the standard tables.
pub mod columns {
    /// Node a relation entry (or an instance) points at.
    pub const TARGET: &str = "target";
    /// Relation instance node backing a relation entry.
    pub const INSTANCE: &str = "instance";
    /// Prototype name.
    pub const NAME: &str = "name";
    /// Quantity range.
    pub const QUANTITY: &str = "quantity";
    /// Necessity.
    pub const NECESSITY: &str = "necessity";
    /// Presence.
    pub const PRESENCE: &str = "presence";
    /// Scalar value.
    pub const VALUE: &str = "value";
}

/// Standard per-node property tables. Each holds one nullable column of the
/// same name.
pub mod tables {
    /// Prototype names.
    pub const NAME: &str = "name";
    /// Instance targets.
    pub const TARGET: &str = "target";
    /// Instance quantity ranges.
    pub const QUANTITY: &str = "quantity";
    /// Instance necessities.
    pub const NECESSITY: &str = "necessity";
    /// Instance presences.
    pub const PRESENCE: &str = "presence";
    /// Instance scalar values.
    pub const VALUE: &str = "value";
}

const NAME_PATTERN: &str = "^[a-z][a-z0-9_]*$";

static NAME_RE: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();

fn is_valid_name(name: &str) -> bool {
    NAME_RE
        .get_or_init(|| Regex::new(NAME_PATTERN))
        .as_ref()
        .map_or(false, |re| re.is_match(name))
}

/// How many entries a column may hold per owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Multiplicity {
    /// At most one entry per (owner, value). Enforced by callers, not the store.
    Unique,
    /// Many-to-many join entries without a singular key.
    Intermediate,
    /// A single optional scalar per owner.
    Nullable,
}

/// Identifies a table: the owning node type plus a table name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TableId {
    /// Node type whose nodes own the rows.
    pub node_type: NodeType,
    /// Table name, unique per node type.
    pub name: Cow<'static, str>,
}

impl TableId {
    /// Table `name` of `node_type`.
    #[must_use]
    pub fn new(node_type: NodeType, name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            node_type,
            name: name.into(),
        }
    }

    /// The personal or overridden table of `kind` for `node_type`.
    #[must_use]
    pub fn relation(node_type: NodeType, kind: RelationKind, overridden: bool) -> Self {
        let name = if overridden {
            kind.overridden_table_name()
        } else {
            kind.table_name()
        };
        Self::new(node_type, name)
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.node_type, self.name)
    }
}

/// One column of a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    /// Column name, unique within the table.
    pub name: Cow<'static, str>,
    /// Declared cell type.
    pub value_type: ValueType,
    /// How many values an owner may hold.
    pub multiplicity: Multiplicity,
}

impl ColumnSpec {
    /// A column declaration.
    #[must_use]
    pub fn new(
        name: impl Into<Cow<'static, str>>,
        value_type: ValueType,
        multiplicity: Multiplicity,
    ) -> Self {
        Self {
            name: name.into(),
            value_type,
            multiplicity,
        }
    }
}

/// A registered table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSpec {
    /// Owning node type and table name.
    pub id: TableId,
    /// Columns in row order.
    pub columns: Vec<ColumnSpec>,
}

impl TableSpec {
    /// Position and declaration of a column.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<(usize, &ColumnSpec)> {
        self.columns
            .iter()
            .enumerate()
            .find(|(_, c)| c.name == name)
    }

    /// True when every column is nullable, i.e. the table holds at most one
    /// row per owner.
    #[must_use]
    pub fn is_nullable(&self) -> bool {
        self.columns
            .iter()
            .all(|c| c.multiplicity == Multiplicity::Nullable)
    }
}

#[derive(Debug, Deserialize)]
struct ColumnDeclaration {
    #[serde(rename = "type")]
    value_type: String,
    multiplicity: Multiplicity,
}

#[derive(Debug, Deserialize)]
struct TableDeclaration {
    node_type: String,
    table: String,
    columns: BTreeMap<String, ColumnDeclaration>,
}

/// Collects table declarations before the registry is frozen.
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    tables: BTreeMap<TableId, TableSpec>,
}

impl SchemaBuilder {
    /// An empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A builder pre-populated with every table the relation kinds and the
    /// node property tables imply, for every node type.
    pub fn standard() -> Result<Self, SchemaError> {
        let mut builder = Self::new();
        for node_type in NodeType::all() {
            for (name, columns) in standard_tables(node_type) {
                builder.register_table(node_type, name, columns)?;
            }
        }
        Ok(builder)
    }

    /// Declares a table. Registering the same (node type, name) twice is an
    /// error.
    pub fn register_table(
        &mut self,
        node_type: NodeType,
        name: impl Into<Cow<'static, str>>,
        columns: impl IntoIterator<Item = ColumnSpec>,
    ) -> Result<&mut Self, SchemaError> {
        let id = TableId::new(node_type, name);
        if !is_valid_name(&id.name) {
            return Err(SchemaError::MalformedTableName {
                name: id.name.into_owned(),
            });
        }
        if self.tables.contains_key(&id) {
            return Err(SchemaError::DuplicateTable {
                table: id.to_string(),
            });
        }

        let columns: Vec<ColumnSpec> = columns.into_iter().collect();
        if columns.is_empty() {
            return Err(SchemaError::EmptyTable {
                table: id.to_string(),
            });
        }
        let mut seen = BTreeSet::new();
        for column in &columns {
            if !is_valid_name(&column.name) {
                return Err(SchemaError::MalformedColumnName {
                    table: id.to_string(),
                    column: column.name.to_string(),
                });
            }
            if !seen.insert(column.name.clone()) {
                return Err(SchemaError::DuplicateColumn {
                    table: id.to_string(),
                    column: column.name.to_string(),
                });
            }
        }

        debug!(table = %id, columns = columns.len(), "registered table");
        self.tables.insert(id.clone(), TableSpec { id, columns });
        Ok(self)
    }

    /// Declares extra tables from a JSON array:
    ///
    /// ```json
    /// [{"node_type": "tangible_object", "table": "temperature",
    ///   "columns": {"celsius": {"type": "float", "multiplicity": "nullable"}}}]
    /// ```
    pub fn register_json(&mut self, json: &str) -> Result<&mut Self, SchemaError> {
        let declarations: Vec<TableDeclaration> =
            serde_json::from_str(json).map_err(|e| SchemaError::InvalidDeclaration {
                reason: e.to_string(),
            })?;

        for decl in declarations {
            let node_type: NodeType = decl.node_type.parse()?;
            let mut columns = Vec::with_capacity(decl.columns.len());
            for (name, col) in decl.columns {
                let value_type: ValueType =
                    col.value_type
                        .parse()
                        .map_err(|_| SchemaError::UnknownValueType {
                            table: decl.table.clone(),
                            column: name.clone(),
                            type_name: col.value_type.clone(),
                        })?;
                columns.push(ColumnSpec::new(name, value_type, col.multiplicity));
            }
            self.register_table(node_type, decl.table, columns)?;
        }
        Ok(self)
    }

    /// Freezes the declarations.
    #[must_use]
    pub fn build(self) -> SchemaRegistry {
        let mut by_type: BTreeMap<NodeType, Vec<TableId>> = BTreeMap::new();
        let mut hasher = blake3::Hasher::new();
        for (id, spec) in &self.tables {
            by_type.entry(id.node_type).or_default().push(id.clone());
            hasher.update(id.to_string().as_bytes());
            for column in &spec.columns {
                hasher.update(b"|");
                hasher.update(column.name.as_bytes());
                hasher.update(column.value_type.name().as_bytes());
                hasher.update(format!("{:?}", column.multiplicity).as_bytes());
            }
            hasher.update(b"\n");
        }
        let fingerprint = hasher.finalize().to_hex().to_string();
        debug!(tables = self.tables.len(), %fingerprint, "schema frozen");

        SchemaRegistry {
            tables: self.tables,
            by_type,
            fingerprint,
        }
    }
}

fn relation_columns(kind: RelationKind) -> Vec<ColumnSpec> {
    vec![
        ColumnSpec::new(columns::TARGET, ValueType::Node, kind.descriptor().key),
        ColumnSpec::new(columns::INSTANCE, ValueType::Node, Multiplicity::Intermediate),
    ]
}

fn nullable(column: &'static str, value_type: ValueType) -> Vec<ColumnSpec> {
    vec![ColumnSpec::new(column, value_type, Multiplicity::Nullable)]
}

fn standard_tables(node_type: NodeType) -> Vec<(&'static str, Vec<ColumnSpec>)> {
    let mut out = Vec::new();
    if node_type.is_instance() {
        out.push((tables::TARGET, nullable(columns::TARGET, ValueType::Node)));
        out.push((tables::QUANTITY, nullable(columns::QUANTITY, ValueType::Range)));
        out.push((tables::NECESSITY, nullable(columns::NECESSITY, ValueType::Necessity)));
        out.push((tables::PRESENCE, nullable(columns::PRESENCE, ValueType::Presence)));
        out.push((tables::VALUE, nullable(columns::VALUE, ValueType::Scalar)));
    } else {
        out.push((tables::NAME, nullable(columns::NAME, ValueType::Text)));
    }
    for kind in RelationKind::for_owner(node_type) {
        out.push((kind.table_name(), relation_columns(kind)));
        if kind.is_overridable() {
            out.push((kind.overridden_table_name(), relation_columns(kind)));
        }
    }
    out
}

/// Immutable table declarations, shared by the store and the world.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    tables: BTreeMap<TableId, TableSpec>,
    by_type: BTreeMap<NodeType, Vec<TableId>>,
    fingerprint: String,
}

impl SchemaRegistry {
    /// The standard schema with no extra tables.
    pub fn standard() -> Result<Self, SchemaError> {
        Ok(SchemaBuilder::standard()?.build())
    }

    /// Look up a table declaration.
    #[must_use]
    pub fn table(&self, id: &TableId) -> Option<&TableSpec> {
        self.tables.get(id)
    }

    /// Every table declared for `node_type`.
    pub fn tables_for(&self, node_type: NodeType) -> impl Iterator<Item = &TableSpec> {
        self.by_type
            .get(&node_type)
            .into_iter()
            .flatten()
            .filter_map(|id| self.tables.get(id))
    }

    /// Every declared table.
    pub fn iter(&self) -> impl Iterator<Item = &TableSpec> {
        self.tables.values()
    }

    /// Number of registered tables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Whether no tables are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Stable hash of the declarations (blake3, hex).
    #[must_use]
    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Returns the first standard table missing from this registry, if any.
    #[must_use]
    pub fn missing_standard_table(&self) -> Option<TableId> {
        NodeType::all().into_iter().find_map(|node_type| {
            standard_tables(node_type)
                .into_iter()
                .map(|(name, _)| TableId::new(node_type, name))
                .find(|id| !self.tables.contains_key(id))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{NodeClass, Role};

    fn object() -> NodeType {
        NodeType::prototype(NodeClass::TangibleObject)
    }

    #[test]
    fn standard_schema_declares_relation_tables() {
        let registry = SchemaRegistry::standard().unwrap();
        let parts = registry
            .table(&TableId::relation(object(), RelationKind::Parts, false))
            .unwrap();
        assert_eq!(parts.columns.len(), 2);
        assert_eq!(parts.column(columns::TARGET).unwrap().1.multiplicity, Multiplicity::Unique);
        assert!(registry
            .table(&TableId::relation(object(), RelationKind::Parts, true))
            .is_some());
        assert!(registry.missing_standard_table().is_none());
    }

    #[test]
    fn intermediate_kinds_have_no_overridden_table() {
        let registry = SchemaRegistry::standard().unwrap();
        let event = NodeType::prototype(NodeClass::Event);
        let variables = registry
            .table(&TableId::relation(event, RelationKind::Variables, false))
            .unwrap();
        assert_eq!(
            variables.column(columns::TARGET).unwrap().1.multiplicity,
            Multiplicity::Intermediate
        );
        assert!(registry
            .table(&TableId::relation(event, RelationKind::Variables, true))
            .is_none());
    }

    #[test]
    fn instance_property_tables_are_nullable() {
        let registry = SchemaRegistry::standard().unwrap();
        let cond = NodeType::instance(Role::Condition, NodeClass::Substance);
        let quantity = registry.table(&TableId::new(cond, tables::QUANTITY)).unwrap();
        assert!(quantity.is_nullable());
        assert!(registry.table(&TableId::new(cond, tables::NAME)).is_none());
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let mut builder = SchemaBuilder::standard().unwrap();
        let err = builder
            .register_table(object(), "parts", [ColumnSpec::new("x", ValueType::Int, Multiplicity::Nullable)])
            .unwrap_err();
        assert!(matches!(err, SchemaError::DuplicateTable { .. }));
    }

    #[test]
    fn malformed_names_are_rejected() {
        let mut builder = SchemaBuilder::new();
        let col = || ColumnSpec::new("x", ValueType::Int, Multiplicity::Nullable);
        assert!(matches!(
            builder.register_table(object(), "Bad Name", [col()]).unwrap_err(),
            SchemaError::MalformedTableName { .. }
        ));
        assert!(matches!(
            builder.register_table(object(), "", [col()]).unwrap_err(),
            SchemaError::MalformedTableName { .. }
        ));
        assert!(matches!(
            builder
                .register_table(
                    object(),
                    "ok",
                    [ColumnSpec::new("9x", ValueType::Int, Multiplicity::Nullable)]
                )
                .unwrap_err(),
            SchemaError::MalformedColumnName { .. }
        ));
        assert!(matches!(
            builder
                .register_table(object(), "empty", Vec::<ColumnSpec>::new())
                .unwrap_err(),
            SchemaError::EmptyTable { .. }
        ));
    }

    #[test]
    fn json_declarations_register_tables() {
        let mut builder = SchemaBuilder::standard().unwrap();
        builder
            .register_json(
                r#"[{"node_type": "tangible_object", "table": "temperature",
                     "columns": {"celsius": {"type": "float", "multiplicity": "nullable"}}}]"#,
            )
            .unwrap();
        let registry = builder.build();
        let spec = registry.table(&TableId::new(object(), "temperature")).unwrap();
        assert_eq!(spec.columns[0].value_type, ValueType::Float);
    }

    #[test]
    fn json_unknown_value_type_is_rejected() {
        let mut builder = SchemaBuilder::new();
        let err = builder
            .register_json(
                r#"[{"node_type": "space", "table": "volume",
                     "columns": {"litres": {"type": "decimal", "multiplicity": "nullable"}}}]"#,
            )
            .unwrap_err();
        assert!(matches!(err, SchemaError::UnknownValueType { .. }));

        let err = builder.register_json("not json").unwrap_err();
        assert!(matches!(err, SchemaError::InvalidDeclaration { .. }));
    }

    #[test]
    fn fingerprint_tracks_declarations() {
        let a = SchemaRegistry::standard().unwrap();
        let b = SchemaRegistry::standard().unwrap();
        assert_eq!(a.fingerprint(), b.fingerprint());

        let mut builder = SchemaBuilder::standard().unwrap();
        builder
            .register_table(object(), "colour", [ColumnSpec::new("rgb", ValueType::Text, Multiplicity::Nullable)])
            .unwrap();
        assert_ne!(builder.build().fingerprint(), a.fingerprint());
    }
}
