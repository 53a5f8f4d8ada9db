//! Schema registry.
//!
//! Declares which relation tables exist for each node type, the value type
//! each column stores and its multiplicity. The registry is populated once at
//! startup and read-only afterward.

mod registry;
mod relation;

pub use registry::{
    columns, tables, ColumnSpec, Multiplicity, SchemaBuilder, SchemaRegistry, TableId, TableSpec,
};
pub use relation::{RelationDescriptor, RelationKind};
