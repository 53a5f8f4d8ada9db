//! Scalar node properties: prototype names and instance target, quantity,
//! necessity, presence and value.

use crate::error::WorldResult;
use crate::monitor::{Property, View};
use crate::node::NodeId;
use crate::outcome::Outcome;
use crate::schema::{columns, tables, TableId};
use crate::storage::Cell;
use crate::value::{Necessity, Presence, QuantityRange, Value};

use super::World;

impl World {
    /// The name of a prototype. `None` for unnamed nodes and instances.
    pub fn name(&self, id: NodeId) -> WorldResult<Option<String>> {
        self.read_cell(id, tables::NAME, columns::NAME)
    }

    /// Rename a prototype; `None` clears the name.
    pub fn set_name(&mut self, id: NodeId, name: Option<&str>) -> WorldResult<Outcome> {
        self.write_cell(id, tables::NAME, columns::NAME, name.map(Value::from), Property::Name)
    }

    /// The node an instance refers to.
    pub fn target(&self, id: NodeId) -> WorldResult<Option<NodeId>> {
        self.read_cell(id, tables::TARGET, columns::TARGET)
    }

    /// Retarget a free-standing instance.
    ///
    /// Fails for instances held in a relation table, whose target is the
    /// entry's key, and for targets of another class.
    pub fn set_target(&mut self, id: NodeId, target: NodeId) -> WorldResult<Outcome> {
        if self.graph.attachment(id).is_some() {
            return Ok(Outcome::Fail);
        }
        let (Some(node_type), Some(target_type)) = (self.node_type(id), self.node_type(target))
        else {
            return Ok(Outcome::Fail);
        };
        if !node_type.is_instance()
            || target_type.is_instance()
            || !target_type.class().is_a(node_type.class())
        {
            return Ok(Outcome::Fail);
        }
        self.write_cell(
            id,
            tables::TARGET,
            columns::TARGET,
            Some(Value::Node(target)),
            Property::Target,
        )
    }

    /// Quantity range of an instance, if set.
    pub fn quantity(&self, id: NodeId) -> WorldResult<Option<QuantityRange>> {
        self.read_cell(id, tables::QUANTITY, columns::QUANTITY)
    }

    /// Set or clear the quantity range of an instance.
    pub fn set_quantity(&mut self, id: NodeId, quantity: Option<QuantityRange>) -> WorldResult<Outcome> {
        self.write_cell(
            id,
            tables::QUANTITY,
            columns::QUANTITY,
            quantity.map(Value::from),
            Property::Quantity,
        )
    }

    /// Necessity of an instance, if set.
    pub fn necessity(&self, id: NodeId) -> WorldResult<Option<Necessity>> {
        self.read_cell(id, tables::NECESSITY, columns::NECESSITY)
    }

    /// Set or clear the necessity of an instance.
    pub fn set_necessity(&mut self, id: NodeId, necessity: Option<Necessity>) -> WorldResult<Outcome> {
        self.write_cell(
            id,
            tables::NECESSITY,
            columns::NECESSITY,
            necessity.map(Value::from),
            Property::Necessity,
        )
    }

    /// Presence of an instance, if set.
    pub fn presence(&self, id: NodeId) -> WorldResult<Option<Presence>> {
        self.read_cell(id, tables::PRESENCE, columns::PRESENCE)
    }

    /// Set or clear the presence of an instance.
    pub fn set_presence(&mut self, id: NodeId, presence: Option<Presence>) -> WorldResult<Outcome> {
        self.write_cell(
            id,
            tables::PRESENCE,
            columns::PRESENCE,
            presence.map(Value::from),
            Property::Presence,
        )
    }

    /// The scalar value of an instance (bool, int, float or text).
    pub fn value(&self, id: NodeId) -> WorldResult<Option<Value>> {
        self.read_cell(id, tables::VALUE, columns::VALUE)
    }

    /// Set the scalar value of an instance. Non-scalar values fail.
    pub fn set_value(&mut self, id: NodeId, value: Option<Value>) -> WorldResult<Outcome> {
        if value.as_ref().is_some_and(|v| !v.is_scalar()) {
            return Ok(Outcome::Fail);
        }
        self.write_cell(id, tables::VALUE, columns::VALUE, value, Property::Value)
    }

    fn property_table(&self, id: NodeId, table: &'static str) -> Option<TableId> {
        let table = TableId::new(self.graph.node_type(id)?, table);
        self.schema().table(&table).is_some().then_some(table)
    }

    fn read_cell<T: Cell>(&self, id: NodeId, table: &'static str, column: &str) -> WorldResult<Option<T>> {
        self.require(id)?;
        let Some(table) = self.property_table(id, table) else {
            return Ok(None);
        };
        Ok(self.store().select_as::<T>(id, &table, column)?)
    }

    fn write_cell(
        &mut self,
        id: NodeId,
        table: &'static str,
        column: &str,
        value: Option<Value>,
        property: Property,
    ) -> WorldResult<Outcome> {
        let Some(table) = self.property_table(id, table) else {
            return Ok(Outcome::Fail);
        };
        self.store.set(id, &table, column, value)?;
        self.notify(id, property);

        if let Some(attachment) = self.graph.attachment(id) {
            if self.contains(attachment.owner) {
                let key = self.target(id)?;
                self.notify_relation(attachment.owner, attachment.kind, View::Effective, key)?;
            }
        }
        Ok(Outcome::Success(()))
    }
}
