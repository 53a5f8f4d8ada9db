//! # KyroWorld - Semantic World Model
//!
//! KyroWorld stores the object model of a simulated world: prototype nodes in a
//! multi-parent inheritance graph, each carrying typed relation collections
//! that children inherit and may override.
//!
//! ## Core Concepts
//!
//! - **Prototype**: A world node (entity, tangible object, space, compound,
//!   substance, attribute, event, variable)
//! - **Relation instance**: A node owned by a prototype that points at a target
//!   and carries quantity, necessity, presence and value
//! - **Role**: Every relation kind exists as valued data, a condition and a change
//! - **Tiers**: A node's effective relations are its personal entries, then the
//!   inherited ones, then its overrides
//! - **Brackets**: Change and remove brackets batch and deduplicate notifications
//!
//! ## Usage
//!
//! ```rust
//! use kyroworld::{NodeClass, RelationViews, Value, World, WorldConfig};
//!
//! let mut world = World::new(WorldConfig::default())?;
//! let flammable = world.create_node(NodeClass::Attribute, "flammable")?;
//! let wood = world.create_node(NodeClass::TangibleObject, "wood")?;
//! let plank = world.create_node(NodeClass::TangibleObject, "plank")?;
//! assert!(plank.add_parent(&mut world, wood)?.is_success());
//!
//! let entry = wood.add_attribute(&mut world, flammable)?.success().unwrap();
//! assert!(entry.set_value(&mut world, Some(Value::Bool(true)))?.is_success());
//!
//! assert!(plank.has_attribute(&world, flammable)?);
//! # Ok::<(), kyroworld::WorldError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

// Core types
pub mod config;
pub mod error;
pub mod node;
pub mod outcome;
pub mod value;

// Schema and storage
pub mod schema;
pub mod storage;

// Inheritance and resolution
pub mod graph;
pub mod resolver;

// Batching and notification
pub mod monitor;
pub mod transaction;

// Domain surface
pub mod instance;
pub mod views;
pub mod world;

pub use config::WorldConfig;
pub use error::{SchemaError, StoreError, ValidationError, WorldError, WorldResult};
pub use graph::InheritanceGraph;
pub use instance::{role, ChangeEntity, ConditionEntity, RelationInstance, RoleMarker, ValuedEntity};
pub use monitor::{ChangeEvent, ChangeStream, Property, SubscriptionId, View};
pub use node::{NodeClass, NodeId, NodeType, Role};
pub use outcome::Outcome;
pub use resolver::{RelationEntry, Tier};
pub use schema::{RelationKind, SchemaBuilder, SchemaRegistry};
pub use storage::{InMemoryRelationStore, RelationStore};
pub use value::{Necessity, Presence, QuantityRange, Value, ValueType};
pub use views::{Handle, Prototype, RelationViews};
pub use world::{ChangeReport, World, WorldSnapshot};
