//! Relation storage.
//!
//! [`RelationStore`] defines the physical table contract; [`InMemoryRelationStore`]
//! is the backend used by [`crate::World`].

mod memory;
mod traits;

pub use memory::InMemoryRelationStore;
pub use traits::{Cell, RelationStore, Row, TableSnapshot};
