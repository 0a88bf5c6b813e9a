//! Relational mapping layer
//!
//! The metadata side of the ORM boundary: entities, their attributes tagged
//! by descriptor kind, the catalog of mapped entities, and access to loaded
//! instances. Entities are described by hand with the [`Entity`] builder or
//! generated from structs with `#[derive(Mapped)]`:
//!
//! ```rust,ignore
//! use sqlgraph::Mapped;
//!
//! #[derive(Mapped, Clone)]
//! #[mapped(table = "pets")]
//! pub struct Pet {
//!     #[column(primary_key)]
//!     pub id: i32,
//!     /// The pet's name
//!     pub name: Option<String>,
//!     #[relationship(target = "Reporter")]
//!     pub reporter: Option<Reporter>,
//! }
//! ```

mod catalog;
mod entity;
pub mod instance;
mod session;
mod types;

use thiserror::Error;

pub use catalog::Catalog;
pub use entity::*;
pub use instance::{Instance, MappedInstance, Related, ToRelated, attribute_value};
pub use session::{AsyncSession, MemorySession, Session, SessionHandle};
pub use types::{SqlEnum, SqlType, TypeHint};

/// Types that describe a mapped entity.
///
/// Implemented by `#[derive(Mapped)]`.
pub trait Mapped {
    fn entity() -> Entity;
}

/// Inconsistent mapping metadata.
#[derive(Debug, Error)]
pub enum MappingError {
    #[error("Entity {0} is already mapped")]
    DuplicateEntity(String),

    #[error("Entity {entity} inherits from {parent}, which is not mapped yet")]
    UnknownParent { entity: String, parent: String },

    #[error("Relationship {entity}.{relationship} targets {target}, which is not mapped")]
    UnknownTarget {
        entity: String,
        relationship: String,
        target: String,
    },
}
