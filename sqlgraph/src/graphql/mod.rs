//! GraphQL schema types reflected from relational entities
//!
//! This module turns mapped entities into GraphQL object types, interfaces and
//! filter input types, and emits them as an `async_graphql` dynamic schema.
//!
//! Building a schema takes two phases:
//!
//! 1. Build every type definition with [`build_object_type`] or
//!    [`build_interface`]. Relationship fields and the filters that depend on
//!    them stay unresolved while their target types may not exist yet.
//! 2. Resolve them with [`Registry::resolve_deferred`], or let
//!    [`render::build_schema`] do it while rendering.
//!
//! ```rust,ignore
//! let registry = Arc::new(Registry::new());
//! let pet = TypeDefinition::new("Pet")
//!     .meta(TypeConfig::new("Pet").registry(registry.clone()).interface(InterfaceRef::Node))
//!     .field("name", OrmField::new().required(true));
//! build_object_type(&catalog, &pet)?;
//!
//! let query = Object::new("Query").field(render::node_field(registry.clone()));
//! let schema = render::build_schema(&registry, query)?;
//! ```

pub mod convert;
pub mod filters;
pub mod orm;
pub mod pagination;
mod registry;
pub mod render;
pub mod types;

pub use filters::{FilterInputField, FilterOperator, FilterType};
pub use orm::{
    InterfaceRef, OrmField, SchemaType, TypeConfig, TypeDefinition, build_interface,
    build_object_type,
};
pub use pagination::{ConnectionClass, ConnectionType};
pub use registry::{CompositeConverter, Diagnostic, Registry};
pub use types::{FieldShape, FieldType, GqlType, LazyType, Resolver, Scalar, SchemaField};
