//! Reflection of mapped entities into schema types.
//!
//! A [`TypeDefinition`] names the entity to reflect (through its
//! [`TypeConfig`]), the [`OrmField`] overrides and the custom resolvers of a
//! type. [`build_object_type`] and [`build_interface`] run the first build
//! phase; [`Registry::resolve_deferred`](crate::graphql::Registry::resolve_deferred)
//! runs the second once every type is built.

mod base;
pub mod construct;
pub mod dynamic;
mod field;
pub mod filter_field;
pub mod node;

pub use base::{
    InterfaceRef, NODE_INTERFACE, SchemaType, TypeConfig, TypeKind, build_interface,
    build_object_type,
};
pub use construct::{Constructed, ConstructionContext, construct_fields_and_filters};
pub use dynamic::{DynamicField, ResolvedRelationship};
pub use field::{FieldOptions, OrmField, TypeDefinition};
pub use filter_field::{
    filter_field_from_field, filter_field_from_type_field, get_or_create_relationship_filter,
};
pub use node::{Candidate, NodeLookup, from_global_id, to_global_id};
