//! sqlgraph - GraphQL schema types reflected from relational entity metadata
//!
//! Describe relational entities with the [`mapping`] layer (by hand or with
//! `#[derive(Mapped)]`), declare type definitions with field overrides, and
//! build object types, interfaces and filter input types from them with
//! [`graphql`].

extern crate self as sqlgraph;

pub mod config;
pub mod error;
pub mod graphql;
pub mod mapping;

pub use async_graphql;
pub use sqlgraph_macros::Mapped;

pub use config::Config;
pub use error::{ResolveError, SchemaError};
pub use mapping::Mapped;
