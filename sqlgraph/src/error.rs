//! Error types for schema construction and instance resolution.

use thiserror::Error;

use crate::mapping::MappingError;

/// Result alias for schema-construction operations.
pub type Result<T, E = SchemaError> = std::result::Result<T, E>;

/// Failures raised while building schema types.
///
/// Every variant is fatal to the schema build: a type that fails validation is
/// never registered, and no partially-constructed type is returned.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("You need to pass a valid mapped entity in {type_name}.meta, received \"{model}\"")]
    InvalidModel { type_name: String, model: String },

    #[error("The options 'only_fields' and 'exclude_fields' cannot be both set on the same type ({type_name})")]
    ConflictingFieldSelection { type_name: String },

    #[error("Cannot map OrmField to a model attribute. Field: '{type_name}.{field}'")]
    UnmappedOverride { type_name: String, field: String },

    #[error("OrmField options for composite fields must be empty. Field: {type_name}.{field}")]
    CompositeOverride { type_name: String, field: String },

    #[error("Don't know how to convert the composite field {type_name}.{field} ({composite_class})")]
    UnconvertibleComposite {
        type_name: String,
        field: String,
        composite_class: String,
    },

    #[error("Association proxy {type_name}.{field} cannot be converted: {reason}")]
    UnsupportedAssociationProxy {
        type_name: String,
        field: String,
        reason: String,
    },

    #[error("The connection of {type_name} must be a connection over {type_name}, received {connection} over {node}")]
    InvalidConnection {
        type_name: String,
        connection: String,
        node: String,
    },

    #[error("{type_name}: An interface cannot map to a concrete type (polymorphic_identity is \"{identity}\")")]
    ConcreteInterface { type_name: String, identity: String },

    #[error("Registry for a model has to match: {type_name} was built with another registry")]
    RegistryMismatch { type_name: String },

    #[error(transparent)]
    Mapping(#[from] MappingError),

    #[error("Failed to assemble GraphQL schema: {0}")]
    Build(#[from] async_graphql::dynamic::SchemaError),
}

/// Failures of instance-level operations used while resolving requests.
///
/// These never invalidate the schema; they fail the request being resolved.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("Received a pending value instead of a mapped instance. You seem to use an async session with synchronous schema execution")]
    PendingValue,

    #[error("Received incompatible instance \"{0}\"")]
    IncompatibleInstance(String),

    #[error(transparent)]
    Session(#[from] anyhow::Error),
}
