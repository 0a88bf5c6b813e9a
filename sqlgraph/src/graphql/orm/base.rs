//! Schema types reflected from mapped entities.
//!
//! [`build_object_type`] and [`build_interface`] turn a [`TypeDefinition`]
//! into a finished [`SchemaType`]: they validate the configuration, construct
//! fields and filters, wire the connection type, memoize the base filter and
//! register the result in the registry. Relationship fields stay unresolved
//! until [`Registry::resolve_deferred`] runs.

use std::fmt;
use std::sync::Arc;

use async_graphql::Value;
use async_graphql::dynamic::{InputValue, TypeRef};
use indexmap::IndexMap;

use super::construct::{ConstructionContext, construct_fields_and_filters};
use super::field::TypeDefinition;
use crate::config::Config;
use crate::error::{Result, SchemaError};
use crate::graphql::Registry;
use crate::graphql::filters::FilterType;
use crate::graphql::pagination::{
    ConnectionClass, ConnectionFieldFactory, ConnectionType, FactoryDebug,
};
use crate::graphql::types::{FieldShape, GqlType, Resolver, Scalar, SchemaField};
use crate::mapping::{Catalog, Entity};

/// Name of the relay node interface.
pub const NODE_INTERFACE: &str = "Node";

/// Configuration of a reflected type.
#[derive(Clone)]
pub struct TypeConfig {
    /// Name of the mapped entity
    pub model: String,
    /// Registry to build into; the global registry when unset
    pub registry: Option<Arc<Registry>>,
    pub skip_registry: bool,
    pub only_fields: Vec<String>,
    pub exclude_fields: Vec<String>,
    pub connection: Option<Arc<ConnectionType>>,
    pub connection_class: Option<ConnectionClass>,
    /// Whether to create a connection type; implied by the `Node` interface when unset
    pub use_connection: Option<bool>,
    pub interfaces: Vec<InterfaceRef>,
    /// Name of the identifier field
    pub id: Option<String>,
    pub batching: bool,
    pub connection_field_factory: Option<ConnectionFieldFactory>,
    /// Default of the per-field filter toggle
    pub create_filters: bool,
    pub description: Option<String>,
    /// Fields declared ahead of reflection
    pub fields: IndexMap<String, SchemaField>,
    pub filter_class: Option<Arc<FilterType>>,
    pub options: IndexMap<String, Value>,
}

impl TypeConfig {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            registry: None,
            skip_registry: false,
            only_fields: Vec::new(),
            exclude_fields: Vec::new(),
            connection: None,
            connection_class: None,
            use_connection: None,
            interfaces: Vec::new(),
            id: None,
            batching: false,
            connection_field_factory: None,
            create_filters: true,
            description: None,
            fields: IndexMap::new(),
            filter_class: None,
            options: IndexMap::new(),
        }
    }

    /// Defaults taken from the environment configuration.
    pub fn from_config(model: impl Into<String>, config: &Config) -> Self {
        let mut meta = Self::new(model);
        meta.batching = config.batching;
        meta.create_filters = config.create_filters;
        meta.id = Some(config.id_field.clone());
        meta.connection_class =
            Some(ConnectionClass::new().with_total_count(config.connection_total_count));
        meta
    }

    pub fn registry(mut self, registry: Arc<Registry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn skip_registry(mut self) -> Self {
        self.skip_registry = true;
        self
    }

    pub fn only_fields(mut self, fields: &[&str]) -> Self {
        self.only_fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn exclude_fields(mut self, fields: &[&str]) -> Self {
        self.exclude_fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn connection(mut self, connection: Arc<ConnectionType>) -> Self {
        self.connection = Some(connection);
        self
    }

    pub fn connection_class(mut self, connection_class: ConnectionClass) -> Self {
        self.connection_class = Some(connection_class);
        self
    }

    pub fn use_connection(mut self, use_connection: bool) -> Self {
        self.use_connection = Some(use_connection);
        self
    }

    pub fn interface(mut self, interface: InterfaceRef) -> Self {
        self.interfaces.push(interface);
        self
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn batching(mut self, batching: bool) -> Self {
        self.batching = batching;
        self
    }

    pub fn connection_field_factory(mut self, factory: ConnectionFieldFactory) -> Self {
        self.connection_field_factory = Some(factory);
        self
    }

    pub fn create_filters(mut self, create_filters: bool) -> Self {
        self.create_filters = create_filters;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn field(mut self, field: SchemaField) -> Self {
        self.fields.insert(field.name.clone(), field);
        self
    }

    pub fn filter_class(mut self, filter_class: Arc<FilterType>) -> Self {
        self.filter_class = Some(filter_class);
        self
    }

    pub fn option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }
}

impl fmt::Debug for TypeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeConfig")
            .field("model", &self.model)
            .field("registry", &self.registry.as_ref().map(|r| r.id()))
            .field("skip_registry", &self.skip_registry)
            .field("only_fields", &self.only_fields)
            .field("exclude_fields", &self.exclude_fields)
            .field("connection", &self.connection)
            .field("use_connection", &self.use_connection)
            .field("interfaces", &self.interfaces)
            .field("id", &self.id)
            .field("batching", &self.batching)
            .field("connection_field_factory", &FactoryDebug(&self.connection_field_factory))
            .field("create_filters", &self.create_filters)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Object,
    Interface,
}

/// A capability interface implemented by a reflected type.
#[derive(Debug, Clone)]
pub enum InterfaceRef {
    /// The relay node interface; implies connection support
    Node,
    /// Another reflected interface
    Type(Arc<SchemaType>),
}

impl InterfaceRef {
    pub fn name(&self) -> &str {
        match self {
            InterfaceRef::Node => NODE_INTERFACE,
            InterfaceRef::Type(ty) => &ty.name,
        }
    }
}

/// A finished reflected object type or interface.
#[derive(Debug)]
pub struct SchemaType {
    pub name: String,
    pub kind: TypeKind,
    pub model: Arc<Entity>,
    /// Identity of the registry the type was built with
    pub registry_id: u64,
    pub connection: Option<Arc<ConnectionType>>,
    pub id_field: String,
    pub fields: IndexMap<String, SchemaField>,
    pub filter_class: Option<Arc<FilterType>>,
    pub interfaces: Vec<InterfaceRef>,
    pub description: Option<String>,
    pub batching: bool,
    pub options: IndexMap<String, Value>,
}

impl SchemaType {
    pub fn is_interface(&self) -> bool {
        self.kind == TypeKind::Interface
    }

    pub fn implements_node(&self) -> bool {
        self.interfaces
            .iter()
            .any(|iface| matches!(iface, InterfaceRef::Node))
    }

    /// The `filter` argument accepted by fields returning this type.
    pub fn filter_argument(&self) -> Option<InputValue> {
        let filter = self.filter_class.as_ref()?;
        Some(InputValue::new("filter", TypeRef::named(filter.name.clone())))
    }
}

/// Build an object type from `definition`.
///
/// Returns `Ok(None)` for abstract definitions (those without `meta`).
pub fn build_object_type(
    catalog: &Catalog,
    definition: &TypeDefinition,
) -> Result<Option<Arc<SchemaType>>> {
    build(catalog, definition, TypeKind::Object)
}

/// Build an interface from `definition`.
///
/// The model must not be a concrete member of a polymorphic hierarchy.
pub fn build_interface(
    catalog: &Catalog,
    definition: &TypeDefinition,
) -> Result<Option<Arc<SchemaType>>> {
    build(catalog, definition, TypeKind::Interface)
}

fn build(
    catalog: &Catalog,
    definition: &TypeDefinition,
    kind: TypeKind,
) -> Result<Option<Arc<SchemaType>>> {
    let Some(meta) = &definition.meta else {
        return Ok(None);
    };
    let name = definition.name.clone();

    let entity = catalog
        .get(&meta.model)
        .ok_or_else(|| SchemaError::InvalidModel {
            type_name: name.clone(),
            model: meta.model.clone(),
        })?;

    if !meta.only_fields.is_empty() && !meta.exclude_fields.is_empty() {
        return Err(SchemaError::ConflictingFieldSelection { type_name: name });
    }

    let registry = meta.registry.clone().unwrap_or_else(Registry::global);
    for iface in &meta.interfaces {
        if let InterfaceRef::Type(ty) = iface {
            if ty.registry_id != registry.id() {
                return Err(SchemaError::RegistryMismatch {
                    type_name: ty.name.clone(),
                });
            }
        }
    }

    if kind == TypeKind::Interface {
        if let Some(identity) = &entity.polymorphic_identity {
            return Err(SchemaError::ConcreteInterface {
                type_name: name,
                identity: identity.clone(),
            });
        }
    }

    let constructed = construct_fields_and_filters(&ConstructionContext {
        definition,
        entity: &entity,
        catalog,
        registry: &registry,
        only_fields: &meta.only_fields,
        exclude_fields: &meta.exclude_fields,
        batching: meta.batching,
        create_filters: meta.create_filters,
        connection_field_factory: meta.connection_field_factory.clone(),
    })?;

    let implements_node = meta
        .interfaces
        .iter()
        .any(|iface| matches!(iface, InterfaceRef::Node));
    let use_connection = meta.use_connection.unwrap_or(implements_node);
    let connection = match &meta.connection {
        Some(connection) => Some(connection.clone()),
        None if use_connection => {
            let class = meta.connection_class.clone().unwrap_or_default();
            Some(Arc::new(
                class.create_type(format!("{}Connection", name), name.clone()),
            ))
        }
        None => None,
    };
    if let Some(connection) = &connection {
        if !connection.is_over(&name) {
            return Err(SchemaError::InvalidConnection {
                type_name: name,
                connection: connection.name.clone(),
                node: connection.node.clone(),
            });
        }
    }

    let id_field = meta.id.clone().unwrap_or_else(|| "id".to_string());

    let mut fields = meta.fields.clone();
    for (field_name, field) in constructed.fields {
        fields.insert(field_name, field);
    }
    for iface in &meta.interfaces {
        match iface {
            InterfaceRef::Node => {
                let mut id = SchemaField::new(
                    "id",
                    FieldShape::concrete(GqlType::scalar(Scalar::Id).non_null()),
                    Resolver::GlobalId,
                );
                id.description = Some("The ID of the object".to_string());
                fields.insert("id".to_string(), id);
            }
            InterfaceRef::Type(ty) => {
                for (field_name, field) in &ty.fields {
                    if !fields.contains_key(field_name) {
                        fields.insert(field_name.clone(), field.clone());
                    }
                }
            }
        }
    }

    let filter_class = match &meta.filter_class {
        Some(filter) => filter.clone(),
        None => registry.get_or_create_base_filter(&name, || {
            FilterType::base(&name, &entity.name, constructed.filters)
        }),
    };

    let ty = Arc::new(SchemaType {
        name: name.clone(),
        kind,
        model: entity.clone(),
        registry_id: registry.id(),
        connection,
        id_field,
        fields,
        filter_class: Some(filter_class),
        interfaces: meta.interfaces.clone(),
        description: meta.description.clone().or_else(|| entity.doc.clone()),
        batching: meta.batching,
        options: meta.options.clone(),
    });

    tracing::debug!(
        type_name = %ty.name,
        kind = ?ty.kind,
        model = %ty.model.name,
        fields = ty.fields.len(),
        connection = ?ty.connection.as_ref().map(|c| c.name.as_str()),
        "Built schema type"
    );

    if !meta.skip_registry {
        registry.register(ty.clone())?;
    }
    Ok(Some(ty))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphql::orm::field::OrmField;
    use crate::mapping::{Column, SqlType};
    use assert_matches::assert_matches;

    fn catalog() -> Catalog {
        let mut catalog = Catalog::new();
        catalog
            .add(
                Entity::new("Person")
                    .column(Column::new("id", SqlType::Integer).primary_key())
                    .column(Column::new("name", SqlType::Text))
                    .column(Column::new("type", SqlType::Text))
                    .polymorphic_on("type"),
            )
            .unwrap();
        catalog
            .add(
                Entity::new("Employee")
                    .inherits("Person")
                    .polymorphic_identity("employee")
                    .column(Column::new("hire_date", SqlType::Date)),
            )
            .unwrap();
        catalog
    }

    #[test]
    fn test_abstract_definitions_are_skipped() {
        let definition = TypeDefinition::new("Base").field("name", OrmField::new());
        assert!(build_object_type(&catalog(), &definition).unwrap().is_none());
    }

    #[test]
    fn test_invalid_model() {
        let registry = Arc::new(Registry::new());
        let definition = TypeDefinition::new("Ghost")
            .meta(TypeConfig::new("Ghost").registry(registry));
        assert_matches!(
            build_object_type(&catalog(), &definition),
            Err(SchemaError::InvalidModel { type_name, model }) if type_name == "Ghost" && model == "Ghost"
        );
    }

    #[test]
    fn test_object_type_is_registered_with_filter() {
        let registry = Arc::new(Registry::new());
        let definition = TypeDefinition::new("PersonType")
            .meta(TypeConfig::new("Person").registry(registry.clone()));
        let ty = build_object_type(&catalog(), &definition).unwrap().unwrap();

        let names: Vec<&str> = ty.fields.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["id", "name"]);
        assert_eq!(ty.filter_class.as_ref().unwrap().name, "PersonTypeFilter");
        assert!(Arc::ptr_eq(&registry.type_for_model("Person").unwrap(), &ty));
        assert!(ty.filter_argument().is_some());
        assert!(ty.connection.is_none());
    }

    #[test]
    fn test_node_interface_adds_connection_and_global_id() {
        let registry = Arc::new(Registry::new());
        let definition = TypeDefinition::new("Person").meta(
            TypeConfig::new("Person")
                .registry(registry.clone())
                .interface(InterfaceRef::Node),
        );
        let ty = build_object_type(&catalog(), &definition).unwrap().unwrap();
        assert_eq!(ty.connection.as_ref().unwrap().name, "PersonConnection");
        assert_matches!(ty.fields["id"].resolver, Resolver::GlobalId);
        assert_eq!(ty.fields.get_index_of("id"), Some(0));
    }

    #[test]
    fn test_connection_must_be_over_the_type() {
        let registry = Arc::new(Registry::new());
        let other = ConnectionClass::new().create_type("PetConnection", "Pet");
        let definition = TypeDefinition::new("Person").meta(
            TypeConfig::new("Person")
                .registry(registry)
                .connection(Arc::new(other)),
        );
        assert_matches!(
            build_object_type(&catalog(), &definition),
            Err(SchemaError::InvalidConnection { .. })
        );
    }

    #[test]
    fn test_interface_on_concrete_entity_fails() {
        let registry = Arc::new(Registry::new());
        let definition = TypeDefinition::new("EmployeeInterface")
            .meta(TypeConfig::new("Employee").registry(registry.clone()));
        assert_matches!(
            build_interface(&catalog(), &definition),
            Err(SchemaError::ConcreteInterface { identity, .. }) if identity == "employee"
        );
        assert!(registry.type_by_name("EmployeeInterface").is_none());

        let definition = TypeDefinition::new("PersonInterface")
            .meta(TypeConfig::new("Person").registry(registry));
        let ty = build_interface(&catalog(), &definition).unwrap().unwrap();
        assert!(ty.is_interface());
    }

    #[test]
    fn test_interfaces_must_share_the_registry() {
        let first = Arc::new(Registry::new());
        let second = Arc::new(Registry::new());
        let iface = build_interface(
            &catalog(),
            &TypeDefinition::new("PersonInterface")
                .meta(TypeConfig::new("Person").registry(first)),
        )
        .unwrap()
        .unwrap();

        let definition = TypeDefinition::new("EmployeeType").meta(
            TypeConfig::new("Employee")
                .registry(second)
                .interface(InterfaceRef::Type(iface)),
        );
        assert_matches!(
            build_object_type(&catalog(), &definition),
            Err(SchemaError::RegistryMismatch { type_name }) if type_name == "PersonInterface"
        );
    }

    #[test]
    fn test_skip_registry() {
        let registry = Arc::new(Registry::new());
        let definition = TypeDefinition::new("PersonType").meta(
            TypeConfig::new("Person")
                .registry(registry.clone())
                .skip_registry(),
        );
        build_object_type(&catalog(), &definition).unwrap().unwrap();
        assert!(registry.type_for_model("Person").is_none());
    }
}
