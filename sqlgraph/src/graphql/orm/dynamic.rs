//! Relationship fields whose type is only known once every type is built.
//!
//! Relationships are reflected in two phases. While a type is built its
//! relationship fields are [`DynamicField`]s naming the target entity. Once
//! every type of the schema is registered, [`resolve_deferred`] settles each of
//! them into a single reference, a list or a connection, and settles the
//! deferred filter entries that depend on them.

use std::fmt;

use once_cell::sync::OnceCell;

use super::base::SchemaType;
use super::field::FieldOptions;
use super::filter_field::resolve_deferred_filter;
use crate::graphql::Registry;
use crate::graphql::filters::FilterSlot;
use crate::graphql::pagination::{
    ConnectionField, ConnectionFieldFactory, FactoryDebug, default_connection_field_factory,
};
use crate::graphql::types::{FieldShape, FieldType, GqlType, LazyTarget, LazyType};
use crate::mapping::{Direction, RelationshipProperty};

/// The settled shape of a relationship field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedRelationship {
    /// A reference to one related object
    Single { target: String, ty: GqlType },
    /// A plain list of related objects
    List { target: String, ty: GqlType },
    /// A paginated connection over the related type
    Connection { field: ConnectionField, ty: GqlType },
}

impl ResolvedRelationship {
    pub fn gql_type(&self) -> GqlType {
        match self {
            ResolvedRelationship::Single { ty, .. }
            | ResolvedRelationship::List { ty, .. }
            | ResolvedRelationship::Connection { ty, .. } => ty.clone(),
        }
    }

    /// Name of the related schema type.
    pub fn target(&self) -> &str {
        match self {
            ResolvedRelationship::Single { target, .. }
            | ResolvedRelationship::List { target, .. } => target,
            ResolvedRelationship::Connection { field, .. } => &field.connection.node,
        }
    }
}

/// A relationship field awaiting its target type.
pub struct DynamicField {
    /// Name of the owning schema type
    pub owner: String,
    pub field_name: String,
    pub relationship: RelationshipProperty,
    pub batching: bool,
    pub options: FieldOptions,
    factory: Option<ConnectionFieldFactory>,
    resolved: OnceCell<ResolvedRelationship>,
}

impl DynamicField {
    pub fn new(
        owner: impl Into<String>,
        field_name: impl Into<String>,
        relationship: RelationshipProperty,
        batching: bool,
        options: FieldOptions,
        factory: Option<ConnectionFieldFactory>,
    ) -> Self {
        Self {
            owner: owner.into(),
            field_name: field_name.into(),
            relationship,
            batching,
            options,
            factory,
            resolved: OnceCell::new(),
        }
    }

    /// The settled shape, if already resolved.
    pub fn resolved(&self) -> Option<&ResolvedRelationship> {
        self.resolved.get()
    }

    /// Settle the shape against the types registered so far.
    ///
    /// Only a successful resolution is kept; a relationship to a type not yet
    /// registered can be resolved again later.
    pub fn resolve(&self, registry: &Registry) -> Option<&ResolvedRelationship> {
        if let Some(resolved) = self.resolved.get() {
            return Some(resolved);
        }
        let resolved = self.compute(registry)?;
        tracing::debug!(
            owner = %self.owner,
            field = %self.field_name,
            target = %resolved.target(),
            "Relationship field resolved"
        );
        Some(self.resolved.get_or_init(|| resolved))
    }

    fn compute(&self, registry: &Registry) -> Option<ResolvedRelationship> {
        let relationship = &self.relationship;
        let child = registry.type_for_model(&relationship.target)?;
        let required = self.options.required;

        if relationship.direction == Direction::ManyToOne || !relationship.uselist {
            return Some(ResolvedRelationship::Single {
                ty: GqlType::object(child.name.clone()).with_required(required),
                target: child.name.clone(),
            });
        }

        if child.connection.is_none() {
            return Some(ResolvedRelationship::List {
                ty: GqlType::list(GqlType::object(child.name.clone())).with_required(required),
                target: child.name.clone(),
            });
        }

        let factory = self
            .factory
            .clone()
            .unwrap_or_else(default_connection_field_factory);
        let field = factory(relationship, registry, self.batching)?;
        Some(ResolvedRelationship::Connection {
            ty: GqlType::object(field.connection.name.clone()).with_required(required),
            field,
        })
    }
}

impl fmt::Debug for DynamicField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicField")
            .field("owner", &self.owner)
            .field("field_name", &self.field_name)
            .field("target", &self.relationship.target)
            .field("batching", &self.batching)
            .field("factory", &FactoryDebug(&self.factory))
            .field("resolved", &self.resolved.get())
            .finish()
    }
}

/// The concrete type of a forward reference, if the referenced type exists.
pub fn resolve_lazy(lazy: &LazyType, registry: &Registry) -> Option<GqlType> {
    let named = match &lazy.target {
        LazyTarget::Entity(entity) => GqlType::object(registry.type_for_model(entity)?.name.clone()),
        LazyTarget::TypeName(name) => {
            if let Some(ty) = registry.type_by_name(name) {
                GqlType::object(ty.name.clone())
            } else if let Some(def) = registry.enum_by_name(name) {
                GqlType::enumeration(def.name.clone())
            } else {
                return None;
            }
        }
    };
    let ty = if lazy.list { GqlType::list(named) } else { named };
    Some(ty.with_required(Some(lazy.required)))
}

impl SchemaType {
    /// Resolve this type's relationship fields and deferred filter entries.
    pub fn resolve_deferred(&self, registry: &Registry) {
        for field in self.fields.values() {
            match &field.shape {
                FieldShape::Dynamic(dynamic) | FieldShape::Field(FieldType::Dynamic(dynamic)) => {
                    if dynamic.resolve(registry).is_none() {
                        registry.warn(
                            &self.name,
                            &field.name,
                            &dynamic.relationship.name,
                            format!(
                                "No type registered for related entity {}. Skipping field.",
                                dynamic.relationship.target
                            ),
                        );
                    }
                }
                FieldShape::Field(FieldType::Lazy(lazy)) => {
                    if resolve_lazy(lazy, registry).is_none() {
                        registry.warn(
                            &self.name,
                            &field.name,
                            &field.name,
                            format!("Cannot resolve referenced type {:?}. Skipping field.", lazy.target),
                        );
                    }
                }
                _ => {}
            }
        }

        let Some(filter) = &self.filter_class else {
            return;
        };
        for entry in filter.fields().into_iter().flat_map(|fields| fields.values()) {
            if let FilterSlot::Deferred(deferred) = &entry.slot {
                if !deferred.is_resolved() {
                    resolve_deferred_filter(deferred, registry);
                }
            }
        }
    }
}

/// Second build phase over every registered type.
pub(crate) fn resolve_deferred(registry: &Registry) {
    let types = registry.types();
    tracing::debug!(types = types.len(), "Resolving deferred fields and filters");
    for ty in &types {
        ty.resolve_deferred(registry);
    }
}
