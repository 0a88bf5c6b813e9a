//! Filter entries for reflected fields.
//!
//! Decides which filter input type, if any, filters a reflected field. Fields
//! whose type is not known yet (relationships, forward references) receive a
//! [`DeferredFilter`] settled in the second build phase. Fields without a
//! compatible filter stay queryable but are left out of the filter, with a
//! warning.

use std::sync::Arc;

use super::base::SchemaType;
use super::dynamic::{DynamicField, ResolvedRelationship, resolve_lazy};
use crate::graphql::Registry;
use crate::graphql::filters::{DeferredFilter, DeferredSource, FilterInputField, FilterType};
use crate::graphql::types::{FieldShape, FieldType, GqlType, NamedType, SchemaField};
use crate::mapping::{Attribute, SqlType};

/// The relationship filter of `target`, created and registered on first request.
///
/// Repeated requests return the same filter type.
pub fn get_or_create_relationship_filter(
    target: &SchemaType,
    registry: &Registry,
) -> Option<Arc<FilterType>> {
    registry.get_or_create_relationship_filter(&target.name, &target.model.name)
}

/// The filter entry for a field of a concrete, non-deferred type.
pub fn filter_field_from_field(
    owner: &str,
    field_name: &str,
    ty: &GqlType,
    registry: &Registry,
    attribute: &Attribute,
    attr_name: &str,
) -> Option<FilterInputField> {
    let filter = concrete_filter(ty.nullable(), registry, attribute);
    match filter {
        Some(filter) => Some(FilterInputField::ready(filter, attr_name)),
        None => {
            registry.warn(
                owner,
                field_name,
                attr_name,
                format!(
                    "No compatible filters found for {} with db name {}. Skipping field.",
                    ty, attr_name
                ),
            );
            None
        }
    }
}

fn concrete_filter(
    ty: &GqlType,
    registry: &Registry,
    attribute: &Attribute,
) -> Option<Arc<FilterType>> {
    match ty.named() {
        NamedType::Object(name) => registry.base_filter(name),
        NamedType::Enum(name) => {
            let Attribute::Column(column) = attribute else {
                return None;
            };
            let def = registry.enum_by_name(name)?;
            match &column.sql_type {
                SqlType::Enum(sql_enum) if sql_enum.is_typed() => {
                    Some(registry.typed_enum_filter(&def))
                }
                _ => Some(registry.sql_enum_filter(&def)),
            }
        }
        NamedType::Scalar(scalar) => registry.scalar_filter(scalar),
    }
}

/// The filter of a relationship field once its target type is known.
pub fn resolve_dynamic_relationship_filter(
    dynamic: &DynamicField,
    registry: &Registry,
    attr_name: &str,
) -> Option<Arc<FilterType>> {
    let filter = match dynamic.resolve(registry) {
        // Connections always filter through the relationship filter of their node
        Some(ResolvedRelationship::Connection { field, .. }) => registry
            .type_by_name(&field.connection.node)
            .and_then(|node| get_or_create_relationship_filter(&node, registry)),
        Some(ResolvedRelationship::List { target, .. }) => registry
            .type_by_name(target)
            .and_then(|target| get_or_create_relationship_filter(&target, registry)),
        Some(ResolvedRelationship::Single { target, .. }) => registry.base_filter(target),
        None => None,
    };

    if filter.is_none() {
        registry.warn(
            &dynamic.owner,
            &dynamic.field_name,
            attr_name,
            format!(
                "No compatible filters found for relationship {} with db name {}. Skipping field.",
                dynamic.relationship.name, attr_name
            ),
        );
    }
    filter
}

/// Settle a deferred filter entry; returns the filter it resolved to.
pub fn resolve_deferred_filter(
    deferred: &DeferredFilter,
    registry: &Registry,
) -> Option<Arc<FilterType>> {
    if let Some(filter) = deferred.resolved() {
        return Some(filter);
    }

    let filter = match &deferred.source {
        DeferredSource::Relationship(dynamic) => {
            resolve_dynamic_relationship_filter(dynamic, registry, &deferred.model_attr)
        }
        DeferredSource::Lazy { lazy, attribute } => match resolve_lazy(lazy, registry) {
            Some(ty) if ty.is_list() => {
                warn_unsupported(registry, deferred, "Lists are not supported for filtering");
                None
            }
            Some(ty) => filter_field_from_field(
                &deferred.owner,
                &deferred.field,
                &ty,
                registry,
                attribute,
                &deferred.model_attr,
            )
            .and_then(|field| field.filter()),
            None => {
                warn_unsupported(registry, deferred, "Referenced type is not registered");
                None
            }
        },
    };

    if let Some(filter) = &filter {
        deferred.settle(filter);
    }
    filter
}

fn warn_unsupported(registry: &Registry, deferred: &DeferredFilter, reason: &str) {
    registry.warn(
        &deferred.owner,
        &deferred.field,
        &deferred.model_attr,
        format!("{}. Skipping field.", reason),
    );
}

/// The filter entry for a reflected field.
///
/// Resolution order: an explicit filter type, the filter of an unmounted
/// scalar, a deferred entry for relationships, then the concrete type of
/// mounted fields. Lists and nested relationships are not filterable.
pub fn filter_field_from_type_field(
    owner: &str,
    field: &SchemaField,
    registry: &Registry,
    filter_type: Option<Arc<FilterType>>,
    attribute: &Attribute,
    attr_name: &str,
) -> Option<FilterInputField> {
    if let Some(filter_type) = filter_type {
        return Some(FilterInputField::ready(filter_type, attr_name));
    }

    let unsupported = |reason: &str| -> Option<FilterInputField> {
        registry.warn(
            owner,
            &field.name,
            attr_name,
            format!("{} Skipping field.", reason),
        );
        None
    };

    match &field.shape {
        FieldShape::Scalar(scalar) => match registry.scalar_filter(scalar) {
            Some(filter) => Some(FilterInputField::ready(filter, attr_name)),
            None => unsupported(&format!(
                "No compatible filters found for {} with db name {}.",
                scalar.name(),
                attr_name
            )),
        },
        FieldShape::Dynamic(dynamic) => Some(FilterInputField::deferred(Arc::new(
            DeferredFilter::new(
                owner,
                &field.name,
                attr_name,
                DeferredSource::Relationship(dynamic.clone()),
            ),
        ))),
        FieldShape::List(_) => unsupported("Pure lists are not yet supported for filtering."),
        FieldShape::Field(FieldType::Concrete(ty)) if ty.is_list() => {
            unsupported("Pure lists are not yet supported for filtering.")
        }
        FieldShape::Field(FieldType::Lazy(lazy)) if lazy.list => {
            unsupported("Pure lists are not yet supported for filtering.")
        }
        FieldShape::Field(FieldType::Dynamic(_)) => {
            unsupported("Fields with nested relationships are not yet supported for filtering.")
        }
        FieldShape::Field(FieldType::Lazy(lazy)) => Some(FilterInputField::deferred(Arc::new(
            DeferredFilter::new(
                owner,
                &field.name,
                attr_name,
                DeferredSource::Lazy {
                    lazy: lazy.clone(),
                    attribute: attribute.clone(),
                },
            ),
        ))),
        FieldShape::Field(FieldType::Concrete(ty)) => {
            filter_field_from_field(owner, &field.name, ty, registry, attribute, attr_name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphql::types::{Resolver, Scalar};
    use crate::mapping::{Column, HybridProperty, SqlEnum};

    fn column(name: &str, sql_type: SqlType) -> Attribute {
        Attribute::Column(Column::new(name, sql_type))
    }

    #[test]
    fn test_explicit_filter_type_wins() {
        let registry = Registry::new();
        let custom = Arc::new(FilterType::custom(
            "NameFilter",
            GqlType::scalar(Scalar::String),
            &[crate::graphql::filters::FilterOperator::Eq],
        ));
        let field = SchemaField::new(
            "name",
            FieldShape::Scalar(Scalar::String),
            Resolver::Attribute("name".to_string()),
        );
        let entry = filter_field_from_type_field(
            "Pet",
            &field,
            &registry,
            Some(custom.clone()),
            &column("name", SqlType::Text),
            "name",
        )
        .unwrap();
        assert!(Arc::ptr_eq(&entry.filter().unwrap(), &custom));
    }

    #[test]
    fn test_scalar_fields_use_registered_filters() {
        let registry = Registry::new();
        let field = SchemaField::new(
            "age",
            FieldShape::concrete(GqlType::scalar(Scalar::Int).non_null()),
            Resolver::Attribute("age".to_string()),
        );
        let entry = filter_field_from_type_field(
            "Pet",
            &field,
            &registry,
            None,
            &column("age", SqlType::Integer),
            "age",
        )
        .unwrap();
        assert_eq!(entry.filter().unwrap().name, "IntFilter");
        assert_eq!(entry.model_attr, "age");
    }

    #[test]
    fn test_lists_are_skipped_with_a_warning() {
        let registry = Registry::new();
        let field = SchemaField::new(
            "tags",
            FieldShape::concrete(GqlType::list(GqlType::scalar(Scalar::String))),
            Resolver::Attribute("tags".to_string()),
        );
        let entry = filter_field_from_type_field(
            "Pet",
            &field,
            &registry,
            None,
            &column("tags", SqlType::Array(Box::new(SqlType::Text))),
            "tags",
        );
        assert!(entry.is_none());
        assert_eq!(registry.diagnostics().len(), 1);
        assert_eq!(registry.diagnostics()[0].field, "tags");
    }

    #[test]
    fn test_enum_columns_use_their_namespace() {
        let registry = Registry::new();
        let native = SqlEnum::native("pet_kind", &["cat", "dog"]);
        let def = registry.enum_for_sql("Pet", "kind", &native);
        let field = SchemaField::new(
            "kind",
            FieldShape::concrete(GqlType::enumeration(def.name.clone())),
            Resolver::Attribute("kind".to_string()),
        );
        let entry = filter_field_from_type_field(
            "Pet",
            &field,
            &registry,
            None,
            &column("kind", SqlType::Enum(native)),
            "kind",
        )
        .unwrap();
        assert!(Arc::ptr_eq(
            &entry.filter().unwrap(),
            &registry.sql_enum_filter(&def)
        ));
    }

    #[test]
    fn test_unknown_custom_scalar_is_not_filterable() {
        let registry = Registry::new();
        let field = SchemaField::new(
            "location",
            FieldShape::concrete(GqlType::scalar(Scalar::Custom("Point".to_string()))),
            Resolver::Attribute("location".to_string()),
        );
        let entry = filter_field_from_type_field(
            "Pet",
            &field,
            &registry,
            None,
            &column("location", SqlType::Custom("Point".to_string())),
            "location",
        );
        assert!(entry.is_none());
        assert!(registry.diagnostics()[0].message.contains("No compatible filters"));
    }

    #[test]
    fn test_forward_references_are_deferred() {
        let registry = Registry::new();
        let field = SchemaField::new(
            "best_friend",
            FieldShape::Field(FieldType::Lazy(crate::graphql::types::LazyType::entity("Pet"))),
            Resolver::Attribute("best_friend".to_string()),
        );
        let entry = filter_field_from_type_field(
            "Pet",
            &field,
            &registry,
            None,
            &Attribute::Hybrid(HybridProperty::new("best_friend")),
            "best_friend",
        )
        .unwrap();
        assert!(entry.is_deferred());
        assert!(entry.filter().is_none());
    }
}
