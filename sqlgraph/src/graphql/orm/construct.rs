//! Field and filter construction for one type definition.
//!
//! Reconciles the attributes discovered on a mapped entity with the
//! overrides declared on a type definition. Overrides come first, in creation
//! order; attributes without an override follow in entity attribute order.
//! Each entry is converted according to its descriptor kind and, where
//! filtering is enabled and supported, receives a filter entry.

use indexmap::{IndexMap, IndexSet};

use super::field::{OrmField, TypeDefinition};
use super::filter_field::filter_field_from_type_field;
use crate::error::{Result, SchemaError};
use crate::graphql::Registry;
use crate::graphql::convert::{
    ProxyContext, convert_association_proxy, convert_column, convert_composite, convert_hybrid,
    convert_relationship,
};
use crate::graphql::filters::FilterInputField;
use crate::graphql::pagination::ConnectionFieldFactory;
use crate::graphql::types::{Resolver, SchemaField};
use crate::mapping::{Attribute, Catalog, Entity};

/// Inputs of a field and filter construction.
pub struct ConstructionContext<'a> {
    pub definition: &'a TypeDefinition,
    pub entity: &'a Entity,
    pub catalog: &'a Catalog,
    pub registry: &'a Registry,
    pub only_fields: &'a [String],
    pub exclude_fields: &'a [String],
    /// Type-level batching default for relationships
    pub batching: bool,
    /// Type-level default of the per-field filter toggle
    pub create_filters: bool,
    pub connection_field_factory: Option<ConnectionFieldFactory>,
}

/// The field map and filter map of a type.
#[derive(Debug, Default)]
pub struct Constructed {
    pub fields: IndexMap<String, SchemaField>,
    /// Keyed by field name; always a subset of `fields`
    pub filters: IndexMap<String, FilterInputField>,
}

/// Build the fields and filter entries of `ctx.definition` over `ctx.entity`.
///
/// Fails before converting anything when the field selection conflicts, an
/// override names no attribute of the entity, or a composite attribute is
/// overridden.
pub fn construct_fields_and_filters(ctx: &ConstructionContext<'_>) -> Result<Constructed> {
    let type_name = ctx.definition.name.as_str();

    if !ctx.only_fields.is_empty() && !ctx.exclude_fields.is_empty() {
        return Err(SchemaError::ConflictingFieldSelection {
            type_name: type_name.to_string(),
        });
    }

    let attributes = ctx.entity.attributes();
    let discriminator = ctx.entity.polymorphic_on_column();
    let excluded = |name: &str| {
        ctx.exclude_fields.iter().any(|excluded| excluded == name) || discriminator == Some(name)
    };

    let auto_names: Vec<&String> = attributes
        .keys()
        .filter(|name| ctx.only_fields.is_empty() || ctx.only_fields.contains(name))
        .filter(|name| !excluded(name))
        .collect();

    let mut overrides: IndexMap<String, OrmField> = IndexMap::new();
    for (name, mut field) in ctx.definition.collect_overrides() {
        let model_attr = field.model_attr.clone().unwrap_or_else(|| name.clone());
        if !attributes.contains_key(&model_attr) {
            return Err(SchemaError::UnmappedOverride {
                type_name: type_name.to_string(),
                field: name,
            });
        }
        field.model_attr = Some(model_attr);
        if excluded(&name) {
            continue;
        }
        overrides.insert(name, field);
    }

    for (name, field) in &overrides {
        let model_attr = field.model_attr.as_deref().unwrap_or(name);
        if let Some(Attribute::Composite(_)) = attributes.get(model_attr) {
            if !field.options.is_empty() || model_attr != name {
                return Err(SchemaError::CompositeOverride {
                    type_name: type_name.to_string(),
                    field: name.clone(),
                });
            }
        }
    }

    let mut merged = overrides;
    for name in auto_names {
        if !merged.contains_key(name) {
            merged.insert(name.clone(), OrmField::for_attribute(name));
        }
    }

    let mut constructed = Constructed::default();
    let mut unfiltered: IndexSet<String> = IndexSet::new();
    for (name, orm_field) in merged {
        let create_filter = orm_field.create_filter.unwrap_or(ctx.create_filters);
        let attr_name = orm_field.model_attr.clone().unwrap_or_else(|| name.clone());
        let Some(attribute) = attributes.get(&attr_name) else {
            return Err(SchemaError::UnmappedOverride {
                type_name: type_name.to_string(),
                field: name,
            });
        };

        let resolver = match ctx.definition.resolver_for(&name) {
            Some(resolver) => Resolver::Custom(resolver),
            None => Resolver::Attribute(attr_name.clone()),
        };

        let options = &orm_field.options;
        let field = match attribute {
            Attribute::Column(column) => {
                convert_column(&name, column, ctx.entity, ctx.registry, resolver, options)
            }
            Attribute::Relationship(relationship) => convert_relationship(
                &name,
                relationship,
                type_name,
                ctx.connection_field_factory.clone(),
                options.batching.unwrap_or(ctx.batching),
                resolver,
                options,
            ),
            Attribute::Composite(composite) => {
                convert_composite(&name, type_name, composite, ctx.registry, resolver)?
            }
            Attribute::Hybrid(hybrid) => convert_hybrid(&name, hybrid, resolver, options),
            Attribute::AssociationProxy(proxy) => {
                let proxy_ctx = ProxyContext {
                    owner: type_name,
                    entity: ctx.entity,
                    catalog: ctx.catalog,
                    registry: ctx.registry,
                    connection_field_factory: ctx.connection_field_factory.clone(),
                    batching: options.batching.unwrap_or(ctx.batching),
                };
                convert_association_proxy(&name, proxy, &proxy_ctx, resolver, options)?
            }
        };

        ctx.registry
            .register_orm_field(type_name, &name, attribute.clone());

        if create_filter && !matches!(attribute, Attribute::AssociationProxy(_)) {
            if let Some(filter) = filter_field_from_type_field(
                type_name,
                &field,
                ctx.registry,
                orm_field.filter_type.clone(),
                attribute,
                &attr_name,
            ) {
                constructed.filters.insert(name.clone(), filter);
            }
        } else {
            unfiltered.insert(name.clone());
        }

        constructed.fields.insert(name, field);
    }

    tracing::debug!(
        type_name,
        entity = %ctx.entity.name,
        fields = constructed.fields.len(),
        filters = constructed.filters.len(),
        unfiltered = ?unfiltered,
        "Constructed fields and filters"
    );
    Ok(constructed)
}
