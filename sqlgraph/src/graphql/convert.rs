//! Conversion of model attributes into schema fields, one function per descriptor kind.

use std::sync::Arc;

use super::Registry;
use super::orm::{DynamicField, FieldOptions};
use super::pagination::ConnectionFieldFactory;
use super::types::{FieldShape, FieldType, GqlType, LazyType, Resolver, Scalar, SchemaField};
use crate::error::{Result, SchemaError};
use crate::mapping::{
    AssociationProxy, Attribute, Catalog, Column, CompositeProperty, Entity, HybridProperty,
    RelationshipProperty, SqlType, TypeHint,
};

/// The GraphQL type of a column, before nullability is applied.
pub fn column_type(column: &Column, entity: &Entity, registry: &Registry) -> GqlType {
    convert_sql_type(&column.sql_type, column, entity, registry)
}

fn convert_sql_type(
    ty: &SqlType,
    column: &Column,
    entity: &Entity,
    registry: &Registry,
) -> GqlType {
    let scalar = match ty {
        SqlType::SmallInteger | SqlType::Integer if column.primary_key => Scalar::Id,
        SqlType::SmallInteger | SqlType::Integer => Scalar::Int,
        SqlType::BigInteger if column.primary_key => Scalar::Id,
        SqlType::BigInteger => Scalar::BigInt,
        SqlType::Float | SqlType::Numeric => Scalar::Float,
        SqlType::String(_) | SqlType::Text => Scalar::String,
        SqlType::Boolean => Scalar::Boolean,
        SqlType::Date => Scalar::Date,
        SqlType::DateTime => Scalar::DateTime,
        SqlType::Time => Scalar::Time,
        SqlType::Uuid => Scalar::Uuid,
        SqlType::Json => Scalar::Json,
        SqlType::Custom(name) => Scalar::Custom(name.clone()),
        SqlType::Enum(sql_enum) => {
            let def = registry.enum_for_sql(&entity.name, &column.name, sql_enum);
            return GqlType::enumeration(def.name.clone());
        }
        SqlType::Array(inner) => {
            let element = Column {
                primary_key: false,
                ..column.clone()
            };
            return GqlType::list(convert_sql_type(inner, &element, entity, registry));
        }
    };
    GqlType::scalar(scalar)
}

/// Apply an explicit type override, or fall back to `default`.
fn field_type(options: &FieldOptions, default: GqlType, required: Option<bool>) -> FieldType {
    match &options.type_ {
        Some(FieldType::Concrete(ty)) => FieldType::Concrete(ty.clone().with_required(required)),
        Some(FieldType::Lazy(lazy)) => FieldType::Lazy(LazyType {
            required: required.unwrap_or(lazy.required),
            ..lazy.clone()
        }),
        Some(FieldType::Dynamic(dynamic)) => FieldType::Dynamic(dynamic.clone()),
        None => FieldType::Concrete(default.with_required(required)),
    }
}

fn schema_field(
    name: &str,
    shape: FieldShape,
    resolver: Resolver,
    options: &FieldOptions,
    doc: Option<&String>,
) -> SchemaField {
    SchemaField {
        name: name.to_string(),
        shape,
        description: options.description.clone().or_else(|| doc.cloned()),
        deprecation_reason: options.deprecation_reason.clone(),
        resolver,
        extra: options.extra.clone(),
    }
}

/// A column becomes a field of its mapped type, required unless nullable.
pub fn convert_column(
    name: &str,
    column: &Column,
    entity: &Entity,
    registry: &Registry,
    resolver: Resolver,
    options: &FieldOptions,
) -> SchemaField {
    let required = options.required.unwrap_or(!column.nullable);
    let ty = field_type(
        options,
        column_type(column, entity, registry),
        Some(required),
    );
    schema_field(name, FieldShape::Field(ty), resolver, options, column.doc.as_ref())
}

/// A relationship becomes a dynamic field resolved once its target type is built.
pub fn convert_relationship(
    name: &str,
    relationship: &RelationshipProperty,
    owner: &str,
    connection_field_factory: Option<ConnectionFieldFactory>,
    batching: bool,
    resolver: Resolver,
    options: &FieldOptions,
) -> SchemaField {
    let shape = match &options.type_ {
        Some(_) => FieldShape::Field(field_type(
            options,
            GqlType::object(relationship.target.clone()),
            options.required,
        )),
        None => FieldShape::Dynamic(Arc::new(DynamicField::new(
            owner,
            name,
            relationship.clone(),
            batching,
            options.clone(),
            connection_field_factory,
        ))),
    };
    schema_field(name, shape, resolver, options, relationship.doc.as_ref())
}

/// A composite converts through the converter registered for its composite class.
pub fn convert_composite(
    name: &str,
    owner: &str,
    composite: &CompositeProperty,
    registry: &Registry,
    resolver: Resolver,
) -> Result<SchemaField> {
    let converter = registry
        .composite_converter(&composite.composite_class)
        .ok_or_else(|| SchemaError::UnconvertibleComposite {
            type_name: owner.to_string(),
            field: name.to_string(),
            composite_class: composite.composite_class.clone(),
        })?;
    let shape = converter(composite, registry);
    Ok(schema_field(
        name,
        shape,
        resolver,
        &FieldOptions::default(),
        composite.doc.as_ref(),
    ))
}

/// The schema type of a hybrid property's return annotation.
pub fn hint_type(hint: &TypeHint) -> FieldType {
    match hint {
        TypeHint::Int => FieldType::Concrete(GqlType::scalar(Scalar::Int)),
        TypeHint::Float => FieldType::Concrete(GqlType::scalar(Scalar::Float)),
        TypeHint::String => FieldType::Concrete(GqlType::scalar(Scalar::String)),
        TypeHint::Boolean => FieldType::Concrete(GqlType::scalar(Scalar::Boolean)),
        TypeHint::Id => FieldType::Concrete(GqlType::scalar(Scalar::Id)),
        TypeHint::Date => FieldType::Concrete(GqlType::scalar(Scalar::Date)),
        TypeHint::DateTime => FieldType::Concrete(GqlType::scalar(Scalar::DateTime)),
        TypeHint::Time => FieldType::Concrete(GqlType::scalar(Scalar::Time)),
        TypeHint::Decimal => FieldType::Concrete(GqlType::scalar(Scalar::Decimal)),
        TypeHint::Uuid => FieldType::Concrete(GqlType::scalar(Scalar::Uuid)),
        TypeHint::Json => FieldType::Concrete(GqlType::scalar(Scalar::Json)),
        TypeHint::Enum(name) => FieldType::Concrete(GqlType::enumeration(name.clone())),
        TypeHint::Entity(entity) => FieldType::Lazy(LazyType::entity(entity.clone())),
        TypeHint::TypeName(name) => FieldType::Lazy(LazyType::named(name.clone())),
        TypeHint::Optional(inner) => hint_type(inner),
        TypeHint::List(inner) => match hint_type(inner) {
            FieldType::Concrete(ty) => FieldType::Concrete(GqlType::list(ty)),
            FieldType::Lazy(lazy) => FieldType::Lazy(lazy.list()),
            dynamic => dynamic,
        },
    }
}

/// A hybrid property converts from its return annotation; unannotated ones are strings.
pub fn convert_hybrid(
    name: &str,
    hybrid: &HybridProperty,
    resolver: Resolver,
    options: &FieldOptions,
) -> SchemaField {
    let ty = match &options.type_ {
        Some(ty) => ty.clone(),
        None => hybrid
            .returns
            .as_ref()
            .map(hint_type)
            .unwrap_or(FieldType::Concrete(GqlType::scalar(Scalar::String))),
    };
    let ty = match (ty, options.required) {
        (FieldType::Concrete(ty), required) => FieldType::Concrete(ty.with_required(required)),
        (FieldType::Lazy(lazy), Some(required)) => FieldType::Lazy(lazy.required(required)),
        (ty, _) => ty,
    };
    schema_field(name, FieldShape::Field(ty), resolver, options, hybrid.doc.as_ref())
}

/// Everything an association proxy conversion needs to know about its owner.
pub struct ProxyContext<'a> {
    pub owner: &'a str,
    pub entity: &'a Entity,
    pub catalog: &'a Catalog,
    pub registry: &'a Registry,
    pub connection_field_factory: Option<ConnectionFieldFactory>,
    pub batching: bool,
}

/// An association proxy follows its relationship to the proxied attribute.
///
/// A proxied column becomes a field of the column's type, listed when the
/// relationship is a collection; a proxied relationship becomes a relationship field.
pub fn convert_association_proxy(
    name: &str,
    proxy: &AssociationProxy,
    ctx: &ProxyContext<'_>,
    resolver: Resolver,
    options: &FieldOptions,
) -> Result<SchemaField> {
    let unsupported = |reason: String| SchemaError::UnsupportedAssociationProxy {
        type_name: ctx.owner.to_string(),
        field: name.to_string(),
        reason,
    };

    let relationship = ctx
        .entity
        .get_relationship(&proxy.target_collection)
        .ok_or_else(|| {
            unsupported(format!(
                "{} has no relationship {}",
                ctx.entity.name, proxy.target_collection
            ))
        })?;
    let target = ctx.catalog.get(&relationship.target).ok_or_else(|| {
        unsupported(format!("related entity {} is not mapped", relationship.target))
    })?;

    match target.attributes().get(&proxy.value_attr) {
        Some(Attribute::Column(column)) => {
            let mut field = convert_column(name, column, &target, ctx.registry, resolver, options);
            if relationship.uselist {
                if let FieldShape::Field(FieldType::Concrete(ty)) = field.shape {
                    field.shape = FieldShape::concrete(GqlType::list(ty));
                }
            }
            Ok(field)
        }
        Some(Attribute::Relationship(proxied)) => {
            let batching = options.batching.unwrap_or(ctx.batching);
            Ok(convert_relationship(
                name,
                proxied,
                ctx.owner,
                ctx.connection_field_factory.clone(),
                batching,
                resolver,
                options,
            ))
        }
        Some(other) => Err(unsupported(format!(
            "proxied attribute {}.{} is a {}",
            target.name,
            proxy.value_attr,
            other.kind_name()
        ))),
        None => Err(unsupported(format!(
            "{} has no attribute {}",
            target.name, proxy.value_attr
        ))),
    }
}
