//! Emission of reflected types as an `async_graphql` dynamic schema.
//!
//! Registers every type of a [`Registry`] with a schema builder: custom
//! scalars, generated enums, the relay `Node` interface, reflected objects and
//! interfaces, their connection and edge types, and every filter input type.
//! Fields whose type never resolved are left out. Attribute resolvers read
//! values and related instances from [`Instance`] parents.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_graphql::dynamic::{
    self, Enum, EnumItem, Field, FieldFuture, FieldValue, InputValue, Interface, InterfaceField,
    Object, ResolverContext, Schema, SchemaBuilder, TypeRef,
};
use async_graphql::{Name, Value};

use super::Registry;
use super::orm::{
    NODE_INTERFACE, ResolvedRelationship, SchemaType, from_global_id, node::identifier,
    node::key_text, to_global_id,
};
use super::pagination::{Connection, ConnectionType, Edge, PageInfo, parse_pagination_args};
use super::types::{
    FieldShape, FieldType, GqlType, NamedType, Resolver, SchemaField, enum_item_name,
};
use crate::error::Result;
use crate::mapping::{Instance, Related, SessionHandle};

const PAGE_INFO: &str = "PageInfo";

/// How an attribute resolver turns the parent's attribute into a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Output {
    Scalar,
    Enum,
    Object { interface: bool },
    ObjectList { interface: bool },
    Connection,
}

/// Register every type known to `registry` with `builder`.
///
/// Runs the second build phase first, so all types must have been built.
pub fn register_types(registry: &Arc<Registry>, mut builder: SchemaBuilder) -> SchemaBuilder {
    registry.resolve_deferred();

    let types = registry.types();
    let mut scalars: BTreeSet<String> = BTreeSet::new();
    let mut connections: Vec<Arc<ConnectionType>> = Vec::new();

    if types.iter().any(|ty| ty.implements_node()) {
        builder = builder.register(
            Interface::new(NODE_INTERFACE)
                .description("An object with an ID")
                .field(
                    InterfaceField::new("id", TypeRef::named_nn(TypeRef::ID))
                        .description("The ID of the object"),
                ),
        );
    }

    for ty in &types {
        let fields = rendered_fields(ty, registry);
        for (_, gql_type) in &fields {
            collect_scalar(gql_type.named(), &mut scalars);
        }

        if ty.is_interface() {
            builder = builder.register(render_interface(ty, &fields));
        } else {
            builder = builder.register(render_object(ty, &fields, registry));
        }

        if let Some(connection) = &ty.connection {
            connections.push(connection.clone());
        }
    }

    if !connections.is_empty() {
        builder = builder.register(page_info_object());
    }
    for connection in &connections {
        let interface = registry
            .type_by_name(&connection.node)
            .is_some_and(|node| node.is_interface());
        builder = builder
            .register(edge_object(connection, registry.clone(), interface))
            .register(connection_object(connection));
    }

    for def in registry.enums() {
        let mut item = Enum::new(&def.name);
        for name in def.item_names() {
            item = item.item(EnumItem::new(name));
        }
        builder = builder.register(item);
    }

    for filter in registry.filters() {
        if let Some(named) = filter.value_type() {
            collect_scalar(named, &mut scalars);
        }
        builder = builder.register(filter.to_input_object());
    }

    for name in scalars {
        builder = builder.register(dynamic::Scalar::new(name));
    }

    tracing::debug!(
        types = types.len(),
        connections = connections.len(),
        "Registered reflected types with schema"
    );
    builder
}

/// Build a schema over the reflected types of `registry` with `query` as root.
pub fn build_schema(registry: &Arc<Registry>, query: Object) -> Result<Schema> {
    let builder = Schema::build(query.type_name(), None, None).register(query);
    let schema = register_types(registry, builder).finish()?;
    Ok(schema)
}

/// The relay `node(id: ID!)` root field, loading through the [`SessionHandle`] in the request data.
pub fn node_field(registry: Arc<Registry>) -> Field {
    Field::new("node", TypeRef::named(NODE_INTERFACE), move |ctx| {
        let registry = registry.clone();
        FieldFuture::new(async move {
            let global_id = ctx.args.try_get("id")?.string()?.to_string();
            let Some((type_name, id)) = from_global_id(&global_id) else {
                return Err(format!("Invalid global id \"{}\"", global_id).into());
            };
            let Some(ty) = registry.type_by_name(&type_name) else {
                return Ok(None);
            };
            let session = ctx.data::<SessionHandle>()?;
            let instance = ty.get_node(session, &Value::String(id)).resolve().await?;
            Ok(instance.map(|instance| object_value(&registry, instance, true)))
        })
    })
    .argument(InputValue::new("id", TypeRef::named_nn(TypeRef::ID)))
    .description("Fetches an object given its ID")
}

fn collect_scalar(named: &NamedType, scalars: &mut BTreeSet<String>) {
    if let NamedType::Scalar(scalar) = named {
        if !scalar.is_builtin() {
            scalars.insert(scalar.name().to_string());
        }
    }
}

/// Fields of `ty` with their resolved types; unresolved fields are dropped.
fn rendered_fields<'a>(
    ty: &'a SchemaType,
    registry: &Registry,
) -> Vec<(&'a SchemaField, GqlType)> {
    ty.fields
        .values()
        .filter_map(|field| match field.resolved_type(registry) {
            Some(gql_type) => Some((field, gql_type)),
            None => {
                tracing::debug!(
                    type_name = %ty.name,
                    field = %field.name,
                    "Leaving out unresolved field"
                );
                None
            }
        })
        .collect()
}

fn render_interface(ty: &SchemaType, fields: &[(&SchemaField, GqlType)]) -> Interface {
    let mut interface = Interface::new(&ty.name);
    if let Some(description) = &ty.description {
        interface = interface.description(description);
    }
    for iface in &ty.interfaces {
        interface = interface.implement(iface.name());
    }
    for (field, gql_type) in fields {
        let mut rendered = InterfaceField::new(&field.name, gql_type.to_type_ref());
        if let Some(description) = &field.description {
            rendered = rendered.description(description);
        }
        if let Some(reason) = &field.deprecation_reason {
            rendered = rendered.deprecation(Some(reason.as_str()));
        }
        interface = interface.field(rendered);
    }
    interface
}

fn render_object(
    ty: &SchemaType,
    fields: &[(&SchemaField, GqlType)],
    registry: &Arc<Registry>,
) -> Object {
    let mut object = Object::new(&ty.name);
    if let Some(description) = &ty.description {
        object = object.description(description);
    }
    for iface in &ty.interfaces {
        object = object.implement(iface.name());
    }
    for (field, gql_type) in fields {
        object = object.field(render_field(ty, field, gql_type, registry));
    }
    object
}

fn render_field(
    owner: &SchemaType,
    field: &SchemaField,
    gql_type: &GqlType,
    registry: &Arc<Registry>,
) -> Field {
    let output = output_of(field, gql_type, registry);
    let type_ref = gql_type.to_type_ref();

    let mut rendered = match &field.resolver {
        Resolver::Custom(resolver) => {
            let resolver = resolver.clone();
            Field::new(&field.name, type_ref, move |ctx| resolver(ctx))
        }
        Resolver::GlobalId => {
            let registry = registry.clone();
            let owner = owner.name.clone();
            Field::new(&field.name, type_ref, move |ctx| {
                let registry = registry.clone();
                let owner = owner.clone();
                FieldFuture::new(async move {
                    let instance = ctx.parent_value.try_downcast_ref::<Instance>()?;
                    let type_name = registry
                        .type_for_model(instance.entity_name())
                        .map(|ty| ty.name.clone())
                        .unwrap_or(owner);
                    let id = key_text(&identifier(&instance.primary_key()));
                    Ok(Some(FieldValue::value(to_global_id(&type_name, &id))))
                })
            })
        }
        Resolver::Attribute(attr) => {
            let registry = registry.clone();
            let attr = attr.clone();
            Field::new(&field.name, type_ref, move |ctx| {
                let registry = registry.clone();
                let attr = attr.clone();
                FieldFuture::new(async move {
                    let instance = ctx.parent_value.try_downcast_ref::<Instance>()?;
                    resolve_attribute(&ctx, &registry, instance, &attr, output)
                })
            })
        }
    };

    if output == Output::Connection {
        rendered = rendered
            .argument(InputValue::new("first", TypeRef::named(TypeRef::INT)))
            .argument(InputValue::new("after", TypeRef::named(TypeRef::STRING)));
    }
    if let Some(description) = &field.description {
        rendered = rendered.description(description);
    }
    if let Some(reason) = &field.deprecation_reason {
        rendered = rendered.deprecation(Some(reason.as_str()));
    }
    rendered
}

fn output_of(field: &SchemaField, gql_type: &GqlType, registry: &Registry) -> Output {
    let interface = |name: &str| {
        registry
            .type_by_name(name)
            .is_some_and(|ty| ty.is_interface())
    };

    if let FieldShape::Dynamic(dynamic) | FieldShape::Field(FieldType::Dynamic(dynamic)) =
        &field.shape
    {
        if let Some(ResolvedRelationship::Connection { .. }) = dynamic.resolved() {
            return Output::Connection;
        }
    }

    match gql_type.named() {
        NamedType::Object(name) if gql_type.nullable().is_list() => Output::ObjectList {
            interface: interface(name),
        },
        NamedType::Object(name) => Output::Object {
            interface: interface(name),
        },
        NamedType::Enum(_) => Output::Enum,
        NamedType::Scalar(_) => Output::Scalar,
    }
}

fn resolve_attribute<'a>(
    ctx: &ResolverContext<'_>,
    registry: &Registry,
    instance: &Instance,
    attr: &str,
    output: Output,
) -> async_graphql::Result<Option<FieldValue<'a>>> {
    match output {
        Output::Scalar => Ok(instance.attribute(attr).and_then(non_null).map(FieldValue::value)),
        Output::Enum => Ok(instance
            .attribute(attr)
            .and_then(non_null)
            .map(|value| FieldValue::value(enum_value(value)))),
        Output::Object { interface } => match instance.related(attr) {
            Related::One(Some(related)) => Ok(Some(object_value(registry, related, interface))),
            Related::Many(mut items) if !items.is_empty() => {
                Ok(Some(object_value(registry, items.remove(0), interface)))
            }
            _ => Ok(None),
        },
        Output::ObjectList { interface } => match instance.related(attr) {
            Related::Many(items) => Ok(Some(FieldValue::list(
                items
                    .into_iter()
                    .map(|related| object_value(registry, related, interface)),
            ))),
            Related::One(Some(related)) => Ok(Some(FieldValue::list([object_value(
                registry, related, interface,
            )]))),
            _ => Ok(None),
        },
        Output::Connection => {
            let items = match instance.related(attr) {
                Related::Many(items) => items,
                Related::One(item) => item.into_iter().collect(),
                Related::Missing => return Ok(None),
            };
            let first = ctx
                .args
                .get("first")
                .map(|value| value.i64())
                .transpose()?
                .map(i32::try_from)
                .transpose()
                .map_err(|_| "first is out of range")?;
            let after = ctx
                .args
                .get("after")
                .map(|value| value.string().map(str::to_string))
                .transpose()?;
            let (offset, limit) = parse_pagination_args(first, after)?;
            Ok(Some(FieldValue::owned_any(Connection::paginate(
                items, offset, limit,
            ))))
        }
    }
}

fn non_null(value: Value) -> Option<Value> {
    match value {
        Value::Null => None,
        value => Some(value),
    }
}

fn enum_value(value: Value) -> Value {
    match value {
        Value::String(raw) => Value::Enum(Name::new(enum_item_name(&raw))),
        Value::List(items) => Value::List(items.into_iter().map(enum_value).collect()),
        other => other,
    }
}

/// An instance as an object value, typed with its concrete schema type when the field returns an interface.
fn object_value<'a>(registry: &Registry, instance: Instance, interface: bool) -> FieldValue<'a> {
    if !interface {
        return FieldValue::owned_any(instance);
    }
    match registry.type_for_model(instance.entity_name()) {
        Some(ty) => FieldValue::owned_any(instance).with_type(ty.name.clone()),
        None => FieldValue::owned_any(instance),
    }
}

fn page_info_object() -> Object {
    Object::new(PAGE_INFO)
        .description("Information about pagination in a connection")
        .field(page_info_field("hasNextPage", TypeRef::named_nn(TypeRef::BOOLEAN), |info| {
            Value::from(info.has_next_page)
        }))
        .field(page_info_field(
            "hasPreviousPage",
            TypeRef::named_nn(TypeRef::BOOLEAN),
            |info| Value::from(info.has_previous_page),
        ))
        .field(page_info_field("startCursor", TypeRef::named(TypeRef::STRING), |info| {
            Value::from(info.start_cursor.clone())
        }))
        .field(page_info_field("endCursor", TypeRef::named(TypeRef::STRING), |info| {
            Value::from(info.end_cursor.clone())
        }))
}

fn page_info_field(
    name: &str,
    type_ref: TypeRef,
    read: fn(&PageInfo) -> Value,
) -> Field {
    Field::new(name, type_ref, move |ctx| {
        FieldFuture::new(async move {
            let info = ctx.parent_value.try_downcast_ref::<PageInfo>()?;
            Ok(Some(FieldValue::value(read(info))))
        })
    })
}

fn connection_object(connection: &ConnectionType) -> Object {
    let mut object = Object::new(&connection.name)
        .description(format!("A connection to a list of {} items", connection.node))
        .field(
            Field::new(
                "edges",
                TypeRef::named_nn_list_nn(&connection.edge),
                |ctx| {
                    FieldFuture::new(async move {
                        let page = ctx.parent_value.try_downcast_ref::<Connection<Instance>>()?;
                        Ok(Some(FieldValue::list(
                            page.edges.iter().cloned().map(FieldValue::owned_any),
                        )))
                    })
                },
            )
            .description("Contains the nodes in this connection"),
        )
        .field(
            Field::new("pageInfo", TypeRef::named_nn(PAGE_INFO), |ctx| {
                FieldFuture::new(async move {
                    let page = ctx.parent_value.try_downcast_ref::<Connection<Instance>>()?;
                    Ok(Some(FieldValue::owned_any(page.page_info.clone())))
                })
            })
            .description("Pagination data for this connection"),
        );

    if connection.total_count {
        object = object.field(Field::new(
            "totalCount",
            TypeRef::named(TypeRef::INT),
            |ctx| {
                FieldFuture::new(async move {
                    let page = ctx.parent_value.try_downcast_ref::<Connection<Instance>>()?;
                    Ok(Some(FieldValue::value(page.total_count)))
                })
            },
        ));
    }
    object
}

fn edge_object(connection: &ConnectionType, registry: Arc<Registry>, interface: bool) -> Object {
    Object::new(&connection.edge)
        .description(format!("A {} edge", connection.node))
        .field(
            Field::new("node", TypeRef::named(&connection.node), move |ctx| {
                let registry = registry.clone();
                FieldFuture::new(async move {
                    let edge = ctx.parent_value.try_downcast_ref::<Edge<Instance>>()?;
                    Ok(Some(object_value(&registry, edge.node.clone(), interface)))
                })
            })
            .description("The item at the end of the edge"),
        )
        .field(
            Field::new("cursor", TypeRef::named_nn(TypeRef::STRING), |ctx| {
                FieldFuture::new(async move {
                    let edge = ctx.parent_value.try_downcast_ref::<Edge<Instance>>()?;
                    Ok(Some(FieldValue::value(edge.cursor.clone())))
                })
            })
            .description("A cursor for use in pagination"),
        )
}
