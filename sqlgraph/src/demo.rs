//! A small pets and reporters schema built from derived entities.

use std::sync::Arc;

use anyhow::Context;
use async_graphql::dynamic::{Field, FieldFuture, FieldValue, Object, Schema, TypeRef};
use sqlgraph::graphql::{
    InterfaceRef, OrmField, Registry, TypeConfig, TypeDefinition, build_object_type, render,
};
use sqlgraph::mapping::{Catalog, Instance, MemorySession};
use sqlgraph::{Config, Mapped};

/// A pet owned by a reporter
#[derive(Mapped, Clone)]
#[mapped(table = "pets")]
pub struct Pet {
    #[column(primary_key)]
    pub id: i32,
    /// The pet's name
    pub name: String,
    #[column(values = "cat, dog", enum_name = "pet_kind")]
    pub pet_kind: String,
    pub reporter_id: Option<i32>,
    #[relationship(target = "Reporter")]
    pub reporter: Option<Box<Reporter>>,
}

/// Someone who files articles
#[derive(Mapped, Clone)]
#[mapped(table = "reporters")]
pub struct Reporter {
    #[column(primary_key)]
    pub id: i32,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    #[column(values = "cat, dog", enum_name = "pet_kind")]
    pub favorite_pet_kind: Option<String>,
    #[relationship(target = "Pet")]
    pub pets: Vec<Pet>,
}

/// Catalog of the demo entities.
pub fn catalog() -> anyhow::Result<Catalog> {
    let mut catalog = Catalog::new();
    catalog.add_mapped::<Reporter>()?;
    catalog.add_mapped::<Pet>()?;
    catalog.validate()?;
    Ok(catalog)
}

/// Rows served by the demo session.
pub fn session() -> Arc<MemorySession> {
    let session = MemorySession::new();
    let pets = vec![
        Pet {
            id: 1,
            name: "Garfield".to_string(),
            pet_kind: "cat".to_string(),
            reporter_id: Some(1),
            reporter: None,
        },
        Pet {
            id: 2,
            name: "Snoopy".to_string(),
            pet_kind: "dog".to_string(),
            reporter_id: Some(1),
            reporter: None,
        },
    ];
    for pet in &pets {
        session.insert(Instance::new(pet.clone()));
    }
    session.insert(Instance::new(Reporter {
        id: 1,
        first_name: Some("Ada".to_string()),
        last_name: Some("Lovelace".to_string()),
        email: None,
        favorite_pet_kind: Some("cat".to_string()),
        pets,
    }));
    Arc::new(session)
}

/// Build the demo schema; the query root lists reporters and resolves nodes.
pub fn schema(
    config: &Config,
    catalog: &Catalog,
    session: Arc<MemorySession>,
) -> anyhow::Result<Schema> {
    let registry = Arc::new(Registry::new());

    let definitions = [
        TypeDefinition::new("Reporter").meta(
            TypeConfig::from_config("Reporter", config)
                .registry(registry.clone())
                .interface(InterfaceRef::Node)
                .exclude_fields(&["email"]),
        ),
        TypeDefinition::new("Pet")
            .meta(
                TypeConfig::from_config("Pet", config)
                    .registry(registry.clone())
                    .interface(InterfaceRef::Node),
            )
            .field("name", OrmField::new().description("What the pet answers to")),
    ];
    for definition in &definitions {
        build_object_type(catalog, definition)
            .with_context(|| format!("Failed to build type {}", definition.name))?;
    }
    tracing::info!(types = registry.types().len(), "Schema types built");

    let reporter = registry
        .type_by_name("Reporter")
        .context("Reporter type missing from registry")?;
    let mut reporters = Field::new(
        "reporters",
        TypeRef::named_nn_list_nn(&reporter.name),
        move |_ctx| {
            let session = session.clone();
            FieldFuture::new(async move {
                Ok(Some(FieldValue::list(
                    session
                        .all("Reporter")
                        .into_iter()
                        .map(FieldValue::owned_any),
                )))
            })
        },
    );
    if let Some(filter) = reporter.filter_argument() {
        reporters = reporters.argument(filter);
    }

    let query = Object::new("Query")
        .field(reporters)
        .field(render::node_field(registry.clone()));
    let schema = render::build_schema(&registry, query).context("Failed to render schema")?;

    for diagnostic in registry.diagnostics() {
        tracing::warn!(
            type_name = %diagnostic.type_name,
            field = %diagnostic.field,
            message = %diagnostic.message,
            "Schema diagnostic"
        );
    }
    Ok(schema)
}
