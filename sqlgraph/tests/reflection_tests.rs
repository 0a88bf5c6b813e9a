//! Integration tests for type reflection
//!
//! These tests build reflected types through the public API and verify:
//! - Field map composition (overrides, selection, discriminators)
//! - Filter map composition and the identity of generated filters
//! - Configuration errors raised before anything is converted
//! - Entities described with `#[derive(Mapped)]`

use std::sync::Arc;

use assert_matches::assert_matches;
use sqlgraph::SchemaError;
use sqlgraph::graphql::{
    InterfaceRef, OrmField, Registry, SchemaType, TypeConfig, TypeDefinition, build_interface,
    build_object_type,
};
use sqlgraph::mapping::{
    AssociationProxy, Catalog, Column, CompositeProperty, Entity, HybridProperty,
    RelationshipProperty, SqlEnum, SqlType,
};

// ============================================================================
// Fixtures
// ============================================================================

fn reporter() -> Entity {
    Entity::new("Reporter")
        .column(Column::new("id", SqlType::Integer).primary_key())
        .column(Column::new("first_name", SqlType::String(Some(30))))
        .column(Column::new("last_name", SqlType::String(Some(30))))
        .column(Column::new("email", SqlType::String(None)))
        .column(Column::new(
            "favorite_pet_kind",
            SqlType::Enum(SqlEnum::native("pet_kind", &["cat", "dog"])),
        ))
        .hybrid(HybridProperty::new("full_name"))
        .relationship(RelationshipProperty::one_to_many("pets", "Pet"))
        .association_proxy(AssociationProxy::new("pet_names", "pets", "name"))
}

fn pet() -> Entity {
    Entity::new("Pet")
        .column(Column::new("id", SqlType::Integer).primary_key())
        .column(Column::new("name", SqlType::String(Some(30))))
        .column(Column::new("reporter_id", SqlType::Integer))
        .relationship(RelationshipProperty::many_to_one("reporter", "Reporter"))
}

fn article() -> Entity {
    Entity::new("Article")
        .column(Column::new("id", SqlType::Integer).primary_key())
        .column(Column::new("headline", SqlType::Text))
        .relationship(RelationshipProperty::many_to_many("pets", "Pet"))
}

fn catalog() -> Catalog {
    let mut catalog = Catalog::new();
    catalog.add(reporter()).unwrap();
    catalog.add(pet()).unwrap();
    catalog.add(article()).unwrap();
    catalog.validate().unwrap();
    catalog
}

fn config(model: &str, registry: &Arc<Registry>) -> TypeConfig {
    TypeConfig::new(model).registry(registry.clone())
}

fn build(catalog: &Catalog, definition: &TypeDefinition) -> Arc<SchemaType> {
    build_object_type(catalog, definition).unwrap().unwrap()
}

fn field_names(ty: &SchemaType) -> Vec<&str> {
    ty.fields.keys().map(String::as_str).collect()
}

fn filter_names(ty: &SchemaType) -> Vec<String> {
    ty.filter_class
        .as_ref()
        .and_then(|filter| filter.fields())
        .map(|fields| fields.keys().cloned().collect())
        .unwrap_or_default()
}

// ============================================================================
// Field Map Tests
// ============================================================================

mod field_map {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_required_override_on_nullable_column() {
        let registry = Arc::new(Registry::new());
        let mut catalog = Catalog::new();
        catalog
            .add(
                Entity::new("Person")
                    .column(Column::new("id", SqlType::Integer).primary_key())
                    .column(Column::new("name", SqlType::String(None))),
            )
            .unwrap();
        let definition = TypeDefinition::new("PersonType")
            .meta(config("Person", &registry))
            .field("name", OrmField::new().required(true));

        let ty = build(&catalog, &definition);
        let name = ty.fields["name"].resolved_type(&registry).unwrap();
        assert_eq!(name.to_string(), "String!");

        let filters = ty.filter_class.as_ref().unwrap().fields().unwrap();
        assert_eq!(filters["name"].filter().unwrap().name, "StringFilter");
    }

    #[test]
    fn test_only_fields_limits_auto_discovery() {
        let registry = Arc::new(Registry::new());
        let definition = TypeDefinition::new("ReporterType")
            .meta(config("Reporter", &registry).only_fields(&["id"]));

        let ty = build(&catalog(), &definition);
        assert_eq!(field_names(&ty), vec!["id"]);
        assert!(!ty.fields.contains_key("full_name"));
    }

    #[test]
    fn test_discriminator_is_never_discovered() {
        let registry = Arc::new(Registry::new());
        let mut catalog = Catalog::new();
        catalog
            .add(
                Entity::new("Mammal")
                    .column(Column::new("id", SqlType::Integer).primary_key())
                    .column(Column::new("kind", SqlType::String(None)))
                    .column(Column::new("legs", SqlType::SmallInteger))
                    .polymorphic_on("kind"),
            )
            .unwrap();

        let first = TypeDefinition::new("MammalA").meta(config("Mammal", &registry));
        let second = TypeDefinition::new("MammalB").meta(config("Mammal", &registry));
        for ty in [build(&catalog, &first), build(&catalog, &second)] {
            assert_eq!(field_names(&ty), vec!["id", "legs"]);
            assert!(!filter_names(&ty).contains(&"kind".to_string()));
        }
    }

    #[test]
    fn test_excluded_names_stay_out_even_when_overridden() {
        let registry = Arc::new(Registry::new());
        let definition = TypeDefinition::new("ReporterType")
            .meta(config("Reporter", &registry).exclude_fields(&["email", "pet_names"]))
            .field("email", OrmField::new().required(true));

        let ty = build(&catalog(), &definition);
        assert_eq!(
            field_names(&ty),
            vec!["id", "first_name", "last_name", "favorite_pet_kind", "full_name", "pets"]
        );
    }

    #[test]
    fn test_overrides_keep_creation_order() {
        let registry = Arc::new(Registry::new());
        let last_name = OrmField::new().description("Family name");
        let first_name = OrmField::new().description("Given name");
        let definition = TypeDefinition::new("ReporterType")
            .meta(config("Reporter", &registry).only_fields(&["id", "first_name", "last_name"]))
            .field("first_name", first_name)
            .field("last_name", last_name);

        let ty = build(&catalog(), &definition);
        assert_eq!(field_names(&ty), vec!["last_name", "first_name", "id"]);
    }

    #[test]
    fn test_derived_override_takes_its_own_slot() {
        let registry = Arc::new(Registry::new());
        let base = Arc::new(
            TypeDefinition::new("ReporterBase")
                .field("first_name", OrmField::new().description("Base"))
                .field("last_name", OrmField::new()),
        );
        let definition = TypeDefinition::new("ReporterType")
            .base(base)
            .meta(config("Reporter", &registry).only_fields(&["first_name", "last_name"]))
            .field("first_name", OrmField::new().description("Derived"));

        let ty = build(&catalog(), &definition);
        assert_eq!(field_names(&ty), vec!["last_name", "first_name"]);
        assert_eq!(ty.fields["first_name"].description.as_deref(), Some("Derived"));
    }

    #[test]
    fn test_relationship_shapes_after_resolution() {
        let registry = Arc::new(Registry::new());
        let catalog = catalog();
        let reporter = build(
            &catalog,
            &TypeDefinition::new("ReporterType").meta(config("Reporter", &registry)),
        );
        let pet = build(
            &catalog,
            &TypeDefinition::new("PetType").meta(config("Pet", &registry)),
        );
        assert!(reporter.fields["pets"].resolved_type(&registry).is_some());

        registry.resolve_deferred();
        assert_eq!(
            reporter.fields["pets"].resolved_type(&registry).unwrap().to_string(),
            "[PetType]"
        );
        assert_eq!(
            pet.fields["reporter"].resolved_type(&registry).unwrap().to_string(),
            "ReporterType"
        );
        assert_eq!(
            reporter.fields["pet_names"].resolved_type(&registry).unwrap().to_string(),
            "[String]"
        );
    }

    #[test]
    fn test_node_interface_implies_connection() {
        let registry = Arc::new(Registry::new());
        let catalog = catalog();
        let reporter = build(
            &catalog,
            &TypeDefinition::new("ReporterType").meta(config("Reporter", &registry)),
        );
        build(
            &catalog,
            &TypeDefinition::new("PetType")
                .meta(config("Pet", &registry).interface(InterfaceRef::Node)),
        );
        registry.resolve_deferred();

        assert_eq!(
            reporter.fields["pets"].resolved_type(&registry).unwrap().to_string(),
            "PetTypeConnection"
        );
    }
}

// ============================================================================
// Filter Map Tests
// ============================================================================

mod filter_map {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_filters_are_a_subset_of_fields() {
        let registry = Arc::new(Registry::new());
        let catalog = catalog();
        let definitions = [
            TypeDefinition::new("ReporterType").meta(config("Reporter", &registry)),
            TypeDefinition::new("QuietReporter")
                .meta(config("Reporter", &registry).create_filters(false))
                .field("email", OrmField::new().create_filter(true)),
            TypeDefinition::new("PartialReporter")
                .meta(config("Reporter", &registry).only_fields(&["id", "email"]))
                .field("first_name", OrmField::new().create_filter(false)),
        ];

        for definition in &definitions {
            let ty = build(&catalog, definition);
            for name in filter_names(&ty) {
                assert!(ty.fields.contains_key(&name), "{} filters {}", ty.name, name);
            }
        }
    }

    #[test]
    fn test_type_level_filter_default() {
        let registry = Arc::new(Registry::new());
        let definition = TypeDefinition::new("QuietReporter")
            .meta(config("Reporter", &registry).create_filters(false))
            .field("email", OrmField::new().create_filter(true));

        let ty = build(&catalog(), &definition);
        assert_eq!(filter_names(&ty), vec!["email".to_string()]);
    }

    #[test]
    fn test_association_proxies_are_never_filtered() {
        let registry = Arc::new(Registry::new());
        let definition = TypeDefinition::new("ReporterType")
            .meta(config("Reporter", &registry))
            .field("pet_names", OrmField::new().create_filter(true));

        let ty = build(&catalog(), &definition);
        assert!(ty.fields.contains_key("pet_names"));
        assert!(!filter_names(&ty).contains(&"pet_names".to_string()));
    }

    #[test]
    fn test_scalar_and_enum_filters() {
        let registry = Arc::new(Registry::new());
        let ty = build(
            &catalog(),
            &TypeDefinition::new("ReporterType").meta(config("Reporter", &registry)),
        );
        let filters = ty.filter_class.as_ref().unwrap().fields().unwrap();
        assert_eq!(filters["id"].filter().unwrap().name, "IDFilter");
        assert_eq!(filters["first_name"].filter().unwrap().name, "StringFilter");
        assert_eq!(
            filters["favorite_pet_kind"].filter().unwrap().name,
            "PetKindFilter"
        );
        assert_eq!(filters["full_name"].filter().unwrap().name, "StringFilter");
        assert!(filters["pets"].is_deferred());
    }

    #[test]
    fn test_base_filter_is_memoized() {
        let registry = Arc::new(Registry::new());
        let catalog = catalog();
        let first = build(
            &catalog,
            &TypeDefinition::new("PetType").meta(config("Pet", &registry)),
        );
        let second = build(
            &catalog,
            &TypeDefinition::new("PetType").meta(config("Pet", &registry)),
        );
        assert!(Arc::ptr_eq(
            first.filter_class.as_ref().unwrap(),
            second.filter_class.as_ref().unwrap()
        ));
    }

    #[test]
    fn test_relationship_filter_is_shared_between_owners() {
        let registry = Arc::new(Registry::new());
        let catalog = catalog();
        let reporter = build(
            &catalog,
            &TypeDefinition::new("ReporterType").meta(config("Reporter", &registry)),
        );
        let article = build(
            &catalog,
            &TypeDefinition::new("ArticleType").meta(config("Article", &registry)),
        );
        let pet = build(
            &catalog,
            &TypeDefinition::new("PetType").meta(config("Pet", &registry)),
        );
        registry.resolve_deferred();

        let through_reporter = reporter.filter_class.as_ref().unwrap().fields().unwrap()["pets"]
            .filter()
            .unwrap();
        let through_article = article.filter_class.as_ref().unwrap().fields().unwrap()["pets"]
            .filter()
            .unwrap();
        assert!(Arc::ptr_eq(&through_reporter, &through_article));
        assert_eq!(through_reporter.name, "PetTypeRelationshipFilter");

        let direct = sqlgraph::graphql::orm::get_or_create_relationship_filter(&pet, &registry)
            .unwrap();
        assert!(Arc::ptr_eq(&direct, &through_reporter));

        // many-to-one filters through the target's base filter
        let reporter_filter = pet.filter_class.as_ref().unwrap().fields().unwrap()["reporter"]
            .filter()
            .unwrap();
        assert!(Arc::ptr_eq(
            &reporter_filter,
            reporter.filter_class.as_ref().unwrap()
        ));
    }

    #[test]
    fn test_unresolvable_relationship_is_reported() {
        let registry = Arc::new(Registry::new());
        let reporter = build(
            &catalog(),
            &TypeDefinition::new("ReporterType").meta(config("Reporter", &registry)),
        );
        registry.resolve_deferred();

        assert!(reporter.fields["pets"].resolved_type(&registry).is_none());
        assert!(reporter.filter_class.as_ref().unwrap().fields().unwrap()["pets"]
            .filter()
            .is_none());
        let diagnostics = registry.diagnostics();
        assert!(
            diagnostics
                .iter()
                .any(|d| d.type_name == "ReporterType" && d.field == "pets")
        );
    }

    #[test]
    fn test_json_columns_are_not_filterable() {
        let registry = Arc::new(Registry::new());
        let mut catalog = Catalog::new();
        catalog
            .add(
                Entity::new("Document")
                    .column(Column::new("id", SqlType::Integer).primary_key())
                    .column(Column::new("body", SqlType::Json)),
            )
            .unwrap();
        let ty = build(
            &catalog,
            &TypeDefinition::new("DocumentType").meta(config("Document", &registry)),
        );

        assert!(ty.fields.contains_key("body"));
        assert_eq!(filter_names(&ty), vec!["id".to_string()]);
        assert!(registry.diagnostics().iter().any(|d| d.field == "body"));
    }
}

// ============================================================================
// Configuration Error Tests
// ============================================================================

mod configuration_errors {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_only_and_exclude_are_exclusive() {
        let registry = Arc::new(Registry::new());
        let definition = TypeDefinition::new("ReporterType").meta(
            config("Reporter", &registry)
                .only_fields(&["id"])
                .exclude_fields(&["email"]),
        );
        assert_matches!(
            build_object_type(&catalog(), &definition),
            Err(SchemaError::ConflictingFieldSelection { .. })
        );
        assert!(registry.type_by_name("ReporterType").is_none());
    }

    #[test]
    fn test_override_of_unknown_attribute() {
        let registry = Arc::new(Registry::new());
        let definition = TypeDefinition::new("ReporterType")
            .meta(config("Reporter", &registry))
            .field("nickname", OrmField::new());
        assert_matches!(
            build_object_type(&catalog(), &definition),
            Err(SchemaError::UnmappedOverride { type_name, field })
                if type_name == "ReporterType" && field == "nickname"
        );
    }

    #[test]
    fn test_composite_override_fails_before_any_conversion() {
        let registry = Arc::new(Registry::new());
        let mut catalog = Catalog::new();
        catalog
            .add(reporter().composite(CompositeProperty::new(
                "composite_prop",
                "CompositeFullName",
                vec![
                    Column::new("first_name", SqlType::String(None)),
                    Column::new("last_name", SqlType::String(None)),
                ],
            )))
            .unwrap();
        let definition = TypeDefinition::new("ReporterType")
            .meta(config("Reporter", &registry))
            .field("email", OrmField::new().required(true))
            .field("composite_prop", OrmField::new().option("complexity", 3));

        assert_matches!(
            build_object_type(&catalog, &definition),
            Err(SchemaError::CompositeOverride { field, .. }) if field == "composite_prop"
        );
        assert!(registry.orm_field("ReporterType", "email").is_none());
        assert!(registry.enums().is_empty());
    }

    #[test]
    fn test_composite_without_converter() {
        let registry = Arc::new(Registry::new());
        let mut catalog = Catalog::new();
        catalog
            .add(reporter().composite(CompositeProperty::new(
                "composite_prop",
                "CompositeFullName",
                vec![],
            )))
            .unwrap();
        let definition = TypeDefinition::new("ReporterType").meta(config("Reporter", &registry));
        assert_matches!(
            build_object_type(&catalog, &definition),
            Err(SchemaError::UnconvertibleComposite { composite_class, .. })
                if composite_class == "CompositeFullName"
        );
    }

    #[test]
    fn test_interface_registry_must_match() {
        let catalog = catalog();
        let other = Arc::new(Registry::new());
        let interface = build_interface(
            &catalog,
            &TypeDefinition::new("Named").meta(config("Reporter", &other)),
        )
        .unwrap()
        .unwrap();

        let registry = Arc::new(Registry::new());
        let definition = TypeDefinition::new("ReporterType").meta(
            config("Reporter", &registry).interface(InterfaceRef::Type(interface)),
        );
        assert_matches!(
            build_object_type(&catalog, &definition),
            Err(SchemaError::RegistryMismatch { type_name }) if type_name == "Named"
        );
    }
}

// ============================================================================
// Derived Entity Tests
// ============================================================================

mod derived_entities {
    use super::*;
    use pretty_assertions::assert_eq;
    use sqlgraph::Mapped;
    use sqlgraph::mapping::{Direction, Instance, MappedInstance, Related};

    /// A household pet
    #[derive(Mapped, Clone)]
    #[mapped(table = "pets")]
    struct Pet {
        #[column(primary_key)]
        id: i32,
        /// The pet's name
        name: String,
        #[column(values = "cat, dog", enum_name = "pet_kind")]
        pet_kind: String,
        legs: Option<i16>,
        #[mapped(skip)]
        #[allow(dead_code)]
        cache: Vec<u8>,
    }

    #[derive(Mapped, Clone)]
    struct Owner {
        #[column(primary_key)]
        id: i64,
        #[column(sql_type = "text")]
        name: Option<String>,
        #[relationship(target = "Pet")]
        pets: Vec<Pet>,
    }

    fn garfield() -> Pet {
        Pet {
            id: 1,
            name: "Garfield".to_string(),
            pet_kind: "cat".to_string(),
            legs: None,
            cache: Vec::new(),
        }
    }

    #[test]
    fn test_entity_metadata() {
        let pet = <Pet as Mapped>::entity();
        assert_eq!(pet.name, "Pet");
        assert_eq!(pet.table, "pets");
        assert_eq!(pet.doc.as_deref(), Some("A household pet"));

        let names: Vec<&str> = pet.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["id", "name", "pet_kind", "legs"]);
        assert!(pet.columns[0].primary_key);
        assert!(!pet.columns[1].nullable);
        assert_eq!(pet.columns[1].doc.as_deref(), Some("The pet's name"));
        assert_matches!(&pet.columns[2].sql_type, SqlType::Enum(e) if e.name.as_deref() == Some("pet_kind"));
        assert_eq!(pet.columns[3].sql_type, SqlType::SmallInteger);
        assert!(pet.columns[3].nullable);

        let owner = <Owner as Mapped>::entity();
        assert_eq!(owner.table, "owner");
        assert_eq!(owner.columns[0].sql_type, SqlType::BigInteger);
        assert_eq!(owner.columns[1].sql_type, SqlType::Text);
        assert_eq!(owner.relationships[0].direction, Direction::OneToMany);
        assert_eq!(owner.relationships[0].target, "Pet");
    }

    #[test]
    fn test_instance_access() {
        let owner = Instance::new(Owner {
            id: 7,
            name: None,
            pets: vec![garfield()],
        });
        assert_eq!(owner.entity_name(), "Owner");
        assert_eq!(owner.primary_key(), vec![async_graphql_value(7)]);
        assert_eq!(owner.attribute("name"), Some(sqlgraph::async_graphql::Value::Null));
        assert_eq!(owner.attribute("pets"), None);
        assert_matches!(owner.related("pets"), Related::Many(pets) if pets.len() == 1);
        assert_matches!(owner.related("name"), Related::Missing);

        let pet = garfield();
        assert_eq!(
            MappedInstance::attribute(&pet, "pet_kind"),
            Some(sqlgraph::async_graphql::Value::from("cat"))
        );
        assert_eq!(MappedInstance::attribute(&pet, "cache"), None);
    }

    #[test]
    fn test_derived_entities_reflect() {
        let registry = Arc::new(Registry::new());
        let mut catalog = Catalog::new();
        catalog.add_mapped::<Owner>().unwrap();
        catalog.add_mapped::<Pet>().unwrap();
        catalog.validate().unwrap();

        let owner = build(
            &catalog,
            &TypeDefinition::new("OwnerType").meta(config("Owner", &registry)),
        );
        let pet = build(
            &catalog,
            &TypeDefinition::new("PetType").meta(config("Pet", &registry)),
        );
        registry.resolve_deferred();

        assert_eq!(field_names(&owner), vec!["id", "name", "pets"]);
        assert_eq!(
            pet.fields["pet_kind"].resolved_type(&registry).unwrap().to_string(),
            "PetKind!"
        );
        assert_eq!(
            pet.fields["name"].description.as_deref(),
            Some("The pet's name")
        );
    }

    fn async_graphql_value(value: i64) -> sqlgraph::async_graphql::Value {
        sqlgraph::async_graphql::Value::from(value)
    }
}
