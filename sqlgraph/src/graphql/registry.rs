//! Registry of reflected types and their generated filters.
//!
//! A registry memoizes everything that must be shared between type
//! definitions: the schema type registered per entity, base type and
//! relationship filters, scalar and enum filters, generated enums and
//! composite converters. All get-or-create operations run check-then-insert
//! under a single write lock, so several schemas can be built concurrently.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use convert_case::{Case, Casing};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use parking_lot::RwLock;

use super::filters::{FilterOrigin, FilterType};
use super::orm::SchemaType;
use super::types::{EnumDef, EnumOrigin, FieldShape, Scalar};
use crate::error::{Result, SchemaError};
use crate::mapping::{Attribute, CompositeProperty, SqlEnum};

/// Converts a composite attribute of one composite class into a field shape.
pub type CompositeConverter =
    Arc<dyn Fn(&CompositeProperty, &Registry) -> FieldShape + Send + Sync>;

/// Scalars that receive a filter in every new registry.
const FILTERED_SCALARS: &[Scalar] = &[
    Scalar::Id,
    Scalar::String,
    Scalar::Int,
    Scalar::BigInt,
    Scalar::Float,
    Scalar::Boolean,
    Scalar::Date,
    Scalar::DateTime,
    Scalar::Time,
    Scalar::Uuid,
];

static NEXT_REGISTRY_ID: AtomicU64 = AtomicU64::new(1);

static GLOBAL_REGISTRY: Lazy<Arc<Registry>> = Lazy::new(|| Arc::new(Registry::new()));

/// A non-fatal degradation noticed while building a schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub type_name: String,
    pub field: String,
    pub attribute: String,
    pub message: String,
}

#[derive(Default)]
struct State {
    types: IndexMap<String, Arc<SchemaType>>,
    models: HashMap<String, String>,
    orm_fields: IndexMap<(String, String), Attribute>,
    base_filters: HashMap<String, Arc<FilterType>>,
    relationship_filters: HashMap<String, Arc<FilterType>>,
    scalar_filters: HashMap<Scalar, Arc<FilterType>>,
    sql_enum_filters: HashMap<String, Arc<FilterType>>,
    typed_enum_filters: HashMap<String, Arc<FilterType>>,
    enums: IndexMap<String, Arc<EnumDef>>,
    composite_converters: HashMap<String, CompositeConverter>,
    diagnostics: Vec<Diagnostic>,
}

impl State {
    fn with_scalar_filters() -> Self {
        let mut state = State::default();
        for scalar in FILTERED_SCALARS {
            if let Some(filter) = FilterType::scalar(scalar) {
                state.scalar_filters.insert(scalar.clone(), Arc::new(filter));
            }
        }
        state
    }
}

pub struct Registry {
    id: u64,
    state: RwLock<State>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("Registry")
            .field("id", &self.id)
            .field("types", &state.types.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Registry {
    /// A registry with the built-in scalar filters registered.
    pub fn new() -> Self {
        Self {
            id: NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed),
            state: RwLock::new(State::with_scalar_filters()),
        }
    }

    /// The process-wide default registry, used by types that do not name one.
    pub fn global() -> Arc<Registry> {
        GLOBAL_REGISTRY.clone()
    }

    /// Forget everything registered, keeping the built-in scalar filters.
    pub fn clear(&self) {
        *self.state.write() = State::with_scalar_filters();
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Register a finished schema type under its name and entity.
    pub fn register(&self, ty: Arc<SchemaType>) -> Result<()> {
        if ty.registry_id != self.id {
            return Err(SchemaError::RegistryMismatch {
                type_name: ty.name.clone(),
            });
        }
        let mut state = self.state.write();
        state.models.insert(ty.model.name.clone(), ty.name.clone());
        state.types.insert(ty.name.clone(), ty);
        Ok(())
    }

    /// The schema type registered for an entity.
    pub fn type_for_model(&self, entity: &str) -> Option<Arc<SchemaType>> {
        let state = self.state.read();
        let name = state.models.get(entity)?;
        state.types.get(name).cloned()
    }

    pub fn type_by_name(&self, name: &str) -> Option<Arc<SchemaType>> {
        self.state.read().types.get(name).cloned()
    }

    /// Registered types, in registration order.
    pub fn types(&self) -> Vec<Arc<SchemaType>> {
        self.state.read().types.values().cloned().collect()
    }

    /// Record which model attribute backs a field of a type.
    pub fn register_orm_field(&self, type_name: &str, field: &str, attribute: Attribute) {
        self.state
            .write()
            .orm_fields
            .insert((type_name.to_string(), field.to_string()), attribute);
    }

    pub fn orm_field(&self, type_name: &str, field: &str) -> Option<Attribute> {
        self.state
            .read()
            .orm_fields
            .get(&(type_name.to_string(), field.to_string()))
            .cloned()
    }

    pub fn base_filter(&self, type_name: &str) -> Option<Arc<FilterType>> {
        self.state.read().base_filters.get(type_name).cloned()
    }

    /// Register a base type filter unless one is registered already; returns the registered one.
    pub fn register_filter_for_base_type(
        &self,
        type_name: &str,
        filter: Arc<FilterType>,
    ) -> Arc<FilterType> {
        self.state
            .write()
            .base_filters
            .entry(type_name.to_string())
            .or_insert(filter)
            .clone()
    }

    /// The base filter of a type, created by `create` on first request.
    pub fn get_or_create_base_filter(
        &self,
        type_name: &str,
        create: impl FnOnce() -> FilterType,
    ) -> Arc<FilterType> {
        self.state
            .write()
            .base_filters
            .entry(type_name.to_string())
            .or_insert_with(|| Arc::new(create()))
            .clone()
    }

    pub fn relationship_filter(&self, type_name: &str) -> Option<Arc<FilterType>> {
        self.state.read().relationship_filters.get(type_name).cloned()
    }

    /// The relationship filter of a type, created from its base filter on first request.
    ///
    /// `None` when the type has no base filter.
    pub fn get_or_create_relationship_filter(
        &self,
        type_name: &str,
        model: &str,
    ) -> Option<Arc<FilterType>> {
        let mut state = self.state.write();
        if let Some(filter) = state.relationship_filters.get(type_name) {
            return Some(filter.clone());
        }
        let base = state.base_filters.get(type_name)?.clone();
        let filter = Arc::new(FilterType::relationship(type_name, model, base));
        state
            .relationship_filters
            .insert(type_name.to_string(), filter.clone());
        tracing::debug!(type_name, filter = %filter.name, "Relationship filter created");
        Some(filter)
    }

    pub fn scalar_filter(&self, scalar: &Scalar) -> Option<Arc<FilterType>> {
        self.state.read().scalar_filters.get(scalar).cloned()
    }

    /// Register (or replace) the filter used for a scalar.
    pub fn register_scalar_filter(&self, scalar: Scalar, filter: FilterType) -> Arc<FilterType> {
        let filter = Arc::new(filter);
        self.state.write().scalar_filters.insert(scalar, filter.clone());
        filter
    }

    /// Filter for an enum generated from a database-native enum.
    pub fn sql_enum_filter(&self, def: &EnumDef) -> Arc<FilterType> {
        self.state
            .write()
            .sql_enum_filters
            .entry(def.name.clone())
            .or_insert_with(|| {
                Arc::new(FilterType::enumeration_with_origin(def, FilterOrigin::SqlEnum))
            })
            .clone()
    }

    /// Filter for an enum generated from a language-level enum class.
    pub fn typed_enum_filter(&self, def: &EnumDef) -> Arc<FilterType> {
        self.state
            .write()
            .typed_enum_filters
            .entry(def.name.clone())
            .or_insert_with(|| {
                Arc::new(FilterType::enumeration_with_origin(def, FilterOrigin::TypedEnum))
            })
            .clone()
    }

    /// The GraphQL enum for a SQL enum column, created on first request.
    ///
    /// Named after the enum class or enum, or `{Entity}{Column}` for anonymous enums.
    pub fn enum_for_sql(&self, entity: &str, column: &str, sql_enum: &SqlEnum) -> Arc<EnumDef> {
        let (name, origin) = match (&sql_enum.enum_class, &sql_enum.name) {
            (Some(class), _) => (class.clone(), EnumOrigin::Typed),
            (None, Some(name)) => (name.to_case(Case::Pascal), EnumOrigin::Sql),
            (None, None) => (
                format!("{}{}", entity, column.to_case(Case::Pascal)),
                EnumOrigin::Sql,
            ),
        };
        self.state
            .write()
            .enums
            .entry(name.clone())
            .or_insert_with(|| {
                Arc::new(EnumDef {
                    name,
                    values: sql_enum.values.clone(),
                    origin,
                })
            })
            .clone()
    }

    pub fn enum_by_name(&self, name: &str) -> Option<Arc<EnumDef>> {
        self.state.read().enums.get(name).cloned()
    }

    /// Generated enums, in creation order.
    pub fn enums(&self) -> Vec<Arc<EnumDef>> {
        self.state.read().enums.values().cloned().collect()
    }

    pub fn register_composite_converter(
        &self,
        composite_class: impl Into<String>,
        converter: CompositeConverter,
    ) {
        self.state
            .write()
            .composite_converters
            .insert(composite_class.into(), converter);
    }

    pub fn composite_converter(&self, composite_class: &str) -> Option<CompositeConverter> {
        self.state
            .read()
            .composite_converters
            .get(composite_class)
            .cloned()
    }

    /// Every filter type known to the registry, each once.
    pub fn filters(&self) -> Vec<Arc<FilterType>> {
        let state = self.state.read();
        let mut filters: IndexMap<String, Arc<FilterType>> = IndexMap::new();
        let mut scalars: Vec<&Arc<FilterType>> = state.scalar_filters.values().collect();
        scalars.sort_by(|a, b| a.name.cmp(&b.name));
        let mut enums: Vec<&Arc<FilterType>> = state
            .sql_enum_filters
            .values()
            .chain(state.typed_enum_filters.values())
            .collect();
        enums.sort_by(|a, b| a.name.cmp(&b.name));
        let mut relationships: Vec<&Arc<FilterType>> =
            state.relationship_filters.values().collect();
        relationships.sort_by(|a, b| a.name.cmp(&b.name));

        let mut unregistered: Vec<&Arc<FilterType>> = state
            .base_filters
            .iter()
            .filter(|(name, _)| !state.types.contains_key(*name))
            .map(|(_, filter)| filter)
            .collect();
        unregistered.sort_by(|a, b| a.name.cmp(&b.name));
        let bases = state
            .types
            .keys()
            .filter_map(|name| state.base_filters.get(name))
            .chain(unregistered);
        for filter in scalars.into_iter().chain(enums).chain(bases).chain(relationships) {
            filters
                .entry(filter.name.clone())
                .or_insert_with(|| filter.clone());
        }
        filters.into_values().collect()
    }

    /// Record a non-fatal degradation. Repeated reports are kept once.
    pub fn warn(&self, type_name: &str, field: &str, attribute: &str, message: impl Into<String>) {
        let diagnostic = Diagnostic {
            type_name: type_name.to_string(),
            field: field.to_string(),
            attribute: attribute.to_string(),
            message: message.into(),
        };
        let mut state = self.state.write();
        if state.diagnostics.contains(&diagnostic) {
            return;
        }
        tracing::warn!(
            type_name = %diagnostic.type_name,
            field = %diagnostic.field,
            attribute = %diagnostic.attribute,
            "{}",
            diagnostic.message
        );
        state.diagnostics.push(diagnostic);
    }

    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.state.read().diagnostics.clone()
    }

    /// Second build phase: resolve relationship fields and deferred filters.
    ///
    /// Call once every type of a schema has been built. Safe to call again.
    pub fn resolve_deferred(&self) {
        super::orm::dynamic::resolve_deferred(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_scalar_filters() {
        let registry = Registry::new();
        for scalar in FILTERED_SCALARS {
            assert!(registry.scalar_filter(scalar).is_some(), "{:?}", scalar);
        }
        assert!(registry.scalar_filter(&Scalar::Json).is_none());
    }

    #[test]
    fn test_base_filter_is_memoized() {
        let registry = Registry::new();
        let first = registry.get_or_create_base_filter("Pet", || {
            FilterType::base("Pet", "Pet", IndexMap::new())
        });
        let second = registry.get_or_create_base_filter("Pet", || {
            FilterType::base("Pet", "Pet", IndexMap::new())
        });
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_relationship_filter_needs_base_filter() {
        let registry = Registry::new();
        assert!(registry.get_or_create_relationship_filter("Pet", "Pet").is_none());

        registry.get_or_create_base_filter("Pet", || FilterType::base("Pet", "Pet", IndexMap::new()));
        let first = registry.get_or_create_relationship_filter("Pet", "Pet").unwrap();
        let second = registry.get_or_create_relationship_filter("Pet", "Pet").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.name, "PetRelationshipFilter");
    }

    #[test]
    fn test_enum_naming() {
        let registry = Registry::new();
        let named = registry.enum_for_sql("Pet", "kind", &SqlEnum::native("pet_kind", &["cat"]));
        assert_eq!(named.name, "PetKind");
        let anonymous = registry.enum_for_sql("Pet", "hair_kind", &SqlEnum::anonymous(&["long"]));
        assert_eq!(anonymous.name, "PetHairKind");
        let typed = registry.enum_for_sql("Pet", "size", &SqlEnum::typed("Size", &["small"]));
        assert_eq!(typed.origin, EnumOrigin::Typed);

        let again = registry.enum_for_sql("Pet", "kind", &SqlEnum::native("pet_kind", &["cat"]));
        assert!(Arc::ptr_eq(&named, &again));
    }

    #[test]
    fn test_enum_filter_namespaces_are_separate() {
        let registry = Registry::new();
        let def = EnumDef {
            name: "Size".to_string(),
            values: vec!["small".to_string()],
            origin: EnumOrigin::Sql,
        };
        let sql = registry.sql_enum_filter(&def);
        let typed = registry.typed_enum_filter(&def);
        assert!(!Arc::ptr_eq(&sql, &typed));
        assert!(Arc::ptr_eq(&sql, &registry.sql_enum_filter(&def)));
    }

    #[test]
    fn test_diagnostics_are_deduplicated() {
        let registry = Registry::new();
        registry.warn("Pet", "tags", "tags", "No compatible filters found");
        registry.warn("Pet", "tags", "tags", "No compatible filters found");
        assert_eq!(registry.diagnostics().len(), 1);

        registry.clear();
        assert!(registry.diagnostics().is_empty());
        assert!(registry.scalar_filter(&Scalar::String).is_some());
    }
}
