//! Field overrides and type definitions.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_graphql::Value;
use indexmap::IndexMap;

use super::base::TypeConfig;
use crate::graphql::filters::FilterType;
use crate::graphql::types::{FieldType, GqlType, LazyType, ResolverFn};

static CREATION_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Options forwarded to field conversion.
#[derive(Debug, Clone, Default)]
pub struct FieldOptions {
    pub type_: Option<FieldType>,
    pub required: Option<bool>,
    pub description: Option<String>,
    pub deprecation_reason: Option<String>,
    pub batching: Option<bool>,
    pub extra: IndexMap<String, Value>,
}

impl FieldOptions {
    pub fn is_empty(&self) -> bool {
        self.type_.is_none()
            && self.required.is_none()
            && self.description.is_none()
            && self.deprecation_reason.is_none()
            && self.batching.is_none()
            && self.extra.is_empty()
    }
}

impl From<GqlType> for FieldType {
    fn from(ty: GqlType) -> Self {
        FieldType::Concrete(ty)
    }
}

impl From<LazyType> for FieldType {
    fn from(lazy: LazyType) -> Self {
        FieldType::Lazy(lazy)
    }
}

/// Overrides the field reflected for one model attribute.
///
/// Unless set, every option keeps the reflected default. Creation order is
/// recorded so overrides keep their declaration order in the generated type:
///
/// ```rust,ignore
/// let pet = TypeDefinition::new("Pet")
///     .meta(TypeConfig::new("Pet"))
///     .field("id", OrmField::new().type_(GqlType::scalar(Scalar::Int)))
///     .field("name", OrmField::new().required(true));
/// ```
#[derive(Debug, Clone)]
pub struct OrmField {
    pub creation_counter: u64,
    /// Model attribute backing the field; defaults to the field name
    pub model_attr: Option<String>,
    /// Whether to generate a filter; defaults to the type-level setting
    pub create_filter: Option<bool>,
    /// Filter used instead of the one found in the registry
    pub filter_type: Option<Arc<FilterType>>,
    pub options: FieldOptions,
}

impl Default for OrmField {
    fn default() -> Self {
        Self::new()
    }
}

impl OrmField {
    pub fn new() -> Self {
        Self {
            creation_counter: CREATION_COUNTER.fetch_add(1, Ordering::Relaxed),
            model_attr: None,
            create_filter: None,
            filter_type: None,
            options: FieldOptions::default(),
        }
    }

    /// A plain override for an auto-discovered attribute.
    pub(crate) fn for_attribute(model_attr: &str) -> Self {
        Self::new().model_attr(model_attr)
    }

    pub fn model_attr(mut self, model_attr: impl Into<String>) -> Self {
        self.model_attr = Some(model_attr.into());
        self
    }

    pub fn type_(mut self, type_: impl Into<FieldType>) -> Self {
        self.options.type_ = Some(type_.into());
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.options.required = Some(required);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.options.description = Some(description.into());
        self
    }

    pub fn deprecation_reason(mut self, reason: impl Into<String>) -> Self {
        self.options.deprecation_reason = Some(reason.into());
        self
    }

    pub fn batching(mut self, batching: bool) -> Self {
        self.options.batching = Some(batching);
        self
    }

    pub fn create_filter(mut self, create_filter: bool) -> Self {
        self.create_filter = Some(create_filter);
        self
    }

    pub fn filter_type(mut self, filter_type: Arc<FilterType>) -> Self {
        self.filter_type = Some(filter_type);
        self
    }

    /// A pass-through option for the schema-serving layer.
    pub fn option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.extra.insert(key.into(), value.into());
        self
    }
}

/// The declaration of a schema type: overrides, resolvers and configuration.
///
/// Definitions without `meta` are abstract bases: they are never built
/// themselves but contribute overrides and resolvers to derived definitions.
#[derive(Clone)]
pub struct TypeDefinition {
    pub name: String,
    pub bases: Vec<Arc<TypeDefinition>>,
    pub overrides: Vec<(String, OrmField)>,
    pub resolvers: IndexMap<String, ResolverFn>,
    pub meta: Option<TypeConfig>,
}

impl TypeDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bases: Vec::new(),
            overrides: Vec::new(),
            resolvers: IndexMap::new(),
            meta: None,
        }
    }

    pub fn meta(mut self, meta: TypeConfig) -> Self {
        self.meta = Some(meta);
        self
    }

    pub fn base(mut self, base: Arc<TypeDefinition>) -> Self {
        self.bases.push(base);
        self
    }

    pub fn field(mut self, name: impl Into<String>, field: OrmField) -> Self {
        self.overrides.push((name.into(), field));
        self
    }

    /// Resolve the field `name` with `resolver` instead of reading the model attribute.
    pub fn resolver(mut self, name: impl Into<String>, resolver: ResolverFn) -> Self {
        self.resolvers.insert(name.into(), resolver);
        self
    }

    /// This definition followed by its bases, each once.
    ///
    /// Bases are walked depth-first, left to right, keeping the last visit of each
    /// definition, so a shared base always follows every definition deriving from it.
    pub fn linearize(&self) -> Vec<&TypeDefinition> {
        let mut visits: Vec<&TypeDefinition> = Vec::new();
        visit(self, &mut visits);

        let mut order: Vec<&TypeDefinition> = Vec::with_capacity(visits.len());
        for (index, def) in visits.iter().enumerate() {
            let visited_again = visits[index + 1..]
                .iter()
                .any(|later| std::ptr::eq(*later, *def));
            if !visited_again {
                order.push(def);
            }
        }
        order
    }

    /// The resolver declared under `name`, the most derived declaration winning.
    pub fn resolver_for(&self, name: &str) -> Option<ResolverFn> {
        self.linearize()
            .into_iter()
            .find_map(|def| def.resolvers.get(name).cloned())
    }

    /// Overrides of the whole chain, scanned base to derived and sorted by creation order.
    ///
    /// A name redeclared further down the chain replaces the earlier declaration
    /// and takes its creation order with it.
    pub fn collect_overrides(&self) -> Vec<(String, OrmField)> {
        let mut by_name: IndexMap<String, OrmField> = IndexMap::new();
        for def in self.linearize().into_iter().rev() {
            for (name, field) in &def.overrides {
                by_name.insert(name.clone(), field.clone());
            }
        }
        let mut overrides: Vec<(String, OrmField)> = by_name.into_iter().collect();
        overrides.sort_by_key(|(_, field)| field.creation_counter);
        overrides
    }
}

fn visit<'a>(def: &'a TypeDefinition, visits: &mut Vec<&'a TypeDefinition>) {
    visits.push(def);
    for base in &def.bases {
        visit(base, visits);
    }
}

impl fmt::Debug for TypeDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDefinition")
            .field("name", &self.name)
            .field(
                "bases",
                &self.bases.iter().map(|b| b.name.as_str()).collect::<Vec<_>>(),
            )
            .field("overrides", &self.overrides)
            .field("resolvers", &self.resolvers.keys().collect::<Vec<_>>())
            .field("abstract", &self.meta.is_none())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_graphql::dynamic::{FieldFuture, ResolverContext};

    #[test]
    fn test_creation_counter_increases() {
        let first = OrmField::new();
        let second = OrmField::new();
        assert!(first.creation_counter < second.creation_counter);
    }

    #[test]
    fn test_options_emptiness() {
        assert!(OrmField::new().model_attr("x").create_filter(false).options.is_empty());
        assert!(!OrmField::new().option("complexity", 5).options.is_empty());
        assert!(!OrmField::new().required(true).options.is_empty());
    }

    #[test]
    fn test_linearize_without_duplicates() {
        let root = Arc::new(TypeDefinition::new("Root"));
        let left = Arc::new(TypeDefinition::new("Left").base(root.clone()));
        let right = Arc::new(TypeDefinition::new("Right").base(root.clone()));
        let leaf = TypeDefinition::new("Leaf").base(left).base(right);

        let names: Vec<&str> = leaf.linearize().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["Leaf", "Left", "Right", "Root"]);
    }

    #[test]
    fn test_shared_base_yields_to_intermediate_base() {
        fn unresolved(_ctx: ResolverContext<'_>) -> FieldFuture<'_> {
            FieldFuture::Value(None)
        }
        let root_resolver: ResolverFn = Arc::new(unresolved);
        let right_resolver: ResolverFn = Arc::new(unresolved);
        let root = Arc::new(
            TypeDefinition::new("Root")
                .field("name", OrmField::new().description("root"))
                .resolver("name", root_resolver),
        );
        let left = Arc::new(TypeDefinition::new("Left").base(root.clone()));
        let right = Arc::new(
            TypeDefinition::new("Right")
                .base(root)
                .field("name", OrmField::new().description("right"))
                .resolver("name", right_resolver.clone()),
        );
        let leaf = TypeDefinition::new("Leaf").base(left).base(right);

        let overrides = leaf.collect_overrides();
        assert_eq!(overrides.len(), 1);
        assert_eq!(overrides[0].1.options.description.as_deref(), Some("right"));

        let resolver = leaf.resolver_for("name").unwrap();
        assert!(Arc::ptr_eq(&resolver, &right_resolver));
    }

    #[test]
    fn test_overrides_sorted_by_creation_order() {
        let base_name = OrmField::new();
        let base_id = OrmField::new();
        let base = Arc::new(
            TypeDefinition::new("Base")
                .field("id", base_id)
                .field("name", base_name),
        );
        let derived = TypeDefinition::new("Derived")
            .base(base)
            .field("extra", OrmField::new());

        let names: Vec<String> = derived
            .collect_overrides()
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(names, vec!["name", "id", "extra"]);
    }

    #[test]
    fn test_redeclared_override_takes_derived_slot() {
        let base = Arc::new(
            TypeDefinition::new("Base")
                .field("id", OrmField::new())
                .field("name", OrmField::new().required(false))
                .field("email", OrmField::new()),
        );
        let derived = TypeDefinition::new("Derived")
            .base(base)
            .field("name", OrmField::new().required(true));

        let overrides = derived.collect_overrides();
        let names: Vec<&str> = overrides.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["id", "email", "name"]);
        assert_eq!(overrides[2].1.options.required, Some(true));
    }
}
