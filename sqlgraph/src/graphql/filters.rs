//! GraphQL filter input types generated alongside reflected types
//!
//! Three shapes of filter input exist:
//! - field filters for scalars and enums, with operators like
//!   eq, ne (equals, not equals), lt, lte, gt, gte (comparisons),
//!   contains, startsWith, endsWith (string matching),
//!   in, notIn (list membership) and isNull
//! - base type filters, one per reflected type, combining the filters of its fields
//!   with `and` / `or`
//! - relationship filters, wrapping a base type filter for filtering through a
//!   relationship (`contains`, `containsExactly`)

use std::fmt;
use std::sync::{Arc, Weak};

use async_graphql::dynamic::{InputObject, InputValue, TypeRef};
use indexmap::IndexMap;
use once_cell::sync::OnceCell;

use super::orm::dynamic::DynamicField;
use super::types::{EnumDef, EnumOrigin, GqlType, LazyType, NamedType, Scalar};
use crate::mapping::Attribute;

/// Operators a field filter can offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOperator {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
    NotIn,
    IsNull,
    Contains,
    StartsWith,
    EndsWith,
}

impl FilterOperator {
    /// Operators for values that can only be compared for equality.
    pub const EQUALITY: &'static [FilterOperator] = &[
        FilterOperator::Eq,
        FilterOperator::Ne,
        FilterOperator::In,
        FilterOperator::NotIn,
        FilterOperator::IsNull,
    ];

    /// Operators for ordered values (numbers, dates, times).
    pub const ORDERED: &'static [FilterOperator] = &[
        FilterOperator::Eq,
        FilterOperator::Ne,
        FilterOperator::Lt,
        FilterOperator::Lte,
        FilterOperator::Gt,
        FilterOperator::Gte,
        FilterOperator::In,
        FilterOperator::NotIn,
        FilterOperator::IsNull,
    ];

    /// Operators for text.
    pub const TEXT: &'static [FilterOperator] = &[
        FilterOperator::Eq,
        FilterOperator::Ne,
        FilterOperator::In,
        FilterOperator::NotIn,
        FilterOperator::IsNull,
        FilterOperator::Contains,
        FilterOperator::StartsWith,
        FilterOperator::EndsWith,
    ];

    pub const BOOLEAN: &'static [FilterOperator] =
        &[FilterOperator::Eq, FilterOperator::Ne, FilterOperator::IsNull];

    /// GraphQL name of the operator input
    pub fn name(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "eq",
            FilterOperator::Ne => "ne",
            FilterOperator::Lt => "lt",
            FilterOperator::Lte => "lte",
            FilterOperator::Gt => "gt",
            FilterOperator::Gte => "gte",
            FilterOperator::In => "in",
            FilterOperator::NotIn => "notIn",
            FilterOperator::IsNull => "isNull",
            FilterOperator::Contains => "contains",
            FilterOperator::StartsWith => "startsWith",
            FilterOperator::EndsWith => "endsWith",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "Equals",
            FilterOperator::Ne => "Not equals",
            FilterOperator::Lt => "Less than",
            FilterOperator::Lte => "Less than or equal",
            FilterOperator::Gt => "Greater than",
            FilterOperator::Gte => "Greater than or equal",
            FilterOperator::In => "In list",
            FilterOperator::NotIn => "Not in list",
            FilterOperator::IsNull => "Is null",
            FilterOperator::Contains => "Contains substring",
            FilterOperator::StartsWith => "Starts with",
            FilterOperator::EndsWith => "Ends with",
        }
    }

    /// Input type of this operator for a filtered value type.
    pub fn input_type(&self, value: &GqlType) -> GqlType {
        match self {
            FilterOperator::In | FilterOperator::NotIn => GqlType::list(value.clone().non_null()),
            FilterOperator::IsNull => GqlType::scalar(Scalar::Boolean),
            _ => value.clone(),
        }
    }
}

/// Where a field filter came from; enum filters live in separate namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOrigin {
    Scalar,
    /// Membership against the raw values of a database-native enum
    SqlEnum,
    /// Membership against the members of a language-level enum
    TypedEnum,
    /// Supplied by the application
    Custom,
}

/// A generated filter input type.
#[derive(Debug)]
pub struct FilterType {
    pub name: String,
    pub description: Option<String>,
    pub kind: FilterKind,
}

#[derive(Debug)]
pub enum FilterKind {
    /// Operators over a single value
    Field {
        value: GqlType,
        operators: Vec<FilterOperator>,
        origin: FilterOrigin,
    },
    /// The filter of a reflected type
    BaseType {
        type_name: String,
        model: String,
        fields: IndexMap<String, FilterInputField>,
    },
    /// Filtering through a relationship to a reflected type
    Relationship {
        type_name: String,
        model: String,
        base: Arc<FilterType>,
    },
}

impl FilterType {
    /// The built-in filter of a scalar, if the scalar is filterable.
    pub fn scalar(scalar: &Scalar) -> Option<Self> {
        let operators = match scalar {
            Scalar::String => FilterOperator::TEXT,
            Scalar::Id | Scalar::Uuid => FilterOperator::EQUALITY,
            Scalar::Int
            | Scalar::BigInt
            | Scalar::Float
            | Scalar::Date
            | Scalar::DateTime
            | Scalar::Time => FilterOperator::ORDERED,
            Scalar::Boolean => FilterOperator::BOOLEAN,
            Scalar::Decimal | Scalar::Json | Scalar::Custom(_) => return None,
        };
        Some(Self {
            name: format!("{}Filter", scalar.name()),
            description: Some(format!("Filter for {} fields", scalar.name())),
            kind: FilterKind::Field {
                value: GqlType::scalar(scalar.clone()),
                operators: operators.to_vec(),
                origin: FilterOrigin::Scalar,
            },
        })
    }

    /// A filter over the values of a generated enum, in the namespace of its origin.
    pub fn enumeration(def: &EnumDef) -> Self {
        let origin = match def.origin {
            EnumOrigin::Sql => FilterOrigin::SqlEnum,
            EnumOrigin::Typed => FilterOrigin::TypedEnum,
        };
        Self::enumeration_with_origin(def, origin)
    }

    pub(crate) fn enumeration_with_origin(def: &EnumDef, origin: FilterOrigin) -> Self {
        Self {
            name: format!("{}Filter", def.name),
            description: Some(format!("Filter for {} fields", def.name)),
            kind: FilterKind::Field {
                value: GqlType::enumeration(def.name.clone()),
                operators: FilterOperator::EQUALITY.to_vec(),
                origin,
            },
        }
    }

    /// An application-defined field filter.
    pub fn custom(name: impl Into<String>, value: GqlType, operators: &[FilterOperator]) -> Self {
        Self {
            name: name.into(),
            description: None,
            kind: FilterKind::Field {
                value,
                operators: operators.to_vec(),
                origin: FilterOrigin::Custom,
            },
        }
    }

    /// The filter of a reflected type, named `{TypeName}Filter`.
    pub fn base(
        type_name: &str,
        model: &str,
        fields: IndexMap<String, FilterInputField>,
    ) -> Self {
        Self {
            name: format!("{}Filter", type_name),
            description: Some(format!("Filter for {} objects", type_name)),
            kind: FilterKind::BaseType {
                type_name: type_name.to_string(),
                model: model.to_string(),
                fields,
            },
        }
    }

    /// The relationship filter over a reflected type, named `{TypeName}RelationshipFilter`.
    pub fn relationship(type_name: &str, model: &str, base: Arc<FilterType>) -> Self {
        Self {
            name: format!("{}RelationshipFilter", type_name),
            description: Some(format!("Filter for relationships to {} objects", type_name)),
            kind: FilterKind::Relationship {
                type_name: type_name.to_string(),
                model: model.to_string(),
                base,
            },
        }
    }

    /// Filter entries of a base type filter, empty for other kinds.
    pub fn fields(&self) -> Option<&IndexMap<String, FilterInputField>> {
        match &self.kind {
            FilterKind::BaseType { fields, .. } => Some(fields),
            _ => None,
        }
    }

    /// Operators of a field filter.
    pub fn operators(&self) -> &[FilterOperator] {
        match &self.kind {
            FilterKind::Field { operators, .. } => operators,
            _ => &[],
        }
    }

    /// Emit as a dynamic input object.
    ///
    /// Deferred entries that did not resolve are left out.
    pub fn to_input_object(&self) -> InputObject {
        let mut object = InputObject::new(&self.name);
        if let Some(description) = &self.description {
            object = object.description(description);
        }

        match &self.kind {
            FilterKind::Field {
                value, operators, ..
            } => {
                for operator in operators {
                    object = object.field(
                        InputValue::new(operator.name(), operator.input_type(value).to_type_ref())
                            .description(operator.description()),
                    );
                }
            }
            FilterKind::BaseType { fields, .. } => {
                object = object
                    .field(InputValue::new("and", TypeRef::named_nn_list(&self.name)))
                    .field(InputValue::new("or", TypeRef::named_nn_list(&self.name)));
                for (name, field) in fields {
                    if let Some(filter) = field.filter() {
                        object = object.field(InputValue::new(name, TypeRef::named(&filter.name)));
                    }
                }
            }
            FilterKind::Relationship { base, .. } => {
                object = object
                    .field(
                        InputValue::new("contains", TypeRef::named_nn_list(&base.name))
                            .description("At least one related object matches each filter"),
                    )
                    .field(
                        InputValue::new("containsExactly", TypeRef::named_nn_list(&base.name))
                            .description("The related objects match the filters exactly"),
                    );
            }
        }

        object
    }

    /// Named types referenced by this filter's value inputs.
    pub(crate) fn value_type(&self) -> Option<&NamedType> {
        match &self.kind {
            FilterKind::Field { value, .. } => Some(value.named()),
            _ => None,
        }
    }
}

/// One entry of a base type filter, bound to the model attribute it filters.
#[derive(Debug, Clone)]
pub struct FilterInputField {
    pub model_attr: String,
    pub slot: FilterSlot,
}

impl FilterInputField {
    pub fn ready(filter: Arc<FilterType>, model_attr: impl Into<String>) -> Self {
        Self {
            model_attr: model_attr.into(),
            slot: FilterSlot::Ready(filter),
        }
    }

    pub fn deferred(deferred: Arc<DeferredFilter>) -> Self {
        Self {
            model_attr: deferred.model_attr.clone(),
            slot: FilterSlot::Deferred(deferred),
        }
    }

    /// The filter type, once known.
    pub fn filter(&self) -> Option<Arc<FilterType>> {
        match &self.slot {
            FilterSlot::Ready(filter) => Some(filter.clone()),
            FilterSlot::Deferred(deferred) => deferred.resolved(),
        }
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self.slot, FilterSlot::Deferred(_))
    }
}

#[derive(Debug, Clone)]
pub enum FilterSlot {
    Ready(Arc<FilterType>),
    Deferred(Arc<DeferredFilter>),
}

/// What a deferred filter waits on.
#[derive(Debug, Clone)]
pub enum DeferredSource {
    /// A relationship field, resolved once its target type is built
    Relationship(Arc<DynamicField>),
    /// A forward reference to another type
    Lazy { lazy: LazyType, attribute: Attribute },
}

/// A filter entry whose type is only known after every type is built.
///
/// The resolved filter is held weakly; the registry owns it.
pub struct DeferredFilter {
    pub owner: String,
    pub field: String,
    pub model_attr: String,
    pub source: DeferredSource,
    resolved: OnceCell<Weak<FilterType>>,
}

impl DeferredFilter {
    pub fn new(
        owner: impl Into<String>,
        field: impl Into<String>,
        model_attr: impl Into<String>,
        source: DeferredSource,
    ) -> Self {
        Self {
            owner: owner.into(),
            field: field.into(),
            model_attr: model_attr.into(),
            source,
            resolved: OnceCell::new(),
        }
    }

    pub fn resolved(&self) -> Option<Arc<FilterType>> {
        self.resolved.get().and_then(Weak::upgrade)
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved.get().is_some()
    }

    pub(crate) fn settle(&self, filter: &Arc<FilterType>) {
        let _ = self.resolved.set(Arc::downgrade(filter));
    }
}

impl fmt::Debug for DeferredFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeferredFilter")
            .field("owner", &self.owner)
            .field("field", &self.field)
            .field("model_attr", &self.model_attr)
            .field("resolved", &self.resolved().map(|r| r.name.clone()))
            .finish()
    }
}
