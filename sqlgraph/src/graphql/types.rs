//! Schema field shapes produced by reflection.
//!
//! Fields are described independently of any GraphQL server library until
//! [`render`](super::render) turns them into `async_graphql::dynamic` types.

use std::fmt;
use std::sync::Arc;

use async_graphql::Value;
use async_graphql::dynamic::{FieldFuture, ResolverContext, TypeRef};
use indexmap::IndexMap;

use super::Registry;
use super::orm::dynamic::{DynamicField, resolve_lazy};

/// Scalar types a reflected field can carry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scalar {
    Id,
    String,
    Int,
    BigInt,
    Float,
    Boolean,
    Date,
    DateTime,
    Time,
    Decimal,
    Uuid,
    Json,
    Custom(String),
}

impl Scalar {
    /// GraphQL name of the scalar
    pub fn name(&self) -> &str {
        match self {
            Scalar::Id => "ID",
            Scalar::String => "String",
            Scalar::Int => "Int",
            Scalar::BigInt => "BigInt",
            Scalar::Float => "Float",
            Scalar::Boolean => "Boolean",
            Scalar::Date => "Date",
            Scalar::DateTime => "DateTime",
            Scalar::Time => "Time",
            Scalar::Decimal => "Decimal",
            Scalar::Uuid => "UUID",
            Scalar::Json => "JSONString",
            Scalar::Custom(name) => name,
        }
    }

    /// Whether the scalar is part of every GraphQL schema.
    pub fn is_builtin(&self) -> bool {
        matches!(
            self,
            Scalar::Id | Scalar::String | Scalar::Int | Scalar::Float | Scalar::Boolean
        )
    }
}

/// The innermost named type of a field.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum NamedType {
    Scalar(Scalar),
    Enum(String),
    Object(String),
}

impl NamedType {
    pub fn name(&self) -> &str {
        match self {
            NamedType::Scalar(s) => s.name(),
            NamedType::Enum(name) | NamedType::Object(name) => name,
        }
    }
}

/// A fully known GraphQL type reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum GqlType {
    Named(NamedType),
    List(Box<GqlType>),
    NonNull(Box<GqlType>),
}

impl GqlType {
    pub fn scalar(scalar: Scalar) -> Self {
        GqlType::Named(NamedType::Scalar(scalar))
    }

    pub fn object(name: impl Into<String>) -> Self {
        GqlType::Named(NamedType::Object(name.into()))
    }

    pub fn enumeration(name: impl Into<String>) -> Self {
        GqlType::Named(NamedType::Enum(name.into()))
    }

    pub fn list(inner: GqlType) -> Self {
        GqlType::List(Box::new(inner))
    }

    /// Wrap as non-null; already non-null types are returned unchanged.
    pub fn non_null(self) -> Self {
        match self {
            GqlType::NonNull(_) => self,
            other => GqlType::NonNull(Box::new(other)),
        }
    }

    /// The type with one non-null wrapper removed.
    pub fn nullable(&self) -> &GqlType {
        match self {
            GqlType::NonNull(inner) => inner,
            other => other,
        }
    }

    pub fn into_nullable(self) -> GqlType {
        match self {
            GqlType::NonNull(inner) => *inner,
            other => other,
        }
    }

    pub fn is_non_null(&self) -> bool {
        matches!(self, GqlType::NonNull(_))
    }

    pub fn is_list(&self) -> bool {
        matches!(self.nullable(), GqlType::List(_))
    }

    /// The innermost named type.
    pub fn named(&self) -> &NamedType {
        match self {
            GqlType::Named(named) => named,
            GqlType::List(inner) | GqlType::NonNull(inner) => inner.named(),
        }
    }

    /// Apply a `required` override: `Some(true)` forces non-null, `Some(false)` nullable.
    pub fn with_required(self, required: Option<bool>) -> Self {
        match required {
            Some(true) => self.non_null(),
            Some(false) => self.into_nullable(),
            None => self,
        }
    }

    pub fn to_type_ref(&self) -> TypeRef {
        match self {
            GqlType::Named(named) => TypeRef::Named(named.name().to_string().into()),
            GqlType::List(inner) => TypeRef::List(Box::new(inner.to_type_ref())),
            GqlType::NonNull(inner) => TypeRef::NonNull(Box::new(inner.to_type_ref())),
        }
    }
}

impl fmt::Display for GqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GqlType::Named(named) => write!(f, "{}", named.name()),
            GqlType::List(inner) => write!(f, "[{}]", inner),
            GqlType::NonNull(inner) => write!(f, "{}!", inner),
        }
    }
}

/// What a lazily-typed field points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LazyTarget {
    /// The schema type registered for a mapped entity
    Entity(String),
    /// A schema type by name
    TypeName(String),
}

/// A field type only known once the referenced type has been built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LazyType {
    pub target: LazyTarget,
    /// A list of the referenced type
    pub list: bool,
    pub required: bool,
}

impl LazyType {
    pub fn entity(name: impl Into<String>) -> Self {
        Self {
            target: LazyTarget::Entity(name.into()),
            list: false,
            required: false,
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            target: LazyTarget::TypeName(name.into()),
            list: false,
            required: false,
        }
    }

    pub fn list(mut self) -> Self {
        self.list = true;
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }
}

/// Type of a mounted field.
#[derive(Debug, Clone)]
pub enum FieldType {
    Concrete(GqlType),
    Lazy(LazyType),
    Dynamic(Arc<DynamicField>),
}

/// The shape of a reflected field, as produced by conversion.
#[derive(Debug, Clone)]
pub enum FieldShape {
    /// An unmounted scalar
    Scalar(Scalar),
    /// An unmounted list
    List(GqlType),
    /// A mounted field
    Field(FieldType),
    /// A relationship whose shape is resolved once every type is built
    Dynamic(Arc<DynamicField>),
}

impl FieldShape {
    pub fn concrete(ty: GqlType) -> Self {
        FieldShape::Field(FieldType::Concrete(ty))
    }

    /// Mount unmounted shapes as fields.
    pub fn mount(self) -> Self {
        match self {
            FieldShape::Scalar(scalar) => FieldShape::concrete(GqlType::scalar(scalar)),
            FieldShape::List(inner) => FieldShape::concrete(GqlType::list(inner)),
            other => other,
        }
    }
}

/// Resolver function attached to a rendered field.
pub type ResolverFn = Arc<dyn for<'a> Fn(ResolverContext<'a>) -> FieldFuture<'a> + Send + Sync>;

/// How a field obtains its value.
#[derive(Clone)]
pub enum Resolver {
    /// A resolver declared on the type definition under the field's name
    Custom(ResolverFn),
    /// Read the named attribute of the parent instance
    Attribute(String),
    /// Relay global identifier of the parent instance
    GlobalId,
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolver::Custom(_) => f.write_str("Custom(..)"),
            Resolver::Attribute(name) => f.debug_tuple("Attribute").field(name).finish(),
            Resolver::GlobalId => f.write_str("GlobalId"),
        }
    }
}

/// A field of a generated schema type.
#[derive(Debug, Clone)]
pub struct SchemaField {
    pub name: String,
    pub shape: FieldShape,
    pub description: Option<String>,
    pub deprecation_reason: Option<String>,
    pub resolver: Resolver,
    /// Pass-through options for the schema-serving layer
    pub extra: IndexMap<String, Value>,
}

impl SchemaField {
    pub fn new(name: impl Into<String>, shape: FieldShape, resolver: Resolver) -> Self {
        Self {
            name: name.into(),
            shape,
            description: None,
            deprecation_reason: None,
            resolver,
            extra: IndexMap::new(),
        }
    }

    /// The concrete type of this field, resolving lazy and dynamic shapes.
    ///
    /// Returns `None` while (or if) the referenced type cannot be resolved.
    pub fn resolved_type(&self, registry: &Registry) -> Option<GqlType> {
        match &self.shape {
            FieldShape::Scalar(scalar) => Some(GqlType::scalar(scalar.clone())),
            FieldShape::List(inner) => Some(GqlType::list(inner.clone())),
            FieldShape::Field(FieldType::Concrete(ty)) => Some(ty.clone()),
            FieldShape::Field(FieldType::Lazy(lazy)) => resolve_lazy(lazy, registry),
            FieldShape::Field(FieldType::Dynamic(dynamic)) | FieldShape::Dynamic(dynamic) => {
                dynamic.resolve(registry).map(|r| r.gql_type())
            }
        }
    }
}

/// Whether an enum was generated from a database-native enum or a language-level one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnumOrigin {
    Sql,
    Typed,
}

/// A GraphQL enum generated from a SQL enum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumDef {
    pub name: String,
    pub values: Vec<String>,
    pub origin: EnumOrigin,
}

impl EnumDef {
    /// GraphQL item names: values upper-cased with non-alphanumerics replaced.
    pub fn item_names(&self) -> Vec<String> {
        self.values.iter().map(|v| enum_item_name(v)).collect()
    }
}

pub(crate) fn enum_item_name(value: &str) -> String {
    let mut name: String = value
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    if name.starts_with(|c: char| c.is_ascii_digit()) || name.is_empty() {
        name.insert(0, '_');
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_display() {
        let ty = GqlType::list(GqlType::object("Pet").non_null()).non_null();
        assert_eq!(ty.to_string(), "[Pet!]!");
        assert!(ty.is_list());
        assert_eq!(ty.named(), &NamedType::Object("Pet".to_string()));
    }

    #[test]
    fn test_required_override() {
        let ty = GqlType::scalar(Scalar::String);
        assert_eq!(ty.clone().with_required(Some(true)).to_string(), "String!");
        assert_eq!(
            ty.clone().non_null().with_required(Some(false)).to_string(),
            "String"
        );
        assert_eq!(ty.clone().non_null().non_null().to_string(), "String!");
        assert_eq!(ty.with_required(None).to_string(), "String");
    }

    #[test]
    fn test_mount_unmounted_shapes() {
        match FieldShape::Scalar(Scalar::Int).mount() {
            FieldShape::Field(FieldType::Concrete(ty)) => assert_eq!(ty.to_string(), "Int"),
            other => panic!("unexpected shape {:?}", other),
        }
        match FieldShape::List(GqlType::scalar(Scalar::String)).mount() {
            FieldShape::Field(FieldType::Concrete(ty)) => assert_eq!(ty.to_string(), "[String]"),
            other => panic!("unexpected shape {:?}", other),
        }
    }

    #[test]
    fn test_enum_item_names() {
        let def = EnumDef {
            name: "PetKind".to_string(),
            values: vec!["cat".to_string(), "dog-like".to_string(), "3d".to_string()],
            origin: EnumOrigin::Sql,
        };
        assert_eq!(def.item_names(), vec!["CAT", "DOG_LIKE", "_3D"]);
    }
}
