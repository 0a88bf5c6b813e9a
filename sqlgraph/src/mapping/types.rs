//! Column and annotation types exposed by the relational mapping layer.

/// Storage type of a mapped column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlType {
    SmallInteger,
    Integer,
    BigInteger,
    Float,
    Numeric,
    /// VARCHAR with an optional length
    String(Option<u32>),
    Text,
    Boolean,
    Date,
    DateTime,
    Time,
    Uuid,
    Json,
    Enum(SqlEnum),
    Array(Box<SqlType>),
    /// Any vendor-specific type, converted to a custom scalar of the same name
    Custom(String),
}

impl SqlType {
    /// Parse the short type names accepted by `#[column(sql_type = "...")]`.
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "smallint" | "small_integer" => SqlType::SmallInteger,
            "int" | "integer" => SqlType::Integer,
            "bigint" | "big_integer" => SqlType::BigInteger,
            "float" | "real" | "double" => SqlType::Float,
            "numeric" | "decimal" => SqlType::Numeric,
            "string" | "varchar" => SqlType::String(None),
            "text" => SqlType::Text,
            "bool" | "boolean" => SqlType::Boolean,
            "date" => SqlType::Date,
            "datetime" | "timestamp" => SqlType::DateTime,
            "time" => SqlType::Time,
            "uuid" => SqlType::Uuid,
            "json" | "jsonb" => SqlType::Json,
            _ => SqlType::Custom(name.to_string()),
        }
    }
}

/// An enumerated column type.
///
/// A database-native enum only knows its raw values. A language-level enum
/// additionally names the enum class wrapping those values; the two get
/// separate filter namespaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlEnum {
    pub name: Option<String>,
    pub values: Vec<String>,
    pub enum_class: Option<String>,
}

impl SqlEnum {
    /// A database-native enum.
    pub fn native(name: impl Into<String>, values: &[&str]) -> Self {
        Self {
            name: Some(name.into()),
            values: values.iter().map(|v| v.to_string()).collect(),
            enum_class: None,
        }
    }

    /// An anonymous database-native enum; its GraphQL name derives from the column.
    pub fn anonymous(values: &[&str]) -> Self {
        Self {
            name: None,
            values: values.iter().map(|v| v.to_string()).collect(),
            enum_class: None,
        }
    }

    /// A language-level enum class stored as a database enum.
    pub fn typed(enum_class: impl Into<String>, values: &[&str]) -> Self {
        let enum_class = enum_class.into();
        Self {
            name: Some(enum_class.clone()),
            values: values.iter().map(|v| v.to_string()).collect(),
            enum_class: Some(enum_class),
        }
    }

    pub fn is_typed(&self) -> bool {
        self.enum_class.is_some()
    }
}

/// Return annotation of a computed ("hybrid") property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeHint {
    Int,
    Float,
    String,
    Boolean,
    Id,
    Date,
    DateTime,
    Time,
    Decimal,
    Uuid,
    Json,
    /// A GraphQL enum registered under this name
    Enum(String),
    /// Another mapped entity, resolved to its registered schema type
    Entity(String),
    /// Forward reference to a schema type by name
    TypeName(String),
    List(Box<TypeHint>),
    Optional(Box<TypeHint>),
}

impl TypeHint {
    pub fn list_of(inner: TypeHint) -> Self {
        TypeHint::List(Box::new(inner))
    }

    pub fn optional(inner: TypeHint) -> Self {
        TypeHint::Optional(Box::new(inner))
    }
}
