//! Relational entity metadata.
//!
//! An [`Entity`] is the introspection surface the schema builder consumes:
//! ordered columns, composites, ORM descriptors and relationships, plus the
//! polymorphic inheritance markers of the mapped class.

use indexmap::IndexMap;

use super::types::SqlType;
use super::TypeHint;

/// A mapped table column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Attribute name on the entity
    pub name: String,
    /// Storage type
    pub sql_type: SqlType,
    /// Whether the column can be NULL
    pub nullable: bool,
    /// Whether this column is part of the primary key
    pub primary_key: bool,
    /// Documentation, used as the default field description
    pub doc: Option<String>,
}

impl Column {
    /// A nullable, non-key column.
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
            nullable: true,
            primary_key: false,
            doc: None,
        }
    }

    /// Mark as primary key. Primary keys are never nullable.
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable && !self.primary_key;
        self
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }
}

/// A composite attribute grouping several columns into one value class.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeProperty {
    pub name: String,
    /// Name of the value class the columns compose into
    pub composite_class: String,
    pub columns: Vec<Column>,
    pub doc: Option<String>,
}

impl CompositeProperty {
    pub fn new(name: impl Into<String>, composite_class: impl Into<String>, columns: Vec<Column>) -> Self {
        Self {
            name: name.into(),
            composite_class: composite_class.into(),
            columns,
            doc: None,
        }
    }
}

/// A computed property evaluated on instances.
#[derive(Debug, Clone, PartialEq)]
pub struct HybridProperty {
    pub name: String,
    /// Return annotation; unannotated hybrids convert to `String`
    pub returns: Option<TypeHint>,
    pub doc: Option<String>,
}

impl HybridProperty {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            returns: None,
            doc: None,
        }
    }

    pub fn returns(mut self, hint: TypeHint) -> Self {
        self.returns = Some(hint);
        self
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }
}

/// A proxy exposing an attribute of the entities behind a relationship.
#[derive(Debug, Clone, PartialEq)]
pub struct AssociationProxy {
    pub name: String,
    /// Relationship on this entity the proxy goes through
    pub target_collection: String,
    /// Attribute read on the related entity
    pub value_attr: String,
}

impl AssociationProxy {
    pub fn new(
        name: impl Into<String>,
        target_collection: impl Into<String>,
        value_attr: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            target_collection: target_collection.into(),
            value_attr: value_attr.into(),
        }
    }
}

/// Cardinality of a relationship, seen from the owning entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    OneToMany,
    ManyToOne,
    ManyToMany,
}

/// A relationship to another mapped entity.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipProperty {
    pub name: String,
    /// Name of the related entity
    pub target: String,
    pub direction: Direction,
    /// Whether the relationship loads a collection
    pub uselist: bool,
    pub doc: Option<String>,
}

impl RelationshipProperty {
    /// A scalar (many-to-one) relationship.
    pub fn many_to_one(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            direction: Direction::ManyToOne,
            uselist: false,
            doc: None,
        }
    }

    /// A collection (one-to-many) relationship.
    pub fn one_to_many(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            direction: Direction::OneToMany,
            uselist: true,
            doc: None,
        }
    }

    /// A collection relationship through an association table.
    pub fn many_to_many(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            direction: Direction::ManyToMany,
            uselist: true,
            doc: None,
        }
    }

    /// A one-to-many relationship loading a single object.
    pub fn one_to_one(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            uselist: false,
            ..Self::one_to_many(name, target)
        }
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }
}

/// Descriptors declared on the mapped class besides columns and relationships.
#[derive(Debug, Clone, PartialEq)]
pub enum Descriptor {
    Hybrid(HybridProperty),
    AssociationProxy(AssociationProxy),
    /// Alias of another attribute; not reflected
    Synonym { name: String, target: String },
    /// Plain instrumented property of the class; not reflected
    Plain { name: String },
}

impl Descriptor {
    pub fn name(&self) -> &str {
        match self {
            Descriptor::Hybrid(h) => &h.name,
            Descriptor::AssociationProxy(p) => &p.name,
            Descriptor::Synonym { name, .. } | Descriptor::Plain { name } => name,
        }
    }
}

/// A reflected attribute, tagged by descriptor kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    Column(Column),
    Composite(CompositeProperty),
    Hybrid(HybridProperty),
    AssociationProxy(AssociationProxy),
    Relationship(RelationshipProperty),
}

impl Attribute {
    pub fn name(&self) -> &str {
        match self {
            Attribute::Column(c) => &c.name,
            Attribute::Composite(c) => &c.name,
            Attribute::Hybrid(h) => &h.name,
            Attribute::AssociationProxy(p) => &p.name,
            Attribute::Relationship(r) => &r.name,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Attribute::Column(_) => "column",
            Attribute::Composite(_) => "composite",
            Attribute::Hybrid(_) => "hybrid property",
            Attribute::AssociationProxy(_) => "association proxy",
            Attribute::Relationship(_) => "relationship",
        }
    }
}

/// How a polymorphic hierarchy discriminates its rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discriminator {
    /// A mapped column holding the polymorphic identity
    Column(String),
    /// A SQL expression; nothing to exclude from reflection
    Expression(String),
}

/// A mapped relational entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub name: String,
    pub table: String,
    pub columns: Vec<Column>,
    pub composites: Vec<CompositeProperty>,
    pub descriptors: Vec<Descriptor>,
    pub relationships: Vec<RelationshipProperty>,
    pub polymorphic_on: Option<Discriminator>,
    pub polymorphic_identity: Option<String>,
    /// Parent entity in a joined-table inheritance hierarchy
    pub inherits: Option<String>,
    pub doc: Option<String>,
}

impl Entity {
    /// An entity with no attributes, stored in a table named after it.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            table: name.to_lowercase(),
            name,
            columns: Vec::new(),
            composites: Vec::new(),
            descriptors: Vec::new(),
            relationships: Vec::new(),
            polymorphic_on: None,
            polymorphic_identity: None,
            inherits: None,
            doc: None,
        }
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    pub fn composite(mut self, composite: CompositeProperty) -> Self {
        self.composites.push(composite);
        self
    }

    pub fn hybrid(mut self, hybrid: HybridProperty) -> Self {
        self.descriptors.push(Descriptor::Hybrid(hybrid));
        self
    }

    pub fn association_proxy(mut self, proxy: AssociationProxy) -> Self {
        self.descriptors.push(Descriptor::AssociationProxy(proxy));
        self
    }

    pub fn descriptor(mut self, descriptor: Descriptor) -> Self {
        self.descriptors.push(descriptor);
        self
    }

    pub fn relationship(mut self, relationship: RelationshipProperty) -> Self {
        self.relationships.push(relationship);
        self
    }

    /// Discriminate the hierarchy on one of this entity's columns.
    pub fn polymorphic_on(mut self, column: impl Into<String>) -> Self {
        self.polymorphic_on = Some(Discriminator::Column(column.into()));
        self
    }

    pub fn polymorphic_on_expression(mut self, sql: impl Into<String>) -> Self {
        self.polymorphic_on = Some(Discriminator::Expression(sql.into()));
        self
    }

    pub fn polymorphic_identity(mut self, identity: impl Into<String>) -> Self {
        self.polymorphic_identity = Some(identity.into());
        self
    }

    pub fn inherits(mut self, parent: impl Into<String>) -> Self {
        self.inherits = Some(parent.into());
        self
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// All reflectable attributes in entity attribute order: columns, then
    /// composites, then hybrid and association-proxy descriptors, then
    /// relationships. Other descriptor kinds are skipped.
    pub fn attributes(&self) -> IndexMap<String, Attribute> {
        let mut attrs = IndexMap::new();
        for column in &self.columns {
            attrs.insert(column.name.clone(), Attribute::Column(column.clone()));
        }
        for composite in &self.composites {
            attrs.insert(composite.name.clone(), Attribute::Composite(composite.clone()));
        }
        for descriptor in &self.descriptors {
            match descriptor {
                Descriptor::Hybrid(h) => {
                    attrs.insert(h.name.clone(), Attribute::Hybrid(h.clone()));
                }
                Descriptor::AssociationProxy(p) => {
                    attrs.insert(p.name.clone(), Attribute::AssociationProxy(p.clone()));
                }
                Descriptor::Synonym { .. } | Descriptor::Plain { .. } => {}
            }
        }
        for relationship in &self.relationships {
            attrs.insert(
                relationship.name.clone(),
                Attribute::Relationship(relationship.clone()),
            );
        }
        attrs
    }

    /// Name of the discriminator column, if the hierarchy discriminates on one.
    pub fn polymorphic_on_column(&self) -> Option<&str> {
        match &self.polymorphic_on {
            Some(Discriminator::Column(name)) => Some(name),
            _ => None,
        }
    }

    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn get_relationship(&self, name: &str) -> Option<&RelationshipProperty> {
        self.relationships.iter().find(|r| r.name == name)
    }

    pub fn primary_key(&self) -> Vec<&Column> {
        self.columns.iter().filter(|c| c.primary_key).collect()
    }
}
