//! Access to mapped instances at resolution time.

use std::fmt;
use std::sync::Arc;

use async_graphql::Value;
use serde::Serialize;

/// A loaded row of a mapped entity.
///
/// Implemented by `#[derive(Mapped)]`; attribute values are exposed as
/// GraphQL values so generic attribute resolvers can read them.
pub trait MappedInstance: Send + Sync + 'static {
    /// Name of the entity this instance belongs to
    fn entity_name(&self) -> &str;

    /// Primary-key values, in key column order
    fn primary_key(&self) -> Vec<Value>;

    /// Value of a column or computed attribute
    fn attribute(&self, name: &str) -> Option<Value>;

    /// Loaded related instances behind a relationship
    fn related(&self, name: &str) -> Related {
        let _ = name;
        Related::Missing
    }
}

/// Shared handle to a mapped instance.
#[derive(Clone)]
pub struct Instance(Arc<dyn MappedInstance>);

impl Instance {
    pub fn new<T: MappedInstance>(instance: T) -> Self {
        Self(Arc::new(instance))
    }

    pub fn entity_name(&self) -> &str {
        self.0.entity_name()
    }

    pub fn primary_key(&self) -> Vec<Value> {
        self.0.primary_key()
    }

    pub fn attribute(&self, name: &str) -> Option<Value> {
        self.0.attribute(name)
    }

    pub fn related(&self, name: &str) -> Related {
        self.0.related(name)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("entity", &self.entity_name())
            .field("primary_key", &self.primary_key())
            .finish()
    }
}

/// Related instances loaded through a relationship.
#[derive(Debug, Clone)]
pub enum Related {
    /// The instance has no such relationship
    Missing,
    One(Option<Instance>),
    Many(Vec<Instance>),
}

/// Conversion of relationship-holding struct fields into [`Related`].
pub trait ToRelated {
    fn to_related(&self) -> Related;
}

impl<T: MappedInstance + Clone> ToRelated for Vec<T> {
    fn to_related(&self) -> Related {
        Related::Many(self.iter().cloned().map(Instance::new).collect())
    }
}

impl<T: MappedInstance + Clone> ToRelated for Option<T> {
    fn to_related(&self) -> Related {
        Related::One(self.clone().map(Instance::new))
    }
}

impl<T: MappedInstance + ?Sized> MappedInstance for Box<T> {
    fn entity_name(&self) -> &str {
        (**self).entity_name()
    }

    fn primary_key(&self) -> Vec<Value> {
        (**self).primary_key()
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        (**self).attribute(name)
    }

    fn related(&self, name: &str) -> Related {
        (**self).related(name)
    }
}

/// Convert any serializable attribute into a GraphQL value; unserializable values become null.
pub fn attribute_value<T: Serialize + ?Sized>(value: &T) -> Value {
    async_graphql::to_value(value).unwrap_or(Value::Null)
}
