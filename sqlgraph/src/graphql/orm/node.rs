//! Instance-level operations of reflected types: type membership, identifiers
//! and node lookup.

use async_graphql::Value;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use futures::future::BoxFuture;

use super::base::SchemaType;
use crate::error::ResolveError;
use crate::mapping::{Catalog, Instance, SessionHandle};

/// The identifier of a row: the key value itself for single-column keys,
/// a stable text encoding of the ordered key tuple otherwise.
///
/// Tuple components are written as GraphQL literals, so string parts are quoted
/// and escaped and distinct keys never share an encoding.
pub fn identifier(primary_key: &[Value]) -> Value {
    match primary_key {
        [single] => single.clone(),
        keys => Value::String(format!(
            "({})",
            keys.iter().map(Value::to_string).collect::<Vec<_>>().join(", ")
        )),
    }
}

/// Text form of a key value, as embedded in global ids.
pub fn key_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Enum(name) => name.to_string(),
        other => other.to_string(),
    }
}

/// Relay global id: base64 of `"{TypeName}:{id}"`.
pub fn to_global_id(type_name: &str, id: &str) -> String {
    STANDARD.encode(format!("{}:{}", type_name, id))
}

/// Split a relay global id into type name and id.
pub fn from_global_id(global_id: &str) -> Option<(String, String)> {
    let decoded = STANDARD.decode(global_id).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (type_name, id) = decoded.split_once(':')?;
    Some((type_name.to_string(), id.to_string()))
}

/// A value offered to [`SchemaType::is_type_of`].
#[derive(Debug)]
pub enum Candidate<'a> {
    Instance(&'a Instance),
    /// A value still being loaded by an asynchronous session
    Pending,
    /// Anything that is not a mapped instance
    Value(&'a Value),
}

/// Result of a node lookup: immediate for synchronous sessions, a future for asynchronous ones.
pub enum NodeLookup {
    Ready(Result<Option<Instance>, ResolveError>),
    Pending(BoxFuture<'static, Result<Option<Instance>, ResolveError>>),
}

impl NodeLookup {
    pub fn is_pending(&self) -> bool {
        matches!(self, NodeLookup::Pending(_))
    }

    pub async fn resolve(self) -> Result<Option<Instance>, ResolveError> {
        match self {
            NodeLookup::Ready(result) => result,
            NodeLookup::Pending(future) => future.await,
        }
    }
}

impl SchemaType {
    /// Whether `candidate` is an instance of this type's model, or of an entity inheriting from it.
    pub fn is_type_of(
        &self,
        catalog: &Catalog,
        candidate: Candidate<'_>,
    ) -> Result<bool, ResolveError> {
        match candidate {
            Candidate::Instance(instance) => {
                Ok(catalog.is_subtype(instance.entity_name(), &self.model.name))
            }
            Candidate::Pending => Err(ResolveError::PendingValue),
            Candidate::Value(value) => Err(ResolveError::IncompatibleInstance(value.to_string())),
        }
    }

    pub fn resolve_id(&self, instance: &Instance) -> Value {
        identifier(&instance.primary_key())
    }

    /// Relay global id of `instance`.
    pub fn global_id(&self, instance: &Instance) -> String {
        to_global_id(&self.name, &key_text(&self.resolve_id(instance)))
    }

    /// Load the instance identified by `id` through `session`.
    pub fn get_node(&self, session: &SessionHandle, id: &Value) -> NodeLookup {
        match session {
            SessionHandle::Sync(session) => {
                NodeLookup::Ready(session.get(&self.model, id).map_err(ResolveError::from))
            }
            SessionHandle::Async(session) => {
                let session = session.clone();
                let model = self.model.clone();
                let id = id.clone();
                tracing::debug!(type_name = %self.name, id = %key_text(&id), "Deferring node lookup");
                NodeLookup::Pending(Box::pin(async move {
                    session.get(&model, &id).await.map_err(ResolveError::from)
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_and_composite_identifiers() {
        assert_eq!(identifier(&[Value::from(7)]), Value::from(7));
        assert_eq!(
            identifier(&[Value::from(7), Value::from("a")]),
            Value::String(r#"(7, "a")"#.to_string())
        );
    }

    #[test]
    fn test_composite_identifiers_keep_string_boundaries() {
        let split_late = identifier(&[Value::from("a, b"), Value::from("c")]);
        let split_early = identifier(&[Value::from("a"), Value::from("b, c")]);
        assert_ne!(split_late, split_early);
        assert_eq!(split_late, Value::String(r#"("a, b", "c")"#.to_string()));
    }

    #[test]
    fn test_global_id() {
        let id = to_global_id("Pet", "7");
        assert_eq!(id, "UGV0Ojc=");
        assert_eq!(
            from_global_id(&id),
            Some(("Pet".to_string(), "7".to_string()))
        );
        assert_eq!(from_global_id("not base64!"), None);
    }
}
