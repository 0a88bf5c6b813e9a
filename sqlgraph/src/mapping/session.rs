//! Data-access providers used for node lookup.

use std::collections::HashMap;
use std::sync::Arc;

use async_graphql::Value;
use async_trait::async_trait;
use parking_lot::RwLock;

use super::{Entity, Instance};
use crate::graphql::orm::node::{identifier, key_text};

/// A synchronous data-access session.
pub trait Session: Send + Sync {
    /// Load one instance of `entity` by identifier; `Ok(None)` when no row matches.
    fn get(&self, entity: &Entity, id: &Value) -> anyhow::Result<Option<Instance>>;
}

/// An asynchronous data-access session.
#[async_trait]
pub trait AsyncSession: Send + Sync {
    async fn get(&self, entity: &Entity, id: &Value) -> anyhow::Result<Option<Instance>>;
}

/// The session a request resolves against.
#[derive(Clone)]
pub enum SessionHandle {
    Sync(Arc<dyn Session>),
    Async(Arc<dyn AsyncSession>),
}

/// In-memory rows keyed by entity, usable as either kind of session.
#[derive(Default)]
pub struct MemorySession {
    rows: RwLock<HashMap<String, Vec<Instance>>>,
}

impl MemorySession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, instance: Instance) {
        self.rows
            .write()
            .entry(instance.entity_name().to_string())
            .or_default()
            .push(instance);
    }

    /// All rows stored for an entity, in insertion order.
    pub fn all(&self, entity: &str) -> Vec<Instance> {
        self.rows.read().get(entity).cloned().unwrap_or_default()
    }

    fn find(&self, entity: &Entity, id: &Value) -> Option<Instance> {
        let wanted = key_text(id);
        let rows = self.rows.read();
        rows.get(&entity.name)?
            .iter()
            .find(|row| key_text(&identifier(&row.primary_key())) == wanted)
            .cloned()
    }
}

impl Session for MemorySession {
    fn get(&self, entity: &Entity, id: &Value) -> anyhow::Result<Option<Instance>> {
        Ok(self.find(entity, id))
    }
}

#[async_trait]
impl AsyncSession for MemorySession {
    async fn get(&self, entity: &Entity, id: &Value) -> anyhow::Result<Option<Instance>> {
        Ok(self.find(entity, id))
    }
}
