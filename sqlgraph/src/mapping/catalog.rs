//! The set of mapped entities known to a schema build.

use std::sync::Arc;

use indexmap::IndexMap;

use super::{Entity, Mapped, MappingError};

/// Mapped entities by name.
///
/// Entities are added parents-first; an entity that inherits from a parent
/// receives the parent's attributes ahead of its own, the way joined-table
/// inheritance exposes them.
#[derive(Debug, Default, Clone)]
pub struct Catalog {
    entities: IndexMap<String, Arc<Entity>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity, resolving its inheritance against entities already present.
    pub fn add(&mut self, entity: Entity) -> Result<Arc<Entity>, MappingError> {
        if self.entities.contains_key(&entity.name) {
            return Err(MappingError::DuplicateEntity(entity.name));
        }

        let entity = match entity.inherits.clone() {
            Some(parent_name) => {
                let parent = self.entities.get(&parent_name).ok_or_else(|| {
                    MappingError::UnknownParent {
                        entity: entity.name.clone(),
                        parent: parent_name.clone(),
                    }
                })?;
                merge_inherited(parent, entity)
            }
            None => entity,
        };

        tracing::debug!(entity = %entity.name, table = %entity.table, "Mapped entity added");
        let entity = Arc::new(entity);
        self.entities.insert(entity.name.clone(), entity.clone());
        Ok(entity)
    }

    /// Add an entity described by a `#[derive(Mapped)]` type.
    pub fn add_mapped<T: Mapped>(&mut self) -> Result<Arc<Entity>, MappingError> {
        self.add(T::entity())
    }

    pub fn get(&self, name: &str) -> Option<Arc<Entity>> {
        self.entities.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entities.contains_key(name)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Arc<Entity>> {
        self.entities.values()
    }

    /// Whether `entity` is `ancestor` or inherits from it.
    pub fn is_subtype(&self, entity: &str, ancestor: &str) -> bool {
        let mut current = Some(entity.to_string());
        while let Some(name) = current {
            if name == ancestor {
                return true;
            }
            current = self.entities.get(&name).and_then(|e| e.inherits.clone());
        }
        false
    }

    /// Check that every relationship points at a mapped entity.
    pub fn validate(&self) -> Result<(), MappingError> {
        for entity in self.entities.values() {
            for relationship in &entity.relationships {
                if !self.entities.contains_key(&relationship.target) {
                    return Err(MappingError::UnknownTarget {
                        entity: entity.name.clone(),
                        relationship: relationship.name.clone(),
                        target: relationship.target.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

fn merge_inherited(parent: &Entity, child: Entity) -> Entity {
    let mut merged = Entity {
        columns: Vec::new(),
        composites: Vec::new(),
        descriptors: Vec::new(),
        relationships: Vec::new(),
        polymorphic_on: child.polymorphic_on.clone().or_else(|| parent.polymorphic_on.clone()),
        ..child.clone()
    };

    for column in &parent.columns {
        if !child.columns.iter().any(|c| c.name == column.name) {
            merged.columns.push(column.clone());
        }
    }
    merged.columns.extend(child.columns);

    for composite in &parent.composites {
        if !child.composites.iter().any(|c| c.name == composite.name) {
            merged.composites.push(composite.clone());
        }
    }
    merged.composites.extend(child.composites);

    for descriptor in &parent.descriptors {
        if !child.descriptors.iter().any(|d| d.name() == descriptor.name()) {
            merged.descriptors.push(descriptor.clone());
        }
    }
    merged.descriptors.extend(child.descriptors);

    for relationship in &parent.relationships {
        if !child.relationships.iter().any(|r| r.name == relationship.name) {
            merged.relationships.push(relationship.clone());
        }
    }
    merged.relationships.extend(child.relationships);

    merged
}
