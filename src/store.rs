//! Storage collaborator interface and an in-memory implementation.
//!
//! The dispatcher only ever talks to `dyn Storage`; real backends live outside this crate.

use crate::error::StorageError;
use crate::model::{Entity, FieldMap, ModelType};
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

pub trait Storage: Send + Sync {
    fn get(&self, model: &ModelType, id: i64) -> Result<Option<Entity>, StorageError>;

    /// Persist a new entity built from `fields`, assigning its id.
    fn create(&self, model: &ModelType, fields: FieldMap) -> Result<Entity, StorageError>;

    fn save(&self, entity: &Entity) -> Result<(), StorageError>;

    /// Remove the entity. Removing something already gone is not an error.
    fn delete(&self, entity: &Entity) -> Result<(), StorageError>;

    /// Every entity of the model, in a backend-defined order.
    fn query_all(&self, model: &ModelType) -> Result<Vec<Entity>, StorageError>;
}

#[derive(Default)]
struct Table {
    last_id: i64,
    rows: BTreeMap<i64, Entity>,
}

/// Process-local store. Ids are per model, sequential from 1 and never reused.
#[derive(Default)]
pub struct InMemoryStore {
    tables: RwLock<HashMap<String, Table>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for InMemoryStore {
    fn get(&self, model: &ModelType, id: i64) -> Result<Option<Entity>, StorageError> {
        let tables = self.tables.read().map_err(|_| StorageError::Poisoned)?;
        Ok(tables.get(&model.name).and_then(|t| t.rows.get(&id)).cloned())
    }

    fn create(&self, model: &ModelType, fields: FieldMap) -> Result<Entity, StorageError> {
        let mut tables = self.tables.write().map_err(|_| StorageError::Poisoned)?;
        let table = tables.entry(model.name.clone()).or_default();
        table.last_id += 1;
        let entity = Entity {
            model: model.name.clone(),
            id: Some(table.last_id),
            fields,
        };
        table.rows.insert(table.last_id, entity.clone());
        Ok(entity)
    }

    fn save(&self, entity: &Entity) -> Result<(), StorageError> {
        let id = entity.id.ok_or_else(|| StorageError::Unsaved(entity.model.clone()))?;
        let mut tables = self.tables.write().map_err(|_| StorageError::Poisoned)?;
        let table = tables.entry(entity.model.clone()).or_default();
        table.last_id = table.last_id.max(id);
        table.rows.insert(id, entity.clone());
        Ok(())
    }

    fn delete(&self, entity: &Entity) -> Result<(), StorageError> {
        let Some(id) = entity.id else {
            return Ok(());
        };
        let mut tables = self.tables.write().map_err(|_| StorageError::Poisoned)?;
        if let Some(table) = tables.get_mut(&entity.model) {
            table.rows.remove(&id);
        }
        Ok(())
    }

    fn query_all(&self, model: &ModelType) -> Result<Vec<Entity>, StorageError> {
        let tables = self.tables.read().map_err(|_| StorageError::Poisoned)?;
        Ok(tables
            .get(&model.name)
            .map(|t| t.rows.values().cloned().collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FieldValue;

    fn doctor() -> ModelType {
        ModelType::new("Doctor")
    }

    fn named(name: &str) -> FieldMap {
        let mut f = FieldMap::new();
        f.insert("name".into(), FieldValue::Str(name.into()));
        f
    }

    #[test]
    fn ids_are_sequential_per_model() {
        let store = InMemoryStore::new();
        let a = store.create(&doctor(), named("a")).unwrap();
        let b = store.create(&doctor(), named("b")).unwrap();
        let p = store.create(&ModelType::new("Pager"), FieldMap::new()).unwrap();
        assert_eq!((a.id, b.id, p.id), (Some(1), Some(2), Some(1)));
    }

    #[test]
    fn deleted_ids_are_not_reused() {
        let store = InMemoryStore::new();
        let a = store.create(&doctor(), named("a")).unwrap();
        store.delete(&a).unwrap();
        store.delete(&a).unwrap();
        let b = store.create(&doctor(), named("b")).unwrap();
        assert_eq!(b.id, Some(2));
        assert!(store.get(&doctor(), 1).unwrap().is_none());
        assert_eq!(store.query_all(&doctor()).unwrap().len(), 1);
    }

    #[test]
    fn save_overwrites_fields() {
        let store = InMemoryStore::new();
        let mut a = store.create(&doctor(), named("a")).unwrap();
        a.set("name", Some(FieldValue::Str("changed".into())));
        store.save(&a).unwrap();
        let got = store.get(&doctor(), 1).unwrap().unwrap();
        assert_eq!(got.get("name"), Some(&FieldValue::Str("changed".into())));
    }

    #[test]
    fn save_requires_id() {
        let store = InMemoryStore::new();
        let e = Entity::new("Doctor", named("a"));
        assert!(matches!(store.save(&e), Err(StorageError::Unsaved(_))));
    }
}
