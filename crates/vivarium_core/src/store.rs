//! Typed, queryable per-entity storage under concurrent access.
//!
//! One table per component type, keyed by [`EntityId`]; flags mirror the same
//! contract under a separate namespace. Mutations are safe to issue from many
//! threads. Queries return point-in-time snapshots: a snapshot taken while
//! writers are active may miss or include entries written during the copy.
//! This eventual (not atomic) consistency is the chosen query strategy, not
//! an accident; snapshot cost is O(matching entities).

use crate::error::CoreError;
use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use vivarium_data::EntityId;

/// Data attachable to an entity. Blanket-implemented for any cloneable,
/// thread-safe type.
pub trait Component: Clone + Send + Sync + 'static {}
impl<T: Clone + Send + Sync + 'static> Component for T {}

trait AnyTable: Send + Sync {
    fn remove_entity(&self, id: EntityId);
    fn contains(&self, id: EntityId) -> bool;
    fn ids(&self) -> HashSet<EntityId>;
    fn as_any(&self) -> &dyn Any;
}

struct Table<T: Component> {
    rows: RwLock<HashMap<EntityId, T>>,
}

impl<T: Component> Table<T> {
    fn new() -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
        }
    }
}

impl<T: Component> AnyTable for Table<T> {
    fn remove_entity(&self, id: EntityId) {
        self.rows
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id);
    }

    fn contains(&self, id: EntityId) -> bool {
        self.rows
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(&id)
    }

    fn ids(&self) -> HashSet<EntityId> {
        self.rows
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .copied()
            .collect()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// One namespace of typed tables (components or flags).
#[derive(Default)]
struct Registry {
    tables: RwLock<HashMap<TypeId, Arc<dyn AnyTable>>>,
}

impl Registry {
    fn get(&self, type_id: TypeId) -> Option<Arc<dyn AnyTable>> {
        self.tables
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&type_id)
            .cloned()
    }

    fn get_or_insert<T: Component>(&self) -> Arc<dyn AnyTable> {
        if let Some(table) = self.get(TypeId::of::<T>()) {
            return table;
        }
        let mut tables = self.tables.write().unwrap_or_else(|e| e.into_inner());
        tables
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Arc::new(Table::<T>::new()))
            .clone()
    }

    fn all(&self) -> Vec<Arc<dyn AnyTable>> {
        self.tables
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .values()
            .cloned()
            .collect()
    }

    fn insert_row<T: Component>(&self, id: EntityId, value: T) {
        let table = self.get_or_insert::<T>();
        let Some(table) = table.as_any().downcast_ref::<Table<T>>() else {
            return;
        };
        // first writer wins; a second add of the same type is a no-op
        table
            .rows
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .entry(id)
            .or_insert(value);
    }

    fn remove_row<T: Component>(&self, id: EntityId) {
        if let Some(table) = self.get(TypeId::of::<T>()) {
            table.remove_entity(id);
        }
    }

    fn get_row<T: Component>(&self, id: EntityId) -> Option<T> {
        let table = self.get(TypeId::of::<T>())?;
        let table = table.as_any().downcast_ref::<Table<T>>()?;
        // bind before returning so the guard drops ahead of the table borrow
        let row = table
            .rows
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .cloned();
        row
    }

    fn with_row_mut<T: Component, R>(
        &self,
        id: EntityId,
        f: impl FnOnce(&mut T) -> R,
    ) -> Option<R> {
        let table = self.get(TypeId::of::<T>())?;
        let table = table.as_any().downcast_ref::<Table<T>>()?;
        let mut rows = table.rows.write().unwrap_or_else(|e| e.into_inner());
        rows.get_mut(&id).map(f)
    }

    fn snapshot<T: Component>(&self) -> HashMap<EntityId, T> {
        let Some(table) = self.get(TypeId::of::<T>()) else {
            return HashMap::new();
        };
        let Some(table) = table.as_any().downcast_ref::<Table<T>>() else {
            return HashMap::new();
        };
        let rows = table
            .rows
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        rows
    }

    fn intersection(&self, types: &[TypeId]) -> HashSet<EntityId> {
        let Some((first, rest)) = types.split_first() else {
            return HashSet::new();
        };
        let Some(table) = self.get(*first) else {
            return HashSet::new();
        };
        let mut ids = table.ids();
        for type_id in rest {
            let Some(table) = self.get(*type_id) else {
                return HashSet::new();
            };
            ids.retain(|id| table.contains(*id));
            if ids.is_empty() {
                break;
            }
        }
        ids
    }

    fn purge(&self, id: EntityId) {
        for table in self.all() {
            table.remove_entity(id);
        }
    }
}

/// Entity/component store with per-type tables and snapshot queries.
#[derive(Default)]
pub struct ComponentStore {
    next_id: AtomicU64,
    live: RwLock<HashSet<EntityId>>,
    components: Registry,
    flags: Registry,
}

impl ComponentStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a fresh entity id. Ids are never reused.
    pub fn create_entity(&self) -> EntityId {
        let id = EntityId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.live
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id);
        id
    }

    /// Whether the entity's identity record still exists.
    #[must_use]
    pub fn is_live(&self, id: EntityId) -> bool {
        self.live
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&id)
    }

    /// Number of live entities.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.live.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Attaches a component. A second add of the same type for the same
    /// entity is a silent no-op (first writer wins), as is an add for a
    /// destroyed entity.
    pub fn add_component<T: Component>(&self, id: EntityId, value: T) {
        if !self.is_live(id) {
            return;
        }
        self.components.insert_row(id, value);
    }

    pub fn remove_component<T: Component>(&self, id: EntityId) {
        self.components.remove_row::<T>(id);
    }

    /// Looks up one component by type. Missing components are a hard failure;
    /// callers must attach components before looking them up.
    pub fn get_component<T: Component>(&self, id: EntityId) -> Result<T, CoreError> {
        self.components
            .get_row::<T>(id)
            .ok_or_else(|| CoreError::ComponentMissing(id, std::any::type_name::<T>()))
    }

    /// Mutates one component in place under the table's write lock.
    pub fn with_component_mut<T: Component, R>(
        &self,
        id: EntityId,
        f: impl FnOnce(&mut T) -> R,
    ) -> Result<R, CoreError> {
        self.components
            .with_row_mut(id, f)
            .ok_or_else(|| CoreError::ComponentMissing(id, std::any::type_name::<T>()))
    }

    /// Point-in-time snapshot of every `T` keyed by owner id.
    #[must_use]
    pub fn components<T: Component>(&self) -> HashMap<EntityId, T> {
        self.components.snapshot::<T>()
    }

    /// Entities owning every listed component type (snapshot semantics).
    #[must_use]
    pub fn entities_with(&self, types: &[TypeId]) -> HashSet<EntityId> {
        self.components.intersection(types)
    }

    /// Attaches a marker flag. Same first-writer-wins contract as components.
    pub fn add_flag<F: Component + Default>(&self, id: EntityId) {
        if !self.is_live(id) {
            return;
        }
        self.flags.insert_row(id, F::default());
    }

    pub fn remove_flag<F: Component>(&self, id: EntityId) {
        self.flags.remove_row::<F>(id);
    }

    #[must_use]
    pub fn has_flag<F: Component>(&self, id: EntityId) -> bool {
        self.flags.get_row::<F>(id).is_some()
    }

    /// Looks up one flag by type; missing flags are a hard failure.
    pub fn get_flag<F: Component>(&self, id: EntityId) -> Result<F, CoreError> {
        self.flags
            .get_row::<F>(id)
            .ok_or_else(|| CoreError::FlagMissing(id, std::any::type_name::<F>()))
    }

    /// Point-in-time snapshot of entities carrying flag `F`.
    #[must_use]
    pub fn flags<F: Component>(&self) -> HashSet<EntityId> {
        self.flags.snapshot::<F>().into_keys().collect()
    }

    /// Entities carrying every listed flag type (snapshot semantics).
    #[must_use]
    pub fn entities_with_flags(&self, types: &[TypeId]) -> HashSet<EntityId> {
        self.flags.intersection(types)
    }

    /// Destroys an entity: removes it from every component and flag table
    /// and drops its identity record.
    pub fn remove_entity(&self, id: EntityId) {
        self.components.purge(id);
        self.flags.purge(id);
        self.live
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id);
    }
}
