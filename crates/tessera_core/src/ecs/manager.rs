//! # Registry Manager
//!
//! The [`Manager`] owns every entity pool, every component and every system.
//!
//! ## Design
//!
//! - Entity pools are fixed-capacity slabs looked up by name; `DEFAULT`
//!   always exists
//! - Component storage is one slab per kind, indexed densely by kind id
//! - Systems run in ascending priority order over a snapshot of the
//!   entities matching their signature
//!
//! Every failing operation is reported (a `warn` event plus the optional
//! error callback) and then returned as an [`EcsError`].

use std::any::{type_name, TypeId};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

use super::component::{Component, ComponentHandle, ComponentMeta, KindId, KindRegistry};
use super::entity::{Entity, EntityHandle, EntityId, PoolId};
use super::entity_pool::{EntityPool, ResizeError};
use super::storage::{ComponentPool, ErasedComponentPool};
use super::system::{Priority, System, SystemEditor, SystemEntry, SystemId, SystemRecord};
use crate::config::{ManagerConfig, DEFAULT_POOL_CAPACITY, DEFAULT_POOL_NAME};
use crate::error::{EcsError, EcsResult, ErrorCode, ErrorReporter};
use crate::memory::normalize_capacity;

/// The entity/component/system registry.
///
/// # Example
///
/// ```rust
/// use tessera_core::{Component, Manager};
///
/// struct Health(i32);
/// impl Component for Health {}
///
/// let mut manager = Manager::new();
/// let entity = manager.create_entity().unwrap();
/// manager.add_component(entity, Health(10)).unwrap();
///
/// assert_eq!(manager.get_component::<Health>(entity).map(|h| h.0), Some(10));
/// ```
pub struct Manager {
    config: ManagerConfig,
    /// Registered pools; `DEFAULT` first, the rest in registration order.
    pools: Vec<EntityPool>,
    next_pool_id: u32,
    next_entity_id: u64,
    /// Set once the entity id counter has wrapped.
    ids_wrapped: bool,
    kinds: KindRegistry,
    /// Component storage indexed by kind id.
    components: Vec<Option<Box<dyn ErasedComponentPool>>>,
    systems: BTreeMap<SystemId, SystemEntry>,
    systems_by_type: HashMap<TypeId, SystemId>,
    update_order: BTreeMap<Priority, SystemId>,
    next_system_id: u32,
    errors: ErrorReporter,
}

impl Manager {
    /// Creates a registry with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::build(ManagerConfig::default(), DEFAULT_POOL_CAPACITY)
    }

    /// Creates a registry from `config`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidConfig`] if the configuration does not validate.
    pub fn with_config(config: ManagerConfig) -> EcsResult<Self> {
        config.validate()?;
        let capacity = normalize_capacity(config.default_pool_capacity).ok_or_else(|| {
            EcsError::InvalidConfig(format!(
                "default_pool_capacity {} is too large",
                config.default_pool_capacity
            ))
        })?;
        Ok(Self::build(config, capacity))
    }

    fn build(config: ManagerConfig, default_capacity: usize) -> Self {
        tracing::debug!(
            default_pool_capacity = default_capacity,
            max_component_kinds = config.max_component_kinds,
            "creating registry"
        );
        Self {
            pools: vec![EntityPool::with_exact_capacity(
                PoolId::DEFAULT,
                DEFAULT_POOL_NAME,
                default_capacity,
            )],
            next_pool_id: PoolId::DEFAULT.raw() + 1,
            next_entity_id: 0,
            ids_wrapped: false,
            kinds: KindRegistry::new(config.max_component_kinds),
            components: Vec::new(),
            systems: BTreeMap::new(),
            systems_by_type: HashMap::new(),
            update_order: BTreeMap::new(),
            next_system_id: 0,
            errors: ErrorReporter::default(),
            config,
        }
    }

    /// Configuration this registry was built with.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Installs the callback receiving every reported failure.
    pub fn set_error_callback(&mut self, callback: impl FnMut(ErrorCode, &str) + 'static) {
        self.errors.set(Box::new(callback));
    }

    /// Removes the error callback. Failures are still logged and returned.
    pub fn clear_error_callback(&mut self) {
        self.errors.unset();
    }

    fn fail<T>(&mut self, error: EcsError) -> EcsResult<T> {
        Err(self.errors.report(error))
    }

    // ------------------------------------------------------------------
    // Entity pools
    // ------------------------------------------------------------------

    fn check_custom_pool_name(&mut self, name: &str) -> EcsResult<()> {
        if name.is_empty() || name == DEFAULT_POOL_NAME {
            return self.fail(EcsError::InvalidPoolName(name.to_string()));
        }
        Ok(())
    }

    fn pool_position(&mut self, name: &str) -> EcsResult<usize> {
        if name.is_empty() {
            return self.fail(EcsError::InvalidPoolName(String::new()));
        }
        match self.pools.iter().position(|p| p.name() == name) {
            Some(position) => Ok(position),
            None => self.fail(EcsError::PoolNotFound(name.to_string())),
        }
    }

    fn pool_by_id(&self, id: PoolId) -> Option<&EntityPool> {
        self.pools.iter().find(|p| p.id() == id)
    }

    fn pool_by_id_mut(&mut self, id: PoolId) -> Option<&mut EntityPool> {
        self.pools.iter_mut().find(|p| p.id() == id)
    }

    /// Creates a named entity pool. Capacity is rounded up to a power of two.
    ///
    /// # Errors
    ///
    /// - [`EcsError::InvalidPoolName`] for an empty or reserved name
    /// - [`EcsError::DuplicatedPoolName`] if the name is taken
    /// - [`EcsError::InvalidCapacity`] for zero capacity or more than
    ///   [`MAX_POOL_CAPACITY`](crate::memory::MAX_POOL_CAPACITY) slots
    pub fn create_entity_pool(&mut self, name: &str, capacity: usize) -> EcsResult<PoolId> {
        self.check_custom_pool_name(name)?;
        if self.has_entity_pool(name) {
            return self.fail(EcsError::DuplicatedPoolName(name.to_string()));
        }
        let id = PoolId(self.next_pool_id);
        let Some(pool) = EntityPool::new(id, name, capacity) else {
            return self.fail(EcsError::InvalidCapacity(capacity));
        };
        self.next_pool_id += 1;
        tracing::debug!(pool = name, capacity = pool.capacity(), "created entity pool");
        self.pools.push(pool);
        Ok(id)
    }

    /// Destroys a pool together with every component its entities own.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidPoolName`] for an empty or reserved name and
    /// [`EcsError::PoolNotFound`] if no such pool is registered.
    pub fn delete_entity_pool(&mut self, name: &str) -> EcsResult<()> {
        self.check_custom_pool_name(name)?;
        let position = self.pool_position(name)?;
        let pool = self.pools.remove(position);
        for (owner, kind, slot) in pool.owned_components() {
            self.release_owned(kind, slot, owner);
        }
        tracing::debug!(pool = name, "deleted entity pool");
        Ok(())
    }

    /// Takes a pool out of the registry and hands it to the caller.
    ///
    /// Components owned by its entities stay in storage.
    ///
    /// # Errors
    ///
    /// Same as [`delete_entity_pool`](Self::delete_entity_pool).
    pub fn detach_entity_pool(&mut self, name: &str) -> EcsResult<EntityPool> {
        self.check_custom_pool_name(name)?;
        let position = self.pool_position(name)?;
        tracing::debug!(pool = name, "detached entity pool");
        Ok(self.pools.remove(position))
    }

    /// Registers a previously detached pool.
    ///
    /// Component links that no longer resolve to a component owned by the
    /// same entity are dropped.
    ///
    /// # Errors
    ///
    /// - [`EcsError::InvalidPoolName`] / [`EcsError::DuplicatedPoolName`] as for creation
    /// - [`EcsError::EntityIdConflict`] if one of its entity ids is alive in the registry
    pub fn attach_entity_pool(&mut self, mut pool: EntityPool) -> EcsResult<PoolId> {
        self.check_custom_pool_name(pool.name())?;
        if self.has_entity_pool(pool.name()) {
            return self.fail(EcsError::DuplicatedPoolName(pool.name().to_string()));
        }
        let conflict = pool
            .iter_alive()
            .map(Entity::id)
            .find(|&id| self.find_entity(id).is_some());
        if let Some(id) = conflict {
            return self.fail(EcsError::EntityIdConflict(id));
        }

        if pool.id() == PoolId::DEFAULT || self.pool_by_id(pool.id()).is_some() {
            pool.set_id(PoolId(self.next_pool_id));
        }
        self.next_pool_id = self.next_pool_id.max(pool.id().raw() + 1);

        // Fresh ids must not collide with the attached ones.
        if let Some(max) = pool.iter_alive().map(|e| e.id().raw()).max() {
            if max >= self.next_entity_id && max + 1 < u64::MAX {
                self.next_entity_id = max + 1;
            }
        }

        let components = &self.components;
        let dropped = pool.retain_components(|owner, kind, slot| {
            components
                .get(kind.index())
                .and_then(Option::as_deref)
                .and_then(|storage| storage.meta_at(slot))
                .is_some_and(|meta| meta.owner == owner)
        });
        if dropped > 0 {
            tracing::debug!(pool = pool.name(), dropped, "dropped stale component links");
        }

        let id = pool.id();
        tracing::debug!(pool = pool.name(), "attached entity pool");
        self.pools.push(pool);
        Ok(id)
    }

    /// Checks whether a pool with this name is registered.
    #[must_use]
    pub fn has_entity_pool(&self, name: &str) -> bool {
        self.pools.iter().any(|p| p.name() == name)
    }

    /// Registered pool by name.
    #[must_use]
    pub fn entity_pool(&self, name: &str) -> Option<&EntityPool> {
        self.pools.iter().find(|p| p.name() == name)
    }

    /// Names of the registered pools, `DEFAULT` first.
    #[must_use]
    pub fn entity_pool_names(&self) -> Vec<&str> {
        self.pools.iter().map(EntityPool::name).collect()
    }

    /// Capacity of a pool.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::PoolNotFound`] if no such pool is registered.
    pub fn entity_pool_capacity(&mut self, name: &str) -> EcsResult<usize> {
        let position = self.pool_position(name)?;
        Ok(self.pools[position].capacity())
    }

    /// Grows or shrinks a pool. Returns the new (normalized) capacity.
    ///
    /// # Errors
    ///
    /// - [`EcsError::PoolNotFound`] if no such pool is registered
    /// - [`EcsError::InvalidCapacity`] for zero capacity or more than
    ///   [`MAX_POOL_CAPACITY`](crate::memory::MAX_POOL_CAPACITY) slots
    /// - [`EcsError::ShrinkWouldTruncate`] if an alive entity sits in the dropped range
    pub fn resize_entity_pool(&mut self, name: &str, capacity: usize) -> EcsResult<usize> {
        let position = self.pool_position(name)?;
        match self.pools[position].resize(capacity) {
            Ok(resized) => {
                tracing::debug!(pool = name, capacity = resized, "resized entity pool");
                Ok(resized)
            }
            Err(ResizeError::InvalidCapacity) => self.fail(EcsError::InvalidCapacity(capacity)),
            Err(ResizeError::LiveEntity(index)) => self.fail(EcsError::ShrinkWouldTruncate {
                pool: name.to_string(),
                capacity: normalize_capacity(capacity).unwrap_or(capacity),
                index,
            }),
        }
    }

    /// Number of entities in a pool: alive ones, or every slot.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::PoolNotFound`] if no such pool is registered.
    pub fn entity_count(&mut self, name: &str, only_alive: bool) -> EcsResult<usize> {
        let position = self.pool_position(name)?;
        Ok(self.pools[position].entity_count(only_alive))
    }

    /// Handles of the alive entities of a pool, in slot order.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::PoolNotFound`] if no such pool is registered.
    pub fn entities_in_pool(&mut self, name: &str) -> EcsResult<Vec<EntityHandle>> {
        let position = self.pool_position(name)?;
        Ok(self.pools[position].handles())
    }

    // ------------------------------------------------------------------
    // Entities
    // ------------------------------------------------------------------

    /// Creates an entity in the default pool.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::PoolIsFull`] when the default pool has no free slot.
    pub fn create_entity(&mut self) -> EcsResult<EntityHandle> {
        self.create_entity_in(DEFAULT_POOL_NAME)
    }

    /// Creates an entity in a named pool.
    ///
    /// # Errors
    ///
    /// - [`EcsError::InvalidPoolName`] for an empty name
    /// - [`EcsError::PoolNotFound`] if no such pool is registered
    /// - [`EcsError::PoolIsFull`] when the pool has no free slot
    pub fn create_entity_in(&mut self, pool_name: &str) -> EcsResult<EntityHandle> {
        let position = self.pool_position(pool_name)?;
        if self.pools[position].is_full() {
            return self.fail(EcsError::PoolIsFull(pool_name.to_string()));
        }
        let id = self.take_entity_id();
        match self.pools[position].create(id) {
            Some(handle) => {
                tracing::trace!(entity = %id, pool = pool_name, index = handle.index, "created entity");
                Ok(handle)
            }
            None => self.fail(EcsError::PoolIsFull(pool_name.to_string())),
        }
    }

    fn take_entity_id(&mut self) -> EntityId {
        loop {
            let id = EntityId::new(self.next_entity_id);
            self.next_entity_id += 1;
            if self.next_entity_id == u64::MAX {
                self.next_entity_id = 0;
                self.ids_wrapped = true;
            }
            // After a wrap, skip ids still held by alive entities.
            if !self.ids_wrapped || self.find_entity(id).is_none() {
                return id;
            }
        }
    }

    fn find_entity(&self, id: EntityId) -> Option<(&EntityPool, &Entity)> {
        self.pools
            .iter()
            .find_map(|pool| pool.find(id).map(|entity| (pool, entity)))
    }

    fn entity_mut(&mut self, entity: EntityHandle) -> Option<&mut Entity> {
        self.pool_by_id_mut(entity.pool)?.get_mut(entity)
    }

    fn check_entity(&mut self, entity: EntityHandle) -> EcsResult<()> {
        if entity.id.is_invalid() {
            return self.fail(EcsError::InvalidEntityId);
        }
        if self.entity(entity).is_none() {
            return self.fail(EcsError::EntityNotFound(entity.id));
        }
        Ok(())
    }

    /// Kills an entity, destroying every component it owns, and recycles
    /// its slot.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::EntityNotFound`] for a dead or stale handle.
    pub fn kill_entity(&mut self, entity: EntityHandle) -> EcsResult<()> {
        self.check_entity(entity)?;
        let Some(mut dead) = self
            .pool_by_id_mut(entity.pool)
            .and_then(|pool| pool.kill(entity.index))
        else {
            return self.fail(EcsError::EntityNotFound(entity.id));
        };
        for (kind, slots) in dead.wipe() {
            for slot in slots {
                self.release_owned(kind, slot, entity.id);
            }
        }
        tracing::trace!(entity = %entity.id, index = entity.index, "killed entity");
        Ok(())
    }

    /// Drops the component at `slot` of `kind` if `owner` still owns it.
    fn release_owned(&mut self, kind: KindId, slot: u32, owner: EntityId) {
        let Some(storage) = self.erased_mut(kind) else {
            return;
        };
        if let Some(meta) = storage.meta_at(slot).filter(|meta| meta.owner == owner) {
            storage.release(meta.handle());
        }
    }

    /// Alive entity addressed by `entity`.
    #[must_use]
    pub fn entity(&self, entity: EntityHandle) -> Option<&Entity> {
        self.pool_by_id(entity.pool)?.get(entity)
    }

    /// Checks whether `entity` still addresses an alive entity.
    #[inline]
    #[must_use]
    pub fn is_alive(&self, entity: EntityHandle) -> bool {
        self.entity(entity).is_some()
    }

    /// Looks an alive entity up by id, scanning pools in registration order.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::InvalidEntityId`] for the reserved id and
    /// [`EcsError::EntityNotFound`] if no alive entity carries `id`.
    pub fn get_entity_by_id(&mut self, id: EntityId) -> EcsResult<EntityHandle> {
        if id.is_invalid() {
            return self.fail(EcsError::InvalidEntityId);
        }
        match self.find_entity(id) {
            Some((pool, entity)) => Ok(entity.handle(pool.id())),
            None => self.fail(EcsError::EntityNotFound(id)),
        }
    }

    /// Moves an entity, with its id and components, into another pool.
    ///
    /// Returns the new handle; the old one goes stale. Moving into the pool
    /// the entity already lives in is a no-op.
    ///
    /// # Errors
    ///
    /// - [`EcsError::EntityNotFound`] for a dead or stale handle
    /// - [`EcsError::PoolNotFound`] if the target is not registered
    /// - [`EcsError::PoolIsFull`] if the target has no free slot; the entity stays put
    pub fn move_entity_to_pool(
        &mut self,
        entity: EntityHandle,
        pool_name: &str,
    ) -> EcsResult<EntityHandle> {
        self.check_entity(entity)?;
        let target = self.pool_position(pool_name)?;
        if self.pools[target].id() == entity.pool {
            return Ok(entity);
        }
        if self.pools[target].is_full() {
            return self.fail(EcsError::PoolIsFull(pool_name.to_string()));
        }
        let Some(source) = self.pools.iter().position(|p| p.id() == entity.pool) else {
            return self.fail(EcsError::EntityNotFound(entity.id));
        };
        let Some(mut moving) = self.pools[source].kill(entity.index) else {
            return self.fail(EcsError::EntityNotFound(entity.id));
        };
        if let Some(moved) = self.pools[target].adopt(&mut moving) {
            tracing::trace!(entity = %entity.id, pool = pool_name, index = moved.index, "moved entity");
            return Ok(moved);
        }
        // The slot just freed is the first one handed out again.
        self.pools[source].adopt(&mut moving);
        self.fail(EcsError::PoolIsFull(pool_name.to_string()))
    }

    // ------------------------------------------------------------------
    // Component kinds
    // ------------------------------------------------------------------

    /// Kind id of `T`, allocating the next one on first sight.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ComponentKindLimit`] when every kind id is taken.
    pub fn register_component<T: Component>(&mut self) -> EcsResult<KindId> {
        match self.kinds.resolve::<T>() {
            Some(kind) => Ok(kind),
            None => {
                let max = self.kinds.max_kinds();
                self.fail(EcsError::ComponentKindLimit { max })
            }
        }
    }

    /// Kind id of `T`, if registered.
    #[inline]
    #[must_use]
    pub fn kind_id<T: Component>(&self) -> Option<KindId> {
        self.kinds.get::<T>()
    }

    /// Number of registered component kinds.
    #[inline]
    #[must_use]
    pub fn kind_count(&self) -> usize {
        self.kinds.len()
    }

    // ------------------------------------------------------------------
    // Components
    // ------------------------------------------------------------------

    fn erased(&self, kind: KindId) -> Option<&dyn ErasedComponentPool> {
        self.components.get(kind.index())?.as_deref()
    }

    fn erased_mut(&mut self, kind: KindId) -> Option<&mut (dyn ErasedComponentPool + 'static)> {
        self.components.get_mut(kind.index())?.as_deref_mut()
    }

    fn storage<T: Component>(&self) -> Option<&ComponentPool<T>> {
        let kind = self.kinds.get::<T>()?;
        self.erased(kind)?.as_any().downcast_ref()
    }

    fn storage_mut<T: Component>(&mut self) -> Option<&mut ComponentPool<T>> {
        let kind = self.kinds.get::<T>()?;
        self.erased_mut(kind)?.as_any_mut().downcast_mut()
    }

    fn storage_or_insert<T: Component>(&mut self, kind: KindId) -> Option<&mut ComponentPool<T>> {
        let index = kind.index();
        if self.components.len() <= index {
            self.components.resize_with(index + 1, || None);
        }
        self.components[index]
            .get_or_insert_with(|| Box::new(ComponentPool::<T>::new(kind)) as Box<dyn ErasedComponentPool>)
            .as_any_mut()
            .downcast_mut()
    }

    /// Stores a component without attaching it to any entity.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ComponentKindLimit`] if `T` is new and no kind id is left.
    pub fn create_component<T: Component>(&mut self, value: T) -> EcsResult<ComponentHandle> {
        let kind = self.register_component::<T>()?;
        match self.storage_or_insert::<T>(kind) {
            Some(storage) => {
                let meta = storage.insert(value);
                tracing::trace!(kind = %kind, slot = meta.slot, sequence = meta.sequence, "stored component");
                Ok(meta.handle())
            }
            None => self.fail(EcsError::ComponentNotFound),
        }
    }

    fn link(&mut self, entity: EntityHandle, handle: ComponentHandle) {
        if let Some(record) = self.entity_mut(entity) {
            record.insert_component(handle.kind, handle.slot);
        }
        if let Some(storage) = self.erased_mut(handle.kind) {
            storage.set_owner(handle, entity.id);
        }
        tracing::trace!(entity = %entity.id, kind = %handle.kind, slot = handle.slot, "attached component");
    }

    /// Attaches a stored, unowned component to an entity.
    ///
    /// # Errors
    ///
    /// - [`EcsError::EntityNotFound`] for a dead or stale handle
    /// - [`EcsError::ComponentNotFound`] for a stale component handle
    /// - [`EcsError::DuplicateComponent`] if the entity already holds it
    /// - [`EcsError::ComponentAlreadyOwned`] if another entity holds it
    pub fn attach_component(
        &mut self,
        entity: EntityHandle,
        handle: ComponentHandle,
    ) -> EcsResult<()> {
        self.check_entity(entity)?;
        let Some(meta) = self.component_meta(handle) else {
            return self.fail(EcsError::ComponentNotFound);
        };
        if meta.owner == entity.id {
            return self.fail(EcsError::DuplicateComponent(entity.id));
        }
        if meta.is_attached() {
            return self.fail(EcsError::ComponentAlreadyOwned(meta.owner));
        }
        self.link(entity, handle);
        Ok(())
    }

    /// Stores `value` and attaches it to `entity`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::EntityNotFound`] for a dead or stale handle and
    /// [`EcsError::ComponentKindLimit`] if `T` is new and no kind id is left.
    pub fn add_component<T: Component>(
        &mut self,
        entity: EntityHandle,
        value: T,
    ) -> EcsResult<ComponentHandle> {
        self.check_entity(entity)?;
        let handle = self.create_component(value)?;
        self.link(entity, handle);
        Ok(handle)
    }

    /// Detaches and destroys one component, handing its value back.
    ///
    /// # Errors
    ///
    /// - [`EcsError::EntityNotFound`] for a dead or stale handle
    /// - [`EcsError::ComponentNotFound`] for a stale component handle
    /// - [`EcsError::KindMismatch`] if the handle is not of kind `T`
    /// - [`EcsError::OwnerMismatch`] if `entity` does not own it
    pub fn remove_component<T: Component>(
        &mut self,
        entity: EntityHandle,
        handle: ComponentHandle,
    ) -> EcsResult<T> {
        self.check_entity(entity)?;
        let Some(kind) = self.kinds.get::<T>() else {
            return self.fail(EcsError::ComponentNotFound);
        };
        if handle.kind != kind {
            return self.fail(EcsError::KindMismatch {
                expected: kind,
                actual: handle.kind,
            });
        }
        let Some(meta) = self.component_meta(handle) else {
            return self.fail(EcsError::ComponentNotFound);
        };
        if meta.owner != entity.id {
            return self.fail(EcsError::OwnerMismatch {
                entity: entity.id,
                owner: meta.owner,
            });
        }
        let Some((_, value)) = self.storage_mut::<T>().and_then(|s| s.remove(handle)) else {
            return self.fail(EcsError::ComponentNotFound);
        };
        if let Some(record) = self.entity_mut(entity) {
            record.remove_component(kind, handle.slot);
        }
        tracing::trace!(entity = %entity.id, kind = %kind, slot = handle.slot, "removed component");
        Ok(value)
    }

    /// Detaches and destroys every component of kind `T` the entity owns.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::EntityNotFound`] for a dead or stale handle and
    /// [`EcsError::ComponentNotFound`] if the entity owns none.
    pub fn remove_components<T: Component>(&mut self, entity: EntityHandle) -> EcsResult<Vec<T>> {
        self.check_entity(entity)?;
        let Some(kind) = self
            .kinds
            .get::<T>()
            .filter(|&kind| self.entity(entity).is_some_and(|e| e.has_kind(kind)))
        else {
            return self.fail(EcsError::ComponentNotFound);
        };
        let slots = self
            .entity_mut(entity)
            .map(|record| record.remove_kind(kind))
            .unwrap_or_default();
        let values: Vec<T> = match self.storage_mut::<T>() {
            Some(storage) => slots
                .into_iter()
                .filter_map(|slot| storage.remove_slot(slot))
                .map(|(_, value)| value)
                .collect(),
            None => Vec::new(),
        };
        tracing::trace!(entity = %entity.id, kind = %kind, count = values.len(), "removed components");
        Ok(values)
    }

    /// Destroys a component whether attached or not.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ComponentNotFound`] for a stale handle.
    pub fn delete_component(&mut self, handle: ComponentHandle) -> EcsResult<()> {
        let Some(meta) = self.component_meta(handle) else {
            return self.fail(EcsError::ComponentNotFound);
        };
        if meta.is_attached() {
            if let Some(owner) = self.pools.iter_mut().find_map(|p| p.find_mut(meta.owner)) {
                owner.remove_component(meta.kind, meta.slot);
            }
        }
        if let Some(storage) = self.erased_mut(handle.kind) {
            storage.release(handle);
        }
        Ok(())
    }

    /// Checks whether the entity owns at least one `T`.
    #[must_use]
    pub fn has_component<T: Component>(&self, entity: EntityHandle) -> bool {
        match (self.kinds.get::<T>(), self.entity(entity)) {
            (Some(kind), Some(record)) => record.has_kind(kind),
            _ => false,
        }
    }

    /// Checks whether the entity owns exactly this component.
    #[must_use]
    pub fn has_component_instance(&self, entity: EntityHandle, handle: ComponentHandle) -> bool {
        self.entity(entity)
            .is_some_and(|record| record.owns_slot(handle.kind, handle.slot))
            && self
                .component_meta(handle)
                .is_some_and(|meta| meta.owner == entity.id)
    }

    fn first_slot<T: Component>(&self, entity: EntityHandle) -> Option<(KindId, u32)> {
        let kind = self.kinds.get::<T>()?;
        let slot = self.entity(entity)?.first_component_slot(kind)?;
        Some((kind, slot))
    }

    /// The entity's `T` at the smallest slot.
    #[must_use]
    pub fn get_component<T: Component>(&self, entity: EntityHandle) -> Option<&T> {
        let (_, slot) = self.first_slot::<T>(entity)?;
        self.storage::<T>()?.get_slot(slot)
    }

    /// Mutable variant of [`get_component`](Self::get_component).
    pub fn get_component_mut<T: Component>(&mut self, entity: EntityHandle) -> Option<&mut T> {
        let (_, slot) = self.first_slot::<T>(entity)?;
        self.storage_mut::<T>()?.get_slot_mut(slot)
    }

    /// Every stored `T`, provided the entity owns at least one; empty otherwise.
    ///
    /// Use [`owned_components`](Self::owned_components) for only the
    /// entity's own.
    #[must_use]
    pub fn get_components<T: Component>(&self, entity: EntityHandle) -> Vec<&T> {
        if !self.has_component::<T>(entity) {
            return Vec::new();
        }
        self.storage::<T>()
            .map(|storage| storage.iter().map(|(_, value)| value).collect())
            .unwrap_or_default()
    }

    /// The entity's own `T` components, by ascending slot.
    #[must_use]
    pub fn owned_components<T: Component>(&self, entity: EntityHandle) -> Vec<&T> {
        let (Some(kind), Some(record), Some(storage)) =
            (self.kinds.get::<T>(), self.entity(entity), self.storage::<T>())
        else {
            return Vec::new();
        };
        record
            .component_slots(kind)
            .filter_map(|slot| storage.get_slot(slot))
            .collect()
    }

    /// Handle of the entity's `T` at the smallest slot.
    #[must_use]
    pub fn component_handle<T: Component>(&self, entity: EntityHandle) -> Option<ComponentHandle> {
        let (kind, slot) = self.first_slot::<T>(entity)?;
        self.erased(kind)?.meta_at(slot).map(|meta| meta.handle())
    }

    /// Handles of every `T` the entity owns, by ascending slot.
    #[must_use]
    pub fn component_handles<T: Component>(&self, entity: EntityHandle) -> Vec<ComponentHandle> {
        let (Some(kind), Some(record)) = (self.kinds.get::<T>(), self.entity(entity)) else {
            return Vec::new();
        };
        let Some(storage) = self.erased(kind) else {
            return Vec::new();
        };
        record
            .component_slots(kind)
            .filter_map(|slot| storage.meta_at(slot))
            .map(|meta| meta.handle())
            .collect()
    }

    /// Bookkeeping of a live component.
    #[must_use]
    pub fn component_meta(&self, handle: ComponentHandle) -> Option<ComponentMeta> {
        self.erased(handle.kind)?.meta(handle)
    }

    /// Component addressed by `handle`.
    #[must_use]
    pub fn component<T: Component>(&self, handle: ComponentHandle) -> Option<&T> {
        self.storage::<T>()?.get(handle)
    }

    /// Mutable component addressed by `handle`.
    pub fn component_mut<T: Component>(&mut self, handle: ComponentHandle) -> Option<&mut T> {
        self.storage_mut::<T>()?.get_mut(handle)
    }

    /// Number of stored `T`, attached or not.
    #[must_use]
    pub fn component_count<T: Component>(&self) -> usize {
        self.storage::<T>().map_or(0, ComponentPool::len)
    }

    // ------------------------------------------------------------------
    // Systems
    // ------------------------------------------------------------------

    /// Registers a system under the priority it reports.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::DuplicateSystem`] if a system of type `S` is
    /// registered and [`EcsError::DuplicatePriority`] if the priority is taken.
    pub fn create_system<S: System>(&mut self, system: S) -> EcsResult<SystemId> {
        if self.systems_by_type.contains_key(&TypeId::of::<S>()) {
            return self.fail(EcsError::DuplicateSystem(type_name::<S>()));
        }
        let priority = system.priority();
        if self.update_order.contains_key(&priority) {
            return self.fail(EcsError::DuplicatePriority(priority));
        }

        let id = SystemId(self.next_system_id);
        self.next_system_id += 1;
        let record = SystemRecord::new::<S>(id, priority);
        tracing::debug!(system = record.name(), priority, "registered system");

        self.systems_by_type.insert(record.type_id(), id);
        self.update_order.insert(priority, id);
        self.systems.insert(
            id,
            SystemEntry {
                record,
                logic: Some(Box::new(system)),
            },
        );
        Ok(id)
    }

    /// Unregisters the system of type `S`.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::SystemNotFound`] if none is registered.
    pub fn delete_system<S: System>(&mut self) -> EcsResult<()> {
        let Some(id) = self.systems_by_type.remove(&TypeId::of::<S>()) else {
            return self.fail(EcsError::SystemNotFound(type_name::<S>()));
        };
        if let Some(entry) = self.systems.remove(&id) {
            self.update_order.remove(&entry.record.priority());
            tracing::debug!(system = entry.record.name(), "unregistered system");
        }
        Ok(())
    }

    fn system_entry<S: System>(&self) -> Option<&SystemEntry> {
        let id = self.systems_by_type.get(&TypeId::of::<S>())?;
        self.systems.get(id)
    }

    /// Checks whether a system of type `S` is registered.
    #[must_use]
    pub fn has_system<S: System>(&self) -> bool {
        self.systems_by_type.contains_key(&TypeId::of::<S>())
    }

    /// Checks whether a system with this id is registered.
    #[must_use]
    pub fn has_system_id(&self, id: SystemId) -> bool {
        self.systems.contains_key(&id)
    }

    /// Record of the system of type `S`.
    #[must_use]
    pub fn system<S: System>(&self) -> Option<&SystemRecord> {
        self.system_entry::<S>().map(|entry| &entry.record)
    }

    /// Record of the system with this id.
    #[must_use]
    pub fn system_by_id(&self, id: SystemId) -> Option<&SystemRecord> {
        self.systems.get(&id).map(|entry| &entry.record)
    }

    /// Logic of the system of type `S`. `None` while it is running.
    #[must_use]
    pub fn system_logic<S: System>(&self) -> Option<&S> {
        self.system_entry::<S>()?
            .logic
            .as_deref()?
            .as_any()
            .downcast_ref()
    }

    /// Mutable logic of the system of type `S`. `None` while it is running.
    pub fn system_logic_mut<S: System>(&mut self) -> Option<&mut S> {
        let id = self.systems_by_type.get(&TypeId::of::<S>())?;
        self.systems
            .get_mut(id)?
            .logic
            .as_deref_mut()?
            .as_any_mut()
            .downcast_mut()
    }

    /// Editor for the record of the system of type `S`.
    pub fn system_mut<S: System>(&mut self) -> Option<SystemEditor<'_>> {
        let id = self.systems_by_type.get(&TypeId::of::<S>())?;
        let entry = self.systems.get_mut(id)?;
        Some(SystemEditor::new(
            &mut entry.record,
            &mut self.kinds,
            &mut self.errors,
        ))
    }

    /// Registered systems as `(priority, id)`, in the order `update` visits them.
    #[must_use]
    pub fn system_update_order(&self) -> Vec<(Priority, SystemId)> {
        self.update_order
            .iter()
            .map(|(&priority, &id)| (priority, id))
            .collect()
    }

    /// Entities the system of type `S` would receive on the next tick.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::SystemNotFound`] if none is registered.
    pub fn entities_for_system<S: System>(&mut self) -> EcsResult<Vec<EntityHandle>> {
        match self.system_entry::<S>() {
            Some(entry) => Ok(self.gather(&entry.record)),
            None => self.fail(EcsError::SystemNotFound(type_name::<S>())),
        }
    }

    fn gather(&self, record: &SystemRecord) -> Vec<EntityHandle> {
        let mut entities = Vec::new();
        for name in record.target_pools() {
            let Some(pool) = self.entity_pool(name) else {
                tracing::debug!(system = record.name(), pool = name, "skipping missing pool");
                continue;
            };
            entities.extend(
                pool.iter_alive()
                    .filter(|entity| record.matches(entity.signature()))
                    .map(|entity| entity.handle(pool.id())),
            );
        }
        entities
    }

    /// Runs one tick: every active system, in ascending priority order.
    ///
    /// Each system receives a snapshot of its matching entities and may
    /// mutate the registry freely, including registering or deleting
    /// systems. A system deleted during the tick is not run afterwards.
    pub fn update(&mut self, delta_time: f32) {
        let order: Vec<SystemId> = self.update_order.values().copied().collect();
        for id in order {
            let entities = match self.systems.get(&id) {
                Some(entry) if entry.record.is_active() && entry.logic.is_some() => {
                    self.gather(&entry.record)
                }
                _ => continue,
            };
            let Some(mut logic) = self.systems.get_mut(&id).and_then(|entry| entry.logic.take())
            else {
                continue;
            };
            tracing::trace!(system = %id, entities = entities.len(), "running system");
            logic.run(self, delta_time, &entities);
            if let Some(entry) = self.systems.get_mut(&id) {
                entry.logic = Some(logic);
            }
        }
    }

    // ------------------------------------------------------------------
    // Reset
    // ------------------------------------------------------------------

    /// Returns the registry to its freshly created state.
    ///
    /// Drops every named pool, every component and kind mapping, and every
    /// system; kills everything in `DEFAULT` (its capacity is kept) and
    /// restarts entity ids and component sequences at zero.
    pub fn clear(&mut self) {
        self.pools.retain(|p| p.id() == PoolId::DEFAULT);
        for pool in &mut self.pools {
            pool.reset();
        }
        self.next_entity_id = 0;
        self.ids_wrapped = false;
        self.components.clear();
        self.kinds.clear();
        self.systems.clear();
        self.systems_by_type.clear();
        self.update_order.clear();
        tracing::debug!("cleared registry");
    }
}

impl Default for Manager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Manager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manager")
            .field("config", &self.config)
            .field("pools", &self.entity_pool_names())
            .field("kinds", &self.kinds.len())
            .field(
                "components",
                &self
                    .components
                    .iter()
                    .flatten()
                    .map(|storage| (storage.kind_name(), storage.len()))
                    .collect::<Vec<_>>(),
            )
            .field("systems", &self.systems.len())
            .field("errors", &self.errors)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct Health(i32);
    impl Component for Health {}

    #[derive(Debug, PartialEq)]
    struct Tag;
    impl Component for Tag {}

    #[test]
    fn test_default_pool_exists() {
        let manager = Manager::new();
        assert_eq!(manager.entity_pool_names(), vec!["DEFAULT"]);
        assert_eq!(
            manager.entity_pool("DEFAULT").unwrap().capacity(),
            DEFAULT_POOL_CAPACITY
        );
    }

    #[test]
    fn test_with_config_normalizes_capacity() {
        let config = ManagerConfig {
            default_pool_capacity: 5,
            max_component_kinds: 4,
        };
        let mut manager = Manager::with_config(config).unwrap();
        assert_eq!(manager.entity_pool_capacity("DEFAULT"), Ok(8));

        let invalid = ManagerConfig {
            default_pool_capacity: 0,
            ..ManagerConfig::default()
        };
        assert!(matches!(
            Manager::with_config(invalid),
            Err(EcsError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_entity_ids_skip_alive_after_wrap() {
        let mut manager = Manager::new();
        let zero = manager.create_entity().unwrap();
        assert_eq!(zero.id, EntityId::new(0));

        manager.next_entity_id = u64::MAX - 2;
        assert_eq!(manager.create_entity().unwrap().id, EntityId::new(u64::MAX - 2));
        assert_eq!(manager.create_entity().unwrap().id, EntityId::new(u64::MAX - 1));
        // 0 is still alive, so the wrapped counter skips it.
        assert_eq!(manager.create_entity().unwrap().id, EntityId::new(1));
    }

    #[test]
    fn test_clear_restarts_sequences() {
        let mut manager = Manager::new();
        let entity = manager.create_entity().unwrap();
        manager.add_component(entity, Health(1)).unwrap();
        manager.add_component(entity, Health(2)).unwrap();

        manager.clear();

        let entity = manager.create_entity().unwrap();
        assert_eq!(entity.id, EntityId::new(0));
        let handle = manager.add_component(entity, Tag).unwrap();
        assert_eq!(handle.sequence, 0);
        assert_eq!(handle.kind, KindId::new(0));
        assert_eq!(manager.component_count::<Health>(), 0);
    }

    #[test]
    fn test_kind_limit_is_reported() {
        let config = ManagerConfig {
            max_component_kinds: 1,
            ..ManagerConfig::default()
        };
        let mut manager = Manager::with_config(config).unwrap();
        let entity = manager.create_entity().unwrap();

        manager.add_component(entity, Health(1)).unwrap();
        assert_eq!(
            manager.add_component(entity, Tag),
            Err(EcsError::ComponentKindLimit { max: 1 })
        );
        assert!(!manager.has_component::<Tag>(entity));
    }

    #[test]
    fn test_attach_rejects_conflicting_ids() {
        let mut manager = Manager::new();
        manager.create_entity_pool("SIDE", 2).unwrap();
        manager.create_entity_in("SIDE").unwrap();
        let side = manager.detach_entity_pool("SIDE").unwrap();

        manager.clear();
        manager.create_entity().unwrap(); // Takes id 0 again

        assert_eq!(
            manager.attach_entity_pool(side),
            Err(EcsError::EntityIdConflict(EntityId::new(0)))
        );
    }

    #[test]
    fn test_attach_drops_stale_links_and_bumps_ids() {
        let mut manager = Manager::new();
        manager.create_entity_pool("SIDE", 2).unwrap();
        manager.create_entity().unwrap(); // id 0
        let side_entity = manager.create_entity_in("SIDE").unwrap(); // id 1
        let handle = manager.add_component(side_entity, Health(3)).unwrap();
        let side = manager.detach_entity_pool("SIDE").unwrap();

        manager.delete_component(handle).unwrap();
        manager.clear();

        manager.attach_entity_pool(side).unwrap();
        assert!(manager.is_alive(side_entity));
        assert!(!manager.has_component::<Health>(side_entity));
        assert_eq!(manager.create_entity().unwrap().id, EntityId::new(2));
    }

    #[test]
    fn test_debug_lists_pools() {
        let mut manager = Manager::new();
        let entity = manager.create_entity().unwrap();
        manager.add_component(entity, Health(3)).unwrap();

        let rendered = format!("{manager:?}");
        assert!(rendered.contains("DEFAULT"));
        assert!(rendered.contains("Health"));
    }

    #[test]
    fn test_deleting_pool_spares_components_of_other_owners() {
        let mut manager = Manager::new();
        manager.create_entity_pool("SIDE", 4).unwrap();
        let side = manager.create_entity_in("SIDE").unwrap();
        let main = manager.create_entity().unwrap();
        let health = manager.add_component(main, Health(5)).unwrap();
        let kind = manager.kind_id::<Health>().unwrap();

        // A link the side entity does not really own.
        manager
            .pool_by_id_mut(side.pool)
            .and_then(|pool| pool.get_mut(side))
            .unwrap()
            .insert_component(kind, health.slot);

        manager.delete_entity_pool("SIDE").unwrap();
        assert_eq!(manager.component::<Health>(health), Some(&Health(5)));
        assert!(manager.has_component_instance(main, health));
    }

    #[test]
    fn test_with_config_rejects_oversized_pool() {
        let config = ManagerConfig {
            default_pool_capacity: crate::memory::MAX_POOL_CAPACITY + 1,
            ..ManagerConfig::default()
        };
        assert!(matches!(
            Manager::with_config(config),
            Err(EcsError::InvalidConfig(_))
        ));
    }
}
