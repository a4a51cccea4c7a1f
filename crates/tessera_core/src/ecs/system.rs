//! # Systems
//!
//! A system is per-tick logic plus a passive [`SystemRecord`]: priority,
//! required signature, the entity pools it scans and an active flag.
//! The [`Manager`] runs active systems in ascending priority order, handing
//! each a snapshot of the matching entities.

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::ops::Deref;

use super::component::{Component, KindId, KindRegistry};
use super::entity::EntityHandle;
use super::signature::Signature;
use crate::config::DEFAULT_POOL_NAME;
use crate::error::{EcsError, EcsResult, ErrorReporter};
use crate::Manager;

/// Scheduling priority. Lower runs first; unique among registered systems.
pub type Priority = u32;

/// Identity of a registered system.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct SystemId(pub(crate) u32);

impl SystemId {
    /// Raw value.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Per-tick logic.
///
/// # Example
///
/// ```rust
/// use tessera_core::{Component, EntityHandle, Manager, Priority, System};
///
/// struct Health(i32);
/// impl Component for Health {}
///
/// struct Regen;
///
/// impl System for Regen {
///     fn priority(&self) -> Priority {
///         0
///     }
///
///     fn update(&mut self, manager: &mut Manager, _delta_time: f32, entities: &[EntityHandle]) {
///         for &entity in entities {
///             if let Some(health) = manager.get_component_mut::<Health>(entity) {
///                 health.0 += 1;
///             }
///         }
///     }
/// }
/// ```
pub trait System: 'static {
    /// Priority this system registers with.
    fn priority(&self) -> Priority;

    /// Runs one tick over `entities`.
    ///
    /// `entities` is a snapshot taken before the call, so the manager can be
    /// mutated freely; handles that went stale meanwhile simply stop
    /// resolving.
    fn update(&mut self, manager: &mut Manager, delta_time: f32, entities: &[EntityHandle]);
}

/// Object-safe view of a [`System`] that can also be downcast.
pub(crate) trait ErasedSystem {
    fn run(&mut self, manager: &mut Manager, delta_time: f32, entities: &[EntityHandle]);
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<S: System> ErasedSystem for S {
    fn run(&mut self, manager: &mut Manager, delta_time: f32, entities: &[EntityHandle]) {
        self.update(manager, delta_time, entities);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Scheduling record of a registered system.
#[derive(Clone, Debug)]
pub struct SystemRecord {
    id: SystemId,
    name: &'static str,
    type_id: TypeId,
    priority: Priority,
    signature: Signature,
    default_pool: bool,
    pools: Vec<String>,
    active: bool,
}

impl SystemRecord {
    pub(crate) fn new<S: System>(id: SystemId, priority: Priority) -> Self {
        Self {
            id,
            name: type_name::<S>(),
            type_id: TypeId::of::<S>(),
            priority,
            signature: Signature::EMPTY,
            default_pool: true,
            pools: Vec::new(),
            active: true,
        }
    }

    /// Identity of the system.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> SystemId {
        self.id
    }

    /// Diagnostic type name.
    #[inline]
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    pub(crate) const fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Scheduling priority.
    #[inline]
    #[must_use]
    pub const fn priority(&self) -> Priority {
        self.priority
    }

    /// Kinds an entity must own to be handed to this system.
    #[inline]
    #[must_use]
    pub const fn signature(&self) -> &Signature {
        &self.signature
    }

    /// Whether the manager runs this system on `update`.
    #[inline]
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Whether the default pool is scanned.
    #[inline]
    #[must_use]
    pub const fn uses_default_pool(&self) -> bool {
        self.default_pool
    }

    /// Extra pools scanned, in the order they were added.
    #[inline]
    #[must_use]
    pub fn pool_names(&self) -> &[String] {
        &self.pools
    }

    /// Every pool scanned: the default pool first (when enabled), then the extras.
    pub fn target_pools(&self) -> impl Iterator<Item = &str> {
        self.default_pool
            .then_some(DEFAULT_POOL_NAME)
            .into_iter()
            .chain(self.pools.iter().map(String::as_str))
    }

    /// Returns `true` if an entity with `signature` satisfies this system.
    #[inline]
    #[must_use]
    pub fn matches(&self, signature: &Signature) -> bool {
        signature.contains_all(&self.signature)
    }
}

/// Registered system: record plus logic.
///
/// The logic is `None` while the system is running.
pub(crate) struct SystemEntry {
    pub(crate) record: SystemRecord,
    pub(crate) logic: Option<Box<dyn ErasedSystem>>,
}

/// Mutable access to a [`SystemRecord`].
///
/// Obtained from [`Manager::system_mut`]. Reads go through `Deref`.
pub struct SystemEditor<'a> {
    record: &'a mut SystemRecord,
    kinds: &'a mut KindRegistry,
    errors: &'a mut ErrorReporter,
}

impl<'a> SystemEditor<'a> {
    pub(crate) fn new(
        record: &'a mut SystemRecord,
        kinds: &'a mut KindRegistry,
        errors: &'a mut ErrorReporter,
    ) -> Self {
        Self {
            record,
            kinds,
            errors,
        }
    }

    /// Requires component kind `T`, registering the kind on first sight.
    ///
    /// # Errors
    ///
    /// Returns [`EcsError::ComponentKindLimit`] when no kind id is left.
    pub fn require<T: Component>(&mut self) -> EcsResult<KindId> {
        let Some(kind) = self.kinds.resolve::<T>() else {
            return Err(self.errors.report(EcsError::ComponentKindLimit {
                max: self.kinds.max_kinds(),
            }));
        };
        self.record.signature.set(kind);
        Ok(kind)
    }

    /// Stops requiring `T`. Returns `true` if it was required.
    pub fn release<T: Component>(&mut self) -> bool {
        let Some(kind) = self.kinds.get::<T>() else {
            return false;
        };
        let was_set = self.record.signature.has(kind);
        self.record.signature.clear(kind);
        was_set
    }

    /// Stops scanning the default pool.
    pub fn disable_default_pool(&mut self) -> &mut Self {
        self.record.default_pool = false;
        self
    }

    /// Scans the default pool again.
    pub fn enable_default_pool(&mut self) -> &mut Self {
        self.record.default_pool = true;
        self
    }

    /// Adds a pool to scan. Returns `false` if it was already scanned.
    ///
    /// The pool does not need to exist yet; missing pools are skipped at
    /// update time.
    pub fn add_pool(&mut self, name: &str) -> bool {
        if name == DEFAULT_POOL_NAME {
            let added = !self.record.default_pool;
            self.record.default_pool = true;
            return added;
        }
        if name.is_empty() || self.record.pools.iter().any(|p| p == name) {
            return false;
        }
        self.record.pools.push(name.to_string());
        true
    }

    /// Stops scanning a pool. Returns `false` if it was not scanned.
    pub fn remove_pool(&mut self, name: &str) -> bool {
        if name == DEFAULT_POOL_NAME {
            let removed = self.record.default_pool;
            self.record.default_pool = false;
            return removed;
        }
        let before = self.record.pools.len();
        self.record.pools.retain(|p| p != name);
        before != self.record.pools.len()
    }

    /// Includes the system in scheduling passes.
    pub fn activate(&mut self) -> &mut Self {
        self.record.active = true;
        self
    }

    /// Excludes the system from scheduling passes. Priority and
    /// registration are untouched.
    pub fn deactivate(&mut self) -> &mut Self {
        self.record.active = false;
        self
    }
}

impl Deref for SystemEditor<'_> {
    type Target = SystemRecord;

    fn deref(&self) -> &SystemRecord {
        self.record
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Noop;

    impl System for Noop {
        fn priority(&self) -> Priority {
            3
        }

        fn update(&mut self, _: &mut Manager, _: f32, _: &[EntityHandle]) {}
    }

    struct Health;
    impl Component for Health {}
    struct Position;
    impl Component for Position {}

    #[test]
    fn test_record_defaults() {
        let record = SystemRecord::new::<Noop>(SystemId(0), 3);
        assert!(record.is_active());
        assert!(record.uses_default_pool());
        assert!(record.signature().is_empty());
        assert_eq!(record.target_pools().collect::<Vec<_>>(), vec!["DEFAULT"]);
        assert!(record.name().ends_with("Noop"));
    }

    #[test]
    fn test_editor_signature_and_pools() {
        let mut record = SystemRecord::new::<Noop>(SystemId(0), 3);
        let mut kinds = KindRegistry::new(4);
        let mut errors = ErrorReporter::default();
        let mut editor = SystemEditor::new(&mut record, &mut kinds, &mut errors);

        let health = editor.require::<Health>().unwrap();
        editor.require::<Health>().unwrap();
        let position = editor.require::<Position>().unwrap();
        assert_eq!(editor.signature().low_bits(), 0b11);

        assert!(editor.release::<Health>());
        assert!(!editor.release::<Health>());
        assert!(!editor.signature().has(health));
        assert!(editor.signature().has(position));

        editor.disable_default_pool();
        assert!(editor.add_pool("FIRST"));
        assert!(editor.add_pool("SECOND"));
        assert!(!editor.add_pool("FIRST"));
        assert_eq!(
            editor.target_pools().collect::<Vec<_>>(),
            vec!["FIRST", "SECOND"]
        );
        assert!(editor.remove_pool("FIRST"));
        assert!(editor.add_pool("DEFAULT"));
        assert_eq!(
            editor.target_pools().collect::<Vec<_>>(),
            vec!["DEFAULT", "SECOND"]
        );
    }

    #[test]
    fn test_matches() {
        let mut record = SystemRecord::new::<Noop>(SystemId(0), 3);
        record.signature.set(KindId::new(1));

        assert!(record.matches(&Signature::from_kinds(&[KindId::new(0), KindId::new(1)])));
        assert!(!record.matches(&Signature::from_kinds(&[KindId::new(0)])));
    }
}
