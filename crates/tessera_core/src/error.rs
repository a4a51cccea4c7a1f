//! # Registry Error Types
//!
//! All errors that can occur while mutating the registry.
//!
//! Every variant maps onto a coarse [`ErrorCode`], which is what the
//! injectable error callback receives alongside the rendered message.

use std::fmt;

use thiserror::Error;

use crate::ecs::{EntityId, KindId, Priority};

/// Coarse error taxonomy handed to the error callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Pool name is empty or reserved.
    InvalidPoolName,
    /// A pool with that name is already registered.
    DuplicatedPoolName,
    /// No pool with that name is registered.
    PoolNotFound,
    /// The pool has no free slot left.
    PoolIsFull,
    /// The reserved invalid entity id was used.
    InvalidEntityId,
    /// No alive entity matches the id or handle.
    EntityNotFound,
    /// Any other rejected operation.
    OperationRejected,
}

/// Errors that can occur in the registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// Pool name is empty or equals the reserved default name.
    #[error("entity pool name can't be empty or \"DEFAULT\": {0:?}")]
    InvalidPoolName(String),

    /// A pool with this name already exists.
    #[error("there is a pool already with the name {0:?}")]
    DuplicatedPoolName(String),

    /// No pool with this name exists.
    #[error("failed to find pool {0:?}")]
    PoolNotFound(String),

    /// The pool has no free slot.
    #[error("pool {0:?} is full")]
    PoolIsFull(String),

    /// Zero is not a valid pool capacity.
    #[error("invalid pool capacity: {0}")]
    InvalidCapacity(usize),

    /// Shrinking would drop an alive entity.
    #[error("can't shrink pool {pool:?} to {capacity}: slot {index} holds an alive entity")]
    ShrinkWouldTruncate {
        /// Pool being resized.
        pool: String,
        /// Requested (normalized) capacity.
        capacity: usize,
        /// First alive slot inside the truncated range.
        index: u32,
    },

    /// The reserved invalid entity id was passed in.
    #[error("invalid entity id")]
    InvalidEntityId,

    /// No alive entity carries this id.
    #[error("entity {0} not found")]
    EntityNotFound(EntityId),

    /// A pool being attached holds an id already alive in the registry.
    #[error("entity {0} is already alive in the registry")]
    EntityIdConflict(EntityId),

    /// All kind ids are in use.
    #[error("component kind limit reached: at most {max} kinds")]
    ComponentKindLimit {
        /// Configured maximum.
        max: usize,
    },

    /// The handle does not point at a live component.
    #[error("component not found")]
    ComponentNotFound,

    /// The handle belongs to another component kind.
    #[error("component kind mismatch: expected {expected}, got {actual}")]
    KindMismatch {
        /// Kind of the requested type.
        expected: KindId,
        /// Kind carried by the handle.
        actual: KindId,
    },

    /// The entity already holds this exact component.
    #[error("entity {0} already holds this component")]
    DuplicateComponent(EntityId),

    /// The component is attached to some other entity.
    #[error("component is already owned by entity {0}")]
    ComponentAlreadyOwned(EntityId),

    /// The component's recorded owner is not the entity.
    #[error("component is owned by {owner}, not by {entity}")]
    OwnerMismatch {
        /// Entity named in the request.
        entity: EntityId,
        /// Recorded owner.
        owner: EntityId,
    },

    /// A system with this priority is already registered.
    #[error("a system with priority {0} is already registered")]
    DuplicatePriority(Priority),

    /// A system of this type is already registered.
    #[error("system {0} is already registered")]
    DuplicateSystem(&'static str),

    /// No system of this type is registered.
    #[error("system {0} not found")]
    SystemNotFound(&'static str),

    /// Invalid configuration file.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl EcsError {
    /// Maps this error onto the callback taxonomy.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidPoolName(_) => ErrorCode::InvalidPoolName,
            Self::DuplicatedPoolName(_) => ErrorCode::DuplicatedPoolName,
            Self::PoolNotFound(_) => ErrorCode::PoolNotFound,
            Self::PoolIsFull(_) => ErrorCode::PoolIsFull,
            Self::InvalidEntityId => ErrorCode::InvalidEntityId,
            Self::EntityNotFound(_) => ErrorCode::EntityNotFound,
            _ => ErrorCode::OperationRejected,
        }
    }
}

/// Result type for registry operations.
pub type EcsResult<T> = Result<T, EcsError>;

/// Callback receiving every reported failure.
pub type ErrorCallback = Box<dyn FnMut(ErrorCode, &str)>;

/// Funnel every failure goes through: a `warn` event, then the callback.
#[derive(Default)]
pub(crate) struct ErrorReporter {
    callback: Option<ErrorCallback>,
}

impl ErrorReporter {
    pub(crate) fn set(&mut self, callback: ErrorCallback) {
        self.callback = Some(callback);
    }

    pub(crate) fn unset(&mut self) {
        self.callback = None;
    }

    /// Reports `error` and hands it back for returning.
    pub(crate) fn report(&mut self, error: EcsError) -> EcsError {
        let code = error.code();
        let message = error.to_string();
        tracing::warn!(?code, "{message}");
        if let Some(callback) = self.callback.as_mut() {
            callback(code, &message);
        }
        error
    }
}

impl fmt::Debug for ErrorReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorReporter")
            .field("callback", &self.callback.is_some())
            .finish()
    }
}
