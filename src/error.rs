//! Structured error types for nimbus.
//!
//! Kernel APIs return `SimResult<T>`. Construction errors (bad names,
//! negative delays, malformed times) are surfaced at the call site and
//! abort a run when they escape an entity hook. Allocation infeasibility is
//! *not* an error: `VmScheduler::allocate` returns `false` for it.

use crate::entity::EntityId;
use crate::resource::ResourceKind;

/// The top-level error type for the simulation kernel.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum SimError {
    // ── Entity registration ──────────────────────────────

    /// Entity names must be non-empty and contain no whitespace.
    #[error("invalid entity name {0:?}: names must be non-empty and contain no whitespace")]
    InvalidEntityName(String),

    /// Two entities may not share a name.
    #[error("an entity named {0:?} is already registered")]
    DuplicateEntityName(String),

    /// Entities can only be registered before the simulation starts.
    #[error("cannot register {0:?}: the simulation has already started")]
    AlreadyStarted(String),

    // ── Scheduling ───────────────────────────────────────

    /// A delay was negative or not a finite number.
    #[error("send delay must be a finite non-negative number, got {0}")]
    NegativeDelay(f64),

    /// A clock value was negative or not a finite number.
    #[error("simulation time must be a finite non-negative number, got {0}")]
    InvalidTime(f64),

    // ── Configuration ────────────────────────────────────

    /// The simulation configuration is inconsistent.
    #[error("invalid simulation config: {0}")]
    InvalidConfig(String),

    // ── Propagated ───────────────────────────────────────

    /// An entity hook reported a modelling error.
    #[error("entity {entity} failed: {message}")]
    Handler { entity: EntityId, message: String },
}

/// Errors from resource arithmetic.
///
/// These indicate an accounting invariant violation (for example a VM
/// granted more than the pool ever had). They are never clamped, and they
/// stay out of [`SimError`]: the kernel does no resource arithmetic, and
/// the panicking operators surface them inside allocation code.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ResourceError {
    /// Subtracting more than is held.
    #[error("cannot subtract {requested} from {name:?}: only {held} held")]
    Underflow {
        name: String,
        held: f64,
        requested: f64,
    },

    /// Arithmetic between two different resource kinds.
    #[error("resource {name:?} is a {left:?}, cannot combine with a {right:?}")]
    KindMismatch {
        name: String,
        left: ResourceKind,
        right: ResourceKind,
    },

    /// Arithmetic between two differently named resources.
    #[error("cannot combine resource {left:?} with {right:?}")]
    NameMismatch { left: String, right: String },
}

/// Convenience alias for `Result<T, SimError>`.
pub type SimResult<T> = Result<T, SimError>;
