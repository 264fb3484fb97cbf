//! # Nimbus — discrete-event datacenter simulation core
//!
//! A deterministic simulation kernel for modelling cloud datacenters, and
//! the resource-allocation engine hosts use to partition their capacity
//! among virtual machines. No async, no threads, no wall-clock time: a
//! run is fully determined by the registered entities and the events they
//! exchange.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────┐
//! │          Simulation           │ ← registry, lifecycle, run loop
//! │  ┌─────────────┐ ┌─────────┐  │
//! │  │ FutureQueue │ │ Entities│  │ ← (time, serial) min-heap / SimEntity + buffers
//! │  └─────────────┘ └────┬────┘  │
//! │       Events, Predicates│     │
//! └─────────────────────────┼─────┘
//!                     ┌─────▼──────┐
//!                     │    Host    │ ← built-in entity
//!                     │ VmScheduler│ ← SpaceShared policy
//!                     │ResourceList│
//!                     └────────────┘
//! ```

pub mod config;
pub mod entity;
pub mod error;
pub mod event;
pub mod predicate;
pub mod resource;
pub mod scheduler;
pub mod simulation;
pub mod time;
pub mod vm_scheduler;

// Re-exports for convenience.
pub use config::SimulationConfig;
pub use entity::{EntityContext, EntityId, EntityState, Host, Recorder, SimEntity};
pub use error::{ResourceError, SimError, SimResult};
pub use event::{Event, EventKind, Payload, Serial, Tag};
pub use predicate::{Predicate, ANY, NONE};
pub use resource::{Resource, ResourceKind, ResourceList};
pub use scheduler::FutureQueue;
pub use simulation::{Phase, RunSummary, Simulation, Snapshot, StopReason};
pub use time::SimTime;
pub use vm_scheduler::{SpaceShared, VmId, VmScheduler};
