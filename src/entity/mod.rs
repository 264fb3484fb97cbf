//! Entities: the actors of a simulation.
//!
//! An entity is a boxed [`SimEntity`] plus kernel-owned bookkeeping
//! (state, clock, inbound and outbound buffers). Entities never touch one
//! another; every interaction is an [`Event`](crate::Event) routed through
//! the future queue.
//!
//! # Module structure
//!
//! | Sub-module | Contents |
//! |---|---|
//! | [`id`] | [`EntityId`], [`EntityName`] |
//! | [`state`] | [`EntityState`] |
//! | [`traits`] | [`SimEntity`] trait |
//! | [`context`] | [`EntityContext`] handle |
//! | [`trace`] | [`TraceEntry`], [`Delivery`] |
//! | [`builtin`] | [`Host`], [`Recorder`] |

pub mod builtin;
pub mod context;
pub mod id;
pub mod state;
pub mod trace;
pub mod traits;

pub use builtin::{Host, Recorder};
pub use context::EntityContext;
pub use id::{EntityId, EntityName};
pub use state::EntityState;
pub use trace::{Delivery, TraceEntry};
pub use traits::SimEntity;
