//! `SimEntity` — the three hooks a model implements.

use crate::error::SimResult;
use crate::event::Event;

use super::context::EntityContext;

/// Behaviour of a simulated entity.
///
/// The kernel calls [`start_entity`](SimEntity::start_entity) once when the
/// simulation starts, [`process_event`](SimEntity::process_event) once per
/// dispatched event, and [`shutdown_entity`](SimEntity::shutdown_entity)
/// once when it finishes. Everything an entity does to the outside world
/// goes through the [`EntityContext`].
///
/// An error returned from any hook aborts the run.
///
/// # Example
///
/// ```rust
/// use nimbus::entity::{EntityContext, SimEntity};
/// use nimbus::{Event, SimResult, Tag};
///
/// #[derive(Clone)]
/// struct Counter { seen: u32 }
///
/// impl SimEntity for Counter {
///     fn process_event(&mut self, _ctx: &mut EntityContext<'_>, event: Event) -> SimResult<()> {
///         if event.tag() == Tag::User(1) {
///             self.seen += 1;
///         }
///         Ok(())
///     }
///     fn as_any(&self) -> &dyn std::any::Any { self }
///     fn as_any_mut(&mut self) -> &mut dyn std::any::Any { self }
///     fn clone_entity(&self) -> Box<dyn SimEntity> { Box::new(self.clone()) }
/// }
/// ```
pub trait SimEntity {
    /// Called once, in registration order, when the simulation starts.
    fn start_entity(&mut self, _ctx: &mut EntityContext<'_>) -> SimResult<()> {
        Ok(())
    }

    /// React to a dispatched event. The event has already been removed
    /// from the inbound buffer.
    fn process_event(&mut self, ctx: &mut EntityContext<'_>, event: Event) -> SimResult<()>;

    /// Called once, in registration order, when the simulation finishes.
    fn shutdown_entity(&mut self, _ctx: &mut EntityContext<'_>) -> SimResult<()> {
        Ok(())
    }

    /// Downcast support for [`Simulation::entity`](crate::Simulation::entity).
    fn as_any(&self) -> &dyn std::any::Any;
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;

    /// Boxed copy of this entity, used by simulation snapshots.
    fn clone_entity(&self) -> Box<dyn SimEntity>;
}

impl Clone for Box<dyn SimEntity> {
    fn clone(&self) -> Self {
        self.clone_entity()
    }
}

impl std::fmt::Debug for dyn SimEntity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SimEntity")
    }
}
