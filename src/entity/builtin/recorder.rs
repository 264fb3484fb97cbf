//! `Recorder` — keeps every event it is handed.

use crate::entity::context::EntityContext;
use crate::entity::id::EntityId;
use crate::entity::traits::SimEntity;
use crate::error::SimResult;
use crate::event::{Event, Payload, Tag};
use crate::time::SimTime;

/// A sink entity with no behaviour of its own.
///
/// Useful as the far end of a request in tests: it records delivery time,
/// tag, sender and payload, in dispatch order.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    pub received: Vec<(SimTime, Tag, Option<EntityId>, Payload)>,
}

impl Recorder {
    pub fn new() -> Self {
        Recorder::default()
    }

    /// Payloads of every recorded event with `tag`.
    pub fn payloads(&self, tag: Tag) -> Vec<&Payload> {
        self.received
            .iter()
            .filter(|(_, t, _, _)| *t == tag)
            .map(|(_, _, _, p)| p)
            .collect()
    }
}

impl SimEntity for Recorder {
    fn process_event(&mut self, ctx: &mut EntityContext<'_>, event: Event) -> SimResult<()> {
        let (tag, source) = (event.tag(), event.source());
        self.received.push((ctx.now(), tag, source, event.into_payload()));
        Ok(())
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }

    fn clone_entity(&self) -> Box<dyn SimEntity> {
        Box::new(self.clone())
    }
}
