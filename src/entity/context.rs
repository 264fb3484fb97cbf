//! Kernel-owned entity state and the handle entities act through.

use std::collections::BTreeMap;
use std::rc::Rc;

use crate::error::{SimError, SimResult};
use crate::event::{Event, EventKind, Payload, Tag};
use crate::predicate::Predicate;
use crate::time::SimTime;

use super::id::{EntityId, EntityName};
use super::state::EntityState;

// ── EntityCore ────────────────────────────────────────────────────────

/// Everything the kernel tracks per entity besides its behaviour.
///
/// Each entity exclusively owns its two buffers. The inbound buffer holds
/// delivered events that were not dispatched; the outbound buffer holds
/// events sent during the current hook, merged into the future queue by
/// the kernel once the hook returns.
#[derive(Clone)]
pub(crate) struct EntityCore {
    pub(crate) id: EntityId,
    pub(crate) name: EntityName,
    pub(crate) state: EntityState,
    pub(crate) clock: SimTime,
    pub(crate) inbound: Vec<Event>,
    pub(crate) outbound: Vec<Event>,
    pub(crate) wait_for: Option<Rc<dyn Predicate>>,
}

impl EntityCore {
    pub(crate) fn new(id: EntityId, name: EntityName) -> Self {
        EntityCore {
            id,
            name,
            state: EntityState::Runnable,
            clock: SimTime::ZERO,
            inbound: Vec::new(),
            outbound: Vec::new(),
            wait_for: None,
        }
    }

    /// Whether a waiting entity's predicate accepts `event`.
    pub(crate) fn wakes_on(&self, event: &Event) -> bool {
        self.wait_for.as_ref().is_some_and(|p| p.matches(event))
    }
}

impl std::fmt::Debug for EntityCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityCore")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state)
            .field("clock", &self.clock)
            .field("inbound", &self.inbound.len())
            .field("outbound", &self.outbound.len())
            .field("waiting", &self.wait_for.is_some())
            .finish()
    }
}

// ── EntityContext ─────────────────────────────────────────────────────

/// Mutable handle passed to every [`SimEntity`](super::SimEntity) hook.
///
/// Sends land in the entity's outbound buffer and stay invisible until the
/// hook returns. Buffer queries only ever see the calling entity's own
/// inbound buffer.
pub struct EntityContext<'a> {
    core: &'a mut EntityCore,
    directory: &'a BTreeMap<String, EntityId>,
}

impl<'a> EntityContext<'a> {
    pub(crate) fn new(core: &'a mut EntityCore, directory: &'a BTreeMap<String, EntityId>) -> Self {
        EntityContext { core, directory }
    }

    #[inline]
    pub fn id(&self) -> EntityId {
        self.core.id
    }

    pub fn name(&self) -> &str {
        self.core.name.as_str()
    }

    /// The entity's clock, set by the kernel before each hook.
    #[inline]
    pub fn now(&self) -> SimTime {
        self.core.clock
    }

    pub fn state(&self) -> EntityState {
        self.core.state
    }

    /// Resolve another entity's name.
    pub fn lookup(&self, name: &str) -> Option<EntityId> {
        self.directory.get(name).copied()
    }

    // ── Sending ──────────────────────────────────────────

    /// Send an event to `destination`, timed `delay` after now.
    ///
    /// Fails with [`SimError::NegativeDelay`] if `delay` is negative or
    /// not finite.
    pub fn send(
        &mut self,
        destination: EntityId,
        delay: f64,
        tag: Tag,
        payload: Payload,
    ) -> SimResult<()> {
        self.push(EventKind::Send, destination, delay, tag, payload)
    }

    /// [`EntityContext::send`] with zero delay.
    pub fn send_now(&mut self, destination: EntityId, tag: Tag, payload: Payload) -> SimResult<()> {
        self.send(destination, 0.0, tag, payload)
    }

    /// Send an event to this entity.
    pub fn schedule_self(&mut self, delay: f64, tag: Tag, payload: Payload) -> SimResult<()> {
        let id = self.core.id;
        self.send(id, delay, tag, payload)
    }

    fn push(
        &mut self,
        kind: EventKind,
        destination: EntityId,
        delay: f64,
        tag: Tag,
        payload: Payload,
    ) -> SimResult<()> {
        let time = self.core.clock.plus(delay)?;
        let event = Event::new(kind, time, Some(self.core.id), Some(destination), tag, payload);
        tracing::trace!(entity = %self.core.name, %event, "send");
        self.core.outbound.push(event);
        Ok(())
    }

    // ── State changes ────────────────────────────────────

    /// Hold for `delay`, then resume.
    ///
    /// Events arriving meanwhile stay in the inbound buffer.
    pub fn pause(&mut self, delay: f64) -> SimResult<()> {
        let id = self.core.id;
        self.push(EventKind::HoldDone, id, delay, Tag::EntityActivate, Payload::Empty)?;
        self.core.state = EntityState::Holding;
        Ok(())
    }

    /// Hold until some entity sends this one an `EntityActivate`.
    pub fn hold(&mut self) {
        self.core.state = EntityState::Holding;
    }

    /// Stop dispatch until an event matching `predicate` arrives.
    ///
    /// Only new deliveries are tested; events already in the inbound
    /// buffer are not. Check [`EntityContext::num_events_waiting`] first if
    /// that matters.
    pub fn wait_for_event<P: Predicate + 'static>(&mut self, predicate: P) {
        self.core.wait_for = Some(Rc::new(predicate));
        self.core.state = EntityState::Waiting;
    }

    /// Stop receiving events for the rest of the run.
    pub fn finish(&mut self) {
        self.core.state = EntityState::Finished;
    }

    // ── Inbound buffer ───────────────────────────────────

    /// Count buffered events matching `predicate`.
    pub fn num_events_waiting<P: Predicate + ?Sized>(&self, predicate: &P) -> usize {
        self.core.inbound.iter().filter(|e| predicate.matches(e)).count()
    }

    /// Peek at the *last* buffered event matching `predicate`.
    pub fn select_event<P: Predicate + ?Sized>(&self, predicate: &P) -> Option<&Event> {
        self.core.inbound.iter().rev().find(|e| predicate.matches(e))
    }

    /// Remove and return the *first* buffered event matching `predicate`.
    pub fn get_next_event<P: Predicate + ?Sized>(&mut self, predicate: &P) -> Option<Event> {
        let idx = self.core.inbound.iter().position(|e| predicate.matches(e))?;
        Some(self.core.inbound.remove(idx))
    }

    /// Remove every buffered event matching `predicate`; return how many.
    pub fn cancel_event<P: Predicate + ?Sized>(&mut self, predicate: &P) -> usize {
        let before = self.core.inbound.len();
        self.core.inbound.retain(|e| !predicate.matches(e));
        before - self.core.inbound.len()
    }

    /// A [`SimError::Handler`] attributed to this entity.
    pub fn error(&self, message: impl Into<String>) -> SimError {
        SimError::Handler {
            entity: self.core.id,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::predicate::{HasTag, ANY, NONE};

    fn core_with_inbox(tags: &[u32]) -> EntityCore {
        let mut core = EntityCore::new(EntityId::new(0), EntityName::new("probe").unwrap());
        for (i, t) in tags.iter().enumerate() {
            core.inbound.push(Event::new(
                EventKind::Send,
                SimTime::ZERO,
                Some(EntityId::new(1)),
                Some(EntityId::new(0)),
                Tag::User(*t),
                Payload::Count(i),
            ));
        }
        core
    }

    fn index(e: &Event) -> usize {
        match e.payload() {
            Payload::Count(n) => *n,
            other => panic!("unexpected payload {other}"),
        }
    }

    #[test]
    fn test_select_returns_last_match_without_removing() {
        let mut core = core_with_inbox(&[1, 2, 1, 2]);
        let dir = BTreeMap::new();
        let ctx = EntityContext::new(&mut core, &dir);
        assert_eq!(ctx.select_event(&HasTag(Tag::User(1))).map(index), Some(2));
        assert_eq!(ctx.num_events_waiting(&ANY), 4);
        assert!(ctx.select_event(&NONE).is_none());
    }

    #[test]
    fn test_get_next_returns_first_match_and_removes_it() {
        let mut core = core_with_inbox(&[1, 2, 1, 2]);
        let dir = BTreeMap::new();
        let mut ctx = EntityContext::new(&mut core, &dir);
        let e = ctx.get_next_event(&HasTag(Tag::User(2))).unwrap();
        assert_eq!(index(&e), 1);
        assert_eq!(ctx.num_events_waiting(&HasTag(Tag::User(2))), 1);
        assert_eq!(ctx.num_events_waiting(&ANY), 3);
    }

    #[test]
    fn test_cancel_removes_all_matches() {
        let mut core = core_with_inbox(&[1, 2, 1, 3]);
        let dir = BTreeMap::new();
        let mut ctx = EntityContext::new(&mut core, &dir);
        assert_eq!(ctx.cancel_event(&HasTag(Tag::User(1))), 2);
        assert_eq!(ctx.cancel_event(&HasTag(Tag::User(1))), 0);
        assert_eq!(ctx.num_events_waiting(&ANY), 2);
        assert_eq!(ctx.cancel_event(&ANY), 2);
    }

    #[test]
    fn test_send_goes_to_outbound_at_clock_plus_delay() {
        let mut core = core_with_inbox(&[]);
        core.clock = SimTime::new(2.0).unwrap();
        let dir = BTreeMap::new();
        let mut ctx = EntityContext::new(&mut core, &dir);
        ctx.send(EntityId::new(5), 1.5, Tag::User(0), Payload::Empty).unwrap();
        assert_eq!(
            ctx.send(EntityId::new(5), -1.0, Tag::User(0), Payload::Empty),
            Err(SimError::NegativeDelay(-1.0))
        );
        assert_eq!(core.outbound.len(), 1);
        assert_eq!(core.outbound[0].time().value(), 3.5);
        assert_eq!(core.outbound[0].source(), Some(EntityId::new(0)));
        assert_eq!(core.outbound[0].serial(), None);
    }

    #[test]
    fn test_pause_holds_and_schedules_activation() {
        let mut core = core_with_inbox(&[]);
        let dir = BTreeMap::new();
        let mut ctx = EntityContext::new(&mut core, &dir);
        assert!(ctx.pause(-1.0).is_err());
        assert_eq!(ctx.state(), EntityState::Runnable);
        ctx.pause(4.0).unwrap();
        assert_eq!(ctx.state(), EntityState::Holding);
        let activate = &core.outbound[0];
        assert_eq!(activate.tag(), Tag::EntityActivate);
        assert_eq!(activate.kind(), EventKind::HoldDone);
        assert_eq!(activate.destination(), Some(EntityId::new(0)));
    }

    #[test]
    fn test_wait_for_event_stores_predicate() {
        let mut core = core_with_inbox(&[]);
        let dir = BTreeMap::new();
        let mut ctx = EntityContext::new(&mut core, &dir);
        ctx.wait_for_event(HasTag(Tag::VmCreateAck));
        assert_eq!(ctx.state(), EntityState::Waiting);
        let ack = Event::new(
            EventKind::Send,
            SimTime::ZERO,
            None,
            None,
            Tag::VmCreateAck,
            Payload::Empty,
        );
        assert!(core.wakes_on(&ack));
        assert!(!core.wakes_on(&Event::null()));
    }

    #[test]
    fn test_lookup_uses_directory() {
        let mut core = core_with_inbox(&[]);
        let mut dir = BTreeMap::new();
        dir.insert("host0".to_string(), EntityId::new(4));
        let ctx = EntityContext::new(&mut core, &dir);
        assert_eq!(ctx.lookup("host0"), Some(EntityId::new(4)));
        assert_eq!(ctx.lookup("host1"), None);
        assert_eq!(ctx.name(), "probe");
    }
}
