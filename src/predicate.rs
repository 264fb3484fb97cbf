//! Boolean matchers over events.
//!
//! Predicates drive every inbound-buffer operation on
//! [`EntityContext`](crate::entity::EntityContext): counting, peeking,
//! extracting and cancelling. They also decide when a waiting entity
//! becomes runnable again.
//!
//! Any `Fn(&Event) -> bool` closure is a predicate. The unit structs here
//! cover the common cases and compose with [`Predicate::and`],
//! [`Predicate::or`] and [`Predicate::not`].

use crate::entity::EntityId;
use crate::event::{Event, Tag};

/// A pure boolean function over an [`Event`].
///
/// Implementations must not depend on anything but the event itself, so
/// that buffer scans are repeatable.
pub trait Predicate {
    fn matches(&self, event: &Event) -> bool;

    /// Both predicates match.
    fn and<P: Predicate>(self, other: P) -> And<Self, P>
    where
        Self: Sized,
    {
        And(self, other)
    }

    /// Either predicate matches.
    fn or<P: Predicate>(self, other: P) -> Or<Self, P>
    where
        Self: Sized,
    {
        Or(self, other)
    }

    /// Negation.
    fn not(self) -> Not<Self>
    where
        Self: Sized,
    {
        Not(self)
    }
}

impl<F> Predicate for F
where
    F: Fn(&Event) -> bool,
{
    fn matches(&self, event: &Event) -> bool {
        (self)(event)
    }
}

// ── Reserved instances ────────────────────────────────────────────────

/// Matches every event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnyEvent;

/// Matches no event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoEvent;

pub const ANY: AnyEvent = AnyEvent;
pub const NONE: NoEvent = NoEvent;

impl Predicate for AnyEvent {
    fn matches(&self, _event: &Event) -> bool {
        true
    }
}

impl Predicate for NoEvent {
    fn matches(&self, _event: &Event) -> bool {
        false
    }
}

// ── Built-ins ─────────────────────────────────────────────────────────

/// Events carrying this tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HasTag(pub Tag);

/// Events carrying any other tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotTag(pub Tag);

/// Events sent by this entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FromEntity(pub EntityId);

/// Events not sent by this entity, including kernel events with no source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NotFrom(pub EntityId);

impl Predicate for HasTag {
    fn matches(&self, event: &Event) -> bool {
        event.tag() == self.0
    }
}

impl Predicate for NotTag {
    fn matches(&self, event: &Event) -> bool {
        event.tag() != self.0
    }
}

impl Predicate for FromEntity {
    fn matches(&self, event: &Event) -> bool {
        event.source() == Some(self.0)
    }
}

impl Predicate for NotFrom {
    fn matches(&self, event: &Event) -> bool {
        event.source() != Some(self.0)
    }
}

// ── Combinators ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct And<A, B>(A, B);

#[derive(Debug, Clone, Copy)]
pub struct Or<A, B>(A, B);

#[derive(Debug, Clone, Copy)]
pub struct Not<A>(A);

impl<A: Predicate, B: Predicate> Predicate for And<A, B> {
    fn matches(&self, event: &Event) -> bool {
        self.0.matches(event) && self.1.matches(event)
    }
}

impl<A: Predicate, B: Predicate> Predicate for Or<A, B> {
    fn matches(&self, event: &Event) -> bool {
        self.0.matches(event) || self.1.matches(event)
    }
}

impl<A: Predicate> Predicate for Not<A> {
    fn matches(&self, event: &Event) -> bool {
        !self.0.matches(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventKind, Payload};
    use crate::time::SimTime;

    fn from(src: u64, tag: Tag) -> Event {
        Event::new(
            EventKind::Send,
            SimTime::ZERO,
            Some(EntityId::new(src)),
            Some(EntityId::new(9)),
            tag,
            Payload::Empty,
        )
    }

    #[test]
    fn test_reserved_instances() {
        let e = Event::null();
        assert!(ANY.matches(&e));
        assert!(!NONE.matches(&e));
    }

    #[test]
    fn test_tag_predicates() {
        let e = from(1, Tag::VmCreate);
        assert!(HasTag(Tag::VmCreate).matches(&e));
        assert!(!HasTag(Tag::VmDestroy).matches(&e));
        assert!(NotTag(Tag::VmDestroy).matches(&e));
    }

    #[test]
    fn test_source_predicates() {
        let e = from(1, Tag::User(0));
        assert!(FromEntity(EntityId::new(1)).matches(&e));
        assert!(!FromEntity(EntityId::new(2)).matches(&e));
        assert!(NotFrom(EntityId::new(2)).matches(&e));
        assert!(NotFrom(EntityId::new(2)).matches(&Event::null()));
    }

    #[test]
    fn test_combinators() {
        let e = from(1, Tag::User(7));
        let p = HasTag(Tag::User(7)).and(FromEntity(EntityId::new(1)));
        assert!(p.matches(&e));
        assert!(!p.not().matches(&e));
        let q = HasTag(Tag::Null).or(|e: &Event| e.source().is_some());
        assert!(q.matches(&e));
        assert!(q.matches(&Event::null()));
        assert!(!q.matches(&Event::new(
            EventKind::Send,
            SimTime::ZERO,
            None,
            None,
            Tag::User(0),
            Payload::Empty,
        )));
    }

    #[test]
    fn test_closure_predicate() {
        let user_tag = |e: &Event| matches!(e.tag(), Tag::User(_));
        assert!(user_tag.matches(&from(0, Tag::User(1))));
        assert!(!user_tag.matches(&from(0, Tag::VmCreate)));
    }
}
