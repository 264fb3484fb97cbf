/// Event representation for the simulation kernel.
///
/// Entities interact only by exchanging `Event`s. An event is immutable
/// once built; the kernel alone stamps its enqueue serial and the time it
/// left the future queue.
use std::cmp::Ordering;

use crate::entity::EntityId;
use crate::resource::ResourceList;
use crate::time::SimTime;
use crate::vm_scheduler::VmId;

// ── Serial ────────────────────────────────────────────────────────────

/// Enqueue sequence number.
///
/// Serials are handed out when an event enters the future queue, never
/// when it is built, so two events at the same time are delivered in the
/// order they were enqueued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Serial(u64);

impl Serial {
    #[inline]
    pub fn new(raw: u64) -> Self {
        Serial(raw)
    }

    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Serial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Strictly increasing serial generator. One per simulation.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct SerialGen {
    next: u64,
}

impl SerialGen {
    pub fn new() -> Self {
        SerialGen { next: 0 }
    }

    /// Mint the next serial.
    pub fn next_serial(&mut self) -> Serial {
        let serial = Serial(self.next);
        self.next += 1;
        serial
    }

    /// Peek at the next serial without consuming it.
    pub fn peek(&self) -> Serial {
        Serial(self.next)
    }
}

// ── EventKind ─────────────────────────────────────────────────────────

/// Internal event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum EventKind {
    /// Placeholder produced by [`Event::null`].
    Null,
    /// An ordinary message from one entity to another.
    Send,
    /// The end of a hold period.
    HoldDone,
    /// An entity creation notice.
    Create,
}

// ── Tag ───────────────────────────────────────────────────────────────

/// What an event means to its receiver.
///
/// The built-in tags cover the kernel and the datacenter collaborators;
/// models extend the set through [`Tag::User`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum Tag {
    /// No meaning; used by placeholder events.
    Null,
    /// Ends an entity's hold period. Consumed by the kernel.
    EntityActivate,
    /// Puts an entity on hold until an `EntityActivate` arrives.
    EntityDeactivate,
    /// The receiver finishes after handling this event.
    EndOfSimulation,
    /// One such event ends the whole run.
    AbruptEndOfSimulation,
    /// Low-importance marker, not used for identification.
    Insignificant,
    /// Register a resource with a registry entity.
    RegisterResource,
    /// Ask for, or reply with, the list of registered resources.
    ResourceList,
    /// Ask for, or reply with, a host's current resources.
    ResourceCharacteristics,
    /// Ask for, or reply with, a host's PE count.
    ResourceNumPe,
    /// Ask for, or reply with, a host's free PE count.
    ResourceNumFreePe,
    /// Create a VM on a host.
    VmCreate,
    /// Result of a `VmCreate`.
    VmCreateAck,
    /// Destroy a VM on a host.
    VmDestroy,
    /// Result of a `VmDestroy`.
    VmDestroyAck,
    /// Submit a unit of work.
    CloudletSubmit,
    /// A finished unit of work.
    CloudletReturn,
    /// Model-specific tag.
    User(u32),
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Tag::User(n) => write!(f, "User({})", n),
            other => write!(f, "{:?}", other),
        }
    }
}

// ── Payload ───────────────────────────────────────────────────────────

/// Data carried by an event. Opaque to the kernel.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum Payload {
    /// Nothing attached.
    #[default]
    Empty,
    /// Human-readable text.
    Text(String),
    /// Raw bytes.
    Data(Vec<u8>),
    /// A reference to another entity.
    Entity(EntityId),
    /// A count, e.g. a PE query reply.
    Count(usize),
    /// A VM resource request.
    VmRequest { vm: VmId, demand: ResourceList },
    /// The outcome of a VM create or destroy.
    VmAck { vm: VmId, success: bool },
    /// A resource snapshot.
    Resources(ResourceList),
}

impl std::fmt::Display for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Payload::Empty => write!(f, "Empty"),
            Payload::Text(s) => {
                if s.len() > 32 {
                    let cut = s.char_indices().nth(32).map_or(s.len(), |(i, _)| i);
                    write!(f, "Text(\"{}…\")", &s[..cut])
                } else {
                    write!(f, "Text({:?})", s)
                }
            }
            Payload::Data(d) => write!(f, "Data({} bytes)", d.len()),
            Payload::Entity(id) => write!(f, "Entity({})", id),
            Payload::Count(n) => write!(f, "Count({})", n),
            Payload::VmRequest { vm, demand } => write!(f, "VmRequest({}, {})", vm, demand),
            Payload::VmAck { vm, success } => write!(f, "VmAck({}, {})", vm, success),
            Payload::Resources(list) => write!(f, "Resources({})", list),
        }
    }
}

// ── Event ─────────────────────────────────────────────────────────────

/// A timestamped, tagged message between entities.
///
/// Events order by `(time, serial)`; see the `Ord` impl.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Event {
    kind: EventKind,
    time: SimTime,
    source: Option<EntityId>,
    destination: Option<EntityId>,
    tag: Tag,
    payload: Payload,
    serial: Option<Serial>,
    end_waiting_time: Option<SimTime>,
}

impl Event {
    /// Build an event. It carries no serial until the kernel enqueues it.
    pub fn new(
        kind: EventKind,
        time: SimTime,
        source: Option<EntityId>,
        destination: Option<EntityId>,
        tag: Tag,
        payload: Payload,
    ) -> Self {
        Event {
            kind,
            time,
            source,
            destination,
            tag,
            payload,
            serial: None,
            end_waiting_time: None,
        }
    }

    /// The placeholder event.
    pub fn null() -> Self {
        Event::new(EventKind::Null, SimTime::ZERO, None, None, Tag::Null, Payload::Empty)
    }

    pub fn kind(&self) -> EventKind {
        self.kind
    }

    /// The time the event is scheduled for.
    pub fn time(&self) -> SimTime {
        self.time
    }

    pub fn source(&self) -> Option<EntityId> {
        self.source
    }

    pub fn destination(&self) -> Option<EntityId> {
        self.destination
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Take the payload by value.
    pub fn into_payload(self) -> Payload {
        self.payload
    }

    /// Enqueue serial, once the event has entered the future queue.
    pub fn serial(&self) -> Option<Serial> {
        self.serial
    }

    /// The clock value when the event left the future queue. Together
    /// with [`Event::time`] this gives the queuing delay.
    pub fn end_waiting_time(&self) -> Option<SimTime> {
        self.end_waiting_time
    }

    pub(crate) fn assign_serial(&mut self, serial: Serial) {
        self.serial = Some(serial);
    }

    pub(crate) fn mark_dequeued(&mut self, now: SimTime) {
        self.end_waiting_time = Some(now);
    }
}

/// Identity: two enqueued events are equal iff they share time and
/// serial. Events that never entered the queue have no identity yet and
/// compare by their routing fields instead (see the `Ord` impl).
impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Event {}

/// `a < b` iff `a.time < b.time`, or the times match and `a` was enqueued
/// first. Events without a serial sort after enqueued ones; between two of
/// them the tie breaks by source, destination, tag and kind.
impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time.cmp(&other.time).then_with(|| match (self.serial, other.serial) {
            (Some(a), Some(b)) => a.cmp(&b),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => (self.source, self.destination, self.tag, self.kind).cmp(&(
                other.source,
                other.destination,
                other.tag,
                other.kind,
            )),
        })
    }
}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let endpoint = |id: Option<EntityId>| id.map_or_else(|| "-".to_string(), |e| e.to_string());
        write!(
            f,
            "[{} {}] {} {} -> {} {}",
            self.time,
            self.serial.map_or_else(|| "#?".to_string(), |s| s.to_string()),
            self.tag,
            endpoint(self.source),
            endpoint(self.destination),
            self.payload,
        )
    }
}
