//! TraceEntry — one record per dequeued event.

use crate::event::{Payload, Serial, Tag};
use crate::time::SimTime;

use super::id::EntityId;

/// What the kernel did with a dequeued event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum Delivery {
    /// Passed to `process_event`.
    Dispatched,
    /// Left in the inbound buffer of a waiting or holding entity.
    Deferred,
    /// An `EntityActivate` or `EntityDeactivate` handled by the kernel.
    Kernel,
    /// Dropped: no such destination, or the destination has finished.
    Consumed,
}

/// A record of a single dequeued event.
///
/// Collected by the simulation when tracing is enabled; two runs of the
/// same model yield equal traces.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct TraceEntry {
    pub time: SimTime,
    pub serial: Serial,
    pub source: Option<EntityId>,
    pub destination: Option<EntityId>,
    pub tag: Tag,
    pub payload: Payload,
    pub delivery: Delivery,
}

impl std::fmt::Display for TraceEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let endpoint = |id: Option<EntityId>| id.map_or_else(|| "-".to_string(), |e| e.to_string());
        write!(
            f,
            "[{} {}] {} -> {} {} {} ({:?})",
            self.time,
            self.serial,
            endpoint(self.source),
            endpoint(self.destination),
            self.tag,
            self.payload,
            self.delivery,
        )
    }
}
