//! The four-state entity lifecycle.

/// Where an entity stands with respect to event delivery.
///
/// ```text
///             wait_for_event            matching event
///  Runnable ───────────────► Waiting ───────────────► Runnable
///     │  pause / hold / EntityDeactivate
///     ▼
///  Holding ──── EntityActivate ────► Runnable
///
///  any state ── finish / EndOfSimulation ──► Finished
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum EntityState {
    /// Events are dispatched to `process_event`.
    #[default]
    Runnable,
    /// Only an event matching the stored predicate is dispatched.
    Waiting,
    /// Events are buffered until an `EntityActivate` arrives.
    Holding,
    /// Events are consumed without dispatch.
    Finished,
}

impl EntityState {
    /// `true` for every state but `Finished`.
    pub fn is_alive(self) -> bool {
        self != EntityState::Finished
    }
}

impl std::fmt::Display for EntityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EntityState::Runnable => "runnable",
            EntityState::Waiting => "waiting",
            EntityState::Holding => "holding",
            EntityState::Finished => "finished",
        };
        f.write_str(s)
    }
}
