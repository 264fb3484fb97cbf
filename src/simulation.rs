/// The simulation context and its run loop.
///
/// `Simulation` owns the future queue, the entity registry and the name
/// directory. Each step dequeues the earliest event, advances the clock,
/// delivers the event to its destination and merges whatever that entity
/// sent into the queue before the next step. Purely synchronous and
/// single-threaded, so a run is a function of the registered entities and
/// the seeded events.
use std::collections::BTreeMap;

use crate::config::SimulationConfig;
use crate::entity::context::{EntityContext, EntityCore};
use crate::entity::{Delivery, EntityId, EntityName, EntityState, SimEntity, TraceEntry};
use crate::error::{SimError, SimResult};
use crate::event::{Event, EventKind, Payload, Serial, Tag};
use crate::scheduler::FutureQueue;
use crate::time::SimTime;

// ── Phase / summary ───────────────────────────────────────────────────

/// Lifecycle of a [`Simulation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum Phase {
    /// Entities may be registered; nothing has run.
    Created,
    /// `start_entity` hooks have run.
    Running,
    /// `shutdown_entity` hooks have run.
    Finished,
}

/// Why [`Simulation::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum StopReason {
    QueueEmpty,
    AllFinished,
    AbruptEnd,
    TerminationTime,
    StepLimit,
}

/// Outcome of a completed run.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct RunSummary {
    /// Events dequeued since the simulation was created.
    pub steps: u64,
    /// Clock value of the last dequeued event.
    pub final_time: SimTime,
    pub reason: StopReason,
}

// ── Slots / snapshots ─────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Slot {
    core: EntityCore,
    behaviour: Box<dyn SimEntity>,
}

/// A value copy of every mutable piece of a [`Simulation`].
///
/// Taken with [`Simulation::snapshot`], applied with
/// [`Simulation::restore`]. Entities are copied through
/// [`SimEntity::clone_entity`], so host allocation maps travel with them.
#[derive(Debug, Clone)]
pub struct Snapshot {
    clock: SimTime,
    phase: Phase,
    steps: u64,
    abrupt_end: bool,
    queue: FutureQueue,
    slots: BTreeMap<EntityId, Slot>,
    directory: BTreeMap<String, EntityId>,
    trace: Vec<TraceEntry>,
}

impl Snapshot {
    /// Clock value at the time of the snapshot.
    pub fn time(&self) -> SimTime {
        self.clock
    }
}

// ── Simulation ────────────────────────────────────────────────────────

/// Top-level simulation driver.
///
/// Register entities, optionally seed events with
/// [`Simulation::schedule`], then call [`Simulation::run`], or drive it by
/// hand with [`Simulation::start`], [`Simulation::step`] and
/// [`Simulation::finish`].
#[derive(Debug)]
pub struct Simulation {
    config: SimulationConfig,
    clock: SimTime,
    phase: Phase,
    steps: u64,
    abrupt_end: bool,
    queue: FutureQueue,
    slots: BTreeMap<EntityId, Slot>,
    directory: BTreeMap<String, EntityId>,
    trace: Vec<TraceEntry>,
}

impl Simulation {
    pub fn new() -> Self {
        Simulation {
            config: SimulationConfig::default(),
            clock: SimTime::ZERO,
            phase: Phase::Created,
            steps: 0,
            abrupt_end: false,
            queue: FutureQueue::new(),
            slots: BTreeMap::new(),
            directory: BTreeMap::new(),
            trace: Vec::new(),
        }
    }

    pub fn with_config(config: SimulationConfig) -> SimResult<Self> {
        config.validate()?;
        Ok(Simulation {
            config,
            ..Simulation::new()
        })
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Current simulated time.
    pub fn now(&self) -> SimTime {
        self.clock
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Events dequeued so far.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Events in the future queue.
    pub fn pending_events(&self) -> usize {
        self.queue.len()
    }

    /// The dispatch trace. Empty unless tracing is enabled.
    pub fn trace(&self) -> &[TraceEntry] {
        &self.trace
    }

    // ── Registry ─────────────────────────────────────────

    /// Register an entity under `name`.
    ///
    /// Fails on an invalid or already-used name, or once the simulation has
    /// started.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        entity: Box<dyn SimEntity>,
    ) -> SimResult<EntityId> {
        let name = name.into();
        if self.phase != Phase::Created {
            return Err(SimError::AlreadyStarted(name));
        }
        let name = EntityName::new(name)?;
        if self.directory.contains_key(name.as_str()) {
            return Err(SimError::DuplicateEntityName(name.to_string()));
        }
        let id = EntityId::new(self.slots.len() as u64);
        tracing::debug!(%id, %name, "registered entity");
        self.directory.insert(name.to_string(), id);
        self.slots.insert(
            id,
            Slot {
                core: EntityCore::new(id, name),
                behaviour: entity,
            },
        );
        Ok(id)
    }

    pub fn entity_count(&self) -> usize {
        self.slots.len()
    }

    pub fn entity_id(&self, name: &str) -> Option<EntityId> {
        self.directory.get(name).copied()
    }

    pub fn entity_name(&self, id: EntityId) -> Option<&str> {
        self.slots.get(&id).map(|s| s.core.name.as_str())
    }

    pub fn entity_state(&self, id: EntityId) -> Option<EntityState> {
        self.slots.get(&id).map(|s| s.core.state)
    }

    /// Events delivered to `id` but not dispatched.
    pub fn buffered_events(&self, id: EntityId) -> usize {
        self.slots.get(&id).map_or(0, |s| s.core.inbound.len())
    }

    /// Downcast an entity for inspection.
    pub fn entity<T: SimEntity + 'static>(&self, id: EntityId) -> Option<&T> {
        self.slots.get(&id)?.behaviour.as_any().downcast_ref::<T>()
    }

    pub fn entity_mut<T: SimEntity + 'static>(&mut self, id: EntityId) -> Option<&mut T> {
        self.slots
            .get_mut(&id)?
            .behaviour
            .as_any_mut()
            .downcast_mut::<T>()
    }

    // ── Seeding ──────────────────────────────────────────

    /// Enqueue an event from outside any entity, `delay` after now.
    pub fn schedule(
        &mut self,
        source: Option<EntityId>,
        destination: EntityId,
        delay: f64,
        tag: Tag,
        payload: Payload,
    ) -> SimResult<Serial> {
        let time = self.clock.plus(delay)?;
        let event = Event::new(EventKind::Send, time, source, Some(destination), tag, payload);
        Ok(self.queue.push(event))
    }

    // ── Lifecycle ────────────────────────────────────────

    /// Run every `start_entity` hook in registration order.
    ///
    /// No-op once started.
    pub fn start(&mut self) -> SimResult<()> {
        if self.phase != Phase::Created {
            return Ok(());
        }
        self.phase = Phase::Running;
        tracing::info!(entities = self.slots.len(), "simulation started");
        for slot in self.slots.values_mut() {
            slot.core.clock = self.clock;
            let mut ctx = EntityContext::new(&mut slot.core, &self.directory);
            slot.behaviour.start_entity(&mut ctx)?;
            for event in slot.core.outbound.drain(..) {
                self.queue.push(event);
            }
        }
        Ok(())
    }

    /// Dequeue and deliver one event.
    ///
    /// Starts the simulation if needed. Returns `None` when the queue is
    /// empty or the simulation has finished.
    pub fn step(&mut self) -> SimResult<Option<TraceEntry>> {
        self.start()?;
        if self.phase == Phase::Finished {
            return Ok(None);
        }
        let Some(mut event) = self.queue.pop_next() else {
            return Ok(None);
        };
        debug_assert!(event.time() >= self.clock, "clock went backwards");
        self.clock = event.time();
        event.mark_dequeued(self.clock);
        self.steps += 1;

        let mut entry = TraceEntry {
            time: event.time(),
            serial: event.serial().unwrap_or_default(),
            source: event.source(),
            destination: event.destination(),
            tag: event.tag(),
            payload: Payload::Empty,
            delivery: Delivery::Consumed,
        };
        if self.config.trace {
            entry.payload = event.payload().clone();
        }
        entry.delivery = self.deliver(event)?;
        tracing::trace!(%entry, "step");
        if self.config.trace {
            self.trace.push(entry.clone());
        }
        Ok(Some(entry))
    }

    fn deliver(&mut self, event: Event) -> SimResult<Delivery> {
        let Some(slot) = event.destination().and_then(|dst| self.slots.get_mut(&dst)) else {
            tracing::debug!(%event, "no such destination; consumed");
            return Ok(Delivery::Consumed);
        };
        slot.core.clock = self.clock;
        let tag = event.tag();

        match (slot.core.state, tag) {
            (EntityState::Finished, _) => {
                tracing::debug!(entity = %slot.core.name, %event, "entity finished; consumed");
                return Ok(Delivery::Consumed);
            }
            (state, Tag::EntityActivate) => {
                if state == EntityState::Holding {
                    slot.core.state = EntityState::Runnable;
                }
                return Ok(Delivery::Kernel);
            }
            (_, Tag::EntityDeactivate) => {
                slot.core.state = EntityState::Holding;
                return Ok(Delivery::Kernel);
            }
            _ => {}
        }

        let dispatch = match slot.core.state {
            EntityState::Runnable => true,
            EntityState::Waiting if slot.core.wakes_on(&event) => {
                slot.core.wait_for = None;
                slot.core.state = EntityState::Runnable;
                true
            }
            _ => false,
        };

        let delivery = if dispatch {
            let mut ctx = EntityContext::new(&mut slot.core, &self.directory);
            slot.behaviour.process_event(&mut ctx, event)?;
            for out in slot.core.outbound.drain(..) {
                self.queue.push(out);
            }
            Delivery::Dispatched
        } else {
            slot.core.inbound.push(event);
            Delivery::Deferred
        };

        match tag {
            Tag::EndOfSimulation => {
                tracing::debug!(entity = %slot.core.name, "end of simulation");
                slot.core.state = EntityState::Finished;
            }
            Tag::AbruptEndOfSimulation => {
                tracing::info!(entity = %slot.core.name, "abrupt end of simulation");
                self.abrupt_end = true;
            }
            _ => {}
        }
        Ok(delivery)
    }

    /// Step until the queue drains, every entity finishes, an abrupt end
    /// arrives or a configured limit is hit, then [`Simulation::finish`].
    pub fn run(&mut self) -> SimResult<RunSummary> {
        self.start()?;
        let reason = loop {
            if self.abrupt_end {
                break StopReason::AbruptEnd;
            }
            if !self.slots.is_empty() && self.slots.values().all(|s| !s.core.state.is_alive()) {
                break StopReason::AllFinished;
            }
            if self.config.max_steps.is_some_and(|max| self.steps >= max) {
                break StopReason::StepLimit;
            }
            if let (Some(limit), Some(next)) = (self.config.termination_time, self.queue.peek_next()) {
                if next.time() > limit {
                    break StopReason::TerminationTime;
                }
            }
            if self.step()?.is_none() {
                break StopReason::QueueEmpty;
            }
        };
        self.finish()?;
        let summary = RunSummary {
            steps: self.steps,
            final_time: self.clock,
            reason,
        };
        tracing::info!(steps = summary.steps, time = %summary.final_time, ?reason, "simulation finished");
        Ok(summary)
    }

    /// Run every `shutdown_entity` hook in registration order.
    ///
    /// Idempotent. Events sent from shutdown hooks are discarded.
    pub fn finish(&mut self) -> SimResult<()> {
        if self.phase == Phase::Finished {
            return Ok(());
        }
        self.phase = Phase::Finished;
        for slot in self.slots.values_mut() {
            slot.core.clock = self.clock;
            let mut ctx = EntityContext::new(&mut slot.core, &self.directory);
            slot.behaviour.shutdown_entity(&mut ctx)?;
            if !slot.core.outbound.is_empty() {
                tracing::debug!(
                    entity = %slot.core.name,
                    dropped = slot.core.outbound.len(),
                    "events sent during shutdown dropped"
                );
                slot.core.outbound.clear();
            }
        }
        Ok(())
    }

    // ── Snapshots ────────────────────────────────────────

    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            clock: self.clock,
            phase: self.phase,
            steps: self.steps,
            abrupt_end: self.abrupt_end,
            queue: self.queue.clone(),
            slots: self.slots.clone(),
            directory: self.directory.clone(),
            trace: self.trace.clone(),
        }
    }

    /// Roll every mutable field back to `snapshot`. The configuration is
    /// kept.
    pub fn restore(&mut self, snapshot: &Snapshot) {
        let snapshot = snapshot.clone();
        self.clock = snapshot.clock;
        self.phase = snapshot.phase;
        self.steps = snapshot.steps;
        self.abrupt_end = snapshot.abrupt_end;
        self.queue = snapshot.queue;
        self.slots = snapshot.slots;
        self.directory = snapshot.directory;
        self.trace = snapshot.trace;
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self::new()
    }
}
