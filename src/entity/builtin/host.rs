//! `Host` — a physical machine that hands its resources to VMs.

use crate::entity::context::EntityContext;
use crate::entity::traits::SimEntity;
use crate::error::SimResult;
use crate::event::{Event, Payload, Tag};
use crate::resource::{ResourceKind, ResourceList};
use crate::vm_scheduler::{VmId, VmScheduler};

/// An entity owning a [`VmScheduler`].
///
/// The direct methods forward to the scheduler and add nothing but a few
/// aggregate queries. As an entity it serves VM and resource requests:
///
/// | Request | Payload in | Reply | Payload out |
/// |---|---|---|---|
/// | `VmCreate` | `VmRequest` | `VmCreateAck` | `VmAck` |
/// | `VmDestroy` | `VmRequest` (demand ignored) | `VmDestroyAck` | `VmAck` |
/// | `ResourceNumPe` | any | `ResourceNumPe` | `Count` |
/// | `ResourceNumFreePe` | any | `ResourceNumFreePe` | `Count` |
/// | `ResourceCharacteristics` | any | `ResourceCharacteristics` | `Resources` |
///
/// Replies go back to the sender with zero delay.
#[derive(Debug, Clone)]
pub struct Host {
    scheduler: Box<dyn VmScheduler>,
}

impl Host {
    pub fn new(scheduler: impl VmScheduler + 'static) -> Self {
        Host {
            scheduler: Box::new(scheduler),
        }
    }

    pub fn scheduler(&self) -> &dyn VmScheduler {
        &*self.scheduler
    }

    pub fn allocate_res_for_vm(&mut self, vm: VmId, requested: &ResourceList) -> bool {
        self.scheduler.allocate(vm, requested)
    }

    pub fn deallocate_res_for_vm(&mut self, vm: VmId) {
        self.scheduler.deallocate(vm);
    }

    pub fn deallocate_all(&mut self) {
        self.scheduler.deallocate_all();
    }

    pub fn allocated_res_for_vm(&self, vm: VmId) -> ResourceList {
        self.scheduler.allocated_for(vm)
    }

    pub fn available_res(&self) -> ResourceList {
        self.scheduler.available()
    }

    pub fn number_of_pes(&self) -> usize {
        self.scheduler.resources().filter(ResourceKind::Pe).len()
    }

    /// PEs not bound to any VM.
    pub fn number_of_free_pes(&self) -> usize {
        self.scheduler.available_of(ResourceKind::Pe).len()
    }

    /// Combined rating of every PE on the host.
    pub fn total_mips(&self) -> f64 {
        self.scheduler.resources().total_capacity(ResourceKind::Pe)
    }

    /// Combined rating of the PEs bound to `vm`.
    pub fn total_allocated_mips_for_vm(&self, vm: VmId) -> f64 {
        self.scheduler.allocated_for(vm).total_capacity(ResourceKind::Pe)
    }

    /// Highest rating among the free PEs, `0.0` when none is free.
    pub fn max_available_mips(&self) -> f64 {
        self.scheduler
            .available_of(ResourceKind::Pe)
            .iter()
            .map(|pe| pe.capacity())
            .fold(0.0, f64::max)
    }
}

impl SimEntity for Host {
    fn process_event(&mut self, ctx: &mut EntityContext<'_>, event: Event) -> SimResult<()> {
        let tag = event.tag();
        let reply = match (tag, event.payload()) {
            (Tag::VmCreate, Payload::VmRequest { vm, demand }) => {
                let success = self.allocate_res_for_vm(*vm, demand);
                tracing::debug!(host = ctx.name(), %vm, success, "vm create");
                Some((Tag::VmCreateAck, Payload::VmAck { vm: *vm, success }))
            }
            (Tag::VmDestroy, Payload::VmRequest { vm, .. }) => {
                let success = self.scheduler.is_hosting(*vm);
                self.deallocate_res_for_vm(*vm);
                tracing::debug!(host = ctx.name(), %vm, success, "vm destroy");
                Some((Tag::VmDestroyAck, Payload::VmAck { vm: *vm, success }))
            }
            (Tag::VmCreate | Tag::VmDestroy, other) => {
                return Err(ctx.error(format!("{tag} expects a VmRequest payload, got {other}")));
            }
            (Tag::ResourceNumPe, _) => Some((tag, Payload::Count(self.number_of_pes()))),
            (Tag::ResourceNumFreePe, _) => Some((tag, Payload::Count(self.number_of_free_pes()))),
            (Tag::ResourceCharacteristics, _) => {
                Some((tag, Payload::Resources(self.available_res())))
            }
            _ => {
                tracing::debug!(host = ctx.name(), %tag, "ignored");
                None
            }
        };

        if let Some((tag, payload)) = reply {
            match event.source() {
                Some(requester) => ctx.send_now(requester, tag, payload)?,
                None => tracing::debug!(host = ctx.name(), %tag, "no requester to reply to"),
            }
        }
        Ok(())
    }

    fn shutdown_entity(&mut self, ctx: &mut EntityContext<'_>) -> SimResult<()> {
        let hosted = self.scheduler.hosted_vms();
        if !hosted.is_empty() {
            tracing::info!(host = ctx.name(), vms = hosted.len(), "releasing vms at shutdown");
        }
        self.deallocate_all();
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::Resource;
    use crate::vm_scheduler::SpaceShared;

    fn host() -> Host {
        Host::new(SpaceShared::new([
            Resource::pe("pe0", 1000.0),
            Resource::pe("pe1", 500.0),
            Resource::ram("ram0", 2048.0),
        ]))
    }

    #[test]
    fn test_forwarding_and_aggregates() {
        let mut h = host();
        assert_eq!(h.number_of_pes(), 2);
        assert_eq!(h.number_of_free_pes(), 2);
        assert_eq!(h.total_mips(), 1500.0);

        let vm = VmId::new(1);
        assert!(h.allocate_res_for_vm(vm, &ResourceList::from(Resource::pe("d0", 800.0))));
        assert_eq!(h.number_of_free_pes(), 1);
        assert!(h.allocated_res_for_vm(vm).contains("pe0"));
        assert!(!h.available_res().contains("pe0"));

        h.deallocate_res_for_vm(vm);
        assert_eq!(h.number_of_free_pes(), 2);
        assert!(h.allocated_res_for_vm(vm).is_empty());
    }

    #[test]
    fn test_mips_aggregates_track_bindings() {
        let mut h = host();
        assert_eq!(h.max_available_mips(), 1000.0);
        assert_eq!(h.total_allocated_mips_for_vm(VmId::new(1)), 0.0);

        let vm = VmId::new(1);
        let demand = ResourceList::new()
            .with(Resource::pe("d0", 800.0))
            .with(Resource::ram("m", 1024.0));
        assert!(h.allocate_res_for_vm(vm, &demand));
        assert_eq!(h.total_allocated_mips_for_vm(vm), 1000.0);
        assert_eq!(h.max_available_mips(), 500.0);

        assert!(h.allocate_res_for_vm(VmId::new(2), &ResourceList::from(Resource::pe("d0", 100.0))));
        assert_eq!(h.max_available_mips(), 0.0);
    }

    #[test]
    fn test_clone_is_deep() {
        let mut h = host();
        let copy = h.clone();
        h.allocate_res_for_vm(VmId::new(1), &ResourceList::from(Resource::pe("d0", 100.0)));
        assert_eq!(copy.number_of_free_pes(), 2);
        assert_eq!(h.number_of_free_pes(), 1);
    }
}
