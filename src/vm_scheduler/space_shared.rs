//! Space-shared VM scheduling: each processing element is bound whole to
//! at most one VM, first-fit in host order, all-or-nothing.

use std::collections::BTreeMap;

use crate::resource::{Resource, ResourceKind, ResourceList};

use super::{VmId, VmScheduler};

/// Exclusive, non-preemptive allocation of processing elements.
///
/// A VM's PE demand entries are bound, in request order, to the first free
/// PE (in the order the host listed them) whose rated speed covers the
/// entry's required speed. The bound PEs are granted at their full rated
/// capacity and leave the free pool until the VM is deallocated.
///
/// Demand for divisible kinds (memory, bandwidth, storage) is carved as a
/// slice out of the first same-kind pool entry with enough room left. The
/// slice carries that entry's name so the pool arithmetic stays exact.
#[derive(Debug, Clone, PartialEq)]
pub struct SpaceShared {
    resources: ResourceList,
    /// PE names in the order the host listed them.
    pe_order: Vec<String>,
    /// PEs not bound to any VM, in host order.
    free_pes: Vec<String>,
    allocations: BTreeMap<VmId, ResourceList>,
}

/// Outcome of planning a request against the current free pool.
struct Plan {
    bound_pes: Vec<String>,
    granted: ResourceList,
}

impl SpaceShared {
    /// Create a scheduler over `resources`, keeping the PEs in the given
    /// order as the scan order.
    pub fn new(resources: impl IntoIterator<Item = Resource>) -> Self {
        let mut pool = ResourceList::new();
        let mut pe_order: Vec<String> = Vec::new();
        for res in resources {
            if res.kind() == ResourceKind::Pe && !pe_order.iter().any(|n| n == res.name()) {
                pe_order.push(res.name().to_string());
            }
            pool.insert(res);
        }
        SpaceShared {
            resources: pool,
            free_pes: pe_order.clone(),
            pe_order,
            allocations: BTreeMap::new(),
        }
    }

    /// Number of PEs on the host.
    pub fn pe_count(&self) -> usize {
        self.pe_order.len()
    }

    /// Number of PEs not bound to any VM.
    pub fn free_pe_count(&self) -> usize {
        self.free_pes.len()
    }

    /// Names of the free PEs, in scan order.
    pub fn free_pes(&self) -> impl Iterator<Item = &str> {
        self.free_pes.iter().map(String::as_str)
    }

    /// Work out which units `requested` would receive, without touching
    /// any state. `None` if some demand entry cannot be placed.
    fn plan(&self, requested: &ResourceList, available: &ResourceList) -> Option<Plan> {
        let mut free: Vec<&str> = self.free_pes().collect();
        let mut bound_pes = Vec::new();
        let mut granted = ResourceList::new();

        for demand in requested.iter().filter(|r| r.kind() == ResourceKind::Pe) {
            let pos = free.iter().position(|name| {
                self.resources
                    .get(name)
                    .is_some_and(|pe| pe.speed() >= demand.speed())
            })?;
            let name = free.remove(pos);
            granted.insert(self.resources.get(name)?.clone());
            bound_pes.push(name.to_string());
        }

        let mut remaining = available.clone();
        for demand in requested.iter().filter(|r| r.kind() != ResourceKind::Pe) {
            let slice = remaining
                .iter()
                .find(|r| r.kind() == demand.kind() && r.capacity() >= demand.capacity())?
                .with_capacity(demand.capacity());
            let slice = ResourceList::from(slice);
            remaining.checked_remove(&slice).ok()?;
            granted.checked_add(&slice).ok()?;
        }

        Some(Plan { bound_pes, granted })
    }

    /// Whether `allocations` leaves every unit's summed grant within the
    /// pool, folding grants the same way [`VmScheduler::granted_total`]
    /// does. The planning step works against a rounded remainder and can
    /// admit a slice a few ulps too large; this catches it.
    fn fits_pool(&self, allocations: &BTreeMap<VmId, ResourceList>) -> bool {
        ResourceList::sum(allocations.values())
            .and_then(|total| self.resources.clone().checked_remove(&total))
            .is_ok()
    }
}

impl VmScheduler for SpaceShared {
    fn resources(&self) -> &ResourceList {
        &self.resources
    }

    fn allocations(&self) -> &BTreeMap<VmId, ResourceList> {
        &self.allocations
    }

    fn allocate(&mut self, vm: VmId, requested: &ResourceList) -> bool {
        if self.allocations.contains_key(&vm) {
            tracing::warn!(%vm, "vm already holds an allocation on this host; rejected");
            return false;
        }

        let available = self.available();
        if !available.can_satisfy(requested) {
            tracing::debug!(%vm, %requested, %available, "not enough free capacity");
            return false;
        }

        let Some(plan) = self.plan(requested, &available) else {
            tracing::debug!(%vm, %requested, "no free processing element fits the request");
            return false;
        };

        let mut committed = self.allocations.clone();
        committed.insert(vm, plan.granted);
        if !self.fits_pool(&committed) {
            tracing::debug!(%vm, %requested, "request exceeds the pool once rounding is settled");
            return false;
        }

        self.free_pes.retain(|name| !plan.bound_pes.contains(name));
        tracing::debug!(%vm, granted = %committed[&vm], "allocated");
        self.allocations = committed;
        true
    }

    fn deallocate(&mut self, vm: VmId) {
        let Some(granted) = self.allocations.remove(&vm) else {
            return;
        };
        let free: Vec<String> = self
            .pe_order
            .iter()
            .filter(|name| self.free_pes.contains(name) || granted.contains(name))
            .cloned()
            .collect();
        self.free_pes = free;
        tracing::debug!(%vm, released = %granted, "deallocated");
    }

    fn deallocate_all(&mut self) {
        self.allocations.clear();
        self.free_pes = self.pe_order.clone();
    }

    fn clone_scheduler(&self) -> Box<dyn VmScheduler> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    fn two_pe_host() -> SpaceShared {
        SpaceShared::new([Resource::pe("pe0", 1000.0), Resource::pe("pe1", 500.0)])
    }

    fn demand(speeds: &[f64]) -> ResourceList {
        speeds
            .iter()
            .enumerate()
            .map(|(i, s)| Resource::pe(format!("vm-pe{i}"), *s))
            .collect()
    }

    /// Per unit, what is left plus what is granted equals the pool, up to
    /// float rounding on sliced kinds. PEs move whole, so they match
    /// exactly.
    fn conservation_gap(sched: &SpaceShared) -> Option<String> {
        let available = sched.available();
        let granted = sched.granted_total();
        for name in available.names().chain(granted.names()) {
            if !sched.resources().contains(name) {
                return Some(format!("{name} is not part of the pool"));
            }
        }
        for unit in sched.resources().iter() {
            let left = available.get(unit.name()).map_or(0.0, Resource::capacity);
            let out = granted.get(unit.name()).map_or(0.0, Resource::capacity);
            let exact = unit.kind() == ResourceKind::Pe;
            let tolerance = if exact { 0.0 } else { 1e-9 * unit.capacity().max(1.0) };
            if (left + out - unit.capacity()).abs() > tolerance {
                return Some(format!(
                    "{}: {left} left + {out} granted != {}",
                    unit.name(),
                    unit.capacity()
                ));
            }
        }
        None
    }

    fn assert_conserved(sched: &SpaceShared) {
        assert_eq!(conservation_gap(sched), None);
    }

    #[test]
    fn test_single_demand_binds_faster_pe() {
        let mut sched = two_pe_host();
        assert!(sched.allocate(VmId::new(1), &demand(&[800.0])));

        let available = sched.available();
        assert_eq!(available.len(), 1);
        assert_eq!(available.get("pe1").unwrap().capacity(), 500.0);

        let granted = sched.allocated_for(VmId::new(1));
        assert_eq!(granted.get("pe0").unwrap().capacity(), 1000.0);
        assert_conserved(&sched);
    }

    #[test]
    fn test_two_fast_demands_fail_and_leave_pool_unchanged() {
        let mut sched = two_pe_host();
        let before = sched.clone();
        assert!(!sched.allocate(VmId::new(1), &demand(&[1000.0, 1000.0])));
        assert_eq!(sched, before);
    }

    #[test]
    fn test_binding_failure_after_feasible_aggregate_is_all_or_nothing() {
        // Aggregate 1500 >= 1200, but only one PE is rated >= 600.
        let mut sched = two_pe_host();
        let before = sched.clone();
        assert!(!sched.allocate(VmId::new(1), &demand(&[600.0, 600.0])));
        assert_eq!(sched, before);
    }

    #[test]
    fn test_first_fit_in_host_order() {
        let mut sched = SpaceShared::new([
            Resource::pe("pe2", 1000.0),
            Resource::pe("pe0", 1000.0),
            Resource::pe("pe1", 1000.0),
        ]);
        assert!(sched.allocate(VmId::new(1), &demand(&[100.0])));
        assert!(sched.allocated_for(VmId::new(1)).contains("pe2"));
        assert_eq!(sched.free_pes().collect::<Vec<_>>(), vec!["pe0", "pe1"]);
    }

    #[test]
    fn test_deallocate_returns_pes_in_host_order() {
        let mut sched = two_pe_host();
        assert!(sched.allocate(VmId::new(1), &demand(&[100.0])));
        assert!(sched.allocate(VmId::new(2), &demand(&[100.0])));
        assert_eq!(sched.free_pe_count(), 0);

        sched.deallocate(VmId::new(1));
        assert_eq!(sched.free_pes().collect::<Vec<_>>(), vec!["pe0"]);
        sched.deallocate(VmId::new(2));
        assert_eq!(sched.free_pes().collect::<Vec<_>>(), vec!["pe0", "pe1"]);
    }

    #[test]
    fn test_freed_pe_is_reused_immediately() {
        let mut sched = two_pe_host();
        assert!(sched.allocate(VmId::new(1), &demand(&[900.0])));
        assert!(!sched.allocate(VmId::new(2), &demand(&[900.0])));
        sched.deallocate(VmId::new(1));
        assert!(sched.allocate(VmId::new(2), &demand(&[900.0])));
    }

    #[test]
    fn test_deallocate_is_idempotent() {
        let mut sched = two_pe_host();
        assert!(sched.allocate(VmId::new(1), &demand(&[100.0])));
        sched.deallocate(VmId::new(1));
        let once = sched.clone();
        sched.deallocate(VmId::new(1));
        assert_eq!(sched, once);
    }

    #[test]
    fn test_round_trip_restores_available() {
        let mut sched = two_pe_host();
        let before = sched.available();
        assert!(sched.allocate(VmId::new(7), &demand(&[400.0])));
        sched.deallocate(VmId::new(7));
        assert_eq!(sched.available(), before);
    }

    #[test]
    fn test_second_allocation_for_same_vm_is_rejected() {
        let mut sched = two_pe_host();
        assert!(sched.allocate(VmId::new(1), &demand(&[100.0])));
        let before = sched.clone();
        assert!(!sched.allocate(VmId::new(1), &demand(&[100.0])));
        assert_eq!(sched, before);
    }

    #[test]
    fn test_deallocate_all() {
        let mut sched = two_pe_host();
        assert!(sched.allocate(VmId::new(1), &demand(&[100.0])));
        assert!(sched.allocate(VmId::new(2), &demand(&[100.0])));
        sched.deallocate_all();
        assert!(sched.hosted_vms().is_empty());
        assert_eq!(sched.available(), *sched.resources());
        assert_eq!(sched.free_pe_count(), 2);
    }

    #[test]
    fn test_allocated_for_unknown_vm_is_empty() {
        assert!(two_pe_host().allocated_for(VmId::new(3)).is_empty());
    }

    #[test]
    fn test_memory_is_sliced() {
        let mut sched = SpaceShared::new([
            Resource::pe("pe0", 1000.0),
            Resource::pe("pe1", 1000.0),
            Resource::ram("ram0", 4096.0),
        ]);
        let req = |i: usize| {
            ResourceList::new()
                .with(Resource::pe(format!("vm{i}-pe"), 500.0))
                .with(Resource::ram(format!("vm{i}-ram"), 2048.0))
        };
        assert!(sched.allocate(VmId::new(1), &req(1)));
        assert_eq!(
            sched.allocated_for(VmId::new(1)).get("ram0").unwrap().capacity(),
            2048.0
        );
        assert!(sched.allocate(VmId::new(2), &req(2)));
        assert!(sched.available_of(ResourceKind::Ram).is_empty());
        assert_conserved(&sched);

        sched.deallocate(VmId::new(1));
        assert_eq!(
            sched.available_of(ResourceKind::Ram).get("ram0").unwrap().capacity(),
            2048.0
        );
        assert_conserved(&sched);
    }

    #[test]
    fn test_fractional_slices_fill_memory_in_any_order() {
        let mut sched = SpaceShared::new([Resource::pe("pe0", 1000.0), Resource::ram("ram0", 1.0)]);
        assert!(sched.allocate(VmId::new(2), &ResourceList::from(Resource::ram("m", 0.1))));
        assert!(sched.allocate(VmId::new(1), &ResourceList::from(Resource::ram("m", 0.9))));

        let available = sched.available();
        assert!(available.get("ram0").map_or(true, |r| r.capacity() < 1e-9));
        assert_conserved(&sched);

        sched.deallocate(VmId::new(1));
        let left = sched.available_of(ResourceKind::Ram);
        assert!((left.get("ram0").unwrap().capacity() - 0.9).abs() < 1e-12);
        assert_conserved(&sched);
    }

    #[test]
    fn test_many_small_slices_never_overbook() {
        let mut sched = SpaceShared::new([Resource::ram("ram0", 1.0)]);
        let mut granted = 0;
        for vm in (0..12).rev() {
            if sched.allocate(VmId::new(vm), &ResourceList::from(Resource::ram("m", 0.1))) {
                granted += 1;
            }
            assert_conserved(&sched);
        }
        assert!((9..=10).contains(&granted));
        assert!(sched.resources().clone().checked_remove(&sched.granted_total()).is_ok());
    }

    #[test]
    fn test_missing_kind_is_infeasible() {
        let mut sched = two_pe_host();
        let req = ResourceList::from(Resource::storage("disk", 1.0));
        assert!(!sched.allocate(VmId::new(1), &req));
    }

    #[test_case(&[] ; "empty demand")]
    #[test_case(&[500.0] ; "exact rating")]
    #[test_case(&[1000.0, 500.0] ; "whole host")]
    fn test_feasible_requests(speeds: &[f64]) {
        let mut sched = two_pe_host();
        assert!(sched.allocate(VmId::new(1), &demand(speeds)));
        assert_eq!(sched.free_pe_count(), 2 - speeds.len());
        assert_conserved(&sched);
    }

    #[test]
    fn test_clone_scheduler_is_independent() {
        let mut sched = two_pe_host();
        let copy = sched.clone_scheduler();
        assert!(sched.allocate(VmId::new(1), &demand(&[100.0])));
        assert!(copy.hosted_vms().is_empty());
    }

    #[derive(Debug, Clone)]
    enum Op {
        /// `(vm, pe ratings in hundreds, ram slice in tenths)`
        Allocate(u64, Vec<u32>, Option<u32>),
        Deallocate(u64),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (
                0u64..6,
                prop::collection::vec(1u32..20, 0..4),
                prop::option::of(1u32..10),
            )
                .prop_map(|(vm, speeds, ram)| Op::Allocate(vm, speeds, ram)),
            (0u64..6).prop_map(Op::Deallocate),
        ]
    }

    proptest! {
        #[test]
        fn allocation_is_conserved_and_atomic(
            pe_speeds in prop::collection::vec(1u32..20, 1..6),
            ops in prop::collection::vec(op(), 1..40),
        ) {
            let mut sched = SpaceShared::new(
                pe_speeds
                    .iter()
                    .enumerate()
                    .map(|(i, s)| Resource::pe(format!("pe{i}"), f64::from(*s) * 100.0))
                    .chain([Resource::ram("ram0", 1.0)]),
            );

            for op in ops {
                match op {
                    Op::Allocate(vm, speeds, ram) => {
                        let before = sched.clone();
                        let req: ResourceList = speeds
                            .iter()
                            .enumerate()
                            .map(|(i, s)| Resource::pe(format!("d{i}"), f64::from(*s) * 100.0))
                            .chain(ram.map(|t| Resource::ram("m", f64::from(t) / 10.0)))
                            .collect();
                        if !sched.allocate(VmId::new(vm), &req) {
                            prop_assert_eq!(&sched, &before);
                        }
                    }
                    Op::Deallocate(vm) => {
                        let before = sched.available();
                        let was_hosted = sched.is_hosting(VmId::new(vm));
                        sched.deallocate(VmId::new(vm));
                        if !was_hosted {
                            prop_assert_eq!(sched.available(), before);
                        }
                    }
                }

                prop_assert_eq!(conservation_gap(&sched), None);
                prop_assert_eq!(
                    sched.free_pe_count(),
                    sched.available_of(ResourceKind::Pe).len()
                );
            }
        }
    }
}
