//! VM allocation policies.
//!
//! A [`VmScheduler`] owns a host's resource pool and the map of what each
//! hosted VM was granted. Hosts call into it; nothing else writes to it.
//!
//! | Sub-module | Contents |
//! |---|---|
//! | [`space_shared`] | [`SpaceShared`] — exclusive, first-fit PE binding |

pub mod space_shared;

use std::collections::BTreeMap;

use crate::resource::{ResourceKind, ResourceList};

pub use space_shared::SpaceShared;

// ── VmId ──────────────────────────────────────────────────────────────

/// Identifier of a virtual machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct VmId(u64);

impl VmId {
    #[inline]
    pub fn new(id: u64) -> Self {
        VmId(id)
    }

    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for VmId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "vm{}", self.0)
    }
}

// ── VmScheduler ───────────────────────────────────────────────────────

/// The policy a host uses to partition its resources among VMs.
///
/// Implementations own two pieces of state: the host's total pool
/// ([`VmScheduler::resources`]) and the per-VM granted lists
/// ([`VmScheduler::allocations`]). Everything else is derived on demand.
///
/// # Contract
///
/// - `allocate` returns `false` and leaves all state untouched when the
///   request cannot be met. Infeasibility is not an error.
/// - `deallocate` of an unknown VM is a no-op.
/// - At all times the granted lists plus [`VmScheduler::available`] add up
///   to the total pool, and [`VmScheduler::granted_total`] never exceeds
///   it, so computing `available` cannot underflow.
pub trait VmScheduler {
    /// The host's total resource pool.
    fn resources(&self) -> &ResourceList;

    /// Read-only view of every current grant.
    fn allocations(&self) -> &BTreeMap<VmId, ResourceList>;

    /// Try to grant `requested` to `vm`.
    fn allocate(&mut self, vm: VmId, requested: &ResourceList) -> bool;

    /// Release everything granted to `vm`.
    fn deallocate(&mut self, vm: VmId);

    /// Release every grant.
    fn deallocate_all(&mut self);

    /// Boxed copy of this scheduler, used by simulation snapshots.
    fn clone_scheduler(&self) -> Box<dyn VmScheduler>;

    /// Every current grant merged per unit, folded in VM id order.
    ///
    /// # Panics
    /// Panics if two grants disagree on the kind of a unit.
    fn granted_total(&self) -> ResourceList {
        ResourceList::sum(self.allocations().values()).unwrap_or_else(|e| panic!("{e}"))
    }

    /// Total pool minus [`VmScheduler::granted_total`], recomputed on each
    /// call. Each unit is reduced once by its summed grant, so the result
    /// does not depend on the order grants were made in.
    fn available(&self) -> ResourceList {
        let mut result = self.resources().clone();
        result.remove(&self.granted_total());
        result
    }

    /// [`VmScheduler::available`] restricted to one kind.
    fn available_of(&self, kind: ResourceKind) -> ResourceList {
        self.available().filter(kind)
    }

    /// The list last granted to `vm`, or an empty list.
    fn allocated_for(&self, vm: VmId) -> ResourceList {
        self.allocations().get(&vm).cloned().unwrap_or_default()
    }

    /// Whether `vm` currently holds a grant.
    fn is_hosting(&self, vm: VmId) -> bool {
        self.allocations().contains_key(&vm)
    }

    /// Every VM with a grant, in id order.
    fn hosted_vms(&self) -> Vec<VmId> {
        self.allocations().keys().copied().collect()
    }
}

impl Clone for Box<dyn VmScheduler> {
    fn clone(&self) -> Self {
        self.clone_scheduler()
    }
}

impl std::fmt::Debug for dyn VmScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VmScheduler")
            .field("resources", self.resources())
            .field("allocations", self.allocations())
            .finish()
    }
}
