//! `ResourceList` — a keyed collection of resources with arithmetic and a
//! coarse feasibility ordering.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use crate::error::ResourceError;

use super::unit::{Resource, ResourceKind};

/// A mapping from resource name to [`Resource`], one entry per physical
/// unit.
///
/// Backed by a `BTreeMap` so iteration order, and therefore every
/// computation derived from it, is deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct ResourceList {
    entries: BTreeMap<String, Resource>,
}

impl ResourceList {
    /// An empty list.
    pub fn new() -> Self {
        ResourceList {
            entries: BTreeMap::new(),
        }
    }

    /// Insert or replace the entry for `resource.name()`.
    pub fn insert(&mut self, resource: Resource) -> Option<Resource> {
        self.entries.insert(resource.name().to_string(), resource)
    }

    /// Builder form of [`ResourceList::insert`].
    pub fn with(mut self, resource: Resource) -> Self {
        self.insert(resource);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Resource> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Resource> {
        self.entries.values()
    }

    /// Names of all entries, in name order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Subtract every entry of `other` present here by name.
    ///
    /// Entries of `other` with no counterpart are ignored; each one is
    /// reported at debug level and counted in the return value. Entries
    /// whose capacity drops to zero are removed.
    ///
    /// # Panics
    /// Panics on underflow or kind mismatch: both mean some capacity was
    /// handed out twice. Use [`ResourceList::checked_remove`] to inspect
    /// the failure instead.
    pub fn remove(&mut self, other: &ResourceList) -> usize {
        self.checked_remove(other).unwrap_or_else(|e| panic!("{e}"))
    }

    /// Fallible form of [`ResourceList::remove`]. On error `self` is left
    /// untouched.
    pub fn checked_remove(&mut self, other: &ResourceList) -> Result<usize, ResourceError> {
        let mut result = self.entries.clone();
        let mut ignored = 0;
        for res in other.iter() {
            match result.get(res.name()) {
                Some(held) => {
                    let left = held.checked_sub(res)?;
                    if left.is_exhausted() {
                        result.remove(res.name());
                    } else {
                        result.insert(res.name().to_string(), left);
                    }
                }
                None => {
                    ignored += 1;
                    tracing::debug!(
                        resource = %res,
                        "subtracting a resource absent from the list; ignored"
                    );
                }
            }
        }
        self.entries = result;
        Ok(ignored)
    }

    /// Merge every entry of `other` by name, inserting absent ones.
    ///
    /// # Panics
    /// Panics if a name is reused for a different kind.
    pub fn add(&mut self, other: &ResourceList) {
        self.checked_add(other).unwrap_or_else(|e| panic!("{e}"));
    }

    /// Fallible form of [`ResourceList::add`]. On error `self` is left
    /// untouched.
    pub fn checked_add(&mut self, other: &ResourceList) -> Result<(), ResourceError> {
        let mut result = self.entries.clone();
        for res in other.iter() {
            let merged = match result.get(res.name()) {
                Some(held) => held.checked_add(res)?,
                None => res.clone(),
            };
            result.insert(res.name().to_string(), merged);
        }
        self.entries = result;
        Ok(())
    }

    /// Merge `lists` into one, folding them in iteration order.
    ///
    /// Float addition is not associative, so callers that compare totals
    /// must fold the same lists in the same order.
    pub fn sum<'a>(
        lists: impl IntoIterator<Item = &'a ResourceList>,
    ) -> Result<ResourceList, ResourceError> {
        let mut total = ResourceList::new();
        for list in lists {
            total.checked_add(list)?;
        }
        Ok(total)
    }

    /// The entries of a single kind.
    pub fn filter(&self, kind: ResourceKind) -> ResourceList {
        self.iter().filter(|r| r.kind() == kind).cloned().collect()
    }

    /// Sum of capacities of one kind.
    pub fn total_capacity(&self, kind: ResourceKind) -> f64 {
        self.iter()
            .filter(|r| r.kind() == kind)
            .map(Resource::capacity)
            .sum()
    }

    /// Collapse all entries of each kind into one representative entry
    /// named after the kind.
    pub fn aggregate_by_kind(&self) -> BTreeMap<ResourceKind, Resource> {
        let mut result: BTreeMap<ResourceKind, Resource> = BTreeMap::new();
        for res in self.iter() {
            let merged = match result.get(&res.kind()) {
                Some(acc) => acc
                    .aggregate(res)
                    .expect("aggregation is keyed by kind"),
                None => res.renamed(res.kind().label()),
            };
            result.insert(res.kind(), merged);
        }
        result
    }

    /// Coarse "can `self` cover `demand`" comparison.
    ///
    /// Both lists are aggregated by kind and compared kind by kind over the
    /// kinds `demand` mentions. `Less` if `self` lacks one of them or holds
    /// less of it; otherwise `Equal` if some kind matches exactly, else
    /// `Greater`. A zero demand for a kind `self` has run out of matches
    /// exactly, since exhausted entries are dropped rather than kept at
    /// zero. This is not a total order.
    pub fn feasibility_cmp(&self, demand: &ResourceList) -> Ordering {
        let have = self.aggregate_by_kind();
        let want = demand.aggregate_by_kind();
        let mut result = Ordering::Greater;
        for (kind, needed) in &want {
            match have.get(kind) {
                None if needed.is_exhausted() => result = Ordering::Equal,
                None => return Ordering::Less,
                Some(held) => match held.capacity_cmp(needed) {
                    Ordering::Less => return Ordering::Less,
                    Ordering::Equal => result = Ordering::Equal,
                    Ordering::Greater => {}
                },
            }
        }
        result
    }

    /// `true` unless [`ResourceList::feasibility_cmp`] says `Less`.
    pub fn can_satisfy(&self, demand: &ResourceList) -> bool {
        self.feasibility_cmp(demand) != Ordering::Less
    }
}

impl FromIterator<Resource> for ResourceList {
    /// Later entries replace earlier ones with the same name.
    fn from_iter<I: IntoIterator<Item = Resource>>(iter: I) -> Self {
        let mut list = ResourceList::new();
        for res in iter {
            list.insert(res);
        }
        list
    }
}

impl From<Resource> for ResourceList {
    fn from(resource: Resource) -> Self {
        ResourceList::new().with(resource)
    }
}

impl<'a> IntoIterator for &'a ResourceList {
    type Item = &'a Resource;
    type IntoIter = std::collections::btree_map::Values<'a, String, Resource>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.values()
    }
}

impl std::fmt::Display for ResourceList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[")?;
        for (i, res) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", res)?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host_pool() -> ResourceList {
        ResourceList::new()
            .with(Resource::pe("pe0", 1000.0))
            .with(Resource::pe("pe1", 500.0))
            .with(Resource::ram("ram0", 4096.0))
    }

    #[test]
    fn test_remove_replaces_by_name() {
        let mut pool = host_pool();
        let ignored = pool.remove(&ResourceList::from(Resource::ram("ram0", 1024.0)));
        assert_eq!(ignored, 0);
        assert_eq!(pool.get("ram0").unwrap().capacity(), 3072.0);
        assert_eq!(pool.len(), 3);
    }

    #[test]
    fn test_remove_drops_exhausted_entries() {
        let mut pool = host_pool();
        pool.remove(&ResourceList::from(Resource::pe("pe0", 1000.0)));
        assert!(!pool.contains("pe0"));
        assert!(pool.contains("pe1"));
    }

    #[test]
    fn test_remove_ignores_absent_entries_and_counts_them() {
        let mut pool = host_pool();
        let before = pool.clone();
        let ignored = pool.remove(&ResourceList::from(Resource::pe("pe9", 10.0)));
        assert_eq!(ignored, 1);
        assert_eq!(pool, before);
    }

    #[test]
    fn test_checked_remove_underflow_leaves_list_untouched() {
        let mut pool = host_pool();
        let before = pool.clone();
        let bad = ResourceList::new()
            .with(Resource::ram("ram0", 1.0))
            .with(Resource::pe("pe1", 800.0));
        assert!(matches!(
            pool.checked_remove(&bad),
            Err(ResourceError::Underflow { .. })
        ));
        assert_eq!(pool, before);
    }

    #[test]
    #[should_panic(expected = "cannot subtract")]
    fn test_remove_panics_on_underflow() {
        let mut pool = host_pool();
        pool.remove(&ResourceList::from(Resource::pe("pe1", 800.0)));
    }

    #[test]
    fn test_add_merges_and_inserts() {
        let mut pool = host_pool();
        pool.remove(&ResourceList::from(Resource::ram("ram0", 1024.0)));
        pool.add(
            &ResourceList::new()
                .with(Resource::ram("ram0", 1024.0))
                .with(Resource::storage("disk0", 10.0)),
        );
        assert_eq!(pool.get("ram0").unwrap().capacity(), 4096.0);
        assert!(pool.contains("disk0"));
    }

    #[test]
    fn test_add_rejects_kind_reuse() {
        let mut pool = host_pool();
        let err = pool
            .checked_add(&ResourceList::from(Resource::ram("pe0", 1.0)))
            .unwrap_err();
        assert!(matches!(err, ResourceError::KindMismatch { .. }));
    }

    #[test]
    fn test_filter_by_kind() {
        let pes = host_pool().filter(ResourceKind::Pe);
        assert_eq!(pes.len(), 2);
        assert!(pes.iter().all(|r| r.kind() == ResourceKind::Pe));
    }

    #[test]
    fn test_aggregate_by_kind() {
        let agg = host_pool().aggregate_by_kind();
        assert_eq!(agg.len(), 2);
        assert_eq!(agg[&ResourceKind::Pe].capacity(), 1500.0);
        assert_eq!(agg[&ResourceKind::Pe].name(), "pe");
        assert_eq!(agg[&ResourceKind::Ram].capacity(), 4096.0);
    }

    #[test]
    fn test_feasibility_cmp() {
        let pool = host_pool();
        let small = ResourceList::from(Resource::pe("vm-pe0", 800.0));
        let exact = ResourceList::new()
            .with(Resource::pe("a", 1000.0))
            .with(Resource::pe("b", 500.0));
        let too_big = ResourceList::from(Resource::pe("vm-pe0", 2000.0));
        let missing_kind = ResourceList::from(Resource::storage("disk", 1.0));

        assert_eq!(pool.feasibility_cmp(&small), Ordering::Greater);
        assert_eq!(pool.feasibility_cmp(&exact), Ordering::Equal);
        assert_eq!(pool.feasibility_cmp(&too_big), Ordering::Less);
        assert_eq!(pool.feasibility_cmp(&missing_kind), Ordering::Less);
        assert!(pool.can_satisfy(&ResourceList::new()));
        assert!(!pool.can_satisfy(&missing_kind));
    }

    #[test]
    fn test_zero_demand_matches_exhausted_kind() {
        let mut pool = host_pool();
        pool.remove(&ResourceList::from(Resource::ram("ram0", 4096.0)));
        assert!(!pool.contains("ram0"));

        let zero_ram = ResourceList::new()
            .with(Resource::pe("vm-pe0", 100.0))
            .with(Resource::ram("vm-ram", 0.0));
        assert_eq!(pool.feasibility_cmp(&zero_ram), Ordering::Equal);
        assert!(pool.can_satisfy(&zero_ram));
        assert!(!pool.can_satisfy(&ResourceList::from(Resource::ram("vm-ram", 1.0))));
    }

    #[test]
    fn test_sum_merges_by_name_in_order() {
        let a = ResourceList::from(Resource::ram("ram0", 0.1));
        let b = ResourceList::new()
            .with(Resource::ram("ram0", 0.9))
            .with(Resource::pe("pe0", 1000.0));
        let total = ResourceList::sum([&a, &b]).unwrap();
        assert_eq!(total.get("ram0").unwrap().capacity(), 0.1 + 0.9);
        assert!(total.contains("pe0"));

        let clash = ResourceList::from(Resource::pe("ram0", 1.0));
        assert!(ResourceList::sum([&a, &clash]).is_err());
    }

    #[test]
    fn test_total_capacity() {
        assert_eq!(host_pool().total_capacity(ResourceKind::Pe), 1500.0);
        assert_eq!(host_pool().total_capacity(ResourceKind::Storage), 0.0);
    }
}
