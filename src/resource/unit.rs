//! A single named resource quantity and its kind-specific arithmetic.

use std::cmp::Ordering;

use crate::error::ResourceError;

// ── ResourceKind ──────────────────────────────────────────────────────

/// The closed set of resource kinds a host can offer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub enum ResourceKind {
    /// A processing element, rated in MIPS.
    Pe,
    /// A block of memory.
    Ram,
    /// Network bandwidth.
    Bandwidth,
    /// Persistent storage.
    Storage,
}

impl ResourceKind {
    /// Every kind, in aggregation order.
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Pe,
        ResourceKind::Ram,
        ResourceKind::Bandwidth,
        ResourceKind::Storage,
    ];

    /// Short lowercase label, also used as the name of aggregated entries.
    pub fn label(self) -> &'static str {
        match self {
            ResourceKind::Pe => "pe",
            ResourceKind::Ram => "ram",
            ResourceKind::Bandwidth => "bw",
            ResourceKind::Storage => "storage",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

// ── Resource ──────────────────────────────────────────────────────────

/// A named, typed quantity: capacity, speed and latency.
///
/// Two resources denote the same physical unit iff they share both kind
/// and name (see [`Resource::same_as`]). Arithmetic between views of the
/// same unit moves `capacity`; how `speed` and `latency` settle depends on
/// the kind (see [`Resource::checked_add`]).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Resource {
    kind: ResourceKind,
    name: String,
    capacity: f64,
    speed: f64,
    latency: f64,
}

impl Resource {
    /// Create a resource with zero latency.
    pub fn new(kind: ResourceKind, name: impl Into<String>, capacity: f64, speed: f64) -> Self {
        Resource {
            kind,
            name: name.into(),
            capacity,
            speed,
            latency: 0.0,
        }
    }

    /// A processing element whose capacity and rating are both `mips`.
    pub fn pe(name: impl Into<String>, mips: f64) -> Self {
        Resource::new(ResourceKind::Pe, name, mips, mips)
    }

    /// A memory block of `capacity` units.
    pub fn ram(name: impl Into<String>, capacity: f64) -> Self {
        Resource::new(ResourceKind::Ram, name, capacity, 0.0)
    }

    /// A link offering `capacity` units of throughput at line rate `capacity`.
    pub fn bandwidth(name: impl Into<String>, capacity: f64) -> Self {
        Resource::new(ResourceKind::Bandwidth, name, capacity, capacity)
    }

    /// A storage device of `capacity` units.
    pub fn storage(name: impl Into<String>, capacity: f64) -> Self {
        Resource::new(ResourceKind::Storage, name, capacity, 0.0)
    }

    /// Same resource with the given access latency.
    pub fn with_latency(mut self, latency: f64) -> Self {
        self.latency = latency;
        self
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn latency(&self) -> f64 {
        self.latency
    }

    /// `true` iff both resources denote the same physical unit.
    pub fn same_as(&self, other: &Resource) -> bool {
        self.kind == other.kind && self.name == other.name
    }

    /// `true` once no capacity is left.
    pub fn is_exhausted(&self) -> bool {
        self.capacity <= 0.0
    }

    /// Order two resources by capacity.
    pub fn capacity_cmp(&self, other: &Resource) -> Ordering {
        self.capacity.total_cmp(&other.capacity)
    }

    /// A copy of this resource under a different name (used for slices
    /// and aggregated entries).
    pub fn renamed(&self, name: impl Into<String>) -> Resource {
        Resource {
            name: name.into(),
            ..self.clone()
        }
    }

    /// A copy of this resource holding `capacity` instead.
    pub fn with_capacity(&self, capacity: f64) -> Resource {
        Resource {
            capacity,
            ..self.clone()
        }
    }

    /// Merge another view of the same unit into this one.
    ///
    /// Capacity sums. A PE keeps the higher of the two speed ratings, a
    /// bandwidth link the higher line rate, and memory or storage the
    /// higher access latency. Views cut from one unit carry identical
    /// attributes, so merging them back restores the unit exactly.
    pub fn checked_add(&self, other: &Resource) -> Result<Resource, ResourceError> {
        self.ensure_same(other)?;
        let (speed, latency) = match self.kind {
            ResourceKind::Pe | ResourceKind::Bandwidth => {
                (self.speed.max(other.speed), self.latency)
            }
            ResourceKind::Ram | ResourceKind::Storage => {
                (self.speed, self.latency.max(other.latency))
            }
        };
        Ok(Resource {
            capacity: self.capacity + other.capacity,
            speed,
            latency,
            ..self.clone()
        })
    }

    /// Take capacity out of the same unit. Taking more than is held is an
    /// [`ResourceError::Underflow`], never a negative quantity.
    ///
    /// The remainder keeps this unit's attributes, except that a PE left
    /// with no capacity also reports no speed: an exhausted PE can run
    /// nothing.
    pub fn checked_sub(&self, other: &Resource) -> Result<Resource, ResourceError> {
        self.ensure_same(other)?;
        if other.capacity > self.capacity {
            return Err(ResourceError::Underflow {
                name: self.name.clone(),
                held: self.capacity,
                requested: other.capacity,
            });
        }
        let capacity = self.capacity - other.capacity;
        let speed = match self.kind {
            ResourceKind::Pe if capacity <= 0.0 => 0.0,
            ResourceKind::Pe
            | ResourceKind::Bandwidth
            | ResourceKind::Ram
            | ResourceKind::Storage => self.speed,
        };
        Ok(Resource {
            capacity,
            speed,
            ..self.clone()
        })
    }

    /// Fold a *different* unit of the same kind into `self`, producing one
    /// representative entry for the pair.
    ///
    /// Capacities always sum. The remaining attributes follow the kind:
    /// a PE aggregate is rated at its fastest unit, bandwidth line rates
    /// add up, and memory or storage report their slowest access latency.
    pub fn aggregate(&self, other: &Resource) -> Result<Resource, ResourceError> {
        if self.kind != other.kind {
            return Err(ResourceError::KindMismatch {
                name: other.name.clone(),
                left: self.kind,
                right: other.kind,
            });
        }
        let (speed, latency) = match self.kind {
            ResourceKind::Pe => (self.speed.max(other.speed), self.latency.max(other.latency)),
            ResourceKind::Bandwidth => (self.speed + other.speed, self.latency.max(other.latency)),
            ResourceKind::Ram | ResourceKind::Storage => {
                (self.speed.min(other.speed), self.latency.max(other.latency))
            }
        };
        Ok(Resource {
            kind: self.kind,
            name: self.name.clone(),
            capacity: self.capacity + other.capacity,
            speed,
            latency,
        })
    }

    fn ensure_same(&self, other: &Resource) -> Result<(), ResourceError> {
        if self.kind != other.kind {
            return Err(ResourceError::KindMismatch {
                name: self.name.clone(),
                left: self.kind,
                right: other.kind,
            });
        }
        if self.name != other.name {
            return Err(ResourceError::NameMismatch {
                left: self.name.clone(),
                right: other.name.clone(),
            });
        }
        Ok(())
    }
}

/// Adding two views of the same unit. Panics on mismatch.
impl std::ops::Add<&Resource> for &Resource {
    type Output = Resource;

    fn add(self, rhs: &Resource) -> Resource {
        self.checked_add(rhs).unwrap_or_else(|e| panic!("{e}"))
    }
}

/// Subtracting from the same unit. Panics on mismatch or underflow, which
/// always means capacity was double-booked somewhere.
impl std::ops::Sub<&Resource> for &Resource {
    type Output = Resource;

    fn sub(self, rhs: &Resource) -> Resource {
        self.checked_sub(rhs).unwrap_or_else(|e| panic!("{e}"))
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}(cap={}, speed={})",
            self.kind, self.name, self.capacity, self.speed
        )
    }
}
