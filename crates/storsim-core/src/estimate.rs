//! Estimated operation performance.

use std::fmt::{Display, Formatter};

use indexmap::IndexMap;
use serde::Serialize;

use crate::units::SECOND;

/// Resource whose utilization is reported by a component.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Resource {
    /// Client-facing network interfaces of a gateway.
    Front,
    /// Cluster-facing network interfaces of a gateway.
    Back,
    /// Processors.
    Cpu,
    /// Network interfaces of a server or lock manager.
    Net,
    /// File systems and the devices below them.
    Fs,
    /// Host bus adapters.
    Hba,
    /// Distributed lock manager.
    Dlm,
    /// Storage servers behind a gateway.
    Server,
}

impl Resource {
    /// Returns the short name used in load reports.
    pub fn name(&self) -> &'static str {
        match self {
            Resource::Front => "front",
            Resource::Back => "back",
            Resource::Cpu => "cpu",
            Resource::Net => "net",
            Resource::Fs => "fs",
            Resource::Hba => "hba",
            Resource::Dlm => "dlm",
            Resource::Server => "server",
        }
    }
}

impl Display for Resource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-resource utilization report.
///
/// Values are fractions of the resource capacity: 1.0 marks the bottleneck, values above 1.0 denote saturation.
/// Entries keep the order in which they were recorded.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Load {
    entries: IndexMap<Resource, f64>,
}

impl Load {
    /// Creates an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records utilization of a resource, replacing the previous value.
    pub fn set(&mut self, resource: Resource, utilization: f64) {
        self.entries.insert(resource, utilization);
    }

    /// Returns utilization of a resource if it was recorded.
    pub fn get(&self, resource: Resource) -> Option<f64> {
        self.entries.get(&resource).copied()
    }

    /// Returns the most utilized resource.
    pub fn bottleneck(&self) -> Option<(Resource, f64)> {
        self.entries
            .iter()
            .map(|(resource, load)| (*resource, *load))
            .fold(None, |best, (resource, load)| match best {
                Some((_, best_load)) if best_load >= load => best,
                _ => Some((resource, load)),
            })
    }

    /// Iterates over recorded entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (Resource, f64)> + '_ {
        self.entries.iter().map(|(resource, load)| (*resource, *load))
    }

    /// Returns the number of recorded resources.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing was recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Estimated performance of one operation type under a given load.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Estimate {
    /// Expected per-operation latency (us), including queueing delay.
    pub latency: f64,
    /// Achievable bandwidth (bytes/s). Operations without payload report operations per second.
    pub bandwidth: f64,
    /// Per-resource utilization at the achieved bandwidth.
    pub load: Load,
}

impl Estimate {
    /// Creates an estimate.
    pub fn new(latency: f64, bandwidth: f64, load: Load) -> Self {
        Self {
            latency,
            bandwidth,
            load,
        }
    }

    /// Creates an estimate of a single-stream operation without payload: bandwidth is `SECOND / latency` ops/s.
    pub fn from_latency(latency: f64, load: Load) -> Self {
        Self {
            latency,
            bandwidth: SECOND / latency,
            load,
        }
    }

    /// Operations per second implied by the bandwidth for a given block size.
    pub fn iops(&self, bsize: u64) -> f64 {
        self.bandwidth / bsize.max(1) as f64
    }
}
