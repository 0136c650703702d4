//! Resource contention and queueing delay.
//!
//! Turns the cost of a single operation into a throughput-under-load estimate. Each resource an operation uses
//! is described by the time (us) it is busy per operation and the number of identical units serving it, which
//! gives the resource ceiling `units * unit_size * SECOND / service_time`. The achievable bandwidth is the least
//! of the depth-limited rate `depth * unit_size * SECOND / latency` and all ceilings (single bottleneck model).
//! Each resource then reports its utilization `bandwidth / ceiling`.
//!
//! Resources arbitrated by the component add queueing delay. With `d = service_time / units` per request, the
//! response time `r` of `depth` requests in flight solves `r = latency + sum(d * queue_length(depth * d / r, depth))`,
//! so a costlier request never waits less. The result is never below `depth * unit_size * SECOND / bandwidth`:
//! in steady state `depth` requests in flight at the achieved bandwidth each wait that long (Little's law),
//! whichever resource limits it.

use storsim_core::units::SECOND;
use storsim_core::{log_debug, log_trace, log_warn, Estimate, Load, Resource, Warnings};
use storsim_models::queue_length;

/// Utilization considered saturated.
pub const SATURATED: f64 = 0.99;
/// Utilization worth an advisory warning.
pub const WARN_LOAD: f64 = 0.8;
/// Queueing delay (us) below which no warning is issued.
pub const WARN_DELAY: f64 = 100.;
/// Queueing delay (percent of latency) below which no warning is issued.
pub const WARN_DELTA: f64 = 10.;

// bisection steps bound for the response time
const MAX_STEPS: usize = 200;

#[derive(Clone, Debug)]
struct Demand {
    resource: Resource,
    ceiling: f64,
    // time charged per queued request and number of units, absent for load-only resources
    service_time: Option<(f64, f64)>,
}

/// Collects resource demands of one operation type and resolves them into an [`Estimate`].
pub struct Contention<'a> {
    component: &'a str,
    descr: String,
    unit_size: f64,
    depth: f64,
    latency: f64,
    demands: Vec<Demand>,
}

impl<'a> Contention<'a> {
    /// Starts contention analysis of an operation.
    ///
    /// * `component` - name used in warnings and logs.
    /// * `descr` - workload description used in warnings, e.g. `"4K, d=32 random reads"`.
    /// * `unit_size` - bytes per operation, 1 for operations without payload (bandwidth then is ops/s).
    /// * `depth` - number of outstanding operations.
    /// * `latency` - unloaded latency (us) of one operation.
    pub fn new(component: &'a str, descr: String, unit_size: f64, depth: f64, latency: f64) -> Self {
        Self {
            component,
            descr,
            unit_size,
            depth: depth.max(1.),
            latency,
            demands: Vec::new(),
        }
    }

    /// Returns component name.
    pub fn name(&self) -> &str {
        self.component
    }

    fn ceiling(&self, service_time: f64, units: f64) -> f64 {
        if service_time > 0. {
            units * self.unit_size * SECOND / service_time
        } else {
            f64::INFINITY
        }
    }

    /// Adds a resource arbitrated by the component: `units` servers busy `service_time` us per operation.
    pub fn queued(mut self, resource: Resource, service_time: f64, units: f64) -> Self {
        let ceiling = self.ceiling(service_time, units);
        self.demands.push(Demand {
            resource,
            ceiling,
            service_time: Some((service_time, units)),
        });
        self
    }

    /// Adds a resource whose queueing is accounted elsewhere, it only limits bandwidth and reports load.
    pub fn load_only(mut self, resource: Resource, service_time: f64, units: f64) -> Self {
        let ceiling = self.ceiling(service_time, units);
        self.demands.push(Demand {
            resource,
            ceiling,
            service_time: None,
        });
        self
    }

    /// Adds a load-only resource with a known bandwidth ceiling (in units of bandwidth).
    pub fn limit(mut self, resource: Resource, ceiling: f64) -> Self {
        self.demands.push(Demand {
            resource,
            ceiling,
            service_time: None,
        });
        self
    }

    /// Depth-limited bandwidth: `depth` operations in flight, each taking the unloaded latency.
    pub fn base_bandwidth(&self) -> f64 {
        self.depth * self.unit_size * SECOND / self.latency
    }

    // per request busy time of a queued resource
    fn per_unit(demand: &Demand) -> Option<f64> {
        demand.service_time.map(|(service_time, units)| service_time / units)
    }

    /// Response time of `depth` requests in flight, the fixed point of `latency` plus queueing delays.
    ///
    /// The delays shrink as the response time grows, so the fixed point lies between no queueing and full queues.
    fn response_time(&self) -> f64 {
        let per_unit: Vec<f64> = self.demands.iter().filter_map(Self::per_unit).collect();
        let queued = |r: f64| -> f64 {
            per_unit
                .iter()
                .map(|d| d * queue_length(self.depth * d / r, self.depth))
                .sum()
        };
        let mut lo = self.latency;
        let mut hi = self.latency + self.depth * per_unit.iter().sum::<f64>();
        for _ in 0..MAX_STEPS {
            if hi - lo <= 1e-12 * hi {
                break;
            }
            let mid = 0.5 * (lo + hi);
            if self.latency + queued(mid) > mid {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        hi
    }

    /// Computes bandwidth, loads and queueing delays, recording warnings for saturated or heavily loaded
    /// resources and for significant delays.
    pub fn resolve(self, warnings: &mut Warnings) -> Estimate {
        let bandwidth = self
            .demands
            .iter()
            .fold(self.base_bandwidth(), |bw, demand| bw.min(demand.ceiling));
        let iops = bandwidth / self.unit_size;
        let response_time = self.response_time();

        let mut load = Load::new();
        let mut q_delay = 0.;
        for demand in &self.demands {
            let utilization = bandwidth / demand.ceiling;
            load.set(demand.resource, utilization);

            if utilization >= SATURATED {
                let msg = match demand.service_time {
                    Some((t, _)) => format!(
                        "{} {} saturated by {:.0}us x {:.0} IOPS for {}",
                        self.component, demand.resource, t, iops, self.descr
                    ),
                    None => format!("{} {} saturated for {}", self.component, demand.resource, self.descr),
                };
                self.report(warnings, msg);
            } else if utilization >= WARN_LOAD {
                let msg = format!(
                    "{} {} load ({:4.2}) is high for {}",
                    self.component, demand.resource, utilization, self.descr
                );
                self.report(warnings, msg);
            }

            if let Some(d) = Self::per_unit(demand) {
                // queued requests are shared by all units
                let delay = d * queue_length(self.depth * d / response_time, self.depth);
                log_trace!(self, "{}: {} load {:.2}, +{:.0}us", self.descr, demand.resource, utilization, delay);
                q_delay += delay;
                let delta = 100. * delay / self.latency;
                if delay >= WARN_DELAY && delta >= WARN_DELTA {
                    let msg = format!(
                        "{} {} load ({:4.2}) adds {:.0}us ({:.0}%) to {}",
                        self.component, demand.resource, utilization, delay, delta, self.descr
                    );
                    self.report(warnings, msg);
                }
            }
        }

        let latency = (self.latency + q_delay).max(self.depth * self.unit_size * SECOND / bandwidth);
        let estimate = Estimate::new(latency, bandwidth, load);
        log_debug!(
            self,
            "{}: {:.0}us (+{:.0}us queued) = {:.0}us, {:.0} B/s",
            self.descr,
            self.latency,
            q_delay,
            latency,
            bandwidth
        );
        estimate
    }

    fn report(&self, warnings: &mut Warnings, msg: String) {
        if warnings.warn(msg.as_str()) {
            log_warn!(self, msg);
        }
    }
}

/// Describes a workload for warnings and logs, e.g. `"4K, d=32 random reads"`.
///
/// Sizes below a kilobyte are printed in bytes.
pub fn describe(bsize: f64, depth: f64, seq: bool, op: &str) -> String {
    let size = if bsize >= 1024. * 1024. {
        format!("{}M", (bsize / (1024. * 1024.)) as u64)
    } else if bsize >= 1024. {
        format!("{}K", (bsize / 1024.) as u64)
    } else {
        format!("{}B", bsize as u64)
    };
    format!(
        "{}, d={} {} {}",
        size,
        depth as u64,
        if seq { "sequential" } else { "random" },
        op
    )
}
