//! Protocol gateway striping (and erasure coding) its data across storage servers.
//!
//! Each client request is received through a front NIC, may need a stripe lock from the lock manager, and is
//! fanned out to strip-sized shard operations sent through the back NICs to the servers. Shards are issued in
//! parallel, but each one consumes a share of the back NIC, CPU and server capacity, so their costs are summed.

use std::rc::Rc;

use storsim_core::error::require_positive;
use storsim_core::units::KB;
use storsim_core::{log_debug, Estimate, InvalidSpecError, Resource, Warnings};
use storsim_models::{Cpu, Interface};

use crate::contention::{describe, Contention};
use crate::dlm::Dlm;
use crate::server::Server;

const NAME: &str = "Gateway";

/// Represents gateway specification.
#[derive(Clone, Debug)]
pub struct GatewaySpec {
    num_servers: u32,
    num_fronts: u32,
    num_backs: u32,
    num_cpus: u32,
    n: u32,
    m: u32,
    width: f64,
    read_mult: f64,
    write_mult: f64,
    prefetch: f64,
    min_msg: f64,
}

impl Default for GatewaySpec {
    /// 5+2 erasure coding over 128K strips.
    fn default() -> Self {
        Self {
            num_servers: 1,
            num_fronts: 1,
            num_backs: 1,
            num_cpus: 1,
            n: 5,
            m: 2,
            width: 128. * KB as f64,
            read_mult: 2.,
            write_mult: 3.,
            prefetch: 0.5,
            min_msg: 128.,
        }
    }
}

impl GatewaySpec {
    /// Sets number of storage servers.
    pub fn set_num_servers(&mut self, num_servers: u32) -> &mut Self {
        self.num_servers = num_servers;
        self
    }

    /// Sets number of client-facing NICs.
    pub fn set_num_fronts(&mut self, num_fronts: u32) -> &mut Self {
        self.num_fronts = num_fronts;
        self
    }

    /// Sets number of server-facing NICs.
    pub fn set_num_backs(&mut self, num_backs: u32) -> &mut Self {
        self.num_backs = num_backs;
        self
    }

    /// Sets number of processor chips.
    pub fn set_num_cpus(&mut self, num_cpus: u32) -> &mut Self {
        self.num_cpus = num_cpus;
        self
    }

    /// Sets erasure coding geometry: `n` data strips and `m` parity strips per stripe.
    pub fn set_coding(&mut self, n: u32, m: u32) -> &mut Self {
        self.n = n;
        self.m = m;
        self
    }

    /// Sets strip width (bytes).
    pub fn set_width(&mut self, width: f64) -> &mut Self {
        self.width = width;
        self
    }

    /// Sets multipliers on the data processing cost of reads and writes.
    pub fn set_multipliers(&mut self, read_mult: f64, write_mult: f64) -> &mut Self {
        self.read_mult = read_mult;
        self.write_mult = write_mult;
        self
    }

    /// Sets fraction of the server wait that remains visible to sequential reads with read-ahead.
    pub fn set_prefetch(&mut self, prefetch: f64) -> &mut Self {
        self.prefetch = prefetch;
        self
    }

    /// Sets size of a minimal request or response message (bytes).
    pub fn set_min_msg(&mut self, min_msg: f64) -> &mut Self {
        self.min_msg = min_msg;
        self
    }
}

/// Shape of a write with respect to the stripe.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteRegime {
    /// Spans several strips: data strips plus parity are written, nothing is read.
    MultiStrip,
    /// Exactly one strip: one data strip plus parity.
    StripAligned,
    /// Smaller than a strip and sequential: aggregated into full stripe flushes.
    SequentialSmall,
    /// Smaller than a strip and random: the stripe is read, parity recomputed and rewritten.
    ReadModifyWrite,
}

/// Shard operations needed by one client write.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WritePlan {
    /// Write shape.
    pub regime: WriteRegime,
    /// Strip reads (each of strip width bytes).
    pub shard_reads: f64,
    /// Shard writes, fractional when amortized over several requests.
    pub shard_writes: f64,
    /// Extra checksum computations over strip width bytes.
    pub checksums: f64,
    /// Size of each shard write (bytes).
    pub write_size: f64,
}

/// Lock related costs of one request.
struct LockCost {
    probability: f64,
    latency: f64,
    back: f64,
    cpu: f64,
    ceiling: f64,
}

/// Single gateway simulation.
#[derive(Clone)]
pub struct Gateway {
    server: Server,
    dlm: Dlm,
    front: Interface,
    back: Interface,
    cpu: Rc<Cpu>,
    num_servers: f64,
    num_fronts: f64,
    num_backs: f64,
    num_cpus: u32,
    n: f64,
    m: f64,
    width: f64,
    read_mult: f64,
    write_mult: f64,
    prefetch: f64,
    min_msg: f64,
    warnings: Warnings,
}

impl Gateway {
    /// Creates gateway model in front of `num_servers` copies of `server`.
    pub fn new(
        spec: &GatewaySpec,
        server: Server,
        dlm: Dlm,
        front: Interface,
        back: Interface,
        cpu: Rc<Cpu>,
    ) -> Result<Self, InvalidSpecError> {
        require_positive(NAME, "number of servers", spec.num_servers as f64)?;
        require_positive(NAME, "number of front NICs", spec.num_fronts as f64)?;
        require_positive(NAME, "number of back NICs", spec.num_backs as f64)?;
        require_positive(NAME, "number of CPUs", spec.num_cpus as f64)?;
        require_positive(NAME, "data strips", spec.n as f64)?;
        require_positive(NAME, "strip width", spec.width)?;
        require_positive(NAME, "minimum message", spec.min_msg)?;
        if !(0. ..=1.).contains(&spec.prefetch) {
            return Err(InvalidSpecError::Inconsistent {
                component: NAME.to_string(),
                reason: format!("prefetch factor {} is outside [0, 1]", spec.prefetch),
            });
        }
        Ok(Self {
            server,
            dlm,
            front,
            back,
            cpu,
            num_servers: spec.num_servers as f64,
            num_fronts: spec.num_fronts as f64,
            num_backs: spec.num_backs as f64,
            num_cpus: spec.num_cpus,
            n: spec.n as f64,
            m: spec.m as f64,
            width: spec.width,
            read_mult: spec.read_mult,
            write_mult: spec.write_mult,
            prefetch: spec.prefetch,
            min_msg: spec.min_msg,
            warnings: Warnings::new(),
        })
    }

    /// Returns component name used in logs and warnings.
    pub fn name(&self) -> &str {
        NAME
    }

    /// Returns human-readable configuration summary.
    pub fn desc(&self) -> String {
        format!(
            "{}+{} x {}K strips, {}x{}, {}x{} front, {}x{} back, {} servers",
            self.n,
            self.m,
            self.width / KB as f64,
            self.num_cpus,
            self.cpu.desc(),
            self.num_fronts,
            self.front.desc(),
            self.num_backs,
            self.back.desc(),
            self.num_servers
        )
    }

    /// Returns the server model.
    pub fn server(&self) -> &Server {
        &self.server
    }

    /// Returns the server model for direct estimates.
    pub fn server_mut(&mut self) -> &mut Server {
        &mut self.server
    }

    /// Returns the lock manager model.
    pub fn dlm(&self) -> &Dlm {
        &self.dlm
    }

    /// Returns warnings of the gateway itself.
    pub fn warnings(&self) -> &Warnings {
        &self.warnings
    }

    /// Removes and returns warnings of the gateway itself.
    pub fn take_warnings(&mut self) -> Vec<String> {
        self.warnings.drain()
    }

    /// Removes and returns warnings of the gateway followed by those of its lock manager and server.
    pub fn take_all_warnings(&mut self) -> Vec<String> {
        let mut all = self.warnings.drain();
        all.extend(self.dlm.take_warnings());
        all.extend(self.server.take_warnings());
        all
    }

    fn cores(&self) -> f64 {
        self.cpu.available_cores(self.num_cpus)
    }

    /// Probability that a request needs a new stripe lock.
    ///
    /// Sequential requests share a lock until they leave the stripe, random requests always lock.
    pub fn lock_probability(&self, bsize: f64, seq: bool) -> f64 {
        if seq {
            (bsize / (self.width * self.n)).min(1.)
        } else {
            1.
        }
    }

    fn lock_cost(&mut self, bsize: f64, unit_size: f64, seq: bool) -> LockCost {
        let probability = self.lock_probability(bsize, seq);
        let lock = self.dlm.lock();
        let back = self.back.write_time(self.min_msg) + self.back.read_time(self.min_msg);
        let cpu = self.back.write_cpu(self.min_msg) + self.back.read_cpu(self.min_msg);

        // lock manager capacity is its uncontested rate scaled to its busiest resource
        let capacity = match lock.load.bottleneck() {
            Some((_, utilization)) if utilization > 0. => lock.bandwidth / utilization,
            _ => lock.bandwidth,
        };
        let ceiling = if probability > 0. {
            capacity * unit_size / probability
        } else {
            f64::INFINITY
        };
        LockCost {
            probability,
            latency: probability * lock.latency,
            back: probability * back,
            cpu: probability * cpu,
            ceiling,
        }
    }

    /// Expected performance of `bsize` byte reads with `depth` parallel requests.
    ///
    /// Striping breaks server side sequentiality, so shards are random server reads. Sequential streams
    /// read ahead: twice the depth reaches the servers and only `prefetch` of their wait is visible.
    pub fn read(&mut self, bsize: f64, depth: f64, seq: bool) -> Estimate {
        let descr = describe(bsize, depth, seq, "reads");
        let req = self.min_msg;
        let rsp = self.min_msg + bsize;

        // receive the request and send the response
        let t_front = self.front.read_time(req) + self.front.write_time(rsp);
        let mut t_cpu = self.front.read_cpu(req) + self.front.write_cpu(rsp);
        t_cpu += self.read_mult * self.cpu.process(bsize);

        let lock = self.lock_cost(bsize, bsize, seq);
        let mut t_back = lock.back;
        t_cpu += lock.cpu;

        // forward to the servers and await the shards
        let (shards, shard_size) = if bsize <= self.width {
            (1., bsize)
        } else {
            ((bsize / self.width).ceil(), self.width)
        };
        let svr_depth = if seq { 2. * depth } else { depth };
        let svr = self.server.read(shard_size, svr_depth, false);
        let mut t_svr = shards * svr.latency;
        if seq {
            t_svr *= self.prefetch;
        }
        t_back += shards * (self.back.write_time(req) + self.back.read_time(self.min_msg + shard_size));
        t_cpu += shards * (self.back.write_cpu(req) + self.back.read_cpu(self.min_msg + shard_size));
        let bw_svr = svr.bandwidth * self.num_servers * bsize / (shards * shard_size);

        let latency = t_front + t_back + t_cpu + lock.latency + t_svr;
        let cores = self.cores();
        let estimate = Contention::new(NAME, descr, bsize, depth, latency)
            .queued(Resource::Front, t_front, self.num_fronts)
            .queued(Resource::Back, t_back, self.num_backs)
            .queued(Resource::Cpu, t_cpu, cores)
            .limit(Resource::Dlm, lock.ceiling)
            .limit(Resource::Server, bw_svr)
            .resolve(&mut self.warnings);
        log_debug!(self, "read lock probability {:.3}", lock.probability);
        estimate
    }

    /// Shard operations needed by a `bsize` byte write.
    pub fn write_plan(&self, bsize: f64, seq: bool) -> WritePlan {
        if bsize > self.width {
            WritePlan {
                regime: WriteRegime::MultiStrip,
                shard_reads: 0.,
                shard_writes: (bsize / self.width).ceil() + self.m,
                checksums: 0.,
                write_size: self.width,
            }
        } else if bsize == self.width {
            WritePlan {
                regime: WriteRegime::StripAligned,
                shard_reads: 0.,
                shard_writes: 1. + self.m,
                checksums: 0.,
                write_size: self.width,
            }
        } else if seq {
            // one full stripe flush per n * width bytes
            WritePlan {
                regime: WriteRegime::SequentialSmall,
                shard_reads: 0.,
                shard_writes: (self.n + self.m) * bsize / (self.n * self.width),
                checksums: 0.,
                write_size: self.width,
            }
        } else {
            WritePlan {
                regime: WriteRegime::ReadModifyWrite,
                shard_reads: self.n,
                shard_writes: 1. + self.m,
                checksums: self.n - 1.,
                write_size: self.width,
            }
        }
    }

    /// Expected performance of `bsize` byte writes with `depth` parallel requests.
    ///
    /// Sequential writes are assumed to eventually aggregate on the servers.
    pub fn write(&mut self, bsize: f64, depth: f64, seq: bool) -> Estimate {
        let descr = describe(bsize, depth, seq, "writes");
        let req = self.min_msg + bsize;
        let rsp = self.min_msg;

        // receive the request, process the data and send the response
        let t_front = self.front.read_time(req) + self.front.write_time(rsp);
        let mut t_cpu = self.front.read_cpu(req) + self.front.write_cpu(rsp);
        t_cpu += self.write_mult * self.cpu.process(bsize);

        let lock = self.lock_cost(bsize, bsize, seq);
        let mut t_back = lock.back;
        t_cpu += lock.cpu;

        let plan = self.write_plan(bsize, seq);
        t_cpu += plan.checksums * self.cpu.process(self.width);

        // strip reads for parity recomputation
        let strip = self.min_msg + self.width;
        t_back += plan.shard_reads * (self.back.write_time(self.min_msg) + self.back.read_time(strip));
        t_cpu += plan.shard_reads * (self.back.write_cpu(self.min_msg) + self.back.read_cpu(strip));

        // data and parity shard writes
        let shard = self.min_msg + plan.write_size;
        t_back += plan.shard_writes * (self.back.write_time(shard) + self.back.read_time(self.min_msg));
        t_cpu += plan.shard_writes * (self.back.write_cpu(shard) + self.back.read_cpu(self.min_msg));

        let svr_w = self.server.write(plan.write_size, depth, seq);
        let mut t_svr = svr_w.latency;
        // seconds of one server's capacity consumed per request
        let mut svr_time = plan.shard_writes * plan.write_size / svr_w.bandwidth;
        if plan.shard_reads > 0. {
            let svr_r = self.server.read(self.width, depth, false);
            t_svr += svr_r.latency;
            svr_time += plan.shard_reads * self.width / svr_r.bandwidth;
        }
        let bw_svr = bsize * self.num_servers / svr_time;

        let latency = t_front + t_back + t_cpu + lock.latency + t_svr;
        let cores = self.cores();
        let estimate = Contention::new(NAME, descr, bsize, depth, latency)
            .queued(Resource::Front, t_front, self.num_fronts)
            .queued(Resource::Back, t_back, self.num_backs)
            .queued(Resource::Cpu, t_cpu, cores)
            .limit(Resource::Dlm, lock.ceiling)
            .limit(Resource::Server, bw_svr)
            .resolve(&mut self.warnings);
        log_debug!(
            self,
            "write plan {:?}: {} reads, {:.2} writes",
            plan.regime,
            plan.shard_reads,
            plan.shard_writes
        );
        estimate
    }

    fn metadata_op(&mut self, op: &str, svr: Estimate) -> Estimate {
        let shards = self.n + self.m;
        let t_front = self.front.read_time(self.min_msg) + self.front.write_time(self.min_msg);
        let mut t_cpu = self.front.read_cpu(self.min_msg) + self.front.write_cpu(self.min_msg);

        // objects are always locked
        let lock = self.lock_cost(self.width, 1., false);
        let mut t_back = lock.back;
        t_cpu += lock.cpu;

        t_back += shards * (self.back.write_time(self.min_msg) + self.back.read_time(self.min_msg));
        t_cpu += shards * (self.back.write_cpu(self.min_msg) + self.back.read_cpu(self.min_msg));
        let bw_svr = svr.bandwidth * self.num_servers / shards;

        let latency = t_front + t_back + t_cpu + lock.latency + svr.latency;
        let cores = self.cores();
        Contention::new(NAME, op.to_string(), 1., 1., latency)
            .queued(Resource::Front, t_front, self.num_fronts)
            .queued(Resource::Back, t_back, self.num_backs)
            .queued(Resource::Cpu, t_cpu, cores)
            .limit(Resource::Dlm, lock.ceiling)
            .limit(Resource::Server, bw_svr)
            .resolve(&mut self.warnings)
    }

    /// Expected performance of creating an object: one shard object on each of `n + m` servers.
    ///
    /// Bandwidth is reported in operations per second.
    pub fn create(&mut self) -> Estimate {
        let svr = self.server.create();
        self.metadata_op("creates", svr)
    }

    /// Expected performance of deleting an object and all its shards.
    ///
    /// Bandwidth is reported in operations per second.
    pub fn delete(&mut self) -> Estimate {
        let svr = self.server.delete();
        self.metadata_op("deletes", svr)
    }
}
