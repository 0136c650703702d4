//! Replicated object cluster throughput model.
//!
//! Unlike the other estimators this one models a parallel system as a throughput: the reported latency is the
//! average time between completions seen by the clients as a whole, so dividing it by the number of OSDs means
//! they work in parallel and multiplying it by the number of copies means each of them does more work.

use storsim_core::error::require_positive;
use storsim_core::units::{GIG, SECOND};
use storsim_core::{log_debug, log_warn, Estimate, InvalidSpecError, Load, Resource, Warnings};
use storsim_storage::FileStore;

const NAME: &str = "RADOS";

/// Represents cluster specification.
#[derive(Clone, Debug)]
pub struct RadosSpec {
    front_nic: f64,
    back_nic: f64,
    nodes: u32,
    osd_per_node: u32,
    nic_overhead: f64,
    null_resp: f64,
}

impl Default for RadosSpec {
    /// Single node with one OSD and 10Gb/s front and back networks.
    fn default() -> Self {
        Self {
            front_nic: 10. * GIG,
            back_nic: 10. * GIG,
            nodes: 1,
            osd_per_node: 1,
            nic_overhead: 0.,
            null_resp: 1000.,
        }
    }
}

impl RadosSpec {
    /// Sets client-facing network speed (bits/s).
    pub fn set_front_nic(&mut self, bits: f64) -> &mut Self {
        self.front_nic = bits;
        self
    }

    /// Sets replication network speed (bits/s).
    pub fn set_back_nic(&mut self, bits: f64) -> &mut Self {
        self.back_nic = bits;
        self
    }

    /// Sets cluster size.
    pub fn set_nodes(&mut self, nodes: u32, osd_per_node: u32) -> &mut Self {
        self.nodes = nodes;
        self.osd_per_node = osd_per_node;
        self
    }

    /// Sets fraction of NIC bandwidth that cannot be used.
    pub fn set_nic_overhead(&mut self, nic_overhead: f64) -> &mut Self {
        self.nic_overhead = nic_overhead;
        self
    }

    /// Sets response time (us) of a no-op request.
    pub fn set_null_resp(&mut self, null_resp: f64) -> &mut Self {
        self.null_resp = null_resp;
        self
    }
}

/// Replicated object cluster simulation.
#[derive(Clone)]
pub struct Rados {
    filestore: FileStore,
    frontside: f64,
    backside: f64,
    num_nodes: f64,
    num_osds: f64,
    osd_per_node: f64,
    null_resp: f64,
    warnings: Warnings,
}

impl Rados {
    /// Creates cluster model whose every OSD runs a copy of `filestore`.
    pub fn new(spec: &RadosSpec, filestore: FileStore) -> Result<Self, InvalidSpecError> {
        require_positive(NAME, "number of nodes", spec.nodes as f64)?;
        require_positive(NAME, "OSDs per node", spec.osd_per_node as f64)?;
        require_positive(NAME, "front NIC speed", spec.front_nic)?;
        require_positive(NAME, "back NIC speed", spec.back_nic)?;
        if !(0. ..1.).contains(&spec.nic_overhead) {
            return Err(InvalidSpecError::Inconsistent {
                component: NAME.to_string(),
                reason: format!("NIC overhead {} is outside [0, 1)", spec.nic_overhead),
            });
        }
        let usable = 1. - spec.nic_overhead;
        Ok(Self {
            filestore,
            frontside: usable * spec.front_nic / 8.,
            backside: usable * spec.back_nic / 8.,
            num_nodes: spec.nodes as f64,
            num_osds: (spec.nodes * spec.osd_per_node) as f64,
            osd_per_node: spec.osd_per_node as f64,
            null_resp: spec.null_resp,
            warnings: Warnings::new(),
        })
    }

    /// Returns component name used in logs.
    pub fn name(&self) -> &str {
        NAME
    }

    /// Returns human-readable configuration summary.
    pub fn desc(&self) -> String {
        format!(
            "{} nodes x {} OSDs, {}",
            self.num_nodes,
            self.osd_per_node,
            self.filestore.desc()
        )
    }

    /// Returns the per-OSD object store.
    pub fn filestore(&self) -> &FileStore {
        &self.filestore
    }

    /// Returns accumulated warnings.
    pub fn warnings(&self) -> &Warnings {
        &self.warnings
    }

    /// Removes and returns warnings of the cluster followed by those of its object store.
    pub fn take_warnings(&mut self) -> Vec<String> {
        let mut all = self.warnings.drain();
        all.extend(self.filestore.take_warnings());
        all
    }

    fn network(bsize: f64, bw: f64) -> f64 {
        SECOND * bsize / bw
    }

    /// Limits the filestore time by the slower of server and client NICs.
    fn throughput(&mut self, ftime: f64, stime: f64, ctime: f64, topic: &str, what: String) -> (f64, Load) {
        let (net_worst, slowpoke) = if stime > ctime {
            (stime, "server")
        } else {
            (ctime, "client")
        };
        let worst = if net_worst > ftime {
            let msg = format!("{} NIC caps throughput for {}", slowpoke, what);
            if self.warnings.warn_once(topic, msg.as_str()) {
                log_warn!(self, msg);
            }
            net_worst
        } else {
            ftime
        };
        let mut load = Load::new();
        load.set(Resource::Fs, ftime / worst);
        load.set(Resource::Front, stime.max(ctime) / worst);
        (worst, load)
    }

    /// Expected throughput of `bsize` byte reads spread over `nobj` objects of `obj_size` bytes, issued by
    /// `clients` clients with `depth` outstanding requests each.
    pub fn read(&mut self, bsize: f64, obj_size: f64, nobj: f64, depth: f64, clients: f64) -> Estimate {
        let depth = depth.max(1.);
        // spread the objects and requests over the OSDs
        let nobj = nobj / self.num_osds;
        let d = if depth * clients < self.num_osds {
            1.
        } else {
            depth * clients / self.num_osds
        };

        let ftime = self.filestore.read(bsize, obj_size, d, nobj) / self.num_osds;
        // shared server NICs return responses
        let stime = Self::network(bsize, self.frontside * self.num_nodes / self.osd_per_node);
        // client NICs accept them
        let ctime = Self::network(bsize, self.frontside * clients);

        let what = format!("{} byte reads", bsize);
        let (worst, load) = self.throughput(ftime, stime, ctime, "byte reads", what);
        let latency = worst + self.null_resp / depth;
        log_debug!(self, "{} byte reads: {:.0}us", bsize, latency);
        Estimate::new(latency, bsize * SECOND / latency, load)
    }

    /// Expected throughput of `bsize` byte writes, each stored in `copies` replicas.
    pub fn write(
        &mut self,
        bsize: f64,
        obj_size: f64,
        nobj: f64,
        depth: f64,
        clients: f64,
        copies: f64,
    ) -> Estimate {
        let depth = depth.max(1.);
        let copies = copies.max(1.);
        let nobj = nobj * copies / self.num_osds;
        let d = if depth * clients * copies < self.num_osds {
            1.
        } else {
            depth * clients * copies / self.num_osds
        };

        // OSDs work in parallel but each one also stores copies
        let ftime = self.filestore.write(bsize, obj_size, d, nobj) / self.num_osds * copies;

        // primaries accept the data and replicate it
        let fsbw = self.frontside * self.num_nodes / self.osd_per_node;
        let bsbw = self.backside * self.num_nodes / self.osd_per_node;
        let front = Self::network(bsize, fsbw);
        let back = (copies - 1.) * Self::network(bsize, bsbw);
        let stime = front + back;
        let ctime = Self::network(bsize, self.frontside * clients);

        let what = format!("{}-copy {} byte writes", copies, bsize);
        let (worst, mut load) = self.throughput(ftime, stime, ctime, "byte writes", what);
        load.set(Resource::Back, back / worst);
        let latency = worst + self.null_resp / depth;
        log_debug!(self, "{}-copy {} byte writes: {:.0}us", copies, bsize, latency);
        Estimate::new(latency, bsize * SECOND / latency, load)
    }

    /// Expected performance of object creation with `depth` outstanding requests.
    pub fn create(&mut self, depth: f64) -> Estimate {
        let t = self.null_resp / depth.max(1.) + self.filestore.create();
        let mut load = Load::new();
        load.set(Resource::Fs, 1.);
        Estimate::from_latency(t, load)
    }

    /// Expected performance of object deletion with `depth` outstanding requests.
    pub fn delete(&mut self, depth: f64) -> Estimate {
        let t = self.null_resp / depth.max(1.) + self.filestore.delete();
        let mut load = Load::new();
        load.set(Resource::Fs, 1.);
        Estimate::from_latency(t, load)
    }
}
