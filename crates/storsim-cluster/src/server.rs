//! Block server node model.
//!
//! The server receives requests over its NICs, keeps written data in a write-back buffer which is periodically
//! flushed through its HBAs to the data file systems, and serves reads from those file systems. Every operation
//! is resolved by the contention model over the `net`, `cpu`, `fs` and `hba` resources.

use std::rc::Rc;

use storsim_core::error::require_positive;
use storsim_core::units::MB;
use storsim_core::{log_debug, Estimate, InvalidSpecError, Resource, Warnings};
use storsim_models::{Cpu, Interface};
use storsim_storage::FileSystem;

use crate::contention::{describe, Contention};

const NAME: &str = "Server";
/// Size of a metadata block moved through the HBA.
const MD_SIZE: f64 = 4096.;

/// Represents server specification.
#[derive(Clone, Debug)]
pub struct ServerSpec {
    num_disks: u32,
    num_nics: u32,
    num_hbas: u32,
    num_cpus: u32,
    write_buf: f64,
    obj_size: f64,
    min_msg: f64,
    lookup_us: f64,
    metadata_us: f64,
}

impl Default for ServerSpec {
    /// One of each device, 32MB write-back buffer and 4MB objects.
    fn default() -> Self {
        Self {
            num_disks: 1,
            num_nics: 1,
            num_hbas: 1,
            num_cpus: 1,
            write_buf: 32. * MB as f64,
            obj_size: 4. * MB as f64,
            min_msg: 128.,
            lookup_us: 10.,
            metadata_us: 10.,
        }
    }
}

impl ServerSpec {
    /// Sets number of data file systems (disks).
    pub fn set_num_disks(&mut self, num_disks: u32) -> &mut Self {
        self.num_disks = num_disks;
        self
    }

    /// Sets number of NICs.
    pub fn set_num_nics(&mut self, num_nics: u32) -> &mut Self {
        self.num_nics = num_nics;
        self
    }

    /// Sets number of HBAs.
    pub fn set_num_hbas(&mut self, num_hbas: u32) -> &mut Self {
        self.num_hbas = num_hbas;
        self
    }

    /// Sets number of processor chips.
    pub fn set_num_cpus(&mut self, num_cpus: u32) -> &mut Self {
        self.num_cpus = num_cpus;
        self
    }

    /// Sets write-back buffer size (bytes).
    pub fn set_write_buf(&mut self, write_buf: f64) -> &mut Self {
        self.write_buf = write_buf;
        self
    }

    /// Sets maximum on-disk object size (bytes).
    pub fn set_obj_size(&mut self, obj_size: f64) -> &mut Self {
        self.obj_size = obj_size;
        self
    }

    /// Sets size of a minimal request or response message (bytes).
    pub fn set_min_msg(&mut self, min_msg: f64) -> &mut Self {
        self.min_msg = min_msg;
        self
    }

    /// Sets CPU time (us) to find and open an object.
    pub fn set_lookup_us(&mut self, lookup_us: f64) -> &mut Self {
        self.lookup_us = lookup_us;
        self
    }

    /// Sets CPU time (us) of a metadata operation.
    pub fn set_metadata_us(&mut self, metadata_us: f64) -> &mut Self {
        self.metadata_us = metadata_us;
        self
    }
}

/// Single server simulation.
#[derive(Clone)]
pub struct Server {
    fs: Box<dyn FileSystem>,
    nic: Interface,
    hba: Interface,
    cpu: Rc<Cpu>,
    num_disks: f64,
    num_nics: f64,
    num_hbas: f64,
    num_cpus: u32,
    write_buf: f64,
    obj_size: f64,
    min_msg: f64,
    lookup_us: f64,
    metadata_us: f64,
    warnings: Warnings,
}

impl Server {
    /// Creates server model from given spec and components.
    ///
    /// * `fs` - data file system, replicated on each of the disks.
    /// * `nic` - network interface, replicated `num_nics` times.
    /// * `hba` - host bus adapter, replicated `num_hbas` times.
    /// * `cpu` - processor, replicated `num_cpus` times.
    pub fn new(
        spec: &ServerSpec,
        fs: Box<dyn FileSystem>,
        nic: Interface,
        hba: Interface,
        cpu: Rc<Cpu>,
    ) -> Result<Self, InvalidSpecError> {
        require_positive(NAME, "number of disks", spec.num_disks as f64)?;
        require_positive(NAME, "number of NICs", spec.num_nics as f64)?;
        require_positive(NAME, "number of HBAs", spec.num_hbas as f64)?;
        require_positive(NAME, "number of CPUs", spec.num_cpus as f64)?;
        require_positive(NAME, "write-back buffer", spec.write_buf)?;
        require_positive(NAME, "object size", spec.obj_size)?;
        require_positive(NAME, "minimum message", spec.min_msg)?;
        Ok(Self {
            fs,
            nic,
            hba,
            cpu,
            num_disks: spec.num_disks as f64,
            num_nics: spec.num_nics as f64,
            num_hbas: spec.num_hbas as f64,
            num_cpus: spec.num_cpus,
            write_buf: spec.write_buf,
            obj_size: spec.obj_size,
            min_msg: spec.min_msg,
            lookup_us: spec.lookup_us,
            metadata_us: spec.metadata_us,
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
            "{}x{}, {}x{}, {}x{}, {}x{}",
            self.num_cpus,
            self.cpu.desc(),
            self.num_disks,
            self.fs.desc(),
            self.num_nics,
            self.nic.desc(),
            self.num_hbas,
            self.hba.desc()
        )
    }

    /// Returns the data file system.
    pub fn fs(&self) -> &dyn FileSystem {
        self.fs.as_ref()
    }

    /// Returns minimal message size (bytes).
    pub fn min_msg(&self) -> f64 {
        self.min_msg
    }

    /// Returns maximum object size (bytes).
    pub fn obj_size(&self) -> f64 {
        self.obj_size
    }

    /// Returns accumulated warnings.
    pub fn warnings(&self) -> &Warnings {
        &self.warnings
    }

    /// Removes and returns accumulated warnings.
    pub fn take_warnings(&mut self) -> Vec<String> {
        self.warnings.drain()
    }

    fn cores(&self) -> f64 {
        self.cpu.available_cores(self.num_cpus)
    }

    /// Number of requests served by one whole-object operation.
    fn per_object(&self, bsize: f64) -> f64 {
        self.obj_size / bsize
    }

    /// Expected performance of `bsize` byte reads with `depth` parallel requests (to multiple objects).
    ///
    /// Sequential reads smaller than half an object are served by whole-object reads.
    pub fn read(&mut self, bsize: f64, depth: f64, seq: bool) -> Estimate {
        let descr = describe(bsize, depth, seq, "reads");

        // request receipt and response transmission
        let t_net = self.nic.read_time(self.min_msg) + self.nic.write_time(bsize);
        let mut t_cpu = self.nic.read_cpu(self.min_msg) + self.nic.write_cpu(bsize);
        t_cpu += self.cpu.process(bsize);
        t_cpu += self.hba.read_cpu(bsize);
        let t_hba = self.hba.read_time(bsize);

        // find and open the object, once per object for sequential access
        let mut t_l_cpu = self.lookup_us;
        let mut t_l_dsk = self.fs.open();
        if seq && bsize < self.obj_size {
            t_l_cpu /= self.per_object(bsize);
            t_l_dsk /= self.per_object(bsize);
        }
        t_cpu += t_l_cpu;

        // requests are spread over the disks
        let per_disk = (depth / self.num_disks).max(1.);
        let size = self.fs.size();
        let t_fr = if seq && bsize <= self.obj_size / 2. {
            self.fs.read(self.obj_size, size, false, per_disk, false) / self.per_object(bsize)
        } else if bsize > self.obj_size {
            self.fs.read(self.obj_size, size, false, per_disk, false) * (bsize / self.obj_size).ceil()
        } else {
            self.fs.read(bsize, size, false, per_disk, false)
        };
        let t_fs = t_l_dsk + t_fr;

        let latency = t_net + t_cpu + t_hba + t_fs;
        let cores = self.cores();
        Contention::new(NAME, descr, bsize, depth, latency)
            .queued(Resource::Net, t_net, self.num_nics)
            .queued(Resource::Cpu, t_cpu, cores)
            .load_only(Resource::Fs, t_fs, self.num_disks)
            .queued(Resource::Hba, t_hba, self.num_hbas)
            .resolve(&mut self.warnings)
    }

    /// Expected performance of `bsize` byte writes with `depth` parallel requests (to multiple objects).
    ///
    /// Writes are acknowledged once copied into the write-back buffer and flushed to disk asynchronously:
    /// only receipt, copy and response count towards latency, while lookup and flush costs only limit
    /// throughput. Writes larger than the buffer are written through.
    pub fn write(&mut self, bsize: f64, depth: f64, seq: bool) -> Estimate {
        let descr = describe(bsize, depth, seq, "writes");

        // request receipt and response transmission
        let t_net = self.nic.read_time(bsize) + self.nic.write_time(self.min_msg);
        let t_dsp = self.nic.read_cpu(bsize);
        let t_rsp = self.nic.write_cpu(self.min_msg);
        let t_copy = self.cpu.mem_read(bsize) + self.cpu.mem_write(bsize);
        let t_sync = t_dsp + t_rsp + t_copy;

        // flushes proceed in parallel up to the write-back buffer size
        let parallel = if bsize >= self.write_buf {
            1.
        } else {
            self.write_buf / bsize
        };
        let per_disk = (parallel / self.num_disks).max(1.);

        let mut t_l_cpu = self.lookup_us;
        let mut t_l_dsk = self.fs.create(false);
        if seq && bsize < self.obj_size {
            t_l_cpu /= self.per_object(bsize);
            t_l_dsk /= self.per_object(bsize);
        }

        let size = self.fs.size();
        let t_fw = if seq && bsize <= self.obj_size / 2. {
            // multiple writes aggregate into one object write
            self.fs.write(self.obj_size, size, false, per_disk, false, false) / self.per_object(bsize)
        } else if bsize > self.obj_size {
            self.fs.write(self.obj_size, size, false, per_disk, false, false) * (bsize / self.obj_size).ceil()
        } else {
            self.fs.write(bsize, size, false, per_disk, false, false)
        };
        let t_fs = t_l_dsk + t_fw;
        let t_hba = self.hba.write_time(bsize);
        let t_async = t_l_cpu + self.hba.write_cpu(bsize);

        let mut latency = t_net + t_sync;
        if bsize > self.write_buf {
            latency += t_hba + t_fs;
        }
        let cores = self.cores();
        Contention::new(NAME, descr, bsize, depth, latency)
            .queued(Resource::Net, t_net, self.num_nics)
            .queued(Resource::Cpu, t_sync + t_async, cores)
            .load_only(Resource::Fs, t_fs, self.num_disks)
            .queued(Resource::Hba, t_hba, self.num_hbas)
            .resolve(&mut self.warnings)
    }

    /// Receive, process and respond to a metadata request whose file system part costs `t_fs` and moves
    /// `md_bytes` through the HBA. Only `sync_fraction` of the file system time is waited for.
    fn metadata_op(&mut self, descr: String, depth: f64, t_fs: f64, md_bytes: f64, sync_fraction: f64) -> Estimate {
        let t_net = self.nic.read_time(self.min_msg) + self.nic.write_time(self.min_msg);
        let mut t_cpu = self.nic.read_cpu(self.min_msg) + self.nic.write_cpu(self.min_msg);
        t_cpu += self.metadata_us;
        let t_hba = if md_bytes > 0. {
            t_cpu += self.hba.read_cpu(md_bytes);
            self.hba.read_time(md_bytes)
        } else {
            0.
        };

        let latency = t_net + t_cpu + sync_fraction * (t_hba + t_fs);
        let cores = self.cores();
        Contention::new(NAME, descr, 1., depth, latency)
            .queued(Resource::Net, t_net, self.num_nics)
            .queued(Resource::Cpu, t_cpu, cores)
            .load_only(Resource::Fs, t_fs, self.num_disks)
            .queued(Resource::Hba, t_hba, self.num_hbas)
            .resolve(&mut self.warnings)
    }

    /// Expected performance of attribute reads, `cached_fraction` of which are served from memory.
    ///
    /// Bandwidth is reported in operations per second.
    pub fn getattr(&mut self, cached_fraction: f64, depth: f64) -> Estimate {
        let miss = 1. - cached_fraction.max(0.).min(1.);
        let per_disk = (depth / self.num_disks).max(1.);
        let t_fs = miss * self.fs.getattr(per_disk);
        let descr = format!("d={} getattrs", depth as u64);
        self.metadata_op(descr, depth, t_fs, miss * MD_SIZE, 1.)
    }

    /// Expected performance of attribute updates, `cached_fraction` of which need no inode read.
    ///
    /// Asynchronous updates are acknowledged before the file system is updated.
    pub fn setattr(&mut self, cached_fraction: f64, depth: f64, sync: bool) -> Estimate {
        let miss = 1. - cached_fraction.max(0.).min(1.);
        let per_disk = (depth / self.num_disks).max(1.);
        let t_fs = miss * self.fs.setattr(per_disk, sync);
        let descr = format!("d={} {} setattrs", depth as u64, if sync { "sync" } else { "async" });
        self.metadata_op(descr, depth, t_fs, miss * MD_SIZE, if sync { 1. } else { 0. })
    }

    /// Expected performance of a commit: a synchronous metadata flush.
    pub fn commit(&mut self) -> Estimate {
        let t_fs = self.fs.setattr(1., true);
        self.metadata_op("commits".to_string(), 1., t_fs, MD_SIZE, 1.)
    }

    /// Expected performance of creating one data object.
    pub fn create(&mut self) -> Estimate {
        let t_fs = self.fs.create(false);
        let estimate = self.metadata_op("creates".to_string(), 1., t_fs, MD_SIZE, 1.);
        log_debug!(self, "create: {:.0}us", estimate.latency);
        estimate
    }

    /// Expected performance of deleting one data object.
    pub fn delete(&mut self) -> Estimate {
        let t_fs = self.fs.delete(false);
        let estimate = self.metadata_op("deletes".to_string(), 1., t_fs, MD_SIZE, 1.);
        log_debug!(self, "delete: {:.0}us", estimate.latency);
        estimate
    }
}
