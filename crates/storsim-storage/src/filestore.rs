//! Object store model over a data file system and an optional journal.
//!
//! Estimates the overhead an object store adds to standard I/O patterns. These are throughput models: another
//! operation is assumed to follow immediately after the one being estimated.

use storsim_core::error::require_positive;
use storsim_core::units::GIG;
use storsim_core::{log_debug, log_warn, InvalidSpecError, Warnings};

use crate::fs::FileSystem;
use crate::poisson::pn_plus;

/// Unit of metadata read/write.
const MD_BSIZE: f64 = 4096.;
/// Size of a journal record header.
const J_HEADER: f64 = 4096.;
/// Unit of write aggregation.
const BLOCK_SZ: f64 = 512. * 1024.;
/// Flush interval (us).
const SYNC_TIME: f64 = 5_000_000.;
/// Fraction of the file system holding metadata.
const MD_FRACTION: f64 = 0.001;
/// Number of objects whose metadata is cached.
const MD_CACHE_SZ: f64 = 2500.;
/// Available data cache (bytes).
const RD_CACHE_SZ: f64 = GIG;
/// Cache hit rates above this are probably wrong.
const CACHE_WARN: f64 = 0.05;
/// Metadata updates per object write.
const MD_WRITES: f64 = 0.7;
/// Object count assumed by create and delete.
const DEFAULT_NOBJ: f64 = 2500.;
/// Large enough to avoid cache hits.
const HUGE: f64 = 1e12;

/// Object store simulation.
#[derive(Clone)]
pub struct FileStore {
    data_fs: Box<dyn FileSystem>,
    journal_fs: Option<Box<dyn FileSystem>>,
    journal_share: f64,
    md_seek: f64,
    seek: f64,
    warnings: Warnings,
}

impl FileStore {
    /// Creates object store over `data_fs`.
    ///
    /// * `journal_fs` - separate journal file system, `None` to journal on the data device.
    /// * `journal_share` - number of stores sharing the journal device.
    pub fn new(
        data_fs: Box<dyn FileSystem>,
        journal_fs: Option<Box<dyn FileSystem>>,
        journal_share: u32,
    ) -> Result<Self, InvalidSpecError> {
        require_positive("filestore", "journal share", journal_share as f64)?;
        let size = data_fs.size();
        Ok(Self {
            data_fs,
            journal_fs,
            journal_share: journal_share as f64,
            // bad approximations of typical seek distances
            md_seek: MD_FRACTION * size,
            seek: size,
            warnings: Warnings::new(),
        })
    }

    /// Returns component name used in logs.
    pub fn name(&self) -> &str {
        "filestore"
    }

    /// Returns human-readable description.
    pub fn desc(&self) -> String {
        match &self.journal_fs {
            Some(journal) => format!("{} data, {} journal", self.data_fs.desc(), journal.desc()),
            None => format!("{} data+journal", self.data_fs.desc()),
        }
    }

    /// Returns accumulated warnings.
    pub fn warnings(&self) -> &Warnings {
        &self.warnings
    }

    /// Removes and returns accumulated warnings.
    pub fn take_warnings(&mut self) -> Vec<String> {
        self.warnings.drain()
    }

    /// Expected metadata lookup cache miss rate.
    pub fn md_miss_rate(&self, nobj: f64) -> f64 {
        let r = MD_CACHE_SZ / nobj;
        if r < 1. {
            1. - r
        } else {
            0.
        }
    }

    /// Expected data cache miss rate.
    pub fn d_miss_rate(&mut self, nobj: f64, obj_size: f64) -> f64 {
        let r = RD_CACHE_SZ / (nobj * obj_size * self.journal_share);
        if r > CACHE_WARN {
            let msg = format!("{} x {} byte objects too small relative to data cache", nobj, obj_size);
            if self.warnings.warn_once("to data cache", msg.as_str()) {
                log_warn!(self, msg);
            }
        }
        if r < 1. {
            1. - r
        } else {
            0.
        }
    }

    /// Average time (us) of a `bsize` byte read from one of `nobj` objects of `obj_size` bytes.
    pub fn read(&mut self, bsize: f64, obj_size: f64, depth: f64, nobj: f64) -> f64 {
        let md_reads = self.md_miss_rate(nobj);
        let mt = self.data_fs.read(MD_BSIZE, self.seek, false, depth, false);
        let dt = self.data_fs.read(bsize, self.seek, false, depth, false) * self.d_miss_rate(nobj, obj_size);
        let t = dt + md_reads * mt;
        log_debug!(self, "read {} bytes: {:.0}us", bsize, t);
        t
    }

    /// Average time (us) of a `bsize` byte write to one of `nobj` objects of `obj_size` bytes.
    pub fn write(&mut self, bsize: f64, obj_size: f64, depth: f64, nobj: f64) -> f64 {
        let md_reads = self.md_miss_rate(nobj);
        let lt = md_reads * self.data_fs.read(MD_BSIZE, self.seek, false, depth, false);

        let journal = self
            .journal_fs
            .as_ref()
            .map(|journal| journal.write(J_HEADER + bsize, self.seek, false, depth, false, true));
        let journal = match journal {
            Some(t) => t,
            None => {
                // journal on the data device, everything synchronous
                let jt = self.data_fs.write(J_HEADER + bsize, self.seek, true, depth, false, true);
                let dt = self.data_fs.write(bsize, self.seek, false, depth, false, true);
                let dt = dt * self.d_miss_rate(nobj, obj_size);
                let mt = MD_WRITES * self.data_fs.write(MD_BSIZE, self.seek, false, depth, false, true);
                let t = lt + jt + dt + mt;
                log_debug!(self, "write {} bytes: {:.0}us", bsize, t);
                return t;
            }
        };
        let jt = journal * self.journal_share;
        let mut dt = self.data_fs.write(bsize, obj_size, false, depth, false, false);
        let mut mt = MD_WRITES * self.data_fs.write(MD_BSIZE, self.md_seek, false, depth, false, false);

        // expected metadata write aggregation
        let ops_per_sync = SYNC_TIME / (dt + mt);
        mt /= 1. + pn_plus(1. / nobj, ops_per_sync, 2);

        // expected data aggregation and cache hits
        let tot_blocks = nobj * obj_size / BLOCK_SZ;
        dt /= 1. + pn_plus(1. / tot_blocks, ops_per_sync, 2);
        dt *= self.d_miss_rate(nobj, obj_size);

        // journal and data writes proceed in parallel
        let t = if jt > dt + mt {
            let msg = format!(
                "journal caps throughput for {} parallel {} byte writes",
                self.journal_share, bsize
            );
            if self.warnings.warn_once("journal caps", msg.as_str()) {
                log_warn!(self, msg);
            }
            lt + jt
        } else {
            lt + dt + mt
        };
        log_debug!(self, "write {} bytes: {:.0}us", bsize, t);
        t
    }

    /// Average time (us) of an object creation.
    pub fn create(&mut self) -> f64 {
        self.data_fs.create(false) + self.write(MD_BSIZE, HUGE, 1., DEFAULT_NOBJ)
    }

    /// Average time (us) of an object deletion.
    pub fn delete(&mut self) -> f64 {
        self.data_fs.delete(false) + self.write(0., BLOCK_SZ, 1., DEFAULT_NOBJ)
    }
}
