//! Parametric file system model.
//!
//! Rather than simulating file system internals, the model charges the metadata overhead a file system imposes on
//! each data operation. The number of metadata reads (writes) per data read (write) is an affine-linear function of
//! the block size defined by its values at 4KB and 4MB. Sequential access finds most metadata in cache, which is
//! modeled by a second function giving the fraction of metadata references that still go to the device.
//!
//! Presets for BTRFS, XFS and ZFS are curve fits of `O_DIRECT` fio runs (sequential and random, 4K/128K/4M blocks,
//! depths 1 to 32). An `age` in `[0, 1]` crudely simulates fragmentation.

use serde::Deserialize;

use storsim_core::error::require_positive;
use storsim_core::units::MB;
use storsim_core::InvalidSpecError;

use crate::device::{Device, StorageDevice};
use crate::fs::FileSystem;

const SMALL: f64 = 4096.;
const LARGE: f64 = 4. * MB as f64;

/// Affine-linear function of the block size through its values at 4KB and 4MB.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Curve {
    /// Value for 4KB blocks.
    pub small: f64,
    /// Value for 4MB blocks.
    pub large: f64,
}

impl Curve {
    /// Creates function with given 4KB and 4MB values.
    pub const fn new(small: f64, large: f64) -> Self {
        Self { small, large }
    }

    /// Interpolates (or extrapolates) the value for `bsize` byte blocks.
    pub fn at(&self, bsize: f64) -> f64 {
        let slope = (self.large - self.small) / (LARGE - SMALL);
        self.small + (bsize - SMALL) * slope
    }

    fn scale(&mut self, small: f64, large: f64) {
        self.small *= small;
        self.large *= large;
    }
}

/// Calibrated file system type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FsKind {
    /// Generic BSD-like file system with boring defaults.
    Bsd,
    /// BTRFS, calibrated on Dec'12 customer results.
    Btrfs,
    /// XFS, calibrated on Jan'13 customer results.
    Xfs,
    /// ZFS. The values are a format sample and were never calibrated.
    Zfs,
}

/// Represents file system specification.
#[derive(Clone, Debug)]
pub struct FsSpec {
    kind: FsKind,
    age: f64,
}

impl Default for FsSpec {
    /// Creates a fresh XFS specification.
    fn default() -> Self {
        Self {
            kind: FsKind::Xfs,
            age: 0.,
        }
    }
}

impl FsSpec {
    /// Creates a fresh file system specification of given type.
    pub fn new(kind: FsKind) -> Self {
        Self { kind, age: 0. }
    }

    /// Sets file system type.
    pub fn set_kind(&mut self, kind: FsKind) -> &mut Self {
        self.kind = kind;
        self
    }

    /// Sets file system age in `[0, 1]`.
    pub fn set_age(&mut self, age: f64) -> &mut Self {
        self.age = age;
        self
    }
}

/// Parametric file system over a single device.
#[derive(Clone, Debug)]
pub struct SimFs {
    desc: String,
    device: Device,
    /// Metadata reads per block read.
    md_read: Curve,
    /// Metadata writes per block write.
    md_write: Curve,
    /// Fraction of metadata references requiring reads on sequential access.
    seq_read: Curve,
    /// Fraction of metadata updates requiring writes on sequential access.
    seq_write: Curve,
    /// Parallelism limit for direct reads.
    max_dir_r: Curve,
    /// Parallelism limit for direct writes.
    max_dir_w: Curve,
    md_size: f64,
    max_shard: f64,
    seq_shard: bool,
    flush_bytes: f64,
    flush_time: f64,
    flush_max: f64,
    md_seek: f64,
    md_open: f64,
    md_create: f64,
    md_delete: f64,
}

impl SimFs {
    /// Creates file system model of given type on `device`.
    pub fn new(device: Device, spec: &FsSpec) -> Result<Self, InvalidSpecError> {
        if !(0. ..=1.).contains(&spec.age) {
            return Err(InvalidSpecError::Inconsistent {
                component: "file system".to_string(),
                reason: format!("age must be within [0, 1] (got {})", spec.age),
            });
        }
        let mut fs = Self::bsd(device, 0.5);
        match spec.kind {
            FsKind::Bsd => {}
            FsKind::Btrfs => fs.make_btrfs(spec.age),
            FsKind::Xfs => fs.make_xfs(),
            FsKind::Zfs => {
                fs.make_xfs();
                fs.md_seek = 0.;
            }
        }
        let name = match spec.kind {
            FsKind::Bsd => "BSD",
            FsKind::Btrfs => "BTRFS",
            FsKind::Xfs => "XFS",
            FsKind::Zfs => "ZFS",
        };
        fs.desc = if spec.age > 0. {
            format!("{}({:3.1})", name, spec.age)
        } else {
            name.to_string()
        };
        require_positive(&fs.desc, "max shard", fs.max_shard)?;
        Ok(fs)
    }

    /// Default parameters, with data to metadata seeks spanning `md_span` of the device.
    fn bsd(device: Device, md_span: f64) -> Self {
        let size = device.size();
        Self {
            desc: "BSD".to_string(),
            device,
            md_read: Curve::new(0.001, 1.0),
            md_write: Curve::new(0.001, 2.0),
            seq_read: Curve::new(0.001, 0.001),
            seq_write: Curve::new(0.001, 0.001),
            max_dir_r: Curve::new(32., 32.),
            max_dir_w: Curve::new(32., 32.),
            md_size: 4096.,
            max_shard: 4096.,
            seq_shard: false,
            flush_bytes: 100_000_000.,
            flush_time: 500_000.,
            flush_max: 128.,
            md_seek: md_span * size,
            // directory read, the rest is cached
            md_open: 1.,
            // parent directory, directory inode, new inode
            md_create: 3.,
            // parent directory, deleted inode
            md_delete: 2.,
        }
    }

    fn make_btrfs(&mut self, age: f64) {
        self.flush_time = 100_000.;
        self.max_shard = LARGE;
        self.md_read = Curve::new(0.10, 0.45);
        self.md_write = Curve::new(0.11, 0.30);
        self.seq_read = Curve::new(0.0001, 0.001);
        self.seq_write = Curve::new(0.0001, 0.001);

        if age > 0. {
            self.md_read.scale(1. + 30. * age, 1. + age);
            self.md_write.scale(1., 1. + 70. * age);
            self.seq_read.scale(1. + 50. * age, 1. + 7000. * age);
            self.seq_write.scale(1. + 50. * age, 1. + 7000. * age);
            let shifts = (age / 0.2).ceil() as i32;
            self.max_shard /= 2f64.powi(shifts);
        }
    }

    fn make_xfs(&mut self) {
        self.max_shard = LARGE;
        self.seq_shard = false;
        self.flush_max = 16.;
        self.md_read = Curve::new(0.08, 1.05);
        self.md_write = Curve::new(0.05, 1.30);
        self.seq_read = Curve::new(0.012, 0.40);
        self.seq_write = Curve::new(0.095, 0.60);
        self.max_dir_r = Curve::new(32., 1.);
        self.max_dir_w = Curve::new(1., 1.);
    }

    /// Returns the underlying device.
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Returns largest contiguous allocation unit (bytes).
    pub fn max_shard(&self) -> f64 {
        self.max_shard
    }

    /// Write depth resulting from cache flushes of `bsize` byte writes taking `time` us of I/O each.
    pub fn flush_depth(&self, bsize: f64, time: f64) -> f64 {
        // writes accumulated between syncs
        let mut d = self.flush_time / time;
        // large writes force their own flush
        if bsize > 0. && self.flush_bytes > bsize * d {
            d = self.flush_bytes / bsize;
        }
        d.max(1.).min(self.flush_max)
    }

    /// Splits a request into the shards the allocator can place contiguously.
    fn shards(&self, bsize: f64) -> (f64, f64) {
        if bsize > self.max_shard {
            (bsize / self.max_shard, self.max_shard)
        } else {
            (1., bsize)
        }
    }

    fn md_read_time(&self, depth: f64) -> f64 {
        self.device.avg_read(self.md_size, self.md_seek, false, depth)
    }

    fn md_write_time(&self, depth: f64) -> f64 {
        self.device.avg_write(self.md_size, self.md_seek, false, depth)
    }

    /// Metadata write depth of buffered updates.
    fn md_flush_depth(&self) -> f64 {
        self.flush_depth(self.md_size, self.md_write_time(1.))
    }
}

impl FileSystem for SimFs {
    fn desc(&self) -> &str {
        &self.desc
    }

    fn size(&self) -> f64 {
        self.device.size()
    }

    fn read(&self, bsize: f64, file_size: f64, seq: bool, depth: f64, direct: bool) -> f64 {
        let (shards, bsize) = self.shards(bsize);

        // effective parallelism the device sees
        let mut d = depth * shards;
        if direct {
            d = d.min(self.max_dir_r.at(bsize));
        }

        // first read is seq per op, shard reads are seq per fs
        let mut time = self.device.avg_read(bsize, file_size, seq, d);
        if seq || shards == 1. {
            time *= shards;
        } else {
            time += (shards - 1.) * self.device.avg_read(bsize, file_size, self.seq_shard, d);
        }

        let mut md_reads = shards * self.md_read.at(bsize);
        if seq {
            md_reads *= self.seq_read.at(bsize);
        }
        time + md_reads * self.md_read_time(d)
    }

    fn write(&self, bsize: f64, file_size: f64, seq: bool, depth: f64, direct: bool, sync: bool) -> f64 {
        let (shards, bsize) = self.shards(bsize);

        let mut d = depth * shards;
        if !sync && !direct {
            let t = shards * self.device.avg_write(bsize, file_size, seq, d);
            d = self.flush_depth(bsize * shards, t);
        } else if direct {
            d = d.min(self.max_dir_w.at(bsize));
        }

        let mut time = self.device.avg_write(bsize, file_size, seq, d);
        if seq || shards == 1. {
            time *= shards;
        } else {
            time += (shards - 1.) * self.device.avg_write(bsize, file_size, self.seq_shard, d);
        }

        let mut md_writes = shards * self.md_write.at(bsize);
        if seq {
            md_writes *= self.seq_write.at(bsize);
        }
        if sync {
            // inode update does not come for free and is not parallelized
            md_writes += 1.;
            d = 1.;
        }
        time + md_writes * self.md_write_time(d)
    }

    fn open(&self) -> f64 {
        self.md_open * self.md_read_time(1.)
    }

    fn create(&self, sync: bool) -> f64 {
        let d = if sync { 1. } else { self.md_flush_depth() };
        self.md_create * self.md_write_time(d)
    }

    fn delete(&self, sync: bool) -> f64 {
        let d = if sync { 1. } else { self.md_flush_depth() };
        self.md_delete * self.md_write_time(d)
    }

    fn getattr(&self, depth: f64) -> f64 {
        self.md_read_time(depth)
    }

    fn setattr(&self, depth: f64, sync: bool) -> f64 {
        let d = if sync { depth } else { depth.max(self.md_flush_depth()) };
        self.md_write_time(d)
    }
}
