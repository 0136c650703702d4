//! Storage device abstraction.

use serde::Deserialize;

use storsim_core::units::{GIG, MEG, TERA};
use storsim_core::InvalidSpecError;

use crate::hdd::Hdd;
use crate::ssd::Ssd;

/// Common interface of the simulated storage devices.
///
/// All times are averages (us) of one operation within a throughput test of the given shape.
pub trait StorageDevice {
    /// Returns human-readable device description.
    fn desc(&self) -> &str;

    /// Returns usable capacity (bytes).
    fn size(&self) -> f64;

    /// Returns maximum number of concurrently queued requests.
    fn max_depth(&self) -> f64;

    /// Average time (us) of an operation on `bsize` bytes within a `file_size` byte test file.
    fn avg_time(&self, bsize: f64, file_size: f64, read: bool, seq: bool, depth: f64) -> f64;

    /// Average read time (us).
    fn avg_read(&self, bsize: f64, file_size: f64, seq: bool, depth: f64) -> f64 {
        self.avg_time(bsize, file_size, true, seq, depth)
    }

    /// Average write time (us).
    fn avg_write(&self, bsize: f64, file_size: f64, seq: bool, depth: f64) -> f64 {
        self.avg_time(bsize, file_size, false, seq, depth)
    }
}

/// Type of storage device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    /// Enterprise spinning disk.
    Disk,
    /// Spinning disk without caching or request scheduling.
    Dumb,
    /// Solid state drive.
    Ssd,
}

/// Represents device specification.
///
/// Created with defaults for one of the [`DeviceKind`]s, adjusted with setters and passed to [`Device::new`].
/// Parameters which are meaningless for the kind are ignored.
#[derive(Clone, Debug)]
pub struct DeviceSpec {
    kind: DeviceKind,
    size: f64,
    speed: f64,
    rpm: f64,
    heads: u32,
    iops: f64,
    streams: u32,
}

impl DeviceSpec {
    /// 7200RPM 2TB disk with 150MB/s media and 10 heads.
    pub fn disk() -> Self {
        Self {
            kind: DeviceKind::Disk,
            size: 2. * TERA,
            speed: 150. * MEG,
            rpm: 7200.,
            heads: 10,
            iops: 0.,
            streams: 1,
        }
    }

    /// Same geometry as [`DeviceSpec::disk`] for a dumb drive.
    pub fn dumb() -> Self {
        Self {
            kind: DeviceKind::Dumb,
            ..Self::disk()
        }
    }

    /// 20GB SSD with 200MB/s transfer and 20000 single stream IOPS.
    pub fn ssd() -> Self {
        Self {
            kind: DeviceKind::Ssd,
            size: 20. * GIG,
            speed: 200. * MEG,
            rpm: 0.,
            heads: 1,
            iops: 20000.,
            streams: 1,
        }
    }

    /// Creates default specification for the given device kind.
    pub fn of_kind(kind: DeviceKind) -> Self {
        match kind {
            DeviceKind::Disk => Self::disk(),
            DeviceKind::Dumb => Self::dumb(),
            DeviceKind::Ssd => Self::ssd(),
        }
    }

    /// Returns device kind.
    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    /// Sets usable capacity (bytes).
    pub fn set_size(&mut self, size: f64) -> &mut Self {
        self.size = size;
        self
    }

    /// Sets media transfer rate (B/s).
    pub fn set_speed(&mut self, speed: f64) -> &mut Self {
        self.speed = speed;
        self
    }

    /// Sets rotational speed of a disk.
    pub fn set_rpm(&mut self, rpm: f64) -> &mut Self {
        self.rpm = rpm;
        self
    }

    /// Sets number of disk heads.
    pub fn set_heads(&mut self, heads: u32) -> &mut Self {
        self.heads = heads;
        self
    }

    /// Sets single stream SSD IOPS.
    pub fn set_iops(&mut self, iops: f64) -> &mut Self {
        self.iops = iops;
        self
    }

    /// Sets number of concurrent SSD streams.
    pub fn set_streams(&mut self, streams: u32) -> &mut Self {
        self.streams = streams;
        self
    }
}

impl Default for DeviceSpec {
    fn default() -> Self {
        Self::disk()
    }
}

/// Simulated storage device.
#[derive(Clone, Debug)]
pub enum Device {
    /// Enterprise spinning disk.
    Disk(Hdd),
    /// Spinning disk without caching or request scheduling.
    DumbDisk(Hdd),
    /// Solid state drive.
    Ssd(Ssd),
}

impl Device {
    /// Creates device model from given spec.
    pub fn new(spec: &DeviceSpec) -> Result<Self, InvalidSpecError> {
        Ok(match spec.kind {
            DeviceKind::Disk => Self::Disk(Hdd::new(spec.rpm, spec.size, spec.speed, spec.heads)?),
            DeviceKind::Dumb => Self::DumbDisk(Hdd::dumb(spec.rpm, spec.size, spec.speed, spec.heads)?),
            DeviceKind::Ssd => Self::Ssd(Ssd::new(spec.size, spec.speed, spec.iops, spec.streams)?),
        })
    }

    /// Returns the underlying disk model, if this is a spinning disk.
    pub fn as_disk(&self) -> Option<&Hdd> {
        match self {
            Self::Disk(hdd) | Self::DumbDisk(hdd) => Some(hdd),
            Self::Ssd(_) => None,
        }
    }

    /// Returns media transfer rate (B/s).
    pub fn media_speed(&self) -> f64 {
        match self {
            Self::Disk(hdd) | Self::DumbDisk(hdd) => hdd.media_speed(),
            Self::Ssd(ssd) => ssd.media_speed(),
        }
    }

    /// Time (us) to transfer `bytes` without any positioning.
    pub fn xfer_time(&self, bytes: f64, read: bool) -> f64 {
        match self {
            Self::Disk(hdd) | Self::DumbDisk(hdd) => hdd.xfer_time(bytes, read),
            Self::Ssd(ssd) => ssd.xfer_time(bytes, read),
        }
    }

    /// Time (us) to seek across `cyls` cylinders, zero for devices without moving parts.
    pub fn seek_time(&self, cyls: f64, read: bool) -> f64 {
        match self {
            Self::Disk(hdd) | Self::DumbDisk(hdd) => hdd.seek_time(cyls, read),
            Self::Ssd(_) => 0.,
        }
    }
}

impl StorageDevice for Device {
    fn desc(&self) -> &str {
        match self {
            Self::Disk(hdd) | Self::DumbDisk(hdd) => hdd.desc(),
            Self::Ssd(_) => "SSD",
        }
    }

    fn size(&self) -> f64 {
        match self {
            Self::Disk(hdd) | Self::DumbDisk(hdd) => hdd.size(),
            Self::Ssd(ssd) => ssd.size(),
        }
    }

    fn max_depth(&self) -> f64 {
        match self {
            Self::Disk(hdd) | Self::DumbDisk(hdd) => hdd.params().nr_requests,
            Self::Ssd(ssd) => ssd.streams(),
        }
    }

    fn avg_time(&self, bsize: f64, file_size: f64, read: bool, seq: bool, depth: f64) -> f64 {
        match self {
            Self::Disk(hdd) | Self::DumbDisk(hdd) => hdd.avg_time(bsize, file_size, read, seq, depth),
            Self::Ssd(ssd) => ssd.avg_time(bsize, read, depth),
        }
    }
}
