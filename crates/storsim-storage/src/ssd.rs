//! Solid state drive model.

use storsim_core::error::require_positive;
use storsim_core::units::SECOND;
use storsim_core::InvalidSpecError;

// allocation overhead
const WRITE_PENALTY: f64 = 1.05;

/// Flash device: no mechanical delays, throughput bounded by media speed and per-stream IOPS.
///
/// The IOPS limit is a single number per stream while real devices scale it with queue depth.
#[derive(Clone, Debug)]
pub struct Ssd {
    size: f64,
    media_speed: f64,
    max_iops: f64,
    streams: f64,
}

impl Ssd {
    /// Creates SSD model.
    ///
    /// * `size` - usable capacity (bytes).
    /// * `media_speed` - transfer rate (B/s).
    /// * `iops` - maximum single stream operations per second.
    /// * `streams` - maximum number of concurrent streams.
    pub fn new(size: f64, media_speed: f64, iops: f64, streams: u32) -> Result<Self, InvalidSpecError> {
        require_positive("ssd", "size", size)?;
        require_positive("ssd", "media speed", media_speed)?;
        require_positive("ssd", "iops", iops)?;
        require_positive("ssd", "streams", streams as f64)?;
        Ok(Self {
            size,
            media_speed,
            max_iops: iops,
            streams: streams as f64,
        })
    }

    /// Returns usable capacity (bytes).
    pub fn size(&self) -> f64 {
        self.size
    }

    /// Returns transfer rate (B/s).
    pub fn media_speed(&self) -> f64 {
        self.media_speed
    }

    /// Returns single stream IOPS limit.
    pub fn max_iops(&self) -> f64 {
        self.max_iops
    }

    /// Returns number of concurrent streams, which plays the role of the request queue limit.
    pub fn streams(&self) -> f64 {
        self.streams
    }

    /// Time (us) to transfer `bytes`.
    pub fn xfer_time(&self, bytes: f64, read: bool) -> f64 {
        let t = bytes * SECOND / self.media_speed;
        if read {
            t
        } else {
            t * WRITE_PENALTY
        }
    }

    /// Average operation time (us), independent of access pattern and file size.
    pub fn avg_time(&self, bsize: f64, read: bool, depth: f64) -> f64 {
        let setup = SECOND / self.max_iops / depth.max(1.).min(self.streams);
        setup + self.xfer_time(bsize, read)
    }
}
