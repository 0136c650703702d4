//! Spinning disk model.
//!
//! Fairly accurate for random access, which is dominated by physics, and only a crude approximation for small
//! block sequential access, which is dominated by drive caching.

use storsim_core::error::require_positive;
use storsim_core::units::SECOND;
use storsim_core::InvalidSpecError;

/// Fundamental drive characteristics.
#[derive(Clone, Debug, PartialEq)]
pub struct HddParams {
    /// Optimistic read settle-down time (us).
    pub settle_read: f64,
    /// Extra settle-down penalty (us) for writes.
    pub write_delta: f64,
    /// Full stroke seek time (us).
    pub max_seek: f64,
    /// Average seek time (us), a third of the full stroke.
    pub avg_seek: f64,
    /// Maximum number of concurrently queued operations.
    pub nr_requests: f64,
    /// Drive does write-back (vs write-through) caching.
    pub do_writeback: bool,
    /// Drive does read-ahead caching.
    pub do_readahead: bool,
    /// Drive schedules queued requests to minimize rotational latency.
    pub sched_rotate: bool,
    /// Ideal read-ahead as a multiple of the request size.
    pub cache_multiplier: f64,
    /// Maximum number of tracks the cache holds for one stream.
    pub cache_max_tracks: f64,
    /// Maximum queue depth multiplier on the cached amount.
    pub cache_max_depth: f64,
}

impl HddParams {
    /// Enterprise state-of-the-art drive.
    pub fn enterprise() -> Self {
        Self {
            settle_read: 800.,
            write_delta: 600.,
            max_seek: 13000.,
            avg_seek: 5500.,
            nr_requests: 128.,
            do_writeback: true,
            do_readahead: true,
            sched_rotate: true,
            cache_multiplier: 96.,
            cache_max_tracks: 4.,
            cache_max_depth: 5.,
        }
    }

    /// Drive without caching or request scheduling and with pessimistic seek times.
    pub fn dumb() -> Self {
        Self {
            settle_read: 1000.,
            write_delta: 1000.,
            max_seek: 20000.,
            avg_seek: 8000.,
            nr_requests: 1.,
            do_writeback: false,
            do_readahead: false,
            sched_rotate: false,
            ..Self::enterprise()
        }
    }
}

impl Default for HddParams {
    fn default() -> Self {
        Self::enterprise()
    }
}

/// Spinning disk with geometry inferred from its rotational speed, media speed and head count.
#[derive(Clone, Debug)]
pub struct Hdd {
    desc: String,
    params: HddParams,
    rpm: f64,
    size: f64,
    media_speed: f64,
    heads: f64,
    trk_size: f64,
    cyl_size: f64,
    cylinders: f64,
}

impl Hdd {
    /// Creates enterprise disk model.
    ///
    /// * `rpm` - rotational speed.
    /// * `size` - usable capacity (bytes).
    /// * `media_speed` - media transfer rate (B/s).
    /// * `heads` - number of heads.
    pub fn new(rpm: f64, size: f64, media_speed: f64, heads: u32) -> Result<Self, InvalidSpecError> {
        Self::with_params(rpm, size, media_speed, heads, HddParams::enterprise())
            .map(|disk| disk.described(format!("{}RPM Disk", rpm as u64)))
    }

    /// Creates disk model without caching or request scheduling.
    pub fn dumb(rpm: f64, size: f64, media_speed: f64, heads: u32) -> Result<Self, InvalidSpecError> {
        Self::with_params(rpm, size, media_speed, heads, HddParams::dumb())
            .map(|disk| disk.described(format!("{}RPM Dumb Disk", rpm as u64)))
    }

    fn described(mut self, desc: String) -> Self {
        self.desc = desc;
        self
    }

    /// Creates disk model with explicit drive characteristics.
    pub fn with_params(
        rpm: f64,
        size: f64,
        media_speed: f64,
        heads: u32,
        params: HddParams,
    ) -> Result<Self, InvalidSpecError> {
        require_positive("disk", "rpm", rpm)?;
        require_positive("disk", "size", size)?;
        require_positive("disk", "media speed", media_speed)?;
        require_positive("disk", "heads", heads as f64)?;
        require_positive("disk", "nr_requests", params.nr_requests)?;

        let trk_size = media_speed / (rpm / 60.);
        let cyl_size = trk_size * heads as f64;
        let cylinders = size / cyl_size;
        if cylinders < 1. {
            return Err(InvalidSpecError::Inconsistent {
                component: "disk".to_string(),
                reason: format!("{} bytes is less than one {} byte cylinder", size, cyl_size),
            });
        }
        Ok(Self {
            desc: format!("{}RPM Disk", rpm as u64),
            params,
            rpm,
            size,
            media_speed,
            heads: heads as f64,
            trk_size,
            cyl_size,
            cylinders,
        })
    }

    /// Returns human-readable description, e.g. `"7200RPM Disk"`.
    pub fn desc(&self) -> &str {
        &self.desc
    }

    /// Returns drive characteristics.
    pub fn params(&self) -> &HddParams {
        &self.params
    }

    /// Returns rotational speed.
    pub fn rpm(&self) -> f64 {
        self.rpm
    }

    /// Returns usable capacity (bytes).
    pub fn size(&self) -> f64 {
        self.size
    }

    /// Returns media transfer rate (B/s).
    pub fn media_speed(&self) -> f64 {
        self.media_speed
    }

    /// Returns number of heads.
    pub fn heads(&self) -> f64 {
        self.heads
    }

    /// Returns track size (bytes).
    pub fn track_size(&self) -> f64 {
        self.trk_size
    }

    /// Returns cylinder size (bytes).
    pub fn cylinder_size(&self) -> f64 {
        self.cyl_size
    }

    /// Returns number of cylinders.
    pub fn cylinders(&self) -> f64 {
        self.cylinders
    }

    /// Returns the number of cylinders a byte range spans.
    pub fn cylinders_in(&self, bytes: f64) -> f64 {
        1. + bytes / self.cyl_size
    }

    /// Clamps requested queue depth to what the drive can queue.
    pub fn effective_depth(&self, depth: f64) -> f64 {
        depth.max(1.).min(self.params.nr_requests)
    }

    /// Time (us) to seek across `cyls` cylinders.
    ///
    /// Real seeks involve acceleration, deceleration and settle-down. The estimate is the lesser of two functions:
    /// long seeks are affine-linear in distance (cruising speed derived from average and full stroke times,
    /// extrapolated back from the full stroke), short seeks cost half a read settle-down per cylinder on top of
    /// one settle-down.
    pub fn seek_time(&self, cyls: f64, read: bool) -> f64 {
        let p = &self.params;
        if cyls < 1. {
            return 0.;
        }
        let travel = if cyls >= self.cylinders {
            p.max_seek
        } else {
            let delta_us = p.max_seek - p.avg_seek;
            let delta_cyl = 2. * self.cylinders / 3.;
            let us_per_cyl = delta_us / delta_cyl;
            let long_seek = p.max_seek - (self.cylinders - cyls) * us_per_cyl;
            let short_seek = p.settle_read + (cyls - 1.) * p.settle_read / 2.;
            short_seek.min(long_seek)
        };
        if read {
            travel
        } else {
            travel + p.write_delta
        }
    }

    /// Time (us) to transfer `bytes`, including settle-downs for the expected number of cylinder boundaries
    /// crossed. Track skew makes track overflow a non-issue.
    pub fn xfer_time(&self, bytes: f64, read: bool) -> f64 {
        let p = &self.params;
        // even cached data is ultimately limited by media speed
        let mut time = bytes * SECOND / self.media_speed;
        let crossings = bytes / self.cyl_size;
        time += crossings * if read { p.settle_read } else { p.settle_read + p.write_delta };
        time
    }

    /// Estimates how much a non-aggressive read-ahead (or write-back) cache holds for requests of `size` bytes.
    ///
    /// Thousands of lines of controller code implement this; the approximation only puts a box around the
    /// expected behavior.
    pub fn cache_size(&self, size: f64, read: bool, depth: f64) -> f64 {
        let p = &self.params;
        if (read && !p.do_readahead) || (!read && !p.do_writeback) {
            return 0.;
        }
        // don't try to get more than a track ahead
        if size > self.trk_size {
            return 0.;
        }
        let cached = size * p.cache_multiplier * depth.min(p.cache_max_depth);
        cached.min(p.cache_max_tracks * self.trk_size)
    }

    /// Time (us) a request is likely to wait for rotation, given caching and queued request scheduling.
    pub fn latency(&self, size: f64, read: bool, seq: bool, depth: f64) -> f64 {
        let p = &self.params;
        let mut l = SECOND / (self.rpm / 60.) / 2.;

        // how many of these operations the cache absorbs
        let c = self.cache_size(size, read, depth);
        let n = if c > size { c / size } else { 1. };

        if seq {
            if n > 1. {
                // one op in n spills out of the cache
                return l / n;
            }
            if depth > 1. {
                return l / depth;
            }
        } else if p.sched_rotate {
            if read || depth > n {
                // best among parallel requests
                l /= depth;
            } else if n > 1. {
                // best among cached writes
                l /= n;
            } else if c > 0. {
                // mere write-back is two request queueing
                l /= 2.;
            }
        }
        l
    }

    /// Average operation time (us) of a throughput test.
    ///
    /// Coincidental same-cylinder hits are ignored for random I/O.
    pub fn avg_time(&self, bsize: f64, file_size: f64, read: bool, seq: bool, depth: f64) -> f64 {
        let t_xfer = self.xfer_time(bsize, read);
        let depth = self.effective_depth(depth);
        let t_latency = self.latency(bsize, read, seq, depth);
        if seq {
            return t_xfer + t_latency;
        }
        let avg_cyls = self.cylinders_in(file_size) / (depth + 2.);
        t_xfer + t_latency + self.seek_time(avg_cyls, read)
    }
}
