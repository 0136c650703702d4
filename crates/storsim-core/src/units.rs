//! Measurement units and conversions.
//!
//! All times are tracked in microseconds, all sizes in bytes and all rates in bytes per second.
//! The constants are embedded directly into the model formulas (e.g. `bytes * SECOND / bandwidth`).

/// Decimal million (10^6).
pub const MEG: f64 = 1000. * 1000.;
/// Decimal billion (10^9).
pub const GIG: f64 = MEG * 1000.;
/// Decimal trillion (10^12).
pub const TERA: f64 = GIG * 1000.;

/// Kilobyte (2^10 bytes).
pub const KB: u64 = 1024;
/// Megabyte (2^20 bytes).
pub const MB: u64 = KB * 1024;
/// Gigabyte (2^30 bytes).
pub const GB: u64 = MB * 1024;
/// Terabyte (2^40 bytes).
pub const TB: u64 = GB * 1024;

/// One second expressed in the internal time unit (microseconds).
pub const SECOND: f64 = 1_000_000.;

/// Number of kilobytes in `bytes`.
pub fn kb(bytes: f64) -> f64 {
    bytes / KB as f64
}

/// Number of decimal millions in `value`.
pub fn meg(value: f64) -> f64 {
    value / MEG
}

/// Number of decimal billions in `value`.
pub fn gig(value: f64) -> f64 {
    value / GIG
}

/// Converts time per operation (us) into operations per second.
pub fn iops(us: f64) -> f64 {
    SECOND / us
}

/// Converts block size and time per operation (us) into bandwidth (bytes/s).
pub fn bandwidth(bsize: f64, us: f64) -> f64 {
    bsize * SECOND / us
}
