//! Data-driven file system model.
//!
//! Instead of simulating lower levels, returns times implied by measured fio throughputs. The table holds
//! bandwidths (B/s) under keys `"{seq|rand}-{read|write}-{4k|128k|4m}-d{1|32}"` and `create`/`delete` rates
//! (ops/s). Other block sizes are charged for their difference from the nearest measured size at the assumed
//! transfer speed, intermediate depths are interpolated in `log2(depth)`.

use std::collections::HashMap;

use serde::Deserialize;

use storsim_core::error::require_positive;
use storsim_core::units::{KB, MB, MEG, SECOND, TERA};
use storsim_core::InvalidSpecError;

use crate::fs::FileSystem;

const DEFAULT_SPEED: f64 = 140. * MEG;
const MAX_DEPTH: f64 = 32.;

/// Measured throughput table with its metadata.
#[derive(Clone, Debug, Deserialize)]
pub struct DataFsSpec {
    /// Where the numbers came from, used as description.
    pub source: String,
    /// Capacity of the measured device (bytes).
    #[serde(default)]
    pub size: Option<f64>,
    /// Assumed transfer speed (B/s) for block size adjustments.
    #[serde(default)]
    pub speed: Option<f64>,
    /// Measured rates by key.
    pub rates: HashMap<String, f64>,
}

impl DataFsSpec {
    /// Parses table from YAML.
    pub fn from_yaml(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }
}

/// File system whose performance is looked up in a table of measurements.
#[derive(Clone, Debug)]
pub struct DataFs {
    desc: String,
    size: f64,
    speed: f64,
    rates: HashMap<String, f64>,
}

fn bucket(bsize: f64) -> (&'static str, f64) {
    if bsize <= 32. * KB as f64 {
        ("4k", 4. * KB as f64)
    } else if bsize <= MB as f64 {
        ("128k", 128. * KB as f64)
    } else {
        ("4m", 4. * MB as f64)
    }
}

impl DataFs {
    /// Creates model from measurements, checking that every rate it may look up is present and positive.
    pub fn new(spec: &DataFsSpec) -> Result<Self, InvalidSpecError> {
        let component = format!("data fs {}", spec.source);
        let mut keys = vec!["create".to_string(), "delete".to_string()];
        for pattern in ["seq", "rand"] {
            for op in ["read", "write"] {
                for bs in ["4k", "128k", "4m"] {
                    for d in [1, 32] {
                        keys.push(format!("{}-{}-{}-d{}", pattern, op, bs, d));
                    }
                }
            }
        }
        for key in keys {
            match spec.rates.get(&key) {
                Some(&rate) => require_positive(&component, "measured rate", rate)?,
                None => {
                    return Err(InvalidSpecError::MissingMeasurement {
                        component: component.clone(),
                        key,
                    })
                }
            }
        }
        let speed = spec.speed.unwrap_or(DEFAULT_SPEED);
        require_positive(&component, "speed", speed)?;
        Ok(Self {
            desc: spec.source.clone(),
            size: spec.size.unwrap_or(2. * TERA),
            speed,
            rates: spec.rates.clone(),
        })
    }

    // validated on construction
    fn rate(&self, key: &str) -> f64 {
        self.rates.get(key).copied().unwrap_or(f64::NAN)
    }

    /// Time (us) implied by the measurements for one `op` ("read" or "write") of `bsize` bytes.
    pub fn time(&self, op: &str, seq: bool, bsize: f64, depth: f64) -> f64 {
        let pattern = if seq { "seq" } else { "rand" };
        let (bs, std_size) = bucket(bsize);
        let key = format!("{}-{}-{}-d", pattern, op, bs);

        let bw1 = self.rate(&format!("{}1", key));
        let bw32 = self.rate(&format!("{}32", key));
        let depth = depth.max(1.).min(MAX_DEPTH);
        let bw = bw1 + (bw32 - bw1) * depth.log2() / MAX_DEPTH.log2();

        SECOND * std_size / bw + SECOND * (bsize - std_size) / self.speed
    }
}

impl FileSystem for DataFs {
    fn desc(&self) -> &str {
        &self.desc
    }

    fn size(&self) -> f64 {
        self.size
    }

    // measurements are O_DIRECT, so direct is irrelevant
    fn read(&self, bsize: f64, _file_size: f64, seq: bool, depth: f64, _direct: bool) -> f64 {
        self.time("read", seq, bsize, depth)
    }

    fn write(&self, bsize: f64, _file_size: f64, seq: bool, depth: f64, _direct: bool, sync: bool) -> f64 {
        if sync {
            // not measured: one random metadata write plus the data write, no depth benefits
            self.time("write", false, bsize, 1.) + self.time("write", seq, bsize, 1.)
        } else {
            self.time("write", seq, bsize, depth)
        }
    }

    fn open(&self) -> f64 {
        self.time("read", false, 4096., 1.)
    }

    fn create(&self, _sync: bool) -> f64 {
        SECOND / self.rate("create")
    }

    fn delete(&self, _sync: bool) -> f64 {
        SECOND / self.rate("delete")
    }

    fn getattr(&self, depth: f64) -> f64 {
        self.time("read", false, 4096., depth)
    }

    fn setattr(&self, depth: f64, sync: bool) -> f64 {
        self.time("write", false, 4096., if sync { 1. } else { depth })
    }
}
