#![warn(missing_docs)]
#![doc = include_str!("../readme.md")]

pub mod datafs;
pub mod device;
pub mod filestore;
pub mod fs;
pub mod hdd;
pub mod poisson;
pub mod simfs;
pub mod ssd;

pub use datafs::{DataFs, DataFsSpec};
pub use device::{Device, DeviceKind, DeviceSpec, StorageDevice};
pub use filestore::FileStore;
pub use fs::FileSystem;
pub use hdd::{Hdd, HddParams};
pub use simfs::{FsKind, FsSpec, SimFs};
pub use ssd::Ssd;

#[cfg(test)]
mod tests;
