#![warn(missing_docs)]
#![doc = include_str!("../readme.md")]

pub mod error;
pub mod estimate;
pub mod log;
pub mod units;
pub mod warnings;

pub use colored;
pub use error::InvalidSpecError;
pub use estimate::{Estimate, Load, Resource};
pub use warnings::Warnings;
