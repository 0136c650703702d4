#![warn(missing_docs)]
#![doc = include_str!("../readme.md")]

pub mod cpu;
pub mod interface;
pub mod queue;

pub use cpu::{Cpu, CpuSpec};
pub use interface::{Interface, InterfaceKind, InterfaceSpec};
pub use queue::queue_length;
