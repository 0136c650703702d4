#![warn(missing_docs)]
#![doc = include_str!("../readme.md")]

pub mod config;
pub mod contention;
pub mod dlm;
pub mod gateway;
pub mod rados;
pub mod server;

pub use config::{Config, ConfigError};
pub use contention::Contention;
pub use dlm::{Dlm, DlmSpec};
pub use gateway::{Gateway, GatewaySpec, WritePlan, WriteRegime};
pub use rados::{Rados, RadosSpec};
pub use server::{Server, ServerSpec};

#[cfg(test)]
mod tests;
