//! Network interface and host bus adapter model.
//!
//! Covers both the transfer time through the device and the software cost (protocol stack, DMA setup,
//! data copies) the attached processor pays to use it.

use std::rc::Rc;

use serde::Deserialize;

use storsim_core::error::require_positive;
use storsim_core::units::{GIG, SECOND};
use storsim_core::InvalidSpecError;

use crate::cpu::Cpu;
use crate::queue::queue_length;

/// Type of interface, which determines the default costs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InterfaceKind {
    /// Network interface card with a software TCP/IP stack.
    Nic,
    /// Host bus adapter.
    Hba,
}

/// Represents interface specification.
///
/// Created with [`InterfaceSpec::nic`] or [`InterfaceSpec::hba`] and then passed to [`Interface::new`].
#[derive(Clone, Debug)]
pub struct InterfaceSpec {
    kind: InterfaceKind,
    name: String,
    bandwidth: f64,
    min_latency: f64,
    cpu_per_op: f64,
    cpu_multiplier: f64,
    mem_multiplier: f64,
}

impl InterfaceSpec {
    /// Creates 10Gb NIC specification.
    pub fn nic() -> Self {
        // software TCP/IP is pretty expensive
        Self {
            kind: InterfaceKind::Nic,
            name: "NIC".to_string(),
            bandwidth: 10. * GIG,
            min_latency: 5.,
            cpu_per_op: 3.,
            cpu_multiplier: 5.,
            mem_multiplier: 2.,
        }
    }

    /// Creates 16Gb HBA specification.
    pub fn hba() -> Self {
        Self {
            kind: InterfaceKind::Hba,
            name: "HBA".to_string(),
            bandwidth: 16. * GIG,
            min_latency: 1.,
            cpu_per_op: 0.,
            cpu_multiplier: 0.,
            mem_multiplier: 0.,
        }
    }

    /// Creates default specification for the given interface kind.
    pub fn of_kind(kind: InterfaceKind) -> Self {
        match kind {
            InterfaceKind::Nic => Self::nic(),
            InterfaceKind::Hba => Self::hba(),
        }
    }

    /// Sets device name.
    pub fn set_name(&mut self, name: &str) -> &mut Self {
        self.name = name.to_string();
        self
    }

    /// Sets line rate (bits/s).
    pub fn set_bandwidth(&mut self, bandwidth: f64) -> &mut Self {
        self.bandwidth = bandwidth;
        self
    }

    /// Sets minimum time (us) of a null transfer.
    pub fn set_min_latency(&mut self, min_latency: f64) -> &mut Self {
        self.min_latency = min_latency;
        self
    }

    /// Sets fixed CPU time (us) spent on every transfer.
    pub fn set_cpu_per_op(&mut self, cpu_per_op: f64) -> &mut Self {
        self.cpu_per_op = cpu_per_op;
        self
    }

    /// Sets per-byte multipliers on processing and memory access time.
    pub fn set_multipliers(&mut self, cpu_multiplier: f64, mem_multiplier: f64) -> &mut Self {
        self.cpu_multiplier = cpu_multiplier;
        self.mem_multiplier = mem_multiplier;
        self
    }
}

/// NIC or HBA model attached to a processor.
#[derive(Clone, Debug)]
pub struct Interface {
    kind: InterfaceKind,
    desc: String,
    max_read_bw: f64,
    max_write_bw: f64,
    min_read_latency: f64,
    min_write_latency: f64,
    cpu_per_read: f64,
    cpu_per_write: f64,
    cpu_read_x: f64,
    cpu_write_x: f64,
    mem_read_x: f64,
    mem_write_x: f64,
    cpu: Rc<Cpu>,
}

impl Interface {
    /// Creates interface model from given spec, attached to `cpu`.
    pub fn new(spec: &InterfaceSpec, cpu: Rc<Cpu>) -> Result<Self, InvalidSpecError> {
        require_positive(&spec.name, "bandwidth", spec.bandwidth)?;
        if spec.min_latency < 0. || spec.cpu_per_op < 0. || spec.cpu_multiplier < 0. || spec.mem_multiplier < 0. {
            return Err(InvalidSpecError::Inconsistent {
                component: spec.name.clone(),
                reason: "latency and cost parameters must not be negative".to_string(),
            });
        }
        let bytes_per_sec = spec.bandwidth / 8.;
        Ok(Self {
            kind: spec.kind,
            desc: format!("{}Gb {}", (spec.bandwidth / GIG).round(), spec.name),
            max_read_bw: bytes_per_sec,
            max_write_bw: bytes_per_sec,
            min_read_latency: spec.min_latency,
            min_write_latency: spec.min_latency,
            cpu_per_read: spec.cpu_per_op,
            cpu_per_write: spec.cpu_per_op,
            cpu_read_x: spec.cpu_multiplier,
            cpu_write_x: spec.cpu_multiplier,
            mem_read_x: spec.mem_multiplier,
            mem_write_x: spec.mem_multiplier,
            cpu,
        })
    }

    /// Returns interface kind.
    pub fn kind(&self) -> InterfaceKind {
        self.kind
    }

    /// Returns human-readable description, e.g. `"10Gb NIC"`.
    pub fn desc(&self) -> &str {
        &self.desc
    }

    /// Returns the processor this interface is attached to.
    pub fn cpu(&self) -> &Cpu {
        &self.cpu
    }

    /// Returns maximum receive bandwidth (B/s).
    pub fn max_read_bw(&self) -> f64 {
        self.max_read_bw
    }

    /// Returns maximum transmit bandwidth (B/s).
    pub fn max_write_bw(&self) -> f64 {
        self.max_write_bw
    }

    /// Returns minimum latency (us) of a null receive.
    pub fn min_read_latency(&self) -> f64 {
        self.min_read_latency
    }

    /// Returns minimum latency (us) of a null transmit.
    pub fn min_write_latency(&self) -> f64 {
        self.min_write_latency
    }

    /// Returns elapsed time (us) to receive `bytes`.
    pub fn read_time(&self, bytes: f64) -> f64 {
        self.min_read_latency + bytes * SECOND / self.max_read_bw
    }

    /// Returns elapsed time (us) to transmit `bytes`.
    pub fn write_time(&self, bytes: f64) -> f64 {
        self.min_write_latency + bytes * SECOND / self.max_write_bw
    }

    /// Returns CPU time (us) spent to receive `bytes`.
    pub fn read_cpu(&self, bytes: f64) -> f64 {
        // DMA start/finish
        let mut cpu = self.cpu.dma_us() + self.cpu.dispatch_us();
        cpu += self.cpu_per_read;
        cpu += self.mem_read_x * self.cpu.mem_read(bytes);
        cpu += self.cpu_read_x * self.cpu.process(bytes);
        cpu
    }

    /// Returns CPU time (us) spent to transmit `bytes`.
    pub fn write_cpu(&self, bytes: f64) -> f64 {
        let mut cpu = self.cpu.dma_us() + self.cpu.dispatch_us();
        cpu += self.cpu_per_write;
        cpu += self.mem_write_x * self.cpu.mem_write(bytes);
        cpu += self.cpu_write_x * self.cpu.process(bytes);
        cpu
    }

    /// Returns the average queue depth at utilization `rho`, see [`queue_length`].
    pub fn queue_length(&self, rho: f64, max_depth: f64) -> f64 {
        queue_length(rho, max_depth)
    }
}
