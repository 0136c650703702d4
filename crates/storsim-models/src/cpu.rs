//! Processor cost model.

use storsim_core::error::require_positive;
use storsim_core::units::{GIG, MEG, SECOND};
use storsim_core::InvalidSpecError;

use crate::queue::queue_length;

const DEFAULT_CORES: u32 = 1;
const DEFAULT_CLOCK_SPEED: f64 = 3. * GIG;
const DEFAULT_MEMORY_SPEED: f64 = 1600. * MEG;
const DEFAULT_HYPERTHREAD: f64 = 1.3;
const BUS_WIDTH: f64 = 8.;

// cycle costs of common kernel paths
const INTERRUPT_CYCLES: f64 = 30000.;
const DISPATCH_CYCLES: f64 = 100000.;
const DMA_CYCLES: f64 = 30000.;

/// Represents processor specification.
///
/// Is filled by user and then passed to [`Cpu::new`].
#[derive(Clone, Debug)]
pub struct CpuSpec {
    name: String,
    cores: u32,
    clock_speed: f64,
    memory_speed: f64,
    hyperthread: f64,
}

impl Default for CpuSpec {
    /// Creates a generic single core 3GHz processor with DDR-1600 memory.
    fn default() -> Self {
        Self {
            name: "generic".to_string(),
            cores: DEFAULT_CORES,
            clock_speed: DEFAULT_CLOCK_SPEED,
            memory_speed: DEFAULT_MEMORY_SPEED,
            hyperthread: DEFAULT_HYPERTHREAD,
        }
    }
}

impl CpuSpec {
    /// Sets processor model name.
    pub fn set_name(&mut self, name: &str) -> &mut Self {
        self.name = name.to_string();
        self
    }

    /// Sets number of cores per chip.
    pub fn set_cores(&mut self, cores: u32) -> &mut Self {
        self.cores = cores;
        self
    }

    /// Sets clock speed (Hz).
    pub fn set_clock_speed(&mut self, clock_speed: f64) -> &mut Self {
        self.clock_speed = clock_speed;
        self
    }

    /// Sets memory transfer rate (transfers/s), e.g. `1600 * MEG` for DDR-1600.
    pub fn set_memory_speed(&mut self, memory_speed: f64) -> &mut Self {
        self.memory_speed = memory_speed;
        self
    }

    /// Sets hyperthreading throughput multiplier.
    pub fn set_hyperthread(&mut self, hyperthread: f64) -> &mut Self {
        self.hyperthread = hyperthread;
        self
    }
}

/// Processor model.
///
/// Shared by reference among all components running on the same node, which models cores shared across roles.
#[derive(Clone, Debug)]
pub struct Cpu {
    name: String,
    desc: String,
    cores: u32,
    hyperthread: f64,
    bus_bw: f64,
    mem_bw: f64,
    intr_us: f64,
    disp_us: f64,
    dma_us: f64,
}

impl Cpu {
    /// Creates processor model from given spec.
    pub fn new(spec: &CpuSpec) -> Result<Self, InvalidSpecError> {
        let component = format!("cpu {}", spec.name);
        require_positive(&component, "cores", spec.cores as f64)?;
        require_positive(&component, "clock speed", spec.clock_speed)?;
        require_positive(&component, "memory speed", spec.memory_speed)?;
        require_positive(&component, "hyperthread multiplier", spec.hyperthread)?;

        let mhz = spec.clock_speed / MEG;
        Ok(Self {
            name: spec.name.clone(),
            desc: format!("{:4.1}Ghz {}", spec.clock_speed / GIG, spec.name),
            cores: spec.cores,
            hyperthread: spec.hyperthread,
            bus_bw: spec.clock_speed * BUS_WIDTH,
            mem_bw: spec.memory_speed * BUS_WIDTH,
            intr_us: INTERRUPT_CYCLES / mhz,
            disp_us: DISPATCH_CYCLES / mhz,
            dma_us: DMA_CYCLES / mhz,
        })
    }

    /// Returns processor model name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns human-readable description, e.g. `" 3.3Ghz Xeon"`.
    pub fn desc(&self) -> &str {
        &self.desc
    }

    /// Returns number of cores per chip.
    pub fn cores(&self) -> u32 {
        self.cores
    }

    /// Returns hyperthreading multiplier.
    pub fn hyperthread(&self) -> f64 {
        self.hyperthread
    }

    /// Returns the number of effectively available cores on `chips` processors.
    pub fn available_cores(&self, chips: u32) -> f64 {
        chips as f64 * self.cores as f64 * self.hyperthread
    }

    /// Returns maximum bus transfer rate (B/s).
    pub fn bus_bandwidth(&self) -> f64 {
        self.bus_bw
    }

    /// Returns maximum memory transfer rate (B/s).
    pub fn memory_bandwidth(&self) -> f64 {
        self.mem_bw
    }

    /// Returns interrupt service time (us).
    pub fn interrupt_us(&self) -> f64 {
        self.intr_us
    }

    /// Returns thread dispatch time (us).
    pub fn dispatch_us(&self) -> f64 {
        self.disp_us
    }

    /// Returns DMA setup time (us).
    pub fn dma_us(&self) -> f64 {
        self.dma_us
    }

    fn limiting_bandwidth(&self) -> f64 {
        self.bus_bw.min(self.mem_bw)
    }

    /// Returns time (us) to read `bytes` of uncached memory.
    pub fn mem_read(&self, bytes: f64) -> f64 {
        bytes * SECOND / self.limiting_bandwidth()
    }

    /// Returns time (us) to write `bytes` of memory.
    pub fn mem_write(&self, bytes: f64) -> f64 {
        bytes * SECOND / self.limiting_bandwidth()
    }

    /// Returns time (us) to process `bytes` of data.
    pub fn process(&self, bytes: f64) -> f64 {
        bytes * SECOND / self.limiting_bandwidth()
    }

    /// Returns the average run queue length at core utilization `rho`, see [`queue_length`].
    pub fn queue_length(&self, rho: f64, max_depth: f64) -> f64 {
        queue_length(rho, max_depth)
    }
}
