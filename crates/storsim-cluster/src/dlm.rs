//! Distributed lock manager model.

use std::rc::Rc;

use storsim_core::error::require_positive;
use storsim_core::{log_debug, Estimate, InvalidSpecError, Resource, Warnings};
use storsim_models::{Cpu, Interface};

use crate::contention::Contention;

const NAME: &str = "DLM";

/// Represents lock manager specification.
#[derive(Clone, Debug)]
pub struct DlmSpec {
    num_nics: u32,
    num_cpus: u32,
    min_msg: f64,
    lock_us: f64,
}

impl Default for DlmSpec {
    fn default() -> Self {
        Self {
            num_nics: 1,
            num_cpus: 1,
            min_msg: 128.,
            lock_us: 1.,
        }
    }
}

impl DlmSpec {
    /// Sets number of NICs.
    pub fn set_num_nics(&mut self, num_nics: u32) -> &mut Self {
        self.num_nics = num_nics;
        self
    }

    /// Sets number of processor chips.
    pub fn set_num_cpus(&mut self, num_cpus: u32) -> &mut Self {
        self.num_cpus = num_cpus;
        self
    }

    /// Sets size of lock request and response messages (bytes).
    pub fn set_min_msg(&mut self, min_msg: f64) -> &mut Self {
        self.min_msg = min_msg;
        self
    }

    /// Sets CPU time (us) to handle one lock.
    pub fn set_lock_us(&mut self, lock_us: f64) -> &mut Self {
        self.lock_us = lock_us;
        self
    }
}

/// Lock manager serving uncontested locks.
///
/// Lock persistence and conflicts are not modeled, so no queueing is charged. Heavily loaded NICs or CPUs are
/// still reported in the warnings.
#[derive(Clone)]
pub struct Dlm {
    nic: Interface,
    cpu: Rc<Cpu>,
    num_nics: f64,
    num_cpus: u32,
    min_msg: f64,
    lock_us: f64,
    warnings: Warnings,
}

impl Dlm {
    /// Creates lock manager model.
    pub fn new(spec: &DlmSpec, nic: Interface, cpu: Rc<Cpu>) -> Result<Self, InvalidSpecError> {
        require_positive(NAME, "number of NICs", spec.num_nics as f64)?;
        require_positive(NAME, "number of CPUs", spec.num_cpus as f64)?;
        require_positive(NAME, "minimum message", spec.min_msg)?;
        Ok(Self {
            nic,
            cpu,
            num_nics: spec.num_nics as f64,
            num_cpus: spec.num_cpus,
            min_msg: spec.min_msg,
            lock_us: spec.lock_us,
            warnings: Warnings::new(),
        })
    }

    /// Returns component name used in logs.
    pub fn name(&self) -> &str {
        NAME
    }

    /// Returns human-readable configuration summary.
    pub fn desc(&self) -> String {
        format!("{}x{}, {}x{}", self.num_cpus, self.cpu.desc(), self.num_nics, self.nic.desc())
    }

    /// Returns accumulated warnings.
    pub fn warnings(&self) -> &Warnings {
        &self.warnings
    }

    /// Removes and returns accumulated warnings.
    pub fn take_warnings(&mut self) -> Vec<String> {
        self.warnings.drain()
    }

    /// Expected performance of an uncontested lock.
    ///
    /// Bandwidth is in locks per second for a single requester.
    pub fn lock(&mut self) -> Estimate {
        // request receipt and response transmission
        let t_net_r = self.nic.read_time(self.min_msg);
        let t_net_w = self.nic.write_time(self.min_msg);

        let cpu_msg = self.nic.read_cpu(self.min_msg) + self.nic.write_cpu(self.min_msg);
        let cpu_lock = self.lock_us;

        let latency = t_net_r + t_net_w + cpu_msg + cpu_lock;
        let cores = self.cpu.available_cores(self.num_cpus);
        // responses limit the network rate
        let estimate = Contention::new(NAME, "locks".to_string(), 1., 1., latency)
            .load_only(Resource::Cpu, cpu_msg + cpu_lock, cores)
            .load_only(Resource::Net, t_net_w, self.num_nics)
            .resolve(&mut self.warnings);

        log_debug!(self, "lock: {:.1}us, {:.0} locks/s", estimate.latency, estimate.bandwidth);
        estimate
    }
}
