//! Simulation configuration.
//!
//! A single YAML file describes the data (and optional journal) devices, the node hardware, the cluster and the
//! test sweeps to run. Every parameter is optional and falls back to the defaults of the component specs.

use std::rc::Rc;

use serde::Deserialize;
use sugars::{boxed, rc};
use thiserror::Error;

use storsim_core::units::{GIG, KB, MB};
use storsim_core::InvalidSpecError;
use storsim_models::{Cpu, CpuSpec, Interface, InterfaceKind, InterfaceSpec};
use storsim_storage::{
    DataFs, DataFsSpec, Device, DeviceKind, DeviceSpec, FileStore, FileSystem, FsKind, FsSpec, SimFs,
};

use crate::dlm::{Dlm, DlmSpec};
use crate::gateway::{Gateway, GatewaySpec};
use crate::rados::{Rados, RadosSpec};
use crate::server::{Server, ServerSpec};

/// An error returned when a configuration cannot be loaded or describes invalid components.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Configuration file cannot be read.
    #[error("can't read file {path}: {source}")]
    Io {
        /// Path of the file.
        path: String,
        /// Underlying error.
        source: std::io::Error,
    },
    /// Configuration is not valid YAML or has unexpected structure.
    #[error("can't parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    /// Configuration describes a component which cannot work.
    #[error("invalid configuration: {0}")]
    InvalidSpec(#[from] InvalidSpecError),
}

/// Holds storage device parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeviceConfig {
    /// Device type, disk by default.
    pub device: Option<DeviceKind>,
    /// Usable space (bytes).
    pub size: Option<f64>,
    /// Maximum transfer speed (B/s).
    pub speed: Option<f64>,
    /// Rotational speed of a disk.
    pub rpm: Option<f64>,
    /// Number of heads of a disk.
    pub heads: Option<u32>,
    /// Single stream IOPS of an SSD.
    pub iops: Option<f64>,
    /// Maximum concurrent streams of an SSD.
    pub streams: Option<u32>,
}

impl DeviceConfig {
    /// Resolves device specification against the defaults for its kind.
    pub fn spec(&self) -> DeviceSpec {
        let mut spec = DeviceSpec::of_kind(self.device.unwrap_or(DeviceKind::Disk));
        if let Some(size) = self.size {
            spec.set_size(size);
        }
        if let Some(speed) = self.speed {
            spec.set_speed(speed);
        }
        if let Some(rpm) = self.rpm {
            spec.set_rpm(rpm);
        }
        if let Some(heads) = self.heads {
            spec.set_heads(heads);
        }
        if let Some(iops) = self.iops {
            spec.set_iops(iops);
        }
        if let Some(streams) = self.streams {
            spec.set_streams(streams);
        }
        spec
    }
}

/// Holds configuration of a data or journal file system and the device below it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DataConfig {
    /// Underlying device.
    #[serde(flatten)]
    pub device: DeviceConfig,
    /// File system type, XFS by default.
    pub fs: Option<FsKind>,
    /// File system age in `[0, 1]`.
    pub age: Option<f64>,
    /// Measured throughputs, replace the device and file system models when present.
    pub measured: Option<DataFsSpec>,
}

impl DataConfig {
    /// Resolves file system specification.
    pub fn fs_spec(&self) -> FsSpec {
        let mut spec = FsSpec::new(self.fs.unwrap_or(FsKind::Xfs));
        spec.set_age(self.age.unwrap_or(0.));
        spec
    }

    /// Creates the described device.
    pub fn build_device(&self) -> Result<Device, InvalidSpecError> {
        Device::new(&self.device.spec())
    }

    /// Creates the described file system.
    pub fn build_fs(&self) -> Result<Box<dyn FileSystem>, InvalidSpecError> {
        match &self.measured {
            Some(measured) => Ok(boxed!(DataFs::new(measured)?)),
            None => Ok(boxed!(SimFs::new(self.build_device()?, &self.fs_spec())?)),
        }
    }
}

/// Holds processor parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CpuConfig {
    /// Processor name.
    pub name: Option<String>,
    /// Cores per chip.
    pub cores: Option<u32>,
    /// Clock speed (Hz).
    pub clock_speed: Option<f64>,
    /// Memory speed (transfers per second).
    pub memory_speed: Option<f64>,
    /// Hyperthreading multiplier.
    pub hyperthread: Option<f64>,
}

impl CpuConfig {
    /// Resolves processor specification.
    pub fn spec(&self) -> CpuSpec {
        let mut spec = CpuSpec::default();
        if let Some(name) = &self.name {
            spec.set_name(name);
        }
        if let Some(cores) = self.cores {
            spec.set_cores(cores);
        }
        if let Some(clock_speed) = self.clock_speed {
            spec.set_clock_speed(clock_speed);
        }
        if let Some(memory_speed) = self.memory_speed {
            spec.set_memory_speed(memory_speed);
        }
        if let Some(hyperthread) = self.hyperthread {
            spec.set_hyperthread(hyperthread);
        }
        spec
    }
}

/// Holds NIC or HBA parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InterfaceConfig {
    /// Interface name.
    pub name: Option<String>,
    /// Bandwidth (bits/s).
    pub bandwidth: Option<f64>,
    /// Minimum per-operation latency (us).
    pub min_latency: Option<f64>,
    /// Fixed CPU cost (us) of an operation.
    pub cpu_per_op: Option<f64>,
}

impl InterfaceConfig {
    /// Resolves interface specification against the defaults for its kind.
    pub fn spec(&self, kind: InterfaceKind) -> InterfaceSpec {
        let mut spec = InterfaceSpec::of_kind(kind);
        if let Some(name) = &self.name {
            spec.set_name(name);
        }
        if let Some(bandwidth) = self.bandwidth {
            spec.set_bandwidth(bandwidth);
        }
        if let Some(min_latency) = self.min_latency {
            spec.set_min_latency(min_latency);
        }
        if let Some(cpu_per_op) = self.cpu_per_op {
            spec.set_cpu_per_op(cpu_per_op);
        }
        spec
    }
}

/// Holds server node parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfig {
    /// Data disks per server.
    pub num_disks: Option<u32>,
    /// NICs per server.
    pub num_nics: Option<u32>,
    /// HBAs per server.
    pub num_hbas: Option<u32>,
    /// Processor chips per server.
    pub num_cpus: Option<u32>,
    /// Write-back buffer size (bytes).
    pub write_buf: Option<f64>,
    /// Maximum object size (bytes).
    pub obj_size: Option<f64>,
}

impl ServerConfig {
    /// Resolves server specification.
    pub fn spec(&self) -> ServerSpec {
        let mut spec = ServerSpec::default();
        if let Some(num_disks) = self.num_disks {
            spec.set_num_disks(num_disks);
        }
        if let Some(num_nics) = self.num_nics {
            spec.set_num_nics(num_nics);
        }
        if let Some(num_hbas) = self.num_hbas {
            spec.set_num_hbas(num_hbas);
        }
        if let Some(num_cpus) = self.num_cpus {
            spec.set_num_cpus(num_cpus);
        }
        if let Some(write_buf) = self.write_buf {
            spec.set_write_buf(write_buf);
        }
        if let Some(obj_size) = self.obj_size {
            spec.set_obj_size(obj_size);
        }
        spec
    }
}

/// Holds lock manager parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DlmConfig {
    /// NICs of the lock manager.
    pub num_nics: Option<u32>,
    /// Processor chips of the lock manager.
    pub num_cpus: Option<u32>,
    /// CPU time (us) to handle a lock.
    pub lock_us: Option<f64>,
}

impl DlmConfig {
    /// Resolves lock manager specification.
    pub fn spec(&self) -> DlmSpec {
        let mut spec = DlmSpec::default();
        if let Some(num_nics) = self.num_nics {
            spec.set_num_nics(num_nics);
        }
        if let Some(num_cpus) = self.num_cpus {
            spec.set_num_cpus(num_cpus);
        }
        if let Some(lock_us) = self.lock_us {
            spec.set_lock_us(lock_us);
        }
        spec
    }
}

/// Holds gateway parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewayConfig {
    /// Storage servers behind the gateway.
    pub num_servers: Option<u32>,
    /// Client-facing NICs.
    pub num_fronts: Option<u32>,
    /// Server-facing NICs.
    pub num_backs: Option<u32>,
    /// Processor chips.
    pub num_cpus: Option<u32>,
    /// Data strips per stripe.
    pub n: Option<u32>,
    /// Parity strips per stripe.
    pub m: Option<u32>,
    /// Strip width (bytes).
    pub width: Option<f64>,
    /// Visible fraction of the server wait for sequential reads.
    pub prefetch: Option<f64>,
    /// Client-facing NIC parameters, node NIC by default.
    pub front: Option<InterfaceConfig>,
    /// Server-facing NIC parameters, node NIC by default.
    pub back: Option<InterfaceConfig>,
}

impl GatewayConfig {
    /// Resolves gateway specification.
    pub fn spec(&self) -> GatewaySpec {
        let mut spec = GatewaySpec::default();
        if let Some(num_servers) = self.num_servers {
            spec.set_num_servers(num_servers);
        }
        if let Some(num_fronts) = self.num_fronts {
            spec.set_num_fronts(num_fronts);
        }
        if let Some(num_backs) = self.num_backs {
            spec.set_num_backs(num_backs);
        }
        if let Some(num_cpus) = self.num_cpus {
            spec.set_num_cpus(num_cpus);
        }
        if self.n.is_some() || self.m.is_some() {
            spec.set_coding(self.n.unwrap_or(5), self.m.unwrap_or(2));
        }
        if let Some(width) = self.width {
            spec.set_width(width);
        }
        if let Some(prefetch) = self.prefetch {
            spec.set_prefetch(prefetch);
        }
        spec
    }
}

/// Holds replicated cluster parameters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RadosConfig {
    /// Client-facing network speed (bits/s).
    pub front: Option<f64>,
    /// Replication network speed (bits/s).
    pub back: Option<f64>,
    /// Number of nodes.
    pub nodes: Option<u32>,
    /// OSDs per node.
    pub osd_per_node: Option<u32>,
    /// Fraction of NIC bandwidth that cannot be used.
    pub nic_overhead: Option<f64>,
    /// No-op response time (us).
    pub null_resp: Option<f64>,
}

impl RadosConfig {
    /// Resolves cluster specification.
    pub fn spec(&self) -> RadosSpec {
        let mut spec = RadosSpec::default();
        if let Some(front) = self.front {
            spec.set_front_nic(front);
        }
        if let Some(back) = self.back {
            spec.set_back_nic(back);
        }
        if self.nodes.is_some() || self.osd_per_node.is_some() {
            spec.set_nodes(self.nodes.unwrap_or(1), self.osd_per_node.unwrap_or(1));
        }
        if let Some(nic_overhead) = self.nic_overhead {
            spec.set_nic_overhead(nic_overhead);
        }
        if let Some(null_resp) = self.null_resp {
            spec.set_null_resp(null_resp);
        }
        spec
    }
}

/// Holds raw test sweep config parsed from YAML.
#[derive(Debug, Clone, Default, Deserialize)]
struct RawTestsConfig {
    pub bsizes: Option<Vec<u64>>,
    pub depths: Option<Vec<u32>>,
    pub file_size: Option<f64>,
    pub disk_params: Option<bool>,
    pub device: Option<bool>,
    pub fs: Option<bool>,
    pub filestore: Option<bool>,
    pub server: Option<bool>,
    pub dlm: Option<bool>,
    pub gateway: Option<bool>,
    pub rados: Option<bool>,
    pub obj_size: Option<f64>,
    pub nobj: Option<f64>,
    pub clients: Option<Vec<u32>>,
    pub copies: Option<Vec<u32>>,
}

/// Describes which sweeps to run and with what parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct TestsConfig {
    /// Block sizes (bytes) of every sweep.
    pub bsizes: Vec<u64>,
    /// Request depths of every sweep.
    pub depths: Vec<u32>,
    /// File size (bytes) for raw device and file system sweeps.
    pub file_size: f64,
    /// Print data device characteristics.
    pub disk_params: bool,
    /// Run raw device sweeps.
    pub device: bool,
    /// Run file system sweeps.
    pub fs: bool,
    /// Run object store sweeps.
    pub filestore: bool,
    /// Run server sweeps.
    pub server: bool,
    /// Run lock manager estimate.
    pub dlm: bool,
    /// Run gateway sweeps.
    pub gateway: bool,
    /// Run replicated cluster sweeps.
    pub rados: bool,
    /// Object size (bytes) for object store and cluster sweeps.
    pub obj_size: f64,
    /// Number of objects for object store and cluster sweeps.
    pub nobj: f64,
    /// Numbers of parallel clients for cluster sweeps.
    pub clients: Vec<u32>,
    /// Numbers of copies for cluster sweeps.
    pub copies: Vec<u32>,
}

impl Default for TestsConfig {
    fn default() -> Self {
        Self::resolve(RawTestsConfig::default())
    }
}

impl TestsConfig {
    fn resolve(raw: RawTestsConfig) -> Self {
        Self {
            bsizes: raw.bsizes.unwrap_or_else(|| vec![4 * KB, 128 * KB, 4 * MB]),
            depths: raw.depths.unwrap_or_else(|| vec![1, 32]),
            file_size: raw.file_size.unwrap_or(16. * GIG),
            disk_params: raw.disk_params.unwrap_or(true),
            device: raw.device.unwrap_or(true),
            fs: raw.fs.unwrap_or(true),
            filestore: raw.filestore.unwrap_or(true),
            server: raw.server.unwrap_or(true),
            dlm: raw.dlm.unwrap_or(true),
            gateway: raw.gateway.unwrap_or(true),
            rados: raw.rados.unwrap_or(true),
            obj_size: raw.obj_size.unwrap_or(GIG),
            nobj: raw.nobj.unwrap_or(2500.),
            clients: raw.clients.unwrap_or_else(|| vec![3]),
            copies: raw.copies.unwrap_or_else(|| vec![2]),
        }
    }
}

/// Holds raw configuration parsed from YAML file.
#[derive(Debug, Clone, Default, Deserialize)]
struct RawConfig {
    pub data: Option<DataConfig>,
    pub journal: Option<DataConfig>,
    pub journal_share: Option<u32>,
    pub cpu: Option<CpuConfig>,
    pub nic: Option<InterfaceConfig>,
    pub hba: Option<InterfaceConfig>,
    pub server: Option<ServerConfig>,
    pub dlm: Option<DlmConfig>,
    pub gateway: Option<GatewayConfig>,
    pub rados: Option<RadosConfig>,
    pub tests: Option<RawTestsConfig>,
}

/// Represents simulation configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Data device and file system.
    pub data: DataConfig,
    /// Separate journal device and file system, journal on the data device if absent.
    pub journal: Option<DataConfig>,
    /// Number of object stores sharing a journal device.
    pub journal_share: u32,
    /// Node processor.
    pub cpu: CpuConfig,
    /// Node NIC.
    pub nic: InterfaceConfig,
    /// Node HBA.
    pub hba: InterfaceConfig,
    /// Server node.
    pub server: ServerConfig,
    /// Lock manager.
    pub dlm: DlmConfig,
    /// Gateway.
    pub gateway: GatewayConfig,
    /// Replicated cluster.
    pub rados: RadosConfig,
    /// Test sweeps.
    pub tests: TestsConfig,
}

impl Config {
    /// Creates config by reading parameter values from YAML file
    /// (uses default values if some parameters are absent).
    pub fn from_file(file_name: &str) -> Result<Self, ConfigError> {
        let yaml = std::fs::read_to_string(file_name).map_err(|source| ConfigError::Io {
            path: file_name.to_string(),
            source,
        })?;
        Self::from_yaml(&yaml)
    }

    /// Creates config from YAML text.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let raw: Option<RawConfig> = serde_yaml::from_str(yaml)?;
        let raw = raw.unwrap_or_default();
        Ok(Self {
            data: raw.data.unwrap_or_default(),
            journal: raw.journal,
            journal_share: raw.journal_share.unwrap_or(1),
            cpu: raw.cpu.unwrap_or_default(),
            nic: raw.nic.unwrap_or_default(),
            hba: raw.hba.unwrap_or_default(),
            server: raw.server.unwrap_or_default(),
            dlm: raw.dlm.unwrap_or_default(),
            gateway: raw.gateway.unwrap_or_default(),
            rados: raw.rados.unwrap_or_default(),
            tests: raw.tests.map(TestsConfig::resolve).unwrap_or_default(),
        })
    }

    /// Creates the node processor, shared by all components of a node.
    pub fn build_cpu(&self) -> Result<Rc<Cpu>, ConfigError> {
        Ok(rc!(Cpu::new(&self.cpu.spec())?))
    }

    /// Creates the node NIC.
    pub fn build_nic(&self, cpu: Rc<Cpu>) -> Result<Interface, ConfigError> {
        Ok(Interface::new(&self.nic.spec(InterfaceKind::Nic), cpu)?)
    }

    /// Creates the node HBA.
    pub fn build_hba(&self, cpu: Rc<Cpu>) -> Result<Interface, ConfigError> {
        Ok(Interface::new(&self.hba.spec(InterfaceKind::Hba), cpu)?)
    }

    /// Creates a server node with its own processor.
    pub fn build_server(&self) -> Result<Server, ConfigError> {
        let cpu = self.build_cpu()?;
        let nic = self.build_nic(cpu.clone())?;
        let hba = self.build_hba(cpu.clone())?;
        let fs = self.data.build_fs()?;
        Ok(Server::new(&self.server.spec(), fs, nic, hba, cpu)?)
    }

    /// Creates a lock manager with its own processor and NIC.
    pub fn build_dlm(&self) -> Result<Dlm, ConfigError> {
        let cpu = self.build_cpu()?;
        let nic = self.build_nic(cpu.clone())?;
        Ok(Dlm::new(&self.dlm.spec(), nic, cpu)?)
    }

    /// Creates a gateway in front of servers and a lock manager built from the same config.
    pub fn build_gateway(&self) -> Result<Gateway, ConfigError> {
        let cpu = self.build_cpu()?;
        let front = self.gateway.front.as_ref().unwrap_or(&self.nic);
        let back = self.gateway.back.as_ref().unwrap_or(&self.nic);
        let front = Interface::new(&front.spec(InterfaceKind::Nic), cpu.clone())?;
        let back = Interface::new(&back.spec(InterfaceKind::Nic), cpu.clone())?;
        Ok(Gateway::new(
            &self.gateway.spec(),
            self.build_server()?,
            self.build_dlm()?,
            front,
            back,
            cpu,
        )?)
    }

    /// Creates an object store over the data and journal file systems.
    pub fn build_filestore(&self) -> Result<FileStore, ConfigError> {
        let data = self.data.build_fs()?;
        let journal = match &self.journal {
            Some(journal) => Some(journal.build_fs()?),
            None => None,
        };
        Ok(FileStore::new(data, journal, self.journal_share)?)
    }

    /// Creates a replicated cluster of object stores.
    pub fn build_rados(&self) -> Result<Rados, ConfigError> {
        Ok(Rados::new(&self.rados.spec(), self.build_filestore()?)?)
    }
}
