use std::rc::Rc;

use approx::assert_abs_diff_eq;
use rstest::rstest;

use storsim_core::units::{KB, MB, SECOND};
use storsim_core::{InvalidSpecError, Resource, Warnings};
use storsim_models::{Cpu, CpuSpec, Interface, InterfaceSpec};
use storsim_storage::{Device, DeviceSpec, FileStore, FsKind, FsSpec, SimFs};

use crate::config::{Config, ConfigError};
use crate::contention::{describe, Contention};
use crate::dlm::{Dlm, DlmSpec};
use crate::gateway::{Gateway, GatewaySpec, WriteRegime};
use crate::rados::{Rados, RadosSpec};
use crate::server::{Server, ServerSpec};

const K4: f64 = 4. * KB as f64;
const K128: f64 = 128. * KB as f64;

fn cpu() -> Rc<Cpu> {
    Rc::new(Cpu::new(&CpuSpec::default()).unwrap())
}

fn nic(cpu: &Rc<Cpu>) -> Interface {
    Interface::new(&InterfaceSpec::nic(), cpu.clone()).unwrap()
}

fn hba(cpu: &Rc<Cpu>) -> Interface {
    Interface::new(&InterfaceSpec::hba(), cpu.clone()).unwrap()
}

fn xfs() -> SimFs {
    let device = Device::new(&DeviceSpec::disk()).unwrap();
    SimFs::new(device, &FsSpec::new(FsKind::Xfs)).unwrap()
}

fn server_with(spec: &ServerSpec) -> Server {
    let cpu = cpu();
    Server::new(spec, Box::new(xfs()), nic(&cpu), hba(&cpu), cpu).unwrap()
}

fn server() -> Server {
    server_with(&ServerSpec::default())
}

fn dlm() -> Dlm {
    let cpu = cpu();
    Dlm::new(&DlmSpec::default(), nic(&cpu), cpu).unwrap()
}

fn gateway_with(spec: &GatewaySpec) -> Result<Gateway, InvalidSpecError> {
    let cpu = cpu();
    Gateway::new(spec, server(), dlm(), nic(&cpu), nic(&cpu), cpu)
}

fn gateway() -> Gateway {
    gateway_with(&GatewaySpec::default()).unwrap()
}

fn rados_with(spec: &RadosSpec) -> Rados {
    let filestore = FileStore::new(Box::new(xfs()), None, 1).unwrap();
    Rados::new(spec, filestore).unwrap()
}

fn assert_loads_bounded(load: &storsim_core::Load) {
    for (resource, utilization) in load.iter() {
        assert!(utilization >= 0., "{} load {} is negative", resource, utilization);
        assert!(utilization <= 1. + 1e-9, "{} load {} exceeds capacity", resource, utilization);
    }
}

// contention

#[test]
fn test_contention_unloaded_resource() {
    let mut warnings = Warnings::new();
    let estimate = Contention::new("Test", "x".to_string(), 4096., 1., 100.)
        .queued(Resource::Cpu, 50., 1.)
        .resolve(&mut warnings);
    assert_abs_diff_eq!(estimate.bandwidth, 4096. * SECOND / 100.);
    assert_abs_diff_eq!(estimate.load.get(Resource::Cpu).unwrap(), 0.5);
    // r = 100 + 50 * rho / (1 - rho) with rho = 50 / r
    assert_abs_diff_eq!(estimate.latency, 75. + 25. * 5f64.sqrt(), epsilon = 1e-6);
    assert!(warnings.is_empty());
}

#[test]
fn test_contention_saturation() {
    let mut warnings = Warnings::new();
    let estimate = Contention::new("Test", "x".to_string(), 4096., 32., 100.)
        .queued(Resource::Net, 200., 1.)
        .resolve(&mut warnings);
    assert_abs_diff_eq!(estimate.bandwidth, 4096. * SECOND / 200.);
    assert_abs_diff_eq!(estimate.load.get(Resource::Net).unwrap(), 1.);
    assert_abs_diff_eq!(estimate.latency, 100. + 200. * 32.);
    assert_eq!(warnings.len(), 2);
    assert_eq!(warnings.messages()[0], "Test net saturated by 200us x 5000 IOPS for x");
    assert!(warnings.messages()[1].starts_with("Test net load (1.00) adds 6400us"));
}

#[test]
fn test_contention_high_load() {
    let mut warnings = Warnings::new();
    let estimate = Contention::new("Test", "x".to_string(), 1., 1., 100.)
        .load_only(Resource::Fs, 85., 1.)
        .limit(Resource::Dlm, f64::INFINITY)
        .resolve(&mut warnings);
    assert_abs_diff_eq!(estimate.load.get(Resource::Fs).unwrap(), 0.85, epsilon = 1e-9);
    assert_abs_diff_eq!(estimate.load.get(Resource::Dlm).unwrap(), 0.);
    // load-only resources add no delay
    assert_abs_diff_eq!(estimate.latency, 100.);
    assert_eq!(warnings.messages(), ["Test fs load (0.85) is high for x"]);
}

#[test]
fn test_contention_delay_is_shared_by_units() {
    let mut warnings = Warnings::new();
    let two_cores = Contention::new("Test", "x".to_string(), 4096., 4., 100.)
        .queued(Resource::Cpu, 50., 2.)
        .resolve(&mut warnings);
    let fast_core = Contention::new("Test", "x".to_string(), 4096., 4., 100.)
        .queued(Resource::Cpu, 25., 1.)
        .resolve(&mut warnings);
    assert_abs_diff_eq!(two_cores.bandwidth, fast_core.bandwidth);
    assert_abs_diff_eq!(two_cores.latency, fast_core.latency, epsilon = 1e-9);
    // two thirds busy with two requests queued
    assert_abs_diff_eq!(two_cores.latency, 150., epsilon = 1e-6);
}

#[test]
fn test_contention_latency_follows_bandwidth() {
    let mut warnings = Warnings::new();
    let estimate = Contention::new("Test", "x".to_string(), 4096., 8., 100.)
        .load_only(Resource::Fs, 400., 1.)
        .resolve(&mut warnings);
    assert_abs_diff_eq!(estimate.bandwidth, 4096. * SECOND / 400.);
    // eight requests in flight drain at the fs rate
    assert_abs_diff_eq!(estimate.latency, 8. * 400., epsilon = 1e-9);
    assert_eq!(warnings.messages(), ["Test fs saturated for x"]);
}

#[test]
fn test_contention_ceiling_is_minimum() {
    let mut warnings = Warnings::new();
    let contention = Contention::new("Test", "x".to_string(), 4096., 8., 100.)
        .queued(Resource::Front, 30., 1.)
        .queued(Resource::Cpu, 40., 2.)
        .limit(Resource::Server, 50. * MB as f64);
    let base = contention.base_bandwidth();
    let estimate = contention.resolve(&mut warnings);
    let expected = base
        .min(4096. * SECOND / 30.)
        .min(2. * 4096. * SECOND / 40.)
        .min(50. * MB as f64);
    assert_abs_diff_eq!(estimate.bandwidth, expected);
    assert_loads_bounded(&estimate.load);
}

#[rstest]
#[case(4096., 32., false, "reads", "4K, d=32 random reads")]
#[case(4194304., 1., true, "writes", "4M, d=1 sequential writes")]
#[case(131072., 16., true, "reads", "128K, d=16 sequential reads")]
#[case(512., 4., false, "writes", "512B, d=4 random writes")]
fn test_describe(#[case] bsize: f64, #[case] depth: f64, #[case] seq: bool, #[case] op: &str, #[case] expected: &str) {
    assert_eq!(describe(bsize, depth, seq, op), expected);
}

// server

#[test]
fn test_server_spec_validation() {
    let cpu = cpu();
    let result = Server::new(
        ServerSpec::default().set_num_disks(0),
        Box::new(xfs()),
        nic(&cpu),
        hba(&cpu),
        cpu.clone(),
    );
    assert!(matches!(result, Err(InvalidSpecError::NonPositive { .. })));
    let result = Server::new(
        ServerSpec::default().set_write_buf(0.),
        Box::new(xfs()),
        nic(&cpu),
        hba(&cpu),
        cpu,
    );
    assert!(result.is_err());
}

#[test]
fn test_server_read_depth() {
    let mut server = server();
    let shallow = server.read(K4, 1., false);
    let deep = server.read(K4, 32., false);
    assert!(deep.bandwidth >= shallow.bandwidth);
    for resource in [Resource::Cpu, Resource::Net] {
        let before = shallow.load.get(resource).unwrap();
        let after = deep.load.get(resource).unwrap();
        assert!(after > before, "{} load did not grow", resource);
        assert!(after <= 1.);
    }
    assert_loads_bounded(&shallow.load);
    assert_loads_bounded(&deep.load);
}

#[test]
fn test_server_read_is_disk_bound() {
    let mut server = server();
    let estimate = server.read(K4, 1., false);
    // a random read waits for seek and rotation
    assert!(estimate.latency > 5000.);
    let (resource, _) = estimate.load.bottleneck().unwrap();
    assert_eq!(resource, Resource::Fs);
}

#[test]
fn test_server_sequential_reads_amortize_objects() {
    let mut server = server();
    let random = server.read(K128, 1., false);
    let seq = server.read(K128, 1., true);
    assert!(seq.latency < random.latency);
    assert!(seq.bandwidth > random.bandwidth);
}

#[test]
fn test_server_write_back() {
    let mut server = server();
    let read = server.read(K4, 1., false);
    let write = server.write(K4, 1., false);
    // acknowledged from the buffer, but a full buffer drains at the flush rate
    assert!(write.latency < read.latency);
    assert_abs_diff_eq!(write.load.get(Resource::Fs).unwrap(), 1.);
    assert_abs_diff_eq!(write.latency, K4 * SECOND / write.bandwidth, epsilon = 1e-6);
    assert!(server.warnings().messages().iter().any(|w| w.contains("Server fs saturated")));
}

#[test]
fn test_server_write_through() {
    // enough disks to keep the buffer from filling
    let mut buffered = server_with(ServerSpec::default().set_num_disks(4));
    let mut small_buf = server_with(ServerSpec::default().set_num_disks(4).set_write_buf(64. * KB as f64));
    let bsize = K128;
    let write_back = buffered.write(bsize, 1., false);
    let write_through = small_buf.write(bsize, 1., false);
    assert!(write_through.latency > write_back.latency + 1000.);
}

#[test]
fn test_server_metadata_ops() {
    let mut server = server();
    let cached = server.getattr(1., 1.);
    let uncached = server.getattr(0., 1.);
    assert_abs_diff_eq!(cached.load.get(Resource::Fs).unwrap(), 0.);
    assert!(uncached.latency > cached.latency);

    let sync = server.setattr(0., 1., true);
    let not_sync = server.setattr(0., 1., false);
    assert!(sync.latency > not_sync.latency);

    let commit = server.commit();
    assert!(commit.latency > cached.latency);

    let create = server.create();
    let delete = server.delete();
    assert!(create.bandwidth > 0. && create.bandwidth.is_finite());
    assert!(delete.bandwidth > 0. && delete.bandwidth.is_finite());
}

#[test]
fn test_server_warnings_deduplicated() {
    let mut server = server();
    server.read(K4, 32., false);
    let count = server.warnings().len();
    assert!(count > 0);
    server.read(K4, 32., false);
    assert_eq!(server.warnings().len(), count);
    assert_eq!(server.take_warnings().len(), count);
    assert!(server.warnings().is_empty());
}

// lock manager

#[test]
fn test_dlm_lock() {
    let cpu = cpu();
    let nic = nic(&cpu);
    let mut dlm = dlm();
    let lock = dlm.lock();
    let round_trip = nic.read_time(128.) + nic.write_time(128.);
    let messages = nic.read_cpu(128.) + nic.write_cpu(128.);
    assert!(lock.latency >= round_trip + 1.);
    assert_abs_diff_eq!(lock.latency, round_trip + messages + 1., epsilon = 1e-9);
    assert_abs_diff_eq!(lock.bandwidth, SECOND / lock.latency, epsilon = 1e-6);
    assert_loads_bounded(&lock.load);
    assert!(lock.load.get(Resource::Cpu).is_some());
    assert!(lock.load.get(Resource::Net).is_some());
    assert!(dlm.warnings().is_empty());
}

#[test]
fn test_dlm_lock_time() {
    let cpu = cpu();
    let mut dlm = Dlm::new(DlmSpec::default().set_lock_us(101.), nic(&cpu), cpu).unwrap();
    assert_abs_diff_eq!(dlm.lock().latency - self::dlm().lock().latency, 100., epsilon = 1e-9);
}

#[test]
fn test_dlm_busy_cpu_warns() {
    let cpu = Rc::new(Cpu::new(CpuSpec::default().set_hyperthread(1.)).unwrap());
    let mut dlm = Dlm::new(DlmSpec::default().set_lock_us(100.), nic(&cpu), cpu).unwrap();
    let lock = dlm.lock();
    assert!(lock.load.get(Resource::Cpu).unwrap() > 0.9);
    assert_eq!(dlm.warnings().len(), 1);
    assert!(dlm.warnings().messages()[0].starts_with("DLM cpu load (0.9"));
    assert!(dlm.warnings().messages()[0].ends_with("is high for locks"));

    // repeated locks do not repeat the warning
    dlm.lock();
    assert_eq!(dlm.take_warnings().len(), 1);
    assert!(dlm.warnings().is_empty());
}

// gateway

#[test]
fn test_gateway_spec_validation() {
    assert!(gateway_with(GatewaySpec::default().set_coding(0, 2)).is_err());
    assert!(gateway_with(GatewaySpec::default().set_width(0.)).is_err());
    assert!(matches!(
        gateway_with(GatewaySpec::default().set_prefetch(2.)),
        Err(InvalidSpecError::Inconsistent { .. })
    ));
    assert!(gateway_with(GatewaySpec::default().set_coding(4, 0)).is_ok());
}

#[test]
fn test_gateway_lock_probability() {
    let gateway = gateway();
    assert_abs_diff_eq!(gateway.lock_probability(64. * KB as f64, true), 0.1);
    assert_abs_diff_eq!(gateway.lock_probability(4. * MB as f64, true), 1.);
    assert_abs_diff_eq!(gateway.lock_probability(K4, false), 1.);
}

#[rstest]
#[case(K4, false, WriteRegime::ReadModifyWrite, 5., 3., 4.)]
#[case(K4, true, WriteRegime::SequentialSmall, 0., 7. / 160., 0.)]
#[case(K128, false, WriteRegime::StripAligned, 0., 3., 0.)]
#[case(K128, true, WriteRegime::StripAligned, 0., 3., 0.)]
#[case(1024. * KB as f64, false, WriteRegime::MultiStrip, 0., 10., 0.)]
#[case(300. * KB as f64, true, WriteRegime::MultiStrip, 0., 5., 0.)]
fn test_gateway_write_plan(
    #[case] bsize: f64,
    #[case] seq: bool,
    #[case] regime: WriteRegime,
    #[case] reads: f64,
    #[case] writes: f64,
    #[case] checksums: f64,
) {
    let plan = gateway().write_plan(bsize, seq);
    assert_eq!(plan.regime, regime);
    assert_abs_diff_eq!(plan.shard_reads, reads);
    assert_abs_diff_eq!(plan.shard_writes, writes, epsilon = 1e-12);
    assert_abs_diff_eq!(plan.checksums, checksums);
    assert_abs_diff_eq!(plan.write_size, K128);
}

#[test]
fn test_gateway_erasure_overhead() {
    let mut gateway = gateway();
    let rmw = gateway.write(K4, 1., false);
    let seq = gateway.write(K4, 1., true);
    assert!(rmw.latency > seq.latency);
    assert!(rmw.bandwidth < seq.bandwidth);
}

#[test]
fn test_gateway_read() {
    let mut gateway = gateway();
    let small = gateway.read(K4, 1., false);
    let large = gateway.read(1024. * KB as f64, 1., false);
    assert!(large.latency > small.latency);
    for resource in [
        Resource::Front,
        Resource::Back,
        Resource::Cpu,
        Resource::Dlm,
        Resource::Server,
    ] {
        assert!(small.load.get(resource).is_some(), "{} load missing", resource);
    }
    assert_loads_bounded(&small.load);
    assert_loads_bounded(&large.load);
}

#[test]
fn test_gateway_read_ahead() {
    let mut gateway = gateway();
    let random = gateway.read(K128, 1., false);
    let seq = gateway.read(K128, 1., true);
    // only the server wait is discounted
    assert!(seq.latency < random.latency);
}

#[test]
fn test_gateway_create_delete() {
    let mut gateway = gateway();
    let svr_create = gateway.server_mut().create();
    let create = gateway.create();
    assert!(create.latency > svr_create.latency);
    let delete = gateway.delete();
    assert!(delete.latency > 0.);
    assert_loads_bounded(&create.load);
}

#[test]
fn test_gateway_warnings() {
    let mut gateway = gateway();
    gateway.write(K4, 32., false);
    let count = gateway.warnings().len();
    gateway.write(K4, 32., false);
    assert_eq!(gateway.warnings().len(), count);
    let server_count = gateway.server().warnings().len();
    assert_eq!(gateway.take_all_warnings().len(), count + server_count);
    assert!(gateway.warnings().is_empty());
    assert!(gateway.server().warnings().is_empty());
}

// cluster

#[test]
fn test_rados_read() {
    let mut rados = rados_with(&RadosSpec::default());
    let estimate = rados.read(K4, 1e9, 2500., 1., 1.);
    assert!(estimate.latency > 1000.);
    assert_abs_diff_eq!(estimate.bandwidth, K4 * SECOND / estimate.latency);
    assert!(rados.warnings().is_empty());
}

#[test]
fn test_rados_nic_caps() {
    let mut rados = rados_with(RadosSpec::default().set_front_nic(1e6));
    rados.read(4. * MB as f64, 1e9, 2500., 1., 1.);
    assert_eq!(rados.warnings().len(), 1);
    assert!(rados.warnings().messages()[0].starts_with("client NIC caps throughput for 4194304 byte reads"));
    // reported once per operation type
    rados.read(MB as f64, 1e9, 2500., 1., 1.);
    assert_eq!(rados.warnings().len(), 1);
    rados.write(4. * MB as f64, 1e9, 2500., 1., 1., 2.);
    assert_eq!(rados.warnings().len(), 2);
}

#[test]
fn test_rados_copies() {
    let mut rados = rados_with(RadosSpec::default().set_nodes(4, 4));
    let one = rados.write(K128, 1e9, 40000., 4., 3., 1.);
    let two = rados.write(K128, 1e9, 40000., 4., 3., 2.);
    assert!(two.latency > one.latency);
    assert!(two.load.get(Resource::Back).unwrap() > 0.);
}

#[test]
fn test_rados_spec_validation() {
    let filestore = FileStore::new(Box::new(xfs()), None, 1).unwrap();
    assert!(Rados::new(RadosSpec::default().set_nodes(0, 1), filestore.clone()).is_err());
    assert!(Rados::new(RadosSpec::default().set_nic_overhead(1.), filestore).is_err());
}

#[test]
fn test_rados_create_delete() {
    let mut rados = rados_with(&RadosSpec::default());
    let create = rados.create(1.);
    let delete = rados.delete(1.);
    assert!(create.latency > 1000.);
    assert!(delete.latency > 1000.);
    assert_abs_diff_eq!(create.bandwidth, SECOND / create.latency);
}

// config

const CONFIG: &str = r#"
data:
  device: ssd
  size: 100000000000
  iops: 30000
  streams: 8
  fs: btrfs
  age: 0.2
journal:
  device: ssd
  size: 1000000000
journal_share: 4
cpu:
  name: Xeon
  cores: 4
  clock_speed: 3300000000
server:
  num_disks: 4
  num_nics: 2
gateway:
  n: 4
  m: 1
  width: 65536
  back:
    bandwidth: 40000000000
rados:
  nodes: 4
  osd_per_node: 4
  front: 1000000000
tests:
  bsizes: [4096, 1048576]
  depths: [16]
  gateway: false
"#;

#[test]
fn test_config_parse() {
    let config = Config::from_yaml(CONFIG).unwrap();
    assert_eq!(config.journal_share, 4);
    assert_eq!(config.server.num_disks, Some(4));
    assert_eq!(config.gateway.n, Some(4));
    assert_eq!(config.tests.bsizes, vec![4096, 1048576]);
    assert_eq!(config.tests.depths, vec![16]);
    assert!(!config.tests.gateway);
    assert!(config.tests.rados);
    assert_eq!(config.tests.clients, vec![3]);

    let server = config.build_server().unwrap();
    assert_eq!(server.fs().desc(), "BTRFS(0.2)");
    let gateway = config.build_gateway().unwrap();
    assert_abs_diff_eq!(gateway.lock_probability(64. * KB as f64, true), 0.25);
    let rados = config.build_rados().unwrap();
    assert!(rados.desc().contains("journal"));
}

#[test]
fn test_config_defaults() {
    let config = Config::from_yaml("tests:\n  depths: [4]\n").unwrap();
    assert_eq!(config.tests.depths, vec![4]);
    assert_eq!(config.tests.bsizes, vec![4 * KB, 128 * KB, 4 * MB]);
    assert_eq!(config.journal_share, 1);
    assert!(config.journal.is_none());
    let mut server = config.build_server().unwrap();
    assert!(server.read(K4, 1., false).latency > 0.);
    assert!(config.build_dlm().is_ok());
}

#[test]
fn test_config_errors() {
    assert!(matches!(Config::from_yaml("data: [1, 2"), Err(ConfigError::Yaml(_))));
    assert!(matches!(
        Config::from_file("/nonexistent/storsim.yaml"),
        Err(ConfigError::Io { .. })
    ));

    let config = Config::from_yaml("data:\n  size: 1000\n").unwrap();
    assert!(matches!(config.build_server(), Err(ConfigError::InvalidSpec(_))));

    let config = Config::from_yaml("data:\n  age: 2\n").unwrap();
    assert!(matches!(config.build_filestore(), Err(ConfigError::InvalidSpec(_))));

    let config = Config::from_yaml("data:\n  measured:\n    source: bench\n    rates:\n      create: 100\n").unwrap();
    assert!(matches!(
        config.build_server(),
        Err(ConfigError::InvalidSpec(InvalidSpecError::MissingMeasurement { .. }))
    ));
}
