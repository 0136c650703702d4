use rstest::rstest;

use storsim_cluster::{Config, Gateway, Server, WriteRegime};
use storsim_core::units::{GIG, KB, MB, MEG, SECOND};
use storsim_core::{Estimate, Resource};
use storsim_storage::{Device, DeviceSpec, StorageDevice};

const NODE: &str = r#"
cpu:
  name: Xeon
  cores: 4
  clock_speed: 3300000000
server:
  num_disks: 4
  num_nics: 2
gateway:
  num_servers: 8
"#;

fn assert_float_eq(x: f64, y: f64, eps: f64) {
    assert!(
        (x - y).abs() < eps || (x.max(y) - x.min(y)) / x.min(y) < eps,
        "Values do not match: {:.15} vs {:.15}",
        x,
        y
    );
}

fn server() -> Server {
    Config::from_yaml(NODE).unwrap().build_server().unwrap()
}

fn gateway() -> Gateway {
    Config::from_yaml(NODE).unwrap().build_gateway().unwrap()
}

fn assert_within_ceilings(estimate: &Estimate) {
    let max = estimate.load.iter().map(|(_, load)| load).fold(0., f64::max);
    assert!(max <= 1. + 1e-9, "load {} above capacity", max);
}

#[test]
fn disk_random_read_is_mechanical() {
    let disk = Device::new(&DeviceSpec::disk()).unwrap();
    let random = disk.avg_time(4096., 16. * GIG, true, false, 1.);
    assert!(random > 1000. && random < 20000., "random read took {}us", random);

    let seq = disk.avg_time(4. * MB as f64, 16. * GIG, true, true, 1.);
    let xfer = 4. * MB as f64 * SECOND / (150. * MEG);
    assert!(seq >= xfer);
    assert!(seq < 1.25 * xfer, "sequential read took {}us", seq);
}

#[rstest]
#[case(false)]
#[case(true)]
fn ssd_read_is_iops_bound(#[case] seq: bool) {
    let ssd = Device::new(&DeviceSpec::ssd()).unwrap();
    let t = ssd.avg_time(4096., 16. * GIG, true, seq, 1.);
    assert_float_eq(t, SECOND / 20000. + 4096. * SECOND / (200. * MEG), 1e-9);
}

#[rstest]
#[case(4 * KB)]
#[case(128 * KB)]
#[case(4 * MB)]
fn server_bandwidth_grows_with_depth(#[case] bsize: u64) {
    let mut server = server();
    let bsize = bsize as f64;
    let mut prev = server.read(bsize, 1., false);
    for depth in [2., 4., 8., 16., 32.] {
        let next = server.read(bsize, depth, false);
        assert!(next.bandwidth >= prev.bandwidth * (1. - 1e-9));
        assert!(next.load.get(Resource::Cpu).unwrap() <= 1.);
        assert!(next.load.get(Resource::Net).unwrap() <= 1.);
        assert_within_ceilings(&next);
        prev = next;
    }
}

// doubling sizes plus sizes just past the object split points
fn block_sizes(max: u64) -> Vec<f64> {
    let mut sizes = vec![2 * MB + KB, 4 * MB + KB];
    let mut bsize = 4 * KB;
    while bsize <= max {
        sizes.push(bsize);
        bsize *= 2;
    }
    sizes.sort();
    sizes.into_iter().map(|bsize| bsize as f64).collect()
}

fn assert_not_faster(latency: f64, prev: Option<(f64, f64)>, bsize: f64, op: &str) {
    if let Some((prev_bsize, prev_latency)) = prev {
        assert!(
            latency >= prev_latency * (1. - 1e-9),
            "{} byte {} take {:.0}us, {} byte ones {:.0}us",
            bsize,
            op,
            latency,
            prev_bsize,
            prev_latency
        );
    }
}

#[rstest]
fn server_latency_grows_with_block_size(#[values(false, true)] seq: bool, #[values(1., 16., 32.)] depth: f64) {
    let mut server = server();
    let mut prev_read = None;
    let mut prev_write = None;
    for bsize in block_sizes(64 * MB) {
        let read = server.read(bsize, depth, seq).latency;
        assert_not_faster(read, prev_read, bsize, "reads");
        prev_read = Some((bsize, read));

        let write = server.write(bsize, depth, seq).latency;
        assert_not_faster(write, prev_write, bsize, "writes");
        prev_write = Some((bsize, write));
    }
}

#[rstest]
fn gateway_latency_grows_with_block_size(#[values(false, true)] seq: bool, #[values(1., 16., 32.)] depth: f64) {
    let mut gateway = gateway();
    let mut sizes = block_sizes(16 * MB);
    sizes.extend([127. * KB as f64, 129. * KB as f64]);
    sizes.sort_by(f64::total_cmp);

    let mut prev_read = None;
    let mut prev_write = None;
    let mut prev_regime = None;
    for bsize in sizes {
        let read = gateway.read(bsize, depth, seq).latency;
        assert_not_faster(read, prev_read, bsize, "reads");
        prev_read = Some((bsize, read));

        // compared within a write regime only
        let regime = gateway.write_plan(bsize, seq).regime;
        if prev_regime != Some(regime) {
            prev_write = None;
        }
        let write = gateway.write(bsize, depth, seq).latency;
        assert_not_faster(write, prev_write, bsize, "writes");
        prev_write = Some((bsize, write));
        prev_regime = Some(regime);
    }
}

#[test]
fn gateway_strip_aligned_write_skips_parity_reads() {
    let mut gateway = gateway();
    let unaligned = gateway.write(127. * KB as f64, 1., false);
    let aligned = gateway.write(128. * KB as f64, 1., false);
    assert_eq!(gateway.write_plan(127. * KB as f64, false).regime, WriteRegime::ReadModifyWrite);
    assert!(aligned.latency < unaligned.latency);
}

#[test]
fn server_latency_covers_requests_in_flight() {
    let mut server = server();
    for depth in [1., 16., 32.] {
        for seq in [false, true] {
            let estimate = server.write(4. * KB as f64, depth, seq);
            let in_flight = estimate.bandwidth * estimate.latency / (4. * KB as f64 * SECOND);
            // no shorter than draining `depth` requests at the achieved bandwidth
            assert!(in_flight >= depth * (1. - 1e-9), "{} requests in flight at d={}", in_flight, depth);
        }
    }
}

#[test]
fn gateway_strip_write_fans_out_to_data_and_parity() {
    let gateway = gateway();
    let plan = gateway.write_plan(128. * KB as f64, false);
    assert_eq!(plan.regime, WriteRegime::StripAligned);
    assert_eq!(plan.shard_writes, 3.);
    assert_eq!(plan.shard_reads, 0.);
}

#[rstest]
#[case(4 * KB)]
#[case(16 * KB)]
#[case(64 * KB)]
fn gateway_random_small_writes_pay_for_parity(#[case] bsize: u64) {
    let mut gateway = gateway();
    let bsize = bsize as f64;
    let rmw = gateway.write(bsize, 1., false);
    let seq = gateway.write(bsize, 1., true);
    assert!(rmw.latency > seq.latency);
}

#[test]
fn gateway_sweep_stays_within_ceilings() {
    let mut gateway = gateway();
    for bsize in [4 * KB, 128 * KB, 4 * MB] {
        for depth in [1., 16., 64.] {
            for seq in [false, true] {
                assert_within_ceilings(&gateway.read(bsize as f64, depth, seq));
                assert_within_ceilings(&gateway.write(bsize as f64, depth, seq));
            }
        }
    }
    for warning in gateway.take_all_warnings() {
        assert!(warning.starts_with("Gateway ") || warning.starts_with("Server "));
    }
}

#[test]
fn dlm_lock_covers_round_trip() {
    let mut dlm = Config::from_yaml(NODE).unwrap().build_dlm().unwrap();
    let lock = dlm.lock();
    // two minimal messages over a 5us NIC and 1us of lock processing
    assert!(lock.latency >= 2. * 5. + 1.);
    assert_float_eq(lock.bandwidth, SECOND / lock.latency, 1e-12);
}

#[test]
fn repeated_sweeps_do_not_repeat_warnings() {
    let mut server = server();
    for _ in 0..3 {
        for depth in [1., 32.] {
            server.read(4096., depth, false);
            server.write(4096., depth, false);
        }
    }
    let warnings = server.take_warnings();
    for (i, warning) in warnings.iter().enumerate() {
        assert!(!warnings[i + 1..].contains(warning), "{} repeated", warning);
    }
}
