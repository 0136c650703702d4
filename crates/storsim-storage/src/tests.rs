use std::collections::HashMap;

use approx::assert_abs_diff_eq;
use rstest::rstest;

use storsim_core::units::{GIG, KB, MB, MEG, SECOND};
use storsim_core::InvalidSpecError;

use crate::datafs::{DataFs, DataFsSpec};
use crate::device::{Device, DeviceSpec, StorageDevice};
use crate::filestore::FileStore;
use crate::fs::FileSystem;
use crate::hdd::Hdd;
use crate::poisson::{pn, pn_plus};
use crate::simfs::{Curve, FsKind, FsSpec, SimFs};

const FILE_SIZE: f64 = 16. * GIG;

fn disk() -> Device {
    Device::new(&DeviceSpec::disk()).unwrap()
}

fn ssd() -> Device {
    Device::new(&DeviceSpec::ssd()).unwrap()
}

fn xfs() -> SimFs {
    SimFs::new(disk(), &FsSpec::new(FsKind::Xfs)).unwrap()
}

fn measured_rates() -> HashMap<String, f64> {
    let mut rates = HashMap::new();
    for (pattern, base) in [("seq", 100. * MEG), ("rand", 10. * MEG)] {
        for (op, op_factor) in [("read", 1.), ("write", 0.8)] {
            for (bs, bs_factor) in [("4k", 1.), ("128k", 4.), ("4m", 8.)] {
                let bw = base * op_factor * bs_factor;
                rates.insert(format!("{}-{}-{}-d1", pattern, op, bs), bw);
                rates.insert(format!("{}-{}-{}-d32", pattern, op, bs), 2. * bw);
            }
        }
    }
    rates.insert("create".to_string(), 500.);
    rates.insert("delete".to_string(), 1000.);
    rates
}

fn measured_fs() -> DataFs {
    DataFs::new(&DataFsSpec {
        source: "bench".to_string(),
        size: None,
        speed: None,
        rates: measured_rates(),
    })
    .unwrap()
}

#[test]
fn test_disk_geometry() {
    let device = disk();
    let hdd = device.as_disk().unwrap();
    assert_eq!(device.desc(), "7200RPM Disk");
    assert_abs_diff_eq!(hdd.track_size(), 1.25e6);
    assert_abs_diff_eq!(hdd.cylinder_size(), 1.25e7);
    assert_abs_diff_eq!(hdd.cylinders(), 160000.);
    assert_abs_diff_eq!(hdd.cylinders_in(0.), 1.);
}

#[test]
fn test_disk_too_small_for_a_cylinder() {
    let result = Device::new(DeviceSpec::disk().set_size(1e6));
    assert!(matches!(result, Err(InvalidSpecError::Inconsistent { .. })));
    assert!(Device::new(DeviceSpec::disk().set_rpm(0.)).is_err());
    assert!(Device::new(DeviceSpec::ssd().set_iops(0.)).is_err());
}

#[test]
fn test_disk_random_small_read() {
    let device = disk();
    let t = device.avg_read(4096., FILE_SIZE, false, 1.);
    // seek and half a rotation dominate
    assert!(t > 4000. && t < 8000., "{}", t);
    assert!(t > SECOND / 120. / 2.);
}

#[test]
fn test_disk_sequential_large_read() {
    let device = disk();
    let bsize = 4. * MB as f64;
    let xfer = bsize * SECOND / (150. * MEG);
    let t = device.avg_read(bsize, FILE_SIZE, true, 1.);
    assert!(t >= xfer);
    assert!(t <= 1.25 * xfer, "{} vs {}", t, xfer);
}

#[test]
fn test_seek_time_bounds() {
    let device = disk();
    let hdd = device.as_disk().unwrap();
    assert_eq!(hdd.seek_time(0.5, true), 0.);
    assert_eq!(hdd.seek_time(1., true), 800.);
    assert_eq!(hdd.seek_time(1., false), 1400.);
    assert_eq!(hdd.seek_time(hdd.cylinders(), true), 13000.);
    assert_eq!(hdd.seek_time(10. * hdd.cylinders(), false), 13600.);
    let mut prev = 0.;
    for cyls in [1., 10., 100., 1000., 10000., 100000.] {
        let t = hdd.seek_time(cyls, true);
        assert!(t >= prev);
        prev = t;
    }
}

#[rstest]
#[case(1.)]
#[case(4.)]
#[case(32.)]
fn test_ssd_ignores_access_pattern(#[case] depth: f64) {
    let device = ssd();
    let seq = device.avg_read(4096., FILE_SIZE, true, depth);
    let rand = device.avg_read(4096., FILE_SIZE, false, depth);
    assert_eq!(seq, rand);
}

#[test]
fn test_ssd_small_read() {
    let device = ssd();
    let t = device.avg_read(4096., FILE_SIZE, false, 1.);
    assert_abs_diff_eq!(t, 50. + 4096. * SECOND / (200. * MEG), epsilon = 1e-9);
    assert_abs_diff_eq!(t, 70., epsilon = 1.);
    // allocation overhead
    assert!(device.avg_write(4096., FILE_SIZE, false, 1.) > t);
    // a single stream gets no queueing benefit
    assert_eq!(device.avg_read(4096., FILE_SIZE, false, 8.), t);
}

#[test]
fn test_ssd_streams() {
    let device = Device::new(DeviceSpec::ssd().set_streams(4)).unwrap();
    let t1 = device.avg_read(4096., FILE_SIZE, false, 1.);
    let t4 = device.avg_read(4096., FILE_SIZE, false, 4.);
    assert_abs_diff_eq!(t1 - t4, 50. - 12.5, epsilon = 1e-9);
    assert_eq!(device.avg_read(4096., FILE_SIZE, false, 16.), t4);
}

#[rstest]
#[case(false, true)]
#[case(false, false)]
#[case(true, false)]
fn test_depth_is_clamped(#[case] seq: bool, #[case] read: bool) {
    let device = disk();
    let deep = device.avg_time(4096., FILE_SIZE, read, seq, 1000.);
    let max = device.avg_time(4096., FILE_SIZE, read, seq, 128.);
    assert_eq!(deep, max);
    let shallow = device.avg_time(4096., FILE_SIZE, read, seq, 0.);
    assert_eq!(shallow, device.avg_time(4096., FILE_SIZE, read, seq, 1.));
}

#[test]
fn test_dumb_disk_does_not_queue() {
    let device = Device::new(&DeviceSpec::dumb()).unwrap();
    assert_eq!(device.desc(), "7200RPM Dumb Disk");
    assert_eq!(device.max_depth(), 1.);
    let d1 = device.avg_read(4096., FILE_SIZE, false, 1.);
    assert_eq!(device.avg_read(4096., FILE_SIZE, false, 32.), d1);
    // no scheduling, no caching, slower seeks
    assert!(d1 > disk().avg_read(4096., FILE_SIZE, false, 1.));
}

#[rstest]
#[case(true, true)]
#[case(true, false)]
#[case(false, true)]
#[case(false, false)]
fn test_latency_grows_with_block_size(#[case] seq: bool, #[case] read: bool) {
    let device = disk();
    let mut prev = 0.;
    let mut bsize = 4096.;
    while bsize <= 4. * MB as f64 {
        let t = device.avg_time(bsize, FILE_SIZE, read, seq, 1.);
        assert!(t > prev, "{} bytes: {} <= {}", bsize, t, prev);
        prev = t;
        bsize *= 2.;
    }
}

#[test]
fn test_deeper_queues_help_random_reads() {
    let device = disk();
    let d1 = device.avg_read(4096., FILE_SIZE, false, 1.);
    let d32 = device.avg_read(4096., FILE_SIZE, false, 32.);
    assert!(d32 < d1);
}

#[test]
fn test_write_back_cache_bounds() {
    let hdd = Hdd::new(7200., 2e12, 150. * MEG, 10).unwrap();
    assert_eq!(hdd.cache_size(4096., true, 1.), 4096. * 96.);
    assert_eq!(hdd.cache_size(4096., false, 100.), 4096. * 96. * 5.);
    assert_eq!(hdd.cache_size(64. * KB as f64, true, 5.), 4. * hdd.track_size());
    assert_eq!(hdd.cache_size(2e6, true, 1.), 0.);
}

#[test]
fn test_curve_interpolation() {
    let curve = Curve::new(0.08, 1.05);
    assert_abs_diff_eq!(curve.at(4096.), 0.08);
    assert_abs_diff_eq!(curve.at(4. * MB as f64), 1.05, epsilon = 1e-12);
    let mid = curve.at(128. * KB as f64);
    assert!(mid > 0.08 && mid < 1.05);
}

#[test]
fn test_fs_adds_metadata_overhead() {
    let fs = xfs();
    assert_eq!(fs.desc(), "XFS");
    let raw = fs.device().avg_read(4096., FILE_SIZE, false, 1.);
    assert!(fs.read(4096., FILE_SIZE, false, 1., true) > raw);
}

#[test]
fn test_fs_flush_depth_is_bounded() {
    let fs = xfs();
    assert_eq!(fs.flush_depth(4096., 1.), 16.);
    assert_eq!(fs.flush_depth(1e9, 1e9), 1.);
    let d = fs.flush_depth(MB as f64, 10000.);
    assert!((1. ..=16.).contains(&d));
}

#[test]
fn test_fs_sync_writes_are_slower() {
    let fs = xfs();
    let buffered = fs.write(4096., FILE_SIZE, false, 1., false, false);
    let sync = fs.write(4096., FILE_SIZE, false, 1., false, true);
    assert!(sync > buffered);
    assert!(fs.create(true) >= fs.create(false));
    assert!(fs.setattr(1., true) >= fs.setattr(1., false));
}

#[test]
fn test_fs_large_reads_are_sharded() {
    let fs = xfs();
    let one = fs.read(4. * MB as f64, FILE_SIZE, true, 1., false);
    let four = fs.read(16. * MB as f64, FILE_SIZE, true, 1., false);
    assert!(four > 3. * one);
}

#[test]
fn test_btrfs_aging() {
    let fresh = SimFs::new(disk(), &FsSpec::new(FsKind::Btrfs)).unwrap();
    let aged = SimFs::new(disk(), FsSpec::new(FsKind::Btrfs).set_age(0.3)).unwrap();
    assert_eq!(aged.desc(), "BTRFS(0.3)");
    assert_eq!(fresh.max_shard(), 4. * MB as f64);
    assert_eq!(aged.max_shard(), MB as f64);
    let bsize = 4. * MB as f64;
    assert!(aged.read(bsize, FILE_SIZE, false, 1., false) > fresh.read(bsize, FILE_SIZE, false, 1., false));
    assert!(SimFs::new(disk(), FsSpec::new(FsKind::Btrfs).set_age(1.5)).is_err());
}

#[test]
fn test_zfs_metadata_is_near_data() {
    let zfs = SimFs::new(disk(), &FsSpec::new(FsKind::Zfs)).unwrap();
    assert!(zfs.getattr(1.) < xfs().getattr(1.));
    assert!(zfs.open() < xfs().open());
}

#[test]
fn test_datafs_depth_interpolation() {
    let fs = measured_fs();
    let bw1 = 100. * MEG;
    let t1 = fs.read(4096., FILE_SIZE, true, 1., false);
    assert_abs_diff_eq!(t1, 4096. * SECOND / bw1, epsilon = 1e-9);
    let t32 = fs.read(4096., FILE_SIZE, true, 32., false);
    assert_abs_diff_eq!(t32, t1 / 2., epsilon = 1e-9);
    // log2(4) / log2(32)
    let t4 = fs.read(4096., FILE_SIZE, true, 4., false);
    assert_abs_diff_eq!(t4, 4096. * SECOND / (bw1 * 1.4), epsilon = 1e-9);
    assert_eq!(fs.read(4096., FILE_SIZE, true, 64., false), t32);
}

#[test]
fn test_datafs_block_size_adjustment() {
    let fs = measured_fs();
    let std = fs.read(4096., FILE_SIZE, false, 1., false);
    let t = fs.read(8192., FILE_SIZE, false, 1., false);
    assert_abs_diff_eq!(t - std, 4096. * SECOND / (140. * MEG), epsilon = 1e-9);
    // 128k bucket
    let t = fs.write(128. * KB as f64, FILE_SIZE, false, 1., false, false);
    assert_abs_diff_eq!(t, 128. * 1024. * SECOND / (10. * MEG * 0.8 * 4.), epsilon = 1e-6);
}

#[test]
fn test_datafs_metadata_operations() {
    let fs = measured_fs();
    assert_abs_diff_eq!(fs.create(false), 2000.);
    assert_abs_diff_eq!(fs.delete(true), 1000.);
    assert_eq!(fs.open(), fs.getattr(1.));
    assert!(fs.write(4096., FILE_SIZE, true, 1., false, true) > fs.write(4096., FILE_SIZE, true, 1., false, false));
}

#[test]
fn test_datafs_requires_all_measurements() {
    let mut rates = measured_rates();
    rates.remove("rand-write-4m-d32");
    let result = DataFs::new(&DataFsSpec {
        source: "partial".to_string(),
        size: None,
        speed: None,
        rates,
    });
    assert_eq!(
        result.unwrap_err(),
        InvalidSpecError::MissingMeasurement {
            component: "data fs partial".to_string(),
            key: "rand-write-4m-d32".to_string(),
        }
    );
}

#[test]
fn test_datafs_from_yaml() {
    let mut yaml = "source: yaml bench\nsize: 1e12\nrates:\n".to_string();
    for (key, rate) in measured_rates() {
        yaml.push_str(&format!("  {}: {}\n", key, rate));
    }
    let spec = DataFsSpec::from_yaml(&yaml).unwrap();
    assert_eq!(spec.source, "yaml bench");
    let fs = DataFs::new(&spec).unwrap();
    assert_eq!(fs.desc(), "yaml bench");
    assert_eq!(fs.size(), 1e12);
}

#[test]
fn test_poisson() {
    assert_abs_diff_eq!(pn(1., 1., 0), (-1f64).exp());
    assert_abs_diff_eq!(pn(2., 1., 2), 2. * (-2f64).exp(), epsilon = 1e-12);
    assert_abs_diff_eq!(pn_plus(1., 1., 0), 1.);
    assert_abs_diff_eq!(pn_plus(1., 1., 2), 1. - 2. * (-1f64).exp(), epsilon = 1e-12);
}

#[test]
fn test_filestore_cache_warning_is_reported_once() {
    let mut store = FileStore::new(Box::new(measured_fs()), None, 1).unwrap();
    assert_eq!(store.md_miss_rate(2500.), 0.);
    assert_abs_diff_eq!(store.md_miss_rate(10000.), 0.75);
    let t = store.read(4096., 4. * MB as f64, 16., 2500.);
    assert!(t > 0.);
    store.read(4096., 4. * MB as f64, 16., 1000.);
    assert_eq!(store.warnings().len(), 1);
    assert!(store.warnings().messages()[0].contains("data cache"));
    assert_eq!(store.take_warnings().len(), 1);
    assert!(store.warnings().is_empty());
}

#[test]
fn test_filestore_journal() {
    let mut shared = FileStore::new(Box::new(xfs()), Some(Box::new(measured_fs())), 4).unwrap();
    let mut collocated = FileStore::new(Box::new(xfs()), None, 1).unwrap();
    assert_eq!(shared.desc(), "XFS data, bench journal");
    assert_eq!(collocated.desc(), "XFS data+journal");
    let obj = 4. * MB as f64;
    assert!(shared.write(4096., obj, 16., 100000.) > 0.);
    assert!(collocated.write(4096., obj, 16., 100000.) > 0.);
    assert!(collocated.create() > 0.);
    assert!(collocated.delete() > 0.);
}
