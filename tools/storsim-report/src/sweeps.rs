//! Standard test sweeps over the configured components.


use storsim_cluster::config::TestsConfig;
use storsim_cluster::{Config, ConfigError};
use storsim_core::units::{GIG, KB, MEG, SECOND};
use storsim_core::{log_info, Estimate, Load};
use storsim_storage::{Device, FileSystem, StorageDevice};

use crate::report::{Params, Report, Row, Table};

const THROUGHPUT: [&str; 4] = ["seq read", "seq write", "rnd read", "rnd write"];
const RANDOM: [&str; 2] = ["rnd read", "rnd write"];

fn from_time(bsize: u64, t: f64) -> Estimate {
    Estimate::new(t, bsize as f64 * SECOND / t, Load::new())
}

/// Runs every test enabled in the config.
pub fn run(config: &Config) -> Result<Report, ConfigError> {
    let tests = &config.tests;
    let mut report = Report::default();
    if tests.disk_params {
        disk_params(config, &mut report)?;
    }
    if tests.device {
        device(config, &mut report)?;
    }
    if tests.fs {
        fs(config, &mut report)?;
    }
    if tests.filestore {
        filestore(config, &mut report)?;
    }
    if tests.server {
        server(config, &mut report)?;
    }
    if tests.dlm {
        dlm(config, &mut report)?;
    }
    if tests.gateway {
        gateway(config, &mut report)?;
    }
    if tests.rados {
        rados(config, &mut report)?;
    }
    Ok(report)
}

fn disk_params(config: &Config, report: &mut Report) -> Result<(), ConfigError> {
    let device = config.data.build_device()?;
    let mut values = Vec::new();
    match &device {
        Device::Disk(hdd) | Device::DumbDisk(hdd) => {
            let params = hdd.params();
            values.push(("drive size".to_string(), format!("{:.0} GB", hdd.size() / GIG)));
            values.push(("rpm".to_string(), format!("{:.0}", hdd.rpm())));
            values.push(("xfer rate".to_string(), format!("{:.0} MB/s", hdd.media_speed() / MEG)));
            values.push((
                "seek time".to_string(),
                format!(
                    "{:.0}-{:.0}us, avg {:.0}us",
                    params.settle_read, params.max_seek, params.avg_seek
                ),
            ));
            values.push(("write back".to_string(), params.do_writeback.to_string()));
            values.push(("read ahead".to_string(), params.do_readahead.to_string()));
            values.push(("max depth".to_string(), format!("{:.0}", params.nr_requests)));
            values.push(("rotation".to_string(), format!("{:.0}us", 60. * SECOND / hdd.rpm())));
            values.push(("track size".to_string(), format!("{:.0} bytes", hdd.track_size())));
            values.push(("heads".to_string(), format!("{:.0}", hdd.heads())));
            values.push(("cylinders".to_string(), format!("{:.0}", hdd.cylinders())));
            for &bsize in &config.tests.bsizes {
                let t = hdd.xfer_time(bsize as f64, true);
                values.push((
                    format!("xfer {}K", bsize / KB),
                    format!("{:.0}us, {:.0} IOPS", t, SECOND / t),
                ));
            }
            let mut cyls = 1.;
            while cyls < hdd.cylinders() * 10. {
                values.push((
                    format!("seek {} cyls", cyls),
                    format!(
                        "{:.0}us read, {:.0}us write",
                        hdd.seek_time(cyls, true),
                        hdd.seek_time(cyls, false)
                    ),
                ));
                cyls *= 10.;
            }
        }
        Device::Ssd(ssd) => {
            values.push(("drive size".to_string(), format!("{:.0} GB", ssd.size() / GIG)));
            values.push(("xfer rate".to_string(), format!("{:.0} MB/s", ssd.media_speed() / MEG)));
            values.push(("max IOPS".to_string(), format!("{:.0}", ssd.max_iops())));
            values.push(("streams".to_string(), format!("{:.0}", ssd.streams())));
        }
    }
    report.params.push(Params {
        title: format!("{} parameters", device.desc()),
        values,
    });
    Ok(())
}

fn device(config: &Config, report: &mut Report) -> Result<(), ConfigError> {
    let tests = &config.tests;
    let device = config.data.build_device()?;
    for &depth in &tests.depths {
        let depth = depth as f64;
        let mut table = Table::new(format!("{} (depth={})", device.desc(), depth), &THROUGHPUT);
        for &bsize in &tests.bsizes {
            let bs = bsize as f64;
            let estimates = [
                from_time(bsize, device.avg_time(bs, tests.file_size, true, true, depth)),
                from_time(bsize, device.avg_time(bs, tests.file_size, false, true, depth)),
                from_time(bsize, device.avg_time(bs, tests.file_size, true, false, depth)),
                from_time(bsize, device.avg_time(bs, tests.file_size, false, false, depth)),
            ];
            table.push(Row::data(bsize, &estimates));
        }
        report.tables.push(table);
    }
    Ok(())
}

fn fs_sweep(fs: &dyn FileSystem, tests: &TestsConfig, depth: f64) -> Table {
    let mut table = Table::new(format!("{} (depth={})", fs.desc(), depth), &THROUGHPUT);
    for &bsize in &tests.bsizes {
        let bs = bsize as f64;
        let estimates = [
            from_time(bsize, fs.read(bs, tests.file_size, true, depth, false)),
            from_time(bsize, fs.write(bs, tests.file_size, true, depth, false, false)),
            from_time(bsize, fs.read(bs, tests.file_size, false, depth, false)),
            from_time(bsize, fs.write(bs, tests.file_size, false, depth, false, false)),
        ];
        table.push(Row::data(bsize, &estimates));
    }
    table
}

fn fs(config: &Config, report: &mut Report) -> Result<(), ConfigError> {
    let fs = config.data.build_fs()?;
    let mut table = Table::new(fs.desc().to_string(), &["create", "delete", "getattr", "setattr"]);
    table.push(Row::ops(&[
        fs.create(false),
        fs.delete(false),
        fs.getattr(1.),
        fs.setattr(1., false),
    ]));
    report.tables.push(table);
    for &depth in &config.tests.depths {
        report.tables.push(fs_sweep(fs.as_ref(), &config.tests, depth as f64));
    }
    Ok(())
}

fn filestore(config: &Config, report: &mut Report) -> Result<(), ConfigError> {
    let tests = &config.tests;
    let mut store = config.build_filestore()?;
    let mut table = Table::new(store.desc(), &["create", "delete"]);
    table.push(Row::ops(&[store.create(), store.delete()]));
    report.tables.push(table);
    for &depth in &tests.depths {
        let depth = depth as f64;
        let mut table = Table::new(format!("{} (depth={})", store.desc(), depth), &RANDOM);
        for &bsize in &tests.bsizes {
            let bs = bsize as f64;
            let estimates = [
                from_time(bsize, store.read(bs, tests.obj_size, depth, tests.nobj)),
                from_time(bsize, store.write(bs, tests.obj_size, depth, tests.nobj)),
            ];
            table.push(Row::data(bsize, &estimates));
        }
        report.tables.push(table);
    }
    report.add_warnings(store.take_warnings());
    Ok(())
}

fn server(config: &Config, report: &mut Report) -> Result<(), ConfigError> {
    let mut server = config.build_server()?;
    let mut table = Table::new(server.desc(), &["create", "delete", "getattr", "setattr", "commit"]);
    let ops = [
        server.create(),
        server.delete(),
        server.getattr(0., 1.),
        server.setattr(0., 1., false),
        server.commit(),
    ];
    table.push(Row::ops(&ops.map(|e| e.latency)));
    report.tables.push(table);
    for &depth in &config.tests.depths {
        log_info!(server, "sweep: depth {}", depth);
        let depth = depth as f64;
        let mut table = Table::new(format!("{} (depth={})", server.desc(), depth), &THROUGHPUT);
        for &bsize in &config.tests.bsizes {
            let bs = bsize as f64;
            let estimates = [
                server.read(bs, depth, true),
                server.write(bs, depth, true),
                server.read(bs, depth, false),
                server.write(bs, depth, false),
            ];
            table.push(Row::data(bsize, &estimates));
        }
        report.tables.push(table);
    }
    report.add_warnings(server.take_warnings());
    Ok(())
}

fn dlm(config: &Config, report: &mut Report) -> Result<(), ConfigError> {
    let mut dlm = config.build_dlm()?;
    let mut table = Table::new(dlm.desc(), &["lock"]);
    table.push(Row::ops(&[dlm.lock().latency]));
    report.tables.push(table);
    report.add_warnings(dlm.take_warnings());
    Ok(())
}

fn gateway(config: &Config, report: &mut Report) -> Result<(), ConfigError> {
    let mut gateway = config.build_gateway()?;
    let mut table = Table::new(gateway.desc(), &["create", "delete"]);
    let ops = [gateway.create(), gateway.delete()];
    table.push(Row::ops(&ops.map(|e| e.latency)));
    report.tables.push(table);
    for &depth in &config.tests.depths {
        log_info!(gateway, "sweep: depth {}", depth);
        let depth = depth as f64;
        let mut table = Table::new(format!("{} (depth={})", gateway.desc(), depth), &THROUGHPUT);
        for &bsize in &config.tests.bsizes {
            let bs = bsize as f64;
            let estimates = [
                gateway.read(bs, depth, true),
                gateway.write(bs, depth, true),
                gateway.read(bs, depth, false),
                gateway.write(bs, depth, false),
            ];
            table.push(Row::data(bsize, &estimates));
        }
        report.tables.push(table);
    }
    report.add_warnings(gateway.take_all_warnings());
    Ok(())
}

fn rados(config: &Config, report: &mut Report) -> Result<(), ConfigError> {
    let tests = &config.tests;
    let mut rados = config.build_rados()?;
    let mut table = Table::new(rados.desc(), &["create", "delete"]);
    let ops = [rados.create(1.), rados.delete(1.)];
    table.push(Row::ops(&ops.map(|e| e.latency)));
    report.tables.push(table);
    for &clients in &tests.clients {
        for &copies in &tests.copies {
            for &depth in &tests.depths {
                log_info!(rados, "sweep: {} clients, {} copies, depth {}", clients, copies, depth);
                let title = format!(
                    "{} (clients={}, copies={}, depth={})",
                    rados.desc(),
                    clients,
                    copies,
                    depth
                );
                let (clients, copies, depth) = (clients as f64, copies as f64, depth as f64);
                let mut table = Table::new(title, &RANDOM);
                for &bsize in &tests.bsizes {
                    let bs = bsize as f64;
                    let estimates = [
                        rados.read(bs, tests.obj_size, tests.nobj, depth, clients),
                        rados.write(bs, tests.obj_size, tests.nobj, depth, clients, copies),
                    ];
                    table.push(Row::data(bsize, &estimates));
                }
                report.tables.push(table);
            }
        }
    }
    report.add_warnings(rados.take_warnings());
    Ok(())
}
