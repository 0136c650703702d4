use std::error::Error;
use std::io::Write;
use std::path::PathBuf;

use clap::Parser;
use env_logger::Builder;

use storsim_cluster::Config;

mod report;
mod sweeps;

#[derive(Parser, Debug)]
#[command(about, long_about = None)]
/// Estimates storage performance of the configured node and cluster
struct Args {
    /// Path to YAML file with node and test configuration
    #[arg(short, long)]
    config: PathBuf,

    /// Print results as JSON instead of text tables
    #[arg(short, long)]
    json: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    Builder::from_default_env()
        .format(|buf, record| writeln!(buf, "{}", record.args()))
        .init();

    let args = Args::parse();
    let config = Config::from_file(&args.config.to_string_lossy())?;
    let report = sweeps::run(&config)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.render());
    }
    Ok(())
}
