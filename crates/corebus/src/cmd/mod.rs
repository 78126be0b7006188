use clap::{Args, Subcommand};

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod demo;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a scripted traffic scenario on simulated cores.
    Demo(DemoArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Demo(args) => demo::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct DemoArgs {
    /// Number of data-plane cores.
    #[arg(long, default_value = "2")]
    pub dp_cores: usize,

    /// Traffic duration (e.g. 500ms, 2s).
    #[arg(long, default_value = "250ms")]
    pub duration: String,

    /// Transmit port driven by the scenario.
    #[arg(long, default_value = "0")]
    pub port: u8,

    /// Packets-per-second of the synthetic stream program.
    #[arg(long, default_value = "1000")]
    pub pps: f64,

    /// Depth of every inter-core ring.
    #[arg(long, default_value = "256")]
    pub ring_capacity: usize,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
