//! Copyright (c) 2025-2026, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了CLI命令行接口。

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "mlcache")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[arg(long, global = true, default_value = "info", help = "Log filter when RUST_LOG is unset")]
    pub log: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    #[command(name = "check", about = "Validate a configuration file")]
    Check(CheckArgs),

    #[command(
        name = "simulate",
        about = "Run a concurrent lookup burst against in-memory L2/L3 backends"
    )]
    Simulate(SimulateArgs),
}

#[derive(Parser, Debug)]
pub struct CheckArgs {
    #[arg(short, long, help = "Path to the TOML configuration file")]
    pub config: PathBuf,
}

#[derive(Parser, Debug)]
pub struct SimulateArgs {
    #[arg(short, long, help = "Optional TOML configuration file")]
    pub config: Option<PathBuf>,

    #[arg(long, default_value_t = 50, help = "Concurrent lookups per round")]
    pub concurrency: usize,

    #[arg(long, default_value_t = 4, help = "Number of distinct keys")]
    pub keys: usize,

    #[arg(long, default_value_t = 2, help = "Number of rounds")]
    pub rounds: usize,

    #[arg(long, default_value_t = 50, help = "Simulated L3 latency in milliseconds")]
    pub latency_ms: u64,

    #[arg(long, default_value_t = 0, help = "Fail the first N L3 reads")]
    pub fail_first: usize,

    #[arg(short, long, help = "Print metrics in Prometheus format")]
    pub prometheus: bool,
}

mod check;
mod simulate;

pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    crate::telemetry::init_logging(&cli.log);

    match &cli.command {
        Commands::Check(args) => check::execute(args),
        Commands::Simulate(args) => simulate::execute(args).await,
    }
}
