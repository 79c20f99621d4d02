//! flashinst CLI Tool - Main Entry Point

use anyhow::Result;
use clap::Parser;

use flashinst_cli::cli;

fn main() -> Result<()> {
    env_logger::init();
    let cli = cli::Cli::parse();
    cli::run(cli)
}
