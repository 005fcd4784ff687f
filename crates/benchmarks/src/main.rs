//! Command-line driver for kernelcheck.

use anyhow::Result;
use clap::Parser;
use kernelcheck_harness::cli::{run_cli, Cli};

fn main() -> Result<()> {
    let cli = Cli::parse();
    run_cli(cli)
}
