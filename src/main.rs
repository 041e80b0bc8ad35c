//! Command line front end.
//!
//! ```text
//!   candidate-filter describe candidates.csv
//!   candidate-filter filter candidates.csv -w "age Between 25 40" -o shortlist.parquet
//!   candidate-filter filter candidates.csv --last --save-last
//!   candidate-filter operators date
//! ```
//!
//! Set `RUST_LOG=debug` to see loading and inference details.

mod cli;

use anyhow::Result;
use clap::Parser as _;

fn main() -> Result<()> {
    env_logger::init();

    let cli = cli::Cli::parse();
    cli::run_command(cli)
}
