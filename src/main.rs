//! prodshot CLI entrypoint.
//!
//! Thin wrapper over the `cli` module: parse args, dispatch to an individual
//! or collage batch (or the hidden worker loop), and exit with the right
//! status. For programmatic use, prefer the library API (`prodshot::api`).

use clap::Parser;

mod cli;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = cli::CliArgs::parse();
    cli::run(args)
}
