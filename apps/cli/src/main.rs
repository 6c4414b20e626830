//! scubuild CLI: unity build file generation for the engine's build driver.
//!
//! Generates SCU translation units from a module table, packs class
//! reference docs into a compressed header, and prints server platform flags.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli)
}
