mod cli;
mod commands;
mod config;
mod constants;
mod git;
mod logging;
mod process;
mod registry;
mod remote;
mod shell;
mod worktree;


use anyhow::Result;
use clap::Parser;

use cli::Cli;
use config::Config;

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose);
    let config = Config::load()?;
    commands::run(cli.command, &config)
}
