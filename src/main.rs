mod cli;
mod config;
mod core;
mod error;
mod logging;
mod models;
mod sources;

use clap::Parser;

fn main() {
    let cli = cli::Cli::parse();
    logging::init_tracing(cli.verbose);

    if let Err(e) = cli::run(cli) {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}
