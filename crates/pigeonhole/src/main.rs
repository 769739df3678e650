//! pigeon - store-and-forward queues on removable media
//!
//! A thin CLI over `pigeonhole-core`: drop messages into queues on the
//! shared medium, receive them on the other side, and see what is still
//! waiting to be carried.

use clap::Parser;

mod commands;

use commands::Cli;

fn main() {
    pigeonhole_core::logging::init();
    let cli = Cli::parse();

    if let Err(e) = cli.execute() {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}
