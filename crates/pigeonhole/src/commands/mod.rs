//! CLI command dispatch and execution

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use pigeonhole_core::config::{Config, ConfigOverrides, resolve_config};
use pigeonhole_core::home::get_home_dir;
use std::path::PathBuf;

mod ensure;
mod listen;
mod purge;
mod root;
mod send;
mod status;

/// pigeon - store-and-forward queues on removable media
#[derive(Parser, Debug)]
#[command(
    name = "pigeon",
    version,
    about = "Store-and-forward message queues on removable media",
    long_about = "Send and receive messages through queue directories on a shared, \
                  intermittently mounted working root"
)]
pub struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every subcommand
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Config file to use instead of ~/.config/pigeonhole/config.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Working root to use instead of probing for the marker directory
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Local machine name (default: host name)
    #[arg(long, global = true)]
    machine: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a message into a queue
    Send(send::SendArgs),

    /// Create a queue directory if it does not exist
    Ensure(ensure::EnsureArgs),

    /// Delete every file in a queue
    Purge(purge::PurgeArgs),

    /// Receive messages from a local queue and print them
    Listen(listen::ListenArgs),

    /// Show messages waiting for other machines
    Status(status::StatusArgs),

    /// Print the currently mounted working root
    Root,
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        match self.command {
            Commands::Send(args) => send::execute(&self.global, args),
            Commands::Ensure(args) => ensure::execute(&self.global, args),
            Commands::Purge(args) => purge::execute(&self.global, args),
            Commands::Listen(args) => listen::execute(&self.global, args),
            Commands::Status(args) => status::execute(&self.global, args),
            Commands::Root => root::execute(&self.global),
        }
    }
}

impl GlobalArgs {
    /// Resolve configuration with these flags as the highest-priority layer.
    pub fn resolve(&self, concurrency: Option<usize>) -> Result<Config> {
        let home_dir = get_home_dir()?;
        let overrides = ConfigOverrides {
            root: self.root.clone(),
            machine: self.machine.clone(),
            concurrency,
            config_path: self.config.clone(),
        };
        Ok(resolve_config(&overrides, &home_dir)?)
    }
}

