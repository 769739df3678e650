//! Ensure command implementation

use anyhow::{Result, bail};
use clap::Args;
use pigeonhole_core::{Address, CreateQueues};

use super::GlobalArgs;

/// Create a queue directory if it does not exist
#[derive(Args, Debug)]
pub struct EnsureArgs {
    /// Queue to create (queue or queue@machine)
    address: Address,
}

/// Execute the ensure command
pub fn execute(global: &GlobalArgs, args: EnsureArgs) -> Result<()> {
    let transport = global.resolve(None)?.transport();

    match transport.ensure_queue(&args.address)? {
        Some(dir) => {
            println!("{}", dir.display());
            Ok(())
        }
        None => bail!("Working root unavailable; cannot create queue {}", args.address),
    }
}
