//! Purge command implementation

use anyhow::Result;
use clap::Args;
use pigeonhole_core::Address;

use super::GlobalArgs;

/// Delete every file in a queue
#[derive(Args, Debug)]
pub struct PurgeArgs {
    /// Queue to empty (queue or queue@machine)
    address: Address,
}

/// Execute the purge command
pub fn execute(global: &GlobalArgs, args: PurgeArgs) -> Result<()> {
    let transport = global.resolve(None)?.transport();

    let removed = transport.purge(&args.address)?;
    println!("Purged {removed} file(s) from {}", args.address);
    Ok(())
}
