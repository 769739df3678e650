//! Status command implementation

use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::path::PathBuf;

use pigeonhole_core::outgoing::PendingMachine;

use super::GlobalArgs;

/// Show messages waiting for other machines
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Serialize)]
struct StatusReport<'a> {
    machine: &'a str,
    root: Option<PathBuf>,
    outgoing: Vec<PendingMachine>,
}

/// Execute the status command
pub fn execute(global: &GlobalArgs, args: StatusArgs) -> Result<()> {
    let transport = global.resolve(None)?.transport();

    let root = transport.locate_root();
    let outgoing = if root.is_some() {
        transport.outgoing_report()?
    } else {
        Vec::new()
    };

    if args.json {
        let report = StatusReport {
            machine: transport.local_machine(),
            root,
            outgoing,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Machine: {}", transport.local_machine());
    let Some(root) = root else {
        println!("Working root: unavailable");
        return Ok(());
    };
    println!("Working root: {}", root.display());

    if outgoing.is_empty() {
        println!("No messages awaiting delivery to other machines");
        return Ok(());
    }

    let total: usize = outgoing.iter().map(|m| m.pending).sum();
    println!("{total} message(s) awaiting delivery:");
    for entry in &outgoing {
        println!("  {:<24} {}", entry.machine, entry.pending);
    }
    Ok(())
}
