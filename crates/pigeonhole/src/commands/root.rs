//! Root command implementation

use anyhow::Result;

use super::GlobalArgs;

/// Print the currently mounted working root, or "unavailable"
pub fn execute(global: &GlobalArgs) -> Result<()> {
    let transport = global.resolve(None)?.transport();

    match transport.locate_root() {
        Some(root) => println!("{}", root.display()),
        None => println!("unavailable"),
    }
    Ok(())
}
