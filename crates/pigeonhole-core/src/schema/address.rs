//! Queue addressing: `queue@machine`

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Address parsing/validation error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid address '{input}': {reason}")]
pub struct AddressError {
    pub input: String,
    pub reason: &'static str,
}

/// Logical destination of a message: a queue on a machine.
///
/// The machine component is optional; when omitted the queue lives under
/// the local machine name of whichever transport resolves it. Two addresses
/// with equal components always resolve to the same queue directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Address {
    queue: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    machine: Option<String>,
}

impl Address {
    /// Create an address for `queue` on `machine`.
    pub fn new(queue: &str, machine: &str) -> Result<Self, AddressError> {
        let input = format!("{queue}@{machine}");
        validate_component(queue, &input)?;
        validate_component(machine, &input)?;
        Ok(Self {
            queue: queue.to_string(),
            machine: Some(machine.to_string()),
        })
    }

    /// Create an address for `queue` on the local machine.
    pub fn local(queue: &str) -> Result<Self, AddressError> {
        validate_component(queue, queue)?;
        Ok(Self {
            queue: queue.to_string(),
            machine: None,
        })
    }

    /// Parse `queue` or `queue@machine`.
    ///
    /// A trailing `@` with nothing after it is treated as "local machine".
    pub fn parse(input: &str) -> Result<Self, AddressError> {
        let trimmed = input.trim();
        match trimmed.split_once('@') {
            Some((queue, machine)) if machine.trim().is_empty() => Self::local(queue.trim()),
            Some((queue, machine)) => {
                if machine.contains('@') {
                    return Err(AddressError {
                        input: input.to_string(),
                        reason: "more than one '@'",
                    });
                }
                Self::new(queue.trim(), machine.trim())
            }
            None => Self::local(trimmed),
        }
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Explicit machine component, if any.
    pub fn machine(&self) -> Option<&str> {
        self.machine.as_deref()
    }

    /// Machine component, falling back to `local_machine` when omitted.
    pub fn machine_or<'a>(&'a self, local_machine: &'a str) -> &'a str {
        self.machine.as_deref().unwrap_or(local_machine)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.machine {
            Some(machine) => write!(f, "{}@{}", self.queue, machine),
            None => f.write_str(&self.queue),
        }
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Each component becomes a single directory name under the working root.
fn validate_component(component: &str, input: &str) -> Result<(), AddressError> {
    let reason = if component.is_empty() {
        "empty queue or machine name"
    } else if component == "." || component == ".." {
        "relative path component"
    } else if component.contains(['/', '\\', '\0']) {
        "path separator in name"
    } else if component.contains(['\n', '\r']) {
        "line break in name"
    } else {
        return Ok(());
    };

    Err(AddressError {
        input: input.to_string(),
        reason,
    })
}
