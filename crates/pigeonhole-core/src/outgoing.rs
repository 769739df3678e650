//! Pending-delivery report for queues of other machines
//!
//! Messages addressed to another machine sit on the medium until it is
//! physically carried there. The report tells the operator where to take it.

use crate::io::TransportError;
use crate::queue::QueueLayout;
use crate::root::RootLocator;
use serde::Serialize;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread::JoinHandle;
use std::time::Duration;
use tracing::{debug, info};

/// Messages waiting on the medium for one machine
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingMachine {
    pub machine: String,
    pub pending: usize,
}

/// Count pending message files per remote machine under `root`.
///
/// The local machine and machines with nothing pending are left out. The
/// busiest machine comes first; ties are ordered by name.
pub fn outgoing_report(
    root: &Path,
    layout: &QueueLayout,
) -> Result<Vec<PendingMachine>, TransportError> {
    let entries = fs::read_dir(root).map_err(|e| TransportError::io(root, e))?;

    let mut report = Vec::new();
    for entry in entries {
        let machine_dir = entry.map_err(|e| TransportError::io(root, e))?.path();
        if !machine_dir.is_dir() {
            continue;
        }
        let Some(machine) = machine_dir.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if machine == layout.local_machine() {
            continue;
        }

        let pending = pending_in_machine(&machine_dir, layout)?;
        if pending > 0 {
            report.push(PendingMachine {
                machine: machine.to_string(),
                pending,
            });
        }
    }

    report.sort_by(|a, b| b.pending.cmp(&a.pending).then_with(|| a.machine.cmp(&b.machine)));
    Ok(report)
}

fn pending_in_machine(machine_dir: &Path, layout: &QueueLayout) -> Result<usize, TransportError> {
    let queues = fs::read_dir(machine_dir).map_err(|e| TransportError::io(machine_dir, e))?;

    let mut total = 0;
    for queue in queues {
        let queue_dir = queue.map_err(|e| TransportError::io(machine_dir, e))?.path();
        if queue_dir.is_dir() {
            total += layout.message_files(&queue_dir)?.len();
        }
    }
    Ok(total)
}

/// Background thread that periodically logs the outgoing report.
///
/// Failures (no medium, I/O errors) are ignored; the next tick tries again.
pub struct OutgoingMonitor {
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl OutgoingMonitor {
    /// Start reporting every `interval`; the first report comes after one interval.
    pub fn spawn(
        locator: Arc<dyn RootLocator>,
        layout: QueueLayout,
        interval: Duration,
    ) -> Result<Self, TransportError> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let handle = std::thread::Builder::new()
            .name("pigeonhole-outgoing".to_string())
            .spawn(move || {
                loop {
                    match stop_rx.recv_timeout(interval) {
                        Err(RecvTimeoutError::Timeout) => log_report(locator.as_ref(), &layout),
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                debug!("Outgoing monitor stopped");
            })
            .map_err(TransportError::Spawn)?;

        Ok(Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    pub fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for OutgoingMonitor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn log_report(locator: &dyn RootLocator, layout: &QueueLayout) {
    let Some(root) = locator.locate() else {
        return;
    };
    let Ok(report) = outgoing_report(&root, layout) else {
        return;
    };
    let Some(busiest) = report.first() else {
        return;
    };

    let total: usize = report.iter().map(|m| m.pending).sum();
    info!(
        "{total} message(s) awaiting delivery in outgoing queues. Consider carrying the medium to {} ({} pending).",
        busiest.machine, busiest.pending
    );
}
