//! Worker supervision for a receiving endpoint

use super::breaker::CircuitBreaker;
use super::poller::{ReceiverContext, Worker, panic_message};
use crate::io::TransportError;
use crate::root::RootLocator;
use crate::schema::Address;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::thread::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Receives messages from one queue with a pool of supervised workers.
///
/// Lifecycle: `start()` → `stop()`. A worker that fails (availability
/// error or panic) is logged, reported to the shared circuit breaker and
/// relaunched. Dropping a running receiver stops it.
pub struct Receiver {
    context: Arc<ReceiverContext>,
    cancel: Option<CancellationToken>,
    workers: Vec<JoinHandle<()>>,
}

impl Receiver {
    pub(crate) fn new(context: ReceiverContext) -> Self {
        Self {
            context: Arc::new(context),
            cancel: None,
            workers: Vec::new(),
        }
    }

    pub fn address(&self) -> &Address {
        &self.context.address
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.context.breaker
    }

    pub fn is_running(&self) -> bool {
        self.cancel.is_some()
    }

    /// Launch `concurrency` workers (at least one).
    ///
    /// Purges the queue first when configured to. Calling `start` on a
    /// running receiver does nothing.
    pub fn start(&mut self, concurrency: usize) -> Result<(), TransportError> {
        if self.is_running() {
            warn!("Receiver for {} already started", self.context.address);
            return Ok(());
        }

        if self.context.settings.purge_on_startup {
            self.purge_on_startup();
        }

        let cancel = CancellationToken::new();
        let concurrency = concurrency.max(1);
        for index in 0..concurrency {
            let context = Arc::clone(&self.context);
            let token = cancel.clone();
            let spawned = std::thread::Builder::new()
                .name(format!("pigeonhole-worker-{index}"))
                .spawn(move || supervise(index, context, token));

            match spawned {
                Ok(handle) => self.workers.push(handle),
                Err(e) => {
                    cancel.cancel();
                    self.join_workers();
                    return Err(TransportError::Spawn(e));
                }
            }
        }

        info!(
            "Receiving from {} with {} worker(s)",
            self.context.address, concurrency
        );
        self.cancel = Some(cancel);
        Ok(())
    }

    /// Signal all workers to stop and wait for them.
    ///
    /// Backoff and failure delays end early; an in-flight delivery is never
    /// interrupted.
    pub fn stop(&mut self) {
        let Some(cancel) = self.cancel.take() else {
            return;
        };
        cancel.cancel();
        self.join_workers();
        info!("Stopped receiving from {}", self.context.address);
    }

    fn join_workers(&mut self) {
        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                warn!("Worker thread for {} panicked", self.context.address);
            }
        }
    }

    fn purge_on_startup(&self) {
        let ctx = &self.context;
        let Some(root) = ctx.locator.locate() else {
            debug!("Working root unavailable, nothing to purge");
            return;
        };
        let dir = ctx.layout.queue_dir(&root, &ctx.address);
        match ctx.layout.purge_dir(&dir) {
            Ok(removed) => info!("Purged {removed} file(s) from {}", ctx.address),
            Err(e) => warn!("Failed to purge {}: {e}", ctx.address),
        }
    }
}

impl Drop for Receiver {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for Receiver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Receiver")
            .field("address", &self.context.address)
            .field("running", &self.is_running())
            .field("workers", &self.workers.len())
            .finish()
    }
}

/// Run one worker slot, relaunching the worker after every failure until
/// cancellation.
fn supervise(index: usize, context: Arc<ReceiverContext>, cancel: CancellationToken) {
    while !cancel.is_cancelled() {
        let mut worker = Worker::new(index, Arc::clone(&context));
        let cause = match catch_unwind(AssertUnwindSafe(|| worker.run(&cancel))) {
            Ok(Ok(())) => break,
            Ok(Err(e)) => e.to_string(),
            Err(panic) => format!("worker panicked: {}", panic_message(panic.as_ref())),
        };

        warn!(
            "Worker {index} for {} failed to reach the working root, restarting: {cause}",
            context.address
        );
        context.breaker.failure_unless_cancelled(&cause, &cancel);
    }
    debug!("Worker {index} for {} exited", context.address);
}

/// Builds a [`Receiver`]
pub struct ReceiverBuilder {
    pub(crate) address: Address,
    pub(crate) locator: Arc<dyn RootLocator>,
    pub(crate) layout: crate::queue::QueueLayout,
    pub(crate) settings: super::ReceiveSettings,
    pub(crate) breaker: Arc<CircuitBreaker>,
}

impl ReceiverBuilder {
    /// Replace the receive settings.
    pub fn settings(mut self, settings: super::ReceiveSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Share an existing circuit breaker instead of the transport's default.
    pub fn breaker(mut self, breaker: Arc<CircuitBreaker>) -> Self {
        self.breaker = breaker;
        self
    }

    pub fn build(self, dispatch: Arc<dyn super::Dispatch>) -> Receiver {
        Receiver::new(ReceiverContext {
            address: self.address,
            locator: self.locator,
            layout: self.layout,
            settings: self.settings,
            dispatch,
            breaker: self.breaker,
        })
    }
}
