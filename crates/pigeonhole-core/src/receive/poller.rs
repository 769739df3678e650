//! The receive loop of a single worker

use super::backoff::Backoff;
use super::breaker::CircuitBreaker;
use crate::codec;
use crate::io::{TransportError, claim_with_retry};
use crate::io::claim::ClaimedFile;
use crate::queue::{MALFORMED_SUFFIX, QueueLayout};
use crate::root::RootLocator;
use crate::schema::{Address, Message};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

/// Host callbacks invoked for every received message.
///
/// `process` runs the host's handlers; an error (or panic) it raises is
/// captured and passed to `complete`, which is always called afterwards.
/// The message file is deleted once `complete` returns, whatever the
/// outcome: a failed message is not redelivered.
pub trait Dispatch: Send + Sync {
    fn process(&self, message: &Message) -> anyhow::Result<()>;

    fn complete(&self, message: &Message, error: Option<&anyhow::Error>) {
        let _ = (message, error);
    }
}

impl<F> Dispatch for F
where
    F: Fn(&Message) -> anyhow::Result<()> + Send + Sync,
{
    fn process(&self, message: &Message) -> anyhow::Result<()> {
        self(message)
    }
}

/// Receive tuning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveSettings {
    /// Number of concurrent workers
    pub concurrency: usize,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    /// Attempts to claim a busy file before moving on
    pub claim_attempts: u32,
    /// Fixed delay between claim attempts
    pub claim_retry_delay: Duration,
    /// Delete everything in the queue before the first worker starts
    pub purge_on_startup: bool,
}

impl Default for ReceiveSettings {
    fn default() -> Self {
        Self {
            concurrency: 1,
            backoff_base: super::backoff::DEFAULT_BASE,
            backoff_max: super::backoff::DEFAULT_MAXIMUM,
            claim_attempts: 3,
            claim_retry_delay: Duration::from_millis(10),
            purge_on_startup: false,
        }
    }
}

/// Everything the workers of one receiver share
pub(crate) struct ReceiverContext {
    pub address: Address,
    pub locator: Arc<dyn RootLocator>,
    pub layout: QueueLayout,
    pub settings: ReceiveSettings,
    pub dispatch: Arc<dyn Dispatch>,
    pub breaker: Arc<CircuitBreaker>,
}

/// Result of one scan-and-deliver cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// A message was handed to the host and its file removed
    Delivered { id: String },
    /// Nothing claimable, or the working root is not mounted
    Empty,
}

/// One worker loop.
///
/// Each relaunch after a failure gets a fresh `Worker`, so backoff state
/// starts over.
pub(crate) struct Worker {
    index: usize,
    context: Arc<ReceiverContext>,
    backoff: Backoff,
}

impl Worker {
    pub fn new(index: usize, context: Arc<ReceiverContext>) -> Self {
        let backoff = Backoff::new(context.settings.backoff_base, context.settings.backoff_max);
        Self {
            index,
            context,
            backoff,
        }
    }

    /// Poll until cancelled.
    ///
    /// Cancellation is checked once per cycle; a delivery in progress always
    /// finishes. Availability failures end the loop with an error so the
    /// supervisor can record them and relaunch.
    pub fn run(&mut self, cancel: &CancellationToken) -> Result<(), TransportError> {
        while !cancel.is_cancelled() {
            let outcome = self.poll_once()?;
            self.context.breaker.success();
            self.backoff.wait(outcome == PollOutcome::Empty, cancel);
        }
        debug!(
            "Worker {} for {} cancelled",
            self.index, self.context.address
        );
        Ok(())
    }

    /// Scan the queue once and deliver at most one message.
    pub fn poll_once(&mut self) -> Result<PollOutcome, TransportError> {
        let ctx = &self.context;
        let Some(root) = ctx.locator.locate() else {
            trace!("Working root unavailable");
            return Ok(PollOutcome::Empty);
        };

        let dir = ctx.layout.resolve_queue_dir(&root, &ctx.address)?;
        for path in ctx.layout.message_files(&dir)? {
            let Some(claimed) = claim_with_retry(
                &path,
                ctx.settings.claim_attempts,
                ctx.settings.claim_retry_delay,
            ) else {
                continue;
            };

            match codec::decode(claimed.contents()) {
                Ok(message) => return self.deliver(claimed, message),
                Err(source) => set_aside_malformed(claimed, source),
            }
        }

        Ok(PollOutcome::Empty)
    }

    fn deliver(
        &self,
        claimed: ClaimedFile,
        message: Message,
    ) -> Result<PollOutcome, TransportError> {
        let dispatch = &self.context.dispatch;
        debug!(
            "Worker {} delivering message {} from {:?}",
            self.index,
            message.id,
            claimed.path()
        );

        let error = match catch_unwind(AssertUnwindSafe(|| dispatch.process(&message))) {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e),
            Err(panic) => Some(anyhow::anyhow!(
                "message handler panicked: {}",
                panic_message(panic.as_ref())
            )),
        };
        if let Some(e) = &error {
            debug!("Processing message {} failed: {e:#}", message.id);
        }

        dispatch.complete(&message, error.as_ref());
        claimed.remove()?;

        Ok(PollOutcome::Delivered { id: message.id })
    }
}

fn set_aside_malformed(claimed: ClaimedFile, source: codec::CodecError) {
    let malformed = TransportError::Malformed {
        path: claimed.path().to_path_buf(),
        source,
    };
    warn!("{malformed}");

    let path = claimed.path().to_path_buf();
    match claimed.set_aside(MALFORMED_SUFFIX) {
        Ok(Some(moved)) => warn!("Moved malformed message file to {moved:?}"),
        Ok(None) => debug!("Malformed message file {path:?} was replaced; leaving it"),
        Err(e) => warn!("Could not move malformed message file {path:?} aside: {e}"),
    }
}

pub(crate) fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
