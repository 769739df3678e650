//! Transport facade and host-facing capability traits
//!
//! A [`Transport`] is an explicit, cheaply clonable configuration object:
//! root locator, queue layout, receive settings and breaker tuning. Hosts
//! use it through the capability traits, so several independent transports
//! can coexist in one process (and in one test binary).

use crate::io::TransportError;
use crate::outgoing::{self, OutgoingMonitor, PendingMachine};
use crate::queue::QueueLayout;
use crate::receive::{
    CircuitBreaker, CircuitBreakerConfig, CriticalErrorHandler, Dispatch, ReceiveSettings,
    Receiver, ReceiverBuilder,
};
use crate::root::RootLocator;
use crate::schema::{Address, Message};
use crate::sender::{self, SendOutcome};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Create queues ahead of use
pub trait CreateQueues {
    /// Make sure the queue directory for `address` exists.
    ///
    /// Returns `Ok(None)` when no working root is mounted.
    fn ensure_queue(&self, address: &Address) -> Result<Option<PathBuf>, TransportError>;
}

/// Send messages to queues
pub trait SendMessages {
    fn send(&self, message: &Message, address: &Address) -> Result<SendOutcome, TransportError>;
}

/// Receive lifecycle of one input queue
pub trait DequeueMessages {
    fn start(&mut self, concurrency: usize) -> Result<(), TransportError>;
    fn stop(&mut self);
}

#[derive(Clone)]
pub struct Transport {
    locator: Arc<dyn RootLocator>,
    layout: QueueLayout,
    receive: ReceiveSettings,
    breaker: CircuitBreakerConfig,
}

impl Transport {
    pub fn new(locator: impl RootLocator + 'static, layout: QueueLayout) -> Self {
        Self::with_shared_locator(Arc::new(locator), layout)
    }

    pub fn with_shared_locator(locator: Arc<dyn RootLocator>, layout: QueueLayout) -> Self {
        Self {
            locator,
            layout,
            receive: ReceiveSettings::default(),
            breaker: CircuitBreakerConfig::default(),
        }
    }

    pub fn with_receive_settings(mut self, settings: ReceiveSettings) -> Self {
        self.receive = settings;
        self
    }

    pub fn with_breaker_config(mut self, config: CircuitBreakerConfig) -> Self {
        self.breaker = config;
        self
    }

    pub fn layout(&self) -> &QueueLayout {
        &self.layout
    }

    pub fn receive_settings(&self) -> &ReceiveSettings {
        &self.receive
    }

    pub fn local_machine(&self) -> &str {
        self.layout.local_machine()
    }

    /// Currently mounted working root, probed fresh.
    pub fn locate_root(&self) -> Option<PathBuf> {
        self.locator.locate()
    }

    /// Delete every file in the queue for `address`.
    ///
    /// Returns the number of files removed; zero when no root is mounted.
    pub fn purge(&self, address: &Address) -> Result<usize, TransportError> {
        let Some(root) = self.locate_root() else {
            debug!("Working root unavailable, nothing to purge for {address}");
            return Ok(0);
        };
        self.layout.purge_dir(&self.layout.queue_dir(&root, address))
    }

    /// Pending messages per remote machine; empty when no root is mounted.
    pub fn outgoing_report(&self) -> Result<Vec<PendingMachine>, TransportError> {
        match self.locate_root() {
            Some(root) => outgoing::outgoing_report(&root, &self.layout),
            None => Ok(Vec::new()),
        }
    }

    /// Start logging the outgoing report every `interval`.
    pub fn spawn_outgoing_monitor(
        &self,
        interval: Duration,
    ) -> Result<OutgoingMonitor, TransportError> {
        OutgoingMonitor::spawn(Arc::clone(&self.locator), self.layout.clone(), interval)
    }

    /// Builder for a receiver on `address` using this transport's settings.
    ///
    /// Every receiver gets its own circuit breaker, shared by its workers.
    pub fn receiver(&self, address: Address, on_critical: CriticalErrorHandler) -> ReceiverBuilder {
        ReceiverBuilder {
            address,
            locator: Arc::clone(&self.locator),
            layout: self.layout.clone(),
            settings: self.receive.clone(),
            breaker: Arc::new(CircuitBreaker::new(self.breaker.clone(), on_critical)),
        }
    }

    /// Receiver on `address` with this transport's settings.
    pub fn listen(
        &self,
        address: Address,
        dispatch: Arc<dyn Dispatch>,
        on_critical: CriticalErrorHandler,
    ) -> Receiver {
        self.receiver(address, on_critical).build(dispatch)
    }
}

impl CreateQueues for Transport {
    fn ensure_queue(&self, address: &Address) -> Result<Option<PathBuf>, TransportError> {
        match self.locate_root() {
            Some(root) => self.layout.resolve_queue_dir(&root, address).map(Some),
            None => Ok(None),
        }
    }
}

impl SendMessages for Transport {
    fn send(&self, message: &Message, address: &Address) -> Result<SendOutcome, TransportError> {
        sender::send(self.locator.as_ref(), &self.layout, message, address)
    }
}

impl DequeueMessages for Receiver {
    fn start(&mut self, concurrency: usize) -> Result<(), TransportError> {
        Receiver::start(self, concurrency)
    }

    fn stop(&mut self) {
        Receiver::stop(self)
    }
}

impl std::fmt::Debug for Transport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transport")
            .field("layout", &self.layout)
            .field("receive", &self.receive)
            .field("breaker", &self.breaker)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::root::FixedRoot;
    use tempfile::TempDir;

    fn transport(root: &std::path::Path) -> Transport {
        Transport::new(FixedRoot::new(root), QueueLayout::new("host-a", "msg"))
    }

    #[test]
    fn test_ensure_queue_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let transport = transport(temp_dir.path());
        let address = Address::local("orders").unwrap();

        let first = transport.ensure_queue(&address).unwrap().unwrap();
        let second = transport.ensure_queue(&address).unwrap().unwrap();
        assert_eq!(first, second);
        assert_eq!(first, temp_dir.path().join("host-a/orders"));
    }

    #[test]
    fn test_ensure_queue_without_root() {
        let temp_dir = TempDir::new().unwrap();
        let transport = transport(&temp_dir.path().join("missing"));
        assert!(transport.ensure_queue(&Address::local("orders").unwrap()).unwrap().is_none());
    }

    #[test]
    fn test_purge_counts_files() {
        let temp_dir = TempDir::new().unwrap();
        let transport = transport(temp_dir.path());
        let address = Address::local("orders").unwrap();

        for id in ["a", "b", "c"] {
            transport.send(&Message::new(id), &address).unwrap();
        }
        assert_eq!(transport.purge(&address).unwrap(), 3);
        assert_eq!(transport.purge(&address).unwrap(), 0);
    }

    #[test]
    fn test_outgoing_report_excludes_local() {
        let temp_dir = TempDir::new().unwrap();
        let transport = transport(temp_dir.path());

        transport
            .send(&Message::new("local"), &Address::local("orders").unwrap())
            .unwrap();
        transport
            .send(&Message::new("remote"), &Address::new("orders", "host-b").unwrap())
            .unwrap();

        let report = transport.outgoing_report().unwrap();
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].machine, "host-b");
        assert_eq!(report[0].pending, 1);
    }
}
