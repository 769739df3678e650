//! Core library for pigeonhole
//!
//! A store-and-forward message queue that uses plain files in a shared,
//! intermittently available directory tree (typically removable media) as
//! the medium between a sender and concurrent receivers on other hosts.
//!
//! ```text
//! <working root>/<machine>/<queue>/<message id>.msg
//! ```
//!
//! - [`Transport`] sends messages, creates and purges queues
//! - [`receive::Receiver`] runs supervised polling workers for one queue
//! - [`root::RootLocator`] finds the working root, probed fresh every time
//! - [`codec`] is the line-oriented on-disk message format
//!
//! Delivery is at-most-once: a message file is deleted after the host's
//! completion callback returns, whether processing succeeded or not.

pub mod codec;
pub mod config;
pub mod home;
pub mod io;
pub mod logging;
pub mod outgoing;
pub mod queue;
pub mod receive;
pub mod root;
pub mod schema;
pub mod sender;
pub mod transport;

pub use io::TransportError;
pub use schema::{Address, Expiry, Message};
pub use sender::SendOutcome;
pub use transport::{CreateQueues, DequeueMessages, SendMessages, Transport};
