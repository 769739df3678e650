//! The unit of transfer between a sender and a receiver

use super::Address;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::time::Duration;

/// When a message stops being worth delivering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Expiry {
    /// Never expires
    #[default]
    Never,
    /// Expires at an absolute UTC instant
    At(DateTime<Utc>),
}

impl Expiry {
    /// Expiry `ttl` from now.
    pub fn after(ttl: Duration) -> Self {
        match chrono::Duration::from_std(ttl) {
            Ok(delta) => Utc::now()
                .checked_add_signed(delta)
                .map_or(Self::Never, Self::At),
            Err(_) => Self::Never,
        }
    }

    /// Remaining time to live; `None` for never-expiring messages, zero once past.
    pub fn remaining(&self) -> Option<Duration> {
        match self {
            Self::Never => None,
            Self::At(at) => Some((*at - Utc::now()).to_std().unwrap_or(Duration::ZERO)),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.remaining() == Some(Duration::ZERO)
    }
}

/// A message as carried by the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Unique id, assigned by the sender. Also names the message file.
    pub id: String,

    /// Correlation id; an empty string is treated the same as none.
    pub correlation_id: Option<String>,

    /// Where replies should be sent
    pub reply_to: Option<Address>,

    /// Durability hint
    pub recoverable: bool,

    pub expiry: Expiry,

    pub headers: BTreeMap<String, String>,

    /// Payload; some control messages carry none.
    pub body: Option<Vec<u8>>,
}

impl Message {
    /// Create a recoverable, never-expiring message with the given id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            correlation_id: None,
            reply_to: None,
            recoverable: true,
            expiry: Expiry::Never,
            headers: BTreeMap::new(),
            body: None,
        }
    }

    /// Create a message with a freshly generated UUID id.
    pub fn with_random_id() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string())
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        let correlation_id = correlation_id.into();
        self.correlation_id = (!correlation_id.is_empty()).then_some(correlation_id);
        self
    }

    pub fn with_reply_to(mut self, reply_to: Address) -> Self {
        self.reply_to = Some(reply_to);
        self
    }

    pub fn with_recoverable(mut self, recoverable: bool) -> Self {
        self.recoverable = recoverable;
        self
    }

    /// Set the expiry to `ttl` from now.
    pub fn with_time_to_live(mut self, ttl: Duration) -> Self {
        self.expiry = Expiry::after(ttl);
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Remaining time to live, `None` if the message never expires.
    pub fn time_to_live(&self) -> Option<Duration> {
        self.expiry.remaining()
    }
}
