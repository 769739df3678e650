//! Writing messages into destination queues

use crate::codec;
use crate::io::{TransportError, write_atomic};
use crate::queue::QueueLayout;
use crate::root::RootLocator;
use crate::schema::{Address, Message};
use std::path::PathBuf;
use tracing::debug;

/// Outcome of a send
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Message file written into the destination queue
    Delivered { path: PathBuf },

    /// No working root is mounted; the message was discarded.
    ///
    /// The medium is the only persistence there is, so there is nowhere to
    /// hold the message until it comes back.
    Dropped,
}

/// Write `message` as a new file in the queue for `address`.
///
/// # Errors
///
/// `InvalidMessageId` if the id cannot name a file, otherwise `SendFailed`
/// carrying the destination and the underlying I/O error.
pub fn send(
    locator: &dyn RootLocator,
    layout: &QueueLayout,
    message: &Message,
    address: &Address,
) -> Result<SendOutcome, TransportError> {
    let file_name = layout.file_name(&message.id)?;

    let Some(root) = locator.locate() else {
        debug!("Working root unavailable, dropping message {} for {address}", message.id);
        return Ok(SendOutcome::Dropped);
    };

    let dir = match layout.resolve_queue_dir(&root, address) {
        Ok(dir) => dir,
        Err(TransportError::Io { path, source }) => {
            return Err(TransportError::SendFailed {
                address: address.clone(),
                path,
                source,
            });
        }
        Err(e) => return Err(e),
    };

    let content = codec::encode(message).map_err(|e| TransportError::SendFailed {
        address: address.clone(),
        path: dir.join(&file_name),
        source: std::io::Error::new(std::io::ErrorKind::InvalidData, e),
    })?;

    let path = write_atomic(&dir, &file_name, &content).map_err(|source| {
        TransportError::SendFailed {
            address: address.clone(),
            path: dir.join(&file_name),
            source,
        }
    })?;

    debug!("Wrote message {} to {path:?}", message.id);
    Ok(SendOutcome::Delivered { path })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::root::FixedRoot;
    use std::fs;
    use tempfile::TempDir;

    fn layout() -> QueueLayout {
        QueueLayout::new("host-a", "msg")
    }

    #[test]
    fn test_send_writes_file_named_from_id() {
        let temp_dir = TempDir::new().unwrap();
        let locator = FixedRoot::new(temp_dir.path());
        let address = Address::new("orders", "host-b").unwrap();
        let message = Message::new("abc123").with_body(b"hi".to_vec());

        let outcome = send(&locator, &layout(), &message, &address).unwrap();
        let expected = temp_dir.path().join("host-b/orders/abc123.msg");
        assert_eq!(outcome, SendOutcome::Delivered { path: expected.clone() });

        let decoded = codec::decode(&fs::read(expected).unwrap()).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn test_send_without_root_is_dropped() {
        let temp_dir = TempDir::new().unwrap();
        let locator = FixedRoot::new(temp_dir.path().join("unplugged"));
        let address = Address::local("orders").unwrap();

        let outcome = send(&locator, &layout(), &Message::new("a"), &address).unwrap();
        assert_eq!(outcome, SendOutcome::Dropped);
        assert!(!temp_dir.path().join("unplugged").exists());
    }

    #[test]
    fn test_send_io_failure_carries_destination() {
        let temp_dir = TempDir::new().unwrap();
        // host-a exists as a file, so the queue directory cannot be created
        fs::write(temp_dir.path().join("host-a"), b"").unwrap();
        let locator = FixedRoot::new(temp_dir.path());
        let address = Address::local("orders").unwrap();

        let err = send(&locator, &layout(), &Message::new("a"), &address).unwrap_err();
        match err {
            TransportError::SendFailed { address: failed, .. } => assert_eq!(failed, address),
            other => panic!("expected SendFailed, got {other:?}"),
        }
    }

    #[test]
    fn test_send_rejects_unusable_id() {
        let temp_dir = TempDir::new().unwrap();
        let locator = FixedRoot::new(temp_dir.path());
        let address = Address::local("orders").unwrap();

        let err = send(&locator, &layout(), &Message::new("../escape"), &address).unwrap_err();
        assert!(matches!(err, TransportError::InvalidMessageId(_)));
    }

    #[test]
    fn test_send_rejects_multiline_correlation_id() {
        let temp_dir = TempDir::new().unwrap();
        let locator = FixedRoot::new(temp_dir.path());
        let address = Address::local("orders").unwrap();
        let message = Message::new("a").with_correlation_id("x\nTrue");

        let err = send(&locator, &layout(), &message, &address).unwrap_err();
        assert!(matches!(err, TransportError::SendFailed { .. }));
        let dir = temp_dir.path().join("host-a/orders");
        assert_eq!(fs::read_dir(dir).unwrap().count(), 0);
    }
}
